//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use chrono::Local;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use inviteboard_core::{Session, Workspace};
use inviteboard_delivery::{
    Attachment, DeliveryGateway, DeliveryOutcome, DeliveryProgress, HttpRelayGateway, Message,
    OutboxGateway, parse_recipients, send_report,
};
use inviteboard_reports::{
    ALL, Column, OrgFilter, ReportDocument, csv_file_name, dataset_stats, display_columns, filter,
    org_options, pdf, pdf_file_name, report_title, stats_document, stats_file_name, text,
    to_delimited_text, to_document,
};
use inviteboard_shared::{
    AppConfig, Dataset, DeliveryMode, expand_home, init_config, load_config, load_config_from,
};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// InviteBoard: sort site-invitation exports by organization and report on them.
#[derive(Parser)]
#[command(
    name = "inviteboard",
    version,
    about = "Classify site-invitation exports by organization, report on them, and mail the reports.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.inviteboard/inviteboard.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Database file; overrides `[database] path`.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Account to log in as.
    #[arg(long, global = true, env = "INVITEBOARD_USER", default_value = "admin")]
    pub user: String,

    /// Password for `--user`.
    #[arg(long, global = true, env = "INVITEBOARD_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Upload a CSV export, replacing all stored records.
    Upload {
        /// CSV file with a header row.
        file: PathBuf,
    },

    /// Print the records of one organization (or all) as a table.
    Show {
        /// Org label, or "All".
        #[arg(long, default_value = ALL)]
        org: String,
    },

    /// List the organization labels in the current data.
    Orgs,

    /// Print organization and status statistics.
    Stats {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Write the current data to a file.
    Export {
        #[command(subcommand)]
        action: ExportAction,
    },

    /// Email a PDF report to a list of recipients.
    Send {
        /// Recipients separated by commas, semicolons or newlines.
        #[arg(long)]
        to: String,

        /// Org label, or "All".
        #[arg(long, default_value = ALL)]
        org: String,

        /// One section per organization, each on its own page.
        #[arg(long)]
        group: bool,

        /// Subject line (defaults to `[report] default_subject`).
        #[arg(long)]
        subject: Option<String>,

        /// Message body (defaults to `[report] default_body`).
        #[arg(long)]
        body: Option<String>,
    },

    /// Manage the logged-in account.
    Account {
        #[command(subcommand)]
        action: AccountAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Export subcommands.
#[derive(Subcommand)]
pub(crate) enum ExportAction {
    /// Filtered records as CSV (all columns).
    Csv {
        #[arg(long, default_value = ALL)]
        org: String,
        /// Output path (defaults to a timestamped name in the current directory).
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Filtered records as a PDF report.
    Pdf {
        #[arg(long, default_value = ALL)]
        org: String,
        #[arg(long)]
        group: bool,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Statistics as a PDF report.
    Stats {
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

/// Account subcommands.
#[derive(Subcommand)]
pub(crate) enum AccountAction {
    /// Change the password; `--password` must hold the current one.
    Password {
        #[arg(long = "new")]
        new_password: String,
    },
    /// Set the account's email address.
    Email { address: String },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "inviteboard=info",
        1 => "inviteboard=debug",
        _ => "inviteboard=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };

    // Config commands work without a database or a login.
    if let Command::Config { action } = &cli.command {
        return match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&config),
        };
    }

    let db_path = cli
        .db
        .clone()
        .unwrap_or_else(|| expand_home(&config.database.path));
    let password = cli
        .password
        .as_deref()
        .ok_or_else(|| eyre!("a password is required (--password or INVITEBOARD_PASSWORD)"))?;

    let workspace = Workspace::open(&db_path).await?;
    let mut session = workspace.login(&cli.user, password).await?;
    info!(user = %session.username(), db = %db_path.display(), "logged in");

    match cli.command {
        Command::Upload { file } => cmd_upload(&workspace, &mut session, &file).await,
        Command::Show { org } => cmd_show(&session, &org),
        Command::Orgs => cmd_orgs(&session),
        Command::Stats { json } => cmd_stats(&session, json),
        Command::Export { action } => match action {
            ExportAction::Csv { org, out } => cmd_export_csv(&session, &org, out),
            ExportAction::Pdf { org, group, out } => cmd_export_pdf(&session, &org, group, out),
            ExportAction::Stats { out } => cmd_export_stats(&session, out),
        },
        Command::Send {
            to,
            org,
            group,
            subject,
            body,
        } => {
            let message = Message {
                from: config.delivery.sender.clone(),
                subject: subject.unwrap_or_else(|| config.report.default_subject.clone()),
                body: body.unwrap_or_else(|| config.report.default_body.clone()),
            };
            cmd_send(&config, &session, &to, &org, group, message).await
        }
        Command::Account { action } => match action {
            AccountAction::Password { new_password } => {
                workspace
                    .auth
                    .change_password(&session, password, &new_password)
                    .await?;
                println!("Password updated for {}", session.username());
                Ok(())
            }
            AccountAction::Email { address } => {
                workspace.auth.update_email(&mut session, &address).await?;
                println!(
                    "Email for {} set to {}",
                    session.username(),
                    session.email().unwrap_or_default()
                );
                Ok(())
            }
        },
        Command::Config { .. } => Ok(()),
    }
}

/// The session's dataset, or an error pointing at `upload`.
fn active(session: &Session) -> Result<&Dataset> {
    session
        .dataset()
        .ok_or_else(|| eyre!("no data uploaded yet; run `inviteboard upload <FILE>` first"))
}

/// Build the record report for `org`.
fn record_report(dataset: &Dataset, org: &str, group: bool) -> (OrgFilter, ReportDocument) {
    let selection = OrgFilter::parse(org);
    let records = filter(dataset, &selection);
    let doc = to_document(
        report_title(&selection),
        &records,
        &display_columns(dataset),
        group,
    );
    (selection, doc)
}

fn write_output(out: Option<PathBuf>, default_name: String, bytes: &[u8]) -> Result<PathBuf> {
    let path = out.unwrap_or_else(|| PathBuf::from(default_name));
    std::fs::write(&path, bytes).map_err(|e| eyre!("failed to write {}: {e}", path.display()))?;
    Ok(path)
}

// ---------------------------------------------------------------------------
// Data commands
// ---------------------------------------------------------------------------

async fn cmd_upload(workspace: &Workspace, session: &mut Session, file: &Path) -> Result<()> {
    info!(file = %file.display(), "uploading");
    let dataset = workspace.datasets.upload_file(session, file).await?;

    println!();
    println!("  Upload complete");
    println!("  Records: {}", dataset.len());
    println!("  Fields:  {}", dataset.fields().len());
    println!("  {}", dataset.provenance());
    println!();
    for org in org_options(dataset).iter().skip(1) {
        let count = dataset.records().iter().filter(|r| r.org().as_str() == org.as_str()).count();
        println!("  {org:<24} {count}");
    }
    println!();
    Ok(())
}

fn cmd_show(session: &Session, org: &str) -> Result<()> {
    let dataset = active(session)?;
    let (_, doc) = record_report(dataset, org, false);
    println!("{}", dataset.provenance());
    println!();
    print!("{}", text::render(&doc));
    Ok(())
}

fn cmd_orgs(session: &Session) -> Result<()> {
    for org in org_options(active(session)?) {
        println!("{org}");
    }
    Ok(())
}

fn cmd_stats(session: &Session, json: bool) -> Result<()> {
    let dataset = active(session)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&dataset_stats(dataset))?);
    } else {
        print!("{}", text::render(&stats_document(dataset)));
    }
    Ok(())
}

fn cmd_export_csv(session: &Session, org: &str, out: Option<PathBuf>) -> Result<()> {
    let dataset = active(session)?;
    let records = filter(dataset, &OrgFilter::parse(org));
    let bytes = to_delimited_text(&records, &Column::all(dataset))?;
    let path = write_output(out, csv_file_name(Local::now()), &bytes)?;
    println!("Wrote {} records to {}", records.len(), path.display());
    Ok(())
}

fn cmd_export_pdf(session: &Session, org: &str, group: bool, out: Option<PathBuf>) -> Result<()> {
    let dataset = active(session)?;
    let (selection, doc) = record_report(dataset, org, group);
    let bytes = pdf::render(&doc)?;
    let path = write_output(out, pdf_file_name(&selection, Local::now()), &bytes)?;
    println!("Wrote {} records to {}", doc.total_records, path.display());
    Ok(())
}

fn cmd_export_stats(session: &Session, out: Option<PathBuf>) -> Result<()> {
    let bytes = pdf::render(&stats_document(active(session)?))?;
    let path = write_output(out, stats_file_name(Local::now()), &bytes)?;
    println!("Wrote statistics to {}", path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Delivery
// ---------------------------------------------------------------------------

async fn gateway(config: &AppConfig) -> Result<Box<dyn DeliveryGateway>> {
    let delivery = &config.delivery;
    let gateway: Box<dyn DeliveryGateway> = match delivery.mode {
        DeliveryMode::Relay => Box::new(HttpRelayGateway::from_config(delivery)?),
        DeliveryMode::Outbox => {
            Box::new(OutboxGateway::open(expand_home(&delivery.outbox_dir)).await?)
        }
    };
    Ok(gateway)
}

async fn cmd_send(
    config: &AppConfig,
    session: &Session,
    to: &str,
    org: &str,
    group: bool,
    message: Message,
) -> Result<()> {
    let recipients = parse_recipients(to)?;
    let dataset = active(session)?;
    let (selection, doc) = record_report(dataset, org, group);
    let attachment = Attachment::pdf(
        pdf_file_name(&selection, Local::now()),
        pdf::render(&doc)?,
    );
    let gateway = gateway(config).await?;

    info!(
        gateway = gateway.name(),
        recipients = recipients.len(),
        org = selection.label(),
        "sending report"
    );

    let progress = CliProgress::new();
    let summary = send_report(
        gateway.as_ref(),
        &recipients,
        &message,
        &attachment,
        &progress,
    )
    .await?;
    progress.finish();

    println!();
    println!(
        "  Sent to {} of {} recipients",
        summary.succeeded, summary.attempted
    );
    for (recipient, reason) in &summary.failures {
        println!("  Failed: {recipient}: {reason}");
    }
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Delivery progress shown as an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl DeliveryProgress for CliProgress {
    fn sending(&self, recipient: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Sending [{current}/{total}] {recipient}"));
    }

    fn delivered(&self, recipient: &str, outcome: &DeliveryOutcome) {
        let mark = if outcome.success { "✓" } else { "✗" };
        self.spinner
            .println(format!("  {mark} {recipient}: {}", outcome.message));
    }
}

// ---------------------------------------------------------------------------
// Config commands
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}
