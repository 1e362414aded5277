//! Delimited-text export and export file names.

use chrono::{DateTime, Local};
use inviteboard_shared::{InviteBoardError, Record, Result};

use crate::filter::{Column, OrgFilter};

/// Serialize records as comma-separated UTF-8 with a header row. Missing
/// cells are written as empty strings.
pub fn to_delimited_text(records: &[&Record], columns: &[Column]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer
        .write_record(columns.iter().map(|c| c.header.as_str()))
        .map_err(|e| InviteBoardError::Render(e.to_string()))?;
    for record in records {
        writer
            .write_record(columns.iter().map(|c| c.value(record)))
            .map_err(|e| InviteBoardError::Render(e.to_string()))?;
    }

    writer
        .into_inner()
        .map_err(|e| InviteBoardError::Render(e.to_string()))
}

fn stamp(now: DateTime<Local>) -> String {
    now.format("%Y%m%d_%H%M%S").to_string()
}

/// Make an org label safe to embed in a file name.
fn file_safe(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

/// `filtered_data_<stamp>.csv`
pub fn csv_file_name(now: DateTime<Local>) -> String {
    format!("filtered_data_{}.csv", stamp(now))
}

/// `user_data_report_<org>_<stamp>.pdf`
pub fn pdf_file_name(filter: &OrgFilter, now: DateTime<Local>) -> String {
    format!(
        "user_data_report_{}_{}.pdf",
        file_safe(filter.label()),
        stamp(now)
    )
}

/// `user_data_stats_<stamp>.pdf`
pub fn stats_file_name(now: DateTime<Local>) -> String {
    format!("user_data_stats_{}.pdf", stamp(now))
}
