//! Renderer-independent report documents.
//!
//! A [`ReportDocument`] is a title, a list of table sections, and a grand
//! total. The PDF and text renderers lay the same document out differently.

use chrono::{DateTime, Local};
use inviteboard_shared::{Dataset, Field, Record};

use crate::filter::{Column, OrgFilter};
use crate::stats::{self, AggregateRow};

/// A titled set of table sections.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportDocument {
    pub title: String,
    pub generated_at: DateTime<Local>,
    pub sections: Vec<Section>,
    /// Free-text lines printed after the sections.
    pub notes: Vec<String>,
    pub total_records: usize,
    /// Start each section after the first on a new page.
    pub break_between_sections: bool,
}

/// One table with its own header row.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub heading: Option<String>,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Records in this section.
    pub record_count: usize,
    /// Records in this and all earlier sections.
    pub running_total: usize,
    pub footer: Option<String>,
}

impl ReportDocument {
    pub fn generated_line(&self) -> String {
        format!(
            "Generated on: {}",
            self.generated_at.format("%Y-%m-%d %H:%M:%S")
        )
    }

    pub fn total_line(&self) -> String {
        format!("Total Records: {}", self.total_records)
    }
}

/// Title used for record reports.
pub fn report_title(filter: &OrgFilter) -> String {
    match filter {
        OrgFilter::All => "User Data Report - All Organizations".to_string(),
        OrgFilter::Org(org) => format!("User Data Report - {org} Organization"),
    }
}

fn row_values(record: &Record, columns: &[Column]) -> Vec<String> {
    columns.iter().map(|c| c.value(record).to_string()).collect()
}

/// Lay records out as a document. With `group_by_org`, one section per
/// distinct Org value in first-seen order, each starting a new page;
/// otherwise a single section.
pub fn to_document(
    title: impl Into<String>,
    records: &[&Record],
    columns: &[Column],
    group_by_org: bool,
) -> ReportDocument {
    let headers: Vec<String> = columns.iter().map(|c| c.header.clone()).collect();

    let sections = if group_by_org {
        let mut groups: Vec<(String, Vec<&Record>)> = Vec::new();
        for &record in records {
            let org = record.org().to_string();
            match groups.iter_mut().find(|(k, _)| *k == org) {
                Some((_, members)) => members.push(record),
                None => groups.push((org, vec![record])),
            }
        }

        let mut running_total = 0;
        groups
            .into_iter()
            .map(|(org, members)| {
                running_total += members.len();
                Section {
                    heading: Some(format!("Organization: {org}")),
                    columns: headers.clone(),
                    rows: members.iter().map(|r| row_values(r, columns)).collect(),
                    record_count: members.len(),
                    running_total,
                    footer: Some(format!(
                        "Records in {org}: {} (running total: {running_total})",
                        members.len()
                    )),
                }
            })
            .collect()
    } else {
        vec![Section {
            heading: None,
            columns: headers,
            rows: records.iter().map(|r| row_values(r, columns)).collect(),
            record_count: records.len(),
            running_total: records.len(),
            footer: None,
        }]
    };

    ReportDocument {
        title: title.into(),
        generated_at: Local::now(),
        sections,
        notes: Vec::new(),
        total_records: records.len(),
        break_between_sections: group_by_org,
    }
}

fn aggregate_section(heading: &str, value_header: &str, rows: &[AggregateRow]) -> Section {
    let count: usize = rows.iter().map(|r| r.count).sum();
    Section {
        heading: Some(heading.to_string()),
        columns: vec![
            value_header.to_string(),
            "Count".to_string(),
            "Percentage".to_string(),
        ],
        rows: rows
            .iter()
            .map(|r| {
                vec![
                    r.display_value().to_string(),
                    r.count.to_string(),
                    format!("{:.2}%", r.percentage),
                ]
            })
            .collect(),
        record_count: count,
        running_total: count,
        footer: None,
    }
}

/// The statistics document: organization distribution and, when the
/// dataset has a status column, the activation rate and status breakdown.
pub fn stats_document(dataset: &Dataset) -> ReportDocument {
    let stats = stats::dataset_stats(dataset);

    let mut sections = vec![aggregate_section(
        "Organization Distribution",
        "Organization",
        &stats.organizations,
    )];
    let mut notes = Vec::new();
    if let Some(status) = &stats.status {
        sections.push(aggregate_section(
            &format!("{} Breakdown", Field::AcceptedSiteInvitation.label()),
            "Status",
            status,
        ));
    }
    if let Some(rate) = stats.activation_rate {
        notes.push(format!("User Activation Rate: {rate:.2}%"));
    }

    ReportDocument {
        title: "User Data Statistics".to_string(),
        generated_at: Local::now(),
        sections,
        notes,
        total_records: stats.total_records,
        break_between_sections: false,
    }
}
