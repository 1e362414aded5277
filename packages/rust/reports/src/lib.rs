//! Views, statistics, and exports over an invite dataset.
//!
//! Everything here is pure: functions take a [`Dataset`](inviteboard_shared::Dataset)
//! and return records, tables, or bytes. Persistence and delivery live in
//! other crates.

pub mod document;
pub mod export;
pub mod filter;
pub mod pdf;
pub mod stats;
pub mod text;

pub use document::{ReportDocument, Section, report_title, stats_document, to_document};
pub use export::{csv_file_name, pdf_file_name, stats_file_name, to_delimited_text};
pub use filter::{ALL, Column, OrgFilter, display_columns, filter, org_options};
pub use stats::{
    ACTIVATED_STATUS, AggregateRow, DatasetStats, NULL_VALUE_LABEL, activation_rate, aggregate,
    dataset_stats,
};
