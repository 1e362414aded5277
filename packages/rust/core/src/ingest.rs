//! Reading an uploaded CSV into a classified [`Dataset`].
//!
//! Header names are trimmed and empty cells become null before the
//! classifier sees any row.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use csv::ReaderBuilder;
use inviteboard_shared::{
    Dataset, DatasetOrigin, Field, InviteBoardError, Record, Result, storage_field_name,
};
use tracing::debug;

use crate::classifier;

/// A parsed upload before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

/// Parse delimited text with a header row.
///
/// Rejects: empty input, a header with no data rows, blank header names,
/// headers that collide once stored, ragged rows, invalid UTF-8.
pub fn parse_table(input: &[u8]) -> Result<Table> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(input);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| InviteBoardError::parse(format!("could not read header row: {e}")))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    if headers.is_empty() {
        return Err(InviteBoardError::validation("uploaded file is empty"));
    }

    let mut seen: HashMap<String, &str> = HashMap::new();
    for (i, header) in headers.iter().enumerate() {
        if header.is_empty() {
            return Err(InviteBoardError::validation(format!(
                "column {} has an empty header",
                i + 1
            )));
        }
        if let Some(previous) = seen.insert(storage_field_name(header), header) {
            return Err(InviteBoardError::validation(format!(
                "columns '{previous}' and '{header}' refer to the same field"
            )));
        }
    }

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| InviteBoardError::parse(e.to_string()))?;
        rows.push(
            record
                .iter()
                .map(|cell| (!cell.is_empty()).then(|| cell.to_string()))
                .collect(),
        );
    }

    if rows.is_empty() {
        return Err(InviteBoardError::validation(
            "uploaded file contains no records",
        ));
    }

    debug!(columns = headers.len(), rows = rows.len(), "parsed upload");
    Ok(Table { headers, rows })
}

/// Turn a parsed table into a classified dataset. The `Org` column is
/// appended, or overwritten if the upload already had one.
pub fn classify_table(table: Table, uploaded_at: DateTime<Utc>) -> Result<Dataset> {
    let Table { headers, rows } = table;

    let mut records: Vec<Record> = rows
        .into_iter()
        .map(|row| Record::from_cells(headers.iter().cloned().zip(row)))
        .collect();
    classifier::classify_all(&mut records);

    let mut fields = headers;
    if !fields.iter().any(|f| Field::Org.matches(f)) {
        fields.push(Field::Org.label().to_string());
    }

    Dataset::new(fields, records, uploaded_at, DatasetOrigin::Uploaded)
}

/// Parse and classify an upload in one step.
pub fn build_dataset(input: &[u8], uploaded_at: DateTime<Utc>) -> Result<Dataset> {
    classify_table(parse_table(input)?, uploaded_at)
}
