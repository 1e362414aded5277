//! Core domain types for InviteBoard datasets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{InviteBoardError, Result};
use crate::fields::Field;

// ---------------------------------------------------------------------------
// OrgLabel
// ---------------------------------------------------------------------------

/// Organization bucket assigned to a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum OrgLabel {
    Stake,
    Fm,
    /// Leading word of the description, original case.
    Prefix(String),
    /// Sentinel for records without a usable description.
    Blank,
}

impl OrgLabel {
    pub const STAKE: &'static str = "Stake";
    pub const FM: &'static str = "FM";
    pub const BLANK: &'static str = "(blank org)";

    pub fn as_str(&self) -> &str {
        match self {
            OrgLabel::Stake => Self::STAKE,
            OrgLabel::Fm => Self::FM,
            OrgLabel::Prefix(p) => p,
            OrgLabel::Blank => Self::BLANK,
        }
    }
}

impl std::fmt::Display for OrgLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for OrgLabel {
    fn from(s: &str) -> Self {
        match s {
            Self::STAKE => OrgLabel::Stake,
            Self::FM => OrgLabel::Fm,
            Self::BLANK | "" => OrgLabel::Blank,
            other => OrgLabel::Prefix(other.to_string()),
        }
    }
}

impl From<String> for OrgLabel {
    fn from(s: String) -> Self {
        OrgLabel::from(s.as_str())
    }
}

impl From<OrgLabel> for String {
    fn from(label: OrgLabel) -> Self {
        match label {
            OrgLabel::Prefix(p) => p,
            other => other.as_str().to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// One user/invitation entry: an ordered mapping of field name to value.
///
/// Lookups never fail; a field that is absent and a field that is null both
/// read as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    cells: Vec<(String, Option<String>)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from `(field, value)` pairs in order.
    pub fn from_cells<I, K>(cells: I) -> Self
    where
        I: IntoIterator<Item = (K, Option<String>)>,
        K: Into<String>,
    {
        Self {
            cells: cells.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Value of the field named exactly `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(k, _)| k == name)
            .and_then(|(_, v)| v.as_deref())
    }

    /// Value of a well-known field, whatever casing its header uses.
    pub fn field(&self, field: Field) -> Option<&str> {
        self.cells
            .iter()
            .find(|(k, _)| field.matches(k))
            .and_then(|(_, v)| v.as_deref())
    }

    /// Like [`Record::field`] but missing and null read as `""`.
    pub fn field_or_empty(&self, field: Field) -> &str {
        self.field(field).unwrap_or("")
    }

    /// Set a field by exact name, appending it if absent.
    pub fn set(&mut self, name: &str, value: Option<String>) {
        match self.cells.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value,
            None => self.cells.push((name.to_string(), value)),
        }
    }

    /// Set the organization label, reusing an existing `Org` column if the
    /// record already has one.
    pub fn set_org(&mut self, label: &OrgLabel) {
        let value = Some(label.to_string());
        match self.cells.iter_mut().find(|(k, _)| Field::Org.matches(k)) {
            Some((_, v)) => *v = value,
            None => self.cells.push((Field::Org.label().to_string(), value)),
        }
    }

    /// Organization label, or [`OrgLabel::Blank`] if unset.
    pub fn org(&self) -> OrgLabel {
        OrgLabel::from(self.field_or_empty(Field::Org))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(k, _)| k.as_str())
    }

    pub fn cells(&self) -> &[(String, Option<String>)] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Dataset
// ---------------------------------------------------------------------------

/// Where the active dataset came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetOrigin {
    /// Built from a file uploaded in this session.
    Uploaded,
    /// Reconstructed from storage.
    Reloaded,
}

/// The full classified table plus metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    fields: Vec<String>,
    records: Vec<Record>,
    uploaded_at: DateTime<Utc>,
    origin: DatasetOrigin,
}

impl Dataset {
    /// Build a dataset, checking that every record has exactly `fields`, in
    /// order.
    pub fn new(
        fields: Vec<String>,
        records: Vec<Record>,
        uploaded_at: DateTime<Utc>,
        origin: DatasetOrigin,
    ) -> Result<Self> {
        for (i, record) in records.iter().enumerate() {
            if !record.field_names().eq(fields.iter().map(String::as_str)) {
                return Err(InviteBoardError::validation(format!(
                    "record {} does not match the dataset field set",
                    i + 1
                )));
            }
        }
        Ok(Self {
            fields,
            records,
            uploaded_at,
            origin,
        })
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn uploaded_at(&self) -> DateTime<Utc> {
        self.uploaded_at
    }

    pub fn origin(&self) -> DatasetOrigin {
        self.origin
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Header used by this dataset for a well-known field.
    pub fn column_for(&self, field: Field) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| field.matches(f))
            .map(String::as_str)
    }

    /// Status line describing the dataset's provenance.
    pub fn provenance(&self) -> String {
        match self.origin {
            DatasetOrigin::Uploaded => format!(
                "Last upload: {}",
                self.uploaded_at.format("%Y-%m-%d %H:%M:%S")
            ),
            DatasetOrigin::Reloaded => "Loaded from database".to_string(),
        }
    }
}
