//! Aggregate counts over a dataset.

use std::collections::HashMap;

use inviteboard_shared::{Dataset, Field};
use serde::Serialize;

/// Status value that counts as an activated user.
pub const ACTIVATED_STATUS: &str = "Yes";

/// Label used for null values in rendered tables.
pub const NULL_VALUE_LABEL: &str = "(blank)";

/// One distinct value of a field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    /// `None` for records where the field is missing or null.
    pub value: Option<String>,
    pub count: usize,
    pub percentage: f64,
}

impl AggregateRow {
    pub fn display_value(&self) -> &str {
        self.value.as_deref().unwrap_or(NULL_VALUE_LABEL)
    }
}

/// Distinct values of `field` with counts, most frequent first. Ties keep
/// first-seen order. Null is counted as its own value so percentages cover
/// every record.
pub fn aggregate(dataset: &Dataset, field: Field) -> Vec<AggregateRow> {
    let mut order: Vec<Option<&str>> = Vec::new();
    let mut counts: HashMap<Option<&str>, usize> = HashMap::new();
    for record in dataset.records() {
        let value = record.field(field);
        let count = counts.entry(value).or_insert(0);
        if *count == 0 {
            order.push(value);
        }
        *count += 1;
    }

    let total = dataset.len();
    let mut rows: Vec<AggregateRow> = order
        .into_iter()
        .map(|value| {
            let count = counts[&value];
            AggregateRow {
                value: value.map(String::from),
                count,
                percentage: percentage(count, total),
            }
        })
        .collect();
    rows.sort_by(|a, b| b.count.cmp(&a.count));
    rows
}

fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

/// Share of records whose status is `Yes`, as a percentage.
pub fn activation_rate(dataset: &Dataset) -> f64 {
    let activated = dataset
        .records()
        .iter()
        .filter(|r| r.field(Field::AcceptedSiteInvitation) == Some(ACTIVATED_STATUS))
        .count();
    percentage(activated, dataset.len())
}

/// Everything the statistics view shows.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetStats {
    pub total_records: usize,
    pub organizations: Vec<AggregateRow>,
    /// Present only when the dataset has a status column.
    pub status: Option<Vec<AggregateRow>>,
    pub activation_rate: Option<f64>,
}

pub fn dataset_stats(dataset: &Dataset) -> DatasetStats {
    let has_status = dataset.column_for(Field::AcceptedSiteInvitation).is_some();
    DatasetStats {
        total_records: dataset.len(),
        organizations: aggregate(dataset, Field::Org),
        status: has_status.then(|| aggregate(dataset, Field::AcceptedSiteInvitation)),
        activation_rate: has_status.then(|| activation_rate(dataset)),
    }
}
