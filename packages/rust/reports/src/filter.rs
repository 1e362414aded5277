//! Filtered, sorted views over a dataset and the columns they show.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use inviteboard_shared::{Dataset, Field, Record};

/// Selection value that keeps every record.
pub const ALL: &str = "All";

/// Which organization a view is restricted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrgFilter {
    All,
    Org(String),
}

impl OrgFilter {
    /// `"All"` selects everything; anything else is an exact org label.
    pub fn parse(selection: &str) -> Self {
        if selection == ALL {
            OrgFilter::All
        } else {
            OrgFilter::Org(selection.to_string())
        }
    }

    pub fn label(&self) -> &str {
        match self {
            OrgFilter::All => ALL,
            OrgFilter::Org(org) => org,
        }
    }

    fn keeps(&self, record: &Record) -> bool {
        match self {
            OrgFilter::All => true,
            OrgFilter::Org(org) => record.field(Field::Org) == Some(org.as_str()),
        }
    }
}

/// One output column: the header to print and the dataset field it reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub header: String,
    pub source: String,
}

impl Column {
    pub fn new(header: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            source: source.into(),
        }
    }

    /// Every dataset field, under its own name.
    pub fn all(dataset: &Dataset) -> Vec<Column> {
        dataset
            .fields()
            .iter()
            .map(|f| Column::new(f.clone(), f.clone()))
            .collect()
    }

    /// Value of this column in `record`, empty if missing or null.
    pub fn value<'r>(&self, record: &'r Record) -> &'r str {
        record.get(&self.source).unwrap_or("")
    }
}

/// The table/PDF view columns that the dataset actually has:
/// `Org, First name, Last name, Email, Description, Has Used`.
pub fn display_columns(dataset: &Dataset) -> Vec<Column> {
    Field::DISPLAY
        .iter()
        .filter_map(|field| {
            dataset
                .column_for(*field)
                .map(|source| Column::new(field.label(), source))
        })
        .collect()
}

/// Records kept by `filter`, sorted by Description ascending. The sort is
/// stable and puts null descriptions last.
pub fn filter<'a>(dataset: &'a Dataset, filter: &OrgFilter) -> Vec<&'a Record> {
    let mut records: Vec<&Record> = dataset
        .records()
        .iter()
        .filter(|r| filter.keeps(r))
        .collect();
    records.sort_by(|a, b| by_description(a, b));
    records
}

fn by_description(a: &Record, b: &Record) -> Ordering {
    match (a.field(Field::Description), b.field(Field::Description)) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Selection list: `"All"` followed by the distinct org labels, sorted.
pub fn org_options(dataset: &Dataset) -> Vec<String> {
    let orgs: BTreeSet<String> = dataset
        .records()
        .iter()
        .map(|r| r.org().to_string())
        .collect();
    std::iter::once(ALL.to_string()).chain(orgs).collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Utc;
    use inviteboard_shared::DatasetOrigin;

    /// Dataset with fields `First name, Description, Accepted site invitation, Org`.
    pub(crate) fn dataset(rows: &[(&str, Option<&str>, Option<&str>, &str)]) -> Dataset {
        let fields: Vec<String> = ["First name", "Description", "Accepted site invitation", "Org"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let records = rows
            .iter()
            .map(|(name, desc, used, org)| {
                Record::from_cells([
                    ("First name", Some(name.to_string())),
                    ("Description", desc.map(String::from)),
                    ("Accepted site invitation", used.map(String::from)),
                    ("Org", Some(org.to_string())),
                ])
            })
            .collect();
        Dataset::new(fields, records, Utc::now(), DatasetOrigin::Uploaded).expect("dataset")
    }

    fn scenario() -> Dataset {
        dataset(&[
            ("Ann", Some("Stake Relief Society"), Some("Yes"), "Stake"),
            ("Bob", Some("Ward2 clerk"), Some("No"), "FM"),
            ("Cy", None, None, "(blank org)"),
        ])
    }

    fn names(records: &[&Record]) -> Vec<String> {
        records
            .iter()
            .map(|r| r.field_or_empty(Field::FirstName).to_string())
            .collect()
    }

    #[test]
    fn filter_by_label_keeps_exact_matches() {
        let ds = scenario();
        let fm = filter(&ds, &OrgFilter::parse("FM"));
        assert_eq!(names(&fm), vec!["Bob"]);
        assert!(filter(&ds, &OrgFilter::parse("fm")).is_empty());
    }

    #[test]
    fn all_sorts_by_description_nulls_last() {
        let ds = scenario();
        let all = filter(&ds, &OrgFilter::All);
        assert_eq!(names(&all), vec!["Ann", "Bob", "Cy"]);

        let ds = dataset(&[
            ("z", Some("Ward9"), None, "Ward9"),
            ("first", Some("Ward1"), None, "Ward1"),
            ("second", Some("Ward1"), None, "Ward1"),
            ("none", None, None, "(blank org)"),
            ("a", Some("Apple"), None, "Apple"),
        ]);
        let all = filter(&ds, &OrgFilter::All);
        assert_eq!(names(&all), vec!["a", "first", "second", "z", "none"]);
    }

    #[test]
    fn org_options_all_first_then_sorted() {
        let ds = scenario();
        assert_eq!(org_options(&ds), vec!["All", "(blank org)", "FM", "Stake"]);
    }

    #[test]
    fn display_columns_use_view_headers() {
        let ds = scenario();
        let headers: Vec<_> = display_columns(&ds).into_iter().map(|c| c.header).collect();
        assert_eq!(headers, vec!["Org", "First name", "Description", "Has Used"]);

        let cols = display_columns(&ds);
        assert_eq!(cols[3].value(&ds.records()[0]), "Yes");
        assert_eq!(cols[3].value(&ds.records()[2]), "");
    }
}
