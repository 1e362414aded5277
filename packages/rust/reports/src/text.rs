//! Plain-text rendering of report documents for the terminal.

use std::fmt::Write;

use crate::document::{ReportDocument, Section};

/// Widest a text column is allowed to get before values are cut.
const MAX_COLUMN_WIDTH: usize = 40;

/// Render a document as aligned plain-text tables.
pub fn render(doc: &ReportDocument) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", doc.title);
    let _ = writeln!(out, "{}", doc.generated_line());

    for section in &doc.sections {
        out.push('\n');
        render_section(&mut out, section);
    }

    if !doc.notes.is_empty() {
        out.push('\n');
        for note in &doc.notes {
            let _ = writeln!(out, "{note}");
        }
    }

    out.push('\n');
    let _ = writeln!(out, "{}", doc.total_line());
    out
}

fn render_section(out: &mut String, section: &Section) {
    if let Some(heading) = &section.heading {
        let _ = writeln!(out, "{heading}");
    }

    let widths: Vec<usize> = section
        .columns
        .iter()
        .enumerate()
        .map(|(i, header)| {
            section
                .rows
                .iter()
                .filter_map(|row| row.get(i))
                .map(|v| v.chars().count())
                .chain(std::iter::once(header.chars().count()))
                .max()
                .unwrap_or(0)
                .min(MAX_COLUMN_WIDTH)
        })
        .collect();

    write_row(out, &section.columns, &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    write_row(out, &rule, &widths);
    for row in &section.rows {
        write_row(out, row, &widths);
    }

    if let Some(footer) = &section.footer {
        let _ = writeln!(out, "{footer}");
    }
}

fn write_row(out: &mut String, cells: &[String], widths: &[usize]) {
    let line = widths
        .iter()
        .enumerate()
        .map(|(i, width)| {
            let cell = cells.get(i).map(String::as_str).unwrap_or("");
            format!("{:<width$}", truncate(cell, *width), width = *width)
        })
        .collect::<Vec<_>>()
        .join("  ");
    let _ = writeln!(out, "{}", line.trim_end());
}

/// Cut `s` to `max` characters, marking the cut with `~`.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut cut: String = s.chars().take(max.saturating_sub(1)).collect();
    cut.push('~');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{stats_document, to_document};
    use crate::filter::{self, OrgFilter, display_columns, tests::dataset};

    #[test]
    fn renders_aligned_table_and_total() {
        let ds = dataset(&[
            ("Ann", Some("Stake Relief Society"), Some("Yes"), "Stake"),
            ("Bob", Some("Ward2 clerk"), Some("No"), "FM"),
        ]);
        let records = filter::filter(&ds, &OrgFilter::All);
        let doc = to_document("Report", &records, &display_columns(&ds), false);
        let text = render(&doc);

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Report");
        assert!(lines[1].starts_with("Generated on: "));
        assert_eq!(lines[3], "Org    First name  Description           Has Used");
        assert_eq!(lines[5], "Stake  Ann         Stake Relief Society  Yes");
        assert_eq!(lines.last().copied(), Some("Total Records: 2"));
    }

    #[test]
    fn grouped_document_prints_headings_and_footers() {
        let ds = dataset(&[
            ("Ann", Some("A"), None, "Ward1"),
            ("Bob", Some("B"), None, "Ward2"),
        ]);
        let records = filter::filter(&ds, &OrgFilter::All);
        let text = render(&to_document("R", &records, &display_columns(&ds), true));
        assert!(text.contains("Organization: Ward1\n"));
        assert!(text.contains("Records in Ward2: 1 (running total: 2)"));
    }

    #[test]
    fn stats_notes_rendered() {
        let ds = dataset(&[("Ann", Some("A"), Some("Yes"), "Ward1")]);
        let text = render(&stats_document(&ds));
        assert!(text.contains("Organization Distribution"));
        assert!(text.contains("User Activation Rate: 100.00%"));
    }

    #[test]
    fn long_values_truncated() {
        assert_eq!(truncate("abcdef", 4), "abc~");
        assert_eq!(truncate("abc", 4), "abc");
    }
}
