//! PDF rendering of report documents.
//!
//! Pages are US Letter in portrait. Each table section repeats its header
//! row at the top of every page it spans, body rows alternate fill colours,
//! and cell text is cut to fit its column. Uses the standard Helvetica
//! fonts so no font data is embedded.

use inviteboard_shared::{InviteBoardError, Result};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use tracing::debug;

use crate::document::{ReportDocument, Section};

const PAGE_WIDTH: i64 = 612;
const PAGE_HEIGHT: i64 = 792;
const MARGIN: i64 = 40;
const TABLE_WIDTH: i64 = PAGE_WIDTH - 2 * MARGIN;

const TITLE_SIZE: i64 = 16;
const HEADING_SIZE: i64 = 12;
const TEXT_SIZE: i64 = 10;
const CELL_SIZE: i64 = 8;

const LINE_HEIGHT: i64 = 16;
const ROW_HEIGHT: i64 = 14;
const CELL_PADDING: i64 = 3;

const REGULAR: &str = "F1";
const BOLD: &str = "F2";

type Rgb = (f32, f32, f32);

const HEADER_FILL: Rgb = (0.68, 0.85, 0.90);
const STRIPE_FILL: Rgb = (0.96, 0.96, 0.86);
const PLAIN_FILL: Rgb = (1.0, 1.0, 1.0);

/// Render `doc` to PDF bytes.
pub fn render(doc: &ReportDocument) -> Result<Vec<u8>> {
    let mut layout = Layout::new();

    layout.line(BOLD, TITLE_SIZE, &doc.title);
    layout.line(REGULAR, TEXT_SIZE, &doc.generated_line());
    layout.gap();

    for (i, section) in doc.sections.iter().enumerate() {
        if i > 0 && doc.break_between_sections {
            layout.new_page();
        }
        layout.table(section);
    }

    for note in &doc.notes {
        layout.line(BOLD, TEXT_SIZE, note);
    }
    layout.line(BOLD, TEXT_SIZE, &doc.total_line());

    let pages = layout.finish();
    debug!(pages = pages.len(), title = %doc.title, "rendering pdf");
    write_pdf(pages)
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

struct Layout {
    pages: Vec<Vec<Operation>>,
    ops: Vec<Operation>,
    /// Baseline of the next line, in points from the bottom of the page.
    y: i64,
}

impl Layout {
    fn new() -> Self {
        Self {
            pages: Vec::new(),
            ops: Vec::new(),
            y: PAGE_HEIGHT - MARGIN,
        }
    }

    fn new_page(&mut self) {
        let ops = std::mem::take(&mut self.ops);
        self.pages.push(ops);
        self.y = PAGE_HEIGHT - MARGIN;
    }

    fn fits(&self, height: i64) -> bool {
        self.y - height >= MARGIN + LINE_HEIGHT
    }

    fn ensure(&mut self, height: i64) {
        if !self.fits(height) {
            self.new_page();
        }
    }

    fn gap(&mut self) {
        self.y -= LINE_HEIGHT / 2;
    }

    fn line(&mut self, font: &str, size: i64, text: &str) {
        self.ensure(LINE_HEIGHT);
        self.y -= size.max(LINE_HEIGHT);
        self.text(MARGIN, self.y, font, size, text);
    }

    fn text(&mut self, x: i64, y: i64, font: &str, size: i64, text: &str) {
        self.ops.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(font.as_bytes().to_vec()), size.into()]),
            Operation::new("Td", vec![x.into(), y.into()]),
            Operation::new("Tj", vec![Object::string_literal(win_ansi(text))]),
            Operation::new("ET", vec![]),
        ]);
    }

    fn fill_rect(&mut self, x: i64, y: i64, w: i64, h: i64, (r, g, b): Rgb) {
        self.ops.extend([
            Operation::new("q", vec![]),
            Operation::new("rg", vec![r.into(), g.into(), b.into()]),
            Operation::new("re", vec![x.into(), y.into(), w.into(), h.into()]),
            Operation::new("f", vec![]),
            Operation::new("Q", vec![]),
        ]);
    }

    fn row(&mut self, cells: &[String], widths: &[i64], font: &str, fill: Rgb) {
        let bottom = self.y - ROW_HEIGHT;
        self.fill_rect(MARGIN, bottom, TABLE_WIDTH, ROW_HEIGHT, fill);

        let mut x = MARGIN;
        for (i, width) in widths.iter().enumerate() {
            let cell = cells.get(i).map(String::as_str).unwrap_or("");
            let fitted = fit(cell, *width - 2 * CELL_PADDING, CELL_SIZE);
            self.text(x + CELL_PADDING, bottom + 4, font, CELL_SIZE, &fitted);
            x += width;
        }
        self.y = bottom;
    }

    fn table(&mut self, section: &Section) {
        let widths = column_widths(section.columns.len());

        // Heading, header row and at least one body row stay together.
        self.ensure(LINE_HEIGHT + 2 * ROW_HEIGHT);
        if let Some(heading) = &section.heading {
            self.line(BOLD, HEADING_SIZE, heading);
            self.y -= 4;
        }
        self.row(&section.columns, &widths, BOLD, HEADER_FILL);

        for (i, cells) in section.rows.iter().enumerate() {
            if !self.fits(ROW_HEIGHT) {
                self.new_page();
                self.row(&section.columns, &widths, BOLD, HEADER_FILL);
            }
            let fill = if i % 2 == 0 { STRIPE_FILL } else { PLAIN_FILL };
            self.row(cells, &widths, REGULAR, fill);
        }

        if let Some(footer) = &section.footer {
            self.line(REGULAR, TEXT_SIZE, footer);
        }
        self.gap();
    }

    /// Close the last page and stamp page numbers.
    fn finish(mut self) -> Vec<Vec<Operation>> {
        self.new_page();
        let count = self.pages.len();
        let mut pages = std::mem::take(&mut self.pages);
        for (i, ops) in pages.iter_mut().enumerate() {
            let label = format!("Page {} of {count}", i + 1);
            let mut footer = Layout::new();
            footer.text(PAGE_WIDTH - MARGIN - 60, MARGIN / 2, REGULAR, CELL_SIZE, &label);
            ops.append(&mut footer.ops);
        }
        pages
    }
}

fn column_widths(columns: usize) -> Vec<i64> {
    let n = columns.max(1) as i64;
    let base = TABLE_WIDTH / n;
    let mut widths = vec![base; columns];
    if let Some(last) = widths.last_mut() {
        *last += TABLE_WIDTH - base * n;
    }
    widths
}

/// Cut `text` to roughly fit `width` points at `size`. Helvetica averages
/// about half an em per glyph.
fn fit(text: &str, width: i64, size: i64) -> String {
    let max_chars = (width * 2 / size).max(1) as usize;
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}

/// Latin-1 bytes for the standard fonts; other characters become `?`.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

// ---------------------------------------------------------------------------
// Document assembly
// ---------------------------------------------------------------------------

fn render_err(e: impl std::fmt::Display) -> InviteBoardError {
    InviteBoardError::Render(e.to_string())
}

fn font(base: &str) -> lopdf::Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => base,
        "Encoding" => "WinAnsiEncoding",
    }
}

fn write_pdf(pages: Vec<Vec<Operation>>) -> Result<Vec<u8>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(font("Helvetica"));
    let bold_id = doc.add_object(font("Helvetica-Bold"));
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            REGULAR => regular_id,
            BOLD => bold_id,
        },
    });

    let mut kids = Vec::with_capacity(pages.len());
    for operations in pages {
        let content = Content { operations };
        let bytes = content.encode().map_err(render_err)?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, bytes));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::from(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut out = Vec::new();
    doc.save_to(&mut out).map_err(render_err)?;
    Ok(out)
}
