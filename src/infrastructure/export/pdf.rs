// PDF renderer - Paginated A4 report with overview lines and breakdown tables
use super::ExportError;
use crate::domain::report::{breakdown_value, display_value, ReportDocument};
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument};

// Geometry in millimetres, measured from the top edge of the page.
pub const PAGE_WIDTH: f32 = 210.0;
pub const PAGE_HEIGHT: f32 = 297.0;
pub const MARGIN_X: f32 = 14.0;
pub const TOP_MARGIN: f32 = 20.0;
pub const PRINTABLE_BOTTOM: f32 = 280.0;
pub const LINE_HEIGHT: f32 = 10.0;
pub const ROW_HEIGHT: f32 = 8.0;
const SECTION_GAP: f32 = 10.0;
const VALUE_COLUMN_X: f32 = 110.0;

const TITLE_SIZE: f32 = 18.0;
const HEADING_SIZE: f32 = 14.0;
const BODY_SIZE: f32 = 12.0;
const TABLE_SIZE: f32 = 10.0;
const SMALL_SIZE: f32 = 10.0;

const MAX_ITEM_CHARS: usize = 52;
const MAX_VALUE_CHARS: usize = 48;

/// A positioned run of text; `y` is the baseline distance from the top edge.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub bold: bool,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageLayout {
    pub runs: Vec<TextRun>,
}

/// Running vertical cursor over a growing list of pages.
struct Cursor {
    pages: Vec<PageLayout>,
    y: f32,
}

impl Cursor {
    fn new() -> Self {
        Self {
            pages: vec![PageLayout::default()],
            y: TOP_MARGIN,
        }
    }

    /// Starts a new page when `height` more would cross the printable bottom.
    fn ensure(&mut self, height: f32) -> bool {
        if self.y + height > PRINTABLE_BOTTOM {
            self.pages.push(PageLayout::default());
            self.y = TOP_MARGIN;
            return true;
        }
        false
    }

    fn text(&mut self, x: f32, size: f32, bold: bool, text: String) {
        if let Some(page) = self.pages.last_mut() {
            page.runs.push(TextRun {
                x,
                y: self.y,
                size,
                bold,
                text,
            });
        }
    }

    fn table_header(&mut self) {
        self.text(MARGIN_X, TABLE_SIZE, true, "Item".to_string());
        self.text(VALUE_COLUMN_X, TABLE_SIZE, true, "Value".to_string());
        self.y += ROW_HEIGHT;
    }
}

/// Pure page layout of a report; the PDF writer only draws what this returns.
pub fn layout(doc: &ReportDocument) -> Vec<PageLayout> {
    let mut cursor = Cursor::new();

    cursor.text(MARGIN_X, TITLE_SIZE, true, doc.metadata.title.clone());
    cursor.y += LINE_HEIGHT;
    cursor.text(
        MARGIN_X,
        SMALL_SIZE,
        false,
        format!(
            "Generated on: {}",
            doc.metadata.generated_at.format("%Y-%m-%d %H:%M UTC")
        ),
    );
    cursor.y += LINE_HEIGHT + SECTION_GAP;

    if !doc.overview.is_empty() {
        cursor.ensure(2.0 * LINE_HEIGHT);
        cursor.text(MARGIN_X, HEADING_SIZE, true, "Overview".to_string());
        cursor.y += LINE_HEIGHT;
        for (label, value) in &doc.overview {
            cursor.ensure(LINE_HEIGHT);
            cursor.text(
                MARGIN_X,
                BODY_SIZE,
                false,
                format!("{}: {}", label, display_value(value)),
            );
            cursor.y += LINE_HEIGHT;
        }
        cursor.y += SECTION_GAP;
    }

    for (category, entries) in &doc.breakdown {
        // Heading, header row and first body row stay together.
        cursor.ensure(LINE_HEIGHT + 2.0 * ROW_HEIGHT);
        cursor.text(MARGIN_X, HEADING_SIZE, true, category.clone());
        cursor.y += LINE_HEIGHT;
        cursor.table_header();

        for (item, entry) in entries {
            if cursor.ensure(ROW_HEIGHT) {
                cursor.table_header();
            }
            cursor.text(MARGIN_X, TABLE_SIZE, false, clip(item, MAX_ITEM_CHARS));
            cursor.text(
                VALUE_COLUMN_X,
                TABLE_SIZE,
                false,
                clip(&display_value(breakdown_value(entry)), MAX_VALUE_CHARS),
            );
            cursor.y += ROW_HEIGHT;
        }
        cursor.y += SECTION_GAP;
    }

    cursor.pages
}

pub fn render(doc: &ReportDocument) -> Result<Vec<u8>, ExportError> {
    let pages = layout(doc);

    let (pdf, first_page, first_layer) = PdfDocument::new(
        doc.metadata.title.as_str(),
        Mm(PAGE_WIDTH),
        Mm(PAGE_HEIGHT),
        "Layer 1",
    );
    let regular = pdf
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| ExportError::Pdf(e.to_string()))?;
    let bold = pdf
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| ExportError::Pdf(e.to_string()))?;

    for (index, page) in pages.iter().enumerate() {
        let (page_index, layer_index) = if index == 0 {
            (first_page, first_layer)
        } else {
            pdf.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1")
        };
        let layer = pdf.get_page(page_index).get_layer(layer_index);

        for run in &page.runs {
            let font: &IndirectFontRef = if run.bold { &bold } else { &regular };
            layer.use_text(
                run.text.as_str(),
                run.size,
                Mm(run.x),
                Mm(PAGE_HEIGHT - run.y),
                font,
            );
        }
    }

    pdf.save_to_bytes().map_err(|e| ExportError::Pdf(e.to_string()))
}

fn clip(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    clipped.push_str("...");
    clipped
}
