use anyhow::{Context, Result};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

use crate::logic::quote::{QuoteDocument, QuoteRow};

const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;

/// Column x offsets as fractions of the printable width
const COLUMNS: [(&str, f32); 4] = [
    ("Description", 0.0),
    ("Details", 0.28),
    ("Quantity", 0.68),
    ("Total", 0.82),
];

/// Helvetica only covers WinAnsi; anything outside Latin-1 becomes '?'
fn encode_text(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| if (c as u32) < 256 { c as u8 } else { b'?' })
        .collect()
}

/// Greedy word wrap on an average glyph width of half the font size
fn wrap(text: &str, width: f32, font_size: f32) -> Vec<String> {
    let max_chars = ((width / (font_size * 0.5)) as usize).max(8);
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > max_chars {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

struct PageWriter {
    font_size: f32,
    margin: f32,
    pages: Vec<Vec<Operation>>,
    y: f32,
}

impl PageWriter {
    fn new(font_size: f32, margin: f32) -> Self {
        Self {
            font_size,
            margin,
            pages: Vec::new(),
            y: 0.0,
        }
    }

    fn leading(&self) -> f32 {
        self.font_size * 1.4
    }

    fn printable_width(&self) -> f32 {
        PAGE_WIDTH - 2.0 * self.margin
    }

    fn column_x(&self, index: usize) -> f32 {
        self.margin + COLUMNS[index].1 * self.printable_width()
    }

    fn column_width(&self, index: usize) -> f32 {
        let next = COLUMNS.get(index + 1).map_or(1.0, |c| c.1);
        (next - COLUMNS[index].1) * self.printable_width() - 6.0
    }

    fn ops(&mut self) -> &mut Vec<Operation> {
        if self.pages.is_empty() {
            self.pages.push(Vec::new());
        }
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    fn text(&mut self, font: &str, size: f32, x: f32, y: f32, text: &str) {
        let ops = self.ops();
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new("Tf", vec![font.into(), size.into()]));
        ops.push(Operation::new("Td", vec![x.into(), y.into()]));
        ops.push(Operation::new(
            "Tj",
            vec![Object::string_literal(encode_text(text))],
        ));
        ops.push(Operation::new("ET", vec![]));
    }

    fn rule(&mut self, y: f32) {
        let (from, to) = (self.margin, PAGE_WIDTH - self.margin);
        let ops = self.ops();
        ops.push(Operation::new("w", vec![0.5_f32.into()]));
        ops.push(Operation::new("m", vec![from.into(), y.into()]));
        ops.push(Operation::new("l", vec![to.into(), y.into()]));
        ops.push(Operation::new("S", vec![]));
    }

    fn column_headers(&mut self) {
        for (index, (title, _)) in COLUMNS.iter().enumerate() {
            let x = self.column_x(index);
            self.text("F2", self.font_size, x, self.y, title);
        }
        self.y -= self.font_size * 0.6;
        self.rule(self.y);
        self.y -= self.leading();
    }

    fn start_page(&mut self) {
        self.pages.push(Vec::new());
        self.y = PAGE_HEIGHT - self.margin;
        self.column_headers();
    }

    fn row(&mut self, row: &QuoteRow) {
        let cells = [
            wrap(&row.description, self.column_width(0), self.font_size),
            row.details
                .iter()
                .flat_map(|d| wrap(d, self.column_width(1), self.font_size))
                .collect(),
            vec![row.quantity.clone()],
            vec![row.total.clone()],
        ];
        let line_count = cells.iter().map(Vec::len).max().unwrap_or(1);
        // Keep a row on one page when a fresh page can hold it
        let height = line_count as f32 * self.leading();
        if self.y - height < self.margin && height <= self.page_capacity() {
            self.start_page();
        }
        for line in 0..line_count {
            if self.y - self.leading() < self.margin {
                self.start_page();
            }
            for (index, lines) in cells.iter().enumerate() {
                if let Some(text) = lines.get(line) {
                    let x = self.column_x(index);
                    self.text("F1", self.font_size, x, self.y, text);
                }
            }
            self.y -= self.leading();
        }
        self.y -= self.font_size * 0.4;
    }

    /// Room for rows on a page below the column headers
    fn page_capacity(&self) -> f32 {
        PAGE_HEIGHT - 2.0 * self.margin - self.font_size * 0.6 - self.leading()
    }
}

/// Render the quote as a paginated A4 PDF
pub fn render_pdf(quote: &QuoteDocument) -> Result<Vec<u8>> {
    let style = &quote.style;
    let mut writer = PageWriter::new(style.font_size, style.margin);

    // Title block on the first page only
    writer.pages.push(Vec::new());
    writer.y = PAGE_HEIGHT - style.margin;
    writer.text("F2", style.font_size * 1.8, style.margin, writer.y, &style.agency_name);
    writer.y -= style.font_size * 2.4;
    writer.text("F1", style.font_size * 1.3, style.margin, writer.y, &style.title);
    writer.y -= writer.leading();
    writer.text(
        "F1",
        style.font_size,
        style.margin,
        writer.y,
        &format!("Issued {}", quote.issued_on.format("%Y-%m-%d")),
    );
    writer.y -= writer.leading() * 2.0;
    writer.column_headers();

    for row in &quote.rows {
        writer.row(row);
    }

    if writer.y - writer.leading() * 2.0 < style.margin {
        writer.start_page();
    }
    writer.rule(writer.y + writer.font_size);
    let total_x = writer.column_x(2);
    let y = writer.y - writer.font_size * 0.5;
    writer.text("F2", style.font_size * 1.2, total_x, y, &format!("Total  {}", quote.total));

    assemble(writer.pages)
}

fn assemble(pages: Vec<Vec<Operation>>) -> Result<Vec<u8>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular_id,
            "F2" => bold_id,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for operations in pages {
        let content = Content { operations }
            .encode()
            .context("Failed to encode quote page")?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id: ObjectId = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
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

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .context("Failed to write quote PDF")?;
    Ok(bytes)
}
