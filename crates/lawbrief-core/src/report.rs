//! PDF rendering for summaries and full analysis reports.

use std::io::Write;

use anyhow::{Context, Result};
use flate2::{write::ZlibEncoder, Compression};
use lopdf::{
    content::{Content, Operation},
    dictionary, Document, Object, ObjectId, Stream, StringFormat,
};

use crate::chart::{clause_chart, obligation_chart, risk_level_chart, BarChart};
use crate::types::{Detections, RegulatoryUpdate, RiskFinding};

// A4 in points.
const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 50.0;
const BODY_SIZE: f32 = 11.0;
const HEADING_SIZE: f32 = 13.0;
const TITLE_SIZE: f32 = 16.0;
/// Average Helvetica glyph width as a fraction of the font size.
const AVG_GLYPH_WIDTH: f32 = 0.5;

/// Everything that goes into the full report.
#[derive(Debug, Clone, Copy)]
pub struct ReportInput<'a> {
    pub summary: &'a str,
    pub clauses: &'a Detections,
    pub obligations: &'a Detections,
    pub risks: &'a [RiskFinding],
    pub risk_score: u32,
    pub updates: &'a [RegulatoryUpdate],
}

/// One-section PDF with just the summary text.
pub fn summary_pdf(summary: &str) -> Result<Vec<u8>> {
    let mut w = PdfWriter::new();
    w.title("Document Summary");
    w.paragraph(summary, BODY_SIZE);
    w.finish()
}

/// Full report: summary, detections, risks, regulatory updates and charts.
pub fn build_report(input: &ReportInput<'_>) -> Result<Vec<u8>> {
    let mut w = PdfWriter::new();
    w.title("Legal Document Report");

    w.heading("Summary:");
    w.paragraph(input.summary, BODY_SIZE);

    w.heading("Detected Key Clauses:");
    write_detections(&mut w, input.clauses, "No key clauses detected in the document.");

    w.heading("Hidden Obligations:");
    write_detections(&mut w, input.obligations, "No hidden obligations detected in the document.");

    w.heading("Risk Analysis:");
    w.paragraph(&format!("Overall Risk Score: {}", input.risk_score), BODY_SIZE);
    if input.risks.is_empty() {
        w.paragraph("No risks detected.", BODY_SIZE);
    }
    for risk in input.risks {
        w.paragraph(
            &format!("{} ({}): {}", risk.phrase, risk.level, risk.explanation),
            BODY_SIZE,
        );
    }

    w.heading("Regulatory Updates:");
    if input.updates.is_empty() {
        w.paragraph("No regulatory updates fetched.", BODY_SIZE);
    }
    for update in input.updates {
        w.paragraph(&format!("{}: {}", update.title, update.link), BODY_SIZE);
    }

    for chart in [
        clause_chart(input.clauses),
        obligation_chart(input.obligations),
        risk_level_chart(input.risks),
    ] {
        write_chart(&mut w, &chart)?;
    }

    w.finish()
}

fn write_detections(w: &mut PdfWriter, detections: &Detections, empty: &str) {
    if detections.is_empty() {
        w.paragraph(empty, BODY_SIZE);
        return;
    }
    for (name, matches) in detections {
        let joined = matches.iter().map(String::as_str).collect::<Vec<_>>().join(", ");
        w.paragraph(&format!("{name}: {joined}"), BODY_SIZE);
    }
}

fn write_chart(w: &mut PdfWriter, chart: &BarChart) -> Result<()> {
    let png = chart.render_png()?;
    w.heading(&chart.title);
    w.image_png(&png)?;
    w.paragraph(&chart.legend(), BODY_SIZE);
    Ok(())
}

/// Latin-1 bytes for a WinAnsi-encoded Type1 font; anything else becomes `?`.
pub(crate) fn to_latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\t' => b' ',
            c if (c as u32) < 0x20 => b' ',
            c if (c as u32) <= 0xFF => c as u32 as u8,
            _ => b'?',
        })
        .collect()
}

/// Greedy word wrap by estimated glyph width.
pub(crate) fn wrap_line(line: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in line.split_whitespace() {
        let mut word = word.to_string();
        // Hard-split words that can never fit.
        while word.chars().count() > max_chars {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let head: String = word.chars().take(max_chars).collect();
            word = word.chars().skip(max_chars).collect();
            lines.push(head);
        }
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

struct PdfWriter {
    doc: Document,
    pages_id: ObjectId,
    regular_font: ObjectId,
    bold_font: ObjectId,
    page_ids: Vec<ObjectId>,
    ops: Vec<Operation>,
    images: Vec<(String, ObjectId)>,
    image_seq: usize,
    y: f32,
}

impl PdfWriter {
    fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let regular_font = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let bold_font = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica-Bold",
            "Encoding" => "WinAnsiEncoding",
        });
        Self {
            doc,
            pages_id,
            regular_font,
            bold_font,
            page_ids: Vec::new(),
            ops: Vec::new(),
            images: Vec::new(),
            image_seq: 0,
            y: PAGE_HEIGHT - MARGIN,
        }
    }

    fn ensure_space(&mut self, needed: f32) {
        if self.y - needed < MARGIN {
            self.flush_page();
        }
    }

    fn text_line(&mut self, font: &str, size: f32, text: &str) {
        let leading = size * 1.4;
        self.ensure_space(leading);
        self.y -= leading;
        self.ops.push(Operation::new("BT", vec![]));
        self.ops
            .push(Operation::new("Tf", vec![Object::Name(font.as_bytes().to_vec()), size.into()]));
        self.ops.push(Operation::new("Td", vec![MARGIN.into(), self.y.into()]));
        self.ops.push(Operation::new(
            "Tj",
            vec![Object::String(to_latin1(text), StringFormat::Literal)],
        ));
        self.ops.push(Operation::new("ET", vec![]));
    }

    fn title(&mut self, text: &str) {
        let leading = TITLE_SIZE * 1.4;
        self.ensure_space(leading);
        self.y -= leading;
        let width = text.chars().count() as f32 * TITLE_SIZE * AVG_GLYPH_WIDTH;
        let x = ((PAGE_WIDTH - width) / 2.0).max(MARGIN);
        self.ops.push(Operation::new("BT", vec![]));
        self.ops
            .push(Operation::new("Tf", vec![Object::Name(b"F2".to_vec()), TITLE_SIZE.into()]));
        self.ops.push(Operation::new("Td", vec![x.into(), self.y.into()]));
        self.ops.push(Operation::new(
            "Tj",
            vec![Object::String(to_latin1(text), StringFormat::Literal)],
        ));
        self.ops.push(Operation::new("ET", vec![]));
        self.y -= TITLE_SIZE * 0.6;
    }

    fn heading(&mut self, text: &str) {
        self.y -= HEADING_SIZE * 0.4;
        self.text_line("F2", HEADING_SIZE, text);
    }

    fn paragraph(&mut self, text: &str, size: f32) {
        let usable = PAGE_WIDTH - 2.0 * MARGIN;
        let max_chars = (usable / (size * AVG_GLYPH_WIDTH)) as usize;
        for raw in text.lines() {
            for line in wrap_line(raw, max_chars) {
                self.text_line("F1", size, &line);
            }
        }
    }

    fn image_png(&mut self, png: &[u8]) -> Result<()> {
        let rgb = image::load_from_memory(png)
            .context("decoding chart image")?
            .to_rgb8();
        let (px_w, px_h) = rgb.dimensions();
        let usable = PAGE_WIDTH - 2.0 * MARGIN;
        let draw_w = usable.min(px_w as f32);
        let draw_h = px_h as f32 * draw_w / px_w.max(1) as f32;

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(rgb.as_raw())?;
        let compressed = encoder.finish()?;
        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => px_w as i64,
                "Height" => px_h as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8i64,
                "Filter" => "FlateDecode",
            },
            compressed,
        );
        let image_id = self.doc.add_object(stream);

        self.ensure_space(draw_h + 6.0);
        self.y -= draw_h + 6.0;
        self.image_seq += 1;
        let name = format!("Im{}", self.image_seq);
        self.ops.push(Operation::new("q", vec![]));
        self.ops.push(Operation::new(
            "cm",
            vec![
                draw_w.into(),
                0.0f32.into(),
                0.0f32.into(),
                draw_h.into(),
                MARGIN.into(),
                self.y.into(),
            ],
        ));
        self.ops
            .push(Operation::new("Do", vec![Object::Name(name.as_bytes().to_vec())]));
        self.ops.push(Operation::new("Q", vec![]));
        self.images.push((name, image_id));
        Ok(())
    }

    fn flush_page(&mut self) {
        let content = Content {
            operations: std::mem::take(&mut self.ops),
        };
        // Encoding only fails on unencodable operands, which this writer never emits.
        let bytes = content.encode().unwrap_or_default();
        let content_id = self.doc.add_object(Stream::new(lopdf::Dictionary::new(), bytes));

        let mut xobjects = lopdf::Dictionary::new();
        for (name, id) in self.images.drain(..) {
            xobjects.set(name, Object::Reference(id));
        }

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.0f32.into(), 0.0f32.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! {
                    "F1" => self.regular_font,
                    "F2" => self.bold_font,
                },
                "XObject" => xobjects,
            },
        });
        self.page_ids.push(page_id);
        self.y = PAGE_HEIGHT - MARGIN;
    }

    fn finish(mut self) -> Result<Vec<u8>> {
        if !self.ops.is_empty() || self.page_ids.is_empty() {
            self.flush_page();
        }

        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => self.page_ids.iter().map(|id| Object::Reference(*id)).collect::<Vec<_>>(),
            "Count" => self.page_ids.len() as i64,
        };
        self.doc.objects.insert(self.pages_id, Object::Dictionary(pages));
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        self.doc.save_to(&mut buffer).context("writing PDF")?;
        Ok(buffer)
    }
}
