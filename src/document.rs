use std::sync::Arc;
use std::time::Instant;

use crate::canvas::Document;
use crate::compose::{Align, Composer, MeasureMode, TextStyle};
use crate::content::CertificateContent;
use crate::error::ClearanceError;
use crate::font::FontRegistry;
use crate::pdf::{self, PdfInfo};
use crate::types::{Color, Size};
use crate::{CertificateFormat, Renderer};

pub const DEFAULT_DOCUMENT_CODE_LENGTH: usize = 16;
pub const DEFAULT_SEAL_YEAR: &str = "2026";

const GOLD: Color = Color::rgb8(0xC9, 0xA2, 0x27);
const INK: Color = Color::rgb8(0x1A, 0x1A, 0x2E);
const PAPER: Color = Color::rgb8(0xFD, 0xF8, 0xF0);
const GREEN: Color = Color::rgb8(0x4C, 0xAF, 0x50);
const CODE_GREY: Color = Color::rgb8(0x66, 0x66, 0x66);
const NOTE_GREY: Color = Color::rgb8(0x99, 0x99, 0x99);

const BORDER_MARGIN: f32 = 30.0;
const CORNER_SIZE: f32 = 20.0;
const NAME_SIZE: f32 = 36.0;
const NAME_MIN_SIZE: f32 = 14.0;
// Names that do not fit on one line at NAME_MIN_SIZE wrap onto two lines.
const WRAPPED_NAME_SIZE: f32 = 20.0;
const WRAPPED_NAME_MIN_SIZE: f32 = 4.0;
const NAME_TOP: f32 = 240.0;
const WRAPPED_NAME_TOP: f32 = 236.0;
const WATERMARK_ANGLE: f32 = 30.0;
const WATERMARK_OPACITY: f32 = 0.04;

/// Landscape A4 certificate rendered to PDF.
#[derive(Debug, Clone)]
pub struct DocumentRenderer {
    fonts: Arc<FontRegistry>,
    code_length: usize,
    attribution: String,
    seal_year: String,
}

impl DocumentRenderer {
    pub fn new(fonts: Arc<FontRegistry>) -> Self {
        Self {
            fonts,
            code_length: DEFAULT_DOCUMENT_CODE_LENGTH,
            attribution: crate::DEFAULT_ATTRIBUTION.to_string(),
            seal_year: DEFAULT_SEAL_YEAR.to_string(),
        }
    }

    pub fn with_code_length(mut self, code_length: usize) -> Self {
        self.code_length = code_length;
        self
    }

    pub fn with_attribution(mut self, attribution: impl Into<String>) -> Self {
        self.attribution = attribution.into();
        self
    }

    pub fn with_seal_year(mut self, seal_year: impl Into<String>) -> Self {
        self.seal_year = seal_year.into();
        self
    }

    pub fn code_length(&self) -> usize {
        self.code_length
    }

    /// Lays the page out without serializing it.
    pub fn compose(&self, content: &CertificateContent) -> Document {
        let copy = content.locale().copy();
        let mut c = Composer::new(Size::a4_landscape(), &self.fonts, MeasureMode::Unshaped);
        let (w, h) = (c.width(), c.height());

        c.fill_page(PAPER);
        let m = BORDER_MARGIN;
        c.stroke_rect(m, m, w - 2.0 * m, h - 2.0 * m, 3.0, GOLD);
        c.stroke_rect(m + 10.0, m + 10.0, w - 2.0 * m - 20.0, h - 2.0 * m - 20.0, 1.0, GOLD);
        let inset = m + 5.0;
        for (sx, sy) in [(1.0, 1.0), (-1.0, 1.0), (1.0, -1.0), (-1.0, -1.0)] {
            let ax = if sx > 0.0 { inset } else { w - inset };
            let ay = if sy > 0.0 { inset } else { h - inset };
            c.polyline(
                &[
                    (ax, ay + CORNER_SIZE * sy),
                    (ax, ay),
                    (ax + CORNER_SIZE * sx, ay),
                ],
                false,
                2.0,
                GOLD,
            );
        }

        let header = TextStyle::regular(16.0, INK);
        c.centered_text(copy.header, at_top(&c, 70.0, &header), &header);
        let title = TextStyle::bold(42.0, GOLD);
        c.centered_text(copy.document_title, at_top(&c, 100.0, &title), &title);
        let body = TextStyle::regular(14.0, INK);
        c.centered_text(copy.document_subtitle, at_top(&c, 155.0, &body), &body);
        c.line((150.0, 180.0), (w - 150.0, 180.0), 1.0, GOLD);
        c.centered_text(copy.document_confirmation, at_top(&c, 210.0, &body), &body);

        draw_name(&mut c, content.full_name(), w - 2.0 * (m + 30.0));

        let not_found = copy.document_not_found(content.document_count_text());
        let mut top = 290.0;
        for line in &not_found {
            c.centered_text(line, at_top(&c, top, &body), &body);
            top += 20.0;
        }
        let date_style = TextStyle::regular(12.0, INK);
        let date_top = if not_found.len() > 1 { 350.0 } else { 340.0 };
        c.centered_text(
            &copy.document_issued(content.issue_date_text()),
            at_top(&c, date_top, &date_style),
            &date_style,
        );

        let badge_y = date_top + 50.0;
        c.fill_circle(w / 2.0, badge_y, 16.0, GREEN);
        c.rounded(|c| {
            c.polyline(
                &[
                    (w / 2.0 - 7.0, badge_y),
                    (w / 2.0 - 2.0, badge_y + 6.0),
                    (w / 2.0 + 8.0, badge_y - 6.0),
                ],
                false,
                3.0,
                Color::WHITE,
            );
        });

        let (seal_x, seal_y) = (w - 150.0, h - 150.0);
        c.stroke_circle(seal_x, seal_y, 50.0, 2.0, GOLD);
        c.stroke_circle(seal_x, seal_y, 45.0, 1.0, GOLD);
        let seal_small = TextStyle::regular(8.0, GOLD);
        let seal_bold = TextStyle::bold(10.0, GOLD);
        for (text, offset, style) in [
            (copy.seal_caption, -20.0, &seal_small),
            (copy.seal_status, -5.0, &seal_bold),
            (self.seal_year.as_str(), 10.0, &seal_small),
        ] {
            let baseline = at_top(&c, seal_y + offset, style);
            c.text(text, seal_x, baseline, Align::Center, style);
        }

        let code = content.verification_code().truncated(self.code_length);
        let code_style = TextStyle::regular(10.0, CODE_GREY);
        c.centered_text(&copy.document_code(code), at_top(&c, h - 100.0, &code_style), &code_style);
        let note = TextStyle::regular(8.0, NOTE_GREY);
        c.centered_text(copy.document_disclaimers[0], at_top(&c, h - 80.0, &note), &note);
        c.centered_text(copy.document_disclaimers[1], at_top(&c, h - 68.0, &note), &note);

        let watermark = TextStyle::bold(50.0, Color::BLACK);
        let center = (w / 2.0, h / 2.0);
        c.rotated(WATERMARK_ANGLE, center, |c| {
            c.with_opacity(WATERMARK_OPACITY, |c| {
                let baseline = h / 2.0 + c.ascent(&watermark) / 2.0;
                c.centered_text(&self.attribution, baseline, &watermark);
            });
        });
        let stamp = TextStyle::bold(10.0, GOLD);
        c.with_opacity(0.5, |c| {
            let baseline = at_top(&*c, h - 55.0, &stamp);
            c.text(&self.attribution, w - 180.0, baseline, Align::Left, &stamp);
        });

        c.finish()
    }
}

fn draw_name(c: &mut Composer<'_>, name: &str, max_width: f32) {
    let style = TextStyle::bold(NAME_SIZE, INK);
    let size = c.fit_size(name, &style, max_width, NAME_MIN_SIZE);
    let single = TextStyle { size, ..style };
    if c.measure(name, &single) <= max_width {
        let baseline = at_top(c, NAME_TOP, &single);
        c.centered_text(name, baseline, &single);
        return;
    }

    let (first, second) = split_name(name);
    let wrapped = TextStyle::bold(WRAPPED_NAME_SIZE, INK);
    let size = [first, second]
        .iter()
        .map(|line| c.fit_size(line, &wrapped, max_width, WRAPPED_NAME_MIN_SIZE))
        .fold(WRAPPED_NAME_SIZE, f32::min);
    let wrapped = TextStyle { size, ..wrapped };
    tracing::debug!(size, "certificate name wrapped onto two lines");
    let mut top = WRAPPED_NAME_TOP;
    for line in [first, second] {
        let baseline = at_top(c, top, &wrapped);
        c.centered_text(line, baseline, &wrapped);
        top += size * 1.2;
    }
}

/// Splits at the whitespace nearest the middle, or mid-word when there is none.
fn split_name(name: &str) -> (&str, &str) {
    let chars: Vec<(usize, char)> = name.char_indices().collect();
    let middle = chars.len() / 2;
    let at = chars
        .iter()
        .enumerate()
        .filter(|(_, (_, ch))| ch.is_whitespace())
        .min_by_key(|(idx, _)| idx.abs_diff(middle))
        .map(|(_, (byte, _))| *byte)
        .or_else(|| chars.get(middle).map(|(byte, _)| *byte))
        .unwrap_or(name.len());
    let (first, second) = name.split_at(at);
    (first.trim_end(), second.trim_start())
}

// Layout positions are line tops; glyphs are placed by baseline.
fn at_top(c: &Composer<'_>, top: f32, style: &TextStyle) -> f32 {
    top + c.ascent(style)
}

impl Renderer for DocumentRenderer {
    fn format(&self) -> CertificateFormat {
        CertificateFormat::Document
    }

    fn render(&self, content: &CertificateContent) -> Result<Vec<u8>, ClearanceError> {
        let started = Instant::now();
        let document = self.compose(content);
        let copy = content.locale().copy();
        let info = PdfInfo {
            title: copy.document_title.to_string(),
            author: copy.header.to_string(),
            producer: format!("clearance {}", env!("CARGO_PKG_VERSION")),
        };
        let bytes = pdf::document_to_pdf(&document, &self.fonts, &info)?;
        tracing::debug!(
            bytes = bytes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "rendered certificate document"
        );
        Ok(bytes)
    }
}
