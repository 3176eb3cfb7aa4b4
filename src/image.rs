use std::sync::Arc;
use std::time::Instant;

use crate::canvas::Document;
use crate::compose::{Composer, MeasureMode, TextStyle};
use crate::content::CertificateContent;
use crate::error::ClearanceError;
use crate::font::FontRegistry;
use crate::raster;
use crate::text;
use crate::types::{Color, Shading, ShadingStop, Size};
use crate::{CertificateFormat, Renderer};

pub const IMAGE_SIDE: f32 = 1080.0;
pub const DEFAULT_IMAGE_CODE_LENGTH: usize = 12;

const GOLD: Color = Color::rgb8(0xC9, 0xA2, 0x27);
const GREEN: Color = Color::rgb8(0x4C, 0xAF, 0x50);
const GREY: Color = Color::rgb8(0x88, 0x88, 0x88);
const DARK_GREY: Color = Color::rgb8(0x55, 0x55, 0x55);
const NAVY_TOP: Color = Color::rgb8(0x1A, 0x1A, 0x2E);
const NAVY_BOTTOM: Color = Color::rgb8(0x16, 0x21, 0x3E);

const STAR: [(f32, f32); 10] = [
    (540.0, 85.0),
    (552.0, 115.0),
    (578.0, 115.0),
    (558.0, 135.0),
    (566.0, 160.0),
    (540.0, 145.0),
    (514.0, 160.0),
    (522.0, 135.0),
    (502.0, 115.0),
    (528.0, 115.0),
];

/// Square social-media card rendered to PNG.
#[derive(Debug, Clone)]
pub struct ImageRenderer {
    fonts: Arc<FontRegistry>,
    code_length: usize,
    attribution: String,
}

impl ImageRenderer {
    pub fn new(fonts: Arc<FontRegistry>) -> Self {
        Self {
            fonts,
            code_length: DEFAULT_IMAGE_CODE_LENGTH,
            attribution: crate::DEFAULT_ATTRIBUTION.to_string(),
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

    pub fn code_length(&self) -> usize {
        self.code_length
    }

    /// Lays the card out without rasterizing it.
    pub fn compose(&self, content: &CertificateContent) -> Document {
        let copy = content.locale().copy();
        let mut c = Composer::new(Size::square(IMAGE_SIDE), &self.fonts, MeasureMode::Shaped);
        let (w, h) = (c.width(), c.height());
        let cx = w / 2.0;

        c.shade_page(Shading::Axial {
            x0: 0.0,
            y0: 0.0,
            x1: 0.0,
            y1: h,
            stops: vec![
                ShadingStop {
                    offset: 0.0,
                    color: NAVY_TOP,
                },
                ShadingStop {
                    offset: 1.0,
                    color: NAVY_BOTTOM,
                },
            ],
        });

        c.stroke_rect(40.0, 40.0, w - 80.0, h - 80.0, 4.0, GOLD);
        c.stroke_rect(55.0, 55.0, w - 110.0, h - 110.0, 1.0, GOLD);
        for (sx, sy) in [(1.0, 1.0), (-1.0, 1.0), (1.0, -1.0), (-1.0, -1.0)] {
            let ax = if sx > 0.0 { 50.0 } else { w - 50.0 };
            let ay = if sy > 0.0 { 50.0 } else { h - 50.0 };
            c.polyline(
                &[(ax, ay + 30.0 * sy), (ax, ay), (ax + 30.0 * sx, ay)],
                false,
                3.0,
                GOLD,
            );
        }
        c.fill_polygon(&STAR, GOLD);

        c.centered_text(copy.header, 210.0, &TextStyle::bold(18.0, GOLD).spaced(3.0));
        let title = TextStyle::bold(48.0, Color::WHITE);
        c.centered_text(copy.image_title[0], 290.0, &title);
        c.centered_text(copy.image_title[1], 350.0, &title);
        c.line((200.0, 390.0), (w - 200.0, 390.0), 2.0, GOLD);
        c.centered_text(copy.image_subtitle, 430.0, &TextStyle::regular(16.0, GREY));

        let body = TextStyle::regular(20.0, Color::WHITE);
        c.centered_text(copy.image_confirmation, 500.0, &body);
        let name = text::unescape_markup(content.display_name());
        c.centered_text(
            &name,
            580.0,
            &TextStyle::bold(content.name_font_size() as f32, GOLD),
        );
        let [first, second] = copy.image_not_found(content.document_count_text());
        c.centered_text(&first, 650.0, &body);
        c.centered_text(&second, 680.0, &body);

        c.fill_circle(cx, 760.0, 40.0, GREEN);
        c.rounded(|c| {
            c.polyline(
                &[(522.0, 760.0), (535.0, 775.0), (560.0, 745.0)],
                false,
                6.0,
                Color::WHITE,
            );
        });
        c.centered_text(copy.verified_label, 840.0, &TextStyle::bold(24.0, GREEN));

        let caption = TextStyle::regular(14.0, GREY);
        c.centered_text(&copy.image_issued(content.issue_date_text()), 900.0, &caption);
        let code = content.verification_code().truncated(self.code_length);
        c.centered_text(&copy.image_code(code), 925.0, &caption);

        let footer = TextStyle::regular(11.0, DARK_GREY);
        c.centered_text(copy.image_disclaimer, 990.0, &footer);
        c.centered_text(&self.attribution, 1010.0, &footer);

        c.finish()
    }
}

impl Renderer for ImageRenderer {
    fn format(&self) -> CertificateFormat {
        CertificateFormat::Image
    }

    fn render(&self, content: &CertificateContent) -> Result<Vec<u8>, ClearanceError> {
        let started = Instant::now();
        let document = self.compose(content);
        let pages = raster::document_to_png_pages(&document, 72, &self.fonts)?;
        let png = pages
            .into_iter()
            .next()
            .ok_or_else(|| ClearanceError::Render("rasterizer produced no page".to_string()))?;
        tracing::debug!(
            bytes = png.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "rendered certificate image"
        );
        Ok(png)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::CertificateRequest;
    use crate::font::tests::test_registry;
    use crate::locale::Locale;
    use chrono::NaiveDate;

    fn content(name: &str, locale: Locale) -> CertificateContent {
        let day = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        CertificateContent::build(&CertificateRequest::new(name), day, locale).unwrap()
    }

    #[test]
    fn card_carries_every_text_line() {
        let fonts = test_registry();
        let content = content("Jane Doe", Locale::EnUs);
        let doc = ImageRenderer::new(fonts).compose(&content);
        let strings: Vec<&str> = doc.strings().collect();
        assert_eq!(strings.len(), 13);
        assert!(strings.contains(&"REPUBLIC OF SATIRE"));
        assert!(strings.contains(&"JANE DOE"));
        assert!(strings.contains(&"was not found in any of the 2,895"));
        assert!(strings.contains(&"Issued: January 15, 2026"));
        let code_line = format!("Code: {}", content.verification_code().truncated(12));
        assert!(strings.contains(&code_line.as_str()));
        assert!(strings.contains(&"epstein-certificate.com"));
    }

    #[test]
    fn escaped_names_are_drawn_as_characters() {
        let fonts = test_registry();
        let doc = ImageRenderer::new(fonts).compose(&content("Tom & Jerry", Locale::DeDe));
        let strings: Vec<&str> = doc.strings().collect();
        assert!(strings.contains(&"TOM & JERRY"));
        assert!(strings.contains(&"VERIFIZIERT CLEAN"));
    }

    #[test]
    fn code_length_is_configurable() {
        let fonts = test_registry();
        let content = content("Jane Doe", Locale::EnUs);
        let doc = ImageRenderer::new(fonts)
            .with_code_length(8)
            .compose(&content);
        let expected = format!("Code: {}", content.verification_code().truncated(8));
        assert!(doc.strings().any(|s| s == expected));
    }

    #[test]
    fn renders_square_png() {
        let fonts = test_registry();
        let png = ImageRenderer::new(fonts)
            .render(&content("Jane Doe", Locale::EnUs))
            .unwrap();
        let img = ::image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (1080, 1080));
        // Check badge center is green, background corner is navy.
        assert_eq!(img.get_pixel(540, 790).0, [0x4C, 0xAF, 0x50, 255]);
        let corner = img.get_pixel(10, 10).0;
        assert!(corner[2] > corner[0]);
    }
}
