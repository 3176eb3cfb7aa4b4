mod canvas;
mod compose;
mod content;
mod document;
mod error;
mod filename;
mod font;
mod image;
mod locale;
mod pdf;
mod raster;
mod text;
mod types;
mod verification;

pub use canvas::{Canvas, Command, Document, Page};
pub use content::{CertificateContent, CertificateRequest, DEFAULT_DOCUMENT_COUNT, MIN_NAME_CHARS};
pub use document::{DEFAULT_DOCUMENT_CODE_LENGTH, DEFAULT_SEAL_YEAR, DocumentRenderer};
pub use error::ClearanceError;
pub use filename::{FALLBACK_STEM, FILENAME_PREFIX, MAX_STEM_CHARS, sanitize, suggested_filename};
pub use font::{FONT_DIR_ENV, FontRegistry, FontSources, FontWeight};
pub use self::image::{DEFAULT_IMAGE_CODE_LENGTH, IMAGE_SIDE, ImageRenderer};
pub use locale::{CertificateCopy, Locale};
pub use text::{
    DISPLAY_NAME_MAX_CHARS, ELLIPSIS, LONG_NAME_FONT_SIZE, LONG_NAME_THRESHOLD,
    SHORT_NAME_FONT_SIZE, TRUNCATED_PREFIX_CHARS, escape_and_truncate, escape_markup,
    select_font_size,
};
pub use types::{Color, Pt, Shading, ShadingStop, Size};
pub use verification::{CODE_SALT, DIGEST_HEX_LEN, VerificationCode, generate};

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;

pub const DEFAULT_ATTRIBUTION: &str = "epstein-certificate.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CertificateFormat {
    /// Square PNG card.
    Image,
    /// Landscape A4 PDF.
    Document,
}

impl CertificateFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            CertificateFormat::Image => "image/png",
            CertificateFormat::Document => "application/pdf",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            CertificateFormat::Image => "png",
            CertificateFormat::Document => "pdf",
        }
    }
}

impl std::fmt::Display for CertificateFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            CertificateFormat::Image => "image",
            CertificateFormat::Document => "document",
        })
    }
}

/// A backend that turns one content value into the bytes of one format.
pub trait Renderer: Send + Sync {
    fn format(&self) -> CertificateFormat;
    fn render(&self, content: &CertificateContent) -> Result<Vec<u8>, ClearanceError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedCertificate {
    pub format: CertificateFormat,
    pub bytes: Vec<u8>,
    pub suggested_filename: String,
}

impl RenderedCertificate {
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }
}

/// Certificate engine: fonts are resolved once at build time, every render
/// after that is pure CPU work over a [`CertificateContent`].
#[derive(Debug, Clone)]
pub struct Clearance {
    locale: Locale,
    default_document_count: u64,
    image: ImageRenderer,
    document: DocumentRenderer,
}

#[derive(Debug, Clone)]
pub struct ClearanceBuilder {
    locale: Locale,
    fonts: FontSources,
    image_code_length: usize,
    document_code_length: usize,
    default_document_count: u64,
    attribution: String,
    seal_year: String,
}

impl Default for ClearanceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClearanceBuilder {
    pub fn new() -> Self {
        Self {
            locale: Locale::default(),
            fonts: FontSources::system_default(),
            image_code_length: DEFAULT_IMAGE_CODE_LENGTH,
            document_code_length: DEFAULT_DOCUMENT_CODE_LENGTH,
            default_document_count: DEFAULT_DOCUMENT_COUNT,
            attribution: DEFAULT_ATTRIBUTION.to_string(),
            seal_year: DEFAULT_SEAL_YEAR.to_string(),
        }
    }

    pub fn locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    pub fn regular_font_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.fonts.regular = Some(path.into());
        self
    }

    pub fn bold_font_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.fonts.bold = Some(path.into());
        self
    }

    pub fn register_font_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.fonts.dirs.push(path.into());
        self
    }

    /// Whether platform font directories are searched after the explicit sources.
    pub fn system_fonts(mut self, enabled: bool) -> Self {
        self.fonts.system = enabled;
        self
    }

    pub fn image_code_length(mut self, length: usize) -> Self {
        self.image_code_length = length;
        self
    }

    pub fn document_code_length(mut self, length: usize) -> Self {
        self.document_code_length = length;
        self
    }

    pub fn default_document_count(mut self, count: u64) -> Self {
        self.default_document_count = count;
        self
    }

    pub fn attribution(mut self, attribution: impl Into<String>) -> Self {
        self.attribution = attribution.into();
        self
    }

    pub fn seal_year(mut self, seal_year: impl Into<String>) -> Self {
        self.seal_year = seal_year.into();
        self
    }

    pub fn build(self) -> Result<Clearance, ClearanceError> {
        self.validate()?;
        let _span = tracing::info_span!("clearance_build", locale = %self.locale).entered();
        let fonts = if self.fonts.is_system_default() {
            FontRegistry::system()?
        } else {
            Arc::new(FontRegistry::load(&self.fonts)?)
        };
        Ok(Clearance::with_fonts(fonts, self))
    }

    /// Builds with an already loaded registry, skipping font discovery.
    pub fn build_with_fonts(self, fonts: Arc<FontRegistry>) -> Result<Clearance, ClearanceError> {
        self.validate()?;
        Ok(Clearance::with_fonts(fonts, self))
    }

    fn validate(&self) -> Result<(), ClearanceError> {
        for (label, length) in [
            ("image_code_length", self.image_code_length),
            ("document_code_length", self.document_code_length),
        ] {
            if !(1..=DIGEST_HEX_LEN).contains(&length) {
                return Err(ClearanceError::InvalidConfiguration(format!(
                    "{label} must be between 1 and {DIGEST_HEX_LEN}, got {length}"
                )));
            }
        }
        if self.attribution.trim().is_empty() {
            return Err(ClearanceError::InvalidConfiguration(
                "attribution must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Clearance {
    pub fn builder() -> ClearanceBuilder {
        ClearanceBuilder::new()
    }

    fn with_fonts(fonts: Arc<FontRegistry>, config: ClearanceBuilder) -> Self {
        let image = ImageRenderer::new(Arc::clone(&fonts))
            .with_code_length(config.image_code_length)
            .with_attribution(config.attribution.clone());
        let document = DocumentRenderer::new(fonts)
            .with_code_length(config.document_code_length)
            .with_attribution(config.attribution)
            .with_seal_year(config.seal_year);
        Self {
            locale: config.locale,
            default_document_count: config.default_document_count,
            image,
            document,
        }
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    pub fn default_document_count(&self) -> u64 {
        self.default_document_count
    }

    pub fn renderer(&self, format: CertificateFormat) -> &dyn Renderer {
        match format {
            CertificateFormat::Image => &self.image,
            CertificateFormat::Document => &self.document,
        }
    }

    pub fn build_content(
        &self,
        name: &str,
        document_count: Option<u64>,
        date: NaiveDate,
    ) -> Result<CertificateContent, ClearanceError> {
        let request = CertificateRequest::new(name)
            .with_document_count(document_count.unwrap_or(self.default_document_count));
        CertificateContent::build(&request, date, self.locale)
    }

    pub fn render_image(
        &self,
        name: &str,
        document_count: Option<u64>,
    ) -> Result<RenderedCertificate, ClearanceError> {
        self.render(CertificateFormat::Image, name, document_count, today())
    }

    pub fn render_document(
        &self,
        name: &str,
        document_count: Option<u64>,
    ) -> Result<RenderedCertificate, ClearanceError> {
        self.render(CertificateFormat::Document, name, document_count, today())
    }

    pub fn render_image_on(
        &self,
        name: &str,
        document_count: Option<u64>,
        date: NaiveDate,
    ) -> Result<RenderedCertificate, ClearanceError> {
        self.render(CertificateFormat::Image, name, document_count, date)
    }

    pub fn render_document_on(
        &self,
        name: &str,
        document_count: Option<u64>,
        date: NaiveDate,
    ) -> Result<RenderedCertificate, ClearanceError> {
        self.render(CertificateFormat::Document, name, document_count, date)
    }

    pub fn render(
        &self,
        format: CertificateFormat,
        name: &str,
        document_count: Option<u64>,
        date: NaiveDate,
    ) -> Result<RenderedCertificate, ClearanceError> {
        let content = self.build_content(name, document_count, date)?;
        self.render_content(format, &content)
    }

    /// Both formats from one content value, rendered in parallel.
    pub fn render_both(
        &self,
        name: &str,
        document_count: Option<u64>,
        date: NaiveDate,
    ) -> Result<(RenderedCertificate, RenderedCertificate), ClearanceError> {
        let content = self.build_content(name, document_count, date)?;
        let (image, document) = rayon::join(
            || self.render_content(CertificateFormat::Image, &content),
            || self.render_content(CertificateFormat::Document, &content),
        );
        Ok((image?, document?))
    }

    pub fn render_content(
        &self,
        format: CertificateFormat,
        content: &CertificateContent,
    ) -> Result<RenderedCertificate, ClearanceError> {
        let _span = tracing::debug_span!("render", %format, locale = %content.locale()).entered();
        let bytes = self.renderer(format).render(content)?;
        tracing::info!(bytes = bytes.len(), "certificate rendered");
        Ok(RenderedCertificate {
            format,
            bytes,
            suggested_filename: suggested_filename(
                content.sanitized_filename_stem(),
                format.extension(),
            ),
        })
    }
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::tests::test_registry;
    use rstest::rstest;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 15).unwrap()
    }

    #[rstest]
    #[case(CertificateFormat::Image, "image/png", "png")]
    #[case(CertificateFormat::Document, "application/pdf", "pdf")]
    fn formats_know_their_mime_and_extension(
        #[case] format: CertificateFormat,
        #[case] mime: &str,
        #[case] extension: &str,
    ) {
        assert_eq!(format.mime_type(), mime);
        assert_eq!(format.extension(), extension);
    }

    #[rstest]
    #[case(ClearanceBuilder::new().image_code_length(0))]
    #[case(ClearanceBuilder::new().document_code_length(65))]
    #[case(ClearanceBuilder::new().attribution("  "))]
    fn invalid_configuration_is_rejected_before_font_loading(#[case] builder: ClearanceBuilder) {
        let err = builder.system_fonts(false).build().unwrap_err();
        assert!(matches!(err, ClearanceError::InvalidConfiguration(_)));
    }

    #[test]
    fn missing_fonts_surface_as_render_error() {
        let err = ClearanceBuilder::new()
            .system_fonts(false)
            .register_font_dir("/nonexistent/clearance-fonts")
            .build()
            .unwrap_err();
        assert!(matches!(err, ClearanceError::Render(_)));
    }

    #[test]
    fn engine_uses_default_count_and_locale() {
        let fonts = test_registry();
        let engine = ClearanceBuilder::new()
            .locale(Locale::DeDe)
            .default_document_count(1234)
            .build_with_fonts(fonts)
            .unwrap();
        let content = engine.build_content("Jane Doe", None, day()).unwrap();
        assert_eq!(content.document_count_text(), "1.234");
        assert_eq!(content.issue_date_text(), "15. Januar 2026");
    }

    #[test]
    fn renderer_lookup_matches_format() {
        let fonts = test_registry();
        let engine = Clearance::builder().build_with_fonts(fonts).unwrap();
        for format in [CertificateFormat::Image, CertificateFormat::Document] {
            assert_eq!(engine.renderer(format).format(), format);
        }
    }

    #[test]
    fn short_names_fail_before_rendering() {
        let fonts = test_registry();
        let engine = Clearance::builder().build_with_fonts(fonts).unwrap();
        let err = engine.render_image_on(" A ", None, day()).unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn render_both_shares_filename_stem() {
        let fonts = test_registry();
        let engine = Clearance::builder().build_with_fonts(fonts).unwrap();
        let (image, document) = engine.render_both("Jöhn O'Brien", Some(10), day()).unwrap();
        assert_eq!(image.suggested_filename, "Unbedenklichkeitszertifikat_Jöhn_OBrien.png");
        assert_eq!(document.suggested_filename, "Unbedenklichkeitszertifikat_Jöhn_OBrien.pdf");
        assert_eq!(image.mime_type(), "image/png");
        assert!(document.bytes.starts_with(b"%PDF-"));
    }

    #[test]
    fn names_without_glyphs_fail_in_both_formats() {
        let fonts = test_registry();
        let engine = Clearance::builder().build_with_fonts(fonts).unwrap();
        for format in [CertificateFormat::Image, CertificateFormat::Document] {
            let err = engine.render(format, "中文名字", None, day()).unwrap_err();
            assert!(matches!(err, ClearanceError::Render(_)), "{format}");
            assert!(!err.is_client_error());
        }
        let (image, document) = engine.render_both("Łukasz Żółw", None, day()).unwrap();
        assert!(!image.bytes.is_empty());
        assert!(document.bytes.starts_with(b"%PDF-"));
    }
}
