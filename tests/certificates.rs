use std::sync::{Arc, OnceLock};

use chrono::NaiveDate;
use clearance::{
    CertificateFormat, CertificateContent, CertificateRequest, Clearance, ClearanceError,
    DocumentRenderer, FontRegistry, ImageRenderer, Locale, Renderer, sanitize,
};
use rstest::rstest;

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
const SIZE_CEILING: usize = 8 * 1024 * 1024;

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, 15).unwrap()
}

fn fonts() -> Arc<FontRegistry> {
    static FONTS: OnceLock<Arc<FontRegistry>> = OnceLock::new();
    FONTS
        .get_or_init(|| {
            let regular = include_bytes!("fixtures/fonts/DejaVuSans.ttf").to_vec();
            let bold = include_bytes!("fixtures/fonts/DejaVuSans-Bold.ttf").to_vec();
            Arc::new(FontRegistry::from_bytes(regular, Some(bold)).unwrap())
        })
        .clone()
}

fn engine(locale: Locale) -> Clearance {
    Clearance::builder()
        .locale(locale)
        .build_with_fonts(fonts())
        .unwrap()
}

fn pdf_text(bytes: &[u8]) -> String {
    let doc = lopdf::Document::load_mem(bytes).unwrap();
    let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
    doc.extract_text(&pages).unwrap()
}

#[test]
fn image_is_a_bounded_square_png() {
    let engine = engine(Locale::EnUs);
    let rendered = engine.render_image_on("Jane Doe", Some(2895), day()).unwrap();
    assert!(rendered.bytes.starts_with(PNG_SIGNATURE));
    assert!(rendered.bytes.len() < SIZE_CEILING);
    assert_eq!(rendered.mime_type(), "image/png");
    let img = image::load_from_memory(&rendered.bytes).unwrap();
    assert_eq!((img.width(), img.height()), (1080, 1080));
}

#[test]
fn document_is_a_single_landscape_page() {
    let engine = engine(Locale::EnUs);
    let rendered = engine.render_document_on("Jane Doe", Some(2895), day()).unwrap();
    assert!(rendered.bytes.starts_with(b"%PDF"));
    assert_eq!(rendered.mime_type(), "application/pdf");
    let doc = lopdf::Document::load_mem(&rendered.bytes).unwrap();
    let pages = doc.get_pages();
    assert_eq!(pages.len(), 1);
    let page = doc.get_dictionary(*pages.values().next().unwrap()).unwrap();
    let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
    let width = media_box[2].as_float().unwrap();
    let height = media_box[3].as_float().unwrap();
    assert!(width > height);
    assert!((width - 841.89).abs() < 0.01);
}

#[test]
fn both_formats_share_digest_date_and_count() {
    let fonts = fonts();
    let engine = Clearance::builder()
        .locale(Locale::EnUs)
        .build_with_fonts(fonts.clone())
        .unwrap();
    let content = engine.build_content("Jane Doe", Some(12345), day()).unwrap();
    let code = content.verification_code();

    let card = ImageRenderer::new(fonts.clone()).compose(&content);
    let card_strings: Vec<&str> = card.strings().collect();
    assert!(card_strings.contains(&format!("Code: {}", code.truncated(12)).as_str()));
    assert!(card_strings.contains(&"Issued: January 15, 2026"));
    assert!(card_strings.contains(&"was not found in any of the 12,345"));

    let pdf = DocumentRenderer::new(fonts).render(&content).unwrap();
    let pdf_text = pdf_text(&pdf);
    let long_code = format!("Verification Code: {}", code.truncated(16));
    assert!(pdf_text.contains(&long_code));
    assert!(pdf_text.contains("Issued on: January 15, 2026"));
    assert!(pdf_text.contains("12,345 searched Epstein documents"));
    assert!(code.truncated(16).starts_with(code.truncated(12)));
}

#[test]
fn german_document_embeds_localized_date() {
    let engine = engine(Locale::DeDe);
    let rendered = engine.render_document_on("Jürgen Müller", None, day()).unwrap();
    let text = pdf_text(&rendered.bytes);
    assert!(text.contains("Ausgestellt am: 15. Januar 2026"));
    assert!(text.contains("JÜRGEN MÜLLER"));
    assert_eq!(
        rendered.suggested_filename,
        "Unbedenklichkeitszertifikat_Jürgen_Müller.pdf"
    );
}

#[rstest]
#[case(CertificateFormat::Image)]
#[case(CertificateFormat::Document)]
fn single_character_names_are_invalid_input(#[case] format: CertificateFormat) {
    let engine = engine(Locale::EnUs);
    let err = engine.render(format, "  A  ", None, day()).unwrap_err();
    assert!(matches!(err, ClearanceError::InvalidInput(_)));
    assert!(err.is_client_error());
}

#[rstest]
#[case("")]
#[case("   ")]
#[case(" Z ")]
fn short_names_are_rejected_without_fonts(#[case] name: &str) {
    let err = CertificateContent::build(&CertificateRequest::new(name), day(), Locale::EnUs)
        .unwrap_err();
    assert!(matches!(err, ClearanceError::InvalidInput(_)));
}

#[test]
fn polish_names_keep_their_letters_in_the_document() {
    let rendered = engine(Locale::EnUs)
        .render_document_on("Łukasz Żółw", None, day())
        .unwrap();
    let text = pdf_text(&rendered.bytes);
    assert!(text.contains("ŁUKASZ ŻÓŁW"), "extracted {text:?}");
}

#[test]
fn names_the_fonts_cannot_draw_are_render_errors() {
    let err = engine(Locale::EnUs)
        .render_document_on("中文名字", None, day())
        .unwrap_err();
    assert!(matches!(err, ClearanceError::Render(_)));
}

#[test]
fn renders_are_deterministic_for_fixed_inputs() {
    let engine = engine(Locale::EnUs);
    let first = engine.render_image_on("Jane Doe", None, day()).unwrap();
    let second = engine.render_image_on("Jane Doe", None, day()).unwrap();
    assert_eq!(first.bytes, second.bytes);
    let other_day = NaiveDate::from_ymd_opt(2026, 1, 16).unwrap();
    let a = engine.build_content("Jane Doe", None, day()).unwrap();
    let b = engine.build_content("Jane Doe", None, other_day).unwrap();
    assert_ne!(a.verification_code(), b.verification_code());
}

#[test]
fn unsanitizable_names_fall_back_to_placeholder_filename() {
    let engine = engine(Locale::EnUs);
    let rendered = engine.render_image_on("!!??", None, day()).unwrap();
    assert_eq!(
        rendered.suggested_filename,
        "Unbedenklichkeitszertifikat_certificate.png"
    );
}

#[rstest]
#[case("Jöhn   O'Brien!!", "Jöhn_OBrien")]
#[case("  Anna-Lena  ", "_Anna-Lena_")]
fn sanitizer_is_idempotent(#[case] raw: &str, #[case] expected: &str) {
    let once = sanitize(raw);
    assert_eq!(once, expected);
    assert_eq!(sanitize(&once), once);
}
