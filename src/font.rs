use crate::canvas::{Command, Document};
use crate::error::ClearanceError;
use crate::types::Pt;
use rustybuzz::{Direction as HbDirection, Face as HbFace, UnicodeBuffer};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use ttf_parser::GlyphId;

pub const FONT_DIR_ENV: &str = "CLEARANCE_FONT_DIR";

const MAX_SCAN_DEPTH: usize = 6;

// File names of the preferred sans-serif families, best first.
const PREFERRED_REGULAR: &[&str] = &[
    "dejavusans.ttf",
    "liberationsans-regular.ttf",
    "arial.ttf",
    "notosans-regular.ttf",
    "roboto-regular.ttf",
    "inter-regular.ttf",
    "inter-regular.otf",
];

const PREFERRED_BOLD: &[&str] = &[
    "dejavusans-bold.ttf",
    "liberationsans-bold.ttf",
    "arialbd.ttf",
    "arial bold.ttf",
    "notosans-bold.ttf",
    "roboto-bold.ttf",
    "inter-bold.ttf",
    "inter-bold.otf",
];

static SYSTEM_REGISTRY: OnceLock<Result<Arc<FontRegistry>, String>> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontWeight {
    Regular,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FontProgramKind {
    TrueType,
    OpenTypeCff,
}

/// Where to look for the two faces, in priority order.
#[derive(Debug, Clone, Default)]
pub struct FontSources {
    pub regular: Option<PathBuf>,
    pub bold: Option<PathBuf>,
    pub dirs: Vec<PathBuf>,
    pub system: bool,
}

impl FontSources {
    pub fn system_default() -> Self {
        Self {
            system: true,
            ..Self::default()
        }
    }

    /// True when nothing beyond platform discovery was requested.
    pub fn is_system_default(&self) -> bool {
        self.system && self.regular.is_none() && self.bold.is_none() && self.dirs.is_empty()
    }
}

#[derive(Debug)]
pub(crate) struct FontMetrics {
    pub(crate) ascent: i16,
    pub(crate) descent: i16,
    pub(crate) cap_height: i16,
    pub(crate) italic_angle: i16,
    pub(crate) stem_v: i16,
    pub(crate) bbox: (i16, i16, i16, i16),
    pub(crate) missing_width: u16,
    pub(crate) is_fixed_pitch: bool,
}

#[derive(Debug)]
pub(crate) struct LoadedFont {
    pub(crate) name: String,
    pub(crate) data: Vec<u8>,
    pub(crate) metrics: FontMetrics,
    pub(crate) program_kind: FontProgramKind,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PositionedGlyph {
    pub(crate) glyph_id: u16,
    // Offsets and advance are in points at the requested size, y up.
    pub(crate) x_offset: f32,
    pub(crate) y_offset: f32,
    pub(crate) advance: f32,
}

/// The regular and bold faces every certificate is drawn with.
#[derive(Debug)]
pub struct FontRegistry {
    regular: LoadedFont,
    bold: Option<LoadedFont>,
}

impl FontRegistry {
    /// Process-wide registry from platform discovery, loaded once.
    pub fn system() -> Result<Arc<FontRegistry>, ClearanceError> {
        SYSTEM_REGISTRY
            .get_or_init(|| {
                FontRegistry::load(&FontSources::system_default())
                    .map(Arc::new)
                    .map_err(|err| err.to_string())
            })
            .clone()
            .map_err(ClearanceError::Render)
    }

    pub fn load(sources: &FontSources) -> Result<Self, ClearanceError> {
        let _span = tracing::debug_span!("font_load", system = sources.system).entered();
        let candidates = discover(sources);

        let regular = match &sources.regular {
            Some(path) => load_file(path)?,
            None => first_loadable(&candidates.regular).ok_or_else(|| {
                ClearanceError::Render("no usable regular sans-serif font found".to_string())
            })?,
        };
        let bold = match &sources.bold {
            Some(path) => Some(load_file(path)?),
            None => first_loadable(&candidates.bold),
        };

        tracing::info!(
            regular = %regular.name,
            bold = bold.as_ref().map(|font| font.name.as_str()).unwrap_or("<regular>"),
            "fonts resolved"
        );
        if bold.is_none() {
            tracing::warn!("no bold face found; bold text uses the regular face");
        }
        Ok(Self { regular, bold })
    }

    pub fn from_bytes(regular: Vec<u8>, bold: Option<Vec<u8>>) -> Result<Self, ClearanceError> {
        let regular = load_bytes(regular, "EmbeddedRegular")?;
        let bold = bold
            .map(|data| load_bytes(data, "EmbeddedBold"))
            .transpose()?;
        Ok(Self { regular, bold })
    }

    pub fn regular_name(&self) -> &str {
        &self.regular.name
    }

    pub fn bold_name(&self) -> &str {
        &self.font(FontWeight::Bold).name
    }

    pub fn has_distinct_bold(&self) -> bool {
        self.bold.is_some()
    }

    pub(crate) fn font(&self, weight: FontWeight) -> &LoadedFont {
        match weight {
            FontWeight::Regular => &self.regular,
            FontWeight::Bold => self.bold.as_ref().unwrap_or(&self.regular),
        }
    }

    /// Width of `text` as laid out by the raster path.
    pub fn measure_shaped(&self, weight: FontWeight, font_size: Pt, text: &str) -> Pt {
        let run = self.glyph_run(weight, text, font_size.to_f32(), true);
        Pt::from_f32(run.iter().map(|glyph| glyph.advance).sum())
    }

    /// Width of `text` as one glyph per char with plain advances, no kerning.
    pub fn measure_unshaped(&self, weight: FontWeight, font_size: Pt, text: &str) -> Pt {
        let run = self.glyph_run(weight, text, font_size.to_f32(), false);
        Pt::from_f32(run.iter().map(|glyph| glyph.advance).sum())
    }

    /// Chars of `text` the face has no glyph for; whitespace and controls are ignored.
    pub fn missing_chars(&self, weight: FontWeight, text: &str) -> Vec<char> {
        let Ok(face) = ttf_parser::Face::parse(&self.font(weight).data, 0) else {
            return text.chars().collect();
        };
        text.chars()
            .filter(|ch| !ch.is_whitespace() && !ch.is_control())
            .filter(|ch| face.glyph_index(*ch).is_none())
            .collect()
    }

    /// Fails when any drawn string needs a glyph the selected face lacks.
    pub(crate) fn ensure_coverage(&self, document: &Document) -> Result<(), ClearanceError> {
        let mut weight = FontWeight::Regular;
        let mut saved = Vec::new();
        let mut missing = 0usize;
        for cmd in document.pages.iter().flat_map(|page| page.commands.iter()) {
            match cmd {
                Command::SaveState => saved.push(weight),
                Command::RestoreState => weight = saved.pop().unwrap_or(weight),
                Command::SetFontWeight(next) => weight = *next,
                Command::DrawString { text, .. } => {
                    missing += self.missing_chars(weight, text).len();
                }
                _ => {}
            }
        }
        if missing > 0 {
            tracing::warn!(missing, "text needs glyphs the loaded fonts do not have");
            return Err(ClearanceError::Render(format!(
                "{missing} characters have no glyph in the loaded fonts"
            )));
        }
        Ok(())
    }

    /// Horizontal advance of a glyph in 1/1000 em.
    pub(crate) fn glyph_advance(&self, weight: FontWeight, glyph_id: u16) -> u16 {
        let font = self.font(weight);
        let Ok(face) = ttf_parser::Face::parse(&font.data, 0) else {
            return font.metrics.missing_width;
        };
        let scale = 1000.0 / face.units_per_em().max(1) as f32;
        face.glyph_hor_advance(GlyphId(glyph_id))
            .map(|units| (units as f32 * scale).round() as u16)
            .unwrap_or(font.metrics.missing_width)
    }

    pub(crate) fn glyph_run(
        &self,
        weight: FontWeight,
        text: &str,
        font_size: f32,
        shaped: bool,
    ) -> Vec<PositionedGlyph> {
        let data = &self.font(weight).data;
        if shaped {
            if let Some(run) = shaped_run(data, text, font_size) {
                return run;
            }
        }
        unshaped_run(data, text, font_size)
    }
}

impl LoadedFont {
    pub(crate) fn units_per_em(&self) -> f32 {
        ttf_parser::Face::parse(&self.data, 0)
            .map(|face| face.units_per_em().max(1) as f32)
            .unwrap_or(1000.0)
    }
}

impl FontMetrics {
    fn from_face(face: &ttf_parser::Face<'_>) -> (Self, FontProgramKind) {
        let units_per_em = face.units_per_em().max(1);
        let scale = 1000.0 / units_per_em as f32;
        let missing_width = face
            .glyph_hor_advance(GlyphId(0))
            .map(|units| (units as f32 * scale).round() as u16)
            .unwrap_or(0);

        let ascent = scale_i16(face.ascender(), scale);
        let descent = scale_i16(face.descender(), scale);
        let cap_height = face
            .capital_height()
            .map(|value| scale_i16(value, scale))
            .unwrap_or(ascent);
        let bbox = face.global_bounding_box();
        let bbox = (
            scale_i16(bbox.x_min, scale),
            scale_i16(bbox.y_min, scale),
            scale_i16(bbox.x_max, scale),
            scale_i16(bbox.y_max, scale),
        );
        let italic_angle = face
            .italic_angle()
            .map(|value| value.round() as i16)
            .unwrap_or(0);
        let stem_v = if face.is_bold() { 140 } else { 80 };

        let program_kind = if face.tables().cff.is_some() {
            FontProgramKind::OpenTypeCff
        } else {
            FontProgramKind::TrueType
        };

        (
            Self {
                ascent,
                descent,
                cap_height,
                italic_angle,
                stem_v,
                bbox,
                missing_width,
                is_fixed_pitch: face.is_monospaced(),
            },
            program_kind,
        )
    }

}

#[derive(Debug, Default)]
struct Candidates {
    regular: Vec<PathBuf>,
    bold: Vec<PathBuf>,
}

fn discover(sources: &FontSources) -> Candidates {
    let mut groups: Vec<(Vec<PathBuf>, bool)> = Vec::new();
    if !sources.dirs.is_empty() {
        groups.push((sources.dirs.clone(), true));
    }
    let env_dirs = env_font_dirs();
    if !env_dirs.is_empty() {
        groups.push((env_dirs, true));
    }
    if sources.system {
        groups.push((system_font_dirs(), false));
    }

    let mut out = Candidates::default();
    for (dirs, accept_any) in groups {
        let mut files = Vec::new();
        for dir in &dirs {
            collect_font_files(dir, 0, &mut files);
        }
        out.regular
            .extend(rank_candidates(&files, PREFERRED_REGULAR, accept_any, false));
        out.bold
            .extend(rank_candidates(&files, PREFERRED_BOLD, accept_any, true));
    }
    out
}

// Preferred names first by family rank; in user-supplied dirs any other face follows.
fn rank_candidates(
    files: &[PathBuf],
    preferred: &[&str],
    accept_any: bool,
    bold: bool,
) -> Vec<PathBuf> {
    let mut ranked: Vec<(usize, &PathBuf)> = files
        .iter()
        .filter_map(|path| {
            let name = file_name_lower(path)?;
            if let Some(rank) = preferred.iter().position(|candidate| *candidate == name) {
                return Some((rank, path));
            }
            let looks_bold = name.contains("bold") || name.contains("bd.");
            let looks_styled = name.contains("italic") || name.contains("oblique");
            (accept_any && looks_bold == bold && !looks_styled).then_some((preferred.len(), path))
        })
        .collect();
    ranked.sort_by_key(|(rank, _)| *rank);
    ranked.into_iter().map(|(_, path)| path.clone()).collect()
}

fn collect_font_files(dir: &Path, depth: usize, out: &mut Vec<PathBuf>) {
    if depth > MAX_SCAN_DEPTH {
        return;
    }
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    let mut entries: Vec<PathBuf> = entries.flatten().map(|entry| entry.path()).collect();
    entries.sort();
    for path in entries {
        if path.is_dir() {
            collect_font_files(&path, depth + 1, out);
        } else if is_font_file(&path) {
            out.push(path);
        }
    }
}

fn is_font_file(path: &Path) -> bool {
    path.extension()
        .and_then(|v| v.to_str())
        .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "ttf" | "otf"))
        .unwrap_or(false)
}

fn file_name_lower(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|v| v.to_str())
        .map(|v| v.to_ascii_lowercase())
}

fn env_font_dirs() -> Vec<PathBuf> {
    let Some(extra) = std::env::var_os(FONT_DIR_ENV) else {
        return Vec::new();
    };
    std::env::split_paths(&extra)
        .filter(|path| !path.as_os_str().is_empty())
        .collect()
}

fn system_font_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    #[cfg(target_os = "windows")]
    {
        dirs.push(PathBuf::from(r"C:\Windows\Fonts"));
        if let Ok(windir) = std::env::var("WINDIR") {
            dirs.push(PathBuf::from(windir).join("Fonts"));
        }
    }

    #[cfg(target_os = "linux")]
    {
        dirs.push(PathBuf::from("/usr/share/fonts"));
        dirs.push(PathBuf::from("/usr/local/share/fonts"));
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(&home).join(".fonts"));
            dirs.push(PathBuf::from(home).join(".local/share/fonts"));
        }
    }

    #[cfg(target_os = "macos")]
    {
        dirs.push(PathBuf::from("/System/Library/Fonts"));
        dirs.push(PathBuf::from("/Library/Fonts"));
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join("Library/Fonts"));
        }
    }

    dirs
}

fn first_loadable(paths: &[PathBuf]) -> Option<LoadedFont> {
    paths.iter().find_map(|path| match load_file(path) {
        Ok(font) => Some(font),
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "skipping font candidate");
            None
        }
    })
}

fn load_file(path: &Path) -> Result<LoadedFont, ClearanceError> {
    let data = fs::read(path).map_err(|err| {
        ClearanceError::Render(format!("cannot read font {}: {err}", path.display()))
    })?;
    let source = path
        .file_stem()
        .and_then(|v| v.to_str())
        .unwrap_or("EmbeddedFont");
    let font = load_bytes(data, source)?;
    tracing::debug!(path = %path.display(), font = %font.name, "loaded font file");
    Ok(font)
}

fn load_bytes(data: Vec<u8>, source: &str) -> Result<LoadedFont, ClearanceError> {
    let (name, metrics, program_kind) = {
        let face = ttf_parser::Face::parse(&data, 0)
            .map_err(|err| ClearanceError::Render(format!("invalid font data for {source}: {err}")))?;
        if face.glyph_index('A').is_none() {
            return Err(ClearanceError::Render(format!(
                "font {source} has no Latin glyphs"
            )));
        }
        let (metrics, program_kind) = FontMetrics::from_face(&face);
        (font_name(&face, source), metrics, program_kind)
    };
    Ok(LoadedFont {
        name,
        data,
        metrics,
        program_kind,
    })
}

fn shaped_run(font_data: &[u8], text: &str, font_size: f32) -> Option<Vec<PositionedGlyph>> {
    let face = HbFace::from_slice(font_data, 0)?;
    let hb_units = face.units_per_em().max(1) as f32;
    let mut buffer = UnicodeBuffer::new();
    buffer.set_direction(detect_direction(text));
    buffer.push_str(text);
    let output = rustybuzz::shape(&face, &[], buffer);
    let infos = output.glyph_infos();
    let positions = output.glyph_positions();
    if infos.is_empty() || infos.len() != positions.len() {
        return None;
    }
    let to_pt = |units: i32| (units as f32 / hb_units) * font_size;
    Some(
        infos
            .iter()
            .zip(positions.iter())
            .map(|(info, pos)| PositionedGlyph {
                glyph_id: info.glyph_id as u16,
                x_offset: to_pt(pos.x_offset),
                y_offset: to_pt(pos.y_offset),
                advance: to_pt(pos.x_advance),
            })
            .collect(),
    )
}

fn unshaped_run(font_data: &[u8], text: &str, font_size: f32) -> Vec<PositionedGlyph> {
    let Ok(face) = ttf_parser::Face::parse(font_data, 0) else {
        return Vec::new();
    };
    let units_per_em = face.units_per_em().max(1) as f32;
    text.chars()
        .map(|ch| {
            let gid = face.glyph_index(ch).map(|id| id.0).unwrap_or(0);
            let advance_units = face.glyph_hor_advance(GlyphId(gid)).unwrap_or(0) as f32;
            let mut advance = (advance_units / units_per_em) * font_size;
            if gid == 0 || advance <= 0.0 {
                advance = font_size * 0.5;
            }
            PositionedGlyph {
                glyph_id: gid,
                x_offset: 0.0,
                y_offset: 0.0,
                advance,
            }
        })
        .collect()
}

fn detect_direction(text: &str) -> HbDirection {
    let rtl = text.chars().any(|ch| {
        matches!(
            ch as u32,
            0x0590..=0x08FF | 0xFB1D..=0xFDFF | 0xFE70..=0xFEFF | 0x1EE00..=0x1EEFF
        )
    });
    if rtl {
        HbDirection::RightToLeft
    } else {
        HbDirection::LeftToRight
    }
}

fn scale_i16(value: i16, scale: f32) -> i16 {
    let scaled = (value as f32 * scale).round() as i32;
    scaled.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

fn font_name(face: &ttf_parser::Face<'_>, source: &str) -> String {
    use ttf_parser::name::name_id;

    let mut post = None;
    let mut full = None;
    for entry in face.names() {
        let Some(name) = entry.to_string() else {
            continue;
        };
        match entry.name_id {
            name_id::POST_SCRIPT_NAME if post.is_none() => post = Some(name),
            name_id::FULL_NAME if full.is_none() => full = Some(name),
            _ => {}
        }
    }
    post.or(full).unwrap_or_else(|| source.to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::canvas::Canvas;
    use crate::types::Size;

    const FIXTURE_REGULAR: &[u8] = include_bytes!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/tests/fixtures/fonts/DejaVuSans.ttf"
    ));
    const FIXTURE_BOLD: &[u8] = include_bytes!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/tests/fixtures/fonts/DejaVuSans-Bold.ttf"
    ));

    /// Registry over the committed fixture faces, independent of the host.
    pub(crate) fn test_registry() -> Arc<FontRegistry> {
        static FIXTURE: OnceLock<Arc<FontRegistry>> = OnceLock::new();
        FIXTURE
            .get_or_init(|| {
                let fonts =
                    FontRegistry::from_bytes(FIXTURE_REGULAR.to_vec(), Some(FIXTURE_BOLD.to_vec()))
                        .expect("fixture fonts parse");
                Arc::new(fonts)
            })
            .clone()
    }

    #[test]
    fn preferred_names_rank_before_other_faces() {
        let files = vec![
            PathBuf::from("/fonts/Custom-Regular.ttf"),
            PathBuf::from("/fonts/LiberationSans-Regular.ttf"),
            PathBuf::from("/fonts/DejaVuSans.ttf"),
            PathBuf::from("/fonts/DejaVuSans-Oblique.ttf"),
            PathBuf::from("/fonts/DejaVuSans-Bold.ttf"),
        ];
        let regular = rank_candidates(&files, PREFERRED_REGULAR, true, false);
        assert_eq!(
            regular,
            vec![
                PathBuf::from("/fonts/DejaVuSans.ttf"),
                PathBuf::from("/fonts/LiberationSans-Regular.ttf"),
                PathBuf::from("/fonts/Custom-Regular.ttf"),
            ]
        );
        let bold = rank_candidates(&files, PREFERRED_BOLD, false, true);
        assert_eq!(bold, vec![PathBuf::from("/fonts/DejaVuSans-Bold.ttf")]);
    }

    #[test]
    fn invalid_font_bytes_are_render_errors() {
        let err = FontRegistry::from_bytes(vec![0u8; 16], None).unwrap_err();
        assert!(matches!(err, ClearanceError::Render(_)));
    }

    #[test]
    fn missing_explicit_file_is_render_error() {
        let sources = FontSources {
            regular: Some(PathBuf::from("/nonexistent/clearance/Regular.ttf")),
            ..FontSources::default()
        };
        let err = FontRegistry::load(&sources).unwrap_err();
        assert!(matches!(err, ClearanceError::Render(_)));
    }

    #[test]
    fn measurements_grow_with_text_and_size() {
        let fonts = test_registry();
        let size = Pt::from_f32(20.0);
        let short = fonts.measure_unshaped(FontWeight::Regular, size, "AB");
        let long = fonts.measure_unshaped(FontWeight::Regular, size, "ABCD");
        assert!(long > short);
        let bigger = fonts.measure_unshaped(FontWeight::Regular, Pt::from_f32(40.0), "AB");
        assert!((bigger.to_f32() - short.to_f32() * 2.0).abs() < 0.01);

        let shaped = fonts.measure_shaped(FontWeight::Bold, size, "CLEAN");
        let unshaped = fonts.measure_unshaped(FontWeight::Bold, size, "CLEAN");
        assert!((shaped.to_f32() - unshaped.to_f32()).abs() < 2.0);
    }

    #[test]
    fn measures_letters_outside_latin1() {
        let fonts = test_registry();
        let size = Pt::from_f32(36.0);
        let polish = fonts.measure_unshaped(FontWeight::Bold, size, "ŁUKASZ ŻÓŁW");
        let ascii = fonts.measure_unshaped(FontWeight::Bold, size, "LUKASZ ZOLW");
        assert!((polish.to_f32() - ascii.to_f32()).abs() < 1.0);
        assert!(fonts.missing_chars(FontWeight::Bold, "ŁUKASZ ŻÓŁW").is_empty());
    }

    #[test]
    fn glyph_advances_are_in_thousandths_of_an_em() {
        let fonts = test_registry();
        let run = fonts.glyph_run(FontWeight::Regular, "M", 1000.0, false);
        let advance = fonts.glyph_advance(FontWeight::Regular, run[0].glyph_id);
        assert!((advance as f32 - run[0].advance).abs() <= 1.0);
    }

    #[test]
    fn uncovered_text_is_a_render_error() {
        let fonts = test_registry();
        assert_eq!(
            fonts.missing_chars(FontWeight::Regular, "中文 名字"),
            vec!['中', '文', '名', '字']
        );

        let mut canvas = Canvas::new(Size::square(100.0));
        canvas.set_font_weight(FontWeight::Bold);
        canvas.draw_string(Pt::ZERO, Pt::ZERO, "中文名字");
        let err = fonts.ensure_coverage(&canvas.finish()).unwrap_err();
        assert!(matches!(err, ClearanceError::Render(_)));
        assert!(!err.to_string().contains('中'));

        let mut canvas = Canvas::new(Size::square(100.0));
        canvas.draw_string(Pt::ZERO, Pt::ZERO, "Łukasz Żółw");
        assert!(fonts.ensure_coverage(&canvas.finish()).is_ok());
    }

    #[test]
    fn system_registry_is_shared() {
        // Depends on host fonts; the fixture registry covers everything else.
        let (Ok(a), Ok(b)) = (FontRegistry::system(), FontRegistry::system()) else {
            return;
        };
        assert!(Arc::ptr_eq(&a, &b));
    }
}
