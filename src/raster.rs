use crate::canvas::{Command, Document};
use crate::error::ClearanceError;
use crate::font::{FontRegistry, FontWeight};
use crate::types::{Color, Pt, Shading, ShadingStop};
use tiny_skia::{
    FillRule, GradientStop, LineCap, LineJoin, LinearGradient, Paint, Path, PathBuilder, Pixmap,
    Point, Rect, Shader, SpreadMode, Stroke, Transform,
};
use ttf_parser::{GlyphId, OutlineBuilder};

#[derive(Clone)]
struct RasterState {
    transform: Transform,
    fill_color: Color,
    stroke_color: Color,
    line_width: Pt,
    line_cap: u8,
    line_join: u8,
    fill_opacity: f32,
    stroke_opacity: f32,
    font_weight: FontWeight,
    font_size: Pt,
    letter_spacing: Pt,
}

impl Default for RasterState {
    fn default() -> Self {
        Self {
            transform: Transform::identity(),
            fill_color: Color::BLACK,
            stroke_color: Color::BLACK,
            line_width: Pt::from_f32(1.0),
            line_cap: 0,
            line_join: 0,
            fill_opacity: 1.0,
            stroke_opacity: 1.0,
            font_weight: FontWeight::Regular,
            font_size: Pt::from_f32(12.0),
            letter_spacing: Pt::ZERO,
        }
    }
}

struct PageRaster<'a> {
    pixmap: Pixmap,
    fonts: &'a FontRegistry,
    page_width_pt: f32,
    page_height_pt: f32,
    base_transform: Transform,
    state: RasterState,
    stack: Vec<RasterState>,
    path_builder: PathBuilder,
    has_path: bool,
}

/// Rasterizes every page to PNG. At 72 dpi one point maps to one pixel.
pub(crate) fn document_to_png_pages(
    document: &Document,
    dpi: u32,
    fonts: &FontRegistry,
) -> Result<Vec<Vec<u8>>, ClearanceError> {
    fonts.ensure_coverage(document)?;
    let width_px = pt_milli_to_px_u32(document.page_size.width.to_milli_i64(), dpi)?;
    let height_px = pt_milli_to_px_u32(document.page_size.height.to_milli_i64(), dpi)?;
    let page_height_pt = document.page_size.height.to_f32();
    let page_width_pt = document.page_size.width.to_f32();
    let scale = dpi as f32 / 72.0;
    let base_transform = Transform::from_row(scale, 0.0, 0.0, -scale, 0.0, page_height_pt * scale);

    let mut png_pages = Vec::with_capacity(document.pages.len());
    for page in &document.pages {
        let mut pixmap = Pixmap::new(width_px, height_px).ok_or_else(|| {
            ClearanceError::InvalidConfiguration(format!(
                "invalid raster size {width_px}x{height_px} at {dpi} DPI"
            ))
        })?;
        pixmap.fill(tiny_skia::Color::from_rgba8(255, 255, 255, 255));

        let mut raster = PageRaster {
            pixmap,
            fonts,
            page_width_pt,
            page_height_pt,
            base_transform,
            state: RasterState::default(),
            stack: Vec::new(),
            path_builder: PathBuilder::new(),
            has_path: false,
        };
        raster.render_commands(&page.commands)?;

        let png = raster
            .pixmap
            .encode_png()
            .map_err(|e| ClearanceError::Render(format!("png encode failed: {e}")))?;
        png_pages.push(png);
    }

    Ok(png_pages)
}

impl PageRaster<'_> {
    fn render_commands(&mut self, commands: &[Command]) -> Result<(), ClearanceError> {
        let h = self.page_height_pt;
        for cmd in commands {
            match cmd {
                Command::SaveState => self.stack.push(self.state.clone()),
                Command::RestoreState => {
                    if let Some(restored) = self.stack.pop() {
                        self.state = restored;
                    }
                }
                Command::Rotate { degrees, cx, cy } => {
                    // y-up user space, so a positive angle turns counter-clockwise on the page.
                    let pivot = Transform::from_rotate_at(*degrees, cx.to_f32(), h - cy.to_f32());
                    self.state.transform = self.state.transform.pre_concat(pivot);
                }
                Command::SetFillColor(color) => self.state.fill_color = *color,
                Command::SetStrokeColor(color) => self.state.stroke_color = *color,
                Command::SetLineWidth(width) => {
                    self.state.line_width = if *width < Pt::ZERO { Pt::ZERO } else { *width };
                }
                Command::SetLineCap(cap) => self.state.line_cap = *cap,
                Command::SetLineJoin(join) => self.state.line_join = *join,
                Command::SetOpacity { fill, stroke } => {
                    self.state.fill_opacity = fill.clamp(0.0, 1.0);
                    self.state.stroke_opacity = stroke.clamp(0.0, 1.0);
                }
                Command::SetFontWeight(weight) => self.state.font_weight = *weight,
                Command::SetFontSize(size) => self.state.font_size = *size,
                Command::SetLetterSpacing(spacing) => self.state.letter_spacing = *spacing,
                Command::MoveTo { x, y } => {
                    self.path_builder.move_to(x.to_f32(), h - y.to_f32());
                    self.has_path = true;
                }
                Command::LineTo { x, y } => {
                    self.path_builder.line_to(x.to_f32(), h - y.to_f32());
                    self.has_path = true;
                }
                Command::CurveTo {
                    x1,
                    y1,
                    x2,
                    y2,
                    x,
                    y,
                } => {
                    self.path_builder.cubic_to(
                        x1.to_f32(),
                        h - y1.to_f32(),
                        x2.to_f32(),
                        h - y2.to_f32(),
                        x.to_f32(),
                        h - y.to_f32(),
                    );
                    self.has_path = true;
                }
                Command::ClosePath => {
                    if self.has_path {
                        self.path_builder.close();
                    }
                }
                Command::Fill => self.fill_current_path(),
                Command::Stroke => self.stroke_current_path(),
                Command::DrawRect {
                    x,
                    y,
                    width,
                    height,
                } => {
                    let draw_y = h - y.to_f32() - height.to_f32();
                    if let Some(rect) =
                        Rect::from_xywh(x.to_f32(), draw_y, width.to_f32(), height.to_f32())
                    {
                        let path = PathBuilder::from_rect(rect);
                        self.fill_path(&path);
                    }
                }
                Command::ShadingFill(shading) => self.draw_shading_fill(shading),
                Command::DrawString { x, y, text } => {
                    self.draw_string(x.to_f32(), h - y.to_f32(), text)?;
                }
            }
        }
        Ok(())
    }

    fn device_transform(&self) -> Transform {
        self.base_transform.pre_concat(self.state.transform)
    }

    fn fill_path(&mut self, path: &Path) {
        let paint = fill_paint(self.state.fill_color, self.state.fill_opacity);
        let transform = self.device_transform();
        self.pixmap
            .fill_path(path, &paint, FillRule::Winding, transform, None);
    }

    fn fill_current_path(&mut self) {
        if let Some(path) = take_path(&mut self.path_builder, &mut self.has_path) {
            self.fill_path(&path);
        }
    }

    fn stroke_current_path(&mut self) {
        let Some(path) = take_path(&mut self.path_builder, &mut self.has_path) else {
            return;
        };
        let paint = fill_paint(self.state.stroke_color, self.state.stroke_opacity);
        let stroke = build_stroke(&self.state);
        let transform = self.device_transform();
        self.pixmap
            .stroke_path(&path, &paint, &stroke, transform, None);
    }

    fn draw_shading_fill(&mut self, shading: &Shading) {
        let Some(page_rect) = Rect::from_xywh(
            0.0,
            0.0,
            self.page_width_pt.max(0.0),
            self.page_height_pt.max(0.0),
        ) else {
            return;
        };
        let page_path = PathBuilder::from_rect(page_rect);
        let Some(shader) =
            build_shading_shader(shading, self.page_height_pt, self.state.fill_opacity)
        else {
            return;
        };
        let mut paint = Paint::default();
        paint.shader = shader;
        paint.anti_alias = true;
        let transform = self.device_transform();
        self.pixmap
            .fill_path(&page_path, &paint, FillRule::Winding, transform, None);
    }

    // `baseline_y` is already in y-up user space.
    fn draw_string(&mut self, x: f32, baseline_y: f32, text: &str) -> Result<(), ClearanceError> {
        let font_size = self.state.font_size.to_f32().max(0.0);
        if font_size <= 0.0 || text.is_empty() {
            return Ok(());
        }
        let fonts = self.fonts;
        let font = fonts.font(self.state.font_weight);
        let face = ttf_parser::Face::parse(&font.data, 0)
            .map_err(|e| ClearanceError::Render(format!("font {} unusable: {e}", font.name)))?;
        let scale = font_size / font.units_per_em();
        let spacing = self.state.letter_spacing.to_f32();
        let run = fonts.glyph_run(self.state.font_weight, text, font_size, spacing == 0.0);

        let paint = fill_paint(self.state.fill_color, self.state.fill_opacity);
        let transform = self.device_transform();
        let mut pen_x = x;
        for (idx, glyph) in run.iter().enumerate() {
            if idx > 0 {
                pen_x += spacing;
            }
            if glyph.glyph_id != 0 {
                let mut builder = GlyphPathBuilder::new(
                    pen_x + glyph.x_offset,
                    baseline_y + glyph.y_offset,
                    scale,
                );
                if face
                    .outline_glyph(GlyphId(glyph.glyph_id), &mut builder)
                    .is_some()
                {
                    if let Some(path) = builder.finish() {
                        self.pixmap
                            .fill_path(&path, &paint, FillRule::Winding, transform, None);
                    }
                }
            }
            pen_x += glyph.advance;
        }
        Ok(())
    }
}

fn build_shading_shader(
    shading: &Shading,
    page_height_pt: f32,
    opacity: f32,
) -> Option<Shader<'static>> {
    match shading {
        Shading::Axial {
            x0,
            y0,
            x1,
            y1,
            stops,
        } => {
            let start = Point::from_xy(*x0, page_height_pt - *y0);
            let end = Point::from_xy(*x1, page_height_pt - *y1);
            let stops = shading_stops(stops, opacity);
            LinearGradient::new(start, end, stops, SpreadMode::Pad, Transform::identity())
        }
    }
}

fn shading_stops(stops: &[ShadingStop], opacity: f32) -> Vec<GradientStop> {
    if stops.is_empty() {
        return vec![
            GradientStop::new(0.0, to_sk_color(Color::BLACK, opacity)),
            GradientStop::new(1.0, to_sk_color(Color::BLACK, opacity)),
        ];
    }
    stops
        .iter()
        .map(|stop| {
            GradientStop::new(stop.offset.clamp(0.0, 1.0), to_sk_color(stop.color, opacity))
        })
        .collect()
}

struct GlyphPathBuilder {
    builder: PathBuilder,
    origin_x: f32,
    origin_y: f32,
    scale: f32,
}

impl GlyphPathBuilder {
    fn new(origin_x: f32, origin_y: f32, scale: f32) -> Self {
        Self {
            builder: PathBuilder::new(),
            origin_x,
            origin_y,
            scale,
        }
    }

    fn finish(self) -> Option<Path> {
        self.builder.finish()
    }

    fn map(&self, x: f32, y: f32) -> (f32, f32) {
        (self.origin_x + x * self.scale, self.origin_y + y * self.scale)
    }
}

impl OutlineBuilder for GlyphPathBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x, y) = self.map(x, y);
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x2, y2) = self.map(x2, y2);
        let (x, y) = self.map(x, y);
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

fn take_path(path_builder: &mut PathBuilder, has_path: &mut bool) -> Option<Path> {
    if !*has_path {
        return None;
    }
    *has_path = false;
    let builder = std::mem::replace(path_builder, PathBuilder::new());
    builder.finish()
}

fn build_stroke(state: &RasterState) -> Stroke {
    let mut stroke = Stroke::default();
    stroke.width = state.line_width.to_f32().max(0.0);
    stroke.line_cap = match state.line_cap {
        1 => LineCap::Round,
        2 => LineCap::Square,
        _ => LineCap::Butt,
    };
    stroke.line_join = match state.line_join {
        1 => LineJoin::Round,
        2 => LineJoin::Bevel,
        _ => LineJoin::Miter,
    };
    stroke
}

fn fill_paint(color: Color, opacity: f32) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(to_sk_color(color, opacity));
    paint.anti_alias = true;
    paint
}

fn to_sk_color(color: Color, opacity: f32) -> tiny_skia::Color {
    let r = color.r.clamp(0.0, 1.0);
    let g = color.g.clamp(0.0, 1.0);
    let b = color.b.clamp(0.0, 1.0);
    let a = opacity.clamp(0.0, 1.0);
    tiny_skia::Color::from_rgba(r, g, b, a)
        .unwrap_or_else(|| tiny_skia::Color::from_rgba8(0, 0, 0, 255))
}

fn pt_milli_to_px_u32(pt_milli: i64, dpi: u32) -> Result<u32, ClearanceError> {
    let px = pt_milli_to_px_i64(pt_milli, dpi)?;
    if px <= 0 {
        return Err(ClearanceError::InvalidConfiguration(format!(
            "invalid non-positive pixel dimension {px} for pt_milli={pt_milli} dpi={dpi}"
        )));
    }
    u32::try_from(px).map_err(|_| {
        ClearanceError::InvalidConfiguration(format!(
            "pixel dimension out of range: {px} for pt_milli={pt_milli} dpi={dpi}"
        ))
    })
}

fn pt_milli_to_px_i64(pt_milli: i64, dpi: u32) -> Result<i64, ClearanceError> {
    if dpi == 0 {
        return Err(ClearanceError::InvalidConfiguration(
            "dpi must be > 0".to_string(),
        ));
    }

    let num = (pt_milli as i128).saturating_mul(dpi as i128);
    let den = 72_000_i128;
    let px = if num >= 0 {
        (num + (den / 2)) / den
    } else {
        -(((-num) + (den / 2)) / den)
    };
    i64::try_from(px).map_err(|_| {
        ClearanceError::InvalidConfiguration(format!(
            "pixel dimension out of range for pt_milli={pt_milli} dpi={dpi}"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Page;
    use crate::font::tests::test_registry;
    use crate::types::Size;

    fn has_non_white_pixel(img: &image::RgbaImage) -> bool {
        img.pixels().any(|p| {
            let [r, g, b, _a] = p.0;
            !(r == 255 && g == 255 && b == 255)
        })
    }

    fn page(size: Size, commands: Vec<Command>) -> Document {
        Document {
            page_size: size,
            pages: vec![Page { commands }],
        }
    }

    #[test]
    fn pt_milli_to_px_rounds_half_away_from_zero() {
        assert_eq!(pt_milli_to_px_i64(72_000, 150).unwrap(), 150);
        assert_eq!(pt_milli_to_px_i64(240, 150).unwrap(), 1);
        assert_eq!(pt_milli_to_px_i64(-240, 150).unwrap(), -1);
        assert_eq!(pt_milli_to_px_i64(239, 150).unwrap(), 0);
        assert!(pt_milli_to_px_i64(1_000, 0).is_err());
    }

    #[test]
    fn text_draws_non_white_pixels() {
        let fonts = test_registry();
        let doc = page(
            Size::new(200.0, 100.0),
            vec![
                Command::SetFontWeight(FontWeight::Bold),
                Command::SetFontSize(Pt::from_f32(24.0)),
                Command::DrawString {
                    x: Pt::from_f32(10.0),
                    y: Pt::from_f32(50.0),
                    text: "Hello".to_string(),
                },
            ],
        );
        let pngs = document_to_png_pages(&doc, 72, &fonts).unwrap();
        let img = image::load_from_memory(&pngs[0]).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (200, 100));
        assert!(has_non_white_pixel(&img));
    }

    #[test]
    fn rect_lands_in_top_left_page_space() {
        let fonts = test_registry();
        let doc = page(
            Size::square(100.0),
            vec![
                Command::SetFillColor(Color::rgb8(255, 0, 0)),
                Command::DrawRect {
                    x: Pt::ZERO,
                    y: Pt::ZERO,
                    width: Pt::from_f32(20.0),
                    height: Pt::from_f32(10.0),
                },
            ],
        );
        let pngs = document_to_png_pages(&doc, 72, &fonts).unwrap();
        let img = image::load_from_memory(&pngs[0]).unwrap().to_rgba8();
        assert_eq!(img.get_pixel(5, 5).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(5, 95).0, [255, 255, 255, 255]);
    }

    #[test]
    fn vertical_gradient_runs_top_to_bottom() {
        let fonts = test_registry();
        let doc = page(
            Size::square(100.0),
            vec![Command::ShadingFill(Shading::Axial {
                x0: 0.0,
                y0: 0.0,
                x1: 0.0,
                y1: 100.0,
                stops: vec![
                    ShadingStop {
                        offset: 0.0,
                        color: Color::BLACK,
                    },
                    ShadingStop {
                        offset: 1.0,
                        color: Color::WHITE,
                    },
                ],
            })],
        );
        let pngs = document_to_png_pages(&doc, 72, &fonts).unwrap();
        let img = image::load_from_memory(&pngs[0]).unwrap().to_rgba8();
        assert!(img.get_pixel(50, 2).0[0] < 20);
        assert!(img.get_pixel(50, 97).0[0] > 235);
    }

    #[test]
    fn rotation_turns_counter_clockwise_about_pivot() {
        let fonts = test_registry();
        // A bar right of center, rotated 90 degrees, ends up above center.
        let doc = page(
            Size::square(100.0),
            vec![
                Command::Rotate {
                    degrees: 90.0,
                    cx: Pt::from_f32(50.0),
                    cy: Pt::from_f32(50.0),
                },
                Command::DrawRect {
                    x: Pt::from_f32(70.0),
                    y: Pt::from_f32(45.0),
                    width: Pt::from_f32(20.0),
                    height: Pt::from_f32(10.0),
                },
            ],
        );
        let pngs = document_to_png_pages(&doc, 72, &fonts).unwrap();
        let img = image::load_from_memory(&pngs[0]).unwrap().to_rgba8();
        assert_eq!(img.get_pixel(50, 20).0, [0, 0, 0, 255]);
        assert_eq!(img.get_pixel(80, 50).0, [255, 255, 255, 255]);
    }
}
