use crate::canvas::{Canvas, Document};
use crate::font::{FontRegistry, FontWeight};
use crate::types::{Color, Pt, Shading, Size};

// Cubic approximation of a quarter circle.
const KAPPA: f32 = 0.552_284_8;

/// How text widths are measured, matching the backend that will draw them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MeasureMode {
    /// Shaped advances, as the rasterizer lays glyphs out.
    Shaped,
    /// One glyph per char at its plain advance, as the PDF viewer lays them out.
    Unshaped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Align {
    Left,
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct TextStyle {
    pub(crate) weight: FontWeight,
    pub(crate) size: f32,
    pub(crate) color: Color,
    pub(crate) letter_spacing: f32,
}

impl TextStyle {
    pub(crate) fn regular(size: f32, color: Color) -> Self {
        Self {
            weight: FontWeight::Regular,
            size,
            color,
            letter_spacing: 0.0,
        }
    }

    pub(crate) fn bold(size: f32, color: Color) -> Self {
        Self {
            weight: FontWeight::Bold,
            ..Self::regular(size, color)
        }
    }

    pub(crate) fn spaced(self, letter_spacing: f32) -> Self {
        Self {
            letter_spacing,
            ..self
        }
    }
}

/// Higher-level drawing on top of a [`Canvas`], with text alignment.
pub(crate) struct Composer<'a> {
    canvas: Canvas,
    fonts: &'a FontRegistry,
    mode: MeasureMode,
}

impl<'a> Composer<'a> {
    pub(crate) fn new(page_size: Size, fonts: &'a FontRegistry, mode: MeasureMode) -> Self {
        Self {
            canvas: Canvas::new(page_size),
            fonts,
            mode,
        }
    }

    pub(crate) fn width(&self) -> f32 {
        self.canvas.page_size().width.to_f32()
    }

    pub(crate) fn height(&self) -> f32 {
        self.canvas.page_size().height.to_f32()
    }

    pub(crate) fn measure(&self, text: &str, style: &TextStyle) -> f32 {
        let size = Pt::from_f32(style.size);
        let base = match self.mode {
            MeasureMode::Shaped if style.letter_spacing == 0.0 => {
                self.fonts.measure_shaped(style.weight, size, text).to_f32()
            }
            // Spaced text is drawn unshaped by both backends.
            _ => self.fonts.measure_unshaped(style.weight, size, text).to_f32(),
        };
        let gaps = text.chars().count().saturating_sub(1) as f32;
        base + style.letter_spacing * gaps
    }

    /// Baseline offset below a line top, as layout engines that position by top edge use.
    pub(crate) fn ascent(&self, style: &TextStyle) -> f32 {
        let metrics = &self.fonts.font(style.weight).metrics;
        style.size * metrics.ascent as f32 / 1000.0
    }

    pub(crate) fn text(&mut self, text: &str, x: f32, baseline: f32, align: Align, style: &TextStyle) {
        if text.is_empty() {
            return;
        }
        let width = self.measure(text, style);
        let start = match align {
            Align::Left => x,
            Align::Center => x - width / 2.0,
        };
        self.canvas.set_fill_color(style.color);
        self.canvas.set_font_weight(style.weight);
        self.canvas.set_font_size(Pt::from_f32(style.size));
        self.canvas
            .set_letter_spacing(Pt::from_f32(style.letter_spacing));
        self.canvas
            .draw_string(Pt::from_f32(start), Pt::from_f32(baseline), text);
    }

    pub(crate) fn centered_text(&mut self, text: &str, baseline: f32, style: &TextStyle) {
        let center = self.width() / 2.0;
        self.text(text, center, baseline, Align::Center, style);
    }

    /// Largest size not above `style.size` at which `text` fits in `max_width`.
    pub(crate) fn fit_size(&self, text: &str, style: &TextStyle, max_width: f32, min_size: f32) -> f32 {
        let width = self.measure(text, style);
        if width <= max_width || width <= 0.0 {
            return style.size;
        }
        (style.size * max_width / width).max(min_size).floor()
    }

    pub(crate) fn fill_page(&mut self, color: Color) {
        let (w, h) = (self.width(), self.height());
        self.fill_rect(0.0, 0.0, w, h, color);
    }

    pub(crate) fn shade_page(&mut self, shading: Shading) {
        self.canvas.shading_fill(shading);
    }

    pub(crate) fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Color) {
        self.canvas.set_fill_color(color);
        self.canvas.draw_rect(
            Pt::from_f32(x),
            Pt::from_f32(y),
            Pt::from_f32(w),
            Pt::from_f32(h),
        );
    }

    pub(crate) fn stroke_rect(&mut self, x: f32, y: f32, w: f32, h: f32, line_width: f32, color: Color) {
        self.polyline(
            &[(x, y), (x + w, y), (x + w, y + h), (x, y + h)],
            true,
            line_width,
            color,
        );
    }

    pub(crate) fn line(&mut self, from: (f32, f32), to: (f32, f32), line_width: f32, color: Color) {
        self.polyline(&[from, to], false, line_width, color);
    }

    pub(crate) fn polyline(&mut self, points: &[(f32, f32)], closed: bool, line_width: f32, color: Color) {
        if !self.trace(points, closed) {
            return;
        }
        self.canvas.set_stroke_color(color);
        self.canvas.set_line_width(Pt::from_f32(line_width));
        self.canvas.stroke();
    }

    pub(crate) fn fill_polygon(&mut self, points: &[(f32, f32)], color: Color) {
        if !self.trace(points, true) {
            return;
        }
        self.canvas.set_fill_color(color);
        self.canvas.fill();
    }

    pub(crate) fn fill_circle(&mut self, cx: f32, cy: f32, r: f32, color: Color) {
        self.circle_path(cx, cy, r);
        self.canvas.set_fill_color(color);
        self.canvas.fill();
    }

    pub(crate) fn stroke_circle(&mut self, cx: f32, cy: f32, r: f32, line_width: f32, color: Color) {
        self.circle_path(cx, cy, r);
        self.canvas.set_stroke_color(color);
        self.canvas.set_line_width(Pt::from_f32(line_width));
        self.canvas.stroke();
    }

    /// Round caps and joins for everything drawn inside `draw`.
    pub(crate) fn rounded<F: FnOnce(&mut Self)>(&mut self, draw: F) {
        self.isolated(|composer| {
            composer.canvas.set_line_cap(1);
            composer.canvas.set_line_join(1);
            draw(composer);
        });
    }

    pub(crate) fn with_opacity<F: FnOnce(&mut Self)>(&mut self, opacity: f32, draw: F) {
        self.isolated(|composer| {
            composer.canvas.set_opacity(opacity, opacity);
            draw(composer);
        });
    }

    /// Counter-clockwise rotation about `center` for everything drawn inside `draw`.
    pub(crate) fn rotated<F: FnOnce(&mut Self)>(&mut self, degrees: f32, center: (f32, f32), draw: F) {
        self.isolated(|composer| {
            composer
                .canvas
                .rotate_about(degrees, Pt::from_f32(center.0), Pt::from_f32(center.1));
            draw(composer);
        });
    }

    pub(crate) fn finish(self) -> Document {
        self.canvas.finish()
    }

    fn isolated<F: FnOnce(&mut Self)>(&mut self, draw: F) {
        self.canvas.save_state();
        draw(self);
        self.canvas.restore_state();
    }

    fn trace(&mut self, points: &[(f32, f32)], closed: bool) -> bool {
        let Some((first, rest)) = points.split_first() else {
            return false;
        };
        self.canvas.move_to(Pt::from_f32(first.0), Pt::from_f32(first.1));
        for (x, y) in rest {
            self.canvas.line_to(Pt::from_f32(*x), Pt::from_f32(*y));
        }
        if closed {
            self.canvas.close_path();
        }
        true
    }

    fn circle_path(&mut self, cx: f32, cy: f32, r: f32) {
        let k = r * KAPPA;
        let p = Pt::from_f32;
        self.canvas.move_to(p(cx + r), p(cy));
        self.canvas
            .curve_to(p(cx + r), p(cy + k), p(cx + k), p(cy + r), p(cx), p(cy + r));
        self.canvas
            .curve_to(p(cx - k), p(cy + r), p(cx - r), p(cy + k), p(cx - r), p(cy));
        self.canvas
            .curve_to(p(cx - r), p(cy - k), p(cx - k), p(cy - r), p(cx), p(cy - r));
        self.canvas
            .curve_to(p(cx + k), p(cy - r), p(cx + r), p(cy - k), p(cx + r), p(cy));
        self.canvas.close_path();
    }
}
