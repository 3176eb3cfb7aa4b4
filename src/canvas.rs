use crate::font::FontWeight;
use crate::types::{Color, Pt, Shading, Size};

/// Drawing command in page space: origin top-left, y grows downwards.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SaveState,
    RestoreState,
    // Counter-clockwise (as seen on the page) rotation about (cx, cy).
    Rotate {
        degrees: f32,
        cx: Pt,
        cy: Pt,
    },
    SetFillColor(Color),
    SetStrokeColor(Color),
    SetLineWidth(Pt),
    SetLineCap(u8),
    SetLineJoin(u8),
    // Applies both fill and stroke alpha (ca/CA). Values outside 0..1 are clamped.
    SetOpacity {
        fill: f32,
        stroke: f32,
    },
    SetFontWeight(FontWeight),
    SetFontSize(Pt),
    SetLetterSpacing(Pt),
    MoveTo {
        x: Pt,
        y: Pt,
    },
    LineTo {
        x: Pt,
        y: Pt,
    },
    CurveTo {
        x1: Pt,
        y1: Pt,
        x2: Pt,
        y2: Pt,
        x: Pt,
        y: Pt,
    },
    ClosePath,
    Fill,
    Stroke,
    DrawRect {
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
    },
    // Paints the whole page area with the shading.
    ShadingFill(Shading),
    // `y` is the text baseline.
    DrawString {
        x: Pt,
        y: Pt,
        text: String,
    },
}

#[derive(Debug, Clone)]
pub struct Page {
    pub commands: Vec<Command>,
}

impl Page {
    fn new() -> Self {
        Self {
            commands: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    pub page_size: Size,
    pub pages: Vec<Page>,
}

impl Document {
    /// Every string drawn on any page, in drawing order.
    pub fn strings(&self) -> impl Iterator<Item = &str> {
        self.pages
            .iter()
            .flat_map(|page| page.commands.iter())
            .filter_map(|cmd| match cmd {
                Command::DrawString { text, .. } => Some(text.as_str()),
                _ => None,
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
struct GraphicsState {
    fill_color: Color,
    stroke_color: Color,
    line_width: Pt,
    line_cap: u8,
    line_join: u8,
    opacity: (f32, f32),
    font_weight: FontWeight,
    font_size: Pt,
    letter_spacing: Pt,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            fill_color: Color::BLACK,
            stroke_color: Color::BLACK,
            line_width: Pt::from_f32(1.0),
            line_cap: 0,
            line_join: 0,
            opacity: (1.0, 1.0),
            font_weight: FontWeight::Regular,
            font_size: Pt::from_f32(12.0),
            letter_spacing: Pt::ZERO,
        }
    }
}

pub struct Canvas {
    page_size: Size,
    pages: Vec<Page>,
    current: Page,
    state_stack: Vec<GraphicsState>,
    current_state: GraphicsState,
}

impl Canvas {
    pub fn new(page_size: Size) -> Self {
        Self {
            page_size,
            pages: Vec::new(),
            current: Page::new(),
            state_stack: Vec::new(),
            current_state: GraphicsState::default(),
        }
    }

    pub fn page_size(&self) -> Size {
        self.page_size
    }

    pub fn save_state(&mut self) {
        self.state_stack.push(self.current_state.clone());
        self.current.commands.push(Command::SaveState);
    }

    pub fn restore_state(&mut self) {
        if let Some(state) = self.state_stack.pop() {
            self.current_state = state;
            self.current.commands.push(Command::RestoreState);
        }
    }

    pub fn rotate_about(&mut self, degrees: f32, cx: Pt, cy: Pt) {
        self.current
            .commands
            .push(Command::Rotate { degrees, cx, cy });
    }

    pub fn set_fill_color(&mut self, color: Color) {
        if self.current_state.fill_color == color {
            return;
        }
        self.current_state.fill_color = color;
        self.current.commands.push(Command::SetFillColor(color));
    }

    pub fn set_stroke_color(&mut self, color: Color) {
        if self.current_state.stroke_color == color {
            return;
        }
        self.current_state.stroke_color = color;
        self.current.commands.push(Command::SetStrokeColor(color));
    }

    pub fn set_line_width(&mut self, width: Pt) {
        let width = if width < Pt::ZERO { Pt::ZERO } else { width };
        if self.current_state.line_width == width {
            return;
        }
        self.current_state.line_width = width;
        self.current.commands.push(Command::SetLineWidth(width));
    }

    pub fn set_line_cap(&mut self, cap: u8) {
        if self.current_state.line_cap == cap {
            return;
        }
        self.current_state.line_cap = cap;
        self.current.commands.push(Command::SetLineCap(cap));
    }

    pub fn set_line_join(&mut self, join: u8) {
        if self.current_state.line_join == join {
            return;
        }
        self.current_state.line_join = join;
        self.current.commands.push(Command::SetLineJoin(join));
    }

    pub fn set_opacity(&mut self, fill: f32, stroke: f32) {
        let pair = (fill.clamp(0.0, 1.0), stroke.clamp(0.0, 1.0));
        if self.current_state.opacity == pair {
            return;
        }
        self.current_state.opacity = pair;
        self.current.commands.push(Command::SetOpacity {
            fill: pair.0,
            stroke: pair.1,
        });
    }

    pub fn set_font_weight(&mut self, weight: FontWeight) {
        if self.current_state.font_weight == weight {
            return;
        }
        self.current_state.font_weight = weight;
        self.current.commands.push(Command::SetFontWeight(weight));
    }

    pub fn set_font_size(&mut self, size: Pt) {
        if self.current_state.font_size == size {
            return;
        }
        self.current_state.font_size = size;
        self.current.commands.push(Command::SetFontSize(size));
    }

    pub fn set_letter_spacing(&mut self, spacing: Pt) {
        if self.current_state.letter_spacing == spacing {
            return;
        }
        self.current_state.letter_spacing = spacing;
        self.current.commands.push(Command::SetLetterSpacing(spacing));
    }

    pub fn move_to(&mut self, x: Pt, y: Pt) {
        self.current.commands.push(Command::MoveTo { x, y });
    }

    pub fn line_to(&mut self, x: Pt, y: Pt) {
        self.current.commands.push(Command::LineTo { x, y });
    }

    pub fn curve_to(&mut self, x1: Pt, y1: Pt, x2: Pt, y2: Pt, x: Pt, y: Pt) {
        self.current.commands.push(Command::CurveTo {
            x1,
            y1,
            x2,
            y2,
            x,
            y,
        });
    }

    pub fn close_path(&mut self) {
        self.current.commands.push(Command::ClosePath);
    }

    pub fn fill(&mut self) {
        self.current.commands.push(Command::Fill);
    }

    pub fn stroke(&mut self) {
        self.current.commands.push(Command::Stroke);
    }

    pub fn draw_rect(&mut self, x: Pt, y: Pt, width: Pt, height: Pt) {
        self.current.commands.push(Command::DrawRect {
            x,
            y,
            width,
            height,
        });
    }

    pub fn shading_fill(&mut self, shading: Shading) {
        self.current.commands.push(Command::ShadingFill(shading));
    }

    pub fn draw_string(&mut self, x: Pt, y: Pt, text: impl Into<String>) {
        self.current.commands.push(Command::DrawString {
            x,
            y,
            text: text.into(),
        });
    }

    pub fn show_page(&mut self) {
        let current = std::mem::replace(&mut self.current, Page::new());
        self.pages.push(current);
        self.state_stack.clear();
        self.current_state = GraphicsState::default();
    }

    pub fn finish(mut self) -> Document {
        if !self.current.commands.is_empty() || self.pages.is_empty() {
            self.show_page();
        }
        Document {
            page_size: self.page_size,
            pages: self.pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redundant_state_changes_are_not_recorded() {
        let mut canvas = Canvas::new(Size::square(100.0));
        canvas.set_fill_color(Color::WHITE);
        canvas.set_fill_color(Color::WHITE);
        canvas.set_font_size(Pt::from_f32(12.0));
        canvas.set_opacity(1.0, 1.0);
        let doc = canvas.finish();
        assert_eq!(doc.pages[0].commands, vec![Command::SetFillColor(Color::WHITE)]);
    }

    #[test]
    fn restore_resets_tracked_state() {
        let mut canvas = Canvas::new(Size::square(100.0));
        canvas.save_state();
        canvas.set_opacity(0.5, 0.5);
        canvas.restore_state();
        canvas.set_opacity(0.5, 0.5);
        let doc = canvas.finish();
        let opacity_changes = doc.pages[0]
            .commands
            .iter()
            .filter(|cmd| matches!(cmd, Command::SetOpacity { .. }))
            .count();
        assert_eq!(opacity_changes, 2);
    }

    #[test]
    fn finish_always_yields_a_page() {
        let doc = Canvas::new(Size::a4_landscape()).finish();
        assert_eq!(doc.pages.len(), 1);
        assert!(doc.pages[0].commands.is_empty());
    }

    #[test]
    fn strings_lists_text_in_order() {
        let mut canvas = Canvas::new(Size::square(100.0));
        canvas.draw_string(Pt::ZERO, Pt::from_f32(10.0), "one");
        canvas.draw_rect(Pt::ZERO, Pt::ZERO, Pt::from_f32(1.0), Pt::from_f32(1.0));
        canvas.draw_string(Pt::ZERO, Pt::from_f32(20.0), "two");
        let doc = canvas.finish();
        assert_eq!(doc.strings().collect::<Vec<_>>(), vec!["one", "two"]);
    }
}
