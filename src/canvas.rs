use crate::types::{Color, Rect};

/// Horizontal anchoring of a `DrawString` run relative to its `x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAnchor {
    Start,
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SaveState,
    RestoreState,
    SetFillColor(Color),
    SetStrokeColor(Color),
    SetLineWidth(f32),
    // Empty pattern resets to a solid line.
    SetDash(Vec<f32>),
    // Applies to fills and strokes alike. Values outside 0..1 are clamped.
    SetOpacity(f32),
    SetFontName(String),
    SetFontSize(f32),
    FillRect(Rect),
    FillRoundedRect {
        rect: Rect,
        radius: f32,
    },
    StrokeRect(Rect),
    StrokeRoundedRect {
        rect: Rect,
        radius: f32,
    },
    Line {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
    },
    // `y` is the text baseline.
    DrawString {
        x: f32,
        y: f32,
        text: String,
        anchor: TextAnchor,
    },
    // The image is fitted inside `rect` without distortion and centered.
    DrawImage {
        rect: Rect,
        source: String,
    },
}

/// Hit box of an editable field, recorded while painting.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldBox<F> {
    pub field: F,
    pub rect: Rect,
}

/// The painted form of a surface: an ordered command list plus the full
/// scrollable extent it covers.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayList<F> {
    pub width: f32,
    pub height: f32,
    pub commands: Vec<Command>,
    pub fields: Vec<FieldBox<F>>,
}

impl<F> DisplayList<F> {
    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    pub fn image_sources(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().filter_map(|cmd| match cmd {
            Command::DrawImage { source, .. } => Some(source.as_str()),
            _ => None,
        })
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().filter_map(|cmd| match cmd {
            Command::DrawString { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn contains_text(&self, needle: &str) -> bool {
        self.texts().any(|text| text.contains(needle))
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    fill_color: Color,
    stroke_color: Color,
    line_width: f32,
    font_size: f32,
    font_name: String,
}

/// Records drawing commands, tracking just enough state to skip redundant
/// color and font changes.
pub struct Canvas<F> {
    width: f32,
    commands: Vec<Command>,
    fields: Vec<FieldBox<F>>,
    state_stack: Vec<GraphicsState>,
    current_state: GraphicsState,
}

impl<F> Canvas<F> {
    pub fn new(width: f32) -> Self {
        Self {
            width,
            commands: Vec::new(),
            fields: Vec::new(),
            state_stack: Vec::new(),
            current_state: GraphicsState {
                fill_color: Color::BLACK,
                stroke_color: Color::BLACK,
                line_width: 1.0,
                font_size: 12.0,
                font_name: "Helvetica".to_string(),
            },
        }
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn save_state(&mut self) {
        self.state_stack.push(self.current_state.clone());
        self.commands.push(Command::SaveState);
    }

    pub fn restore_state(&mut self) {
        if let Some(state) = self.state_stack.pop() {
            self.current_state = state;
            self.commands.push(Command::RestoreState);
        }
    }

    pub fn set_fill_color(&mut self, color: Color) {
        if self.current_state.fill_color != color {
            self.current_state.fill_color = color;
            self.commands.push(Command::SetFillColor(color));
        }
    }

    pub fn set_stroke_color(&mut self, color: Color) {
        if self.current_state.stroke_color != color {
            self.current_state.stroke_color = color;
            self.commands.push(Command::SetStrokeColor(color));
        }
    }

    pub fn set_line_width(&mut self, width: f32) {
        let width = width.max(0.0);
        if self.current_state.line_width != width {
            self.current_state.line_width = width;
            self.commands.push(Command::SetLineWidth(width));
        }
    }

    pub fn set_dash(&mut self, pattern: Vec<f32>) {
        self.commands.push(Command::SetDash(pattern));
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        self.commands.push(Command::SetOpacity(opacity));
    }

    pub fn set_font(&mut self, name: &str, size: f32) {
        if self.current_state.font_name != name {
            self.current_state.font_name = name.to_string();
            self.commands.push(Command::SetFontName(name.to_string()));
        }
        if self.current_state.font_size != size {
            self.current_state.font_size = size;
            self.commands.push(Command::SetFontSize(size));
        }
    }

    pub fn font_name(&self) -> &str {
        &self.current_state.font_name
    }

    pub fn font_size(&self) -> f32 {
        self.current_state.font_size
    }

    pub fn fill_rect(&mut self, rect: Rect) {
        self.commands.push(Command::FillRect(rect));
    }

    pub fn fill_rounded_rect(&mut self, rect: Rect, radius: f32) {
        self.commands.push(Command::FillRoundedRect { rect, radius });
    }

    pub fn stroke_rect(&mut self, rect: Rect) {
        self.commands.push(Command::StrokeRect(rect));
    }

    pub fn stroke_rounded_rect(&mut self, rect: Rect, radius: f32) {
        self.commands.push(Command::StrokeRoundedRect { rect, radius });
    }

    pub fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32) {
        self.commands.push(Command::Line { x1, y1, x2, y2 });
    }

    pub fn draw_string(&mut self, x: f32, y: f32, text: impl Into<String>) {
        self.push_string(x, y, text.into(), TextAnchor::Start);
    }

    pub fn draw_string_end(&mut self, x: f32, y: f32, text: impl Into<String>) {
        self.push_string(x, y, text.into(), TextAnchor::End);
    }

    fn push_string(&mut self, x: f32, y: f32, text: String, anchor: TextAnchor) {
        if text.is_empty() {
            return;
        }
        self.commands.push(Command::DrawString {
            x,
            y,
            text,
            anchor,
        });
    }

    pub fn draw_image(&mut self, rect: Rect, source: impl Into<String>) {
        self.commands.push(Command::DrawImage {
            rect,
            source: source.into(),
        });
    }

    pub fn fields(&self) -> &[FieldBox<F>] {
        &self.fields
    }

    pub fn record_field(&mut self, field: F, rect: Rect) {
        self.fields.push(FieldBox { field, rect });
    }

    pub fn finish(self, height: f32) -> DisplayList<F> {
        DisplayList {
            width: self.width,
            height,
            commands: self.commands,
            fields: self.fields,
        }
    }
}
