use serde::{Deserialize, Serialize};

/// An RGBA color, 8 bits per channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parse a `#rgb`, `#rrggbb` or `#rrggbbaa` hex string (leading `#`
    /// optional). Returns `None` for anything malformed — callers treat
    /// that as "no color, do nothing".
    pub fn from_hex(s: &str) -> Option<Self> {
        let hex = s.trim().strip_prefix('#').unwrap_or(s.trim());
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        match hex.len() {
            3 => {
                let val = u32::from_str_radix(hex, 16).ok()?;
                let r = ((val >> 8) & 0xF) as u8;
                let g = ((val >> 4) & 0xF) as u8;
                let b = (val & 0xF) as u8;
                // 0xF -> 0xFF expansion
                Some(Color::rgb(r << 4 | r, g << 4 | g, b << 4 | b))
            }
            6 => {
                let val = u32::from_str_radix(hex, 16).ok()?;
                Some(Color::rgb(
                    ((val >> 16) & 0xFF) as u8,
                    ((val >> 8) & 0xFF) as u8,
                    (val & 0xFF) as u8,
                ))
            }
            8 => {
                let val = u32::from_str_radix(hex, 16).ok()?;
                Some(Color::rgba(
                    ((val >> 24) & 0xFF) as u8,
                    ((val >> 16) & 0xFF) as u8,
                    ((val >> 8) & 0xFF) as u8,
                    (val & 0xFF) as u8,
                ))
            }
            _ => None,
        }
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// Drawing tool variants. Each renders its stroke path differently.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolKind {
    /// Uniform-width hard-edged path.
    Pen,
    /// Textured path: each dab is jittered by a deterministic positional hash.
    Pencil,
    /// Soft-edged path with a smoothstep alpha falloff.
    Marker,
    /// Destination-out: knocks alpha out of the buffer instead of painting.
    Eraser,
}

impl ToolKind {
    pub fn label(&self) -> &'static str {
        match self {
            ToolKind::Pen => "Pen",
            ToolKind::Pencil => "Pencil",
            ToolKind::Marker => "Marker",
            ToolKind::Eraser => "Eraser",
        }
    }

    pub fn all() -> &'static [ToolKind] {
        &[
            ToolKind::Pen,
            ToolKind::Pencil,
            ToolKind::Marker,
            ToolKind::Eraser,
        ]
    }
}

/// Shape primitives drawable from two anchor points.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeKind {
    Line,
    Rect,
    Circle,
}

impl ShapeKind {
    pub fn label(&self) -> &'static str {
        match self {
            ShapeKind::Line => "Line",
            ShapeKind::Rect => "Rectangle",
            ShapeKind::Circle => "Circle",
        }
    }

    pub fn all() -> &'static [ShapeKind] {
        &[ShapeKind::Line, ShapeKind::Rect, ShapeKind::Circle]
    }
}

/// Snapshot of the stroke/fill styling active when a command was recorded.
/// Captured by value into every command so replay never consults live state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrokeStyle {
    /// Brush diameter in pixels.
    pub size: f32,
    pub color: Color,
    /// 0–100 percent; commands derive alpha as `round(opacity / 100 * 255)`.
    pub opacity: u8,
    /// 0.0 (airbrush-soft) to 1.0 (hard edge). Pen and Pencil pin it to 1.0.
    pub hardness: f32,
    /// When true, per-point pressure scales the dab radius.
    pub pressure_enabled: bool,
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self {
            size: 4.0,
            color: Color::BLACK,
            opacity: 100,
            hardness: 0.75,
            pressure_enabled: false,
        }
    }
}

impl StrokeStyle {
    /// Alpha byte derived from the percentage opacity.
    pub fn alpha(&self) -> u8 {
        ((self.opacity.min(100) as f32 / 100.0) * 255.0).round() as u8
    }
}

/// Horizontal alignment for text lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

impl TextAlign {
    pub fn label(&self) -> &'static str {
        match self {
            TextAlign::Left => "Left",
            TextAlign::Center => "Center",
            TextAlign::Right => "Right",
        }
    }
}

/// Text styling captured into Text commands.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    pub font_size: f32,
    pub color: Color,
    /// Multiplier on `font_size`; line `i` renders at `y + i * font_size * line_height`.
    pub line_height: f32,
    pub align: TextAlign,
    pub font_family: String,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_size: 24.0,
            color: Color::BLACK,
            line_height: 1.2,
            align: TextAlign::Left,
            font_family: "sans-serif".to_string(),
        }
    }
}
