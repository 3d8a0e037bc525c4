// ============================================================================
// COMMANDS — immutable, replayable records of one edit each
// ============================================================================

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::mask::SelectionMask;
use crate::ops::stroke::StrokePoint;
use crate::ops::text::FontCatalog;
use crate::page::{self, PageId, rgba_serde};
use crate::style::{Color, ShapeKind, StrokeStyle, TextStyle, ToolKind};

/// One recorded edit. Every payload is deep-copied at construction and never
/// mutated afterwards, so replaying the same command list over a blank page
/// always lands on the same pixels. "Editing" a command means building a new
/// one and swapping the history slot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Command {
    Stroke {
        points: Vec<StrokePoint>,
        tool: ToolKind,
        style: StrokeStyle,
        page: PageId,
    },
    Shape {
        kind: ShapeKind,
        start: (f32, f32),
        end: (f32, f32),
        style: StrokeStyle,
        page: PageId,
    },
    Fill {
        x: i32,
        y: i32,
        color: Color,
        page: PageId,
    },
    Text {
        text: String,
        x: f32,
        y: f32,
        style: TextStyle,
        page: PageId,
    },
    Paste {
        #[serde(with = "rgba_serde")]
        image: RgbaImage,
        x: i32,
        y: i32,
        page: PageId,
    },
    SelectionClear {
        mask: SelectionMask,
    },
    SelectionFill {
        mask: SelectionMask,
        style: StrokeStyle,
    },
    SelectionMove {
        mask: SelectionMask,
        /// Page-sized snapshot of the moved pixels; everything outside the
        /// mask is fully transparent.
        #[serde(with = "rgba_serde")]
        floating: RgbaImage,
        dx: i32,
        dy: i32,
    },
}

impl Command {
    pub fn stroke(points: &[StrokePoint], tool: ToolKind, style: &StrokeStyle, page: PageId) -> Self {
        Command::Stroke {
            points: points.to_vec(),
            tool,
            style: style.clone(),
            page,
        }
    }

    pub fn shape(
        kind: ShapeKind,
        start: (f32, f32),
        end: (f32, f32),
        style: &StrokeStyle,
        page: PageId,
    ) -> Self {
        Command::Shape {
            kind,
            start,
            end,
            style: style.clone(),
            page,
        }
    }

    pub fn fill(x: i32, y: i32, color: Color, page: PageId) -> Self {
        Command::Fill { x, y, color, page }
    }

    /// Text commands never hold empty or whitespace-only content; that case
    /// returns `None` and the caller drops (or removes) the entry instead.
    pub fn text(text: &str, x: f32, y: f32, style: &TextStyle, page: PageId) -> Option<Self> {
        if text.trim().is_empty() {
            return None;
        }
        Some(Command::Text {
            text: text.to_string(),
            x,
            y,
            style: style.clone(),
            page,
        })
    }

    pub fn paste(image: &RgbaImage, x: i32, y: i32, page: PageId) -> Self {
        Command::Paste {
            image: image.clone(),
            x,
            y,
            page,
        }
    }

    pub fn selection_clear(mask: &SelectionMask) -> Self {
        Command::SelectionClear { mask: mask.clone() }
    }

    pub fn selection_fill(mask: &SelectionMask, style: &StrokeStyle) -> Self {
        Command::SelectionFill {
            mask: mask.clone(),
            style: style.clone(),
        }
    }

    pub fn selection_move(mask: &SelectionMask, floating: &RgbaImage, dx: i32, dy: i32) -> Self {
        Command::SelectionMove {
            mask: mask.clone(),
            floating: floating.clone(),
            dx,
            dy,
        }
    }

    /// The page this edit was recorded against.
    pub fn page(&self) -> PageId {
        match self {
            Command::Stroke { page, .. }
            | Command::Shape { page, .. }
            | Command::Fill { page, .. }
            | Command::Text { page, .. }
            | Command::Paste { page, .. } => *page,
            Command::SelectionClear { mask } => mask.page(),
            Command::SelectionFill { mask, .. } => mask.page(),
            Command::SelectionMove { mask, .. } => mask.page(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Command::Stroke { .. } => "Stroke",
            Command::Shape { .. } => "Shape",
            Command::Fill { .. } => "Fill",
            Command::Text { .. } => "Text",
            Command::Paste { .. } => "Paste",
            Command::SelectionClear { .. } => "Clear Selection",
            Command::SelectionFill { .. } => "Fill Selection",
            Command::SelectionMove { .. } => "Move Selection",
        }
    }

    /// Approximate heap footprint, for history accounting.
    pub fn memory_size(&self) -> usize {
        let payload = match self {
            Command::Stroke { points, .. } => points.len() * std::mem::size_of::<StrokePoint>(),
            Command::Shape { .. } | Command::Fill { .. } => 0,
            Command::Text { text, .. } => text.len(),
            Command::Paste { image, .. } => image.as_raw().len(),
            Command::SelectionClear { mask } => mask.as_image().as_raw().len(),
            Command::SelectionFill { mask, .. } => mask.as_image().as_raw().len(),
            Command::SelectionMove { mask, floating, .. } => {
                mask.as_image().as_raw().len() + floating.as_raw().len()
            }
        };
        std::mem::size_of::<Command>() + payload
    }

    /// The recorded text, for re-edit flows. `None` for non-text commands.
    pub fn text_content(&self) -> Option<&str> {
        match self {
            Command::Text { text, .. } => Some(text),
            _ => None,
        }
    }

    /// Deterministically re-render this edit onto the page. Reads nothing
    /// mutable beyond the page itself; fonts are resolved from the immutable
    /// catalog handed in by the caller.
    pub fn draw(&self, page: &mut RgbaImage, fonts: &FontCatalog) {
        match self {
            Command::Stroke {
                points, tool, style, ..
            } => crate::ops::stroke::draw_stroke(page, points, *tool, style),
            Command::Shape {
                kind, start, end, style, ..
            } => crate::ops::shapes::draw_shape(page, *kind, *start, *end, style),
            Command::Fill { x, y, color, .. } => {
                crate::flood::flood_fill(page, *x, *y, *color);
            }
            Command::Text { text, x, y, style, .. } => {
                crate::ops::text::draw_text(page, text, *x, *y, style, fonts)
            }
            Command::Paste { image, x, y, .. } => page::composite_image(page, image, *x, *y),
            Command::SelectionClear { mask } => {
                page::fill_masked(page, mask.as_image(), [255, 255, 255, 255])
            }
            Command::SelectionFill { mask, style } => {
                let color = [style.color.r, style.color.g, style.color.b, style.alpha()];
                page::fill_masked(page, mask.as_image(), color)
            }
            Command::SelectionMove {
                mask, floating, dx, dy,
            } => {
                // Atomic redraw of a committed move: open the hole at the
                // source, then land the floating pixels at the offset.
                page::fill_masked(page, mask.as_image(), [255, 255, 255, 255]);
                page::composite_image(page, floating, *dx, *dy);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgba};

    fn white_page(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255]))
    }

    fn one_pixel_mask(w: u32, h: u32, x: u32, y: u32) -> SelectionMask {
        let mut img = GrayImage::new(w, h);
        img.put_pixel(x, y, Luma([255]));
        SelectionMask::new(PageId::new(), img)
    }

    #[test]
    fn test_fill_draw_end_to_end() {
        let mut page = white_page(2, 2);
        let cmd = Command::fill(0, 0, Color::rgb(255, 0, 0), PageId::new());
        cmd.draw(&mut page, &FontCatalog::new());
        assert!(page.pixels().all(|p| p.0 == [255, 0, 0, 255]));
    }

    #[test]
    fn test_stroke_deep_copies_points() {
        let mut source = vec![StrokePoint::new(4.0, 4.0)];
        let style = StrokeStyle::default();
        let cmd = Command::stroke(&source, ToolKind::Pen, &style, PageId::new());

        let mut expected = white_page(8, 8);
        cmd.draw(&mut expected, &FontCatalog::new());

        // Mutating the caller's data must not change later replays.
        source[0] = StrokePoint::new(0.0, 0.0);
        source.push(StrokePoint::new(7.0, 7.0));
        let mut replayed = white_page(8, 8);
        cmd.draw(&mut replayed, &FontCatalog::new());
        assert_eq!(replayed.as_raw(), expected.as_raw());
    }

    #[test]
    fn test_paste_deep_copies_image() {
        let mut source = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 255, 255]));
        let cmd = Command::paste(&source, 1, 1, PageId::new());
        source.put_pixel(0, 0, Rgba([255, 0, 0, 255]));

        let mut page = white_page(4, 4);
        cmd.draw(&mut page, &FontCatalog::new());
        assert_eq!(*page.get_pixel(1, 1), Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn test_selection_commands_deep_copy_mask() {
        let mut live = one_pixel_mask(4, 4, 1, 1);
        let cmd = Command::selection_clear(&live);
        live.shift(2, 2);

        let mut page = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255]));
        cmd.draw(&mut page, &FontCatalog::new());
        // Still clears the original position, not the shifted one.
        assert_eq!(*page.get_pixel(1, 1), Rgba([255, 255, 255, 255]));
        assert_eq!(*page.get_pixel(3, 3), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_text_rejects_blank_content() {
        let style = TextStyle::default();
        let page = PageId::new();
        assert!(Command::text("", 0.0, 0.0, &style, page).is_none());
        assert!(Command::text("  \n\t ", 0.0, 0.0, &style, page).is_none());
        assert!(Command::text("hi", 0.0, 0.0, &style, page).is_some());
    }

    #[test]
    fn test_selection_fill_writes_stored_alpha() {
        let mask = one_pixel_mask(2, 2, 0, 0);
        let style = StrokeStyle {
            color: Color::rgb(10, 20, 30),
            opacity: 50,
            ..StrokeStyle::default()
        };
        let cmd = Command::selection_fill(&mask, &style);
        let mut page = white_page(2, 2);
        cmd.draw(&mut page, &FontCatalog::new());
        // Overwrite, not blend: the stored alpha byte lands as-is.
        assert_eq!(*page.get_pixel(0, 0), Rgba([10, 20, 30, 128]));
        assert_eq!(*page.get_pixel(1, 1), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_selection_move_erases_then_lands() {
        let mut page = white_page(4, 4);
        page.put_pixel(0, 0, Rgba([5, 5, 5, 255]));

        let mask = one_pixel_mask(4, 4, 0, 0);
        let mut floating = RgbaImage::new(4, 4);
        floating.put_pixel(0, 0, Rgba([5, 5, 5, 255]));

        let cmd = Command::selection_move(&mask, &floating, 2, 1);
        cmd.draw(&mut page, &FontCatalog::new());
        assert_eq!(*page.get_pixel(0, 0), Rgba([255, 255, 255, 255]));
        assert_eq!(*page.get_pixel(2, 1), Rgba([5, 5, 5, 255]));
    }

    #[test]
    fn test_command_serde_round_trip() {
        let mask = one_pixel_mask(3, 3, 2, 0);
        let commands = vec![
            Command::fill(1, 2, Color::rgb(9, 8, 7), PageId::new()),
            Command::stroke(
                &[StrokePoint::with_pressure(1.0, 2.0, 0.5)],
                ToolKind::Marker,
                &StrokeStyle::default(),
                PageId::new(),
            ),
            Command::shape(ShapeKind::Circle, (0.0, 0.0), (4.0, 4.0), &StrokeStyle::default(), PageId::new()),
            Command::text("note", 3.0, 4.0, &TextStyle::default(), PageId::new()).unwrap(),
            Command::paste(&RgbaImage::new(2, 2), 0, 0, PageId::new()),
            Command::selection_clear(&mask),
            Command::selection_move(&mask, &RgbaImage::new(3, 3), 1, -1),
        ];
        let bytes = bincode::serialize(&commands).unwrap();
        let back: Vec<Command> = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, commands);
    }
}
