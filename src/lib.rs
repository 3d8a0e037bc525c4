//! Inkpad core - replayable edit history for a multi-page raster surface
//!
//! Everything a drawing surface needs between the input layer and the pixels:
//! - [`Command`] - one immutable, replayable record of an edit
//! - [`HistoryManager`] - bounded undo/redo stacks with snapshot bookkeeping
//! - [`SelectionEngine`] - magic-wand masks, the move gesture, destructive ops
//! - [`flood`] - exact-match bucket fill, offloadable to a worker thread
//! - [`ops`] - the pixel routines commands draw through (strokes, shapes,
//!   text, clipboard)
//!
//! Pages are plain [`image::RgbaImage`] buffers owned by the caller; the
//! engine borrows one for the duration of a single operation and never keeps
//! a reference across calls. Undo is replay-based: the history hands back the
//! commands still live and the caller re-renders from them, optionally
//! fast-forwarding from a cached snapshot.

pub mod command;
pub mod flood;
pub mod history;
pub mod mask;
pub mod ops;
pub mod page;
pub mod selection;
pub mod style;

pub use command::Command;
pub use flood::{FillJob, FillOutcome, WAND_TOLERANCE, fill_css, flood_fill, flood_select, spawn_fill};
pub use history::{ActionLogError, HistoryManager, HistorySnapshot, decode_actions, encode_actions};
pub use mask::SelectionMask;
pub use ops::stroke::StrokePoint;
pub use ops::text::FontCatalog;
pub use page::{PageId, blank_page};
pub use selection::{MovePreview, SelectionEngine};
pub use style::{Color, ShapeKind, StrokeStyle, TextAlign, TextStyle, ToolKind};
