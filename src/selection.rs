// ============================================================================
// SELECTION ENGINE — wand masks, move gesture, destructive + clipboard ops
// ============================================================================

use image::RgbaImage;

use crate::command::Command;
use crate::flood::{self, WAND_TOLERANCE};
use crate::history::HistoryManager;
use crate::mask::SelectionMask;
use crate::ops::clipboard;
use crate::page::{self, PageId};
use crate::style::StrokeStyle;

/// Phase of the drag gesture that moves selected pixels.
enum MoveState {
    Idle,
    Moving {
        /// Page-sized capture of the selected pixels taken at drag start;
        /// everything outside the mask is transparent.
        floating: RgbaImage,
        start: (f32, f32),
        dx: i32,
        dy: i32,
    },
}

/// Overlay data for rendering an in-flight move: the floating pixels, the
/// mask they were lifted through, and the current displacement.
pub struct MovePreview<'a> {
    pub floating: &'a RgbaImage,
    pub mask: &'a SelectionMask,
    pub dx: i32,
    pub dy: i32,
}

/// Owns the live selection mask and every operation acting through it.
///
/// The engine never keeps a reference to a page buffer between calls; each
/// operation borrows the buffer it works on for its own duration. Commands
/// built here deep-copy the mask, so history entries stay valid after the
/// live selection changes or is dropped.
pub struct SelectionEngine {
    mask: Option<SelectionMask>,
    move_state: MoveState,
    needs_redraw: bool,
}

impl Default for SelectionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionEngine {
    pub fn new() -> Self {
        Self {
            mask: None,
            move_state: MoveState::Idle,
            needs_redraw: false,
        }
    }

    // ------------------------------------------------------------------------
    // Building and dropping masks
    // ------------------------------------------------------------------------

    /// Magic-wand select: grow a mask out from the clicked pixel over every
    /// 4-connected neighbor within the wand tolerance. A click outside the
    /// page clears the current selection instead of erroring.
    pub fn select_by_color(&mut self, buffer: &RgbaImage, page: PageId, x: i32, y: i32) -> bool {
        if self.is_moving() {
            return false;
        }
        match flood::flood_select(buffer, x, y, WAND_TOLERANCE) {
            Some(mask) => {
                let selected = SelectionMask::new(page, mask);
                tracing::debug!(x, y, pixels = selected.selected_count(), "wand select");
                self.mask = Some(selected);
                self.needs_redraw = true;
                true
            }
            None => {
                self.mask = None;
                self.needs_redraw = true;
                false
            }
        }
    }

    /// Select the whole page.
    pub fn select_all(&mut self, page: PageId, width: u32, height: u32) {
        if self.is_moving() {
            return;
        }
        self.mask = Some(SelectionMask::select_all(page, width, height));
        self.needs_redraw = true;
    }

    /// Flip the selection. With no mask, or a mask belonging to some other
    /// page, this falls back to select-all on the requested page.
    pub fn invert(&mut self, page: PageId, width: u32, height: u32) {
        if self.is_moving() {
            return;
        }
        if let Some(mask) = self.mask.as_mut()
            && mask.page() == page
        {
            mask.invert();
        } else {
            self.mask = Some(SelectionMask::select_all(page, width, height));
        }
        self.needs_redraw = true;
    }

    pub fn has_selection(&self) -> bool {
        self.mask.is_some()
    }

    /// The live mask, read-only. Commands that need one take their own copy.
    pub fn selection_mask(&self) -> Option<&SelectionMask> {
        self.mask.as_ref()
    }

    pub fn hit_test(&self, x: i32, y: i32) -> bool {
        self.mask.as_ref().is_some_and(|m| m.contains(x, y))
    }

    /// The live mask only applies to a buffer with its dimensions; after a
    /// page resize the stale mask is refused rather than clipped.
    fn mask_matches(&self, buffer: &RgbaImage) -> bool {
        self.mask
            .as_ref()
            .is_some_and(|m| m.width() == buffer.width() && m.height() == buffer.height())
    }

    /// Drop the selection. No-op while a move is in flight; commit or cancel
    /// the move first so the buffer gets its baseline back.
    pub fn deselect(&mut self) {
        if self.is_moving() {
            tracing::debug!("deselect ignored during move");
            return;
        }
        if self.mask.take().is_some() {
            self.needs_redraw = true;
        }
    }

    // ------------------------------------------------------------------------
    // Move gesture: Idle -> Moving -> committed or cancelled
    // ------------------------------------------------------------------------

    pub fn is_moving(&self) -> bool {
        matches!(self.move_state, MoveState::Moving { .. })
    }

    /// Pointer-down inside the selected region: lift the selected pixels into
    /// a floating snapshot and open a white hole where they were, so the drag
    /// reads as picking the pixels up.
    pub fn begin_move(&mut self, buffer: &mut RgbaImage, page: PageId, x: f32, y: f32) -> bool {
        if self.is_moving() {
            return false;
        }
        let Some(mask) = self.mask.as_ref() else {
            return false;
        };
        if mask.page() != page
            || mask.width() != buffer.width()
            || mask.height() != buffer.height()
            || !mask.contains(x.floor() as i32, y.floor() as i32)
        {
            return false;
        }

        let floating = page::masked_snapshot(buffer, mask.as_image());
        page::fill_masked(buffer, mask.as_image(), [255, 255, 255, 255]);
        self.move_state = MoveState::Moving {
            floating,
            start: (x, y),
            dx: 0,
            dy: 0,
        };
        self.needs_redraw = true;
        tracing::debug!(x, y, "selection move started");
        true
    }

    /// Pointer-move: track the integer displacement from the drag origin and
    /// return it. Only the preview changes; the buffer is not touched until
    /// commit. `None` when no move is in flight.
    pub fn update_move(&mut self, x: f32, y: f32) -> Option<(i32, i32)> {
        let MoveState::Moving { start, dx, dy, .. } = &mut self.move_state else {
            return None;
        };
        *dx = (x - start.0).round() as i32;
        *dy = (y - start.1).round() as i32;
        self.needs_redraw = true;
        Some((*dx, *dy))
    }

    /// Overlay data for rendering the drag. `None` when no move is in flight.
    pub fn move_preview(&self) -> Option<MovePreview<'_>> {
        if let MoveState::Moving { floating, dx, dy, .. } = &self.move_state
            && let Some(mask) = self.mask.as_ref()
        {
            Some(MovePreview {
                floating,
                mask,
                dx: *dx,
                dy: *dy,
            })
        } else {
            None
        }
    }

    /// Pointer-up: land the floating pixels. The buffer first returns to its
    /// pre-drag baseline; a zero displacement ends there, pushing nothing.
    /// Otherwise the move is applied and recorded as one replayable command,
    /// and the live mask shifts to the landing position.
    pub fn commit_move(&mut self, buffer: &mut RgbaImage, history: &mut HistoryManager) -> bool {
        let MoveState::Moving { floating, dx, dy, .. } =
            std::mem::replace(&mut self.move_state, MoveState::Idle)
        else {
            return false;
        };
        let Some(mask) = self.mask.as_mut() else {
            return false;
        };

        page::restore_masked(buffer, mask.as_image(), &floating);
        if dx == 0 && dy == 0 {
            self.needs_redraw = true;
            return true;
        }

        let command = Command::selection_move(mask, &floating, dx, dy);
        page::fill_masked(buffer, mask.as_image(), [255, 255, 255, 255]);
        page::composite_image(buffer, &floating, dx, dy);
        history.push(command);
        mask.shift(dx, dy);
        self.needs_redraw = true;
        tracing::debug!(dx, dy, "selection move committed");
        true
    }

    /// Abort the drag: byte-exact restore of the lifted pixels, mask left
    /// where it was, nothing recorded.
    pub fn cancel_move(&mut self, buffer: &mut RgbaImage) -> bool {
        let MoveState::Moving { floating, .. } =
            std::mem::replace(&mut self.move_state, MoveState::Idle)
        else {
            return false;
        };
        if let Some(mask) = self.mask.as_ref() {
            page::restore_masked(buffer, mask.as_image(), &floating);
        }
        self.needs_redraw = true;
        tracing::debug!("selection move cancelled");
        true
    }

    /// Tool switch or page change: cancel any in-flight move and drop the
    /// selection entirely.
    pub fn deactivate(&mut self, buffer: &mut RgbaImage) {
        self.cancel_move(buffer);
        self.mask = None;
        self.needs_redraw = true;
    }

    // ------------------------------------------------------------------------
    // Destructive operations — each consumes the mask on success
    // ------------------------------------------------------------------------

    /// Erase the selected pixels to opaque white and record the edit.
    pub fn delete_selection(&mut self, buffer: &mut RgbaImage, history: &mut HistoryManager) -> bool {
        if self.is_moving() || !self.mask_matches(buffer) {
            return false;
        }
        let Some(mask) = self.mask.take() else {
            return false;
        };
        let command = Command::selection_clear(&mask);
        page::fill_masked(buffer, mask.as_image(), [255, 255, 255, 255]);
        history.push(command);
        self.needs_redraw = true;
        tracing::debug!(pixels = mask.selected_count(), "selection deleted");
        true
    }

    /// Overwrite the selected pixels with the style's color at its
    /// opacity-derived alpha and record the edit.
    pub fn fill_selection(
        &mut self,
        buffer: &mut RgbaImage,
        style: &StrokeStyle,
        history: &mut HistoryManager,
    ) -> bool {
        if self.is_moving() || !self.mask_matches(buffer) {
            return false;
        }
        let Some(mask) = self.mask.take() else {
            return false;
        };
        let command = Command::selection_fill(&mask, style);
        let color = [style.color.r, style.color.g, style.color.b, style.alpha()];
        page::fill_masked(buffer, mask.as_image(), color);
        history.push(command);
        self.needs_redraw = true;
        true
    }

    // ------------------------------------------------------------------------
    // Clipboard
    // ------------------------------------------------------------------------

    /// Copy the selected pixels, cropped to the mask's bounding box with
    /// unselected pixels transparent. False when nothing is selected, the
    /// mask has no set bits, or the clipboard refuses the image.
    pub fn copy_selection(&self, buffer: &RgbaImage) -> bool {
        if self.is_moving() || !self.mask_matches(buffer) {
            return false;
        }
        let Some(mask) = self.mask.as_ref() else {
            return false;
        };
        let Some((min_x, min_y, max_x, max_y)) = mask.bounds() else {
            return false;
        };

        let (w, h) = (max_x - min_x + 1, max_y - min_y + 1);
        let mask_img = mask.as_image();
        let mut cropped = RgbaImage::new(w, h);
        for y in 0..h {
            for x in 0..w {
                let (px, py) = (min_x + x, min_y + y);
                if mask_img.get_pixel(px, py)[0] > 0 {
                    cropped.put_pixel(x, y, *buffer.get_pixel(px, py));
                }
            }
        }
        clipboard::copy_image(cropped)
    }

    /// Copy, then delete. A failed copy aborts before anything changes, so
    /// the selection survives for a retry.
    pub fn cut_selection(&mut self, buffer: &mut RgbaImage, history: &mut HistoryManager) -> bool {
        if !self.copy_selection(buffer) {
            return false;
        }
        self.delete_selection(buffer, history)
    }

    /// One-shot redraw notification, set by anything that changed what the
    /// screen should show.
    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.needs_redraw)
    }
}
