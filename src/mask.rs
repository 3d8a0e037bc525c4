// ============================================================================
// SELECTION MASK — per-pixel selection bound to one page
// ============================================================================

use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};

use crate::page::{PageId, gray_serde};

/// A page-sized selection: one byte per pixel, 255 = selected. The mask
/// remembers which page it was built against; applying it to any other page
/// is invalid and callers check `page()` before doing so.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SelectionMask {
    page: PageId,
    #[serde(with = "gray_serde")]
    mask: GrayImage,
}

impl SelectionMask {
    pub fn new(page: PageId, mask: GrayImage) -> Self {
        Self { page, mask }
    }

    /// Every pixel selected.
    pub fn select_all(page: PageId, width: u32, height: u32) -> Self {
        Self {
            page,
            mask: GrayImage::from_pixel(width, height, Luma([255])),
        }
    }

    pub fn page(&self) -> PageId {
        self.page
    }

    pub fn width(&self) -> u32 {
        self.mask.width()
    }

    pub fn height(&self) -> u32 {
        self.mask.height()
    }

    pub fn as_image(&self) -> &GrayImage {
        &self.mask
    }

    /// Hit test: is `(x, y)` a selected pixel? Out-of-bounds points are not.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        if x < 0 || y < 0 || x >= self.mask.width() as i32 || y >= self.mask.height() as i32 {
            return false;
        }
        self.mask.get_pixel(x as u32, y as u32).0[0] > 0
    }

    /// True when no pixel is selected.
    pub fn is_empty(&self) -> bool {
        self.mask.as_raw().iter().all(|&v| v == 0)
    }

    pub fn selected_count(&self) -> usize {
        self.mask.as_raw().iter().filter(|&&v| v > 0).count()
    }

    /// Flip every bit.
    pub fn invert(&mut self) {
        for v in self.mask.as_mut().iter_mut() {
            *v = if *v > 0 { 0 } else { 255 };
        }
    }

    /// Translate the selection by (dx, dy) pixels. The mask is shifted;
    /// pixels that move off-page are clipped, and newly-exposed areas are
    /// unselected.
    pub fn shift(&mut self, dx: i32, dy: i32) {
        if dx == 0 && dy == 0 {
            return;
        }
        let w = self.mask.width();
        let h = self.mask.height();
        let mut new_mask = GrayImage::new(w, h);

        for y in 0..h {
            for x in 0..w {
                let src_x = x as i32 - dx;
                let src_y = y as i32 - dy;
                if src_x >= 0 && src_x < w as i32 && src_y >= 0 && src_y < h as i32 {
                    let v = self.mask.get_pixel(src_x as u32, src_y as u32).0[0];
                    if v > 0 {
                        new_mask.put_pixel(x, y, Luma([v]));
                    }
                }
            }
        }

        self.mask = new_mask;
    }

    /// Tight bounding box of the selected pixels as `(min_x, min_y, max_x,
    /// max_y)`, inclusive. `None` when nothing is selected.
    pub fn bounds(&self) -> Option<(u32, u32, u32, u32)> {
        let (mw, mh) = (self.mask.width(), self.mask.height());
        let mask_raw = self.mask.as_raw();

        let mut min_x = mw;
        let mut min_y = mh;
        let mut max_x = 0u32;
        let mut max_y = 0u32;
        for y in 0..mh {
            let row = y as usize * mw as usize;
            for x in 0..mw {
                if mask_raw[row + x as usize] > 0 {
                    min_x = min_x.min(x);
                    min_y = min_y.min(y);
                    max_x = max_x.max(x);
                    max_y = max_y.max(y);
                }
            }
        }
        if min_x > max_x {
            return None;
        }
        Some((min_x, min_y, max_x, max_y))
    }
}
