// ============================================================================
// FLOOD FILL — bucket painting and magic-wand region growing
// ============================================================================

use image::{GrayImage, RgbaImage};
use std::sync::mpsc::{Receiver, channel};

use crate::style::Color;

/// Per-channel slack the magic wand allows when growing a region. The bucket
/// tool stays exact so repeated clicks never creep past anti-aliased edges;
/// the wand is forgiving on purpose so one click can grab a soft-edged shape.
pub const WAND_TOLERANCE: u8 = 32;

/// Inline pixel fetch from a flat RGBA buffer.
#[inline(always)]
fn pix(flat: &[u8], idx: usize) -> [u8; 4] {
    let o = idx * 4;
    [flat[o], flat[o + 1], flat[o + 2], flat[o + 3]]
}

/// Per-channel closeness test: every channel, alpha included, must sit within
/// `tol` of the target. `tol == 0` degenerates to exact equality.
#[inline(always)]
fn channels_close(p: [u8; 4], target: [u8; 4], tol: u8) -> bool {
    p[0].abs_diff(target[0]) <= tol
        && p[1].abs_diff(target[1]) <= tol
        && p[2].abs_diff(target[2]) <= tol
        && p[3].abs_diff(target[3]) <= tol
}

/// Bucket fill: repaint the 4-connected region of pixels exactly matching the
/// seed pixel. The fill color is written fully opaque regardless of the
/// incoming alpha. Returns `true` if any pixel changed; an out-of-bounds seed
/// or a region already in the fill color is a no-op.
pub fn flood_fill(img: &mut RgbaImage, x: i32, y: i32, color: Color) -> bool {
    let w = img.width();
    let h = img.height();
    if x < 0 || y < 0 || x >= w as i32 || y >= h as i32 {
        return false;
    }
    let wu = w as usize;

    let fill = [color.r, color.g, color.b, 255];
    let flat = img.as_mut();

    let seed_idx = y as usize * wu + x as usize;
    let target = pix(flat, seed_idx);
    // Region already wears the fill color. Repainting it would visit every
    // pixel and change nothing, so bail before walking.
    if target == fill {
        return false;
    }

    // Visited bitmap; matched pixels get repainted as they are marked, so the
    // walk never re-tests a written pixel against the stale target.
    let mut visited = vec![0u8; wu * h as usize];

    // DFS stack stores packed flat indices to avoid (u32,u32) tuple overhead.
    let mut stack: Vec<u32> = Vec::with_capacity(4096);
    visited[seed_idx] = 255;
    flat[seed_idx * 4..seed_idx * 4 + 4].copy_from_slice(&fill);
    stack.push(seed_idx as u32);

    while let Some(idx) = stack.pop() {
        let ix = idx as usize % wu;
        let iy = idx as usize / wu;

        // Left
        if ix > 0 {
            let ni = idx as usize - 1;
            if visited[ni] == 0 && pix(flat, ni) == target {
                visited[ni] = 255;
                flat[ni * 4..ni * 4 + 4].copy_from_slice(&fill);
                stack.push(ni as u32);
            }
        }
        // Right
        if ix + 1 < wu {
            let ni = idx as usize + 1;
            if visited[ni] == 0 && pix(flat, ni) == target {
                visited[ni] = 255;
                flat[ni * 4..ni * 4 + 4].copy_from_slice(&fill);
                stack.push(ni as u32);
            }
        }
        // Up
        if iy > 0 {
            let ni = idx as usize - wu;
            if visited[ni] == 0 && pix(flat, ni) == target {
                visited[ni] = 255;
                flat[ni * 4..ni * 4 + 4].copy_from_slice(&fill);
                stack.push(ni as u32);
            }
        }
        // Down
        if iy + 1 < h as usize {
            let ni = idx as usize + wu;
            if visited[ni] == 0 && pix(flat, ni) == target {
                visited[ni] = 255;
                flat[ni * 4..ni * 4 + 4].copy_from_slice(&fill);
                stack.push(ni as u32);
            }
        }
    }

    true
}

/// Bucket fill from a CSS hex string. Malformed colors are a no-op.
pub fn fill_css(img: &mut RgbaImage, x: i32, y: i32, css: &str) -> bool {
    match Color::from_hex(css) {
        Some(color) => flood_fill(img, x, y, color),
        None => {
            tracing::warn!(css, "ignoring malformed fill color");
            false
        }
    }
}

/// Magic wand: grow a 4-connected region from the seed, admitting neighbors
/// whose channels all sit within `tolerance` of the seed pixel. Returns a
/// page-sized mask with 255 on selected pixels, or `None` for an
/// out-of-bounds seed.
pub fn flood_select(img: &RgbaImage, x: i32, y: i32, tolerance: u8) -> Option<GrayImage> {
    let w = img.width();
    let h = img.height();
    if x < 0 || y < 0 || x >= w as i32 || y >= h as i32 {
        return None;
    }
    let wu = w as usize;

    let flat = img.as_raw();
    let seed_idx = y as usize * wu + x as usize;
    let target = pix(flat, seed_idx);

    // mask doubles as the visited array and the output
    let mut mask = vec![0u8; wu * h as usize];
    let mut stack: Vec<u32> = Vec::with_capacity(4096);
    mask[seed_idx] = 255;
    stack.push(seed_idx as u32);

    while let Some(idx) = stack.pop() {
        let ix = idx as usize % wu;
        let iy = idx as usize / wu;

        // Left
        if ix > 0 {
            let ni = idx as usize - 1;
            if mask[ni] == 0 && channels_close(pix(flat, ni), target, tolerance) {
                mask[ni] = 255;
                stack.push(ni as u32);
            }
        }
        // Right
        if ix + 1 < wu {
            let ni = idx as usize + 1;
            if mask[ni] == 0 && channels_close(pix(flat, ni), target, tolerance) {
                mask[ni] = 255;
                stack.push(ni as u32);
            }
        }
        // Up
        if iy > 0 {
            let ni = idx as usize - wu;
            if mask[ni] == 0 && channels_close(pix(flat, ni), target, tolerance) {
                mask[ni] = 255;
                stack.push(ni as u32);
            }
        }
        // Down
        if iy + 1 < h as usize {
            let ni = idx as usize + wu;
            if mask[ni] == 0 && channels_close(pix(flat, ni), target, tolerance) {
                mask[ni] = 255;
                stack.push(ni as u32);
            }
        }
    }

    GrayImage::from_raw(w, h, mask)
}

// ---------------------------------------------------------------------------
//  Background fills
// ---------------------------------------------------------------------------

/// Result handed back by a [`FillJob`]: the buffer moves out to the worker
/// and comes home here.
pub struct FillOutcome {
    pub buffer: RgbaImage,
    pub changed: bool,
}

/// A bucket fill running on a background thread. Large pages can take a
/// visible moment to fill; spawning keeps the caller responsive while it
/// polls [`try_finish`](FillJob::try_finish) once a frame.
pub struct FillJob {
    rx: Receiver<FillOutcome>,
}

impl FillJob {
    /// Poll without blocking. `Some` exactly once, when the worker is done.
    pub fn try_finish(&mut self) -> Option<FillOutcome> {
        self.rx.try_recv().ok()
    }

    /// Block until the worker finishes. `None` only if the worker died
    /// without reporting, which a fill does not do on its own.
    pub fn finish(self) -> Option<FillOutcome> {
        self.rx.recv().ok()
    }
}

/// Run [`flood_fill`] on a background thread. The buffer is moved into the
/// worker and returned through the job handle, changed or not.
pub fn spawn_fill(buffer: RgbaImage, x: i32, y: i32, color: Color) -> FillJob {
    let (tx, rx) = channel();
    std::thread::spawn(move || {
        let mut buffer = buffer;
        let changed = flood_fill(&mut buffer, x, y, color);
        tracing::debug!(x, y, changed, "background fill finished");
        let _ = tx.send(FillOutcome { buffer, changed });
    });
    FillJob { rx }
}
