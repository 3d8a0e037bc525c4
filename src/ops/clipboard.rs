// ============================================================================
// CLIPBOARD OPERATIONS — in-app image slot with system write-through
// ============================================================================

use image::RgbaImage;
use std::sync::Mutex;
use thiserror::Error;

/// In-app clipboard storing an RGBA image with full transparency support.
/// The system clipboard round-trips through platform encodings that may drop
/// alpha; pastes inside the app prefer this slot.
static APP_CLIPBOARD: Mutex<Option<RgbaImage>> = Mutex::new(None);

/// Serializes tests that write the shared clipboard slot.
#[cfg(test)]
pub(crate) static CLIPBOARD_TEST_LOCK: Mutex<()> = Mutex::new(());

#[derive(Debug, Error)]
pub enum ClipboardError {
    /// No system clipboard to talk to (headless session, missing display).
    #[error("system clipboard unavailable")]
    Unavailable(#[source] arboard::Error),
    /// A live system clipboard refused the image.
    #[error("system clipboard rejected image")]
    WriteRejected(#[source] arboard::Error),
    /// Clipboard exists but holds nothing usable as an image.
    #[error("no image on the clipboard")]
    NoImage,
}

fn set_app_image(img: RgbaImage) {
    *APP_CLIPBOARD.lock().unwrap_or_else(|e| e.into_inner()) = Some(img);
}

fn app_image() -> Option<RgbaImage> {
    APP_CLIPBOARD.lock().unwrap_or_else(|e| e.into_inner()).clone()
}

/// Whether a copy/cut has left an image available for pasting.
pub fn has_image() -> bool {
    if APP_CLIPBOARD.lock().unwrap_or_else(|e| e.into_inner()).is_some() {
        return true;
    }
    read_system_clipboard().is_ok()
}

/// Write an RGBA image to the system clipboard.
pub fn copy_to_system_clipboard(img: &RgbaImage) -> Result<(), ClipboardError> {
    let mut clip = arboard::Clipboard::new().map_err(ClipboardError::Unavailable)?;
    // arboard wants ImageData { width, height, bytes: Cow<[u8]> } in RGBA order.
    let data = arboard::ImageData {
        width: img.width() as usize,
        height: img.height() as usize,
        bytes: std::borrow::Cow::Borrowed(img.as_raw()),
    };
    clip.set_image(data).map_err(ClipboardError::WriteRejected)
}

/// Try to read raw image data from the system clipboard.
pub fn read_system_clipboard() -> Result<RgbaImage, ClipboardError> {
    let mut clip = arboard::Clipboard::new().map_err(ClipboardError::Unavailable)?;
    let img_data = clip.get_image().map_err(|_| ClipboardError::NoImage)?;
    RgbaImage::from_raw(
        img_data.width as u32,
        img_data.height as u32,
        img_data.bytes.into_owned(),
    )
    .ok_or(ClipboardError::NoImage)
}

/// Store an image on both clipboards. The in-app slot always takes it; the
/// system write-through is best effort when no clipboard exists, but a live
/// clipboard rejecting the image fails the copy so the caller can report it.
pub fn copy_image(img: RgbaImage) -> bool {
    match copy_to_system_clipboard(&img) {
        Ok(()) => {}
        Err(ClipboardError::Unavailable(err)) => {
            tracing::debug!(error = %err, "no system clipboard, keeping copy in-app only");
        }
        Err(err) => {
            tracing::warn!(error = %err, "clipboard copy failed");
            return false;
        }
    }
    set_app_image(img);
    true
}

/// Retrieve an image for pasting: the in-app slot first, then whatever the
/// system clipboard holds.
pub fn read_image() -> Option<RgbaImage> {
    if let Some(img) = app_image() {
        return Some(img);
    }
    read_system_clipboard().ok()
}
