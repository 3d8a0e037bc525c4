// ============================================================================
// PAGE BUFFERS — identity, blank pages, region copies, masked pixel passes
// ============================================================================

use image::{GrayImage, Rgba, RgbaImage};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identity of one page in a sketchbook. Commands and selection masks
/// carry the id of the page they were recorded against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageId(Uuid);

impl PageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A fresh page: opaque white, the paper color every other operation assumes.
pub fn blank_page(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]))
}

// ---------------------------------------------------------------------------
//  Region copies
// ---------------------------------------------------------------------------

/// Copy a `w × h` rectangle out of `img`, clipped to the image bounds.
/// The returned image is always `w × h`; pixels outside the source stay
/// transparent.
pub fn get_region(img: &RgbaImage, x: i32, y: i32, w: u32, h: u32) -> RgbaImage {
    let mut out = RgbaImage::new(w, h);
    let (iw, ih) = (img.width() as i32, img.height() as i32);
    for dy in 0..h as i32 {
        let sy = y + dy;
        if sy < 0 || sy >= ih {
            continue;
        }
        for dx in 0..w as i32 {
            let sx = x + dx;
            if sx < 0 || sx >= iw {
                continue;
            }
            out.put_pixel(dx as u32, dy as u32, *img.get_pixel(sx as u32, sy as u32));
        }
    }
    out
}

/// Write `region` back into `img` at `(x, y)`, overwriting destination bytes.
/// Parts falling outside the image are dropped.
pub fn put_region(img: &mut RgbaImage, region: &RgbaImage, x: i32, y: i32) {
    let (iw, ih) = (img.width() as i32, img.height() as i32);
    for dy in 0..region.height() as i32 {
        let ty = y + dy;
        if ty < 0 || ty >= ih {
            continue;
        }
        for dx in 0..region.width() as i32 {
            let tx = x + dx;
            if tx < 0 || tx >= iw {
                continue;
            }
            img.put_pixel(tx as u32, ty as u32, *region.get_pixel(dx as u32, dy as u32));
        }
    }
}

/// Alpha-composite `src` over `dst` at `(x, y)`, clipped to the destination.
/// Fully transparent source pixels leave the destination untouched.
pub fn composite_image(dst: &mut RgbaImage, src: &RgbaImage, x: i32, y: i32) {
    let (dw, dh) = (dst.width() as i32, dst.height() as i32);
    for sy in 0..src.height() as i32 {
        let ty = y + sy;
        if ty < 0 || ty >= dh {
            continue;
        }
        for sx in 0..src.width() as i32 {
            let tx = x + sx;
            if tx < 0 || tx >= dw {
                continue;
            }
            let sp = *src.get_pixel(sx as u32, sy as u32);
            if sp[3] == 0 {
                continue;
            }
            let dp = *dst.get_pixel(tx as u32, ty as u32);
            dst.put_pixel(tx as u32, ty as u32, alpha_blend(dp, sp));
        }
    }
}

/// Simple alpha-composite: src over dst.
pub(crate) fn alpha_blend(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    if src[3] == 0 {
        return dst;
    }
    if src[3] == 255 || dst[3] == 0 {
        return src;
    }
    let sa = src[3] as f32 / 255.0;
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a < 0.001 {
        return Rgba([0, 0, 0, 0]);
    }
    let inv = 1.0 / out_a;
    Rgba([
        ((src[0] as f32 * sa + dst[0] as f32 * da * (1.0 - sa)) * inv).round().clamp(0.0, 255.0) as u8,
        ((src[1] as f32 * sa + dst[1] as f32 * da * (1.0 - sa)) * inv).round().clamp(0.0, 255.0) as u8,
        ((src[2] as f32 * sa + dst[2] as f32 * da * (1.0 - sa)) * inv).round().clamp(0.0, 255.0) as u8,
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

// ---------------------------------------------------------------------------
//  Pixel buffer serialization — (width, height, raw bytes) triples
// ---------------------------------------------------------------------------

pub(crate) mod rgba_serde {
    use image::RgbaImage;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(img: &RgbaImage, ser: S) -> Result<S::Ok, S::Error> {
        (img.width(), img.height(), img.as_raw().as_slice()).serialize(ser)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<RgbaImage, D::Error> {
        let (w, h, bytes): (u32, u32, Vec<u8>) = Deserialize::deserialize(de)?;
        RgbaImage::from_raw(w, h, bytes)
            .ok_or_else(|| serde::de::Error::custom("pixel data does not match dimensions"))
    }
}

pub(crate) mod gray_serde {
    use image::GrayImage;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(img: &GrayImage, ser: S) -> Result<S::Ok, S::Error> {
        (img.width(), img.height(), img.as_raw().as_slice()).serialize(ser)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<GrayImage, D::Error> {
        let (w, h, bytes): (u32, u32, Vec<u8>) = Deserialize::deserialize(de)?;
        GrayImage::from_raw(w, h, bytes)
            .ok_or_else(|| serde::de::Error::custom("mask data does not match dimensions"))
    }
}

// ---------------------------------------------------------------------------
//  Masked full-page passes
// ---------------------------------------------------------------------------

/// Lift the pixels under `mask` into a page-sized image; everything outside
/// the mask is left transparent. Rows run in parallel.
pub fn masked_snapshot(page: &RgbaImage, mask: &GrayImage) -> RgbaImage {
    let w = page.width() as usize;
    let h = page.height() as usize;
    if w == 0 || h == 0 {
        return page.clone();
    }

    let src_raw = page.as_raw();
    let mut dst_raw = vec![0u8; w * h * 4];
    let stride = w * 4;
    let mask_raw = mask.as_raw();
    let mask_w = mask.width() as usize;
    let mask_h = mask.height() as usize;

    dst_raw
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row_out)| {
            let row_in = &src_raw[y * stride..(y + 1) * stride];
            for x in 0..w {
                if x < mask_w && y < mask_h && mask_raw[y * mask_w + x] > 0 {
                    let pi = x * 4;
                    row_out[pi..pi + 4].copy_from_slice(&row_in[pi..pi + 4]);
                }
            }
        });

    // Size matches the source buffer exactly.
    RgbaImage::from_raw(w as u32, h as u32, dst_raw).unwrap()
}

/// Overwrite every pixel under `mask` with a solid color.
pub fn fill_masked(page: &mut RgbaImage, mask: &GrayImage, color: [u8; 4]) {
    let w = page.width() as usize;
    if w == 0 {
        return;
    }
    let stride = w * 4;
    let mask_raw = mask.as_raw();
    let mask_w = mask.width() as usize;
    let mask_h = mask.height() as usize;

    page.as_mut()
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row)| {
            for x in 0..w {
                if x < mask_w && y < mask_h && mask_raw[y * mask_w + x] > 0 {
                    let pi = x * 4;
                    row[pi..pi + 4].copy_from_slice(&color);
                }
            }
        });
}

/// Copy `snapshot` bytes back into `page` wherever `mask` is set. The inverse
/// of [`masked_snapshot`] followed by [`fill_masked`]: restores the covered
/// pixels byte for byte.
pub fn restore_masked(page: &mut RgbaImage, mask: &GrayImage, snapshot: &RgbaImage) {
    let w = page.width() as usize;
    if w == 0 || snapshot.width() != page.width() || snapshot.height() != page.height() {
        return;
    }
    let stride = w * 4;
    let snap_raw = snapshot.as_raw();
    let mask_raw = mask.as_raw();
    let mask_w = mask.width() as usize;
    let mask_h = mask.height() as usize;

    page.as_mut()
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row)| {
            let snap_row = &snap_raw[y * stride..(y + 1) * stride];
            for x in 0..w {
                if x < mask_w && y < mask_h && mask_raw[y * mask_w + x] > 0 {
                    let pi = x * 4;
                    row[pi..pi + 4].copy_from_slice(&snap_row[pi..pi + 4]);
                }
            }
        });
}
