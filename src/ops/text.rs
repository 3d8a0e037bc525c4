// ============================================================================
// TEXT RENDERING — glyph layout and rasterization onto a page
// ============================================================================

use ab_glyph::{Font, FontArc, GlyphId, ScaleFont, point};
use image::RgbaImage;
use std::collections::HashMap;

use crate::page::composite_image;
use crate::style::{TextAlign, TextStyle};

/// Fonts available for text replay, keyed by family name. Commands record a
/// family string; the catalog resolves it at draw time, falling back to a
/// designated default so text renders even when a family went missing.
/// Registration happens up front and the catalog stays immutable during
/// replay, which keeps redraws deterministic.
#[derive(Default)]
pub struct FontCatalog {
    fonts: HashMap<String, FontArc>,
    fallback: Option<FontArc>,
}

impl FontCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a font under a family name. Returns `false` when the bytes
    /// are not a parseable font. The first successful registration also
    /// becomes the fallback.
    pub fn register(&mut self, family: &str, bytes: Vec<u8>) -> bool {
        match FontArc::try_from_vec(bytes) {
            Ok(font) => {
                if self.fallback.is_none() {
                    self.fallback = Some(font.clone());
                }
                self.fonts.insert(family.to_string(), font);
                true
            }
            Err(_) => false,
        }
    }

    /// Make an already registered family the fallback for unknown names.
    pub fn set_fallback(&mut self, family: &str) -> bool {
        match self.fonts.get(family) {
            Some(font) => {
                self.fallback = Some(font.clone());
                true
            }
            None => false,
        }
    }

    pub fn resolve(&self, family: &str) -> Option<&FontArc> {
        self.fonts.get(family).or(self.fallback.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty() && self.fallback.is_none()
    }

    pub fn families(&self) -> impl Iterator<Item = &str> {
        self.fonts.keys().map(|s| s.as_str())
    }
}

/// Lay out a single line, returning positioned glyphs (relative to the line
/// origin, y at the baseline) and the line's advance width.
fn layout_line(
    font: &FontArc,
    text: &str,
    font_size: f32,
    align: TextAlign,
) -> (Vec<(GlyphId, f32, f32)>, f32) {
    let scaled = font.as_scaled(font_size);
    let ascent = scaled.ascent();

    let mut glyphs = Vec::new();
    let mut cursor_x = 0.0f32;
    let mut last_glyph: Option<GlyphId> = None;

    for ch in text.chars() {
        let glyph_id = font.glyph_id(ch);
        if let Some(prev) = last_glyph {
            cursor_x += scaled.kern(prev, glyph_id);
        }
        glyphs.push((glyph_id, cursor_x, ascent));
        cursor_x += scaled.h_advance(glyph_id);
        last_glyph = Some(glyph_id);
    }

    let total_width = cursor_x;
    let offset = match align {
        TextAlign::Left => 0.0,
        TextAlign::Center => -total_width * 0.5,
        TextAlign::Right => -total_width,
    };
    for glyph in &mut glyphs {
        glyph.1 += offset;
    }

    (glyphs, total_width)
}

/// Re-render a text block onto the page. `(x, y)` is the top-left anchor of
/// the first line; line `i` starts at `y + i * font_size * line_height`.
/// Unresolvable fonts make this a no-op, matching the rest of the engine's
/// degrade-to-nothing error policy.
pub fn draw_text(
    img: &mut RgbaImage,
    text: &str,
    x: f32,
    y: f32,
    style: &TextStyle,
    fonts: &FontCatalog,
) {
    let Some(font) = fonts.resolve(&style.font_family) else {
        tracing::warn!(family = %style.font_family, "no font registered, skipping text draw");
        return;
    };
    if text.trim().is_empty() || img.width() == 0 || img.height() == 0 {
        return;
    }

    let font_size = style.font_size;
    let line_step = font_size * style.line_height;

    // Lay out every line; glyph positions are relative to (x, y).
    let mut all_glyphs: Vec<(GlyphId, f32, f32)> = Vec::new();
    for (line_idx, line) in text.split('\n').enumerate() {
        let y_offset = line_idx as f32 * line_step;
        let (mut glyphs, _) = layout_line(font, line, font_size, style.align);
        for glyph in &mut glyphs {
            glyph.2 += y_offset;
        }
        all_glyphs.extend(glyphs);
    }
    if all_glyphs.is_empty() {
        return;
    }

    // Bounding box of all glyphs in page space.
    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;
    for &(glyph_id, gx, gy) in &all_glyphs {
        let glyph = glyph_id.with_scale_and_position(font_size, point(x + gx, y + gy));
        let bounds = font.glyph_bounds(&glyph);
        min_x = min_x.min(bounds.min.x);
        min_y = min_y.min(bounds.min.y);
        max_x = max_x.max(bounds.max.x);
        max_y = max_y.max(bounds.max.y);
    }
    if min_x >= max_x || min_y >= max_y {
        return;
    }

    let pad = 2.0;
    let x0 = ((min_x - pad).floor() as i32).max(0);
    let y0 = ((min_y - pad).floor() as i32).max(0);
    let x1 = ((max_x + pad).ceil() as i32).min(img.width() as i32);
    let y1 = ((max_y + pad).ceil() as i32).min(img.height() as i32);
    let buf_w = (x1 - x0).max(0) as u32;
    let buf_h = (y1 - y0).max(0) as u32;
    if buf_w == 0 || buf_h == 0 {
        return;
    }

    // Accumulate glyph coverage, then convert to RGBA once.
    let mut coverage = vec![0.0f32; buf_w as usize * buf_h as usize];
    for &(glyph_id, gx, gy) in &all_glyphs {
        let glyph = glyph_id.with_scale_and_position(font_size, point(x + gx, y + gy));
        if let Some(outlined) = font.outline_glyph(glyph) {
            let bounds = outlined.px_bounds();
            outlined.draw(|px, py, cov| {
                let ix = bounds.min.x as i32 + px as i32 - x0;
                let iy = bounds.min.y as i32 + py as i32 - y0;
                if ix >= 0 && iy >= 0 && (ix as u32) < buf_w && (iy as u32) < buf_h {
                    let idx = iy as usize * buf_w as usize + ix as usize;
                    coverage[idx] = coverage[idx].max(cov);
                }
            });
        }
    }

    let color = [style.color.r, style.color.g, style.color.b, style.color.a];
    let mut buf = vec![0u8; buf_w as usize * buf_h as usize * 4];
    for (i, &cov) in coverage.iter().enumerate() {
        if cov > 0.001 {
            let idx = i * 4;
            let a = (color[3] as f32 * cov).round().min(255.0) as u8;
            buf[idx] = color[0];
            buf[idx + 1] = color[1];
            buf[idx + 2] = color[2];
            buf[idx + 3] = a;
        }
    }

    if let Some(overlay) = RgbaImage::from_raw(buf_w, buf_h, buf) {
        composite_image(img, &overlay, x0, y0);
    }
}
