// ============================================================================
// SHAPE RENDERING — SDF rasterization of two-point primitives
// ============================================================================

use image::RgbaImage;
use rayon::prelude::*;

use crate::page::composite_image;
use crate::style::{ShapeKind, StrokeStyle};

/// SDF for a box centred at origin with half-extents (hx, hy).
#[inline]
fn sdf_box(px: f32, py: f32, hx: f32, hy: f32) -> f32 {
    let dx = px.abs() - hx;
    let dy = py.abs() - hy;
    let outside = (dx.max(0.0) * dx.max(0.0) + dy.max(0.0) * dy.max(0.0)).sqrt();
    let inside = dx.max(dy).min(0.0);
    outside + inside
}

/// SDF for distance to a line segment.
#[inline]
fn sdf_line_segment(px: f32, py: f32, ax: f32, ay: f32, bx: f32, by: f32) -> f32 {
    let dx = bx - ax;
    let dy = by - ay;
    let len_sq = dx * dx + dy * dy;
    if len_sq < 1e-8 {
        return ((px - ax) * (px - ax) + (py - ay) * (py - ay)).sqrt();
    }
    let t = ((px - ax) * dx + (py - ay) * dy) / len_sq;
    let t = t.clamp(0.0, 1.0);
    let cx = ax + t * dx;
    let cy = ay + t * dy;
    ((px - cx) * (px - cx) + (py - cy) * (py - cy)).sqrt()
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Distance from a point to the shape's stroked outline. Negative values are
/// inside the ink band.
#[inline]
fn outline_band(kind: ShapeKind, px: f32, py: f32, start: (f32, f32), end: (f32, f32), half_w: f32) -> f32 {
    match kind {
        ShapeKind::Line => sdf_line_segment(px, py, start.0, start.1, end.0, end.1) - half_w,
        ShapeKind::Rect => {
            let cx = (start.0 + end.0) * 0.5;
            let cy = (start.1 + end.1) * 0.5;
            let hx = (end.0 - start.0).abs() * 0.5;
            let hy = (end.1 - start.1).abs() * 0.5;
            sdf_box(px - cx, py - cy, hx, hy).abs() - half_w
        }
        ShapeKind::Circle => {
            let dx = end.0 - start.0;
            let dy = end.1 - start.1;
            let radius = (dx * dx + dy * dy).sqrt();
            let lx = px - start.0;
            let ly = py - start.1;
            ((lx * lx + ly * ly).sqrt() - radius).abs() - half_w
        }
    }
}

/// Rasterize a shape outline into an RGBA buffer covering its bounding box.
///
/// Returns `(buf, buf_w, buf_h, offset_x, offset_y)` where offset is the
/// top-left corner of the buffer in page coordinates.
fn rasterize_shape(
    kind: ShapeKind,
    start: (f32, f32),
    end: (f32, f32),
    stroke_width: f32,
    color: [u8; 4],
    page_w: u32,
    page_h: u32,
) -> (Vec<u8>, u32, u32, i32, i32) {
    let half_w = (stroke_width * 0.5).max(0.5);

    // Bounding box of the two anchors, grown to cover a circle's sweep.
    let (mut min_x, mut max_x) = (start.0.min(end.0), start.0.max(end.0));
    let (mut min_y, mut max_y) = (start.1.min(end.1), start.1.max(end.1));
    if kind == ShapeKind::Circle {
        let dx = end.0 - start.0;
        let dy = end.1 - start.1;
        let radius = (dx * dx + dy * dy).sqrt();
        min_x = start.0 - radius;
        max_x = start.0 + radius;
        min_y = start.1 - radius;
        max_y = start.1 + radius;
    }
    let pad = half_w + 2.0;
    let x0 = ((min_x - pad).floor() as i32).max(0);
    let y0 = ((min_y - pad).floor() as i32).max(0);
    let x1 = ((max_x + pad).ceil() as i32).min(page_w as i32);
    let y1 = ((max_y + pad).ceil() as i32).min(page_h as i32);
    let buf_w = (x1 - x0).max(0) as u32;
    let buf_h = (y1 - y0).max(0) as u32;

    if buf_w == 0 || buf_h == 0 {
        return (Vec::new(), 0, 0, 0, 0);
    }

    let row_bytes = buf_w as usize * 4;
    let mut buf = vec![0u8; row_bytes * buf_h as usize];

    buf.par_chunks_mut(row_bytes)
        .enumerate()
        .for_each(|(row, row_buf)| {
            let py = (y0 + row as i32) as f32 + 0.5;
            for col in 0..buf_w as usize {
                let px = (x0 + col as i32) as f32 + 0.5;
                let band = outline_band(kind, px, py, start, end, half_w);
                let coverage = smoothstep(0.5, -0.5, band);
                if coverage > 0.001 {
                    let idx = col * 4;
                    let a = (color[3] as f32 * coverage).round().min(255.0) as u8;
                    row_buf[idx] = color[0];
                    row_buf[idx + 1] = color[1];
                    row_buf[idx + 2] = color[2];
                    row_buf[idx + 3] = a;
                }
            }
        });

    (buf, buf_w, buf_h, x0, y0)
}

/// Re-render a shape onto the page: line segment, axis-aligned rectangle from
/// two opposite corners, or circle whose radius is the distance from start to
/// end. Stroke width, color and alpha come from the recorded style.
pub fn draw_shape(
    img: &mut RgbaImage,
    kind: ShapeKind,
    start: (f32, f32),
    end: (f32, f32),
    style: &StrokeStyle,
) {
    let color = [style.color.r, style.color.g, style.color.b, style.alpha()];
    let (buf, buf_w, buf_h, x0, y0) =
        rasterize_shape(kind, start, end, style.size, color, img.width(), img.height());
    if buf_w == 0 || buf_h == 0 {
        return;
    }
    if let Some(overlay) = RgbaImage::from_raw(buf_w, buf_h, buf) {
        composite_image(img, &overlay, x0, y0);
    }
}
