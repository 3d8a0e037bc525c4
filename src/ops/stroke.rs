// ============================================================================
// STROKE RENDERING — dab stamping along a recorded point path
// ============================================================================

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::page::alpha_blend;
use crate::style::{StrokeStyle, ToolKind};

/// One sample along a stroke path. Pressure is optional; devices without it
/// record `None` and the stamp radius stays at the full brush size.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrokePoint {
    pub x: f32,
    pub y: f32,
    pub pressure: Option<f32>,
}

impl StrokePoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, pressure: None }
    }

    pub fn with_pressure(x: f32, y: f32, pressure: f32) -> Self {
        Self { x, y, pressure: Some(pressure) }
    }
}

/// Simple positional hash for pseudorandom per-stamp jitter.
/// Produces a deterministic u32 from floating-point position + counter.
fn stamp_hash(x: f32, y: f32, counter: u32) -> u32 {
    let ix = (x * 100.0) as u32;
    let iy = (y * 100.0) as u32;
    let mut h = ix
        .wrapping_mul(374761393)
        .wrapping_add(iy.wrapping_mul(668265263))
        .wrapping_add(counter.wrapping_mul(1013904223));
    h ^= h >> 13;
    h = h.wrapping_mul(1274126177);
    h ^= h >> 16;
    h
}

/// Dab edge falloff. Hardness 0 is remapped to a still-visible 0.02 so an
/// airbrush never vanishes entirely; small radii get an extended fade band so
/// 1–2 px brushes stay anti-aliased.
fn brush_alpha(dist: f32, radius: f32, hardness: f32) -> f32 {
    let remapped_hardness = 0.02 + (hardness * 0.98);
    let safe_hardness = remapped_hardness.clamp(0.0, 0.99);

    let (effective_radius, fade_width) = if radius < 3.0 {
        let aa_extend = 1.5;
        let extended_radius = radius + aa_extend;
        let fade = aa_extend + (radius * (1.0 - safe_hardness));
        (extended_radius, fade)
    } else {
        let fade = (radius * (1.0 - safe_hardness)).max(1.0);
        (radius, fade)
    };

    let solid_radius = effective_radius - fade_width;

    if dist <= solid_radius {
        return 1.0;
    } else if dist >= effective_radius {
        return 0.0;
    }

    let t = (dist - solid_radius) / fade_width;
    let x = 1.0 - t.clamp(0.0, 1.0);
    x * x * (3.0 - 2.0 * x)
}

/// Per-stroke coverage accumulator. Dabs overlap heavily along a path, so
/// each pixel keeps the maximum dab coverage it saw and the stroke is
/// composited onto the page exactly once at the end. Stamping directly with
/// src-over would stack semi-transparent dabs into an opaque rope.
struct Coverage {
    data: Vec<u8>,
    width: u32,
    height: u32,
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
}

impl Coverage {
    fn new(width: u32, height: u32) -> Self {
        Self {
            data: vec![0u8; width as usize * height as usize],
            width,
            height,
            min_x: width,
            min_y: height,
            max_x: 0,
            max_y: 0,
        }
    }

    fn stamp(&mut self, cx: f32, cy: f32, radius: f32, hardness: f32, strength: f32) {
        if self.width == 0 || self.height == 0 {
            return;
        }
        let reach = radius + 2.5;
        let min_x = (cx - reach).max(0.0) as u32;
        let max_x = ((cx + reach) as u32).min(self.width - 1);
        let min_y = (cy - reach).max(0.0) as u32;
        let max_y = ((cy + reach) as u32).min(self.height - 1);

        for y in min_y..=max_y {
            let row = y as usize * self.width as usize;
            for x in min_x..=max_x {
                let dx = x as f32 + 0.5 - cx;
                let dy = y as f32 + 0.5 - cy;
                let dist = (dx * dx + dy * dy).sqrt();
                let a = brush_alpha(dist, radius, hardness) * strength;
                if a <= 0.0 {
                    continue;
                }
                let v = (a * 255.0).round().min(255.0) as u8;
                let slot = &mut self.data[row + x as usize];
                if v > *slot {
                    *slot = v;
                    self.min_x = self.min_x.min(x);
                    self.min_y = self.min_y.min(y);
                    self.max_x = self.max_x.max(x);
                    self.max_y = self.max_y.max(y);
                }
            }
        }
    }
}

/// Re-render a full stroke onto the page. The path, tool and style were all
/// captured when the stroke was recorded, so the same call always produces
/// the same pixels.
pub fn draw_stroke(img: &mut RgbaImage, points: &[StrokePoint], tool: ToolKind, style: &StrokeStyle) {
    if points.is_empty() || img.width() == 0 || img.height() == 0 {
        return;
    }

    let base_radius = (style.size / 2.0).max(0.5);
    let hardness = match tool {
        // Pen and Pencil keep a crisp edge regardless of the style slider.
        ToolKind::Pen | ToolKind::Pencil => 1.0,
        ToolKind::Marker | ToolKind::Eraser => style.hardness,
    };

    let mut coverage = Coverage::new(img.width(), img.height());
    let mut stamp_counter = 0u32;

    let stamp_at = |cov: &mut Coverage, x: f32, y: f32, pressure: Option<f32>, counter: u32| {
        let mut radius = base_radius;
        if style.pressure_enabled
            && let Some(p) = pressure
        {
            radius = (base_radius * p.clamp(0.05, 1.0)).max(0.5);
        }

        match tool {
            ToolKind::Pencil => {
                // Graphite texture: jitter each dab off the path and vary its
                // weight, seeded from the position so replay is stable.
                let h = stamp_hash(x, y, counter);
                let jitter = (radius * 0.4).min(1.5);
                let jx = ((h & 0xFFFF) as f32 / 65535.0 - 0.5) * 2.0 * jitter;
                let jy = (((h >> 16) & 0xFFFF) as f32 / 65535.0 - 0.5) * 2.0 * jitter;
                let strength = 0.55 + ((h >> 8) & 0xFF) as f32 / 255.0 * 0.45;
                cov.stamp(x + jx, y + jy, radius * 0.8, hardness, strength);
            }
            _ => cov.stamp(x, y, radius, hardness, 1.0),
        }
    };

    if points.len() == 1 {
        let p = points[0];
        stamp_at(&mut coverage, p.x, p.y, p.pressure, stamp_counter);
    } else {
        for pair in points.windows(2) {
            let (p0, p1) = (pair[0], pair[1]);
            let dx = p1.x - p0.x;
            let dy = p1.y - p0.y;
            let distance = (dx * dx + dy * dy).sqrt();

            if distance < 0.1 {
                stamp_at(&mut coverage, p0.x, p0.y, p0.pressure, stamp_counter);
                stamp_counter = stamp_counter.wrapping_add(1);
                continue;
            }

            let steps = distance.ceil() as usize;
            for i in 0..=steps {
                let t = i as f32 / steps as f32;
                let x = p0.x + dx * t;
                let y = p0.y + dy * t;
                let pressure = match (p0.pressure, p1.pressure) {
                    (Some(a), Some(b)) => Some(a + (b - a) * t),
                    (a, b) => a.or(b),
                };
                stamp_at(&mut coverage, x, y, pressure, stamp_counter);
                stamp_counter = stamp_counter.wrapping_add(1);
            }
        }
    }

    composite_coverage(img, &coverage, tool, style);
}

/// Apply the accumulated stroke coverage to the page in one pass: paint tools
/// blend the stroke color over the page, the eraser knocks alpha out.
fn composite_coverage(img: &mut RgbaImage, cov: &Coverage, tool: ToolKind, style: &StrokeStyle) {
    if cov.min_x > cov.max_x {
        return;
    }
    let stroke_alpha = style.alpha() as f32 / 255.0;
    let color = style.color;

    for y in cov.min_y..=cov.max_y {
        let row = y as usize * cov.width as usize;
        for x in cov.min_x..=cov.max_x {
            let c = cov.data[row + x as usize];
            if c == 0 {
                continue;
            }
            let a = c as f32 / 255.0 * stroke_alpha;
            let p = img.get_pixel_mut(x, y);
            match tool {
                ToolKind::Eraser => {
                    p[3] = (p[3] as f32 * (1.0 - a)).round() as u8;
                }
                _ => {
                    let src = Rgba([
                        color.r,
                        color.g,
                        color.b,
                        (a * 255.0).round().min(255.0) as u8,
                    ]);
                    *p = alpha_blend(*p, src);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::Color;

    fn white_page(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255]))
    }

    fn default_style() -> StrokeStyle {
        StrokeStyle {
            size: 4.0,
            color: Color::rgb(0, 0, 0),
            opacity: 100,
            hardness: 1.0,
            pressure_enabled: false,
        }
    }

    #[test]
    fn test_single_point_draws_dot() {
        let mut img = white_page(16, 16);
        let style = default_style();
        draw_stroke(&mut img, &[StrokePoint::new(8.0, 8.0)], ToolKind::Pen, &style);
        assert_eq!(*img.get_pixel(8, 8), Rgba([0, 0, 0, 255]));
        assert_eq!(*img.get_pixel(0, 0), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_path_is_continuous() {
        let mut img = white_page(32, 8);
        let style = default_style();
        let points = [StrokePoint::new(4.0, 4.0), StrokePoint::new(28.0, 4.0)];
        draw_stroke(&mut img, &points, ToolKind::Pen, &style);
        // Midpoint of the segment must be covered, not just the endpoints.
        assert_eq!(*img.get_pixel(16, 4), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_replay_is_deterministic() {
        let style = StrokeStyle {
            size: 6.0,
            color: Color::rgb(30, 80, 200),
            opacity: 80,
            hardness: 0.4,
            pressure_enabled: true,
        };
        let points = [
            StrokePoint::with_pressure(3.0, 3.0, 0.4),
            StrokePoint::with_pressure(12.0, 9.0, 0.9),
            StrokePoint::with_pressure(20.0, 4.0, 0.6),
        ];
        for tool in [ToolKind::Pen, ToolKind::Pencil, ToolKind::Marker] {
            let mut a = white_page(24, 16);
            let mut b = white_page(24, 16);
            draw_stroke(&mut a, &points, tool, &style);
            draw_stroke(&mut b, &points, tool, &style);
            assert_eq!(a.as_raw(), b.as_raw());
        }
    }

    #[test]
    fn test_eraser_knocks_out_alpha() {
        let mut img = white_page(16, 16);
        let style = default_style();
        draw_stroke(&mut img, &[StrokePoint::new(8.0, 8.0)], ToolKind::Eraser, &style);
        assert_eq!(img.get_pixel(8, 8).0[3], 0);
        assert_eq!(img.get_pixel(0, 0).0[3], 255);
    }

    #[test]
    fn test_pressure_scales_radius() {
        let style = StrokeStyle {
            size: 10.0,
            pressure_enabled: true,
            ..default_style()
        };
        let mut light = white_page(24, 24);
        let mut heavy = white_page(24, 24);
        draw_stroke(
            &mut light,
            &[StrokePoint::with_pressure(12.0, 12.0, 0.2)],
            ToolKind::Pen,
            &style,
        );
        draw_stroke(
            &mut heavy,
            &[StrokePoint::with_pressure(12.0, 12.0, 1.0)],
            ToolKind::Pen,
            &style,
        );
        let painted = |img: &RgbaImage| img.pixels().filter(|p| p.0 != [255, 255, 255, 255]).count();
        assert!(painted(&light) < painted(&heavy));
    }

    #[test]
    fn test_offpage_points_are_clipped() {
        let mut img = white_page(8, 8);
        let style = default_style();
        let points = [StrokePoint::new(-20.0, -20.0), StrokePoint::new(30.0, 30.0)];
        draw_stroke(&mut img, &points, ToolKind::Pen, &style);
        // The diagonal crosses the page; on-page part painted, no panic.
        assert_eq!(*img.get_pixel(4, 4), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_empty_path_is_noop() {
        let mut img = white_page(4, 4);
        let before = img.clone();
        draw_stroke(&mut img, &[], ToolKind::Pen, &default_style());
        assert_eq!(img.as_raw(), before.as_raw());
    }
}
