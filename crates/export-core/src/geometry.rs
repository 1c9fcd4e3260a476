// crates/export-core/src/geometry.rs
//
// Pixel-space math shared by the render effects and the camera PiP
// compositor. Operates on plain f32/u32 — no FFmpeg, no pixel buffers.
//
// `clamp01`/`lerp`/`norm_x`/`norm_y`/`center_dist` mirror the transition
// math kept in `effects::helpers`; this module covers the rect/placement
// arithmetic the old transitions module never needed.

use crate::model::{CameraPipConfig, PipPosition, PipShape, PipSize};

#[inline]
pub fn clamp01(v: f32) -> f32 {
    v.clamp(0.0, 1.0)
}

#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// An axis-aligned pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRect {
    pub x: i64,
    pub y: i64,
    pub w: u32,
    pub h: u32,
}

/// Computes the on-canvas placement of a PiP overlay of `size_percent` of
/// `dst_w`, at the given corner, with `margin = round(dst_w * 0.02)` (§4.6).
///
/// For `Square`/`Circle` shapes the overlay is forced to 1:1 — the caller
/// center-crops the source to match before blitting.
pub fn pip_placement(dst_w: u32, dst_h: u32, cfg: &CameraPipConfig, src_aspect: f32) -> PixelRect {
    let size_px = (dst_w as f32 * cfg.size.percent() / 100.0).round() as u32;
    let margin = (dst_w as f32 * 0.02).round() as i64;

    let (w, h) = match cfg.shape {
        PipShape::Square | PipShape::Circle => (size_px, size_px),
        PipShape::Rectangle | PipShape::RoundedRect => {
            let h = (size_px as f32 / src_aspect).round() as u32;
            (size_px, h)
        }
    };

    let (x, y) = match cfg.position {
        PipPosition::TopLeft => (margin, margin),
        PipPosition::TopRight => (dst_w as i64 - w as i64 - margin, margin),
        PipPosition::BottomLeft => (margin, dst_h as i64 - h as i64 - margin),
        PipPosition::BottomRight => {
            (dst_w as i64 - w as i64 - margin, dst_h as i64 - h as i64 - margin)
        }
    };

    PixelRect { x, y, w, h }
}

/// Effective border radius in pixels for a PiP overlay, per §4.6: circle
/// forces 50% radius; other shapes use the configured percentage.
pub fn pip_border_radius_px(cfg: &CameraPipConfig, rect: &PixelRect) -> f32 {
    let short_side = rect.w.min(rect.h) as f32;
    let pct = match cfg.shape {
        PipShape::Circle => 50.0,
        _ => cfg.border_radius_pct,
    };
    short_side * pct / 100.0
}

/// True if pixel `(px, py)` (relative to `rect`'s top-left) lies inside a
/// rounded rectangle of the given corner radius.
pub fn inside_rounded_rect(px: i64, py: i64, w: u32, h: u32, radius: f32) -> bool {
    if px < 0 || py < 0 || px >= w as i64 || py >= h as i64 {
        return false;
    }
    if radius <= 0.0 {
        return true;
    }
    let (w, h) = (w as f32, h as f32);
    let (fx, fy) = (px as f32, py as f32);
    let r = radius.min(w / 2.0).min(h / 2.0);

    // Distance into whichever corner region (px, py) falls in; 0 outside
    // the corner boxes (i.e. in the cross formed by the two full-size
    // strips), meaning always inside there.
    let cx = if fx < r { r - fx } else if fx > w - r { fx - (w - r) } else { 0.0 };
    let cy = if fy < r { r - fy } else if fy > h - r { fy - (h - r) } else { 0.0 };
    if cx <= 0.0 || cy <= 0.0 {
        return true;
    }
    (cx * cx + cy * cy) <= r * r
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(position: PipPosition, size: PipSize, shape: PipShape) -> CameraPipConfig {
        CameraPipConfig {
            camera_url: "camera-1700000000000.webm".into(),
            enabled: true,
            position,
            size,
            shape,
            border_radius_pct: 12.0,
        }
    }

    #[test]
    fn e4_medium_circle_bottom_right_1280_wide() {
        let c = cfg(PipPosition::BottomRight, PipSize::Medium, PipShape::Circle);
        let rect = pip_placement(1280, 720, &c, 1.0);
        // 22% of 1280 = 281.6 -> rounds to 282
        assert_eq!(rect.w, 282);
        assert_eq!(rect.h, 282);
        let margin = (1280.0_f32 * 0.02).round() as i64;
        assert_eq!(rect.x, 1280 - 282 - margin);
        assert_eq!(rect.y, 720 - 282 - margin);
    }

    #[test]
    fn circle_forces_50_percent_radius() {
        let c = cfg(PipPosition::TopLeft, PipSize::Small, PipShape::Circle);
        let rect = pip_placement(1000, 1000, &c, 1.0);
        let r = pip_border_radius_px(&c, &rect);
        assert!((r - rect.w as f32 / 2.0).abs() < 1.0);
    }

    #[test]
    fn rect_shape_respects_aspect() {
        let c = cfg(PipPosition::TopLeft, PipSize::Medium, PipShape::Rectangle);
        let rect = pip_placement(1280, 720, &c, 16.0 / 9.0);
        assert!(rect.h < rect.w);
    }

    #[test]
    fn rounded_rect_corner_membership() {
        assert!(inside_rounded_rect(0, 0, 100, 100, 0.0));
        assert!(!inside_rounded_rect(0, 0, 100, 100, 20.0)); // sharp corner cut
        assert!(inside_rounded_rect(50, 50, 100, 100, 20.0)); // center always in
        assert!(!inside_rounded_rect(-1, 50, 100, 100, 20.0)); // outside bounds
    }
}
