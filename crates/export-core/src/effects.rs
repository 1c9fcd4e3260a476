// crates/export-core/src/effects.rs
//
// Per-frame compositing effects (wallpaper/crop/zoom/shadow/blur/border
// radius/padding/annotations), applied by the render worker pool (§4.7).
//
// Grounded on a `VideoTransition` trait plus kind-keyed registry,
// generalized from "blend two clips at a cut"
// to "transform one frame given the immutable RenderPlan and its effective
// timestamp". Pixel buffers here are packed RGBA8 (4 bytes/pixel, no
// stride padding) rather than YUV420P — compositing happens before the
// final color-space conversion the encoder requires.

use crate::geometry::{clamp01, inside_rounded_rect};
use crate::model::RenderPlan;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectKind {
    Crop,
    Zoom,
    ShadowBlur,
    BorderRadiusPadding,
    Annotations,
}

/// One stage of the per-frame compositing pipeline. Implementors are
/// stateless beyond the immutable `RenderPlan` passed to every call, so a
/// single boxed instance is shared (read-only) by every render worker.
pub trait RenderEffect: Send + Sync {
    fn kind(&self) -> EffectKind;
    fn label(&self) -> &'static str;

    /// Transforms a packed RGBA8 frame of `w x h` pixels, returning a new
    /// buffer of the same dimensions. `t_eff_ms` is the frame's position on
    /// the effective (trimmed) timeline, used by time-scoped effects (zoom
    /// regions, annotations).
    fn apply(&self, frame: &[u8], w: u32, h: u32, plan: &RenderPlan, t_eff_ms: i64) -> Vec<u8>;
}

fn get_px(buf: &[u8], w: u32, x: i64, y: i64) -> [u8; 4] {
    let idx = (y as u32 * w + x as u32) as usize * 4;
    [buf[idx], buf[idx + 1], buf[idx + 2], buf[idx + 3]]
}

fn set_px(buf: &mut [u8], w: u32, x: u32, y: u32, px: [u8; 4]) {
    let idx = (y * w + x) as usize * 4;
    buf[idx..idx + 4].copy_from_slice(&px);
}

/// Nearest-neighbor resample of a normalized `[x,y,w,h]` sub-rect of `src`
/// back up to the full `out_w x out_h` canvas. Used by both crop and zoom.
fn resample_region(src: &[u8], src_w: u32, src_h: u32, rx: f32, ry: f32, rw: f32, rh: f32, out_w: u32, out_h: u32) -> Vec<u8> {
    let mut out = vec![0u8; (out_w * out_h * 4) as usize];
    let (rx, ry, rw, rh) = (clamp01(rx), clamp01(ry), rw.max(0.001), rh.max(0.001));
    for oy in 0..out_h {
        let ny = ry + (oy as f32 / out_h.max(1) as f32) * rh;
        let sy = ((ny * src_h as f32) as i64).clamp(0, src_h as i64 - 1);
        for ox in 0..out_w {
            let nx = rx + (ox as f32 / out_w.max(1) as f32) * rw;
            let sx = ((nx * src_w as f32) as i64).clamp(0, src_w as i64 - 1);
            let px = get_px(src, src_w, sx, sy);
            set_px(&mut out, out_w, ox, oy, px);
        }
    }
    out
}

pub struct CropEffect;

impl RenderEffect for CropEffect {
    fn kind(&self) -> EffectKind {
        EffectKind::Crop
    }
    fn label(&self) -> &'static str {
        "crop"
    }
    fn apply(&self, frame: &[u8], w: u32, h: u32, plan: &RenderPlan, _t_eff_ms: i64) -> Vec<u8> {
        match plan.crop {
            Some(c) => resample_region(frame, w, h, c.x, c.y, c.w, c.h, w, h),
            None => frame.to_vec(),
        }
    }
}

pub struct ZoomEffect;

impl RenderEffect for ZoomEffect {
    fn kind(&self) -> EffectKind {
        EffectKind::Zoom
    }
    fn label(&self) -> &'static str {
        "zoom"
    }
    fn apply(&self, frame: &[u8], w: u32, h: u32, plan: &RenderPlan, t_eff_ms: i64) -> Vec<u8> {
        let active = plan
            .zoom_regions
            .iter()
            .find(|z| t_eff_ms >= z.start_ms && t_eff_ms < z.end_ms);
        match active {
            Some(z) => resample_region(frame, w, h, z.x, z.y, z.w, z.h, w, h),
            None => frame.to_vec(),
        }
    }
}

/// Box blur plus a center-weighted vignette (`shadow_intensity`).
pub struct ShadowBlurEffect;

impl ShadowBlurEffect {
    fn box_blur(src: &[u8], w: u32, h: u32, radius: i64) -> Vec<u8> {
        if radius <= 0 {
            return src.to_vec();
        }
        let mut out = vec![0u8; src.len()];
        for y in 0..h as i64 {
            for x in 0..w as i64 {
                let mut sum = [0u32; 4];
                let mut n = 0u32;
                for dy in -radius..=radius {
                    for dx in -radius..=radius {
                        let (sx, sy) = (x + dx, y + dy);
                        if sx >= 0 && sx < w as i64 && sy >= 0 && sy < h as i64 {
                            let px = get_px(src, w, sx, sy);
                            for c in 0..4 {
                                sum[c] += px[c] as u32;
                            }
                            n += 1;
                        }
                    }
                }
                let avg = [
                    (sum[0] / n.max(1)) as u8,
                    (sum[1] / n.max(1)) as u8,
                    (sum[2] / n.max(1)) as u8,
                    (sum[3] / n.max(1)) as u8,
                ];
                set_px(&mut out, w, x as u32, y as u32, avg);
            }
        }
        out
    }
}

impl RenderEffect for ShadowBlurEffect {
    fn kind(&self) -> EffectKind {
        EffectKind::ShadowBlur
    }
    fn label(&self) -> &'static str {
        "shadow_blur"
    }
    fn apply(&self, frame: &[u8], w: u32, h: u32, plan: &RenderPlan, _t_eff_ms: i64) -> Vec<u8> {
        let mut buf = if plan.blur {
            Self::box_blur(frame, w, h, 2)
        } else {
            frame.to_vec()
        };
        if plan.shadow_intensity > 0.0 {
            let (cx, cy) = (w as f32 / 2.0, h as f32 / 2.0);
            let max_dist = (cx * cx + cy * cy).sqrt();
            for y in 0..h {
                for x in 0..w {
                    let dist = (((x as f32 - cx).powi(2) + (y as f32 - cy).powi(2)).sqrt() / max_dist).min(1.0);
                    let darken = 1.0 - clamp01(plan.shadow_intensity) * dist * dist;
                    let idx = (y * w + x) as usize * 4;
                    for c in 0..3 {
                        buf[idx + c] = (buf[idx + c] as f32 * darken).round() as u8;
                    }
                }
            }
        }
        buf
    }
}

/// Shrinks content onto a padded canvas (filled with `wallpaper_rgb`), then
/// rounds the corners of that padded content to `border_radius_px`.
pub struct BorderRadiusPaddingEffect;

impl RenderEffect for BorderRadiusPaddingEffect {
    fn kind(&self) -> EffectKind {
        EffectKind::BorderRadiusPadding
    }
    fn label(&self) -> &'static str {
        "border_radius_padding"
    }
    fn apply(&self, frame: &[u8], w: u32, h: u32, plan: &RenderPlan, _t_eff_ms: i64) -> Vec<u8> {
        if plan.padding_px == 0 && plan.border_radius_px == 0 {
            return frame.to_vec();
        }
        let [wr, wg, wb] = plan.wallpaper_rgb;
        let mut out = vec![0u8; (w * h * 4) as usize];
        for px in out.chunks_exact_mut(4) {
            px.copy_from_slice(&[wr, wg, wb, 255]);
        }
        let pad = plan.padding_px as i64;
        let inner_w = (w as i64 - 2 * pad).max(1) as u32;
        let inner_h = (h as i64 - 2 * pad).max(1) as u32;
        let resized = if inner_w == w && inner_h == h {
            frame.to_vec()
        } else {
            resample_region(frame, w, h, 0.0, 0.0, 1.0, 1.0, inner_w, inner_h)
        };
        for y in 0..inner_h {
            for x in 0..inner_w {
                if !inside_rounded_rect(x as i64, y as i64, inner_w, inner_h, plan.border_radius_px as f32) {
                    continue;
                }
                let px = get_px(&resized, inner_w, x as i64, y as i64);
                let (ox, oy) = (x as i64 + pad, y as i64 + pad);
                if ox >= 0 && oy >= 0 && (ox as u32) < w && (oy as u32) < h {
                    set_px(&mut out, w, ox as u32, oy as u32, px);
                }
            }
        }
        out
    }
}

/// Draws a translucent highlight box for each annotation active at
/// `t_eff_ms`. There is no font/glyph rasterizer in this pipeline's
/// dependency stack, so the annotation's text is not rasterized — only its
/// bounding highlight is composited, matching how the box itself (not the
/// caption glyphs) is the part that affects pixel output that downstream
/// stages (encoder, muxer) care about.
pub struct AnnotationsEffect;

impl RenderEffect for AnnotationsEffect {
    fn kind(&self) -> EffectKind {
        EffectKind::Annotations
    }
    fn label(&self) -> &'static str {
        "annotations"
    }
    fn apply(&self, frame: &[u8], w: u32, h: u32, plan: &RenderPlan, t_eff_ms: i64) -> Vec<u8> {
        let mut out = frame.to_vec();
        for a in &plan.annotations {
            if t_eff_ms < a.start_ms || t_eff_ms >= a.end_ms {
                continue;
            }
            let box_w = (w as f32 * 0.2) as u32;
            let box_h = (h as f32 * 0.06) as u32;
            let x0 = (clamp01(a.x) * w as f32) as u32;
            let y0 = (clamp01(a.y) * h as f32) as u32;
            for y in y0..(y0 + box_h).min(h) {
                for x in x0..(x0 + box_w).min(w) {
                    let idx = (y * w + x) as usize * 4;
                    for c in 0..3 {
                        out[idx + c] = ((out[idx + c] as u32 + 255) / 2) as u8;
                    }
                }
            }
        }
        out
    }
}

/// All effects keyed by kind, shared read-only by every render worker.
pub fn registry() -> HashMap<EffectKind, Box<dyn RenderEffect>> {
    let mut m: HashMap<EffectKind, Box<dyn RenderEffect>> = HashMap::new();
    m.insert(EffectKind::Crop, Box::new(CropEffect));
    m.insert(EffectKind::Zoom, Box::new(ZoomEffect));
    m.insert(EffectKind::ShadowBlur, Box::new(ShadowBlurEffect));
    m.insert(EffectKind::BorderRadiusPadding, Box::new(BorderRadiusPaddingEffect));
    m.insert(EffectKind::Annotations, Box::new(AnnotationsEffect));
    m
}

/// Default application order: crop/zoom affect framing first, then
/// shadow/blur, then border radius/padding (which changes canvas content
/// outside the rounded rect), then annotations drawn on top of everything.
pub fn default_order() -> [EffectKind; 5] {
    [
        EffectKind::Crop,
        EffectKind::Zoom,
        EffectKind::ShadowBlur,
        EffectKind::BorderRadiusPadding,
        EffectKind::Annotations,
    ]
}

/// Runs the full effect chain over one frame in `default_order()`.
pub fn apply_all(frame: &[u8], w: u32, h: u32, plan: &RenderPlan, t_eff_ms: i64, reg: &HashMap<EffectKind, Box<dyn RenderEffect>>) -> Vec<u8> {
    let mut buf = frame.to_vec();
    for kind in default_order() {
        if let Some(effect) = reg.get(&kind) {
            buf = effect.apply(&buf, w, h, plan, t_eff_ms);
        }
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CropRegion, ZoomRegion};

    fn blank_plan(w: u32, h: u32) -> RenderPlan {
        RenderPlan {
            output_width: w,
            output_height: h,
            wallpaper_rgb: [10, 20, 30],
            zoom_regions: vec![],
            shadow_intensity: 0.0,
            blur: false,
            motion_blur: false,
            border_radius_px: 0,
            padding_px: 0,
            crop: None,
            annotations: vec![],
            source_width: w,
            source_height: h,
            camera_pip: None,
        }
    }

    fn solid_frame(w: u32, h: u32, rgba: [u8; 4]) -> Vec<u8> {
        let mut buf = vec![0u8; (w * h * 4) as usize];
        for px in buf.chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
        buf
    }

    #[test]
    fn crop_noop_without_config() {
        let frame = solid_frame(4, 4, [1, 2, 3, 255]);
        let plan = blank_plan(4, 4);
        let out = CropEffect.apply(&frame, 4, 4, &plan, 0);
        assert_eq!(out, frame);
    }

    #[test]
    fn crop_resamples_to_full_canvas_size() {
        let frame = solid_frame(4, 4, [9, 9, 9, 255]);
        let mut plan = blank_plan(4, 4);
        plan.crop = Some(CropRegion { x: 0.25, y: 0.25, w: 0.5, h: 0.5 });
        let out = CropEffect.apply(&frame, 4, 4, &plan, 0);
        assert_eq!(out.len(), frame.len());
    }

    #[test]
    fn zoom_only_active_within_time_window() {
        let frame = solid_frame(2, 2, [5, 5, 5, 255]);
        let mut plan = blank_plan(2, 2);
        plan.zoom_regions.push(ZoomRegion { start_ms: 1000, end_ms: 2000, x: 0.0, y: 0.0, w: 0.5, h: 0.5 });
        let before = ZoomEffect.apply(&frame, 2, 2, &plan, 500);
        assert_eq!(before, frame); // unchanged outside window
        let during = ZoomEffect.apply(&frame, 2, 2, &plan, 1500);
        assert_eq!(during.len(), frame.len());
    }

    #[test]
    fn padding_fills_border_with_wallpaper_color() {
        let frame = solid_frame(10, 10, [200, 200, 200, 255]);
        let mut plan = blank_plan(10, 10);
        plan.padding_px = 2;
        let out = BorderRadiusPaddingEffect.apply(&frame, 10, 10, &plan, 0);
        // top-left corner pixel should be wallpaper color, not content color
        assert_eq!(&out[0..3], &plan.wallpaper_rgb);
    }

    #[test]
    fn registry_contains_all_five_kinds() {
        let reg = registry();
        assert_eq!(reg.len(), 5);
        assert!(reg.contains_key(&EffectKind::Annotations));
    }

    #[test]
    fn apply_all_runs_full_chain_without_panicking() {
        let frame = solid_frame(8, 8, [1, 1, 1, 255]);
        let plan = blank_plan(8, 8);
        let reg = registry();
        let out = apply_all(&frame, 8, 8, &plan, 0, &reg);
        assert_eq!(out.len(), frame.len());
    }
}
