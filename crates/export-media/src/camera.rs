// crates/export-media/src/camera.rs
//
// Composites a camera-feed frame onto the main frame as a picture-in-picture
// overlay (§4.6). Placement geometry comes from `export_core::geometry`;
// this module owns the camera track's own decode pipeline plus the pixel
// copy.
//
// The packed-RGBA plane-offset arithmetic mirrors `helpers/yuv.rs`'s
// stride-aware copy for packed YUV420P — same idea, different pixel format
// and a rounded-rect/circle mask test instead of a straight rectangular one.

use std::path::Path;

use export_core::error::ExportResult;
use export_core::geometry::{inside_rounded_rect, pip_border_radius_px, pip_placement};
use export_core::model::CameraPipConfig;

use crate::decoder::VideoDecoder;
use crate::demux::Demuxer;

const STROKE_PX: u32 = 3;
const STROKE_ALPHA: f32 = 0.2;

/// Owns the camera track's own demuxer/decoder pair and composites a
/// time-seeked camera frame onto the main frame on demand.
pub struct CameraPipCompositor {
    demuxer: Option<Demuxer>,
    decoder: Option<VideoDecoder>,
    duration_s: f64,
}

impl CameraPipCompositor {
    /// Opens the camera track at `camera_url`. Any failure (missing file,
    /// unsupported container/codec) is soft: `is_ready()` reports `false`
    /// and `render` becomes a no-op rather than aborting the export.
    pub fn initialize(camera_url: &Path) -> Self {
        let opened = Demuxer::initialize(camera_url).and_then(|demuxer| {
            let decoder = VideoDecoder::new(&demuxer.info().decoder_config)?;
            Ok((demuxer, decoder))
        });

        match opened {
            Ok((demuxer, decoder)) => {
                let duration_s = demuxer.info().duration_s;
                CameraPipCompositor { demuxer: Some(demuxer), decoder: Some(decoder), duration_s }
            }
            Err(e) => {
                tracing::warn!("camera PiP track unavailable, disabling overlay: {e}");
                CameraPipCompositor { demuxer: None, decoder: None, duration_s: 0.0 }
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        self.demuxer.is_some() && self.decoder.is_some()
    }

    /// Seeks the camera track to `t_ms`, decodes the nearest frame, and
    /// composites it onto `dst_rgba`. A no-op once `t_ms` exceeds the
    /// camera's own duration, so a camera track shorter than the recording
    /// gracefully stops contributing instead of erroring (§4.6).
    pub fn render(
        &mut self,
        dst_rgba: &mut [u8],
        dst_w: u32,
        dst_h: u32,
        t_ms: i64,
        cfg: &CameraPipConfig,
    ) -> ExportResult<()> {
        if !cfg.enabled || !self.is_ready() {
            return Ok(());
        }
        let t_s = t_ms as f64 / 1000.0;
        if t_s > self.duration_s {
            return Ok(());
        }

        let demuxer = self.demuxer.as_ref().unwrap();
        let fps = demuxer.info().est_fps.max(1.0);
        demuxer.seek_to_keyframe(t_s)?;
        let chunks = demuxer.chunks_from(t_s, t_s + 1.0 / fps + 0.5)?;

        let decoder = self.decoder.as_mut().unwrap();
        let mut frame = None;
        for chunk in &chunks {
            if let Some(f) = decoder.submit(chunk)?.into_iter().next() {
                frame = Some(f);
                break;
            }
        }
        if frame.is_none() {
            frame = decoder.flush()?.into_iter().next();
        }

        let Some(frame) = frame else { return Ok(()) };
        Self::composite(dst_rgba, dst_w, dst_h, &frame.rgba, frame.width, frame.height, cfg);
        Ok(())
    }

    /// Blits `cam_rgba` (width `cam_w` x height `cam_h`) onto `dst_rgba`
    /// (width `dst_w` x height `dst_h`) per `cfg`'s position/size/shape,
    /// horizontally mirrored, with a 3-px 20%-white stroke along the edge.
    fn composite(
        dst_rgba: &mut [u8],
        dst_w: u32,
        dst_h: u32,
        cam_rgba: &[u8],
        cam_w: u32,
        cam_h: u32,
        cfg: &CameraPipConfig,
    ) {
        if !cfg.enabled {
            return;
        }
        let src_aspect = cam_w as f32 / cam_h.max(1) as f32;
        let rect = pip_placement(dst_w, dst_h, cfg, src_aspect);
        let radius = pip_border_radius_px(cfg, &rect);

        for py in 0..rect.h {
            let dy = rect.y + py as i64;
            if dy < 0 || dy as u32 >= dst_h {
                continue;
            }
            for px in 0..rect.w {
                let dx = rect.x + px as i64;
                if dx < 0 || dx as u32 >= dst_w {
                    continue;
                }
                if !inside_rounded_rect(px as i64, py as i64, rect.w, rect.h, radius) {
                    continue;
                }

                let dst_off = (dy as usize * dst_w as usize + dx as usize) * 4;
                if dst_off + 4 > dst_rgba.len() {
                    continue;
                }

                let on_stroke = px < STROKE_PX
                    || py < STROKE_PX
                    || px + STROKE_PX >= rect.w
                    || py + STROKE_PX >= rect.h;

                if on_stroke {
                    for c in 0..3 {
                        let existing = dst_rgba[dst_off + c] as f32;
                        dst_rgba[dst_off + c] =
                            (255.0 * STROKE_ALPHA + existing * (1.0 - STROKE_ALPHA)) as u8;
                    }
                    continue;
                }

                // Horizontally mirrored: sample the camera frame right-to-left.
                let mirrored_px = rect.w - 1 - px;
                let sx = (mirrored_px as f32 / rect.w.max(1) as f32 * cam_w as f32) as u32;
                let sy = (py as f32 / rect.h.max(1) as f32 * cam_h as f32) as u32;
                let sx = sx.min(cam_w.saturating_sub(1));
                let sy = sy.min(cam_h.saturating_sub(1));

                let src_off = (sy as usize * cam_w as usize + sx as usize) * 4;
                if src_off + 4 <= cam_rgba.len() {
                    dst_rgba[dst_off..dst_off + 4].copy_from_slice(&cam_rgba[src_off..src_off + 4]);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use export_core::model::{PipPosition, PipShape, PipSize};

    fn make_cfg() -> CameraPipConfig {
        CameraPipConfig {
            camera_url: "camera-1700000000000.webm".into(),
            enabled: true,
            position: PipPosition::BottomRight,
            size: PipSize::Medium,
            shape: PipShape::Rectangle,
            border_radius_pct: 0.0,
        }
    }

    #[test]
    fn disabled_config_leaves_destination_untouched() {
        let mut dst = vec![0u8; 4 * 4 * 4];
        let cam = vec![255u8; 2 * 2 * 4];
        let mut cfg = make_cfg();
        cfg.enabled = false;
        CameraPipCompositor::composite(&mut dst, 4, 4, &cam, 2, 2, &cfg);
        assert!(dst.iter().all(|&b| b == 0));
    }

    #[test]
    fn enabled_rectangle_writes_some_pixels() {
        let mut dst = vec![0u8; 64 * 64 * 4];
        let cam = vec![200u8; 16 * 16 * 4];
        let cfg = make_cfg();
        CameraPipCompositor::composite(&mut dst, 64, 64, &cam, 16, 16, &cfg);
        assert!(dst.iter().any(|&b| b == 200));
    }

    #[test]
    fn mirrors_camera_horizontally() {
        let mut dst = vec![0u8; 64 * 64 * 4];
        let cam_w = 16u32;
        let cam_h = 16u32;
        let mut cam = vec![0u8; (cam_w * cam_h * 4) as usize];
        for y in 0..cam_h {
            for x in 0..cam_w {
                let off = ((y * cam_w + x) * 4) as usize;
                let color = if x < cam_w / 2 { [10, 20, 30, 255] } else { [200, 210, 220, 255] };
                cam[off..off + 4].copy_from_slice(&color);
            }
        }
        let cfg = make_cfg();
        CameraPipCompositor::composite(&mut dst, 64, 64, &cam, cam_w, cam_h, &cfg);

        let src_aspect = cam_w as f32 / cam_h as f32;
        let rect = pip_placement(64, 64, &cfg, src_aspect);
        // A column just inside the right stroke margin should sample the
        // camera's LEFT half once mirrored — the un-mirrored bug would
        // instead sample the camera's right half here.
        let px = rect.w - 1 - STROKE_PX;
        let py = rect.h / 2;
        let dx = (rect.x + px as i64) as usize;
        let dy = (rect.y + py as i64) as usize;
        let dst_off = (dy * 64 + dx) * 4;
        assert_eq!(dst[dst_off], 10);
    }

    #[test]
    fn stroke_blends_white_over_border_pixels() {
        let mut dst = vec![0u8; 64 * 64 * 4];
        let cam = vec![200u8; 16 * 16 * 4];
        let cfg = make_cfg();
        CameraPipCompositor::composite(&mut dst, 64, 64, &cam, 16, 16, &cfg);

        let src_aspect = 1.0;
        let rect = pip_placement(64, 64, &cfg, src_aspect);
        let dx = rect.x as usize;
        let dy = (rect.y + rect.h as i64 / 2) as usize;
        let dst_off = (dy * 64 + dx) * 4;
        // 255*0.2 + 0*0.8 = 51
        assert_eq!(dst[dst_off], 51);
    }
}
