// crates/export-core/src/model.rs
//
// Core data types shared by every stage of the export pipeline. No I/O, no
// ffmpeg — this module is pure enough to unit-test without a media file.

use serde::{Deserialize, Serialize};

/// The N-th frame of the effective (trimmed) output timeline, monotonic from 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FrameIndex(pub u64);

impl FrameIndex {
    pub fn next(self) -> Self {
        FrameIndex(self.0 + 1)
    }
}

impl From<u64> for FrameIndex {
    fn from(v: u64) -> Self {
        FrameIndex(v)
    }
}

/// Integer microseconds on either the effective or source timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);

    pub fn from_ms(ms: i64) -> Self {
        Timestamp(ms * 1_000)
    }

    pub fn from_secs_f64(s: f64) -> Self {
        Timestamp((s * 1_000_000.0).round() as i64)
    }

    pub fn as_ms(self) -> i64 {
        self.0 / 1_000
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }
}

impl std::ops::Add for Timestamp {
    type Output = Timestamp;
    fn add(self, rhs: Timestamp) -> Timestamp {
        Timestamp(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Timestamp {
    type Output = Timestamp;
    fn sub(self, rhs: Timestamp) -> Timestamp {
        Timestamp(self.0 - rhs.0)
    }
}

/// A half-open `[start_ms, end_ms)` region of the source timeline to skip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrimRegion {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl TrimRegion {
    pub fn len_ms(&self) -> i64 {
        self.end_ms - self.start_ms
    }

    pub fn contains_ms(&self, t_ms: i64) -> bool {
        t_ms >= self.start_ms && t_ms < self.end_ms
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkKind {
    Key,
    Delta,
}

/// An encoded chunk as handed from Demuxer to Decoder, or Encoder to Muxer.
/// `bytes` is owned by the caller until consumed.
#[derive(Debug, Clone)]
pub struct EncodedChunk {
    pub kind: ChunkKind,
    pub timestamp: Timestamp,
    pub duration: Timestamp,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipSize {
    Small,
    Medium,
    Large,
}

impl PipSize {
    /// Percentage of output width the PiP occupies.
    pub fn percent(self) -> f32 {
        match self {
            PipSize::Small => 15.0,
            PipSize::Medium => 22.0,
            PipSize::Large => 30.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipShape {
    RoundedRect,
    Rectangle,
    Square,
    Circle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraPipConfig {
    pub camera_url: String,
    pub enabled: bool,
    pub position: PipPosition,
    pub size: PipSize,
    pub shape: PipShape,
    /// 0..=50
    pub border_radius_pct: f32,
}

/// A region of the source frame to dolly-zoom into, active for a span of the
/// effective timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoomRegion {
    pub start_ms: i64,
    pub end_ms: i64,
    /// Normalized [0,1] rect within the source frame.
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CropRegion {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Annotation {
    pub start_ms: i64,
    pub end_ms: i64,
    pub text: String,
    pub x: f32,
    pub y: f32,
}

/// Immutable per-export configuration shared by all renderers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderPlan {
    pub output_width: u32,
    pub output_height: u32,
    pub wallpaper_rgb: [u8; 3],
    pub zoom_regions: Vec<ZoomRegion>,
    pub shadow_intensity: f32,
    pub blur: bool,
    pub motion_blur: bool,
    pub border_radius_px: u32,
    pub padding_px: u32,
    pub crop: Option<CropRegion>,
    pub annotations: Vec<Annotation>,
    pub source_width: u32,
    pub source_height: u32,
    pub camera_pip: Option<CameraPipConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Container {
    Mp4,
    Gif,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportTarget {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub video_codec: String,
    pub video_bitrate: u64,
    pub audio_codec: String,
    pub audio_bitrate: u64,
    pub container: Container,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioInput {
    pub url: String,
    /// 0.0..=2.0
    pub gain: f32,
}

/// The immutable config object an `Exporter` consumes end to end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportPlan {
    pub video_url: String,
    #[serde(default)]
    pub audio_inputs: Vec<AudioInput>,
    pub output_path: String,
    pub target: ExportTarget,
    pub render_plan: RenderPlan,
    #[serde(default)]
    pub trim_regions: Vec<TrimRegion>,
    #[serde(default)]
    pub camera_pip: Option<CameraPipConfig>,
    #[serde(default = "default_true")]
    pub parallel_rendering: bool,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_index_next_is_monotonic() {
        let a = FrameIndex(0);
        assert_eq!(a.next(), FrameIndex(1));
        assert_eq!(a.next().next(), FrameIndex(2));
    }

    #[test]
    fn timestamp_round_trips_ms() {
        let t = Timestamp::from_ms(1500);
        assert_eq!(t.as_ms(), 1500);
        assert_eq!(t.0, 1_500_000);
    }

    #[test]
    fn trim_region_half_open_membership() {
        let r = TrimRegion { start_ms: 1000, end_ms: 2000 };
        assert!(r.contains_ms(1000));
        assert!(!r.contains_ms(2000));
        assert!(r.contains_ms(1999));
    }

    #[test]
    fn pip_size_percentages() {
        assert_eq!(PipSize::Small.percent(), 15.0);
        assert_eq!(PipSize::Medium.percent(), 22.0);
        assert_eq!(PipSize::Large.percent(), 30.0);
    }

    #[test]
    fn export_plan_deserializes_minimal_json() {
        let json = serde_json::json!({
            "video_url": "recording-1700000000000.webm",
            "output_path": "out.mp4",
            "target": {
                "width": 1280, "height": 720, "frame_rate": 30,
                "video_codec": "h264", "video_bitrate": 8_000_000,
                "audio_codec": "aac", "audio_bitrate": 128_000,
                "container": "Mp4"
            },
            "render_plan": {
                "output_width": 1280, "output_height": 720,
                "wallpaper_rgb": [0,0,0],
                "zoom_regions": [], "shadow_intensity": 0.0,
                "blur": false, "motion_blur": false,
                "border_radius_px": 0, "padding_px": 0,
                "crop": null, "annotations": [],
                "source_width": 1280, "source_height": 720,
                "camera_pip": null
            }
        });
        let plan: ExportPlan = serde_json::from_value(json).unwrap();
        assert_eq!(plan.trim_regions.len(), 0);
        assert!(plan.parallel_rendering);
    }
}
