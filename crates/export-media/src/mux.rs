// crates/export-media/src/mux.rs
//
// Output container lifecycle (§4.9): open, write header, accept interleaved
// video/audio packets, write trailer. The trait split (`Muxer` for
// setup/finish, `VideoMuxer`/`AudioMuxer` for per-stream writes) is grounded
// on `other_examples/`'s `CapSoftware-Cap` fragmented-mp4 muxer traits; the
// `ffmpeg_the_third::format::context::Output` header/trailer lifecycle
// itself is grounded on `encode.rs::run_encode`.

use std::path::Path;

use export_core::error::{ExportError, ExportResult};
use ffmpeg_the_third as ffmpeg;
use ffmpeg::format::context::Output;
use ffmpeg::format::output as open_output;
use ffmpeg::util::frame::video::Video as VideoFrame;

use crate::audio::AudioEncoder;
use crate::video_encoder::{VideoEncoder, VideoEncoderConfig};

pub trait Muxer {
    fn setup(&mut self) -> ExportResult<()>;
    fn finish(&mut self) -> ExportResult<()>;
}

pub trait VideoMuxer {
    fn send_video_frame(&mut self, frame: &VideoFrame) -> ExportResult<()>;
}

pub trait AudioMuxer {
    fn send_audio_mix(&mut self, mixed: &[f32]) -> ExportResult<()>;
}

pub struct Mp4Muxer {
    octx: Output,
    video: VideoEncoder,
    audio: Option<AudioEncoder>,
    header_written: bool,
}

impl Mp4Muxer {
    pub fn new(
        output_path: &Path,
        video_cfg: VideoEncoderConfig,
        audio_bitrate: Option<usize>,
    ) -> ExportResult<Self> {
        let mut octx =
            open_output(output_path).map_err(|e| ExportError::MuxerError(e.to_string()))?;

        let video = VideoEncoder::open(&mut octx, &video_cfg)?;
        let audio = match audio_bitrate {
            Some(bitrate) => Some(AudioEncoder::open(&mut octx, bitrate)?),
            None => None,
        };

        Ok(Mp4Muxer { octx, video, audio, header_written: false })
    }
}

impl Muxer for Mp4Muxer {
    fn setup(&mut self) -> ExportResult<()> {
        self.octx
            .write_header()
            .map_err(|e| ExportError::MuxerError(e.to_string()))?;
        self.header_written = true;
        Ok(())
    }

    fn finish(&mut self) -> ExportResult<()> {
        if !self.header_written {
            return Ok(());
        }
        self.video.flush(&mut self.octx)?;
        if let Some(audio) = self.audio.as_mut() {
            audio.flush(&mut self.octx)?;
        }
        self.octx
            .write_trailer()
            .map_err(|e| ExportError::MuxerError(e.to_string()))
    }
}

impl VideoMuxer for Mp4Muxer {
    fn send_video_frame(&mut self, frame: &VideoFrame) -> ExportResult<()> {
        self.video.encode_yuv_frame(&mut self.octx, frame)
    }
}

impl AudioMuxer for Mp4Muxer {
    fn send_audio_mix(&mut self, mixed: &[f32]) -> ExportResult<()> {
        match self.audio.as_mut() {
            Some(audio) => audio.push_mixed(mixed, &mut self.octx),
            None => Ok(()),
        }
    }
}
