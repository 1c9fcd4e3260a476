// crates/export-media/src/video_encoder.rs
//
// H.264 video stream setup and per-frame encode, lifted nearly unchanged
// from `encode.rs::run_encode`'s video stream construction: CRF-controlled
// VBR (bit_rate left at 0, `crf`/`preset` passed via the open dictionary),
// `set_aspect_ratio(1,1)` forced again after `open_as_with` because
// libavcodec resets SAR to 0:1 on open, and codec parameters copied into the
// stream's codecpar via the raw `avcodec_parameters_from_context` FFI call
// since this version of `Stream::codec()` doesn't exist.

use export_core::error::{ExportError, ExportResult};
use ffmpeg_the_third as ffmpeg;
use ffmpeg::codec::context::Context as CodecContext;
use ffmpeg::codec::{self, encoder};
use ffmpeg::format::context::Output;
use ffmpeg::format::Pixel;
use ffmpeg::util::dictionary::Owned as Dictionary;
use ffmpeg::util::frame::video::Video as VideoFrame;
use ffmpeg::util::rational::Rational;
use ffmpeg::Packet;

pub struct VideoEncoderConfig {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub crf: &'static str,
    pub preset: &'static str,
}

pub struct VideoEncoder {
    encoder: encoder::video::Video,
    stream_index: usize,
    time_base: Rational,
    next_pts: i64,
}

impl VideoEncoder {
    pub fn open(octx: &mut Output, cfg: &VideoEncoderConfig) -> ExportResult<Self> {
        let codec = encoder::find(codec::Id::H264)
            .ok_or_else(|| ExportError::EncoderError("h264 encoder not available".into()))?;

        let mut stream = octx
            .add_stream(codec)
            .map_err(|e| ExportError::EncoderError(e.to_string()))?;
        let stream_index = stream.index();

        let ctx = CodecContext::new_with_codec(codec);
        let mut video_enc = ctx
            .encoder()
            .video()
            .map_err(|e| ExportError::EncoderError(e.to_string()))?;

        let time_base = Rational::new(1, cfg.frame_rate as i32);
        video_enc.set_width(cfg.width);
        video_enc.set_height(cfg.height);
        video_enc.set_format(Pixel::YUV420P);
        video_enc.set_time_base(time_base);
        video_enc.set_frame_rate(Some(Rational::new(cfg.frame_rate as i32, 1)));
        video_enc.set_bit_rate(0);

        let mut opts = Dictionary::new();
        opts.set("crf", cfg.crf);
        opts.set("preset", cfg.preset);

        let mut opened = video_enc
            .open_as_with(codec, opts)
            .map_err(|e| ExportError::EncoderError(e.to_string()))?;

        // libavcodec resets SAR to 0:1 during open; force it back to square
        // pixels afterward rather than relying on the pre-open value.
        opened.set_aspect_ratio(Rational::new(1, 1));

        unsafe {
            ffmpeg::ffi::avcodec_parameters_from_context(
                stream.parameters().as_mut_ptr(),
                opened.as_ptr(),
            );
        }
        stream.set_time_base(time_base);

        Ok(VideoEncoder { encoder: opened, stream_index, time_base, next_pts: 0 })
    }

    /// Encodes one RGBA8 frame already converted to YUV420P by the caller.
    pub fn encode_yuv_frame(&mut self, octx: &mut Output, yuv: &VideoFrame) -> ExportResult<()> {
        let mut frame = yuv.clone();
        frame.set_pts(Some(self.next_pts));
        self.next_pts += 1;

        self.encoder
            .send_frame(&frame)
            .map_err(|e| ExportError::EncoderError(e.to_string()))?;
        self.drain_packets(octx)
    }

    pub fn flush(&mut self, octx: &mut Output) -> ExportResult<()> {
        self.encoder
            .send_eof()
            .map_err(|e| ExportError::EncoderError(e.to_string()))?;
        self.drain_packets(octx)
    }

    fn drain_packets(&mut self, octx: &mut Output) -> ExportResult<()> {
        let mut packet = Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.stream_index);
            packet.rescale_ts(self.time_base, octx.stream(self.stream_index).unwrap().time_base());
            packet
                .write_interleaved(octx)
                .map_err(|e| ExportError::MuxerError(e.to_string()))?;
            packet = Packet::empty();
        }
        Ok(())
    }
}
