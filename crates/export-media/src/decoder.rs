// crates/export-media/src/decoder.rs
//
// Wraps an ffmpeg video decoder with a bounded pending-submit queue so a fast
// demuxer can't run arbitrarily far ahead of a slow decoder.
//
// The gatekeeper is the same `Mutex<u32>` + `Condvar` idiom as the donor's
// `worker.rs::probe_sem: Arc<(Mutex<u32>, Condvar)>` — a counting semaphore
// built from primitives rather than reaching for a crate, because the donor
// never does either and this keeps the texture consistent.

use std::sync::{Condvar, Mutex};

use export_core::error::{ExportError, ExportResult};
use export_core::model::{ChunkKind, EncodedChunk};
use ffmpeg_the_third as ffmpeg;
use ffmpeg::codec::context::Context as CodecContext;
use ffmpeg::codec::decoder::video::Video as VideoDecoderInner;
use ffmpeg::codec::Id as CodecId;
use ffmpeg::util::frame::video::Video as VideoFrame;

use crate::demux::DecoderConfig;

const MAX_PENDING: u32 = 8;

struct PendingGate {
    lock: Mutex<u32>,
    cv: Condvar,
}

impl PendingGate {
    fn new() -> Self {
        PendingGate { lock: Mutex::new(0), cv: Condvar::new() }
    }

    fn acquire(&self) {
        let mut count = self.lock.lock().unwrap();
        while *count >= MAX_PENDING {
            count = self.cv.wait(count).unwrap();
        }
        *count += 1;
    }

    fn release(&self) {
        let mut count = self.lock.lock().unwrap();
        *count = count.saturating_sub(1);
        self.cv.notify_one();
    }
}

/// A single decoded frame in RGBA8 row-major layout, ready for rendering.
pub struct RawFrame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub pts_us: i64,
}

pub struct VideoDecoder {
    inner: VideoDecoderInner,
    scaler: Option<ffmpeg::software::scaling::Context>,
    width: u32,
    height: u32,
    gate: PendingGate,
}

impl VideoDecoder {
    pub fn new(config: &DecoderConfig) -> ExportResult<Self> {
        let codec = ffmpeg::decoder::find(config.codec_id)
            .ok_or_else(|| ExportError::UnsupportedCodec(format!("{:?}", config.codec_id)))?;
        let ctx = CodecContext::new_with_codec(codec);
        let inner = ctx
            .decoder()
            .video()
            .map_err(|e| ExportError::DecoderError(e.to_string()))?;

        Ok(VideoDecoder {
            inner,
            scaler: None,
            width: config.width,
            height: config.height,
            gate: PendingGate::new(),
        })
    }

    /// Submits one encoded chunk for decode, blocking if `MAX_PENDING` frames
    /// are already queued ahead of the caller in the output buffer.
    pub fn submit(&mut self, chunk: &EncodedChunk) -> ExportResult<Vec<RawFrame>> {
        self.gate.acquire();
        let result = self.decode_chunk(chunk);
        self.gate.release();
        result
    }

    fn decode_chunk(&mut self, chunk: &EncodedChunk) -> ExportResult<Vec<RawFrame>> {
        let mut packet = ffmpeg::Packet::copy(&chunk.bytes);
        packet.set_pts(Some(chunk.timestamp.as_secs_f64() as i64));
        if matches!(chunk.kind, ChunkKind::Key) {
            // AV_PKT_FLAG_KEY is set by the muxer/demuxer on the wire bytes
            // already; nothing additional to mark here.
        }

        self.inner
            .send_packet(&packet)
            .map_err(|e| ExportError::DecoderError(e.to_string()))?;

        self.drain()
    }

    /// Signals end of stream and returns any frames still buffered inside
    /// the decoder.
    pub fn flush(&mut self) -> ExportResult<Vec<RawFrame>> {
        self.inner
            .send_eof()
            .map_err(|e| ExportError::DecoderError(e.to_string()))?;
        self.drain()
    }

    fn drain(&mut self) -> ExportResult<Vec<RawFrame>> {
        let mut out = Vec::new();
        let mut decoded = VideoFrame::empty();
        while self.inner.receive_frame(&mut decoded).is_ok() {
            let rgba = self.convert_to_rgba(&decoded)?;
            let pts_us = decoded.pts().unwrap_or(0);
            out.push(RawFrame { rgba, width: self.width, height: self.height, pts_us });
            decoded = VideoFrame::empty();
        }
        Ok(out)
    }

    fn convert_to_rgba(&mut self, frame: &VideoFrame) -> ExportResult<Vec<u8>> {
        if self.scaler.is_none() {
            let scaler = ffmpeg::software::scaling::Context::get(
                frame.format(),
                frame.width(),
                frame.height(),
                ffmpeg::format::Pixel::RGBA,
                self.width,
                self.height,
                ffmpeg::software::scaling::Flags::BILINEAR,
            )
            .map_err(|e| ExportError::DecoderError(e.to_string()))?;
            self.scaler = Some(scaler);
        }

        let mut rgba_frame = VideoFrame::empty();
        self.scaler
            .as_mut()
            .unwrap()
            .run(frame, &mut rgba_frame)
            .map_err(|e| ExportError::DecoderError(e.to_string()))?;

        let stride = rgba_frame.stride(0);
        let row_bytes = self.width as usize * 4;
        let data = rgba_frame.data(0);
        let mut packed = Vec::with_capacity(row_bytes * self.height as usize);
        for row in 0..self.height as usize {
            let start = row * stride;
            packed.extend_from_slice(&data[start..start + row_bytes]);
        }
        Ok(packed)
    }

    pub fn codec_id(&self) -> CodecId {
        self.inner.id()
    }
}

/// True if ffmpeg has a decoder registered for `codec_id` — the probe
/// `FrameSource::select` uses to decide whether the cheap forward-only
/// decode path is viable at all (§4.5).
pub fn codec_supported(codec_id: CodecId) -> bool {
    ffmpeg::decoder::find(codec_id).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_blocks_beyond_capacity_and_releases() {
        let gate = PendingGate::new();
        for _ in 0..MAX_PENDING {
            gate.acquire();
        }
        assert_eq!(*gate.lock.lock().unwrap(), MAX_PENDING);
        gate.release();
        assert_eq!(*gate.lock.lock().unwrap(), MAX_PENDING - 1);
    }

    #[test]
    fn h264_is_supported() {
        assert!(codec_supported(CodecId::H264));
    }

    #[test]
    fn none_is_unsupported() {
        assert!(!codec_supported(CodecId::None));
    }
}
