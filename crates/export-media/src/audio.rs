// crates/export-media/src/audio.rs
//
// Audio decode, N-input gain mixing, resampling, and AAC encoding.
// Grounded on `encode.rs::AudioFifo`/`AudioEncState`: a stereo FLTP ring
// buffer fed by a resampler and drained in encoder-frame-size chunks, with
// the tail zero-padded on flush. Extended here from a single source stream
// to mixing `N` gain-scaled inputs sample-for-sample before the FIFO.
//
// `AudioFileDecoder` is grounded on `encode.rs`'s per-clip audio decode
// loop: open a decoder from the stream's own parameters, skip pre-roll by
// PTS, lazily build a resampler the first time the source format doesn't
// already match the mix target, and special-case mono sources into the
// stereo target layout before resampling.

use std::path::{Path, PathBuf};

use export_core::error::{ExportError, ExportResult};
use export_core::model::AudioInput;
use ffmpeg_the_third as ffmpeg;
use ffmpeg::codec::context::Context as CodecContext;
use ffmpeg::codec::{self, encoder};
use ffmpeg::format::context::Output;
use ffmpeg::format::input as open_input;
use ffmpeg::format::sample::{Sample, Type as SampleType};
use ffmpeg::media::Type as MediaType;
use ffmpeg::software::resampling;
use ffmpeg::util::channel_layout::ChannelLayout;
use ffmpeg::util::frame::audio::Audio as AudioFrame;
use ffmpeg::util::rational::Rational;
use ffmpeg::Packet;

pub const AUDIO_RATE: u32 = 44_100;

/// Decodes one audio-bearing source file, resampling to stereo f32 at
/// `AUDIO_RATE` on demand. Opens a fresh `format::input` per `extract` call
/// rather than holding one open across calls, matching `Demuxer`'s own
/// "reopen per read pass" shape.
pub struct AudioFileDecoder {
    path: PathBuf,
    stream_index: usize,
}

impl AudioFileDecoder {
    /// Opens `path` and locates its best audio track. Fails with
    /// `CorruptInput` if the file can't be parsed or carries no audio.
    pub fn load(path: &Path) -> ExportResult<Self> {
        let ictx = open_input(path).map_err(|e| ExportError::CorruptInput(format!("{}: {e}", path.display())))?;
        let stream = ictx
            .streams()
            .best(MediaType::Audio)
            .ok_or_else(|| ExportError::CorruptInput(format!("no audio track in {}", path.display())))?;
        Ok(AudioFileDecoder { path: path.to_path_buf(), stream_index: stream.index() })
    }

    /// Decodes and resamples source time `[start_ms, end_ms)` to interleaved
    /// stereo f32 PCM at `AUDIO_RATE`. Frames that start before `start_ms`
    /// are dropped (pre-roll); decoding stops once a frame's PTS reaches
    /// `end_ms`.
    pub fn extract(&self, start_ms: i64, end_ms: i64) -> ExportResult<Vec<f32>> {
        let mut ictx =
            open_input(&self.path).map_err(|e| ExportError::CorruptInput(e.to_string()))?;
        let stream = ictx
            .stream(self.stream_index)
            .ok_or_else(|| ExportError::CorruptInput("audio stream vanished between opens".into()))?;
        let time_base = stream.time_base();
        let ctx = CodecContext::from_parameters(stream.parameters())
            .map_err(|e| ExportError::DecoderError(e.to_string()))?;
        let mut decoder = ctx.decoder().audio().map_err(|e| ExportError::DecoderError(e.to_string()))?;

        let start_s = start_ms as f64 / 1000.0;
        let end_s = end_ms as f64 / 1000.0;
        crate::helpers::seek::seek_to_secs(&mut ictx, start_s, "audio::extract");

        let target_fmt = Sample::F32(SampleType::Planar);
        let mut resampler: Option<resampling::Context> = None;
        let mut out = Vec::new();

        'packets: for result in ictx.packets() {
            let (packet_stream, packet) = result.map_err(|e| ExportError::CorruptInput(e.to_string()))?;
            if packet_stream.index() != self.stream_index {
                continue;
            }
            if decoder.send_packet(&packet).is_err() {
                continue;
            }

            let mut raw = AudioFrame::empty();
            while decoder.receive_frame(&mut raw).is_ok() {
                let pts_s = raw.pts().map(|p| p as f64 * f64::from(time_base)).unwrap_or(0.0);
                if pts_s < start_s - 0.05 {
                    continue;
                }
                if pts_s >= end_s {
                    break 'packets;
                }

                let needs_resample = raw.format() != target_fmt
                    || raw.rate() != AUDIO_RATE
                    || raw.channel_layout() != ChannelLayout::STEREO;

                if !needs_resample {
                    out.extend(interleave_stereo(&raw));
                    continue;
                }

                let rs = match &mut resampler {
                    Some(rs) => rs,
                    None => {
                        let src_layout = if raw.channels() >= 2 {
                            raw.channel_layout()
                        } else {
                            ChannelLayout::MONO
                        };
                        let built = resampling::Context::get2(
                            raw.format(),
                            src_layout,
                            raw.rate(),
                            target_fmt,
                            ChannelLayout::STEREO,
                            AUDIO_RATE,
                        )
                        .map_err(|e| ExportError::DecoderError(e.to_string()))?;
                        resampler.insert(built)
                    }
                };

                let mut resampled = AudioFrame::empty();
                if rs.run(&raw, &mut resampled).is_ok() && resampled.samples() > 0 {
                    out.extend(interleave_stereo(&resampled));
                }
            }
        }

        Ok(out)
    }
}

fn interleave_stereo(frame: &AudioFrame) -> Vec<f32> {
    let samples = frame.samples();
    let left = frame.plane::<f32>(0);
    let right = frame.plane::<f32>(1);
    let mut out = Vec::with_capacity(samples * 2);
    for i in 0..samples {
        out.push(left[i]);
        out.push(right.get(i).copied().unwrap_or(left[i]));
    }
    out
}

/// Mixes N decoded stereo-interleaved-as-planar-f32 sources sample-by-sample,
/// applying each input's configured gain and clamping to `[-1.0, 1.0]`.
pub struct AudioMixer {
    gains: Vec<f32>,
}

impl AudioMixer {
    pub fn new(inputs: &[AudioInput]) -> Self {
        AudioMixer { gains: inputs.iter().map(|i| i.gain).collect() }
    }

    /// `channels[i]` holds one input's samples for this block; all must be
    /// the same length. Returns the mixed block.
    pub fn mix(&self, channels: &[Vec<f32>]) -> Vec<f32> {
        if channels.is_empty() {
            return Vec::new();
        }
        let len = channels[0].len();
        let mut out = vec![0.0f32; len];
        for (i, ch) in channels.iter().enumerate() {
            let gain = self.gains.get(i).copied().unwrap_or(1.0);
            for (o, s) in out.iter_mut().zip(ch.iter()) {
                *o += s * gain;
            }
        }
        for s in out.iter_mut() {
            *s = s.clamp(-1.0, 1.0);
        }
        out
    }
}

/// Stereo FLTP ring buffer feeding the AAC encoder in `frame_size` chunks,
/// grounded on `encode.rs::AudioFifo`.
pub struct AudioFifo {
    left: Vec<f32>,
    right: Vec<f32>,
}

impl AudioFifo {
    pub fn new() -> Self {
        AudioFifo { left: Vec::new(), right: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    pub fn push_interleaved(&mut self, mixed: &[f32]) {
        for pair in mixed.chunks(2) {
            self.left.push(pair[0]);
            self.right.push(*pair.get(1).unwrap_or(&pair[0]));
        }
    }

    /// Pops `n` samples per channel into a new FLTP frame, zero-padding the
    /// tail when fewer than `n` samples remain (used on final flush).
    pub fn pop_frame(&mut self, n: usize, sample_idx: i64) -> AudioFrame {
        let take = n.min(self.left.len());
        let mut frame = AudioFrame::new(Sample::F32(SampleType::Planar), n, ChannelLayout::STEREO);
        frame.set_rate(AUDIO_RATE);
        frame.set_pts(Some(sample_idx));

        {
            let left_plane = frame.plane_mut::<f32>(0);
            left_plane[..take].copy_from_slice(&self.left[..take]);
            for s in &mut left_plane[take..] {
                *s = 0.0;
            }
        }
        {
            let right_plane = frame.plane_mut::<f32>(1);
            right_plane[..take].copy_from_slice(&self.right[..take]);
            for s in &mut right_plane[take..] {
                *s = 0.0;
            }
        }

        self.left.drain(..take);
        self.right.drain(..take);
        frame
    }
}

impl Default for AudioFifo {
    fn default() -> Self {
        Self::new()
    }
}

pub struct AudioEncoder {
    encoder: encoder::audio::Audio,
    stream_index: usize,
    time_base: Rational,
    frame_size: usize,
    fifo: AudioFifo,
    out_sample_idx: i64,
}

impl AudioEncoder {
    pub fn open(octx: &mut Output, bitrate: usize) -> ExportResult<Self> {
        let codec = encoder::find(codec::Id::AAC)
            .ok_or_else(|| ExportError::EncoderError("aac encoder not available".into()))?;

        let mut stream = octx
            .add_stream(codec)
            .map_err(|e| ExportError::EncoderError(e.to_string()))?;
        let stream_index = stream.index();

        let ctx = CodecContext::new_with_codec(codec);
        let mut audio_enc = ctx
            .encoder()
            .audio()
            .map_err(|e| ExportError::EncoderError(e.to_string()))?;

        let time_base = Rational::new(1, AUDIO_RATE as i32);
        audio_enc.set_rate(AUDIO_RATE as i32);
        audio_enc.set_channel_layout(ChannelLayout::STEREO);
        audio_enc.set_format(Sample::F32(SampleType::Planar));
        audio_enc.set_bit_rate(bitrate);
        audio_enc.set_time_base(time_base);

        let opened = audio_enc
            .open_as(codec)
            .map_err(|e| ExportError::EncoderError(e.to_string()))?;

        unsafe {
            ffmpeg::ffi::avcodec_parameters_from_context(
                stream.parameters().as_mut_ptr(),
                opened.as_ptr(),
            );
        }
        stream.set_time_base(time_base);

        let frame_size = opened.frame_size().max(1024) as usize;

        Ok(AudioEncoder {
            encoder: opened,
            stream_index,
            time_base,
            frame_size,
            fifo: AudioFifo::new(),
            out_sample_idx: 0,
        })
    }

    pub fn push_mixed(&mut self, mixed: &[f32], octx: &mut Output) -> ExportResult<()> {
        self.fifo.push_interleaved(mixed);
        self.drain(octx, false)
    }

    pub fn flush(&mut self, octx: &mut Output) -> ExportResult<()> {
        self.drain(octx, true)?;
        self.encoder
            .send_eof()
            .map_err(|e| ExportError::EncoderError(e.to_string()))?;
        self.drain_packets(octx)
    }

    fn drain(&mut self, octx: &mut Output, flush: bool) -> ExportResult<()> {
        loop {
            if self.fifo.len() < self.frame_size && !(flush && !self.fifo.is_empty()) {
                break;
            }
            let frame = self.fifo.pop_frame(self.frame_size, self.out_sample_idx);
            self.out_sample_idx += self.frame_size as i64;
            self.encoder
                .send_frame(&frame)
                .map_err(|e| ExportError::EncoderError(e.to_string()))?;
            self.drain_packets(octx)?;
        }
        Ok(())
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixer_scales_and_clamps() {
        let mixer = AudioMixer::new(&[
            AudioInput { url: "a".into(), gain: 1.0 },
            AudioInput { url: "b".into(), gain: 1.0 },
        ]);
        let mixed = mixer.mix(&[vec![0.8, 0.8], vec![0.8, -0.8]]);
        assert_eq!(mixed[0], 1.0); // 1.6 clamped
        assert!((mixed[1] - 0.0).abs() < 1e-6);
    }

    #[test]
    fn fifo_push_and_pop_preserves_samples() {
        let mut fifo = AudioFifo::new();
        fifo.push_interleaved(&[0.1, 0.2, 0.3, 0.4]);
        assert_eq!(fifo.len(), 2);
        let frame = fifo.pop_frame(2, 0);
        assert_eq!(frame.samples(), 2);
        assert_eq!(fifo.len(), 0);
    }

    #[test]
    fn fifo_pop_zero_pads_short_tail() {
        let mut fifo = AudioFifo::new();
        fifo.push_interleaved(&[0.5, 0.5]);
        let frame = fifo.pop_frame(4, 0);
        assert_eq!(frame.samples(), 4);
    }
}
