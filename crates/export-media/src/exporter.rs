// crates/export-media/src/exporter.rs
//
// Top-level state machine (§4.12): creates every component on `start`,
// drives the pipeline to completion, tears components down in reverse order
// on `finish`/`abort`. Cancellation is a per-job `Arc<AtomicBool>` checked at
// every suspension point, grounded on `worker.rs`'s
// `encode_cancels: Arc<Mutex<HashMap<Uuid, Arc<AtomicBool>>>>` per-job
// cancellation keyed by job id, and the sibling app's RAII
// `ExportActiveGuard` (state restored on drop, idempotent even if `finish`
// was already called) used here as the teardown discipline for `abort`.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use export_core::error::{ExportError, ExportResult};
use export_core::model::{CameraPipConfig, Container, ExportPlan, FrameIndex};
use export_core::progress::{ExportEvent, ExportPhase, RenderMode};
use export_core::trim::TrimMapper;
use ffmpeg_the_third as ffmpeg;

use crate::audio::{AudioFileDecoder, AudioMixer};
use crate::camera::CameraPipCompositor;
use crate::decoder::{RawFrame, VideoDecoder};
use crate::demux::Demuxer;
use crate::encode_queue::EncodeQueue;
use crate::frame_buffer::FrameBuffer;
use crate::frame_source::{FrameSource, FrameSourceKind, PrefetchSource};
use crate::gif_encoder::GifMuxer;
use crate::mux::{AudioMuxer, Mp4Muxer, Muxer, VideoMuxer};
use crate::render::RenderCoordinator;
use crate::video_encoder::VideoEncoderConfig;

/// RAII guard ensuring the export is marked inactive exactly once, even on
/// early return or panic unwind, mirroring the sibling app's
/// `ExportActiveGuard`.
struct ExportActiveGuard {
    active: Arc<AtomicBool>,
}

impl Drop for ExportActiveGuard {
    fn drop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

/// Where encoded frames (and, for MP4, audio) ultimately go. A GIF has no
/// YUV conversion step and no audio track, so this dispatches to a
/// completely different encode path rather than forcing both containers
/// through the ffmpeg-shaped `Muxer`/`VideoMuxer`/`AudioMuxer` traits.
enum OutputSink {
    Mp4(Mp4Muxer),
    Gif(GifMuxer),
}

impl OutputSink {
    fn setup(&mut self) -> ExportResult<()> {
        match self {
            OutputSink::Mp4(m) => m.setup(),
            OutputSink::Gif(_) => Ok(()),
        }
    }

    fn send_video(&mut self, rgba: &[u8], width: u32, height: u32, delay_ms: u32) -> ExportResult<()> {
        match self {
            OutputSink::Mp4(m) => {
                let yuv = rgba_to_yuv420p(rgba, width, height)?;
                m.send_video_frame(&yuv)
            }
            OutputSink::Gif(g) => g.push_frame(rgba, delay_ms),
        }
    }

    fn send_audio(&mut self, mixed: &[f32]) -> ExportResult<()> {
        match self {
            OutputSink::Mp4(m) => m.send_audio_mix(mixed),
            OutputSink::Gif(_) => Ok(()),
        }
    }

    fn finish(&mut self) -> ExportResult<()> {
        match self {
            OutputSink::Mp4(m) => m.finish(),
            OutputSink::Gif(_) => Ok(()),
        }
    }
}

pub struct Exporter {
    plan: ExportPlan,
    job_id: uuid::Uuid,
    cancel: Arc<AtomicBool>,
    active: Arc<AtomicBool>,
}

impl Exporter {
    pub fn new(plan: ExportPlan) -> Self {
        Exporter {
            plan,
            job_id: uuid::Uuid::new_v4(),
            cancel: Arc::new(AtomicBool::new(false)),
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn job_id(&self) -> uuid::Uuid {
        self.job_id
    }

    /// A clonable handle callers can use to request cancellation from
    /// another thread while `run` is in progress.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    fn check_cancelled(&self) -> ExportResult<()> {
        if self.cancel.load(Ordering::SeqCst) {
            Err(ExportError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Runs the export to completion, invoking `on_event` once per state
    /// transition and frame emission. Returns `Ok(())` on success; on
    /// `Err`, the partial output file has already been removed.
    pub fn run(&mut self, mut on_event: impl FnMut(ExportEvent)) -> ExportResult<()> {
        if self.active.swap(true, Ordering::SeqCst) {
            return Err(ExportError::WorkerInitFailed("export already in progress".into()));
        }
        let _guard = ExportActiveGuard { active: Arc::clone(&self.active) };

        tracing::info!(job_id = %self.job_id, "export starting");
        on_event(ExportEvent::tick(ExportPhase::Initializing, 0, 0, RenderMode::Parallel));

        let result = self.run_inner(&mut on_event);

        match &result {
            Ok(()) => on_event(ExportEvent::tick(ExportPhase::Done, 0, 0, RenderMode::Parallel)),
            Err(e) => {
                let _ = std::fs::remove_file(&self.plan.output_path);
                on_event(ExportEvent::failed(e.kind(), e.to_string(), RenderMode::Parallel));
            }
        }

        result
    }

    fn run_inner(&mut self, on_event: &mut impl FnMut(ExportEvent)) -> ExportResult<()> {
        self.check_cancelled()?;

        let video_path = PathBuf::from(&self.plan.video_url);
        let demuxer = Arc::new(Demuxer::initialize(&video_path)?);
        let info = demuxer.info().clone();

        let trims = TrimMapper::new(self.plan.trim_regions.clone());
        let fps = self.plan.target.frame_rate as f64;
        let total_source_ms = (info.duration_s * 1000.0) as i64;
        let total_effective_ms = trims.effective_duration_ms(total_source_ms);
        let total_frames = ((total_effective_ms as f64 / 1000.0) * fps).max(0.0).ceil() as u64;
        let frame_delay_ms = (1000.0 / fps).round().max(1.0) as u32;

        let worker_count = if self.plan.parallel_rendering {
            std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        } else {
            1
        };
        let render_mode = if worker_count > 1 { RenderMode::Parallel } else { RenderMode::Fallback };

        let mut coordinator =
            RenderCoordinator::new(worker_count, Arc::new(self.plan.render_plan.clone()), fps);

        let mut camera_compositor = match &self.plan.camera_pip {
            Some(cfg) if cfg.enabled => Some(CameraPipCompositor::initialize(Path::new(&cfg.camera_url))),
            _ => None,
        };
        let camera_cfg: Option<&CameraPipConfig> = self.plan.camera_pip.as_ref();

        let video_cfg = VideoEncoderConfig {
            width: self.plan.target.width,
            height: self.plan.target.height,
            frame_rate: self.plan.target.frame_rate,
            crf: "18",
            preset: "fast",
        };

        let audio_bitrate = if self.plan.audio_inputs.is_empty() {
            None
        } else {
            Some(self.plan.target.audio_bitrate as usize)
        };

        let mut sink = match self.plan.target.container {
            Container::Mp4 => {
                let muxer =
                    Mp4Muxer::new(&PathBuf::from(&self.plan.output_path), video_cfg, audio_bitrate)?;
                OutputSink::Mp4(muxer)
            }
            Container::Gif => {
                let muxer = GifMuxer::new(
                    &PathBuf::from(&self.plan.output_path),
                    self.plan.target.width,
                    self.plan.target.height,
                )?;
                OutputSink::Gif(muxer)
            }
        };
        sink.setup()?;

        let encode_queue = EncodeQueue::new();

        on_event(ExportEvent::tick(ExportPhase::Decoding, 0, total_frames, render_mode));

        match FrameSource::select(&info.decoder_config) {
            FrameSourceKind::DecodeAhead => {
                self.run_decode_ahead(
                    Arc::clone(&demuxer),
                    &info,
                    &trims,
                    total_frames,
                    &mut coordinator,
                    &mut camera_compositor,
                    camera_cfg,
                    fps,
                    &encode_queue,
                    &mut sink,
                    frame_delay_ms,
                    render_mode,
                    on_event,
                )?;
            }
            FrameSourceKind::Prefetch => {
                let segments = trims.retained_ranges(total_source_ms);
                let mut source = PrefetchSource::new(
                    Arc::clone(&demuxer),
                    info.decoder_config.clone(),
                    segments,
                    fps,
                    total_frames,
                );
                while let Some(sourced) = source.next()? {
                    self.handle_frame(
                        sourced.index,
                        sourced.frame,
                        &mut coordinator,
                        &mut camera_compositor,
                        camera_cfg,
                        fps,
                        &encode_queue,
                        &mut sink,
                        total_frames,
                        frame_delay_ms,
                        render_mode,
                        on_event,
                    )?;
                }
            }
        }

        coordinator.drain_available();
        while let Some((index, rgba)) = coordinator.pop_sequential() {
            encode_queue.push(index, rgba);
        }
        encode_queue.close();
        self.drain_encode_queue(&encode_queue, &mut sink, total_frames, frame_delay_ms, render_mode, on_event)?;

        if !self.plan.audio_inputs.is_empty() {
            let mixed = self.decode_and_mix_audio(&trims, total_source_ms)?;
            sink.send_audio(&mixed)?;
        }

        on_event(ExportEvent::tick(ExportPhase::Finalizing, total_frames, total_frames, render_mode));
        coordinator.shutdown();
        sink.finish()?;

        Ok(())
    }

    /// Forward-only strategy (§4.5): a dedicated thread decodes chunks into
    /// a bounded `FrameBuffer` while this thread consumes frames in order,
    /// composites camera PiP, renders, and encodes. Putting decode on its
    /// own thread is what actually makes the buffer's capacity bound matter
    /// — a single-threaded decode-then-immediately-consume loop would never
    /// let the buffer's producer run ahead of its consumer.
    #[allow(clippy::too_many_arguments)]
    fn run_decode_ahead(
        &self,
        demuxer: Arc<Demuxer>,
        info: &crate::demux::DemuxInfo,
        trims: &TrimMapper,
        total_frames: u64,
        coordinator: &mut RenderCoordinator,
        camera: &mut Option<CameraPipCompositor>,
        camera_cfg: Option<&CameraPipConfig>,
        fps: f64,
        encode_queue: &EncodeQueue,
        sink: &mut OutputSink,
        frame_delay_ms: u32,
        render_mode: RenderMode,
        on_event: &mut impl FnMut(ExportEvent),
    ) -> ExportResult<()> {
        let frame_buffer = Arc::new(FrameBuffer::new());
        let decode_buffer = Arc::clone(&frame_buffer);
        let decode_demuxer = Arc::clone(&demuxer);
        let decode_trims = trims.clone();
        let decode_cancel = Arc::clone(&self.cancel);
        let decode_config = info.decoder_config.clone();
        let decode_duration_s = info.duration_s;

        let decode_handle = std::thread::spawn(move || -> ExportResult<()> {
            let mut decoder = VideoDecoder::new(&decode_config)?;
            let chunks = decode_demuxer.chunks_from(0.0, decode_duration_s)?;
            let mut produced = 0u64;
            for chunk in &chunks {
                if decode_cancel.load(Ordering::SeqCst) {
                    break;
                }
                let chunk_ms = chunk.timestamp.as_ms();
                if decode_trims.trims().iter().any(|t| t.contains_ms(chunk_ms)) {
                    continue;
                }
                for frame in decoder.submit(chunk)? {
                    decode_buffer.push(FrameIndex(produced), frame);
                    produced += 1;
                }
            }
            for frame in decoder.flush()? {
                decode_buffer.push(FrameIndex(produced), frame);
                produced += 1;
            }
            decode_buffer.close();
            Ok(())
        });

        for i in 0..total_frames {
            self.check_cancelled()?;
            let Some(frame) = frame_buffer.take(FrameIndex(i)) else { break };
            self.handle_frame(
                FrameIndex(i),
                frame,
                coordinator,
                camera,
                camera_cfg,
                fps,
                encode_queue,
                sink,
                total_frames,
                frame_delay_ms,
                render_mode,
                on_event,
            )?;
        }

        match decode_handle.join() {
            Ok(result) => result,
            Err(_) => Err(ExportError::WorkerInitFailed("decode thread panicked".into())),
        }
    }

    /// Composites camera PiP onto one source frame, submits it to the
    /// render coordinator, and drains whatever's ready downstream.
    #[allow(clippy::too_many_arguments)]
    fn handle_frame(
        &self,
        index: FrameIndex,
        mut frame: RawFrame,
        coordinator: &mut RenderCoordinator,
        camera: &mut Option<CameraPipCompositor>,
        camera_cfg: Option<&CameraPipConfig>,
        fps: f64,
        encode_queue: &EncodeQueue,
        sink: &mut OutputSink,
        total_frames: u64,
        frame_delay_ms: u32,
        render_mode: RenderMode,
        on_event: &mut impl FnMut(ExportEvent),
    ) -> ExportResult<()> {
        self.check_cancelled()?;
        if let (Some(compositor), Some(cfg)) = (camera.as_mut(), camera_cfg) {
            let t_eff_ms = ((index.0 as f64 / fps) * 1000.0) as i64;
            compositor.render(&mut frame.rgba, frame.width, frame.height, t_eff_ms, cfg)?;
        }

        coordinator.submit(index, frame);
        coordinator.wait_for_next(Duration::from_secs(5));

        while let Some((idx, rgba)) = coordinator.pop_sequential() {
            encode_queue.push(idx, rgba);
        }
        self.drain_encode_queue(encode_queue, sink, total_frames, frame_delay_ms, render_mode, on_event)
    }

    fn drain_encode_queue(
        &self,
        queue: &EncodeQueue,
        sink: &mut OutputSink,
        total_frames: u64,
        frame_delay_ms: u32,
        mode: RenderMode,
        on_event: &mut impl FnMut(ExportEvent),
    ) -> ExportResult<()> {
        loop {
            let next = if queue.is_closed() { queue.pop() } else { queue.try_pop() };
            let Some((index, rgba)) = next else { break };
            sink.send_video(&rgba, self.plan.target.width, self.plan.target.height, frame_delay_ms)?;
            on_event(ExportEvent::tick(ExportPhase::Encoding, index.0 + 1, total_frames, mode));
        }
        Ok(())
    }

    /// Decodes every `AudioInput` over the effective (post-trim) timeline
    /// and mixes them with their configured gains (§4.10). Each input is
    /// reopened and decoded independently since `AudioFileDecoder` carries
    /// no shared state between inputs.
    fn decode_and_mix_audio(&self, trims: &TrimMapper, source_duration_ms: i64) -> ExportResult<Vec<f32>> {
        let ranges = trims.retained_ranges(source_duration_ms);
        let mixer = AudioMixer::new(&self.plan.audio_inputs);

        let mut per_input: Vec<Vec<f32>> = Vec::with_capacity(self.plan.audio_inputs.len());
        for input in &self.plan.audio_inputs {
            let decoder = AudioFileDecoder::load(Path::new(&input.url))?;
            let mut samples = Vec::new();
            for &(start_ms, end_ms) in &ranges {
                samples.extend(decoder.extract(start_ms, end_ms)?);
            }
            per_input.push(samples);
        }

        let max_len = per_input.iter().map(Vec::len).max().unwrap_or(0);
        for buf in &mut per_input {
            buf.resize(max_len, 0.0);
        }

        Ok(mixer.mix(&per_input))
    }

    /// Forces the export into the `Cancelled` state; idempotent, callable
    /// from any phase.
    pub fn abort(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }
}

fn rgba_to_yuv420p(
    rgba: &[u8],
    width: u32,
    height: u32,
) -> ExportResult<ffmpeg::util::frame::video::Video> {
    let mut rgba_frame = ffmpeg::util::frame::video::Video::new(ffmpeg::format::Pixel::RGBA, width, height);
    {
        let stride = rgba_frame.stride(0);
        let row_bytes = width as usize * 4;
        let data = rgba_frame.data_mut(0);
        for row in 0..height as usize {
            let src = &rgba[row * row_bytes..(row + 1) * row_bytes];
            data[row * stride..row * stride + row_bytes].copy_from_slice(src);
        }
    }

    let mut scaler = ffmpeg::software::scaling::Context::get(
        ffmpeg::format::Pixel::RGBA,
        width,
        height,
        ffmpeg::format::Pixel::YUV420P,
        width,
        height,
        ffmpeg::software::scaling::Flags::BILINEAR,
    )
    .map_err(|e| ExportError::EncoderError(e.to_string()))?;

    let mut yuv_frame = ffmpeg::util::frame::video::Video::empty();
    scaler
        .run(&rgba_frame, &mut yuv_frame)
        .map_err(|e| ExportError::EncoderError(e.to_string()))?;

    Ok(yuv_frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use export_core::model::{ExportTarget, RenderPlan};

    fn minimal_plan() -> ExportPlan {
        ExportPlan {
            video_url: "/tmp/definitely-missing-export-test.mp4".into(),
            audio_inputs: vec![],
            output_path: "/tmp/export-test-out.mp4".into(),
            target: ExportTarget {
                width: 1280,
                height: 720,
                frame_rate: 30,
                video_codec: "h264".into(),
                video_bitrate: 0,
                audio_codec: "aac".into(),
                audio_bitrate: 128_000,
                container: Container::Mp4,
            },
            render_plan: RenderPlan {
                output_width: 1280,
                output_height: 720,
                wallpaper_rgb: [0, 0, 0],
                zoom_regions: vec![],
                shadow_intensity: 0.0,
                blur: false,
                motion_blur: false,
                border_radius_px: 0,
                padding_px: 0,
                crop: None,
                annotations: vec![],
                source_width: 1280,
                source_height: 720,
                camera_pip: None,
            },
            trim_regions: vec![],
            camera_pip: None,
            parallel_rendering: true,
        }
    }

    #[test]
    fn missing_input_surfaces_input_not_found_and_is_idempotent_on_abort() {
        let mut exporter = Exporter::new(minimal_plan());
        exporter.abort();
        exporter.abort(); // idempotent
        let mut events = Vec::new();
        let result = exporter.run(|e| events.push(e));
        assert!(result.is_err());
        assert!(events.iter().any(|e| e.phase == ExportPhase::Failed));
    }

    #[test]
    fn double_run_rejects_concurrent_invocation() {
        // Exercises the `active` flag guard directly, since a real `run`
        // blocks until completion in this synchronous orchestrator.
        let exporter = Exporter::new(minimal_plan());
        exporter.active.store(true, Ordering::SeqCst);
        let mut exporter2 = exporter;
        let result = exporter2.run(|_| {});
        assert!(matches!(result, Err(ExportError::WorkerInitFailed(_))));
    }
}
