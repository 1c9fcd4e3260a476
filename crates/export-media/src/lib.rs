// crates/export-media/src/lib.rs
//
// ffmpeg-backed implementation of the export pipeline described by
// `export-core`'s pure types and algorithms. Every module here owns I/O,
// threads, or the ffmpeg FFI boundary; `export-core` owns none of that.

pub mod audio;
pub mod camera;
pub mod decoder;
pub mod demux;
pub mod encode_queue;
pub mod exporter;
pub mod frame_buffer;
pub mod frame_source;
pub mod gif_encoder;
pub mod helpers;
pub mod mux;
pub mod paths;
pub mod reassembler;
pub mod render;
pub mod video_encoder;

pub use demux::{DecoderConfig, DemuxInfo, Demuxer};
pub use exporter::Exporter;
pub use mux::{AudioMuxer, Mp4Muxer, Muxer, VideoMuxer};
