// crates/export-media/src/gif_encoder.rs
//
// GIF output (§6's container contract allows MP4 or GIF). Unlike `Mp4Muxer`,
// there's no ffmpeg video stream, no YUV conversion, and no audio track —
// each rendered RGBA8 frame goes straight to the `gif` crate's streaming
// encoder, which owns its own palette quantization per frame.
//
// Kept as its own small type rather than forced into the `Muxer`/`VideoMuxer`
// trait split in mux.rs: that split is shaped around ffmpeg's YUV frame type
// and a real audio stream, neither of which a GIF has.

use std::fs::File;
use std::path::Path;

use export_core::error::{ExportError, ExportResult};
use gif::{Encoder, Frame, Repeat};

pub struct GifMuxer {
    encoder: Encoder<File>,
    width: u16,
    height: u16,
}

impl GifMuxer {
    pub fn new(output_path: &Path, width: u32, height: u32) -> ExportResult<Self> {
        let file = File::create(output_path).map_err(|e| ExportError::MuxerError(e.to_string()))?;
        let width = width as u16;
        let height = height as u16;
        let mut encoder = Encoder::new(file, width, height, &[])
            .map_err(|e| ExportError::MuxerError(e.to_string()))?;
        encoder
            .set_repeat(Repeat::Infinite)
            .map_err(|e| ExportError::MuxerError(e.to_string()))?;
        Ok(GifMuxer { encoder, width, height })
    }

    /// Writes one RGBA8 frame, held on screen for `delay_ms`. The GIF delay
    /// unit is 1/100s, so sub-centisecond precision is lost here.
    pub fn push_frame(&mut self, rgba: &[u8], delay_ms: u32) -> ExportResult<()> {
        let mut buf = rgba.to_vec();
        let mut frame = Frame::from_rgba_speed(self.width, self.height, &mut buf, 10);
        frame.delay = (delay_ms / 10).max(1) as u16;
        self.encoder
            .write_frame(&frame)
            .map_err(|e| ExportError::MuxerError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_a_minimal_header_and_single_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.gif");
        let mut muxer = GifMuxer::new(&path, 4, 4).unwrap();
        let frame = vec![255u8; 4 * 4 * 4];
        muxer.push_frame(&frame, 33).unwrap();
        drop(muxer);

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[0..6], b"GIF89a");
    }
}
