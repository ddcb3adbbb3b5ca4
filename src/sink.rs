use std::path::PathBuf;

use anyhow::Context as _;

use crate::{
    encode_ffmpeg::{EncodeConfig, FfmpegEncoder},
    error::{SeqComposeError, SeqComposeResult},
    frame::Rgb8Frame,
};

/// Name of the video file written into every output directory.
pub const VIDEO_FILE_NAME: &str = "video_composed.mp4";

/// Configuration handed to a [`FrameSink`] once the output dimensions are
/// known (the first composited frame fixes them).
#[derive(Clone, Debug)]
pub struct SinkConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

/// Sink contract for consuming composited frames.
///
/// Ordering contract: `push_frame` is called with strictly increasing
/// 0-based step indices, after exactly one `begin`.
pub trait FrameSink {
    /// Called once before any frames are pushed.
    fn begin(&mut self, cfg: &SinkConfig) -> SeqComposeResult<()>;
    /// Push one frame in step order.
    fn push_frame(&mut self, index: usize, frame: &Rgb8Frame) -> SeqComposeResult<()>;
    /// Called once after the last frame. Also called when the run produced
    /// no frames at all, so implementations must tolerate a missing `begin`.
    fn end(&mut self) -> SeqComposeResult<()>;
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    cfg: Option<SinkConfig>,
    frames: Vec<Rgb8Frame>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(&self) -> Option<&SinkConfig> {
        self.cfg.as_ref()
    }

    pub fn frames(&self) -> &[Rgb8Frame] {
        &self.frames
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, cfg: &SinkConfig) -> SeqComposeResult<()> {
        self.cfg = Some(cfg.clone());
        self.frames.clear();
        Ok(())
    }

    fn push_frame(&mut self, _index: usize, frame: &Rgb8Frame) -> SeqComposeResult<()> {
        self.frames.push(frame.clone());
        Ok(())
    }

    fn end(&mut self) -> SeqComposeResult<()> {
        Ok(())
    }
}

/// Writes each frame as a zero-padded `NNNN.png` still into a directory.
#[derive(Debug)]
pub struct PngSequenceSink {
    out_dir: PathBuf,
}

impl PngSequenceSink {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }
}

impl FrameSink for PngSequenceSink {
    fn begin(&mut self, _cfg: &SinkConfig) -> SeqComposeResult<()> {
        std::fs::create_dir_all(&self.out_dir).with_context(|| {
            format!("create output directory '{}'", self.out_dir.display())
        })?;
        Ok(())
    }

    fn push_frame(&mut self, index: usize, frame: &Rgb8Frame) -> SeqComposeResult<()> {
        let path = self.out_dir.join(format!("{index:04}.png"));
        image::save_buffer_with_format(
            &path,
            &frame.data,
            frame.width,
            frame.height,
            image::ColorType::Rgb8,
            image::ImageFormat::Png,
        )
        .with_context(|| format!("write png '{}'", path.display()))?;
        Ok(())
    }

    fn end(&mut self) -> SeqComposeResult<()> {
        Ok(())
    }
}

/// Feeds frames to an [`FfmpegEncoder`] writing `video_composed.mp4` in the
/// output directory.
pub struct Mp4Sink {
    out_path: PathBuf,
    overwrite: bool,
    encoder: Option<FfmpegEncoder>,
}

impl Mp4Sink {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_path: out_dir.into().join(VIDEO_FILE_NAME),
            overwrite: true,
            encoder: None,
        }
    }
}

impl FrameSink for Mp4Sink {
    fn begin(&mut self, cfg: &SinkConfig) -> SeqComposeResult<()> {
        let encoder = FfmpegEncoder::new(EncodeConfig {
            width: cfg.width,
            height: cfg.height,
            fps: cfg.fps,
            out_path: self.out_path.clone(),
            overwrite: self.overwrite,
        })?;
        self.encoder = Some(encoder);
        Ok(())
    }

    fn push_frame(&mut self, _index: usize, frame: &Rgb8Frame) -> SeqComposeResult<()> {
        let Some(encoder) = self.encoder.as_mut() else {
            return Err(SeqComposeError::encode("mp4 sink was not started"));
        };
        encoder.encode_frame(frame)
    }

    fn end(&mut self) -> SeqComposeResult<()> {
        match self.encoder.take() {
            Some(encoder) => encoder.finish(),
            // No frames were ever pushed; nothing to finalize.
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_2x2() -> Rgb8Frame {
        Rgb8Frame {
            width: 2,
            height: 2,
            data: vec![255; 12],
        }
    }

    #[test]
    fn in_memory_sink_collects_frames_in_order() {
        let mut sink = InMemorySink::new();
        sink.begin(&SinkConfig {
            width: 2,
            height: 2,
            fps: 30,
        })
        .unwrap();
        sink.push_frame(0, &frame_2x2()).unwrap();
        sink.push_frame(1, &frame_2x2()).unwrap();
        sink.end().unwrap();

        assert_eq!(sink.frames().len(), 2);
        assert_eq!(sink.config().unwrap().fps, 30);
    }

    #[test]
    fn png_sink_writes_zero_padded_stills() {
        let dir = PathBuf::from("target").join("sink_tests").join("png");
        let _ = std::fs::remove_dir_all(&dir);

        let mut sink = PngSequenceSink::new(&dir);
        sink.begin(&SinkConfig {
            width: 2,
            height: 2,
            fps: 30,
        })
        .unwrap();
        sink.push_frame(0, &frame_2x2()).unwrap();
        sink.push_frame(11, &frame_2x2()).unwrap();
        sink.end().unwrap();

        assert!(dir.join("0000.png").exists());
        assert!(dir.join("0011.png").exists());
    }

    #[test]
    fn mp4_sink_end_without_frames_is_ok() {
        let mut sink = Mp4Sink::new("target/sink_tests/mp4_empty");
        sink.end().unwrap();
    }

    #[test]
    fn mp4_sink_push_before_begin_fails() {
        let mut sink = Mp4Sink::new("target/sink_tests/mp4_unstarted");
        assert!(sink.push_frame(0, &frame_2x2()).is_err());
    }
}
