#![forbid(unsafe_code)]

pub mod compose;
pub mod decode;
pub mod encode_ffmpeg;
pub mod error;
pub mod frame;
pub mod mask;
pub mod pipeline;
pub mod render_driver;
pub mod sequence;
pub mod sink;

pub use compose::{Layer, accumulate_layers, composite_layers, composite_single};
pub use error::{SeqComposeError, SeqComposeResult};
pub use frame::{Frame, MaskPlane, Rgb8Frame, ShadowFrame};
pub use mask::{MULTI_LAYER_FILTER, MaskFilterParams, SINGLE_LAYER_FILTER};
pub use pipeline::{MultiJob, SingleJob, VIDEO_FPS, run_multi, run_single};
pub use render_driver::{RenderDevice, ShadowRenderJob, is_blender_on_path, render_shadow_frames};
pub use sink::{FrameSink, InMemorySink, Mp4Sink, PngSequenceSink, SinkConfig, VIDEO_FILE_NAME};
