use std::path::PathBuf;

use crate::{
    compose::{Layer, composite_layers, composite_single},
    decode,
    error::{SeqComposeError, SeqComposeResult},
    frame::{Frame, ShadowFrame},
    mask::{MULTI_LAYER_FILTER, SINGLE_LAYER_FILTER, mask_from_red_threshold, smooth_mask},
    sequence::{StepInputs, align_multi, align_single},
    sink::{FrameSink, SinkConfig},
};

/// Fixed output frame rate of the composed video.
pub const VIDEO_FPS: u32 = 30;

/// One foreground sequence over one background sequence, with optional mask
/// and shadow sequences.
#[derive(Clone, Debug)]
pub struct SingleJob {
    pub fg_dir: PathBuf,
    pub bg_dir: PathBuf,
    pub mask_dir: Option<PathBuf>,
    pub shadow_dir: Option<PathBuf>,
}

/// Several independent foreground sequences over one background sequence.
/// Every foreground needs its own mask sequence in this mode.
#[derive(Clone, Debug)]
pub struct MultiJob {
    pub fg_dirs: Vec<PathBuf>,
    pub mask_dirs: Vec<PathBuf>,
    pub bg_dir: PathBuf,
    pub shadow_dir: Option<PathBuf>,
}

/// Run the single-foreground compose over all aligned time steps, streaming
/// each composited frame to the sinks. Returns the number of frames
/// produced.
#[tracing::instrument(skip(sinks))]
pub fn run_single(
    job: &SingleJob,
    sinks: &mut [&mut dyn FrameSink],
) -> SeqComposeResult<usize> {
    let steps = align_single(
        &job.fg_dir,
        &job.bg_dir,
        job.mask_dir.as_deref(),
        job.shadow_dir.as_deref(),
    )?;
    tracing::info!(steps = steps.len(), "aligned single-foreground sequences");

    run_steps(&steps, BlendMode::Single, sinks)
}

/// Run the multi-foreground compose over all aligned time steps. Returns the
/// number of frames produced.
#[tracing::instrument(skip(sinks))]
pub fn run_multi(job: &MultiJob, sinks: &mut [&mut dyn FrameSink]) -> SeqComposeResult<usize> {
    let steps = align_multi(
        &job.fg_dirs,
        &job.mask_dirs,
        &job.bg_dir,
        job.shadow_dir.as_deref(),
    )?;
    tracing::info!(
        steps = steps.len(),
        layers = job.fg_dirs.len(),
        "aligned multi-foreground sequences"
    );

    run_steps(&steps, BlendMode::Multi, sinks)
}

#[derive(Clone, Copy, Debug)]
enum BlendMode {
    Single,
    Multi,
}

/// Each step is resolved fully (decode, smooth, blend, rescale) before the
/// next begins; no state is carried across steps.
fn run_steps(
    steps: &[StepInputs],
    mode: BlendMode,
    sinks: &mut [&mut dyn FrameSink],
) -> SeqComposeResult<usize> {
    for (index, step) in steps.iter().enumerate() {
        let composed = compose_step(step, mode)?;
        let out = composed.to_rgb8();

        if index == 0 {
            let cfg = SinkConfig {
                width: out.width,
                height: out.height,
                fps: VIDEO_FPS,
            };
            for sink in sinks.iter_mut() {
                sink.begin(&cfg)?;
            }
        }
        for sink in sinks.iter_mut() {
            sink.push_frame(index, &out)?;
        }
        tracing::debug!(step = index, "composited frame");
    }

    for sink in sinks.iter_mut() {
        sink.end()?;
    }
    Ok(steps.len())
}

fn compose_step(step: &StepInputs, mode: BlendMode) -> SeqComposeResult<Frame> {
    let bg8 = decode::load_rgb8(&step.background)?;
    let bg = Frame::from_rgb8(&bg8);

    let shadow: Option<ShadowFrame> = step
        .shadow
        .as_deref()
        .map(decode::load_shadow)
        .transpose()?;

    match mode {
        BlendMode::Single => {
            let layer = step.layers.first().ok_or_else(|| {
                SeqComposeError::validation("single-foreground step has no layer (bug)")
            })?;
            let fg8 = decode::load_rgb8(&layer.frame)?;
            let fg = Frame::from_rgb8(&fg8);
            let mask = match layer.mask.as_deref() {
                Some(path) => smooth_mask(&decode::load_mask(path)?, &SINGLE_LAYER_FILTER)?,
                None => mask_from_red_threshold(&fg8),
            };
            composite_single(&bg, &fg, &mask, shadow.as_ref())
        }
        BlendMode::Multi => {
            let mut layers = Vec::with_capacity(step.layers.len());
            for layer in &step.layers {
                let mask_path = layer.mask.as_deref().ok_or_else(|| {
                    SeqComposeError::validation("multi-foreground step lost its mask path (bug)")
                })?;
                let frame = Frame::from_rgb8(&decode::load_rgb8(&layer.frame)?);
                let mask = smooth_mask(&decode::load_mask(mask_path)?, &MULTI_LAYER_FILTER)?;
                layers.push(Layer { frame, mask });
            }
            composite_layers(&bg, &layers, shadow.as_ref())
        }
    }
}
