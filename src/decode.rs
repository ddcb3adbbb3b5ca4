use std::path::Path;

use anyhow::Context as _;

use crate::{
    error::SeqComposeResult,
    frame::{MaskPlane, Rgb8Frame, ShadowFrame},
};

/// Decode a background or foreground frame to 8-bit RGB.
pub fn load_rgb8(path: &Path) -> SeqComposeResult<Rgb8Frame> {
    let img = image::open(path)
        .with_context(|| format!("decode image '{}'", path.display()))?;
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();
    Ok(Rgb8Frame {
        width,
        height,
        data: rgb.into_raw(),
    })
}

/// Decode a mask file to a normalized single-channel plane. Color mask
/// files are collapsed to luma first.
pub fn load_mask(path: &Path) -> SeqComposeResult<MaskPlane> {
    let img = image::open(path)
        .with_context(|| format!("decode mask '{}'", path.display()))?;
    let luma = img.to_luma8();
    let (width, height) = luma.dimensions();
    Ok(MaskPlane {
        width,
        height,
        data: luma.into_raw().iter().map(|&v| f32::from(v) / 255.0).collect(),
    })
}

/// Decode a shadow pass to normalized color and alpha planes. The alpha
/// channel is the shadow's coverage mask.
pub fn load_shadow(path: &Path) -> SeqComposeResult<ShadowFrame> {
    let img = image::open(path)
        .with_context(|| format!("decode shadow '{}'", path.display()))?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let raw = rgba.into_raw();
    let n = width as usize * height as usize;
    let mut rgb = Vec::with_capacity(n * 3);
    let mut alpha = Vec::with_capacity(n);
    for px in raw.chunks_exact(4) {
        rgb.push(f32::from(px[0]) / 255.0);
        rgb.push(f32::from(px[1]) / 255.0);
        rgb.push(f32::from(px[2]) / 255.0);
        alpha.push(f32::from(px[3]) / 255.0);
    }

    Ok(ShadowFrame {
        width,
        height,
        rgb,
        alpha,
    })
}
