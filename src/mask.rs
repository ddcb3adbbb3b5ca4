use crate::{
    error::{SeqComposeError, SeqComposeResult},
    frame::{MaskPlane, Rgb8Frame},
};

/// Smoothing applied to masks loaded from files: erode to strip thin or
/// noisy edge coverage, then Gaussian-blur for an anti-aliased blend edge.
///
/// The two blend modes carry independently tuned parameters. They are close
/// but not equal and must stay separate.
#[derive(Clone, Copy, Debug)]
pub struct MaskFilterParams {
    /// Side of the square erosion neighborhood. Must be odd.
    pub erode_size: u32,
    pub erode_iterations: u32,
    /// Side of the square Gaussian kernel. Must be odd.
    pub blur_kernel: u32,
    pub blur_sigma: f32,
}

/// Parameters for the one-foreground blend mode.
pub const SINGLE_LAYER_FILTER: MaskFilterParams = MaskFilterParams {
    erode_size: 5,
    erode_iterations: 5,
    blur_kernel: 7,
    blur_sigma: 3.0,
};

/// Parameters for the multi-foreground blend mode.
pub const MULTI_LAYER_FILTER: MaskFilterParams = MaskFilterParams {
    erode_size: 5,
    erode_iterations: 2,
    blur_kernel: 7,
    blur_sigma: 2.0,
};

/// Raw 8-bit red-channel threshold for the maskless foreground-presence
/// heuristic. Compared against the decoded value before normalization.
pub const RED_FALLBACK_THRESHOLD: u8 = 10;

/// Derive a mask from a foreground frame when no mask file exists: a pixel
/// is foreground iff its raw red value exceeds [`RED_FALLBACK_THRESHOLD`].
/// Fallback masks are binary and are not smoothed.
pub fn mask_from_red_threshold(fg: &Rgb8Frame) -> MaskPlane {
    MaskPlane {
        width: fg.width,
        height: fg.height,
        data: fg
            .data
            .chunks_exact(3)
            .map(|px| if px[0] > RED_FALLBACK_THRESHOLD { 1.0 } else { 0.0 })
            .collect(),
    }
}

/// Erode then Gaussian-blur a file-loaded mask.
pub fn smooth_mask(mask: &MaskPlane, params: &MaskFilterParams) -> SeqComposeResult<MaskPlane> {
    let eroded = erode(mask, params.erode_size, params.erode_iterations)?;
    gaussian_blur(&eroded, params.blur_kernel, params.blur_sigma)
}

/// Grayscale erosion: min-filter over a `size`x`size` neighborhood, repeated
/// `iterations` times. Neighbors outside the image are ignored, so a mask
/// that is positive up to the border does not erode inward from the edge.
pub fn erode(mask: &MaskPlane, size: u32, iterations: u32) -> SeqComposeResult<MaskPlane> {
    if size == 0 || size.is_multiple_of(2) {
        return Err(SeqComposeError::validation(
            "erosion neighborhood size must be odd",
        ));
    }
    if iterations == 0 {
        return Ok(mask.clone());
    }

    let w = mask.width as i64;
    let h = mask.height as i64;
    let radius = i64::from(size / 2);

    let mut cur = mask.data.clone();
    let mut next = vec![0.0f32; cur.len()];
    for _ in 0..iterations {
        for y in 0..h {
            for x in 0..w {
                let mut min = f32::INFINITY;
                for dy in -radius..=radius {
                    let sy = y + dy;
                    if sy < 0 || sy >= h {
                        continue;
                    }
                    for dx in -radius..=radius {
                        let sx = x + dx;
                        if sx < 0 || sx >= w {
                            continue;
                        }
                        let v = cur[(sy * w + sx) as usize];
                        if v < min {
                            min = v;
                        }
                    }
                }
                next[(y * w + x) as usize] = min;
            }
        }
        std::mem::swap(&mut cur, &mut next);
    }

    Ok(MaskPlane {
        width: mask.width,
        height: mask.height,
        data: cur,
    })
}

/// Separable Gaussian blur over a single-channel mask. Sampling clamps to
/// the edge.
///
/// The blur runs in Q16 fixed point over the mask's 8-bit quantization: the
/// kernel is forced to sum to exactly 65536, so a spatially uniform mask
/// comes back bit-identical instead of drifting by a float ulp that the
/// truncating 8-bit rescale downstream would turn into an off-by-one.
pub fn gaussian_blur(
    mask: &MaskPlane,
    kernel: u32,
    sigma: f32,
) -> SeqComposeResult<MaskPlane> {
    if kernel == 0 || kernel.is_multiple_of(2) {
        return Err(SeqComposeError::validation(
            "gaussian kernel size must be odd",
        ));
    }
    let weights = gaussian_kernel_q16(kernel, sigma)?;

    let quantized: Vec<u8> = mask
        .data
        .iter()
        .map(|&v| (v * 255.0).round().clamp(0.0, 255.0) as u8)
        .collect();

    let mut tmp = vec![0u8; quantized.len()];
    let mut out = vec![0u8; quantized.len()];
    horizontal_pass(&quantized, &mut tmp, mask.width, mask.height, &weights);
    vertical_pass(&tmp, &mut out, mask.width, mask.height, &weights);

    Ok(MaskPlane {
        width: mask.width,
        height: mask.height,
        data: out.into_iter().map(|v| f32::from(v) / 255.0).collect(),
    })
}

fn gaussian_kernel_q16(kernel: u32, sigma: f32) -> SeqComposeResult<Vec<u32>> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(SeqComposeError::validation("blur sigma must be > 0"));
    }

    let r = (kernel / 2) as i32;
    let sigma = f64::from(sigma);
    let denom = 2.0 * sigma * sigma;
    let mut weights_f = Vec::<f64>::with_capacity(kernel as usize);
    let mut sum = 0.0f64;
    for i in -r..=r {
        let x = f64::from(i);
        let w = (-x * x / denom).exp();
        weights_f.push(w);
        sum += w;
    }

    let mut weights = Vec::<u32>::with_capacity(weights_f.len());
    let mut acc: i64 = 0;
    for &wf in &weights_f {
        let q = (((wf / sum) * 65536.0).round() as i64).clamp(0, 65536);
        weights.push(q as u32);
        acc += q;
    }
    // Push any quantization residue into the center tap so the kernel sums
    // to exactly one.
    let delta = 65536 - acc;
    if delta != 0 {
        let mid = weights.len() / 2;
        let mid_val = i64::from(weights[mid]);
        weights[mid] = (mid_val + delta).clamp(0, 65536) as u32;
    }

    Ok(weights)
}

fn horizontal_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    for y in 0..height as i32 {
        for x in 0..w {
            let mut acc = 0u64;
            for (ki, &kw) in k.iter().enumerate() {
                let sx = (x + ki as i32 - radius).clamp(0, w - 1);
                acc += u64::from(kw) * u64::from(src[(y * w + sx) as usize]);
            }
            dst[(y * w + x) as usize] = q16_to_u8(acc);
        }
    }
}

fn vertical_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    let h = height as i32;
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0u64;
            for (ki, &kw) in k.iter().enumerate() {
                let sy = (y + ki as i32 - radius).clamp(0, h - 1);
                acc += u64::from(kw) * u64::from(src[(sy * w + x) as usize]);
            }
            dst[(y * w + x) as usize] = q16_to_u8(acc);
        }
    }
}

fn q16_to_u8(acc: u64) -> u8 {
    let v = (acc + 32768) >> 16;
    v.min(255) as u8
}
