use crate::error::{SeqComposeError, SeqComposeResult};

/// Decoded 8-bit frame, interleaved RGB, row-major, tightly packed.
#[derive(Clone, Debug, PartialEq)]
pub struct Rgb8Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Rgb8Frame {
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> SeqComposeResult<Self> {
        check_plane_len(width, height, 3, data.len())?;
        Ok(Self {
            width,
            height,
            data,
        })
    }
}

/// Normalized frame, interleaved RGB `f32` in [0,1], row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
}

impl Frame {
    pub fn zeros(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; plane_len(width, height, 3)],
        }
    }

    pub fn solid(width: u32, height: u32, rgb: [f32; 3]) -> Self {
        let mut data = Vec::with_capacity(plane_len(width, height, 3));
        for _ in 0..(width as usize * height as usize) {
            data.extend_from_slice(&rgb);
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn from_rgb8(src: &Rgb8Frame) -> Self {
        Self {
            width: src.width,
            height: src.height,
            data: src.data.iter().map(|&v| f32::from(v) / 255.0).collect(),
        }
    }

    /// Rescale to 8-bit output range: multiply by 255 and truncate, with a
    /// defensive clamp against floating-point overshoot.
    pub fn to_rgb8(&self) -> Rgb8Frame {
        Rgb8Frame {
            width: self.width,
            height: self.height,
            data: self
                .data
                .iter()
                .map(|&v| (v * 255.0).clamp(0.0, 255.0) as u8)
                .collect(),
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> [f32; 3] {
        let i = ((y * self.width + x) as usize) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }
}

/// Single-channel per-pixel opacity plane, `f32` in [0,1], aligned 1:1 with a
/// [`Frame`]'s spatial dimensions.
#[derive(Clone, Debug, PartialEq)]
pub struct MaskPlane {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
}

impl MaskPlane {
    pub fn zeros(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; plane_len(width, height, 1)],
        }
    }

    pub fn solid(width: u32, height: u32, value: f32) -> Self {
        Self {
            width,
            height,
            data: vec![value; plane_len(width, height, 1)],
        }
    }

    pub fn value(&self, x: u32, y: u32) -> f32 {
        self.data[(y * self.width + x) as usize]
    }
}

/// Shadow-only render over a transparent background: an RGB color plane plus
/// an alpha plane controlling how much the background is darkened.
#[derive(Clone, Debug, PartialEq)]
pub struct ShadowFrame {
    pub width: u32,
    pub height: u32,
    /// Interleaved RGB, normalized.
    pub rgb: Vec<f32>,
    /// Per-pixel shadow coverage, normalized.
    pub alpha: Vec<f32>,
}

fn plane_len(width: u32, height: u32, channels: usize) -> usize {
    width as usize * height as usize * channels
}

fn check_plane_len(
    width: u32,
    height: u32,
    channels: usize,
    got: usize,
) -> SeqComposeResult<()> {
    let expected = plane_len(width, height, channels);
    if got != expected {
        return Err(SeqComposeError::validation(format!(
            "buffer length {got} does not match {width}x{height}x{channels}"
        )));
    }
    Ok(())
}

/// Precondition check at the compositor entry: every plane consumed in one
/// time step must share the background's spatial dimensions.
pub fn ensure_same_dims(
    what: &str,
    width: u32,
    height: u32,
    ref_width: u32,
    ref_height: u32,
) -> SeqComposeResult<()> {
    if width != ref_width || height != ref_height {
        return Err(SeqComposeError::validation(format!(
            "dimension mismatch: {what} is {width}x{height}, expected {ref_width}x{ref_height}"
        )));
    }
    Ok(())
}
