use crate::{
    error::SeqComposeResult,
    frame::{Frame, MaskPlane, ShadowFrame, ensure_same_dims},
};

/// One foreground layer for the multi-layer blend: a color frame plus its
/// opacity mask.
#[derive(Clone, Debug)]
pub struct Layer {
    pub frame: Frame,
    pub mask: MaskPlane,
}

/// Composite a shadow pass under everything else: the background is darkened
/// toward the shadow color wherever the shadow's alpha covers it,
/// `B' = B*(1-Sa) + Sc*Sa`.
pub fn shadowed_background(bg: &Frame, shadow: &ShadowFrame) -> SeqComposeResult<Frame> {
    ensure_same_dims("shadow", shadow.width, shadow.height, bg.width, bg.height)?;

    let mut out = Frame::zeros(bg.width, bg.height);
    for (i, &sa) in shadow.alpha.iter().enumerate() {
        for c in 0..3 {
            let j = i * 3 + c;
            out.data[j] = bg.data[j] * (1.0 - sa) + shadow.rgb[j] * sa;
        }
    }
    Ok(out)
}

/// Standard alpha-over blend of one foreground over one background,
/// `out = F*M + B'*(1-M)`, with the mask broadcast across color channels.
/// When a shadow frame is given the background is first shadowed, so the
/// shadow lies under the foreground but over the plain background.
pub fn composite_single(
    bg: &Frame,
    fg: &Frame,
    mask: &MaskPlane,
    shadow: Option<&ShadowFrame>,
) -> SeqComposeResult<Frame> {
    ensure_same_dims("foreground", fg.width, fg.height, bg.width, bg.height)?;
    ensure_same_dims("mask", mask.width, mask.height, bg.width, bg.height)?;

    let base = match shadow {
        Some(s) => shadowed_background(bg, s)?,
        None => bg.clone(),
    };
    Ok(blend_over(fg, &base, mask))
}

/// Accumulate N foreground layers in order into one color plane plus one
/// coverage plane.
///
/// Color: later layers are painted over earlier ones at their own mask's
/// opacity, `fg = fg*(1-M_i) + F_i*M_i`.
/// Coverage: masks literally sum and are then clamped to 1, so overlapping
/// low-opacity layers can reach full coverage where no single layer does.
pub fn accumulate_layers(
    width: u32,
    height: u32,
    layers: &[Layer],
) -> SeqComposeResult<(Frame, MaskPlane)> {
    let mut fg = Frame::zeros(width, height);
    let mut mask = MaskPlane::zeros(width, height);

    for layer in layers {
        ensure_same_dims(
            "layer frame",
            layer.frame.width,
            layer.frame.height,
            width,
            height,
        )?;
        ensure_same_dims(
            "layer mask",
            layer.mask.width,
            layer.mask.height,
            width,
            height,
        )?;

        for (i, &m) in layer.mask.data.iter().enumerate() {
            for c in 0..3 {
                let j = i * 3 + c;
                fg.data[j] = fg.data[j] * (1.0 - m) + layer.frame.data[j] * m;
            }
            mask.data[i] += m;
        }
    }

    for m in &mut mask.data {
        if *m > 1.0 {
            *m = 1.0;
        }
    }

    Ok((fg, mask))
}

/// Multi-foreground composite: accumulate the layers, then blend the
/// accumulated color against the (optionally shadowed) background with the
/// clamped accumulated coverage. The accumulated color is already
/// mask-weighted, so this is a coarser approximation than true
/// over-compositing. That is the contract, not an accident.
pub fn composite_layers(
    bg: &Frame,
    layers: &[Layer],
    shadow: Option<&ShadowFrame>,
) -> SeqComposeResult<Frame> {
    let (fg, mask) = accumulate_layers(bg.width, bg.height, layers)?;

    let base = match shadow {
        Some(s) => shadowed_background(bg, s)?,
        None => bg.clone(),
    };
    Ok(blend_over(&fg, &base, &mask))
}

fn blend_over(fg: &Frame, bg: &Frame, mask: &MaskPlane) -> Frame {
    let mut out = Frame::zeros(bg.width, bg.height);
    for (i, &m) in mask.data.iter().enumerate() {
        for c in 0..3 {
            let j = i * 3 + c;
            out.data[j] = fg.data[j] * m + bg.data[j] * (1.0 - m);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shadow_solid(width: u32, height: u32, rgb: [f32; 3], alpha: f32) -> ShadowFrame {
        let n = width as usize * height as usize;
        let mut color = Vec::with_capacity(n * 3);
        for _ in 0..n {
            color.extend_from_slice(&rgb);
        }
        ShadowFrame {
            width,
            height,
            rgb: color,
            alpha: vec![alpha; n],
        }
    }

    #[test]
    fn full_mask_yields_foreground_exactly() {
        let bg = Frame::solid(2, 2, [1.0, 0.0, 0.0]);
        let fg = Frame::solid(2, 2, [0.0, 0.0, 1.0]);
        let mask = MaskPlane::solid(2, 2, 1.0);
        let out = composite_single(&bg, &fg, &mask, None).unwrap();
        assert_eq!(out, fg);
    }

    #[test]
    fn zero_mask_yields_background_exactly() {
        let bg = Frame::solid(2, 2, [1.0, 0.0, 0.0]);
        let fg = Frame::solid(2, 2, [0.0, 0.0, 1.0]);
        let mask = MaskPlane::zeros(2, 2);
        let out = composite_single(&bg, &fg, &mask, None).unwrap();
        assert_eq!(out, bg);
    }

    #[test]
    fn partial_mask_interpolates() {
        let bg = Frame::solid(1, 1, [1.0, 0.0, 0.0]);
        let fg = Frame::solid(1, 1, [0.0, 0.0, 1.0]);
        let mask = MaskPlane::solid(1, 1, 0.25);
        let out = composite_single(&bg, &fg, &mask, None).unwrap();
        let px = out.pixel(0, 0);
        assert!((px[0] - 0.75).abs() < 1e-6);
        assert!((px[2] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn zero_alpha_shadow_matches_no_shadow() {
        let bg = Frame::solid(2, 2, [0.3, 0.5, 0.7]);
        let fg = Frame::solid(2, 2, [0.9, 0.1, 0.2]);
        let mask = MaskPlane::solid(2, 2, 0.4);
        let shadow = shadow_solid(2, 2, [0.0, 0.0, 0.0], 0.0);

        let with = composite_single(&bg, &fg, &mask, Some(&shadow)).unwrap();
        let without = composite_single(&bg, &fg, &mask, None).unwrap();
        assert_eq!(with, without);
    }

    #[test]
    fn opaque_shadow_replaces_background_outside_mask() {
        let bg = Frame::solid(1, 1, [1.0, 1.0, 1.0]);
        let fg = Frame::solid(1, 1, [0.0, 1.0, 0.0]);
        let mask = MaskPlane::zeros(1, 1);
        let shadow = shadow_solid(1, 1, [0.1, 0.1, 0.1], 1.0);

        let out = composite_single(&bg, &fg, &mask, Some(&shadow)).unwrap();
        let px = out.pixel(0, 0);
        assert!((px[0] - 0.1).abs() < 1e-6);
    }

    #[test]
    fn shadow_lies_under_the_foreground() {
        // Full mask: the shadowed background must not show through at all.
        let bg = Frame::solid(1, 1, [1.0, 1.0, 1.0]);
        let fg = Frame::solid(1, 1, [0.0, 1.0, 0.0]);
        let mask = MaskPlane::solid(1, 1, 1.0);
        let shadow = shadow_solid(1, 1, [0.0, 0.0, 0.0], 1.0);

        let out = composite_single(&bg, &fg, &mask, Some(&shadow)).unwrap();
        assert_eq!(out, fg);
    }

    #[test]
    fn accumulated_mask_clamps_to_one() {
        let layers = vec![
            Layer {
                frame: Frame::solid(1, 1, [0.5, 0.5, 0.5]),
                mask: MaskPlane::solid(1, 1, 0.7),
            },
            Layer {
                frame: Frame::solid(1, 1, [0.5, 0.5, 0.5]),
                mask: MaskPlane::solid(1, 1, 0.7),
            },
        ];
        let (_, mask) = accumulate_layers(1, 1, &layers).unwrap();
        assert_eq!(mask.value(0, 0), 1.0);
    }

    #[test]
    fn later_layer_wins_where_masks_are_opaque() {
        let bg = Frame::solid(1, 1, [0.0, 0.0, 0.0]);
        let layers = vec![
            Layer {
                frame: Frame::solid(1, 1, [1.0, 0.0, 0.0]),
                mask: MaskPlane::solid(1, 1, 1.0),
            },
            Layer {
                frame: Frame::solid(1, 1, [0.0, 0.0, 1.0]),
                mask: MaskPlane::solid(1, 1, 1.0),
            },
        ];
        let out = composite_layers(&bg, &layers, None).unwrap();
        assert_eq!(out.pixel(0, 0), [0.0, 0.0, 1.0]);
    }

    #[test]
    fn single_layer_multi_blend_double_weights_the_mask() {
        // The multi-layer path blends the accumulated, already mask-weighted
        // color, so one layer at mask 0.5 contributes 0.25, not 0.5.
        let bg = Frame::solid(1, 1, [0.0, 0.0, 0.0]);
        let layers = vec![Layer {
            frame: Frame::solid(1, 1, [1.0, 1.0, 1.0]),
            mask: MaskPlane::solid(1, 1, 0.5),
        }];
        let out = composite_layers(&bg, &layers, None).unwrap();
        assert!((out.pixel(0, 0)[0] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn empty_layer_set_yields_background() {
        let bg = Frame::solid(2, 1, [0.2, 0.4, 0.6]);
        let out = composite_layers(&bg, &[], None).unwrap();
        assert_eq!(out, bg);
    }

    #[test]
    fn dimension_mismatch_is_a_clear_error() {
        let bg = Frame::solid(2, 2, [0.0; 3]);
        let fg = Frame::solid(3, 2, [0.0; 3]);
        let mask = MaskPlane::solid(2, 2, 1.0);
        let err = composite_single(&bg, &fg, &mask, None).unwrap_err();
        assert!(err.to_string().contains("dimension mismatch"));
    }
}
