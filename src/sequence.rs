use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::error::{SeqComposeError, SeqComposeResult};

/// One foreground layer's file paths for a single time step.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerPaths {
    pub frame: PathBuf,
    /// Absent in single-foreground mode when no mask directory was given;
    /// the red-channel fallback applies instead.
    pub mask: Option<PathBuf>,
}

/// All input paths for one time step, assembled once up front so the
/// compositor itself never touches the filesystem ordering.
#[derive(Clone, Debug, PartialEq)]
pub struct StepInputs {
    pub background: PathBuf,
    pub layers: Vec<LayerPaths>,
    pub shadow: Option<PathBuf>,
}

/// List the frame files of a directory in lexicographic filename order.
/// This ordering is load-bearing: position in the sorted listing defines the
/// temporal sequence and the cross-sequence alignment.
pub fn list_frames(dir: &Path) -> SeqComposeResult<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("read frame directory '{}'", dir.display()))?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry =
            entry.with_context(|| format!("read frame directory '{}'", dir.display()))?;
        let file_type = entry
            .file_type()
            .with_context(|| format!("stat '{}'", entry.path().display()))?;
        if file_type.is_file() {
            paths.push(entry.path());
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths)
}

/// Pair up the single-foreground inputs by sorted position. The step count
/// is the minimum across every provided sequence; longer sequences are
/// silently truncated.
pub fn align_single(
    fg_dir: &Path,
    bg_dir: &Path,
    mask_dir: Option<&Path>,
    shadow_dir: Option<&Path>,
) -> SeqComposeResult<Vec<StepInputs>> {
    let fg = list_frames(fg_dir)?;
    let bg = list_frames(bg_dir)?;
    let masks = mask_dir.map(list_frames).transpose()?;
    let shadows = shadow_dir.map(list_frames).transpose()?;

    let mut n = fg.len().min(bg.len());
    if let Some(masks) = &masks {
        n = n.min(masks.len());
    }
    if let Some(shadows) = &shadows {
        n = n.min(shadows.len());
    }

    Ok((0..n)
        .map(|i| StepInputs {
            background: bg[i].clone(),
            layers: vec![LayerPaths {
                frame: fg[i].clone(),
                mask: masks.as_ref().map(|m| m[i].clone()),
            }],
            shadow: shadows.as_ref().map(|s| s[i].clone()),
        })
        .collect())
}

/// Pair up the multi-foreground inputs by sorted position. Here the
/// background count is authoritative: foreground, mask, and shadow
/// sequences longer than the background are truncated, and ones shorter
/// than it cannot be satisfied and fail the run.
pub fn align_multi(
    fg_dirs: &[PathBuf],
    mask_dirs: &[PathBuf],
    bg_dir: &Path,
    shadow_dir: Option<&Path>,
) -> SeqComposeResult<Vec<StepInputs>> {
    if fg_dirs.is_empty() {
        return Err(SeqComposeError::validation(
            "multi-foreground compose needs at least one foreground directory",
        ));
    }
    if fg_dirs.len() != mask_dirs.len() {
        return Err(SeqComposeError::validation(format!(
            "got {} foreground directories but {} mask directories",
            fg_dirs.len(),
            mask_dirs.len()
        )));
    }

    let bg = list_frames(bg_dir)?;
    let n = bg.len();

    let mut fg_seqs = Vec::with_capacity(fg_dirs.len());
    for dir in fg_dirs {
        let frames = list_frames(dir)?;
        ensure_covers(n, frames.len(), dir)?;
        fg_seqs.push(frames);
    }
    let mut mask_seqs = Vec::with_capacity(mask_dirs.len());
    for dir in mask_dirs {
        let frames = list_frames(dir)?;
        ensure_covers(n, frames.len(), dir)?;
        mask_seqs.push(frames);
    }
    let shadows = match shadow_dir {
        Some(dir) => {
            let frames = list_frames(dir)?;
            ensure_covers(n, frames.len(), dir)?;
            Some(frames)
        }
        None => None,
    };

    Ok((0..n)
        .map(|i| StepInputs {
            background: bg[i].clone(),
            layers: fg_seqs
                .iter()
                .zip(&mask_seqs)
                .map(|(fg, masks)| LayerPaths {
                    frame: fg[i].clone(),
                    mask: Some(masks[i].clone()),
                })
                .collect(),
            shadow: shadows.as_ref().map(|s| s[i].clone()),
        })
        .collect())
}

fn ensure_covers(needed: usize, got: usize, dir: &Path) -> SeqComposeResult<()> {
    if got < needed {
        return Err(SeqComposeError::validation(format!(
            "'{}' holds {got} frames but the background sequence has {needed}",
            dir.display()
        )));
    }
    Ok(())
}
