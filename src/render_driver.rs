use std::{
    path::PathBuf,
    process::{Command, Stdio},
};

use anyhow::Context as _;

use crate::error::{SeqComposeError, SeqComposeResult};

/// Compute device for the Cycles renderer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderDevice {
    #[default]
    Cuda,
    Cpu,
}

/// A shadow-pass render job, usually loaded from a JSON job file.
///
/// The scene is rendered with a transparent film over a spherical
/// environment light, so the resulting stills carry the shadow in their
/// alpha channel and composite directly as the pipeline's shadow frames.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ShadowRenderJob {
    /// Scene file (`.blend`) to open.
    pub scene: PathBuf,
    /// Spherical environment-light image installed as the world light.
    pub environment_map: PathBuf,
    /// First frame to render.
    pub start_frame: u32,
    /// Last frame to render, inclusive. Defaults to the scene's configured
    /// end frame.
    #[serde(default)]
    pub end_frame: Option<u32>,
    /// Directory receiving the numbered still frames.
    pub out_dir: PathBuf,
    #[serde(default)]
    pub device: RenderDevice,
}

impl ShadowRenderJob {
    pub fn validate(&self) -> SeqComposeResult<()> {
        if let Some(end) = self.end_frame
            && end < self.start_frame
        {
            return Err(SeqComposeError::validation(format!(
                "end frame {end} is before start frame {}",
                self.start_frame
            )));
        }
        Ok(())
    }
}

pub fn is_blender_on_path() -> bool {
    Command::new("blender")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Render the job's frame range by driving a headless `blender` process with
/// a generated configuration script, the same way the compose pipeline
/// drives the system `ffmpeg`.
pub fn render_shadow_frames(job: &ShadowRenderJob) -> SeqComposeResult<()> {
    job.validate()?;

    std::fs::create_dir_all(&job.out_dir).with_context(|| {
        format!("create shadow output directory '{}'", job.out_dir.display())
    })?;

    if !is_blender_on_path() {
        return Err(SeqComposeError::render(
            "blender is required for shadow rendering, but was not found on PATH",
        ));
    }

    let output = Command::new("blender")
        .arg("--background")
        .arg(&job.scene)
        .arg("--python-expr")
        .arg(python_expr(job))
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| {
            SeqComposeError::render(format!(
                "failed to spawn blender (is it installed and on PATH?): {e}"
            ))
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SeqComposeError::render(format!(
            "blender exited with status {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    tracing::info!(out_dir = %job.out_dir.display(), "rendered shadow pass");
    Ok(())
}

/// Build the Python expression executed inside Blender: Cycles with the
/// requested device, transparent film, the environment map wired into the
/// world node tree, then a render loop writing numbered stills.
fn python_expr(job: &ShadowRenderJob) -> String {
    let (compute_type, cycles_device) = match job.device {
        RenderDevice::Cuda => ("CUDA", "GPU"),
        RenderDevice::Cpu => ("NONE", "CPU"),
    };
    let end_expr = match job.end_frame {
        Some(end) => end.to_string(),
        None => "scene.frame_end".to_string(),
    };

    format!(
        r#"import bpy
import os
scene = bpy.context.scene
prefs = bpy.context.preferences.addons['cycles'].preferences
prefs.compute_device_type = {compute_type}
scene.cycles.device = {cycles_device}
scene.render.engine = 'CYCLES'
scene.render.film_transparent = True
world = scene.world
tree = world.node_tree
for node in list(tree.nodes):
    tree.nodes.remove(node)
env = tree.nodes.new('ShaderNodeTexEnvironment')
env.image = bpy.data.images.load({env_map})
background = tree.nodes.new('ShaderNodeBackground')
out = tree.nodes.new('ShaderNodeOutputWorld')
tree.links.new(background.inputs['Color'], env.outputs['Color'])
tree.links.new(out.inputs['Surface'], background.outputs['Background'])
world.cycles_visibility.glossy = True
world.cycles_visibility.transmission = True
world.cycles_visibility.scatter = True
start = {start}
end = {end_expr}
scene.frame_start = start
out_dir = {out_dir}
for frame in range(start, end + 1):
    scene.frame_set(frame)
    scene.render.filepath = os.path.join(out_dir, '%04d' % frame)
    bpy.ops.render.render(write_still=True)
"#,
        compute_type = py_str(compute_type),
        cycles_device = py_str(cycles_device),
        env_map = py_str(&job.environment_map.to_string_lossy()),
        start = job.start_frame,
        out_dir = py_str(&job.out_dir.to_string_lossy()),
    )
}

/// Quote a string as a Python literal.
fn py_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> ShadowRenderJob {
        ShadowRenderJob {
            scene: PathBuf::from("scenes/indoor.blend"),
            environment_map: PathBuf::from("env/00000.jpg"),
            start_frame: 72,
            end_frame: None,
            out_dir: PathBuf::from("render/shadow"),
            device: RenderDevice::Cuda,
        }
    }

    #[test]
    fn validate_rejects_inverted_frame_range() {
        let mut j = job();
        j.end_frame = Some(10);
        assert!(j.validate().is_err());
        j.end_frame = Some(72);
        assert!(j.validate().is_ok());
    }

    #[test]
    fn python_expr_configures_cycles_and_environment() {
        let script = python_expr(&job());
        assert!(script.contains("prefs.compute_device_type = 'CUDA'"));
        assert!(script.contains("scene.cycles.device = 'GPU'"));
        assert!(script.contains("scene.render.film_transparent = True"));
        assert!(script.contains("ShaderNodeTexEnvironment"));
        assert!(script.contains("bpy.data.images.load('env/00000.jpg')"));
        assert!(script.contains("start = 72"));
        assert!(script.contains("end = scene.frame_end"));
    }

    #[test]
    fn python_expr_cpu_device_disables_cuda() {
        let mut j = job();
        j.device = RenderDevice::Cpu;
        let script = python_expr(&j);
        assert!(script.contains("prefs.compute_device_type = 'NONE'"));
        assert!(script.contains("scene.cycles.device = 'CPU'"));
    }

    #[test]
    fn python_expr_pins_explicit_end_frame() {
        let mut j = job();
        j.end_frame = Some(100);
        assert!(python_expr(&j).contains("end = 100"));
    }

    #[test]
    fn py_str_escapes_quotes_and_backslashes() {
        assert_eq!(py_str("a'b"), r"'a\'b'");
        assert_eq!(py_str(r"C:\x"), r"'C:\\x'");
    }

    #[test]
    fn job_round_trips_through_json() {
        let text = r#"{
            "scene": "scenes/indoor.blend",
            "environment_map": "env/00000.jpg",
            "start_frame": 72,
            "out_dir": "render/shadow",
            "device": "cpu"
        }"#;
        let j: ShadowRenderJob = serde_json::from_str(text).unwrap();
        assert_eq!(j.device, RenderDevice::Cpu);
        assert_eq!(j.end_frame, None);
    }
}
