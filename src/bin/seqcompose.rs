use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "seqcompose", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Composite one foreground sequence over a background sequence.
    Compose(ComposeArgs),
    /// Composite several foreground sequences over one background sequence.
    ComposeMulti(ComposeMultiArgs),
    /// Render a shadow pass by driving Blender (requires `blender` on PATH).
    ShadowRender(ShadowRenderArgs),
}

#[derive(Parser, Debug)]
struct ComposeArgs {
    /// Foreground frame directory.
    #[arg(long = "fg")]
    fg_dir: PathBuf,

    /// Background frame directory.
    #[arg(long = "bg")]
    bg_dir: PathBuf,

    /// Mask frame directory. Without it, foreground presence is inferred
    /// from the red channel.
    #[arg(long = "mask")]
    mask_dir: Option<PathBuf>,

    /// Shadow-pass frame directory.
    #[arg(long = "shadow")]
    shadow_dir: Option<PathBuf>,

    /// Output directory for `video_composed.mp4` and the PNG stills.
    #[arg(long = "out")]
    out_dir: PathBuf,
}

#[derive(Parser, Debug)]
struct ComposeMultiArgs {
    /// Foreground frame directory, one per layer in paint order.
    #[arg(long = "fg", required = true)]
    fg_dirs: Vec<PathBuf>,

    /// Mask frame directory, one per foreground, in the same order.
    #[arg(long = "mask", required = true)]
    mask_dirs: Vec<PathBuf>,

    /// Background frame directory.
    #[arg(long = "bg")]
    bg_dir: PathBuf,

    /// Shadow-pass frame directory.
    #[arg(long = "shadow")]
    shadow_dir: Option<PathBuf>,

    /// Output directory for `video_composed.mp4` and the PNG stills.
    #[arg(long = "out")]
    out_dir: PathBuf,
}

#[derive(Parser, Debug)]
struct ShadowRenderArgs {
    /// Shadow render job JSON.
    #[arg(long)]
    job: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Compose(args) => cmd_compose(args),
        Command::ComposeMulti(args) => cmd_compose_multi(args),
        Command::ShadowRender(args) => cmd_shadow_render(args),
    }
}

fn cmd_compose(args: ComposeArgs) -> anyhow::Result<()> {
    let job = seqcompose::SingleJob {
        fg_dir: args.fg_dir,
        bg_dir: args.bg_dir,
        mask_dir: args.mask_dir,
        shadow_dir: args.shadow_dir,
    };

    let mut video = seqcompose::Mp4Sink::new(&args.out_dir);
    let mut stills = seqcompose::PngSequenceSink::new(&args.out_dir);
    let mut sinks: [&mut dyn seqcompose::FrameSink; 2] = [&mut video, &mut stills];
    let frames = seqcompose::run_single(&job, &mut sinks)?;

    eprintln!("wrote {frames} frames to {}", args.out_dir.display());
    Ok(())
}

fn cmd_compose_multi(args: ComposeMultiArgs) -> anyhow::Result<()> {
    let job = seqcompose::MultiJob {
        fg_dirs: args.fg_dirs,
        mask_dirs: args.mask_dirs,
        bg_dir: args.bg_dir,
        shadow_dir: args.shadow_dir,
    };

    let mut video = seqcompose::Mp4Sink::new(&args.out_dir);
    let mut stills = seqcompose::PngSequenceSink::new(&args.out_dir);
    let mut sinks: [&mut dyn seqcompose::FrameSink; 2] = [&mut video, &mut stills];
    let frames = seqcompose::run_multi(&job, &mut sinks)?;

    eprintln!("wrote {frames} frames to {}", args.out_dir.display());
    Ok(())
}

fn cmd_shadow_render(args: ShadowRenderArgs) -> anyhow::Result<()> {
    let job = read_job_json(&args.job)?;
    seqcompose::render_shadow_frames(&job)?;

    eprintln!("rendered shadow frames to {}", job.out_dir.display());
    Ok(())
}

fn read_job_json(path: &Path) -> anyhow::Result<seqcompose::ShadowRenderJob> {
    let f = File::open(path).with_context(|| format!("open job '{}'", path.display()))?;
    let r = BufReader::new(f);
    let job: seqcompose::ShadowRenderJob =
        serde_json::from_reader(r).with_context(|| "parse job JSON")?;
    Ok(job)
}
