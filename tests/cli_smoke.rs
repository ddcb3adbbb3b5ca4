use std::path::{Path, PathBuf};
use std::process::Command;

fn ffmpeg_available() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn bin_path() -> PathBuf {
    std::env::var_os("CARGO_BIN_EXE_seqcompose")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let mut p = PathBuf::from("target").join("debug");
            p.push(if cfg!(windows) {
                "seqcompose.exe"
            } else {
                "seqcompose"
            });
            p
        })
}

fn write_seq(dir: &Path, count: usize, rgb: [u8; 3]) {
    std::fs::create_dir_all(dir).unwrap();
    let mut data = Vec::new();
    for _ in 0..64 {
        data.extend_from_slice(&rgb);
    }
    let img = image::RgbImage::from_raw(8, 8, data).unwrap();
    for i in 0..count {
        img.save_with_format(dir.join(format!("{i:04}.png")), image::ImageFormat::Png)
            .unwrap();
    }
}

#[test]
fn cli_compose_writes_video_and_stills() {
    if !ffmpeg_available() {
        eprintln!("skipping: ffmpeg not on PATH");
        return;
    }

    let root = PathBuf::from("target").join("cli_smoke");
    let _ = std::fs::remove_dir_all(&root);
    write_seq(&root.join("fg"), 2, [0, 0, 255]);
    write_seq(&root.join("bg"), 2, [255, 0, 0]);

    let out = root.join("out");
    let status = Command::new(bin_path())
        .args(["compose", "--fg"])
        .arg(root.join("fg"))
        .arg("--bg")
        .arg(root.join("bg"))
        .arg("--out")
        .arg(&out)
        .status()
        .unwrap();

    assert!(status.success());
    assert!(out.join("video_composed.mp4").exists());
    assert!(out.join("0000.png").exists());
    assert!(out.join("0001.png").exists());
}

#[test]
fn cli_rejects_missing_input_directory() {
    let root = PathBuf::from("target").join("cli_smoke_missing");
    let _ = std::fs::remove_dir_all(&root);
    write_seq(&root.join("bg"), 1, [255, 0, 0]);

    let status = Command::new(bin_path())
        .args(["compose", "--fg"])
        .arg(root.join("nope"))
        .arg("--bg")
        .arg(root.join("bg"))
        .arg("--out")
        .arg(root.join("out"))
        .status()
        .unwrap();

    assert!(!status.success());
}
