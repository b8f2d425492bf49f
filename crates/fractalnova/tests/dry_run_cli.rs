use std::fs;
use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

fn create_shader_dir(root: &Path) {
    for name in ["mandelbrot.vert", "mandelbrot.frag", "julia.vert", "julia.frag"] {
        fs::write(root.join(name), "#version 450\nvoid main() {}\n").unwrap();
    }
}

#[test]
fn dry_run_prints_driver_trace() {
    let root = TempDir::new().unwrap();
    create_shader_dir(root.path());

    let output = Command::new(env!("CARGO_BIN_EXE_fractalnova"))
        .env_remove("RUST_LOG")
        .args(["--fractal", "julia3", "--window-size", "320x200", "--dry-run", "2"])
        .arg("--shader-dir")
        .arg(root.path())
        .output()
        .expect("failed to run fractalnova --dry-run");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stdout: {stdout}");
    assert!(stdout.contains("julia.vert"));
    assert_eq!(stdout.matches("DrawArrays").count(), 2);
    assert_eq!(stdout.matches("Blit(").count(), 2);
    assert!(stdout.contains("2 frame(s)"));
}

#[test]
fn dry_run_fails_when_shaders_are_missing() {
    let root = TempDir::new().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_fractalnova"))
        .env_remove("RUST_LOG")
        .arg("--dry-run")
        .arg("--shader-dir")
        .arg(root.path().join("nowhere"))
        .output()
        .expect("failed to run fractalnova --dry-run");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("mandelbrot.vert"), "stderr: {stderr}");
}
