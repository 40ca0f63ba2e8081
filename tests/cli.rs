use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

fn stitchshot_cmd(config_home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("stitchshot").expect("binary exists");
    cmd.env("XDG_CONFIG_HOME", config_home);
    cmd
}

/// Writes rows `first..first + height` of a page whose rows each have a distinct colour.
fn write_page_slice(path: &Path, first: i32, height: i32) {
    use cairo::{Context, Format, ImageSurface};

    let surface = ImageSurface::create(Format::Rgb24, 16, height).unwrap();
    let ctx = Context::new(&surface).unwrap();
    for row in 0..height {
        let shade = f64::from(first + row) / 64.0;
        ctx.set_source_rgb(shade, 1.0 - shade, 0.5);
        ctx.rectangle(0.0, f64::from(row), 16.0, 1.0);
        ctx.fill().unwrap();
    }
    drop(ctx);

    let mut file = std::fs::File::create(path).unwrap();
    surface.write_to_png(&mut file).unwrap();
}

#[test]
fn help_prints_usage() {
    let temp = TempDir::new().unwrap();
    stitchshot_cmd(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Window and scrolling screenshot tool for Wayland compositors",
        ));
}

#[test]
fn window_capture_requires_wayland_env() {
    let temp = TempDir::new().unwrap();
    stitchshot_cmd(temp.path())
        .env_remove("WAYLAND_DISPLAY")
        .arg("--window")
        .assert()
        .failure()
        .stderr(predicate::str::contains("WAYLAND_DISPLAY not set"));
}

#[test]
fn capture_sources_are_mutually_exclusive() {
    let temp = TempDir::new().unwrap();
    stitchshot_cmd(temp.path())
        .args(["--fullscreen", "--clipboard"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn rejects_unknown_window_mode() {
    let temp = TempDir::new().unwrap();
    stitchshot_cmd(temp.path())
        .args(["--fullscreen", "--mode", "gdi"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown window capture mode"));
}

#[test]
fn file_mode_saves_copy_without_wayland() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("input.png");
    write_page_slice(&input, 0, 24);
    let out_dir = temp.path().join("shots");

    stitchshot_cmd(temp.path())
        .env_remove("WAYLAND_DISPLAY")
        .arg("--file")
        .arg(&input)
        .arg("--output-dir")
        .arg(&out_dir)
        .args(["--destination", "file"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Captured 16x24"))
        .stdout(predicate::str::contains("Saved to"));

    let saved: Vec<_> = std::fs::read_dir(&out_dir).unwrap().collect();
    assert_eq!(saved.len(), 1);
}

#[test]
fn stitch_merges_overlapping_pages() {
    let temp = TempDir::new().unwrap();
    let top = temp.path().join("top.png");
    let bottom = temp.path().join("bottom.png");
    write_page_slice(&top, 0, 20);
    write_page_slice(&bottom, 12, 20);
    let out_dir = temp.path().join("stitched");

    stitchshot_cmd(temp.path())
        .env_remove("WAYLAND_DISPLAY")
        .arg("--stitch")
        .arg(&top)
        .arg(&bottom)
        .arg("--output-dir")
        .arg(&out_dir)
        .args(["--destination", "file"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Captured 16x32"));

    let entry = std::fs::read_dir(&out_dir)
        .unwrap()
        .next()
        .expect("stitched file written")
        .unwrap();
    let mut file = std::fs::File::open(entry.path()).unwrap();
    let surface = cairo::ImageSurface::create_from_png(&mut file).unwrap();
    assert_eq!((surface.width(), surface.height()), (16, 32));
}

#[test]
fn stitch_rejects_mismatched_widths() {
    use cairo::{Format, ImageSurface};

    let temp = TempDir::new().unwrap();
    let narrow = temp.path().join("narrow.png");
    let wide = temp.path().join("wide.png");
    write_page_slice(&narrow, 0, 10);
    let surface = ImageSurface::create(Format::Rgb24, 30, 10).unwrap();
    let mut file = std::fs::File::create(&wide).unwrap();
    surface.write_to_png(&mut file).unwrap();

    stitchshot_cmd(temp.path())
        .arg("--stitch")
        .arg(&narrow)
        .arg(&wide)
        .arg("--output-dir")
        .arg(temp.path().join("out"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to stitch"));
}

#[test]
fn init_config_writes_example() {
    let temp = TempDir::new().unwrap();
    stitchshot_cmd(temp.path())
        .arg("--init-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created default config"));

    let written = std::fs::read_to_string(temp.path().join("stitchshot/config.toml")).unwrap();
    assert!(written.contains("[scroll]"));

    stitchshot_cmd(temp.path())
        .arg("--init-config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}
