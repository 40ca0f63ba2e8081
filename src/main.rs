use std::path::PathBuf;
use std::thread;

use anyhow::{Context, anyhow};
use clap::{ArgAction, Parser};
use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;

use stitchshot::Config;
use stitchshot::capture::{
    BitmapStitcher, CancellationToken, CaptureDependencies, CaptureDestination, CaptureDetails,
    CaptureManager, CaptureMethod, CaptureOutcome, CaptureResult, CaptureSummary, CaptureType,
    ScrollAxis, ViewportFragment, WindowHandle, file::FileSaveConfig, file::load_capture_file,
    scroll::ScrollPosition,
};
use stitchshot::config::{OutputDestination, WindowCaptureMode};
use stitchshot::util::parse_geometry;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("STITCHSHOT_GIT_HASH"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "stitchshot")]
#[command(version = VERSION, about = "Window and scrolling screenshot tool for Wayland compositors")]
struct Cli {
    /// Capture a region given as "x,y WxH"
    #[arg(long, value_name = "GEOMETRY", group = "source")]
    region: Option<String>,

    /// Capture a window (the focused one unless an address is given)
    #[arg(long, value_name = "ADDRESS", num_args = 0..=1, default_missing_value = "", group = "source")]
    window: Option<String>,

    /// Capture every monitor
    #[arg(long, action = ArgAction::SetTrue, group = "source")]
    fullscreen: bool,

    /// Scroll through a window and stitch its full content
    #[arg(long, value_name = "ADDRESS", num_args = 0..=1, default_missing_value = "", group = "source")]
    scroll: Option<String>,

    /// Take the image currently on the clipboard
    #[arg(long, action = ArgAction::SetTrue, group = "source")]
    clipboard: bool,

    /// Load an image file
    #[arg(long, value_name = "PATH", group = "source")]
    file: Option<PathBuf>,

    /// Stitch overlapping page images into one
    #[arg(long, value_name = "FILE", num_args = 1.., group = "source")]
    stitch: Vec<PathBuf>,

    /// Stitch side by side instead of top to bottom
    #[arg(long, action = ArgAction::SetTrue, requires = "stitch")]
    horizontal: bool,

    /// Window capture mode (auto, compositor, direct-copy, screen)
    #[arg(long, short = 'm', value_name = "MODE")]
    mode: Option<WindowCaptureMode>,

    /// Directory to save screenshots to
    #[arg(long, short = 'o', value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Where to deliver the image (clipboard, file, clipboard-and-file)
    #[arg(long, short = 'd', value_name = "DEST")]
    destination: Option<OutputDestination>,

    /// Write a documented default config file and exit
    #[arg(long, action = ArgAction::SetTrue)]
    init_config: bool,
}

impl Cli {
    fn capture_type(&self) -> anyhow::Result<Option<CaptureType>> {
        let handle = |address: &str| {
            (!address.is_empty()).then(|| WindowHandle(address.to_string()))
        };

        let capture_type = if let Some(geometry) = &self.region {
            let rect = parse_geometry(geometry)
                .ok_or_else(|| anyhow!("Invalid region '{}', expected \"x,y WxH\"", geometry))?;
            CaptureType::Region(rect)
        } else if let Some(address) = &self.window {
            match handle(address) {
                Some(handle) => CaptureType::Window(handle),
                None => CaptureType::ActiveWindow,
            }
        } else if self.fullscreen {
            CaptureType::FullScreen
        } else if let Some(address) = &self.scroll {
            CaptureType::ScrollingWindow(handle(address))
        } else if self.clipboard {
            CaptureType::Clipboard
        } else if let Some(path) = &self.file {
            CaptureType::File(path.clone())
        } else {
            return Ok(None);
        };
        Ok(Some(capture_type))
    }
}

fn requires_wayland(capture_type: &CaptureType) -> bool {
    !matches!(capture_type, CaptureType::File(_))
}

/// Only scrolling captures can stop early; every other capture keeps the default signal handlers.
fn cancels_on_signal(capture_type: &CaptureType) -> bool {
    matches!(capture_type, CaptureType::ScrollingWindow(_))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    if cli.init_config {
        let path = Config::create_default_file()?;
        println!("Created default config at {}", path.display());
        return Ok(());
    }

    let mut config = Config::load()?;
    if let Some(mode) = cli.mode {
        config.capture.window_mode = mode;
    }
    if let Some(dir) = &cli.output_dir {
        config.output.save_directory = dir.to_string_lossy().into_owned();
    }
    if let Some(destination) = cli.destination {
        config.output.destination = destination;
    }

    let destination = config.output.destination.to_capture_destination();
    let save_config = FileSaveConfig::from_output(&config.output);

    if !cli.stitch.is_empty() {
        let axis = if cli.horizontal {
            ScrollAxis::Horizontal
        } else {
            ScrollAxis::Vertical
        };
        return run_stitch(&cli.stitch, axis, &config, destination, save_config);
    }

    let Some(capture_type) = cli.capture_type()? else {
        print_usage();
        return Ok(());
    };

    if requires_wayland(&capture_type) && std::env::var("WAYLAND_DISPLAY").is_err() {
        log::error!("WAYLAND_DISPLAY not set - this application requires Wayland.");
        log::error!("Please run on a Wayland compositor (Hyprland, Sway, etc.).");
        return Err(anyhow!("Wayland environment required"));
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let manager = CaptureManager::new(runtime.handle(), &config);
    if cancels_on_signal(&capture_type) {
        spawn_cancel_listener(manager.cancel_token())?;
    }

    let outcome = runtime.block_on(manager.capture(capture_type, destination, Some(save_config)))?;
    match outcome {
        CaptureOutcome::Success(summary) => {
            report(&summary);
            Ok(())
        }
        CaptureOutcome::Cancelled(reason) => {
            println!("Capture cancelled: {}", reason);
            Ok(())
        }
        CaptureOutcome::Failed(message) => Err(anyhow!(message)),
    }
}

/// Cancels a running scrolling capture on SIGINT/SIGTERM; a second signal exits immediately.
fn spawn_cancel_listener(token: CancellationToken) -> anyhow::Result<()> {
    let mut signals =
        Signals::new([SIGINT, SIGTERM]).context("Failed to register signal handler")?;

    thread::spawn(move || {
        for sig in signals.forever() {
            if token.is_cancelled() {
                log::warn!("Received signal {} again, exiting", sig);
                std::process::exit(128 + sig);
            }
            log::info!("Received signal {}, stopping scrolling capture", sig);
            token.cancel();
        }
    });
    Ok(())
}

fn run_stitch(
    files: &[PathBuf],
    axis: ScrollAxis,
    config: &Config,
    destination: CaptureDestination,
    save_config: FileSaveConfig,
) -> anyhow::Result<()> {
    let mut stitcher = BitmapStitcher::with_min_overlap(axis, config.scroll.min_overlap);
    for (index, path) in files.iter().enumerate() {
        let buffer = load_capture_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?;
        stitcher
            .add_bitmap(ViewportFragment {
                buffer,
                offset: ScrollPosition::default(),
                index,
            })
            .with_context(|| format!("Failed to stitch {}", path.display()))?;
    }

    let buffer = stitcher.into_result().context("No images to stitch")?;
    log::info!(
        "Stitched {} images into {}x{}",
        files.len(),
        buffer.width(),
        buffer.height()
    );

    let result = CaptureResult {
        details: CaptureDetails::new(CaptureMethod::Scrolling, buffer.origin()),
        buffer,
    };

    let dependencies = CaptureDependencies::from_config(&config.capture);
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let delivery = runtime.block_on(dependencies.sink.deliver(
        &result,
        destination,
        Some(&save_config),
    ))?;

    report(&CaptureSummary {
        width: result.buffer.width(),
        height: result.buffer.height(),
        details: result.details,
        delivery,
    });
    Ok(())
}

fn report(summary: &CaptureSummary) {
    println!(
        "Captured {}x{} ({:?})",
        summary.width, summary.height, summary.details.method
    );
    if let Some(path) = &summary.delivery.saved_path {
        println!("Saved to {}", path.display());
    }
    if summary.delivery.copied_to_clipboard {
        println!("Copied to clipboard");
    }
}

fn print_usage() {
    println!("stitchshot: Window and scrolling screenshot tool for Wayland compositors");
    println!();
    println!("Usage:");
    println!("  stitchshot --region \"x,y WxH\"   Capture a region");
    println!("  stitchshot --window [ADDRESS]   Capture a window");
    println!("  stitchshot --fullscreen         Capture every monitor");
    println!("  stitchshot --scroll [ADDRESS]   Scrolling capture of a window");
    println!("  stitchshot --stitch A.png B.png Stitch overlapping pages");
    println!("  stitchshot --help               Show help");
    println!();
    println!("Requirements:");
    println!("  - Wayland compositor (Hyprland or another wlroots compositor)");
    println!("  - grim for screen copies, hyprctl for window queries");
}
