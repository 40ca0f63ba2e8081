//! Writing captures to disk and loading images for file capture.

use super::buffer::CaptureBuffer;
use super::types::CaptureError;
use crate::config::OutputConfig;
use crate::util::Point;
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct FileSaveConfig {
    pub save_directory: PathBuf,
    /// chrono format string, without extension.
    pub filename_template: String,
    pub format: String,
}

impl Default for FileSaveConfig {
    fn default() -> Self {
        Self {
            save_directory: dirs::picture_dir()
                .unwrap_or_else(|| PathBuf::from("~"))
                .join("Stitchshot"),
            filename_template: "screenshot_%Y-%m-%d_%H%M%S".to_string(),
            format: "png".to_string(),
        }
    }
}

impl FileSaveConfig {
    /// Save settings taken from the `[output]` config section.
    pub fn from_output(output: &OutputConfig) -> Self {
        Self {
            save_directory: output.save_directory_path(),
            filename_template: output.filename_template.clone(),
            format: "png".to_string(),
        }
    }
}

pub fn generate_filename(template: &str, format: &str) -> String {
    let now = Local::now();
    let filename = now.format(template).to_string();
    format!("{}.{}", filename, format)
}

/// Creates `directory` if missing and returns it canonicalized where possible.
pub fn ensure_directory_exists(directory: &Path) -> Result<PathBuf, CaptureError> {
    if !directory.exists() {
        log::info!("Creating screenshot directory: {}", directory.display());
        fs::create_dir_all(directory)?;
    }

    let canonical = directory
        .canonicalize()
        .unwrap_or_else(|_| directory.to_path_buf());

    Ok(canonical)
}

/// Writes encoded image bytes under a timestamped name; the file is private to the user.
pub fn save_screenshot(
    image_data: &[u8],
    config: &FileSaveConfig,
) -> Result<PathBuf, CaptureError> {
    let directory = ensure_directory_exists(&config.save_directory)?;

    let filename = generate_filename(&config.filename_template, &config.format);
    let file_path = directory.join(&filename);

    log::info!(
        "Saving screenshot to: {} ({} bytes)",
        file_path.display(),
        image_data.len()
    );

    fs::write(&file_path, image_data)?;

    let written_size = fs::metadata(&file_path)?.len();
    log::debug!("File written: {} bytes", written_size);

    #[cfg(unix)]
    {
        use std::fs::Permissions;
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&file_path, Permissions::from_mode(0o600))?;
    }

    log::info!("Screenshot saved successfully: {}", file_path.display());

    Ok(file_path)
}

/// Load a PNG from disk as a capture buffer positioned at the desktop origin.
pub fn load_capture_file(path: &Path) -> Result<CaptureBuffer, CaptureError> {
    log::info!("Loading image from {}", path.display());
    let bytes = fs::read(path)?;
    CaptureBuffer::from_png(&bytes, Point::new(0, 0))
        .map_err(|e| CaptureError::ImageError(format!("{}: {}", path.display(), e)))
}

/// Expand tilde (~) in path strings.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(stripped);
    }
    PathBuf::from(path)
}
