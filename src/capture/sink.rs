//! Default delivery of finished captures: PNG file and/or clipboard.

use std::{io, path::PathBuf, sync::Arc};

use async_trait::async_trait;
use tokio::task;

use crate::capture::{
    dependencies::{CaptureClipboard, CaptureFileSaver, CaptureSink},
    file::FileSaveConfig,
    types::{CaptureDestination, CaptureError, CaptureResult, DeliveryReport},
};

/// Encodes the buffer as PNG, then saves and/or copies it.
///
/// A clipboard failure is tolerated while a file was saved; delivering
/// nothing at all is an error.
pub struct DefaultCaptureSink {
    saver: Arc<dyn CaptureFileSaver>,
    clipboard: Arc<dyn CaptureClipboard>,
}

impl DefaultCaptureSink {
    pub fn new(saver: Arc<dyn CaptureFileSaver>, clipboard: Arc<dyn CaptureClipboard>) -> Self {
        Self { saver, clipboard }
    }
}

#[async_trait]
impl CaptureSink for DefaultCaptureSink {
    async fn deliver(
        &self,
        result: &CaptureResult,
        destination: CaptureDestination,
        save_config: Option<&FileSaveConfig>,
    ) -> Result<DeliveryReport, CaptureError> {
        let image_data = result.buffer.to_png()?;
        log::debug!(
            "Encoded {}x{} capture as {} bytes of PNG",
            result.buffer.width(),
            result.buffer.height(),
            image_data.len()
        );

        let saved_path = match destination {
            CaptureDestination::FileOnly | CaptureDestination::ClipboardAndFile => {
                match save_config {
                    Some(config) if !config.save_directory.as_os_str().is_empty() => Some(
                        save_image(
                            Arc::clone(&self.saver),
                            image_data.clone(),
                            config.clone(),
                        )
                        .await?,
                    ),
                    _ if destination == CaptureDestination::FileOnly => {
                        return Err(CaptureError::SaveError(io::Error::new(
                            io::ErrorKind::InvalidInput,
                            "no save directory configured",
                        )));
                    }
                    _ => {
                        log::warn!("File output requested without a save directory");
                        None
                    }
                }
            }
            CaptureDestination::ClipboardOnly => None,
        };

        let copied_to_clipboard = match destination {
            CaptureDestination::ClipboardOnly | CaptureDestination::ClipboardAndFile => {
                log::info!("Attempting to copy {} bytes to clipboard", image_data.len());
                copy_to_clipboard(Arc::clone(&self.clipboard), image_data).await
            }
            CaptureDestination::FileOnly => {
                log::debug!("Clipboard copy not requested for this capture");
                false
            }
        };

        if saved_path.is_none() && !copied_to_clipboard {
            return Err(CaptureError::ClipboardError(
                "capture was not delivered: copying to the clipboard failed".into(),
            ));
        }

        Ok(DeliveryReport {
            saved_path,
            copied_to_clipboard,
        })
    }
}

async fn save_image(
    saver: Arc<dyn CaptureFileSaver>,
    image_data: Vec<u8>,
    config: FileSaveConfig,
) -> Result<PathBuf, CaptureError> {
    task::spawn_blocking(move || saver.save(&image_data, &config))
        .await
        .map_err(|e| CaptureError::ImageError(format!("Save task failed: {}", e)))?
}

async fn copy_to_clipboard(clipboard: Arc<dyn CaptureClipboard>, image_data: Vec<u8>) -> bool {
    match task::spawn_blocking(move || clipboard.copy(&image_data))
        .await
        .map_err(|e| CaptureError::ClipboardError(format!("Clipboard task failed: {}", e)))
    {
        Ok(Ok(())) => {
            log::info!("Successfully copied to clipboard");
            true
        }
        Ok(Err(e)) | Err(e) => {
            log::error!("Failed to copy to clipboard: {}", e);
            false
        }
    }
}
