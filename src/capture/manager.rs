use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, oneshot};

use crate::capture::{
    dependencies::CaptureDependencies,
    file::FileSaveConfig,
    pipeline::{CapturePipeline, CaptureRequest, CaptureSettings},
    scroll::CancellationToken,
    types::{CaptureDestination, CaptureError, CaptureOutcome, CaptureStatus, CaptureType},
};
use crate::config::Config;

/// Runs capture requests one at a time on a background task.
#[derive(Clone)]
pub struct CaptureManager {
    /// Channel for sending capture requests.
    request_tx: mpsc::UnboundedSender<CaptureRequest>,
    /// Shared status of the current capture operation.
    status: Arc<Mutex<CaptureStatus>>,
    /// Shared result of the last capture (if any).
    last_result: Arc<Mutex<Option<CaptureOutcome>>>,
    cancel: CancellationToken,
}

impl CaptureManager {
    /// Create a capture manager using the platform adapters for `config`.
    pub fn new(runtime_handle: &tokio::runtime::Handle, config: &Config) -> Self {
        Self::with_dependencies(
            runtime_handle,
            CaptureDependencies::from_config(&config.capture),
            CaptureSettings::from(config),
        )
    }

    /// Create a capture manager with custom dependencies (useful for testing).
    pub fn with_dependencies(
        runtime_handle: &tokio::runtime::Handle,
        dependencies: CaptureDependencies,
        settings: CaptureSettings,
    ) -> Self {
        let (request_tx, mut request_rx) = mpsc::unbounded_channel::<CaptureRequest>();
        let status = Arc::new(Mutex::new(CaptureStatus::Idle));
        let last_result = Arc::new(Mutex::new(None));
        let pipeline = Arc::new(CapturePipeline::new(dependencies, settings));
        let cancel = pipeline.cancel_token();

        let status_clone = status.clone();
        let result_clone = last_result.clone();

        runtime_handle.spawn(async move {
            while let Some(mut request) = request_rx.recv().await {
                log::debug!("Processing capture request: {:?}", request);

                *status_clone.lock().await = CaptureStatus::InProgress;

                let outcome = match pipeline.run(&request).await {
                    Ok(summary) => {
                        log::info!(
                            "Capture successful: {}x{} saved to {:?}",
                            summary.width,
                            summary.height,
                            summary.delivery.saved_path
                        );
                        *status_clone.lock().await = CaptureStatus::Success;
                        CaptureOutcome::Success(summary)
                    }
                    Err(CaptureError::Cancelled(reason)) => {
                        log::info!("Capture cancelled: {}", reason);
                        *status_clone.lock().await = CaptureStatus::Cancelled(reason.clone());
                        CaptureOutcome::Cancelled(reason)
                    }
                    Err(e) => {
                        let error_message = e.to_string();
                        log::error!("Capture failed: {}", error_message);
                        *status_clone.lock().await = CaptureStatus::Failed(error_message.clone());
                        CaptureOutcome::Failed(error_message)
                    }
                };

                *result_clone.lock().await = Some(outcome.clone());
                if let Some(reply) = request.reply.take()
                    && reply.send(outcome).is_err()
                {
                    log::debug!("Capture requester went away before the outcome arrived");
                }
            }
        });

        Self {
            request_tx,
            status,
            last_result,
            cancel,
        }
    }

    /// Request a screenshot capture.
    ///
    /// This is non-blocking and returns immediately. The capture happens
    /// asynchronously in the background.
    pub fn request_capture(
        &self,
        capture_type: CaptureType,
        destination: CaptureDestination,
        save_config: Option<FileSaveConfig>,
    ) -> Result<(), CaptureError> {
        self.send(CaptureRequest {
            capture_type,
            destination,
            save_config,
            reply: None,
        })
    }

    /// Request a capture and wait for its outcome.
    pub async fn capture(
        &self,
        capture_type: CaptureType,
        destination: CaptureDestination,
        save_config: Option<FileSaveConfig>,
    ) -> Result<CaptureOutcome, CaptureError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(CaptureRequest {
            capture_type,
            destination,
            save_config,
            reply: Some(reply_tx),
        })?;

        reply_rx
            .await
            .map_err(|_| CaptureError::ImageError("Capture manager stopped".to_string()))
    }

    fn send(&self, request: CaptureRequest) -> Result<(), CaptureError> {
        self.request_tx
            .send(request)
            .map_err(|_| CaptureError::ImageError("Capture manager not running".to_string()))
    }

    /// Token that cancels a running scrolling capture.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Get the current capture status.
    pub async fn get_status(&self) -> CaptureStatus {
        self.status.lock().await.clone()
    }

    /// Get the result of the last capture and clear it.
    pub async fn take_result(&self) -> Option<CaptureOutcome> {
        self.last_result.lock().await.take()
    }

    /// Try to get the result without waiting (non-blocking).
    pub fn try_take_result(&self) -> Option<CaptureOutcome> {
        self.last_result.try_lock().ok().and_then(|mut r| r.take())
    }

    /// Reset status to idle.
    pub async fn reset(&self) {
        *self.status.lock().await = CaptureStatus::Idle;
    }
}

#[cfg(test)]
impl CaptureManager {
    pub(crate) fn with_closed_channel_for_test() -> Self {
        let (tx, rx) = mpsc::unbounded_channel::<CaptureRequest>();
        drop(rx);
        Self {
            request_tx: tx,
            status: Arc::new(Mutex::new(CaptureStatus::Idle)),
            last_result: Arc::new(Mutex::new(None)),
            cancel: CancellationToken::new(),
        }
    }
}
