//! One reproduction run: acquire, observe, interact, record.
//!
//! ## Sequence
//!
//! 1. Resolve the upload file (absolute path, must exist)
//! 2. Subscribe to page events before navigating
//! 3. Navigate, then wait for the network to go idle
//! 4. Click the re-upload trigger
//! 5. Attach the upload file to the file input
//! 6. Click the save control when one is present
//! 7. Wait for the network to go idle again
//! 8. Screenshot + capture record
//! 9. Close the browser
//!
//! Steps 8 and 9 also run after a failure or cancellation, so the record
//! always carries what was captured up to that point together with the error.

use crate::artifacts::{write_record, write_screenshot};
use crate::capture::{CaptureLog, CaptureRecord};
use crate::config::RecorderConfig;
use crate::driver::PageDriver;
use crate::error::{RecorderError, Result};
use crate::observer::Observer;
use crate::settle::{NetworkActivity, wait_for_idle, wait_for_selector};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Artifacts of a successful run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub record: CaptureRecord,
    pub record_path: PathBuf,
    pub screenshot_path: PathBuf,
}

/// Absolute path of the file to attach; errors when it does not exist.
pub fn resolve_upload_file(config: &RecorderConfig) -> Result<PathBuf> {
    let missing = || RecorderError::UploadFileMissing {
        path: config.upload_file.clone(),
    };
    let path = std::fs::canonicalize(&config.upload_file).map_err(|_| missing())?;
    if !path.is_file() {
        return Err(missing());
    }
    Ok(path)
}

/// Write a record carrying only `err`, for failures before a session exists
/// (e.g. the browser never launched).
pub fn record_failure(config: &RecorderConfig, err: &RecorderError) -> Result<()> {
    let mut record = CaptureLog::new().record(config.capture_policy, &config.target_url);
    record.error = Some(err.to_string());
    write_record(&config.output.record, &record)
}

pub struct ReproSession<D: ?Sized> {
    driver: Arc<D>,
    config: RecorderConfig,
    cancel: CancellationToken,
}

impl<D: PageDriver + ?Sized + 'static> ReproSession<D> {
    pub fn new(driver: Arc<D>, config: RecorderConfig) -> Self {
        Self {
            driver,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop interacting once `cancel` fires; the screenshot, record and
    /// browser close still happen.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// Run the sequence to completion and close the browser.
    ///
    /// The record file is written on success and on failure; the returned
    /// error is the first one the sequence hit.
    pub async fn run(&self) -> Result<RunOutcome> {
        let log = Arc::new(Mutex::new(CaptureLog::new()));
        let activity = Arc::new(NetworkActivity::new());
        let mut observer = None;

        let interaction = tokio::select! {
            driven = self.drive(&log, &activity, &mut observer) => driven,
            _ = self.cancel.cancelled() => Err(RecorderError::Cancelled),
        };
        if let Err(err) = &interaction {
            tracing::error!(code = err.code(), error = %err, "reproduction step failed");
        }

        let screenshot = self.capture_screenshot().await;
        if let Some(handle) = observer {
            handle.abort();
        }

        let mut record = log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(self.config.capture_policy, &self.config.target_url);

        let result = match (interaction, screenshot) {
            (Ok(()), shot) => shot,
            (Err(err), shot) => {
                if let Err(shot_err) = shot {
                    tracing::warn!(error = %shot_err, "screenshot after failure not captured");
                }
                Err(err)
            }
        };
        if let Err(err) = &result {
            record.error = Some(err.to_string());
        }

        let record_path = self.config.output.record.clone();
        let written = write_record(&record_path, &record);
        match &written {
            Ok(()) => tracing::info!(
                path = %record_path.display(),
                matched_requests = record.matched_requests,
                matched_responses = record.matched_responses,
                "capture record written"
            ),
            Err(err) => tracing::error!(error = %err, "capture record not written"),
        }

        if let Err(err) = self.driver.close().await {
            tracing::warn!(error = %err, "browser did not close cleanly");
        }

        let screenshot_path = result?;
        written?;
        Ok(RunOutcome {
            record,
            record_path,
            screenshot_path,
        })
    }

    async fn drive(
        &self,
        log: &Arc<Mutex<CaptureLog>>,
        activity: &Arc<NetworkActivity>,
        observer: &mut Option<JoinHandle<()>>,
    ) -> Result<()> {
        let upload = resolve_upload_file(&self.config)?;

        let events = self.driver.subscribe().await?;
        *observer = Some(
            Observer::new(
                Arc::clone(&self.driver),
                self.config.matcher(),
                Arc::clone(log),
                Arc::clone(activity),
            )
            .spawn(events),
        );

        self.interact(&upload, activity).await
    }

    async fn interact(&self, upload: &Path, activity: &NetworkActivity) -> Result<()> {
        let timeouts = &self.config.timeouts;
        let url = &self.config.target_url;

        tracing::info!(%url, "navigating");
        match tokio::time::timeout(timeouts.navigation(), self.driver.navigate(url)).await {
            Ok(navigated) => navigated?,
            Err(_) => {
                return Err(RecorderError::Timeout {
                    waiting_for: format!("navigation to {url}"),
                    after: timeouts.navigation(),
                    detail: "page never finished loading".to_string(),
                });
            }
        }
        wait_for_idle(activity, timeouts.settle_idle(), timeouts.settle_timeout()).await?;

        let trigger = self.config.trigger();
        wait_for_selector(&*self.driver, &trigger, timeouts.selector()).await?;
        tracing::info!(selector = %trigger, "clicking re-upload trigger");
        self.driver.click(&trigger).await?;

        let input = self.config.file_input();
        wait_for_selector(&*self.driver, &input, timeouts.selector()).await?;
        tracing::info!(file = %upload.display(), "attaching upload file");
        self.driver
            .set_input_files(&input, &[upload.to_path_buf()])
            .await?;

        if let Some(save) = self.config.save() {
            if self.driver.exists(&save).await? {
                tracing::info!(selector = %save, "clicking save");
                self.driver.click(&save).await?;
            } else {
                tracing::debug!(selector = %save, "no save control on page");
            }
        }

        wait_for_idle(activity, timeouts.settle_idle(), timeouts.settle_timeout()).await
    }

    async fn capture_screenshot(&self) -> Result<PathBuf> {
        let path = self.config.output.screenshot.clone();
        let png = self.driver.screenshot_full_page().await?;
        write_screenshot(&path, &png)?;
        tracing::info!(path = %path.display(), "screenshot written");
        Ok(path)
    }
}
