//! Network-event recorder.
//!
//! Consumes the driver's `PageEvent` stream for the whole run. Relevant
//! exchanges and dialogs go into the shared `CaptureLog`; every request feeds
//! `NetworkActivity` so the session can wait for the page to settle.

use crate::capture::{CaptureLog, DialogRecord, RequestRecord, ResponseSlot};
use crate::driver::{PageDriver, PageEvent};
use crate::matcher::ExchangeMatcher;
use crate::settle::NetworkActivity;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub struct Observer<D: ?Sized> {
    driver: Arc<D>,
    matcher: ExchangeMatcher,
    log: Arc<Mutex<CaptureLog>>,
    activity: Arc<NetworkActivity>,
    /// request id -> method, for correlating responses
    methods: HashMap<String, String>,
    /// relevant responses still waiting for their body
    pending: HashMap<String, ResponseSlot>,
}

impl<D: PageDriver + ?Sized + 'static> Observer<D> {
    pub fn new(
        driver: Arc<D>,
        matcher: ExchangeMatcher,
        log: Arc<Mutex<CaptureLog>>,
        activity: Arc<NetworkActivity>,
    ) -> Self {
        Self {
            driver,
            matcher,
            log,
            activity,
            methods: HashMap::new(),
            pending: HashMap::new(),
        }
    }

    /// Run until the driver drops its sender or the handle is aborted.
    pub fn spawn(mut self, mut events: mpsc::UnboundedReceiver<PageEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                self.handle(event).await;
            }
            tracing::debug!("page event stream closed");
        })
    }

    pub async fn handle(&mut self, event: PageEvent) {
        match event {
            PageEvent::RequestWillBeSent {
                request_id,
                url,
                method,
                headers,
            } => {
                self.activity.request_started(&request_id);
                if self.matcher.matches(&url, &method) {
                    tracing::info!(%method, %url, "relevant request");
                    self.log().push_request(RequestRecord {
                        method: method.clone(),
                        url,
                        headers,
                    });
                }
                self.methods.insert(request_id, method);
            }
            PageEvent::ResponseReceived {
                request_id,
                url,
                status,
            } => {
                let relevant = self
                    .methods
                    .get(&request_id)
                    .is_some_and(|method| self.matcher.matches(&url, method));
                if relevant {
                    tracing::info!(status, %url, "relevant response");
                    let slot = self.log().push_response(status, url);
                    self.pending.insert(request_id, slot);
                }
            }
            PageEvent::LoadingFinished { request_id } => {
                if let Some(slot) = self.pending.remove(&request_id) {
                    match self.driver.response_body(&request_id).await {
                        Ok(body) => self.log().set_response_body(slot, body),
                        Err(err) => {
                            tracing::debug!(%request_id, error = %err, "response body unavailable; leaving it empty");
                        }
                    }
                }
                self.methods.remove(&request_id);
                self.activity.request_settled(&request_id);
            }
            PageEvent::LoadingFailed {
                request_id,
                error_text,
            } => {
                if self.pending.remove(&request_id).is_some() {
                    tracing::warn!(%request_id, %error_text, "relevant response failed to load");
                }
                self.methods.remove(&request_id);
                self.activity.request_settled(&request_id);
            }
            PageEvent::DialogOpening { kind, message } => {
                tracing::info!(%kind, %message, "accepting dialog");
                self.log().push_dialog(DialogRecord { kind, message });
                if let Err(err) = self.driver.accept_dialog().await {
                    tracing::warn!(error = %err, "failed to accept dialog");
                }
            }
        }
    }

    fn log(&self) -> std::sync::MutexGuard<'_, CaptureLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
