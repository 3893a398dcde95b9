//! Chromium-backed `PageDriver`.
//!
//! One browser, one page. CDP events are forwarded in a single task so the
//! observer sees a request before its response and its response before the
//! loading-finished event.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use base64::Engine as _;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig as CdpBrowserConfig};
use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
use chromiumoxide::cdp::browser_protocol::network::{
    self, EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
    EventResponseReceived, GetResponseBodyParams, Headers, RequestId,
};
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, DialogType, EventJavascriptDialogOpening,
    HandleJavaScriptDialogParams,
};
use chromiumoxide::element::Element;
use chromiumoxide::page::ScreenshotParams;
use futures::StreamExt;
use repro_recorder::config::BrowserConfig;
use repro_recorder::{PageDriver, PageEvent, RecorderError, Result, Selector};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use crate::selector::text_xpath;

pub struct ChromeDriver {
    browser: Mutex<Browser>,
    page: Page,
    handler_task: JoinHandle<()>,
    forwarder: Mutex<Option<JoinHandle<()>>>,
}

impl ChromeDriver {
    /// Launch Chromium and open a blank page.
    pub async fn launch(options: &BrowserConfig) -> Result<Self> {
        let mut builder =
            CdpBrowserConfig::builder().window_size(options.window_width, options.window_height);
        if !options.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &options.executable {
            builder = builder.chrome_executable(executable);
        }
        let config = builder
            .build()
            .map_err(|e| RecorderError::driver("launch", e))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| RecorderError::driver("launch", e))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    tracing::debug!(error = %err, "CDP handler error");
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| RecorderError::driver("open page", e))?;

        tracing::info!(headless = options.headless, "browser launched");
        Ok(Self {
            browser: Mutex::new(browser),
            page,
            handler_task,
            forwarder: Mutex::new(None),
        })
    }

    async fn find_all(&self, selector: &Selector) -> Result<Vec<Element>> {
        let found = match selector {
            Selector::Css(css) => self.page.find_elements(css.as_str()).await,
            Selector::Text(label) => self.page.find_xpaths(text_xpath(label)).await,
        };
        found.map_err(|e| RecorderError::driver("query selector", e))
    }

    /// Text selectors name visible controls, so they only resolve to rendered
    /// elements. CSS selectors may target hidden nodes such as a styled-away
    /// file input.
    async fn find_matches(&self, selector: &Selector) -> Result<Vec<Element>> {
        let found = self.find_all(selector).await?;
        match selector {
            Selector::Css(_) => Ok(found),
            Selector::Text(_) => Ok(rendered(found).await),
        }
    }

    async fn find_one(&self, selector: &Selector) -> Result<Element> {
        self.find_matches(selector)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| not_found(selector))
    }

    /// First match that can receive a click.
    async fn find_clickable(&self, selector: &Selector) -> Result<Element> {
        rendered(self.find_all(selector).await?)
            .await
            .into_iter()
            .next()
            .ok_or_else(|| not_found(selector))
    }
}

fn not_found(selector: &Selector) -> RecorderError {
    RecorderError::SelectorNotFound {
        selector: selector.to_string(),
    }
}

/// Keep elements with a non-empty box model, in document order.
async fn rendered(elements: Vec<Element>) -> Vec<Element> {
    let mut visible = Vec::with_capacity(elements.len());
    for element in elements {
        match element.bounding_box().await {
            Ok(bbox) if has_area(bbox.width, bbox.height) => visible.push(element),
            Ok(_) => {}
            Err(err) => tracing::trace!(error = %err, "skipping element without layout"),
        }
    }
    visible
}

/// CDP wire name of the dialog type (`alert`, `confirm`, ...).
fn dialog_kind(kind: &DialogType) -> String {
    let name: &str = kind.as_ref();
    name.to_string()
}

fn has_area(width: f64, height: f64) -> bool {
    width > 0.0 && height > 0.0
}

#[async_trait]
impl PageDriver for ChromeDriver {
    async fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<PageEvent>> {
        let listen = |e| RecorderError::driver("subscribe", e);

        self.page
            .execute(network::EnableParams::default())
            .await
            .map_err(listen)?;

        let mut dialogs = self
            .page
            .event_listener::<EventJavascriptDialogOpening>()
            .await
            .map_err(listen)?;
        let mut requests = self
            .page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(listen)?;
        let mut responses = self
            .page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(listen)?;
        let mut finished = self
            .page
            .event_listener::<EventLoadingFinished>()
            .await
            .map_err(listen)?;
        let mut failed = self
            .page
            .event_listener::<EventLoadingFailed>()
            .await
            .map_err(listen)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(async move {
            loop {
                // Biased so that, among buffered events, earlier lifecycle
                // stages of a request are always forwarded first.
                let event = tokio::select! {
                    biased;
                    Some(ev) = dialogs.next() => PageEvent::DialogOpening {
                        kind: dialog_kind(&ev.r#type),
                        message: ev.message.clone(),
                    },
                    Some(ev) = requests.next() => PageEvent::RequestWillBeSent {
                        request_id: ev.request_id.inner().clone(),
                        url: ev.request.url.clone(),
                        method: ev.request.method.clone(),
                        headers: header_map(&ev.request.headers),
                    },
                    Some(ev) = responses.next() => PageEvent::ResponseReceived {
                        request_id: ev.request_id.inner().clone(),
                        url: ev.response.url.clone(),
                        status: u16::try_from(ev.response.status).unwrap_or_default(),
                    },
                    Some(ev) = finished.next() => PageEvent::LoadingFinished {
                        request_id: ev.request_id.inner().clone(),
                    },
                    Some(ev) = failed.next() => PageEvent::LoadingFailed {
                        request_id: ev.request_id.inner().clone(),
                        error_text: ev.error_text.clone(),
                    },
                    else => break,
                };
                if tx.send(event).is_err() {
                    break;
                }
            }
            tracing::debug!("CDP event forwarding stopped");
        });

        if let Some(previous) = self.forwarder.lock().await.replace(task) {
            previous.abort();
        }
        Ok(rx)
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| RecorderError::driver("navigate", e))?;
        Ok(())
    }

    async fn exists(&self, selector: &Selector) -> Result<bool> {
        Ok(!self.find_matches(selector).await?.is_empty())
    }

    async fn click(&self, selector: &Selector) -> Result<()> {
        self.find_clickable(selector)
            .await?
            .click()
            .await
            .map_err(|e| RecorderError::driver("click", e))?;
        Ok(())
    }

    async fn set_input_files(&self, selector: &Selector, files: &[PathBuf]) -> Result<()> {
        let element = self.find_one(selector).await?;
        let params = SetFileInputFilesParams::builder()
            .files(files.iter().map(|path| path.to_string_lossy().into_owned()))
            .backend_node_id(element.backend_node_id)
            .build()
            .map_err(|e| RecorderError::driver("set input files", e))?;
        self.page
            .execute(params)
            .await
            .map_err(|e| RecorderError::driver("set input files", e))?;
        Ok(())
    }

    async fn accept_dialog(&self) -> Result<()> {
        self.page
            .execute(HandleJavaScriptDialogParams::new(true))
            .await
            .map_err(|e| RecorderError::driver("accept dialog", e))?;
        Ok(())
    }

    async fn response_body(&self, request_id: &str) -> Result<String> {
        let resp = self
            .page
            .execute(GetResponseBodyParams::new(RequestId::new(request_id)))
            .await
            .map_err(|e| RecorderError::driver("response body", e))?;
        decode_body(&resp.result.body, resp.result.base64_encoded)
    }

    async fn screenshot_full_page(&self) -> Result<Vec<u8>> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();
        self.page
            .screenshot(params)
            .await
            .map_err(|e| RecorderError::driver("screenshot", e))
    }

    async fn close(&self) -> Result<()> {
        if let Some(task) = self.forwarder.lock().await.take() {
            task.abort();
        }

        let mut browser = self.browser.lock().await;
        let closed = browser.close().await;
        if let Err(err) = &closed {
            tracing::warn!(error = %err, "Browser.close failed; waiting on the process anyway");
        }
        if let Err(err) = browser.wait().await {
            tracing::debug!(error = %err, "browser process wait failed");
        }
        self.handler_task.abort();

        closed.map_err(|e| RecorderError::driver("close", e))?;
        tracing::info!("browser closed");
        Ok(())
    }
}

fn header_map(headers: &Headers) -> BTreeMap<String, String> {
    headers
        .inner()
        .as_object()
        .map(|object| {
            object
                .iter()
                .map(|(name, value)| {
                    let value = match value {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (name.clone(), value)
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Response body as text; binary bodies are an error.
fn decode_body(body: &str, base64_encoded: bool) -> Result<String> {
    if !base64_encoded {
        return Ok(body.to_string());
    }
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(body)
        .map_err(|e| RecorderError::driver("response body", e))?;
    String::from_utf8(bytes).map_err(|e| RecorderError::driver("response body", e))
}
