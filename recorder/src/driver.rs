//! Page driver seam.
//!
//! `PageDriver` is the narrow surface the session needs from a browser. The
//! Chromium implementation lives in `repro-browser`; tests drive the session
//! with a scripted fake.

use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Element selector in the `text=<label>` / CSS convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Element whose own text contains the label
    Text(String),
    Css(String),
}

impl Selector {
    const TEXT_PREFIX: &'static str = "text=";

    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.strip_prefix(Self::TEXT_PREFIX) {
            Some(label) => Self::Text(label.trim_matches('"').to_string()),
            None => Self::Css(raw.to_string()),
        }
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(label) => write!(f, "text={label}"),
            Self::Css(css) => f.write_str(css),
        }
    }
}

/// Browser events the observer consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    RequestWillBeSent {
        request_id: String,
        url: String,
        method: String,
        headers: BTreeMap<String, String>,
    },
    ResponseReceived {
        request_id: String,
        url: String,
        status: u16,
    },
    LoadingFinished {
        request_id: String,
    },
    LoadingFailed {
        request_id: String,
        error_text: String,
    },
    DialogOpening {
        kind: String,
        message: String,
    },
}

#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Start forwarding page events. Called once, before navigation.
    async fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<PageEvent>>;

    /// Navigate and wait for the load event.
    async fn navigate(&self, url: &str) -> Result<()>;

    async fn exists(&self, selector: &Selector) -> Result<bool>;

    async fn click(&self, selector: &Selector) -> Result<()>;

    /// Attach files to a file input. Paths are absolute.
    async fn set_input_files(&self, selector: &Selector, files: &[PathBuf]) -> Result<()>;

    /// Accept the currently open JavaScript dialog.
    async fn accept_dialog(&self) -> Result<()>;

    /// Body text of a finished response.
    async fn response_body(&self, request_id: &str) -> Result<String>;

    /// Full-page PNG.
    async fn screenshot_full_page(&self) -> Result<Vec<u8>>;

    async fn close(&self) -> Result<()>;
}
