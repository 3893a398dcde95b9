//! Recorder configuration loading
//!
//! Loads configuration from `./resubir-repro.toml` (or `RESUBIR_REPRO_CONFIG` env).
//! Every field has a default, so running without a config file reproduces the
//! fixed behaviour of the original argument-less script.

use crate::capture::CapturePolicy;
use crate::driver::Selector;
use crate::error::{RecorderError, Result};
use crate::matcher::ExchangeMatcher;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration for a reproduction run
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RecorderConfig {
    /// Page that lists the documents
    #[serde(default = "default_target_url")]
    pub target_url: String,

    /// Local file attached to the file input
    #[serde(default = "default_upload_file")]
    pub upload_file: PathBuf,

    /// Control that opens the re-upload flow
    #[serde(default = "default_trigger_selector")]
    pub trigger_selector: String,

    /// File input that receives the upload
    #[serde(default = "default_file_input_selector")]
    pub file_input_selector: String,

    /// Optional save control; empty disables the save step
    #[serde(default = "default_save_selector")]
    pub save_selector: String,

    /// Which relevant exchange survives when several are observed
    #[serde(default)]
    pub capture_policy: CapturePolicy,

    /// Relevant exchange predicate
    #[serde(default)]
    pub exchange: ExchangeConfig,

    /// Artifact paths
    #[serde(default)]
    pub output: OutputConfig,

    /// Bounded waits
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Browser launch settings
    #[serde(default)]
    pub browser: BrowserConfig,
}

fn default_target_url() -> String {
    "http://localhost/app#list".to_string()
}

fn default_upload_file() -> PathBuf {
    PathBuf::from("sample.pdf")
}

fn default_trigger_selector() -> String {
    "text=Resubir".to_string()
}

fn default_file_input_selector() -> String {
    "input[type=file]".to_string()
}

fn default_save_selector() -> String {
    "text=Guardar".to_string()
}

/// URL-pattern-and-method predicate for the upload-replace endpoint
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExchangeConfig {
    #[serde(default = "default_path_fragment")]
    pub path_fragment: String,

    #[serde(default = "default_path_suffix")]
    pub path_suffix: String,

    #[serde(default = "default_method")]
    pub method: String,
}

fn default_path_fragment() -> String {
    "/api/".to_string()
}

fn default_path_suffix() -> String {
    "/pdf".to_string()
}

fn default_method() -> String {
    "PUT".to_string()
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            path_fragment: default_path_fragment(),
            path_suffix: default_path_suffix(),
            method: default_method(),
        }
    }
}

/// Where the screenshot and capture record are written
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_screenshot_path")]
    pub screenshot: PathBuf,

    #[serde(default = "default_record_path")]
    pub record: PathBuf,
}

fn default_screenshot_path() -> PathBuf {
    PathBuf::from("repro_resubir.png")
}

fn default_record_path() -> PathBuf {
    PathBuf::from("repro_resubir.json")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            screenshot: default_screenshot_path(),
            record: default_record_path(),
        }
    }
}

/// Timeouts in milliseconds
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TimeoutConfig {
    #[serde(default = "default_navigation_ms")]
    pub navigation_ms: u64,

    #[serde(default = "default_selector_ms")]
    pub selector_ms: u64,

    /// Quiet period with no request in flight that counts as settled
    #[serde(default = "default_settle_idle_ms")]
    pub settle_idle_ms: u64,

    #[serde(default = "default_settle_timeout_ms")]
    pub settle_timeout_ms: u64,
}

fn default_navigation_ms() -> u64 {
    30_000
}
fn default_selector_ms() -> u64 {
    10_000
}
fn default_settle_idle_ms() -> u64 {
    500
}
fn default_settle_timeout_ms() -> u64 {
    15_000
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            navigation_ms: default_navigation_ms(),
            selector_ms: default_selector_ms(),
            settle_idle_ms: default_settle_idle_ms(),
            settle_timeout_ms: default_settle_timeout_ms(),
        }
    }
}

impl TimeoutConfig {
    pub fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }

    pub fn selector(&self) -> Duration {
        Duration::from_millis(self.selector_ms)
    }

    pub fn settle_idle(&self) -> Duration {
        Duration::from_millis(self.settle_idle_ms)
    }

    pub fn settle_timeout(&self) -> Duration {
        Duration::from_millis(self.settle_timeout_ms)
    }
}

/// Browser launch settings
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BrowserConfig {
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Chromium binary; auto-detected when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<PathBuf>,

    #[serde(default = "default_window_width")]
    pub window_width: u32,

    #[serde(default = "default_window_height")]
    pub window_height: u32,
}

fn default_headless() -> bool {
    true
}
fn default_window_width() -> u32 {
    1280
}
fn default_window_height() -> u32 {
    900
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            executable: None,
            window_width: default_window_width(),
            window_height: default_window_height(),
        }
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            target_url: default_target_url(),
            upload_file: default_upload_file(),
            trigger_selector: default_trigger_selector(),
            file_input_selector: default_file_input_selector(),
            save_selector: default_save_selector(),
            capture_policy: CapturePolicy::default(),
            exchange: ExchangeConfig::default(),
            output: OutputConfig::default(),
            timeouts: TimeoutConfig::default(),
            browser: BrowserConfig::default(),
        }
    }
}

impl RecorderConfig {
    /// Environment variable for config path override
    pub const ENV_CONFIG_PATH: &'static str = "RESUBIR_REPRO_CONFIG";

    /// Default config filename, looked up in the working directory
    pub const DEFAULT_CONFIG_FILENAME: &'static str = "resubir-repro.toml";

    /// Load configuration from file
    ///
    /// Resolution order:
    /// 1. `RESUBIR_REPRO_CONFIG` environment variable
    /// 2. `./resubir-repro.toml`
    ///
    /// If the config file doesn't exist, returns default configuration.
    pub fn load() -> Result<Self> {
        let path = Self::resolve_config_path();

        if !path.exists() {
            tracing::info!(
                path = %path.display(),
                "Recorder config not found, using defaults"
            );
            return Ok(Self::default());
        }

        Self::load_from_path(&path)
    }

    /// Load configuration from an explicit path; a missing file is an error.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            RecorderError::config_with_source(
                format!("failed to read config at {}", path.display()),
                e,
            )
        })?;

        Self::parse(&contents)
    }

    /// Parse configuration from TOML string
    pub fn parse(contents: &str) -> Result<Self> {
        let cfg: RecorderConfig = toml::from_str(contents)
            .map_err(|e| RecorderError::config_with_source("failed to parse config", e))?;

        cfg.validate()?;
        Ok(cfg)
    }

    fn resolve_config_path() -> PathBuf {
        if let Ok(path) = std::env::var(Self::ENV_CONFIG_PATH) {
            return PathBuf::from(path);
        }
        PathBuf::from(Self::DEFAULT_CONFIG_FILENAME)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.target_url).map_err(|e| {
            RecorderError::config_with_source(format!("invalid target_url `{}`", self.target_url), e)
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(RecorderError::config(format!(
                "target_url must be http(s), got `{}`",
                url.scheme()
            )));
        }

        if self.exchange.method.trim().is_empty() {
            return Err(RecorderError::config("exchange.method must not be empty"));
        }
        if self.exchange.path_fragment.is_empty() && self.exchange.path_suffix.is_empty() {
            tracing::warn!("exchange predicate has no path constraints; every matching method is relevant");
        }

        if self.trigger_selector.trim().is_empty() {
            return Err(RecorderError::config("trigger_selector must not be empty"));
        }
        if self.file_input_selector.trim().is_empty() {
            return Err(RecorderError::config("file_input_selector must not be empty"));
        }

        let t = &self.timeouts;
        if t.navigation_ms == 0 || t.selector_ms == 0 || t.settle_idle_ms == 0 || t.settle_timeout_ms == 0 {
            return Err(RecorderError::config("timeouts must be non-zero"));
        }
        if t.settle_idle_ms >= t.settle_timeout_ms {
            return Err(RecorderError::config(format!(
                "timeouts.settle_idle_ms ({}) must be shorter than timeouts.settle_timeout_ms ({})",
                t.settle_idle_ms, t.settle_timeout_ms
            )));
        }

        Ok(())
    }

    pub fn matcher(&self) -> ExchangeMatcher {
        ExchangeMatcher::new(
            &self.exchange.path_fragment,
            &self.exchange.path_suffix,
            &self.exchange.method,
        )
    }

    pub fn trigger(&self) -> Selector {
        Selector::parse(&self.trigger_selector)
    }

    pub fn file_input(&self) -> Selector {
        Selector::parse(&self.file_input_selector)
    }

    /// `None` when the save step is disabled.
    pub fn save(&self) -> Option<Selector> {
        if self.save_selector.trim().is_empty() {
            None
        } else {
            Some(Selector::parse(&self.save_selector))
        }
    }
}
