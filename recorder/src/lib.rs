//! `repro-recorder` — network-event recorder for the Resubir re-upload flow.
//!
//! Drives a page through the document re-upload interaction and records the
//! relevant upload-replace exchange (`PUT .../api/.../pdf` by default), any
//! JavaScript dialog, and a full-page screenshot.
//!
//! The browser sits behind [`driver::PageDriver`]; `repro-browser` provides
//! the Chromium implementation.

pub mod artifacts;
pub mod capture;
pub mod config;
pub mod driver;
pub mod error;
pub mod matcher;
pub mod observer;
pub mod session;
pub mod settle;

pub use capture::{CaptureLog, CapturePolicy, CaptureRecord};
pub use config::RecorderConfig;
pub use driver::{PageDriver, PageEvent, Selector};
pub use error::{RecorderError, Result};
pub use session::{ReproSession, RunOutcome, record_failure, resolve_upload_file};
