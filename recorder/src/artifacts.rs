//! Screenshot and capture-record files.
//!
//! Both are written with the temp-file + fsync + rename pattern so a crashed
//! run never leaves a half-written artifact behind. Existing files are
//! replaced, never appended to.

use crate::capture::CaptureRecord;
use crate::error::{RecorderError, Result};
use std::io::Write;
use std::path::Path;

pub fn write_record(path: &Path, record: &CaptureRecord) -> Result<()> {
    let mut json = serde_json::to_string_pretty(record)?;
    json.push('\n');
    write_atomic(path, json.as_bytes())
}

pub fn write_screenshot(path: &Path, png: &[u8]) -> Result<()> {
    write_atomic(path, png)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let io_err = |source: std::io::Error| RecorderError::Artifact {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(io_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(bytes).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;

    tracing::debug!(path = %path.display(), bytes = bytes.len(), "artifact written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CaptureLog, CapturePolicy};

    #[test]
    fn record_is_pretty_json_and_replaces_previous_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("record.json");

        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(&path, "stale contents").expect("seed");

        let record = CaptureLog::new().record(CapturePolicy::Last, "http://localhost/app#list");
        write_record(&path, &record).expect("write");

        let text = std::fs::read_to_string(&path).expect("read");
        assert!(text.starts_with("{\n"));
        let parsed: CaptureRecord = serde_json::from_str(&text).expect("parse");
        assert_eq!(parsed, record);
    }

    #[test]
    fn screenshot_creates_missing_parent_dirs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("a").join("b").join("shot.png");
        write_screenshot(&path, b"\x89PNG").expect("write");
        assert_eq!(std::fs::read(&path).expect("read"), b"\x89PNG");
    }
}
