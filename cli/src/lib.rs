//! `resubir-repro` command line.
//!
//! With no arguments the tool runs the re-upload reproduction with the
//! defaults (or `./resubir-repro.toml` / `RESUBIR_REPRO_CONFIG` when present).
//! Flags override individual config values.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use repro_browser::ChromeDriver;
use repro_recorder::{
    RecorderConfig, RecorderError, ReproSession, record_failure, resolve_upload_file,
};
use tokio_util::sync::CancellationToken;

/// Reproduce the Resubir re-upload flow and record the upload-replace exchange
#[derive(Debug, Parser)]
#[command(name = "resubir-repro", version)]
pub struct ReproCli {
    /// TOML config file (default: ./resubir-repro.toml or $RESUBIR_REPRO_CONFIG)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Page that lists the documents
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,

    /// File attached to the re-upload input
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Where the full-page screenshot is written
    #[arg(long, value_name = "PATH")]
    pub screenshot: Option<PathBuf>,

    /// Where the capture record JSON is written
    #[arg(long, value_name = "PATH")]
    pub record: Option<PathBuf>,

    /// Show the browser window
    #[arg(long)]
    pub headful: bool,

    /// Print the resolved configuration as JSON and exit
    #[arg(long)]
    pub print_config: bool,
}

impl ReproCli {
    /// Config file (explicit or discovered) with flag overrides applied.
    pub fn resolve_config(&self) -> repro_recorder::Result<RecorderConfig> {
        let mut cfg = match &self.config {
            Some(path) => RecorderConfig::load_from_path(path)?,
            None => RecorderConfig::load()?,
        };

        if let Some(url) = &self.url {
            cfg.target_url = url.clone();
        }
        if let Some(file) = &self.file {
            cfg.upload_file = file.clone();
        }
        if let Some(screenshot) = &self.screenshot {
            cfg.output.screenshot = screenshot.clone();
        }
        if let Some(record) = &self.record {
            cfg.output.record = record.clone();
        }
        if self.headful {
            cfg.browser.headless = false;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Run the reproduction. Cancelling `cancel` cuts the interaction short;
    /// the screenshot and record are still written and the browser closed.
    pub async fn run(self, cancel: CancellationToken) -> anyhow::Result<()> {
        let config = self.resolve_config()?;

        if self.print_config {
            println!("{}", serde_json::to_string_pretty(&config)?);
            return Ok(());
        }

        // Fail before paying for a browser launch; the record still says why.
        let prepared = match resolve_upload_file(&config) {
            Ok(_) => ChromeDriver::launch(&config.browser).await,
            Err(err) => Err(err),
        };
        let driver = match prepared {
            Ok(driver) => Arc::new(driver),
            Err(err) => {
                if let Err(write_err) = record_failure(&config, &err) {
                    tracing::warn!(error = %write_err, "failure record not written");
                }
                return Err(err.into());
            }
        };

        let outcome = ReproSession::new(driver, config)
            .with_cancellation(cancel)
            .run()
            .await
            .context("reproduction failed")?;

        println!("record: {}", outcome.record_path.display());
        println!("screenshot: {}", outcome.screenshot_path.display());
        match &outcome.record.response {
            Some(response) => println!("response: {} {}", response.status, response.url),
            None => println!("response: none (no relevant exchange observed)"),
        }
        Ok(())
    }
}

/// Whether `err` came from an interrupted run.
pub fn is_cancelled(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<RecorderError>(),
        Some(RecorderError::Cancelled)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("repro.toml");
        std::fs::write(
            &path,
            r#"
                target_url = "http://localhost:8000/app#list"
                [output]
                record = "from-file.json"
            "#,
        )
        .expect("write config");

        let cli = ReproCli::parse_from([
            "resubir-repro",
            "--config",
            path.to_str().expect("utf-8 path"),
            "--record",
            "from-flag.json",
            "--headful",
        ]);
        let cfg = cli.resolve_config().expect("config");

        assert_eq!(cfg.target_url, "http://localhost:8000/app#list");
        assert_eq!(cfg.output.record, PathBuf::from("from-flag.json"));
        assert!(!cfg.browser.headless);
    }

    #[test]
    fn cancellation_is_recognised_through_context() {
        let err = anyhow::Error::from(RecorderError::Cancelled).context("reproduction failed");
        assert!(is_cancelled(&err));
        assert!(!is_cancelled(&anyhow::anyhow!("interrupted")));
    }

    #[test]
    fn invalid_url_flag_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("repro.toml");
        std::fs::write(&path, "").expect("write config");

        let cli = ReproCli::parse_from([
            "resubir-repro",
            "--config",
            path.to_str().expect("utf-8 path"),
            "--url",
            "not a url",
        ]);
        assert!(cli.resolve_config().is_err());
    }
}
