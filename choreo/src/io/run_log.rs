//! Per-run log file.
//!
//! # Separation of Concerns
//!
//! - **Run log (this module)**: product artifact under the configured log
//!   directory, one file per run-selector, filtered by the document's
//!   `lowest_logging_level`. Lines are tagged with the originating component.
//!
//! - **Tracing (`logging`)**: developer diagnostics via `RUST_LOG`. Every run
//!   log record is forwarded there as well.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{debug, error, info, trace, warn};

use crate::core::types::LogThreshold;

/// Record severity, least verbose first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Error,
    Info,
    Debug,
    Verbose,
    VeryVerbose,
}

impl Verbosity {
    fn label(self) -> &'static str {
        match self {
            Verbosity::Error => "E",
            Verbosity::Info => "I",
            Verbosity::Debug => "D",
            Verbosity::Verbose => "V",
            Verbosity::VeryVerbose => "VV",
        }
    }
}

impl From<Option<LogThreshold>> for Verbosity {
    fn from(threshold: Option<LogThreshold>) -> Self {
        match threshold {
            None => Verbosity::Info,
            Some(LogThreshold::Debug) => Verbosity::Debug,
            Some(LogThreshold::Verbose) => Verbosity::Verbose,
            Some(LogThreshold::VeryVerbose) => Verbosity::VeryVerbose,
        }
    }
}

/// Run-scoped log sink. Opened before the configuration is loaded and closed
/// by the containment boundary.
pub struct RunLog {
    writer: Option<BufWriter<File>>,
    path: Option<PathBuf>,
    threshold: Verbosity,
    opened: Instant,
}

impl RunLog {
    /// Create (truncate) `<log_dir>/<run>.log`.
    pub fn open(log_dir: &Path, run: &str) -> Result<Self> {
        fs::create_dir_all(log_dir)
            .with_context(|| format!("create log dir {}", log_dir.display()))?;
        let path = log_dir.join(format!("{run}.log"));
        let file = File::create(&path).with_context(|| format!("create {}", path.display()))?;
        debug!(path = %path.display(), "run log opened");
        Ok(Self {
            writer: Some(BufWriter::new(file)),
            path: Some(path),
            threshold: Verbosity::Info,
            opened: Instant::now(),
        })
    }

    /// Log that only forwards to tracing.
    pub fn detached() -> Self {
        Self {
            writer: None,
            path: None,
            threshold: Verbosity::Info,
            opened: Instant::now(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn threshold(&self) -> Verbosity {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: Option<LogThreshold>) {
        self.threshold = threshold.into();
    }

    pub fn error(&mut self, tag: &str, message: &str) {
        self.record(Verbosity::Error, tag, message);
    }

    pub fn info(&mut self, tag: &str, message: &str) {
        self.record(Verbosity::Info, tag, message);
    }

    pub fn debug(&mut self, tag: &str, message: &str) {
        self.record(Verbosity::Debug, tag, message);
    }

    pub fn verbose(&mut self, tag: &str, message: &str) {
        self.record(Verbosity::Verbose, tag, message);
    }

    fn record(&mut self, level: Verbosity, tag: &str, message: &str) {
        if level > self.threshold {
            return;
        }
        match level {
            Verbosity::Error => error!(tag, "{message}"),
            Verbosity::Info => info!(tag, "{message}"),
            Verbosity::Debug => debug!(tag, "{message}"),
            Verbosity::Verbose | Verbosity::VeryVerbose => trace!(tag, "{message}"),
        }
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        let elapsed_ms = self.opened.elapsed().as_millis();
        let line = format!("{elapsed_ms:>8} {} [{tag}] {message}", level.label());
        if let Err(err) = writeln!(writer, "{line}") {
            // Losing the log file must not stop the run.
            warn!(err = %err, "run log write failed; detaching");
            self.writer = None;
        }
    }

    /// Flush and release the file. Later records only reach tracing.
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().context("flush run log")?;
        }
        Ok(())
    }
}
