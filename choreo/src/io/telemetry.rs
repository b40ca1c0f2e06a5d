//! Operator display sink.
//!
//! Items stay on the display across updates until [`Telemetry::clear`] is
//! called, so a held message is re-added on every refresh cycle.

use std::io::Write;

use anyhow::{Context, Result};

/// Write-only key/value display.
pub trait Telemetry {
    fn add_data(&mut self, caption: &str, value: &str);
    /// Push the current items to the display.
    fn update(&mut self) -> Result<()>;
    fn clear(&mut self);
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Renders each update as a block of `caption: value` lines.
pub struct ConsoleTelemetry<W: Write> {
    out: W,
    items: Vec<(String, String)>,
}

impl ConsoleTelemetry<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> ConsoleTelemetry<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            items: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Telemetry for ConsoleTelemetry<W> {
    fn add_data(&mut self, caption: &str, value: &str) {
        self.items.push((caption.to_string(), value.to_string()));
    }

    fn update(&mut self) -> Result<()> {
        for (caption, value) in &self.items {
            writeln!(self.out, "{caption}: {value}").context("write telemetry")?;
        }
        Ok(())
    }

    fn clear(&mut self) {
        self.items.clear();
    }

    fn flush(&mut self) -> Result<()> {
        self.out.flush().context("flush telemetry")
    }
}
