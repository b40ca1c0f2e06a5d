//! Fault containment boundary around a whole run.
//!
//! Every failure that escapes the run body is classified (see
//! [`classify_fault`]). Cancellations return immediately. Anything else is
//! logged and shown on telemetry, and the boundary then holds the display
//! until the host requests a stop, so the run never terminates on a fault by
//! itself. The run log is closed and telemetry flushed on every path.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread;
use std::time::Duration;

use anyhow::anyhow;
use tracing::{info, instrument, warn};

use crate::core::fault::{Fault, classify_fault};
use crate::io::control::OpModeControl;
use crate::io::run_log::RunLog;
use crate::io::telemetry::Telemetry;

/// How a guarded run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Containment {
    Completed,
    /// The host interrupted the run. Nothing was held.
    Cancelled,
    /// A fault was displayed for `cycles` refreshes until the host stopped.
    Held { fault: Fault, cycles: usize },
}

pub struct FaultContainment<'a> {
    tag: String,
    control: &'a dyn OpModeControl,
    telemetry: &'a mut dyn Telemetry,
    log: RunLog,
    hold_interval: Duration,
}

impl<'a> FaultContainment<'a> {
    pub fn new(
        tag: impl Into<String>,
        control: &'a dyn OpModeControl,
        telemetry: &'a mut dyn Telemetry,
        log: RunLog,
        hold_interval: Duration,
    ) -> Self {
        Self {
            tag: tag.into(),
            control,
            telemetry,
            log,
            hold_interval,
        }
    }

    /// Run `body`, containing any error or panic it produces.
    #[instrument(skip_all, fields(run = %self.tag))]
    pub fn guard<F>(mut self, body: F) -> Containment
    where
        F: FnOnce(&mut dyn Telemetry, &mut RunLog) -> anyhow::Result<()>,
    {
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            body(&mut *self.telemetry, &mut self.log)
        }))
        .unwrap_or_else(|payload| Err(anyhow!("panic: {}", panic_message(payload.as_ref()))));

        let containment = match outcome {
            Ok(()) => Containment::Completed,
            Err(err) => match classify_fault(&err) {
                Fault::Cancellation => {
                    info!("run cancelled");
                    self.log.info(&self.tag, "Run interrupted");
                    Containment::Cancelled
                }
                fault => {
                    self.report(&fault);
                    let cycles = self.hold(&fault);
                    Containment::Held { fault, cycles }
                }
            },
        };
        self.finalize();
        containment
    }

    fn report(&mut self, fault: &Fault) {
        match fault {
            Fault::Domain { tag, message } => {
                warn!(tag = %tag, "{message}");
                self.log.error(tag, message);
            }
            Fault::Unclassified { message } => {
                warn!("unclassified failure: {message}");
                self.log.error(&self.tag, &format!("Unexpected failure: {message}"));
            }
            Fault::Cancellation => {}
        }
    }

    /// Show the fault until the host requests a stop. Returns the number of
    /// display refreshes (always at least one).
    fn hold(&mut self, fault: &Fault) -> usize {
        let caption = match fault {
            Fault::Unclassified { .. } => format!("{} fatal Exception", self.tag),
            _ => format!("{} fatal error", self.tag),
        };
        let message = fault.message().unwrap_or_default();
        let mut cycles = 0;
        loop {
            self.telemetry.add_data(&caption, message);
            if let Err(err) = self.telemetry.update() {
                warn!(err = %err, "failed to refresh fault display");
            }
            self.telemetry.clear();
            cycles += 1;
            thread::sleep(self.hold_interval);
            if self.control.is_stop_requested() {
                break;
            }
        }
        info!(cycles, "stop requested; releasing fault hold");
        cycles
    }

    fn finalize(&mut self) {
        if let Err(err) = self.log.close() {
            warn!(err = %err, "failed to close run log");
        }
        if let Err(err) = self.telemetry.flush() {
            warn!(err = %err, "failed to flush telemetry");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}
