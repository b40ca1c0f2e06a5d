//! Run liveness and operator input.
//!
//! The host owns these flags; the engine only polls them.

use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{debug, warn};

pub trait OpModeControl {
    /// True while the run is permitted to continue.
    fn is_active(&self) -> bool;
    fn is_stop_requested(&self) -> bool;
    /// Mark the run as started. Implementations may block until the host
    /// starts the run, and fail with [`Interrupted`] in the error chain when
    /// the host cancels first.
    ///
    /// [`Interrupted`]: crate::core::errors::Interrupted
    fn wait_for_start(&self) -> Result<()>;
    /// True when the operator has pressed the continue input since the last
    /// call.
    fn operator_signal(&self) -> bool;
}

#[derive(Debug)]
struct ConsoleFlags {
    started: AtomicBool,
    stop: AtomicBool,
    signal: AtomicBool,
}

/// Control driven from stdin: an empty line is the operator signal, `stop`
/// requests a stop. The run period also ends `period` after launch.
#[derive(Debug, Clone)]
pub struct ConsoleControl {
    flags: Arc<ConsoleFlags>,
    launched: Instant,
    period: Duration,
}

impl ConsoleControl {
    /// Create the control and start the stdin reader thread.
    pub fn spawn(period: Duration) -> Self {
        let control = Self::new(period);
        let flags = Arc::clone(&control.flags);
        thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) => apply_console_line(&flags, line.trim()),
                    Err(err) => {
                        warn!(err = %err, "stdin closed");
                        break;
                    }
                }
            }
            debug!("console reader finished");
        });
        control
    }

    /// Control without a reader thread; only the period ends the run.
    pub fn new(period: Duration) -> Self {
        Self {
            flags: Arc::new(ConsoleFlags {
                started: AtomicBool::new(false),
                stop: AtomicBool::new(false),
                signal: AtomicBool::new(false),
            }),
            launched: Instant::now(),
            period,
        }
    }

    pub fn request_stop(&self) {
        self.flags.stop.store(true, Ordering::SeqCst);
    }

    pub fn press_signal(&self) {
        self.flags.signal.store(true, Ordering::SeqCst);
    }
}

fn apply_console_line(flags: &ConsoleFlags, line: &str) {
    match line {
        "" => flags.signal.store(true, Ordering::SeqCst),
        "stop" | "q" => flags.stop.store(true, Ordering::SeqCst),
        other => debug!(input = other, "ignoring console input"),
    }
}

impl OpModeControl for ConsoleControl {
    fn is_active(&self) -> bool {
        self.flags.started.load(Ordering::SeqCst) && !self.is_stop_requested()
    }

    fn is_stop_requested(&self) -> bool {
        self.flags.stop.load(Ordering::SeqCst) || self.launched.elapsed() >= self.period
    }

    fn wait_for_start(&self) -> Result<()> {
        self.flags.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn operator_signal(&self) -> bool {
        self.flags.signal.swap(false, Ordering::SeqCst)
    }
}
