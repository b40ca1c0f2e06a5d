//! Test-only helpers: document builders and scripted collaborators.

use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow, bail};

use crate::core::action::{ActionStep, BRANCH_MARKER};
use crate::core::errors::Interrupted;
use crate::core::run_config::{BranchTable, RunConfiguration};
use crate::core::types::Zone;
use crate::io::classifier::ZoneClassifier;
use crate::io::control::OpModeControl;
use crate::io::telemetry::Telemetry;

/// Build a `RobotAction` document with one run block.
///
/// `parameters` and `actions` are inserted verbatim as the children of the
/// `parameters` and `actions` elements.
pub fn action_document(run: &str, parameters: &str, actions: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<RobotAction>
  <OpMode id="{run}">
    <parameters>{parameters}</parameters>
    <actions>{actions}</actions>
  </OpMode>
</RobotAction>
"#
    )
}

/// Write `xml` to `<dir>/RobotAction.xml`.
pub fn write_document(dir: &Path, xml: &str) -> PathBuf {
    let path = dir.join("RobotAction.xml");
    fs::write(&path, xml).expect("write action document");
    path
}

/// Scratch directory holding `RobotAction.xml` with `xml` as its contents.
pub fn scratch_document(xml: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_document(dir.path(), xml);
    (dir, path)
}

pub fn sleep_step(ms: u64) -> ActionStep {
    ActionStep::new("SLEEP").with_attribute("ms", ms.to_string())
}

/// Configuration whose actions are a branch step followed by `trailing`.
pub fn branch_config(
    left: Vec<ActionStep>,
    center: Vec<ActionStep>,
    right: Vec<ActionStep>,
    trailing: Vec<ActionStep>,
) -> RunConfiguration {
    let mut actions = vec![ActionStep::new(BRANCH_MARKER)];
    actions.extend(trailing);
    RunConfiguration {
        branch_table: Some(BranchTable {
            left,
            center,
            right,
        }),
        ..RunConfiguration::with_actions(actions)
    }
}

/// Telemetry that keeps every published frame.
#[derive(Debug, Default)]
pub struct RecordingTelemetry {
    pending: Vec<(String, String)>,
    frames: Vec<Vec<(String, String)>>,
    clears: usize,
    flushes: usize,
}

impl RecordingTelemetry {
    pub fn frames(&self) -> &[Vec<(String, String)>] {
        &self.frames
    }

    pub fn updates(&self) -> usize {
        self.frames.len()
    }

    pub fn clears(&self) -> usize {
        self.clears
    }

    pub fn flushes(&self) -> usize {
        self.flushes
    }

    /// True if any published frame carried `(caption, value)`.
    pub fn has_item(&self, caption: &str, value: &str) -> bool {
        self.frames
            .iter()
            .flatten()
            .any(|(c, v)| c == caption && v == value)
    }

    /// Number of published frames carrying `(caption, value)`.
    pub fn count_item(&self, caption: &str, value: &str) -> usize {
        self.frames
            .iter()
            .filter(|frame| frame.iter().any(|(c, v)| c == caption && v == value))
            .count()
    }
}

impl Telemetry for RecordingTelemetry {
    fn add_data(&mut self, caption: &str, value: &str) {
        self.pending.push((caption.to_string(), value.to_string()));
    }

    fn update(&mut self) -> Result<()> {
        self.frames.push(self.pending.clone());
        Ok(())
    }

    fn clear(&mut self) {
        self.clears += 1;
        self.pending.clear();
    }

    fn flush(&mut self) -> Result<()> {
        self.flushes += 1;
        Ok(())
    }
}

/// Telemetry whose `update` fails (or panics) after a number of successes.
#[derive(Debug)]
pub struct FailingTelemetry {
    remaining: usize,
    panic: bool,
}

impl FailingTelemetry {
    pub fn after_updates(successes: usize) -> Self {
        Self {
            remaining: successes,
            panic: false,
        }
    }

    pub fn panicking() -> Self {
        Self {
            remaining: 0,
            panic: true,
        }
    }
}

impl Telemetry for FailingTelemetry {
    fn add_data(&mut self, _caption: &str, _value: &str) {}

    fn update(&mut self) -> Result<()> {
        if self.remaining > 0 {
            self.remaining -= 1;
            return Ok(());
        }
        if self.panic {
            panic!("telemetry sink panicked");
        }
        bail!("telemetry link lost")
    }

    fn clear(&mut self) {}
}

/// Control with scripted answers.
///
/// `is_active` answers true for the first `active_polls` calls.
/// `is_stop_requested` answers false for the first `running_polls` calls.
/// `operator_signal` answers false for the first `silent_polls` calls.
#[derive(Debug)]
pub struct ScriptedControl {
    active_polls: Option<usize>,
    running_polls: Option<usize>,
    silent_polls: usize,
    active_calls: Cell<usize>,
    stop_calls: Cell<usize>,
    signal_calls: Cell<usize>,
    started: Cell<bool>,
    interrupt_start: bool,
}

impl ScriptedControl {
    pub fn always_active() -> Self {
        Self {
            active_polls: None,
            running_polls: None,
            silent_polls: 0,
            active_calls: Cell::new(0),
            stop_calls: Cell::new(0),
            signal_calls: Cell::new(0),
            started: Cell::new(false),
            interrupt_start: false,
        }
    }

    pub fn active_for(polls: usize) -> Self {
        Self {
            active_polls: Some(polls),
            ..Self::always_active()
        }
    }

    /// `is_stop_requested` turns true after `polls` calls.
    pub fn with_stop_after(mut self, polls: usize) -> Self {
        self.running_polls = Some(polls);
        self
    }

    pub fn with_signal_after(mut self, polls: usize) -> Self {
        self.silent_polls = polls;
        self
    }

    /// `wait_for_start` fails with an interruption.
    pub fn interrupted_before_start(mut self) -> Self {
        self.interrupt_start = true;
        self
    }

    pub fn active_polls(&self) -> usize {
        self.active_calls.get()
    }

    pub fn stop_polls(&self) -> usize {
        self.stop_calls.get()
    }

    pub fn signal_polls(&self) -> usize {
        self.signal_calls.get()
    }

    pub fn started(&self) -> bool {
        self.started.get()
    }
}

fn tick(counter: &Cell<usize>) -> usize {
    let seen = counter.get();
    counter.set(seen + 1);
    seen
}

impl OpModeControl for ScriptedControl {
    fn is_active(&self) -> bool {
        let seen = tick(&self.active_calls);
        self.active_polls.is_none_or(|limit| seen < limit)
    }

    fn is_stop_requested(&self) -> bool {
        let seen = tick(&self.stop_calls);
        self.running_polls.is_some_and(|limit| seen >= limit)
    }

    fn wait_for_start(&self) -> Result<()> {
        if self.interrupt_start {
            return Err(Interrupted.into());
        }
        self.started.set(true);
        Ok(())
    }

    fn operator_signal(&self) -> bool {
        tick(&self.signal_calls) >= self.silent_polls
    }
}

/// Classifier that returns a fixed answer and counts calls.
#[derive(Debug)]
pub struct ScriptedClassifier {
    answer: Option<Zone>,
    error: Option<anyhow::Error>,
    calls: usize,
}

impl ScriptedClassifier {
    pub fn zone(zone: Zone) -> Self {
        Self {
            answer: Some(zone),
            error: None,
            calls: 0,
        }
    }

    pub fn failing(error: anyhow::Error) -> Self {
        Self {
            answer: None,
            error: Some(error),
            calls: 0,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl ZoneClassifier for ScriptedClassifier {
    fn current_zone(&mut self) -> Result<Zone> {
        self.calls += 1;
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        self.answer
            .ok_or_else(|| anyhow!("classifier already reported its failure"))
    }
}
