//! Action steps as written in the document, and the closed command set they
//! resolve into.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

use crate::core::errors::RunError;

/// Element name of the distinguished branch step.
pub const BRANCH_MARKER: &str = "OCV_CHOICE";

/// One command element from the `<actions>` block.
///
/// Attribute values are kept as strings; they are typed when the step is
/// resolved into a [`Command`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionStep {
    pub name: String,
    pub attributes: BTreeMap<String, String>,
}

impl ActionStep {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn is_branch_marker(&self) -> bool {
        is_branch_marker(&self.name)
    }
}

pub fn is_branch_marker(name: &str) -> bool {
    name.eq_ignore_ascii_case(BRANCH_MARKER)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    /// Sign applied to the configured drive power.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Forward => 1.0,
            Direction::Reverse => -1.0,
        }
    }
}

/// Supported commands with validated payloads.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Drive at fixed power until the duration elapses or the run stops.
    /// `None` uses the configured default duration.
    DriveByTime {
        direction: Direction,
        duration: Option<Duration>,
    },
    /// Block for a fixed time. Not cancellable mid-sleep.
    Sleep(Duration),
    /// Block until the operator signal is observed. Ignores run liveness.
    Breakpoint,
    /// Replace this step with the sequence for the classified zone.
    ZoneChoice,
}

impl Command {
    /// Resolve a document step by case-insensitive name.
    pub fn resolve(step: &ActionStep) -> Result<Command, RunError> {
        let name = step.name.to_ascii_uppercase();
        match name.as_str() {
            "FORWARD_BY_TIME" => Ok(Command::DriveByTime {
                direction: Direction::Forward,
                duration: optional_seconds(step, &name, "seconds")?,
            }),
            "REVERSE_BY_TIME" => Ok(Command::DriveByTime {
                direction: Direction::Reverse,
                duration: optional_seconds(step, &name, "seconds")?,
            }),
            "SLEEP" => {
                let ms = required_millis(step, &name, "ms")?;
                Ok(Command::Sleep(Duration::from_millis(ms)))
            }
            "BREAKPOINT" => Ok(Command::Breakpoint),
            BRANCH_MARKER => Ok(Command::ZoneChoice),
            _ => Err(RunError::UnsupportedCommand(name)),
        }
    }
}

fn required_millis(step: &ActionStep, command: &str, attribute: &str) -> Result<u64, RunError> {
    let raw = step.attribute(attribute).unwrap_or_default();
    raw.trim()
        .parse::<u64>()
        .map_err(|_| invalid(command, attribute, raw))
}

fn optional_seconds(
    step: &ActionStep,
    command: &str,
    attribute: &str,
) -> Result<Option<Duration>, RunError> {
    let Some(raw) = step.attribute(attribute) else {
        return Ok(None);
    };
    let seconds = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| invalid(command, attribute, raw))?;
    if seconds <= 0.0 {
        return Err(invalid(command, attribute, raw));
    }
    // Rejects NaN, infinity and values too large for a `Duration`.
    let duration =
        Duration::try_from_secs_f64(seconds).map_err(|_| invalid(command, attribute, raw))?;
    Ok(Some(duration))
}

fn invalid(command: &str, attribute: &str, value: &str) -> RunError {
    RunError::InvalidValue {
        command: command.to_string(),
        attribute: attribute.to_string(),
        value: value.to_string(),
    }
}
