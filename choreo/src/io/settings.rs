//! Robot settings stored in `settings.toml` next to the action document.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Robot and timing settings (TOML).
///
/// Edited by hand on the robot controller. Missing fields default to the
/// values the programming board ships with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunnerSettings {
    /// Action document holding one `<OpMode>` section per run-selector.
    pub document_path: PathBuf,

    /// Directory for per-run log files.
    pub log_dir: PathBuf,

    pub drive: DriveSettings,

    pub timing: TimingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DriveSettings {
    /// Hardware name of the drive motor.
    pub channel: String,

    /// Power magnitude for timed drives, in `(0, 1]`.
    pub power: f64,

    /// Timed-drive duration when the command gives none.
    pub default_duration_secs: f64,

    /// Pause between liveness checks inside a timed drive.
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimingSettings {
    /// Refresh period of a held fault message.
    pub hold_interval_ms: u64,

    /// Poll period while waiting at a breakpoint.
    pub breakpoint_poll_ms: u64,
}

impl Default for DriveSettings {
    fn default() -> Self {
        Self {
            channel: "lf".to_string(),
            power: 0.5,
            default_duration_secs: 3.0,
            poll_interval_ms: 10,
        }
    }
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            hold_interval_ms: 1000,
            breakpoint_poll_ms: 1,
        }
    }
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            document_path: PathBuf::from("xml/RobotAction.xml"),
            log_dir: PathBuf::from("logs"),
            drive: DriveSettings::default(),
            timing: TimingSettings::default(),
        }
    }
}

impl DriveSettings {
    /// Fails for values that are not a positive, representable duration.
    pub fn default_duration(&self) -> Result<Duration> {
        if self.default_duration_secs <= 0.0 {
            return Err(anyhow!("drive.default_duration_secs must be > 0"));
        }
        Duration::try_from_secs_f64(self.default_duration_secs).map_err(|err| {
            anyhow!(
                "drive.default_duration_secs {} is not a valid duration: {err}",
                self.default_duration_secs
            )
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl TimingSettings {
    pub fn hold_interval(&self) -> Duration {
        Duration::from_millis(self.hold_interval_ms)
    }

    pub fn breakpoint_poll(&self) -> Duration {
        Duration::from_millis(self.breakpoint_poll_ms)
    }
}

impl RunnerSettings {
    pub fn validate(&self) -> Result<()> {
        if self.drive.channel.trim().is_empty() {
            return Err(anyhow!("drive.channel must be non-empty"));
        }
        if !(self.drive.power > 0.0 && self.drive.power <= 1.0) {
            return Err(anyhow!("drive.power must be in (0, 1]"));
        }
        self.drive.default_duration()?;
        if self.timing.hold_interval_ms == 0 {
            return Err(anyhow!("timing.hold_interval_ms must be > 0"));
        }
        if self.timing.breakpoint_poll_ms == 0 {
            return Err(anyhow!("timing.breakpoint_poll_ms must be > 0"));
        }
        Ok(())
    }
}

/// Load settings from a TOML file.
///
/// If the file is missing, returns `RunnerSettings::default()`.
pub fn load_settings(path: &Path) -> Result<RunnerSettings> {
    if !path.exists() {
        let settings = RunnerSettings::default();
        settings.validate()?;
        return Ok(settings);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let settings: RunnerSettings =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    settings.validate()?;
    Ok(settings)
}

/// Atomically write settings to disk (temp file + rename).
pub fn write_settings(path: &Path, settings: &RunnerSettings) -> Result<()> {
    settings.validate()?;
    let mut buf = toml::to_string_pretty(settings).context("serialize settings toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("settings path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp settings {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace settings {}", path.display()))?;
    Ok(())
}
