//! Hardware abstraction for actuators and sensors.
//!
//! The [`Hardware`] trait decouples dispatch from the physical robot. The CLI
//! and tests use [`SimulatedHardware`], which models motor power, run mode
//! and a synthetic encoder.

use std::time::Instant;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument};

use crate::io::settings::DriveSettings;

/// Opaque handle for a named channel, resolved once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorMode {
    StopAndResetEncoder,
    RunUsingEncoder,
    RunWithoutEncoder,
}

/// Capability set the engine drives.
pub trait Hardware {
    /// Resolve a configured hardware name.
    fn channel(&self, name: &str) -> Result<ChannelId>;
    fn set_power(&mut self, channel: ChannelId, power: f64) -> Result<()>;
    fn set_mode(&mut self, channel: ChannelId, mode: MotorMode) -> Result<()>;
    /// Current sensor value for the channel (encoder position for motors).
    fn read(&self, channel: ChannelId) -> Result<f64>;
}

/// Drive channels used by motion commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveChannels {
    pub left_front: ChannelId,
}

/// Resolve and prepare the drive motor.
#[instrument(skip_all, fields(channel = %settings.channel))]
pub fn initialize_drive(hardware: &mut dyn Hardware, settings: &DriveSettings) -> Result<DriveChannels> {
    let left_front = hardware
        .channel(&settings.channel)
        .with_context(|| format!("resolve drive channel '{}'", settings.channel))?;
    hardware.set_power(left_front, 0.0)?;
    // The robot does not move if these two are applied in the other order.
    hardware.set_mode(left_front, MotorMode::StopAndResetEncoder)?;
    hardware.set_mode(left_front, MotorMode::RunUsingEncoder)?;
    debug!("drive initialized");
    Ok(DriveChannels { left_front })
}

/// Encoder clicks per second at full power (1120 clicks/rev at 150 rpm).
pub const SIMULATED_MAX_VELOCITY: f64 = 1120.0 * 150.0 / 60.0;

#[derive(Debug)]
struct SimulatedMotor {
    name: String,
    power: f64,
    mode: MotorMode,
    position: f64,
    since: Instant,
}

impl SimulatedMotor {
    fn position_now(&self) -> f64 {
        self.position + self.power * SIMULATED_MAX_VELOCITY * self.since.elapsed().as_secs_f64()
    }
}

/// In-memory motors, used when no robot is attached.
#[derive(Debug, Default)]
pub struct SimulatedHardware {
    motors: Vec<SimulatedMotor>,
    power_log: Vec<(ChannelId, f64)>,
}

impl SimulatedHardware {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let motors = names
            .into_iter()
            .map(|name| SimulatedMotor {
                name: name.into(),
                power: 0.0,
                mode: MotorMode::RunWithoutEncoder,
                position: 0.0,
                since: Instant::now(),
            })
            .collect();
        Self {
            motors,
            power_log: Vec::new(),
        }
    }

    pub fn power(&self, channel: ChannelId) -> f64 {
        self.motors.get(channel.0).map_or(0.0, |motor| motor.power)
    }

    pub fn mode(&self, channel: ChannelId) -> Option<MotorMode> {
        self.motors.get(channel.0).map(|motor| motor.mode)
    }

    /// Every `set_power` call, in order.
    pub fn power_log(&self) -> &[(ChannelId, f64)] {
        &self.power_log
    }

    fn motor_mut(&mut self, channel: ChannelId) -> Result<&mut SimulatedMotor> {
        self.motors
            .get_mut(channel.0)
            .ok_or_else(|| anyhow!("unknown channel {}", channel.0))
    }
}

impl Hardware for SimulatedHardware {
    fn channel(&self, name: &str) -> Result<ChannelId> {
        self.motors
            .iter()
            .position(|motor| motor.name == name)
            .map(ChannelId)
            .ok_or_else(|| anyhow!("no hardware named '{name}'"))
    }

    fn set_power(&mut self, channel: ChannelId, power: f64) -> Result<()> {
        let motor = self.motor_mut(channel)?;
        motor.position = motor.position_now();
        motor.since = Instant::now();
        motor.power = power.clamp(-1.0, 1.0);
        self.power_log.push((channel, power));
        Ok(())
    }

    fn set_mode(&mut self, channel: ChannelId, mode: MotorMode) -> Result<()> {
        let motor = self.motor_mut(channel)?;
        if mode == MotorMode::StopAndResetEncoder {
            motor.position = 0.0;
            motor.since = Instant::now();
        }
        motor.mode = mode;
        Ok(())
    }

    fn read(&self, channel: ChannelId) -> Result<f64> {
        let motor = self
            .motors
            .get(channel.0)
            .ok_or_else(|| anyhow!("unknown channel {}", channel.0))?;
        Ok(motor.position_now())
    }
}
