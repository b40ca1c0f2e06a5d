//! Scoped motor power.

use anyhow::Result;
use tracing::warn;

use crate::io::hardware::{ChannelId, Hardware};

/// Holds a channel at a non-zero power and zeroes it when dropped.
///
/// The zeroing runs on normal return, early return, `?` propagation and
/// panic unwinding alike. [`PowerGuard::release`] zeroes explicitly so the
/// caller can see a failing `set_power`.
pub struct PowerGuard<'h> {
    hardware: &'h mut dyn Hardware,
    channel: ChannelId,
    released: bool,
}

impl<'h> PowerGuard<'h> {
    pub fn engage(hardware: &'h mut dyn Hardware, channel: ChannelId, power: f64) -> Result<Self> {
        let mut guard = Self {
            hardware,
            channel,
            released: false,
        };
        guard.hardware.set_power(channel, power)?;
        Ok(guard)
    }

    pub fn read(&self) -> Result<f64> {
        self.hardware.read(self.channel)
    }

    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.hardware.set_power(self.channel, 0.0)
    }
}

impl Drop for PowerGuard<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(err) = self.hardware.set_power(self.channel, 0.0) {
            warn!(channel = self.channel.0, err = %err, "failed to zero motor power");
        }
    }
}
