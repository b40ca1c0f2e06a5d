//! Zone classifier seam.
//!
//! Recognition itself lives outside the engine; dispatch only asks for the
//! outcome, at most once per run.

use anyhow::Result;

use crate::core::types::Zone;

pub trait ZoneClassifier {
    fn current_zone(&mut self) -> Result<Zone>;
}

/// Classifier that always reports the same zone (operator-selected on the
/// command line).
#[derive(Debug, Clone, Copy)]
pub struct FixedZone(pub Zone);

impl ZoneClassifier for FixedZone {
    fn current_zone(&mut self) -> Result<Zone> {
        Ok(self.0)
    }
}
