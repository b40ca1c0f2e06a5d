//! In-memory result of loading one run-selector from the action document.

use serde::Serialize;

use crate::core::action::ActionStep;
use crate::core::types::{LogThreshold, Rect, StartingPose, TagId, Zone};

/// Everything the document says about one autonomous run. Immutable after
/// parsing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunConfiguration {
    pub logging_threshold: Option<LogThreshold>,
    pub region_of_interest: Rect,
    pub tags_of_interest: Vec<TagId>,
    pub starting_pose: Option<StartingPose>,
    pub actions: Vec<ActionStep>,
    pub branch_table: Option<BranchTable>,
}

impl RunConfiguration {
    /// Configuration with no parameters and the given top-level actions.
    pub fn with_actions(actions: Vec<ActionStep>) -> Self {
        Self {
            logging_threshold: None,
            region_of_interest: Rect::default(),
            tags_of_interest: Vec::new(),
            starting_pose: None,
            actions,
            branch_table: None,
        }
    }
}

/// Action sequence for every zone. One field per zone keeps the table
/// exhaustive without a runtime count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BranchTable {
    pub left: Vec<ActionStep>,
    pub center: Vec<ActionStep>,
    pub right: Vec<ActionStep>,
}

impl BranchTable {
    pub fn get(&self, zone: Zone) -> &[ActionStep] {
        match zone {
            Zone::Left => &self.left,
            Zone::Center => &self.center,
            Zone::Right => &self.right,
        }
    }

    pub(crate) fn slot_mut(&mut self, zone: Zone) -> &mut Vec<ActionStep> {
        match zone {
            Zone::Left => &mut self.left,
            Zone::Center => &mut self.center,
            Zone::Right => &mut self.right,
        }
    }
}
