//! Shared deterministic types for the choreography core.
//!
//! These are closed vocabularies: every value a document may name is listed
//! here, and parsing an unlisted name is a configuration error.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Vision classification outcome used to pick a branch sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Zone {
    Left,
    Center,
    Right,
}

impl Zone {
    pub const ALL: [Zone; 3] = [Zone::Left, Zone::Center, Zone::Right];

    /// Element name used for this zone in the action document.
    pub fn as_str(self) -> &'static str {
        match self {
            Zone::Left => "LEFT",
            Zone::Center => "CENTER",
            Zone::Right => "RIGHT",
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Zone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Zone::ALL
            .into_iter()
            .find(|zone| zone.as_str() == s)
            .ok_or_else(|| format!("unknown zone '{s}'"))
    }
}

/// Image targets a run may ask the vision subsystem to look for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TagId {
    BlueTowerGoal,
    RedTowerGoal,
    RedAlliance,
    BlueAlliance,
    FrontWall,
}

impl TagId {
    pub const ALL: [TagId; 5] = [
        TagId::BlueTowerGoal,
        TagId::RedTowerGoal,
        TagId::RedAlliance,
        TagId::BlueAlliance,
        TagId::FrontWall,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TagId::BlueTowerGoal => "BLUE_TOWER_GOAL",
            TagId::RedTowerGoal => "RED_TOWER_GOAL",
            TagId::RedAlliance => "RED_ALLIANCE",
            TagId::BlueAlliance => "BLUE_ALLIANCE",
            TagId::FrontWall => "FRONT_WALL",
        }
    }
}

impl FromStr for TagId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TagId::ALL
            .into_iter()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| format!("unknown tag '{s}'"))
    }
}

/// Lowest level written to the run log. `None` in a configuration means the
/// logger default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogThreshold {
    Debug,
    Verbose,
    VeryVerbose,
}

impl FromStr for LogThreshold {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "d" => Ok(LogThreshold::Debug),
            "v" => Ok(LogThreshold::Verbose),
            "vv" => Ok(LogThreshold::VeryVerbose),
            other => Err(format!("invalid logging level '{other}'")),
        }
    }
}

/// Image region of interest in pixels. All zeros means "unset".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Robot pose at the start of the run, in field coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StartingPose {
    pub x: f64,
    pub y: f64,
    /// Heading with respect to the wall, in degrees.
    pub heading: f64,
}

/// Alliance the robot plays for during this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alliance {
    Red,
    Blue,
    Unknown,
}

impl fmt::Display for Alliance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Alliance::Red => "RED",
            Alliance::Blue => "BLUE",
            Alliance::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_names_round_trip() {
        for zone in Zone::ALL {
            assert_eq!(zone.as_str().parse::<Zone>(), Ok(zone));
        }
        assert!("left".parse::<Zone>().is_err());
    }

    #[test]
    fn tag_ids_parse_document_names() {
        assert_eq!("RED_ALLIANCE".parse::<TagId>(), Ok(TagId::RedAlliance));
        assert!("GREEN_ALLIANCE".parse::<TagId>().is_err());
    }

    #[test]
    fn log_threshold_accepts_short_codes_only() {
        assert_eq!("vv".parse::<LogThreshold>(), Ok(LogThreshold::VeryVerbose));
        assert!("debug".parse::<LogThreshold>().is_err());
    }

    #[test]
    fn default_rect_is_empty() {
        assert!(Rect::default().is_empty());
    }
}
