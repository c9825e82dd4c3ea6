use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Session handle assigned by the connection layer when a client logs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

/// Identity of the character that owns a persisted record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct CharacterId(pub u32);

/// A recorded position at a point in time. Replaced wholesale on every
/// update, never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub level: String,
    #[serde(rename = "timestamp")]
    pub timestamp_ms: u64,
}

impl PositionSnapshot {
    pub fn new(x: f64, y: f64, z: f64, level: impl Into<String>, timestamp_ms: u64) -> Self {
        Self {
            x,
            y,
            z,
            level: level.into(),
            timestamp_ms,
        }
    }

    pub fn now(x: f64, y: f64, z: f64, level: impl Into<String>) -> Self {
        Self::new(x, y, z, level, unix_millis())
    }
}

/// The pre-mission point a player is returned to when leaving instanced
/// content, tagged with the mission that was entered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionAnchor {
    #[serde(flatten)]
    pub snapshot: PositionSnapshot,
    #[serde(rename = "missionEntered")]
    pub mission: String,
}

/// Per-session tracking record. `mission_entry` is present exactly while the
/// session is inside mission space reached through a tracked door use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionTracking {
    #[serde(
        rename = "lastWorldPosition",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub last_world_position: Option<PositionSnapshot>,
    #[serde(
        rename = "currentPosition",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub current_position: Option<PositionSnapshot>,
    #[serde(
        rename = "missionEntryPosition",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub mission_entry: Option<MissionAnchor>,
    #[serde(rename = "positionLoggingEnabled", default = "default_logging_enabled")]
    pub logging_enabled: bool,
}

impl Default for PositionTracking {
    fn default() -> Self {
        Self {
            last_world_position: None,
            current_position: None,
            mission_entry: None,
            logging_enabled: true,
        }
    }
}

fn default_logging_enabled() -> bool {
    true
}

pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
