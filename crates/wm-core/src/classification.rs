//! Alarm / OK classification of a monitored sensor

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of a sensor, also used as the direction of a transition
///
/// Serialized as the host's integer status (0 = OK, 1 = Alarm).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum Classification {
    #[default]
    Ok,
    Alarm,
}

impl Classification {
    /// Classification from a passing / failing condition
    pub fn from_passing(passing: bool) -> Self {
        if passing {
            Classification::Alarm
        } else {
            Classification::Ok
        }
    }

    pub fn is_alarm(self) -> bool {
        self == Classification::Alarm
    }

    pub fn is_ok(self) -> bool {
        self == Classification::Ok
    }
}

impl From<u8> for Classification {
    fn from(raw: u8) -> Self {
        if raw == 0 {
            Classification::Ok
        } else {
            Classification::Alarm
        }
    }
}

impl From<Classification> for u8 {
    fn from(c: Classification) -> Self {
        match c {
            Classification::Ok => 0,
            Classification::Alarm => 1,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Ok => f.write_str("OK"),
            Classification::Alarm => f.write_str("Alarm"),
        }
    }
}
