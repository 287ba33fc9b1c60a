//! Session gating modes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a session decides when to start logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Hold logging until the first packet reporting lap zero
    Race,
    /// Log as soon as the car is moving
    Practice,
}

impl SessionMode {
    /// Whether logging waits for the lap counter to reach zero.
    pub fn wait_for_lap_zero(self) -> bool {
        matches!(self, SessionMode::Race)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionMode::Race => "race",
            SessionMode::Practice => "practice",
        }
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionMode {
    type Err = crate::TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "race" => Ok(SessionMode::Race),
            "practice" => Ok(SessionMode::Practice),
            other => Err(crate::TelemetryError::parse(
                "session mode",
                format!("expected 'race' or 'practice', got '{other}'"),
            )),
        }
    }
}
