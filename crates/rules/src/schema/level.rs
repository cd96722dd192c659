//! Risk levels, ordered `Fatal > High > Low > Info`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PolicyError;

/// Severity attached to a policy and to every verdict.
///
/// Declaration order gives the derived `Ord`: `Info < Low < High < Fatal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Low,
    High,
    Fatal,
}

impl Level {
    /// All levels, most severe first.
    pub const ALL: [Level; 4] = [Level::Fatal, Level::High, Level::Low, Level::Info];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Info => "info",
            Level::Low => "low",
            Level::High => "high",
            Level::Fatal => "fatal",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(Level::Info),
            "low" => Ok(Level::Low),
            "high" => Ok(Level::High),
            "fatal" => Ok(Level::Fatal),
            other => Err(PolicyError::ValueShape(format!("invalid level '{}'", other))),
        }
    }
}
