pub mod config;
pub mod dns;
pub mod geo;
pub mod master_version;
pub mod monitors;
pub mod parsers;
pub mod pipeline;
pub mod probe;
pub mod ratings;
pub mod score;
pub mod storage;
pub mod util;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Live state of a pod as reported by its uptime monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LiveState {
    Up,
    Down,
    Paused,
    Error,
    SeemsDown,
    #[serde(rename = "n/a")]
    NotAvailable,
}

impl LiveState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LiveState::Up => "up",
            LiveState::Down => "down",
            LiveState::Paused => "paused",
            LiveState::Error => "error",
            LiveState::SeemsDown => "seems-down",
            LiveState::NotAvailable => "n/a",
        }
    }
}

impl fmt::Display for LiveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LiveState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Ok(LiveState::Up),
            "down" => Ok(LiveState::Down),
            "paused" => Ok(LiveState::Paused),
            "error" => Ok(LiveState::Error),
            "seems-down" | "seems down" => Ok(LiveState::SeemsDown),
            "n/a" => Ok(LiveState::NotAvailable),
            other => Err(format!("unknown live state '{other}'")),
        }
    }
}

/// Average response time reported by an uptime monitor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ResponseTime {
    Millis(u32),
    /// The backend does not report response times
    NotApplicable,
}

impl fmt::Display for ResponseTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseTime::Millis(ms) => write!(f, "{ms}"),
            ResponseTime::NotApplicable => f.write_str("n/a"),
        }
    }
}

impl FromStr for ResponseTime {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("n/a") {
            return Ok(ResponseTime::NotApplicable);
        }
        s.trim().parse().map(ResponseTime::Millis)
    }
}
