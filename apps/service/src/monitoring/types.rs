use serde::{Deserialize, Serialize};

/// Reachability status of a monitored target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorStatus {
    Unknown,
    Up,
    Down,
}

impl std::fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitorStatus::Unknown => write!(f, "unknown"),
            MonitorStatus::Up => write!(f, "up"),
            MonitorStatus::Down => write!(f, "down"),
        }
    }
}

impl MonitorStatus {
    /// Parse the status string stored in the database
    pub fn from_db(value: &str) -> Self {
        match value {
            "up" => MonitorStatus::Up,
            "down" => MonitorStatus::Down,
            _ => MonitorStatus::Unknown,
        }
    }
}

/// Direction of an alert produced by a status transition.
///
/// Ephemeral: produced by the state machine, consumed by the dispatcher,
/// never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    Down,
    Recovered,
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertKind::Down => write!(f, "down"),
            AlertKind::Recovered => write!(f, "recovered"),
        }
    }
}
