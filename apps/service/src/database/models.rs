use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::monitoring::types::MonitorStatus;

/// Maximum number of status changes retained per monitor
pub const HISTORY_CAP: usize = 500;

/// A single recorded status transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: MonitorStatus,
    pub at: DateTime<Utc>,
}

/// Monitor model - a registered target whose reachability is checked
/// periodically.
///
/// `down_since` is set exactly while an outage is in progress; `alert_sent`
/// records whether a down-alert has already fired for the current outage and
/// is always false while the monitor is up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Monitor {
    pub id: Option<i64>,
    pub uuid: Uuid,
    pub name: String,
    pub target: String,
    pub status: MonitorStatus,
    pub last_checked: Option<DateTime<Utc>>,
    pub down_since: Option<DateTime<Utc>>,
    pub alert_sent: bool,
    pub history: Vec<StatusChange>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Monitor {
    /// Create a new monitor in the unknown state with an empty history
    pub fn new(name: String, target: String) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            uuid: Uuid::new_v4(),
            name,
            target,
            status: MonitorStatus::Unknown,
            last_checked: None,
            down_since: None,
            alert_sent: false,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a status change, evicting the oldest entry once the cap is
    /// reached.
    pub fn push_history(&mut self, change: StatusChange, cap: usize) {
        if self.history.len() >= cap {
            let excess = self.history.len() + 1 - cap;
            self.history.drain(..excess);
        }
        self.history.push(change);
    }

    /// Convert a timestamp to unix seconds for storage
    pub fn timestamp_to_i64(time: DateTime<Utc>) -> i64 {
        time.timestamp()
    }

    /// Convert unix seconds from storage back to a timestamp
    pub fn i64_to_timestamp(timestamp: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(timestamp, 0).single().unwrap_or_else(Utc::now)
    }
}

/// Subscriber model - an address registered to receive alert notifications
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscriber {
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl Subscriber {
    pub fn new(email: String) -> Self {
        Self { email, created_at: Utc::now() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_monitor_starts_unknown_with_empty_history() {
        let monitor = Monitor::new("api".into(), "https://api.example.com".into());
        assert_eq!(monitor.status, MonitorStatus::Unknown);
        assert!(monitor.history.is_empty());
        assert!(monitor.down_since.is_none());
        assert!(!monitor.alert_sent);
    }

    #[test]
    fn history_evicts_oldest_first_at_cap() {
        let mut monitor = Monitor::new("api".into(), "https://api.example.com".into());
        let base = Utc::now();
        for i in 0..HISTORY_CAP + 10 {
            let status =
                if i % 2 == 0 { MonitorStatus::Down } else { MonitorStatus::Up };
            monitor.push_history(
                StatusChange { status, at: base + chrono::Duration::seconds(i as i64) },
                HISTORY_CAP,
            );
        }
        assert_eq!(monitor.history.len(), HISTORY_CAP);
        // The ten oldest entries were evicted
        assert_eq!(monitor.history[0].at, base + chrono::Duration::seconds(10));
        assert_eq!(
            monitor.history.last().unwrap().at,
            base + chrono::Duration::seconds((HISTORY_CAP + 9) as i64)
        );
    }
}
