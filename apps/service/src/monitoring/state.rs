use chrono::{DateTime, Duration, Utc};

use super::types::{AlertKind, MonitorStatus};
use crate::database::models::{HISTORY_CAP, Monitor, StatusChange};

/// Alerting policy applied by the transition function
#[derive(Debug, Clone)]
pub struct AlertPolicy {
    /// How long a target must stay down before a down-alert fires
    pub down_threshold: Duration,
    /// Maximum retained status changes per monitor
    pub history_cap: usize,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self { down_threshold: Duration::minutes(2), history_cap: HISTORY_CAP }
    }
}

impl AlertPolicy {
    pub fn new(alert_after_minutes: i64, history_cap: usize) -> Self {
        Self { down_threshold: Duration::minutes(alert_after_minutes), history_cap }
    }
}

/// Apply a freshly probed status to a monitor's persisted state.
///
/// Pure function: the caller persists the returned monitor and only then
/// dispatches the returned alert, so a failed save never leaves an
/// uncommitted `alert_sent` flag behind a sent email.
///
/// A single call produces at most one alert: a recovery cannot coincide with
/// a sustained-down trigger, and a transition into down starts the outage
/// clock at zero.
pub fn transition(
    mut monitor: Monitor,
    new_status: MonitorStatus,
    now: DateTime<Utc>,
    policy: &AlertPolicy,
) -> (Monitor, Option<AlertKind>) {
    let mut alert = None;

    if new_status != monitor.status {
        monitor.push_history(StatusChange { status: new_status, at: now }, policy.history_cap);
        monitor.status = new_status;

        match new_status {
            MonitorStatus::Down => {
                monitor.down_since = Some(now);
                monitor.alert_sent = false;
            }
            MonitorStatus::Up => {
                if monitor.alert_sent {
                    alert = Some(AlertKind::Recovered);
                }
                monitor.down_since = None;
                monitor.alert_sent = false;
            }
            MonitorStatus::Unknown => {
                // An edge prober may reset a monitor to unknown; no outage
                // is in progress then, silently or otherwise.
                monitor.down_since = None;
                monitor.alert_sent = false;
            }
        }
    }

    // Re-evaluated on every cycle while down, not just on the cycle that
    // recorded the change.
    if monitor.status == MonitorStatus::Down && !monitor.alert_sent {
        // Rows written before the down_since column existed carry a down
        // status with no outage start; treat them as a fresh outage instead
        // of never alerting.
        let down_since = *monitor.down_since.get_or_insert(now);
        if now - down_since >= policy.down_threshold {
            monitor.alert_sent = true;
            alert = Some(AlertKind::Down);
        }
    }

    monitor.last_checked = Some(now);
    monitor.updated_at = now;

    (monitor, alert)
}
