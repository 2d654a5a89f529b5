use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info};
use uuid::Uuid;

use super::prober::Probe;
use super::state::{AlertPolicy, transition};
use super::types::MonitorStatus;
use crate::alerting::AlertDispatcher;
use crate::database::Store;
use crate::database::models::Monitor;

/// Failure modes of the delegated-report path
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("no monitor named {0}")]
    UnknownMonitor(String),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Check runner - drives the fixed-interval cycle over all monitors and
/// accepts status reports from delegated edge probers.
///
/// Both paths funnel through `apply_status`, so one codepath governs every
/// transition regardless of who performed the probe.
pub struct CheckRunner {
    store: Arc<dyn Store>,
    prober: Arc<dyn Probe>,
    dispatcher: Arc<AlertDispatcher>,
    policy: AlertPolicy,
    cycle_interval: Duration,
    edge_monitors: HashSet<String>,
    /// Per-record serialization: a monitor's read-transition-write sequence
    /// never overlaps with itself across the loop and the report path.
    record_locks: RwLock<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl CheckRunner {
    pub fn new(
        store: Arc<dyn Store>,
        prober: Arc<dyn Probe>,
        dispatcher: Arc<AlertDispatcher>,
        policy: AlertPolicy,
        cycle_interval: Duration,
        edge_monitors: HashSet<String>,
    ) -> Self {
        Self {
            store,
            prober,
            dispatcher,
            policy,
            cycle_interval,
            edge_monitors,
            record_locks: RwLock::new(HashMap::new()),
        }
    }

    /// Run check cycles until the shutdown signal fires
    pub fn spawn(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut timer = interval(self.cycle_interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!("Check loop started ({}s interval)", self.cycle_interval.as_secs());

            loop {
                tokio::select! {
                    _ = timer.tick() => self.run_cycle().await,
                    _ = shutdown.changed() => {
                        info!("Check loop shutting down");
                        break;
                    }
                }
            }
        })
    }

    /// Execute one full check cycle.
    ///
    /// Public so tests can drive cycles synchronously instead of waiting on
    /// the timer. A single misbehaving monitor never aborts the cycle.
    pub async fn run_cycle(&self) {
        let monitors = match self.store.get_monitors().await {
            Ok(monitors) => monitors,
            Err(error) => {
                error!("Failed to load monitors, skipping cycle: {error:#}");
                return;
            }
        };

        debug!("Starting check cycle over {} monitors", monitors.len());
        self.prune_record_locks(&monitors).await;

        for monitor in monitors {
            if self.edge_monitors.contains(&monitor.name) {
                debug!("Skipping {} - delegated to edge prober", monitor.name);
                continue;
            }

            let name = monitor.name.clone();
            if let Err(error) = self.check_monitor(monitor).await {
                error!("Check failed for monitor {name}: {error:#}");
            }
        }
    }

    /// Inbound delegated-report path: an edge prober reports a status for a
    /// monitor it owns, keyed by name.
    pub async fn apply_report(&self, name: &str, status: MonitorStatus) -> Result<(), ReportError> {
        let monitor = self
            .store
            .get_monitor_by_name(name)
            .await?
            .ok_or_else(|| ReportError::UnknownMonitor(name.to_string()))?;

        info!("Edge prober reported {} as {}", name, status);
        self.apply_status(monitor, status).await?;
        Ok(())
    }

    async fn check_monitor(&self, monitor: Monitor) -> Result<()> {
        let status = self.prober.probe(&monitor.target).await;
        self.apply_status(monitor, status).await
    }

    /// Transition, persist, then dispatch.
    ///
    /// The alert-sent flag is committed before any email goes out, so a slow
    /// or failed dispatch can never re-fire the threshold check next cycle.
    /// The record lock is released before dispatching - email I/O must not
    /// delay the next cycle's access to this monitor.
    async fn apply_status(&self, monitor: Monitor, status: MonitorStatus) -> Result<()> {
        let lock = self.record_lock(monitor.uuid).await;
        let guard = lock.lock().await;

        // Re-read under the lock: the probed snapshot may be stale if an
        // edge report landed between load and lock.
        let Some(current) = self.store.get_monitor_by_uuid(monitor.uuid).await? else {
            info!("Monitor {} was deleted mid-cycle, dropping result", monitor.name);
            return Ok(());
        };

        let (updated, alert) = transition(current, status, Utc::now(), &self.policy);
        let saved = self.store.update_monitor_state(&updated).await?;
        drop(guard);

        if !saved {
            info!("Monitor {} was deleted mid-cycle, dropping result", updated.name);
            return Ok(());
        }

        if let Some(kind) = alert {
            info!("Monitor {} transitioned, dispatching {} alert", updated.name, kind);
            self.dispatcher.dispatch(&updated, kind).await;
        }

        Ok(())
    }

    async fn record_lock(&self, uuid: Uuid) -> Arc<Mutex<()>> {
        if let Some(lock) = self.record_locks.read().await.get(&uuid) {
            return lock.clone();
        }

        let mut locks = self.record_locks.write().await;
        locks.entry(uuid).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// Drop locks for deleted monitors once nothing is holding them
    async fn prune_record_locks(&self, monitors: &[Monitor]) {
        let live: HashSet<Uuid> = monitors.iter().map(|m| m.uuid).collect();
        let mut locks = self.record_locks.write().await;
        locks.retain(|uuid, lock| live.contains(uuid) || Arc::strong_count(lock) > 1);
    }
}
