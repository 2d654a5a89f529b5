use anyhow::Result;
use async_trait::async_trait;
use libsql::{Row, params};
use uuid::Uuid;

use super::models::{Monitor, Subscriber};
use crate::monitoring::types::MonitorStatus;
use crate::pool::LibsqlPool;

const MONITOR_COLUMNS: &str =
    "id, uuid, name, target, status, last_checked, down_since, alert_sent, history, \
     created_at, updated_at";

/// Store trait for abstracting persistence operations
#[async_trait]
pub trait Store: Send + Sync {
    /// Get all monitors
    async fn get_monitors(&self) -> Result<Vec<Monitor>>;

    /// Get a monitor by UUID
    async fn get_monitor_by_uuid(&self, uuid: Uuid) -> Result<Option<Monitor>>;

    /// Get a monitor by display name (delegated-report lookup key)
    async fn get_monitor_by_name(&self, name: &str) -> Result<Option<Monitor>>;

    /// Insert a newly registered monitor
    async fn insert_monitor(&self, monitor: &Monitor) -> Result<i64>;

    /// Persist the outcome of a check cycle for one monitor.
    ///
    /// Returns false when the row no longer exists - the monitor was deleted
    /// while the cycle was in flight, an expected condition the caller skips
    /// over.
    async fn update_monitor_state(&self, monitor: &Monitor) -> Result<bool>;

    /// Delete a monitor by UUID
    async fn delete_monitor(&self, uuid: Uuid) -> Result<()>;

    /// Get all alert subscribers
    async fn get_subscribers(&self) -> Result<Vec<Subscriber>>;

    /// Register a subscriber; overwrites idempotently, keyed on address
    async fn upsert_subscriber(&self, subscriber: &Subscriber) -> Result<()>;

    /// Remove a subscriber
    async fn delete_subscriber(&self, email: &str) -> Result<()>;
}

/// LibSQL store implementation
pub struct LibsqlStore {
    pool: LibsqlPool,
}

impl LibsqlStore {
    pub fn new_from_pool(pool: LibsqlPool) -> Self {
        Self { pool }
    }

    async fn get_conn(&self) -> Result<deadpool::managed::Object<crate::pool::LibsqlManager>> {
        Ok(self.pool.get().await?)
    }
}

fn monitor_from_row(row: &Row) -> Result<Monitor> {
    let uuid_str: String = row.get(1)?;
    let status_str: String = row.get(4)?;
    let history_json: String = row.get(8)?;

    Ok(Monitor {
        id: Some(row.get(0)?),
        uuid: Uuid::parse_str(&uuid_str)?,
        name: row.get(2)?,
        target: row.get(3)?,
        status: MonitorStatus::from_db(&status_str),
        last_checked: row.get::<Option<i64>>(5)?.map(Monitor::i64_to_timestamp),
        down_since: row.get::<Option<i64>>(6)?.map(Monitor::i64_to_timestamp),
        alert_sent: row.get::<i64>(7)? != 0,
        history: serde_json::from_str(&history_json)?,
        created_at: Monitor::i64_to_timestamp(row.get(9)?),
        updated_at: Monitor::i64_to_timestamp(row.get(10)?),
    })
}

#[async_trait]
impl Store for LibsqlStore {
    async fn get_monitors(&self) -> Result<Vec<Monitor>> {
        let conn = self.get_conn().await?;
        let mut stmt = conn
            .prepare(&format!("SELECT {MONITOR_COLUMNS} FROM monitors ORDER BY created_at"))
            .await?;

        let mut rows = stmt.query(()).await?;
        let mut monitors = Vec::new();

        while let Some(row) = rows.next().await? {
            monitors.push(monitor_from_row(&row)?);
        }

        Ok(monitors)
    }

    async fn get_monitor_by_uuid(&self, uuid: Uuid) -> Result<Option<Monitor>> {
        let conn = self.get_conn().await?;
        let mut stmt = conn
            .prepare(&format!("SELECT {MONITOR_COLUMNS} FROM monitors WHERE uuid = ?"))
            .await?;

        let mut rows = stmt.query(params![uuid.to_string()]).await?;

        match rows.next().await? {
            Some(row) => Ok(Some(monitor_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn get_monitor_by_name(&self, name: &str) -> Result<Option<Monitor>> {
        let conn = self.get_conn().await?;
        let mut stmt = conn
            .prepare(&format!("SELECT {MONITOR_COLUMNS} FROM monitors WHERE name = ?"))
            .await?;

        let mut rows = stmt.query(params![name]).await?;

        match rows.next().await? {
            Some(row) => Ok(Some(monitor_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn insert_monitor(&self, monitor: &Monitor) -> Result<i64> {
        let conn = self.get_conn().await?;

        conn.execute(
            "INSERT INTO monitors (uuid, name, target, status, last_checked, down_since, \
             alert_sent, history, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                monitor.uuid.to_string(),
                monitor.name.clone(),
                monitor.target.clone(),
                monitor.status.to_string(),
                monitor.last_checked.map(Monitor::timestamp_to_i64),
                monitor.down_since.map(Monitor::timestamp_to_i64),
                if monitor.alert_sent { 1 } else { 0 },
                serde_json::to_string(&monitor.history)?,
                Monitor::timestamp_to_i64(monitor.created_at),
                Monitor::timestamp_to_i64(monitor.updated_at),
            ],
        )
        .await?;

        Ok(conn.last_insert_rowid())
    }

    async fn update_monitor_state(&self, monitor: &Monitor) -> Result<bool> {
        let conn = self.get_conn().await?;

        let affected = conn
            .execute(
                "UPDATE monitors SET status = ?, last_checked = ?, down_since = ?, \
                 alert_sent = ?, history = ?, updated_at = ? WHERE uuid = ?",
                params![
                    monitor.status.to_string(),
                    monitor.last_checked.map(Monitor::timestamp_to_i64),
                    monitor.down_since.map(Monitor::timestamp_to_i64),
                    if monitor.alert_sent { 1 } else { 0 },
                    serde_json::to_string(&monitor.history)?,
                    Monitor::timestamp_to_i64(monitor.updated_at),
                    monitor.uuid.to_string(),
                ],
            )
            .await?;

        Ok(affected > 0)
    }

    async fn delete_monitor(&self, uuid: Uuid) -> Result<()> {
        let conn = self.get_conn().await?;
        conn.execute("DELETE FROM monitors WHERE uuid = ?", params![uuid.to_string()]).await?;
        Ok(())
    }

    async fn get_subscribers(&self) -> Result<Vec<Subscriber>> {
        let conn = self.get_conn().await?;
        // created_at has whole-second precision; the email tiebreaker keeps
        // the order stable for subscribers registered within the same second.
        let mut stmt = conn
            .prepare("SELECT email, created_at FROM subscribers ORDER BY created_at, email")
            .await?;

        let mut rows = stmt.query(()).await?;
        let mut subscribers = Vec::new();

        while let Some(row) = rows.next().await? {
            subscribers.push(Subscriber {
                email: row.get(0)?,
                created_at: Monitor::i64_to_timestamp(row.get(1)?),
            });
        }

        Ok(subscribers)
    }

    async fn upsert_subscriber(&self, subscriber: &Subscriber) -> Result<()> {
        let conn = self.get_conn().await?;

        conn.execute(
            "INSERT INTO subscribers (email, created_at) VALUES (?, ?) \
             ON CONFLICT(email) DO UPDATE SET created_at = excluded.created_at",
            params![
                subscriber.email.clone(),
                Monitor::timestamp_to_i64(subscriber.created_at)
            ],
        )
        .await?;

        Ok(())
    }

    async fn delete_subscriber(&self, email: &str) -> Result<()> {
        let conn = self.get_conn().await?;
        conn.execute("DELETE FROM subscribers WHERE email = ?", params![email]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::create_test_store;
    use chrono::Utc;

    #[tokio::test]
    async fn monitor_roundtrip_preserves_state() -> Result<()> {
        let (store, _dir) = create_test_store().await?;

        let mut monitor = Monitor::new("api".into(), "https://api.example.com".into());
        monitor.status = MonitorStatus::Down;
        monitor.down_since = Some(Utc::now());
        monitor.alert_sent = true;
        monitor.push_history(
            crate::database::models::StatusChange {
                status: MonitorStatus::Down,
                at: Utc::now(),
            },
            crate::database::models::HISTORY_CAP,
        );
        store.insert_monitor(&monitor).await?;

        let loaded = store.get_monitor_by_uuid(monitor.uuid).await?.unwrap();
        assert_eq!(loaded.name, "api");
        assert_eq!(loaded.status, MonitorStatus::Down);
        assert!(loaded.alert_sent);
        assert!(loaded.down_since.is_some());
        assert_eq!(loaded.history.len(), 1);
        assert_eq!(loaded.history[0].status, MonitorStatus::Down);

        let by_name = store.get_monitor_by_name("api").await?.unwrap();
        assert_eq!(by_name.uuid, monitor.uuid);

        Ok(())
    }

    #[tokio::test]
    async fn update_of_deleted_monitor_reports_vanished() -> Result<()> {
        let (store, _dir) = create_test_store().await?;

        let monitor = Monitor::new("gone".into(), "https://gone.example.com".into());
        store.insert_monitor(&monitor).await?;
        assert!(store.update_monitor_state(&monitor).await?);

        store.delete_monitor(monitor.uuid).await?;
        assert!(!store.update_monitor_state(&monitor).await?);

        Ok(())
    }

    #[tokio::test]
    async fn subscribers_in_the_same_second_come_back_in_email_order() -> Result<()> {
        let (store, _dir) = create_test_store().await?;

        let at = Utc::now();
        for email in ["c@example.com", "a@example.com", "b@example.com"] {
            store.upsert_subscriber(&Subscriber { email: email.into(), created_at: at }).await?;
        }

        let emails: Vec<String> =
            store.get_subscribers().await?.into_iter().map(|s| s.email).collect();
        assert_eq!(emails, vec!["a@example.com", "b@example.com", "c@example.com"]);

        Ok(())
    }

    #[tokio::test]
    async fn subscriber_upsert_is_idempotent() -> Result<()> {
        let (store, _dir) = create_test_store().await?;

        let subscriber = Subscriber::new("ops@example.com".into());
        store.upsert_subscriber(&subscriber).await?;
        store.upsert_subscriber(&subscriber).await?;

        let subscribers = store.get_subscribers().await?;
        assert_eq!(subscribers.len(), 1);
        assert_eq!(subscribers[0].email, "ops@example.com");

        store.delete_subscriber("ops@example.com").await?;
        assert!(store.get_subscribers().await?.is_empty());

        Ok(())
    }
}
