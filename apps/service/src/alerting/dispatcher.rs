use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use super::mailer::{Mailer, SenderIdentity};
use crate::database::Store;
use crate::database::models::Monitor;
use crate::monitoring::types::AlertKind;

/// Lookup of outbound sender identities.
///
/// Per-recipient overrides win over the default identity. When overrides are
/// configured and a recipient has neither an override nor a default, that
/// recipient is skipped.
pub struct SenderDirectory {
    default: Option<SenderIdentity>,
    overrides: HashMap<String, SenderIdentity>,
}

impl SenderDirectory {
    pub fn new(
        default: Option<SenderIdentity>,
        overrides: HashMap<String, SenderIdentity>,
    ) -> Self {
        Self { default, overrides }
    }

    pub fn sender_for(&self, email: &str) -> Option<&SenderIdentity> {
        self.overrides.get(email).or(self.default.as_ref())
    }
}

/// Alert dispatcher - fans a down/recovered notification out to every
/// subscriber.
///
/// Best-effort by contract: dispatch never reports failure to the monitoring
/// cycle. The alert-sent flag was persisted before this runs, so a lost email
/// is accepted rather than retried.
pub struct AlertDispatcher {
    store: Arc<dyn Store>,
    mailer: Arc<dyn Mailer>,
    senders: SenderDirectory,
}

impl AlertDispatcher {
    pub fn new(store: Arc<dyn Store>, mailer: Arc<dyn Mailer>, senders: SenderDirectory) -> Self {
        Self { store, mailer, senders }
    }

    pub async fn dispatch(&self, monitor: &Monitor, kind: AlertKind) {
        let subscribers = match self.store.get_subscribers().await {
            Ok(subscribers) => subscribers,
            Err(error) => {
                warn!("Failed to load subscribers for {} alert: {error:#}", kind);
                return;
            }
        };

        if subscribers.is_empty() {
            debug!("No subscribers registered, skipping {} alert for {}", kind, monitor.name);
            return;
        }

        let (subject, body) = compose(monitor, kind);

        for subscriber in &subscribers {
            let Some(sender) = self.senders.sender_for(&subscriber.email) else {
                warn!(
                    "No sender identity mapped for {}, skipping {} alert",
                    subscriber.email, kind
                );
                continue;
            };

            // Each recipient independent: one failed send must not starve
            // the rest of the list.
            match self.mailer.send(sender, &subscriber.email, &subject, &body).await {
                Ok(()) => {
                    debug!("Sent {} alert for {} to {}", kind, monitor.name, subscriber.email);
                }
                Err(error) => {
                    warn!(
                        "Failed to send {} alert for {} to {}: {error:#}",
                        kind, monitor.name, subscriber.email
                    );
                }
            }
        }
    }
}

fn compose(monitor: &Monitor, kind: AlertKind) -> (String, String) {
    match kind {
        AlertKind::Down => (
            format!("[Watchpost] {} is DOWN", monitor.name),
            format!(
                "{} ({}) has been unreachable past the alert threshold.\n\n\
                 You will be notified again when it recovers.",
                monitor.name, monitor.target
            ),
        ),
        AlertKind::Recovered => (
            format!("[Watchpost] {} has recovered", monitor.name),
            format!("{} ({}) is reachable again.", monitor.name, monitor.target),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, anyhow};
    use std::sync::Mutex;

    use crate::database::models::Subscriber;
    use crate::database::test_support::create_test_store;

    /// Records every delivery attempt; fails sends to one configured address
    struct RecordingMailer {
        sent: Mutex<Vec<(String, String)>>,
        fail_for: Option<String>,
    }

    impl RecordingMailer {
        fn new(fail_for: Option<String>) -> Arc<Self> {
            Arc::new(Self { sent: Mutex::new(Vec::new()), fail_for })
        }

        fn sent_to(&self) -> Vec<String> {
            self.sent.lock().unwrap().iter().map(|(to, _)| to.clone()).collect()
        }
    }

    #[async_trait::async_trait]
    impl Mailer for RecordingMailer {
        async fn send(
            &self,
            _sender: &SenderIdentity,
            to: &str,
            subject: &str,
            _body: &str,
        ) -> Result<()> {
            if self.fail_for.as_deref() == Some(to) {
                return Err(anyhow!("mailbox unavailable"));
            }
            self.sent.lock().unwrap().push((to.to_string(), subject.to_string()));
            Ok(())
        }
    }

    fn default_sender() -> SenderIdentity {
        SenderIdentity { from: "alerts@watchpost.example".into(), token: "test-token".into() }
    }

    fn test_monitor() -> Monitor {
        Monitor::new("api".into(), "https://api.example.com".into())
    }

    #[tokio::test]
    async fn one_failing_recipient_does_not_block_the_rest() -> Result<()> {
        let (store, _dir) = create_test_store().await?;
        let store = Arc::new(store);
        for email in ["a@example.com", "b@example.com", "c@example.com"] {
            store.upsert_subscriber(&Subscriber::new(email.into())).await?;
        }

        let mailer = RecordingMailer::new(Some("b@example.com".into()));
        let dispatcher = AlertDispatcher::new(
            store,
            mailer.clone(),
            SenderDirectory::new(Some(default_sender()), HashMap::new()),
        );

        dispatcher.dispatch(&test_monitor(), AlertKind::Down).await;

        let sent = mailer.sent_to();
        assert_eq!(sent, vec!["a@example.com".to_string(), "c@example.com".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn empty_subscriber_list_is_a_noop() -> Result<()> {
        let (store, _dir) = create_test_store().await?;
        let mailer = RecordingMailer::new(None);
        let dispatcher = AlertDispatcher::new(
            Arc::new(store),
            mailer.clone(),
            SenderDirectory::new(Some(default_sender()), HashMap::new()),
        );

        dispatcher.dispatch(&test_monitor(), AlertKind::Recovered).await;
        assert!(mailer.sent_to().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn unmapped_recipient_is_skipped_when_routing_per_recipient() -> Result<()> {
        let (store, _dir) = create_test_store().await?;
        let store = Arc::new(store);
        store.upsert_subscriber(&Subscriber::new("mapped@example.com".into())).await?;
        store.upsert_subscriber(&Subscriber::new("unmapped@example.com".into())).await?;

        let mut overrides = HashMap::new();
        overrides.insert("mapped@example.com".to_string(), default_sender());

        let mailer = RecordingMailer::new(None);
        // No default identity: only mapped recipients can be routed
        let dispatcher =
            AlertDispatcher::new(store, mailer.clone(), SenderDirectory::new(None, overrides));

        dispatcher.dispatch(&test_monitor(), AlertKind::Down).await;
        assert_eq!(mailer.sent_to(), vec!["mapped@example.com".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn down_and_recovered_subjects_differ() -> Result<()> {
        let (store, _dir) = create_test_store().await?;
        let store = Arc::new(store);
        store.upsert_subscriber(&Subscriber::new("ops@example.com".into())).await?;

        let mailer = RecordingMailer::new(None);
        let dispatcher = AlertDispatcher::new(
            store,
            mailer.clone(),
            SenderDirectory::new(Some(default_sender()), HashMap::new()),
        );

        let monitor = test_monitor();
        dispatcher.dispatch(&monitor, AlertKind::Down).await;
        dispatcher.dispatch(&monitor, AlertKind::Recovered).await;

        let sent = mailer.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].1.contains("DOWN"));
        assert!(sent[1].1.contains("recovered"));
        Ok(())
    }
}
