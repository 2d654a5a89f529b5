use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Outbound sender identity: the from-address and the credential used to
/// authenticate with the mail provider.
///
/// Shared sending quotas sometimes require routing different recipients
/// through different accounts, so the dispatcher looks identities up per
/// recipient instead of holding a single global one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SenderIdentity {
    pub from: String,
    pub token: String,
}

/// Mailer trait abstracting the outbound email transport
#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    async fn send(
        &self,
        sender: &SenderIdentity,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<()>;
}

#[derive(Serialize)]
struct OutboundMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

/// Mailer that delivers through a transactional-email HTTP API
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpMailer {
    pub fn new(endpoint: String, timeout_seconds: u64) -> Result<Self> {
        let client =
            reqwest::Client::builder().timeout(Duration::from_secs(timeout_seconds)).build()?;

        Ok(Self { client, endpoint })
    }
}

#[async_trait::async_trait]
impl Mailer for HttpMailer {
    async fn send(
        &self,
        sender: &SenderIdentity,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<()> {
        let message = OutboundMessage { from: &sender.from, to, subject, text: body };

        self.client
            .post(&self.endpoint)
            .bearer_auth(&sender.token)
            .json(&message)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}
