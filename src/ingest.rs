//! Email ingestion: request validation, fixture loading, and pushing emails
//! through the agent into the store.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::IngestError;
use crate::pipeline::EmailAgent;
use crate::pipeline::types::{EmailAgentOutput, EmailContent};
use crate::store::EmailStore;

/// An email as submitted by a caller or read from a fixture file. Only
/// `subject`, `bodyText` and `from` are required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEmail {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub body_text: Option<String>,
    #[serde(default)]
    pub body_html: Option<String>,
    #[serde(default)]
    pub received_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub labels: Option<Vec<String>>,
}

impl NewEmail {
    /// Validate and fill defaults: a v4 UUID id and `now` as receipt time.
    pub fn into_email(self, now: DateTime<Utc>) -> Result<EmailContent, IngestError> {
        let present = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.trim().is_empty());

        let missing: Vec<&str> = [
            ("subject", present(&self.subject)),
            ("bodyText", present(&self.body_text)),
            ("from", present(&self.from)),
        ]
        .into_iter()
        .filter(|(_, ok)| !ok)
        .map(|(name, _)| name)
        .collect();

        if !missing.is_empty() {
            return Err(IngestError::MissingFields(missing.join(", ")));
        }

        Ok(EmailContent {
            id: self
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            from: self.from.unwrap_or_default(),
            subject: self.subject.unwrap_or_default(),
            body_text: self.body_text.unwrap_or_default(),
            body_html: self.body_html,
            received_at: self.received_at.unwrap_or(now),
            thread_id: self.thread_id,
            labels: self.labels.unwrap_or_default(),
        })
    }
}

/// Read a JSON array of emails from `path`.
pub async fn load_fixtures(
    path: &Path,
    now: DateTime<Utc>,
) -> Result<Vec<EmailContent>, IngestError> {
    let raw = tokio::fs::read_to_string(path).await?;
    let emails: Vec<NewEmail> = serde_json::from_str(&raw)?;
    emails
        .into_iter()
        .map(|email| email.into_email(now))
        .collect()
}

/// Runs emails through the agent and records the outputs.
#[derive(Clone)]
pub struct Ingestor {
    agent: EmailAgent,
    store: Arc<EmailStore>,
    clock: Arc<dyn Clock>,
}

impl Ingestor {
    pub fn new(agent: EmailAgent, store: Arc<EmailStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            agent,
            store,
            clock,
        }
    }

    pub fn store(&self) -> &Arc<EmailStore> {
        &self.store
    }

    pub fn prepare(&self, email: NewEmail) -> Result<EmailContent, IngestError> {
        email.into_email(self.clock.now())
    }

    /// Process one email and store it, serialized per email id.
    pub async fn ingest(&self, email: EmailContent) -> Result<EmailAgentOutput, IngestError> {
        let id = email.id.clone();
        let agent = &self.agent;
        let output = self
            .store
            .upsert_with(&id, || async move { agent.run(email).await })
            .await?;
        Ok(output)
    }

    /// Process a batch concurrently. Any failure fails the batch, though the
    /// emails that succeeded stay stored.
    pub async fn ingest_all(
        &self,
        emails: Vec<EmailContent>,
    ) -> Result<Vec<EmailAgentOutput>, IngestError> {
        let count = emails.len();
        let results = join_all(emails.into_iter().map(|email| self.ingest(email))).await;
        let outputs = results.into_iter().collect::<Result<Vec<_>, _>>()?;
        info!(count, "Emails ingested");
        Ok(outputs)
    }

    /// Load fixtures and replace the store contents with their outputs.
    ///
    /// Nothing is replaced if loading or any run fails.
    pub async fn seed_from_fixtures(&self, path: &Path) -> Result<usize, IngestError> {
        let emails = load_fixtures(path, self.clock.now()).await?;
        let outputs = self
            .agent
            .run_batch(emails)
            .await
            .into_iter()
            .collect::<Result<Vec<_>, _>>()?;

        let count = outputs.len();
        self.store.replace_all(outputs).await;
        info!(count, path = %path.display(), "Seeded store from fixtures");
        Ok(count)
    }

    /// Seed only when the store is empty. Failures are logged, not returned.
    pub async fn seed_if_empty(&self, path: &Path) {
        if !self.store.is_empty().await {
            return;
        }
        if let Err(e) = self.seed_from_fixtures(path).await {
            warn!(error = %e, path = %path.display(), "Failed to seed sample emails");
        }
    }
}
