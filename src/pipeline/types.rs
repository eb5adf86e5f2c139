//! Shared types for the triage pipeline.
//!
//! Field names serialize in camelCase to match the fixture and HTTP formats.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Inbound email ───────────────────────────────────────────────────

/// An email as handed to the pipeline by the ingestion collaborator.
///
/// Immutable once constructed; every component borrows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailContent {
    /// Stable identifier, unique within a session.
    pub id: String,
    /// Sender, either a bare address or `Name <address>`.
    pub from: String,
    pub subject: String,
    pub body_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_html: Option<String>,
    pub received_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

// ── Priority ────────────────────────────────────────────────────────

/// Urgency tier. Ordered so that `Urgent > Today > Later`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Later,
    Today,
    Urgent,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Later => "later",
            Self::Today => "today",
            Self::Urgent => "urgent",
        }
    }
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Urgency {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "urgent" => Ok(Self::Urgent),
            "today" => Ok(Self::Today),
            "later" => Ok(Self::Later),
            _ => Err(format!("Unknown urgency: {}", s)),
        }
    }
}

/// Which subsystem produced a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrioritySource {
    RemoteModel,
    Heuristic,
}

impl PrioritySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RemoteModel => "remote-model",
            Self::Heuristic => "heuristic",
        }
    }
}

/// Provenance attached to every classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityMeta {
    pub source: PrioritySource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    /// Score as reported by the producing subsystem, before blending.
    pub raw_score: f64,
}

/// An email with its urgency tier, confidence and provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrioritizedEmail {
    #[serde(flatten)]
    pub email: EmailContent,
    pub urgency: Urgency,
    /// Always within [0, 1].
    pub confidence: f64,
    pub priority_meta: PriorityMeta,
}

// ── Derived data ────────────────────────────────────────────────────

/// Kind of follow-up suggested for an email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailAction {
    Archive,
    Respond,
    Schedule,
    Delegate,
}

impl EmailAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Archive => "archive",
            Self::Respond => "respond",
            Self::Schedule => "schedule",
            Self::Delegate => "delegate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailActionSuggestion {
    pub action: EmailAction,
    pub rationale: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

impl EmailActionSuggestion {
    pub fn new(action: EmailAction, rationale: impl Into<String>) -> Self {
        Self {
            action,
            rationale: rationale.into(),
            metadata: None,
        }
    }
}

/// A contextual snippet related to an email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextResource {
    pub title: String,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

// ── Aggregate ───────────────────────────────────────────────────────

/// Everything the orchestrator derives for one email in one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailAgentOutput {
    pub email: PrioritizedEmail,
    pub summary: String,
    pub suggestions: Vec<EmailActionSuggestion>,
    pub contextual_insights: Vec<ContextResource>,
}
