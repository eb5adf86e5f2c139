//! Error types for mail triage.

use std::time::Duration;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Invalid rule pattern {pattern}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Remote classification provider errors.
///
/// Every variant is absorbed by the priority classifier and turned into a
/// heuristic fallback; none of them reach the orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("Missing classifier API key")]
    MissingApiKey,

    #[error("Failed to build classifier HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("Classifier request timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Classifier request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("Classifier returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid classifier response: {reason}")]
    InvalidResponse { reason: String },

    #[error("Mismatched prediction id: expected {expected}, received {received}")]
    IdMismatch { expected: String, received: String },
}

/// Generative text provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} returned an empty completion")]
    EmptyResponse { provider: String },
}

/// Orchestration errors.
///
/// Provider failures never show up here; only a sub-task that panicked or was
/// cancelled fails a run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Task {task} failed for email {email_id}: {reason}")]
    TaskFailed {
        task: &'static str,
        email_id: String,
        reason: String,
    },
}

/// In-memory store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Email not found: {id}")]
    NotFound { id: String },
}

/// Ingestion errors.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Missing required fields: {0}")]
    MissingFields(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse email fixtures: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}
