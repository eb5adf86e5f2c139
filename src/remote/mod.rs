//! Remote classification provider.
//!
//! A single-attempt, fail-fast adapter around an external ML endpoint. It owns
//! the timeout and response validation; fallback policy belongs to the caller.

pub mod http;

pub use http::{ClassifierConfig, HttpClassifier};

use async_trait::async_trait;

use crate::error::ClassifierError;
use crate::pipeline::types::{EmailContent, Urgency};

/// A validated prediction from the remote model.
#[derive(Debug, Clone, PartialEq)]
pub struct RemotePrediction {
    pub score: f64,
    pub label: Urgency,
    pub latency_ms: Option<u64>,
    pub model_version: Option<String>,
}

/// Trait for remote urgency classifiers.
#[async_trait]
pub trait RemoteClassifier: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Classify one email. Exactly one network attempt; any malformed,
    /// mismatched or late response is an error, never a partial result.
    async fn classify(&self, email: &EmailContent) -> Result<RemotePrediction, ClassifierError>;
}
