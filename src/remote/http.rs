//! HTTP remote classifier over reqwest.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::{RemoteClassifier, RemotePrediction};
use crate::error::ClassifierError;
use crate::pipeline::types::{EmailContent, Urgency};

pub const DEFAULT_BASE_URL: &str = "https://api.phenoml.com/v1";
pub const DEFAULT_MODEL: &str = "nomad-email-priority";
pub const DEFAULT_TIMEOUT_MS: u64 = 1500;

/// Max characters of an error body kept in `ClassifierError::Status`.
const ERROR_BODY_PREVIEW_CHARS: usize = 200;

/// Remote classifier configuration.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub api_key: SecretString,
    /// Base URL; `/classify` is appended.
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl ClassifierConfig {
    /// Config with default endpoint, model and timeout.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::from(api_key.into()),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    model: &'a str,
    inputs: [ClassifyInput<'a>; 1],
}

#[derive(Serialize)]
struct ClassifyInput<'a> {
    id: &'a str,
    subject: &'a str,
    body: &'a str,
    from: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    labels: Option<&'a [String]>,
}

/// Remote classifier speaking the `/classify` JSON contract.
pub struct HttpClassifier {
    client: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
    model: String,
    timeout: Duration,
}

impl HttpClassifier {
    /// Build the client. Fails when the API key is blank.
    pub fn new(config: ClassifierConfig) -> Result<Self, ClassifierError> {
        if config.api_key.expose_secret().trim().is_empty() {
            return Err(ClassifierError::MissingApiKey);
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ClassifierError::ClientBuild)?;

        Ok(Self {
            client,
            endpoint: format!("{}/classify", config.base_url.trim_end_matches('/')),
            api_key: config.api_key,
            model: config.model,
            timeout: config.timeout,
        })
    }

    fn map_transport_error(&self, err: reqwest::Error) -> ClassifierError {
        if err.is_timeout() {
            ClassifierError::Timeout {
                timeout: self.timeout,
            }
        } else if err.is_decode() {
            ClassifierError::InvalidResponse {
                reason: format!("unreadable body: {err}"),
            }
        } else {
            ClassifierError::Request(err)
        }
    }
}

#[async_trait]
impl RemoteClassifier for HttpClassifier {
    fn name(&self) -> &str {
        &self.model
    }

    async fn classify(&self, email: &EmailContent) -> Result<RemotePrediction, ClassifierError> {
        let request = ClassifyRequest {
            model: &self.model,
            inputs: [ClassifyInput {
                id: &email.id,
                subject: &email.subject,
                body: &email.body_text,
                from: &email.from,
                labels: (!email.labels.is_empty()).then_some(email.labels.as_slice()),
            }],
        };

        let started = Instant::now();
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifierError::Status {
                status: status.as_u16(),
                body: body.chars().take(ERROR_BODY_PREVIEW_CHARS).collect(),
            });
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let mut prediction = parse_prediction(&json, &email.id)?;
        if prediction.latency_ms.is_none() {
            prediction.latency_ms = Some(started.elapsed().as_millis() as u64);
        }

        debug!(
            id = %email.id,
            score = prediction.score,
            label = %prediction.label,
            latency_ms = prediction.latency_ms,
            "Remote classification succeeded"
        );

        Ok(prediction)
    }
}

/// Validate a `/classify` response body for the email `expected_id`.
pub(crate) fn parse_prediction(
    json: &Value,
    expected_id: &str,
) -> Result<RemotePrediction, ClassifierError> {
    let invalid = |reason: &str| ClassifierError::InvalidResponse {
        reason: reason.to_string(),
    };

    if !json.is_object() {
        return Err(invalid("payload is not a JSON object"));
    }

    let info = json
        .get("predictions")
        .and_then(Value::as_array)
        .and_then(|predictions| predictions.first())
        .ok_or_else(|| invalid("missing predictions"))?;

    if let Some(received) = echoed_id(info)
        && received != expected_id
    {
        return Err(ClassifierError::IdMismatch {
            expected: expected_id.to_string(),
            received,
        });
    }

    let score = match info.get("score") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|s| s.is_finite())
    .ok_or_else(|| invalid("missing or non-numeric score"))?;

    let label = info
        .get("label")
        .and_then(Value::as_str)
        .and_then(|l| l.parse::<Urgency>().ok())
        .ok_or_else(|| invalid("missing or unknown label"))?;

    let latency_ms = info
        .get("latency_ms")
        .or_else(|| info.get("latencyMs"))
        .and_then(|v| v.as_u64().or_else(|| v.as_f64().map(|f| f.max(0.0).round() as u64)));

    let model_version = info
        .get("model_version")
        .or_else(|| info.get("modelVersion"))
        .and_then(Value::as_str)
        .map(String::from);

    Ok(RemotePrediction {
        score,
        label,
        latency_ms,
        model_version,
    })
}

/// The id echoed by the provider, if any. Empty strings and null count as absent.
fn echoed_id(info: &Value) -> Option<String> {
    match info.get("id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
