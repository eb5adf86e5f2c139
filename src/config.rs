//! Configuration types.
//!
//! Everything is read once from the environment at startup and handed to
//! components by value; nothing re-reads it per call.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::{LlmBackend, LlmConfig};
use crate::pipeline::context::DEFAULT_MAX_RESULTS;
use crate::pipeline::heuristic::{
    DEFAULT_KEYWORDS, DEFAULT_TRUSTED_DOMAINS, HeuristicConfig, Thresholds,
};
use crate::remote::ClassifierConfig;
use crate::remote::http::{DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_TIMEOUT_MS};

pub const DEFAULT_PORT: u16 = 8081;
pub const DEFAULT_SAMPLES_PATH: &str = "data/sample-emails.json";

/// Top-level triage configuration.
#[derive(Debug, Clone)]
pub struct TriageConfig {
    /// Remote classifier; `None` means heuristic-only.
    pub classifier: Option<ClassifierConfig>,
    /// Generative backend; `None` means fallback summaries and replies.
    pub llm: Option<LlmConfig>,
    pub heuristic: HeuristicConfig,
    /// Context fetcher cap.
    pub context_max_results: usize,
    pub server: ServerConfig,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            classifier: None,
            llm: None,
            heuristic: HeuristicConfig::default(),
            context_max_results: DEFAULT_MAX_RESULTS,
            server: ServerConfig::default(),
        }
    }
}

/// HTTP surface configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Allowed CORS origins. Empty allows any origin.
    pub cors_origins: Vec<String>,
    /// JSON fixture used to seed an empty store.
    pub samples_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            cors_origins: Vec::new(),
            samples_path: PathBuf::from(DEFAULT_SAMPLES_PATH),
        }
    }
}

impl TriageConfig {
    /// Build from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        let classifier = match vars.get("TRIAGE_CLASSIFIER_API_KEY") {
            Some(api_key) => Some(ClassifierConfig {
                api_key: SecretString::from(api_key),
                base_url: vars
                    .get("TRIAGE_CLASSIFIER_URL")
                    .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
                model: vars
                    .get("TRIAGE_CLASSIFIER_MODEL")
                    .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                timeout: Duration::from_millis(
                    vars.parse("TRIAGE_CLASSIFIER_TIMEOUT_MS", DEFAULT_TIMEOUT_MS)?,
                ),
            }),
            None => None,
        };

        let backend: LlmBackend = match vars.get("TRIAGE_LLM_BACKEND") {
            Some(raw) => raw.parse().map_err(|message| ConfigError::InvalidValue {
                key: "TRIAGE_LLM_BACKEND".into(),
                message,
            })?,
            None => LlmBackend::OpenAi,
        };
        let key_var = match backend {
            LlmBackend::OpenAi => "OPENAI_API_KEY",
            LlmBackend::Anthropic => "ANTHROPIC_API_KEY",
        };
        let llm = vars.get(key_var).map(|api_key| LlmConfig {
            backend,
            api_key: SecretString::from(api_key),
            model: vars
                .get("TRIAGE_LLM_MODEL")
                .unwrap_or_else(|| backend.default_model().to_string()),
        });

        let defaults = Thresholds::default();
        let thresholds = Thresholds {
            urgent: vars.parse("TRIAGE_URGENT_THRESHOLD", defaults.urgent)?,
            today: vars.parse("TRIAGE_TODAY_THRESHOLD", defaults.today)?,
        };
        validate_thresholds(&thresholds)?;

        let heuristic = HeuristicConfig {
            keywords: vars.list("TRIAGE_KEYWORDS", DEFAULT_KEYWORDS),
            trusted_domains: vars.list("TRIAGE_TRUSTED_DOMAINS", DEFAULT_TRUSTED_DOMAINS),
            thresholds,
        };

        let server = ServerConfig {
            port: vars.parse("TRIAGE_PORT", DEFAULT_PORT)?,
            cors_origins: vars.list("TRIAGE_CORS_ORIGINS", &[]),
            samples_path: vars
                .get("TRIAGE_SAMPLES_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SAMPLES_PATH)),
        };

        Ok(Self {
            classifier,
            llm,
            heuristic,
            context_max_results: vars.parse("TRIAGE_CONTEXT_MAX_RESULTS", DEFAULT_MAX_RESULTS)?,
            server,
        })
    }
}

fn validate_thresholds(thresholds: &Thresholds) -> Result<(), ConfigError> {
    for (key, value) in [
        ("TRIAGE_URGENT_THRESHOLD", thresholds.urgent),
        ("TRIAGE_TODAY_THRESHOLD", thresholds.today),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(ConfigError::InvalidValue {
                key: key.into(),
                message: format!("{value} is outside [0, 1]"),
            });
        }
    }
    if thresholds.today > thresholds.urgent {
        return Err(ConfigError::InvalidValue {
            key: "TRIAGE_TODAY_THRESHOLD".into(),
            message: format!(
                "today threshold {} exceeds urgent threshold {}",
                thresholds.today, thresholds.urgent
            ),
        });
    }
    Ok(())
}

struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T: FromStr>(&self, key: &str, default: T) -> Result<T, ConfigError> {
        match self.get(key) {
            Some(raw) => raw.parse::<T>().map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("cannot parse '{raw}'"),
            }),
            None => Ok(default),
        }
    }

    fn list(&self, key: &str, default: &[&str]) -> Vec<String> {
        match self.get(key) {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(String::from)
                .collect(),
            None => default.iter().map(|item| item.to_string()).collect(),
        }
    }
}
