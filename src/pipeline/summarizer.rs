//! Summaries and follow-up suggestions.
//!
//! `summarize` asks the generative backend for three bullets and falls back
//! to a deterministic preview on any failure. `suggest_actions` is plain
//! keyword matching and always returns at least one suggestion.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::llm::provider::{CompletionRequest, LlmProvider};
use crate::pipeline::types::{EmailAction, EmailActionSuggestion, EmailContent};

const SUMMARY_TEMPERATURE: f32 = 0.4;
const SUMMARY_MAX_TOKENS: u32 = 200;

/// Body characters kept in the fallback preview.
const PREVIEW_CHARS: usize = 240;

/// Trigger phrases (matched case-insensitively against the body), the action
/// they suggest, and why.
const ACTION_RULES: &[(&[&str], EmailAction, &str)] = &[
    (
        &["schedule", "meeting", "call"],
        EmailAction::Schedule,
        "Sender is requesting to set up a meeting.",
    ),
    (
        &["can you", "please advise", "feedback"],
        EmailAction::Respond,
        "Sender is asking for a direct response.",
    ),
    (
        &["newsletter", "update"],
        EmailAction::Archive,
        "Likely informational update with no action required.",
    ),
];

const DEFAULT_RATIONALE: &str = "Default to drafting a reply when no obvious action detected.";

pub struct Summarizer {
    llm: Option<Arc<dyn LlmProvider>>,
}

impl Summarizer {
    pub fn new(llm: Option<Arc<dyn LlmProvider>>) -> Self {
        Self { llm }
    }

    pub fn has_llm(&self) -> bool {
        self.llm.is_some()
    }

    /// Three-bullet summary, or the fallback preview. Never fails.
    pub async fn summarize(&self, email: &EmailContent) -> String {
        let Some(llm) = &self.llm else {
            return fallback_summary(email);
        };

        let request = CompletionRequest::prompt(build_summary_prompt(email))
            .with_temperature(SUMMARY_TEMPERATURE)
            .with_max_tokens(SUMMARY_MAX_TOKENS);

        match llm.complete(request).await {
            Ok(response) => {
                let text = response.content.trim();
                if text.is_empty() {
                    warn!(id = %email.id, model = llm.model_name(), "Empty summary, using fallback");
                    fallback_summary(email)
                } else {
                    debug!(id = %email.id, tokens = response.output_tokens, "Summary generated");
                    text.to_string()
                }
            }
            Err(e) => {
                warn!(id = %email.id, error = %e, "Summary generation failed, using fallback");
                fallback_summary(email)
            }
        }
    }

    /// Every matching suggestion in rule order; a single `respond` default
    /// when nothing matches.
    pub fn suggest_actions(&self, email: &EmailContent) -> Vec<EmailActionSuggestion> {
        let body = email.body_text.to_lowercase();

        let suggestions: Vec<EmailActionSuggestion> = ACTION_RULES
            .iter()
            .filter(|(triggers, _, _)| triggers.iter().any(|t| body.contains(t)))
            .map(|(_, action, rationale)| EmailActionSuggestion::new(*action, *rationale))
            .collect();

        if suggestions.is_empty() {
            vec![EmailActionSuggestion::new(
                EmailAction::Respond,
                DEFAULT_RATIONALE,
            )]
        } else {
            suggestions
        }
    }
}

/// Deterministic bullet preview built from subject, sender and body.
pub fn fallback_summary(email: &EmailContent) -> String {
    let collapsed = email.body_text.split_whitespace().collect::<Vec<_>>().join(" ");
    let preview: String = collapsed.chars().take(PREVIEW_CHARS).collect();
    let ellipsis = if collapsed.chars().count() > PREVIEW_CHARS {
        "…"
    } else {
        ""
    };
    format!(
        "• Subject: {}\n• From: {}\n• Preview: {}{}",
        email.subject, email.from, preview, ellipsis
    )
}

fn build_summary_prompt(email: &EmailContent) -> String {
    format!(
        "You are Nomad, an executive assistant. Summarize the email below in three bullet points, \
         highlighting urgency, key ask, and next step.\n\
         Email Subject: {}\n\
         Email Body:\n{}",
        email.subject, email.body_text
    )
}
