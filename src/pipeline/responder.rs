//! Reply drafting and quick responses.
//!
//! Uses the generative backend when one is configured; otherwise, or when a
//! call fails or comes back empty, returns a template reply so the caller
//! always has something to show.

use std::sync::{Arc, LazyLock};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};
use crate::pipeline::types::PrioritizedEmail;

const REPLY_TEMPERATURE: f32 = 0.7;
const REPLY_MAX_TOKENS: u32 = 500;
const QUICK_TEMPERATURE: f32 = 0.8;
const QUICK_MAX_TOKENS: u32 = 150;
const QUICK_RESPONSE_COUNT: usize = 3;
const QUICK_PREVIEW_CHARS: usize = 200;

const CANNED_QUICK_RESPONSES: &[&str] = &[
    "I'll review this and get back to you shortly.",
    "Thank you for your email. I'll look into this right away.",
    "I appreciate you bringing this to my attention. Let me investigate and respond properly.",
    "Thanks for reaching out. I'll need to check on this and will follow up soon.",
    "I've received your message and will respond with the information you need.",
];

static DISPLAY_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""?([^"<]+)"?\s*<.*>"#).expect("valid display name regex"));
static LIST_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\s*").expect("valid list number regex"));

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyTone {
    Formal,
    Casual,
    Friendly,
    #[default]
    Professional,
}

impl ReplyTone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Formal => "formal",
            Self::Casual => "casual",
            Self::Friendly => "friendly",
            Self::Professional => "professional",
        }
    }

    fn instruction(&self) -> &'static str {
        match self {
            Self::Formal => {
                "Use formal business language, proper titles, and maintain professional distance."
            }
            Self::Casual => "Use relaxed, conversational language while remaining respectful.",
            Self::Friendly => "Use warm, approachable language with a personal touch.",
            Self::Professional => {
                "Use clear, concise business language that is professional yet personable."
            }
        }
    }
}

/// What the reply should do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyIntent {
    Accept,
    Decline,
    #[default]
    Acknowledge,
    Inquire,
    Custom,
}

impl ReplyIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Decline => "decline",
            Self::Acknowledge => "acknowledge",
            Self::Inquire => "inquire",
            Self::Custom => "custom",
        }
    }

    fn instruction(&self) -> &'static str {
        match self {
            Self::Accept => {
                "Accept the proposal or invitation with enthusiasm and confirm next steps."
            }
            Self::Decline => {
                "Politely decline while expressing appreciation and leaving the door open for future opportunities."
            }
            Self::Acknowledge => {
                "Acknowledge receipt and indicate you will review and respond appropriately."
            }
            Self::Inquire => "Ask clarifying questions to better understand the request or proposal.",
            Self::Custom => "Respond according to the custom instructions provided.",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReplyOptions {
    pub tone: ReplyTone,
    #[serde(alias = "action")]
    pub intent: ReplyIntent,
    /// Mention the urgency tier in the prompt.
    pub include_context: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyMetadata {
    pub original_email_id: String,
    pub generated_at: DateTime<Utc>,
    pub tone: ReplyTone,
    pub intent: ReplyIntent,
    /// False when the template reply was used.
    pub generated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedReply {
    pub subject: String,
    pub body: String,
    pub body_html: String,
    pub metadata: ReplyMetadata,
}

pub struct ResponseGenerator {
    llm: Option<Arc<dyn LlmProvider>>,
    clock: Arc<dyn Clock>,
}

impl ResponseGenerator {
    pub fn new(llm: Option<Arc<dyn LlmProvider>>) -> Self {
        Self::with_clock(llm, Arc::new(SystemClock))
    }

    pub fn with_clock(llm: Option<Arc<dyn LlmProvider>>, clock: Arc<dyn Clock>) -> Self {
        Self { llm, clock }
    }

    /// Draft a reply. Falls back to the template on any backend failure.
    pub async fn generate_reply(
        &self,
        email: &PrioritizedEmail,
        options: &ReplyOptions,
    ) -> GeneratedReply {
        let drafted = match &self.llm {
            Some(llm) => self.draft_with_llm(llm.as_ref(), email, options).await,
            None => None,
        };

        let (body, generated) = match drafted {
            Some(body) => (body, true),
            None => (fallback_body(email), false),
        };

        GeneratedReply {
            subject: reply_subject(&email.email.subject),
            body_html: to_html(&body),
            body,
            metadata: ReplyMetadata {
                original_email_id: email.email.id.clone(),
                generated_at: self.clock.now(),
                tone: options.tone,
                intent: options.intent,
                generated,
            },
        }
    }

    /// Draft replies for several emails concurrently, in input order.
    pub async fn generate_bulk_replies(
        &self,
        emails: &[PrioritizedEmail],
        options: &ReplyOptions,
    ) -> Vec<GeneratedReply> {
        join_all(emails.iter().map(|email| self.generate_reply(email, options))).await
    }

    /// Up to three one-line responses.
    pub async fn generate_quick_responses(&self, email: &PrioritizedEmail) -> Vec<String> {
        let canned = || {
            CANNED_QUICK_RESPONSES
                .iter()
                .take(QUICK_RESPONSE_COUNT)
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
        };

        let Some(llm) = &self.llm else {
            return canned();
        };

        let preview: String = email
            .email
            .body_text
            .chars()
            .take(QUICK_PREVIEW_CHARS)
            .collect();
        let request = CompletionRequest::new(vec![
            ChatMessage::system(
                "Generate 3 short, professional quick response options for the given email. \
                 Each response should be one sentence and under 20 words.",
            ),
            ChatMessage::user(format!(
                "Email subject: {}\nEmail preview: {}",
                email.email.subject, preview
            )),
        ])
        .with_temperature(QUICK_TEMPERATURE)
        .with_max_tokens(QUICK_MAX_TOKENS);

        match llm.complete(request).await {
            Ok(response) => {
                let responses = parse_quick_responses(&response.content);
                if responses.is_empty() {
                    warn!(id = %email.email.id, "No quick responses parsed, using canned set");
                    canned()
                } else {
                    responses
                }
            }
            Err(e) => {
                warn!(id = %email.email.id, error = %e, "Quick response generation failed");
                canned()
            }
        }
    }

    async fn draft_with_llm(
        &self,
        llm: &dyn LlmProvider,
        email: &PrioritizedEmail,
        options: &ReplyOptions,
    ) -> Option<String> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(build_system_prompt(options)),
            ChatMessage::user(build_user_prompt(email, options)),
        ])
        .with_temperature(REPLY_TEMPERATURE)
        .with_max_tokens(REPLY_MAX_TOKENS);

        match llm.complete(request).await {
            Ok(response) => {
                let body = format_body(&response.content);
                if body.is_empty() {
                    warn!(id = %email.email.id, "Empty reply draft, using template");
                    None
                } else {
                    debug!(id = %email.email.id, tone = options.tone.as_str(), "Reply drafted");
                    Some(body)
                }
            }
            Err(e) => {
                warn!(id = %email.email.id, error = %e, "Reply generation failed, using template");
                None
            }
        }
    }
}

fn build_system_prompt(options: &ReplyOptions) -> String {
    format!(
        "You are an AI email assistant helping to draft professional email responses.\n\
         Tone: {}\n\
         Action: {}\n\n\
         Keep responses concise, clear, and appropriate for business communication.\n\
         Do not include email headers, signatures, or formatting instructions in your response.\n\
         Provide only the body text of the email.",
        options.tone.instruction(),
        options.intent.instruction()
    )
}

fn build_user_prompt(email: &PrioritizedEmail, options: &ReplyOptions) -> String {
    let mut prompt = String::with_capacity(256 + email.email.body_text.len());
    prompt.push_str("Please draft a reply to this email:\n\n");
    prompt.push_str(&format!("From: {}\n", email.email.from));
    prompt.push_str(&format!("Subject: {}\n", email.email.subject));
    prompt.push_str(&format!("Content: {}\n\n", email.email.body_text));

    if let Some(instructions) = options
        .custom_instructions
        .as_deref()
        .filter(|s| !s.trim().is_empty())
    {
        prompt.push_str(&format!("Additional instructions: {}\n", instructions));
    }
    if options.include_context {
        prompt.push_str(&format!(
            "Note: This email is marked as {} priority.\n",
            email.urgency
        ));
    }
    prompt
}

fn fallback_body(email: &PrioritizedEmail) -> String {
    format!(
        "Hi {},\n\nThanks for your message about “{}”. I'll review this and follow up shortly.\n\nBest,\nNomad Assistant",
        display_name(&email.email.from),
        email.email.subject
    )
}

/// `Re: ` prefix unless the subject already has one.
pub fn reply_subject(subject: &str) -> String {
    if subject.to_lowercase().starts_with("re:") {
        subject.to_string()
    } else {
        format!("Re: {subject}")
    }
}

/// Name from `Name <addr>`, else the title-cased local part, else "there".
pub fn display_name(from: &str) -> String {
    if let Some(name) = DISPLAY_NAME_RE
        .captures(from)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|name| !name.is_empty())
    {
        return name.to_string();
    }

    let local = from.split('@').next().unwrap_or_default().replace(['.', '_'], " ");
    let mut titled = String::with_capacity(local.len());
    let mut at_word_start = true;
    for c in local.chars() {
        if at_word_start && c.is_alphanumeric() {
            titled.extend(c.to_uppercase());
        } else {
            titled.push(c);
        }
        at_word_start = !c.is_alphanumeric();
    }

    let titled = titled.trim();
    if titled.is_empty() {
        "there".to_string()
    } else {
        titled.to_string()
    }
}

/// Trim, drop leading indentation, and keep at most one blank line in a row.
fn format_body(text: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut previous_blank = false;
    for line in text.trim().lines() {
        let line = line.trim_start();
        let blank = line.is_empty();
        if blank && previous_blank {
            continue;
        }
        lines.push(line);
        previous_blank = blank;
    }
    lines.join("\n")
}

/// One `<p>` per blank-line separated paragraph, `<br>` for single newlines.
fn to_html(text: &str) -> String {
    text.split("\n\n")
        .map(|paragraph| format!("<p>{}</p>", escape_html(paragraph).replace('\n', "<br>")))
        .collect::<Vec<_>>()
        .join("\n")
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn parse_quick_responses(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| LIST_NUMBER_RE.replace(line, "").trim().to_string())
        .filter(|line| !line.is_empty())
        .take(QUICK_RESPONSE_COUNT)
        .collect()
}
