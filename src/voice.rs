//! Text voice commands.
//!
//! Maps an already-transcribed utterance to an assistant action, and renders
//! processed emails as plain sentences for a speech synthesizer.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::pipeline::types::{EmailAgentOutput, Urgency};

const SUMMARY_COUNT: u64 = 5;

static REPLY_TARGET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:reply|respond) to (\w+)").expect("valid reply target regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceAction {
    FetchUrgent,
    SummarizeEmails,
    DraftReply,
    ScheduleMeeting,
    Help,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceResponse {
    pub text: String,
    pub action: VoiceAction,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl VoiceResponse {
    fn new(text: impl Into<String>, action: VoiceAction) -> Self {
        Self {
            text: text.into(),
            action,
            metadata: Map::new(),
        }
    }

    fn with_meta(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }
}

/// Interpret a transcribed command. Checks run in priority order; the first
/// matching intent wins.
pub fn interpret(text: &str) -> VoiceResponse {
    let lower = text.to_lowercase();
    let mentions = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    if mentions(&["urgent", "priority"]) {
        VoiceResponse::new(
            "I'll fetch your urgent emails right away.",
            VoiceAction::FetchUrgent,
        )
        .with_meta("filter", json!("urgent"))
    } else if mentions(&["summarize", "summary"]) {
        VoiceResponse::new(
            "I'll provide a summary of your recent emails.",
            VoiceAction::SummarizeEmails,
        )
        .with_meta("count", json!(SUMMARY_COUNT))
    } else if mentions(&["reply", "respond"]) {
        let recipient = REPLY_TARGET_RE
            .captures(&lower)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string());
        let text = match &recipient {
            Some(name) => format!("I'll help you draft a reply to {name}."),
            None => "I'll help you draft a reply.".to_string(),
        };
        VoiceResponse::new(text, VoiceAction::DraftReply).with_meta("recipient", json!(recipient))
    } else if mentions(&["schedule", "meeting"]) {
        VoiceResponse::new(
            "I'll help you schedule that meeting.",
            VoiceAction::ScheduleMeeting,
        )
    } else {
        VoiceResponse::new(
            "I can help you with your emails. You can ask me to read urgent emails, summarize threads, or draft replies.",
            VoiceAction::Help,
        )
    }
}

/// Interpret `text` against the current inbox. An urgent-mail request reads
/// out the first urgent email instead of the canned acknowledgement.
pub fn respond(text: &str, inbox: &[EmailAgentOutput]) -> VoiceResponse {
    let mut response = interpret(text);
    if response.action == VoiceAction::FetchUrgent {
        response.text = inbox
            .iter()
            .find(|output| output.email.urgency == Urgency::Urgent)
            .map(format_for_speech)
            .unwrap_or_else(|| "You have no urgent emails.".to_string());
    }
    response
}

/// Render a processed email as sentences for text-to-speech.
pub fn format_for_speech(output: &EmailAgentOutput) -> String {
    let email = &output.email;
    let mut speech = format!(
        "Email from {}. Subject: {}. ",
        email.email.from, email.email.subject
    );

    if email.urgency == Urgency::Urgent {
        speech.push_str("This is marked as urgent. ");
    }

    let summary = output
        .summary
        .split(['•', '\n'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(". ");
    speech.push_str(&format!("Summary: {summary}. "));

    if let Some(first) = output.suggestions.first() {
        speech.push_str(&format!(
            "I suggest you {} because {}",
            first.action.as_str(),
            first.rationale
        ));
    }
    speech
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::{
        EmailAction, EmailActionSuggestion, EmailContent, PrioritizedEmail, PriorityMeta,
        PrioritySource,
    };

    fn output(id: &str, urgency: Urgency) -> EmailAgentOutput {
        EmailAgentOutput {
            email: PrioritizedEmail {
                email: EmailContent {
                    id: id.into(),
                    from: "ceo@board.com".into(),
                    subject: "Board deck".into(),
                    body_text: "Need the deck".into(),
                    body_html: None,
                    received_at: "2025-03-01T12:00:00Z".parse().unwrap(),
                    thread_id: None,
                    labels: vec![],
                },
                urgency,
                confidence: 0.8,
                priority_meta: PriorityMeta {
                    source: PrioritySource::Heuristic,
                    model_version: None,
                    latency_ms: None,
                    raw_score: 0.8,
                },
            },
            summary: "• Subject: Board deck\n• From: ceo@board.com".into(),
            suggestions: vec![EmailActionSuggestion::new(
                EmailAction::Respond,
                "Sender is asking for a direct response.",
            )],
            contextual_insights: vec![],
        }
    }

    #[test]
    fn interprets_each_intent() {
        assert_eq!(interpret("What's URGENT today?").action, VoiceAction::FetchUrgent);
        assert_eq!(interpret("give me a summary").action, VoiceAction::SummarizeEmails);
        assert_eq!(interpret("respond please").action, VoiceAction::DraftReply);
        assert_eq!(interpret("set up a meeting").action, VoiceAction::ScheduleMeeting);
        assert_eq!(interpret("hello there").action, VoiceAction::Help);
    }

    #[test]
    fn urgent_takes_precedence_over_summary() {
        let response = interpret("Summarize my priority mail");
        assert_eq!(response.action, VoiceAction::FetchUrgent);
        assert_eq!(response.metadata["filter"], "urgent");
    }

    #[test]
    fn summary_carries_count() {
        assert_eq!(interpret("summarize").metadata["count"], 5);
    }

    #[test]
    fn reply_extracts_recipient() {
        let response = interpret("Reply to Sarah about the contract");
        assert_eq!(response.action, VoiceAction::DraftReply);
        assert_eq!(response.metadata["recipient"], "sarah");
        assert_eq!(response.text, "I'll help you draft a reply to sarah.");

        let bare = interpret("reply now");
        assert_eq!(bare.metadata["recipient"], Value::Null);
        assert_eq!(bare.text, "I'll help you draft a reply.");
    }

    #[test]
    fn speech_format() {
        let speech = format_for_speech(&output("v-1", Urgency::Urgent));
        assert_eq!(
            speech,
            "Email from ceo@board.com. Subject: Board deck. This is marked as urgent. \
             Summary: Subject: Board deck. From: ceo@board.com. \
             I suggest you respond because Sender is asking for a direct response."
        );

        let calm = format_for_speech(&output("v-2", Urgency::Later));
        assert!(!calm.contains("marked as urgent"));
    }

    #[test]
    fn respond_reads_first_urgent_email() {
        let inbox = vec![output("a", Urgency::Later), output("b", Urgency::Urgent)];
        let response = respond("any urgent emails?", &inbox);
        assert!(response.text.starts_with("Email from ceo@board.com"));

        let response = respond("any urgent emails?", &inbox[..1]);
        assert_eq!(response.text, "You have no urgent emails.");

        let response = respond("summarize", &inbox);
        assert_eq!(response.text, "I'll provide a summary of your recent emails.");
    }

    #[test]
    fn action_serializes_snake_case() {
        let json = serde_json::to_value(interpret("schedule it")).unwrap();
        assert_eq!(json["action"], "schedule_meeting");
    }
}
