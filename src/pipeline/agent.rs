//! Agent orchestrator.
//!
//! Fans each email out to the priority classifier, summarizer, action
//! suggestions and context fetcher as independent tokio tasks, joins them,
//! and assembles one `EmailAgentOutput`. A task that panics fails the run
//! for that email; provider failures are already absorbed by the components.

use std::sync::Arc;

use futures::future::join_all;
use tokio::task::JoinError;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::config::TriageConfig;
use crate::error::{ConfigError, PipelineError};
use crate::llm::LlmProvider;
use crate::pipeline::classifier::PriorityClassifier;
use crate::pipeline::context::ContextFetcher;
use crate::pipeline::heuristic::HeuristicScorer;
use crate::pipeline::summarizer::{Summarizer, fallback_summary};
use crate::pipeline::types::{EmailAgentOutput, EmailContent};
use crate::remote::{HttpClassifier, RemoteClassifier};

/// Per-email orchestrator. Cheap to clone; components are shared.
#[derive(Clone)]
pub struct EmailAgent {
    classifier: Arc<PriorityClassifier>,
    summarizer: Arc<Summarizer>,
    context: Arc<ContextFetcher>,
}

impl EmailAgent {
    pub fn new(
        classifier: PriorityClassifier,
        summarizer: Summarizer,
        context: ContextFetcher,
    ) -> Self {
        Self {
            classifier: Arc::new(classifier),
            summarizer: Arc::new(summarizer),
            context: Arc::new(context),
        }
    }

    /// Wire the components from configuration.
    ///
    /// The remote classifier is built here, once. If it cannot be built the
    /// agent runs heuristic-only rather than failing startup.
    pub fn from_config(
        config: &TriageConfig,
        llm: Option<Arc<dyn LlmProvider>>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        let remote: Option<Arc<dyn RemoteClassifier>> = match &config.classifier {
            Some(classifier_config) => match HttpClassifier::new(classifier_config.clone()) {
                Ok(classifier) => {
                    info!(model = %classifier_config.model, "Remote classifier enabled");
                    Some(Arc::new(classifier))
                }
                Err(e) => {
                    warn!(error = %e, "Remote classifier unavailable, using heuristic only");
                    None
                }
            },
            None => {
                info!("No classifier API key, using heuristic only");
                None
            }
        };

        if llm.is_none() {
            info!("No generative backend, summaries use the fallback preview");
        }

        let classifier = PriorityClassifier::new(
            HeuristicScorer::new(config.heuristic.clone()),
            remote,
            clock,
        );
        let context =
            ContextFetcher::default_rules()?.with_max_results(config.context_max_results);

        Ok(Self::new(classifier, Summarizer::new(llm), context))
    }

    /// Run every component for one email and merge the results.
    pub async fn run(&self, email: EmailContent) -> Result<EmailAgentOutput, PipelineError> {
        let email = Arc::new(email);

        let classify = {
            let classifier = Arc::clone(&self.classifier);
            let email = Arc::clone(&email);
            tokio::spawn(async move { classifier.classify(&email).await })
        };
        let summarize = {
            let summarizer = Arc::clone(&self.summarizer);
            let email = Arc::clone(&email);
            tokio::spawn(async move { summarizer.summarize(&email).await })
        };
        let suggest = {
            let summarizer = Arc::clone(&self.summarizer);
            let email = Arc::clone(&email);
            tokio::spawn(async move { summarizer.suggest_actions(&email) })
        };
        let context = {
            let fetcher = Arc::clone(&self.context);
            let email = Arc::clone(&email);
            tokio::spawn(async move { fetcher.fetch(&email).await })
        };

        let (prioritized, summary, suggestions, insights) =
            tokio::join!(classify, summarize, suggest, context);

        let prioritized = prioritized.map_err(|e| task_failed("classify", &email, e))?;
        let summary = summary.map_err(|e| task_failed("summarize", &email, e))?;
        let suggestions = suggestions.map_err(|e| task_failed("suggest_actions", &email, e))?;
        let insights = insights.map_err(|e| task_failed("fetch_context", &email, e))?;

        let summary = if summary.trim().is_empty() {
            fallback_summary(&email)
        } else {
            summary
        };

        info!(
            id = %email.id,
            urgency = %prioritized.urgency,
            confidence = prioritized.confidence,
            source = ?prioritized.priority_meta.source,
            suggestions = suggestions.len(),
            insights = insights.len(),
            "Email processed"
        );

        Ok(EmailAgentOutput {
            email: prioritized,
            summary,
            suggestions,
            contextual_insights: insights,
        })
    }

    /// Run a batch concurrently. Results keep input order.
    pub async fn run_batch(
        &self,
        emails: Vec<EmailContent>,
    ) -> Vec<Result<EmailAgentOutput, PipelineError>> {
        let count = emails.len();
        let results = join_all(emails.into_iter().map(|email| self.run(email))).await;

        let failed = results.iter().filter(|r| r.is_err()).count();
        info!(total = count, failed, "Batch processed");
        results
    }
}

fn task_failed(task: &'static str, email: &EmailContent, err: JoinError) -> PipelineError {
    PipelineError::TaskFailed {
        task,
        email_id: email.id.clone(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use chrono::{DateTime, Duration, Utc};

    use crate::clock::FixedClock;
    use crate::error::LlmError;
    use crate::llm::provider::{CompletionRequest, CompletionResponse};
    use crate::pipeline::types::{EmailAction, PrioritySource, Urgency};

    enum Behaviour {
        Reply(&'static str),
        Panic,
    }

    struct MockLlm(Behaviour);

    #[async_trait]
    impl LlmProvider for MockLlm {
        fn model_name(&self) -> &str {
            "mock-agent"
        }

        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            match self.0 {
                Behaviour::Reply(text) => Ok(CompletionResponse {
                    content: text.to_string(),
                    input_tokens: 10,
                    output_tokens: 5,
                }),
                Behaviour::Panic => panic!("summarizer blew up"),
            }
        }
    }

    fn now() -> DateTime<Utc> {
        "2025-03-01T12:00:00Z".parse().unwrap()
    }

    fn agent(llm: Option<Arc<dyn LlmProvider>>) -> EmailAgent {
        EmailAgent::from_config(&TriageConfig::default(), llm, Arc::new(FixedClock(now()))).unwrap()
    }

    fn sample_email() -> EmailContent {
        EmailContent {
            id: "agent-1".into(),
            from: "ops@example.com".into(),
            subject: "Weekly update".into(),
            body_text: "Here is the weekly newsletter with the latest numbers.".into(),
            body_html: None,
            received_at: now() - Duration::hours(2),
            thread_id: None,
            labels: vec![],
        }
    }

    #[tokio::test]
    async fn empty_generative_summary_uses_fallback_preview() {
        let agent = agent(Some(Arc::new(MockLlm(Behaviour::Reply("")))));
        let output = agent.run(sample_email()).await.unwrap();

        assert!(output.summary.starts_with("• Subject: Weekly update"));
        assert!(output.summary.contains("From:"));
    }

    #[tokio::test]
    async fn generative_summary_is_used_when_present() {
        let agent = agent(Some(Arc::new(MockLlm(Behaviour::Reply("• Low urgency")))));
        let output = agent.run(sample_email()).await.unwrap();
        assert_eq!(output.summary, "• Low urgency");
    }

    #[tokio::test]
    async fn urgent_contract_email_end_to_end() {
        let email = EmailContent {
            id: "e2e-urgent".into(),
            from: "x@vip-client.com".into(),
            subject: "Urgent: contract needs signature".into(),
            body_text: "The contract must be signed before the deadline, asap.".into(),
            body_html: None,
            received_at: now(),
            thread_id: None,
            labels: vec![],
        };

        let output = agent(None).run(email).await.unwrap();

        assert_eq!(output.email.urgency, Urgency::Urgent);
        assert_eq!(output.email.confidence, 1.0);
        assert_eq!(output.email.priority_meta.source, PrioritySource::Heuristic);
        assert_eq!(output.contextual_insights.len(), 1);
        assert_eq!(output.contextual_insights[0].title, "Pending contract notes");
        assert!(!output.suggestions.is_empty());
    }

    #[tokio::test]
    async fn output_carries_all_components() {
        let output = agent(None).run(sample_email()).await.unwrap();

        assert_eq!(output.email.email.id, "agent-1");
        assert!(output.summary.contains("Subject: Weekly update"));
        assert_eq!(output.suggestions.len(), 1);
        assert_eq!(output.suggestions[0].action, EmailAction::Archive);
        assert!(output.contextual_insights.is_empty());
    }

    #[tokio::test]
    async fn runs_are_idempotent_under_fixed_clock() {
        let agent = agent(None);
        let first = agent.run(sample_email()).await.unwrap();
        let second = agent.run(sample_email()).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn panicking_component_fails_the_run() {
        let agent = agent(Some(Arc::new(MockLlm(Behaviour::Panic))));
        let err = agent.run(sample_email()).await.unwrap_err();
        match err {
            PipelineError::TaskFailed { task, email_id, .. } => {
                assert_eq!(task, "summarize");
                assert_eq!(email_id, "agent-1");
            }
        }
    }

    #[tokio::test]
    async fn batch_keeps_input_order() {
        let agent = agent(None);
        let emails: Vec<EmailContent> = (0..5)
            .map(|i| EmailContent {
                id: format!("batch-{i}"),
                ..sample_email()
            })
            .collect();

        let results = agent.run_batch(emails).await;
        let ids: Vec<String> = results
            .into_iter()
            .map(|r| r.unwrap().email.email.id)
            .collect();
        assert_eq!(ids, vec!["batch-0", "batch-1", "batch-2", "batch-3", "batch-4"]);
    }

    #[tokio::test]
    async fn unbuildable_remote_classifier_degrades_to_heuristic() {
        let mut config = TriageConfig::default();
        config.classifier = Some(crate::remote::ClassifierConfig::new(""));

        let agent = EmailAgent::from_config(&config, None, Arc::new(FixedClock(now()))).unwrap();
        let output = agent.run(sample_email()).await.unwrap();
        assert_eq!(output.email.priority_meta.source, PrioritySource::Heuristic);
    }
}
