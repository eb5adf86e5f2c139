//! Priority classifier: the heuristic scorer blended with the remote model.
//!
//! **Never fails.** The heuristic score is always computed; the remote model
//! is tried at most once per email, and any error from it falls back to the
//! heuristic result.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::pipeline::heuristic::HeuristicScorer;
use crate::pipeline::types::{EmailContent, PrioritizedEmail, PriorityMeta, PrioritySource};
use crate::remote::{RemoteClassifier, RemotePrediction};

/// Weight of the remote score in the blend.
const REMOTE_WEIGHT: f64 = 0.8;
/// Weight of the heuristic score in the blend.
const HEURISTIC_WEIGHT: f64 = 0.2;

pub struct PriorityClassifier {
    scorer: HeuristicScorer,
    remote: Option<Arc<dyn RemoteClassifier>>,
    clock: Arc<dyn Clock>,
}

impl PriorityClassifier {
    /// Create a classifier. `remote` is resolved once here; `None` means
    /// heuristic-only for the classifier's whole lifetime.
    pub fn new(
        scorer: HeuristicScorer,
        remote: Option<Arc<dyn RemoteClassifier>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            scorer,
            remote,
            clock,
        }
    }

    /// Heuristic-only classifier on the system clock.
    pub fn heuristic_only(scorer: HeuristicScorer) -> Self {
        Self::new(scorer, None, Arc::new(SystemClock))
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Classify one email.
    pub async fn classify(&self, email: &EmailContent) -> PrioritizedEmail {
        let heuristic = self.scorer.score(email, self.clock.now());

        let Some(remote) = &self.remote else {
            return self.heuristic_result(email, heuristic);
        };

        match remote.classify(email).await {
            Ok(prediction) => self.blended_result(email, heuristic, prediction),
            Err(e) => {
                warn!(
                    id = %email.id,
                    provider = remote.name(),
                    error = %e,
                    "Remote classification failed, falling back to heuristic"
                );
                self.heuristic_result(email, heuristic)
            }
        }
    }

    fn heuristic_result(&self, email: &EmailContent, heuristic: f64) -> PrioritizedEmail {
        let urgency = self.scorer.thresholds().urgency_for(heuristic);
        debug!(id = %email.id, score = heuristic, urgency = %urgency, "Heuristic classification");

        PrioritizedEmail {
            email: email.clone(),
            urgency,
            confidence: heuristic,
            priority_meta: PriorityMeta {
                source: PrioritySource::Heuristic,
                model_version: None,
                latency_ms: None,
                raw_score: heuristic,
            },
        }
    }

    /// Confidence is the 0.8/0.2 blend; the tier is the remote label as given,
    /// not re-derived from the blend.
    fn blended_result(
        &self,
        email: &EmailContent,
        heuristic: f64,
        prediction: RemotePrediction,
    ) -> PrioritizedEmail {
        let remote_score = prediction.score.clamp(0.0, 1.0);
        let combined = (remote_score * REMOTE_WEIGHT + heuristic * HEURISTIC_WEIGHT).clamp(0.0, 1.0);
        debug!(
            id = %email.id,
            remote_score,
            heuristic,
            combined,
            label = %prediction.label,
            "Blended remote classification"
        );

        PrioritizedEmail {
            email: email.clone(),
            urgency: prediction.label,
            confidence: combined,
            priority_meta: PriorityMeta {
                source: PrioritySource::RemoteModel,
                model_version: prediction.model_version,
                latency_ms: prediction.latency_ms,
                raw_score: remote_score,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::{DateTime, Duration, Utc};

    use crate::clock::FixedClock;
    use crate::error::ClassifierError;
    use crate::pipeline::types::Urgency;

    /// Mock remote classifier that returns a fixed prediction or error.
    struct MockRemote {
        result: Result<RemotePrediction, String>,
        calls: AtomicUsize,
    }

    impl MockRemote {
        fn ok(score: f64, label: Urgency) -> Arc<Self> {
            Arc::new(Self {
                result: Ok(RemotePrediction {
                    score,
                    label,
                    latency_ms: Some(420),
                    model_version: Some("2025-09-18-01".into()),
                }),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(reason: &str) -> Arc<Self> {
            Arc::new(Self {
                result: Err(reason.into()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl RemoteClassifier for MockRemote {
        fn name(&self) -> &str {
            "mock-remote"
        }

        async fn classify(
            &self,
            _email: &EmailContent,
        ) -> Result<RemotePrediction, ClassifierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result
                .clone()
                .map_err(|reason| ClassifierError::InvalidResponse { reason })
        }
    }

    fn now() -> DateTime<Utc> {
        "2025-03-01T12:00:00Z".parse().unwrap()
    }

    fn sample_email() -> EmailContent {
        EmailContent {
            id: "priority-test".into(),
            from: "ceo@vip-client.com".into(),
            subject: "Quick sync on pilot".into(),
            body_text: "Could we grab 10 minutes to review the latest rollout?".into(),
            body_html: None,
            received_at: now() - Duration::minutes(5),
            thread_id: None,
            labels: vec![],
        }
    }

    fn classifier(remote: Option<Arc<dyn RemoteClassifier>>) -> PriorityClassifier {
        PriorityClassifier::new(
            HeuristicScorer::default(),
            remote,
            Arc::new(FixedClock(now())),
        )
    }

    fn heuristic_score(email: &EmailContent) -> f64 {
        HeuristicScorer::default().score(email, now())
    }

    #[tokio::test]
    async fn uses_remote_prediction_when_it_succeeds() {
        let remote = MockRemote::ok(0.9, Urgency::Urgent);
        let classifier = classifier(Some(remote.clone()));
        let email = sample_email();

        let result = classifier.classify(&email).await;

        let expected = (0.9 * 0.8 + heuristic_score(&email) * 0.2).clamp(0.0, 1.0);
        assert_eq!(result.urgency, Urgency::Urgent);
        assert!((result.confidence - expected).abs() < 1e-9);
        assert!(result.confidence > 0.8);
        assert_eq!(result.priority_meta.source, PrioritySource::RemoteModel);
        assert_eq!(result.priority_meta.model_version.as_deref(), Some("2025-09-18-01"));
        assert_eq!(result.priority_meta.latency_ms, Some(420));
        assert!((result.priority_meta.raw_score - 0.9).abs() < 1e-9);
        assert_eq!(remote.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn remote_label_overrides_blended_tier() {
        // Blend lands in "today" territory but the model said "later".
        let remote = MockRemote::ok(0.5, Urgency::Later);
        let classifier = classifier(Some(remote));
        let result = classifier.classify(&sample_email()).await;

        assert!(result.confidence >= 0.4);
        assert_eq!(result.urgency, Urgency::Later);
    }

    #[tokio::test]
    async fn falls_back_to_heuristic_when_remote_fails() {
        let remote = MockRemote::failing("timeout");
        let classifier = classifier(Some(remote.clone()));
        let email = sample_email();

        let result = classifier.classify(&email).await;

        let heuristic = heuristic_score(&email);
        assert_eq!(result.priority_meta.source, PrioritySource::Heuristic);
        assert_eq!(result.confidence, heuristic);
        assert_eq!(result.priority_meta.raw_score, heuristic);
        assert!(result.priority_meta.model_version.is_none());
        assert_eq!(result.urgency, Urgency::Today);
        assert_eq!(remote.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn heuristic_only_without_remote() {
        let classifier = classifier(None);
        assert!(!classifier.has_remote());

        let email = sample_email();
        let result = classifier.classify(&email).await;
        assert_eq!(result.priority_meta.source, PrioritySource::Heuristic);
        assert_eq!(result.confidence, heuristic_score(&email));
        assert_eq!(result.email, email);
    }

    #[tokio::test]
    async fn out_of_range_remote_score_is_clamped() {
        let remote = MockRemote::ok(3.0, Urgency::Urgent);
        let classifier = classifier(Some(remote));
        let result = classifier.classify(&sample_email()).await;

        assert!((0.0..=1.0).contains(&result.confidence));
        assert_eq!(result.priority_meta.raw_score, 1.0);
    }
}
