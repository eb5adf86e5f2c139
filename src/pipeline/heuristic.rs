//! Local heuristic urgency scorer.
//!
//! Pure and deterministic given the evaluation time: no I/O, no failure mode.
//! Score = base + keyword boost (capped) + trusted sender bonus + recency
//! bonus, clamped to [0, 1].

use chrono::{DateTime, Duration, Utc};

use crate::pipeline::types::{EmailContent, Urgency};

const BASE_SCORE: f64 = 0.2;
const KEYWORD_WEIGHT: f64 = 0.15;
const KEYWORD_CAP: f64 = 0.6;
const TRUSTED_SENDER_BONUS: f64 = 0.25;
const FRESH_BONUS: f64 = 0.2;
const RECENT_BONUS: f64 = 0.1;
const FRESH_WINDOW_HOURS: i64 = 6;
const RECENT_WINDOW_HOURS: i64 = 24;

pub const DEFAULT_KEYWORDS: &[&str] = &["urgent", "asap", "deadline", "investor", "wire", "contract"];
pub const DEFAULT_TRUSTED_DOMAINS: &[&str] = &["vip-client.com", "board.com", "investor.com"];

/// Score thresholds mapping a confidence to an urgency tier.
///
/// Comparisons are inclusive, so a score equal to a threshold lands in the
/// higher tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub urgent: f64,
    pub today: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            urgent: 0.7,
            today: 0.4,
        }
    }
}

impl Thresholds {
    pub fn urgency_for(&self, score: f64) -> Urgency {
        if score >= self.urgent {
            Urgency::Urgent
        } else if score >= self.today {
            Urgency::Today
        } else {
            Urgency::Later
        }
    }
}

/// Heuristic scorer configuration.
#[derive(Debug, Clone)]
pub struct HeuristicConfig {
    /// Urgency keywords, matched case-insensitively.
    pub keywords: Vec<String>,
    /// Trusted sender domains, stored without the leading `@`.
    pub trusted_domains: Vec<String>,
    pub thresholds: Thresholds,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            trusted_domains: DEFAULT_TRUSTED_DOMAINS.iter().map(|d| d.to_string()).collect(),
            thresholds: Thresholds::default(),
        }
    }
}

/// Individual contributions that make up a heuristic score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    pub keyword: f64,
    pub sender: f64,
    pub recency: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        (BASE_SCORE + self.keyword + self.sender + self.recency).clamp(0.0, 1.0)
    }
}

/// Keyword/sender/recency scorer.
#[derive(Debug, Clone)]
pub struct HeuristicScorer {
    keywords: Vec<String>,
    domain_suffixes: Vec<String>,
    thresholds: Thresholds,
}

impl HeuristicScorer {
    pub fn new(config: HeuristicConfig) -> Self {
        // Normalised and de-duplicated so each distinct keyword scores once.
        let mut keywords: Vec<String> = Vec::with_capacity(config.keywords.len());
        for keyword in config.keywords.iter().map(|k| k.trim().to_lowercase()) {
            if !keyword.is_empty() && !keywords.contains(&keyword) {
                keywords.push(keyword);
            }
        }
        let domain_suffixes = config
            .trusted_domains
            .iter()
            .map(|d| d.trim().trim_start_matches('@'))
            .filter(|d| !d.is_empty())
            .map(|d| format!("@{d}"))
            .collect();

        Self {
            keywords,
            domain_suffixes,
            thresholds: config.thresholds,
        }
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Score an email as of `now`.
    pub fn score(&self, email: &EmailContent, now: DateTime<Utc>) -> f64 {
        self.breakdown(email, now).total()
    }

    pub fn breakdown(&self, email: &EmailContent, now: DateTime<Utc>) -> ScoreBreakdown {
        ScoreBreakdown {
            keyword: self.keyword_score(&email.subject, &email.body_text),
            sender: self.sender_score(&email.from),
            recency: recency_score(email.received_at, now),
        }
    }

    /// 0.15 per distinct keyword present, capped at 0.6.
    fn keyword_score(&self, subject: &str, body: &str) -> f64 {
        let text = format!("{body} {subject}").to_lowercase();
        let matches = self
            .keywords
            .iter()
            .filter(|keyword| text.contains(keyword.as_str()))
            .count();
        (matches as f64 * KEYWORD_WEIGHT).min(KEYWORD_CAP)
    }

    fn sender_score(&self, from: &str) -> f64 {
        let address = sender_address(from);
        if self
            .domain_suffixes
            .iter()
            .any(|suffix| address.ends_with(suffix.as_str()))
        {
            TRUSTED_SENDER_BONUS
        } else {
            0.0
        }
    }
}

impl Default for HeuristicScorer {
    fn default() -> Self {
        Self::new(HeuristicConfig::default())
    }
}

fn recency_score(received_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let age = now.signed_duration_since(received_at);
    if age <= Duration::hours(FRESH_WINDOW_HOURS) {
        FRESH_BONUS
    } else if age <= Duration::hours(RECENT_WINDOW_HOURS) {
        RECENT_BONUS
    } else {
        0.0
    }
}

/// Pull the bare address out of `Name <addr>`; otherwise the trimmed input.
pub(crate) fn sender_address(from: &str) -> &str {
    if let (Some(start), Some(end)) = (from.find('<'), from.rfind('>'))
        && end > start
    {
        return from[start + 1..end].trim();
    }
    from.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        "2025-03-01T12:00:00Z".parse().unwrap()
    }

    fn make_email(from: &str, subject: &str, body: &str, age_hours: i64) -> EmailContent {
        EmailContent {
            id: "h-1".into(),
            from: from.into(),
            subject: subject.into(),
            body_text: body.into(),
            body_html: None,
            received_at: now() - Duration::hours(age_hours),
            thread_id: None,
            labels: vec![],
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn repeated_configured_keywords_count_once() {
        let scorer = HeuristicScorer::new(HeuristicConfig {
            keywords: vec!["urgent".into(), "URGENT".into(), " urgent ".into(), "wire".into()],
            ..HeuristicConfig::default()
        });
        let email = make_email("someone@example.com", "urgent", "", 48);

        let breakdown = scorer.breakdown(&email, now());
        assert!(approx(breakdown.keyword, 0.15));
        assert!(approx(scorer.score(&email, now()), 0.35));
    }

    #[test]
    fn plain_old_email_scores_base() {
        let scorer = HeuristicScorer::default();
        let email = make_email("someone@example.com", "Hello", "Just saying hi", 48);
        assert!(approx(scorer.score(&email, now()), 0.2));
    }

    #[test]
    fn score_is_deterministic_for_fixed_now() {
        let scorer = HeuristicScorer::default();
        let email = make_email("ceo@board.com", "Wire transfer", "Deadline tomorrow", 3);
        let first = scorer.score(&email, now());
        let second = scorer.score(&email, now());
        assert_eq!(first, second);
    }

    #[test]
    fn score_always_in_unit_interval() {
        let scorer = HeuristicScorer::default();
        let loud = make_email(
            "x@vip-client.com",
            "URGENT ASAP deadline",
            "investor wire contract urgent asap deadline",
            0,
        );
        let quiet = make_email("x@example.com", "", "", 1000);
        for email in [loud, quiet] {
            let score = scorer.score(&email, now());
            assert!((0.0..=1.0).contains(&score), "score {score} out of range");
        }
    }

    #[test]
    fn keyword_match_is_case_insensitive() {
        let scorer = HeuristicScorer::default();
        let email = make_email("a@example.com", "URGENT", "", 48);
        assert!(approx(scorer.breakdown(&email, now()).keyword, 0.15));
    }

    #[test]
    fn keyword_contribution_saturates_at_four_matches() {
        let scorer = HeuristicScorer::default();
        let four = make_email("a@example.com", "", "urgent asap deadline investor", 48);
        let repeated = make_email(
            "a@example.com",
            "",
            "urgent urgent asap asap deadline deadline investor investor wire contract",
            48,
        );
        let four_score = scorer.breakdown(&four, now()).keyword;
        let repeated_score = scorer.breakdown(&repeated, now()).keyword;
        assert!(approx(four_score, 0.6));
        assert!(approx(repeated_score, four_score));
    }

    #[test]
    fn repeated_single_keyword_counts_once() {
        let scorer = HeuristicScorer::default();
        let email = make_email("a@example.com", "", "urgent urgent urgent", 48);
        assert!(approx(scorer.breakdown(&email, now()).keyword, 0.15));
    }

    #[test]
    fn trusted_domain_bonus_requires_exact_suffix() {
        let scorer = HeuristicScorer::default();
        let trusted = make_email("founder@vip-client.com", "", "", 48);
        let lookalike = make_email("founder@notvip-client.com", "", "", 48);
        let uppercase = make_email("founder@VIP-CLIENT.COM", "", "", 48);
        let subdomain_trick = make_email("founder@vip-client.com.evil.io", "", "", 48);

        assert!(approx(scorer.breakdown(&trusted, now()).sender, 0.25));
        assert!(approx(scorer.breakdown(&lookalike, now()).sender, 0.0));
        assert!(approx(scorer.breakdown(&uppercase, now()).sender, 0.0));
        assert!(approx(scorer.breakdown(&subdomain_trick, now()).sender, 0.0));
    }

    #[test]
    fn trusted_domain_matches_display_name_form() {
        let scorer = HeuristicScorer::default();
        let email = make_email("Board Chair <chair@board.com>", "", "", 48);
        assert!(approx(scorer.breakdown(&email, now()).sender, 0.25));
    }

    #[test]
    fn configured_domains_accept_at_prefix() {
        let scorer = HeuristicScorer::new(HeuristicConfig {
            trusted_domains: vec!["@partner.io".into()],
            ..Default::default()
        });
        let email = make_email("ops@partner.io", "", "", 48);
        assert!(approx(scorer.breakdown(&email, now()).sender, 0.25));
    }

    #[test]
    fn recency_windows() {
        let scorer = HeuristicScorer::default();
        let cases = [(0, 0.2), (6, 0.2), (7, 0.1), (23, 0.1), (24, 0.1), (30, 0.0)];
        for (age_hours, expected) in cases {
            let email = make_email("a@example.com", "", "", age_hours);
            let recency = scorer.breakdown(&email, now()).recency;
            assert!(
                approx(recency, expected),
                "age {age_hours}h gave {recency}, expected {expected}"
            );
        }
    }

    #[test]
    fn future_timestamp_counts_as_fresh() {
        let scorer = HeuristicScorer::default();
        let email = make_email("a@example.com", "", "", -2);
        assert!(approx(scorer.breakdown(&email, now()).recency, 0.2));
    }

    #[test]
    fn stacked_signals_clamp_to_one() {
        let scorer = HeuristicScorer::default();
        let email = make_email(
            "x@vip-client.com",
            "Urgent: contract needs signature",
            "The deadline is today, please sign asap.",
            0,
        );
        let score = scorer.score(&email, now());
        assert!(approx(score, 1.0));
        assert_eq!(scorer.thresholds().urgency_for(score), Urgency::Urgent);
    }

    #[test]
    fn thresholds_are_inclusive() {
        let thresholds = Thresholds::default();
        assert_eq!(thresholds.urgency_for(0.7), Urgency::Urgent);
        assert_eq!(thresholds.urgency_for(0.69), Urgency::Today);
        assert_eq!(thresholds.urgency_for(0.4), Urgency::Today);
        assert_eq!(thresholds.urgency_for(0.39), Urgency::Later);
        assert_eq!(thresholds.urgency_for(0.0), Urgency::Later);
    }

    #[test]
    fn sender_address_extraction() {
        assert_eq!(sender_address("Alice <alice@x.com>"), "alice@x.com");
        assert_eq!(sender_address("  bob@y.com "), "bob@y.com");
        assert_eq!(sender_address("weird > <"), "weird > <");
    }
}
