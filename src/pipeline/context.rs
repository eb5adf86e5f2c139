//! Context fetcher: regex rules that attach related snippets to an email.
//!
//! Rules run in order; every matching rule contributes its resource, and the
//! result is cut to `max_results`. There is no lookup behind this yet, so the
//! fetch never fails.

use regex::Regex;
use tracing::debug;

use crate::error::ConfigError;
use crate::pipeline::types::{ContextResource, EmailContent};

pub const DEFAULT_MAX_RESULTS: usize = 2;

/// Which email field a rule matches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleField {
    Subject,
    Body,
}

/// A compiled rule and the snippet it emits.
#[derive(Debug, Clone)]
pub struct ContextRule {
    pub field: RuleField,
    pub regex: Regex,
    pub resource: ContextResource,
}

impl ContextRule {
    pub fn new(
        field: RuleField,
        pattern: &str,
        resource: ContextResource,
    ) -> Result<Self, ConfigError> {
        let regex = Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            field,
            regex,
            resource,
        })
    }

    fn matches(&self, email: &EmailContent) -> bool {
        let text = match self.field {
            RuleField::Subject => &email.subject,
            RuleField::Body => &email.body_text,
        };
        self.regex.is_match(text)
    }
}

pub struct ContextFetcher {
    rules: Vec<ContextRule>,
    max_results: usize,
}

impl ContextFetcher {
    pub fn new(rules: Vec<ContextRule>) -> Self {
        Self {
            rules,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    /// Fetcher with the built-in investor and contract rules.
    pub fn default_rules() -> Result<Self, ConfigError> {
        let rules = vec![
            ContextRule::new(
                RuleField::Subject,
                r"(?i)investor",
                ContextResource {
                    title: "Last investor update".into(),
                    summary: "Sent quarterly metrics two weeks ago. Investor asked about expansion plans."
                        .into(),
                    url: Some("https://airia.example.com/doc/investor-update".into()),
                },
            )?,
            ContextRule::new(
                RuleField::Body,
                r"(?i)contract|agreement",
                ContextResource {
                    title: "Pending contract notes".into(),
                    summary: "Legal flagged clause 4.2 for review. Waiting on redlines from partner."
                        .into(),
                    url: None,
                },
            )?,
        ];
        Ok(Self::new(rules))
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Resources for every matching rule, in rule order, capped.
    pub async fn fetch(&self, email: &EmailContent) -> Vec<ContextResource> {
        let resources: Vec<ContextResource> = self
            .rules
            .iter()
            .filter(|rule| rule.matches(email))
            .take(self.max_results)
            .map(|rule| rule.resource.clone())
            .collect();

        debug!(id = %email.id, matches = resources.len(), "Context fetched");
        resources
    }
}
