//! Email triage pipeline.
//!
//! Every email flows through `EmailAgent::run`, which fans out to:
//! 1. `PriorityClassifier::classify`: heuristic score, blended with the remote
//!    model when one is configured and answers
//! 2. `Summarizer::summarize`: generative bullets or the fallback preview
//! 3. `Summarizer::suggest_actions`: keyword-triggered follow-ups
//! 4. `ContextFetcher::fetch`: rule-matched context snippets
//!
//! and merges the results into one `EmailAgentOutput`. Replies are drafted
//! separately by `ResponseGenerator`.
//!
//! **Provider failures never fail a run.** Only a sub-task that panics does.

pub mod agent;
pub mod classifier;
pub mod context;
pub mod heuristic;
pub mod responder;
pub mod summarizer;
pub mod types;

pub use agent::EmailAgent;
pub use classifier::PriorityClassifier;
pub use context::ContextFetcher;
pub use heuristic::HeuristicScorer;
pub use responder::ResponseGenerator;
pub use summarizer::Summarizer;
