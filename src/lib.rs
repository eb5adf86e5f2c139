//! Mail triage: urgency scoring, summaries and reply drafts for an inbox.

pub mod clock;
pub mod config;
pub mod error;
pub mod ingest;
pub mod llm;
pub mod pipeline;
pub mod remote;
pub mod server;
pub mod store;
pub mod voice;
