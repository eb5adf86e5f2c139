use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use mail_triage::clock::{Clock, SystemClock};
use mail_triage::config::TriageConfig;
use mail_triage::ingest::{Ingestor, load_fixtures};
use mail_triage::llm::create_provider;
use mail_triage::pipeline::types::EmailAgentOutput;
use mail_triage::pipeline::{EmailAgent, ResponseGenerator};
use mail_triage::server::{self, AppState};
use mail_triage::store::EmailStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = TriageConfig::from_env().context("invalid configuration")?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Resolved once; every component shares the same provider.
    let llm = match &config.llm {
        Some(llm_config) => match create_provider(llm_config) {
            Ok(provider) => Some(provider),
            Err(e) => {
                tracing::warn!(error = %e, "Generative backend unavailable, using fallbacks");
                None
            }
        },
        None => None,
    };

    let agent = EmailAgent::from_config(&config, llm.clone(), Arc::clone(&clock))?;

    eprintln!("📬 Mail Triage v{}", env!("CARGO_PKG_VERSION"));
    eprintln!(
        "   Classifier: {}",
        config
            .classifier
            .as_ref()
            .map_or("heuristic only", |c| c.model.as_str())
    );
    eprintln!(
        "   Generative: {}",
        config.llm.as_ref().map_or("disabled", |c| c.model.as_str())
    );

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("serve") => {
            eprintln!("   HTTP: http://0.0.0.0:{}\n", config.server.port);
            let ingestor = Ingestor::new(agent, EmailStore::new(), Arc::clone(&clock));
            ingestor.seed_if_empty(&config.server.samples_path).await;

            let state = AppState {
                ingestor,
                responder: Arc::new(ResponseGenerator::with_clock(llm, clock)),
                samples_path: Arc::new(config.server.samples_path.clone()),
            };
            server::serve(state, &config.server)
                .await
                .context("HTTP server failed")?;
        }
        other => {
            let path = other
                .map(PathBuf::from)
                .unwrap_or_else(|| config.server.samples_path.clone());
            eprintln!("   Fixtures: {}\n", path.display());

            let emails = load_fixtures(&path, clock.now())
                .await
                .with_context(|| format!("failed to load {}", path.display()))?;
            for result in agent.run_batch(emails).await {
                print_output(&result?);
            }
        }
    }

    Ok(())
}

fn print_output(output: &EmailAgentOutput) {
    let email = &output.email;
    println!(
        "[{}] {} (confidence {:.2}, {})",
        email.urgency.as_str().to_uppercase(),
        email.email.subject,
        email.confidence,
        email.priority_meta.source.as_str()
    );
    println!("  From: {}", email.email.from);
    for line in output.summary.lines() {
        println!("  {line}");
    }
    for suggestion in &output.suggestions {
        println!("  -> {}: {}", suggestion.action.as_str(), suggestion.rationale);
    }
    for insight in &output.contextual_insights {
        println!("  ** {}: {}", insight.title, insight.summary);
    }
    println!();
}
