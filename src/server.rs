//! HTTP surface: REST endpoints over the store, agent, responder and voice
//! commands.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::error::IngestError;
use crate::ingest::{Ingestor, NewEmail};
use crate::pipeline::ResponseGenerator;
use crate::pipeline::responder::ReplyOptions;
use crate::voice;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub ingestor: Ingestor,
    pub responder: Arc<ResponseGenerator>,
    /// Fixture used to seed an empty store and for refreshes.
    pub samples_path: Arc<PathBuf>,
}

/// Build the router.
pub fn routes(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/emails", get(list_emails).post(create_email))
        .route("/api/emails/refresh", post(refresh_emails))
        .route("/api/emails/ingest", post(ingest_emails))
        .route("/api/emails/{id}", delete(delete_email))
        .route("/api/emails/{id}/reply", post(generate_reply))
        .route("/api/emails/{id}/quick-responses", post(quick_responses))
        .route("/api/voice/command", post(voice_command))
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

/// Bind `0.0.0.0:{port}` and serve until the process exits.
pub async fn serve(state: AppState, config: &ServerConfig) -> std::io::Result<()> {
    let app = routes(state, &config.cors_origins);
    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    info!(addr = %listener.local_addr()?, "HTTP server listening");
    axum::serve(listener, app).await
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

fn ingest_error_response(e: IngestError, context: &str) -> Response {
    match e {
        IngestError::MissingFields(fields) => error_response(
            StatusCode::BAD_REQUEST,
            format!("Missing required fields: {fields}"),
        ),
        other => {
            error!(error = %other, "{context}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, context)
        }
    }
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "emails": state.ingestor.store().len().await,
    }))
}

// ── Emails ──────────────────────────────────────────────────────────────

async fn list_emails(State(state): State<AppState>) -> impl IntoResponse {
    state.ingestor.seed_if_empty(&state.samples_path).await;
    Json(state.ingestor.store().list().await)
}

async fn create_email(State(state): State<AppState>, Json(body): Json<NewEmail>) -> Response {
    let email = match state.ingestor.prepare(body) {
        Ok(email) => email,
        Err(e) => return ingest_error_response(e, "Failed to process email"),
    };

    match state.ingestor.ingest(email).await {
        Ok(output) => (StatusCode::CREATED, Json(output)).into_response(),
        Err(e) => ingest_error_response(e, "Failed to process email"),
    }
}

async fn delete_email(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.ingestor.store().remove(&id).await {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(_) => error_response(StatusCode::NOT_FOUND, "Email not found"),
    }
}

async fn refresh_emails(State(state): State<AppState>) -> Response {
    match state.ingestor.seed_from_fixtures(&state.samples_path).await {
        Ok(count) => Json(json!({ "status": "refreshed", "emails": count })).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to refresh sample emails");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to refresh sample emails",
            )
        }
    }
}

#[derive(Deserialize)]
struct IngestRequest {
    emails: Vec<NewEmail>,
}

async fn ingest_emails(State(state): State<AppState>, Json(body): Json<IngestRequest>) -> Response {
    let emails = match body
        .emails
        .into_iter()
        .map(|email| state.ingestor.prepare(email))
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(emails) => emails,
        Err(e) => return ingest_error_response(e, "Failed to ingest emails"),
    };

    match state.ingestor.ingest_all(emails).await {
        Ok(outputs) => Json(json!({
            "message": format!("Successfully ingested {} emails", outputs.len()),
            "emails": outputs,
        }))
        .into_response(),
        Err(e) => ingest_error_response(e, "Failed to ingest emails"),
    }
}

// ── Replies ─────────────────────────────────────────────────────────────

async fn generate_reply(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Response {
    let options: ReplyOptions = if body.iter().all(u8::is_ascii_whitespace) {
        ReplyOptions::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(options) => options,
            Err(e) => {
                return error_response(StatusCode::BAD_REQUEST, format!("Invalid reply options: {e}"));
            }
        }
    };

    let Some(output) = state.ingestor.store().get(&id).await else {
        return error_response(StatusCode::NOT_FOUND, "Email not found");
    };

    let reply = state.responder.generate_reply(&output.email, &options).await;
    Json(reply).into_response()
}

async fn quick_responses(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Some(output) = state.ingestor.store().get(&id).await else {
        return error_response(StatusCode::NOT_FOUND, "Email not found");
    };

    let responses = state.responder.generate_quick_responses(&output.email).await;
    Json(json!({ "responses": responses })).into_response()
}

// ── Voice ───────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct VoiceCommandRequest {
    #[serde(default)]
    text: String,
}

async fn voice_command(
    State(state): State<AppState>,
    Json(body): Json<VoiceCommandRequest>,
) -> Response {
    let text = body.text.trim();
    if text.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "No command text provided");
    }

    let inbox = state.ingestor.store().list().await;
    let response = voice::respond(text, &inbox);
    Json(json!({ "command": { "text": text }, "response": response })).into_response()
}
