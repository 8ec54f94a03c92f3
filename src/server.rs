//! HTTP surface for a browser or chat front end.
//!
//! A thin JSON layer over one shared [`Engine`]; every handler maps directly
//! onto an engine operation.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/documents?name=..&full=bool` | Upload raw bytes; `Content-Type` is the declared type |
//! | `POST` | `/ask` | `{document_id, question}` → `{answer, citations}` |
//! | `POST` | `/reset` | Drop the active document (204) |
//! | `GET`  | `/session` | Active document summary and question history |
//! | `GET`  | `/document/text` | Full extracted text of the active document |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "NO_ACTIVE_DOCUMENT", "message": "no active document; upload a file first" } }
//! ```
//!
//! | Code | Status |
//! |------|--------|
//! | `UNSUPPORTED_TYPE` | 415 |
//! | `EXTRACTION_EMPTY`, `EXTRACTION_FAILED` | 422 |
//! | `NO_ACTIVE_DOCUMENT` | 404 |
//! | `INVALID_QUESTION` | 400 |
//! | `BACKEND_UNAVAILABLE` | 502 |
//!
//! Extraction errors also carry the per-backend `attempts` log.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use docqa_core::models::BackendAttempt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::info;

use crate::config::Config;
use crate::engine::{Answer, Engine, UploadOptions, UploadReceipt};
use crate::error::EngineError;
use crate::session::SessionSnapshot;

/// Start the server on `[server].bind` and run until the process exits.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let engine = Arc::new(Engine::from_config(config)?);
    let listener = TcpListener::bind(&config.server.bind).await?;
    serve(listener, router(engine, config.extraction.max_upload_bytes)).await
}

/// Serve `app` on an already-bound listener.
pub async fn serve(listener: TcpListener, app: Router) -> anyhow::Result<()> {
    info!(addr = %listener.local_addr()?, "docqa listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Build the route table around a shared engine.
pub fn router(engine: Arc<Engine>, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/documents", post(handle_upload))
        .route("/ask", post(handle_ask))
        .route("/reset", post(handle_reset))
        .route("/session", get(handle_session))
        .route("/document/text", get(handle_document_text))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(cors)
        .with_state(engine)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    attempts: Option<Vec<BackendAttempt>>,
}

/// An [`EngineError`] on its way to becoming an HTTP response.
struct AppError(EngineError);

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        Self(err)
    }
}

fn status_for(err: &EngineError) -> StatusCode {
    match err {
        EngineError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        EngineError::ExtractionEmpty { .. } | EngineError::ExtractionFailed { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        EngineError::NoActiveDocument { .. } => StatusCode::NOT_FOUND,
        EngineError::InvalidQuestion => StatusCode::BAD_REQUEST,
        EngineError::BackendUnavailable(_) => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let message = self.0.to_string();
        let code = self.0.code();
        let attempts = match self.0 {
            EngineError::ExtractionEmpty { attempts }
            | EngineError::ExtractionFailed { attempts } => Some(attempts),
            _ => None,
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code,
                message,
                attempts,
            },
        };
        (status, Json(body)).into_response()
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /documents ============

#[derive(Deserialize)]
struct UploadQuery {
    name: Option<String>,
    #[serde(default)]
    full: bool,
}

async fn handle_upload(
    State(engine): State<Arc<Engine>>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<UploadReceipt>, AppError> {
    let declared_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let options = UploadOptions {
        process_full_document: query.full,
        name: query.name,
    };
    let receipt = engine.upload(&body, declared_type, options).await?;
    Ok(Json(receipt))
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskRequest {
    document_id: String,
    question: String,
}

async fn handle_ask(
    State(engine): State<Arc<Engine>>,
    Json(req): Json<AskRequest>,
) -> Result<Json<Answer>, AppError> {
    let answer = engine.ask(&req.document_id, &req.question).await?;
    Ok(Json(answer))
}

// ============ POST /reset ============

async fn handle_reset(State(engine): State<Arc<Engine>>) -> StatusCode {
    engine.reset();
    StatusCode::NO_CONTENT
}

// ============ GET /session ============

async fn handle_session(State(engine): State<Arc<Engine>>) -> Json<SessionSnapshot> {
    Json(engine.snapshot())
}

// ============ GET /document/text ============

#[derive(Serialize)]
struct DocumentTextResponse {
    text: String,
}

async fn handle_document_text(
    State(engine): State<Arc<Engine>>,
) -> Result<Json<DocumentTextResponse>, AppError> {
    let text = engine
        .document_text()
        .ok_or(EngineError::NoActiveDocument { requested: None })?;
    Ok(Json(DocumentTextResponse { text }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_taxonomy() {
        assert_eq!(
            status_for(&EngineError::UnsupportedFormat("x/y".into())),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(
            status_for(&EngineError::ExtractionEmpty {
                attempts: Vec::new()
            }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(&EngineError::NoActiveDocument { requested: None }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&EngineError::InvalidQuestion),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&EngineError::BackendUnavailable("down".into())),
            StatusCode::BAD_GATEWAY
        );
    }
}
