// HTTP gateway
//
// Responsibilities:
// - POST /api/chat: normalize UI messages, open the agent stream, transcode, frame
// - GET /api/data/{storage_key} and /api/result/{task_id}: backend proxies
// - Heartbeat endpoint
// - 404 for unknown paths (axum default)

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use futures::StreamExt;
use serde_json::json;

use crate::error::GatewayError;
use crate::http_client::RequestCtx;
use crate::model::ChatRequestBody;
use crate::normalizer::normalize_chat;
use crate::provider::{AgentUpstream, BackendApi};
use crate::stream::Framing;
use crate::transcoder::Transcoder;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Everything a handler can fail with, mapped onto the public error bodies.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(&'static str),

    #[error("chat upstream failed: {0}")]
    Chat(#[source] GatewayError),

    /// `public` is the body used when the backend answered with a status.
    #[error("backend call failed: {source}")]
    Backend {
        public: &'static str,
        #[source]
        source: GatewayError,
    },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, public_message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, *msg),
            ApiError::Chat(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error"),
            ApiError::Backend { public, source } => match source
                .upstream_status()
                .and_then(|s| StatusCode::from_u16(s).ok())
            {
                Some(status) => (status, *public),
                None => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
            },
        };
        (status, Json(json!({ "error": public_message }))).into_response()
    }
}

// ---------------------------------------------------------------------------
// Shared application state
// ---------------------------------------------------------------------------

/// Shared state injected into axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<dyn AgentUpstream>,
    pub backend: Arc<dyn BackendApi>,
    pub transcoder: Transcoder,
}

/// Correlation id from the inbound request, or a fresh UUID v4.
fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Heartbeat endpoint: GET /healthz -> 200 OK
pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

pub async fn chat_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let body: ChatRequestBody = serde_json::from_slice(&body)
        .map_err(|_| ApiError::BadRequest("request body is not valid JSON"))?;
    if body.messages.is_empty() {
        return Err(ApiError::BadRequest("messages must not be empty"));
    }

    let rid = request_id(&headers);
    let agent_req = normalize_chat(&body);
    tracing::info!(req.id = %rid, messages = agent_req.messages.len(), "chat request");

    let upstream = state
        .agent
        .open_chat_stream(&agent_req, &RequestCtx::with_request_id(&rid))
        .await
        .map_err(|e| {
            tracing::error!(req.id = %rid, error = %e, "chat upstream failed");
            ApiError::Chat(e)
        })?;

    let framing = state.transcoder.config().framing;
    let frames = state
        .transcoder
        .events(upstream, &rid)
        .map(move |event| framing.encode(&event));

    let mut out = HeaderMap::new();
    out.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(framing.content_type()),
    );
    out.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    if framing == Framing::Legacy {
        out.insert(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        );
    }
    if let Ok(v) = HeaderValue::from_str(&rid) {
        out.insert(REQUEST_ID_HEADER, v);
    }
    Ok((StatusCode::OK, out, Body::from_stream(frames)).into_response())
}

pub async fn data_handler(
    State(state): State<AppState>,
    Path(storage_key): Path<String>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let rid = request_id(&headers);
    tracing::debug!(req.id = %rid, %storage_key, "price bars request");
    state
        .backend
        .price_bars(&storage_key, &RequestCtx::with_request_id(&rid))
        .await
        .map(Json)
        .map_err(|source| {
            tracing::error!(req.id = %rid, error = %source, "price bars proxy failed");
            ApiError::Backend {
                public: "Failed to fetch from backend",
                source,
            }
        })
}

pub async fn result_handler(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let rid = request_id(&headers);
    tracing::debug!(req.id = %rid, %task_id, "task result request");
    state
        .backend
        .task_result(&task_id, &RequestCtx::with_request_id(&rid))
        .await
        .map(Json)
        .map_err(|source| {
            tracing::error!(req.id = %rid, error = %source, "task result proxy failed");
            ApiError::Backend {
                public: "Failed to fetch result from backend",
                source,
            }
        })
}

// ---------------------------------------------------------------------------
// Router construction
// ---------------------------------------------------------------------------

/// Build the axum router. Clients are injected; no side effects.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/api/data/{storage_key}", get(data_handler))
        .route("/api/result/{task_id}", get(result_handler))
        .route("/healthz", get(healthz))
        .with_state(state)
}
