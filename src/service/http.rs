//! axum router for the model service.

use super::types::{
    ErrorBody, GenerateRequest, GenerateResponse, HealthResponse, TokenCountRequest,
    TokenCountResponse,
};
use super::TextBackend;
use crate::config::{GenerationParams, ServiceConfig};
use crate::error::ServiceError;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{debug, info, Level};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn TextBackend>,
    pub local_mode: bool,
    pub defaults: GenerationParams,
}

impl AppState {
    pub fn new(backend: Arc<dyn TextBackend>, local_mode: bool) -> Self {
        Self {
            backend,
            local_mode,
            defaults: GenerationParams::default(),
        }
    }

    pub fn with_defaults(mut self, defaults: GenerationParams) -> Self {
        self.defaults = defaults;
        self
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (
            status,
            Json(ErrorBody {
                detail: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// JSON body extractor whose rejections use the `{"detail": ...}` error body.
///
/// Status codes are axum's: 400 for malformed JSON, 415 for a missing
/// content type, 422 for a body that does not match the request type.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorBody>);

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => {
                debug!("Rejected request body: {}", rejection.body_text());
                Err((
                    rejection.status(),
                    Json(ErrorBody {
                        detail: rejection.body_text(),
                    }),
                ))
            }
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/v1/token_count", post(token_count_handler))
        .route("/api/v1/generate", post(generate_handler))
        .layer(trace_layer)
        .layer(cors)
        .with_state(state)
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        local_mode: state.local_mode,
    })
}

async fn token_count_handler(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<TokenCountRequest>,
) -> Json<TokenCountResponse> {
    let token_count = state.backend.count_tokens(&req.text).await;
    Json(TokenCountResponse { token_count })
}

async fn generate_handler(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<GenerateRequest>,
) -> Result<Json<GenerateResponse>, ServiceError> {
    let params = req.params(state.defaults);
    let text = state.backend.generate(&req.prompt, params).await?;
    let token_count = state.backend.count_tokens(&text).await;
    Ok(Json(GenerateResponse {
        text,
        token_count: Some(token_count),
    }))
}

/// Bind to the configured address and serve until the process is stopped.
pub async fn serve(config: &ServiceConfig, backend: Arc<dyn TextBackend>) -> std::io::Result<()> {
    let state = AppState::new(backend, config.local_mode).with_defaults(config.generation);
    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    info!(
        "Model service listening on {} ({} mode)",
        listener.local_addr()?,
        if config.local_mode { "local" } else { "remote" }
    );
    axum::serve(listener, router(state)).await
}
