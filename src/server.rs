use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::analysis::{AiReportResponse, AnalysisError, AnalysisReport, Analyzer};
use crate::config::Config;

pub struct AppState {
    pub analyzer: Analyzer,
    pub config: Config,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/sentiment/", post(sentiment).fallback(post_only))
        .route("/api/sentiment", post(sentiment).fallback(post_only))
        .route("/api/aireport/", post(ai_report).fallback(post_only))
        .route("/api/aireport", post(ai_report).fallback(post_only))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until the listener fails or the process receives Ctrl-C
pub async fn serve(listener: tokio::net::TcpListener, state: Arc<AppState>) -> std::io::Result<()> {
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// An error response: status plus `{"error": message}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<AnalysisError> for ApiError {
    fn from(err: AnalysisError) -> Self {
        match &err {
            AnalysisError::InvalidUrl(_) => ApiError::bad_request(err.to_string()),
            AnalysisError::Fetch(e) if e.is_video_error() => ApiError::bad_request(err.to_string()),
            AnalysisError::Fetch(_) => {
                error!("Analysis failed: {err}");
                ApiError {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: err.to_string(),
                }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct AnalyzeRequest {
    video_url: Option<String>,
    #[serde(alias = "comment_count")]
    comment_limit: Option<serde_json::Value>,
    #[serde(default)]
    include_ai_report: bool,
}

/// Validated request input
#[derive(Debug, PartialEq)]
struct AnalyzeInput {
    video_url: String,
    limit: i64,
    include_ai: bool,
}

fn parse_request(body: &[u8], config: &Config) -> Result<AnalyzeInput, ApiError> {
    let req: AnalyzeRequest = serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {e}")))?;

    let video_url = req
        .video_url
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::bad_request("YouTube video URL is required"))?;

    let limit = parse_limit(req.comment_limit.as_ref(), config.default_comment_limit)?;

    Ok(AnalyzeInput {
        video_url,
        limit: config.clamp_limit(limit),
        include_ai: req.include_ai_report,
    })
}

/// Accept an integer or a string holding one
fn parse_limit(value: Option<&serde_json::Value>, default: i64) -> Result<i64, ApiError> {
    let invalid = || ApiError::bad_request("comment_limit must be an integer");
    match value {
        None | Some(serde_json::Value::Null) => Ok(default),
        Some(serde_json::Value::Number(n)) => n.as_i64().ok_or_else(invalid),
        Some(serde_json::Value::String(s)) => s.trim().parse().map_err(|_| invalid()),
        Some(_) => Err(invalid()),
    }
}

async fn sentiment(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Json<AnalysisReport>, ApiError> {
    let input = parse_request(&body, &state.config)?;
    debug!("POST /api/sentiment {input:?}");

    let report = state
        .analyzer
        .analyze(&input.video_url, input.limit, input.include_ai)
        .await?;
    Ok(Json(report))
}

async fn ai_report(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Json<AiReportResponse>, ApiError> {
    let input = parse_request(&body, &state.config)?;
    debug!("POST /api/aireport {input:?}");

    let report = state.analyzer.ai_report(&input.video_url, input.limit).await?;
    Ok(Json(report))
}

async fn post_only() -> ApiError {
    ApiError {
        status: StatusCode::METHOD_NOT_ALLOWED,
        message: "Only POST requests are allowed".to_string(),
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
