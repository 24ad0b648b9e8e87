// src/api.rs
//! HTTP surface. Every trigger goes through the same [`Pipeline`]; the cron endpoint only
//! adds the shared-secret check in front of it.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::extract::ExtractionError;
use crate::notify::DeliveryError;
use crate::pipeline::{DeliverySummary, Pipeline, PipelineError, ScanError};
use crate::render::{self, RenderContext};
use crate::schema::{self, NewsItem, ScanBatch, Sector, VerificationResult};
use crate::session::{ItemStamp, Session, SessionError, SessionSnapshot};
use crate::verify::Claim;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub session: Arc<Session>,
    cron_secret: Option<Arc<str>>,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>, cron_secret: Option<String>) -> Self {
        Self {
            pipeline,
            session: Arc::new(Session::new()),
            cron_secret: cron_secret.map(Arc::from),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/scan", post(scan))
        .route("/api/verify", post(verify))
        .route("/api/email", post(email))
        .route("/api/cron", get(cron).post(cron))
        .route("/api/session", get(session_view))
        .route("/report", get(report))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

// ---------- errors ----------

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized,
    Session(SessionError),
    Pipeline(PipelineError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    excerpt: Option<String>,
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, Option<String>) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request", None),
            ApiError::Unauthorized | ApiError::Pipeline(PipelineError::Unauthorized) => {
                (StatusCode::UNAUTHORIZED, "unauthorized", None)
            }
            ApiError::Session(e) => match e {
                SessionError::ScanInProgress
                | SessionError::AlreadyVerifying(_)
                | SessionError::AlreadyResolved(_) => (StatusCode::CONFLICT, "conflict", None),
                SessionError::StaleBatch { .. } => (StatusCode::GONE, "stale_batch", None),
                SessionError::NoBatch | SessionError::NoSuchItem { .. } => {
                    (StatusCode::NOT_FOUND, "not_found", None)
                }
            },
            ApiError::Pipeline(PipelineError::Scan(ScanError::Upstream(_))) => {
                (StatusCode::BAD_GATEWAY, "upstream", None)
            }
            ApiError::Pipeline(PipelineError::Scan(ScanError::Extraction(e))) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "extraction",
                Some(e.excerpt().to_string()),
            ),
            ApiError::Pipeline(PipelineError::Delivery(DeliveryError::NotConfigured(_))) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "config", None)
            }
            ApiError::Pipeline(PipelineError::Delivery(_)) => {
                (StatusCode::BAD_GATEWAY, "delivery", None)
            }
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::BadRequest(msg) => f.write_str(msg),
            ApiError::Unauthorized => f.write_str("unauthorized"),
            ApiError::Session(e) => write!(f, "{e}"),
            ApiError::Pipeline(e) => write!(f, "{e}"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, excerpt) = self.parts();
        let body = ErrorBody {
            error: self.to_string(),
            kind,
            excerpt,
        };
        (status, Json(body)).into_response()
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        ApiError::Session(e)
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        ApiError::Pipeline(e)
    }
}

impl From<ScanError> for ApiError {
    fn from(e: ScanError) -> Self {
        ApiError::Pipeline(PipelineError::Scan(e))
    }
}

impl From<ExtractionError> for ApiError {
    fn from(e: ExtractionError) -> Self {
        ScanError::from(e).into()
    }
}

impl From<DeliveryError> for ApiError {
    fn from(e: DeliveryError) -> Self {
        ApiError::Pipeline(PipelineError::Delivery(e))
    }
}

/// Optional JSON body: an empty body is `T::default()`.
fn optional_json<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))
}

// ---------- on-demand scan ----------

#[derive(Debug, Default, Deserialize)]
struct ScanReq {
    #[serde(default)]
    focus: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScanResp {
    generation: u64,
    generated_at: DateTime<Utc>,
    items: Vec<NewsItem>,
}

async fn scan(State(state): State<AppState>, body: Bytes) -> Result<Json<ScanResp>, ApiError> {
    let req: ScanReq = optional_json(&body)?;
    let permit = state.session.try_begin_scan()?;
    // On failure the permit drops here and the session stays empty.
    let batch = state.pipeline.run_scan(req.focus.as_deref()).await?;
    let generated_at = batch.generated_at;
    let items = batch.items.clone();
    let generation = permit.install(batch);
    Ok(Json(ScanResp {
        generation,
        generated_at,
        items,
    }))
}

// ---------- verification ----------

#[derive(Debug, Default, Deserialize)]
struct VerifyReq {
    #[serde(default)]
    headline: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    analysis: Option<String>,
    /// Batch generation + index address an item of the current session batch.
    #[serde(default)]
    generation: Option<u64>,
    #[serde(default)]
    index: Option<usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyResp {
    #[serde(flatten)]
    result: VerificationResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    stamp: Option<ItemStamp>,
    /// False when the batch was replaced while the check ran; the result was discarded.
    #[serde(skip_serializing_if = "Option::is_none")]
    applied: Option<bool>,
}

async fn verify(State(state): State<AppState>, body: Bytes) -> Result<Json<VerifyResp>, ApiError> {
    let req: VerifyReq = optional_json(&body)?;

    if let (Some(generation), Some(index)) = (req.generation, req.index) {
        let ticket = state
            .session
            .begin_verification(ItemStamp { generation, index })?;
        // A dropped request drops the ticket, which puts the item back to Idle.
        let result = state.pipeline.verify(&Claim::from(&ticket.item)).await;
        let stamp = ticket.stamp;
        let applied = ticket.complete(result.clone());
        return Ok(Json(VerifyResp {
            result,
            stamp: Some(stamp),
            applied: Some(applied),
        }));
    }

    let headline = req
        .headline
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .ok_or_else(|| ApiError::BadRequest("headline is required".to_string()))?;
    let claim = Claim {
        headline,
        source: req.source.filter(|s| !s.trim().is_empty()),
        analysis: req.analysis.filter(|s| !s.trim().is_empty()),
    };
    let result = state.pipeline.verify(&claim).await;
    Ok(Json(VerifyResp {
        result,
        stamp: None,
        applied: None,
    }))
}

// ---------- email ----------

#[derive(Debug, Default, Deserialize)]
struct EmailReq {
    #[serde(default)]
    items: Vec<Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmailResp {
    success: bool,
    item_count: usize,
    sent_to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_id: Option<String>,
}

async fn email(State(state): State<AppState>, body: Bytes) -> Result<Json<EmailResp>, ApiError> {
    let req: EmailReq = optional_json(&body)?;
    let items: Vec<NewsItem> = req
        .items
        .iter()
        .filter_map(|v| schema::validate(v).ok())
        .collect();
    if items.is_empty() {
        return Err(ApiError::BadRequest("No items to send".to_string()));
    }

    let batch = ScanBatch::new(items, Utc::now());
    let receipt = state.pipeline.deliver(&batch, None).await?;
    Ok(Json(EmailResp {
        success: true,
        item_count: batch.len(),
        sent_to: receipt.recipient,
        message_id: receipt.message_id,
    }))
}

// ---------- recurring trigger ----------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CronResp {
    success: bool,
    #[serde(flatten)]
    summary: DeliverySummary,
}

/// Bearer token check. No configured secret means nothing is authorized.
fn cron_authorized(expected: Option<&str>, headers: &HeaderMap) -> bool {
    let Some(expected) = expected else {
        return false;
    };
    let Some(given) = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    else {
        return false;
    };
    // Compare fixed-size digests rather than the raw strings.
    Sha256::digest(given.trim().as_bytes()) == Sha256::digest(expected.as_bytes())
}

async fn cron(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<CronResp>, ApiError> {
    if !cron_authorized(state.cron_secret.as_deref(), &headers) {
        counter!("brief_cron_rejected_total").increment(1);
        warn!(target: "cron", "rejected cron trigger");
        return Err(ApiError::Unauthorized);
    }
    info!(target: "cron", "cron trigger accepted");
    let summary = state.pipeline.run_scan_and_deliver().await?;
    Ok(Json(CronResp {
        success: true,
        summary,
    }))
}

// ---------- session + report ----------

#[derive(Debug, Deserialize)]
struct SessionQuery {
    #[serde(default)]
    sector: Option<String>,
}

async fn session_view(
    State(state): State<AppState>,
    Query(q): Query<SessionQuery>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let sector = match q.sector.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(label) => Some(
            Sector::from_label(label)
                .ok_or_else(|| ApiError::BadRequest(format!("unknown sector: {label}")))?,
        ),
        None => None,
    };
    Ok(Json(state.session.snapshot(sector)))
}

/// Interactive report of the current batch, with verification badges.
async fn report(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    let (_, batch) = state.session.current().ok_or(SessionError::NoBatch)?;
    let verifications = state.session.resolved();
    let cfg = state.pipeline.report_config();
    let now = batch.generated_at.with_timezone(&cfg.offset());
    let ctx = RenderContext::new(now)
        .with_title(&cfg.title)
        .with_verifications(&verifications);
    Ok(Html(render::render(&batch, &ctx).html))
}
