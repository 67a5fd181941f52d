use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, RawQuery, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::contact::{self, ContactForm, ContactRateLimiter, Mailer};
use crate::enrollment::EnrollmentService;
use crate::enrollment::callback::{ReturnParams, landing_redirect};
use crate::enrollment::plans::{self, Plan};
use crate::enrollment::presentation;
use crate::errors::EnrollmentError;
use crate::kitchen::ImageGenerator;

pub const RATE_LIMITED_MESSAGE: &str = "please wait before sending again";
pub const MISSING_FIELDS_MESSAGE: &str = "all fields are required";
pub const MAIL_NOT_CONFIGURED_MESSAGE: &str = "mail configuration incomplete";
pub const MAIL_FAILED_MESSAGE: &str = "there was an error, try again later";
pub const PROMPT_REQUIRED_MESSAGE: &str = "Prompt is required";
pub const IMAGE_FAILED_MESSAGE: &str = "Failed to generate image";

const UNKNOWN_CLIENT: &str = "unknown";

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub enrollment: EnrollmentService,
    pub rate_limiter: ContactRateLimiter,
    /// `None` when SMTP credentials or recipients are missing.
    pub mailer: Option<Arc<dyn Mailer>>,
    pub images: Arc<dyn ImageGenerator>,
    pub mail_subject: String,
}

pub type SharedState = Arc<AppState>;

// ── Request payload types ─────────────────────────────────────────────

/// Either a catalog plan by name or a complete plan object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum EnrollRequest {
    ByName { plan: String },
    Custom(Plan),
}

#[derive(Debug, Deserialize)]
pub struct KitchenRequest {
    #[serde(default)]
    pub prompt: String,
}

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    TooManyRequests(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::TooManyRequests(msg) => (StatusCode::TOO_MANY_REQUESTS, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

impl From<EnrollmentError> for ApiError {
    fn from(e: EnrollmentError) -> Self {
        match e {
            EnrollmentError::UnknownPlan { .. } => ApiError::NotFound(e.to_string()),
            EnrollmentError::InvalidPlan(_) | EnrollmentError::DateOverflow { .. } => {
                ApiError::BadRequest(e.to_string())
            }
            other => {
                error!(error = %other, "enrollment failed");
                ApiError::Internal(other.to_string())
            }
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/plans", get(list_plans))
        .route("/api/patpass/enroll", post(enroll))
        .route("/api/patpass/callback", get(patpass_callback).post(patpass_callback))
        .route("/api/patpass/result", get(enrollment_result))
        .route("/api/send-message", post(send_message))
        .route("/api/generate-kitchen", post(generate_kitchen))
        .route("/health", get(health_check))
}

// ── Helpers ───────────────────────────────────────────────────────────

/// Client key for rate limiting: the raw `x-forwarded-for` header.
fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn list_plans() -> Json<Vec<Plan>> {
    Json(plans::catalog())
}

async fn enroll(
    State(state): State<SharedState>,
    payload: Result<Json<EnrollRequest>, JsonRejection>,
) -> Result<Redirect, ApiError> {
    let Json(req) = payload.map_err(|rejection| {
        debug!(error = %rejection, "rejected enrollment body");
        ApiError::BadRequest(rejection.body_text())
    })?;
    let plan = match req {
        EnrollRequest::ByName { plan } => {
            plans::find_plan(&plan).ok_or(EnrollmentError::UnknownPlan { name: plan })?
        }
        EnrollRequest::Custom(plan) => plan,
    };
    info!(plan = %plan.name, "starting enrollment");

    let redirect = state.enrollment.simulator.simulate(&plan).await?;
    Ok(Redirect::to(redirect.location.as_str()))
}

async fn patpass_callback(
    State(state): State<SharedState>,
    Query(params): Query<ReturnParams>,
) -> Redirect {
    info!(
        token = ?params.token,
        tbk_token = ?params.tbk_token,
        tbk_orden_compra = ?params.tbk_orden_compra,
        tbk_id_sesion = ?params.tbk_id_sesion,
        "PatPass callback received"
    );
    let target = landing_redirect(&state.enrollment.landing_url, &params);
    debug!(%target, "redirecting to landing page");
    Redirect::temporary(target.as_str())
}

/// The landing page forwards its own query string here.
async fn enrollment_result(
    State(state): State<SharedState>,
    RawQuery(query): RawQuery,
) -> Response {
    let mut page_url = state.enrollment.landing_url.clone();
    page_url.set_query(query.as_deref());

    match presentation::present(&state.enrollment.processor, &page_url).await {
        Some(p) => Json(p).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn send_message(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let client = client_key(&headers);
    state
        .rate_limiter
        .check(&client)
        .map_err(|_| ApiError::TooManyRequests(RATE_LIMITED_MESSAGE.into()))?;

    let form: ContactForm = serde_json::from_slice(&body).map_err(|e| {
        warn!(error = %e, "unreadable contact form body");
        ApiError::Internal(MAIL_FAILED_MESSAGE.into())
    })?;
    if !form.is_complete() {
        return Err(ApiError::BadRequest(MISSING_FIELDS_MESSAGE.into()));
    }

    let mailer = state.mailer.as_ref().ok_or_else(|| {
        error!("contact form submitted but mail is not configured");
        ApiError::Internal(MAIL_NOT_CONFIGURED_MESSAGE.into())
    })?;

    let email = contact::compose(&form, mailer.sender(), mailer.recipients(), &state.mail_subject);
    mailer.send(email).await.map_err(|e| {
        error!(error = %e, "failed to send contact message");
        ApiError::Internal(MAIL_FAILED_MESSAGE.into())
    })?;

    Ok(Json(serde_json::json!({"success": true})))
}

async fn generate_kitchen(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let req: KitchenRequest = serde_json::from_slice(&body).map_err(|e| {
        warn!(error = %e, "unreadable kitchen request body");
        ApiError::Internal(IMAGE_FAILED_MESSAGE.into())
    })?;
    if req.prompt.trim().is_empty() {
        return Err(ApiError::BadRequest(PROMPT_REQUIRED_MESSAGE.into()));
    }

    let image = state.images.generate(&req.prompt).await.map_err(|e| {
        error!(error = %e, "kitchen image generation failed");
        ApiError::Internal(IMAGE_FAILED_MESSAGE.into())
    })?;

    Ok(Json(serde_json::json!({"success": true, "image": image})))
}
