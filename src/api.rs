//! REST API server for KYC verification
//!
//! Exposes the one-shot orchestrator, the step-by-step session workflow and
//! standalone finger extraction over HTTP.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::KycConfig;
use crate::decision::DecisionInputs;
use crate::error::KycError;
use crate::models::{Contact, ReviewDecision};
use crate::orchestrator::{KycApplication, KycOrchestrator};
use crate::segmentation::{EncodedSegmentation, Region, RegionSegmenter, SegmentationResult};
use crate::session::SessionId;
use crate::workflow::{Hand, SessionWorkflow};

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct StartKycRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    /// Base64-encoded images
    pub id_document: String,
    pub address_document: String,
    pub selfie: String,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub decision: ReviewDecision,
    #[serde(default)]
    pub comments: Option<String>,
}

/// Names the session a new document replaces, if any.
#[derive(Debug, Default, Deserialize)]
pub struct DocumentQuery {
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SelfieQuery {
    pub session_id: String,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub error_kind: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            error_kind: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(err: &KycError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(err.to_string()),
            error_kind: Some(err.kind().to_string()),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Segmentation as sent over the wire, images base64 JPEG.
#[derive(Debug, Serialize)]
pub struct SegmentationPayload {
    pub num_fingers: usize,
    pub regions: Vec<Region>,
    pub fingers: Vec<String>,
    pub finger_lines: Vec<String>,
    pub contour_img: String,
}

impl From<EncodedSegmentation> for SegmentationPayload {
    fn from(encoded: EncodedSegmentation) -> Self {
        Self {
            num_fingers: encoded.num_fingers,
            regions: encoded.regions,
            fingers: encoded.fingers.iter().map(|b| STANDARD.encode(b)).collect(),
            finger_lines: encoded.finger_lines.iter().map(|b| STANDARD.encode(b)).collect(),
            contour_img: STANDARD.encode(&encoded.contour_img),
        }
    }
}

#[derive(Debug, Serialize)]
struct HandResponse {
    session_id: SessionId,
    hand: &'static str,
    #[serde(flatten)]
    segmentation: SegmentationPayload,
}

/// =============================
/// Error Mapping
/// =============================

pub struct ApiError(KycError);

impl From<KycError> for ApiError {
    fn from(err: KycError) -> Self {
        Self(err)
    }
}

pub fn status_for(err: &KycError) -> StatusCode {
    match err {
        KycError::DecodeError(_) | KycError::InvalidInput(_) | KycError::NoFaceFound(_) => {
            StatusCode::BAD_REQUEST
        }
        KycError::SessionNotFound(_) | KycError::CustomerNotFound(_) => StatusCode::NOT_FOUND,
        KycError::InvalidTransition { .. } => StatusCode::CONFLICT,
        KycError::CollaboratorError { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            error!(kind = self.0.kind(), "Request failed: {}", self.0);
        } else {
            warn!(kind = self.0.kind(), "Request rejected: {}", self.0);
        }

        (status, Json(ApiResponse::error(&self.0))).into_response()
    }
}

type ApiResult = std::result::Result<Json<ApiResponse>, ApiError>;

fn ok<T: Serialize>(data: T) -> ApiResult {
    Ok(Json(ApiResponse::success(data)))
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<KycConfig>,
    pub orchestrator: Arc<KycOrchestrator>,
    pub workflow: Arc<SessionWorkflow>,
    pub segmenter: RegionSegmenter,
}

/// =============================
/// Helpers
/// =============================

/// Raw upload body, which must be a non-empty `image/*` within the size limit.
fn image_body<'a>(headers: &HeaderMap, body: &'a Bytes, max_bytes: usize) -> crate::Result<&'a [u8]> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if !content_type.starts_with("image/") {
        return Err(KycError::InvalidInput(format!(
            "expected an image/* upload, got '{}'",
            content_type
        )));
    }
    if body.is_empty() {
        return Err(KycError::InvalidInput("empty image upload".to_string()));
    }
    if body.len() > max_bytes {
        return Err(KycError::InvalidInput(format!(
            "image exceeds {} bytes",
            max_bytes
        )));
    }

    Ok(body.as_ref())
}

fn decode_base64(field: &str, value: &str) -> crate::Result<Vec<u8>> {
    STANDARD
        .decode(value.trim())
        .map_err(|e| KycError::InvalidInput(format!("{} is not valid base64: {}", field, e)))
}

async fn encode_segmentation(segmentation: SegmentationResult) -> crate::Result<SegmentationPayload> {
    let encoded = tokio::task::spawn_blocking(move || segmentation.encode_jpeg())
        .await
        .map_err(|e| KycError::TaskError(format!("encoding task failed: {}", e)))??;

    Ok(encoded.into())
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// One-shot KYC Endpoints
/// =============================

async fn start_kyc(State(state): State<ApiState>, Json(req): Json<StartKycRequest>) -> ApiResult {
    info!(email = %req.email, "Received KYC start request");

    let application = KycApplication {
        id_document: decode_base64("id_document", &req.id_document)?,
        address_document: decode_base64("address_document", &req.address_document)?,
        selfie: decode_base64("selfie", &req.selfie)?,
        contact: Contact {
            first_name: req.first_name,
            last_name: req.last_name,
            email: req.email,
            phone: req.phone.filter(|p| !p.trim().is_empty()),
        },
    };

    let report = state.orchestrator.run(application).await?;
    ok(serde_json::json!({
        "customer_id": report.customer.customer_id,
        "status": report.customer.status,
        "required_actions": report.required_actions,
        "audit_id": report.audit_id,
        "customer": report.customer,
    }))
}

async fn kyc_status(State(state): State<ApiState>, Path(customer_id): Path<Uuid>) -> ApiResult {
    ok(state.orchestrator.status(customer_id).await?)
}

async fn review_kyc(
    State(state): State<ApiState>,
    Path(customer_id): Path<Uuid>,
    Json(req): Json<ReviewRequest>,
) -> ApiResult {
    info!(customer_id = %customer_id, decision = ?req.decision, "Received review");

    let outcome = state
        .orchestrator
        .review(customer_id, req.decision, req.comments)
        .await?;
    ok(outcome)
}

/// =============================
/// Session Workflow Endpoints
/// =============================

async fn upload_document(
    State(state): State<ApiState>,
    Query(query): Query<DocumentQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult {
    let image = image_body(&headers, &body, state.config.max_upload_bytes)?;
    match query.session_id {
        Some(previous) => {
            let previous: SessionId = previous.parse()?;
            ok(state.workflow.restart(&previous, image).await?)
        }
        None => ok(state.workflow.upload_document(image).await?),
    }
}

async fn upload_selfie(
    State(state): State<ApiState>,
    Query(query): Query<SelfieQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult {
    let id: SessionId = query.session_id.parse()?;
    let image = image_body(&headers, &body, state.config.max_upload_bytes)?;
    ok(state.workflow.upload_selfie(&id, image).await?)
}

async fn get_session(State(state): State<ApiState>, Path(id): Path<String>) -> ApiResult {
    let id: SessionId = id.parse()?;
    ok(state.workflow.session(&id).await?)
}

async fn close_session(State(state): State<ApiState>, Path(id): Path<String>) -> ApiResult {
    let id: SessionId = id.parse()?;
    state.workflow.close(&id).await?;
    ok(serde_json::json!({ "session_id": id, "closed": true }))
}

async fn capture_hand(state: ApiState, id: String, hand: Hand, headers: HeaderMap, body: Bytes) -> ApiResult {
    let id: SessionId = id.parse()?;
    let image = image_body(&headers, &body, state.config.max_upload_bytes)?;

    let outcome = match hand {
        Hand::Left => state.workflow.capture_left_hand(&id, image).await?,
        Hand::Right => state.workflow.capture_right_hand(&id, image).await?,
    };

    ok(HandResponse {
        session_id: outcome.session_id,
        hand: match outcome.hand {
            Hand::Left => "left",
            Hand::Right => "right",
        },
        segmentation: encode_segmentation(outcome.segmentation).await?,
    })
}

async fn left_hand(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult {
    capture_hand(state, id, Hand::Left, headers, body).await
}

async fn right_hand(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult {
    capture_hand(state, id, Hand::Right, headers, body).await
}

async fn finalize_session(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(inputs): Json<DecisionInputs>,
) -> ApiResult {
    let id: SessionId = id.parse()?;
    ok(state.workflow.finalize(&id, &inputs).await?)
}

/// =============================
/// Fingerprint Endpoint
/// =============================

async fn extract_fingers(State(state): State<ApiState>, headers: HeaderMap, body: Bytes) -> ApiResult {
    let image = image_body(&headers, &body, state.config.max_upload_bytes)?.to_vec();
    let segmenter = state.segmenter;

    let segmentation = tokio::task::spawn_blocking(move || segmenter.segment_bytes(&image))
        .await
        .map_err(|e| KycError::TaskError(format!("segmentation task failed: {}", e)))??;

    info!(region_count = segmentation.region_count(), "Fingers extracted");
    ok(encode_segmentation(segmentation).await?)
}

/// =============================
/// Router
/// =============================

pub fn create_router(state: ApiState) -> Router {
    // Room for three base64 images in one JSON body
    let body_limit = state.config.max_upload_bytes.saturating_mul(4);

    let api = Router::new()
        .route("/kyc/start", post(start_kyc))
        .route("/kyc/status/:id", get(kyc_status))
        .route("/kyc/review/:id", post(review_kyc))
        .route("/kyc/upload-document", post(upload_document))
        .route("/kyc/upload-selfie", post(upload_selfie))
        .route("/kyc/session/:id", get(get_session).delete(close_session))
        .route("/kyc/session/:id/left-hand", post(left_hand))
        .route("/kyc/session/:id/right-hand", post(right_hand))
        .route("/kyc/session/:id/finalize", post(finalize_session))
        .route("/fingerprint/extract-fingers", post(extract_fingers));

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(body_limit)),
        )
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    state: ApiState,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("KYC API listening on http://0.0.0.0:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
