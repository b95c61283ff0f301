//! REST API server for the property estimate service
//!
//! Exposes inquiries, the questionnaire and estimate generation over HTTP

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::EstimationError;
use crate::models::AreaUnit;
use crate::service::EstimateService;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct CreateInquiryRequest {
    pub address: String,
    pub lot_size: Decimal,
    #[serde(default)]
    pub unit: AreaUnit,
    pub user_context: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    #[serde(default)]
    pub response: String,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

type ApiResult = (StatusCode, Json<ApiResponse>);

fn ok<T: Serialize>(data: T) -> ApiResult {
    (StatusCode::OK, Json(ApiResponse::success(data)))
}

fn failure(e: EstimationError) -> ApiResult {
    let status = match &e {
        EstimationError::Validation(_) => StatusCode::BAD_REQUEST,
        EstimationError::NotFound(_) => StatusCode::NOT_FOUND,
        EstimationError::Conflict(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        warn!("Request failed: {}", e);
    }
    (status, Json(ApiResponse::error(e.to_string())))
}

fn respond<T: Serialize>(result: crate::Result<T>) -> ApiResult {
    match result {
        Ok(data) => ok(data),
        Err(e) => failure(e),
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<EstimateService>,
}

/// =============================
/// Health Endpoint
/// =============================

async fn health(State(state): State<ApiState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "model": state.service.model_name(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Inquiry Endpoints
/// =============================

async fn create_inquiry(
    State(state): State<ApiState>,
    Json(req): Json<CreateInquiryRequest>,
) -> ApiResult {
    info!("Received inquiry for {} ({} {})", req.address, req.lot_size, req.unit);

    let result = state
        .service
        .create_inquiry(&req.address, req.lot_size, req.unit, req.user_context)
        .await;
    match result {
        Ok(inquiry) => (StatusCode::CREATED, Json(ApiResponse::success(inquiry))),
        Err(e) => failure(e),
    }
}

async fn get_inquiry(State(state): State<ApiState>, Path(id): Path<Uuid>) -> ApiResult {
    respond(state.service.inquiry(id).await)
}

/// =============================
/// Questionnaire Endpoints
/// =============================

async fn get_question(
    State(state): State<ApiState>,
    Path((id, number)): Path<(Uuid, u8)>,
) -> ApiResult {
    respond(state.service.question(id, number).await)
}

async fn answer_question(
    State(state): State<ApiState>,
    Path((id, number)): Path<(Uuid, u8)>,
    Json(req): Json<AnswerRequest>,
) -> ApiResult {
    let result = state.service.answer_question(id, number, &req.response).await;
    respond(result.map(|inquiry| {
        serde_json::json!({
            "inquiry_id": inquiry.id,
            "current_question": inquiry.current_question,
            "progress": inquiry.progress_percentage(),
            "questionnaire_completed": inquiry.questionnaire_completed,
        })
    }))
}

/// =============================
/// Estimate Endpoints
/// =============================

/// Waits for generation. A provider failure still answers 200 with a
/// `failed` record carrying the error.
async fn generate_estimate(State(state): State<ApiState>, Path(id): Path<Uuid>) -> ApiResult {
    info!(inquiry_id = %id, "Estimate generation requested");
    respond(state.service.generate_estimate(id).await)
}

async fn estimate_status(State(state): State<ApiState>, Path(id): Path<Uuid>) -> ApiResult {
    respond(state.service.status(id).await)
}

async fn get_estimate(State(state): State<ApiState>, Path(id): Path<Uuid>) -> ApiResult {
    let result = state.service.estimate(id).await;
    respond(result.map(|record| {
        let roi = record.estimate.as_ref().and_then(|e| e.roi_percentage());
        let breakdown = record.estimate.as_ref().and_then(|e| e.revenue_breakdown(None));
        let chart_data = record
            .estimate
            .as_ref()
            .map(|e| e.chart_data())
            .unwrap_or_default();
        serde_json::json!({
            "record": record,
            "roi_percentage": roi,
            "revenue_breakdown": breakdown,
            "chart_data": chart_data,
        })
    }))
}

/// =============================
/// Router
/// =============================

pub fn create_router(service: Arc<EstimateService>) -> Router {
    let state = ApiState { service };

    Router::new()
        .route("/health", get(health))
        .route("/api/inquiries", post(create_inquiry))
        .route("/api/inquiries/:id", get(get_inquiry))
        .route(
            "/api/inquiries/:id/questions/:number",
            get(get_question).post(answer_question),
        )
        .route(
            "/api/inquiries/:id/estimate",
            post(generate_estimate).get(get_estimate),
        )
        .route("/api/inquiries/:id/status", get(estimate_status))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    service: Arc<EstimateService>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(service);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
