use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    CreateLeadRequest, CreateStageRequest, MarkLostRequest, MoveLeadRequest, UpdateLeadRequest,
    UpdateStageRequest,
};
use crate::services::{BoardService, LeadService, StageService};

#[axum::debug_handler]
pub async fn get_board(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let board = BoardService::new(&config).get_board(auth.token()).await?;
    Ok(Json(json!(board)))
}

#[axum::debug_handler]
pub async fn create_stage(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<CreateStageRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let stage = StageService::new(&config).create_stage(request, auth.token()).await?;
    Ok((StatusCode::CREATED, Json(json!(stage))))
}

#[axum::debug_handler]
pub async fn update_stage(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(stage_id): Path<Uuid>,
    Json(request): Json<UpdateStageRequest>,
) -> Result<Json<Value>, AppError> {
    let stage = StageService::new(&config)
        .update_stage(stage_id, request, auth.token())
        .await?;
    Ok(Json(json!(stage)))
}

#[axum::debug_handler]
pub async fn create_lead(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateLeadRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    debug!("User {} creating lead", user.id);
    let lead = LeadService::new(&config).create_lead(request, auth.token()).await?;
    Ok((StatusCode::CREATED, Json(json!(lead))))
}

#[axum::debug_handler]
pub async fn update_lead(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(lead_id): Path<Uuid>,
    Json(request): Json<UpdateLeadRequest>,
) -> Result<Json<Value>, AppError> {
    let lead = LeadService::new(&config)
        .update_lead(lead_id, request, auth.token())
        .await?;
    Ok(Json(json!(lead)))
}

#[axum::debug_handler]
pub async fn move_lead(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(lead_id): Path<Uuid>,
    Json(request): Json<MoveLeadRequest>,
) -> Result<Json<Value>, AppError> {
    let lead = LeadService::new(&config)
        .move_lead(lead_id, request, auth.token())
        .await?;
    Ok(Json(json!(lead)))
}

#[axum::debug_handler]
pub async fn mark_lead_won(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(lead_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let lead = LeadService::new(&config).mark_won(lead_id, auth.token()).await?;
    Ok(Json(json!(lead)))
}

#[axum::debug_handler]
pub async fn mark_lead_lost(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(lead_id): Path<Uuid>,
    body: Option<Json<MarkLostRequest>>,
) -> Result<Json<Value>, AppError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let lead = LeadService::new(&config)
        .mark_lost(lead_id, request, auth.token())
        .await?;
    Ok(Json(json!(lead)))
}

#[axum::debug_handler]
pub async fn convert_lead(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(lead_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    debug!("User {} converting lead {}", user.id, lead_id);
    let (lead, patient) = LeadService::new(&config)
        .convert_to_patient(lead_id, auth.token())
        .await?;

    Ok(Json(json!({ "lead": lead, "patient": patient })))
}
