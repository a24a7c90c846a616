use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
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

use crate::models::{CreateRepairRequest, RepairListQuery, RepairStatusRequest, UpdateRepairRequest};
use crate::services::RepairService;

#[axum::debug_handler]
pub async fn create_ticket(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateRepairRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    debug!("User {} opening repair ticket", user.id);
    let ticket = RepairService::new(&config).create_ticket(request, auth.token()).await?;
    Ok((StatusCode::CREATED, Json(json!(ticket))))
}

#[axum::debug_handler]
pub async fn list_tickets(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<RepairListQuery>,
) -> Result<Json<Value>, AppError> {
    let tickets = RepairService::new(&config).list_tickets(query, auth.token()).await?;
    Ok(Json(json!({ "total": tickets.len(), "tickets": tickets })))
}

#[axum::debug_handler]
pub async fn get_ticket(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(ticket_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let ticket = RepairService::new(&config)
        .get_ticket_with_history(ticket_id, auth.token())
        .await?;
    Ok(Json(json!(ticket)))
}

#[axum::debug_handler]
pub async fn update_ticket(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(ticket_id): Path<Uuid>,
    Json(request): Json<UpdateRepairRequest>,
) -> Result<Json<Value>, AppError> {
    let ticket = RepairService::new(&config)
        .update_ticket(ticket_id, request, auth.token())
        .await?;
    Ok(Json(json!(ticket)))
}

#[axum::debug_handler]
pub async fn change_ticket_status(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(ticket_id): Path<Uuid>,
    Json(request): Json<RepairStatusRequest>,
) -> Result<Json<Value>, AppError> {
    debug!("User {} setting repair {} to {}", user.id, ticket_id, request.status);
    let result = RepairService::new(&config)
        .change_status(ticket_id, request, auth.token())
        .await?;
    Ok(Json(json!(result)))
}
