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

use crate::models::{CreateTemplateRequest, GenerateDocumentRequest};
use crate::services::{DocumentService, TemplateService};

#[axum::debug_handler]
pub async fn list_templates(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let templates = TemplateService::new(&config).list_templates(auth.token()).await?;
    Ok(Json(json!(templates)))
}

#[axum::debug_handler]
pub async fn create_template(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<CreateTemplateRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let template = TemplateService::new(&config).create_template(request, auth.token()).await?;
    Ok((StatusCode::CREATED, Json(json!(template))))
}

#[axum::debug_handler]
pub async fn get_template(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(template_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let template = TemplateService::new(&config).get_template(template_id, auth.token()).await?;
    Ok(Json(json!(template)))
}

#[axum::debug_handler]
pub async fn generate_document(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<GenerateDocumentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    debug!("User {} generating document from template {}", user.id, request.template_id);
    let generated = DocumentService::new(&config).generate(request, auth.token()).await?;
    Ok((StatusCode::CREATED, Json(json!(generated))))
}

#[axum::debug_handler]
pub async fn get_patient_documents(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let documents = DocumentService::new(&config)
        .list_for_patient(patient_id, auth.token())
        .await?;
    Ok(Json(json!({
        "patient_id": patient_id,
        "total": documents.len(),
        "documents": documents
    })))
}
