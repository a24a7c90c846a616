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

use crate::models::{CreatePatientRequest, CreateTagRequest, PatientSearchQuery, UpdatePatientRequest};
use crate::services::{PatientService, TagService};

#[axum::debug_handler]
pub async fn create_patient(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreatePatientRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    debug!("User {} creating patient", user.id);
    let service = PatientService::new(&config);

    let patient = service.create_patient(request, auth.token()).await?;

    Ok((StatusCode::CREATED, Json(json!(patient))))
}

#[axum::debug_handler]
pub async fn get_patient(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = PatientService::new(&config);

    let patient = service.get_patient(patient_id, auth.token()).await?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn update_patient(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(patient_id): Path<Uuid>,
    Json(request): Json<UpdatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    let service = PatientService::new(&config);

    let patient = service.update_patient(patient_id, request, auth.token()).await?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn delete_patient(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    debug!("User {} deleting patient {}", user.id, patient_id);
    let service = PatientService::new(&config);

    service.delete_patient(patient_id, auth.token()).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn search_patients(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<PatientSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let service = PatientService::new(&config);

    let patients = service.search_patients(query, auth.token()).await?;

    Ok(Json(json!({
        "total": patients.len(),
        "patients": patients
    })))
}

#[axum::debug_handler]
pub async fn list_tags(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let tags = TagService::new(&config).list_tags(auth.token()).await?;
    Ok(Json(json!({ "tags": tags })))
}

#[axum::debug_handler]
pub async fn create_tag(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<CreateTagRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let tag = TagService::new(&config).create_tag(request, auth.token()).await?;
    Ok((StatusCode::CREATED, Json(json!(tag))))
}

#[axum::debug_handler]
pub async fn get_patient_tags(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let tags = TagService::new(&config).get_patient_tags(patient_id, auth.token()).await?;
    Ok(Json(json!({ "patient_id": patient_id, "tags": tags })))
}

#[axum::debug_handler]
pub async fn add_patient_tag(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path((patient_id, tag_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>, AppError> {
    TagService::new(&config)
        .add_tag_to_patient(patient_id, tag_id, auth.token())
        .await?;

    Ok(Json(json!({ "patient_id": patient_id, "tag_id": tag_id, "attached": true })))
}

#[axum::debug_handler]
pub async fn remove_patient_tag(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path((patient_id, tag_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>, AppError> {
    let removed = TagService::new(&config)
        .remove_tag_from_patient(patient_id, tag_id, auth.token())
        .await?;

    Ok(Json(json!({ "patient_id": patient_id, "tag_id": tag_id, "removed": removed })))
}
