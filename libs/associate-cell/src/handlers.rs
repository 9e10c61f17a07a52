use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{AssociateError, CreateAssociateRequest, Designation, UpdateAssociateRequest};
use crate::services::directory::AssociateDirectoryService;

#[derive(Debug, Deserialize)]
pub struct ListAssociatesQuery {
    pub designation: Option<Designation>,
}

fn map_error(e: AssociateError) -> AppError {
    match e {
        AssociateError::NotFound => AppError::NotFound("Associate not found".to_string()),
        AssociateError::AlreadyExists => AppError::Conflict("Associate already exists".to_string()),
        AssociateError::ValidationError(msg) => AppError::BadRequest(msg),
        AssociateError::DatabaseError(msg) => AppError::Internal(msg),
    }
}

#[axum::debug_handler]
pub async fn create_associate(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAssociateRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth("Only admins can create associates".to_string()));
    }

    let service = AssociateDirectoryService::new(&state);
    let associate = service
        .create_associate(request, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "associate": associate
    })))
}

#[axum::debug_handler]
pub async fn get_associate(
    State(state): State<Arc<AppConfig>>,
    Path(associate_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let service = AssociateDirectoryService::new(&state);
    let associate = service
        .get_associate(associate_id, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!(associate)))
}

#[axum::debug_handler]
pub async fn list_associates(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<ListAssociatesQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let service = AssociateDirectoryService::new(&state);
    let associates = service
        .list_associates(query.designation, auth.token())
        .await
        .map_err(map_error)?;

    let count = associates.len();
    Ok(Json(json!({
        "associates": associates,
        "count": count
    })))
}

#[axum::debug_handler]
pub async fn update_associate(
    State(state): State<Arc<AppConfig>>,
    Path(associate_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateAssociateRequest>,
) -> Result<Json<Value>, AppError> {
    // Associates edit their own profile, admins edit anyone's
    let is_self = user.id == associate_id.to_string();
    if !is_self && !user.is_admin() {
        return Err(AppError::Auth("Not authorized to update this associate".to_string()));
    }

    let service = AssociateDirectoryService::new(&state);
    let associate = service
        .update_associate(associate_id, request, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "associate": associate
    })))
}
