use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::{NaiveDate, Utc};
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{ApplyPatternRequest, AvailabilityError, ClearAvailabilityRequest, SetAvailabilityRequest};
use crate::services::availability::AvailabilityService;

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct NextSlotQuery {
    pub from_date: Option<NaiveDate>,
}

fn map_error(e: AvailabilityError) -> AppError {
    match e {
        AvailabilityError::AssociateNotFound => {
            AppError::NotFound("Associate not found".to_string())
        }
        AvailabilityError::NoAvailabilityForDate(date) => {
            AppError::NotFound(format!("No availability for {}", date))
        }
        AvailabilityError::InvalidTime(msg) => AppError::BadRequest(msg),
        AvailabilityError::InvalidPattern(msg) => AppError::BadRequest(msg),
        AvailabilityError::ScheduleChanged => {
            AppError::Conflict("Schedule changed, please retry".to_string())
        }
        AvailabilityError::DatabaseError(msg) => AppError::Internal(msg),
    }
}

/// Calendar mutations are restricted to the associate themself or an admin.
fn authorize_calendar_write(user: &User, associate_id: Uuid) -> Result<(), AppError> {
    let is_self = user.is_doctor() && user.id == associate_id.to_string();
    if !is_self && !user.is_admin() {
        return Err(AppError::Auth(
            "Not authorized to manage this associate's calendar".to_string(),
        ));
    }
    Ok(())
}

#[axum::debug_handler]
pub async fn set_availability(
    State(state): State<Arc<AppConfig>>,
    Path(associate_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<SetAvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    authorize_calendar_write(&user, associate_id)?;

    let service = AvailabilityService::new(&state);
    let schedule = service
        .set_availability(associate_id, request.date, &request.times, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "date": request.date,
        "day": schedule.day(request.date),
    })))
}

#[axum::debug_handler]
pub async fn apply_pattern(
    State(state): State<Arc<AppConfig>>,
    Path(associate_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<ApplyPatternRequest>,
) -> Result<Json<Value>, AppError> {
    authorize_calendar_write(&user, associate_id)?;

    let service = AvailabilityService::new(&state);
    let schedule = service
        .apply_pattern(associate_id, &request, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "pattern": request.pattern,
        "days": schedule.days,
    })))
}

#[axum::debug_handler]
pub async fn clear_availability(
    State(state): State<Arc<AppConfig>>,
    Path(associate_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<ClearAvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    authorize_calendar_write(&user, associate_id)?;

    let service = AvailabilityService::new(&state);
    let schedule = service
        .clear_availability(associate_id, &request.dates, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "days": schedule.days,
    })))
}

/// Read-only snapshot of the calendar, whole or for one date. Readers must
/// tolerate the snapshot going stale by the time a booking is attempted.
#[axum::debug_handler]
pub async fn get_availability(
    State(state): State<Arc<AppConfig>>,
    Path(associate_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::new(&state);

    match query.date {
        Some(date) => {
            let day = service
                .get_day(associate_id, date, auth.token())
                .await
                .map_err(map_error)?;
            Ok(Json(json!(day)))
        }
        None => {
            let schedule = service
                .load_schedule(associate_id, auth.token())
                .await
                .map_err(map_error)?;
            Ok(Json(json!({
                "associate_id": schedule.id,
                "days": schedule.days,
            })))
        }
    }
}

#[axum::debug_handler]
pub async fn next_free_slot(
    State(state): State<Arc<AppConfig>>,
    Path(associate_id): Path<Uuid>,
    Query(query): Query<NextSlotQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let from_date = query.from_date.unwrap_or_else(|| Utc::now().date_naive());

    let service = AvailabilityService::new(&state);
    let next = service
        .next_free_slot(associate_id, from_date, auth.token())
        .await
        .map_err(map_error)?;

    match next {
        Some((date, time)) => Ok(Json(json!({
            "date": date,
            "time": time,
        }))),
        None => Ok(Json(json!({
            "date": null,
            "time": null,
        }))),
    }
}
