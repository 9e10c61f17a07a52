use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::NaiveDate;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{BookSlotRequest, BookingError, BookingSearchQuery, CancelBookingRequest};
use crate::services::booking::SlotBookingService;

#[derive(Debug, Deserialize)]
pub struct BookingQueryParams {
    pub client_id: Option<Uuid>,
    pub associate_id: Option<Uuid>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

fn map_error(e: BookingError) -> AppError {
    match e {
        BookingError::AssociateNotFound => AppError::NotFound("Associate not found".to_string()),
        BookingError::NoAvailabilityForDate(date) => {
            AppError::NotFound(format!("No availability for {}", date))
        }
        BookingError::SlotNotFound => AppError::NotFound("Slot not found".to_string()),
        BookingError::SlotUnavailable => {
            AppError::Conflict("Slot no longer available".to_string())
        }
        BookingError::DurationNotAllowed { requested } => AppError::Conflict(format!(
            "A {}-minute session is not allowed for this slot",
            requested
        )),
        BookingError::ScheduleChanged => {
            AppError::Conflict("Schedule changed, please retry".to_string())
        }
        BookingError::BookingNotFound => AppError::NotFound("Booking not found".to_string()),
        BookingError::ValidationError(msg) => AppError::BadRequest(msg),
        BookingError::DatabaseError(msg) => AppError::Internal(msg),
    }
}

/// Book a slot. Called by the booking-initiation flow once payment is
/// confirmed; clients book for themselves, admins for anyone.
#[axum::debug_handler]
pub async fn book_slot(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookSlotRequest>,
) -> Result<Json<Value>, AppError> {
    let is_self = request.client_id.to_string() == user.id;
    if !is_self && !user.is_admin() {
        return Err(AppError::Auth(
            "Not authorized to book for this client".to_string(),
        ));
    }

    let service = SlotBookingService::new(&state);
    let booking = service
        .book_slot(request, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "booking": booking,
        "message": "Session booked successfully"
    })))
}

#[axum::debug_handler]
pub async fn get_booking(
    State(state): State<Arc<AppConfig>>,
    Path(booking_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = SlotBookingService::new(&state);
    let booking = service
        .get_booking(booking_id, auth.token())
        .await
        .map_err(map_error)?;

    let is_client = booking.client_id.to_string() == user.id;
    let is_associate = booking.associate_id.to_string() == user.id;
    if !is_client && !is_associate && !user.is_admin() {
        return Err(AppError::Auth("Not authorized to view this booking".to_string()));
    }

    Ok(Json(json!(booking)))
}

#[axum::debug_handler]
pub async fn search_bookings(
    State(state): State<Arc<AppConfig>>,
    Query(params): Query<BookingQueryParams>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    // Non-admins only see their own side of the ledger
    let mut query = BookingSearchQuery {
        client_id: params.client_id,
        associate_id: params.associate_id,
        from_date: params.from_date,
        to_date: params.to_date,
        limit: params.limit,
        offset: params.offset,
    };

    if !user.is_admin() {
        if user.is_doctor() {
            query.associate_id = Some(
                Uuid::parse_str(&user.id)
                    .map_err(|_| AppError::Auth("Invalid principal id".to_string()))?,
            );
        } else {
            query.client_id = Some(
                Uuid::parse_str(&user.id)
                    .map_err(|_| AppError::Auth("Invalid principal id".to_string()))?,
            );
        }
    }

    let service = SlotBookingService::new(&state);
    let bookings = service
        .search_bookings(query, auth.token())
        .await
        .map_err(map_error)?;

    let count = bookings.len();
    Ok(Json(json!({
        "bookings": bookings,
        "count": count
    })))
}

/// Cancel a booking. The slot returns to the market; whether neighbour
/// blocks are released is a deployment policy, not a caller choice.
#[axum::debug_handler]
pub async fn cancel_booking(
    State(state): State<Arc<AppConfig>>,
    Path(booking_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CancelBookingRequest>,
) -> Result<Json<Value>, AppError> {
    let service = SlotBookingService::new(&state);

    let booking = service
        .get_booking(booking_id, auth.token())
        .await
        .map_err(map_error)?;

    let is_client = booking.client_id.to_string() == user.id;
    let is_associate = booking.associate_id.to_string() == user.id;
    if !is_client && !is_associate && !user.is_admin() {
        return Err(AppError::Auth("Not authorized to cancel this booking".to_string()));
    }

    let cancelled = service
        .cancel_booking(booking_id, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "booking": cancelled,
        "reason": request.reason,
        "message": "Booking cancelled"
    })))
}
