use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use associate_cell::models::Designation;
use availability_cell::models::{AvailabilityError, SlotTime, ALLOWED_DURATIONS, DEFAULT_SLOT_DURATION};
use availability_cell::services::availability::{AvailabilityService, MAX_SAVE_ATTEMPTS};
use availability_cell::services::buffer;

use crate::models::{
    Booking, BookSlotRequest, BookingError, BookingEvent, BookingSearchQuery, BookingValidationRules,
};
use crate::services::events::{EventDispatcher, LogEventDispatcher};

/// The booking write path. Validation and commit run in one logical
/// transaction against the associate aggregate: the slot is re-checked on
/// the freshly loaded aggregate on every attempt, and the version-checked
/// save is what serializes concurrent bookings on the same associate.
pub struct SlotBookingService {
    supabase: Arc<SupabaseClient>,
    availability: AvailabilityService,
    dispatcher: Arc<dyn EventDispatcher>,
    validation_rules: BookingValidationRules,
    release_neighbors_on_cancel: bool,
}

impl SlotBookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_dispatcher(config, Arc::new(LogEventDispatcher))
    }

    pub fn with_dispatcher(config: &AppConfig, dispatcher: Arc<dyn EventDispatcher>) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        Self {
            availability: AvailabilityService::with_client(Arc::clone(&supabase)),
            supabase,
            dispatcher,
            validation_rules: BookingValidationRules::default(),
            release_neighbors_on_cancel: config.cancel_releases_neighbors,
        }
    }

    // ==========================================================================
    // BOOKING TRANSACTION
    // ==========================================================================

    pub async fn book_slot(
        &self,
        request: BookSlotRequest,
        auth_token: &str,
    ) -> Result<Booking, BookingError> {
        info!(
            "Booking slot for client {} with associate {} on {} at {}",
            request.client_id, request.associate_id, request.date, request.time
        );

        // **Step 1: Validate the request before touching any state**
        let time = self.validate_request(&request)?;
        let booking_id = Uuid::new_v4();

        // **Step 2/3: Re-check and commit under the aggregate version check**
        let designation = self
            .commit_slot(&request, time, booking_id, auth_token)
            .await?;

        // **Step 4: Persist the booking record the slot now references**
        let booking = match self
            .insert_booking_record(booking_id, &request, time, auth_token)
            .await
        {
            Ok(booking) => booking,
            Err(e) => {
                warn!(
                    "Booking record insert failed for {}, reverting slot: {}",
                    booking_id, e
                );
                self.revert_slot(&request, time, booking_id, auth_token).await;
                return Err(e);
            }
        };

        debug!(
            "Slot {} on {} committed for {} associate {}",
            time, request.date, designation, request.associate_id
        );

        // **Step 5: Emit the domain event (best effort, never rolls back)**
        let event = BookingEvent::BookingCreated {
            booking_id,
            associate_id: request.associate_id,
            client_id: request.client_id,
            date: request.date,
            time,
            duration_minutes: request.duration_minutes,
        };
        if let Err(e) = self.dispatcher.dispatch(&event).await {
            warn!("Event dispatch failed for booking {}: {}", booking_id, e);
        }

        info!("Booking {} committed", booking_id);
        Ok(booking)
    }

    fn validate_request(&self, request: &BookSlotRequest) -> Result<SlotTime, BookingError> {
        let time = SlotTime::parse(&request.time)
            .map_err(|e| BookingError::ValidationError(e.to_string()))?;

        if !ALLOWED_DURATIONS.contains(&request.duration_minutes) {
            return Err(BookingError::ValidationError(format!(
                "Duration must be one of {:?} minutes",
                ALLOWED_DURATIONS
            )));
        }

        let today = Utc::now().date_naive();
        let earliest = if self.validation_rules.allow_same_day {
            today
        } else {
            today + chrono::Duration::days(1)
        };
        if request.date < earliest {
            return Err(BookingError::ValidationError(
                "Booking date is in the past".to_string(),
            ));
        }
        if request.date > today + chrono::Duration::days(self.validation_rules.max_advance_days) {
            return Err(BookingError::ValidationError(format!(
                "Bookings are accepted at most {} days ahead",
                self.validation_rules.max_advance_days
            )));
        }

        Ok(time)
    }

    /// Load-validate-mutate-save loop. Each attempt re-locates the slot on
    /// a fresh copy of the aggregate and re-verifies it is still free, so a
    /// winner of the save race is the only booking that ever holds it.
    async fn commit_slot(
        &self,
        request: &BookSlotRequest,
        time: SlotTime,
        booking_id: Uuid,
        auth_token: &str,
    ) -> Result<Designation, BookingError> {
        for attempt in 1..=MAX_SAVE_ATTEMPTS {
            let mut schedule = self
                .availability
                .load_schedule(request.associate_id, auth_token)
                .await
                .map_err(map_availability_error)?;

            let designation = schedule.designation;

            {
                let day = schedule
                    .day_mut(request.date)
                    .ok_or(BookingError::NoAvailabilityForDate(request.date))?;

                let slot = day.find_slot_mut(time).ok_or(BookingError::SlotNotFound)?;

                if !slot.is_free() {
                    return Err(BookingError::SlotUnavailable);
                }
                if !slot.allows_duration(request.duration_minutes) {
                    return Err(BookingError::DurationNotAllowed {
                        requested: request.duration_minutes,
                    });
                }

                slot.is_booked = true;
                slot.is_available = false;
                slot.duration_minutes = request.duration_minutes;
                slot.booking_id = Some(booking_id);

                let effects =
                    buffer::compute_side_effects(designation, time, request.duration_minutes);
                buffer::apply_side_effects(day, &effects);
                buffer::reconcile_day(day, designation);
            }

            let saved = self
                .availability
                .try_save_schedule(&schedule, auth_token)
                .await
                .map_err(map_availability_error)?;

            if saved {
                return Ok(designation);
            }

            warn!(
                "Booking race on associate {} at {} {}, retrying attempt {}/{}",
                request.associate_id, request.date, time, attempt, MAX_SAVE_ATTEMPTS
            );
            tokio::time::sleep(tokio::time::Duration::from_millis(100 * attempt as u64)).await;
        }

        Err(BookingError::ScheduleChanged)
    }

    async fn insert_booking_record(
        &self,
        booking_id: Uuid,
        request: &BookSlotRequest,
        time: SlotTime,
        auth_token: &str,
    ) -> Result<Booking, BookingError> {
        let booking_data = json!({
            "id": booking_id,
            "associate_id": request.associate_id,
            "client_id": request.client_id,
            "date": request.date,
            "time": time,
            "duration_minutes": request.duration_minutes,
            "service_type": request.service_type,
            "created_at": Utc::now().to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/bookings",
                Some(auth_token),
                Some(booking_data),
                Some(headers),
            )
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(BookingError::DatabaseError(
                "Failed to create booking record".to_string(),
            ));
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| BookingError::DatabaseError(format!("Failed to parse booking: {}", e)))
    }

    /// Compensation for a booking-record insert failure: put the slot back
    /// on the market. Best effort; a failure here only leaves the slot
    /// blocked, never double-booked.
    async fn revert_slot(
        &self,
        request: &BookSlotRequest,
        time: SlotTime,
        booking_id: Uuid,
        auth_token: &str,
    ) {
        let duration = request.duration_minutes;
        let date = request.date;
        let result = self
            .availability
            .mutate_schedule(request.associate_id, auth_token, move |schedule| {
                let designation = schedule.designation;
                if let Some(day) = schedule.day_mut(date) {
                    if let Some(slot) = day.find_slot_mut(time) {
                        if slot.booking_id == Some(booking_id) {
                            slot.is_booked = false;
                            slot.is_available = true;
                            slot.duration_minutes = DEFAULT_SLOT_DURATION;
                            slot.booking_id = None;

                            let effects = buffer::compute_side_effects(designation, time, duration);
                            buffer::release_side_effects(day, designation, &effects);
                        }
                    }
                }
                Ok(())
            })
            .await;

        if let Err(e) = result {
            warn!(
                "Failed to revert slot {} {} for associate {}: {}",
                date, time, request.associate_id, e
            );
        }
    }

    // ==========================================================================
    // CANCELLATION
    // ==========================================================================

    pub async fn cancel_booking(
        &self,
        booking_id: Uuid,
        auth_token: &str,
    ) -> Result<Booking, BookingError> {
        debug!("Cancelling booking: {}", booking_id);

        let booking = self.get_booking(booking_id, auth_token).await?;

        let release = self.release_neighbors_on_cancel;
        let date = booking.date;
        let duration = booking.duration_minutes;
        let result = self
            .availability
            .mutate_schedule(booking.associate_id, auth_token, move |schedule| {
                let designation = schedule.designation;
                let Some(day) = schedule.day_mut(date) else {
                    warn!("No day entry for cancelled booking {} on {}", booking_id, date);
                    return Ok(());
                };

                let Some(slot) = day.slots.iter_mut().find(|s| s.booking_id == Some(booking_id))
                else {
                    warn!("No slot references cancelled booking {}", booking_id);
                    return Ok(());
                };

                let time = slot.time;
                slot.is_booked = false;
                slot.is_available = true;
                slot.duration_minutes = DEFAULT_SLOT_DURATION;
                slot.booking_id = None;

                if release {
                    let effects = buffer::compute_side_effects(designation, time, duration);
                    buffer::release_side_effects(day, designation, &effects);
                }

                Ok(())
            })
            .await;

        result.map_err(map_availability_error)?;

        self.delete_booking_record(booking_id, auth_token).await?;

        let event = BookingEvent::BookingCancelled { booking_id };
        if let Err(e) = self.dispatcher.dispatch(&event).await {
            warn!("Event dispatch failed for cancellation {}: {}", booking_id, e);
        }

        info!("Booking {} cancelled", booking_id);
        Ok(booking)
    }

    async fn delete_booking_record(
        &self,
        booking_id: Uuid,
        auth_token: &str,
    ) -> Result<(), BookingError> {
        let path = format!("/rest/v1/bookings?id=eq.{}", booking_id);
        let _: Vec<Value> = self
            .supabase
            .request(Method::DELETE, &path, Some(auth_token), None)
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    // ==========================================================================
    // READS
    // ==========================================================================

    pub async fn get_booking(
        &self,
        booking_id: Uuid,
        auth_token: &str,
    ) -> Result<Booking, BookingError> {
        let path = format!("/rest/v1/bookings?id=eq.{}", booking_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(BookingError::BookingNotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| BookingError::DatabaseError(format!("Failed to parse booking: {}", e)))
    }

    pub async fn search_bookings(
        &self,
        query: BookingSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Booking>, BookingError> {
        let mut query_parts = Vec::new();

        if let Some(client_id) = query.client_id {
            query_parts.push(format!("client_id=eq.{}", client_id));
        }
        if let Some(associate_id) = query.associate_id {
            query_parts.push(format!("associate_id=eq.{}", associate_id));
        }
        if let Some(from_date) = query.from_date {
            query_parts.push(format!("date=gte.{}", from_date));
        }
        if let Some(to_date) = query.to_date {
            query_parts.push(format!("date=lte.{}", to_date));
        }

        let mut path = format!(
            "/rest/v1/bookings?{}&order=date.asc,time.asc",
            query_parts.join("&")
        );
        if let Some(limit) = query.limit {
            path.push_str(&format!("&limit={}", limit));
        }
        if let Some(offset) = query.offset {
            path.push_str(&format!("&offset={}", offset));
        }

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Booking>, _>>()
            .map_err(|e| BookingError::DatabaseError(format!("Failed to parse bookings: {}", e)))
    }
}

fn map_availability_error(e: AvailabilityError) -> BookingError {
    match e {
        AvailabilityError::AssociateNotFound => BookingError::AssociateNotFound,
        AvailabilityError::NoAvailabilityForDate(date) => BookingError::NoAvailabilityForDate(date),
        AvailabilityError::InvalidTime(msg) => BookingError::ValidationError(msg),
        AvailabilityError::InvalidPattern(msg) => BookingError::ValidationError(msg),
        AvailabilityError::ScheduleChanged => BookingError::ScheduleChanged,
        AvailabilityError::DatabaseError(msg) => BookingError::DatabaseError(msg),
    }
}
