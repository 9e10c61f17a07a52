use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use availability_cell::models::SlotTime;

// ==============================================================================
// CORE BOOKING MODELS
// ==============================================================================

/// A confirmed session. Referenced (not owned) by exactly one slot on the
/// associate's calendar; destroyed by cancellation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub associate_id: Uuid,
    pub client_id: Uuid,
    pub date: NaiveDate,
    pub time: SlotTime,
    pub duration_minutes: i32,
    pub service_type: String,
    pub created_at: DateTime<Utc>,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

/// Invoked by the booking-initiation collaborator once payment has been
/// confirmed; the core never touches payment logic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSlotRequest {
    pub associate_id: Uuid,
    pub client_id: Uuid,
    pub date: NaiveDate,
    pub time: String,
    pub duration_minutes: i32,
    pub service_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelBookingRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingSearchQuery {
    pub client_id: Option<Uuid>,
    pub associate_id: Option<Uuid>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

// ==============================================================================
// DOMAIN EVENTS
// ==============================================================================

/// Emitted once per successful state transition. Delivery (messaging,
/// formatting) belongs to the notification collaborator; a failed dispatch
/// never rolls the transition back.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BookingEvent {
    BookingCreated {
        booking_id: Uuid,
        associate_id: Uuid,
        client_id: Uuid,
        date: NaiveDate,
        time: SlotTime,
        duration_minutes: i32,
    },
    BookingCancelled {
        booking_id: Uuid,
    },
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum BookingError {
    #[error("Associate not found")]
    AssociateNotFound,

    #[error("No availability for {0}")]
    NoAvailabilityForDate(NaiveDate),

    #[error("Slot not found")]
    SlotNotFound,

    #[error("Slot not available")]
    SlotUnavailable,

    #[error("Duration {requested} not allowed for this slot")]
    DurationNotAllowed { requested: i32 },

    #[error("Schedule changed, please retry")]
    ScheduleChanged,

    #[error("Booking not found")]
    BookingNotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

// ==============================================================================
// VALIDATION MODELS
// ==============================================================================

#[derive(Debug, Clone)]
pub struct BookingValidationRules {
    /// Furthest a session may be booked ahead, in days.
    pub max_advance_days: i64,
    /// Whether bookings on today's date are accepted.
    pub allow_same_day: bool,
}

impl Default for BookingValidationRules {
    fn default() -> Self {
        Self {
            max_advance_days: 90,
            allow_same_day: true,
        }
    }
}
