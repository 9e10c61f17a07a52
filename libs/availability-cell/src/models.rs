use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use associate_cell::models::Designation;

/// Scheduling granularity of the calendar grid.
pub const SLOT_STEP_MINUTES: u32 = 30;

/// Session lengths an open slot offers by default.
pub const ALLOWED_DURATIONS: [i32; 3] = [30, 50, 80];

/// Duration recorded on a slot that is merely open.
pub const DEFAULT_SLOT_DURATION: i32 = 30;

/// The only length left bookable on a slot that sits one step before an
/// extended session (an 80-minute booking starting there would overlap it).
pub const STANDARD_SESSION_MINUTES: i32 = 50;

const MINUTES_PER_DAY: i32 = 24 * 60;

// ==============================================================================
// SLOT TIME
// ==============================================================================

/// Wall-clock start of a slot, minutes from midnight, aligned to the
/// 30-minute grid. Serialized as "HH:MM".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SlotTime(u16);

#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid slot time {0:?}: expected HH:MM on the half hour")]
pub struct SlotTimeParseError(pub String);

impl SlotTime {
    pub fn from_minutes(minutes: u16) -> Result<Self, SlotTimeParseError> {
        if minutes as i32 >= MINUTES_PER_DAY || minutes as u32 % SLOT_STEP_MINUTES != 0 {
            return Err(SlotTimeParseError(format!("{} minutes", minutes)));
        }
        Ok(SlotTime(minutes))
    }

    pub fn parse(s: &str) -> Result<Self, SlotTimeParseError> {
        let err = || SlotTimeParseError(s.to_string());

        let (hh, mm) = s.split_once(':').ok_or_else(err)?;
        if hh.len() != 2 || mm.len() != 2 {
            return Err(err());
        }

        let hours: u16 = hh.parse().map_err(|_| err())?;
        let minutes: u16 = mm.parse().map_err(|_| err())?;
        if hours > 23 {
            return Err(err());
        }

        Self::from_minutes(hours * 60 + minutes).map_err(|_| err())
    }

    pub fn minutes(&self) -> u16 {
        self.0
    }

    /// Shift by `delta` minutes, wrapping at midnight. The fold stays inside
    /// the same calendar day: 00:00 − 30 is 23:30 of that day, not of the
    /// day before.
    pub fn offset(&self, delta: i32) -> SlotTime {
        let wrapped = (self.0 as i32 + delta).rem_euclid(MINUTES_PER_DAY);
        SlotTime(wrapped as u16)
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl std::str::FromStr for SlotTime {
    type Err = SlotTimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SlotTime {
    type Error = SlotTimeParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<SlotTime> for String {
    fn from(t: SlotTime) -> String {
        t.to_string()
    }
}

// ==============================================================================
// SLOT / DAY AVAILABILITY
// ==============================================================================

/// One bookable unit on one associate's day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    pub time: SlotTime,
    pub is_available: bool,
    pub is_booked: bool,
    pub duration_minutes: i32,
    pub possible_durations: Vec<i32>,
    pub booking_id: Option<Uuid>,
}

impl Slot {
    pub fn open(time: SlotTime) -> Self {
        Self {
            time,
            is_available: true,
            is_booked: false,
            duration_minutes: DEFAULT_SLOT_DURATION,
            possible_durations: ALLOWED_DURATIONS.to_vec(),
            booking_id: None,
        }
    }

    pub fn is_free(&self) -> bool {
        self.is_available && !self.is_booked
    }

    pub fn allows_duration(&self, duration_minutes: i32) -> bool {
        self.possible_durations.contains(&duration_minutes)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayAvailability {
    pub date: NaiveDate,
    pub slots: Vec<Slot>,
}

impl DayAvailability {
    pub fn new(date: NaiveDate) -> Self {
        Self { date, slots: Vec::new() }
    }

    pub fn find_slot(&self, time: SlotTime) -> Option<&Slot> {
        self.slots.iter().find(|s| s.time == time)
    }

    pub fn find_slot_mut(&mut self, time: SlotTime) -> Option<&mut Slot> {
        self.slots.iter_mut().find(|s| s.time == time)
    }

    /// Replace the day's open slots with `times`, merging around bookings:
    /// - a booked slot at an incoming time is retained unchanged;
    /// - a free slot at an incoming time is reopened but keeps any
    ///   `possible_durations` narrowing it already carried;
    /// - booked slots at times outside the incoming set are retained, free
    ///   ones are dropped.
    pub fn upsert_times(&mut self, times: &[SlotTime]) {
        self.slots.retain(|s| s.is_booked || times.contains(&s.time));

        for &time in times {
            if let Some(idx) = self.slots.iter().position(|s| s.time == time) {
                let slot = &mut self.slots[idx];
                if !slot.is_booked {
                    slot.is_available = true;
                    slot.duration_minutes = DEFAULT_SLOT_DURATION;
                    slot.booking_id = None;
                }
            } else {
                self.slots.push(Slot::open(time));
            }
        }

        self.slots.sort_by_key(|s| s.time);
    }

    /// Remove every slot the associate could still hand out; bookings stay.
    pub fn clear_open_slots(&mut self) {
        self.slots.retain(|s| s.is_booked);
    }

    pub fn has_bookings(&self) -> bool {
        self.slots.iter().any(|s| s.is_booked)
    }
}

// ==============================================================================
// ASSOCIATE SCHEDULE (AGGREGATE ROOT)
// ==============================================================================

/// The persistence and concurrency boundary: one associate's whole
/// calendar plus the optimistic-concurrency version counter. Every slot
/// mutation loads this, changes it in memory and writes it back in one
/// version-checked update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociateSchedule {
    pub id: Uuid,
    pub designation: Designation,
    #[serde(default)]
    pub days: Vec<DayAvailability>,
    #[serde(default)]
    pub version: i64,
}

impl AssociateSchedule {
    pub fn day(&self, date: NaiveDate) -> Option<&DayAvailability> {
        self.days.iter().find(|d| d.date == date)
    }

    pub fn day_mut(&mut self, date: NaiveDate) -> Option<&mut DayAvailability> {
        self.days.iter_mut().find(|d| d.date == date)
    }

    pub fn ensure_day(&mut self, date: NaiveDate) -> &mut DayAvailability {
        if self.day(date).is_none() {
            self.days.push(DayAvailability::new(date));
            self.days.sort_by_key(|d| d.date);
        }
        self.day_mut(date).unwrap()
    }

    /// Drop day entries with no slots left. Days holding a booking are
    /// never dropped, their booked slots survive `clear_open_slots`.
    pub fn prune_empty_days(&mut self) {
        self.days.retain(|d| !d.slots.is_empty());
    }
}

// ==============================================================================
// PATTERN REQUESTS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityPattern {
    SingleDate,
    DayOfWeek,
    Week,
    Month,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetAvailabilityRequest {
    pub date: NaiveDate,
    pub times: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyPatternRequest {
    pub pattern: AvailabilityPattern,
    pub start_date: NaiveDate,
    /// Required for `day_of_week`; ignored by the other patterns.
    pub end_date: Option<NaiveDate>,
    /// 0 = Sunday .. 6 = Saturday. Required for `day_of_week`.
    pub day_of_week: Option<u8>,
    pub times: Vec<String>,
    /// Clear variant: remove open slots on the matched dates instead of
    /// writing `times`.
    #[serde(default)]
    pub clear: bool,
}

impl ApplyPatternRequest {
    /// Expand the pattern into the concrete dates it touches.
    pub fn resolve_dates(&self) -> Result<Vec<NaiveDate>, AvailabilityError> {
        match self.pattern {
            AvailabilityPattern::SingleDate => Ok(vec![self.start_date]),
            AvailabilityPattern::Week => {
                Ok((0..7).map(|i| self.start_date + Duration::days(i)).collect())
            }
            AvailabilityPattern::Month => {
                let first = self.start_date.with_day(1).unwrap();
                let mut dates = Vec::new();
                let mut date = first;
                while date.month() == first.month() {
                    dates.push(date);
                    date += Duration::days(1);
                }
                Ok(dates)
            }
            AvailabilityPattern::DayOfWeek => {
                let day_of_week = self.day_of_week.ok_or_else(|| {
                    AvailabilityError::InvalidPattern("day_of_week is required".to_string())
                })?;
                if day_of_week > 6 {
                    return Err(AvailabilityError::InvalidPattern(
                        "day_of_week must be between 0 (Sunday) and 6 (Saturday)".to_string(),
                    ));
                }
                let end_date = self.end_date.ok_or_else(|| {
                    AvailabilityError::InvalidPattern("end_date is required for day_of_week".to_string())
                })?;
                if end_date < self.start_date {
                    return Err(AvailabilityError::InvalidPattern(
                        "end_date must not precede start_date".to_string(),
                    ));
                }

                let mut dates = Vec::new();
                let mut date = self.start_date;
                while date <= end_date {
                    if date.weekday().num_days_from_sunday() == day_of_week as u32 {
                        dates.push(date);
                    }
                    date += Duration::days(1);
                }
                Ok(dates)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearAvailabilityRequest {
    pub dates: Vec<NaiveDate>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum AvailabilityError {
    #[error("Associate not found")]
    AssociateNotFound,

    #[error("No availability for {0}")]
    NoAvailabilityForDate(NaiveDate),

    #[error("Invalid time: {0}")]
    InvalidTime(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Schedule changed concurrently, please retry")]
    ScheduleChanged,

    #[error("Database error: {0}")]
    DatabaseError(String),
}
