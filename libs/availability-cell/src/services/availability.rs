use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    ApplyPatternRequest, AssociateSchedule, AvailabilityError, DayAvailability, SlotTime,
};
use crate::services::buffer;

/// Save attempts before a concurrent-writer race is surfaced to the caller.
pub const MAX_SAVE_ATTEMPTS: u32 = 4;

/// Calendar reads and pattern writes against the associate aggregate.
///
/// Writes are optimistic: load the aggregate, mutate in memory, save with a
/// version check, and on a lost race reload and reapply the mutation. The
/// aggregate document is the only coordination point; there is no lock.
pub struct AvailabilityService {
    supabase: Arc<SupabaseClient>,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    // ==========================================================================
    // AGGREGATE ACCESS
    // ==========================================================================

    pub async fn load_schedule(
        &self,
        associate_id: Uuid,
        auth_token: &str,
    ) -> Result<AssociateSchedule, AvailabilityError> {
        debug!("Loading schedule for associate: {}", associate_id);

        let path = format!(
            "/rest/v1/associates?id=eq.{}&select=id,designation,days,version",
            associate_id
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AvailabilityError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(AvailabilityError::AssociateNotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| AvailabilityError::DatabaseError(format!("Failed to parse schedule: {}", e)))
    }

    /// One version-checked write of the whole aggregate. Returns false when
    /// a concurrent writer bumped the version first and nothing was saved.
    pub async fn try_save_schedule(
        &self,
        schedule: &AssociateSchedule,
        auth_token: &str,
    ) -> Result<bool, AvailabilityError> {
        let path = format!(
            "/rest/v1/associates?id=eq.{}&version=eq.{}",
            schedule.id, schedule.version
        );

        let update_data = json!({
            "days": schedule.days,
            "version": schedule.version + 1,
            "updated_at": Utc::now().to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(Method::PATCH, &path, Some(auth_token), Some(update_data), Some(headers))
            .await
            .map_err(|e| AvailabilityError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            debug!(
                "Version check failed for associate {} at version {}",
                schedule.id, schedule.version
            );
            return Ok(false);
        }

        Ok(true)
    }

    /// Load-mutate-save with bounded reload-and-reapply retry. The mutation
    /// runs against a fresh copy of the aggregate on every attempt; stale
    /// state is never blindly re-saved.
    pub async fn mutate_schedule<F>(
        &self,
        associate_id: Uuid,
        auth_token: &str,
        mutate: F,
    ) -> Result<AssociateSchedule, AvailabilityError>
    where
        F: Fn(&mut AssociateSchedule) -> Result<(), AvailabilityError>,
    {
        for attempt in 1..=MAX_SAVE_ATTEMPTS {
            let mut schedule = self.load_schedule(associate_id, auth_token).await?;
            mutate(&mut schedule)?;

            if self.try_save_schedule(&schedule, auth_token).await? {
                schedule.version += 1;
                return Ok(schedule);
            }

            warn!(
                "Schedule save race for associate {}, retrying attempt {}/{}",
                associate_id, attempt, MAX_SAVE_ATTEMPTS
            );
            tokio::time::sleep(tokio::time::Duration::from_millis(100 * attempt as u64)).await;
        }

        Err(AvailabilityError::ScheduleChanged)
    }

    // ==========================================================================
    // MUTATIONS
    // ==========================================================================

    /// Open the given times on one date, merging around existing bookings.
    pub async fn set_availability(
        &self,
        associate_id: Uuid,
        date: NaiveDate,
        times: &[String],
        auth_token: &str,
    ) -> Result<AssociateSchedule, AvailabilityError> {
        let times = parse_times(times)?;
        info!("Setting {} slots on {} for associate {}", times.len(), date, associate_id);

        self.mutate_schedule(associate_id, auth_token, move |schedule| {
            apply_times_to_date(schedule, date, &times);
            Ok(())
        })
        .await
    }

    /// Apply (or clear) an availability pattern. All touched dates commit
    /// in one aggregate write: the whole invocation lands or none of it.
    pub async fn apply_pattern(
        &self,
        associate_id: Uuid,
        request: &ApplyPatternRequest,
        auth_token: &str,
    ) -> Result<AssociateSchedule, AvailabilityError> {
        let dates = request.resolve_dates()?;
        let times = parse_times(&request.times)?;

        if !request.clear && times.is_empty() {
            return Err(AvailabilityError::InvalidPattern(
                "times must not be empty unless clearing".to_string(),
            ));
        }

        info!(
            "Applying pattern {:?} (clear: {}) over {} dates for associate {}",
            request.pattern,
            request.clear,
            dates.len(),
            associate_id
        );

        let clear = request.clear;
        self.mutate_schedule(associate_id, auth_token, move |schedule| {
            for &date in &dates {
                if clear {
                    clear_date(schedule, date);
                } else {
                    apply_times_to_date(schedule, date, &times);
                }
            }
            schedule.prune_empty_days();
            Ok(())
        })
        .await
    }

    /// Remove open slots on the listed dates; booked slots stay put.
    pub async fn clear_availability(
        &self,
        associate_id: Uuid,
        dates: &[NaiveDate],
        auth_token: &str,
    ) -> Result<AssociateSchedule, AvailabilityError> {
        let dates = dates.to_vec();
        info!("Clearing {} dates for associate {}", dates.len(), associate_id);

        self.mutate_schedule(associate_id, auth_token, move |schedule| {
            for &date in &dates {
                clear_date(schedule, date);
            }
            schedule.prune_empty_days();
            Ok(())
        })
        .await
    }

    // ==========================================================================
    // READS (stale-tolerant snapshots)
    // ==========================================================================

    pub async fn get_day(
        &self,
        associate_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<DayAvailability, AvailabilityError> {
        let schedule = self.load_schedule(associate_id, auth_token).await?;
        schedule
            .day(date)
            .cloned()
            .ok_or(AvailabilityError::NoAvailabilityForDate(date))
    }

    /// First free slot on or after `from_date`. A snapshot read; the slot
    /// may be gone by the time a booking is attempted.
    pub async fn next_free_slot(
        &self,
        associate_id: Uuid,
        from_date: NaiveDate,
        auth_token: &str,
    ) -> Result<Option<(NaiveDate, SlotTime)>, AvailabilityError> {
        let schedule = self.load_schedule(associate_id, auth_token).await?;

        let mut days: Vec<&DayAvailability> =
            schedule.days.iter().filter(|d| d.date >= from_date).collect();
        days.sort_by_key(|d| d.date);

        for day in days {
            if let Some(slot) = day.slots.iter().find(|s| s.is_free()) {
                return Ok(Some((day.date, slot.time)));
            }
        }

        Ok(None)
    }
}

// ==============================================================================
// AGGREGATE MUTATION HELPERS
// ==============================================================================

fn parse_times(times: &[String]) -> Result<Vec<SlotTime>, AvailabilityError> {
    let mut parsed = times
        .iter()
        .map(|t| SlotTime::parse(t).map_err(|e| AvailabilityError::InvalidTime(e.to_string())))
        .collect::<Result<Vec<SlotTime>, AvailabilityError>>()?;
    parsed.sort();
    parsed.dedup();
    Ok(parsed)
}

/// The §merge for one date followed by reconciliation, so availability
/// opened next to an existing extended booking inherits its restriction.
fn apply_times_to_date(schedule: &mut AssociateSchedule, date: NaiveDate, times: &[SlotTime]) {
    let designation = schedule.designation;
    let day = schedule.ensure_day(date);
    day.upsert_times(times);
    buffer::reconcile_day(day, designation);
}

fn clear_date(schedule: &mut AssociateSchedule, date: NaiveDate) {
    if let Some(day) = schedule.day_mut(date) {
        day.clear_open_slots();
    }
}
