//! Buffer and restriction rules around a booked slot.
//!
//! All "which neighbour slots are affected" arithmetic lives here; the
//! booking transaction, the pattern mutator and the reconciliation pass all
//! consume the same function instead of carrying their own copies.

use associate_cell::models::Designation;

use crate::models::{DayAvailability, SlotTime, ALLOWED_DURATIONS, STANDARD_SESSION_MINUTES};

/// Neighbour slots affected by booking a slot at a given duration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlotSideEffects {
    /// Slots to take off the market entirely.
    pub blocked: Vec<SlotTime>,
    /// Slots left bookable for the standard 50-minute session only.
    pub restricted_to_standard: Vec<SlotTime>,
}

impl SlotSideEffects {
    pub fn is_empty(&self) -> bool {
        self.blocked.is_empty() && self.restricted_to_standard.is_empty()
    }
}

/// Pure calculation, no I/O. Offsets wrap at midnight into the same day.
///
/// - cosmetologist, any duration: T−30 and T+30 blocked;
/// - psychologist, 50 minutes: T−30 and T+30 blocked;
/// - psychologist, 80 minutes: T−30, T+30 and T+60 blocked, and T−60
///   restricted to the standard session (an 80-minute session starting
///   there would overlap the booking);
/// - psychologist, 30 minutes (or anything unlisted): no side effects.
pub fn compute_side_effects(
    designation: Designation,
    time: SlotTime,
    duration_minutes: i32,
) -> SlotSideEffects {
    match (designation, duration_minutes) {
        (Designation::Cosmetologist, _) => SlotSideEffects {
            blocked: vec![time.offset(-30), time.offset(30)],
            restricted_to_standard: Vec::new(),
        },
        (Designation::Psychologist, 50) => SlotSideEffects {
            blocked: vec![time.offset(-30), time.offset(30)],
            restricted_to_standard: Vec::new(),
        },
        (Designation::Psychologist, 80) => SlotSideEffects {
            blocked: vec![time.offset(-30), time.offset(30), time.offset(60)],
            restricted_to_standard: vec![time.offset(-60)],
        },
        _ => SlotSideEffects::default(),
    }
}

/// Apply side effects to a day. Only slots that are currently free are
/// touched; booked or already-unavailable neighbours are left alone.
pub fn apply_side_effects(day: &mut DayAvailability, effects: &SlotSideEffects) {
    for &time in &effects.blocked {
        if let Some(slot) = day.find_slot_mut(time) {
            if slot.is_free() {
                slot.is_available = false;
            }
        }
    }

    for &time in &effects.restricted_to_standard {
        if let Some(slot) = day.find_slot_mut(time) {
            if slot.is_free() {
                slot.possible_durations = vec![STANDARD_SESSION_MINUTES];
            }
        }
    }
}

/// Re-impose the duration restrictions demanded by the day's existing
/// bookings. Newly-opened availability next to an extended session must
/// inherit its restriction. Idempotent.
pub fn reconcile_day(day: &mut DayAvailability, designation: Designation) {
    let targets: Vec<SlotTime> = day
        .slots
        .iter()
        .filter(|s| s.is_booked)
        .flat_map(|s| {
            compute_side_effects(designation, s.time, s.duration_minutes).restricted_to_standard
        })
        .collect();

    for time in targets {
        if let Some(slot) = day.find_slot_mut(time) {
            if slot.is_free() {
                slot.possible_durations = vec![STANDARD_SESSION_MINUTES];
            }
        }
    }
}

/// Undo the side effects of one booking, then reconcile so restrictions
/// demanded by the day's remaining bookings are re-imposed. Best effort:
/// a neighbour that was meanwhile booked is never touched.
pub fn release_side_effects(
    day: &mut DayAvailability,
    designation: Designation,
    effects: &SlotSideEffects,
) {
    for &time in &effects.blocked {
        if let Some(slot) = day.find_slot_mut(time) {
            if !slot.is_booked && !slot.is_available {
                slot.is_available = true;
            }
        }
    }

    for &time in &effects.restricted_to_standard {
        if let Some(slot) = day.find_slot_mut(time) {
            if slot.is_free() {
                slot.possible_durations = ALLOWED_DURATIONS.to_vec();
            }
        }
    }

    reconcile_day(day, designation);
}
