//! Weekly availability templates: the provider-owned recurring pattern that
//! the slot generator expands into concrete bookable slots.
//!
//! A template holds one [`DailyConfig`] per weekday in a fixed-size table
//! indexed 0 = Monday … 6 = Sunday, plus the booking-window knobs
//! (`min_booking_minutes`, `max_booking_days`) and per-template defaults for
//! slot duration and buffer.

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::timeblock;

/// Weekday labels indexed 0 = Monday … 6 = Sunday.
pub const WEEKDAY_LABELS: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

pub const MIN_SLOT_DURATION_MINUTES: u32 = 15;
pub const MAX_SLOT_DURATION_MINUTES: u32 = 480;
pub const MAX_BUFFER_MINUTES: u32 = 120;
pub const DEFAULT_SLOT_DURATION_MINUTES: u32 = 30;

/// Upper bound on the advance-notice requirement (3 days, in minutes).
pub const MAX_MIN_BOOKING_MINUTES: i64 = 4320;
/// Upper bound on the advance-booking horizon, in days.
pub const MAX_MAX_BOOKING_DAYS: i64 = 365;

/// How an appointment can take place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationType {
    InPerson,
    Virtual,
    Phone,
}

/// Template lifecycle status. Inactive templates generate no slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateStatus {
    #[default]
    Active,
    Inactive,
}

/// Billing override carried by a template and inherited by its slots.
/// When present, booking a slot creates an invoice before the booking
/// is committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingOverride {
    pub amount_cents: i64,
    pub currency: String,
}

/// A local start/end time range within one day, with optional per-block
/// overrides for slot duration and buffer.
///
/// Times are `"HH:MM"` strings. The fixed-width format makes lexicographic
/// comparison equivalent to chronological comparison, which the validator
/// and overlap detection rely on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBlock {
    pub start_time: String,
    pub end_time: String,
    /// Minutes per slot (15–480). Falls back to the template default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot_duration: Option<u32>,
    /// Minutes of dead time after each slot (0–120). Falls back to the
    /// template default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_minutes: Option<u32>,
}

/// The enabled flag and time blocks for one weekday.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DailyConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub blocks: Vec<TimeBlock>,
}

/// An inclusive local date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.from && date <= self.to
    }
}

/// A provider's recurring weekly availability definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyTemplate {
    /// Opaque provider identifier.
    pub owner: String,
    /// Opaque template identifier.
    pub event: String,
    /// IANA zone name, e.g. `"America/Toronto"`.
    pub timezone: String,
    /// One config per weekday, indexed 0 = Monday … 6 = Sunday.
    pub days: [DailyConfig; 7],
    /// Minimum advance notice in minutes (0–4320).
    #[serde(default)]
    pub min_booking_minutes: i64,
    /// Advance-booking horizon in days (0–365).
    #[serde(default = "default_max_booking_days")]
    pub max_booking_days: i64,
    /// Default slot duration for blocks that omit their own.
    #[serde(default = "default_slot_duration")]
    pub slot_duration: u32,
    /// Default buffer for blocks that omit their own.
    #[serde(default)]
    pub buffer_minutes: u32,
    #[serde(default)]
    pub location_types: Vec<LocationType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing: Option<BillingOverride>,
    #[serde(default)]
    pub status: TemplateStatus,
    /// Optional hard bounds on the dates this template may generate for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
}

fn default_max_booking_days() -> i64 {
    30
}

fn default_slot_duration() -> u32 {
    DEFAULT_SLOT_DURATION_MINUTES
}

impl WeeklyTemplate {
    /// The daily config for `weekday`, through the fixed 0–6 table.
    pub fn config_for(&self, weekday: Weekday) -> &DailyConfig {
        &self.days[weekday.num_days_from_monday() as usize]
    }

    /// Label for `weekday`, through the fixed 0–6 table.
    pub fn weekday_label(weekday: Weekday) -> &'static str {
        WEEKDAY_LABELS[weekday.num_days_from_monday() as usize]
    }

    /// Full owner-facing validation: window bounds, defaults in range,
    /// timezone parseable, every block well-formed, no intra-day overlap.
    ///
    /// Returns the first violation found. The slot generator does not call
    /// this — it skips invalid days instead of rejecting the template.
    pub fn validate(&self) -> Result<()> {
        if !(0..=MAX_MIN_BOOKING_MINUTES).contains(&self.min_booking_minutes) {
            return Err(EngineError::Validation(format!(
                "min_booking_minutes {} out of range 0-{}",
                self.min_booking_minutes, MAX_MIN_BOOKING_MINUTES
            )));
        }
        if !(0..=MAX_MAX_BOOKING_DAYS).contains(&self.max_booking_days) {
            return Err(EngineError::Validation(format!(
                "max_booking_days {} out of range 0-{}",
                self.max_booking_days, MAX_MAX_BOOKING_DAYS
            )));
        }
        if !(MIN_SLOT_DURATION_MINUTES..=MAX_SLOT_DURATION_MINUTES).contains(&self.slot_duration) {
            return Err(EngineError::Validation(format!(
                "slot_duration {} out of range {}-{}",
                self.slot_duration, MIN_SLOT_DURATION_MINUTES, MAX_SLOT_DURATION_MINUTES
            )));
        }
        if self.buffer_minutes > MAX_BUFFER_MINUTES {
            return Err(EngineError::Validation(format!(
                "buffer_minutes {} exceeds {}",
                self.buffer_minutes, MAX_BUFFER_MINUTES
            )));
        }
        self.timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|_| EngineError::InvalidTimezone(self.timezone.clone()))?;
        if let Some(range) = &self.date_range {
            if range.to < range.from {
                return Err(EngineError::Validation(format!(
                    "date_range end {} precedes start {}",
                    range.to, range.from
                )));
            }
        }
        for (index, day) in self.days.iter().enumerate() {
            for block in &day.blocks {
                timeblock::validate_block(block).map_err(|e| {
                    EngineError::Validation(format!("{}: {}", WEEKDAY_LABELS[index], e))
                })?;
            }
            if let Some(overlap) = timeblock::detect_overlap(&day.blocks).first() {
                return Err(EngineError::Validation(format!(
                    "{}: block {}-{} overlaps block {}-{}",
                    WEEKDAY_LABELS[index],
                    overlap.earlier.start_time,
                    overlap.earlier.end_time,
                    overlap.later.start_time,
                    overlap.later.end_time
                )));
            }
        }
        Ok(())
    }
}

/// The enumerated set of template fields whose edit invalidates
/// already-generated future slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MajorField {
    Timezone,
    LocationTypes,
    DateRange,
    WeeklySchedule,
    Status,
}

/// Diff `old` against `new` over the enumerated major fields only.
///
/// Deliberately not a structural equality check on the whole template:
/// edits to minor fields (booking window, defaults, billing) must not
/// trigger regeneration.
pub fn major_changes(old: &WeeklyTemplate, new: &WeeklyTemplate) -> Vec<MajorField> {
    let mut changed = Vec::new();
    if old.timezone != new.timezone {
        changed.push(MajorField::Timezone);
    }
    if old.location_types != new.location_types {
        changed.push(MajorField::LocationTypes);
    }
    if old.date_range != new.date_range {
        changed.push(MajorField::DateRange);
    }
    if old.days != new.days {
        changed.push(MajorField::WeeklySchedule);
    }
    if old.status != new.status {
        changed.push(MajorField::Status);
    }
    changed
}

/// Whether an edit from `old` to `new` must regenerate all not-yet-booked
/// future slots.
pub fn requires_regeneration(old: &WeeklyTemplate, new: &WeeklyTemplate) -> bool {
    !major_changes(old, new).is_empty()
}
