//! Recurrence expansion for schedule exceptions.
//!
//! Compiles the four supported pattern kinds (daily/weekly/monthly/yearly)
//! into an iCalendar `DTSTART`/`RRULE` text block and expands it through the
//! `rrule` crate with correct DST handling via `chrono-tz`. Expansion is a
//! pure function of its inputs and is bounded twice: by the earlier of the
//! pattern's `end_date` and the caller's horizon, and by a hard occurrence
//! cap (default 100).

use chrono::{DateTime, Utc};
use rrule::RRuleSet;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Hard cap on expanded occurrences when the pattern does not set its own.
pub const DEFAULT_MAX_OCCURRENCES: u32 = 100;

/// iCalendar weekday codes indexed 0 = Monday … 6 = Sunday.
const BYDAY_CODES: [&str; 7] = ["MO", "TU", "WE", "TH", "FR", "SA", "SU"];

/// The recurrence kinds the engine supports. Deliberately not a general
/// RRULE surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceKind {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl RecurrenceKind {
    fn freq(self) -> &'static str {
        match self {
            RecurrenceKind::Daily => "DAILY",
            RecurrenceKind::Weekly => "WEEKLY",
            RecurrenceKind::Monthly => "MONTHLY",
            RecurrenceKind::Yearly => "YEARLY",
        }
    }
}

/// How a recurring schedule exception repeats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurrencePattern {
    pub kind: RecurrenceKind,
    /// Units of the kind between occurrences (default 1).
    #[serde(default = "default_interval")]
    pub interval: u32,
    /// For weekly patterns: weekdays to recur on, 0 = Monday … 6 = Sunday.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_of_week: Option<Vec<u8>>,
    /// For monthly patterns: day of month to recur on (1–31).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_month: Option<u32>,
    /// Last instant occurrences may start at, inclusive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    /// Occurrence cap for this pattern (default [`DEFAULT_MAX_OCCURRENCES`]).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_occurrences: Option<u32>,
}

fn default_interval() -> u32 {
    1
}

/// A single occurrence interval with start and end instants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Occurrence {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Expand `pattern` from `seed` into concrete occurrence intervals.
///
/// Every occurrence preserves the seed interval's duration verbatim. The
/// first occurrence is the seed itself; subsequent occurrences follow the
/// pattern in the exception's local timezone, so wall-clock times survive
/// DST transitions.
///
/// # Arguments
/// - `pattern` -- the recurrence to apply
/// - `seed` -- the exception's own interval; its start anchors the expansion
/// - `timezone` -- IANA zone the pattern recurs in (e.g., "America/Toronto")
/// - `horizon` -- hard upper bound on occurrence starts
///
/// # Errors
/// Returns `EngineError::Validation` if the seed interval is empty or
/// inverted, `EngineError::InvalidRule` for out-of-range pattern fields, and
/// `EngineError::InvalidTimezone` if the zone is not a valid IANA identifier.
pub fn expand(
    pattern: &RecurrencePattern,
    seed: &Occurrence,
    timezone: &str,
    horizon: DateTime<Utc>,
) -> Result<Vec<Occurrence>> {
    if seed.end <= seed.start {
        return Err(EngineError::Validation(format!(
            "seed interval end {} must follow start {}",
            seed.end, seed.start
        )));
    }
    if pattern.interval == 0 {
        return Err(EngineError::InvalidRule(
            "interval must be at least 1".to_string(),
        ));
    }
    if let Some(days) = &pattern.days_of_week {
        if days.is_empty() {
            return Err(EngineError::InvalidRule(
                "days_of_week must not be empty".to_string(),
            ));
        }
        if let Some(bad) = days.iter().find(|d| **d > 6) {
            return Err(EngineError::InvalidRule(format!(
                "day_of_week {} out of range 0-6",
                bad
            )));
        }
    }
    if let Some(day) = pattern.day_of_month {
        if !(1..=31).contains(&day) {
            return Err(EngineError::InvalidRule(format!(
                "day_of_month {} out of range 1-31",
                day
            )));
        }
    }

    let tz: chrono_tz::Tz = timezone
        .parse()
        .map_err(|_| EngineError::InvalidTimezone(timezone.to_string()))?;

    // Anchor the expansion at the seed's local wall-clock time.
    let dtstart_ical = seed
        .start
        .with_timezone(&tz)
        .format("%Y%m%dT%H%M%S")
        .to_string();

    let mut rule = format!("FREQ={}", pattern.kind.freq());
    if pattern.interval > 1 {
        rule.push_str(&format!(";INTERVAL={}", pattern.interval));
    }
    if pattern.kind == RecurrenceKind::Weekly {
        if let Some(days) = &pattern.days_of_week {
            let codes: Vec<&str> = days.iter().map(|d| BYDAY_CODES[*d as usize]).collect();
            rule.push_str(&format!(";BYDAY={}", codes.join(",")));
        }
    }
    if pattern.kind == RecurrenceKind::Monthly {
        if let Some(day) = pattern.day_of_month {
            rule.push_str(&format!(";BYMONTHDAY={}", day));
        }
    }

    // Bound by end_date or horizon, whichever is earlier. Per RFC 5545, when
    // DTSTART carries a TZID the UNTIL value must be given in UTC; the rrule
    // crate enforces this. `bound` is already a UTC instant, so emitting it
    // with a trailing "Z" names the same moment regardless of the zone.
    let bound = match pattern.end_date {
        Some(end_date) => end_date.min(horizon),
        None => horizon,
    };
    let until_ical = bound.format("%Y%m%dT%H%M%SZ").to_string();
    rule.push_str(&format!(";UNTIL={}", until_ical));

    let rrule_text = format!("DTSTART;TZID={}:{}\nRRULE:{}", timezone, dtstart_ical, rule);

    let rrule_set: RRuleSet = rrule_text
        .parse()
        .map_err(|e| EngineError::InvalidRule(format!("{}", e)))?;

    let cap = pattern.max_occurrences.unwrap_or(DEFAULT_MAX_OCCURRENCES);
    let instances = rrule_set.all(cap.min(u16::MAX as u32) as u16);

    // Duration of the seed interval, preserved verbatim on every occurrence.
    let duration = seed.end - seed.start;

    let mut occurrences: Vec<Occurrence> = instances
        .dates
        .into_iter()
        .map(|dt| {
            let start: DateTime<Utc> = dt.with_timezone(&Utc);
            Occurrence {
                start,
                end: start + duration,
            }
        })
        .collect();
    occurrences.truncate(cap as usize);

    Ok(occurrences)
}
