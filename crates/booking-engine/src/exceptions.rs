//! Schedule exceptions: owner-declared blackout intervals, optionally
//! recurring, that suppress generated slots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::recurrence::{self, Occurrence, RecurrencePattern};
use crate::slots::{CandidateSlot, SlotStatus};

/// A blackout interval for one owner, expanded on demand — occurrences are
/// computed, never persisted individually.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleException {
    pub event: String,
    pub owner: String,
    /// IANA zone the exception recurs in.
    pub timezone: String,
    pub start_datetime: DateTime<Utc>,
    pub end_datetime: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default)]
    pub recurring: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<RecurrencePattern>,
}

impl ScheduleException {
    pub fn validate(&self) -> Result<()> {
        if self.end_datetime <= self.start_datetime {
            return Err(EngineError::Validation(format!(
                "exception end {} must follow start {}",
                self.end_datetime, self.start_datetime
            )));
        }
        Ok(())
    }
}

/// What happens to a candidate slot suppressed by an exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockedSlotPolicy {
    /// Suppressed candidates are dropped from the output.
    #[default]
    Drop,
    /// Suppressed candidates are kept with status [`SlotStatus::Blocked`]
    /// so callers can surface them for visibility.
    MaterializeBlocked,
}

/// The occurrence intervals of one exception up to `horizon`.
///
/// Non-recurring exceptions (or recurring ones without a pattern) yield
/// exactly their own interval.
pub fn occurrences(
    exception: &ScheduleException,
    horizon: DateTime<Utc>,
) -> Result<Vec<Occurrence>> {
    exception.validate()?;
    let seed = Occurrence {
        start: exception.start_datetime,
        end: exception.end_datetime,
    };
    match &exception.pattern {
        Some(pattern) if exception.recurring => {
            recurrence::expand(pattern, &seed, &exception.timezone, horizon)
        }
        _ => Ok(vec![seed]),
    }
}

/// Filter `candidates` against `exceptions`.
///
/// A candidate is suppressed when it belongs to the exception's owner and
/// its half-open interval intersects any occurrence interval:
/// `candidate.start < occ.end && occ.start < candidate.end`. A candidate
/// ending exactly when an occurrence starts is NOT suppressed.
pub fn apply_exceptions(
    candidates: Vec<CandidateSlot>,
    exceptions: &[ScheduleException],
    horizon: DateTime<Utc>,
    policy: BlockedSlotPolicy,
) -> Result<Vec<CandidateSlot>> {
    let mut blackouts: Vec<(&str, Occurrence)> = Vec::new();
    for exception in exceptions {
        for occurrence in occurrences(exception, horizon)? {
            blackouts.push((exception.owner.as_str(), occurrence));
        }
    }

    let mut out = Vec::with_capacity(candidates.len());
    for mut candidate in candidates {
        let suppressed = blackouts.iter().any(|(owner, occ)| {
            *owner == candidate.owner
                && candidate.start_time < occ.end
                && occ.start < candidate.end_time
        });
        if !suppressed {
            out.push(candidate);
        } else if policy == BlockedSlotPolicy::MaterializeBlocked {
            candidate.status = SlotStatus::Blocked;
            out.push(candidate);
        }
    }
    Ok(out)
}
