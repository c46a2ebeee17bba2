//! Availability slot generation: weekly template → dated UTC slot instances.
//!
//! The generator walks the provider's *local* calendar dates, steps each
//! valid time block in `slot_duration + buffer` increments, converts local
//! wall-clock starts to UTC through the template's IANA zone, and applies
//! the advance-notice cutoff, the booking horizon, and idempotency against
//! already-materialized slots.

use std::collections::HashSet;

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::cache::TemplateCache;
use crate::error::{EngineError, Result};
use crate::template::{
    BillingOverride, DateRange, LocationType, TemplateStatus, WeeklyTemplate,
    MAX_BUFFER_MINUTES, MAX_SLOT_DURATION_MINUTES, MIN_SLOT_DURATION_MINUTES, WEEKDAY_LABELS,
};
use crate::timeblock;

/// Templates processed per batch in [`generate_batch`], bounding peak memory.
pub const GENERATION_BATCH_SIZE: usize = 10;

/// Lifecycle status of a materialized slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Available,
    Booked,
    Blocked,
}

/// A generated slot candidate, not yet persisted (no id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSlot {
    pub owner: String,
    pub event: String,
    /// Provider-local calendar date the slot belongs to.
    pub date: NaiveDate,
    /// Start label of the originating time block, identity component.
    pub block_start: String,
    /// Local wall-clock slot start (`"HH:MM"`), identity component.
    pub local_start: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: SlotStatus,
    pub location_types: Vec<LocationType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing: Option<BillingOverride>,
}

impl CandidateSlot {
    /// Identity key guaranteeing idempotent re-generation.
    pub fn key(&self) -> SlotKey {
        SlotKey {
            owner: self.owner.clone(),
            date: self.date,
            block_start: self.block_start.clone(),
            slot_start: self.local_start.clone(),
        }
    }
}

/// Identity of one slot: `(owner, local date, block start, slot start)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    pub owner: String,
    pub date: NaiveDate,
    pub block_start: String,
    pub slot_start: String,
}

/// A weekly template with parsed timezone and block times, ready to walk.
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    pub(crate) owner: String,
    pub(crate) event: String,
    pub(crate) tz: Tz,
    pub(crate) status: TemplateStatus,
    pub(crate) min_booking_minutes: i64,
    pub(crate) max_booking_days: i64,
    pub(crate) location_types: Vec<LocationType>,
    pub(crate) billing: Option<BillingOverride>,
    pub(crate) date_range: Option<DateRange>,
    pub(crate) days: [Vec<CompiledBlock>; 7],
}

#[derive(Debug, Clone)]
pub(crate) struct CompiledBlock {
    /// Original start label, kept for slot identity keys.
    label: String,
    start: NaiveTime,
    end: NaiveTime,
    slot_duration: u32,
    buffer_minutes: u32,
}

/// Parse and validate a template into its walkable form.
///
/// Days whose blocks fail validation or overlap are compiled empty — the
/// failure is logged and that day generates nothing, per-day isolation
/// rather than rejecting the whole template.
pub(crate) fn compile(template: &WeeklyTemplate) -> Result<CompiledTemplate> {
    let tz: Tz = template
        .timezone
        .parse()
        .map_err(|_| EngineError::InvalidTimezone(template.timezone.clone()))?;

    let mut days: [Vec<CompiledBlock>; 7] = Default::default();
    for (index, day) in template.days.iter().enumerate() {
        if !day.enabled || day.blocks.is_empty() {
            continue;
        }
        match compile_day(template, &day.blocks) {
            Ok(blocks) => days[index] = blocks,
            Err(e) => {
                tracing::warn!(
                    owner = %template.owner,
                    event = %template.event,
                    day = WEEKDAY_LABELS[index],
                    error = %e,
                    "skipping day with invalid time blocks"
                );
            }
        }
    }

    Ok(CompiledTemplate {
        owner: template.owner.clone(),
        event: template.event.clone(),
        tz,
        status: template.status,
        min_booking_minutes: template.min_booking_minutes,
        max_booking_days: template.max_booking_days,
        location_types: template.location_types.clone(),
        billing: template.billing.clone(),
        date_range: template.date_range,
        days,
    })
}

fn compile_day(
    template: &WeeklyTemplate,
    blocks: &[crate::template::TimeBlock],
) -> Result<Vec<CompiledBlock>> {
    if let Some(overlap) = timeblock::detect_overlap(blocks).first() {
        return Err(EngineError::Validation(format!(
            "block {}-{} overlaps block {}-{}",
            overlap.earlier.start_time,
            overlap.earlier.end_time,
            overlap.later.start_time,
            overlap.later.end_time
        )));
    }

    let mut compiled = Vec::with_capacity(blocks.len());
    for block in blocks {
        timeblock::validate_block(block)?;
        let slot_duration = block.slot_duration.unwrap_or(template.slot_duration);
        let buffer_minutes = block.buffer_minutes.unwrap_or(template.buffer_minutes);
        if !(MIN_SLOT_DURATION_MINUTES..=MAX_SLOT_DURATION_MINUTES).contains(&slot_duration) {
            return Err(EngineError::Validation(format!(
                "effective slot_duration {} out of range {}-{}",
                slot_duration, MIN_SLOT_DURATION_MINUTES, MAX_SLOT_DURATION_MINUTES
            )));
        }
        if buffer_minutes > MAX_BUFFER_MINUTES {
            return Err(EngineError::Validation(format!(
                "effective buffer_minutes {} exceeds {}",
                buffer_minutes, MAX_BUFFER_MINUTES
            )));
        }
        compiled.push(CompiledBlock {
            label: block.start_time.clone(),
            start: timeblock::parse_time(&block.start_time)?,
            end: timeblock::parse_time(&block.end_time)?,
            slot_duration,
            buffer_minutes,
        });
    }
    Ok(compiled)
}

/// Generate candidate slots for one template over an inclusive local date
/// range.
///
/// Candidates whose identity key is already in `existing` are excluded, so
/// re-running generation over the same range is idempotent. Candidates
/// starting before `now + min_booking_minutes` or dated past
/// `max_booking_days` from the provider-local today are skipped. Local times
/// that fall in a DST gap are skipped; ambiguous times resolve to the
/// earlier offset.
///
/// # Errors
/// Returns `EngineError::InvalidTimezone` if the template's zone is not a
/// valid IANA identifier. Invalid time blocks never fail generation — the
/// affected day is skipped.
pub fn generate(
    template: &WeeklyTemplate,
    range: DateRange,
    existing: &HashSet<SlotKey>,
    now: DateTime<Utc>,
) -> Result<Vec<CandidateSlot>> {
    let compiled = compile(template)?;
    let mut seen = HashSet::new();
    Ok(generate_compiled(&compiled, range, existing, now, &mut seen))
}

/// Batch variant: many templates over a shared date range, processed in
/// fixed-size batches of [`GENERATION_BATCH_SIZE`] with a shared compiled-
/// template cache.
///
/// Output order and per-template results are independent of batching. A
/// template that fails to compile (bad timezone) is logged and skipped
/// rather than failing the whole run.
pub fn generate_batch(
    templates: &[WeeklyTemplate],
    range: DateRange,
    existing: &HashSet<SlotKey>,
    now: DateTime<Utc>,
    cache: &mut TemplateCache,
) -> Vec<CandidateSlot> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    for batch in templates.chunks(GENERATION_BATCH_SIZE) {
        for template in batch {
            match cache.get_or_compile(template, now) {
                Ok(compiled) => {
                    out.extend(generate_compiled(&compiled, range, existing, now, &mut seen));
                }
                Err(e) => {
                    tracing::warn!(
                        owner = %template.owner,
                        event = %template.event,
                        error = %e,
                        "skipping template that failed to compile"
                    );
                }
            }
        }
    }
    out
}

fn generate_compiled(
    compiled: &CompiledTemplate,
    range: DateRange,
    existing: &HashSet<SlotKey>,
    now: DateTime<Utc>,
    seen: &mut HashSet<(String, DateTime<Utc>)>,
) -> Vec<CandidateSlot> {
    if compiled.status == TemplateStatus::Inactive {
        return Vec::new();
    }

    let earliest_start = now + Duration::minutes(compiled.min_booking_minutes);
    let local_today = now.with_timezone(&compiled.tz).date_naive();
    let horizon_date = local_today + Duration::days(compiled.max_booking_days);

    let mut out = Vec::new();
    let mut date = range.from;
    while date <= range.to {
        // Dates iterate ascending, so everything past the horizon is done.
        if date > horizon_date {
            break;
        }
        if compiled.date_range.is_some_and(|r| !r.contains(date)) {
            date = match date.succ_opt() {
                Some(next) => next,
                None => break,
            };
            continue;
        }

        let index = date.weekday().num_days_from_monday() as usize;
        for block in &compiled.days[index] {
            walk_block(compiled, block, date, earliest_start, existing, seen, &mut out);
        }

        date = match date.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }
    out
}

/// Walk one block on one date, pushing every full-duration candidate that
/// survives the cutoff, idempotency, and uniqueness checks.
fn walk_block(
    compiled: &CompiledTemplate,
    block: &CompiledBlock,
    date: NaiveDate,
    earliest_start: DateTime<Utc>,
    existing: &HashSet<SlotKey>,
    seen: &mut HashSet<(String, DateTime<Utc>)>,
    out: &mut Vec<CandidateSlot>,
) {
    let duration = Duration::minutes(i64::from(block.slot_duration));
    let step = Duration::minutes(i64::from(block.slot_duration + block.buffer_minutes));
    let block_end = date.and_time(block.end);

    let mut cursor = date.and_time(block.start);
    // No partial trailing slot: the full duration must fit before the end.
    while cursor + duration <= block_end {
        let local_label = cursor.time().format("%H:%M").to_string();

        // Wall-clock → UTC. Gap times (spring forward) have no valid
        // instant and are skipped; ambiguous times (fall back) take the
        // earlier offset.
        let start_utc = match compiled.tz.from_local_datetime(&cursor) {
            LocalResult::Single(dt) => dt.with_timezone(&Utc),
            LocalResult::Ambiguous(earlier, _) => earlier.with_timezone(&Utc),
            LocalResult::None => {
                cursor += step;
                continue;
            }
        };

        // Too soon to book: skipped, never re-dated.
        if start_utc < earliest_start {
            cursor += step;
            continue;
        }

        let key = SlotKey {
            owner: compiled.owner.clone(),
            date,
            block_start: block.label.clone(),
            slot_start: local_label.clone(),
        };
        if existing.contains(&key) {
            cursor += step;
            continue;
        }
        if !seen.insert((compiled.owner.clone(), start_utc)) {
            cursor += step;
            continue;
        }

        out.push(CandidateSlot {
            owner: compiled.owner.clone(),
            event: compiled.event.clone(),
            date,
            block_start: block.label.clone(),
            local_start: local_label,
            start_time: start_utc,
            end_time: start_utc + duration,
            status: SlotStatus::Available,
            location_types: compiled.location_types.clone(),
            billing: compiled.billing.clone(),
        });

        cursor += step;
    }
}

/// A slot that failed the post-generation consistency check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum BoundaryViolation {
    /// The slot's span deviates from the expected duration.
    Duration {
        slot: CandidateSlot,
        expected_minutes: i64,
        actual_minutes: i64,
    },
    /// Spacing to the previous slot of the same block and day deviates from
    /// duration + buffer.
    Spacing {
        slot: CandidateSlot,
        expected_minutes: i64,
        actual_minutes: i64,
    },
}

/// Outcome of [`validate_boundaries`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundaryReport {
    pub valid: Vec<CandidateSlot>,
    pub violations: Vec<BoundaryViolation>,
}

/// Consistency check over generated slots: each slot spans exactly
/// `expected_duration`, and consecutive slots of one block and day are
/// spaced by exactly `expected_duration + expected_buffer`.
///
/// This runs after generation as a partition of the input, not as an
/// enforcement step during it.
pub fn validate_boundaries(
    slots: &[CandidateSlot],
    expected_duration: u32,
    expected_buffer: u32,
) -> BoundaryReport {
    let expected_span = i64::from(expected_duration);
    let expected_spacing = i64::from(expected_duration + expected_buffer);

    let mut report = BoundaryReport {
        valid: Vec::new(),
        violations: Vec::new(),
    };
    let mut previous: Option<&CandidateSlot> = None;

    for slot in slots {
        let span = (slot.end_time - slot.start_time).num_minutes();
        if span != expected_span {
            report.violations.push(BoundaryViolation::Duration {
                slot: slot.clone(),
                expected_minutes: expected_span,
                actual_minutes: span,
            });
            previous = Some(slot);
            continue;
        }

        if let Some(prev) = previous {
            let same_run = prev.owner == slot.owner
                && prev.date == slot.date
                && prev.block_start == slot.block_start;
            let spacing = (slot.start_time - prev.start_time).num_minutes();
            if same_run && spacing != expected_spacing {
                report.violations.push(BoundaryViolation::Spacing {
                    slot: slot.clone(),
                    expected_minutes: expected_spacing,
                    actual_minutes: spacing,
                });
                previous = Some(slot);
                continue;
            }
        }

        report.valid.push(slot.clone());
        previous = Some(slot);
    }
    report
}
