//! Tests for schedule-exception recurrence expansion.

use booking_engine::recurrence::{expand, Occurrence, RecurrenceKind, RecurrencePattern};
use booking_engine::EngineError;
use chrono::{DateTime, Datelike, TimeZone, Utc, Weekday};

// ── Helpers ─────────────────────────────────────────────────────────────────

fn instant(raw: &str) -> DateTime<Utc> {
    raw.parse().unwrap()
}

fn seed(start: &str, end: &str) -> Occurrence {
    Occurrence {
        start: instant(start),
        end: instant(end),
    }
}

fn pattern(kind: RecurrenceKind) -> RecurrencePattern {
    RecurrencePattern {
        kind,
        interval: 1,
        days_of_week: None,
        day_of_month: None,
        end_date: None,
        max_occurrences: None,
    }
}

// ── Daily ───────────────────────────────────────────────────────────────────

#[test]
fn daily_expansion_bounded_by_horizon() {
    let result = expand(
        &pattern(RecurrenceKind::Daily),
        &seed("2026-03-02T14:00:00Z", "2026-03-02T15:00:00Z"),
        "UTC",
        instant("2026-03-06T23:59:59Z"),
    )
    .expect("should expand");

    // Mar 2 through Mar 6 inclusive.
    assert_eq!(result.len(), 5);
    assert_eq!(result[0].start, instant("2026-03-02T14:00:00Z"));
    assert_eq!(result[4].start, instant("2026-03-06T14:00:00Z"));
}

#[test]
fn first_occurrence_is_the_seed() {
    let result = expand(
        &pattern(RecurrenceKind::Daily),
        &seed("2026-03-02T14:00:00Z", "2026-03-02T15:00:00Z"),
        "UTC",
        instant("2026-03-04T00:00:00Z"),
    )
    .unwrap();
    assert_eq!(result[0].start, instant("2026-03-02T14:00:00Z"));
    assert_eq!(result[0].end, instant("2026-03-02T15:00:00Z"));
}

#[test]
fn duration_is_preserved_verbatim() {
    // 90-minute seed interval.
    let result = expand(
        &pattern(RecurrenceKind::Daily),
        &seed("2026-03-02T14:00:00Z", "2026-03-02T15:30:00Z"),
        "UTC",
        instant("2026-03-10T00:00:00Z"),
    )
    .unwrap();
    assert!(!result.is_empty());
    for occurrence in &result {
        assert_eq!((occurrence.end - occurrence.start).num_minutes(), 90);
    }
}

// ── Caps and bounds ─────────────────────────────────────────────────────────

#[test]
fn max_occurrences_caps_the_expansion() {
    let mut p = pattern(RecurrenceKind::Daily);
    p.max_occurrences = Some(3);
    let result = expand(
        &p,
        &seed("2026-03-02T14:00:00Z", "2026-03-02T15:00:00Z"),
        "UTC",
        instant("2026-06-01T00:00:00Z"),
    )
    .unwrap();
    assert_eq!(result.len(), 3);
}

#[test]
fn default_cap_is_one_hundred() {
    // A year of daily occurrences would be 365 without the cap.
    let result = expand(
        &pattern(RecurrenceKind::Daily),
        &seed("2026-01-01T09:00:00Z", "2026-01-01T10:00:00Z"),
        "UTC",
        instant("2027-01-01T00:00:00Z"),
    )
    .unwrap();
    assert_eq!(result.len(), 100);
}

#[test]
fn end_date_bounds_before_horizon() {
    let mut p = pattern(RecurrenceKind::Daily);
    p.end_date = Some(instant("2026-03-04T23:59:59Z"));
    let result = expand(
        &p,
        &seed("2026-03-02T14:00:00Z", "2026-03-02T15:00:00Z"),
        "UTC",
        instant("2026-06-01T00:00:00Z"),
    )
    .unwrap();
    // Mar 2, 3, 4 only.
    assert_eq!(result.len(), 3);
}

// ── Weekly ──────────────────────────────────────────────────────────────────

#[test]
fn weekly_days_of_week_produce_only_those_weekdays() {
    let mut p = pattern(RecurrenceKind::Weekly);
    p.days_of_week = Some(vec![0, 2]); // Monday, Wednesday
    let result = expand(
        &p,
        // 2026-03-02 is a Monday.
        &seed("2026-03-02T14:00:00Z", "2026-03-02T15:00:00Z"),
        "UTC",
        instant("2026-03-15T00:00:00Z"),
    )
    .unwrap();

    // Mar 2, 4, 9, 11.
    assert_eq!(result.len(), 4);
    for occurrence in &result {
        let weekday = occurrence.start.weekday();
        assert!(
            weekday == Weekday::Mon || weekday == Weekday::Wed,
            "unexpected weekday {:?}",
            weekday
        );
    }
}

#[test]
fn weekly_interval_two_skips_alternate_weeks() {
    let mut p = pattern(RecurrenceKind::Weekly);
    p.interval = 2;
    let result = expand(
        &p,
        &seed("2026-03-02T14:00:00Z", "2026-03-02T15:00:00Z"),
        "UTC",
        instant("2026-04-01T00:00:00Z"),
    )
    .unwrap();
    // Mar 2, 16, 30.
    assert_eq!(result.len(), 3);
    assert_eq!(result[1].start, instant("2026-03-16T14:00:00Z"));
    assert_eq!(result[2].start, instant("2026-03-30T14:00:00Z"));
}

// ── Monthly / yearly ────────────────────────────────────────────────────────

#[test]
fn monthly_day_of_month_recurs_on_that_day() {
    let mut p = pattern(RecurrenceKind::Monthly);
    p.day_of_month = Some(15);
    let result = expand(
        &p,
        &seed("2026-01-15T10:00:00Z", "2026-01-15T11:00:00Z"),
        "UTC",
        instant("2026-04-16T00:00:00Z"),
    )
    .unwrap();
    assert_eq!(result.len(), 4);
    for occurrence in &result {
        assert_eq!(occurrence.start.day(), 15);
    }
}

#[test]
fn yearly_recurs_on_the_anniversary() {
    let result = expand(
        &pattern(RecurrenceKind::Yearly),
        &seed("2026-05-01T08:00:00Z", "2026-05-01T09:00:00Z"),
        "UTC",
        instant("2028-06-01T00:00:00Z"),
    )
    .unwrap();
    assert_eq!(result.len(), 3);
    assert_eq!(result[2].start, instant("2028-05-01T08:00:00Z"));
}

// ── DST handling ────────────────────────────────────────────────────────────

#[test]
fn wall_clock_time_survives_dst_transition() {
    // Seed: Mar 2, 09:00 in Toronto = 14:00 UTC (EST, UTC-5).
    // DST starts Mar 8; by Mar 9 the same wall-clock time is 13:00 UTC.
    let result = expand(
        &pattern(RecurrenceKind::Daily),
        &seed("2026-03-02T14:00:00Z", "2026-03-02T15:00:00Z"),
        "America/Toronto",
        instant("2026-03-09T23:59:59Z"),
    )
    .unwrap();

    assert_eq!(result.len(), 8);
    assert_eq!(result[0].start, instant("2026-03-02T14:00:00Z"));
    assert_eq!(
        result[7].start,
        Utc.with_ymd_and_hms(2026, 3, 9, 13, 0, 0).unwrap(),
        "wall-clock 09:00 should shift to 13:00 UTC after spring forward"
    );
}

// ── Invalid inputs ──────────────────────────────────────────────────────────

#[test]
fn zero_interval_is_rejected() {
    let mut p = pattern(RecurrenceKind::Daily);
    p.interval = 0;
    let result = expand(
        &p,
        &seed("2026-03-02T14:00:00Z", "2026-03-02T15:00:00Z"),
        "UTC",
        instant("2026-04-01T00:00:00Z"),
    );
    assert!(matches!(result, Err(EngineError::InvalidRule(_))));
}

#[test]
fn out_of_range_weekday_is_rejected() {
    let mut p = pattern(RecurrenceKind::Weekly);
    p.days_of_week = Some(vec![7]);
    let result = expand(
        &p,
        &seed("2026-03-02T14:00:00Z", "2026-03-02T15:00:00Z"),
        "UTC",
        instant("2026-04-01T00:00:00Z"),
    );
    assert!(matches!(result, Err(EngineError::InvalidRule(_))));
}

#[test]
fn empty_days_of_week_is_rejected() {
    let mut p = pattern(RecurrenceKind::Weekly);
    p.days_of_week = Some(vec![]);
    let result = expand(
        &p,
        &seed("2026-03-02T14:00:00Z", "2026-03-02T15:00:00Z"),
        "UTC",
        instant("2026-04-01T00:00:00Z"),
    );
    assert!(matches!(result, Err(EngineError::InvalidRule(_))));
}

#[test]
fn out_of_range_day_of_month_is_rejected() {
    for day in [0, 32] {
        let mut p = pattern(RecurrenceKind::Monthly);
        p.day_of_month = Some(day);
        let result = expand(
            &p,
            &seed("2026-03-02T14:00:00Z", "2026-03-02T15:00:00Z"),
            "UTC",
            instant("2026-04-01T00:00:00Z"),
        );
        assert!(matches!(result, Err(EngineError::InvalidRule(_))));
    }
}

#[test]
fn unknown_timezone_is_rejected() {
    let result = expand(
        &pattern(RecurrenceKind::Daily),
        &seed("2026-03-02T14:00:00Z", "2026-03-02T15:00:00Z"),
        "Mars/Olympus_Mons",
        instant("2026-04-01T00:00:00Z"),
    );
    assert!(matches!(result, Err(EngineError::InvalidTimezone(_))));
}

#[test]
fn inverted_seed_interval_is_rejected() {
    let result = expand(
        &pattern(RecurrenceKind::Daily),
        &seed("2026-03-02T15:00:00Z", "2026-03-02T14:00:00Z"),
        "UTC",
        instant("2026-04-01T00:00:00Z"),
    );
    assert!(matches!(result, Err(EngineError::Validation(_))));
}
