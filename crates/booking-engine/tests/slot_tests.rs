//! Tests for slot generation, exception precedence, and DST handling.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use booking_engine::conflict::{effective_interval, Interval};
use booking_engine::exception::{resolve, DayPolicy, TimeRange};
use booking_engine::slots::{day_windows, generate_slots, SlotQuery};
use booking_engine::{AppointmentType, BlockedRange, DateException, ExceptionKind, WeeklyRule};

// ── Helpers ─────────────────────────────────────────────────────────────────

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

fn appointment_type(id: &str, duration: u32, before: u32, after: u32) -> AppointmentType {
    AppointmentType {
        id: id.to_string(),
        provider_id: "p1".to_string(),
        duration_minutes: duration,
        buffer_before_minutes: before,
        buffer_after_minutes: after,
        active: true,
    }
}

fn rule(weekday: u8, start: NaiveTime, end: NaiveTime) -> WeeklyRule {
    WeeklyRule {
        provider_id: "p1".to_string(),
        weekday,
        start_time: start,
        end_time: end,
        is_available: true,
    }
}

fn exception(on: NaiveDate, kind: ExceptionKind, scope: Option<&str>) -> DateException {
    DateException {
        provider_id: "p1".to_string(),
        date: on,
        kind,
        appointment_type_id: scope.map(str::to_string),
    }
}

/// 2030-03-18 is a Monday.
const MONDAY: u8 = 1;

struct Day {
    timezone: Tz,
    date: NaiveDate,
    rules: Vec<WeeklyRule>,
    exceptions: Vec<DateException>,
    blocked: Vec<BlockedRange>,
    existing: Vec<Interval>,
}

impl Day {
    fn utc_monday(rules: Vec<WeeklyRule>) -> Self {
        Self {
            timezone: chrono_tz::UTC,
            date: date(2030, 3, 18),
            rules,
            exceptions: Vec::new(),
            blocked: Vec::new(),
            existing: Vec::new(),
        }
    }

    fn slots(&self, appointment_type: &AppointmentType) -> Vec<DateTime<Utc>> {
        generate_slots(&SlotQuery {
            timezone: &self.timezone,
            appointment_type,
            date: self.date,
            weekly_rules: &self.rules,
            exceptions: &self.exceptions,
            blocked_ranges: &self.blocked,
            existing: &self.existing,
        })
    }
}

// ── Stepping ────────────────────────────────────────────────────────────────

#[test]
fn hour_long_type_fills_working_day() {
    let day = Day::utc_monday(vec![rule(MONDAY, time(9, 0), time(17, 0))]);
    let slots = day.slots(&appointment_type("t", 60, 0, 0));

    assert_eq!(slots.len(), 8);
    assert_eq!(slots[0], utc(2030, 3, 18, 9, 0));
    assert_eq!(slots[7], utc(2030, 3, 18, 16, 0));
}

#[test]
fn step_is_duration_plus_buffer_after() {
    // 30 + 5 = 35 minute step; buffer_before does not widen the step.
    let day = Day::utc_monday(vec![rule(MONDAY, time(9, 0), time(10, 5))]);
    let slots = day.slots(&appointment_type("t", 30, 10, 5));

    assert_eq!(slots, vec![utc(2030, 3, 18, 9, 0), utc(2030, 3, 18, 9, 35)]);
    assert!(!slots.contains(&utc(2030, 3, 18, 9, 30)));
}

#[test]
fn candidate_that_overruns_rule_end_is_not_emitted() {
    // 09:35 + 30 = 10:05 > 10:00.
    let day = Day::utc_monday(vec![rule(MONDAY, time(9, 0), time(10, 0))]);
    let slots = day.slots(&appointment_type("t", 30, 10, 5));

    assert_eq!(slots, vec![utc(2030, 3, 18, 9, 0)]);
}

#[test]
fn duration_longer_than_rule_yields_nothing() {
    let day = Day::utc_monday(vec![rule(MONDAY, time(9, 0), time(9, 30))]);
    assert!(day.slots(&appointment_type("t", 60, 0, 0)).is_empty());
}

#[test]
fn zero_length_and_inverted_rules_yield_nothing() {
    let day = Day::utc_monday(vec![
        rule(MONDAY, time(9, 0), time(9, 0)),
        rule(MONDAY, time(22, 0), time(2, 0)),
    ]);
    assert!(day.slots(&appointment_type("t", 15, 0, 0)).is_empty());
}

#[test]
fn rules_for_other_weekdays_are_ignored() {
    let day = Day::utc_monday(vec![rule(2, time(9, 0), time(17, 0))]);
    assert!(day.slots(&appointment_type("t", 30, 0, 0)).is_empty());
}

#[test]
fn unavailable_rule_rows_are_ignored() {
    let mut closed = rule(MONDAY, time(9, 0), time(17, 0));
    closed.is_available = false;
    let day = Day::utc_monday(vec![closed]);

    assert!(day.slots(&appointment_type("t", 30, 0, 0)).is_empty());
}

#[test]
fn split_shifts_are_walked_independently_and_sorted() {
    // Declared afternoon-first; output must still be ascending.
    let day = Day::utc_monday(vec![
        rule(MONDAY, time(14, 0), time(15, 0)),
        rule(MONDAY, time(9, 0), time(10, 0)),
    ]);
    let slots = day.slots(&appointment_type("t", 30, 0, 0));

    assert_eq!(
        slots,
        vec![
            utc(2030, 3, 18, 9, 0),
            utc(2030, 3, 18, 9, 30),
            utc(2030, 3, 18, 14, 0),
            utc(2030, 3, 18, 14, 30),
        ]
    );
}

#[test]
fn overlapping_rules_do_not_duplicate_slots() {
    let day = Day::utc_monday(vec![
        rule(MONDAY, time(9, 0), time(11, 0)),
        rule(MONDAY, time(10, 0), time(12, 0)),
        rule(MONDAY, time(10, 0), time(12, 0)),
    ]);
    let slots = day.slots(&appointment_type("t", 60, 0, 0));

    assert_eq!(
        slots,
        vec![
            utc(2030, 3, 18, 9, 0),
            utc(2030, 3, 18, 10, 0),
            utc(2030, 3, 18, 11, 0),
        ]
    );
}

#[test]
fn generation_is_repeatable() {
    let day = Day::utc_monday(vec![rule(MONDAY, time(9, 0), time(17, 0))]);
    let t = appointment_type("t", 25, 5, 5);

    assert_eq!(day.slots(&t), day.slots(&t));
}

// ── Collisions ──────────────────────────────────────────────────────────────

#[test]
fn existing_booking_removes_overlapping_candidates() {
    let mut day = Day::utc_monday(vec![rule(MONDAY, time(9, 0), time(12, 0))]);
    day.existing = vec![Interval::new(utc(2030, 3, 18, 10, 0), utc(2030, 3, 18, 11, 0))];

    let slots = day.slots(&appointment_type("t", 60, 0, 0));

    assert_eq!(slots, vec![utc(2030, 3, 18, 9, 0), utc(2030, 3, 18, 11, 0)]);
}

#[test]
fn candidate_buffer_before_collides_with_earlier_booking() {
    let mut day = Day::utc_monday(vec![rule(MONDAY, time(9, 0), time(11, 0))]);
    // Existing 09:00 booking with zero buffers: 09:00-10:00.
    day.existing = vec![effective_interval(utc(2030, 3, 18, 9, 0), 60, 0, 0)];

    // Candidate 10:00 pads back to 09:45, which overlaps.
    let slots = day.slots(&appointment_type("t", 60, 15, 0));

    assert!(slots.is_empty());
}

#[test]
fn back_to_back_zero_buffer_slots_are_offered() {
    let mut day = Day::utc_monday(vec![rule(MONDAY, time(9, 0), time(11, 0))]);
    day.existing = vec![effective_interval(utc(2030, 3, 18, 9, 0), 60, 0, 0)];

    let slots = day.slots(&appointment_type("t", 60, 0, 0));

    assert_eq!(slots, vec![utc(2030, 3, 18, 10, 0)]);
}

#[test]
fn blocked_range_is_subtracted() {
    let mut day = Day::utc_monday(vec![rule(MONDAY, time(9, 0), time(13, 0))]);
    day.blocked = vec![BlockedRange {
        provider_id: "p1".to_string(),
        start: utc(2030, 3, 18, 10, 30),
        end: utc(2030, 3, 18, 11, 30),
        is_all_day: false,
    }];

    let slots = day.slots(&appointment_type("t", 60, 0, 0));

    assert_eq!(slots, vec![utc(2030, 3, 18, 9, 0), utc(2030, 3, 18, 12, 0)]);
}

#[test]
fn all_day_block_covers_whole_local_day() {
    let mut day = Day::utc_monday(vec![rule(MONDAY, time(9, 0), time(17, 0))]);
    // Only a sliver is stored, but the flag widens it to the full day.
    day.blocked = vec![BlockedRange {
        provider_id: "p1".to_string(),
        start: utc(2030, 3, 18, 0, 0),
        end: utc(2030, 3, 18, 0, 1),
        is_all_day: true,
    }];

    assert!(day.slots(&appointment_type("t", 30, 0, 0)).is_empty());
}

// ── Exceptions ──────────────────────────────────────────────────────────────

#[test]
fn unavailable_exception_empties_the_day() {
    let mut day = Day::utc_monday(vec![rule(MONDAY, time(9, 0), time(17, 0))]);
    day.exceptions = vec![exception(date(2030, 3, 18), ExceptionKind::Unavailable, None)];

    assert!(day.slots(&appointment_type("t", 30, 0, 0)).is_empty());
}

#[test]
fn exception_on_another_date_has_no_effect() {
    let mut day = Day::utc_monday(vec![rule(MONDAY, time(9, 0), time(10, 0))]);
    day.exceptions = vec![exception(date(2030, 3, 25), ExceptionKind::Unavailable, None)];

    assert_eq!(day.slots(&appointment_type("t", 60, 0, 0)).len(), 1);
}

#[test]
fn scoped_exception_only_blocks_its_service() {
    let mut day = Day::utc_monday(vec![rule(MONDAY, time(9, 0), time(10, 0))]);
    day.exceptions = vec![exception(
        date(2030, 3, 18),
        ExceptionKind::Unavailable,
        Some("massage"),
    )];

    assert!(day.slots(&appointment_type("massage", 60, 0, 0)).is_empty());
    assert_eq!(day.slots(&appointment_type("haircut", 60, 0, 0)).len(), 1);
}

#[test]
fn custom_hours_and_available_fall_back_to_weekly_rules() {
    let on = date(2030, 3, 18);
    let exceptions = vec![
        exception(on, ExceptionKind::CustomHours, None),
        exception(on, ExceptionKind::Available, None),
    ];

    assert_eq!(resolve(&exceptions, on, Some("t")), DayPolicy::UseWeeklyRules);
}

#[test]
fn unscoped_resolution_ignores_scoped_exceptions() {
    let on = date(2030, 3, 18);
    let exceptions = vec![exception(on, ExceptionKind::Unavailable, Some("t"))];

    assert_eq!(resolve(&exceptions, on, None), DayPolicy::UseWeeklyRules);
    assert_eq!(resolve(&exceptions, on, Some("t")), DayPolicy::Blocked);
}

#[test]
fn custom_hours_policy_replaces_weekly_rules() {
    let rules = vec![rule(MONDAY, time(9, 0), time(17, 0))];
    let policy = DayPolicy::CustomHours(vec![TimeRange {
        start: time(12, 0),
        end: time(13, 0),
    }]);

    let windows = day_windows(&policy, &rules, date(2030, 3, 18));

    assert_eq!(
        windows,
        vec![TimeRange {
            start: time(12, 0),
            end: time(13, 0)
        }]
    );
}

// ── Timezones and DST ───────────────────────────────────────────────────────

#[test]
fn rules_are_read_on_the_provider_wall_clock() {
    let day = Day {
        timezone: chrono_tz::Asia::Tokyo,
        ..Day::utc_monday(vec![rule(MONDAY, time(9, 0), time(10, 0))])
    };

    // 09:00 JST = 00:00 UTC the same day.
    assert_eq!(
        day.slots(&appointment_type("t", 60, 0, 0)),
        vec![utc(2030, 3, 18, 0, 0)]
    );
}

#[test]
fn weekday_comes_from_provider_date_not_utc_date() {
    // Monday 20:00 in Los Angeles is Tuesday 03:00 UTC.
    let day = Day {
        timezone: chrono_tz::America::Los_Angeles,
        ..Day::utc_monday(vec![rule(MONDAY, time(20, 0), time(21, 0))])
    };

    assert_eq!(
        day.slots(&appointment_type("t", 60, 0, 0)),
        vec![utc(2030, 3, 19, 3, 0)]
    );
}

#[test]
fn spring_forward_gap_candidates_are_skipped() {
    // New York, Sunday 2030-03-10: 02:00-03:00 does not exist.
    let day = Day {
        timezone: chrono_tz::America::New_York,
        date: date(2030, 3, 10),
        ..Day::utc_monday(vec![rule(0, time(1, 0), time(4, 0))])
    };

    let slots = day.slots(&appointment_type("t", 60, 0, 0));

    // 01:00 EST and 03:00 EDT.
    assert_eq!(slots, vec![utc(2030, 3, 10, 6, 0), utc(2030, 3, 10, 7, 0)]);
}

#[test]
fn fall_back_ambiguous_candidates_use_the_earlier_instant() {
    // New York, Sunday 2030-11-03: 01:00-02:00 happens twice.
    let day = Day {
        timezone: chrono_tz::America::New_York,
        date: date(2030, 11, 3),
        ..Day::utc_monday(vec![rule(0, time(0, 30), time(2, 30))])
    };

    let slots = day.slots(&appointment_type("t", 30, 0, 0));

    assert_eq!(
        slots,
        vec![
            utc(2030, 11, 3, 4, 30), // 00:30 EDT
            utc(2030, 11, 3, 5, 0),  // 01:00 EDT, first occurrence
            utc(2030, 11, 3, 5, 30), // 01:30 EDT, first occurrence
            utc(2030, 11, 3, 7, 0),  // 02:00 EST
        ]
    );
}

#[test]
fn all_day_block_follows_provider_midnight() {
    // A Los Angeles all-day block on Monday must not leak into Tuesday.
    let timezone = chrono_tz::America::Los_Angeles;
    let monday_midnight = timezone
        .with_ymd_and_hms(2030, 3, 18, 0, 0, 0)
        .unwrap()
        .with_timezone(&Utc);
    let tuesday_midnight = timezone
        .with_ymd_and_hms(2030, 3, 19, 0, 0, 0)
        .unwrap()
        .with_timezone(&Utc);

    let mut day = Day {
        timezone,
        date: date(2030, 3, 19),
        ..Day::utc_monday(vec![rule(2, time(9, 0), time(10, 0))])
    };
    day.blocked = vec![BlockedRange {
        provider_id: "p1".to_string(),
        start: monday_midnight,
        end: tuesday_midnight,
        is_all_day: true,
    }];

    assert_eq!(day.slots(&appointment_type("t", 60, 0, 0)).len(), 1);
}
