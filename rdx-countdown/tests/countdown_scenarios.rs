use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use countdown::prelude::*;

fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
}

fn remaining(result: Countdown) -> Breakdown {
    match result {
        Countdown::Remaining(breakdown) => breakdown,
        other => panic!("expected a remaining countdown, got {:?}", other),
    }
}

#[test]
fn year_then_months_then_days() {
    let result = countdown(at(2024, 1, 15, 0, 0, 0), Some(at(2025, 3, 20, 0, 0, 0)), Tz::UTC);
    assert_eq!(
        remaining(result),
        Breakdown {
            years: 1,
            months: 2,
            weeks: 0,
            days: 5,
            ..Default::default()
        }
    );
}

#[test]
fn lands_exactly_on_leap_day() {
    let result = countdown(at(2023, 2, 28, 0, 0, 0), Some(at(2024, 2, 29, 0, 0, 0)), Tz::UTC);
    assert_eq!(
        remaining(result),
        Breakdown {
            years: 1,
            ..Default::default()
        }
    );
}

#[test]
fn missing_and_garbage_targets_are_unknown() {
    let now = at(2025, 6, 1, 0, 0, 0);
    for target in [None, Some(""), Some("not-a-date")] {
        let result = countdown_str(now, target, Tz::UTC);
        assert_eq!(result, Countdown::Unknown);
        assert_eq!(largest_unit_label(&result), "N/A");

        let legacy = serde_json::to_value(result.to_legacy()).unwrap();
        assert_eq!(legacy["isPast"], false);
        assert_eq!(legacy["seconds"], 0);
    }
}

#[test]
fn past_event_has_started() {
    let result = countdown_str(at(2025, 6, 1, 0, 0, 0), Some("2025-05-01"), Tz::UTC);
    assert_eq!(result, Countdown::Past);
    assert_eq!(largest_unit_label(&result), "Started");

    let legacy = result.to_legacy();
    assert!(legacy.is_past);
    assert_eq!(legacy.years + legacy.days + legacy.seconds, 0);
}

#[test]
fn exact_equality_is_past() {
    let now = at(2025, 6, 1, 12, 0, 0) + TimeDelta::milliseconds(123);
    assert_eq!(countdown(now, Some(now), Tz::UTC), Countdown::Past);

    let one_ms_later = now + TimeDelta::milliseconds(1);
    assert!(matches!(
        countdown(now, Some(one_ms_later), Tz::UTC),
        Countdown::Remaining(_)
    ));
}

#[test]
fn one_second_ahead() {
    let now = at(2025, 6, 1, 12, 0, 0);
    let result = countdown(now, Some(now + TimeDelta::seconds(1)), Tz::UTC);
    assert_eq!(
        remaining(result),
        Breakdown {
            seconds: 1,
            ..Default::default()
        }
    );
    assert_eq!(largest_unit_label(&result), "1 Second");
}

#[test]
fn window_for_days_and_below() {
    let breakdown = Breakdown {
        days: 3,
        hours: 5,
        minutes: 20,
        seconds: 10,
        ..Default::default()
    };
    let window = unit_window(&breakdown);
    let picked: Vec<(CountUnit, u64)> = window.iter().map(|slot| (slot.unit, slot.value)).collect();
    assert_eq!(
        picked,
        vec![
            (CountUnit::Day, 3),
            (CountUnit::Hour, 5),
            (CountUnit::Minute, 20),
            (CountUnit::Second, 10),
        ]
    );

    let json = serde_json::to_value(&window[0]).unwrap();
    assert_eq!(json, serde_json::json!({ "unitLabel": "Days", "value": 3 }));
}

#[test]
fn window_keeps_zero_units_inside() {
    let breakdown = Breakdown {
        years: 2,
        days: 1,
        ..Default::default()
    };
    let window = unit_window(&breakdown);
    let values: Vec<u64> = window.iter().map(|slot| slot.value).collect();
    assert_eq!(window[0].unit, CountUnit::Year);
    assert_eq!(values, vec![2, 0, 0, 1]);
}

#[test]
fn offsetless_targets_step_in_the_configured_zone() {
    let tz: Tz = "America/New_York".parse().unwrap();
    // 2025-01-10 09:00 EST; the target is 2025-04-10 09:00 EDT.
    let now = at(2025, 1, 10, 14, 0, 0);
    let result = countdown_str(now, Some("2025-04-10T09:00"), tz);
    assert_eq!(
        remaining(result),
        Breakdown {
            months: 3,
            ..Default::default()
        }
    );
}

/// A spread of (now, target) pairs across leap years and month ends.
fn sample_pairs() -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let anchors = [
        at(2023, 2, 28, 0, 0, 0),
        at(2024, 2, 29, 23, 59, 59),
        at(2024, 1, 31, 8, 30, 0),
        at(2025, 12, 31, 23, 0, 0),
        at(2025, 7, 15, 12, 0, 1),
    ];
    let offsets = [
        TimeDelta::seconds(1),
        TimeDelta::seconds(59),
        TimeDelta::minutes(61),
        TimeDelta::hours(23) + TimeDelta::minutes(59),
        TimeDelta::days(6),
        TimeDelta::days(29),
        TimeDelta::days(30),
        TimeDelta::days(31),
        TimeDelta::days(364),
        TimeDelta::days(365),
        TimeDelta::days(366),
        TimeDelta::days(367) + TimeDelta::seconds(17),
        TimeDelta::days(1461),
        TimeDelta::days(3652) + TimeDelta::hours(5),
    ];
    anchors
        .iter()
        .flat_map(|now| offsets.iter().map(move |offset| (*now, *now + *offset)))
        .collect()
}

#[test]
fn remaining_units_stay_in_range() {
    for (now, target) in sample_pairs() {
        let breakdown = remaining(countdown(now, Some(target), Tz::UTC));
        assert!(breakdown.seconds <= 59, "{} -> {}", now, target);
        assert!(breakdown.minutes <= 59, "{} -> {}", now, target);
        assert!(breakdown.hours <= 23, "{} -> {}", now, target);
        assert!(breakdown.days <= 6, "{} -> {}", now, target);
        assert!(breakdown.months <= 11, "{} -> {}", now, target);
        assert!(!breakdown.is_zero(), "{} -> {}", now, target);
    }
}

#[test]
fn breakdown_reconstructs_the_target() {
    for (now, target) in sample_pairs() {
        let breakdown = remaining(countdown(now, Some(target), Tz::UTC));
        let rebuilt = breakdown.apply_to(now, Tz::UTC).unwrap();
        assert_eq!(rebuilt.timestamp(), target.timestamp(), "{} -> {}", now, target);
    }
}

#[test]
fn recomputation_is_stable() {
    for (now, target) in sample_pairs() {
        assert_eq!(
            countdown(now, Some(target), Tz::UTC),
            countdown(now, Some(target), Tz::UTC)
        );
    }
}

#[test]
fn only_missing_targets_encode_as_unknown() {
    let unknown = Countdown::Unknown.to_legacy();
    for (now, target) in sample_pairs() {
        assert_ne!(countdown(now, Some(target), Tz::UTC).to_legacy(), unknown, "{} -> {}", now, target);
        assert_ne!(countdown(target, Some(now), Tz::UTC).to_legacy(), unknown, "{} -> {}", target, now);
    }
    assert_eq!(countdown_str(at(2025, 1, 1, 0, 0, 0), Some("soon"), Tz::UTC).to_legacy(), unknown);
}

#[test]
fn imminent_target_shows_one_second() {
    let now = at(2025, 6, 1, 12, 0, 0);
    let result = countdown(now, Some(now + TimeDelta::milliseconds(400)), Tz::UTC);
    assert_eq!(largest_unit_label(&result), "1 Second");

    let values: Vec<u64> = countdown_window(&result)
        .unwrap()
        .iter()
        .map(|slot| slot.value)
        .collect();
    assert_eq!(values, vec![0, 0, 0, 1]);
    assert!(!result.to_legacy().is_past);
}
