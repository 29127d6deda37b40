//! The calendar-accurate countdown engine.
//!
//! Given "now" and a target instant, [`countdown`] steps a cursor forward by
//! whole calendar years, then whole calendar months, and splits what is left
//! with fixed-radix arithmetic. Everything here is pure; callers recompute
//! from scratch on every tick.

use crate::common::CountUnit;
use crate::time::{parse_target, resolve_local};
use chrono::{DateTime, Datelike, NaiveDate, TimeDelta, Utc};
use chrono_tz::Tz;
use serde::Serialize;

const SECONDS_PER_MINUTE: u64 = 60;
const MINUTES_PER_HOUR: u64 = 60;
const HOURS_PER_DAY: u64 = 24;
const DAYS_PER_WEEK: u64 = 7;
const MONTHS_PER_YEAR: u64 = 12;
const MILLIS_PER_SECOND: u64 = 1_000;
const SECONDS_PER_HOUR: u64 = SECONDS_PER_MINUTE * MINUTES_PER_HOUR;
const SECONDS_PER_DAY: u64 = SECONDS_PER_HOUR * HOURS_PER_DAY;

/// Time remaining until a target, split into display units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Breakdown {
    pub years: u64,
    pub months: u64,
    pub weeks: u64,
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl Breakdown {
    pub fn value(&self, unit: CountUnit) -> u64 {
        match unit {
            CountUnit::Year => self.years,
            CountUnit::Month => self.months,
            CountUnit::Week => self.weeks,
            CountUnit::Day => self.days,
            CountUnit::Hour => self.hours,
            CountUnit::Minute => self.minutes,
            CountUnit::Second => self.seconds,
        }
    }

    /// Every unit paired with its value, largest unit first.
    pub fn values(&self) -> [(CountUnit, u64); 7] {
        CountUnit::ALL.map(|unit| (unit, self.value(unit)))
    }

    pub fn is_zero(&self) -> bool {
        self.values().iter().all(|(_, value)| *value == 0)
    }

    /// Adds this breakdown to `anchor` the same way [`countdown`] took it apart.
    ///
    /// Years and months are calendar-aware, everything below is fixed length.
    pub fn apply_to(&self, anchor: DateTime<Utc>, tz: Tz) -> Option<DateTime<Utc>> {
        let months = self
            .years
            .checked_mul(MONTHS_PER_YEAR)?
            .checked_add(self.months)?;
        let cursor = if months == 0 {
            anchor
        } else {
            add_months(anchor, months, tz)?
        };
        let days = self.weeks.checked_mul(DAYS_PER_WEEK)?.checked_add(self.days)?;
        let seconds = [
            (days, SECONDS_PER_DAY),
            (self.hours, SECONDS_PER_HOUR),
            (self.minutes, SECONDS_PER_MINUTE),
            (self.seconds, 1),
        ]
        .iter()
        .try_fold(0u64, |total, (count, unit)| {
            total.checked_add(count.checked_mul(*unit)?)
        })?;
        cursor.checked_add_signed(TimeDelta::try_seconds(i64::try_from(seconds).ok()?)?)
    }
}

/// The state of a countdown at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Countdown {
    /// No usable target was supplied.
    Unknown,
    /// The target is at or before "now".
    Past,
    /// The target lies ahead.
    Remaining(Breakdown),
}

impl Countdown {
    pub fn is_past(&self) -> bool {
        matches!(self, Countdown::Past)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Countdown::Unknown)
    }

    pub fn breakdown(&self) -> Option<&Breakdown> {
        match self {
            Countdown::Remaining(breakdown) => Some(breakdown),
            Countdown::Unknown | Countdown::Past => None,
        }
    }

    /// The flat all-zero-plus-flag encoding existing front-end callers expect.
    pub fn to_legacy(&self) -> LegacyBreakdown {
        match self {
            Countdown::Unknown => LegacyBreakdown::from_parts(Breakdown::default(), false),
            Countdown::Past => LegacyBreakdown::from_parts(Breakdown::default(), true),
            Countdown::Remaining(breakdown) => LegacyBreakdown::from_parts(*breakdown, false),
        }
    }
}

/// Wire shape of a countdown for presentation clients.
///
/// All zero with `isPast: false` means unknown; all zero with `isPast: true`
/// means the target has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyBreakdown {
    pub years: u64,
    pub months: u64,
    pub weeks: u64,
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
    pub is_past: bool,
}

impl LegacyBreakdown {
    fn from_parts(breakdown: Breakdown, is_past: bool) -> Self {
        Self {
            years: breakdown.years,
            months: breakdown.months,
            weeks: breakdown.weeks,
            days: breakdown.days,
            hours: breakdown.hours,
            minutes: breakdown.minutes,
            seconds: breakdown.seconds,
            is_past,
        }
    }
}

/// Computes the countdown from `now` to `target`.
///
/// Instants are compared at millisecond precision. Calendar stepping happens
/// on the wall clock of `tz`.
pub fn countdown(now: DateTime<Utc>, target: Option<DateTime<Utc>>, tz: Tz) -> Countdown {
    let Some(target) = target else {
        return Countdown::Unknown;
    };
    if target.timestamp_millis() <= now.timestamp_millis() {
        return Countdown::Past;
    }

    let years = count_steps(|step| add_months(now, step.checked_mul(MONTHS_PER_YEAR)?, tz), target);
    let year_months = years * MONTHS_PER_YEAR;
    let months = count_steps(|step| add_months(now, year_months.checked_add(step)?, tz), target);

    let elapsed_months = year_months + months;
    let cursor = if elapsed_months == 0 {
        now
    } else {
        // count_steps only succeeds on representable instants.
        add_months(now, elapsed_months, tz).unwrap_or(now)
    };

    let gap_ms = (target.timestamp_millis() - cursor.timestamp_millis()).max(0) as u64;
    let mut whole_seconds = gap_ms / MILLIS_PER_SECOND;
    if elapsed_months == 0 && whole_seconds == 0 {
        // A future target always keeps one positive unit.
        whole_seconds = 1;
    }
    let (weeks, days, hours, minutes, seconds) = split_seconds(whole_seconds);
    Countdown::Remaining(Breakdown {
        years,
        months,
        weeks,
        days,
        hours,
        minutes,
        seconds,
    })
}

/// Parses `target` and computes the countdown; unparsable input is `Unknown`.
pub fn countdown_str(now: DateTime<Utc>, target: Option<&str>, tz: Tz) -> Countdown {
    countdown(now, parse_target(target, tz), tz)
}

/// Counts how many consecutive steps `1, 2, ...` land at or before `target`.
fn count_steps(advance: impl Fn(u64) -> Option<DateTime<Utc>>, target: DateTime<Utc>) -> u64 {
    let mut steps = 0;
    while let Some(next) = advance(steps + 1) {
        if next > target {
            break;
        }
        steps += 1;
    }
    steps
}

fn split_seconds(total_seconds: u64) -> (u64, u64, u64, u64, u64) {
    let seconds = total_seconds % SECONDS_PER_MINUTE;
    let total_minutes = total_seconds / SECONDS_PER_MINUTE;
    let minutes = total_minutes % MINUTES_PER_HOUR;
    let total_hours = total_minutes / MINUTES_PER_HOUR;
    let hours = total_hours % HOURS_PER_DAY;
    let total_days = total_hours / HOURS_PER_DAY;
    (
        total_days / DAYS_PER_WEEK,
        total_days % DAYS_PER_WEEK,
        hours,
        minutes,
        seconds,
    )
}

/// Adds `months` calendar months to `anchor` on the wall clock of `tz`.
///
/// The day of month is kept, clamped to the destination month's length. An
/// anchor on the last day of its month lands on the last day of the
/// destination month. Always measured from `anchor`, never chained.
pub fn add_months(anchor: DateTime<Utc>, months: u64, tz: Tz) -> Option<DateTime<Utc>> {
    let local = anchor.with_timezone(&tz).naive_local();
    let date = local.date();

    let absolute = i64::from(date.year()) * 12 + i64::from(date.month0());
    let shifted = absolute.checked_add(i64::try_from(months).ok()?)?;
    let year = i32::try_from(shifted.div_euclid(12)).ok()?;
    let month = u32::try_from(shifted.rem_euclid(12)).ok()? + 1;

    let destination_len = days_in_month(year, month)?;
    let day = if date.day() == days_in_month(date.year(), date.month())? {
        destination_len
    } else {
        date.day().min(destination_len)
    };

    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_time(local.time());
    resolve_local(naive, tz)
}

fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let (next_year, next_month) = if month == 12 {
        (year.checked_add(1)?, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?
        .pred_opt()
        .map(|last| last.day())
}
