//! Instants, target parsing, and the ticking task behind the shared clock.
//!
//! Instants are `chrono::DateTime<Utc>`. Event start times arrive as text and
//! are parsed with [`parse_target`]; anything that does not parse is simply
//! `None`, which the countdown engine reports as unknown.

use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::MissedTickBehavior;
use tracing::{trace, warn};

/// Offset-less date-time layouts, read as wall-clock time in the configured zone.
const LOCAL_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// ISO-8601 layouts with an explicit offset that RFC 3339 parsing rejects.
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M%:z", "%Y-%m-%dT%H:%M:%S%.f%z"];

/// Upper bound on how far a wall-clock time inside a DST gap is pushed forward.
const GAP_SEARCH_MINUTES: i64 = 24 * 60;

/// Parses an event start time.
///
/// `None`, blank strings, and anything unparsable all yield `None`. Strings
/// without an offset are interpreted in `tz`; a bare date is midnight UTC.
pub fn parse_target(input: Option<&str>, tz: Tz) -> Option<DateTime<Utc>> {
    let raw = input?.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in OFFSET_FORMATS {
        if let Ok(parsed) = DateTime::parse_from_str(raw, format) {
            return Some(parsed.with_timezone(&Utc));
        }
    }
    for format in LOCAL_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return resolve_local(naive, tz);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
}

/// Maps a wall-clock time in `tz` to an instant.
///
/// Ambiguous times (DST fold) resolve to the earlier instant. Times inside a
/// DST gap resolve to the first representable minute after it.
pub fn resolve_local(naive: NaiveDateTime, tz: Tz) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(local) => Some(local.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => (1..=GAP_SEARCH_MINUTES)
            .find_map(|minutes| {
                let shifted = naive.checked_add_signed(TimeDelta::try_minutes(minutes)?)?;
                tz.from_local_datetime(&shifted).earliest()
            })
            .map(|local| local.with_timezone(&Utc)),
    }
}

/// A source of the current instant.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Reads the host's wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A hand-driven time source, for demos and deterministic tests.
#[derive(Debug, Clone)]
pub struct ManualTimeSource {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualTimeSource {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One beat of the shared clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickEvent {
    /// Ticks since the current timer was activated. Activation itself is tick 0.
    pub tick_count: u64,
    /// The instant every consumer observes for this tick.
    pub now: DateTime<Utc>,
}

/// The single repeating timer that drives the shared clock.
///
/// It publishes into a `watch` channel, so every reader sees the same
/// `TickEvent` for a given tick. Once `stopped` is set the task never
/// publishes again, even if a newer timer already owns the channel.
pub(crate) struct SystemClock {
    interval: Duration,
    source: Arc<dyn TimeSource>,
    sender: watch::Sender<TickEvent>,
    stopped: Arc<AtomicBool>,
}

impl SystemClock {
    pub(crate) fn new(
        interval: Duration,
        source: Arc<dyn TimeSource>,
        sender: watch::Sender<TickEvent>,
        stopped: Arc<AtomicBool>,
    ) -> Self {
        Self {
            interval,
            source,
            sender,
            stopped,
        }
    }

    /// Ticks until the shutdown channel fires or closes.
    ///
    /// The caller publishes tick 0 on activation, so the interval's immediate
    /// first tick is swallowed here.
    pub(crate) async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;

        let mut tick_count = self.sender.borrow().tick_count;
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                _ = ticker.tick() => {
                    tick_count += 1;
                    let now = monotonic_now(self.source.as_ref(), self.sender.borrow().now);
                    // Checked under the channel's write lock, so a stale timer
                    // cannot overwrite a fresh one's ticks.
                    let published = self.sender.send_if_modified(|tick| {
                        if self.stopped.load(Ordering::Acquire) {
                            return false;
                        }
                        *tick = TickEvent { tick_count, now };
                        true
                    });
                    if !published {
                        break;
                    }
                    trace!("Tick #{} at {}.", tick_count, now);
                }
            }
        }
        trace!("Clock task stopped after {} ticks.", tick_count);
    }
}

/// Reads `source`, refusing to go backwards past `last`.
pub(crate) fn monotonic_now(source: &dyn TimeSource, last: DateTime<Utc>) -> DateTime<Utc> {
    let now = source.now();
    if now < last {
        warn!(
            "Host clock went backwards ({} < {}); holding the last published time.",
            now, last
        );
        last
    } else {
        now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn blank_and_missing_targets_are_rejected() {
        assert_eq!(parse_target(None, Tz::UTC), None);
        assert_eq!(parse_target(Some(""), Tz::UTC), None);
        assert_eq!(parse_target(Some("   "), Tz::UTC), None);
        assert_eq!(parse_target(Some("not-a-date"), Tz::UTC), None);
        assert_eq!(parse_target(Some("2025-13-40T99:00:00Z"), Tz::UTC), None);
    }

    #[test]
    fn offsets_are_honoured() {
        assert_eq!(
            parse_target(Some("2025-03-20T10:00:00+02:00"), Tz::UTC),
            Some(utc("2025-03-20T08:00:00Z"))
        );
        assert_eq!(
            parse_target(Some("2025-03-20T10:00+02:00"), Tz::UTC),
            Some(utc("2025-03-20T08:00:00Z"))
        );
        assert_eq!(
            parse_target(Some("2025-03-20T10:00:00.250Z"), Tz::UTC).map(|t| t.timestamp_millis()),
            Some(utc("2025-03-20T10:00:00Z").timestamp_millis() + 250)
        );
    }

    #[test]
    fn offsetless_times_use_the_configured_zone() {
        let tz: Tz = "America/New_York".parse().unwrap();
        assert_eq!(
            parse_target(Some("2025-03-20T10:00"), tz),
            Some(utc("2025-03-20T14:00:00Z"))
        );
        assert_eq!(
            parse_target(Some("2025-01-20 10:00:00"), tz),
            Some(utc("2025-01-20T15:00:00Z"))
        );
    }

    #[test]
    fn bare_dates_are_midnight_utc() {
        let tz: Tz = "Asia/Tokyo".parse().unwrap();
        assert_eq!(
            parse_target(Some("2025-03-20"), tz),
            Some(utc("2025-03-20T00:00:00Z"))
        );
    }

    #[test]
    fn dst_gap_resolves_forward() {
        let tz: Tz = "America/New_York".parse().unwrap();
        // 02:30 does not exist on 2025-03-09; clocks jump from 02:00 to 03:00 EDT.
        assert_eq!(
            parse_target(Some("2025-03-09T02:30"), tz),
            Some(utc("2025-03-09T07:00:00Z"))
        );
    }

    #[test]
    fn dst_fold_resolves_to_earlier_instant() {
        let tz: Tz = "America/New_York".parse().unwrap();
        assert_eq!(
            parse_target(Some("2025-11-02T01:30"), tz),
            Some(utc("2025-11-02T05:30:00Z"))
        );
    }

    #[test]
    fn monotonic_now_holds_on_regression() {
        let source = ManualTimeSource::new(utc("2025-01-01T00:00:00Z"));
        let later = utc("2025-01-01T00:00:05Z");
        assert_eq!(monotonic_now(&source, later), later);
        source.set(utc("2025-01-01T00:00:09Z"));
        assert_eq!(monotonic_now(&source, later), utc("2025-01-01T00:00:09Z"));
    }
}
