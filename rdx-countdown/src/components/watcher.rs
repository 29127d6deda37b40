//! Watchers that recompute one event's countdown on every tick.

use crate::common::WatcherId;
use crate::countdown::{countdown, Countdown};
use crate::display::{countdown_window, largest_unit_label, UnitSlot};
use crate::time::{parse_target, TickEvent};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// One event's countdown, label, and unit window for a single tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountdownSnapshot {
    pub watcher_id: WatcherId,
    pub name: String,
    pub now: DateTime<Utc>,
    pub tick_count: u64,
    pub countdown: Countdown,
    pub label: String,
    pub window: Option<Vec<UnitSlot>>,
}

/// What a watcher produced for one tick.
#[derive(Debug, Clone)]
pub(crate) struct TickOutcome {
    pub snapshot: CountdownSnapshot,
    /// True only on the tick the target was first seen as past.
    pub just_started: bool,
}

/// Tracks a single event's target.
#[derive(Debug, Clone)]
pub(crate) struct CountdownWatcher {
    pub name: String,
    pub raw_target: Option<String>,
    pub target: Option<DateTime<Utc>>,
    was_remaining: bool,
}

impl CountdownWatcher {
    /// Creates a watcher, parsing the target once up front.
    pub(crate) fn new(name: String, raw_target: Option<String>, tz: Tz) -> Self {
        let target = parse_target(raw_target.as_deref(), tz);
        Self {
            name,
            raw_target,
            target,
            was_remaining: false,
        }
    }

    /// Computes the snapshot at `tick` without touching any state.
    pub(crate) fn snapshot(&self, id: WatcherId, tick: &TickEvent, tz: Tz) -> CountdownSnapshot {
        let countdown = countdown(tick.now, self.target, tz);
        CountdownSnapshot {
            watcher_id: id,
            name: self.name.clone(),
            now: tick.now,
            tick_count: tick.tick_count,
            label: largest_unit_label(&countdown),
            window: countdown_window(&countdown),
            countdown,
        }
    }

    /// Processes a tick, noting the transition from remaining to past.
    ///
    /// Targets that were already past when the watcher first saw them are
    /// never reported as just started.
    pub(crate) fn process_tick(&mut self, id: WatcherId, tick: &TickEvent, tz: Tz) -> TickOutcome {
        let snapshot = self.snapshot(id, tick, tz);
        let just_started = match snapshot.countdown {
            Countdown::Remaining(_) => {
                self.was_remaining = true;
                false
            }
            Countdown::Past => std::mem::take(&mut self.was_remaining),
            Countdown::Unknown => false,
        };
        TickOutcome {
            snapshot,
            just_started,
        }
    }
}
