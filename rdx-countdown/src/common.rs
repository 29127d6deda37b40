//! Contains common, primitive types used throughout the countdown engine.
//!
//! This module defines the ID types used to identify watchers and clock
//! subscribers, plus the fixed set of display units a countdown is broken
//! down into.

use serde::Serialize;
use slotmap::new_key_type;

new_key_type! {
    /// Uniquely and safely identifies a registered countdown watcher.
    ///
    /// Returned when an event is added to the `CountdownEngine`. Keys are
    /// never reused, so a stale handle cannot address a newer watcher.
    pub struct WatcherId;

    /// Identifies one active consumer of the `SharedClock`.
    pub struct SubscriberId;
}

/// A display unit of a countdown, in descending order of significance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CountUnit {
    Year,
    Month,
    Week,
    Day,
    Hour,
    Minute,
    Second,
}

impl CountUnit {
    /// All units, largest first. The position in this array is the unit's index.
    pub const ALL: [CountUnit; 7] = [
        CountUnit::Year,
        CountUnit::Month,
        CountUnit::Week,
        CountUnit::Day,
        CountUnit::Hour,
        CountUnit::Minute,
        CountUnit::Second,
    ];

    /// The unit's position in [`CountUnit::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// The singular display name.
    pub fn singular(self) -> &'static str {
        match self {
            CountUnit::Year => "Year",
            CountUnit::Month => "Month",
            CountUnit::Week => "Week",
            CountUnit::Day => "Day",
            CountUnit::Hour => "Hour",
            CountUnit::Minute => "Minute",
            CountUnit::Second => "Second",
        }
    }

    /// The plural display name.
    pub fn plural(self) -> &'static str {
        match self {
            CountUnit::Year => "Years",
            CountUnit::Month => "Months",
            CountUnit::Week => "Weeks",
            CountUnit::Day => "Days",
            CountUnit::Hour => "Hours",
            CountUnit::Minute => "Minutes",
            CountUnit::Second => "Seconds",
        }
    }

    /// The display name for `value`; singular only when `value == 1`.
    pub fn name(self, value: u64) -> &'static str {
        if value == 1 {
            self.singular()
        } else {
            self.plural()
        }
    }
}
