//! Display selectors: turn a [`Countdown`] into what a listing shows.
//!
//! Two policies exist. [`largest_unit_label`] produces one compact label for
//! event cards; [`unit_window`] picks four adjacent units for the boxed
//! countdown on an event's detail page.

use crate::common::CountUnit;
use crate::countdown::{Breakdown, Countdown};
use serde::Serialize;
use tracing::debug;

/// Number of unit boxes in the multi-unit display.
pub const WINDOW_WIDTH: usize = 4;

pub const UNKNOWN_LABEL: &str = "N/A";
pub const STARTED_LABEL: &str = "Started";

/// One box of the multi-unit display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitSlot {
    #[serde(skip)]
    pub unit: CountUnit,
    pub unit_label: &'static str,
    pub value: u64,
}

impl UnitSlot {
    fn new(unit: CountUnit, value: u64) -> Self {
        Self {
            unit,
            unit_label: unit.name(value),
            value,
        }
    }
}

/// The largest non-zero unit, e.g. `"3 Days"` or `"1 Hour"`.
pub fn largest_unit_label(countdown: &Countdown) -> String {
    match countdown {
        Countdown::Unknown => UNKNOWN_LABEL.to_string(),
        Countdown::Past => STARTED_LABEL.to_string(),
        Countdown::Remaining(breakdown) => {
            match breakdown.values().into_iter().find(|(_, value)| *value > 0) {
                Some((unit, value)) => format!("{} {}", value, unit.name(value)),
                None => {
                    debug!("Remaining countdown has no positive unit; labelling it as started.");
                    STARTED_LABEL.to_string()
                }
            }
        }
    }
}

/// Up to [`WINDOW_WIDTH`] adjacent units, largest first.
///
/// The window starts at the topmost non-zero unit and runs toward seconds.
/// When that leaves fewer than four units, larger (zero) units are prepended.
/// An all-zero breakdown yields the last four units.
pub fn unit_window(breakdown: &Breakdown) -> Vec<UnitSlot> {
    let values = breakdown.values();
    let last = values.len() - 1;
    let all_upper_zero = |index: usize| values[..index].iter().all(|(_, value)| *value == 0);

    let start = (0..values.len())
        .find(|&index| all_upper_zero(index) && values[index].1 > 0)
        .or_else(|| (0..values.len()).rev().find(|&index| all_upper_zero(index)))
        .unwrap_or(last);

    let end = (start + WINDOW_WIDTH - 1).min(last);
    let mut first = start;
    while end - first + 1 < WINDOW_WIDTH && first > 0 {
        first -= 1;
    }

    values[first..=end]
        .iter()
        .map(|(unit, value)| UnitSlot::new(*unit, *value))
        .collect()
}

/// The unit window for a running countdown.
///
/// `None` for unknown and past countdowns, which show [`largest_unit_label`]
/// instead of boxes.
pub fn countdown_window(countdown: &Countdown) -> Option<Vec<UnitSlot>> {
    countdown.breakdown().map(unit_window)
}
