//! # Countdown
//!
//! A shared-clock, calendar-accurate countdown engine for event listings.
//!
//! Events (career fairs, lectures, club meetups) carry an ISO-8601 start
//! time. This crate turns "now" and that start time into the countdown an
//! event page shows, and keeps every countdown on screen in step with a
//! single shared timer.
//!
//! ## Core Concepts
//!
//! - **SharedClock**: one repeating timer, many readers. It starts with the
//!   first subscriber and is released when the last one leaves.
//! - **Countdown Engine**: a pure function that steps whole calendar years and
//!   months toward the target, then splits the rest into weeks, days, hours,
//!   minutes, and seconds.
//! - **Display Selectors**: a single "largest unit" label (`"3 Days"`) and a
//!   four-box window of adjacent units.
//! - **CountdownEngine**: registers events and broadcasts a fresh snapshot of
//!   each one on every tick.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use countdown::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let engine = CountdownEngine::new(CountdownConfig::default());
//!
//!     let mut updates = engine.subscribe_countdown_events();
//!     tokio::spawn(async move {
//!         while let Ok(event) = updates.recv().await {
//!             if let CountdownEvent::Updated(snapshot) = event {
//!                 println!("{}: {}", snapshot.name, snapshot.label);
//!             }
//!         }
//!     });
//!
//!     engine.watch_event("Career Fair", Some("2030-03-20T10:00:00Z")).await;
//!     engine.run().await
//! }
//! ```

pub const ENGINE_NAME: &str = "Countdown Engine";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod clock;
pub mod common;
pub mod components;
pub mod config;
pub mod countdown;
pub mod display;
pub mod engine;
pub mod events;
pub mod time;

/// A prelude module for easy importing of the most common types.
pub mod prelude {
    pub use crate::clock::{ClockSubscription, SharedClock};
    pub use crate::common::{CountUnit, WatcherId};
    pub use crate::components::watcher::CountdownSnapshot;
    pub use crate::config::{CountdownConfig, EventConfig};
    pub use crate::countdown::{countdown, countdown_str, Breakdown, Countdown, LegacyBreakdown};
    pub use crate::display::{countdown_window, largest_unit_label, unit_window, UnitSlot};
    pub use crate::engine::CountdownEngine;
    pub use crate::events::{CountdownEvent, SystemEvent};
    pub use crate::time::{parse_target, TickEvent, TimeSource};
}
