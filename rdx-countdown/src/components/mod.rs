//! Contains the building blocks that tie countdowns to the clock.
//!
//! The `CountdownEngine` owns a collection of watchers, one per displayed
//! event, and feeds each of them every tick.

pub mod watcher;
