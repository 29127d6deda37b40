//! Defines all public event types broadcast by the countdown engine.
//!
//! Listeners subscribe to these strongly-typed streams instead of polling
//! the engine.

use crate::common::WatcherId;
use crate::components::watcher::CountdownSnapshot;
use chrono::{DateTime, Utc};

/// Events related to the lifecycle and state of the engine itself.
#[derive(Debug, Clone)]
pub enum SystemEvent {
    /// Fired once when the engine's run loop begins.
    EngineStarted { at: DateTime<Utc> },
    /// Fired once when the run loop has exited and released the clock.
    EngineShutdown,
    /// Fired when an event is registered with the engine.
    WatcherAdded { id: WatcherId },
    /// Fired when a registered event is removed.
    WatcherRemoved { id: WatcherId },
}

/// Per-tick countdown output.
#[derive(Debug, Clone)]
pub enum CountdownEvent {
    /// A watcher's countdown was recomputed for the current tick.
    Updated(CountdownSnapshot),
    /// A watcher's target was reached during this run.
    Started {
        id: WatcherId,
        name: String,
        at: DateTime<Utc>,
    },
}
