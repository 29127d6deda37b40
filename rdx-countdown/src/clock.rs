//! The shared clock: one timer, many readers.
//!
//! A [`SharedClock`] is handed to every consumer that needs the current time.
//! The timer only runs while at least one [`ClockSubscription`] is alive; the
//! first subscription starts it and dropping the last one releases it.

use crate::common::SubscriberId;
use crate::config::CountdownConfig;
use crate::time::{monotonic_now, SystemClock, SystemTimeSource, TickEvent, TimeSource};
use chrono::{DateTime, Utc};
use slotmap::SlotMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

struct ClockState {
    subscribers: SlotMap<SubscriberId, ()>,
    sender: watch::Sender<TickEvent>,
    timer: Option<RunningTimer>,
}

struct RunningTimer {
    shutdown_tx: broadcast::Sender<()>,
    stopped: Arc<AtomicBool>,
}

/// A cloneable handle to the process-wide tick source.
#[derive(Clone)]
pub struct SharedClock {
    interval: Duration,
    source: Arc<dyn TimeSource>,
    state: Arc<Mutex<ClockState>>,
}

impl SharedClock {
    /// Creates an idle clock. Nothing ticks until the first `subscribe`.
    pub fn new(interval: Duration, source: Arc<dyn TimeSource>) -> Self {
        let (sender, _) = watch::channel(TickEvent {
            tick_count: 0,
            now: source.now(),
        });
        Self {
            interval,
            source,
            state: Arc::new(Mutex::new(ClockState {
                subscribers: SlotMap::with_key(),
                sender,
                timer: None,
            })),
        }
    }

    /// Creates a clock on the host's wall clock at the configured cadence.
    pub fn from_config(config: &CountdownConfig) -> Self {
        Self::new(config.tick_interval(), Arc::new(SystemTimeSource))
    }

    fn lock(&self) -> MutexGuard<'_, ClockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a consumer, starting the timer if it is idle.
    ///
    /// The returned subscription already holds the current time. Must be
    /// called from within a Tokio runtime.
    pub fn subscribe(&self) -> ClockSubscription {
        let mut state = self.lock();
        if state.timer.is_none() {
            let last = state.sender.borrow().now;
            let now = monotonic_now(self.source.as_ref(), last);
            state.sender.send_replace(TickEvent { tick_count: 0, now });

            let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
            let stopped = Arc::new(AtomicBool::new(false));
            let clock = SystemClock::new(
                self.interval,
                self.source.clone(),
                state.sender.clone(),
                stopped.clone(),
            );
            tokio::spawn(async move { clock.run(shutdown_rx).await });
            state.timer = Some(RunningTimer {
                shutdown_tx,
                stopped,
            });
            info!("Clock timer started ({:?} interval).", self.interval);
        }

        let id = state.subscribers.insert(());
        let rx = state.sender.subscribe();
        debug!(
            "Clock subscriber {:?} attached ({} active).",
            id,
            state.subscribers.len()
        );
        ClockSubscription {
            id,
            rx,
            clock: self.clone(),
        }
    }

    fn release(&self, id: SubscriberId) {
        let mut state = self.lock();
        if state.subscribers.remove(id).is_none() {
            return;
        }
        debug!(
            "Clock subscriber {:?} detached ({} active).",
            id,
            state.subscribers.len()
        );
        if state.subscribers.is_empty() {
            if let Some(timer) = state.timer.take() {
                timer.stopped.store(true, Ordering::Release);
                timer.shutdown_tx.send(()).ok();
                info!("Last clock subscriber left; timer released.");
            }
        }
    }

    /// Number of live subscriptions.
    pub fn active_subscribers(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Whether the timer task is currently owned by this clock.
    pub fn is_running(&self) -> bool {
        self.lock().timer.is_some()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The most recently published tick.
    pub fn latest(&self) -> TickEvent {
        *self.lock().sender.borrow()
    }

    /// The current time: the latest tick while running, the time source otherwise.
    pub fn now(&self) -> DateTime<Utc> {
        self.current_tick().now
    }

    /// The latest tick while running. When idle, the last tick count paired
    /// with a fresh reading of the time source. Both come from one lock.
    pub fn current_tick(&self) -> TickEvent {
        let state = self.lock();
        let last = *state.sender.borrow();
        if state.timer.is_some() {
            last
        } else {
            TickEvent {
                tick_count: last.tick_count,
                now: monotonic_now(self.source.as_ref(), last.now),
            }
        }
    }
}

/// A live consumer of a [`SharedClock`]. Dropping it detaches the consumer.
pub struct ClockSubscription {
    id: SubscriberId,
    rx: watch::Receiver<TickEvent>,
    clock: SharedClock,
}

impl ClockSubscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// The tick this subscription last observed.
    pub fn current(&self) -> TickEvent {
        *self.rx.borrow()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.rx.borrow().now
    }

    /// Waits for the next tick. Returns `None` if the clock has gone away.
    pub async fn changed(&mut self) -> Option<TickEvent> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }
}

impl Drop for ClockSubscription {
    fn drop(&mut self) {
        self.clock.release(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ManualTimeSource;
    use chrono::TimeZone;

    fn manual_clock() -> (SharedClock, ManualTimeSource) {
        let source = ManualTimeSource::new(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        let clock = SharedClock::new(Duration::from_secs(1), Arc::new(source.clone()));
        (clock, source)
    }

    #[tokio::test(start_paused = true)]
    async fn subscription_sees_current_time_immediately() {
        let (clock, source) = manual_clock();
        source.set(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 42).unwrap());
        let sub = clock.subscribe();
        assert_eq!(sub.current().tick_count, 0);
        assert_eq!(sub.now(), Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 42).unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn timer_runs_only_while_subscribed() {
        let (clock, _source) = manual_clock();
        assert!(!clock.is_running());

        let first = clock.subscribe();
        let second = clock.subscribe();
        assert!(clock.is_running());
        assert_eq!(clock.active_subscribers(), 2);

        drop(first);
        assert!(clock.is_running());
        drop(second);
        assert!(!clock.is_running());
        assert_eq!(clock.active_subscribers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reactivation_starts_a_fresh_timer() {
        let (clock, _source) = manual_clock();
        let mut sub = clock.subscribe();
        sub.changed().await.unwrap();
        let tick = sub.changed().await.unwrap();
        assert_eq!(tick.tick_count, 2);
        drop(sub);

        let sub = clock.subscribe();
        assert_eq!(sub.current().tick_count, 0);
    }

    #[test]
    fn from_config_uses_configured_cadence() {
        let config = CountdownConfig {
            tick_interval_ms: 250,
            ..Default::default()
        };
        let clock = SharedClock::from_config(&config);
        assert_eq!(clock.interval(), Duration::from_millis(250));
        assert!(!clock.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn reactivation_never_moves_now_backwards() {
        let (clock, source) = manual_clock();
        source.set(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 30).unwrap());
        let published = clock.subscribe().now();
        assert_eq!(published, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 30).unwrap());

        source.set(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 10).unwrap());
        assert_eq!(clock.now(), published);
        let sub = clock.subscribe();
        assert_eq!(sub.now(), published);
        assert_eq!(sub.current().tick_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn running_tick_is_read_as_one_pair() {
        let (clock, source) = manual_clock();
        let mut sub = clock.subscribe();
        source.advance(chrono::TimeDelta::seconds(1));
        let tick = sub.changed().await.unwrap();
        source.advance(chrono::TimeDelta::seconds(5));
        assert_eq!(clock.current_tick(), tick);
        assert_eq!(clock.latest(), tick);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_clock_now_reads_the_source() {
        let (clock, source) = manual_clock();
        source.set(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap());
        assert_eq!(clock.now(), Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap());
    }
}
