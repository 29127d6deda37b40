//! The engine that drives every registered countdown from the shared clock.

use crate::clock::SharedClock;
use crate::common::WatcherId;
use crate::components::watcher::{CountdownSnapshot, CountdownWatcher};
use crate::config::CountdownConfig;
use crate::events::{CountdownEvent, SystemEvent};
use crate::time::{SystemTimeSource, TickEvent, TimeSource};
use anyhow::{anyhow, Context};
use slotmap::SlotMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, trace};

/// The main countdown engine.
///
/// It holds the configuration, the shared clock, and every registered
/// watcher. The engine is cheap to clone; all clones drive the same state.
#[derive(Clone)]
pub struct CountdownEngine {
    config: Arc<CountdownConfig>,
    clock: SharedClock,
    system_event_sender: broadcast::Sender<SystemEvent>,
    countdown_event_sender: broadcast::Sender<CountdownEvent>,
    watchers: Arc<RwLock<SlotMap<WatcherId, CountdownWatcher>>>,
}

// Core implementation block for internal logic.
impl CountdownEngine {
    /// Creates a new engine on the host's wall clock.
    pub fn new(config: CountdownConfig) -> Self {
        Self::with_time_source(config, Arc::new(SystemTimeSource))
    }

    /// Creates a new engine reading time from `source`.
    pub fn with_time_source(config: CountdownConfig, source: Arc<dyn TimeSource>) -> Self {
        const SYSTEM_CHANNEL_CAPACITY: usize = 64;
        const COUNTDOWN_CHANNEL_CAPACITY: usize = 256;
        let (system_event_sender, _) = broadcast::channel(SYSTEM_CHANNEL_CAPACITY);
        let (countdown_event_sender, _) = broadcast::channel(COUNTDOWN_CHANNEL_CAPACITY);
        let clock = SharedClock::new(config.tick_interval(), source);

        Self {
            config: Arc::new(config),
            clock,
            system_event_sender,
            countdown_event_sender,
            watchers: Arc::new(RwLock::new(SlotMap::with_key())),
        }
    }

    /// Runs until a Ctrl+C signal is received.
    pub async fn run(&self) -> anyhow::Result<()> {
        info!("Press Ctrl+C to shut down.");
        self.run_until(async {
            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for the shutdown signal")
        })
        .await
    }

    /// Runs until `shutdown` resolves, then releases the clock.
    ///
    /// Every tick recomputes every watcher's countdown from scratch. The
    /// result of `shutdown` is returned once the loop has exited.
    pub async fn run_until<F>(&self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = anyhow::Result<()>>,
    {
        info!(
            "CountdownEngine starting up ({:?} ticks, {}).",
            self.clock.interval(),
            self.config.timezone
        );
        let mut subscription = self.clock.subscribe();
        self.system_event_sender
            .send(SystemEvent::EngineStarted {
                at: subscription.now(),
            })
            .ok();
        self.dispatch_tick(&subscription.current()).await;

        tokio::pin!(shutdown);
        let result = loop {
            tokio::select! {
                biased;
                result = &mut shutdown => break result,
                tick = subscription.changed() => match tick {
                    Some(tick) => self.dispatch_tick(&tick).await,
                    None => break Err(anyhow!("the shared clock went away")),
                },
            }
        };

        drop(subscription);
        self.system_event_sender
            .send(SystemEvent::EngineShutdown)
            .ok();
        info!("CountdownEngine has shut down.");
        result
    }

    async fn dispatch_tick(&self, tick: &TickEvent) {
        trace!("Tick #{} received.", tick.tick_count);
        let tz = self.config.timezone;
        let mut watchers = self.watchers.write().await;
        for (id, watcher) in watchers.iter_mut() {
            let outcome = watcher.process_tick(id, tick, tz);
            if outcome.just_started {
                info!("'{}' has started.", watcher.name);
                self.countdown_event_sender
                    .send(CountdownEvent::Started {
                        id,
                        name: watcher.name.clone(),
                        at: tick.now,
                    })
                    .ok();
            }
            self.countdown_event_sender
                .send(CountdownEvent::Updated(outcome.snapshot))
                .ok();
        }
    }
}

// Public API implementation block.
impl CountdownEngine {
    pub fn config(&self) -> &CountdownConfig {
        &self.config
    }

    /// The clock this engine ticks from. Other consumers may subscribe to it.
    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    /// Registers an event whose countdown is recomputed on every tick.
    ///
    /// `target` is kept as given; missing or unparsable values show as "N/A".
    pub async fn watch_event(&self, name: impl Into<String>, target: Option<&str>) -> WatcherId {
        let name = name.into();
        let watcher = CountdownWatcher::new(
            name.clone(),
            target.map(str::to_string),
            self.config.timezone,
        );
        if watcher.target.is_none() {
            debug!("'{}' has no usable start time ({:?}).", name, target);
        }
        let id = self.watchers.write().await.insert(watcher);
        self.system_event_sender
            .send(SystemEvent::WatcherAdded { id })
            .ok();
        id
    }

    /// Registers every event listed in the configuration.
    pub async fn register_configured_events(&self) -> Vec<WatcherId> {
        let mut ids = Vec::with_capacity(self.config.events.len());
        for event in &self.config.events {
            ids.push(
                self.watch_event(event.name.clone(), event.starts_at.as_deref())
                    .await,
            );
        }
        ids
    }

    /// Removes a watcher. Returns `true` if it was found and removed.
    pub async fn remove_watcher(&self, id: WatcherId) -> bool {
        let was_removed = self.watchers.write().await.remove(id).is_some();
        if was_removed {
            self.system_event_sender
                .send(SystemEvent::WatcherRemoved { id })
                .ok();
        }
        was_removed
    }

    /// Every registered watcher's id and name, in insertion order.
    pub async fn watchers(&self) -> Vec<(WatcherId, String)> {
        self.watchers
            .read()
            .await
            .iter()
            .map(|(id, watcher)| (id, watcher.name.clone()))
            .collect()
    }

    /// One watcher's countdown at the clock's current time.
    pub async fn snapshot(&self, id: WatcherId) -> Option<CountdownSnapshot> {
        let tick = self.current_tick();
        let watchers = self.watchers.read().await;
        watchers
            .get(id)
            .map(|watcher| watcher.snapshot(id, &tick, self.config.timezone))
    }

    /// Every watcher's countdown at the clock's current time.
    pub async fn snapshots(&self) -> Vec<CountdownSnapshot> {
        let tick = self.current_tick();
        self.watchers
            .read()
            .await
            .iter()
            .map(|(id, watcher)| watcher.snapshot(id, &tick, self.config.timezone))
            .collect()
    }

    fn current_tick(&self) -> TickEvent {
        self.clock.current_tick()
    }

    /// Subscribes to the `SystemEvent` stream.
    pub fn subscribe_system_events(&self) -> broadcast::Receiver<SystemEvent> {
        self.system_event_sender.subscribe()
    }

    /// Subscribes to the `CountdownEvent` stream.
    pub fn subscribe_countdown_events(&self) -> broadcast::Receiver<CountdownEvent> {
        self.countdown_event_sender.subscribe()
    }
}
