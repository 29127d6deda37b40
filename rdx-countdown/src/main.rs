use anyhow::Result;
use chrono::{SecondsFormat, TimeDelta, Utc};
use colored::Colorize;
use countdown::display::UnitSlot;
use countdown::prelude::*;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    // 2. Load configuration from an optional TOML path plus COUNTDOWN_* variables.
    let path = std::env::args().nth(1).map(PathBuf::from);
    let config = CountdownConfig::load(path.as_deref())?;

    // 3. Create the engine and listen to its streams.
    let engine = CountdownEngine::new(config);
    spawn_event_listeners(&engine);

    // 4. Register the configured events, or a demo set when there are none.
    if engine.register_configured_events().await.is_empty() {
        register_demo_events(&engine).await;
    }

    // 5. Run until Ctrl+C.
    engine.run().await
}

/// Spawns one task per engine stream.
fn spawn_event_listeners(engine: &CountdownEngine) {
    let mut system_rx = engine.subscribe_system_events();
    tokio::spawn(async move {
        while let Ok(event) = system_rx.recv().await {
            info!("[SYSTEM] => {:?}", event);
        }
    });

    let mut countdown_rx = engine.subscribe_countdown_events();
    tokio::spawn(async move {
        while let Ok(event) = countdown_rx.recv().await {
            match event {
                CountdownEvent::Updated(snapshot) => info!(
                    "[COUNTDOWN] => {:<16} {:<12} {}",
                    snapshot.name,
                    snapshot.label.cyan().bold(),
                    render_window(snapshot.window.as_deref()).dimmed()
                ),
                CountdownEvent::Started { name, at, .. } => {
                    info!("[STARTED] => {} at {}", name.green().bold(), at)
                }
            }
        }
    });
}

fn render_window(window: Option<&[UnitSlot]>) -> String {
    match window {
        Some(slots) => slots
            .iter()
            .map(|slot| format!("{} {}", slot.value, slot.unit_label))
            .collect::<Vec<_>>()
            .join(" | "),
        None => String::new(),
    }
}

/// Registers a few events relative to now so every display state shows up.
async fn register_demo_events(engine: &CountdownEngine) {
    let now = Utc::now();
    let at = |offset: TimeDelta| (now + offset).to_rfc3339_opts(SecondsFormat::Secs, true);

    engine
        .watch_event("Club Fair", Some(at(TimeDelta::seconds(15)).as_str()))
        .await;
    engine
        .watch_event("Hackathon", Some(at(TimeDelta::days(10) + TimeDelta::hours(3)).as_str()))
        .await;
    engine
        .watch_event("Commencement", Some(at(TimeDelta::days(400)).as_str()))
        .await;
    engine.watch_event("Alumni Gala", Some("TBA")).await;
}
