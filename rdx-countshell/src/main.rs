use anyhow::Result;
use chrono::SecondsFormat;
use colored::Colorize;
use countdown::prelude::*;
use countdown::{ENGINE_NAME, VERSION as LIB_VERSION};
use rustyline::highlight::Highlighter;
use rustyline::Editor;
use rustyline_derive::{Completer, Helper, Hinter, Validator};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

const SHELL_VERSION: &str = env!("CARGO_PKG_VERSION");

const BANNER: &str = r"
   ___                  _      _
  / __|___ _  _ _ _  __| |_ __| |_ ___ __ __ ___ _
 | (__/ _ \ || | ' \/ _` | / _` / _ \\ V  V / ' \
  \___\___/\_,_|_||_\__,_|_\__,_\___/ \_/\_/|_||_|
";

/// A custom helper struct for rustyline that enables syntax highlighting.
#[derive(Completer, Helper, Hinter, Validator)]
struct ShellHighlighter;

impl Highlighter for ShellHighlighter {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if let Some((command, rest)) = line.split_once(' ') {
            Cow::Owned(format!("{} {}", command.yellow().bold(), rest.yellow()))
        } else {
            Cow::Owned(line.yellow().bold().to_string())
        }
    }
    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

fn print_banner() {
    if env::var("QUIET_MODE").is_ok() {
        return;
    }
    println!("{}", BANNER.cyan());
    let version_string = format!(
        "          Shell   v{:<8} Library   v{:<8}",
        SHELL_VERSION, LIB_VERSION
    );
    println!("{}", "-".repeat(60).dimmed());
    println!("{}", version_string);
    println!(
        "{}",
        "    Distributed under the MIT OR Apache-2.0 license.".dimmed()
    );
    println!("{}", "-".repeat(60).dimmed());
}

fn render(snapshot: &CountdownSnapshot) -> String {
    let boxes = match &snapshot.window {
        Some(slots) => slots
            .iter()
            .map(|slot| format!("{} {}", slot.value, slot.unit_label))
            .collect::<Vec<_>>()
            .join(" | "),
        None => "-".to_string(),
    };
    format!(
        "{:<20} {:<12} [ {} ]",
        snapshot.name,
        snapshot.label.cyan().bold(),
        boxes
    )
}

/// Spawns listeners for the engine's streams.
///
/// Per-tick updates are printed only while `is_streaming` is set; starts are
/// always announced.
fn spawn_event_listeners(engine: &CountdownEngine, is_streaming: Arc<AtomicBool>) {
    let mut system_rx = engine.subscribe_system_events();
    tokio::spawn(async move {
        while let Ok(event) = system_rx.recv().await {
            info!("[SYSTEM EVENT] {:?}", event);
        }
    });

    let mut countdown_rx = engine.subscribe_countdown_events();
    tokio::spawn(async move {
        while let Ok(event) = countdown_rx.recv().await {
            match event {
                CountdownEvent::Updated(snapshot) => {
                    if is_streaming.load(Ordering::Relaxed) {
                        println!("<-- {}", render(&snapshot));
                    }
                }
                CountdownEvent::Started { name, at, .. } => {
                    println!(
                        "\n<-- [STARTED] {} at {}\n>> ",
                        name.green().bold(),
                        at.to_rfc3339_opts(SecondsFormat::Secs, true)
                    );
                }
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    print_banner();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let config_path = env::args().nth(1).map(PathBuf::from);
    let config = CountdownConfig::load(config_path.as_deref())?;
    let engine = CountdownEngine::new(config);
    let engine_handle = engine.clone();

    let is_streaming = Arc::new(AtomicBool::new(false));
    spawn_event_listeners(&engine_handle, is_streaming.clone());

    // The shell's handle table, numbered in registration order.
    let mut active_watchers: BTreeMap<usize, WatcherId> = BTreeMap::new();
    let mut next_handle: usize = 0;
    for id in engine_handle.register_configured_events().await {
        active_watchers.insert(next_handle, id);
        next_handle += 1;
    }

    info!("Spawning {} in the background...", ENGINE_NAME.cyan());
    tokio::spawn(async move {
        if let Err(e) = engine.run().await {
            eprintln!("\nEngine stopped with an error: {}", e);
        }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut rl = Editor::new()?;
    rl.set_helper(Some(ShellHighlighter));

    println!(
        "{} is running ({}). Type 'help' for commands or 'exit' to quit.",
        ENGINE_NAME.cyan(),
        engine_handle.config().timezone
    );

    loop {
        let prompt = format!("{}", ">> ".cyan().bold());
        match rl.readline(&prompt) {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                let args = line.split_whitespace().collect::<Vec<_>>();

                if let Some(command) = args.first() {
                    match *command {
                        "add" => match (args.get(1), args.len() > 2) {
                            (Some(name), true) => {
                                let target = args[2..].join(" ");
                                let id = engine_handle.watch_event(*name, Some(target.as_str())).await;
                                let handle = next_handle;
                                active_watchers.insert(handle, id);
                                next_handle += 1;
                                match engine_handle.snapshot(id).await {
                                    Some(snapshot) => {
                                        println!("--> #{} {}", handle, render(&snapshot))
                                    }
                                    None => println!("--> Added '{}' as #{}.", name, handle),
                                }
                            }
                            _ => println!("Usage: add <NAME> <TARGET>"),
                        },
                        "remove" => match args.get(1).map(|raw| raw.parse::<usize>()) {
                            Some(Ok(handle)) => match active_watchers.remove(&handle) {
                                Some(id) => {
                                    if engine_handle.remove_watcher(id).await {
                                        println!("--> Event #{} removed.", handle);
                                    } else {
                                        println!("--> Error: Event not found in engine.");
                                    }
                                }
                                None => println!(
                                    "Error: Invalid handle #{}. Use 'list' to see events.",
                                    handle
                                ),
                            },
                            Some(Err(_)) => println!("Error: Handle must be a number (e.g., '0', '1')."),
                            None => println!("Usage: remove <HANDLE>"),
                        },
                        "list" => {
                            println!("Events:");
                            for (handle, id) in &active_watchers {
                                if let Some(snapshot) = engine_handle.snapshot(*id).await {
                                    println!("  #{:<3} {}", handle, snapshot.name);
                                }
                            }
                        }
                        "show" => match args.get(1).map(|raw| raw.parse::<usize>()) {
                            Some(Ok(handle)) => match active_watchers.get(&handle) {
                                Some(id) => match engine_handle.snapshot(*id).await {
                                    Some(snapshot) => println!("  {}", render(&snapshot)),
                                    None => println!("--> Error: Event not found in engine."),
                                },
                                None => println!("Error: Invalid handle #{}.", handle),
                            },
                            Some(Err(_)) => println!("Error: Handle must be a number (e.g., '0', '1')."),
                            None => {
                                println!(
                                    "  now {}",
                                    engine_handle
                                        .clock()
                                        .now()
                                        .to_rfc3339_opts(SecondsFormat::Secs, true)
                                );
                                for snapshot in engine_handle.snapshots().await {
                                    println!("  {}", render(&snapshot));
                                }
                            }
                        },
                        "start" => {
                            if let Some(&"ticks") = args.get(1) {
                                is_streaming.store(true, Ordering::Relaxed);
                                println!("--> Streaming countdown updates.");
                            } else {
                                println!("Unknown 'start' command. Try 'start ticks'.");
                            }
                        }
                        "stop" => {
                            if let Some(&"ticks") = args.get(1) {
                                is_streaming.store(false, Ordering::Relaxed);
                                println!("--> Stopped streaming countdown updates.");
                            } else {
                                println!("Unknown 'stop' command. Try 'stop ticks'.");
                            }
                        }
                        "help" => {
                            println!("Available commands:");
                            println!("  add <NAME> <TARGET>   - Watches an event starting at TARGET (ISO-8601).");
                            println!("  list                  - Shows events and their handles.");
                            println!("  show [H]              - Prints one event's countdown, or all of them.");
                            println!("  remove <H>            - Stops watching an event by its handle.");
                            println!("  start ticks           - Prints every countdown on every tick.");
                            println!("  stop ticks            - Stops printing per-tick updates.");
                            println!("  exit                  - Quits the shell.");
                        }
                        "exit" => break,
                        _ => println!("Unknown command: '{}'. Type 'help'.", line),
                    }
                }
            }
            Err(_) => {
                println!("Exiting countshell...");
                break;
            }
        }
    }

    Ok(())
}
