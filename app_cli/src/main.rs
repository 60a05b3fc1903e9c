//! CLI application for soundstage
//!
//! Loads a scenario file, runs it through the engine and prints the
//! resulting mix as JSON.

mod scenario;

use anyhow::{anyhow, Result};
use clap::Parser;
use log::{debug, info};
use scenario::Scenario;
use serde_json::{json, Value};
use settings_manager::{EngineSettings, SettingsManager};
use stage::{EngineCommand, EngineHandler, LocalSpatialAudioEngine, MixSnapshot, TeamRoster};
use stage_core::EngineEvent;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

/// soundstage - spatial audio positioning
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Enable debug logging
    #[clap(short, long)]
    debug: bool,

    /// Settings file to use instead of the one in the config directory
    #[clap(short, long)]
    settings: Option<PathBuf>,

    /// Scenario file (TOML)
    scenario: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Configure logging based on debug flag
    if args.debug {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
        debug!("Debug logging enabled");
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    info!("Starting soundstage CLI");

    let settings = match &args.settings {
        Some(path) => SettingsManager::with_file(path)?,
        None => SettingsManager::new()?,
    };
    info!("Using settings from {:?}", settings.path());

    let scenario = Scenario::load(&args.scenario)?;
    let snapshot = run_scenario(settings.settings(), &scenario).await?;

    println!("{}", serde_json::to_string_pretty(&report(&snapshot)?)?);

    info!("Exiting soundstage CLI");
    Ok(())
}

/// Drive a fresh engine through `scenario` and return the final mix.
async fn run_scenario(settings: &EngineSettings, scenario: &Scenario) -> Result<MixSnapshot> {
    let mut engine = LocalSpatialAudioEngine::new();
    engine.initialize()?;
    engine.apply_settings(settings)?;
    let snapshots = engine.subscribe()?;

    let roster = Arc::new(TeamRoster::new());
    scenario.assign_teams(&roster);

    let (command_tx, command_rx) = mpsc::channel(32);
    let (_rtc_tx, rtc_rx) = mpsc::channel(1);
    let (event_tx, mut event_rx) = mpsc::channel(32);
    let mut handler = EngineHandler::new(engine, roster, command_rx, rtc_rx, event_tx);
    let task = tokio::spawn(async move { handler.run().await });

    for command in scenario.commands() {
        command_tx.send(command).await?;
        match event_rx.recv().await {
            Some(EngineEvent::SnapshotPublished { revision, .. }) => {
                debug!("Scenario step applied at r{}", revision);
            }
            Some(EngineEvent::CommandFailed {
                command, reason, ..
            }) => {
                return Err(anyhow!("{} failed: {}", command, reason));
            }
            Some(other) => debug!("Ignoring {}", other),
            None => return Err(anyhow!("Engine handler stopped early")),
        }
    }

    let snapshot = (**snapshots.borrow()).clone();

    command_tx.send(EngineCommand::Shutdown).await?;
    task.await??;
    Ok(snapshot)
}

/// JSON view of a snapshot, keyed by entity name.
fn report(snapshot: &MixSnapshot) -> Result<Value> {
    let mut streams = serde_json::Map::new();
    for (id, pair) in &snapshot.params {
        streams.insert(id.to_string(), serde_json::to_value(pair)?);
    }

    Ok(json!({
        "revision": snapshot.revision,
        "local_muted": snapshot.flags.local_muted,
        "blur": snapshot.flags.blur,
        "air_absorb": snapshot.flags.air_absorb,
        "streams": streams,
    }))
}
