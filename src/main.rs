//! groovebox - headless drum machine: plays or exports the built-in demo song.
//!
//! Usage:
//!   groovebox [--prefs prefs.json] [--export out.wav] [--pattern-mode]

mod demo;

use std::env;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use gb_master::{DriverKind, Engine, EngineEvent, EngineState, Preferences, SongMode};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let prefs = match arg_value(&args, "--prefs") {
        Some(path) => Preferences::load(&path).with_context(|| format!("failed to load preferences from {path}"))?,
        None => Preferences::default(),
    };
    let export = arg_value(&args, "--export");
    let pattern_mode = args.iter().any(|a| a == "--pattern-mode");

    let mut engine = Engine::new(prefs);
    engine.init()?;
    engine.start_audio_drivers()?;

    let mut song = demo::song();
    if pattern_mode {
        song.mode = SongMode::Pattern;
    }
    println!("Title:    {}", song.title);
    println!("Tempo:    {} BPM", song.bpm);
    println!("Columns:  {}", song.columns.len());
    println!("Patterns: {}", song.patterns.len());
    println!();

    let handle = engine.handle();
    handle.set_song(song).map_err(|(e, _)| e).context("failed to load the demo song")?;

    match export {
        Some(path) => {
            engine.export_song(&path).with_context(|| format!("failed to export to {path}"))?;
            let frames = engine.wait_export()?;
            engine.stop_export_song()?;
            println!("Wrote {frames} frames to {path}");
        }
        None => play(&engine)?,
    }

    engine.destroy()?;
    Ok(())
}

fn play(engine: &Engine) -> Result<()> {
    match engine.driver_kind() {
        Some(DriverKind::Realtime) => {}
        kind => bail!("no audio device available (driver {kind:?}); use --export instead"),
    }

    let handle = engine.handle();
    let events = handle.subscribe();
    handle.sequencer_play();
    info!(driver = engine.driver_name().unwrap_or("none"), "playing");

    let mut started = false;
    loop {
        match events.recv_timeout(Duration::from_secs(1)) {
            Ok(EngineEvent::State(EngineState::Playing)) => started = true,
            Ok(EngineEvent::State(EngineState::Ready)) if started => break,
            Ok(EngineEvent::PatternChanged) => {
                if let Some(column) = handle.pattern_position() {
                    println!("Column {column:02}");
                }
            }
            Ok(EngineEvent::Xrun) => warn!(
                process_ms = handle.process_time(),
                budget_ms = handle.max_process_time(),
                "xrun"
            ),
            Ok(_) => {}
            Err(e) if e.is_timeout() => {}
            Err(_) => break,
        }
    }
    println!("Done.");
    Ok(())
}
