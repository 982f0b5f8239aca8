#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that loads a Stackfall level and replays moves on it.

mod config;
mod level_file;

use std::{
    io::{self, Write},
    path::PathBuf,
};

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use log::info;
use stackfall_core::{Command, Diagnostic, Event, Movement, MovementKind, TickRecord};
use stackfall_system_level_loader::build_blueprint;
use stackfall_system_playback::Playback;
use stackfall_world::{self as world, query, World};

/// Loads a level, plays a key script on it and prints every resolved tick.
#[derive(Debug, Parser)]
#[command(name = "stackfall", version)]
struct Cli {
    /// Level file: a JSON list of `{"position": {x, y, z}, "tile_id"}` entries.
    level: PathBuf,
    /// Keys to play: w/a/s/d (or k/h/j/l) to move, u to undo, r to reset.
    #[arg(short, long, default_value = "")]
    moves: String,
    /// TOML file with a `[resolver]` section overriding the defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Print events and the summary as JSON lines.
    #[arg(long)]
    json: bool,
}

/// Entry point for the Stackfall command-line interface.
fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = config::load(cli.config.as_deref())?;
    let tiles = level_file::read_tiles(&cli.level)
        .with_context(|| format!("failed to load level {}", cli.level.display()))?;
    let blueprint = build_blueprint(&tiles)
        .with_context(|| format!("level {} is malformed", cli.level.display()))?;
    let mut playback = Playback::from_script(&cli.moves).context("invalid move script")?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut world = World::with_config(config);
    let mut events = Vec::new();
    world::apply(&mut world, Command::LoadLevel { blueprint }, &mut events)
        .context("failed to load level into world")?;

    loop {
        for event in &events {
            print_event(&mut out, event, cli.json)?;
        }

        let mut commands = Vec::new();
        playback.handle(&events, &mut commands);
        if commands.is_empty() {
            break;
        }

        events.clear();
        for command in commands {
            world::apply(&mut world, command, &mut events).context("world command failed")?;
        }
    }

    let won = query::is_won(&world);
    info!(
        "playback finished after {} commands; won: {won}",
        playback.issued()
    );
    print_summary(&mut out, won, &playback, cli.json)
}

fn print_event(out: &mut impl Write, event: &Event, json: bool) -> Result<()> {
    if json {
        let line = serde_json::to_string(event).context("failed to encode event")?;
        writeln!(out, "{line}")?;
        return Ok(());
    }

    match event {
        Event::LevelLoaded { entities } => writeln!(out, "level loaded: {entities} entities")?,
        Event::TickResolved { record } => writeln!(out, "{}", describe_tick(record))?,
        Event::DiagnosticRaised { diagnostic } => {
            writeln!(out, "diagnostic: {}", describe_diagnostic(diagnostic))?
        }
        Event::StepResolved { ticks, won } => {
            let suffix = if *won { " (won)" } else { "" };
            writeln!(out, "resolved in {ticks} ticks{suffix}")?
        }
        Event::StepRejected { reason } => writeln!(out, "rejected: {reason:?}")?,
        Event::LevelCompleted => writeln!(out, "level completed")?,
        Event::StepUndone { remaining } => writeln!(out, "undone; {remaining} steps left")?,
        Event::UndoUnavailable => writeln!(out, "nothing to undo")?,
        Event::LevelReset => writeln!(out, "level reset")?,
    }
    Ok(())
}

fn print_summary(out: &mut impl Write, won: bool, playback: &Playback, json: bool) -> Result<()> {
    if json {
        let summary = serde_json::json!({
            "summary": {
                "won": won,
                "issued": playback.issued(),
                "unused": playback.remaining(),
            }
        });
        writeln!(out, "{summary}")?;
    } else {
        writeln!(
            out,
            "won: {won} (commands issued: {}, unused: {})",
            playback.issued(),
            playback.remaining()
        )?;
    }
    Ok(())
}

fn describe_tick(record: &TickRecord) -> String {
    let movements: Vec<String> = record.movements.iter().map(describe_movement).collect();
    format!("tick {}: {}", record.index, movements.join("; "))
}

fn describe_movement(movement: &Movement) -> String {
    let verb = match movement.kind {
        MovementKind::Move => "move",
        MovementKind::Push => "push",
        MovementKind::Fall => "fall",
        MovementKind::Die => "die",
        MovementKind::Respawn => "respawn",
    };
    if movement.kind == MovementKind::Die {
        format!("{} {verb} at {}", movement.entity, movement.from)
    } else {
        format!(
            "{} {verb} {} -> {}",
            movement.entity, movement.from, movement.to
        )
    }
}

fn describe_diagnostic(diagnostic: &Diagnostic) -> String {
    match diagnostic {
        Diagnostic::MissingSpawnBinding { entity, archetype } => {
            format!("{entity} stays dead: no {archetype} spawn")
        }
        Diagnostic::RespawnBlocked { entity, at } => {
            format!("{entity} could not respawn at {at}")
        }
        Diagnostic::SafetyBoundReached { ticks } => {
            format!("cascade stopped after {ticks} ticks")
        }
    }
}
