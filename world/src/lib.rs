#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state management for Stackfall.

mod registry;
mod resolver;
mod terrain;

use std::collections::VecDeque;

use log::{debug, info};
use stackfall_core::{
    Command, Direction, Event, InvariantViolation, LevelBlueprint, PlacementError,
    ResolverConfig, StepOutcome, StepResult,
};
use thiserror::Error;

pub use registry::{Entity, ObjectRegistry};
pub use resolver::{Resolver, ResolverState};
pub use terrain::TerrainGrid;

/// Number of resolved steps kept for undo; older steps are forgotten.
const UNDO_LIMIT: usize = 256;

/// Failures that abort a world command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum WorldError {
    /// Resolution broke the occupancy invariant.
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
    /// A level entity could not be placed.
    #[error("level could not be loaded: {0}")]
    Placement(#[from] PlacementError),
}

/// Represents the authoritative Stackfall world state.
#[derive(Debug, Default)]
pub struct World {
    terrain: TerrainGrid,
    registry: ObjectRegistry,
    resolver: Resolver,
    history: VecDeque<ObjectRegistry>,
    initial: Option<ObjectRegistry>,
    won: bool,
}

impl World {
    /// Creates an empty world using the default resolver configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty world using the provided resolver configuration.
    #[must_use]
    pub fn with_config(config: ResolverConfig) -> Self {
        Self {
            resolver: Resolver::new(config),
            ..Self::default()
        }
    }

    /// Replaces the world contents with `blueprint` and settles it.
    ///
    /// The world is left untouched when an entity cannot be placed or the
    /// initial settle fails.
    pub fn load(&mut self, blueprint: &LevelBlueprint) -> Result<StepOutcome, WorldError> {
        let mut terrain = TerrainGrid::new();
        for (cell, kind) in &blueprint.terrain {
            terrain.set(*cell, *kind);
        }

        let mut registry = ObjectRegistry::new();
        for spawn in &blueprint.spawns {
            registry.register_spawn(*spawn);
        }
        for exit in &blueprint.exits {
            registry.register_exit(*exit);
        }
        for seed in &blueprint.entities {
            let _ = registry.register(*seed)?;
        }

        info!(
            "loaded level: {} terrain cells, {} entities, {} exits",
            terrain.len(),
            registry.len(),
            registry.exits().len()
        );

        let outcome = self.resolver.settle(&terrain, &mut registry)?;
        if cfg!(debug_assertions) {
            registry.verify()?;
        }
        let won = matches!(&outcome, StepOutcome::Resolved(result) if result.won);
        if won {
            info!("level completed");
        }

        self.terrain = terrain;
        self.initial = Some(registry.clone());
        self.registry = registry;
        self.history.clear();
        self.won = won;
        Ok(outcome)
    }

    /// Attempts to move the player, recording history for undo.
    pub fn step(&mut self, direction: Direction) -> Result<StepOutcome, WorldError> {
        let before = self.registry.clone();
        let outcome = self
            .resolver
            .step(&self.terrain, &mut self.registry, direction)?;
        if let StepOutcome::Resolved(result) = &outcome {
            if self.history.len() == UNDO_LIMIT {
                let _ = self.history.pop_front();
            }
            self.history.push_back(before);
            self.finish(result)?;
        }
        Ok(outcome)
    }

    /// Runs the gravity cascade without moving the player.
    pub fn settle(&mut self) -> Result<StepOutcome, WorldError> {
        let outcome = self.resolver.settle(&self.terrain, &mut self.registry)?;
        if let StepOutcome::Resolved(result) = &outcome {
            self.finish(result)?;
        }
        Ok(outcome)
    }

    /// Reverts the last resolved step. Returns `false` when nothing is left
    /// to undo.
    pub fn undo(&mut self) -> bool {
        let Some(previous) = self.history.pop_back() else {
            return false;
        };
        self.registry = previous;
        self.won = self.resolver.is_won(&self.terrain, &self.registry);
        debug!("undo: {} steps remain", self.history.len());
        true
    }

    /// Restores the state captured right after the level loaded.
    ///
    /// Returns `false` when no level has been loaded.
    pub fn reset(&mut self) -> bool {
        let Some(initial) = &self.initial else {
            return false;
        };
        self.registry = initial.clone();
        self.history.clear();
        self.won = self.resolver.is_won(&self.terrain, &self.registry);
        debug!("level reset");
        true
    }

    fn finish(&mut self, result: &StepResult) -> Result<(), WorldError> {
        if cfg!(debug_assertions) {
            self.registry.verify()?;
        }
        if result.won && !self.won {
            info!("level completed");
        }
        self.won = result.won;
        Ok(())
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(
    world: &mut World,
    command: Command,
    out_events: &mut Vec<Event>,
) -> Result<(), WorldError> {
    match command {
        Command::LoadLevel { blueprint } => {
            let outcome = world.load(&blueprint)?;
            out_events.push(Event::LevelLoaded {
                entities: world.registry.len(),
            });
            broadcast(outcome, false, out_events);
        }
        Command::Settle => {
            let was_won = world.won;
            let outcome = world.settle()?;
            broadcast(outcome, was_won, out_events);
        }
        Command::Step { direction } => {
            let was_won = world.won;
            let outcome = world.step(direction)?;
            broadcast(outcome, was_won, out_events);
        }
        Command::Undo => {
            if world.undo() {
                out_events.push(Event::StepUndone {
                    remaining: world.history.len(),
                });
            } else {
                out_events.push(Event::UndoUnavailable);
            }
        }
        Command::Reset => {
            if world.reset() {
                out_events.push(Event::LevelReset);
            }
        }
    }
    Ok(())
}

fn broadcast(outcome: StepOutcome, was_won: bool, out_events: &mut Vec<Event>) {
    match outcome {
        StepOutcome::Rejected(reason) => out_events.push(Event::StepRejected { reason }),
        StepOutcome::Resolved(result) => {
            let ticks = result.ticks.len();
            let won = result.won;
            for record in result.ticks {
                out_events.push(Event::TickResolved { record });
            }
            for diagnostic in result.diagnostics {
                out_events.push(Event::DiagnosticRaised { diagnostic });
            }
            out_events.push(Event::StepResolved { ticks, won });
            if won && !was_won {
                out_events.push(Event::LevelCompleted);
            }
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use super::{ObjectRegistry, ResolverState, TerrainGrid, World};
    use stackfall_core::{
        Cell, EntitySnapshot, EntityView, ExitBinding, OccupancyView, ResolverConfig,
        SpawnBinding, TerrainKind,
    };

    /// Terrain classification of a single cell.
    #[must_use]
    pub fn terrain_at(world: &World, cell: Cell) -> TerrainKind {
        world.terrain.kind_at(cell)
    }

    /// Provides read-only access to the terrain grid.
    #[must_use]
    pub fn terrain(world: &World) -> &TerrainGrid {
        &world.terrain
    }

    /// Provides read-only access to the entity registry.
    #[must_use]
    pub fn registry(world: &World) -> &ObjectRegistry {
        &world.registry
    }

    /// Captures a read-only view of every registered entity.
    #[must_use]
    pub fn entity_view(world: &World) -> EntityView {
        world.registry.view()
    }

    /// Exposes a read-only view of the live occupancy index.
    #[must_use]
    pub fn occupancy_view(world: &World) -> OccupancyView<'_> {
        world.registry.occupancy()
    }

    /// Snapshot of the player, if one is registered.
    #[must_use]
    pub fn player(world: &World) -> Option<EntitySnapshot> {
        world.registry.player().map(|player| player.snapshot())
    }

    /// Exit bindings of the loaded level.
    #[must_use]
    pub fn exits(world: &World) -> &[ExitBinding] {
        world.registry.exits()
    }

    /// Spawn bindings of the loaded level, ordered by archetype.
    #[must_use]
    pub fn spawns(world: &World) -> Vec<SpawnBinding> {
        world.registry.spawns()
    }

    /// Reports whether the level was won by the last resolution.
    #[must_use]
    pub fn is_won(world: &World) -> bool {
        world.won
    }

    /// Number of steps that can currently be undone.
    #[must_use]
    pub fn history_len(world: &World) -> usize {
        world.history.len()
    }

    /// Resolver configuration in effect.
    #[must_use]
    pub fn config(world: &World) -> ResolverConfig {
        world.resolver.config()
    }

    /// Lifecycle state of the resolver.
    #[must_use]
    pub fn resolver_state(world: &World) -> ResolverState {
        world.resolver.state()
    }
}
