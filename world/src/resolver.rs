//! Turn resolution: player moves, pushes, carrying and the gravity cascade.

use std::collections::HashSet;

use log::{debug, warn};
use stackfall_core::{
    Cell, Diagnostic, Direction, EntityId, InvariantViolation, Movement, MovementKind,
    RejectReason, ResolverConfig, StepOutcome, StepResult, TickRecord,
};
use stackfall_system_win::{WinEvaluator, WinPolicy};

use crate::{
    registry::{Entity, ObjectRegistry},
    terrain::TerrainGrid,
};

/// Lifecycle of the resolver.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResolverState {
    /// Ready to accept a new step.
    #[default]
    Idle,
    /// A step or settle pass is being resolved.
    Resolving,
}

/// Validated player move awaiting resolution.
#[derive(Clone, Copy, Debug)]
struct MovePlan {
    mover: EntityId,
    pushee: Option<EntityId>,
    direction: Direction,
}

/// Resolves player input and the physics that follows it.
///
/// The resolver owns no world data; terrain and registry are lent to it for
/// the duration of each call.
#[derive(Clone, Debug, Default)]
pub struct Resolver {
    config: ResolverConfig,
    state: ResolverState,
    win: WinEvaluator,
}

impl Resolver {
    /// Creates a resolver with the provided configuration.
    #[must_use]
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            config,
            state: ResolverState::Idle,
            win: WinEvaluator::new(WinPolicy::from_shortcut(config.player_exit_shortcut)),
        }
    }

    /// Configuration in effect.
    #[must_use]
    pub const fn config(&self) -> ResolverConfig {
        self.config
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ResolverState {
        self.state
    }

    /// Attempts to move the player one cell and resolves every consequence.
    ///
    /// Rejections leave the registry untouched and are returned as
    /// [`StepOutcome::Rejected`]. Broken invariants abort the step.
    pub fn step(
        &mut self,
        terrain: &TerrainGrid,
        registry: &mut ObjectRegistry,
        direction: Direction,
    ) -> Result<StepOutcome, InvariantViolation> {
        if self.state == ResolverState::Resolving {
            return Ok(StepOutcome::Rejected(RejectReason::Busy));
        }

        let plan = match plan_move(terrain, registry, direction) {
            Ok(plan) => plan,
            Err(reason) => {
                debug!("step {direction:?} rejected: {reason:?}");
                return Ok(StepOutcome::Rejected(reason));
            }
        };

        self.state = ResolverState::Resolving;
        let outcome = self.resolve(terrain, registry, Some(plan));
        self.state = ResolverState::Idle;
        outcome.map(StepOutcome::Resolved)
    }

    /// Runs the gravity cascade without moving the player.
    pub fn settle(
        &mut self,
        terrain: &TerrainGrid,
        registry: &mut ObjectRegistry,
    ) -> Result<StepOutcome, InvariantViolation> {
        if self.state == ResolverState::Resolving {
            return Ok(StepOutcome::Rejected(RejectReason::Busy));
        }

        self.state = ResolverState::Resolving;
        let outcome = self.resolve(terrain, registry, None);
        self.state = ResolverState::Idle;
        outcome.map(StepOutcome::Resolved)
    }

    /// Reports whether the registry currently satisfies the win condition.
    #[must_use]
    pub fn is_won(&self, terrain: &TerrainGrid, registry: &ObjectRegistry) -> bool {
        let player = registry
            .player()
            .filter(|player| player.is_alive())
            .map(|player| player.anchor());

        self.win.evaluate(
            registry.exits(),
            player,
            |cell| terrain.kind_at(cell),
            |cell| registry.entity_at(cell).map(|entity| entity.archetype()),
        )
    }

    fn resolve(
        &self,
        terrain: &TerrainGrid,
        registry: &mut ObjectRegistry,
        plan: Option<MovePlan>,
    ) -> Result<StepResult, InvariantViolation> {
        let mut result = StepResult::default();

        if let Some(plan) = plan {
            let mut record = TickRecord::new(0);
            resolve_move(terrain, registry, plan, &mut record)?;
            if !record.is_empty() {
                debug!("tick 0: {} movements", record.movements.len());
                result.ticks.push(record);
            }
        }

        self.cascade(terrain, registry, &mut result)?;
        result.won = self.is_won(terrain, registry);
        Ok(result)
    }

    fn cascade(
        &self,
        terrain: &TerrainGrid,
        registry: &mut ObjectRegistry,
        result: &mut StepResult,
    ) -> Result<(), InvariantViolation> {
        let mut resolved = 0;
        loop {
            if resolved >= self.config.max_cascade_ticks {
                if self.has_pending_motion(terrain, registry) {
                    warn!("cascade stopped after {resolved} ticks with entities still moving");
                    result
                        .diagnostics
                        .push(Diagnostic::SafetyBoundReached { ticks: resolved });
                }
                return Ok(());
            }

            let mut record = TickRecord::new(resolved + 1);
            let dead_at_start: Vec<EntityId> = registry
                .all_entities()
                .iter()
                .filter(|entity| !entity.is_alive())
                .map(|entity| entity.id())
                .collect();

            self.process_falling(terrain, registry, &mut record)?;
            self.process_respawning(
                terrain,
                registry,
                &dead_at_start,
                &mut record,
                &mut result.diagnostics,
            )?;

            if record.is_empty() {
                return Ok(());
            }

            debug!(
                "tick {}: {} movements",
                record.index,
                record.movements.len()
            );
            result.ticks.push(record);
            resolved += 1;
        }
    }

    /// Reports whether another cascade tick would move anything.
    fn has_pending_motion(&self, terrain: &TerrainGrid, registry: &ObjectRegistry) -> bool {
        registry.all_entities().iter().any(|entity| {
            if entity.is_alive() {
                return registry.is_in_freefall(entity.id(), terrain);
            }
            registry.spawn_for(entity.archetype()).is_some_and(|spawn| {
                respawn_is_clear(terrain, registry, entity, self.respawn_target(spawn))
            })
        })
    }

    fn respawn_target(&self, spawn: Cell) -> Cell {
        spawn.above().offset(0, self.config.respawn_height, 0)
    }

    fn process_falling(
        &self,
        terrain: &TerrainGrid,
        registry: &mut ObjectRegistry,
        record: &mut TickRecord,
    ) -> Result<(), InvariantViolation> {
        for id in registry.ids() {
            if !registry.is_in_freefall(id, terrain) {
                continue;
            }

            let anchor = registry
                .entity(id)
                .map(|entity| entity.anchor())
                .ok_or(InvariantViolation::UnknownEntity(id))?;

            if anchor.y() <= self.config.death_bound {
                registry.kill(id)?;
                record.movements.push(Movement {
                    entity: id,
                    from: anchor,
                    to: anchor,
                    kind: MovementKind::Die,
                });
            } else {
                shift(registry, id, Direction::Down, MovementKind::Fall, record)?;
            }
        }
        Ok(())
    }

    fn process_respawning(
        &self,
        terrain: &TerrainGrid,
        registry: &mut ObjectRegistry,
        candidates: &[EntityId],
        record: &mut TickRecord,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<(), InvariantViolation> {
        for &id in candidates {
            let entity = registry
                .entity(id)
                .copied()
                .ok_or(InvariantViolation::UnknownEntity(id))?;

            let Some(spawn) = registry.spawn_for(entity.archetype()) else {
                raise(
                    diagnostics,
                    Diagnostic::MissingSpawnBinding {
                        entity: id,
                        archetype: entity.archetype(),
                    },
                );
                continue;
            };

            let target = self.respawn_target(spawn);
            if !respawn_is_clear(terrain, registry, &entity, target) {
                raise(diagnostics, Diagnostic::RespawnBlocked { entity: id, at: target });
                continue;
            }

            registry.revive(id, target)?;
            record.movements.push(Movement {
                entity: id,
                from: entity.anchor(),
                to: target,
                kind: MovementKind::Respawn,
            });
        }
        Ok(())
    }
}

fn respawn_is_clear(
    terrain: &TerrainGrid,
    registry: &ObjectRegistry,
    entity: &Entity,
    target: Cell,
) -> bool {
    entity
        .footprint()
        .cells(target)
        .all(|cell| terrain.is_passable(cell) && registry.is_free(cell))
}

fn raise(diagnostics: &mut Vec<Diagnostic>, diagnostic: Diagnostic) {
    if diagnostics.contains(&diagnostic) {
        return;
    }
    warn!("{diagnostic:?}");
    diagnostics.push(diagnostic);
}

fn plan_move(
    terrain: &TerrainGrid,
    registry: &ObjectRegistry,
    direction: Direction,
) -> Result<MovePlan, RejectReason> {
    if !direction.is_horizontal() {
        return Err(RejectReason::VerticalDirection);
    }

    let player = registry
        .player()
        .copied()
        .ok_or(RejectReason::MissingPlayer)?;
    if !player.is_alive() {
        return Err(RejectReason::PlayerDead);
    }

    let mut pushee = None;
    for cell in player.cells() {
        let target = cell.step(direction);
        if !terrain.is_passable(target) {
            return Err(RejectReason::BlockedByTerrain { cell: target });
        }

        match registry.occupant(target) {
            Some(occupant) if occupant == player.id() => {}
            Some(occupant) => match pushee {
                Some(existing) if existing != occupant => {
                    return Err(RejectReason::BlockedPush { pushee: occupant })
                }
                _ => pushee = Some(occupant),
            },
            None => {}
        }
    }

    if let Some(pushee) = pushee {
        if !can_shift(terrain, registry, pushee, direction) {
            return Err(RejectReason::BlockedPush { pushee });
        }
    }

    Ok(MovePlan {
        mover: player.id(),
        pushee,
        direction,
    })
}

/// Applies a validated plan: the pushee and its riders first, then the mover
/// and its riders.
fn resolve_move(
    terrain: &TerrainGrid,
    registry: &mut ObjectRegistry,
    plan: MovePlan,
    record: &mut TickRecord,
) -> Result<(), InvariantViolation> {
    let mut moved = HashSet::new();
    if let Some(pushee) = plan.pushee {
        carry(
            terrain,
            registry,
            pushee,
            plan.direction,
            MovementKind::Push,
            &mut moved,
            record,
        )?;
    }
    carry(
        terrain,
        registry,
        plan.mover,
        plan.direction,
        MovementKind::Move,
        &mut moved,
        record,
    )
}

/// Shifts `root` and then, depth first, every stack resting on it.
///
/// Riders are captured before their carrier moves. A rider that cannot follow
/// stays behind together with everything above it.
fn carry(
    terrain: &TerrainGrid,
    registry: &mut ObjectRegistry,
    root: EntityId,
    direction: Direction,
    kind: MovementKind,
    moved: &mut HashSet<EntityId>,
    record: &mut TickRecord,
) -> Result<(), InvariantViolation> {
    let mut worklist = vec![root];
    while let Some(id) = worklist.pop() {
        if moved.contains(&id) {
            continue;
        }
        if id != root && !can_shift(terrain, registry, id, direction) {
            continue;
        }

        let riders = registry.passengers(id);
        let movement = if id == root { kind } else { MovementKind::Move };
        shift(registry, id, direction, movement, record)?;
        let _ = moved.insert(id);

        worklist.extend(riders.into_iter().rev());
    }
    Ok(())
}

fn can_shift(
    terrain: &TerrainGrid,
    registry: &ObjectRegistry,
    id: EntityId,
    direction: Direction,
) -> bool {
    let Some(entity) = registry.entity(id) else {
        return false;
    };
    if !entity.is_alive() {
        return false;
    }

    entity.cells().all(|cell| {
        let target = cell.step(direction);
        terrain.is_passable(target)
            && registry
                .occupant(target)
                .map_or(true, |occupant| occupant == id)
    })
}

fn shift(
    registry: &mut ObjectRegistry,
    id: EntityId,
    direction: Direction,
    kind: MovementKind,
    record: &mut TickRecord,
) -> Result<(), InvariantViolation> {
    let from = registry
        .entity(id)
        .map(|entity| entity.anchor())
        .ok_or(InvariantViolation::UnknownEntity(id))?;
    let to = from.step(direction);
    registry.move_to(id, to)?;
    record.movements.push(Movement {
        entity: id,
        from,
        to,
        kind,
    });
    Ok(())
}
