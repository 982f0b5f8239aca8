//! Authoritative storage for movable entities and their bindings.

use std::collections::{BTreeMap, HashMap};

use log::warn;
use stackfall_core::{
    Archetype, Cell, EntityId, EntitySeed, EntitySnapshot, EntityView, ExitBinding, Footprint,
    InvariantViolation, OccupancyView, OccupiedCells, PlacementError, Role, SpawnBinding,
};

use crate::terrain::TerrainGrid;

/// Movable game object tracked by the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Entity {
    id: EntityId,
    archetype: Archetype,
    role: Role,
    footprint: Footprint,
    anchor: Cell,
    alive: bool,
}

impl Entity {
    /// Identifier allocated at registration.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Respawn and win group of the entity.
    #[must_use]
    pub const fn archetype(&self) -> Archetype {
        self.archetype
    }

    /// Behavioural role of the entity.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Shape of the entity.
    #[must_use]
    pub const fn footprint(&self) -> Footprint {
        self.footprint
    }

    /// Primary occupied cell. Dead entities keep the cell they died in.
    #[must_use]
    pub const fn anchor(&self) -> Cell {
        self.anchor
    }

    /// Whether the entity currently takes part in the simulation.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.alive
    }

    /// Cells claimed at the current anchor.
    #[must_use]
    pub fn cells(&self) -> OccupiedCells {
        self.footprint.cells(self.anchor)
    }

    /// Captures an immutable snapshot for views.
    #[must_use]
    pub const fn snapshot(&self) -> EntitySnapshot {
        EntitySnapshot {
            id: self.id,
            archetype: self.archetype,
            role: self.role,
            footprint: self.footprint,
            anchor: self.anchor,
            alive: self.alive,
        }
    }
}

/// Sparse index from cells to live entities, plus spawn and exit bindings.
///
/// Entities are stored in registration order, which is also the order in
/// which the resolver visits them. Dead entities stay registered but are
/// removed from the cell index.
#[derive(Clone, Debug, Default)]
pub struct ObjectRegistry {
    entities: Vec<Entity>,
    cells: HashMap<Cell, EntityId>,
    player: Option<EntityId>,
    spawns: BTreeMap<Archetype, Cell>,
    exits: Vec<ExitBinding>,
}

impl ObjectRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new live entity and indexes its cells.
    ///
    /// Fails without modifying the registry when a cell is already claimed or
    /// when a second player is registered.
    pub fn register(&mut self, seed: EntitySeed) -> Result<EntityId, PlacementError> {
        if seed.role == Role::Player {
            if let Some(existing) = self.player {
                warn!("rejected second player at {}; {existing} already registered", seed.anchor);
                return Err(PlacementError::DuplicatePlayer(existing));
            }
        }

        let id = next_id(self.entities.len())?;
        self.ensure_claimable(id, seed.footprint.cells(seed.anchor))?;

        self.entities.push(Entity {
            id,
            archetype: seed.archetype,
            role: seed.role,
            footprint: seed.footprint,
            anchor: seed.anchor,
            alive: true,
        });
        self.index(id, seed.footprint.cells(seed.anchor));
        if seed.role == Role::Player {
            self.player = Some(id);
        }

        Ok(id)
    }

    /// Relocates a registered entity so that its anchor sits at `anchor`.
    ///
    /// The previous cells are released and the footprint is recomputed before
    /// indexing. The move is refused, and logged, when a target cell belongs to
    /// a different live entity.
    pub fn place(&mut self, id: EntityId, anchor: Cell) -> Result<(), PlacementError> {
        let entity = self
            .entity(id)
            .copied()
            .ok_or(PlacementError::UnknownEntity(id))?;

        if let Err(error) = self.ensure_claimable(id, entity.footprint.cells(anchor)) {
            warn!("refused to place {id} at {anchor}: {error}");
            return Err(error);
        }

        self.relocate(entity, anchor);
        if entity.role == Role::Player {
            self.player = Some(id);
        }
        Ok(())
    }

    /// Moves an already registered entity mid-resolution.
    ///
    /// Callers validate the destination first; a conflict here means the
    /// occupancy invariant is broken.
    pub fn move_to(&mut self, id: EntityId, anchor: Cell) -> Result<(), InvariantViolation> {
        let entity = self
            .entity(id)
            .copied()
            .ok_or(InvariantViolation::UnknownEntity(id))?;

        if let Err(PlacementError::Occupied { cell, occupant }) =
            self.ensure_claimable(id, entity.footprint.cells(anchor))
        {
            debug_assert!(false, "{id} moved into {cell} held by {occupant}");
            return Err(InvariantViolation::CellClaimed {
                cell,
                claimant: id,
                occupant,
            });
        }

        self.relocate(entity, anchor);
        Ok(())
    }

    /// Marks an entity dead and releases its cells; the anchor is retained.
    pub fn kill(&mut self, id: EntityId) -> Result<(), InvariantViolation> {
        let entity = self
            .entity(id)
            .copied()
            .ok_or(InvariantViolation::UnknownEntity(id))?;

        self.unindex(id, entity.cells());
        if let Some(slot) = self.entity_mut(id) {
            slot.alive = false;
        }
        Ok(())
    }

    /// Brings a dead entity back at `anchor`, keeping its identity.
    pub fn revive(&mut self, id: EntityId, anchor: Cell) -> Result<(), InvariantViolation> {
        let entity = self
            .entity(id)
            .copied()
            .ok_or(InvariantViolation::UnknownEntity(id))?;

        if let Err(PlacementError::Occupied { cell, occupant }) =
            self.ensure_claimable(id, entity.footprint.cells(anchor))
        {
            debug_assert!(false, "{id} respawned into {cell} held by {occupant}");
            return Err(InvariantViolation::CellClaimed {
                cell,
                claimant: id,
                occupant,
            });
        }

        if let Some(slot) = self.entity_mut(id) {
            slot.alive = true;
        }
        self.relocate(Entity { alive: true, ..entity }, anchor);
        Ok(())
    }

    /// Looks up an entity by identifier.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        let index = usize::try_from(id.get()).ok()?;
        self.entities.get(index)
    }

    /// Returns the live entity occupying the provided cell, if any.
    #[must_use]
    pub fn entity_at(&self, cell: Cell) -> Option<&Entity> {
        self.cells.get(&cell).and_then(|id| self.entity(*id))
    }

    /// Identifier of the live entity occupying the cell, if any.
    #[must_use]
    pub fn occupant(&self, cell: Cell) -> Option<EntityId> {
        self.cells.get(&cell).copied()
    }

    /// Reports whether no live entity occupies the cell.
    ///
    /// Terrain is not consulted.
    #[must_use]
    pub fn is_free(&self, cell: Cell) -> bool {
        !self.cells.contains_key(&cell)
    }

    /// Every registered entity in registration order.
    #[must_use]
    pub fn all_entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Identifiers of every registered entity in registration order.
    #[must_use]
    pub fn ids(&self) -> Vec<EntityId> {
        self.entities.iter().map(Entity::id).collect()
    }

    /// Number of registered entities, dead or alive.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Reports whether no entity is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// The registered player, dead or alive.
    #[must_use]
    pub fn player(&self) -> Option<&Entity> {
        self.player.and_then(|id| self.entity(id))
    }

    /// Reports whether the entity has nothing holding it up.
    ///
    /// Every occupied cell must sit above empty terrain that no other live
    /// entity occupies; support under either half of a domino keeps it in
    /// place. Dead entities never fall.
    #[must_use]
    pub fn is_in_freefall(&self, id: EntityId, terrain: &TerrainGrid) -> bool {
        let Some(entity) = self.entity(id) else {
            return false;
        };
        if !entity.alive {
            return false;
        }

        entity.cells().all(|cell| {
            let below = cell.below();
            !terrain.supports(below)
                && self
                    .occupant(below)
                    .map_or(true, |occupant| occupant == id)
        })
    }

    /// Live entities resting directly on top of the entity, in cell order.
    #[must_use]
    pub fn passengers(&self, id: EntityId) -> Vec<EntityId> {
        let Some(entity) = self.entity(id) else {
            return Vec::new();
        };

        let mut riders = Vec::new();
        for cell in entity.cells() {
            if let Some(rider) = self.occupant(cell.above()) {
                if rider != id && !riders.contains(&rider) {
                    riders.push(rider);
                }
            }
        }
        riders
    }

    /// Binds the archetype's respawn location, replacing any earlier binding.
    pub fn register_spawn(&mut self, binding: SpawnBinding) {
        if let Some(previous) = self.spawns.insert(binding.archetype, binding.cell) {
            warn!(
                "spawn for {} moved from {previous} to {}",
                binding.archetype, binding.cell
            );
        }
    }

    /// Terrain cell at which the archetype respawns.
    #[must_use]
    pub fn spawn_for(&self, archetype: Archetype) -> Option<Cell> {
        self.spawns.get(&archetype).copied()
    }

    /// Every spawn binding ordered by archetype.
    #[must_use]
    pub fn spawns(&self) -> Vec<SpawnBinding> {
        self.spawns
            .iter()
            .map(|(archetype, cell)| SpawnBinding {
                archetype: *archetype,
                cell: *cell,
            })
            .collect()
    }

    /// Adds an exit that must be satisfied to win.
    pub fn register_exit(&mut self, binding: ExitBinding) {
        if !self.exits.contains(&binding) {
            self.exits.push(binding);
        }
    }

    /// Exit bindings in registration order.
    #[must_use]
    pub fn exits(&self) -> &[ExitBinding] {
        &self.exits
    }

    /// Read-only view of the live occupancy index.
    #[must_use]
    pub fn occupancy(&self) -> OccupancyView<'_> {
        OccupancyView::new(&self.cells)
    }

    /// Snapshots of every entity in registration order.
    #[must_use]
    pub fn view(&self) -> EntityView {
        EntityView::from_snapshots(self.entities.iter().map(Entity::snapshot).collect())
    }

    /// Cross-checks the cell index against the entity list.
    pub fn verify(&self) -> Result<(), InvariantViolation> {
        let mut expected = 0;
        for entity in self.entities.iter().filter(|entity| entity.alive) {
            for cell in entity.cells() {
                expected += 1;
                match self.occupant(cell) {
                    Some(occupant) if occupant == entity.id => {}
                    Some(occupant) => {
                        return Err(InvariantViolation::CellClaimed {
                            cell,
                            claimant: entity.id,
                            occupant,
                        })
                    }
                    None => return Err(InvariantViolation::UnknownEntity(entity.id)),
                }
            }
        }

        if expected != self.cells.len() {
            if let Some((_, stale)) = self
                .cells
                .iter()
                .find(|(_, id)| self.entity(**id).map_or(true, |entity| !entity.alive))
            {
                return Err(InvariantViolation::UnknownEntity(*stale));
            }
        }
        Ok(())
    }

    fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        let index = usize::try_from(id.get()).ok()?;
        self.entities.get_mut(index)
    }

    fn ensure_claimable(&self, id: EntityId, cells: OccupiedCells) -> Result<(), PlacementError> {
        for cell in cells {
            if let Some(occupant) = self.occupant(cell) {
                if occupant != id {
                    return Err(PlacementError::Occupied { cell, occupant });
                }
            }
        }
        Ok(())
    }

    fn relocate(&mut self, entity: Entity, anchor: Cell) {
        if entity.alive {
            self.unindex(entity.id, entity.cells());
        }
        if let Some(slot) = self.entity_mut(entity.id) {
            slot.anchor = anchor;
        }
        if entity.alive {
            self.index(entity.id, entity.footprint.cells(anchor));
        }
    }

    fn index(&mut self, id: EntityId, cells: OccupiedCells) {
        for cell in cells {
            let _ = self.cells.insert(cell, id);
        }
    }

    fn unindex(&mut self, id: EntityId, cells: OccupiedCells) {
        for cell in cells {
            if self.cells.get(&cell) == Some(&id) {
                let _ = self.cells.remove(&cell);
            }
        }
    }
}

fn next_id(registered: usize) -> Result<EntityId, PlacementError> {
    u32::try_from(registered)
        .map(EntityId::new)
        .map_err(|_| PlacementError::IdsExhausted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackfall_core::{Direction, TerrainKind};

    fn unit(archetype: Archetype, role: Role, anchor: Cell) -> EntitySeed {
        EntitySeed {
            archetype,
            role,
            footprint: Footprint::Unit,
            anchor,
        }
    }

    fn domino(anchor: Cell, orientation: Direction) -> EntitySeed {
        EntitySeed {
            archetype: Archetype::BLUE,
            role: Role::Pushable,
            footprint: Footprint::Domino { orientation },
            anchor,
        }
    }

    #[test]
    fn ids_follow_registration_count() {
        assert_eq!(next_id(0), Ok(EntityId::new(0)));
        assert_eq!(next_id(41), Ok(EntityId::new(41)));
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn ids_beyond_u32_are_refused() {
        let overflow = usize::try_from(u64::from(u32::MAX) + 1).expect("64-bit usize");
        assert_eq!(next_id(overflow), Err(PlacementError::IdsExhausted));
    }

    #[test]
    fn register_indexes_every_domino_cell() {
        let mut registry = ObjectRegistry::new();
        let id = registry
            .register(domino(Cell::new(0, 0, 0), Direction::Forward))
            .expect("register domino");

        assert_eq!(registry.occupant(Cell::new(0, 0, 0)), Some(id));
        assert_eq!(registry.occupant(Cell::new(0, 0, 1)), Some(id));
        assert!(registry.is_free(Cell::new(0, 0, 2)));
        assert!(registry.verify().is_ok());
    }

    #[test]
    fn identifiers_follow_registration_order() {
        let mut registry = ObjectRegistry::new();
        let first = registry
            .register(unit(Archetype::RED, Role::Pushable, Cell::new(5, 0, 0)))
            .expect("first");
        let second = registry
            .register(unit(Archetype::RED, Role::Pushable, Cell::new(1, 0, 0)))
            .expect("second");

        assert_eq!(first.get(), 0);
        assert_eq!(second.get(), 1);
        assert_eq!(registry.ids(), vec![first, second]);
    }

    #[test]
    fn register_refuses_claimed_cells() {
        let mut registry = ObjectRegistry::new();
        let first = registry
            .register(unit(Archetype::RED, Role::Pushable, Cell::new(0, 0, 1)))
            .expect("first");

        let error = registry
            .register(domino(Cell::new(0, 0, 0), Direction::Forward))
            .expect_err("overlap");
        assert_eq!(
            error,
            PlacementError::Occupied {
                cell: Cell::new(0, 0, 1),
                occupant: first,
            }
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn second_player_is_refused() {
        let mut registry = ObjectRegistry::new();
        let player = registry
            .register(unit(Archetype::GREEN, Role::Player, Cell::new(0, 0, 0)))
            .expect("player");
        let error = registry
            .register(unit(Archetype::GREEN, Role::Player, Cell::new(3, 0, 0)))
            .expect_err("duplicate");
        assert_eq!(error, PlacementError::DuplicatePlayer(player));
        assert_eq!(registry.player().map(Entity::id), Some(player));
    }

    #[test]
    fn place_moves_footprint_atomically() {
        let mut registry = ObjectRegistry::new();
        let id = registry
            .register(domino(Cell::new(0, 0, 0), Direction::Right))
            .expect("domino");

        registry.place(id, Cell::new(1, 0, 0)).expect("overlapping self is fine");
        assert!(registry.is_free(Cell::new(0, 0, 0)));
        assert_eq!(registry.occupant(Cell::new(1, 0, 0)), Some(id));
        assert_eq!(registry.occupant(Cell::new(2, 0, 0)), Some(id));
        assert!(registry.verify().is_ok());
    }

    #[test]
    fn place_into_other_entity_is_a_no_op() {
        let mut registry = ObjectRegistry::new();
        let mover = registry
            .register(unit(Archetype::RED, Role::Pushable, Cell::new(0, 0, 0)))
            .expect("mover");
        let blocker = registry
            .register(unit(Archetype::RED, Role::Pushable, Cell::new(1, 0, 0)))
            .expect("blocker");

        let error = registry
            .place(mover, Cell::new(1, 0, 0))
            .expect_err("occupied");
        assert_eq!(
            error,
            PlacementError::Occupied {
                cell: Cell::new(1, 0, 0),
                occupant: blocker,
            }
        );
        assert_eq!(registry.occupant(Cell::new(0, 0, 0)), Some(mover));
    }

    #[test]
    fn killed_entities_leave_the_index_but_stay_registered() {
        let mut registry = ObjectRegistry::new();
        let id = registry
            .register(unit(Archetype::YELLOW, Role::Pushable, Cell::new(0, -11, 0)))
            .expect("register");

        registry.kill(id).expect("kill");
        assert!(registry.is_free(Cell::new(0, -11, 0)));
        let entity = registry.entity(id).expect("still registered");
        assert!(!entity.is_alive());
        assert_eq!(entity.anchor(), Cell::new(0, -11, 0));
        assert!(registry.verify().is_ok());

        registry.revive(id, Cell::new(0, 11, 0)).expect("revive");
        let entity = registry.entity(id).expect("registered");
        assert!(entity.is_alive());
        assert_eq!(registry.occupant(Cell::new(0, 11, 0)), Some(id));
    }

    #[test]
    fn freefall_requires_every_cell_unsupported() {
        let mut terrain = TerrainGrid::new();
        terrain.set(Cell::new(0, -1, 1), TerrainKind::Solid);

        let mut registry = ObjectRegistry::new();
        let half_supported = registry
            .register(domino(Cell::new(0, 0, 0), Direction::Forward))
            .expect("domino");
        let floating = registry
            .register(unit(Archetype::RED, Role::Pushable, Cell::new(5, 0, 0)))
            .expect("unit");

        assert!(!registry.is_in_freefall(half_supported, &terrain));
        assert!(registry.is_in_freefall(floating, &terrain));
    }

    #[test]
    fn entities_support_entities_above_them() {
        let terrain = TerrainGrid::new();
        let mut registry = ObjectRegistry::new();
        let lower = registry
            .register(unit(Archetype::RED, Role::Pushable, Cell::new(0, 0, 0)))
            .expect("lower");
        let upper = registry
            .register(unit(Archetype::RED, Role::Pushable, Cell::new(0, 1, 0)))
            .expect("upper");

        assert!(registry.is_in_freefall(lower, &terrain));
        assert!(!registry.is_in_freefall(upper, &terrain));
        assert_eq!(registry.passengers(lower), vec![upper]);

        registry.kill(lower).expect("kill");
        assert!(registry.is_in_freefall(upper, &terrain));
    }

    #[test]
    fn domino_passenger_is_listed_once() {
        let mut registry = ObjectRegistry::new();
        let base = registry
            .register(domino(Cell::new(0, 0, 0), Direction::Right))
            .expect("base");
        let rider = registry
            .register(domino(Cell::new(0, 1, 0), Direction::Right))
            .expect("rider");

        assert_eq!(registry.passengers(base), vec![rider]);
    }

    #[test]
    fn later_spawn_binding_wins() {
        let mut registry = ObjectRegistry::new();
        registry.register_spawn(SpawnBinding {
            archetype: Archetype::RED,
            cell: Cell::new(0, 0, 0),
        });
        registry.register_spawn(SpawnBinding {
            archetype: Archetype::RED,
            cell: Cell::new(4, 0, 0),
        });
        assert_eq!(registry.spawn_for(Archetype::RED), Some(Cell::new(4, 0, 0)));
        assert_eq!(registry.spawn_for(Archetype::BLUE), None);
        assert_eq!(registry.spawns().len(), 1);
    }
}
