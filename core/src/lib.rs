#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Stackfall engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Adapters submit [`Command`] values
//! describing desired mutations, the world executes those commands via its
//! `apply` entry point, and then broadcasts [`Event`] values describing every
//! resolved tick. Systems consume event streams, query immutable snapshots,
//! and respond exclusively with new command batches or plain values.

use std::{collections::HashMap, fmt};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default height at or below which a falling entity is destroyed.
pub const DEFAULT_DEATH_BOUND: i32 = -10;

/// Default number of cells above the spawn surface at which entities reappear.
pub const DEFAULT_RESPAWN_HEIGHT: i32 = 10;

/// Default upper bound on cascade ticks resolved for a single input.
pub const DEFAULT_MAX_CASCADE_TICKS: u32 = 100;

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Replaces the world contents with the provided level and settles it.
    LoadLevel {
        /// Terrain, bindings and entities describing the level.
        blueprint: LevelBlueprint,
    },
    /// Runs the gravity cascade without a preceding player move.
    Settle,
    /// Attempts to move the player one cell in the provided direction.
    Step {
        /// Direction of travel requested by the input layer.
        direction: Direction,
    },
    /// Restores the world to the state preceding the last resolved step.
    Undo,
    /// Restores the world to the state right after the level was loaded.
    Reset,
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Event {
    /// Confirms that a level was loaded into the world.
    LevelLoaded {
        /// Number of entities registered by the level.
        entities: usize,
    },
    /// Reports a single resolved tick and every movement it contained.
    TickResolved {
        /// Movements recorded during the tick.
        record: TickRecord,
    },
    /// Reports a non-fatal condition detected while resolving.
    DiagnosticRaised {
        /// Condition that was detected.
        diagnostic: Diagnostic,
    },
    /// Confirms that a step or settle pass completed.
    StepResolved {
        /// Number of non-empty ticks produced.
        ticks: usize,
        /// Whether the level was won once the world stabilised.
        won: bool,
    },
    /// Reports that a requested step produced no movement at all.
    StepRejected {
        /// Specific reason the step was refused.
        reason: RejectReason,
    },
    /// Announces that every exit condition of the level is satisfied.
    LevelCompleted,
    /// Confirms that the last resolved step was reverted.
    StepUndone {
        /// Number of steps that may still be undone.
        remaining: usize,
    },
    /// Reports that an undo was requested with an empty history.
    UndoUnavailable,
    /// Confirms that the level was restored to its loaded state.
    LevelReset,
}

/// Location of a single grid cell expressed as integer coordinates.
///
/// `y` points up; gravity pulls toward decreasing `y`.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Cell {
    x: i32,
    y: i32,
    z: i32,
}

impl Cell {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Position along the horizontal X axis.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    /// Height of the cell.
    #[must_use]
    pub const fn y(&self) -> i32 {
        self.y
    }

    /// Position along the horizontal Z axis.
    #[must_use]
    pub const fn z(&self) -> i32 {
        self.z
    }

    /// Translates the cell by the provided component offsets.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// Returns the neighbouring cell one unit away in `direction`.
    #[must_use]
    pub const fn step(self, direction: Direction) -> Self {
        let (dx, dy, dz) = direction.offset();
        self.offset(dx, dy, dz)
    }

    /// Cell directly above this one.
    #[must_use]
    pub const fn above(self) -> Self {
        self.offset(0, 1, 0)
    }

    /// Cell directly below this one.
    #[must_use]
    pub const fn below(self) -> Self {
        self.offset(0, -1, 0)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Unit movement directions along the three grid axes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    /// Movement toward increasing X.
    Right,
    /// Movement toward decreasing X.
    Left,
    /// Movement toward increasing Z.
    Forward,
    /// Movement toward decreasing Z.
    Backward,
    /// Movement toward increasing Y.
    Up,
    /// Movement toward decreasing Y.
    Down,
}

impl Direction {
    /// Component offsets of the unit vector described by the direction.
    #[must_use]
    pub const fn offset(self) -> (i32, i32, i32) {
        match self {
            Self::Right => (1, 0, 0),
            Self::Left => (-1, 0, 0),
            Self::Forward => (0, 0, 1),
            Self::Backward => (0, 0, -1),
            Self::Up => (0, 1, 0),
            Self::Down => (0, -1, 0),
        }
    }

    /// Reports whether the direction lies in the horizontal plane.
    #[must_use]
    pub const fn is_horizontal(self) -> bool {
        !matches!(self, Self::Up | Self::Down)
    }

    /// Converts a raw offset into a direction.
    ///
    /// Only offsets of length one along a single axis are accepted.
    pub fn from_offset(dx: i32, dy: i32, dz: i32) -> Result<Self, DirectionError> {
        match (dx, dy, dz) {
            (0, 0, 0) => Err(DirectionError::ZeroLength),
            (1, 0, 0) => Ok(Self::Right),
            (-1, 0, 0) => Ok(Self::Left),
            (0, 1, 0) => Ok(Self::Up),
            (0, -1, 0) => Ok(Self::Down),
            (0, 0, 1) => Ok(Self::Forward),
            (0, 0, -1) => Ok(Self::Backward),
            _ => Err(DirectionError::NotUnit { dx, dy, dz }),
        }
    }

    /// Direction leading from `from` to the adjacent cell `to`, if any.
    #[must_use]
    pub fn between(from: Cell, to: Cell) -> Option<Self> {
        Self::from_offset(to.x() - from.x(), to.y() - from.y(), to.z() - from.z()).ok()
    }
}

/// Reasons a raw offset or orientation cannot be used as a direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error)]
pub enum DirectionError {
    /// The offset has no length.
    #[error("direction offset has zero length")]
    ZeroLength,
    /// The offset is not a unit step along a single axis.
    #[error("offset ({dx}, {dy}, {dz}) is not a unit step along one axis")]
    NotUnit {
        /// X component of the rejected offset.
        dx: i32,
        /// Y component of the rejected offset.
        dy: i32,
        /// Z component of the rejected offset.
        dz: i32,
    },
    /// A horizontal direction was required.
    #[error("{0:?} is vertical; only horizontal directions are allowed here")]
    Vertical(Direction),
}

/// Terrain classification of a single cell.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum TerrainKind {
    /// Nothing; entities may pass and fall through.
    #[default]
    Empty,
    /// Impassable block.
    Solid,
    /// Walkable block marking a respawn surface.
    SpawnMarker,
    /// Walkable block marking an exit surface.
    ExitMarker,
}

impl TerrainKind {
    /// Reports whether entities may enter a cell of this kind.
    #[must_use]
    pub const fn is_passable(self) -> bool {
        !matches!(self, Self::Solid)
    }

    /// Reports whether an entity resting on a cell of this kind is held up.
    #[must_use]
    pub const fn supports(self) -> bool {
        !matches!(self, Self::Empty)
    }
}

/// Respawn and win group an entity belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Archetype(u8);

impl Archetype {
    /// Green group; the player belongs to it.
    pub const GREEN: Archetype = Archetype(0);
    /// Red group.
    pub const RED: Archetype = Archetype(1);
    /// Blue group.
    pub const BLUE: Archetype = Archetype(2);
    /// Yellow group.
    pub const YELLOW: Archetype = Archetype(3);

    /// Creates an archetype from its numeric value.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the archetype.
    #[must_use]
    pub const fn get(&self) -> u8 {
        self.0
    }

    /// Human readable colour name of the archetype.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self.0 {
            0 => "green",
            1 => "red",
            2 => "blue",
            3 => "yellow",
            _ => "unnamed",
        }
    }
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unique identifier assigned to an entity at registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u32);

impl EntityId {
    /// Creates a new entity identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Behavioural role of an entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Entity steered by player input.
    Player,
    /// Box that can be pushed and carried.
    Pushable,
}

/// Cells claimed by an entity relative to its anchor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Footprint {
    /// Occupies the anchor cell only.
    Unit,
    /// Occupies the anchor and the horizontally adjacent cell along `orientation`.
    Domino {
        /// Horizontal direction from the anchor to the second cell.
        orientation: Direction,
    },
}

impl Footprint {
    /// Creates a domino footprint, rejecting vertical orientations.
    pub fn domino(orientation: Direction) -> Result<Self, DirectionError> {
        if orientation.is_horizontal() {
            Ok(Self::Domino { orientation })
        } else {
            Err(DirectionError::Vertical(orientation))
        }
    }

    /// Enumerates the cells claimed when anchored at `anchor`.
    #[must_use]
    pub fn cells(self, anchor: Cell) -> OccupiedCells {
        match self {
            Self::Unit => OccupiedCells::single(anchor),
            Self::Domino { orientation } => OccupiedCells::pair(anchor, anchor.step(orientation)),
        }
    }
}

/// Iterator over the one or two cells claimed by a footprint.
#[derive(Clone, Copy, Debug)]
pub struct OccupiedCells {
    cells: [Cell; 2],
    len: usize,
    cursor: usize,
}

impl OccupiedCells {
    const fn single(cell: Cell) -> Self {
        Self {
            cells: [cell, cell],
            len: 1,
            cursor: 0,
        }
    }

    const fn pair(first: Cell, second: Cell) -> Self {
        Self {
            cells: [first, second],
            len: 2,
            cursor: 0,
        }
    }

    /// Reports whether `cell` belongs to the footprint.
    #[must_use]
    pub fn contains(&self, cell: Cell) -> bool {
        self.cells[..self.len].contains(&cell)
    }
}

impl Iterator for OccupiedCells {
    type Item = Cell;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.len {
            return None;
        }

        let cell = self.cells[self.cursor];
        self.cursor += 1;
        Some(cell)
    }
}

/// Description of an entity to register when a level loads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntitySeed {
    /// Respawn and win group of the entity.
    pub archetype: Archetype,
    /// Behavioural role of the entity.
    pub role: Role,
    /// Shape of the entity.
    pub footprint: Footprint,
    /// Primary cell occupied by the entity.
    pub anchor: Cell,
}

/// Immutable representation of a single entity's state used for queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EntitySnapshot {
    /// Identifier allocated to the entity at registration.
    pub id: EntityId,
    /// Respawn and win group of the entity.
    pub archetype: Archetype,
    /// Behavioural role of the entity.
    pub role: Role,
    /// Shape of the entity.
    pub footprint: Footprint,
    /// Primary cell occupied by the entity.
    pub anchor: Cell,
    /// Whether the entity currently takes part in the simulation.
    pub alive: bool,
}

impl EntitySnapshot {
    /// Cells claimed by the entity at its current anchor.
    #[must_use]
    pub fn cells(&self) -> OccupiedCells {
        self.footprint.cells(self.anchor)
    }
}

/// Read-only snapshot describing every registered entity.
#[derive(Clone, Debug, Default)]
pub struct EntityView {
    snapshots: Vec<EntitySnapshot>,
}

impl EntityView {
    /// Creates a new entity view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<EntitySnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured snapshots in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &EntitySnapshot> {
        self.snapshots.iter()
    }

    /// Looks up the snapshot of a specific entity.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&EntitySnapshot> {
        self.snapshots
            .binary_search_by_key(&id, |snapshot| snapshot.id)
            .ok()
            .map(|index| &self.snapshots[index])
    }

    /// Consumes the view, yielding the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<EntitySnapshot> {
        self.snapshots
    }
}

/// Read-only view into the sparse occupancy index of live entities.
#[derive(Clone, Copy, Debug)]
pub struct OccupancyView<'a> {
    cells: &'a HashMap<Cell, EntityId>,
}

impl<'a> OccupancyView<'a> {
    /// Captures a new occupancy view backed by the provided index.
    #[must_use]
    pub fn new(cells: &'a HashMap<Cell, EntityId>) -> Self {
        Self { cells }
    }

    /// Returns the live entity occupying the provided cell, if any.
    #[must_use]
    pub fn occupant(&self, cell: Cell) -> Option<EntityId> {
        self.cells.get(&cell).copied()
    }

    /// Reports whether no live entity occupies the cell.
    #[must_use]
    pub fn is_free(&self, cell: Cell) -> bool {
        !self.cells.contains_key(&cell)
    }
}

/// Terrain cell at which an archetype respawns.
///
/// Entities reappear above `cell`, never inside it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpawnBinding {
    /// Group that respawns at the binding.
    pub archetype: Archetype,
    /// Terrain cell directly below the spawn surface.
    pub cell: Cell,
}

/// Terrain cell that an archetype must stand on to win the level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExitBinding {
    /// Group that satisfies the exit.
    pub archetype: Archetype,
    /// Terrain cell directly below the exit surface.
    pub cell: Cell,
}

impl ExitBinding {
    /// Cell that a matching entity must occupy.
    #[must_use]
    pub const fn surface(&self) -> Cell {
        self.cell.above()
    }
}

/// Everything required to populate a world with a level.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelBlueprint {
    /// Classified terrain cells; unspecified cells are empty.
    pub terrain: Vec<(Cell, TerrainKind)>,
    /// Respawn locations keyed by archetype.
    pub spawns: Vec<SpawnBinding>,
    /// Exit locations that must all be satisfied to win.
    pub exits: Vec<ExitBinding>,
    /// Entities registered in order; order defines tick iteration order.
    pub entities: Vec<EntitySeed>,
}

/// Kind of change recorded for an entity during a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementKind {
    /// Entity moved of its own accord or was carried.
    Move,
    /// Entity was shoved by the player.
    Push,
    /// Entity dropped one cell under gravity.
    Fall,
    /// Entity was destroyed below the death bound.
    Die,
    /// Entity reappeared above its spawn surface.
    Respawn,
}

/// Single entity change recorded during a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Movement {
    /// Entity that changed.
    pub entity: EntityId,
    /// Anchor before the change.
    pub from: Cell,
    /// Anchor after the change; equals `from` for deaths.
    pub to: Cell,
    /// Nature of the change.
    pub kind: MovementKind,
}

/// Ordered movements produced by one discrete resolution tick.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TickRecord {
    /// Position of the tick within its step; zero is the player's move.
    pub index: u32,
    /// Movements in the order they were applied.
    pub movements: Vec<Movement>,
}

impl TickRecord {
    /// Creates an empty record for the tick at `index`.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self {
            index,
            movements: Vec::new(),
        }
    }

    /// Reports whether the tick moved nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.movements.is_empty()
    }
}

/// Non-fatal conditions reported while resolving.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Diagnostic {
    /// A dead entity has no spawn binding for its archetype and stays dead.
    MissingSpawnBinding {
        /// Entity that could not respawn.
        entity: EntityId,
        /// Archetype lacking a binding.
        archetype: Archetype,
    },
    /// The respawn location was obstructed; the entity stays dead this tick.
    RespawnBlocked {
        /// Entity that could not respawn.
        entity: EntityId,
        /// Anchor the entity would have respawned at.
        at: Cell,
    },
    /// The cascade stopped at its tick bound while entities were still moving.
    SafetyBoundReached {
        /// Number of cascade ticks that were resolved.
        ticks: u32,
    },
}

/// Full outcome of a resolved step or settle pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    /// Non-empty ticks in resolution order.
    pub ticks: Vec<TickRecord>,
    /// Whether the level was won once the world stabilised.
    pub won: bool,
    /// Conditions worth surfacing to diagnostics.
    pub diagnostics: Vec<Diagnostic>,
}

impl StepResult {
    /// Reports whether nothing moved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    /// Iterator over every movement across all ticks.
    pub fn movements(&self) -> impl Iterator<Item = &Movement> {
        self.ticks.iter().flat_map(|tick| tick.movements.iter())
    }
}

/// Reasons a step request is refused without moving anything.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectReason {
    /// Another step is still being resolved.
    Busy,
    /// No player is registered.
    MissingPlayer,
    /// The player is dead and awaiting respawn.
    PlayerDead,
    /// Player steps must be horizontal.
    VerticalDirection,
    /// The destination is solid terrain.
    BlockedByTerrain {
        /// Solid cell that blocked the move.
        cell: Cell,
    },
    /// The entity in the way cannot be pushed.
    BlockedPush {
        /// Entity that refused to move.
        pushee: EntityId,
    },
}

/// Outcome of a step request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// The input was accepted and fully resolved.
    Resolved(StepResult),
    /// The input was refused; the world is unchanged.
    Rejected(RejectReason),
}

/// Broken occupancy invariants detected mid-resolution.
///
/// These indicate programming errors and abort the current resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    /// Two live entities attempted to claim the same cell.
    #[error("entity {claimant} tried to claim {cell} already held by {occupant}")]
    CellClaimed {
        /// Cell both entities claimed.
        cell: Cell,
        /// Entity that attempted the claim.
        claimant: EntityId,
        /// Entity already holding the cell.
        occupant: EntityId,
    },
    /// An identifier did not resolve to a registered entity.
    #[error("entity {0} is not registered")]
    UnknownEntity(EntityId),
}

/// Reasons an entity cannot be placed into the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum PlacementError {
    /// A target cell is held by a different live entity.
    #[error("{cell} is already occupied by {occupant}")]
    Occupied {
        /// Contested cell.
        cell: Cell,
        /// Entity holding the cell.
        occupant: EntityId,
    },
    /// The entity is not registered.
    #[error("entity {0} is not registered")]
    UnknownEntity(EntityId),
    /// Every entity identifier is already in use.
    #[error("no entity identifiers left")]
    IdsExhausted,
    /// A second player was registered while one already exists.
    #[error("a player is already registered as {0}")]
    DuplicatePlayer(EntityId),
}

/// Tunable parameters of the resolver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Falling entities at or below this height are destroyed.
    pub death_bound: i32,
    /// Height above the spawn surface at which entities reappear.
    pub respawn_height: i32,
    /// Maximum cascade ticks resolved per step before giving up.
    pub max_cascade_ticks: u32,
    /// Accept a live player on exit terrain as a win when no exits are bound.
    pub player_exit_shortcut: bool,
}

impl ResolverConfig {
    /// Creates a configuration with explicit bounds and the shortcut disabled.
    #[must_use]
    pub const fn new(death_bound: i32, respawn_height: i32, max_cascade_ticks: u32) -> Self {
        Self {
            death_bound,
            respawn_height,
            max_cascade_ticks,
            player_exit_shortcut: false,
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self::new(
            DEFAULT_DEATH_BOUND,
            DEFAULT_RESPAWN_HEIGHT,
            DEFAULT_MAX_CASCADE_TICKS,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Archetype, Cell, Diagnostic, Direction, DirectionError, EntityId, Event, Footprint,
        Movement, MovementKind, RejectReason, ResolverConfig, TerrainKind, TickRecord,
    };
    use serde::{de::DeserializeOwned, Serialize};

    fn assert_round_trip<T>(value: &T)
    where
        T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug,
    {
        let bytes = bincode::serialize(value).expect("serialize");
        let restored: T = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(&restored, value);
    }

    #[test]
    fn step_follows_direction_offsets() {
        let origin = Cell::new(2, 0, -3);
        assert_eq!(origin.step(Direction::Right), Cell::new(3, 0, -3));
        assert_eq!(origin.step(Direction::Left), Cell::new(1, 0, -3));
        assert_eq!(origin.step(Direction::Forward), Cell::new(2, 0, -2));
        assert_eq!(origin.step(Direction::Backward), Cell::new(2, 0, -4));
        assert_eq!(origin.above(), Cell::new(2, 1, -3));
        assert_eq!(origin.below(), Cell::new(2, -1, -3));
    }

    #[test]
    fn from_offset_rejects_malformed_vectors() {
        assert_eq!(
            Direction::from_offset(0, 0, 0),
            Err(DirectionError::ZeroLength)
        );
        assert_eq!(
            Direction::from_offset(1, 0, 1),
            Err(DirectionError::NotUnit {
                dx: 1,
                dy: 0,
                dz: 1
            })
        );
        assert_eq!(
            Direction::from_offset(0, 0, 2),
            Err(DirectionError::NotUnit {
                dx: 0,
                dy: 0,
                dz: 2
            })
        );
        assert_eq!(Direction::from_offset(0, -1, 0), Ok(Direction::Down));
    }

    #[test]
    fn between_recovers_adjacent_direction() {
        let from = Cell::new(4, 1, 4);
        assert_eq!(
            Direction::between(from, Cell::new(4, 1, 5)),
            Some(Direction::Forward)
        );
        assert_eq!(Direction::between(from, Cell::new(6, 1, 4)), None);
    }

    #[test]
    fn domino_footprint_rejects_vertical_orientation() {
        assert_eq!(
            Footprint::domino(Direction::Up),
            Err(DirectionError::Vertical(Direction::Up))
        );
        assert!(Footprint::domino(Direction::Left).is_ok());
    }

    #[test]
    fn domino_footprint_claims_anchor_and_neighbour() {
        let footprint = Footprint::Domino {
            orientation: Direction::Forward,
        };
        let cells: Vec<Cell> = footprint.cells(Cell::new(0, 0, 0)).collect();
        assert_eq!(cells, vec![Cell::new(0, 0, 0), Cell::new(0, 0, 1)]);
        assert!(footprint.cells(Cell::new(0, 0, 0)).contains(Cell::new(0, 0, 1)));
        assert!(!footprint.cells(Cell::new(0, 0, 0)).contains(Cell::new(0, 0, 2)));
    }

    #[test]
    fn unit_footprint_claims_single_cell() {
        let cells: Vec<Cell> = Footprint::Unit.cells(Cell::new(1, 2, 3)).collect();
        assert_eq!(cells, vec![Cell::new(1, 2, 3)]);
    }

    #[test]
    fn terrain_passability_and_support() {
        assert!(TerrainKind::Empty.is_passable());
        assert!(!TerrainKind::Empty.supports());
        assert!(!TerrainKind::Solid.is_passable());
        assert!(TerrainKind::SpawnMarker.is_passable());
        assert!(TerrainKind::ExitMarker.supports());
    }

    #[test]
    fn archetype_names_match_tile_colours() {
        assert_eq!(Archetype::GREEN.to_string(), "green");
        assert_eq!(Archetype::YELLOW.name(), "yellow");
        assert_eq!(Archetype::new(9).name(), "unnamed");
    }

    #[test]
    fn default_config_matches_engine_constants() {
        let config = ResolverConfig::default();
        assert_eq!(config.death_bound, -10);
        assert_eq!(config.respawn_height, 10);
        assert_eq!(config.max_cascade_ticks, 100);
        assert!(!config.player_exit_shortcut);
    }

    #[test]
    fn tick_record_round_trips_through_bincode() {
        let record = TickRecord {
            index: 3,
            movements: vec![Movement {
                entity: EntityId::new(1),
                from: Cell::new(0, 5, 0),
                to: Cell::new(0, 4, 0),
                kind: MovementKind::Fall,
            }],
        };
        assert_round_trip(&record);
    }

    #[test]
    fn resolver_config_round_trips_through_bincode() {
        assert_round_trip(&ResolverConfig::new(-4, 6, 12));
    }

    #[test]
    fn events_round_trip_through_bincode() {
        let events = vec![
            Event::DiagnosticRaised {
                diagnostic: Diagnostic::RespawnBlocked {
                    entity: EntityId::new(2),
                    at: Cell::new(0, 11, 0),
                },
            },
            Event::StepRejected {
                reason: RejectReason::BlockedPush {
                    pushee: EntityId::new(1),
                },
            },
            Event::LevelCompleted,
        ];
        assert_round_trip(&events);
    }

    #[test]
    fn cell_display_lists_coordinates() {
        assert_eq!(Cell::new(1, -2, 3).to_string(), "(1, -2, 3)");
        assert_eq!(EntityId::new(7).to_string(), "#7");
    }
}
