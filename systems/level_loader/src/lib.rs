#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Converts raw level tile lists into world blueprints.
//!
//! Levels are authored as flat lists of `(cell, tile_id)` pairs. Tile `0` is
//! terrain, tiles `1..=4` are spawn markers and tiles `5..=8` are exit markers
//! for the green, red, blue and yellow archetypes. Marker tiles describe the
//! occupiable cell; the terrain cell directly below them is reclassified.

use std::collections::BTreeMap;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use stackfall_core::{
    Archetype, Cell, Direction, DirectionError, EntitySeed, ExitBinding, Footprint,
    LevelBlueprint, Role, SpawnBinding, TerrainKind,
};
use thiserror::Error;

/// Tile identifier of plain terrain.
pub const TERRAIN_TILE: i32 = 0;
/// Spawn marker tile that also produces the player.
pub const PLAYER_TILE: i32 = 1;

const FIRST_SPAWN_TILE: i32 = 1;
const FIRST_EXIT_TILE: i32 = 5;
const LAST_EXIT_TILE: i32 = 8;
const ARCHETYPE_COUNT: i32 = 4;

/// Single entry of a level file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileEntry {
    /// Cell the tile was authored at.
    pub position: Cell,
    /// Raw tile identifier.
    pub tile_id: i32,
}

impl TileEntry {
    /// Creates a new tile entry.
    #[must_use]
    pub const fn new(position: Cell, tile_id: i32) -> Self {
        Self { position, tile_id }
    }
}

/// Meaning of a recognised tile identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TileKind {
    /// Terrain block, solid unless a marker reclassifies it.
    Terrain,
    /// Spawn marker for the archetype.
    Spawn(Archetype),
    /// Exit marker for the archetype.
    Exit(Archetype),
}

impl TileKind {
    /// Classifies a raw tile identifier; unknown identifiers yield `None`.
    #[must_use]
    pub fn classify(tile_id: i32) -> Option<Self> {
        match tile_id {
            TERRAIN_TILE => Some(Self::Terrain),
            FIRST_SPAWN_TILE..=LAST_EXIT_TILE => {
                let archetype = archetype_of(tile_id);
                if tile_id < FIRST_EXIT_TILE {
                    Some(Self::Spawn(archetype))
                } else {
                    Some(Self::Exit(archetype))
                }
            }
            _ => None,
        }
    }
}

/// Errors raised while turning a tile list into a blueprint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum BlueprintError {
    /// More than one unpaired player marker was found.
    #[error("level defines more than one player: {first} and {second}")]
    MultiplePlayers {
        /// Cell of the first player marker.
        first: Cell,
        /// Cell of the conflicting player marker.
        second: Cell,
    },
    /// A paired marker did not describe a valid domino orientation.
    #[error("invalid domino pairing: {0}")]
    Orientation(#[from] DirectionError),
}

/// Builds a level blueprint from the provided tiles.
///
/// Unknown tile identifiers are logged and skipped. Spawn markers of the same
/// identifier that sit horizontally next to each other are merged into
/// dominoes, greedily in file order. Identifiers are formed in the order
/// they first appear.
pub fn build_blueprint(tiles: &[TileEntry]) -> Result<LevelBlueprint, BlueprintError> {
    let mut solids = Vec::new();
    let mut markers: BTreeMap<Cell, TerrainKind> = BTreeMap::new();
    let mut spawns: BTreeMap<Archetype, Cell> = BTreeMap::new();
    let mut exits = Vec::new();
    let mut groups: Vec<(i32, Vec<Cell>)> = Vec::new();

    for tile in tiles {
        let position = tile.position;
        match TileKind::classify(tile.tile_id) {
            Some(TileKind::Terrain) => solids.push(position),
            Some(TileKind::Spawn(archetype)) => {
                let _ = markers.insert(position.below(), TerrainKind::SpawnMarker);
                let _ = spawns.insert(archetype, position.below());
                match groups.iter_mut().find(|(id, _)| *id == tile.tile_id) {
                    Some((_, positions)) => positions.push(position),
                    None => groups.push((tile.tile_id, vec![position])),
                }
            }
            Some(TileKind::Exit(archetype)) => {
                let _ = markers.insert(position.below(), TerrainKind::ExitMarker);
                exits.push(ExitBinding {
                    archetype,
                    cell: position.below(),
                });
            }
            None => warn!("skipping unknown tile id {} at {position}", tile.tile_id),
        }
    }

    let mut terrain: Vec<(Cell, TerrainKind)> = solids
        .into_iter()
        .filter(|cell| !markers.contains_key(cell))
        .map(|cell| (cell, TerrainKind::Solid))
        .collect();
    terrain.extend(markers);

    let mut entities = Vec::new();
    let mut player = None;
    for (tile_id, positions) in &groups {
        form_entities(*tile_id, positions, &mut player, &mut entities)?;
    }

    debug!(
        "blueprint: {} terrain cells, {} entities, {} spawns, {} exits",
        terrain.len(),
        entities.len(),
        spawns.len(),
        exits.len()
    );

    Ok(LevelBlueprint {
        terrain,
        spawns: spawns
            .into_iter()
            .map(|(archetype, cell)| SpawnBinding { archetype, cell })
            .collect(),
        exits,
        entities,
    })
}

fn form_entities(
    tile_id: i32,
    positions: &[Cell],
    player: &mut Option<Cell>,
    entities: &mut Vec<EntitySeed>,
) -> Result<(), BlueprintError> {
    let archetype = archetype_of(tile_id);
    let mut used = vec![false; positions.len()];

    for index in 0..positions.len() {
        if used[index] {
            continue;
        }
        used[index] = true;
        let first = positions[index];

        let partner = (index + 1..positions.len())
            .filter(|&candidate| !used[candidate])
            .find_map(|candidate| {
                horizontal_direction(positions[candidate], first)
                    .map(|orientation| (candidate, orientation))
            });

        if let Some((partner, orientation)) = partner {
            used[partner] = true;
            entities.push(EntitySeed {
                archetype,
                role: Role::Pushable,
                footprint: Footprint::domino(orientation)?,
                anchor: positions[partner],
            });
            continue;
        }

        let role = if tile_id == PLAYER_TILE {
            if let Some(existing) = *player {
                return Err(BlueprintError::MultiplePlayers {
                    first: existing,
                    second: first,
                });
            }
            *player = Some(first);
            Role::Player
        } else {
            Role::Pushable
        };

        entities.push(EntitySeed {
            archetype,
            role,
            footprint: Footprint::Unit,
            anchor: first,
        });
    }

    Ok(())
}

/// Direction from `from` to `to` when the two cells are horizontal neighbours.
fn horizontal_direction(from: Cell, to: Cell) -> Option<Direction> {
    Direction::between(from, to).filter(|direction| direction.is_horizontal())
}

fn archetype_of(tile_id: i32) -> Archetype {
    Archetype::new(((tile_id - FIRST_SPAWN_TILE).rem_euclid(ARCHETYPE_COUNT)) as u8)
}
