use stackfall_core::{Archetype, Cell, Command, Direction, Event, Footprint, Role, TerrainKind};
use stackfall_system_level_loader::{build_blueprint, BlueprintError, TileEntry};
use stackfall_world::{self as world, query, World};

fn tile(x: i32, y: i32, z: i32, tile_id: i32) -> TileEntry {
    TileEntry::new(Cell::new(x, y, z), tile_id)
}

/// A strip of floor with the player on the left, a red domino in the
/// middle and a green exit on the right.
fn strip_level() -> Vec<TileEntry> {
    let mut tiles: Vec<TileEntry> = (0..6).map(|x| tile(x, 0, 0, 0)).collect();
    tiles.push(tile(0, 1, 0, 1));
    tiles.push(tile(2, 1, 0, 2));
    tiles.push(tile(2, 1, 1, 2));
    tiles.push(tile(5, 1, 0, 5));
    tiles
}

#[test]
fn blueprint_loads_into_world() {
    let blueprint = build_blueprint(&strip_level()).expect("blueprint");
    let mut world = World::new();
    let mut events = Vec::new();
    world::apply(&mut world, Command::LoadLevel { blueprint }, &mut events).expect("load");

    assert_eq!(events.first(), Some(&Event::LevelLoaded { entities: 2 }));
    assert_eq!(
        query::terrain_at(&world, Cell::new(0, 0, 0)),
        TerrainKind::SpawnMarker
    );
    assert_eq!(
        query::terrain_at(&world, Cell::new(2, 0, 0)),
        TerrainKind::SpawnMarker
    );
    assert_eq!(
        query::terrain_at(&world, Cell::new(5, 0, 0)),
        TerrainKind::ExitMarker
    );
    assert_eq!(query::terrain_at(&world, Cell::new(1, 0, 0)), TerrainKind::Solid);

    let player = query::player(&world).expect("player");
    assert_eq!(player.role, Role::Player);
    assert_eq!(player.archetype, Archetype::GREEN);
    assert_eq!(player.anchor, Cell::new(0, 1, 0));

    let view = query::entity_view(&world);
    let domino = view
        .iter()
        .find(|snapshot| snapshot.role == Role::Pushable)
        .expect("domino");
    assert_eq!(domino.archetype, Archetype::RED);
    assert_eq!(domino.anchor, Cell::new(2, 1, 1));
    assert_eq!(
        domino.footprint,
        Footprint::Domino {
            orientation: Direction::Backward
        }
    );
}

#[test]
fn player_walks_to_the_exit_of_a_loaded_level() {
    let mut tiles: Vec<TileEntry> = (0..4).map(|x| tile(x, 0, 0, 0)).collect();
    tiles.push(tile(0, 1, 0, 1));
    tiles.push(tile(3, 1, 0, 5));
    let blueprint = build_blueprint(&tiles).expect("blueprint");

    let mut world = World::new();
    let mut events = Vec::new();
    world::apply(&mut world, Command::LoadLevel { blueprint }, &mut events).expect("load");
    for _ in 0..3 {
        events.clear();
        world::apply(
            &mut world,
            Command::Step {
                direction: Direction::Right,
            },
            &mut events,
        )
        .expect("step");
    }

    assert_eq!(events.last(), Some(&Event::LevelCompleted));
}

#[test]
fn duplicated_player_marker_is_a_format_error() {
    let tiles = [tile(0, 1, 0, 1), tile(0, 1, 3, 1)];
    assert!(matches!(
        build_blueprint(&tiles),
        Err(BlueprintError::MultiplePlayers { .. })
    ));
}
