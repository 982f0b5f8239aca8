use std::{error::Error, fmt, fs, io, path::Path};

use serde::Deserialize;
use stackfall_system_level_loader::TileEntry;

/// Wrapped form of a level document.
#[derive(Debug, Deserialize)]
struct TileList {
    tiles: Vec<TileEntry>,
}

/// Reads and parses the level file at `path`.
pub(crate) fn read_tiles(path: &Path) -> Result<Vec<TileEntry>, LevelFileError> {
    let contents = fs::read_to_string(path).map_err(LevelFileError::Unreadable)?;
    parse_tiles(&contents)
}

/// Parses a level document.
///
/// Accepts either a bare array of tile entries or an object holding them
/// under `tiles`.
pub(crate) fn parse_tiles(contents: &str) -> Result<Vec<TileEntry>, LevelFileError> {
    let trimmed = contents.trim();
    if trimmed.is_empty() {
        return Err(LevelFileError::EmptyDocument);
    }

    if trimmed.starts_with('[') {
        serde_json::from_str(trimmed).map_err(LevelFileError::InvalidTiles)
    } else {
        serde_json::from_str::<TileList>(trimmed)
            .map(|list| list.tiles)
            .map_err(LevelFileError::InvalidTiles)
    }
}

/// Errors that can occur while reading level files.
#[derive(Debug)]
pub(crate) enum LevelFileError {
    /// The file could not be read.
    Unreadable(io::Error),
    /// The file was empty or contained only whitespace.
    EmptyDocument,
    /// The document was not a valid tile list.
    InvalidTiles(serde_json::Error),
}

impl fmt::Display for LevelFileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreadable(error) => write!(f, "could not read level file: {error}"),
            Self::EmptyDocument => write!(f, "level file was empty"),
            Self::InvalidTiles(error) => write!(f, "could not parse level tiles: {error}"),
        }
    }
}

impl Error for LevelFileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Unreadable(error) => Some(error),
            Self::InvalidTiles(error) => Some(error),
            Self::EmptyDocument => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackfall_core::Cell;

    #[test]
    fn parses_bare_array() {
        let tiles = parse_tiles(
            r#"[
                {"position": {"x": 0, "y": 0, "z": 0}, "tile_id": 0},
                {"position": {"x": 0, "y": 1, "z": 0}, "tile_id": 1}
            ]"#,
        )
        .expect("tiles parse");

        assert_eq!(
            tiles,
            vec![
                TileEntry::new(Cell::new(0, 0, 0), 0),
                TileEntry::new(Cell::new(0, 1, 0), 1),
            ]
        );
    }

    #[test]
    fn parses_wrapped_list() {
        let tiles = parse_tiles(
            r#"  {"tiles": [{"position": {"x": -2, "y": 3, "z": 7}, "tile_id": 6}]}  "#,
        )
        .expect("tiles parse");

        assert_eq!(tiles, vec![TileEntry::new(Cell::new(-2, 3, 7), 6)]);
    }

    #[test]
    fn rejects_blank_documents() {
        assert!(matches!(
            parse_tiles(" \n "),
            Err(LevelFileError::EmptyDocument)
        ));
    }

    #[test]
    fn rejects_entries_without_position() {
        let error = parse_tiles(r#"[{"tile_id": 0}]"#).expect_err("missing position");
        assert!(matches!(error, LevelFileError::InvalidTiles(_)));
        assert!(error.to_string().contains("position"));
    }
}
