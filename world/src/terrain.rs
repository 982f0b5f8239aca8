//! Sparse terrain classification used by the world crate.

use std::collections::HashMap;

use stackfall_core::{Cell, TerrainKind};

/// Sparse map from integer cell to terrain classification.
///
/// Cells that were never set read as [`TerrainKind::Empty`]. The grid is
/// populated when a level loads and is only read while resolving steps.
#[derive(Clone, Debug, Default)]
pub struct TerrainGrid {
    cells: HashMap<Cell, TerrainKind>,
}

impl TerrainGrid {
    /// Creates an empty terrain grid.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Terrain classification of the provided cell.
    #[must_use]
    pub fn kind_at(&self, cell: Cell) -> TerrainKind {
        self.cells.get(&cell).copied().unwrap_or_default()
    }

    /// Classifies a cell, replacing any previous classification.
    pub fn set(&mut self, cell: Cell, kind: TerrainKind) {
        if kind == TerrainKind::Empty {
            let _ = self.cells.remove(&cell);
        } else {
            let _ = self.cells.insert(cell, kind);
        }
    }

    /// Removes every classified cell.
    pub fn clear(&mut self) {
        self.cells.clear();
    }

    /// Reports whether entities may enter the cell.
    #[must_use]
    pub fn is_passable(&self, cell: Cell) -> bool {
        self.kind_at(cell).is_passable()
    }

    /// Reports whether an entity standing directly above the cell is held up.
    #[must_use]
    pub fn supports(&self, cell: Cell) -> bool {
        self.kind_at(cell).supports()
    }

    /// Number of non-empty cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Reports whether no cell is classified.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
