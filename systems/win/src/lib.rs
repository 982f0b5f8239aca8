#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure win evaluator that checks exit bindings against the live entities.

use stackfall_core::{Archetype, Cell, ExitBinding, TerrainKind};

/// Conditions under which a level counts as complete.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WinPolicy {
    /// Every exit binding must hold a live entity of its archetype.
    #[default]
    ExitBindings,
    /// As [`WinPolicy::ExitBindings`], but a level without exit bindings is
    /// also complete once the live player stands on exit terrain.
    ExitBindingsOrPlayerOnExit,
}

impl WinPolicy {
    /// Selects the policy matching the resolver's shortcut flag.
    #[must_use]
    pub const fn from_shortcut(enabled: bool) -> Self {
        if enabled {
            Self::ExitBindingsOrPlayerOnExit
        } else {
            Self::ExitBindings
        }
    }
}

/// Evaluates level completion under a fixed policy.
#[derive(Clone, Copy, Debug, Default)]
pub struct WinEvaluator {
    policy: WinPolicy,
}

impl WinEvaluator {
    /// Creates an evaluator using the provided policy.
    #[must_use]
    pub const fn new(policy: WinPolicy) -> Self {
        Self { policy }
    }

    /// Reports whether the level is complete.
    ///
    /// `player` is the anchor of the live player, if any. `terrain_at` and
    /// `archetype_at` should mirror the world's terrain and live-occupancy
    /// queries; `archetype_at` must ignore dead entities.
    pub fn evaluate<T, A>(
        &self,
        exits: &[ExitBinding],
        player: Option<Cell>,
        terrain_at: T,
        archetype_at: A,
    ) -> bool
    where
        T: Fn(Cell) -> TerrainKind,
        A: FnMut(Cell) -> Option<Archetype>,
    {
        if exits.is_empty() {
            return match self.policy {
                WinPolicy::ExitBindings => false,
                WinPolicy::ExitBindingsOrPlayerOnExit => player
                    .map_or(false, |cell| terrain_at(cell.below()) == TerrainKind::ExitMarker),
            };
        }

        exits_satisfied(exits, archetype_at)
    }
}

/// Reports whether every exit holds a live entity of the bound archetype.
///
/// An empty binding list is never satisfied.
pub fn exits_satisfied<A>(exits: &[ExitBinding], mut archetype_at: A) -> bool
where
    A: FnMut(Cell) -> Option<Archetype>,
{
    if exits.is_empty() {
        return false;
    }

    exits
        .iter()
        .all(|exit| archetype_at(exit.surface()) == Some(exit.archetype))
}
