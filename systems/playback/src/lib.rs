#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Scripted input system that replays key presses as world commands.

use std::collections::VecDeque;

use log::debug;
use stackfall_core::{Command, Direction, Event};
use thiserror::Error;

/// Errors raised while parsing an input script.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum ScriptError {
    /// The script contained a character that maps to no action.
    #[error("unknown key '{key}' at position {position}")]
    UnknownKey {
        /// Offending character.
        key: char,
        /// Character index of the key within the script.
        position: usize,
    },
}

/// Maps a single key to the command it triggers.
///
/// `w`/`a`/`s`/`d` and `k`/`h`/`j`/`l` step forward, left, backward and right;
/// `u` undoes and `r` resets. Keys are case-insensitive.
#[must_use]
pub fn command_for_key(key: char) -> Option<Command> {
    let direction = match key.to_ascii_lowercase() {
        'w' | 'k' => Direction::Forward,
        'a' | 'h' => Direction::Left,
        's' | 'j' => Direction::Backward,
        'd' | 'l' => Direction::Right,
        'u' => return Some(Command::Undo),
        'r' => return Some(Command::Reset),
        _ => return None,
    };
    Some(Command::Step { direction })
}

/// Parses a key script into commands. Whitespace and commas are ignored.
pub fn parse_script(script: &str) -> Result<Vec<Command>, ScriptError> {
    script
        .chars()
        .enumerate()
        .filter(|(_, key)| !key.is_whitespace() && *key != ',')
        .map(|(position, key)| {
            command_for_key(key).ok_or(ScriptError::UnknownKey { key, position })
        })
        .collect()
}

/// Pure system that feeds queued commands to the world one at a time.
///
/// A new command is released whenever the previous one has been answered by
/// the world. Playback stops for good once the level is completed.
#[derive(Debug, Default)]
pub struct Playback {
    pending: VecDeque<Command>,
    issued: usize,
    completed: bool,
}

impl Playback {
    /// Creates a playback that will issue `commands` in order.
    #[must_use]
    pub fn new(commands: Vec<Command>) -> Self {
        Self {
            pending: commands.into(),
            issued: 0,
            completed: false,
        }
    }

    /// Creates a playback from a key script.
    pub fn from_script(script: &str) -> Result<Self, ScriptError> {
        parse_script(script).map(Self::new)
    }

    /// Number of commands still waiting to be issued.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    /// Number of commands issued so far.
    #[must_use]
    pub const fn issued(&self) -> usize {
        self.issued
    }

    /// Reports whether the level was completed during playback.
    #[must_use]
    pub const fn level_completed(&self) -> bool {
        self.completed
    }

    /// Reports whether playback will issue no further commands.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.completed || self.pending.is_empty()
    }

    /// Consumes world events and emits at most one follow-up command.
    pub fn handle(&mut self, events: &[Event], out: &mut Vec<Command>) {
        if self.completed {
            return;
        }

        if events
            .iter()
            .any(|event| matches!(event, Event::LevelCompleted))
        {
            self.completed = true;
            debug!(
                "level completed after {} commands; {} left unused",
                self.issued,
                self.pending.len()
            );
            return;
        }

        if !events.iter().any(is_answer) {
            return;
        }

        if let Some(command) = self.pending.pop_front() {
            self.issued += 1;
            out.push(command);
        }
    }
}

fn is_answer(event: &Event) -> bool {
    matches!(
        event,
        Event::StepResolved { .. }
            | Event::StepRejected { .. }
            | Event::StepUndone { .. }
            | Event::UndoUnavailable
            | Event::LevelReset
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackfall_core::RejectReason;

    fn resolved() -> Event {
        Event::StepResolved {
            ticks: 1,
            won: false,
        }
    }

    #[test]
    fn parses_movement_and_control_keys() {
        let commands = parse_script("wA s,d\nUr").expect("script");
        assert_eq!(
            commands,
            vec![
                Command::Step {
                    direction: Direction::Forward
                },
                Command::Step {
                    direction: Direction::Left
                },
                Command::Step {
                    direction: Direction::Backward
                },
                Command::Step {
                    direction: Direction::Right
                },
                Command::Undo,
                Command::Reset,
            ]
        );
    }

    #[test]
    fn vim_keys_match_wasd() {
        assert_eq!(parse_script("khjl"), parse_script("wasd"));
    }

    #[test]
    fn unknown_key_reports_position() {
        assert_eq!(
            parse_script("dd x"),
            Err(ScriptError::UnknownKey {
                key: 'x',
                position: 3
            })
        );
    }

    #[test]
    fn issues_one_command_per_answer() {
        let mut playback = Playback::from_script("dd").expect("script");
        let mut out = Vec::new();

        playback.handle(&[Event::LevelLoaded { entities: 1 }, resolved()], &mut out);
        assert_eq!(out.len(), 1);
        playback.handle(&[], &mut out);
        assert_eq!(out.len(), 1);
        playback.handle(
            &[Event::StepRejected {
                reason: RejectReason::Busy,
            }],
            &mut out,
        );
        assert_eq!(out.len(), 2);
        assert!(playback.is_finished());
        assert_eq!(playback.issued(), 2);
    }

    #[test]
    fn stops_once_level_completes() {
        let mut playback = Playback::from_script("ddd").expect("script");
        let mut out = Vec::new();

        playback.handle(&[resolved()], &mut out);
        playback.handle(&[resolved(), Event::LevelCompleted], &mut out);
        playback.handle(&[resolved()], &mut out);

        assert_eq!(out.len(), 1);
        assert!(playback.level_completed());
        assert!(playback.is_finished());
        assert_eq!(playback.remaining(), 2);
    }
}
