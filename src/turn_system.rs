//! Turn states and the transitions between them.
//!
//! The production cycle alternates between `WaitingForPlayerInput` and
//! `ProcessingMonsterTurn`; `ProcessingPlayerAction` is only reached through
//! [`next_state`]. `GameOver` is terminal.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, FromRepr};

/// High-level phases recognised by the turn driver.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    FromRepr,
    Serialize,
    Deserialize,
)]
#[repr(u8)]
pub enum TurnState {
    /// The driver is waiting for a player command.
    #[default]
    WaitingForPlayerInput = 0,
    /// Reserved for multi-step player actions.
    ProcessingPlayerAction = 1,
    /// Every live monster acts once.
    ProcessingMonsterTurn = 2,
    /// Terminal; further updates are no-ops.
    GameOver = 3,
}

impl TurnState {
    /// Parse a state name, falling back to `WaitingForPlayerInput`.
    pub fn parse_or_waiting(name: &str) -> TurnState {
        TurnState::from_str(name).unwrap_or_else(|_| {
            tracing::warn!(name, "unrecognised turn state, defaulting to waiting");
            TurnState::WaitingForPlayerInput
        })
    }
}

/// Generic transition function.
pub fn next_state(state: TurnState) -> TurnState {
    match state {
        TurnState::WaitingForPlayerInput => TurnState::ProcessingPlayerAction,
        TurnState::ProcessingPlayerAction => TurnState::ProcessingMonsterTurn,
        TurnState::ProcessingMonsterTurn => TurnState::WaitingForPlayerInput,
        TurnState::GameOver => TurnState::GameOver,
    }
}

/// Transition from a raw discriminant; unknown values map to
/// `ProcessingPlayerAction`.
pub fn next_state_from_repr(raw: u8) -> TurnState {
    match TurnState::from_repr(raw) {
        Some(state) => next_state(state),
        None => TurnState::ProcessingPlayerAction,
    }
}

/// Which side is acting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum TurnType {
    Player,
    Monster,
}

/// Narrow view of the turn driver that the game-state system mirrors into.
pub trait TurnSink: Send + Sync {
    fn set_state(&self, state: TurnState);
    fn set_counter(&self, counter: u32);
}
