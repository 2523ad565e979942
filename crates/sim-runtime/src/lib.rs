#![deny(warnings)]

//! Turn engine and game session for the closed-economy simulation.
//!
//! [`TurnManager`] runs the five phases of a turn against a copy of the
//! [`SimContext`] and hands back the advanced copy only on success.
//! [`Game`] wraps the committed context for callers: it serializes turns and
//! commands and serves read-only snapshots.

pub mod context;
pub mod game;
pub mod turn;

pub use context::SimContext;
pub use game::{Game, TurnGuard};
pub use turn::{TurnManager, TurnPhase, TurnReport};

