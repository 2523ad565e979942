//! Error taxonomy shared across the workspace.

use crate::{Good, Role};
use thiserror::Error;

/// Invalid configuration constants. Fatal: a game cannot start.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ConfigError {
    /// Numeric field must be finite.
    #[error("non-finite value for {0}")]
    NonFinite(&'static str),
    /// Numeric field must be >= 0.
    #[error("{0} must not be negative")]
    Negative(&'static str),
    /// Numeric field must be > 0.
    #[error("{0} must be > 0")]
    NonPositive(&'static str),
    /// Numeric field outside its admissible range.
    #[error("{field} must be within [{min}, {max}], got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    /// A per-good table lacks an entry.
    #[error("{field} has no entry for {good}")]
    MissingGood { field: &'static str, good: Good },
    /// Weights must sum to a positive value.
    #[error("{0} weights must sum to a positive value")]
    EmptyWeights(&'static str),
    /// The configuration document could not be parsed.
    #[error("cannot parse configuration: {0}")]
    Parse(String),
}

/// Errors and degraded conditions raised while running the simulation.
///
/// Configuration, settlement-contract and numeric/ledger failures abort; the
/// remaining variants are recovered and surfaced as events.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum SimError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),
    /// A settlement would take an inventory below zero; the trade is clamped.
    #[error("insufficient inventory at {agent}: {requested:.4} {good} requested, {available:.4} available")]
    InsufficientInventory {
        agent: Role,
        good: Good,
        requested: f64,
        available: f64,
    },
    /// Settlement contract violated (twice in a turn, or inventory overdrawn).
    #[error("invalid settlement for {agent}: {reason}")]
    InvalidSettlement { agent: Role, reason: String },
    /// Another caller is advancing the game; retry later.
    #[error("a turn is already in progress")]
    TurnInProgress,
    /// Too few democratic votes; the previous rate is held.
    #[error("democratic vote quorum not met: {cast} of {quorum} votes cast")]
    QuorumNotMet { cast: usize, quorum: usize },
    /// A proposed rate outside the admissible range.
    #[error("invalid vote from {voter}: {rate}")]
    InvalidVote { voter: String, rate: f64 },
    /// A computation produced NaN or infinity.
    #[error("non-finite value in {0}")]
    NonFinite(&'static str),
    /// An economic computation or ledger invariant failed.
    #[error("economics error: {0}")]
    Economics(String),
}

impl SimError {
    /// Whether the condition aborts the turn instead of degrading.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SimError::Configuration(_)
                | SimError::InvalidSettlement { .. }
                | SimError::NonFinite(_)
                | SimError::Economics(_)
        )
    }

    /// Whether the caller may simply retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SimError::TurnInProgress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_fatal_and_retryable() {
        assert!(SimError::from(ConfigError::Negative("x")).is_fatal());
        assert!(SimError::InvalidSettlement {
            agent: Role::Consumer,
            reason: "twice".into()
        }
        .is_fatal());
        assert!(!SimError::QuorumNotMet { cast: 0, quorum: 3 }.is_fatal());
        assert!(SimError::TurnInProgress.is_retryable());
        assert!(!SimError::TurnInProgress.is_fatal());
    }

    #[test]
    fn messages_name_the_condition() {
        let e = SimError::QuorumNotMet { cast: 1, quorum: 3 };
        assert_eq!(
            e.to_string(),
            "democratic vote quorum not met: 1 of 3 votes cast"
        );
        let e = SimError::InsufficientInventory {
            agent: Role::Manufacturing,
            good: Good::ManufacturedGoods,
            requested: 5.0,
            available: 2.5,
        };
        assert!(e.to_string().contains("Manufacturing Corp."));
    }
}
