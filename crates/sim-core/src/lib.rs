#![deny(warnings)]

//! Core domain models and invariants for the closed-economy simulation.
//!
//! This crate defines the serializable types shared by every other crate:
//! goods and agent roles, the validated [`SimConfig`], the per-turn
//! [`EconomicState`] with its append-only histories, the bounded event log,
//! the error taxonomy and the read-only [`GameSnapshot`] handed to callers.

pub mod config;
pub mod error;
pub mod event;
pub mod snapshot;
pub mod state;

pub use config::*;
pub use error::{ConfigError, SimError};
pub use event::{Event, EventKind, EventLog};
pub use snapshot::{AgentSummary, BankSummary, GameSnapshot, PolicySummary};
pub use state::{EconomicState, GdpComponents, History, Indicators};

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Tolerance applied to physical quantities (inventory, labor).
pub const QTY_EPSILON: f64 = 1e-9;

/// Decimal places kept when a floating-point amount becomes money.
pub const MONEY_DP: u32 = 6;

/// Goods traded on the markets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Good {
    /// Extracted resources, the manufacturing input.
    RawMaterials,
    /// Finished goods produced from raw materials.
    ManufacturedGoods,
    /// Perishable services.
    Services,
}

impl Good {
    /// Every good, in market order.
    pub const ALL: [Good; 3] = [Good::RawMaterials, Good::ManufacturedGoods, Good::Services];

    pub fn name(self) -> &'static str {
        match self {
            Good::RawMaterials => "raw_materials",
            Good::ManufacturedGoods => "manufactured_goods",
            Good::Services => "services",
        }
    }
}

impl fmt::Display for Good {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The seven fixed roles of the economy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    RawMaterials,
    Manufacturing,
    Services,
    Consumer,
    Financial,
    Government,
    CentralBank,
}

impl Role {
    /// Every role, in agent-id order.
    pub const ALL: [Role; 7] = [
        Role::RawMaterials,
        Role::Manufacturing,
        Role::Services,
        Role::Consumer,
        Role::Financial,
        Role::Government,
        Role::CentralBank,
    ];

    /// Display name of the agent playing this role.
    pub fn label(self) -> &'static str {
        match self {
            Role::RawMaterials => "Raw Materials Co.",
            Role::Manufacturing => "Manufacturing Corp.",
            Role::Services => "Services Inc.",
            Role::Consumer => "Households",
            Role::Financial => "National Bank",
            Role::Government => "Government",
            Role::CentralBank => "Central Bank",
        }
    }

    /// Roles that hire labor and sell a good.
    pub fn is_producer(self) -> bool {
        matches!(
            self,
            Role::RawMaterials | Role::Manufacturing | Role::Services
        )
    }

    /// Good sold by a producer role.
    pub fn output(self) -> Option<Good> {
        match self {
            Role::RawMaterials => Some(Good::RawMaterials),
            Role::Manufacturing => Some(Good::ManufacturedGoods),
            Role::Services => Some(Good::Services),
            _ => None,
        }
    }

    /// Stable agent id for this role.
    pub fn id(self) -> AgentId {
        let idx = Role::ALL.iter().position(|r| *r == self).unwrap_or(0);
        AgentId(idx as u32)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Identity of an agent; loans and summaries refer to agents by id only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub u32);

impl AgentId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent-{}", self.0)
    }
}

/// Quantities held per good.
pub type Inventory = BTreeMap<Good, f64>;

/// How the central bank sets the policy rate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GovernanceMode {
    /// Taylor Rule, rate-of-change capped.
    #[default]
    Ai,
    /// Average of player votes, subject to quorum.
    Democratic,
}

impl fmt::Display for GovernanceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GovernanceMode::Ai => f.write_str("ai"),
            GovernanceMode::Democratic => f.write_str("democratic"),
        }
    }
}

impl FromStr for GovernanceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ai" => Ok(GovernanceMode::Ai),
            "democratic" => Ok(GovernanceMode::Democratic),
            other => Err(format!("unknown governance mode: {other}")),
        }
    }
}

/// Discrete credit rating attached to every borrowing request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditTier {
    Prime,
    Standard,
    Subprime,
}

/// Convert a floating-point amount into money, rounded to [`MONEY_DP`] places.
pub fn to_money(value: f64) -> Result<Decimal, SimError> {
    if !value.is_finite() {
        return Err(SimError::NonFinite("money amount"));
    }
    Decimal::from_f64(value)
        .map(|d| d.round_dp(MONEY_DP))
        .ok_or(SimError::NonFinite("money amount"))
}

/// Lossy view of a money amount for ratio arithmetic.
pub fn money_to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_ids_are_dense_and_stable() {
        for (i, role) in Role::ALL.iter().enumerate() {
            assert_eq!(role.id(), AgentId(i as u32));
        }
        assert!(Role::Manufacturing.is_producer());
        assert!(!Role::Government.is_producer());
        assert_eq!(Role::Services.output(), Some(Good::Services));
    }

    #[test]
    fn money_conversion_rounds_and_rejects_nan() {
        assert_eq!(to_money(1.25).unwrap(), Decimal::new(125, 2));
        assert_eq!(to_money(0.1 + 0.2).unwrap(), Decimal::new(3, 1));
        assert!(to_money(f64::NAN).is_err());
        assert!(to_money(f64::INFINITY).is_err());
    }

    #[test]
    fn governance_mode_parses() {
        assert_eq!("AI".parse::<GovernanceMode>(), Ok(GovernanceMode::Ai));
        assert_eq!(
            "democratic".parse::<GovernanceMode>(),
            Ok(GovernanceMode::Democratic)
        );
        assert!("vote".parse::<GovernanceMode>().is_err());
    }

    #[test]
    fn good_serializes_snake_case() {
        let s = serde_json::to_string(&Good::ManufacturedGoods).unwrap();
        assert_eq!(s, "\"manufactured_goods\"");
    }
}
