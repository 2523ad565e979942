//! Read-only snapshot handed to the presentation layer.
//!
//! Every field is owned and required, so a snapshot is a deep copy: later
//! turns never change a snapshot that was already handed out.

use crate::{AgentId, EconomicState, Event, GovernanceMode, Inventory, Role};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Public-facing view of one agent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentSummary {
    pub id: AgentId,
    pub role: Role,
    pub name: String,
    pub money: Decimal,
    pub inventory: Inventory,
    /// Value of this turn's output at clearing prices.
    pub production_value: f64,
    pub technology: f64,
    pub labor: f64,
    /// Outstanding bank debt (public debt for the government).
    pub debt: Decimal,
}

/// Central-bank policy record as published.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolicySummary {
    pub mode: GovernanceMode,
    pub fed_funds_rate: f64,
    /// Taylor Rule value computed at the last policy meeting.
    pub taylor_rate: f64,
    pub discount_rate: f64,
    pub inflation_target: f64,
    pub explanation: String,
    pub votes_pending: usize,
    /// Reserves lent to the commercial bank through the discount window.
    pub emergency_lending: Decimal,
}

/// Aggregates of the commercial bank's ledger.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BankSummary {
    pub loans_outstanding: Decimal,
    pub deposits: Decimal,
    pub reserves: Decimal,
    pub required_reserves: Decimal,
    pub currency: Decimal,
    pub lending_capacity: Decimal,
    /// Reserves borrowed from the central bank.
    pub discount_borrowing: Decimal,
    pub prime_lending_rate: f64,
    pub deposit_rate: f64,
    pub active_loans: usize,
}

/// Complete read-only view of a game after a turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub turn: u64,
    pub state: EconomicState,
    pub agents: Vec<AgentSummary>,
    pub policy: PolicySummary,
    pub bank: BankSummary,
    /// Most recent events, oldest first.
    pub events: Vec<Event>,
}

impl GameSnapshot {
    pub fn agent(&self, role: Role) -> Option<&AgentSummary> {
        self.agents.iter().find(|a| a.role == role)
    }

    /// Event log rendered as display strings.
    pub fn messages(&self) -> Vec<String> {
        self.events.iter().map(|e| e.to_string()).collect()
    }
}
