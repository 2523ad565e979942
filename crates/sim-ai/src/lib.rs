#![deny(warnings)]

//! Agent behaviour for the seven roles of the economy.
//!
//! Each agent decides from a frozen view of the previous turn
//! ([`DecisionContext`]) and settles realized trades at most once per turn.
//! The central bank's policy engine lives here too: it owns the fed funds
//! rate, the governance mode and the pending democratic votes.

pub mod agent;
pub mod central_bank;
mod decide;

pub use agent::{
    populate, transfer, Agent, AgentKind, DecisionContext, Intentions, PolicyAction, Settlement,
};
pub use central_bank::{CentralBank, PolicyInputs, PolicyOutcome};
