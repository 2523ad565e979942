//! The mutable store a turn runs against.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sim_ai::{populate, Agent, CentralBank};
use sim_core::{
    to_money, validate_config, BankSummary, EconomicState, Event, EventKind, EventLog,
    GameSnapshot, Role, SimConfig, SimError,
};
use sim_econ::BankLedger;

/// Everything a game owns: configuration, published state, agents, the bank
/// ledger and the event log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimContext {
    pub config: SimConfig,
    pub state: EconomicState,
    pub agents: Vec<Agent>,
    pub ledger: BankLedger,
    pub events: EventLog,
}

impl SimContext {
    /// Validate `config` and build the turn-0 economy.
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        validate_config(&config)?;
        let agents = populate(&config)?;
        let ledger = BankLedger::new(
            config.banking.reserve_ratio,
            to_money(config.banking.initial_reserves)?,
            agents.iter().map(|a| (a.id, a.cash)),
        )?;
        let state = EconomicState::initial(&config, ledger.money_supply());
        let mut events = EventLog::new(config.event_log_capacity);
        events.push(Event::new(
            0,
            EventKind::GameStarted,
            format!(
                "Game started: {} agents, M2 {}, {} governance",
                agents.len(),
                ledger.money_supply(),
                config.policy.initial_mode
            ),
        ));
        Ok(Self {
            config,
            state,
            agents,
            ledger,
            events,
        })
    }

    pub fn agent(&self, role: Role) -> &Agent {
        &self.agents[role.id().index()]
    }

    pub fn central_bank(&self) -> Result<&CentralBank, SimError> {
        self.agent(Role::CentralBank)
            .central_bank()
            .ok_or_else(|| SimError::Economics("central bank missing".into()))
    }

    pub fn central_bank_mut(&mut self) -> Result<&mut CentralBank, SimError> {
        self.agents[Role::CentralBank.id().index()]
            .central_bank_mut()
            .ok_or_else(|| SimError::Economics("central bank missing".into()))
    }

    /// Sum of every agent's cash; equals M2 between turns.
    pub fn cash_in_circulation(&self) -> Decimal {
        self.agents.iter().map(|a| a.cash).sum()
    }

    /// Ledger invariants, per-agent cash/holdings agreement and the
    /// discount window matching on both sides.
    pub fn check_invariants(&self) -> Result<(), SimError> {
        self.ledger.check_invariants()?;
        for agent in &self.agents {
            let held = self.ledger.holding_of(agent.id).total();
            if held != agent.cash {
                return Err(SimError::Economics(format!(
                    "{} holds {held} at the bank ledger but {} in cash",
                    agent.name, agent.cash
                )));
            }
        }
        let cash = self.cash_in_circulation();
        let m2 = self.ledger.money_supply();
        if cash != m2 {
            return Err(SimError::Economics(format!(
                "agent cash {cash} does not match M2 {m2}"
            )));
        }
        let lent = self.central_bank()?.emergency_lending();
        let borrowed = self.ledger.discount_borrowing();
        if lent != borrowed {
            return Err(SimError::Economics(format!(
                "discount window lent {lent} but the bank owes {borrowed}"
            )));
        }
        Ok(())
    }

    /// Deep copy of the public view.
    pub fn snapshot(&self) -> Result<GameSnapshot, SimError> {
        let cb = self.central_bank()?;
        let ffr = cb.fed_funds_rate();
        let banking = &self.config.banking;
        let agents = self
            .agents
            .iter()
            .map(|a| a.summary(self.ledger.debt_of(a.id)))
            .collect();
        Ok(GameSnapshot {
            turn: self.state.turn,
            state: self.state.clone(),
            agents,
            policy: cb.summary(&self.config.policy),
            bank: BankSummary {
                loans_outstanding: self.ledger.loans_outstanding(),
                deposits: self.ledger.deposits(),
                reserves: self.ledger.reserves(),
                required_reserves: self.ledger.required_reserves(),
                currency: self.ledger.currency(),
                lending_capacity: self.ledger.lending_capacity(),
                discount_borrowing: self.ledger.discount_borrowing(),
                prime_lending_rate: ffr + banking.base_spread,
                deposit_rate: (ffr - banking.deposit_spread).max(0.0),
                active_loans: self.ledger.active_loans(),
            },
            events: self.events.recent(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_core::ConfigError;

    #[test]
    fn initial_economy_is_consistent() {
        let ctx = SimContext::new(SimConfig::default()).unwrap();
        ctx.check_invariants().unwrap();
        assert_eq!(ctx.state.turn, 0);
        assert!(ctx.state.history_is_consistent());
        assert_eq!(ctx.state.money_supply, ctx.cash_in_circulation());
        assert_eq!(ctx.events.len(), 1);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut cfg = SimConfig::default();
        cfg.banking.reserve_ratio = 0.0;
        let err = SimContext::new(cfg).unwrap_err();
        assert!(matches!(err, SimError::Configuration(ConfigError::OutOfRange { .. })));
        assert!(err.is_fatal());
    }

    #[test]
    fn snapshot_reports_every_agent() {
        let ctx = SimContext::new(SimConfig::default()).unwrap();
        let snap = ctx.snapshot().unwrap();
        assert_eq!(snap.agents.len(), 7);
        assert_eq!(snap.policy.fed_funds_rate, ctx.config.policy.initial_rate);
        assert_eq!(snap.bank.reserves, Decimal::from(20_000));
        assert_eq!(snap.bank.lending_capacity, Decimal::from(200_000));
        assert_eq!(snap.agent(Role::Consumer).unwrap().name, "Households");
        assert_eq!(snap.bank.discount_borrowing, Decimal::ZERO);
        assert_eq!(snap.policy.emergency_lending, Decimal::ZERO);
    }

    #[test]
    fn cash_moved_behind_the_ledger_is_caught() {
        let mut ctx = SimContext::new(SimConfig::default()).unwrap();
        let [from, to] = [Role::Government.id(), Role::Consumer.id()];
        ctx.agents[from.index()].cash -= Decimal::from(10);
        ctx.agents[to.index()].cash += Decimal::from(10);
        assert_eq!(ctx.cash_in_circulation(), ctx.ledger.money_supply());
        assert!(matches!(ctx.check_invariants(), Err(SimError::Economics(_))));
    }
}
