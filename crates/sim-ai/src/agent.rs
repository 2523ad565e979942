//! Agents of the economy and their settlement contract.

use crate::CentralBank;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sim_core::{
    money_to_f64, to_money, AgentId, AgentSummary, EconomicState, FirmFinanceConfig, Good,
    GovernanceMode, Inventory, Role, SimConfig, SimError, QTY_EPSILON,
};
use sim_econ::{Fill, LoanRequest, Order, Side};
use std::collections::BTreeMap;

/// Role-specific private state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum AgentKind {
    RawMaterials,
    Manufacturing,
    Services,
    Consumer {
        /// Spending multiplier, 1.0 when neutral.
        confidence: f64,
    },
    Financial,
    Government {
        /// Tax revenue of the last completed turn; the next budget's base.
        last_revenue: Decimal,
    },
    CentralBank(CentralBank),
}

impl AgentKind {
    pub fn role(&self) -> Role {
        match self {
            AgentKind::RawMaterials => Role::RawMaterials,
            AgentKind::Manufacturing => Role::Manufacturing,
            AgentKind::Services => Role::Services,
            AgentKind::Consumer { .. } => Role::Consumer,
            AgentKind::Financial => Role::Financial,
            AgentKind::Government { .. } => Role::Government,
            AgentKind::CentralBank(_) => Role::CentralBank,
        }
    }
}

/// Non-market actions announced during the decision phase.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PolicyAction {
    /// Rates the commercial bank offers this turn.
    CreditTerms { prime_rate: f64, deposit_rate: f64 },
    /// How the central bank will set the next rate.
    Ballot { mode: GovernanceMode, votes: usize },
}

/// Everything an agent wants to do this turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Intentions {
    pub agent: AgentId,
    /// Output the agent would like to produce.
    pub desired_production: f64,
    /// Output it can produce with its labor and inputs.
    pub production: f64,
    /// Inputs consumed by `production`.
    pub inputs: BTreeMap<Good, f64>,
    pub sell: BTreeMap<Good, f64>,
    pub buy: BTreeMap<Good, f64>,
    pub labor_demand: f64,
    pub labor_supply: f64,
    pub credit: Option<LoanRequest>,
    pub policy: Option<PolicyAction>,
}

impl Intentions {
    pub fn new(agent: AgentId) -> Self {
        Self {
            agent,
            desired_production: 0.0,
            production: 0.0,
            inputs: BTreeMap::new(),
            sell: BTreeMap::new(),
            buy: BTreeMap::new(),
            labor_demand: 0.0,
            labor_supply: 0.0,
            credit: None,
            policy: None,
        }
    }

    /// Market orders with a positive quantity.
    pub fn orders(&self) -> impl Iterator<Item = Order> + '_ {
        let sells = self.sell.iter().map(|(g, q)| (Side::Sell, *g, *q));
        let buys = self.buy.iter().map(|(g, q)| (Side::Buy, *g, *q));
        sells
            .chain(buys)
            .filter(|(_, _, q)| *q > QTY_EPSILON)
            .map(move |(side, good, quantity)| Order {
                agent: self.agent,
                good,
                side,
                quantity,
            })
    }

    pub(crate) fn validate(&self) -> Result<(), SimError> {
        let scalars = [
            self.desired_production,
            self.production,
            self.labor_demand,
            self.labor_supply,
        ];
        let tables = self.inputs.values().chain(self.sell.values()).chain(self.buy.values());
        if scalars.iter().chain(tables).any(|q| !q.is_finite() || *q < 0.0) {
            return Err(SimError::NonFinite("agent intentions"));
        }
        Ok(())
    }
}

/// Read-only view an agent decides from.
#[derive(Clone, Copy, Debug)]
pub struct DecisionContext<'a> {
    /// Turn being played.
    pub turn: u64,
    pub config: &'a SimConfig,
    /// State published at the end of the previous turn.
    pub state: &'a EconomicState,
    /// The deciding agent's outstanding bank debt.
    pub debt: Decimal,
    /// Deferred principal and interest on the agent's loans.
    pub arrears: Decimal,
    /// Multiplier on household demand.
    pub demand_noise: f64,
}

/// Money moved by an agent's goods settlement.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Settlement {
    pub revenue: Decimal,
    pub purchases: Decimal,
    /// Quantity of own output sold.
    pub sold: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub cash: Decimal,
    pub inventory: Inventory,
    pub technology: f64,
    /// Labor employed this turn; labor supplied for households.
    pub labor: f64,
    /// Own output sold last turn.
    pub last_sales: f64,
    /// Output realized this turn.
    pub production: f64,
    pub production_value: f64,
    pub kind: AgentKind,
    settled_turn: Option<u64>,
}

impl Agent {
    pub fn new(kind: AgentKind, cash: Decimal) -> Self {
        let role = kind.role();
        Self {
            id: role.id(),
            name: role.label().to_string(),
            cash,
            inventory: Inventory::new(),
            technology: 1.0,
            labor: 0.0,
            last_sales: 0.0,
            production: 0.0,
            production_value: 0.0,
            kind,
            settled_turn: None,
        }
    }

    pub fn role(&self) -> Role {
        self.kind.role()
    }

    pub fn stock(&self, good: Good) -> f64 {
        self.inventory.get(&good).copied().unwrap_or(0.0)
    }

    pub fn central_bank(&self) -> Option<&CentralBank> {
        match &self.kind {
            AgentKind::CentralBank(cb) => Some(cb),
            _ => None,
        }
    }

    pub fn central_bank_mut(&mut self) -> Option<&mut CentralBank> {
        match &mut self.kind {
            AgentKind::CentralBank(cb) => Some(cb),
            _ => None,
        }
    }

    /// Last recorded tax revenue for the government, zero for everyone else.
    pub fn last_revenue(&self) -> Decimal {
        match &self.kind {
            AgentKind::Government { last_revenue } => *last_revenue,
            _ => Decimal::ZERO,
        }
    }

    /// Whether purchased units of `good` are stocked rather than consumed.
    pub fn keeps(&self, good: Good) -> bool {
        match self.role() {
            Role::Manufacturing => matches!(good, Good::RawMaterials | Good::ManufacturedGoods),
            role => role.output() == Some(good) && good != Good::Services,
        }
    }

    /// Apply this turn's production, input use and market fills.
    ///
    /// Fails when called twice in a turn, when inventory would go negative or
    /// when purchases exceed cash. On failure the agent is left unchanged.
    pub fn settle(
        &mut self,
        turn: u64,
        intent: &Intentions,
        fills: &[Fill],
        prices: &BTreeMap<Good, f64>,
    ) -> Result<Settlement, SimError> {
        let role = self.role();
        let invalid = |reason: String| SimError::InvalidSettlement {
            agent: role,
            reason,
        };
        if self.settled_turn == Some(turn) {
            return Err(invalid(format!("already settled in turn {turn}")));
        }
        let mut inventory = self.inventory.clone();
        let mut cash = self.cash;
        let mut out = Settlement::default();

        if let Some(good) = role.output() {
            *inventory.entry(good).or_insert(0.0) += intent.production;
        }
        for (good, q) in &intent.inputs {
            let stock = inventory.entry(*good).or_insert(0.0);
            if *q > *stock + QTY_EPSILON {
                return Err(invalid(format!("input {good} needs {q:.4}, holds {stock:.4}")));
            }
            *stock = (*stock - q).max(0.0);
        }
        for f in fills.iter().filter(|f| f.agent == self.id && f.side == Side::Sell) {
            let stock = inventory.entry(f.good).or_insert(0.0);
            if f.quantity > *stock + QTY_EPSILON {
                return Err(invalid(format!(
                    "sells {:.4} {} but holds {:.4}",
                    f.quantity, f.good, stock
                )));
            }
            *stock = (*stock - f.quantity).max(0.0);
            cash += f.value;
            out.revenue += f.value;
            if role.output() == Some(f.good) {
                out.sold += f.quantity;
            }
        }
        for f in fills.iter().filter(|f| f.agent == self.id && f.side == Side::Buy) {
            if f.value > cash {
                return Err(invalid(format!("pays {} with {} cash", f.value, cash)));
            }
            cash -= f.value;
            out.purchases += f.value;
            if self.keeps(f.good) {
                *inventory.entry(f.good).or_insert(0.0) += f.quantity;
            }
        }
        // unsold services do not keep
        if role == Role::Services {
            inventory.insert(Good::Services, 0.0);
        }

        self.inventory = inventory;
        self.cash = cash;
        self.production = intent.production;
        self.production_value = match role.output() {
            Some(good) => intent.production * prices.get(&good).copied().unwrap_or(0.0),
            None => 0.0,
        };
        if role.is_producer() {
            self.last_sales = out.sold;
        }
        self.settled_turn = Some(turn);
        Ok(out)
    }

    /// Research spending raises technology permanently.
    pub fn apply_rd(&mut self, spend: Decimal, cfg: &FirmFinanceConfig) {
        let gain = money_to_f64(spend).max(0.0) * cfg.rd_productivity;
        self.technology = (self.technology + gain).max(cfg.min_technology);
    }

    /// Keep this turn's tax take as the base of the next budget.
    pub fn record_revenue(&mut self, revenue: Decimal) {
        if let AgentKind::Government { last_revenue } = &mut self.kind {
            *last_revenue = revenue.max(Decimal::ZERO);
        }
    }

    /// Update private expectations from the newly published state.
    pub fn observe(&mut self, state: &EconomicState, cfg: &SimConfig) {
        if let AgentKind::Consumer { confidence } = &mut self.kind {
            let c = &cfg.agents.consumer;
            let prev = state.previous_employment();
            let growth = if prev > 0.0 {
                (state.employment_rate - prev) / prev
            } else {
                0.0
            };
            let target = if growth > 0.0 {
                1.0 + c.confidence_sensitivity * growth
            } else {
                1.0
            };
            *confidence += c.confidence_smoothing * (target - *confidence);
        }
    }

    pub fn summary(&self, debt: Decimal) -> AgentSummary {
        AgentSummary {
            id: self.id,
            role: self.role(),
            name: self.name.clone(),
            money: self.cash,
            inventory: self.inventory.clone(),
            production_value: self.production_value,
            technology: self.technology,
            labor: self.labor,
            debt,
        }
    }
}

/// The seven agents, in id order, from configuration.
pub fn populate(cfg: &SimConfig) -> Result<Vec<Agent>, SimError> {
    let a = &cfg.agents;
    let mut agents = Vec::with_capacity(Role::ALL.len());

    let mut raw = Agent::new(AgentKind::RawMaterials, to_money(a.raw_materials.cash)?);
    raw.labor = a.raw_materials.initial_labor;
    raw.inventory
        .insert(Good::RawMaterials, a.raw_materials.initial_inventory);
    agents.push(raw);

    let mut mfg = Agent::new(AgentKind::Manufacturing, to_money(a.manufacturing.cash)?);
    mfg.labor = a.manufacturing.initial_labor;
    mfg.last_sales = a.manufacturing.initial_sales;
    mfg.inventory
        .insert(Good::RawMaterials, a.manufacturing.initial_raw_inventory);
    mfg.inventory.insert(Good::ManufacturedGoods, 0.0);
    agents.push(mfg);

    let mut svc = Agent::new(AgentKind::Services, to_money(a.services.cash)?);
    svc.labor = a.services.initial_labor;
    svc.last_sales = a.services.initial_sales;
    svc.inventory.insert(Good::Services, 0.0);
    agents.push(svc);

    let mut households = Agent::new(
        AgentKind::Consumer { confidence: 1.0 },
        to_money(a.consumer.cash)?,
    );
    households.labor =
        a.raw_materials.initial_labor + a.manufacturing.initial_labor + a.services.initial_labor;
    agents.push(households);

    agents.push(Agent::new(AgentKind::Financial, to_money(a.financial.cash)?));
    agents.push(Agent::new(
        AgentKind::Government {
            last_revenue: to_money(cfg.fiscal.initial_tax_revenue)?,
        },
        to_money(a.government.cash)?,
    ));
    agents.push(Agent::new(
        AgentKind::CentralBank(CentralBank::new(&cfg.policy)),
        Decimal::ZERO,
    ));

    for agent in agents.iter_mut().filter(|a| a.role().is_producer()) {
        agent.technology = cfg.agents.firm.min_technology.max(1.0);
    }
    Ok(agents)
}

/// Move up to `amount` of cash between two agents. Returns the amount paid.
pub fn transfer(agents: &mut [Agent], from: AgentId, to: AgentId, amount: Decimal) -> Decimal {
    if from == to || amount <= Decimal::ZERO || to.index() >= agents.len() {
        return Decimal::ZERO;
    }
    let Some(payer) = agents.get_mut(from.index()) else {
        return Decimal::ZERO;
    };
    let paid = amount.min(payer.cash).max(Decimal::ZERO);
    payer.cash -= paid;
    agents[to.index()].cash += paid;
    paid
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agents() -> Vec<Agent> {
        populate(&SimConfig::default()).unwrap()
    }

    fn fill(agent: Role, good: Good, side: Side, quantity: f64, value: i64) -> Fill {
        Fill {
            agent: agent.id(),
            good,
            side,
            quantity,
            price: 1.0,
            value: Decimal::from(value),
        }
    }

    #[test]
    fn population_is_ordered_by_role() {
        let a = agents();
        assert_eq!(a.len(), 7);
        for (i, agent) in a.iter().enumerate() {
            assert_eq!(agent.id.index(), i);
            assert_eq!(agent.role(), Role::ALL[i]);
        }
        assert!(a[Role::CentralBank.id().index()].central_bank().is_some());
        assert_eq!(a[Role::CentralBank.id().index()].cash, Decimal::ZERO);
    }

    #[test]
    fn settle_moves_goods_and_cash() {
        let mut a = agents();
        let mut intent = Intentions::new(Role::Manufacturing.id());
        intent.production = 10.0;
        intent.inputs.insert(Good::RawMaterials, 12.0);
        let fills = vec![
            fill(Role::Manufacturing, Good::ManufacturedGoods, Side::Sell, 8.0, 160),
            fill(Role::Manufacturing, Good::RawMaterials, Side::Buy, 5.0, 50),
        ];
        let prices = SimConfig::default().market.initial_prices;
        let m = &mut a[Role::Manufacturing.id().index()];
        let s = m.settle(1, &intent, &fills, &prices).unwrap();
        assert_eq!(s.revenue, Decimal::from(160));
        assert_eq!(s.purchases, Decimal::from(50));
        assert_eq!(s.sold, 8.0);
        assert_eq!(m.stock(Good::ManufacturedGoods), 2.0);
        assert_eq!(m.stock(Good::RawMaterials), 93.0);
        assert_eq!(m.cash, Decimal::from(10_110));
        assert_eq!(m.production_value, 200.0);
    }

    #[test]
    fn settling_twice_is_rejected() {
        let mut a = agents();
        let intent = Intentions::new(Role::Consumer.id());
        let prices = BTreeMap::new();
        let c = &mut a[Role::Consumer.id().index()];
        c.settle(3, &intent, &[], &prices).unwrap();
        assert!(matches!(
            c.settle(3, &intent, &[], &prices),
            Err(SimError::InvalidSettlement { .. })
        ));
        c.settle(4, &intent, &[], &prices).unwrap();
    }

    #[test]
    fn overselling_is_rejected_and_leaves_agent_untouched() {
        let mut a = agents();
        let intent = Intentions::new(Role::RawMaterials.id());
        let fills = vec![fill(Role::RawMaterials, Good::RawMaterials, Side::Sell, 5.0, 50)];
        let r = &mut a[Role::RawMaterials.id().index()];
        let before = r.clone();
        let err = r.settle(1, &intent, &fills, &BTreeMap::new()).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(*r, before);
    }

    #[test]
    fn services_perish_and_households_consume() {
        let mut a = agents();
        let mut intent = Intentions::new(Role::Services.id());
        intent.production = 10.0;
        let fills = vec![
            fill(Role::Services, Good::Services, Side::Sell, 6.0, 90),
            fill(Role::Consumer, Good::Services, Side::Buy, 6.0, 90),
        ];
        let prices = BTreeMap::new();
        a[Role::Services.id().index()]
            .settle(1, &intent, &fills, &prices)
            .unwrap();
        let hh_intent = Intentions::new(Role::Consumer.id());
        a[Role::Consumer.id().index()]
            .settle(1, &hh_intent, &fills, &prices)
            .unwrap();
        assert_eq!(a[Role::Services.id().index()].stock(Good::Services), 0.0);
        assert_eq!(a[Role::Consumer.id().index()].stock(Good::Services), 0.0);
        assert_eq!(a[Role::Consumer.id().index()].cash, Decimal::from(9_910));
    }

    #[test]
    fn transfer_is_capped_by_payer_cash() {
        let mut a = agents();
        let from = Role::Government.id();
        let to = Role::Consumer.id();
        let paid = transfer(&mut a, from, to, Decimal::from(25_000));
        assert_eq!(paid, Decimal::from(10_000));
        assert_eq!(a[from.index()].cash, Decimal::ZERO);
        assert_eq!(a[to.index()].cash, Decimal::from(20_000));
    }

    #[test]
    fn revenue_is_recorded_for_the_government_only() {
        let mut a = agents();
        let g = &mut a[Role::Government.id().index()];
        assert_eq!(g.last_revenue(), Decimal::from(1_000));
        g.record_revenue(Decimal::from(1_250));
        assert_eq!(g.last_revenue(), Decimal::from(1_250));
        let f = &mut a[Role::Services.id().index()];
        f.record_revenue(Decimal::from(99));
        assert_eq!(f.last_revenue(), Decimal::ZERO);
    }

    #[test]
    fn confidence_rises_with_employment() {
        let cfg = SimConfig::default();
        let mut a = agents();
        let mut state = EconomicState::initial(&cfg, Decimal::from(60_000));
        state.history.employment.push(0.99);
        state.employment_rate = 0.99;
        let c = &mut a[Role::Consumer.id().index()];
        c.observe(&state, &cfg);
        let AgentKind::Consumer { confidence } = c.kind else {
            panic!("households expected");
        };
        assert!(confidence > 1.0);
    }
}
