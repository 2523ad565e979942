//! Turn pipeline: decision, clearing, settlement, policy, aggregation.
//!
//! A turn runs on a private copy of the context. The copy is handed back only
//! when every phase succeeded, so a failed turn leaves no trace.

use crate::SimContext;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sim_ai::{transfer, DecisionContext, Intentions, PolicyAction, PolicyInputs, Settlement};
use sim_core::{
    money_to_f64, to_money, AgentId, Event, EventKind, GdpComponents, Good, Indicators, Role,
    SimError, QTY_EPSILON,
};
use sim_econ::{
    allocate_labor, clear_markets, cpi, implied_employment, inflation, noise_factor, output_gap,
    potential_gdp, smooth_employment, GoodClearing, LoanTerms, MarketOutcome,
};
use std::collections::BTreeMap;
use std::fmt;

/// Phase of the turn state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    Idle,
    Decision,
    Clearing,
    Settlement,
    Policy,
    Aggregation,
}

impl TurnPhase {
    /// The only phase allowed to follow this one.
    pub fn next(self) -> Self {
        match self {
            TurnPhase::Idle => TurnPhase::Decision,
            TurnPhase::Decision => TurnPhase::Clearing,
            TurnPhase::Clearing => TurnPhase::Settlement,
            TurnPhase::Settlement => TurnPhase::Policy,
            TurnPhase::Policy => TurnPhase::Aggregation,
            TurnPhase::Aggregation => TurnPhase::Idle,
        }
    }
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TurnPhase::Idle => "idle",
            TurnPhase::Decision => "decision",
            TurnPhase::Clearing => "clearing",
            TurnPhase::Settlement => "settlement",
            TurnPhase::Policy => "policy",
            TurnPhase::Aggregation => "aggregation",
        };
        f.write_str(name)
    }
}

/// Summary of one completed turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TurnReport {
    pub turn: u64,
    pub clearing: BTreeMap<Good, GoodClearing>,
    pub loans_issued: Decimal,
    pub principal_repaid: Decimal,
    pub money_supply_change: Decimal,
    pub phases: Vec<TurnPhase>,
    pub events: Vec<Event>,
}

/// Macro measures taken in the policy phase and published in aggregation.
#[derive(Clone, Debug, Default)]
struct Measures {
    components: GdpComponents,
    cpi: f64,
    inflation: f64,
    output_gap: f64,
    policy_rate: f64,
}

/// Scratch state carried between the phases of one turn.
#[derive(Default)]
struct TurnWork {
    turn: u64,
    intentions: Vec<Intentions>,
    outcome: MarketOutcome,
    employment: f64,
    labor_next: BTreeMap<AgentId, f64>,
    settlements: BTreeMap<AgentId, Settlement>,
    /// Wages, R&D and interest paid per firm.
    costs: BTreeMap<AgentId, Decimal>,
    household_income: Decimal,
    rd_spend: Decimal,
    inventory_change: f64,
    tax_revenue: Decimal,
    measures: Measures,
    phases: Vec<TurnPhase>,
    events: Vec<Event>,
}

impl TurnWork {
    fn event(&mut self, kind: EventKind, message: impl Into<String>) {
        self.events.push(Event::new(self.turn, kind, message));
    }

    fn cost(&mut self, agent: AgentId, amount: Decimal) {
        *self.costs.entry(agent).or_insert(Decimal::ZERO) += amount;
    }

    fn credit_terms(&self) -> (f64, f64) {
        self.intentions
            .iter()
            .find_map(|i| match i.policy {
                Some(PolicyAction::CreditTerms {
                    prime_rate,
                    deposit_rate,
                }) => Some((prime_rate, deposit_rate)),
                _ => None,
            })
            .unwrap_or((0.0, 0.0))
    }
}

/// Drives a context through the phases of a turn in strict order.
#[derive(Debug)]
pub struct TurnManager {
    phase: TurnPhase,
}

impl Default for TurnManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnManager {
    pub fn new() -> Self {
        Self {
            phase: TurnPhase::Idle,
        }
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    fn enter(&mut self, to: TurnPhase, work: &mut TurnWork) -> Result<(), SimError> {
        if self.phase.next() != to {
            return Err(SimError::Economics(format!(
                "phase {} cannot follow {}",
                to, self.phase
            )));
        }
        tracing::debug!(turn = work.turn, phase = %to, "entering phase");
        self.phase = to;
        work.phases.push(to);
        Ok(())
    }

    /// Play one turn against a copy of `current`.
    ///
    /// Returns the advanced context and a report; `current` is untouched.
    pub fn run_turn(&mut self, current: &SimContext) -> Result<(SimContext, TurnReport), SimError> {
        self.phase = TurnPhase::Idle;
        let result = self.run_phases(current);
        self.phase = TurnPhase::Idle;
        if let Err(e) = &result {
            tracing::warn!(turn = current.state.turn + 1, error = %e, "turn discarded");
        }
        result
    }

    fn run_phases(&mut self, current: &SimContext) -> Result<(SimContext, TurnReport), SimError> {
        let mut ctx = current.clone();
        let mut work = TurnWork {
            turn: current.state.turn + 1,
            ..TurnWork::default()
        };
        let m2_before = ctx.ledger.money_supply();
        ctx.ledger.begin_turn();

        self.enter(TurnPhase::Decision, &mut work)?;
        decision_phase(&ctx, &mut work)?;
        self.enter(TurnPhase::Clearing, &mut work)?;
        clearing_phase(&ctx, &mut work)?;
        self.enter(TurnPhase::Settlement, &mut work)?;
        settlement_phase(&mut ctx, &mut work)?;
        self.enter(TurnPhase::Policy, &mut work)?;
        policy_phase(&mut ctx, &mut work)?;
        self.enter(TurnPhase::Aggregation, &mut work)?;
        aggregation_phase(&mut ctx, &mut work)?;
        self.enter(TurnPhase::Idle, &mut work)?;

        let m2_after = ctx.ledger.money_supply();
        ctx.events.extend(work.events.iter().cloned());
        tracing::info!(
            turn = work.turn,
            gdp = ctx.state.gdp,
            cpi = ctx.state.cpi,
            employment = ctx.state.employment_rate,
            rate = ctx.state.policy_rate,
            m2 = %m2_after,
            "turn complete"
        );
        let report = TurnReport {
            turn: work.turn,
            clearing: work.outcome.goods.clone(),
            loans_issued: ctx.ledger.issued_this_turn(),
            principal_repaid: ctx.ledger.repaid_this_turn(),
            money_supply_change: m2_after - m2_before,
            phases: work.phases,
            events: work.events,
        };
        Ok((ctx, report))
    }
}

/// Every agent decides against the same frozen previous state.
fn decision_phase(ctx: &SimContext, work: &mut TurnWork) -> Result<(), SimError> {
    let noise = noise_factor(ctx.config.market.demand_noise, ctx.config.rng_seed ^ work.turn)?;
    for agent in &ctx.agents {
        let dctx = DecisionContext {
            turn: work.turn,
            config: &ctx.config,
            state: &ctx.state,
            debt: ctx.ledger.debt_of(agent.id),
            arrears: ctx.ledger.arrears_of(agent.id),
            demand_noise: noise,
        };
        work.intentions.push(agent.decide(&dctx)?);
    }
    Ok(())
}

/// Goods markets clear at new prices; the labor market sets next turn's
/// employment.
fn clearing_phase(ctx: &SimContext, work: &mut TurnWork) -> Result<(), SimError> {
    let orders = work.intentions.iter().flat_map(|i| i.orders()).collect();
    work.outcome = clear_markets(&ctx.state.prices, orders, &ctx.config.market)?;

    let demand: f64 = work.intentions.iter().map(|i| i.labor_demand).sum();
    let supply: f64 = work.intentions.iter().map(|i| i.labor_supply).sum();
    let implied = implied_employment(demand, supply)?;
    work.employment = smooth_employment(
        ctx.state.employment_rate,
        implied,
        ctx.config.labor.employment_adjustment,
    )?;
    let requests: BTreeMap<AgentId, f64> = work
        .intentions
        .iter()
        .filter(|i| i.labor_demand > 0.0)
        .map(|i| (i.agent, i.labor_demand))
        .collect();
    work.labor_next = allocate_labor(&requests, work.employment * supply)?;
    tracing::debug!(turn = work.turn, demand, supply, implied, employment = work.employment, "labor market cleared");
    Ok(())
}

fn settlement_phase(ctx: &mut SimContext, work: &mut TurnWork) -> Result<(), SimError> {
    settle_goods(ctx, work)?;
    service_loans(ctx, work)?;
    originate_loans(ctx, work)?;
    pay_wages_and_research(ctx, work)?;
    collect_taxes(ctx, work)?;
    pay_dividends(ctx, work)?;
    fiscal_bookkeeping(ctx, work)
}

fn settle_goods(ctx: &mut SimContext, work: &mut TurnWork) -> Result<(), SimError> {
    // Clamp sell fills to what each seller will actually hold.
    for intent in &work.intentions {
        let agent = &ctx.agents[intent.agent.index()];
        for good in intent.sell.keys() {
            let produced = match agent.role().output() {
                Some(g) if g == *good => intent.production,
                _ => 0.0,
            };
            let used = intent.inputs.get(good).copied().unwrap_or(0.0);
            let available = (agent.stock(*good) + produced - used).max(0.0);
            let shortage = work.outcome.restrict_supply(agent.id, *good, available)?;
            if shortage > QTY_EPSILON {
                let err = SimError::InsufficientInventory {
                    agent: agent.role(),
                    good: *good,
                    requested: available + shortage,
                    available,
                };
                work.events.push(Event::from_error(work.turn, &err));
            }
        }
    }

    let prices: BTreeMap<Good, f64> = work
        .outcome
        .goods
        .iter()
        .map(|(g, c)| (*g, c.price))
        .collect();
    let cash_before: Vec<Decimal> = ctx.agents.iter().map(|a| a.cash).collect();
    let mut inventory_change = 0.0;
    for (agent, intent) in ctx.agents.iter_mut().zip(&work.intentions) {
        let before: f64 = agent
            .inventory
            .iter()
            .map(|(g, q)| q * prices.get(g).copied().unwrap_or(0.0))
            .sum();
        let settlement = agent.settle(work.turn, intent, &work.outcome.fills, &prices)?;
        if agent.role().is_producer() {
            let after: f64 = agent
                .inventory
                .iter()
                .map(|(g, q)| q * prices.get(g).copied().unwrap_or(0.0))
                .sum();
            inventory_change += after - before;
        }
        if agent.role() != Role::RawMaterials
            && intent.production + QTY_EPSILON < intent.desired_production
        {
            work.events.push(Event::new(
                work.turn,
                EventKind::ProductionShortfall,
                format!(
                    "{} produced {:.2} of {:.2} planned",
                    agent.name, intent.production, intent.desired_production
                ),
            ));
        }
        work.settlements.insert(agent.id, settlement);
    }
    work.inventory_change = inventory_change;

    let changes: BTreeMap<AgentId, Decimal> = ctx
        .agents
        .iter()
        .zip(cash_before)
        .filter(|(a, before)| a.cash != *before)
        .map(|(a, before)| (a.id, a.cash - before))
        .collect();
    ctx.ledger.settle_net(&changes)?;
    Ok(())
}

/// Move up to `amount` between agents, keeping the bank ledger in step.
/// Returns the amount paid.
fn pay(ctx: &mut SimContext, from: AgentId, to: AgentId, amount: Decimal) -> Result<Decimal, SimError> {
    let paid = transfer(&mut ctx.agents, from, to, amount);
    ctx.ledger.transfer(from, to, paid)?;
    Ok(paid)
}

/// Interest first, then amortization; then the bank's discount-window
/// interest and the interest it owes depositors.
fn service_loans(ctx: &mut SimContext, work: &mut TurnWork) -> Result<(), SimError> {
    let bank = Role::Financial.id();
    let turns_per_year = ctx.config.turns_per_year();
    let loans: Vec<_> = ctx.ledger.loans().cloned().collect();
    for loan in loans {
        let borrower = loan.borrower;
        let interest = loan.interest_due(turns_per_year)?;
        let paid_interest = pay(ctx, borrower, bank, interest)?;
        let deferred_interest = ctx.ledger.record_interest(loan.id, interest, paid_interest)?;
        work.cost(borrower, paid_interest);

        let due = loan.installment();
        let principal = due.min(ctx.agents[borrower.index()].cash).max(Decimal::ZERO);
        if ctx.ledger.loan(loan.id).is_some() {
            ctx.ledger.repay(loan.id, principal)?;
            ctx.agents[borrower.index()].cash -= principal;
        }
        if principal < due || deferred_interest > Decimal::ZERO {
            work.event(
                EventKind::RepaymentDeferred,
                format!(
                    "{} deferred {} principal and {} interest on loan {}",
                    ctx.agents[borrower.index()].name,
                    due - principal,
                    deferred_interest,
                    loan.id
                ),
            );
        }
    }

    // Discount-window interest goes to the central bank, which remits it to
    // the Treasury, so it stays in circulation.
    let discount_rate = ctx.central_bank()?.discount_rate(&ctx.config.policy);
    let rate = to_money(discount_rate / turns_per_year)?;
    let owed = (ctx.ledger.discount_borrowing() * rate).round_dp(sim_core::MONEY_DP);
    if owed > Decimal::ZERO {
        let paid = pay(ctx, bank, Role::Government.id(), owed)?;
        if paid < owed {
            work.event(
                EventKind::Warning,
                format!("Bank paid {} of {} discount-window interest", paid, owed),
            );
        }
    }

    let (_, deposit_rate) = work.credit_terms();
    let rate = to_money(deposit_rate / turns_per_year)?;
    if rate > Decimal::ZERO {
        let depositors: Vec<_> = ctx.ledger.depositors().collect();
        for (holder, balance) in depositors {
            let interest = (balance * rate).round_dp(sim_core::MONEY_DP);
            pay(ctx, bank, holder, interest)?;
        }
    }
    Ok(())
}

fn originate_loans(ctx: &mut SimContext, work: &mut TurnWork) -> Result<(), SimError> {
    let (prime_rate, _) = work.credit_terms();
    let policy = ctx.config.policy.clone();
    let requests: Vec<_> = work
        .intentions
        .iter()
        .filter_map(|i| i.credit.clone())
        .collect();
    for request in requests {
        let tier = ctx.config.banking.terms(request.tier);
        let terms = LoanTerms {
            tier: request.tier,
            annual_rate: prime_rate + tier.premium,
            term_turns: ctx.config.banking.loan_term_turns,
        };
        let name = ctx.agents[request.borrower.index()].name.clone();
        if ctx.ledger.arrears_of(request.borrower) > Decimal::ZERO {
            work.event(
                EventKind::LoanDeclined,
                format!("{} was refused {}: loan arrears", name, request.amount),
            );
            continue;
        }
        let needed = ctx.ledger.reserves_needed(request.amount, tier.weight)?;
        if needed > Decimal::ZERO {
            let granted = ctx.central_bank_mut()?.lend_reserves(needed, &policy)?;
            if granted > Decimal::ZERO {
                ctx.ledger.borrow_reserves(granted)?;
                work.event(
                    EventKind::EmergencyLending,
                    format!(
                        "Central bank lent {} reserves at {:.2}% to fund {}",
                        granted,
                        ctx.central_bank()?.discount_rate(&policy) * 100.0,
                        name
                    ),
                );
            }
        }
        match ctx.ledger.originate(&request, terms, tier.weight, work.turn)? {
            Some(loan) => {
                ctx.agents[request.borrower.index()].cash += loan.principal;
                work.event(
                    EventKind::LoanIssued,
                    format!(
                        "{} borrowed {} at {:.2}% ({:?})",
                        name,
                        loan.principal,
                        terms.annual_rate * 100.0,
                        request.tier
                    ),
                );
            }
            None => work.event(
                EventKind::LoanDeclined,
                format!("{} was refused {}: no lending capacity", name, request.amount),
            ),
        }
    }

    let returned = ctx.ledger.repay_reserves();
    if returned > Decimal::ZERO {
        ctx.central_bank_mut()?.receive_repayment(returned);
        tracing::debug!(turn = work.turn, %returned, "discount window repaid");
    }
    Ok(())
}

fn pay_wages_and_research(ctx: &mut SimContext, work: &mut TurnWork) -> Result<(), SimError> {
    let households = Role::Consumer.id();
    let firm = ctx.config.agents.firm.clone();
    let buffer = to_money(firm.cash_buffer)?;
    let rd_share = to_money(firm.rd_share)?;
    for role in Role::ALL.into_iter().filter(|r| r.is_producer()) {
        let id = role.id();
        let wages = to_money(ctx.config.labor.wage_rate * ctx.agents[id.index()].labor)?;
        let paid = pay(ctx, id, households, wages)?;
        work.cost(id, paid);
        work.household_income += paid;
        if paid < wages {
            work.event(
                EventKind::PayrollShortfall,
                format!("{} paid {} of {} wages", role, paid, wages),
            );
        }

        let surplus = ctx.agents[id.index()].cash - buffer;
        if surplus > Decimal::ZERO {
            let spend = (surplus * rd_share).round_dp(sim_core::MONEY_DP);
            let spent = pay(ctx, id, households, spend)?;
            ctx.agents[id.index()].apply_rd(spent, &firm);
            work.cost(id, spent);
            work.household_income += spent;
            work.rd_spend += spent;
        }
    }
    Ok(())
}

fn collect_taxes(ctx: &mut SimContext, work: &mut TurnWork) -> Result<(), SimError> {
    let government = Role::Government.id();
    let rate = to_money(ctx.config.fiscal.tax_rate)?;
    let mut bills = vec![(Role::Consumer.id(), work.household_income)];
    for role in Role::ALL.into_iter().filter(|r| r.is_producer()) {
        let id = role.id();
        let s = work.settlements.get(&id).cloned().unwrap_or_default();
        let costs = work.costs.get(&id).copied().unwrap_or(Decimal::ZERO);
        let profit = s.revenue - s.purchases - costs;
        bills.push((id, profit.max(Decimal::ZERO)));
    }
    for (payer, base) in bills {
        let due = (base * rate).round_dp(sim_core::MONEY_DP);
        let paid = pay(ctx, payer, government, due)?;
        work.tax_revenue += paid;
        if paid < due {
            work.event(
                EventKind::TaxShortfall,
                format!("{} paid {} of {} tax", ctx.agents[payer.index()].name, paid, due),
            );
        }
    }
    Ok(())
}

fn pay_dividends(ctx: &mut SimContext, work: &mut TurnWork) -> Result<(), SimError> {
    let households = Role::Consumer.id();
    let firm = &ctx.config.agents.firm;
    let bank = &ctx.config.agents.financial;
    let mut payers: Vec<(AgentId, Decimal, Decimal)> = Vec::new();
    for role in Role::ALL.into_iter().filter(|r| r.is_producer()) {
        payers.push((role.id(), to_money(firm.cash_buffer)?, to_money(firm.payout_ratio)?));
    }
    payers.push((
        Role::Financial.id(),
        to_money(bank.cash_buffer)?,
        to_money(bank.payout_ratio)?,
    ));
    for (id, buffer, ratio) in payers {
        let surplus = ctx.agents[id.index()].cash - buffer;
        if surplus > Decimal::ZERO {
            let dividend = (surplus * ratio).round_dp(sim_core::MONEY_DP);
            pay(ctx, id, households, dividend)?;
        }
    }
    tracing::trace!(turn = work.turn, "dividends paid");
    Ok(())
}

/// Record revenue, retire public debt out of a surplus, oldest loan first,
/// and flag the debt ceiling.
fn fiscal_bookkeeping(ctx: &mut SimContext, work: &mut TurnWork) -> Result<(), SimError> {
    let government = Role::Government.id();
    let spending = work
        .settlements
        .get(&government)
        .map(|s| s.purchases)
        .unwrap_or(Decimal::ZERO);
    ctx.agents[government.index()].record_revenue(work.tax_revenue);

    let mut surplus = (work.tax_revenue - spending).min(ctx.agents[government.index()].cash);
    let loans: Vec<_> = ctx
        .ledger
        .loans_of(government)
        .map(|l| (l.id, l.outstanding))
        .collect();
    for (id, outstanding) in loans {
        if surplus <= Decimal::ZERO {
            break;
        }
        let amount = surplus.min(outstanding);
        if amount <= Decimal::ZERO {
            continue;
        }
        ctx.ledger.prepay(id, amount)?;
        ctx.agents[government.index()].cash -= amount;
        surplus -= amount;
    }

    let debt = ctx.ledger.debt_of(government);
    let ceiling = to_money(ctx.config.fiscal.debt_ceiling)?;
    if debt >= ceiling {
        work.event(
            EventKind::DebtCeilingReached,
            format!("Public debt {} reached the ceiling {}", debt, ceiling),
        );
    }
    Ok(())
}

/// Measure the turn and let the central bank set the next rate.
fn policy_phase(ctx: &mut SimContext, work: &mut TurnWork) -> Result<(), SimError> {
    let spent = |role: Role| {
        work.settlements
            .get(&role.id())
            .map(|s| money_to_f64(s.purchases))
            .unwrap_or(0.0)
    };
    let components = GdpComponents {
        consumption: spent(Role::Consumer),
        investment: money_to_f64(work.rd_spend) + work.inventory_change,
        government: spent(Role::Government),
        net_exports: 0.0,
    };
    let gdp = components.total().max(0.0);

    let prices: BTreeMap<Good, f64> = work.outcome.goods.iter().map(|(g, c)| (*g, c.price)).collect();
    let volumes: BTreeMap<Good, f64> = work.outcome.goods.iter().map(|(g, c)| (*g, c.traded)).collect();
    let market = &ctx.config.market;
    let index = cpi(&prices, &market.initial_prices, &market.cpi_weights, &volumes)?
        .unwrap_or(ctx.state.cpi);
    let inflation = inflation(index, ctx.state.cpi)?;

    let first = ctx
        .state
        .first_positive_gdp()
        .or(if gdp > 0.0 { Some((work.turn, gdp)) } else { None });
    let potential = potential_gdp(first, work.turn, ctx.config.policy.potential_growth);
    let gap = output_gap(gdp, potential)?;

    let inputs = PolicyInputs {
        turn: work.turn,
        inflation,
        output_gap: gap,
        employment_rate: work.employment,
    };
    let policy = ctx.config.policy.clone();
    let outcome = ctx.central_bank_mut()?.set_rate(&inputs, &policy)?;
    work.events.extend(outcome.events);
    work.measures = Measures {
        components,
        cpi: index,
        inflation,
        output_gap: gap,
        policy_rate: outcome.rate,
    };
    Ok(())
}

/// Publish the turn's indicators and extend the histories.
fn aggregation_phase(ctx: &mut SimContext, work: &mut TurnWork) -> Result<(), SimError> {
    let mut employed = 0.0;
    for agent in ctx.agents.iter_mut().filter(|a| a.role().is_producer()) {
        agent.labor = work.labor_next.get(&agent.id).copied().unwrap_or(0.0);
        employed += agent.labor;
    }
    ctx.agents[Role::Consumer.id().index()].labor = employed;

    let m = std::mem::take(&mut work.measures);
    let m2 = ctx.ledger.money_supply();
    let gdp = m.components.total().max(0.0);
    let velocity = if m2 > Decimal::ZERO {
        gdp / money_to_f64(m2)
    } else {
        0.0
    };
    let indicators = Indicators {
        components: m.components,
        cpi: m.cpi,
        inflation: m.inflation,
        employment_rate: work.employment,
        money_supply: m2,
        velocity,
        policy_rate: m.policy_rate,
        output_gap: m.output_gap,
        tax_revenue: money_to_f64(work.tax_revenue),
        public_debt: money_to_f64(ctx.ledger.debt_of(Role::Government.id())),
        prices: work.outcome.goods.iter().map(|(g, c)| (*g, c.price)).collect(),
        volumes: work.outcome.goods.iter().map(|(g, c)| (*g, c.traded)).collect(),
    };
    ctx.state = ctx.state.next(ctx.config.months_per_turn, indicators)?;
    let (state, config) = (&ctx.state, &ctx.config);
    for agent in ctx.agents.iter_mut() {
        agent.observe(state, config);
    }
    ctx.check_invariants()
}
