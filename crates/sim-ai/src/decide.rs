//! Per-role decision rules.
//!
//! Decisions are pure: they read the agent's own state and the previous
//! turn's published state and return [`Intentions`]; nothing is mutated.

use crate::agent::{Agent, AgentKind, DecisionContext, Intentions, PolicyAction};
use rust_decimal::Decimal;
use sim_core::{money_to_f64, to_money, CreditTier, EconomicState, Good, SimError};
use sim_econ::LoanRequest;
use std::collections::BTreeMap;

/// Share of cash firms and the government may commit to purchases.
const PURCHASE_CASH_SHARE: f64 = 0.95;

impl Agent {
    /// What this agent wants to do in `ctx.turn`.
    pub fn decide(&self, ctx: &DecisionContext<'_>) -> Result<Intentions, SimError> {
        let mut out = Intentions::new(self.id);
        match &self.kind {
            AgentKind::RawMaterials => self.plan_raw_materials(ctx, &mut out)?,
            AgentKind::Manufacturing => self.plan_manufacturing(ctx, &mut out)?,
            AgentKind::Services => self.plan_services(ctx, &mut out)?,
            AgentKind::Consumer { confidence } => self.plan_households(ctx, *confidence, &mut out),
            AgentKind::Financial => {
                let b = &ctx.config.banking;
                let ffr = ctx.state.policy_rate;
                out.policy = Some(PolicyAction::CreditTerms {
                    prime_rate: ffr + b.base_spread,
                    deposit_rate: (ffr - b.deposit_spread).max(0.0),
                });
            }
            AgentKind::Government { last_revenue } => self.plan_government(ctx, *last_revenue, &mut out)?,
            AgentKind::CentralBank(cb) => {
                out.policy = Some(PolicyAction::Ballot {
                    mode: cb.mode(),
                    votes: cb.votes_pending(),
                });
            }
        }
        out.validate()?;
        Ok(out)
    }

    fn plan_raw_materials(&self, ctx: &DecisionContext<'_>, out: &mut Intentions) -> Result<(), SimError> {
        let r = &ctx.config.agents.raw_materials;
        let output = r
            .extraction_capacity
            .min(self.technology * r.base_capacity)
            .max(0.0);
        out.desired_production = output;
        out.production = output;
        out.labor_demand = labor_for(output, r.labor_productivity * self.technology);
        out.sell
            .insert(Good::RawMaterials, self.stock(Good::RawMaterials) + output);
        out.credit = self.credit_need(ctx, ctx.config.labor.wage_rate * self.labor)?;
        Ok(())
    }

    fn plan_manufacturing(&self, ctx: &DecisionContext<'_>, out: &mut Intentions) -> Result<(), SimError> {
        let m = &ctx.config.agents.manufacturing;
        let productivity = m.labor_productivity * self.technology;
        let finished = self.stock(Good::ManufacturedGoods);
        let desired = (self.last_sales * m.smoothing
            + m.gap_correction * (m.inventory_target - finished))
            .clamp(0.0, m.capacity);
        let raw = self.stock(Good::RawMaterials);
        let raw_bound = if m.io_coefficient > 0.0 {
            raw / m.io_coefficient
        } else {
            f64::INFINITY
        };
        let output = desired.min(self.labor * productivity).min(raw_bound).max(0.0);
        let used = (output * m.io_coefficient).min(raw);

        out.desired_production = desired;
        out.production = output;
        if used > 0.0 {
            out.inputs.insert(Good::RawMaterials, used);
        }
        out.labor_demand = labor_for(desired, productivity);
        out.sell.insert(Good::ManufacturedGoods, finished + output);

        let raw_price = ctx.state.price(Good::RawMaterials);
        let wanted = (m.raw_buffer * m.io_coefficient * desired - (raw - used)).max(0.0);
        let affordable = if raw_price > 0.0 {
            spendable(self.cash, PURCHASE_CASH_SHARE) / raw_price
        } else {
            0.0
        };
        out.buy.insert(Good::RawMaterials, wanted.min(affordable));

        let bill = ctx.config.labor.wage_rate * self.labor + wanted * raw_price;
        out.credit = self.credit_need(ctx, bill)?;
        Ok(())
    }

    fn plan_services(&self, ctx: &DecisionContext<'_>, out: &mut Intentions) -> Result<(), SimError> {
        let s = &ctx.config.agents.services;
        let productivity = s.labor_productivity * self.technology;
        let desired = (self.last_sales * (1.0 + s.demand_headroom)).clamp(0.0, s.capacity);
        let output = desired.min(self.labor * productivity).max(0.0);
        out.desired_production = desired;
        out.production = output;
        out.labor_demand = labor_for(desired, productivity);
        out.sell.insert(Good::Services, output);
        out.credit = self.credit_need(ctx, ctx.config.labor.wage_rate * self.labor)?;
        Ok(())
    }

    fn plan_households(&self, ctx: &DecisionContext<'_>, confidence: f64, out: &mut Intentions) {
        let c = &ctx.config.agents.consumer;
        let wanted = c.income_rate
            * c.population
            * ctx.state.employment_rate
            * confidence
            * ctx.demand_noise;
        let budget = wanted.min(spendable(self.cash, c.max_spend_share)).max(0.0);
        out.buy = split_budget(budget, &c.spending_shares, ctx.state);
        out.labor_supply = c.population;
    }

    /// Spend a share of last revenue plus deficit spending within the debt
    /// ceiling. Whatever cash cannot cover is borrowed; the loan settles after
    /// the goods market and funds the following turn's purchases.
    fn plan_government(
        &self,
        ctx: &DecisionContext<'_>,
        last_revenue: Decimal,
        out: &mut Intentions,
    ) -> Result<(), SimError> {
        let f = &ctx.config.fiscal;
        let headroom = (f.debt_ceiling - money_to_f64(ctx.debt)).max(0.0);
        let planned = f.spending_fraction * money_to_f64(last_revenue) + f.deficit_spending.min(headroom);
        let affordable = spendable(self.cash, PURCHASE_CASH_SHARE);
        out.buy = split_budget(planned.min(affordable).max(0.0), &f.spending_shares, ctx.state);

        let gap = (planned - affordable).min(headroom);
        if gap > 0.0 && ctx.arrears <= Decimal::ZERO {
            let amount = to_money(gap)?;
            if amount > Decimal::ZERO {
                out.credit = Some(LoanRequest {
                    borrower: self.id,
                    amount,
                    tier: CreditTier::Prime,
                });
            }
        }
        Ok(())
    }

    /// Working-capital loan for the part of `bill` cash does not cover.
    fn credit_need(&self, ctx: &DecisionContext<'_>, bill: f64) -> Result<Option<LoanRequest>, SimError> {
        let cash = money_to_f64(self.cash);
        if bill <= cash || ctx.arrears > Decimal::ZERO {
            return Ok(None);
        }
        let amount = to_money(bill - cash)?;
        if amount <= Decimal::ZERO {
            return Ok(None);
        }
        let assets = cash
            + self
                .inventory
                .iter()
                .map(|(g, q)| q * ctx.state.price(*g))
                .sum::<f64>();
        let leverage = if assets > 0.0 {
            money_to_f64(ctx.debt) / assets
        } else {
            f64::INFINITY
        };
        Ok(Some(LoanRequest {
            borrower: self.id,
            amount,
            tier: ctx.config.banking.tier_for_leverage(leverage),
        }))
    }
}

fn labor_for(output: f64, productivity: f64) -> f64 {
    if productivity > 0.0 {
        output / productivity
    } else {
        0.0
    }
}

fn spendable(cash: Decimal, share: f64) -> f64 {
    money_to_f64(cash).max(0.0) * share
}

/// Spread a money budget over goods by share, as quantities at last prices.
fn split_budget(
    budget: f64,
    shares: &BTreeMap<Good, f64>,
    state: &EconomicState,
) -> BTreeMap<Good, f64> {
    let total: f64 = shares.values().filter(|s| **s > 0.0).sum();
    let mut buy = BTreeMap::new();
    if budget <= 0.0 || total <= 0.0 {
        return buy;
    }
    for (good, share) in shares.iter().filter(|(_, s)| **s > 0.0) {
        let price = state.price(*good);
        if price > 0.0 {
            buy.insert(*good, budget * share / total / price);
        }
    }
    buy
}
