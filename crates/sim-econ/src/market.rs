//! Goods-market clearing.
//!
//! Each good clears independently. The clearing price moves the previous
//! price by the excess-demand ratio; the traded quantity is the short side of
//! the market and is shared pro rata among the long side.

use crate::EconError;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sim_core::{to_money, AgentId, Good, MarketConfig, QTY_EPSILON};
use std::collections::BTreeMap;

/// Direction of an order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
}

/// Quantity an agent wants to buy or sell this turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub agent: AgentId,
    pub good: Good,
    pub side: Side,
    pub quantity: f64,
}

/// Realized trade for one agent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub agent: AgentId,
    pub good: Good,
    pub side: Side,
    pub quantity: f64,
    pub price: f64,
    /// Money exchanged. Buyer and seller totals of a good match exactly.
    pub value: Decimal,
}

/// Clearing result for one good.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GoodClearing {
    pub good: Good,
    pub previous_price: f64,
    pub price: f64,
    pub supply: f64,
    pub demand: f64,
    pub traded: f64,
}

impl GoodClearing {
    /// Supply or demand left unmatched; it is foregone, not carried forward.
    pub fn unmatched(&self) -> f64 {
        (self.supply - self.demand).abs().max(0.0)
    }
}

/// Clearing results for all goods plus the individual fills.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketOutcome {
    pub goods: BTreeMap<Good, GoodClearing>,
    pub fills: Vec<Fill>,
    orders: Vec<Order>,
}

impl MarketOutcome {
    pub fn fills_for(&self, agent: AgentId) -> impl Iterator<Item = &Fill> {
        self.fills.iter().filter(move |f| f.agent == agent)
    }

    /// Clearing price of a good.
    pub fn price(&self, good: Good) -> Option<f64> {
        self.goods.get(&good).map(|g| g.price)
    }

    /// Total money paid for a good this turn.
    pub fn traded_value(&self, good: Good) -> Decimal {
        self.fills
            .iter()
            .filter(|f| f.good == good && f.side == Side::Buy)
            .map(|f| f.value)
            .sum()
    }

    /// Cap a seller's delivery of `good` at `max_quantity` and re-share the
    /// remaining volume among buyers at the same clearing price.
    ///
    /// Returns the quantity that could not be delivered.
    pub fn restrict_supply(
        &mut self,
        agent: AgentId,
        good: Good,
        max_quantity: f64,
    ) -> Result<f64, EconError> {
        if !max_quantity.is_finite() {
            return Err(EconError::InvalidQuantity(max_quantity));
        }
        let max_quantity = max_quantity.max(0.0);
        let delivered: f64 = self
            .fills
            .iter()
            .filter(|f| f.agent == agent && f.good == good && f.side == Side::Sell)
            .map(|f| f.quantity)
            .sum();
        let shortage = delivered - max_quantity;
        if shortage <= QTY_EPSILON {
            return Ok(0.0);
        }
        // Shrink the offer so its pro-rata share equals what it can deliver.
        let Some(clearing) = self.goods.get(&good).cloned() else {
            return Ok(0.0);
        };
        let remaining_supply = (clearing.traded - shortage).max(0.0);
        let mut adjusted: Vec<Order> = Vec::with_capacity(self.orders.len());
        for o in &self.orders {
            if o.good != good {
                adjusted.push(o.clone());
                continue;
            }
            let mut o = o.clone();
            o.quantity = match o.side {
                Side::Sell if o.agent == agent => max_quantity,
                Side::Sell => o.quantity * clearing.traded / clearing.supply.max(QTY_EPSILON),
                Side::Buy => o.quantity * remaining_supply / clearing.demand.max(QTY_EPSILON),
            };
            adjusted.push(o);
        }
        let (traded, fills) = allocate(good, clearing.price, &adjusted)?;
        self.fills.retain(|f| f.good != good);
        self.fills.extend(fills);
        if let Some(c) = self.goods.get_mut(&good) {
            c.traded = traded;
        }
        self.orders = adjusted;
        Ok(shortage)
    }
}

fn money(x: f64) -> Result<Decimal, EconError> {
    to_money(x).map_err(|_| EconError::NonFinite)
}

/// Price after one round of excess-demand adjustment.
///
/// `p = prev × (1 + elasticity × (demand − supply) / max(supply, 1))`, then
/// the optional per-turn cap, then the floor. Balanced markets keep `prev`.
pub fn next_price(
    prev: f64,
    supply: f64,
    demand: f64,
    cfg: &MarketConfig,
) -> Result<f64, EconError> {
    if !prev.is_finite() || prev < 0.0 {
        return Err(EconError::InvalidPrice);
    }
    if !cfg.elasticity.is_finite() || cfg.elasticity <= 0.0 || cfg.elasticity > 1.0 {
        return Err(EconError::InvalidElasticity(cfg.elasticity));
    }
    for q in [supply, demand] {
        if !q.is_finite() || q < 0.0 {
            return Err(EconError::InvalidQuantity(q));
        }
    }
    if supply == demand {
        return Ok(prev);
    }
    let ratio = (demand - supply) / supply.max(1.0);
    let mut p = prev * (1.0 + cfg.elasticity * ratio);
    if let Some(cap) = cfg.max_price_change {
        p = p.clamp(prev * (1.0 - cap).max(0.0), prev * (1.0 + cap));
    }
    let p = p.max(cfg.price_floor).max(0.0);
    if !p.is_finite() {
        return Err(EconError::NonFinite);
    }
    Ok(p)
}

/// Share the traded volume of `good` pro rata on both sides at `price`.
fn allocate(good: Good, price: f64, orders: &[Order]) -> Result<(f64, Vec<Fill>), EconError> {
    let sells: Vec<&Order> = orders
        .iter()
        .filter(|o| o.good == good && o.side == Side::Sell && o.quantity > 0.0)
        .collect();
    let buys: Vec<&Order> = orders
        .iter()
        .filter(|o| o.good == good && o.side == Side::Buy && o.quantity > 0.0)
        .collect();
    let supply: f64 = sells.iter().map(|o| o.quantity).sum();
    let demand: f64 = buys.iter().map(|o| o.quantity).sum();
    let traded = supply.min(demand);
    let mut fills = Vec::with_capacity(sells.len() + buys.len());
    if traded <= QTY_EPSILON {
        return Ok((0.0, fills));
    }

    let mut paid = Decimal::ZERO;
    for o in &buys {
        let quantity = o.quantity * traded / demand;
        let value = money(quantity * price)?;
        paid += value;
        fills.push(Fill {
            agent: o.agent,
            good,
            side: Side::Buy,
            quantity,
            price,
            value,
        });
    }
    // Sellers split exactly what buyers paid; the last seller takes the rounding.
    let mut remaining = paid;
    for (i, o) in sells.iter().enumerate() {
        let quantity = o.quantity * traded / supply;
        let value = if i + 1 == sells.len() {
            remaining
        } else {
            money(quantity * price)?.min(remaining)
        };
        remaining -= value;
        fills.push(Fill {
            agent: o.agent,
            good,
            side: Side::Sell,
            quantity,
            price,
            value,
        });
    }
    Ok((traded, fills))
}

/// Clear every good against its previous price.
pub fn clear_markets(
    prev_prices: &BTreeMap<Good, f64>,
    orders: Vec<Order>,
    cfg: &MarketConfig,
) -> Result<MarketOutcome, EconError> {
    for o in &orders {
        if !o.quantity.is_finite() || o.quantity < 0.0 {
            return Err(EconError::InvalidQuantity(o.quantity));
        }
    }
    let mut outcome = MarketOutcome::default();
    for good in Good::ALL {
        let prev = prev_prices
            .get(&good)
            .copied()
            .ok_or(EconError::InvalidPrice)?;
        let side_total = |side: Side| -> f64 {
            orders
                .iter()
                .filter(|o| o.good == good && o.side == side)
                .map(|o| o.quantity)
                .sum()
        };
        let supply = side_total(Side::Sell);
        let demand = side_total(Side::Buy);
        let price = next_price(prev, supply, demand, cfg)?;
        let (traded, fills) = allocate(good, price, &orders)?;
        tracing::debug!(%good, supply, demand, traded, prev, price, "market cleared");
        outcome.goods.insert(
            good,
            GoodClearing {
                good,
                previous_price: prev,
                price,
                supply,
                demand,
                traded,
            },
        );
        outcome.fills.extend(fills);
    }
    outcome.orders = orders;
    Ok(outcome)
}

/// Multiplicative uniform noise factor in `[1 - noise_frac, 1 + noise_frac]`.
///
/// Seeded for reproducibility. `noise_frac` must be in [0, 1).
pub fn noise_factor(noise_frac: f64, seed: u64) -> Result<f64, EconError> {
    if !noise_frac.is_finite() || !(0.0..1.0).contains(&noise_frac) {
        return Err(EconError::NonFinite);
    }
    if noise_frac == 0.0 {
        return Ok(1.0);
    }
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let u: f64 = rng.gen_range(-noise_frac..=noise_frac);
    Ok(1.0 + u)
}
