//! Macro indicators and their append-only histories.

use crate::{Good, SimConfig, SimError};
use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Expenditure components of GDP.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GdpComponents {
    /// Household final purchases (C).
    pub consumption: f64,
    /// R&D spending plus inventory change (I).
    pub investment: f64,
    /// Government purchases (G).
    pub government: f64,
    /// Exports minus imports; always 0 in a closed economy.
    pub net_exports: f64,
}

impl GdpComponents {
    pub fn total(&self) -> f64 {
        self.consumption + self.investment + self.government + self.net_exports
    }
}

/// Indicator series indexed by turn. Entry `t` is the value after turn `t`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    pub gdp: Vec<f64>,
    pub cpi: Vec<f64>,
    pub inflation: Vec<f64>,
    pub employment: Vec<f64>,
    pub money_supply: Vec<Decimal>,
    pub velocity: Vec<f64>,
    pub policy_rate: Vec<f64>,
}

impl History {
    fn push(&mut self, s: &EconomicState) {
        self.gdp.push(s.gdp);
        self.cpi.push(s.cpi);
        self.inflation.push(s.inflation);
        self.employment.push(s.employment_rate);
        self.money_supply.push(s.money_supply);
        self.velocity.push(s.velocity);
        self.policy_rate.push(s.policy_rate);
    }

    /// Whether every series holds exactly `len` entries.
    pub fn all_have_len(&self, len: usize) -> bool {
        self.gdp.len() == len
            && self.cpi.len() == len
            && self.inflation.len() == len
            && self.employment.len() == len
            && self.money_supply.len() == len
            && self.velocity.len() == len
            && self.policy_rate.len() == len
    }
}

/// Indicators measured for one completed turn, before they are published.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Indicators {
    pub components: GdpComponents,
    pub cpi: f64,
    pub inflation: f64,
    pub employment_rate: f64,
    pub money_supply: Decimal,
    pub velocity: f64,
    pub policy_rate: f64,
    pub output_gap: f64,
    pub tax_revenue: f64,
    pub public_debt: f64,
    pub prices: BTreeMap<Good, f64>,
    pub volumes: BTreeMap<Good, f64>,
}

/// Snapshot of macro indicators after a completed turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EconomicState {
    /// Completed turns; 0 before the first advance.
    pub turn: u64,
    /// Calendar period the turn represents.
    pub period: NaiveDate,
    /// Nominal GDP, never negative.
    pub gdp: f64,
    pub components: GdpComponents,
    /// Price level, base period = 1.0.
    pub cpi: f64,
    /// Period-over-period CPI change.
    pub inflation: f64,
    /// Employment rate in [0, 1].
    pub employment_rate: f64,
    /// M2: currency plus deposits.
    pub money_supply: Decimal,
    /// Nominal GDP / M2.
    pub velocity: f64,
    /// Fed funds rate in force for the next turn.
    pub policy_rate: f64,
    pub output_gap: f64,
    pub tax_revenue: f64,
    pub public_debt: f64,
    /// Last clearing price per good.
    pub prices: BTreeMap<Good, f64>,
    /// Last traded quantity per good.
    pub volumes: BTreeMap<Good, f64>,
    pub history: History,
}

impl EconomicState {
    /// Turn-0 state with one history entry per series.
    pub fn initial(cfg: &SimConfig, money_supply: Decimal) -> Self {
        let mut s = Self {
            turn: 0,
            period: cfg.start_date,
            gdp: 0.0,
            components: GdpComponents::default(),
            cpi: 1.0,
            inflation: 0.0,
            employment_rate: cfg.labor.initial_employment,
            money_supply,
            velocity: 0.0,
            policy_rate: cfg.policy.initial_rate,
            output_gap: 0.0,
            tax_revenue: cfg.fiscal.initial_tax_revenue,
            public_debt: 0.0,
            prices: cfg.market.initial_prices.clone(),
            volumes: Good::ALL.iter().map(|g| (*g, 0.0)).collect(),
            history: History::default(),
        };
        let snapshot = s.clone();
        s.history.push(&snapshot);
        s
    }

    /// State after one more turn, with every history extended by one entry.
    pub fn next(&self, months_per_turn: u32, ind: Indicators) -> Result<Self, SimError> {
        let checks = [
            ("gdp", ind.components.total()),
            ("cpi", ind.cpi),
            ("inflation", ind.inflation),
            ("employment", ind.employment_rate),
            ("velocity", ind.velocity),
            ("policy rate", ind.policy_rate),
            ("output gap", ind.output_gap),
        ];
        for (name, v) in checks {
            if !v.is_finite() {
                return Err(SimError::NonFinite(name));
            }
        }
        if ind.cpi <= 0.0 {
            return Err(SimError::NonFinite("cpi"));
        }
        let period = self
            .period
            .checked_add_months(Months::new(months_per_turn))
            .unwrap_or(self.period);
        let mut s = Self {
            turn: self.turn + 1,
            period,
            gdp: ind.components.total().max(0.0),
            components: ind.components,
            cpi: ind.cpi,
            inflation: ind.inflation,
            employment_rate: ind.employment_rate.clamp(0.0, 1.0),
            money_supply: ind.money_supply,
            velocity: ind.velocity,
            policy_rate: ind.policy_rate,
            output_gap: ind.output_gap,
            tax_revenue: ind.tax_revenue,
            public_debt: ind.public_debt,
            prices: ind.prices,
            volumes: ind.volumes,
            history: self.history.clone(),
        };
        let snapshot = s.clone();
        s.history.push(&snapshot);
        Ok(s)
    }

    /// Last clearing price of a good.
    pub fn price(&self, good: Good) -> f64 {
        self.prices.get(&good).copied().unwrap_or(0.0)
    }

    /// Employment rate one turn before this state, or the current one at turn 0.
    pub fn previous_employment(&self) -> f64 {
        let e = &self.history.employment;
        if e.len() >= 2 {
            e[e.len() - 2]
        } else {
            self.employment_rate
        }
    }

    /// First positive GDP observed, with the turn it was observed at.
    pub fn first_positive_gdp(&self) -> Option<(u64, f64)> {
        self.history
            .gdp
            .iter()
            .enumerate()
            .find(|(_, g)| **g > 0.0)
            .map(|(t, g)| (t as u64, *g))
    }

    /// `turn + 1` entries in every series.
    pub fn history_is_consistent(&self) -> bool {
        self.history.all_have_len(self.turn as usize + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indicators(c: f64) -> Indicators {
        Indicators {
            components: GdpComponents {
                consumption: c,
                investment: 10.0,
                government: 5.0,
                net_exports: 0.0,
            },
            cpi: 1.01,
            inflation: 0.01,
            employment_rate: 0.9,
            money_supply: Decimal::new(60_000, 0),
            velocity: 0.1,
            policy_rate: 0.03,
            ..Indicators::default()
        }
    }

    #[test]
    fn initial_state_has_one_entry_per_series() {
        let s = EconomicState::initial(&SimConfig::default(), Decimal::new(60_000, 0));
        assert_eq!(s.turn, 0);
        assert_eq!(s.cpi, 1.0);
        assert!(s.history_is_consistent());
        assert_eq!(s.history.gdp, vec![0.0]);
    }

    #[test]
    fn next_appends_and_advances_period() {
        let s0 = EconomicState::initial(&SimConfig::default(), Decimal::new(60_000, 0));
        let s1 = s0.next(3, indicators(100.0)).unwrap();
        let s2 = s1.next(3, indicators(120.0)).unwrap();
        assert_eq!(s2.turn, 2);
        assert!(s2.history_is_consistent());
        assert_eq!(s2.history.gdp, vec![0.0, 115.0, 135.0]);
        assert_eq!(s2.period, NaiveDate::from_ymd_opt(2000, 7, 1).unwrap());
        assert_eq!(s2.previous_employment(), 0.9);
        assert_eq!(s2.first_positive_gdp(), Some((1, 115.0)));
        // the previous state is untouched
        assert_eq!(s1.history.gdp.len(), 2);
    }

    #[test]
    fn gdp_is_floored_and_bad_cpi_rejected() {
        let s0 = EconomicState::initial(&SimConfig::default(), Decimal::ZERO);
        let s1 = s0.next(3, indicators(-500.0)).unwrap();
        assert_eq!(s1.gdp, 0.0);
        let mut bad = indicators(1.0);
        bad.cpi = 0.0;
        assert_eq!(s0.next(3, bad), Err(SimError::NonFinite("cpi")));
        let mut bad = indicators(1.0);
        bad.inflation = f64::NAN;
        assert!(s0.next(3, bad).is_err());
    }
}
