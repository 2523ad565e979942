//! Consumer price index over the fixed goods basket.

use crate::EconError;
use sim_core::Good;
use std::collections::BTreeMap;

/// Weighted price relative to the base-turn prices, over goods traded this turn.
///
/// `cpi = Σ wᵢ·(pᵢ / baseᵢ) / Σ wᵢ` where the sums run over goods with a
/// positive traded volume. Returns `None` when nothing traded, in which case
/// the caller carries the previous index forward.
pub fn cpi(
    prices: &BTreeMap<Good, f64>,
    base: &BTreeMap<Good, f64>,
    weights: &BTreeMap<Good, f64>,
    volumes: &BTreeMap<Good, f64>,
) -> Result<Option<f64>, EconError> {
    let mut weighted = 0.0;
    let mut total_weight = 0.0;
    for good in Good::ALL {
        let traded = volumes.get(&good).copied().unwrap_or(0.0);
        if traded <= 0.0 {
            continue;
        }
        let w = weights.get(&good).copied().unwrap_or(0.0);
        if w <= 0.0 {
            continue;
        }
        let p = prices.get(&good).copied().ok_or(EconError::InvalidPrice)?;
        let b = base.get(&good).copied().ok_or(EconError::InvalidPrice)?;
        if !p.is_finite() || p < 0.0 || !b.is_finite() || b <= 0.0 {
            return Err(EconError::InvalidPrice);
        }
        weighted += w * (p / b);
        total_weight += w;
    }
    if total_weight <= 0.0 {
        return Ok(None);
    }
    let index = weighted / total_weight;
    if !index.is_finite() {
        return Err(EconError::NonFinite);
    }
    Ok(Some(index))
}

/// Period-over-period change in the price index.
pub fn inflation(cpi: f64, previous: f64) -> Result<f64, EconError> {
    if !cpi.is_finite() || !previous.is_finite() || previous <= 0.0 {
        return Err(EconError::InvalidPrice);
    }
    Ok((cpi - previous) / previous)
}
