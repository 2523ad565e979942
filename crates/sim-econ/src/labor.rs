//! Labor market: employment adjustment and allocation of workers to firms.

use crate::EconError;
use sim_core::{AgentId, QTY_EPSILON};
use std::collections::BTreeMap;

/// Employment rate implied by this turn's labor demand and supply.
pub fn implied_employment(demand: f64, supply: f64) -> Result<f64, EconError> {
    for q in [demand, supply] {
        if !q.is_finite() || q < 0.0 {
            return Err(EconError::InvalidQuantity(q));
        }
    }
    if supply <= QTY_EPSILON {
        return Ok(0.0);
    }
    Ok((demand.min(supply) / supply).clamp(0.0, 1.0))
}

/// Move employment part of the way toward the implied rate.
///
/// `e_next = e + adjustment × (implied − e)`, clamped to [0, 1].
pub fn smooth_employment(current: f64, implied: f64, adjustment: f64) -> Result<f64, EconError> {
    if !current.is_finite() || !implied.is_finite() || !adjustment.is_finite() {
        return Err(EconError::NonFinite);
    }
    let next = current + adjustment.clamp(0.0, 1.0) * (implied - current);
    Ok(next.clamp(0.0, 1.0))
}

/// Share `employed` workers among firms pro rata to their requests, never
/// giving a firm more than it asked for.
pub fn allocate_labor(
    requests: &BTreeMap<AgentId, f64>,
    employed: f64,
) -> Result<BTreeMap<AgentId, f64>, EconError> {
    if !employed.is_finite() || employed < 0.0 {
        return Err(EconError::InvalidQuantity(employed));
    }
    let mut total = 0.0;
    for q in requests.values() {
        if !q.is_finite() || *q < 0.0 {
            return Err(EconError::InvalidQuantity(*q));
        }
        total += q;
    }
    let share = if total <= QTY_EPSILON {
        0.0
    } else {
        (employed / total).min(1.0)
    };
    Ok(requests.iter().map(|(id, q)| (*id, q * share)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smoothing_moves_a_fifth_of_the_gap() {
        let e = smooth_employment(0.7, 0.9, 0.2).unwrap();
        assert!((e - 0.74).abs() < 1e-12);
    }

    #[test]
    fn implied_rate_is_bounded() {
        assert_eq!(implied_employment(50.0, 100.0).unwrap(), 0.5);
        assert_eq!(implied_employment(150.0, 100.0).unwrap(), 1.0);
        assert_eq!(implied_employment(10.0, 0.0).unwrap(), 0.0);
        assert!(implied_employment(-1.0, 10.0).is_err());
    }

    #[test]
    fn allocation_is_pro_rata_and_capped() {
        let req = BTreeMap::from([(AgentId(0), 100.0), (AgentId(1), 300.0)]);
        let got = allocate_labor(&req, 200.0).unwrap();
        assert!((got[&AgentId(0)] - 50.0).abs() < 1e-12);
        assert!((got[&AgentId(1)] - 150.0).abs() < 1e-12);
        let got = allocate_labor(&req, 1_000.0).unwrap();
        assert_eq!(got[&AgentId(1)], 300.0);
    }
}
