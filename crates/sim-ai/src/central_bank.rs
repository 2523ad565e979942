//! Central-bank policy engine.
//!
//! In AI mode the fed funds rate follows the Taylor Rule, moving at most
//! `max_step` per turn. In democratic mode it is the average of the votes
//! cast since the last meeting, provided a quorum voted. The discount window
//! lends reserves to the commercial bank at the discount rate, up to a limit.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sim_core::{Event, EventKind, GovernanceMode, PolicyConfig, PolicySummary, SimError};
use sim_econ::{limit_step, quantize_rate, taylor_rule, TaylorInputs};
use std::collections::BTreeMap;

/// Unemployment above which the stance reads as supporting employment.
const UNEMPLOYMENT_ALERT: f64 = 0.06;
/// Inflation overshoot above which the stance reads as fighting inflation.
const INFLATION_TOLERANCE: f64 = 0.005;

/// Macro readings for one policy meeting.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PolicyInputs {
    pub turn: u64,
    pub inflation: f64,
    pub output_gap: f64,
    pub employment_rate: f64,
}

/// Result of a policy meeting.
#[derive(Clone, Debug, PartialEq)]
pub struct PolicyOutcome {
    pub previous_rate: f64,
    pub rate: f64,
    pub taylor_rate: f64,
    pub events: Vec<Event>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CentralBank {
    mode: GovernanceMode,
    fed_funds_rate: f64,
    taylor_rate: f64,
    votes: BTreeMap<String, f64>,
    inflation: f64,
    unemployment: f64,
    output_gap: f64,
    /// Reserves lent through the discount window and not yet returned.
    emergency_lending: Decimal,
}

impl CentralBank {
    pub fn new(cfg: &PolicyConfig) -> Self {
        Self {
            mode: cfg.initial_mode,
            fed_funds_rate: cfg.initial_rate,
            taylor_rate: cfg.initial_rate,
            votes: BTreeMap::new(),
            inflation: 0.0,
            unemployment: 0.0,
            output_gap: 0.0,
            emergency_lending: Decimal::ZERO,
        }
    }

    pub fn mode(&self) -> GovernanceMode {
        self.mode
    }

    /// Switch governance; returns whether the mode changed.
    pub fn set_mode(&mut self, mode: GovernanceMode) -> bool {
        let changed = self.mode != mode;
        self.mode = mode;
        changed
    }

    pub fn fed_funds_rate(&self) -> f64 {
        self.fed_funds_rate
    }

    /// Taylor Rule value computed at the last meeting.
    pub fn taylor_rate(&self) -> f64 {
        self.taylor_rate
    }

    pub fn discount_rate(&self, cfg: &PolicyConfig) -> f64 {
        self.fed_funds_rate + cfg.discount_spread
    }

    pub fn emergency_lending(&self) -> Decimal {
        self.emergency_lending
    }

    /// Lend up to `requested` reserves, within the emergency lending limit.
    /// Returns the amount granted.
    pub fn lend_reserves(&mut self, requested: Decimal, cfg: &PolicyConfig) -> Result<Decimal, SimError> {
        let limit = sim_core::to_money(cfg.emergency_lending_limit)?;
        let granted = requested
            .max(Decimal::ZERO)
            .min((limit - self.emergency_lending).max(Decimal::ZERO));
        self.emergency_lending += granted;
        if granted > Decimal::ZERO {
            tracing::debug!(%granted, outstanding = %self.emergency_lending, "discount window loan");
        }
        Ok(granted)
    }

    pub fn receive_repayment(&mut self, amount: Decimal) {
        self.emergency_lending = (self.emergency_lending - amount).max(Decimal::ZERO);
    }

    pub fn votes_pending(&self) -> usize {
        self.votes.len()
    }

    /// Record a proposed rate. A voter voting again replaces its earlier vote.
    pub fn submit_vote(&mut self, voter: &str, rate: f64, cfg: &PolicyConfig) -> Result<(), SimError> {
        let voter = voter.trim();
        if voter.is_empty() || !rate.is_finite() || rate < 0.0 || rate > cfg.max_policy_rate {
            return Err(SimError::InvalidVote {
                voter: voter.to_string(),
                rate,
            });
        }
        self.votes.insert(voter.to_string(), rate);
        Ok(())
    }

    /// Hold the policy meeting for the turn just measured.
    ///
    /// Pending votes are consumed whatever the mode.
    pub fn set_rate(&mut self, inputs: &PolicyInputs, cfg: &PolicyConfig) -> Result<PolicyOutcome, SimError> {
        let taylor = taylor_rule(&TaylorInputs {
            neutral_rate: cfg.neutral_rate,
            inflation: inputs.inflation,
            inflation_target: cfg.inflation_target,
            output_gap: inputs.output_gap,
        })?;
        let previous = self.fed_funds_rate;
        let mut events = Vec::new();

        let rate = match self.mode {
            GovernanceMode::Ai => {
                let step = limit_step(previous, taylor, cfg.max_step)?;
                if step.clamped {
                    events.push(Event::new(
                        inputs.turn,
                        EventKind::RateClamped,
                        format!(
                            "Taylor Rule suggests {:.2}%; move limited to {:.2} points, {:.2} points short",
                            taylor * 100.0,
                            cfg.max_step * 100.0,
                            (taylor - step.rate) * 100.0
                        ),
                    ));
                }
                quantize_rate(step.rate, cfg.rate_increment, taylor)?
            }
            GovernanceMode::Democratic => {
                let cast = self.votes.len();
                if cast == 0 || cast < cfg.quorum {
                    let err = SimError::QuorumNotMet {
                        cast,
                        quorum: cfg.quorum.max(1),
                    };
                    events.push(Event::from_error(inputs.turn, &err));
                    previous
                } else {
                    let average = self.votes.values().sum::<f64>() / cast as f64;
                    quantize_rate(average, cfg.rate_increment, taylor)?
                }
            }
        };
        let rate = rate.clamp(0.0, cfg.max_policy_rate);
        self.votes.clear();
        self.fed_funds_rate = rate;
        self.taylor_rate = taylor;
        self.inflation = inputs.inflation;
        self.unemployment = 1.0 - inputs.employment_rate;
        self.output_gap = inputs.output_gap;

        if (rate - previous).abs() > f64::EPSILON {
            events.push(Event::new(
                inputs.turn,
                EventKind::PolicyRateSet,
                format!(
                    "Fed funds rate {:.2}% -> {:.2}% ({})",
                    previous * 100.0,
                    rate * 100.0,
                    self.mode
                ),
            ));
        }
        tracing::info!(turn = inputs.turn, mode = %self.mode, previous, rate, taylor, "policy rate set");
        Ok(PolicyOutcome {
            previous_rate: previous,
            rate,
            taylor_rate: taylor,
            events,
        })
    }

    /// One-line account of the current stance.
    pub fn explanation(&self, cfg: &PolicyConfig) -> String {
        let stance = if self.inflation > cfg.inflation_target + INFLATION_TOLERANCE {
            "Fighting inflation"
        } else if self.unemployment > UNEMPLOYMENT_ALERT {
            "Supporting employment"
        } else {
            "Neutral"
        };
        format!(
            "Fed funds {:.2}%, Taylor Rule {:.2}%, inflation {:.2}% (target {:.2}%), unemployment {:.2}%, output gap {:.2}%. Policy stance: {}",
            self.fed_funds_rate * 100.0,
            self.taylor_rate * 100.0,
            self.inflation * 100.0,
            cfg.inflation_target * 100.0,
            self.unemployment * 100.0,
            self.output_gap * 100.0,
            stance
        )
    }

    pub fn summary(&self, cfg: &PolicyConfig) -> PolicySummary {
        PolicySummary {
            mode: self.mode,
            fed_funds_rate: self.fed_funds_rate,
            taylor_rate: self.taylor_rate,
            discount_rate: self.discount_rate(cfg),
            inflation_target: cfg.inflation_target,
            explanation: self.explanation(cfg),
            votes_pending: self.votes.len(),
            emergency_lending: self.emergency_lending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(inflation: f64) -> PolicyInputs {
        PolicyInputs {
            turn: 1,
            inflation,
            output_gap: 0.0,
            employment_rate: 0.95,
        }
    }

    #[test]
    fn ai_mode_steps_toward_taylor() {
        let cfg = PolicyConfig {
            neutral_rate: 0.02,
            initial_rate: 0.02,
            ..PolicyConfig::default()
        };
        let mut cb = CentralBank::new(&cfg);
        let out = cb.set_rate(&inputs(0.04), &cfg).unwrap();
        assert!((out.taylor_rate - 0.05).abs() < 1e-12);
        assert!((out.rate - 0.025).abs() < 1e-12);
        let clamped = out
            .events
            .iter()
            .find(|e| e.kind == EventKind::RateClamped)
            .unwrap();
        assert!(clamped.message.contains("2.50 points short"), "{}", clamped.message);
        assert!(out.events.iter().any(|e| e.kind == EventKind::PolicyRateSet));
    }

    #[test]
    fn discount_window_respects_the_limit() {
        let cfg = PolicyConfig {
            emergency_lending_limit: 1_000.0,
            ..PolicyConfig::default()
        };
        let mut cb = CentralBank::new(&cfg);
        assert_eq!(cb.lend_reserves(Decimal::from(600), &cfg).unwrap(), Decimal::from(600));
        assert_eq!(cb.lend_reserves(Decimal::from(600), &cfg).unwrap(), Decimal::from(400));
        assert_eq!(cb.lend_reserves(Decimal::ONE, &cfg).unwrap(), Decimal::ZERO);
        cb.receive_repayment(Decimal::from(250));
        assert_eq!(cb.emergency_lending(), Decimal::from(750));
        assert_eq!(cb.summary(&cfg).emergency_lending, Decimal::from(750));
    }

    #[test]
    fn ai_mode_within_step_lands_on_grid() {
        let cfg = PolicyConfig::default();
        let mut cb = CentralBank::new(&cfg);
        // taylor = 0.025 + 1.5 × 0.001 = 0.0265 -> 0.0275 on the grid
        let out = cb.set_rate(&inputs(0.021), &cfg).unwrap();
        assert!((out.rate - 0.0275).abs() < 1e-12);
        assert!(!out.events.iter().any(|e| e.kind == EventKind::RateClamped));
    }

    #[test]
    fn democratic_average() {
        let cfg = PolicyConfig {
            initial_mode: GovernanceMode::Democratic,
            ..PolicyConfig::default()
        };
        let mut cb = CentralBank::new(&cfg);
        cb.submit_vote("alice", 0.03, &cfg).unwrap();
        cb.submit_vote("bob", 0.05, &cfg).unwrap();
        cb.submit_vote("carol", 0.04, &cfg).unwrap();
        let out = cb.set_rate(&inputs(0.02), &cfg).unwrap();
        assert!((out.rate - 0.04).abs() < 1e-12);
        assert_eq!(cb.votes_pending(), 0);
    }

    #[test]
    fn revote_replaces_earlier_vote() {
        let cfg = PolicyConfig::default();
        let mut cb = CentralBank::new(&cfg);
        cb.submit_vote("alice", 0.03, &cfg).unwrap();
        cb.submit_vote("alice", 0.04, &cfg).unwrap();
        assert_eq!(cb.votes_pending(), 1);
    }

    #[test]
    fn no_quorum_holds_rate() {
        let cfg = PolicyConfig {
            initial_mode: GovernanceMode::Democratic,
            ..PolicyConfig::default()
        };
        let mut cb = CentralBank::new(&cfg);
        let out = cb.set_rate(&inputs(0.10), &cfg).unwrap();
        assert_eq!(out.rate, cfg.initial_rate);
        assert_eq!(out.events.len(), 1);
        assert_eq!(out.events[0].kind, EventKind::QuorumNotMet);

        cb.submit_vote("alice", 0.10, &cfg).unwrap();
        let out = cb.set_rate(&inputs(0.10), &cfg).unwrap();
        assert_eq!(out.rate, cfg.initial_rate);
        assert_eq!(cb.votes_pending(), 0);
    }

    #[test]
    fn exact_tie_follows_taylor() {
        let cfg = PolicyConfig {
            initial_mode: GovernanceMode::Democratic,
            quorum: 2,
            ..PolicyConfig::default()
        };
        let mut cb = CentralBank::new(&cfg);
        cb.submit_vote("a", 0.03, &cfg).unwrap();
        cb.submit_vote("b", 0.0325, &cfg).unwrap();
        // high inflation: Taylor well above both grid points
        let out = cb.set_rate(&inputs(0.05), &cfg).unwrap();
        assert!((out.rate - 0.0325).abs() < 1e-12);
    }

    #[test]
    fn rejects_out_of_range_votes() {
        let cfg = PolicyConfig::default();
        let mut cb = CentralBank::new(&cfg);
        assert!(matches!(
            cb.submit_vote("a", -0.01, &cfg),
            Err(SimError::InvalidVote { .. })
        ));
        assert!(cb.submit_vote("a", f64::NAN, &cfg).is_err());
        assert!(cb.submit_vote("", 0.02, &cfg).is_err());
        assert!(cb.submit_vote("a", 0.5, &cfg).is_err());
    }

    #[test]
    fn explanation_names_the_stance() {
        let cfg = PolicyConfig::default();
        let mut cb = CentralBank::new(&cfg);
        cb.set_rate(&inputs(0.06), &cfg).unwrap();
        assert!(cb.explanation(&cfg).ends_with("Fighting inflation"));
        let mut cb = CentralBank::new(&cfg);
        cb.set_rate(
            &PolicyInputs {
                employment_rate: 0.8,
                ..inputs(0.02)
            },
            &cfg,
        )
        .unwrap();
        assert!(cb.explanation(&cfg).ends_with("Supporting employment"));
        assert!((cb.discount_rate(&cfg) - cb.fed_funds_rate() - 0.01).abs() < 1e-12);
    }
}
