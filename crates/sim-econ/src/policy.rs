//! Monetary-policy arithmetic: Taylor Rule, output gap and rate smoothing.

use crate::EconError;

/// Inputs to the Taylor Rule. Rates and inflation are fractions (0.02 = 2%).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TaylorInputs {
    pub neutral_rate: f64,
    pub inflation: f64,
    pub inflation_target: f64,
    pub output_gap: f64,
}

/// Inflation-gap coefficient.
const INFLATION_WEIGHT: f64 = 1.5;
/// Output-gap coefficient.
const OUTPUT_WEIGHT: f64 = 0.5;

/// `max(0, neutral + 1.5 × (inflation − target) + 0.5 × output_gap)`
pub fn taylor_rule(inputs: &TaylorInputs) -> Result<f64, EconError> {
    let TaylorInputs {
        neutral_rate,
        inflation,
        inflation_target,
        output_gap,
    } = *inputs;
    if ![neutral_rate, inflation, inflation_target, output_gap]
        .iter()
        .all(|v| v.is_finite())
    {
        return Err(EconError::NonFinite);
    }
    let rate = neutral_rate
        + INFLATION_WEIGHT * (inflation - inflation_target)
        + OUTPUT_WEIGHT * output_gap;
    Ok(rate.max(0.0))
}

/// `(gdp − potential) / potential`; zero while no potential is known.
pub fn output_gap(gdp: f64, potential: Option<f64>) -> Result<f64, EconError> {
    if !gdp.is_finite() {
        return Err(EconError::NonFinite);
    }
    match potential {
        Some(p) if p.is_finite() && p > 0.0 => Ok((gdp - p) / p),
        Some(p) if !p.is_finite() => Err(EconError::NonFinite),
        _ => Ok(0.0),
    }
}

/// Potential output at `turn`: the first positive GDP, compounded at
/// `growth` per turn since it was observed.
pub fn potential_gdp(first_positive: Option<(u64, f64)>, turn: u64, growth: f64) -> Option<f64> {
    let (observed_at, base) = first_positive?;
    let elapsed = turn.saturating_sub(observed_at) as f64;
    Some(base * (1.0 + growth).powf(elapsed))
}

/// Rate after the per-turn step limit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepLimited {
    pub rate: f64,
    /// The unconstrained target was further away than `max_step`.
    pub clamped: bool,
}

/// Move from `previous` toward `target` by at most `max_step`.
pub fn limit_step(previous: f64, target: f64, max_step: f64) -> Result<StepLimited, EconError> {
    if !previous.is_finite() || !target.is_finite() || !max_step.is_finite() || max_step < 0.0 {
        return Err(EconError::NonFinite);
    }
    let delta = target - previous;
    if delta.abs() <= max_step {
        return Ok(StepLimited {
            rate: target,
            clamped: false,
        });
    }
    Ok(StepLimited {
        rate: previous + max_step.copysign(delta),
        clamped: true,
    })
}

/// Tolerance for treating a rate as sitting exactly between two grid points.
const TIE_EPSILON: f64 = 1e-9;

/// Snap `rate` to the nearest multiple of `increment`.
///
/// A rate exactly halfway between two grid points goes to the point nearer
/// `tie_toward`. A non-positive increment disables quantization.
pub fn quantize_rate(rate: f64, increment: f64, tie_toward: f64) -> Result<f64, EconError> {
    if !rate.is_finite() || !increment.is_finite() || !tie_toward.is_finite() {
        return Err(EconError::NonFinite);
    }
    if increment <= 0.0 {
        return Ok(rate);
    }
    let steps = rate / increment;
    let lower = steps.floor();
    let frac = steps - lower;
    let chosen = if (frac - 0.5).abs() < TIE_EPSILON {
        let lo = lower * increment;
        let hi = (lower + 1.0) * increment;
        if (hi - tie_toward).abs() < (lo - tie_toward).abs() {
            lower + 1.0
        } else {
            lower
        }
    } else {
        steps.round()
    };
    Ok(chosen * increment)
}
