//! Simulation configuration and validation.
//!
//! Every constant the engine uses is a named field here. Sections default
//! individually (`#[serde(default)]`), so a YAML file only has to list the
//! values it overrides.

use crate::{ConfigError, CreditTier, GovernanceMode, Good};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Top-level simulation configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Seed for the per-turn demand noise.
    pub rng_seed: u64,
    /// Calendar date of turn 0.
    pub start_date: NaiveDate,
    /// Calendar months covered by one turn (3 = quarterly).
    pub months_per_turn: u32,
    /// Maximum number of events retained for snapshots.
    pub event_log_capacity: usize,
    pub market: MarketConfig,
    pub labor: LaborConfig,
    pub banking: BankingConfig,
    pub policy: PolicyConfig,
    pub fiscal: FiscalConfig,
    pub agents: AgentsConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            rng_seed: 42,
            start_date: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default(),
            months_per_turn: 3,
            event_log_capacity: 50,
            market: MarketConfig::default(),
            labor: LaborConfig::default(),
            banking: BankingConfig::default(),
            policy: PolicyConfig::default(),
            fiscal: FiscalConfig::default(),
            agents: AgentsConfig::default(),
        }
    }
}

impl SimConfig {
    /// Parse a YAML document; missing fields take their defaults.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Number of turns in a calendar year.
    pub fn turns_per_year(&self) -> f64 {
        12.0 / f64::from(self.months_per_turn.max(1))
    }
}

/// Goods-market clearing parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Price response to the excess-demand ratio, in (0, 1].
    pub elasticity: f64,
    /// Lowest price any good may clear at; must be positive so a good
    /// priced out can recover.
    pub price_floor: f64,
    /// Optional cap on the relative price move per turn.
    pub max_price_change: Option<f64>,
    /// Turn-0 prices; also the CPI base-period prices.
    pub initial_prices: BTreeMap<Good, f64>,
    /// CPI basket weights.
    pub cpi_weights: BTreeMap<Good, f64>,
    /// Uniform household-demand noise fraction in [0, 1).
    pub demand_noise: f64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            elasticity: 0.1,
            price_floor: 0.01,
            max_price_change: None,
            initial_prices: BTreeMap::from([
                (Good::RawMaterials, 10.0),
                (Good::ManufacturedGoods, 20.0),
                (Good::Services, 15.0),
            ]),
            cpi_weights: BTreeMap::from([
                (Good::RawMaterials, 0.2),
                (Good::ManufacturedGoods, 0.4),
                (Good::Services, 0.4),
            ]),
            demand_noise: 0.0,
        }
    }
}

/// Labor-market parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaborConfig {
    /// Wage per employed labor unit per turn.
    pub wage_rate: f64,
    /// Fraction of the employment gap closed each turn.
    pub employment_adjustment: f64,
    /// Employment rate at turn 0.
    pub initial_employment: f64,
}

impl Default for LaborConfig {
    fn default() -> Self {
        Self {
            wage_rate: 5.0,
            employment_adjustment: 0.2,
            initial_employment: 0.95,
        }
    }
}

/// Lending terms for one credit tier.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TierTerms {
    /// Share of lending capacity available to the tier, in (0, 1].
    pub weight: f64,
    /// Rate markup over the base lending rate.
    pub premium: f64,
}

/// Commercial bank parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BankingConfig {
    pub reserve_ratio: f64,
    /// Bank capital, held as reserves at start.
    pub initial_reserves: f64,
    /// Spread of the prime lending rate over the fed funds rate.
    pub base_spread: f64,
    /// Deposit rate discount below the fed funds rate.
    pub deposit_spread: f64,
    /// Number of turns over which a loan amortizes.
    pub loan_term_turns: u32,
    pub tiers: BTreeMap<CreditTier, TierTerms>,
    /// Leverage (debt / assets) up to which a borrower rates prime.
    pub prime_leverage: f64,
    /// Leverage up to which a borrower rates standard; above is subprime.
    pub standard_leverage: f64,
}

impl Default for BankingConfig {
    fn default() -> Self {
        Self {
            reserve_ratio: 0.10,
            initial_reserves: 20_000.0,
            base_spread: 0.02,
            deposit_spread: 0.01,
            loan_term_turns: 8,
            tiers: BTreeMap::from([
                (CreditTier::Prime, TierTerms { weight: 1.0, premium: 0.0 }),
                (CreditTier::Standard, TierTerms { weight: 0.5, premium: 0.01 }),
                (CreditTier::Subprime, TierTerms { weight: 0.25, premium: 0.03 }),
            ]),
            prime_leverage: 0.5,
            standard_leverage: 1.5,
        }
    }
}

impl BankingConfig {
    /// Terms for a tier; unknown tiers get no capacity.
    pub fn terms(&self, tier: CreditTier) -> TierTerms {
        self.tiers.get(&tier).copied().unwrap_or(TierTerms {
            weight: 0.0,
            premium: 0.0,
        })
    }

    /// Rate a borrower from its own leverage.
    pub fn tier_for_leverage(&self, leverage: f64) -> CreditTier {
        if leverage <= self.prime_leverage {
            CreditTier::Prime
        } else if leverage <= self.standard_leverage {
            CreditTier::Standard
        } else {
            CreditTier::Subprime
        }
    }
}

/// Central-bank parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub initial_mode: GovernanceMode,
    pub initial_rate: f64,
    pub neutral_rate: f64,
    pub inflation_target: f64,
    /// Largest rate move per turn in AI mode.
    pub max_step: f64,
    pub max_policy_rate: f64,
    /// Rate grid (0 disables quantization).
    pub rate_increment: f64,
    /// Discount rate spread over the fed funds rate.
    pub discount_spread: f64,
    /// Most reserves the discount window lends the commercial bank.
    pub emergency_lending_limit: f64,
    /// Minimum votes for a democratic decision.
    pub quorum: usize,
    /// Per-turn growth of potential GDP.
    pub potential_growth: f64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            initial_mode: GovernanceMode::Ai,
            initial_rate: 0.025,
            neutral_rate: 0.025,
            inflation_target: 0.02,
            max_step: 0.005,
            max_policy_rate: 0.20,
            rate_increment: 0.0025,
            discount_spread: 0.01,
            emergency_lending_limit: 20_000.0,
            quorum: 3,
            potential_growth: 0.0,
        }
    }
}

/// Government budget parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FiscalConfig {
    pub tax_rate: f64,
    /// Fraction of last turn's tax revenue spent.
    pub spending_fraction: f64,
    /// Extra deficit-financed spending per turn while below the debt ceiling.
    pub deficit_spending: f64,
    pub debt_ceiling: f64,
    /// Revenue assumed for the first budget.
    pub initial_tax_revenue: f64,
    /// Split of government purchases across goods.
    pub spending_shares: BTreeMap<Good, f64>,
}

impl Default for FiscalConfig {
    fn default() -> Self {
        Self {
            tax_rate: 0.15,
            spending_fraction: 0.9,
            deficit_spending: 200.0,
            debt_ceiling: 50_000.0,
            initial_tax_revenue: 1_000.0,
            spending_shares: BTreeMap::from([
                (Good::ManufacturedGoods, 0.4),
                (Good::Services, 0.6),
            ]),
        }
    }
}

/// Cash management shared by the three producers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FirmFinanceConfig {
    /// Cash kept back before R&D and dividends.
    pub cash_buffer: f64,
    /// Share of surplus cash spent on R&D.
    pub rd_share: f64,
    /// Technology gained per unit of R&D spend.
    pub rd_productivity: f64,
    /// Share of remaining surplus paid out to households.
    pub payout_ratio: f64,
    /// Lowest technology level a firm can have.
    pub min_technology: f64,
}

impl Default for FirmFinanceConfig {
    fn default() -> Self {
        Self {
            cash_buffer: 2_000.0,
            rd_share: 0.05,
            rd_productivity: 0.000_02,
            payout_ratio: 0.3,
            min_technology: 1.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawMaterialsConfig {
    pub cash: f64,
    pub base_capacity: f64,
    pub extraction_capacity: f64,
    pub labor_productivity: f64,
    pub initial_labor: f64,
    pub initial_inventory: f64,
}

impl Default for RawMaterialsConfig {
    fn default() -> Self {
        Self {
            cash: 10_000.0,
            base_capacity: 100.0,
            extraction_capacity: 100.0,
            labor_productivity: 0.8,
            initial_labor: 125.0,
            initial_inventory: 0.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManufacturingConfig {
    pub cash: f64,
    pub capacity: f64,
    /// Weight on last turn's realized sales.
    pub smoothing: f64,
    pub inventory_target: f64,
    /// Fraction of the inventory gap corrected per turn.
    pub gap_correction: f64,
    /// Raw materials consumed per unit of output.
    pub io_coefficient: f64,
    pub labor_productivity: f64,
    pub initial_labor: f64,
    pub initial_sales: f64,
    pub initial_raw_inventory: f64,
    /// Raw stock target as a multiple of next turn's input need.
    pub raw_buffer: f64,
}

impl Default for ManufacturingConfig {
    fn default() -> Self {
        Self {
            cash: 10_000.0,
            capacity: 150.0,
            smoothing: 1.0,
            inventory_target: 20.0,
            gap_correction: 0.5,
            io_coefficient: 1.2,
            labor_productivity: 0.6,
            initial_labor: 133.0,
            initial_sales: 80.0,
            initial_raw_inventory: 100.0,
            raw_buffer: 1.2,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    pub cash: f64,
    pub capacity: f64,
    pub labor_productivity: f64,
    pub initial_labor: f64,
    pub initial_sales: f64,
    /// Output planned above last turn's sales.
    pub demand_headroom: f64,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            cash: 10_000.0,
            capacity: 120.0,
            labor_productivity: 1.0,
            initial_labor: 120.0,
            initial_sales: 100.0,
            demand_headroom: 0.1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    pub cash: f64,
    /// Labor units households can supply.
    pub population: f64,
    /// Spending per employed labor unit at neutral confidence.
    pub income_rate: f64,
    /// EMA weight of the confidence update.
    pub confidence_smoothing: f64,
    /// Confidence gain per unit of relative employment growth.
    pub confidence_sensitivity: f64,
    /// Largest share of cash spent in one turn.
    pub max_spend_share: f64,
    pub spending_shares: BTreeMap<Good, f64>,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            cash: 10_000.0,
            population: 400.0,
            income_rate: 4.5,
            confidence_smoothing: 0.3,
            confidence_sensitivity: 2.0,
            max_spend_share: 0.8,
            spending_shares: BTreeMap::from([
                (Good::ManufacturedGoods, 0.5),
                (Good::Services, 0.5),
            ]),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinancialConfig {
    pub cash: f64,
    /// Cash kept back before dividends.
    pub cash_buffer: f64,
    pub payout_ratio: f64,
}

impl Default for FinancialConfig {
    fn default() -> Self {
        Self {
            cash: 10_000.0,
            cash_buffer: 5_000.0,
            payout_ratio: 0.5,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernmentConfig {
    pub cash: f64,
}

impl Default for GovernmentConfig {
    fn default() -> Self {
        Self { cash: 10_000.0 }
    }
}

/// Initial balances and behaviour constants per agent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    pub firm: FirmFinanceConfig,
    pub raw_materials: RawMaterialsConfig,
    pub manufacturing: ManufacturingConfig,
    pub services: ServicesConfig,
    pub consumer: ConsumerConfig,
    pub financial: FinancialConfig,
    pub government: GovernmentConfig,
}

fn finite(field: &'static str, v: f64) -> Result<(), ConfigError> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonFinite(field))
    }
}

fn non_negative(field: &'static str, v: f64) -> Result<(), ConfigError> {
    finite(field, v)?;
    if v < 0.0 {
        return Err(ConfigError::Negative(field));
    }
    Ok(())
}

fn positive(field: &'static str, v: f64) -> Result<(), ConfigError> {
    finite(field, v)?;
    if v <= 0.0 {
        return Err(ConfigError::NonPositive(field));
    }
    Ok(())
}

fn within(field: &'static str, v: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    finite(field, v)?;
    if v < min || v > max {
        return Err(ConfigError::OutOfRange {
            field,
            value: v,
            min,
            max,
        });
    }
    Ok(())
}

fn weights(field: &'static str, w: &BTreeMap<Good, f64>) -> Result<(), ConfigError> {
    let mut total = 0.0;
    for v in w.values() {
        non_negative(field, *v)?;
        total += v;
    }
    if total <= 0.0 {
        return Err(ConfigError::EmptyWeights(field));
    }
    Ok(())
}

/// Validate market parameters.
pub fn validate_market(m: &MarketConfig) -> Result<(), ConfigError> {
    // Elasticity above 1 lets a rationed buyer's bill exceed its budget.
    within("market.elasticity", m.elasticity, f64::MIN_POSITIVE, 1.0)?;
    positive("market.price_floor", m.price_floor)?;
    if let Some(cap) = m.max_price_change {
        positive("market.max_price_change", cap)?;
    }
    for good in Good::ALL {
        let p = m.initial_prices.get(&good).copied().ok_or(ConfigError::MissingGood {
            field: "market.initial_prices",
            good,
        })?;
        positive("market.initial_prices", p)?;
        if p < m.price_floor {
            return Err(ConfigError::OutOfRange {
                field: "market.initial_prices",
                value: p,
                min: m.price_floor,
                max: f64::MAX,
            });
        }
    }
    weights("market.cpi_weights", &m.cpi_weights)?;
    within("market.demand_noise", m.demand_noise, 0.0, 0.999)?;
    Ok(())
}

/// Validate banking parameters.
pub fn validate_banking(b: &BankingConfig) -> Result<(), ConfigError> {
    within("banking.reserve_ratio", b.reserve_ratio, 0.001, 1.0)?;
    non_negative("banking.initial_reserves", b.initial_reserves)?;
    non_negative("banking.base_spread", b.base_spread)?;
    non_negative("banking.deposit_spread", b.deposit_spread)?;
    if b.loan_term_turns == 0 {
        return Err(ConfigError::NonPositive("banking.loan_term_turns"));
    }
    for tier in [CreditTier::Prime, CreditTier::Standard, CreditTier::Subprime] {
        let t = b.terms(tier);
        within("banking.tiers.weight", t.weight, f64::MIN_POSITIVE, 1.0)?;
        non_negative("banking.tiers.premium", t.premium)?;
    }
    non_negative("banking.prime_leverage", b.prime_leverage)?;
    within(
        "banking.standard_leverage",
        b.standard_leverage,
        b.prime_leverage,
        f64::MAX,
    )?;
    Ok(())
}

/// Validate central-bank parameters.
pub fn validate_policy(p: &PolicyConfig) -> Result<(), ConfigError> {
    positive("policy.max_policy_rate", p.max_policy_rate)?;
    within("policy.initial_rate", p.initial_rate, 0.0, p.max_policy_rate)?;
    within("policy.neutral_rate", p.neutral_rate, 0.0, p.max_policy_rate)?;
    finite("policy.inflation_target", p.inflation_target)?;
    positive("policy.max_step", p.max_step)?;
    within("policy.rate_increment", p.rate_increment, 0.0, p.max_policy_rate)?;
    non_negative("policy.discount_spread", p.discount_spread)?;
    non_negative("policy.emergency_lending_limit", p.emergency_lending_limit)?;
    if p.quorum == 0 {
        return Err(ConfigError::NonPositive("policy.quorum"));
    }
    within("policy.potential_growth", p.potential_growth, -0.5, 0.5)?;
    Ok(())
}

/// Validate fiscal parameters.
pub fn validate_fiscal(f: &FiscalConfig) -> Result<(), ConfigError> {
    within("fiscal.tax_rate", f.tax_rate, 0.0, 1.0)?;
    within("fiscal.spending_fraction", f.spending_fraction, 0.0, 1.0)?;
    non_negative("fiscal.deficit_spending", f.deficit_spending)?;
    non_negative("fiscal.debt_ceiling", f.debt_ceiling)?;
    non_negative("fiscal.initial_tax_revenue", f.initial_tax_revenue)?;
    weights("fiscal.spending_shares", &f.spending_shares)?;
    Ok(())
}

/// Validate per-agent constants.
pub fn validate_agents(a: &AgentsConfig) -> Result<(), ConfigError> {
    let firm = &a.firm;
    non_negative("agents.firm.cash_buffer", firm.cash_buffer)?;
    within("agents.firm.rd_share", firm.rd_share, 0.0, 1.0)?;
    non_negative("agents.firm.rd_productivity", firm.rd_productivity)?;
    within("agents.firm.payout_ratio", firm.payout_ratio, 0.0, 1.0)?;
    positive("agents.firm.min_technology", firm.min_technology)?;

    let r = &a.raw_materials;
    non_negative("agents.raw_materials.cash", r.cash)?;
    non_negative("agents.raw_materials.base_capacity", r.base_capacity)?;
    non_negative("agents.raw_materials.extraction_capacity", r.extraction_capacity)?;
    positive("agents.raw_materials.labor_productivity", r.labor_productivity)?;
    non_negative("agents.raw_materials.initial_labor", r.initial_labor)?;
    non_negative("agents.raw_materials.initial_inventory", r.initial_inventory)?;

    let m = &a.manufacturing;
    non_negative("agents.manufacturing.cash", m.cash)?;
    non_negative("agents.manufacturing.capacity", m.capacity)?;
    non_negative("agents.manufacturing.smoothing", m.smoothing)?;
    non_negative("agents.manufacturing.inventory_target", m.inventory_target)?;
    within("agents.manufacturing.gap_correction", m.gap_correction, 0.0, 1.0)?;
    positive("agents.manufacturing.io_coefficient", m.io_coefficient)?;
    positive("agents.manufacturing.labor_productivity", m.labor_productivity)?;
    non_negative("agents.manufacturing.initial_labor", m.initial_labor)?;
    non_negative("agents.manufacturing.initial_sales", m.initial_sales)?;
    non_negative("agents.manufacturing.initial_raw_inventory", m.initial_raw_inventory)?;
    non_negative("agents.manufacturing.raw_buffer", m.raw_buffer)?;

    let s = &a.services;
    non_negative("agents.services.cash", s.cash)?;
    non_negative("agents.services.capacity", s.capacity)?;
    positive("agents.services.labor_productivity", s.labor_productivity)?;
    non_negative("agents.services.initial_labor", s.initial_labor)?;
    non_negative("agents.services.initial_sales", s.initial_sales)?;
    non_negative("agents.services.demand_headroom", s.demand_headroom)?;

    let c = &a.consumer;
    non_negative("agents.consumer.cash", c.cash)?;
    positive("agents.consumer.population", c.population)?;
    non_negative("agents.consumer.income_rate", c.income_rate)?;
    within("agents.consumer.confidence_smoothing", c.confidence_smoothing, 0.0, 1.0)?;
    non_negative("agents.consumer.confidence_sensitivity", c.confidence_sensitivity)?;
    within("agents.consumer.max_spend_share", c.max_spend_share, 0.0, 1.0)?;
    weights("agents.consumer.spending_shares", &c.spending_shares)?;

    non_negative("agents.financial.cash", a.financial.cash)?;
    non_negative("agents.financial.cash_buffer", a.financial.cash_buffer)?;
    within("agents.financial.payout_ratio", a.financial.payout_ratio, 0.0, 1.0)?;
    non_negative("agents.government.cash", a.government.cash)?;

    let initial_labor = r.initial_labor + m.initial_labor + s.initial_labor;
    if initial_labor > c.population + crate::QTY_EPSILON {
        return Err(ConfigError::OutOfRange {
            field: "agents.*.initial_labor",
            value: initial_labor,
            min: 0.0,
            max: c.population,
        });
    }
    Ok(())
}

/// Validate the full configuration. A game cannot start unless this passes.
pub fn validate_config(cfg: &SimConfig) -> Result<(), ConfigError> {
    within("months_per_turn", f64::from(cfg.months_per_turn), 1.0, 12.0)?;
    if cfg.event_log_capacity == 0 {
        return Err(ConfigError::NonPositive("event_log_capacity"));
    }
    validate_market(&cfg.market)?;
    positive("labor.wage_rate", cfg.labor.wage_rate)?;
    within(
        "labor.employment_adjustment",
        cfg.labor.employment_adjustment,
        0.0,
        1.0,
    )?;
    within("labor.initial_employment", cfg.labor.initial_employment, 0.0, 1.0)?;
    validate_banking(&cfg.banking)?;
    validate_policy(&cfg.policy)?;
    validate_fiscal(&cfg.fiscal)?;
    validate_agents(&cfg.agents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn defaults_validate() {
        validate_config(&SimConfig::default()).unwrap();
    }

    #[test]
    fn yaml_overrides_merge_with_defaults() {
        let yaml = r#"
rng_seed: 7
market:
  elasticity: 0.25
policy:
  initial_mode: democratic
  quorum: 2
banking:
  reserve_ratio: 0.2
"#;
        let cfg = SimConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(cfg.rng_seed, 7);
        assert_eq!(cfg.market.elasticity, 0.25);
        assert_eq!(cfg.market.price_floor, MarketConfig::default().price_floor);
        assert_eq!(cfg.policy.initial_mode, GovernanceMode::Democratic);
        assert_eq!(cfg.policy.quorum, 2);
        assert_eq!(cfg.banking.reserve_ratio, 0.2);
        assert_eq!(cfg.banking.loan_term_turns, 8);
        validate_config(&cfg).unwrap();
    }

    #[test]
    fn malformed_yaml_is_a_config_error() {
        let err = SimConfig::from_yaml_str("market: [1, 2").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_elasticity_outside_unit_interval() {
        let mut cfg = SimConfig::default();
        cfg.market.elasticity = 1.5;
        assert!(matches!(
            validate_config(&cfg),
            Err(ConfigError::OutOfRange { field: "market.elasticity", .. })
        ));
        cfg.market.elasticity = 0.0;
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn rejects_zero_price_floor() {
        let mut cfg = SimConfig::default();
        cfg.market.price_floor = 0.0;
        assert_eq!(
            validate_config(&cfg),
            Err(ConfigError::NonPositive("market.price_floor"))
        );
    }

    #[test]
    fn rejects_missing_initial_price() {
        let mut cfg = SimConfig::default();
        cfg.market.initial_prices.remove(&Good::Services);
        assert_eq!(
            validate_config(&cfg),
            Err(ConfigError::MissingGood {
                field: "market.initial_prices",
                good: Good::Services
            })
        );
    }

    #[test]
    fn rejects_zero_quorum_and_bad_reserve_ratio() {
        let mut cfg = SimConfig::default();
        cfg.policy.quorum = 0;
        assert_eq!(
            validate_config(&cfg),
            Err(ConfigError::NonPositive("policy.quorum"))
        );
        let mut cfg = SimConfig::default();
        cfg.banking.reserve_ratio = f64::NAN;
        assert_eq!(
            validate_config(&cfg),
            Err(ConfigError::NonFinite("banking.reserve_ratio"))
        );
    }

    #[test]
    fn rejects_over_committed_labor() {
        let mut cfg = SimConfig::default();
        cfg.agents.consumer.population = 100.0;
        assert!(matches!(
            validate_config(&cfg),
            Err(ConfigError::OutOfRange { field: "agents.*.initial_labor", .. })
        ));
    }

    #[test]
    fn tier_follows_leverage() {
        let b = BankingConfig::default();
        assert_eq!(b.tier_for_leverage(0.1), CreditTier::Prime);
        assert_eq!(b.tier_for_leverage(1.0), CreditTier::Standard);
        assert_eq!(b.tier_for_leverage(3.0), CreditTier::Subprime);
    }

    proptest! {
        #[test]
        fn any_tax_rate_in_unit_interval_validates(t in 0.0f64..=1.0) {
            let mut cfg = SimConfig::default();
            cfg.fiscal.tax_rate = t;
            prop_assert!(validate_config(&cfg).is_ok());
        }

        #[test]
        fn negative_cash_never_validates(c in -1.0e9f64..-0.001) {
            let mut cfg = SimConfig::default();
            cfg.agents.consumer.cash = c;
            prop_assert_eq!(
                validate_config(&cfg),
                Err(ConfigError::Negative("agents.consumer.cash"))
            );
        }
    }
}
