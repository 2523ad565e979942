#![deny(warnings)]

//! Economic models for the turn engine.
//!
//! This crate provides validated, side-effect free utilities for:
//! - Goods-market clearing by excess-demand price adjustment
//! - The fixed-weight CPI basket and inflation
//! - Employment smoothing and labor allocation
//! - Taylor Rule, output gap and policy-rate step limiting
//! - Seeded demand noise
//! - The fractional-reserve bank ledger (loans, per-holder money, reserves,
//!   discount-window borrowing, M2)

pub mod banking;
pub mod labor;
pub mod market;
pub mod policy;
pub mod prices;

pub use banking::{BankLedger, Holding, Loan, LoanRequest, LoanTerms, RepaymentSplit};
pub use labor::{allocate_labor, implied_employment, smooth_employment};
pub use market::{clear_markets, next_price, noise_factor, Fill, GoodClearing, MarketOutcome, Order, Side};
pub use policy::{limit_step, output_gap, potential_gdp, quantize_rate, taylor_rule, StepLimited, TaylorInputs};
pub use prices::{cpi, inflation};

use rust_decimal::Decimal;
use sim_core::{AgentId, SimError};
use thiserror::Error;

/// Errors produced by economic helpers and the bank ledger.
#[derive(Debug, Error, PartialEq)]
pub enum EconError {
    /// Price elasticity outside (0, 1].
    #[error("invalid elasticity: {0}")]
    InvalidElasticity(f64),
    /// Prices must be finite and non-negative; reference prices must be > 0.
    #[error("invalid price or cost value")]
    InvalidPrice,
    /// Quantities must be finite and non-negative.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(f64),
    /// Numeric conversion produced a non-finite value.
    #[error("non-finite numeric conversion")]
    NonFinite,
    /// Loan id not present in the ledger.
    #[error("unknown loan {0}")]
    UnknownLoan(u64),
    /// Repayment larger than the outstanding principal.
    #[error("repayment {requested} exceeds outstanding {outstanding} on loan {loan}")]
    ExcessRepayment {
        loan: u64,
        requested: Decimal,
        outstanding: Decimal,
    },
    /// Reserves fell below the requirement.
    #[error("reserves {reserves} below requirement {required}")]
    ReserveShortfall { reserves: Decimal, required: Decimal },
    /// Loans + reserves no longer equal deposits + discount borrowing + capital.
    #[error("bank balance sheet out of balance: assets {assets}, liabilities and capital {claims}")]
    Unbalanced { assets: Decimal, claims: Decimal },
    /// A payment larger than the payer's money holdings.
    #[error("{agent} holds {available} but must pay {requested}")]
    InsufficientFunds {
        agent: AgentId,
        requested: Decimal,
        available: Decimal,
    },
    /// Net cash movements of a settlement do not sum to zero.
    #[error("payments do not net to zero: residual {0}")]
    UnbalancedPayments(Decimal),
}

impl From<EconError> for SimError {
    fn from(e: EconError) -> Self {
        SimError::Economics(e.to_string())
    }
}
