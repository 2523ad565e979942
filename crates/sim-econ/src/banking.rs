//! Fractional-reserve bank ledger.
//!
//! Every agent's money is split into currency held outside the bank and a
//! deposit at it; money supply is the sum of both. Lending credits the
//! borrower's deposit. Repayment draws on the borrower's own deposit, which is
//! destroyed, and then on its currency, which moves into reserves. Payments
//! between agents move holdings like for like, so they never change reserves.
//! Reserves borrowed at the discount window are a liability of the bank; the
//! ledger keeps `loans + reserves == deposits + discount borrowing + capital`.

use crate::EconError;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sim_core::{to_money, AgentId, CreditTier, MONEY_DP};
use std::collections::BTreeMap;

/// Pricing and schedule attached to a loan at origination.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoanTerms {
    pub tier: CreditTier,
    /// Annual lending rate (FFR + spread + tier premium).
    pub annual_rate: f64,
    pub term_turns: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoanRequest {
    pub borrower: AgentId,
    pub amount: Decimal,
    pub tier: CreditTier,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: u64,
    pub borrower: AgentId,
    pub principal: Decimal,
    pub outstanding: Decimal,
    pub terms: LoanTerms,
    pub issued_turn: u64,
    /// Unpaid principal installments carried from earlier turns.
    pub arrears: Decimal,
    /// Unpaid interest carried from earlier turns.
    pub interest_arrears: Decimal,
}

impl Loan {
    /// Principal due this turn: the linear installment plus arrears.
    pub fn installment(&self) -> Decimal {
        let term = Decimal::from(self.terms.term_turns.max(1));
        let scheduled = (self.principal / term).round_dp(MONEY_DP);
        (scheduled + self.arrears).min(self.outstanding)
    }

    /// Interest accrued over one turn on the outstanding principal.
    pub fn accrued_interest(&self, turns_per_year: f64) -> Result<Decimal, EconError> {
        if !turns_per_year.is_finite() || turns_per_year <= 0.0 {
            return Err(EconError::InvalidQuantity(turns_per_year));
        }
        let rate = to_money(self.terms.annual_rate / turns_per_year).map_err(|_| EconError::NonFinite)?;
        Ok((self.outstanding * rate).round_dp(MONEY_DP))
    }

    /// Interest owed this turn: the accrual plus deferred interest.
    pub fn interest_due(&self, turns_per_year: f64) -> Result<Decimal, EconError> {
        Ok(self.accrued_interest(turns_per_year)? + self.interest_arrears)
    }

    /// Total of deferred principal and interest.
    pub fn overdue(&self) -> Decimal {
        self.arrears + self.interest_arrears
    }

    fn is_settled(&self) -> bool {
        self.outstanding <= Decimal::ZERO && self.interest_arrears <= Decimal::ZERO
    }
}

/// Where a repayment came from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RepaymentSplit {
    /// Destroyed together with the matching deposit.
    pub from_deposit: Decimal,
    /// Withdrawn from circulation into reserves.
    pub from_currency: Decimal,
}

impl RepaymentSplit {
    pub fn total(&self) -> Decimal {
        self.from_deposit + self.from_currency
    }
}

/// One agent's money: notes outside the bank and a deposit at it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub currency: Decimal,
    pub deposit: Decimal,
}

impl Holding {
    pub fn total(&self) -> Decimal {
        self.currency + self.deposit
    }

    /// Take `amount`, deposit first. Returns the (deposit, currency) parts.
    fn draw(&mut self, amount: Decimal) -> (Decimal, Decimal) {
        let deposit = amount.min(self.deposit);
        let currency = amount - deposit;
        self.deposit -= deposit;
        self.currency -= currency;
        (deposit, currency)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BankLedger {
    reserve_ratio: Decimal,
    capital: Decimal,
    reserves: Decimal,
    holdings: BTreeMap<AgentId, Holding>,
    loans: BTreeMap<u64, Loan>,
    /// Reserves owed to the central bank.
    discount_borrowing: Decimal,
    next_id: u64,
    issued: Decimal,
    repaid: Decimal,
}

impl BankLedger {
    /// A bank holding `capital` as reserves. `money` lists each agent's
    /// opening balance, all of it held as currency.
    pub fn new(
        reserve_ratio: f64,
        capital: Decimal,
        money: impl IntoIterator<Item = (AgentId, Decimal)>,
    ) -> Result<Self, EconError> {
        if !reserve_ratio.is_finite() || reserve_ratio <= 0.0 || reserve_ratio > 1.0 {
            return Err(EconError::InvalidQuantity(reserve_ratio));
        }
        if capital < Decimal::ZERO {
            return Err(EconError::InvalidPrice);
        }
        let mut holdings = BTreeMap::new();
        for (agent, amount) in money {
            if amount < Decimal::ZERO {
                return Err(EconError::InvalidPrice);
            }
            holdings.insert(
                agent,
                Holding {
                    currency: amount,
                    deposit: Decimal::ZERO,
                },
            );
        }
        Ok(Self {
            reserve_ratio: to_money(reserve_ratio).map_err(|_| EconError::NonFinite)?,
            capital,
            reserves: capital,
            holdings,
            loans: BTreeMap::new(),
            discount_borrowing: Decimal::ZERO,
            next_id: 1,
            issued: Decimal::ZERO,
            repaid: Decimal::ZERO,
        })
    }

    /// Reset the per-turn issued/repaid counters.
    pub fn begin_turn(&mut self) {
        self.issued = Decimal::ZERO;
        self.repaid = Decimal::ZERO;
    }

    pub fn reserves(&self) -> Decimal {
        self.reserves
    }

    pub fn currency(&self) -> Decimal {
        self.holdings.values().map(|h| h.currency).sum()
    }

    pub fn capital(&self) -> Decimal {
        self.capital
    }

    pub fn deposits(&self) -> Decimal {
        self.holdings.values().map(|h| h.deposit).sum()
    }

    pub fn holding_of(&self, agent: AgentId) -> Holding {
        self.holdings.get(&agent).copied().unwrap_or_default()
    }

    pub fn deposit_of(&self, agent: AgentId) -> Decimal {
        self.holding_of(agent).deposit
    }

    pub fn currency_of(&self, agent: AgentId) -> Decimal {
        self.holding_of(agent).currency
    }

    /// Positive deposit balances by holder.
    pub fn depositors(&self) -> impl Iterator<Item = (AgentId, Decimal)> + '_ {
        self.holdings
            .iter()
            .filter(|(_, h)| h.deposit > Decimal::ZERO)
            .map(|(a, h)| (*a, h.deposit))
    }

    pub fn discount_borrowing(&self) -> Decimal {
        self.discount_borrowing
    }

    pub fn loans_outstanding(&self) -> Decimal {
        self.loans.values().map(|l| l.outstanding).sum()
    }

    pub fn loans(&self) -> impl Iterator<Item = &Loan> {
        self.loans.values()
    }

    pub fn loan(&self, id: u64) -> Option<&Loan> {
        self.loans.get(&id)
    }

    pub fn active_loans(&self) -> usize {
        self.loans.len()
    }

    pub fn loans_of(&self, borrower: AgentId) -> impl Iterator<Item = &Loan> {
        self.loans.values().filter(move |l| l.borrower == borrower)
    }

    pub fn debt_of(&self, borrower: AgentId) -> Decimal {
        self.loans_of(borrower).map(|l| l.outstanding).sum()
    }

    /// Deferred principal and interest across a borrower's loans.
    pub fn arrears_of(&self, borrower: AgentId) -> Decimal {
        self.loans_of(borrower).map(Loan::overdue).sum()
    }

    /// M2 = currency + deposits.
    pub fn money_supply(&self) -> Decimal {
        self.currency() + self.deposits()
    }

    pub fn required_reserves(&self) -> Decimal {
        (self.deposits() * self.reserve_ratio).round_dp_with_strategy(MONEY_DP, RoundingStrategy::AwayFromZero)
    }

    pub fn excess_reserves(&self) -> Decimal {
        self.reserves - self.required_reserves()
    }

    /// Largest new loan that keeps reserves at or above the requirement.
    pub fn lending_capacity(&self) -> Decimal {
        let excess = self.excess_reserves();
        if excess <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        excess
            .checked_div(self.reserve_ratio)
            .unwrap_or(Decimal::ZERO)
            .round_dp_with_strategy(MONEY_DP, RoundingStrategy::ToZero)
    }

    pub fn issued_this_turn(&self) -> Decimal {
        self.issued
    }

    pub fn repaid_this_turn(&self) -> Decimal {
        self.repaid
    }

    /// Approve up to `capacity × weight` of the request and credit the
    /// borrower's deposit with the approved amount.
    ///
    /// Returns `None` when nothing can be lent, or when the borrower is
    /// behind on an existing loan.
    pub fn originate(
        &mut self,
        request: &LoanRequest,
        terms: LoanTerms,
        weight: f64,
        turn: u64,
    ) -> Result<Option<Loan>, EconError> {
        if request.amount < Decimal::ZERO {
            return Err(EconError::InvalidPrice);
        }
        if self.arrears_of(request.borrower) > Decimal::ZERO {
            return Ok(None);
        }
        let weight = to_money(weight.clamp(0.0, 1.0)).map_err(|_| EconError::NonFinite)?;
        let ceiling = self.lending_capacity() * weight;
        let approved = request
            .amount
            .min(ceiling)
            .round_dp_with_strategy(MONEY_DP, RoundingStrategy::ToZero);
        if approved <= Decimal::ZERO {
            return Ok(None);
        }
        let loan = Loan {
            id: self.next_id,
            borrower: request.borrower,
            principal: approved,
            outstanding: approved,
            terms,
            issued_turn: turn,
            arrears: Decimal::ZERO,
            interest_arrears: Decimal::ZERO,
        };
        self.next_id += 1;
        self.holdings.entry(request.borrower).or_default().deposit += approved;
        self.issued += approved;
        self.loans.insert(loan.id, loan.clone());
        tracing::debug!(loan = loan.id, borrower = %loan.borrower, %approved, "loan issued");
        Ok(Some(loan))
    }

    /// Pay this turn's principal on a loan. Any shortfall against the
    /// installment is carried as arrears.
    pub fn repay(&mut self, id: u64, amount: Decimal) -> Result<RepaymentSplit, EconError> {
        let due = self.loans.get(&id).ok_or(EconError::UnknownLoan(id))?.installment();
        let split = self.pay_down(id, amount)?;
        if let Some(loan) = self.loans.get_mut(&id) {
            loan.arrears = (due - amount).max(Decimal::ZERO).min(loan.outstanding);
        }
        self.close_if_settled(id);
        Ok(split)
    }

    /// Pay principal ahead of schedule; arrears are not reset.
    pub fn prepay(&mut self, id: u64, amount: Decimal) -> Result<RepaymentSplit, EconError> {
        let split = self.pay_down(id, amount)?;
        if let Some(loan) = self.loans.get_mut(&id) {
            loan.arrears = (loan.arrears - amount).max(Decimal::ZERO).min(loan.outstanding);
        }
        self.close_if_settled(id);
        Ok(split)
    }

    /// Book an interest payment of `paid` against `due`; the rest is deferred.
    ///
    /// Interest itself moves between agents and is not drawn here.
    pub fn record_interest(&mut self, id: u64, due: Decimal, paid: Decimal) -> Result<Decimal, EconError> {
        if paid < Decimal::ZERO || due < Decimal::ZERO {
            return Err(EconError::InvalidPrice);
        }
        let loan = self.loans.get_mut(&id).ok_or(EconError::UnknownLoan(id))?;
        let deferred = (due - paid).max(Decimal::ZERO);
        loan.interest_arrears = deferred;
        self.close_if_settled(id);
        Ok(deferred)
    }

    /// Retire principal from the borrower's own deposit, then its currency.
    fn pay_down(&mut self, id: u64, amount: Decimal) -> Result<RepaymentSplit, EconError> {
        let loan = self.loans.get(&id).ok_or(EconError::UnknownLoan(id))?;
        if amount < Decimal::ZERO {
            return Err(EconError::InvalidPrice);
        }
        if amount > loan.outstanding {
            return Err(EconError::ExcessRepayment {
                loan: id,
                requested: amount,
                outstanding: loan.outstanding,
            });
        }
        let borrower = loan.borrower;
        let holding = self.holdings.entry(borrower).or_default();
        if amount > holding.total() {
            return Err(EconError::InsufficientFunds {
                agent: borrower,
                requested: amount,
                available: holding.total(),
            });
        }
        let (from_deposit, from_currency) = holding.draw(amount);
        self.reserves += from_currency;
        if let Some(loan) = self.loans.get_mut(&id) {
            loan.outstanding -= amount;
        }
        self.repaid += amount;
        Ok(RepaymentSplit {
            from_deposit,
            from_currency,
        })
    }

    fn close_if_settled(&mut self, id: u64) {
        if self.loans.get(&id).is_some_and(Loan::is_settled) {
            self.loans.remove(&id);
        }
    }

    /// Move `amount` from one holder to another.
    pub fn transfer(&mut self, from: AgentId, to: AgentId, amount: Decimal) -> Result<(), EconError> {
        if from == to || amount == Decimal::ZERO {
            return Ok(());
        }
        self.settle_net(&BTreeMap::from([(from, -amount), (to, amount)]))
    }

    /// Apply net money movements that sum to zero.
    ///
    /// Payers are drawn deposit first; receivers are credited deposits first
    /// out of what was drawn, then currency.
    pub fn settle_net(&mut self, changes: &BTreeMap<AgentId, Decimal>) -> Result<(), EconError> {
        let residual: Decimal = changes.values().copied().sum();
        if residual != Decimal::ZERO {
            return Err(EconError::UnbalancedPayments(residual));
        }
        for (agent, delta) in changes.iter().filter(|(_, d)| **d < Decimal::ZERO) {
            let available = self.holding_of(*agent).total();
            if -*delta > available {
                return Err(EconError::InsufficientFunds {
                    agent: *agent,
                    requested: -*delta,
                    available,
                });
            }
        }
        let mut deposit_pool = Decimal::ZERO;
        for (agent, delta) in changes.iter().filter(|(_, d)| **d < Decimal::ZERO) {
            let (deposit, _) = self.holdings.entry(*agent).or_default().draw(-*delta);
            deposit_pool += deposit;
        }
        for (agent, delta) in changes.iter().filter(|(_, d)| **d > Decimal::ZERO) {
            let deposit = (*delta).min(deposit_pool);
            deposit_pool -= deposit;
            let holding = self.holdings.entry(*agent).or_default();
            holding.deposit += deposit;
            holding.currency += *delta - deposit;
        }
        Ok(())
    }

    /// Extra reserves the bank needs before it can lend `amount` at `weight`.
    pub fn reserves_needed(&self, amount: Decimal, weight: f64) -> Result<Decimal, EconError> {
        let weight = to_money(weight.clamp(0.0, 1.0)).map_err(|_| EconError::NonFinite)?;
        if amount <= Decimal::ZERO || weight <= Decimal::ZERO {
            return Ok(Decimal::ZERO);
        }
        let backing = (amount * self.reserve_ratio)
            .checked_div(weight)
            .unwrap_or(Decimal::ZERO);
        let target = self.required_reserves() + backing;
        Ok((target - self.reserves)
            .max(Decimal::ZERO)
            .round_dp_with_strategy(MONEY_DP, RoundingStrategy::AwayFromZero))
    }

    /// Take reserves from the discount window.
    pub fn borrow_reserves(&mut self, amount: Decimal) -> Result<(), EconError> {
        if amount < Decimal::ZERO {
            return Err(EconError::InvalidPrice);
        }
        self.reserves += amount;
        self.discount_borrowing += amount;
        Ok(())
    }

    /// Hand excess reserves back to the discount window. Returns the amount repaid.
    pub fn repay_reserves(&mut self) -> Decimal {
        let pay = self
            .discount_borrowing
            .min(self.excess_reserves().max(Decimal::ZERO));
        self.reserves -= pay;
        self.discount_borrowing -= pay;
        pay
    }

    /// Reserve requirement, non-negative holdings and balance-sheet identity.
    pub fn check_invariants(&self) -> Result<(), EconError> {
        let required = self.required_reserves();
        if self.reserves < required {
            return Err(EconError::ReserveShortfall {
                reserves: self.reserves,
                required,
            });
        }
        if let Some((agent, h)) = self
            .holdings
            .iter()
            .find(|(_, h)| h.currency < Decimal::ZERO || h.deposit < Decimal::ZERO)
        {
            return Err(EconError::InsufficientFunds {
                agent: *agent,
                requested: Decimal::ZERO,
                available: h.total(),
            });
        }
        let assets = self.loans_outstanding() + self.reserves;
        let claims = self.deposits() + self.discount_borrowing + self.capital;
        if assets != claims {
            return Err(EconError::Unbalanced { assets, claims });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SAVER: AgentId = AgentId(9);

    fn terms() -> LoanTerms {
        LoanTerms {
            tier: CreditTier::Prime,
            annual_rate: 0.05,
            term_turns: 4,
        }
    }

    fn request(agent: u32, amount: i64) -> LoanRequest {
        LoanRequest {
            borrower: AgentId(agent),
            amount: Decimal::from(amount),
            tier: CreditTier::Prime,
        }
    }

    fn bank() -> BankLedger {
        BankLedger::new(0.1, Decimal::from(1_000), [(SAVER, Decimal::from(50_000))]).unwrap()
    }

    #[test]
    fn capacity_is_excess_over_ratio() {
        let b = bank();
        assert_eq!(b.lending_capacity(), Decimal::from(10_000));
        assert_eq!(b.money_supply(), Decimal::from(50_000));
        assert_eq!(b.currency_of(SAVER), Decimal::from(50_000));
    }

    #[test]
    fn lending_creates_money() {
        let mut b = bank();
        let loan = b.originate(&request(1, 4_000), terms(), 1.0, 1).unwrap().unwrap();
        assert_eq!(loan.principal, Decimal::from(4_000));
        assert_eq!(b.deposit_of(AgentId(1)), Decimal::from(4_000));
        assert_eq!(b.money_supply(), Decimal::from(54_000));
        assert_eq!(b.lending_capacity(), Decimal::from(6_000));
        b.check_invariants().unwrap();
    }

    #[test]
    fn approval_is_capped_by_capacity_and_tier_weight() {
        let mut b = bank();
        let loan = b.originate(&request(1, 50_000), terms(), 0.5, 1).unwrap().unwrap();
        assert_eq!(loan.principal, Decimal::from(5_000));
        let loan = b.originate(&request(2, 50_000), terms(), 1.0, 1).unwrap().unwrap();
        assert_eq!(loan.principal, Decimal::from(5_000));
        assert_eq!(b.originate(&request(3, 1), terms(), 1.0, 1).unwrap(), None);
        b.check_invariants().unwrap();
    }

    #[test]
    fn repayment_from_deposit_destroys_money() {
        let mut b = bank();
        let loan = b.originate(&request(1, 4_000), terms(), 1.0, 1).unwrap().unwrap();
        let split = b.repay(loan.id, Decimal::from(1_000)).unwrap();
        assert_eq!(split.from_deposit, Decimal::from(1_000));
        assert_eq!(split.from_currency, Decimal::ZERO);
        assert_eq!(b.money_supply(), Decimal::from(53_000));
        b.check_invariants().unwrap();
    }

    #[test]
    fn counters_track_the_turn() {
        let mut b = bank();
        let loan = b.originate(&request(1, 1_000), terms(), 1.0, 1).unwrap().unwrap();
        assert_eq!(b.issued_this_turn(), Decimal::from(1_000));
        b.begin_turn();
        assert_eq!(b.issued_this_turn(), Decimal::ZERO);
        b.repay(loan.id, Decimal::from(1_000)).unwrap();
        assert_eq!(b.repaid_this_turn(), Decimal::from(1_000));
        assert_eq!(b.active_loans(), 0);
        assert_eq!(b.money_supply(), Decimal::from(50_000));
    }

    #[test]
    fn spent_deposit_follows_the_payee() {
        let mut b = bank();
        let loan = b.originate(&request(1, 1_000), terms(), 1.0, 1).unwrap().unwrap();
        b.transfer(AgentId(1), AgentId(2), Decimal::from(1_000)).unwrap();
        assert_eq!(b.deposit_of(AgentId(1)), Decimal::ZERO);
        assert_eq!(b.deposit_of(AgentId(2)), Decimal::from(1_000));
        // the borrower has nothing left and cannot touch anyone else's money
        assert!(matches!(
            b.repay(loan.id, Decimal::from(400)),
            Err(EconError::InsufficientFunds { .. })
        ));
        assert_eq!(b.deposit_of(AgentId(2)), Decimal::from(1_000));
    }

    #[test]
    fn currency_repayment_moves_into_reserves() {
        let mut b = bank();
        let loan = b.originate(&request(1, 1_000), terms(), 1.0, 1).unwrap().unwrap();
        b.transfer(AgentId(1), AgentId(2), Decimal::from(1_000)).unwrap();
        b.transfer(SAVER, AgentId(1), Decimal::from(400)).unwrap();
        assert_eq!(b.currency_of(AgentId(1)), Decimal::from(400));
        let split = b.repay(loan.id, Decimal::from(400)).unwrap();
        assert_eq!(split.from_currency, Decimal::from(400));
        assert_eq!(b.currency(), Decimal::from(49_600));
        assert_eq!(b.reserves(), Decimal::from(1_400));
        b.check_invariants().unwrap();
    }

    #[test]
    fn net_settlement_keeps_deposits_and_currency_totals() {
        let mut b = bank();
        b.originate(&request(1, 2_000), terms(), 1.0, 1).unwrap();
        let (deposits, currency) = (b.deposits(), b.currency());
        let changes = BTreeMap::from([
            (AgentId(1), Decimal::from(-1_500)),
            (SAVER, Decimal::from(-500)),
            (AgentId(2), Decimal::from(1_800)),
            (AgentId(3), Decimal::from(200)),
        ]);
        b.settle_net(&changes).unwrap();
        assert_eq!(b.deposits(), deposits);
        assert_eq!(b.currency(), currency);
        assert_eq!(b.deposit_of(AgentId(2)), Decimal::from(1_500));
        assert_eq!(b.currency_of(AgentId(2)), Decimal::from(300));
        assert_eq!(b.holding_of(AgentId(3)).total(), Decimal::from(200));
        b.check_invariants().unwrap();

        let lopsided = BTreeMap::from([(AgentId(2), Decimal::from(-10))]);
        assert_eq!(
            b.settle_net(&lopsided),
            Err(EconError::UnbalancedPayments(Decimal::from(-10)))
        );
    }

    #[test]
    fn short_payment_becomes_arrears() {
        let mut b = bank();
        let loan = b.originate(&request(1, 4_000), terms(), 1.0, 1).unwrap().unwrap();
        assert_eq!(loan.installment(), Decimal::from(1_000));
        b.repay(loan.id, Decimal::from(300)).unwrap();
        let loan = b.loan(loan.id).unwrap();
        assert_eq!(loan.arrears, Decimal::from(700));
        assert_eq!(loan.installment(), Decimal::from(1_700));
    }

    #[test]
    fn deferred_interest_is_due_next_turn() {
        let mut b = bank();
        let loan = b.originate(&request(1, 4_000), terms(), 1.0, 1).unwrap().unwrap();
        let due = loan.interest_due(4.0).unwrap();
        assert_eq!(due, Decimal::from(50));
        assert_eq!(b.record_interest(loan.id, due, Decimal::from(20)).unwrap(), Decimal::from(30));
        let loan = b.loan(loan.id).unwrap().clone();
        assert_eq!(loan.interest_due(4.0).unwrap(), Decimal::from(80));
        assert_eq!(b.arrears_of(AgentId(1)), Decimal::from(30));
        b.record_interest(loan.id, Decimal::from(80), Decimal::from(80)).unwrap();
        assert_eq!(b.arrears_of(AgentId(1)), Decimal::ZERO);
    }

    #[test]
    fn paid_off_loan_stays_open_until_interest_is_settled() {
        let mut b = bank();
        let loan = b.originate(&request(1, 100), terms(), 1.0, 1).unwrap().unwrap();
        b.record_interest(loan.id, Decimal::from(5), Decimal::ZERO).unwrap();
        b.prepay(loan.id, Decimal::from(100)).unwrap();
        assert_eq!(b.active_loans(), 1);
        assert_eq!(b.debt_of(AgentId(1)), Decimal::ZERO);
        b.record_interest(loan.id, Decimal::from(5), Decimal::from(5)).unwrap();
        assert_eq!(b.active_loans(), 0);
    }

    #[test]
    fn borrowers_in_arrears_get_no_new_credit() {
        let mut b = bank();
        let loan = b.originate(&request(1, 4_000), terms(), 1.0, 1).unwrap().unwrap();
        b.repay(loan.id, Decimal::ZERO).unwrap();
        assert_eq!(b.originate(&request(1, 100), terms(), 1.0, 2).unwrap(), None);
        assert!(b.originate(&request(2, 100), terms(), 1.0, 2).unwrap().is_some());
    }

    #[test]
    fn prepayment_does_not_create_arrears() {
        let mut b = bank();
        let loan = b.originate(&request(1, 4_000), terms(), 1.0, 1).unwrap().unwrap();
        b.repay(loan.id, Decimal::from(1_000)).unwrap();
        b.prepay(loan.id, Decimal::from(200)).unwrap();
        let loan = b.loan(loan.id).unwrap();
        assert_eq!(loan.arrears, Decimal::ZERO);
        assert_eq!(loan.outstanding, Decimal::from(2_800));
    }

    #[test]
    fn discount_window_extends_capacity() {
        let mut b = bank();
        let need = b.reserves_needed(Decimal::from(30_000), 1.0).unwrap();
        assert_eq!(need, Decimal::from(2_000));
        b.borrow_reserves(need).unwrap();
        assert_eq!(b.lending_capacity(), Decimal::from(30_000));
        let m2 = b.money_supply();
        b.originate(&request(1, 30_000), terms(), 1.0, 1).unwrap().unwrap();
        assert_eq!(b.money_supply() - m2, Decimal::from(30_000));
        b.check_invariants().unwrap();
        // nothing to give back while every reserve backs a deposit
        assert_eq!(b.repay_reserves(), Decimal::ZERO);
        assert_eq!(b.discount_borrowing(), Decimal::from(2_000));
    }

    #[test]
    fn excess_reserves_retire_discount_borrowing() {
        let mut b = bank();
        b.borrow_reserves(Decimal::from(500)).unwrap();
        assert_eq!(b.repay_reserves(), Decimal::from(500));
        assert_eq!(b.discount_borrowing(), Decimal::ZERO);
        assert_eq!(b.reserves(), Decimal::from(1_000));
        b.check_invariants().unwrap();
    }

    #[test]
    fn rejects_overpayment_and_unknown_loans() {
        let mut b = bank();
        let loan = b.originate(&request(1, 100), terms(), 1.0, 1).unwrap().unwrap();
        assert!(matches!(
            b.repay(loan.id, Decimal::from(101)),
            Err(EconError::ExcessRepayment { .. })
        ));
        assert_eq!(b.repay(99, Decimal::ONE), Err(EconError::UnknownLoan(99)));
    }

    #[test]
    fn interest_is_prorated_by_fractional_year() {
        let mut b = bank();
        let loan = b.originate(&request(1, 4_800), terms(), 1.0, 1).unwrap().unwrap();
        assert_eq!(loan.interest_due(4.0).unwrap(), Decimal::from(60));
        // two-and-a-half turns per year must not round to two or three
        assert_eq!(loan.interest_due(2.5).unwrap(), Decimal::from(96));
    }

    proptest! {
        #[test]
        fn invariants_hold_over_any_sequence(
            ops in proptest::collection::vec((0u32..4, 0i64..20_000, 0u8..3, 1u8..=4), 1..40)
        ) {
            let mut b = bank();
            let m0 = b.money_supply();
            let mut issued = Decimal::ZERO;
            let mut repaid = Decimal::ZERO;
            for (agent, amount, op, w) in ops {
                match op {
                    0 => {
                        let weight = f64::from(w) / 4.0;
                        if let Some(loan) = b.originate(&request(agent, amount), terms(), weight, 1).unwrap() {
                            issued += loan.principal;
                        }
                    }
                    1 => {
                        let first = b.loans_of(AgentId(agent)).next().cloned();
                        let Some(loan) = first else { continue };
                        let held = b.holding_of(loan.borrower).total();
                        let pay = loan.outstanding.min(Decimal::from(amount)).min(held);
                        b.repay(loan.id, pay).unwrap();
                        repaid += pay;
                    }
                    _ => {
                        let to = AgentId((agent + 1) % 4);
                        let pay = Decimal::from(amount).min(b.holding_of(AgentId(agent)).total());
                        b.transfer(AgentId(agent), to, pay).unwrap();
                    }
                }
                prop_assert!(b.reserves() >= b.required_reserves());
                prop_assert!(b.check_invariants().is_ok());
            }
            prop_assert_eq!(b.money_supply() - m0, issued - repaid);
        }
    }
}
