use super::ids::{AccountId, LoanId, UserId};
use super::money::{Amount, Balance, CURRENCY_SCALE};
use crate::error::{BankError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, MathematicalOps, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_REJECTION_REASON: &str = "Application rejected by admin";

/// Lifecycle of a loan.
///
/// `Pending` moves to `Disbursed` or `Rejected`; `Disbursed` moves to
/// `Closed`. `Rejected` and `Closed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Pending,
    Disbursed,
    Rejected,
    Closed,
}

impl LoanStatus {
    pub fn can_become(self, next: LoanStatus) -> bool {
        matches!(
            (self, next),
            (LoanStatus::Pending, LoanStatus::Disbursed)
                | (LoanStatus::Pending, LoanStatus::Rejected)
                | (LoanStatus::Disbursed, LoanStatus::Closed)
        )
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoanStatus::Pending => "pending",
            LoanStatus::Disbursed => "disbursed",
            LoanStatus::Rejected => "rejected",
            LoanStatus::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Pricing of a loan: annual interest rate in percent and term in months.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoanTerms {
    pub annual_rate_percent: Decimal,
    pub term_months: u32,
}

impl LoanTerms {
    /// Level monthly payment from the annuity formula
    /// `P·r·(1+r)^n / ((1+r)^n − 1)`, or `P/n` when the rate is zero.
    pub fn monthly_payment(&self, principal: Amount) -> Result<Balance> {
        if self.term_months == 0 {
            return Err(BankError::ConfigError(
                "loan term must be at least one month".to_string(),
            ));
        }
        let principal = principal.value();
        let n = Decimal::from(self.term_months);
        let r = self.annual_rate_percent / Decimal::ONE_HUNDRED / Decimal::from(12);

        let overflow =
            || BankError::ConfigError("loan terms overflow the payment formula".to_string());

        let payment = if r.is_zero() {
            principal / n
        } else {
            let growth = (Decimal::ONE + r)
                .checked_powi(i64::from(self.term_months))
                .ok_or_else(overflow)?;
            r.checked_mul(growth)
                .and_then(|f| f.checked_div(growth - Decimal::ONE))
                .and_then(|factor| principal.checked_mul(factor))
                .ok_or_else(overflow)?
        };

        Balance::new(
            payment.round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::MidpointAwayFromZero),
        )
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Loan {
    pub id: LoanId,
    pub borrower: UserId,
    pub account: AccountId,
    pub amount: Amount,
    pub monthly_income: Decimal,
    pub reason: String,
    pub status: LoanStatus,
    pub terms: LoanTerms,
    pub monthly_payment: Balance,
    pub total_paid: Balance,
    pub remaining: Balance,
    pub approved_by: Option<UserId>,
    pub approved_at: Option<DateTime<Utc>>,
    pub disbursed_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input of a loan application, already validated against the lending policy.
pub struct LoanApplication {
    pub borrower: UserId,
    pub account: AccountId,
    pub amount: Amount,
    pub monthly_income: Decimal,
    pub reason: String,
    pub terms: LoanTerms,
}

impl Loan {
    pub fn new(application: LoanApplication, now: DateTime<Utc>) -> Result<Self> {
        let monthly_payment = application.terms.monthly_payment(application.amount)?;
        Ok(Self {
            id: LoanId::new(),
            borrower: application.borrower,
            account: application.account,
            amount: application.amount,
            monthly_income: application.monthly_income,
            reason: application.reason,
            status: LoanStatus::Pending,
            terms: application.terms,
            monthly_payment,
            total_paid: Balance::ZERO,
            remaining: application.amount.into(),
            approved_by: None,
            approved_at: None,
            disbursed_at: None,
            closed_at: None,
            rejection_reason: None,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    fn ensure(&self, next: LoanStatus, action: &'static str) -> Result<()> {
        if self.status.can_become(next) {
            Ok(())
        } else {
            Err(BankError::InvalidTransition {
                from: self.status,
                action,
            })
        }
    }

    /// Marks the loan approved and disbursed. The caller credits the borrower.
    pub fn disburse(&mut self, approver: UserId, now: DateTime<Utc>) -> Result<()> {
        self.ensure(LoanStatus::Disbursed, "approve")?;
        self.status = LoanStatus::Disbursed;
        self.approved_by = Some(approver);
        self.approved_at = Some(now);
        self.disbursed_at = Some(now);
        self.remaining = self.amount.into();
        self.updated_at = now;
        Ok(())
    }

    pub fn reject(&mut self, reason: Option<&str>, now: DateTime<Utc>) -> Result<()> {
        self.ensure(LoanStatus::Rejected, "reject")?;
        let reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_REJECTION_REASON);
        self.status = LoanStatus::Rejected;
        self.rejection_reason = Some(reason.to_string());
        self.approved_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Applies a repayment, closing the loan once nothing remains.
    ///
    /// A payment larger than what remains settles the loan and is capped at
    /// `remaining`. Returns the amount actually applied, which is what the
    /// caller debits.
    pub fn repay(&mut self, amount: Amount, now: DateTime<Utc>) -> Result<Amount> {
        if self.status != LoanStatus::Disbursed {
            return Err(BankError::InvalidTransition {
                from: self.status,
                action: "pay",
            });
        }
        let applied = if self.remaining.covers(amount) {
            amount
        } else {
            Amount::new(self.remaining.value())?
        };

        self.total_paid += applied;
        self.remaining = Balance::new(self.amount.value() - self.total_paid.value())?;
        if self.remaining.is_zero() {
            self.status = LoanStatus::Closed;
            self.closed_at = Some(now);
        }
        self.updated_at = now;
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn terms(rate: Decimal, months: u32) -> LoanTerms {
        LoanTerms {
            annual_rate_percent: rate,
            term_months: months,
        }
    }

    fn pending_loan(amount: Decimal) -> Loan {
        Loan::new(
            LoanApplication {
                borrower: UserId::new(),
                account: AccountId::new(),
                amount: Amount::new(amount).unwrap(),
                monthly_income: dec!(3000),
                reason: "car repair".to_string(),
                terms: terms(dec!(10), 12),
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_monthly_payment_annuity() {
        let principal = Amount::new(dec!(2000)).unwrap();
        let payment = terms(dec!(10), 12).monthly_payment(principal).unwrap();
        assert_eq!(payment.value(), dec!(175.83));

        let principal = Amount::new(dec!(100000)).unwrap();
        let payment = terms(dec!(12), 360).monthly_payment(principal).unwrap();
        assert_eq!(payment.value(), dec!(1028.61));
    }

    #[test]
    fn test_monthly_payment_zero_rate() {
        let principal = Amount::new(dec!(1000)).unwrap();
        let payment = terms(dec!(0), 12).monthly_payment(principal).unwrap();
        assert_eq!(payment.value(), dec!(83.33));
    }

    #[test]
    fn test_zero_term_is_rejected() {
        let principal = Amount::new(dec!(1000)).unwrap();
        assert!(matches!(
            terms(dec!(5), 0).monthly_payment(principal),
            Err(BankError::ConfigError(_))
        ));
    }

    #[test]
    fn test_long_expensive_terms_do_not_overflow() {
        let principal = Amount::new(dec!(1000000)).unwrap();
        let payment = terms(dec!(100), 700).monthly_payment(principal).unwrap();
        assert_eq!(payment.value(), dec!(83333.33));
    }

    #[test]
    fn test_unrepresentable_payment_is_config_error() {
        let principal = Amount::new(dec!(1000000)).unwrap();
        assert!(matches!(
            terms(dec!(2400), 60).monthly_payment(principal),
            Err(BankError::ConfigError(_))
        ));
        assert!(matches!(
            terms(dec!(2400), 400).monthly_payment(principal),
            Err(BankError::ConfigError(_))
        ));
    }

    #[test]
    fn test_transition_table() {
        use LoanStatus::*;
        assert!(Pending.can_become(Disbursed));
        assert!(Pending.can_become(Rejected));
        assert!(Disbursed.can_become(Closed));
        assert!(!Disbursed.can_become(Pending));
        assert!(!Rejected.can_become(Disbursed));
        assert!(!Closed.can_become(Disbursed));
        assert!(!Rejected.can_become(Closed));
    }

    #[test]
    fn test_disburse_twice_fails() {
        let mut loan = pending_loan(dec!(2000));
        let approver = UserId::new();
        loan.disburse(approver, Utc::now()).unwrap();
        assert_eq!(loan.status, LoanStatus::Disbursed);
        assert_eq!(loan.approved_by, Some(approver));

        let before = loan.clone();
        let err = loan.disburse(approver, Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            BankError::InvalidTransition {
                from: LoanStatus::Disbursed,
                action: "approve"
            }
        ));
        assert_eq!(loan, before);
    }

    #[test]
    fn test_reject_uses_default_reason() {
        let mut loan = pending_loan(dec!(2000));
        loan.reject(Some("   "), Utc::now()).unwrap();
        assert_eq!(loan.status, LoanStatus::Rejected);
        assert_eq!(
            loan.rejection_reason.as_deref(),
            Some(DEFAULT_REJECTION_REASON)
        );
        assert!(loan.disburse(UserId::new(), Utc::now()).is_err());
    }

    #[test]
    fn test_repay_until_closed() {
        let mut loan = pending_loan(dec!(2000));
        loan.disburse(UserId::new(), Utc::now()).unwrap();

        loan.repay(Amount::new(dec!(500)).unwrap(), Utc::now()).unwrap();
        assert_eq!(loan.total_paid.value(), dec!(500));
        assert_eq!(loan.remaining.value(), dec!(1500));
        assert_eq!(loan.status, LoanStatus::Disbursed);

        loan.repay(Amount::new(dec!(1500)).unwrap(), Utc::now()).unwrap();
        assert!(loan.remaining.is_zero());
        assert_eq!(loan.status, LoanStatus::Closed);
        assert!(loan.closed_at.is_some());

        assert!(matches!(
            loan.repay(Amount::new(dec!(1)).unwrap(), Utc::now()),
            Err(BankError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_overpayment_settles_the_loan() {
        let mut loan = pending_loan(dec!(1000));
        loan.disburse(UserId::new(), Utc::now()).unwrap();
        loan.repay(Amount::new(dec!(400)).unwrap(), Utc::now()).unwrap();

        let applied = loan.repay(Amount::new(dec!(1000.01)).unwrap(), Utc::now()).unwrap();
        assert_eq!(applied.value(), dec!(600.00));
        assert_eq!(loan.total_paid.value(), dec!(1000.00));
        assert!(loan.remaining.is_zero());
        assert_eq!(loan.status, LoanStatus::Closed);
    }

    #[test]
    fn test_pending_loan_cannot_be_repaid() {
        let mut loan = pending_loan(dec!(1000));
        assert!(matches!(
            loan.repay(Amount::new(dec!(10)).unwrap(), Utc::now()),
            Err(BankError::InvalidTransition {
                from: LoanStatus::Pending,
                ..
            })
        ));
    }
}
