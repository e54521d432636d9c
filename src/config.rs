use crate::domain::loan::LoanTerms;
use crate::domain::money::{Amount, Balance};
use crate::error::{BankError, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::path::Path;

/// Lending rules applied to new loan applications.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoanPolicy {
    /// Annual interest rate in percent used for the monthly payment.
    pub annual_rate_percent: Decimal,
    pub term_months: u32,
    pub min_amount: Decimal,
    pub max_amount: Decimal,
    pub min_monthly_income: Decimal,
}

impl Default for LoanPolicy {
    fn default() -> Self {
        Self {
            annual_rate_percent: dec!(10),
            term_months: 12,
            min_amount: dec!(1000),
            max_amount: dec!(1000000),
            min_monthly_income: dec!(1000),
        }
    }
}

impl LoanPolicy {
    pub fn terms(&self) -> LoanTerms {
        LoanTerms {
            annual_rate_percent: self.annual_rate_percent,
            term_months: self.term_months,
        }
    }

    /// Checks an application's principal and income against the policy bounds.
    pub fn check(&self, amount: Decimal, monthly_income: Decimal) -> Result<Amount> {
        if amount < self.min_amount || amount > self.max_amount {
            return Err(BankError::InvalidAmount(format!(
                "Loan amount must be between {} and {}",
                self.min_amount, self.max_amount
            )));
        }
        if monthly_income < self.min_monthly_income {
            return Err(BankError::InvalidAmount(format!(
                "Monthly income must be at least {}",
                self.min_monthly_income
            )));
        }
        Amount::new(amount)
    }
}

/// Runtime settings of the bank.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BankConfig {
    /// Balance every newly opened account starts with.
    pub opening_balance: Decimal,
    /// How many times an operation is re-run after losing an optimistic update race.
    pub conflict_retries: u32,
    pub loan: LoanPolicy,
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            opening_balance: dec!(5000),
            conflict_retries: 3,
            loan: LoanPolicy::default(),
        }
    }
}

impl BankConfig {
    /// Loads a JSON configuration file. Missing fields take their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| BankError::ConfigError(format!("invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        Balance::new(self.opening_balance)
            .map_err(|e| BankError::ConfigError(format!("opening_balance: {}", e)))?;
        let loan = &self.loan;
        if loan.annual_rate_percent < Decimal::ZERO {
            return Err(BankError::ConfigError(
                "loan.annual_rate_percent cannot be negative".to_string(),
            ));
        }
        if loan.term_months == 0 {
            return Err(BankError::ConfigError(
                "loan.term_months must be at least 1".to_string(),
            ));
        }
        if loan.min_amount <= Decimal::ZERO || loan.min_amount > loan.max_amount {
            return Err(BankError::ConfigError(
                "loan amount bounds must satisfy 0 < min_amount <= max_amount".to_string(),
            ));
        }
        if loan.min_monthly_income < Decimal::ZERO {
            return Err(BankError::ConfigError(
                "loan.min_monthly_income cannot be negative".to_string(),
            ));
        }
        let largest = Amount::new(loan.max_amount)
            .map_err(|e| BankError::ConfigError(format!("loan.max_amount: {}", e)))?;
        loan.terms().monthly_payment(largest)?;
        Ok(())
    }

    pub fn opening_balance(&self) -> Result<Balance> {
        Balance::new(self.opening_balance)
    }
}
