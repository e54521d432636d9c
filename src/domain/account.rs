use super::ids::{AccountId, UserId};
use super::money::{Amount, Balance};
use crate::error::{BankError, Result};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Generates a visible account number: `ACC` followed by ten digits.
pub fn generate_account_number() -> String {
    let digits: u64 = rand::thread_rng().gen_range(1_000_000_000..10_000_000_000);
    format!("ACC{}", digits)
}

/// The single checking account owned by a user.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Account {
    pub id: AccountId,
    /// The owning user. Unique across all accounts.
    pub owner: UserId,
    /// Externally visible account number. Never changes once assigned.
    pub number: String,
    pub balance: Balance,
    /// Lifetime count of transfers touching this account.
    pub transactions_count: u64,
    /// Lifetime volume moved through this account by transfers and disbursements.
    pub transactions_volume: Balance,
    /// Optimistic concurrency token, bumped by the store on every committed write.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn open(owner: UserId, opening_balance: Balance, now: DateTime<Utc>) -> Self {
        Self {
            id: AccountId::new(),
            owner,
            number: generate_account_number(),
            balance: opening_balance,
            transactions_count: 0,
            transactions_volume: Balance::ZERO,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Adds funds to the balance.
    pub fn credit(&mut self, amount: Amount, now: DateTime<Utc>) {
        self.balance += amount;
        self.updated_at = now;
    }

    /// Removes funds from the balance if sufficient, leaving it untouched otherwise.
    pub fn debit(&mut self, amount: Amount, now: DateTime<Utc>) -> Result<()> {
        match self.balance.checked_sub(amount) {
            Some(balance) => {
                self.balance = balance;
                self.updated_at = now;
                Ok(())
            }
            None => Err(BankError::InsufficientBalance {
                available: self.balance.value(),
                requested: amount.value(),
            }),
        }
    }

    /// Bumps the lifetime counters after a transfer.
    pub fn record_activity(&mut self, amount: Amount) {
        self.transactions_count += 1;
        self.transactions_volume += amount;
    }
}
