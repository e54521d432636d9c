use super::account::Account;
use super::ledger::{EntryStatus, LedgerEntry};
use super::loan::Loan;
use crate::error::{BankError, Result};

/// The writes of one operation, committed by the store all together or not at all.
///
/// Updated accounts and loans carry the version they were read at; the store
/// refuses the whole unit with [`BankError::Conflict`] if any of them changed
/// in the meantime. New accounts and loans must not exist yet.
#[derive(Debug, Default, Clone)]
pub struct UnitOfWork {
    pub new_accounts: Vec<Account>,
    pub updated_accounts: Vec<Account>,
    pub new_loans: Vec<Loan>,
    pub updated_loans: Vec<Loan>,
    pub entries: Vec<LedgerEntry>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_account(mut self, account: Account) -> Self {
        self.new_accounts.push(account);
        self
    }

    pub fn update_account(mut self, account: Account) -> Self {
        self.updated_accounts.push(account);
        self
    }

    pub fn open_loan(mut self, loan: Loan) -> Self {
        self.new_loans.push(loan);
        self
    }

    pub fn update_loan(mut self, loan: Loan) -> Self {
        self.updated_loans.push(loan);
        self
    }

    pub fn append(mut self, entry: LedgerEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.new_accounts.is_empty()
            && self.updated_accounts.is_empty()
            && self.new_loans.is_empty()
            && self.updated_loans.is_empty()
            && self.entries.is_empty()
    }

    /// Checks the rules every backend relies on before touching storage:
    /// each entity appears once, and only completed entries are appended.
    pub fn validate(&self) -> Result<()> {
        let mut account_ids: Vec<_> = self
            .new_accounts
            .iter()
            .chain(&self.updated_accounts)
            .map(|a| a.id)
            .collect();
        account_ids.sort();
        if account_ids.windows(2).any(|w| w[0] == w[1]) {
            return Err(BankError::conflict("account written twice in one unit of work"));
        }

        let mut loan_ids: Vec<_> = self
            .new_loans
            .iter()
            .chain(&self.updated_loans)
            .map(|l| l.id)
            .collect();
        loan_ids.sort();
        if loan_ids.windows(2).any(|w| w[0] == w[1]) {
            return Err(BankError::conflict("loan written twice in one unit of work"));
        }

        if let Some(entry) = self
            .entries
            .iter()
            .find(|e| e.status != EntryStatus::Completed)
        {
            return Err(BankError::conflict(format!(
                "ledger entry {} must be completed before it is committed",
                entry.reference
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::UserId;
    use crate::domain::money::Balance;
    use chrono::Utc;

    #[test]
    fn test_same_account_twice_is_rejected() {
        let account = Account::open(UserId::new(), Balance::ZERO, Utc::now());
        let work = UnitOfWork::new()
            .update_account(account.clone())
            .update_account(account);
        assert!(matches!(work.validate(), Err(BankError::Conflict(_))));
    }

    #[test]
    fn test_empty_unit_is_valid() {
        let work = UnitOfWork::new();
        assert!(work.is_empty());
        assert!(work.validate().is_ok());
    }
}
