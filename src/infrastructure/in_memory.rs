use crate::domain::account::Account;
use crate::domain::actor::UserProfile;
use crate::domain::ids::{AccountId, EntryId, LoanId, UserId};
use crate::domain::ledger::{LedgerEntry, LedgerFilter, sort_newest_first};
use crate::domain::loan::{Loan, LoanStatus};
use crate::domain::ports::{AccountStore, Directory, LedgerStore, LoanStore, UnitOfWorkStore};
use crate::domain::unit_of_work::UnitOfWork;
use crate::error::{BankError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    accounts: HashMap<AccountId, Account>,
    owners: HashMap<UserId, AccountId>,
    numbers: HashSet<String>,
    loans: HashMap<LoanId, Loan>,
    entries: HashMap<EntryId, LedgerEntry>,
}

impl State {
    fn check(&self, work: &UnitOfWork) -> Result<()> {
        let mut owners = HashSet::new();
        let mut numbers = HashSet::new();
        for account in &work.new_accounts {
            if self.accounts.contains_key(&account.id) {
                return Err(BankError::conflict(format!("account {} already exists", account.id)));
            }
            if self.owners.contains_key(&account.owner) || !owners.insert(account.owner) {
                return Err(BankError::conflict(format!(
                    "user {} already has an account",
                    account.owner
                )));
            }
            if self.numbers.contains(&account.number) || !numbers.insert(account.number.as_str()) {
                return Err(BankError::conflict(format!(
                    "account number {} is taken",
                    account.number
                )));
            }
        }

        for account in &work.updated_accounts {
            let stored = self
                .accounts
                .get(&account.id)
                .ok_or_else(|| BankError::not_found(format!("account {}", account.id)))?;
            if stored.version != account.version {
                return Err(BankError::conflict(format!(
                    "account {} was modified concurrently",
                    account.number
                )));
            }
            if stored.owner != account.owner || stored.number != account.number {
                return Err(BankError::conflict(format!(
                    "account {} identity cannot change",
                    account.number
                )));
            }
        }

        let mut pending = HashSet::new();
        for loan in &work.new_loans {
            if self.loans.contains_key(&loan.id) {
                return Err(BankError::conflict(format!("loan {} already exists", loan.id)));
            }
            if loan.status == LoanStatus::Pending {
                let exists = self
                    .loans
                    .values()
                    .any(|l| l.borrower == loan.borrower && l.status == LoanStatus::Pending);
                if exists || !pending.insert(loan.borrower) {
                    return Err(BankError::DuplicatePending(loan.borrower));
                }
            }
        }

        for loan in &work.updated_loans {
            let stored = self
                .loans
                .get(&loan.id)
                .ok_or_else(|| BankError::not_found(format!("loan {}", loan.id)))?;
            if stored.version != loan.version {
                return Err(BankError::conflict(format!(
                    "loan {} was modified concurrently",
                    loan.id
                )));
            }
        }

        for entry in &work.entries {
            if self.entries.contains_key(&entry.id) {
                return Err(BankError::conflict(format!(
                    "ledger entry {} is already recorded",
                    entry.reference
                )));
            }
        }
        Ok(())
    }

    fn apply(&mut self, work: UnitOfWork) {
        for account in work.new_accounts {
            self.owners.insert(account.owner, account.id);
            self.numbers.insert(account.number.clone());
            self.accounts.insert(account.id, account);
        }
        for mut account in work.updated_accounts {
            account.version += 1;
            self.accounts.insert(account.id, account);
        }
        for loan in work.new_loans {
            self.loans.insert(loan.id, loan);
        }
        for mut loan in work.updated_loans {
            loan.version += 1;
            self.loans.insert(loan.id, loan);
        }
        for entry in work.entries {
            self.entries.insert(entry.id, entry);
        }
    }
}

/// A thread-safe in-memory bank store.
///
/// Accounts, loans and the ledger live behind one `Arc<RwLock<..>>`, so a
/// commit checks and applies a whole unit of work under a single write guard.
/// Cloning shares the underlying state.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for InMemoryStore {
    async fn account(&self, id: AccountId) -> Result<Option<Account>> {
        let state = self.state.read().await;
        Ok(state.accounts.get(&id).cloned())
    }

    async fn account_for_owner(&self, owner: UserId) -> Result<Option<Account>> {
        let state = self.state.read().await;
        Ok(state
            .owners
            .get(&owner)
            .and_then(|id| state.accounts.get(id))
            .cloned())
    }

    async fn all_accounts(&self) -> Result<Vec<Account>> {
        let state = self.state.read().await;
        let mut accounts: Vec<Account> = state.accounts.values().cloned().collect();
        accounts.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.number.cmp(&b.number))
        });
        Ok(accounts)
    }
}

#[async_trait]
impl LoanStore for InMemoryStore {
    async fn loan(&self, id: LoanId) -> Result<Option<Loan>> {
        let state = self.state.read().await;
        Ok(state.loans.get(&id).cloned())
    }

    async fn pending_loan_for(&self, borrower: UserId) -> Result<Option<Loan>> {
        let state = self.state.read().await;
        Ok(state
            .loans
            .values()
            .find(|l| l.borrower == borrower && l.status == LoanStatus::Pending)
            .cloned())
    }

    async fn loans_for(&self, borrower: UserId) -> Result<Vec<Loan>> {
        let state = self.state.read().await;
        let mut loans: Vec<Loan> = state
            .loans
            .values()
            .filter(|l| l.borrower == borrower)
            .cloned()
            .collect();
        loans.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(loans)
    }
}

#[async_trait]
impl LedgerStore for InMemoryStore {
    async fn entry(&self, id: EntryId) -> Result<Option<LedgerEntry>> {
        let state = self.state.read().await;
        Ok(state.entries.get(&id).cloned())
    }

    async fn entries(&self, filter: &LedgerFilter) -> Result<Vec<LedgerEntry>> {
        let state = self.state.read().await;
        let mut entries: Vec<LedgerEntry> = state
            .entries
            .values()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        sort_newest_first(&mut entries);
        Ok(entries)
    }
}

#[async_trait]
impl UnitOfWorkStore for InMemoryStore {
    async fn commit(&self, work: UnitOfWork) -> Result<()> {
        work.validate()?;
        if work.is_empty() {
            return Ok(());
        }
        let mut state = self.state.write().await;
        state.check(&work)?;
        state.apply(work);
        Ok(())
    }
}

#[derive(Default)]
struct Users {
    by_id: HashMap<UserId, UserProfile>,
    by_email: HashMap<String, UserId>,
}

/// A thread-safe in-memory identity directory keyed by lowercase email.
#[derive(Default, Clone)]
pub struct InMemoryDirectory {
    users: Arc<RwLock<Users>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn register(&self, profile: UserProfile) -> Result<()> {
        let mut users = self.users.write().await;
        let email = profile.email.trim().to_lowercase();
        if users.by_email.contains_key(&email) {
            return Err(BankError::conflict(format!("email {} is already registered", email)));
        }
        users.by_email.insert(email, profile.id);
        users.by_id.insert(profile.id, profile);
        Ok(())
    }

    async fn unregister(&self, id: UserId) -> Result<()> {
        let mut users = self.users.write().await;
        if let Some(profile) = users.by_id.remove(&id) {
            users.by_email.remove(&profile.email.trim().to_lowercase());
        }
        Ok(())
    }

    async fn user(&self, id: UserId) -> Result<Option<UserProfile>> {
        let users = self.users.read().await;
        Ok(users.by_id.get(&id).cloned())
    }

    async fn resolve(&self, handle: &str) -> Result<Option<UserProfile>> {
        let users = self.users.read().await;
        Ok(users
            .by_email
            .get(&handle.trim().to_lowercase())
            .and_then(|id| users.by_id.get(id))
            .cloned())
    }
}
