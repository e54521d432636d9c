use super::account::Account;
use super::actor::UserProfile;
use super::ids::{AccountId, EntryId, LoanId, UserId};
use super::ledger::{LedgerEntry, LedgerFilter};
use super::loan::Loan;
use super::unit_of_work::UnitOfWork;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn account(&self, id: AccountId) -> Result<Option<Account>>;
    async fn account_for_owner(&self, owner: UserId) -> Result<Option<Account>>;
    async fn all_accounts(&self) -> Result<Vec<Account>>;
}

#[async_trait]
pub trait LoanStore: Send + Sync {
    async fn loan(&self, id: LoanId) -> Result<Option<Loan>>;
    async fn pending_loan_for(&self, borrower: UserId) -> Result<Option<Loan>>;
    /// All loans of a borrower, newest first.
    async fn loans_for(&self, borrower: UserId) -> Result<Vec<Loan>>;
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn entry(&self, id: EntryId) -> Result<Option<LedgerEntry>>;
    /// Entries matching `filter`, newest first.
    async fn entries(&self, filter: &LedgerFilter) -> Result<Vec<LedgerEntry>>;
}

#[async_trait]
pub trait UnitOfWorkStore: Send + Sync {
    /// Applies every write of `work` atomically.
    ///
    /// Fails with `Conflict` when a version check or uniqueness rule (one
    /// account per owner, unique account numbers, one pending loan per
    /// borrower, append-only ledger) is violated; `DuplicatePending` when the
    /// violated rule is the pending-loan one. Nothing is written on failure.
    async fn commit(&self, work: UnitOfWork) -> Result<()>;
}

/// Everything the banking services need from storage.
pub trait BankStore: AccountStore + LoanStore + LedgerStore + UnitOfWorkStore {}

impl<T> BankStore for T where T: AccountStore + LoanStore + LedgerStore + UnitOfWorkStore {}

pub type StoreHandle = Arc<dyn BankStore>;

/// Identity lookup: resolves user-facing handles to registered users.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Registers a user. Fails with `Conflict` if the email is taken.
    async fn register(&self, profile: UserProfile) -> Result<()>;
    /// Removes a registration. Unknown ids are ignored.
    async fn unregister(&self, id: UserId) -> Result<()>;
    async fn user(&self, id: UserId) -> Result<Option<UserProfile>>;
    /// Looks a user up by email, ignoring case.
    async fn resolve(&self, handle: &str) -> Result<Option<UserProfile>>;
}

pub type DirectoryHandle = Arc<dyn Directory>;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub type ClockHandle = Arc<dyn Clock>;
