use crate::domain::account::Account;
use crate::domain::actor::UserProfile;
use crate::domain::ids::{AccountId, EntryId, LoanId, UserId};
use crate::domain::ledger::{LedgerEntry, LedgerFilter, sort_newest_first};
use crate::domain::loan::{Loan, LoanStatus};
use crate::domain::ports::{AccountStore, Directory, LedgerStore, LoanStore, UnitOfWorkStore};
use crate::domain::unit_of_work::UnitOfWork;
use crate::error::{BankError, Result};
use ::rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for account documents, keyed by account id.
pub const CF_ACCOUNTS: &str = "accounts";
/// Column Family mapping owner user id to account id.
pub const CF_OWNERS: &str = "owners";
/// Column Family mapping account number to account id.
pub const CF_NUMBERS: &str = "numbers";
/// Column Family for loan documents.
pub const CF_LOANS: &str = "loans";
/// Column Family for the append-only ledger.
pub const CF_LEDGER: &str = "ledger";
/// Column Family for registered users.
pub const CF_USERS: &str = "users";
/// Column Family mapping lowercase email to user id.
pub const CF_EMAILS: &str = "emails";

const COLUMN_FAMILIES: [&str; 7] = [
    CF_ACCOUNTS,
    CF_OWNERS,
    CF_NUMBERS,
    CF_LOANS,
    CF_LEDGER,
    CF_USERS,
    CF_EMAILS,
];

/// A persistent store implementation using RocksDB.
///
/// Each entity kind lives in its own Column Family, with small index families
/// for the uniqueness rules. Commits are serialized by a write gate: the
/// version and uniqueness checks run under the gate and every write of a unit
/// of work goes to disk in one `WriteBatch`.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_gate: Arc<Mutex<()>>,
}

fn internal(message: String) -> BankError {
    BankError::InternalError(Box::new(std::io::Error::other(message)))
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that all required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect::<Vec<_>>();

        let path = path.as_ref();
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;
        tracing::info!(path = %path.display(), "opened RocksDB store");

        Ok(Self {
            db: Arc::new(db),
            write_gate: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| internal(format!("{} column family not found", name)))
    }

    fn get_json<T: DeserializeOwned>(&self, cf: &str, key: &[u8]) -> Result<Option<T>> {
        match self.db.get_cf(self.cf(cf)?, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan_json<T: DeserializeOwned>(&self, cf: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        for item in self.db.iterator_cf(self.cf(cf)?, IteratorMode::Start) {
            let (_key, value) = item?;
            items.push(serde_json::from_slice(&value)?);
        }
        Ok(items)
    }

    fn exists(&self, cf: &str, key: &[u8]) -> Result<bool> {
        Ok(self.db.get_pinned_cf(self.cf(cf)?, key)?.is_some())
    }

    fn put_json<T: Serialize>(
        &self,
        batch: &mut WriteBatch,
        cf: &str,
        key: &[u8],
        value: &T,
    ) -> Result<()> {
        batch.put_cf(self.cf(cf)?, key, serde_json::to_vec(value)?);
        Ok(())
    }

    fn check(&self, work: &UnitOfWork) -> Result<()> {
        let mut owners = HashSet::new();
        let mut numbers = HashSet::new();
        for account in &work.new_accounts {
            if self.exists(CF_ACCOUNTS, account.id.as_bytes())? {
                return Err(BankError::conflict(format!("account {} already exists", account.id)));
            }
            if self.exists(CF_OWNERS, account.owner.as_bytes())? || !owners.insert(account.owner) {
                return Err(BankError::conflict(format!(
                    "user {} already has an account",
                    account.owner
                )));
            }
            if self.exists(CF_NUMBERS, account.number.as_bytes())?
                || !numbers.insert(account.number.as_str())
            {
                return Err(BankError::conflict(format!(
                    "account number {} is taken",
                    account.number
                )));
            }
        }

        for account in &work.updated_accounts {
            let stored: Account = self
                .get_json(CF_ACCOUNTS, account.id.as_bytes())?
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

        if work.new_loans.iter().any(|l| l.status == LoanStatus::Pending) {
            let stored: Vec<Loan> = self.scan_json(CF_LOANS)?;
            let mut pending: HashSet<UserId> = stored
                .iter()
                .filter(|l| l.status == LoanStatus::Pending)
                .map(|l| l.borrower)
                .collect();
            for loan in work.new_loans.iter().filter(|l| l.status == LoanStatus::Pending) {
                if !pending.insert(loan.borrower) {
                    return Err(BankError::DuplicatePending(loan.borrower));
                }
            }
        }
        for loan in &work.new_loans {
            if self.exists(CF_LOANS, loan.id.as_bytes())? {
                return Err(BankError::conflict(format!("loan {} already exists", loan.id)));
            }
        }

        for loan in &work.updated_loans {
            let stored: Loan = self
                .get_json(CF_LOANS, loan.id.as_bytes())?
                .ok_or_else(|| BankError::not_found(format!("loan {}", loan.id)))?;
            if stored.version != loan.version {
                return Err(BankError::conflict(format!(
                    "loan {} was modified concurrently",
                    loan.id
                )));
            }
        }

        for entry in &work.entries {
            if self.exists(CF_LEDGER, entry.id.as_bytes())? {
                return Err(BankError::conflict(format!(
                    "ledger entry {} is already recorded",
                    entry.reference
                )));
            }
        }
        Ok(())
    }

    fn batch(&self, work: UnitOfWork) -> Result<WriteBatch> {
        let mut batch = WriteBatch::default();
        for account in &work.new_accounts {
            self.put_json(&mut batch, CF_ACCOUNTS, account.id.as_bytes(), account)?;
            batch.put_cf(self.cf(CF_OWNERS)?, account.owner.as_bytes(), account.id.as_bytes());
            batch.put_cf(self.cf(CF_NUMBERS)?, account.number.as_bytes(), account.id.as_bytes());
        }
        for mut account in work.updated_accounts {
            account.version += 1;
            self.put_json(&mut batch, CF_ACCOUNTS, account.id.as_bytes(), &account)?;
        }
        for loan in &work.new_loans {
            self.put_json(&mut batch, CF_LOANS, loan.id.as_bytes(), loan)?;
        }
        for mut loan in work.updated_loans {
            loan.version += 1;
            self.put_json(&mut batch, CF_LOANS, loan.id.as_bytes(), &loan)?;
        }
        for entry in &work.entries {
            self.put_json(&mut batch, CF_LEDGER, entry.id.as_bytes(), entry)?;
        }
        Ok(batch)
    }
}

#[async_trait]
impl AccountStore for RocksDBStore {
    async fn account(&self, id: AccountId) -> Result<Option<Account>> {
        self.get_json(CF_ACCOUNTS, id.as_bytes())
    }

    async fn account_for_owner(&self, owner: UserId) -> Result<Option<Account>> {
        match self.db.get_cf(self.cf(CF_OWNERS)?, owner.as_bytes())? {
            Some(id) => self.get_json(CF_ACCOUNTS, &id),
            None => Ok(None),
        }
    }

    async fn all_accounts(&self) -> Result<Vec<Account>> {
        let mut accounts: Vec<Account> = self.scan_json(CF_ACCOUNTS)?;
        accounts.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.number.cmp(&b.number))
        });
        Ok(accounts)
    }
}

#[async_trait]
impl LoanStore for RocksDBStore {
    async fn loan(&self, id: LoanId) -> Result<Option<Loan>> {
        self.get_json(CF_LOANS, id.as_bytes())
    }

    async fn pending_loan_for(&self, borrower: UserId) -> Result<Option<Loan>> {
        let loans: Vec<Loan> = self.scan_json(CF_LOANS)?;
        Ok(loans
            .into_iter()
            .find(|l| l.borrower == borrower && l.status == LoanStatus::Pending))
    }

    async fn loans_for(&self, borrower: UserId) -> Result<Vec<Loan>> {
        let mut loans: Vec<Loan> = self
            .scan_json::<Loan>(CF_LOANS)?
            .into_iter()
            .filter(|l| l.borrower == borrower)
            .collect();
        loans.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(loans)
    }
}

#[async_trait]
impl LedgerStore for RocksDBStore {
    async fn entry(&self, id: EntryId) -> Result<Option<LedgerEntry>> {
        self.get_json(CF_LEDGER, id.as_bytes())
    }

    async fn entries(&self, filter: &LedgerFilter) -> Result<Vec<LedgerEntry>> {
        let mut entries: Vec<LedgerEntry> = self
            .scan_json::<LedgerEntry>(CF_LEDGER)?
            .into_iter()
            .filter(|e| filter.matches(e))
            .collect();
        sort_newest_first(&mut entries);
        Ok(entries)
    }
}

#[async_trait]
impl UnitOfWorkStore for RocksDBStore {
    async fn commit(&self, work: UnitOfWork) -> Result<()> {
        work.validate()?;
        if work.is_empty() {
            return Ok(());
        }
        let _gate = self.write_gate.lock().await;
        self.check(&work)?;
        let batch = self.batch(work)?;
        tracing::debug!(writes = batch.len(), "committing unit of work");
        self.db.write(batch)?;
        Ok(())
    }
}

#[async_trait]
impl Directory for RocksDBStore {
    async fn register(&self, profile: UserProfile) -> Result<()> {
        let email = profile.email.trim().to_lowercase();
        let _gate = self.write_gate.lock().await;
        if self.exists(CF_EMAILS, email.as_bytes())? {
            return Err(BankError::conflict(format!("email {} is already registered", email)));
        }
        let mut batch = WriteBatch::default();
        self.put_json(&mut batch, CF_USERS, profile.id.as_bytes(), &profile)?;
        batch.put_cf(self.cf(CF_EMAILS)?, email.as_bytes(), profile.id.as_bytes());
        self.db.write(batch)?;
        Ok(())
    }

    async fn unregister(&self, id: UserId) -> Result<()> {
        let _gate = self.write_gate.lock().await;
        let Some(profile) = self.get_json::<UserProfile>(CF_USERS, id.as_bytes())? else {
            return Ok(());
        };
        let mut batch = WriteBatch::default();
        batch.delete_cf(self.cf(CF_USERS)?, id.as_bytes());
        batch.delete_cf(self.cf(CF_EMAILS)?, profile.email.trim().to_lowercase().as_bytes());
        self.db.write(batch)?;
        Ok(())
    }

    async fn user(&self, id: UserId) -> Result<Option<UserProfile>> {
        self.get_json(CF_USERS, id.as_bytes())
    }

    async fn resolve(&self, handle: &str) -> Result<Option<UserProfile>> {
        let email = handle.trim().to_lowercase();
        match self.db.get_cf(self.cf(CF_EMAILS)?, email.as_bytes())? {
            Some(id) => self.get_json(CF_USERS, &id),
            None => Ok(None),
        }
    }
}
