use super::ServiceContext;
use super::accounts::AccountService;
use super::ledger::LedgerRecorder;
use super::loans::LoanLifecycle;
use super::transfer::TransferEngine;
use crate::config::BankConfig;
use crate::domain::account::Account;
use crate::domain::actor::{Role, UserProfile};
use crate::domain::ports::{ClockHandle, DirectoryHandle, StoreHandle};
use crate::error::Result;
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::in_memory::{InMemoryDirectory, InMemoryStore};
use std::sync::Arc;

/// The assembled banking core.
///
/// Every service shares the same injected store, directory, clock and
/// configuration. Cloning is cheap and shares all of them.
#[derive(Clone)]
pub struct Bank {
    ctx: ServiceContext,
    pub accounts: AccountService,
    pub transfers: TransferEngine,
    pub loans: LoanLifecycle,
    pub ledger: LedgerRecorder,
}

impl Bank {
    pub fn new(store: StoreHandle, directory: DirectoryHandle, config: BankConfig) -> Self {
        Self::with_clock(store, directory, Arc::new(SystemClock), config)
    }

    pub fn with_clock(
        store: StoreHandle,
        directory: DirectoryHandle,
        clock: ClockHandle,
        config: BankConfig,
    ) -> Self {
        let ctx = ServiceContext {
            store,
            directory,
            clock,
            config: Arc::new(config),
        };
        let ledger = LedgerRecorder::new(ctx.clone());
        Self {
            accounts: AccountService::new(ctx.clone(), ledger.clone()),
            transfers: TransferEngine::new(ctx.clone(), ledger.clone()),
            loans: LoanLifecycle::new(ctx.clone(), ledger.clone()),
            ledger,
            ctx,
        }
    }

    /// A bank backed by fresh in-memory adapters.
    pub fn in_memory(config: BankConfig) -> Self {
        Self::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(InMemoryDirectory::new()),
            config,
        )
    }

    /// Registers a user and opens their account.
    ///
    /// The directory entry is removed again if the account cannot be opened,
    /// so a user is never left registered without an account.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        role: Role,
    ) -> Result<(UserProfile, Account)> {
        let profile = UserProfile::new(name.trim(), email.trim(), role);
        self.ctx.directory.register(profile.clone()).await?;
        match self.accounts.open_account(profile.id).await {
            Ok(account) => Ok((profile, account)),
            Err(e) => {
                tracing::warn!(
                    email = %profile.email,
                    error = %e,
                    "account opening failed, undoing registration"
                );
                if let Err(undo) = self.ctx.directory.unregister(profile.id).await {
                    tracing::error!(
                        user = %profile.id,
                        error = %undo,
                        "could not undo registration"
                    );
                }
                Err(e)
            }
        }
    }

    pub fn directory(&self) -> &DirectoryHandle {
        &self.ctx.directory
    }

    /// Every account in the bank, oldest first.
    pub async fn all_accounts(&self) -> Result<Vec<Account>> {
        self.ctx.store.all_accounts().await
    }
}
