//! Application layer containing the banking operations.
//!
//! Each service is built from a [`ServiceContext`] holding the injected store,
//! identity directory, clock and configuration. Operations read through the
//! store ports, decide legality in the domain model, and hand their writes to
//! the store as a single unit of work.

pub mod accounts;
pub mod bank;
pub mod ledger;
pub mod loans;
pub mod policy;
pub mod transfer;

use crate::config::BankConfig;
use crate::domain::actor::UserProfile;
use crate::domain::ids::UserId;
use crate::domain::ports::{ClockHandle, DirectoryHandle, StoreHandle};
use crate::error::{BankError, Result};
use std::future::Future;
use std::sync::Arc;

/// Handles shared by every service.
#[derive(Clone)]
pub struct ServiceContext {
    pub store: StoreHandle,
    pub directory: DirectoryHandle,
    pub clock: ClockHandle,
    pub config: Arc<BankConfig>,
}

impl ServiceContext {
    pub(crate) async fn profile(&self, user: UserId) -> Result<UserProfile> {
        self.directory
            .user(user)
            .await?
            .ok_or_else(|| BankError::not_found(format!("user {}", user)))
    }

    /// Runs `op`, re-running it from scratch after each optimistic-update
    /// conflict, up to the configured number of retries.
    pub(crate) async fn with_retries<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Err(e) if e.is_conflict() && attempt < self.config.conflict_retries => {
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}
