use super::ServiceContext;
use super::ledger::LedgerRecorder;
use super::policy::{Operation, authorize};
use crate::domain::account::Account;
use crate::domain::actor::Actor;
use crate::domain::ids::UserId;
use crate::domain::ledger::{EntryKind, LedgerEntry, LedgerFilter, Party};
use crate::domain::money::{Amount, Balance};
use crate::domain::unit_of_work::UnitOfWork;
use crate::error::{BankError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Entries shown on a statement.
pub const STATEMENT_LIMIT: usize = 100;

/// Attempts at finding a free account number before giving up.
const NUMBER_ATTEMPTS: u32 = 5;

/// Direction of an administrative balance adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjustment {
    Deposit,
    Withdrawal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub account: Account,
    pub entries: Vec<LedgerEntry>,
}

/// Opens accounts and serves account-level reads and adjustments.
#[derive(Clone)]
pub struct AccountService {
    ctx: ServiceContext,
    ledger: LedgerRecorder,
}

impl AccountService {
    pub fn new(ctx: ServiceContext, ledger: LedgerRecorder) -> Self {
        Self { ctx, ledger }
    }

    /// Opens the single account of `user`, funded with the configured
    /// opening balance.
    pub async fn open_account(&self, user: UserId) -> Result<Account> {
        let profile = self.ctx.profile(user).await?;
        let opening = self.ctx.config.opening_balance()?;

        let mut attempt = 0;
        loop {
            if self.ctx.store.account_for_owner(user).await?.is_some() {
                return Err(BankError::conflict(format!(
                    "user {} already has an account",
                    user
                )));
            }

            let account = Account::open(user, opening, self.ctx.clock.now());
            let mut work = UnitOfWork::new();
            if let Ok(amount) = Amount::new(opening.value()) {
                let mut entry = self.ledger.draft(
                    EntryKind::Deposit,
                    Party::bank(UserId::SYSTEM, "Bank"),
                    Some(Party::account_holder(user, account.id, &profile.name)),
                    amount,
                    "Opening balance",
                );
                entry.complete(self.ctx.clock.now())?;
                work = work.append(entry);
            }

            match self.ctx.store.commit(work.open_account(account.clone())).await {
                Ok(()) => return Ok(account),
                // A clashing account number is the only conflict worth another draw;
                // the owner check above catches the rest on the next pass.
                Err(e) if e.is_conflict() && attempt < NUMBER_ATTEMPTS => attempt += 1,
                Err(e) => return Err(e),
            }
        }
    }

    /// The actor's own account.
    pub async fn account(&self, actor: &Actor) -> Result<Account> {
        self.account_of(actor, actor.user).await
    }

    /// Any user's account, visible to its owner and to admins.
    pub async fn account_of(&self, actor: &Actor, owner: UserId) -> Result<Account> {
        authorize(actor, Operation::ViewAccount { owner })?;
        self.ctx
            .store
            .account_for_owner(owner)
            .await?
            .ok_or_else(|| BankError::not_found(format!("account for user {}", owner)))
    }

    /// Account number and current balance of the actor.
    pub async fn balance(&self, actor: &Actor) -> Result<(String, Balance)> {
        let account = self.account(actor).await?;
        Ok((account.number, account.balance))
    }

    /// The actor's account with its most recent entries in the given window.
    pub async fn statement(
        &self,
        actor: &Actor,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Statement> {
        let account = self.account(actor).await?;
        let filter = LedgerFilter::participant(actor.user).between(from, to);
        let mut entries = self.ctx.store.entries(&filter).await?;
        entries.truncate(STATEMENT_LIMIT);
        Ok(Statement { account, entries })
    }

    /// Credits or debits a user's account outside of a transfer.
    pub async fn adjust_balance(
        &self,
        actor: &Actor,
        user: UserId,
        amount: Decimal,
        direction: Adjustment,
        description: &str,
    ) -> Result<Account> {
        authorize(actor, Operation::AdjustBalance)?;
        let amount = Amount::new(amount)?;
        let holder = self.ctx.profile(user).await?;
        let operator = self.ctx.profile(actor.user).await?;
        let (holder, operator) = (holder.name.as_str(), operator.name.as_str());

        self.ctx
            .with_retries(move || {
                self.try_adjust(operator, holder, user, amount, direction, description)
            })
            .await
    }

    async fn try_adjust(
        &self,
        operator: &str,
        holder: &str,
        user: UserId,
        amount: Amount,
        direction: Adjustment,
        description: &str,
    ) -> Result<Account> {
        let mut account = self
            .ctx
            .store
            .account_for_owner(user)
            .await?
            .ok_or_else(|| BankError::not_found(format!("account for user {}", user)))?;
        let now = self.ctx.clock.now();
        let holder_party = Party::account_holder(user, account.id, holder);
        let bank_party = Party::bank(UserId::SYSTEM, operator);

        let mut entry = match direction {
            Adjustment::Deposit => {
                account.credit(amount, now);
                self.ledger
                    .draft(EntryKind::Deposit, bank_party, Some(holder_party), amount, description)
            }
            Adjustment::Withdrawal => {
                account.debit(amount, now)?;
                self.ledger
                    .draft(EntryKind::Withdrawal, holder_party, None, amount, description)
            }
        };
        entry.complete(now)?;

        let work = UnitOfWork::new().update_account(account.clone()).append(entry);
        self.ctx.store.commit(work).await?;
        account.version += 1;
        Ok(account)
    }
}
