use super::ServiceContext;
use super::ledger::LedgerRecorder;
use super::policy::{Operation, authorize};
use crate::domain::actor::{Actor, UserProfile};
use crate::domain::ids::EntryId;
use crate::domain::ledger::{EntryKind, Party};
use crate::domain::money::{Amount, Balance};
use crate::domain::unit_of_work::UnitOfWork;
use crate::error::{BankError, Result};
use rust_decimal::Decimal;

/// Result of a completed transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferReceipt {
    pub reference: String,
    pub entry_id: EntryId,
    pub new_sender_balance: Balance,
}

/// Moves funds between two customers' accounts.
#[derive(Clone)]
pub struct TransferEngine {
    ctx: ServiceContext,
    ledger: LedgerRecorder,
}

impl TransferEngine {
    pub fn new(ctx: ServiceContext, ledger: LedgerRecorder) -> Self {
        Self { ctx, ledger }
    }

    /// Transfers `amount` from the actor's account to the account of the user
    /// registered under `receiver_handle`.
    ///
    /// Both balances, both activity counters and the ledger entry are
    /// committed together. Losing an update race re-runs the transfer against
    /// fresh balances.
    pub async fn transfer(
        &self,
        actor: &Actor,
        receiver_handle: &str,
        amount: Decimal,
        description: &str,
    ) -> Result<TransferReceipt> {
        authorize(actor, Operation::Transfer)?;
        let amount = Amount::new(amount)?;

        let sender = self.ctx.profile(actor.user).await?;
        let receiver = self
            .ctx
            .directory
            .resolve(receiver_handle)
            .await?
            .ok_or_else(|| BankError::not_found(format!("receiver {}", receiver_handle)))?;
        if receiver.id == sender.id {
            return Err(BankError::Unauthorized(
                "cannot transfer to your own account".to_string(),
            ));
        }

        let (sender, receiver) = (&sender, &receiver);
        self.ctx
            .with_retries(move || self.try_transfer(sender, receiver, amount, description))
            .await
    }

    async fn try_transfer(
        &self,
        sender: &UserProfile,
        receiver: &UserProfile,
        amount: Amount,
        description: &str,
    ) -> Result<TransferReceipt> {
        let store = &self.ctx.store;
        let mut from = store
            .account_for_owner(sender.id)
            .await?
            .ok_or_else(|| BankError::not_found(format!("account for user {}", sender.email)))?;
        let mut to = store
            .account_for_owner(receiver.id)
            .await?
            .ok_or_else(|| BankError::not_found(format!("account for user {}", receiver.email)))?;

        let now = self.ctx.clock.now();
        from.debit(amount, now)?;
        to.credit(amount, now);
        from.record_activity(amount);
        to.record_activity(amount);

        let mut entry = self.ledger.draft(
            EntryKind::Transfer,
            Party::account_holder(sender.id, from.id, &sender.name),
            Some(Party::account_holder(receiver.id, to.id, &receiver.name)),
            amount,
            description,
        );
        entry.complete(now)?;

        let receipt = TransferReceipt {
            reference: entry.reference.clone(),
            entry_id: entry.id,
            new_sender_balance: from.balance,
        };
        let work = UnitOfWork::new()
            .update_account(from)
            .update_account(to)
            .append(entry);
        store.commit(work).await?;
        Ok(receipt)
    }
}
