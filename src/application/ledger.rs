use super::ServiceContext;
use super::policy::{Operation, authorize};
use crate::domain::actor::Actor;
use crate::domain::ids::{AccountId, EntryId};
use crate::domain::ledger::{EntryKind, EntryStatus, LedgerEntry, LedgerFilter, Party};
use crate::domain::money::{Amount, Balance};
use crate::error::{BankError, Result};
use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;

/// Builds a reference code: kind prefix, unix millis, four random digits.
pub fn generate_reference(kind: EntryKind, at: DateTime<Utc>) -> String {
    let suffix: u16 = rand::thread_rng().gen_range(0..10_000);
    format!(
        "{}{}{:04}",
        kind.reference_prefix(),
        at.timestamp_millis(),
        suffix
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number.
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub const MAX_LIMIT: u32 = 100;

    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, Self::MAX_LIMIT),
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, 20)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: u32,
    pub limit: u32,
    pub pages: u32,
}

/// Outcome of replaying an account's ledger against its stored balance.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub account: AccountId,
    pub recorded: Balance,
    pub derived: Decimal,
    pub entries: usize,
}

impl Reconciliation {
    pub fn is_consistent(&self) -> bool {
        self.recorded.value() == self.derived
    }
}

/// Creates and reads ledger entries.
#[derive(Clone)]
pub struct LedgerRecorder {
    ctx: ServiceContext,
}

impl LedgerRecorder {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Drafts a pending entry. The caller completes it and commits it together
    /// with the balance changes it describes.
    pub fn draft(
        &self,
        kind: EntryKind,
        sender: Party,
        receiver: Option<Party>,
        amount: Amount,
        description: impl Into<String>,
    ) -> LedgerEntry {
        let now = self.ctx.clock.now();
        LedgerEntry {
            id: EntryId::new(),
            reference: generate_reference(kind, now),
            kind,
            status: EntryStatus::Pending,
            sender,
            receiver,
            amount,
            description: description.into(),
            created_at: now,
            completed_at: None,
        }
    }

    /// Entries matching `filter`, newest first, one page at a time.
    pub async fn query(
        &self,
        filter: &LedgerFilter,
        page: PageRequest,
    ) -> Result<Page<LedgerEntry>> {
        let page = PageRequest::new(page.page, page.limit);
        let all = self.ctx.store.entries(filter).await?;
        let total = all.len();
        let limit = page.limit as usize;
        let skip = (page.page as usize - 1).saturating_mul(limit);
        let items = all.into_iter().skip(skip).take(limit).collect();

        Ok(Page {
            items,
            total,
            page: page.page,
            limit: page.limit,
            pages: total.div_ceil(limit) as u32,
        })
    }

    /// A single entry, visible to its participants and to admins.
    pub async fn entry(&self, actor: &Actor, id: EntryId) -> Result<LedgerEntry> {
        let entry = self
            .ctx
            .store
            .entry(id)
            .await?
            .ok_or_else(|| BankError::not_found(format!("transaction {}", id)))?;
        authorize(actor, Operation::ViewEntry(&entry))?;
        Ok(entry)
    }

    /// Replays every completed entry touching the account and compares the
    /// result with the stored balance.
    pub async fn reconcile(&self, actor: &Actor, account: AccountId) -> Result<Reconciliation> {
        let stored = self
            .ctx
            .store
            .account(account)
            .await?
            .ok_or_else(|| BankError::not_found(format!("account {}", account)))?;
        authorize(actor, Operation::ViewAccount { owner: stored.owner })?;

        let filter = LedgerFilter::account(account).with_status(EntryStatus::Completed);
        let entries = self.ctx.store.entries(&filter).await?;
        let derived = entries.iter().fold(Decimal::ZERO, |mut sum, entry| {
            if entry.credits(account) {
                sum += entry.amount.value();
            }
            if entry.debits(account) {
                sum -= entry.amount.value();
            }
            sum
        });

        Ok(Reconciliation {
            account,
            recorded: stored.balance,
            derived,
            entries: entries.len(),
        })
    }
}
