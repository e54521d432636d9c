use super::ids::{AccountId, EntryId, UserId};
use super::money::Amount;
use crate::error::{BankError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Transfer,
    LoanDisbursement,
    LoanPayment,
    Deposit,
    Withdrawal,
}

impl EntryKind {
    /// Prefix of the human-readable reference code.
    pub fn reference_prefix(self) -> &'static str {
        match self {
            EntryKind::Transfer => "TXN",
            EntryKind::LoanDisbursement => "LOAN",
            EntryKind::LoanPayment => "LPY",
            EntryKind::Deposit => "DEP",
            EntryKind::Withdrawal => "WDR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Pending,
    Completed,
    Failed,
}

/// One side of a ledger entry.
///
/// `account` is `None` when the bank itself is the source or sink of the
/// funds, e.g. the source of a disbursement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub user: UserId,
    pub account: Option<AccountId>,
    pub name: String,
}

impl Party {
    pub fn account_holder(user: UserId, account: AccountId, name: impl Into<String>) -> Self {
        Self {
            user,
            account: Some(account),
            name: name.into(),
        }
    }

    pub fn bank(user: UserId, name: impl Into<String>) -> Self {
        Self {
            user,
            account: None,
            name: name.into(),
        }
    }
}

/// An immutable record of a balance-affecting event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub reference: String,
    pub kind: EntryKind,
    pub status: EntryStatus,
    pub sender: Party,
    pub receiver: Option<Party>,
    pub amount: Amount,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl LedgerEntry {
    pub fn involves_user(&self, user: UserId) -> bool {
        self.sender.user == user || self.receiver.as_ref().is_some_and(|r| r.user == user)
    }

    pub fn involves_account(&self, account: AccountId) -> bool {
        self.debits(account) || self.credits(account)
    }

    /// True if this entry took funds out of `account`.
    pub fn debits(&self, account: AccountId) -> bool {
        self.sender.account == Some(account)
    }

    /// True if this entry put funds into `account`.
    pub fn credits(&self, account: AccountId) -> bool {
        self.receiver
            .as_ref()
            .is_some_and(|r| r.account == Some(account))
    }

    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.status != EntryStatus::Pending {
            return Err(BankError::conflict(format!(
                "ledger entry {} is no longer pending",
                self.reference
            )));
        }
        self.status = EntryStatus::Completed;
        self.completed_at = Some(now);
        Ok(())
    }
}

/// Selection of ledger entries. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerFilter {
    pub participant: Option<UserId>,
    pub account: Option<AccountId>,
    pub status: Option<EntryStatus>,
    pub kind: Option<EntryKind>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl LedgerFilter {
    pub fn participant(user: UserId) -> Self {
        Self {
            participant: Some(user),
            ..Self::default()
        }
    }

    pub fn account(account: AccountId) -> Self {
        Self {
            account: Some(account),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: EntryStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_kind(mut self, kind: EntryKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn between(mut self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        self.participant.is_none_or(|user| entry.involves_user(user))
            && self.account.is_none_or(|account| entry.involves_account(account))
            && self.status.is_none_or(|status| entry.status == status)
            && self.kind.is_none_or(|kind| entry.kind == kind)
            && self.from.is_none_or(|from| entry.created_at >= from)
            && self.to.is_none_or(|to| entry.created_at <= to)
    }
}

/// Orders entries newest first, breaking ties by reference for a stable order.
pub fn sort_newest_first(entries: &mut [LedgerEntry]) {
    entries.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.reference.cmp(&a.reference))
    });
}
