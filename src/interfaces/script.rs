use super::csv::script_reader::{ScriptOp, ScriptRow};
use crate::application::accounts::Adjustment;
use crate::application::bank::Bank;
use crate::domain::account::Account;
use crate::domain::actor::{Actor, Role, UserProfile};
use crate::domain::loan::LoanStatus;
use crate::error::{BankError, Result};

/// Replays script rows against a [`Bank`].
pub struct ScriptRunner {
    bank: Bank,
}

impl ScriptRunner {
    pub fn new(bank: Bank) -> Self {
        Self { bank }
    }

    async fn profile(&self, handle: &str) -> Result<UserProfile> {
        self.bank
            .directory()
            .resolve(handle)
            .await?
            .ok_or_else(|| BankError::not_found(format!("user {}", handle)))
    }

    async fn actor(&self, handle: &str) -> Result<Actor> {
        Ok(self.profile(handle).await?.actor())
    }

    /// Executes one row, returning a short summary of what happened.
    pub async fn execute(&self, row: &ScriptRow) -> Result<String> {
        let bank = &self.bank;
        match row.op {
            ScriptOp::Register | ScriptOp::Admin => {
                let role = if row.op == ScriptOp::Admin {
                    Role::Admin
                } else {
                    Role::Customer
                };
                let (profile, account) = bank.register(row.target()?, &row.actor, role).await?;
                Ok(format!("registered {} with account {}", profile.email, account.number))
            }
            ScriptOp::Transfer => {
                let actor = self.actor(&row.actor).await?;
                let receipt = bank
                    .transfers
                    .transfer(&actor, row.target()?, row.amount()?, row.memo())
                    .await?;
                Ok(format!("transfer {}", receipt.reference))
            }
            ScriptOp::Apply => {
                let actor = self.actor(&row.actor).await?;
                let income = row.income.ok_or_else(|| {
                    BankError::InvalidAmount("apply requires an income".to_string())
                })?;
                let loan = bank.loans.apply(&actor, row.amount()?, income, row.memo()).await?;
                Ok(format!("loan {} pending, monthly payment {}", loan.id, loan.monthly_payment))
            }
            ScriptOp::Approve | ScriptOp::Reject => {
                let actor = self.actor(&row.actor).await?;
                let borrower = self.profile(row.target()?).await?;
                let pending = bank
                    .loans
                    .pending_for(&actor, borrower.id)
                    .await?
                    .ok_or_else(|| {
                        BankError::not_found(format!("pending loan of {}", borrower.email))
                    })?;
                let loan = if row.op == ScriptOp::Approve {
                    bank.loans.approve(&actor, pending.id).await?
                } else {
                    let reason = row.memo.as_deref();
                    bank.loans.reject(&actor, pending.id, reason).await?
                };
                Ok(format!("loan {} {}", loan.id, loan.status))
            }
            ScriptOp::Pay => {
                let actor = self.actor(&row.actor).await?;
                let loan = bank
                    .loans
                    .loans_for(&actor)
                    .await?
                    .into_iter()
                    .find(|l| l.status == LoanStatus::Disbursed)
                    .ok_or_else(|| {
                        BankError::not_found(format!("disbursed loan of {}", row.actor))
                    })?;
                let loan = bank.loans.pay(&actor, loan.id, row.amount()?).await?;
                Ok(format!("loan {} {}, remaining {}", loan.id, loan.status, loan.remaining))
            }
            ScriptOp::Deposit | ScriptOp::Withdraw => {
                let actor = self.actor(&row.actor).await?;
                let holder = self.profile(row.target()?).await?;
                let direction = if row.op == ScriptOp::Deposit {
                    Adjustment::Deposit
                } else {
                    Adjustment::Withdrawal
                };
                let account = bank
                    .accounts
                    .adjust_balance(&actor, holder.id, row.amount()?, direction, row.memo())
                    .await?;
                Ok(format!("account {} balance {}", account.number, account.balance))
            }
        }
    }

    /// Every account paired with its owner, oldest account first.
    pub async fn report(&self) -> Result<Vec<(UserProfile, Account)>> {
        let mut report = Vec::new();
        for account in self.bank.all_accounts().await? {
            let owner = self
                .bank
                .directory()
                .user(account.owner)
                .await?
                .ok_or_else(|| {
                    BankError::not_found(format!("owner of account {}", account.number))
                })?;
            report.push((owner, account));
        }
        Ok(report)
    }
}
