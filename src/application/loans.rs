use super::ServiceContext;
use super::ledger::LedgerRecorder;
use super::policy::{Operation, authorize};
use crate::domain::actor::{Actor, UserProfile};
use crate::domain::ids::{LoanId, UserId};
use crate::domain::ledger::{EntryKind, Party};
use crate::domain::loan::{Loan, LoanApplication};
use crate::domain::money::Amount;
use crate::domain::unit_of_work::UnitOfWork;
use crate::error::{BankError, Result};
use rust_decimal::Decimal;

/// Drives loans through `pending -> {disbursed, rejected}` and
/// `disbursed -> closed`, moving funds where a transition requires it.
#[derive(Clone)]
pub struct LoanLifecycle {
    ctx: ServiceContext,
    ledger: LedgerRecorder,
}

impl LoanLifecycle {
    pub fn new(ctx: ServiceContext, ledger: LedgerRecorder) -> Self {
        Self { ctx, ledger }
    }

    async fn load(&self, id: LoanId) -> Result<Loan> {
        self.ctx
            .store
            .loan(id)
            .await?
            .ok_or_else(|| BankError::not_found(format!("loan {}", id)))
    }

    /// Files a loan application for the actor.
    pub async fn apply(
        &self,
        actor: &Actor,
        amount: Decimal,
        monthly_income: Decimal,
        reason: &str,
    ) -> Result<Loan> {
        authorize(actor, Operation::ApplyLoan)?;
        let policy = &self.ctx.config.loan;
        let amount = policy.check(amount, monthly_income)?;

        let store = &self.ctx.store;
        if store.pending_loan_for(actor.user).await?.is_some() {
            return Err(BankError::DuplicatePending(actor.user));
        }
        let account = store
            .account_for_owner(actor.user)
            .await?
            .ok_or_else(|| BankError::not_found(format!("account for user {}", actor.user)))?;

        let loan = Loan::new(
            LoanApplication {
                borrower: actor.user,
                account: account.id,
                amount,
                monthly_income,
                reason: reason.trim().to_string(),
                terms: policy.terms(),
            },
            self.ctx.clock.now(),
        )?;
        store.commit(UnitOfWork::new().open_loan(loan.clone())).await?;
        Ok(loan)
    }

    /// Approves a pending loan and disburses the principal to the borrower.
    pub async fn approve(&self, actor: &Actor, id: LoanId) -> Result<Loan> {
        authorize(actor, Operation::ApproveLoan)?;
        let approver = self.ctx.profile(actor.user).await?;
        let approver = &approver;
        self.ctx
            .with_retries(move || self.try_approve(approver, id))
            .await
    }

    async fn try_approve(&self, approver: &UserProfile, id: LoanId) -> Result<Loan> {
        let mut loan = self.load(id).await?;
        let borrower = self.ctx.profile(loan.borrower).await?;
        let mut account = self
            .ctx
            .store
            .account(loan.account)
            .await?
            .ok_or_else(|| BankError::not_found(format!("account {}", loan.account)))?;

        let now = self.ctx.clock.now();
        loan.disburse(approver.id, now)?;
        account.credit(loan.amount, now);
        account.transactions_volume += loan.amount;

        let mut entry = self.ledger.draft(
            EntryKind::LoanDisbursement,
            Party::bank(approver.id, &approver.name),
            Some(Party::account_holder(borrower.id, account.id, &borrower.name)),
            loan.amount,
            format!("Loan disbursement for loan {}", loan.id),
        );
        entry.complete(now)?;

        let work = UnitOfWork::new()
            .update_loan(loan.clone())
            .update_account(account)
            .append(entry);
        self.ctx.store.commit(work).await?;
        loan.version += 1;
        Ok(loan)
    }

    /// Rejects a pending loan. Balances and the ledger are untouched.
    pub async fn reject(&self, actor: &Actor, id: LoanId, reason: Option<&str>) -> Result<Loan> {
        authorize(actor, Operation::RejectLoan)?;
        self.ctx
            .with_retries(move || async move {
                let mut loan = self.load(id).await?;
                loan.reject(reason, self.ctx.clock.now())?;
                self.ctx
                    .store
                    .commit(UnitOfWork::new().update_loan(loan.clone()))
                    .await?;
                loan.version += 1;
                Ok(loan)
            })
            .await
    }

    /// Repays part or all of a disbursed loan from the borrower's account.
    /// Anything above the remaining principal is not taken.
    pub async fn pay(&self, actor: &Actor, id: LoanId, amount: Decimal) -> Result<Loan> {
        let amount = Amount::new(amount)?;
        let payer = self.ctx.profile(actor.user).await?;
        let payer = &payer;
        self.ctx
            .with_retries(move || self.try_pay(actor, payer, id, amount))
            .await
    }

    async fn try_pay(
        &self,
        actor: &Actor,
        payer: &UserProfile,
        id: LoanId,
        amount: Amount,
    ) -> Result<Loan> {
        let mut loan = self.load(id).await?;
        authorize(actor, Operation::PayLoan { borrower: loan.borrower })?;
        let mut account = self
            .ctx
            .store
            .account(loan.account)
            .await?
            .ok_or_else(|| BankError::not_found(format!("account {}", loan.account)))?;

        let now = self.ctx.clock.now();
        let applied = loan.repay(amount, now)?;
        account.debit(applied, now)?;

        let mut entry = self.ledger.draft(
            EntryKind::LoanPayment,
            Party::account_holder(payer.id, account.id, &payer.name),
            None,
            applied,
            format!("Loan payment for loan {}", loan.id),
        );
        entry.complete(now)?;

        let work = UnitOfWork::new()
            .update_loan(loan.clone())
            .update_account(account)
            .append(entry);
        self.ctx.store.commit(work).await?;
        loan.version += 1;
        Ok(loan)
    }

    /// A loan, visible to its borrower and to admins.
    pub async fn loan(&self, actor: &Actor, id: LoanId) -> Result<Loan> {
        let loan = self.load(id).await?;
        authorize(actor, Operation::ViewLoan { borrower: loan.borrower })?;
        Ok(loan)
    }

    /// The actor's loans, newest first.
    pub async fn loans_for(&self, actor: &Actor) -> Result<Vec<Loan>> {
        self.ctx.store.loans_for(actor.user).await
    }

    /// The borrower's pending application, if any.
    pub async fn pending_for(&self, actor: &Actor, borrower: UserId) -> Result<Option<Loan>> {
        authorize(actor, Operation::ViewLoan { borrower })?;
        self.ctx.store.pending_loan_for(borrower).await
    }
}

#[cfg(test)]
mod tests {
    use crate::application::bank::Bank;
    use crate::config::BankConfig;
    use crate::domain::actor::Role;
    use crate::domain::ledger::EntryKind;
    use crate::domain::loan::{DEFAULT_REJECTION_REASON, LoanStatus};
    use crate::error::BankError;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_apply_validates_policy() {
        let bank = Bank::in_memory(BankConfig::default());
        let (ada, _) = bank.register("Ada", "ada@example.com", Role::Customer).await.unwrap();
        let actor = ada.actor();

        let cases = [
            (dec!(999), dec!(3000)),
            (dec!(1000001), dec!(3000)),
            (dec!(2000), dec!(999)),
        ];
        for (amount, income) in cases {
            let result = bank.loans.apply(&actor, amount, income, "car").await;
            assert!(matches!(result, Err(BankError::InvalidAmount(_))));
        }
    }

    #[tokio::test]
    async fn test_second_pending_application_is_rejected() {
        let bank = Bank::in_memory(BankConfig::default());
        let (ada, _) = bank.register("Ada", "ada@example.com", Role::Customer).await.unwrap();
        let actor = ada.actor();

        let loan = bank.loans.apply(&actor, dec!(2000), dec!(3000), "car").await.unwrap();
        assert_eq!(loan.status, LoanStatus::Pending);
        assert_eq!(loan.monthly_payment.value(), dec!(175.83));
        assert_eq!(loan.remaining.value(), dec!(2000.00));

        let again = bank.loans.apply(&actor, dec!(3000), dec!(3000), "boat").await;
        assert!(matches!(again, Err(BankError::DuplicatePending(user)) if user == ada.id));
    }

    #[tokio::test]
    async fn test_reject_uses_default_reason() {
        let bank = Bank::in_memory(BankConfig::default());
        let (ada, _) = bank.register("Ada", "ada@example.com", Role::Customer).await.unwrap();
        let (ops, _) = bank.register("Ops", "ops@example.com", Role::Admin).await.unwrap();
        let loan = bank.loans.apply(&ada.actor(), dec!(2000), dec!(3000), "car").await.unwrap();

        let rejected = bank.loans.reject(&ops.actor(), loan.id, Some("  ")).await.unwrap();
        assert_eq!(rejected.status, LoanStatus::Rejected);
        assert_eq!(rejected.rejection_reason.as_deref(), Some(DEFAULT_REJECTION_REASON));
        assert!(rejected.approved_at.is_some());

        let account = bank.accounts.account(&ada.actor()).await.unwrap();
        assert_eq!(account.balance.value(), dec!(5000.00));
    }

    #[tokio::test]
    async fn test_customers_cannot_approve() {
        let bank = Bank::in_memory(BankConfig::default());
        let (ada, _) = bank.register("Ada", "ada@example.com", Role::Customer).await.unwrap();
        let loan = bank.loans.apply(&ada.actor(), dec!(2000), dec!(3000), "car").await.unwrap();

        let result = bank.loans.approve(&ada.actor(), loan.id).await;
        assert!(matches!(result, Err(BankError::Unauthorized(_))));
        let result = bank.loans.reject(&ada.actor(), loan.id, None).await;
        assert!(matches!(result, Err(BankError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_only_borrower_pays() {
        let bank = Bank::in_memory(BankConfig::default());
        let (ada, _) = bank.register("Ada", "ada@example.com", Role::Customer).await.unwrap();
        let (bob, _) = bank.register("Bob", "bob@example.com", Role::Customer).await.unwrap();
        let (ops, _) = bank.register("Ops", "ops@example.com", Role::Admin).await.unwrap();
        let loan = bank.loans.apply(&ada.actor(), dec!(2000), dec!(3000), "car").await.unwrap();
        bank.loans.approve(&ops.actor(), loan.id).await.unwrap();

        let result = bank.loans.pay(&bob.actor(), loan.id, dec!(100)).await;
        assert!(matches!(result, Err(BankError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_pay_checks_borrower_before_status() {
        let bank = Bank::in_memory(BankConfig::default());
        let (ada, _) = bank.register("Ada", "ada@example.com", Role::Customer).await.unwrap();
        let (bob, _) = bank.register("Bob", "bob@example.com", Role::Customer).await.unwrap();
        let loan = bank.loans.apply(&ada.actor(), dec!(2000), dec!(3000), "car").await.unwrap();

        let result = bank.loans.pay(&bob.actor(), loan.id, dec!(100)).await;
        assert!(matches!(result, Err(BankError::Unauthorized(_))));
        let result = bank.loans.pay(&ada.actor(), loan.id, dec!(100)).await;
        assert!(matches!(
            result,
            Err(BankError::InvalidTransition { from: LoanStatus::Pending, .. })
        ));
    }

    #[tokio::test]
    async fn test_overpayment_closes_loan_and_debits_remaining() {
        let bank = Bank::in_memory(BankConfig::default());
        let (ada, _) = bank.register("Ada", "ada@example.com", Role::Customer).await.unwrap();
        let (ops, _) = bank.register("Ops", "ops@example.com", Role::Admin).await.unwrap();
        let loan = bank.loans.apply(&ada.actor(), dec!(2000), dec!(3000), "car").await.unwrap();
        bank.loans.approve(&ops.actor(), loan.id).await.unwrap();

        let paid = bank.loans.pay(&ada.actor(), loan.id, dec!(2500)).await.unwrap();
        assert_eq!(paid.status, LoanStatus::Closed);
        assert_eq!(paid.total_paid.value(), dec!(2000.00));
        assert!(paid.remaining.is_zero());
        assert!(paid.closed_at.is_some());

        let account = bank.accounts.account(&ada.actor()).await.unwrap();
        assert_eq!(account.balance.value(), dec!(5000.00));
        let statement = bank.accounts.statement(&ada.actor(), None, None).await.unwrap();
        let payment = statement
            .entries
            .iter()
            .find(|e| e.kind == EntryKind::LoanPayment)
            .unwrap();
        assert_eq!(payment.amount.value(), dec!(2000.00));
    }

    #[tokio::test]
    async fn test_long_expensive_terms_are_priced() {
        let mut config = BankConfig::default();
        config.loan.annual_rate_percent = dec!(100);
        config.loan.term_months = 700;
        let bank = Bank::in_memory(config);
        let (ada, _) = bank.register("Ada", "ada@example.com", Role::Customer).await.unwrap();

        let loan = bank.loans.apply(&ada.actor(), dec!(1000000), dec!(5000), "x").await.unwrap();
        assert_eq!(loan.monthly_payment.value(), dec!(83333.33));
    }
}
