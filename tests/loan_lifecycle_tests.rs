mod common;

use bankcore::domain::ledger::{EntryKind, LedgerFilter};
use bankcore::domain::loan::LoanStatus;
use bankcore::error::BankError;
use common::{admin, balance, bank, customer};
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_apply_approve_repay_closes_loan() {
    let bank = bank();
    let ada = customer(&bank, "Ada").await;
    let ops = admin(&bank).await;

    let loan = bank
        .loans
        .apply(&ada.actor(), dec!(2000), dec!(3000), "new roof")
        .await
        .unwrap();
    assert_eq!(loan.status, LoanStatus::Pending);
    assert_eq!(loan.monthly_payment.value(), dec!(175.83));
    assert_eq!(balance(&bank, &ada).await, dec!(5000.00));

    let loan = bank.loans.approve(&ops.actor(), loan.id).await.unwrap();
    assert_eq!(loan.status, LoanStatus::Disbursed);
    assert_eq!(loan.approved_by, Some(ops.id));
    assert!(loan.disbursed_at.is_some());
    assert_eq!(balance(&bank, &ada).await, dec!(7000.00));

    let disbursements = LedgerFilter::participant(ada.id).with_kind(EntryKind::LoanDisbursement);
    let page = bank.ledger.query(&disbursements, Default::default()).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].amount.value(), dec!(2000.00));
    assert!(page.items[0].reference.starts_with("LOAN"));

    let loan = bank.loans.pay(&ada.actor(), loan.id, dec!(2000)).await.unwrap();
    assert_eq!(loan.status, LoanStatus::Closed);
    assert!(loan.remaining.is_zero());
    assert_eq!(loan.total_paid.value(), dec!(2000.00));
    assert!(loan.closed_at.is_some());
    assert_eq!(balance(&bank, &ada).await, dec!(5000.00));

    let payments = LedgerFilter::participant(ada.id).with_kind(EntryKind::LoanPayment);
    let page = bank.ledger.query(&payments, Default::default()).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].amount.value(), dec!(2000.00));
    assert!(page.items[0].receiver.is_none());

    let again = bank.loans.pay(&ada.actor(), loan.id, dec!(1)).await;
    assert!(matches!(
        again,
        Err(BankError::InvalidTransition { from: LoanStatus::Closed, .. })
    ));
}

#[tokio::test]
async fn test_partial_payments_track_remaining() {
    let bank = bank();
    let ada = customer(&bank, "Ada").await;
    let ops = admin(&bank).await;
    let loan = bank.loans.apply(&ada.actor(), dec!(3000), dec!(4000), "car").await.unwrap();
    bank.loans.approve(&ops.actor(), loan.id).await.unwrap();

    let loan = bank.loans.pay(&ada.actor(), loan.id, dec!(1000.50)).await.unwrap();
    assert_eq!(loan.status, LoanStatus::Disbursed);
    assert_eq!(loan.remaining.value(), dec!(1999.50));

    let loan = bank.loans.pay(&ada.actor(), loan.id, dec!(1999.50)).await.unwrap();
    assert_eq!(loan.status, LoanStatus::Closed);
    assert_eq!(balance(&bank, &ada).await, dec!(5000.00));
}

#[tokio::test]
async fn test_second_approval_is_invalid_and_changes_nothing() {
    let bank = bank();
    let ada = customer(&bank, "Ada").await;
    let ops = admin(&bank).await;
    let loan = bank.loans.apply(&ada.actor(), dec!(2000), dec!(3000), "car").await.unwrap();
    bank.loans.approve(&ops.actor(), loan.id).await.unwrap();

    let again = bank.loans.approve(&ops.actor(), loan.id).await;
    assert!(matches!(
        again,
        Err(BankError::InvalidTransition { from: LoanStatus::Disbursed, .. })
    ));
    assert_eq!(balance(&bank, &ada).await, dec!(7000.00));

    let disbursements = LedgerFilter::default().with_kind(EntryKind::LoanDisbursement);
    let page = bank.ledger.query(&disbursements, Default::default()).await.unwrap();
    assert_eq!(page.total, 1);
}

#[tokio::test]
async fn test_rejected_loan_never_touches_money() {
    let bank = bank();
    let ada = customer(&bank, "Ada").await;
    let ops = admin(&bank).await;
    let loan = bank.loans.apply(&ada.actor(), dec!(2000), dec!(3000), "car").await.unwrap();

    let loan = bank
        .loans
        .reject(&ops.actor(), loan.id, Some("income too volatile"))
        .await
        .unwrap();
    assert_eq!(loan.status, LoanStatus::Rejected);
    assert_eq!(loan.rejection_reason.as_deref(), Some("income too volatile"));

    let approve = bank.loans.approve(&ops.actor(), loan.id).await;
    assert!(matches!(approve, Err(BankError::InvalidTransition { .. })));
    let pay = bank.loans.pay(&ada.actor(), loan.id, dec!(10)).await;
    assert!(matches!(pay, Err(BankError::InvalidTransition { .. })));

    assert_eq!(balance(&bank, &ada).await, dec!(5000.00));
    let page = bank
        .ledger
        .query(&LedgerFilter::participant(ada.id), Default::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1, "only the opening deposit");

    // A rejection frees the borrower to apply again.
    let retry = bank.loans.apply(&ada.actor(), dec!(1500), dec!(3000), "car").await;
    assert!(retry.is_ok());
}

#[tokio::test]
async fn test_payment_beyond_balance_is_insufficient() {
    let bank = bank();
    let ada = customer(&bank, "Ada").await;
    let bob = customer(&bank, "Bob").await;
    let ops = admin(&bank).await;
    let loan = bank.loans.apply(&ada.actor(), dec!(6000), dec!(3000), "car").await.unwrap();
    bank.loans.approve(&ops.actor(), loan.id).await.unwrap();
    bank.transfers
        .transfer(&ada.actor(), &bob.email, dec!(10000), "")
        .await
        .unwrap();

    let result = bank.loans.pay(&ada.actor(), loan.id, dec!(1500)).await;
    assert!(matches!(result, Err(BankError::InsufficientBalance { .. })));

    let loan = bank.loans.loan(&ada.actor(), loan.id).await.unwrap();
    assert_eq!(loan.remaining.value(), dec!(6000.00));
    assert_eq!(balance(&bank, &ada).await, dec!(1000.00));
}

#[tokio::test]
async fn test_loan_reads_are_restricted() {
    let bank = bank();
    let ada = customer(&bank, "Ada").await;
    let bob = customer(&bank, "Bob").await;
    let ops = admin(&bank).await;
    let loan = bank.loans.apply(&ada.actor(), dec!(2000), dec!(3000), "car").await.unwrap();

    assert!(bank.loans.loan(&ops.actor(), loan.id).await.is_ok());
    let denied = bank.loans.loan(&bob.actor(), loan.id).await;
    assert!(matches!(denied, Err(BankError::Unauthorized(_))));

    let mine = bank.loans.loans_for(&ada.actor()).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert!(bank.loans.loans_for(&bob.actor()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_loan_is_not_found() {
    let bank = bank();
    let ops = admin(&bank).await;

    let result = bank
        .loans
        .approve(&ops.actor(), bankcore::domain::ids::LoanId::new())
        .await;
    assert!(matches!(result, Err(BankError::NotFound(_))));
}
