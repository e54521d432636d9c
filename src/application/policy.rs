use crate::domain::actor::Actor;
use crate::domain::ids::UserId;
use crate::domain::ledger::LedgerEntry;
use crate::error::{BankError, Result};

/// A request an actor makes against the bank, carrying whatever the
/// authorization rule needs to know about the target.
#[derive(Debug, Clone, Copy)]
pub enum Operation<'a> {
    Transfer,
    ApplyLoan,
    ApproveLoan,
    RejectLoan,
    PayLoan { borrower: UserId },
    ViewLoan { borrower: UserId },
    ViewAccount { owner: UserId },
    ViewEntry(&'a LedgerEntry),
    AdjustBalance,
}

/// The single authorization predicate evaluated at each operation's entry.
pub fn authorize(actor: &Actor, operation: Operation<'_>) -> Result<()> {
    let allowed = match operation {
        Operation::Transfer | Operation::ApplyLoan => true,
        Operation::ApproveLoan | Operation::RejectLoan | Operation::AdjustBalance => {
            actor.is_admin()
        }
        Operation::PayLoan { borrower } => actor.user == borrower,
        Operation::ViewLoan { borrower } => actor.user == borrower || actor.is_admin(),
        Operation::ViewAccount { owner } => actor.user == owner || actor.is_admin(),
        Operation::ViewEntry(entry) => entry.involves_user(actor.user) || actor.is_admin(),
    };

    if allowed {
        Ok(())
    } else {
        Err(BankError::Unauthorized(format!(
            "user {} may not {}",
            actor.user,
            describe(&operation)
        )))
    }
}

fn describe(operation: &Operation<'_>) -> &'static str {
    match operation {
        Operation::Transfer => "transfer funds",
        Operation::ApplyLoan => "apply for a loan",
        Operation::ApproveLoan => "approve loans",
        Operation::RejectLoan => "reject loans",
        Operation::PayLoan { .. } => "pay this loan",
        Operation::ViewLoan { .. } => "view this loan",
        Operation::ViewAccount { .. } => "view this account",
        Operation::ViewEntry(_) => "view this transaction",
        Operation::AdjustBalance => "adjust balances",
    }
}
