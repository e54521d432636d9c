use crate::error::{BankError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// A banking command in a replay script.
#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum ScriptOp {
    /// Registers a customer: `actor` is the email, `target` the display name.
    Register,
    /// Registers an admin, same columns as `register`.
    Admin,
    Transfer,
    Apply,
    Approve,
    Reject,
    Pay,
    Deposit,
    Withdraw,
}

/// One row of a replay script.
///
/// `actor` is the email of the user performing the operation. The remaining
/// columns are read according to `op`; empty cells deserialize to `None`.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct ScriptRow {
    pub op: ScriptOp,
    pub actor: String,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub income: Option<Decimal>,
    #[serde(default)]
    pub memo: Option<String>,
}

impl ScriptRow {
    pub fn target(&self) -> Result<&str> {
        self.target
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| BankError::not_found(format!("target of {:?} row", self.op)))
    }

    pub fn amount(&self) -> Result<Decimal> {
        self.amount
            .ok_or_else(|| BankError::InvalidAmount(format!("{:?} requires an amount", self.op)))
    }

    pub fn memo(&self) -> &str {
        self.memo.as_deref().unwrap_or_default()
    }
}

/// Reads script rows from a CSV source.
///
/// Wraps `csv::Reader`, trimming whitespace and accepting rows that leave
/// trailing columns out.
pub struct ScriptReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> ScriptReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily reads and deserializes rows.
    pub fn rows(self) -> impl Iterator<Item = Result<ScriptRow>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(BankError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reader_valid_stream() {
        let data = "op, actor, target, amount, income, memo\n\
                    register, ada@example.com, Ada\n\
                    apply, ada@example.com, , 2000, 3000, car\n\
                    transfer, ada@example.com, bob@example.com, 12.50, , rent";
        let rows: Vec<Result<ScriptRow>> = ScriptReader::new(data.as_bytes()).rows().collect();

        assert_eq!(rows.len(), 3);
        let register = rows[0].as_ref().unwrap();
        assert_eq!(register.op, ScriptOp::Register);
        assert_eq!(register.target.as_deref(), Some("Ada"));
        assert_eq!(register.amount, None);

        let apply = rows[1].as_ref().unwrap();
        assert_eq!(apply.target, None);
        assert_eq!(apply.income, Some(dec!(3000)));
        assert_eq!(apply.memo(), "car");

        let transfer = rows[2].as_ref().unwrap();
        assert_eq!(transfer.amount().unwrap(), dec!(12.50));
    }

    #[test]
    fn test_reader_malformed_line() {
        let data = "op, actor, target, amount\n\
                    refund, ada@example.com, , 1.0\n\
                    pay, ada@example.com, , abc";
        let rows: Vec<Result<ScriptRow>> = ScriptReader::new(data.as_bytes()).rows().collect();

        assert!(matches!(rows[0], Err(BankError::CsvError(_))));
        assert!(rows[1].is_err());
    }
}
