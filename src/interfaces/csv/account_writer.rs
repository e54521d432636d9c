use crate::domain::account::Account;
use crate::domain::actor::UserProfile;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct AccountRecord<'a> {
    owner: &'a str,
    balance: String,
    transactions: u64,
    volume: String,
    account: &'a str,
}

/// Writes the final account report as CSV.
pub struct AccountWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> AccountWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// Writes one row per account, labelled with the owner's email. Balances
    /// always carry two decimals.
    pub fn write_accounts<'a, I>(&mut self, accounts: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a UserProfile, &'a Account)>,
    {
        for (owner, account) in accounts {
            self.writer.serialize(AccountRecord {
                owner: &owner.email,
                balance: account.balance.to_string(),
                transactions: account.transactions_count,
                volume: account.transactions_volume.to_string(),
                account: &account.number,
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
