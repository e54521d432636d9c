use bankcore::application::bank::Bank;
use bankcore::config::BankConfig;
use bankcore::domain::ports::{DirectoryHandle, StoreHandle};
use bankcore::infrastructure::in_memory::{InMemoryDirectory, InMemoryStore};
#[cfg(feature = "storage-rocksdb")]
use bankcore::infrastructure::rocksdb::RocksDBStore;
use bankcore::interfaces::csv::account_writer::AccountWriter;
use bankcore::interfaces::csv::script_reader::ScriptReader;
use bankcore::interfaces::script::ScriptRunner;
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use rust_decimal::Decimal;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input script CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Annual loan interest rate in percent
    #[arg(long)]
    annual_rate: Option<Decimal>,

    /// Loan term in months
    #[arg(long)]
    term_months: Option<u32>,

    /// Balance of newly opened accounts
    #[arg(long)]
    opening_balance: Option<Decimal>,
}

impl Cli {
    fn bank_config(&self) -> bankcore::error::Result<BankConfig> {
        let mut config = match &self.config {
            Some(path) => BankConfig::from_file(path)?,
            None => BankConfig::default(),
        };
        if let Some(rate) = self.annual_rate {
            config.loan.annual_rate_percent = rate;
        }
        if let Some(months) = self.term_months {
            config.loan.term_months = months;
        }
        if let Some(balance) = self.opening_balance {
            config.opening_balance = balance;
        }
        config.validate()?;
        Ok(config)
    }
}

#[cfg(feature = "storage-rocksdb")]
fn storage(db_path: Option<PathBuf>) -> Result<(StoreHandle, DirectoryHandle)> {
    match db_path {
        Some(db_path) => {
            let store = RocksDBStore::open(db_path).into_diagnostic()?;
            let directory: DirectoryHandle = Arc::new(store.clone());
            let store: StoreHandle = Arc::new(store);
            Ok((store, directory))
        }
        None => Ok(in_memory()),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn storage(db_path: Option<PathBuf>) -> Result<(StoreHandle, DirectoryHandle)> {
    if db_path.is_some() {
        tracing::warn!(
            "persistent storage requested via --db-path, but the 'storage-rocksdb' feature \
             is not enabled; falling back to in-memory storage"
        );
    }
    Ok(in_memory())
}

fn in_memory() -> (StoreHandle, DirectoryHandle) {
    let store: StoreHandle = Arc::new(InMemoryStore::new());
    let directory: DirectoryHandle = Arc::new(InMemoryDirectory::new());
    (store, directory)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let config = cli.bank_config().into_diagnostic()?;
    let (store, directory) = storage(cli.db_path.clone())?;
    let runner = ScriptRunner::new(Bank::new(store, directory, config));

    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = ScriptReader::new(file);
    for (line, row) in reader.rows().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                tracing::warn!(row = line + 1, error = %e, "skipping unreadable row");
                continue;
            }
        };
        match runner.execute(&row).await {
            Ok(summary) => tracing::info!(row = line + 1, op = ?row.op, "{}", summary),
            Err(e) => {
                tracing::warn!(row = line + 1, op = ?row.op, error = %e, "operation failed")
            }
        }
    }

    let report = runner.report().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = AccountWriter::new(stdout.lock());
    writer
        .write_accounts(report.iter().map(|(owner, account)| (owner, account)))
        .into_diagnostic()?;

    Ok(())
}
