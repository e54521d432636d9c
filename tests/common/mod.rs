#![allow(dead_code)]

use bankcore::application::bank::Bank;
use bankcore::config::BankConfig;
use bankcore::domain::actor::{Role, UserProfile};
use bankcore::domain::ports::Clock;
use bankcore::infrastructure::in_memory::{InMemoryDirectory, InMemoryStore};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};

/// A clock that starts at a fixed instant and moves one second per reading.
pub struct StepClock {
    now: Mutex<DateTime<Utc>>,
}

impl StepClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()),
        }
    }
}

impl Clock for StepClock {
    fn now(&self) -> DateTime<Utc> {
        let mut now = self.now.lock().unwrap();
        *now += Duration::seconds(1);
        *now
    }
}

pub fn bank() -> Bank {
    Bank::in_memory(BankConfig::default())
}

pub fn stepped_bank() -> Bank {
    Bank::with_clock(
        Arc::new(InMemoryStore::new()),
        Arc::new(InMemoryDirectory::new()),
        Arc::new(StepClock::new()),
        BankConfig::default(),
    )
}

pub async fn customer(bank: &Bank, name: &str) -> UserProfile {
    let email = format!("{}@example.com", name.to_lowercase());
    bank.register(name, &email, Role::Customer).await.unwrap().0
}

pub async fn admin(bank: &Bank) -> UserProfile {
    bank.register("Ops", "ops@example.com", Role::Admin)
        .await
        .unwrap()
        .0
}

pub async fn balance(bank: &Bank, user: &UserProfile) -> Decimal {
    bank.accounts
        .account(&user.actor())
        .await
        .unwrap()
        .balance
        .value()
}
