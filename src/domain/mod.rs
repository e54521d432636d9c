//! Domain model: value objects, entities and the ports the services depend on.

pub mod account;
pub mod actor;
pub mod ids;
pub mod ledger;
pub mod loan;
pub mod money;
pub mod ports;
pub mod unit_of_work;
