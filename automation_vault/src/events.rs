//! Event kinds published by the vault.
//!
//! Every event is published under a `(namespace, kind)` topic pair, e.g.
//! `(symbol_short!("gas"), GasEvent::LowBudget)`.

use soroban_sdk::{contracttype, symbol_short, Symbol};

pub const GAS: Symbol = symbol_short!("gas");
pub const SCHEDULE: Symbol = symbol_short!("schedule");
pub const JOB: Symbol = symbol_short!("job");
pub const PURCHASE: Symbol = symbol_short!("dca");
pub const DEPOSIT: Symbol = symbol_short!("deposit");
pub const SAVINGS: Symbol = symbol_short!("savings");
pub const VAULT: Symbol = symbol_short!("vault");

#[contracttype]
#[derive(Clone)]
pub enum GasEvent {
    /// Data: new reserve total
    Deposited,
    /// Data: (amount, remaining reserve)
    Consumed,
    /// Data: (operation kind, required, available)
    LowBudget,
}

#[contracttype]
#[derive(Clone)]
pub enum ScheduleEvent {
    Armed,
    Cancelled,
    /// The requested time was not in the future
    Rejected,
    /// A pending handle had already fired or been cancelled
    NotFound,
    /// A call was released before its job's scheduled time
    Early,
}

#[contracttype]
#[derive(Clone)]
pub enum JobEvent {
    Started,
    Updated,
    Paused,
    Resumed,
    Completed,
    /// A due tick was skipped because the vault is globally paused
    Skipped,
}

#[contracttype]
#[derive(Clone)]
pub enum PurchaseEvent {
    Executed,
    LegSwapped,
    LegFailed,
    PartialFailure,
    /// Every leg failed, but too few to count as systemic
    Failed,
    CriticalFailure,
    InsufficientFunds,
    NoLegs,
}

#[contracttype]
#[derive(Clone)]
pub enum DepositEvent {
    Executed,
    ValidationFailed,
    TransferFailed,
    RetryScheduled,
    MaxRetriesReached,
}

#[contracttype]
#[derive(Clone)]
pub enum SavingsEvent {
    Accumulated,
    Distributed,
    DistributionSkipped,
    PhaseChanged,
}

#[contracttype]
#[derive(Clone)]
pub enum VaultEvent {
    Initialized,
    Deposited,
    Withdrawn,
    AllocationsSet,
    Paused,
    Unpaused,
}
