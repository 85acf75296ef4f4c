//! Execution budget reserve shared by every recurring job.
//!
//! The reserve is a unit-less counter: deposits add to it and every tick
//! reserves the fixed estimate for its operation kind before doing any work.

use soroban_sdk::{contracttype, Env};

use crate::error::VaultError;
use crate::events::{GasEvent, GAS};
use crate::storage::STORAGE_GAS;

pub const PURCHASE_COST: u64 = 500_000_000_000;
pub const DEPOSIT_COST: u64 = 200_000_000_000;
pub const STRATEGY_COST: u64 = 300_000_000_000;
pub const UNKNOWN_COST: u64 = 100_000_000_000;

#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum OperationKind {
    Purchase = 1,
    Deposit = 2,
    Strategy = 3,
    Unknown = 4,
}

pub fn estimate_cost(kind: OperationKind) -> u64 {
    match kind {
        OperationKind::Purchase => PURCHASE_COST,
        OperationKind::Deposit => DEPOSIT_COST,
        OperationKind::Strategy => STRATEGY_COST,
        OperationKind::Unknown => UNKNOWN_COST,
    }
}

pub fn reserve(env: &Env) -> u64 {
    env.storage().instance().get(&STORAGE_GAS).unwrap_or(0)
}

fn store(env: &Env, value: u64) {
    env.storage().instance().set(&STORAGE_GAS, &value);
}

/// Add `amount` to the reserve and return the new total.
pub fn deposit(env: &Env, amount: u64) -> Result<u64, VaultError> {
    let total = reserve(env)
        .checked_add(amount)
        .ok_or(VaultError::Overflow)?;
    store(env, total);

    env.events().publish((GAS, GasEvent::Deposited), total);
    Ok(total)
}

/// Take `amount` out of the reserve. Returns false and leaves the reserve
/// untouched when it holds less than `amount`.
pub fn consume(env: &Env, amount: u64) -> bool {
    let current = reserve(env);
    if current < amount {
        return false;
    }
    let remaining = current - amount;
    store(env, remaining);

    env.events()
        .publish((GAS, GasEvent::Consumed), (amount, remaining));
    true
}

/// Consume the estimate for `kind`, emitting a low-budget warning on failure.
pub fn reserve_for(env: &Env, kind: OperationKind) -> bool {
    let required = estimate_cost(kind);
    if consume(env, required) {
        return true;
    }

    env.events().publish(
        (GAS, GasEvent::LowBudget),
        (kind, required, reserve(env), VaultError::InsufficientGas as u32),
    );
    false
}

/// Reserve needed to cover `executions` runs of `kind`.
pub fn minimum_reserve(kind: OperationKind, executions: u64) -> Result<u64, VaultError> {
    estimate_cost(kind)
        .checked_mul(executions)
        .ok_or(VaultError::Overflow)
}

/// Gas limit attached to a deferred call: the configured limit, or the
/// operation estimate when none was configured.
pub fn call_limit(kind: OperationKind, configured: u64) -> u64 {
    if configured == 0 {
        estimate_cost(kind)
    } else {
        configured
    }
}
