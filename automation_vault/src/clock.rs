//! Host clock readings in the units the scheduler works with.

use soroban_sdk::Env;

/// Length of one host period in milliseconds. Must match the host's.
pub const PERIOD_LENGTH_MS: u64 = 16_000;

/// Soroban closes one ledger at a time, so every slot lands on thread 0.
pub const CURRENT_THREAD: u32 = 0;

pub fn now_ms(env: &Env) -> u64 {
    env.ledger().timestamp().saturating_mul(1000)
}

/// Host period the ledger timestamp falls in.
pub fn current_period(env: &Env) -> u64 {
    now_ms(env) / PERIOD_LENGTH_MS
}

pub fn current_thread(_env: &Env) -> u32 {
    CURRENT_THREAD
}
