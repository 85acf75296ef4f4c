use soroban_sdk::{contracttype, symbol_short, Address, Env, Symbol};

use crate::error::VaultError;

// Storage TTL constants for active data
const INSTANCE_LIFETIME_THRESHOLD: u32 = 17280; // ~1 day
const INSTANCE_BUMP_AMOUNT: u32 = 518400; // ~30 days

pub const STORAGE_CONFIG: Symbol = symbol_short!("CONFIG");
pub const STORAGE_PAUSED: Symbol = symbol_short!("PAUSED");
pub const STORAGE_LOCKED: Symbol = symbol_short!("LOCKED");
pub const STORAGE_GAS: Symbol = symbol_short!("GAS");
pub const STORAGE_ALLOC: Symbol = symbol_short!("ALLOC");
pub const STORAGE_AUDIT: Symbol = symbol_short!("AUDIT");
pub const STORAGE_PURCHASE: Symbol = symbol_short!("JOB_DCA");
pub const STORAGE_DEPOSIT: Symbol = symbol_short!("JOB_DEP");
pub const STORAGE_SAVINGS: Symbol = symbol_short!("JOB_SAV");

/// Wiring fixed at initialization
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VaultConfig {
    pub owner: Address,
    /// Token the vault holds and spends from
    pub funding_token: Address,
    /// Contract providing one-shot deferred calls
    pub scheduler_host: Address,
    pub router: Address,
}

pub fn load_config(env: &Env) -> Result<VaultConfig, VaultError> {
    env.storage()
        .instance()
        .get(&STORAGE_CONFIG)
        .ok_or(VaultError::NotInitialized)
}

pub fn is_initialized(env: &Env) -> bool {
    env.storage().instance().has(&STORAGE_CONFIG)
}

pub fn save_config(env: &Env, config: &VaultConfig) {
    env.storage().instance().set(&STORAGE_CONFIG, config);
}

pub fn is_paused(env: &Env) -> bool {
    env.storage()
        .instance()
        .get(&STORAGE_PAUSED)
        .unwrap_or(false)
}

pub fn set_paused(env: &Env, paused: bool) {
    env.storage().instance().set(&STORAGE_PAUSED, &paused);
}

pub fn extend_instance_ttl(env: &Env) {
    env.storage()
        .instance()
        .extend_ttl(INSTANCE_LIFETIME_THRESHOLD, INSTANCE_BUMP_AMOUNT);
}
