//! Mutual-exclusion flag around state-mutating entry points.
//!
//! A failed invocation rolls back its storage writes, so the flag only needs
//! clearing on the success path.

use soroban_sdk::Env;

use crate::error::VaultError;
use crate::storage::STORAGE_LOCKED;

pub fn enter(env: &Env) -> Result<(), VaultError> {
    if is_locked(env) {
        return Err(VaultError::Reentrancy);
    }
    env.storage().instance().set(&STORAGE_LOCKED, &true);
    Ok(())
}

pub fn exit(env: &Env) {
    env.storage().instance().set(&STORAGE_LOCKED, &false);
}

pub fn is_locked(env: &Env) -> bool {
    env.storage()
        .instance()
        .get(&STORAGE_LOCKED)
        .unwrap_or(false)
}

/// Run `f` with the flag held.
pub fn guarded<T>(
    env: &Env,
    f: impl FnOnce() -> Result<T, VaultError>,
) -> Result<T, VaultError> {
    enter(env)?;
    let result = f();
    exit(env);
    result
}
