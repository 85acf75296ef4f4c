//! Token weight table owned by the vault.

use soroban_sdk::{contracttype, Address, Env, Vec};

use crate::error::VaultError;
use crate::storage::STORAGE_ALLOC;

/// Share of each purchase routed into `token`, in whole percent.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Allocation {
    pub token: Address,
    pub weight: u32,
}

/// Weights must each be at most 100, sum to exactly 100, and name each
/// token once.
pub fn validate(allocations: &Vec<Allocation>) -> Result<(), VaultError> {
    if allocations.is_empty() {
        return Err(VaultError::InvalidAllocation);
    }

    let mut total: u64 = 0;
    for (i, entry) in allocations.iter().enumerate() {
        if entry.weight > 100 {
            return Err(VaultError::InvalidAllocation);
        }
        total += entry.weight as u64;

        for other in allocations.iter().skip(i + 1) {
            if other.token == entry.token {
                return Err(VaultError::InvalidAllocation);
            }
        }
    }

    if total != 100 {
        return Err(VaultError::InvalidAllocation);
    }
    Ok(())
}

pub fn set(env: &Env, allocations: &Vec<Allocation>) -> Result<(), VaultError> {
    validate(allocations)?;
    env.storage().instance().set(&STORAGE_ALLOC, allocations);
    Ok(())
}

pub fn get(env: &Env) -> Vec<Allocation> {
    env.storage()
        .instance()
        .get(&STORAGE_ALLOC)
        .unwrap_or_else(|| Vec::new(env))
}

/// Entries a purchase fans out to: nonzero weights other than the token
/// being spent.
pub fn purchase_legs(env: &Env, funding_token: &Address) -> Vec<Allocation> {
    let mut legs = Vec::new(env);
    for entry in get(env).iter() {
        if entry.weight > 0 && entry.token != *funding_token {
            legs.push_back(entry);
        }
    }
    legs
}

/// `floor(amount * weight / 100)` without overflowing on large amounts.
pub fn leg_amount(amount: i128, weight: u32) -> i128 {
    let weight = weight as i128;
    let quotient = amount / 100;
    let remainder = amount % 100;
    quotient * weight + (remainder * weight) / 100
}
