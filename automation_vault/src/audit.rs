use soroban_sdk::{contracttype, Address, Env, Symbol, Vec};

use crate::storage::STORAGE_AUDIT;

const MAX_AUDIT_ENTRIES: u32 = 100;

/// Audit log entry for security and compliance.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AuditEntry {
    pub operation: Symbol,
    pub caller: Address,
    pub timestamp: u64,
    pub success: bool,
}

pub fn append(env: &Env, operation: Symbol, caller: &Address, success: bool) {
    let timestamp = env.ledger().timestamp();
    let mut log = entries(env);
    if log.len() >= MAX_AUDIT_ENTRIES {
        log.pop_front();
    }
    log.push_back(AuditEntry {
        operation,
        caller: caller.clone(),
        timestamp,
        success,
    });
    env.storage().instance().set(&STORAGE_AUDIT, &log);
}

pub fn entries(env: &Env) -> Vec<AuditEntry> {
    env.storage()
        .instance()
        .get(&STORAGE_AUDIT)
        .unwrap_or_else(|| Vec::new(env))
}
