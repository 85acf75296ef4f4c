//! Self-rearming on top of the host's one-shot deferred calls.
//!
//! The vault registers calls against itself; when one becomes due a relayer
//! asks the vault to execute it, and the vault claims the call from the host
//! before running the tick it names.

use soroban_sdk::{contracttype, Bytes, Env, String, Symbol};

use crate::clock::{self, PERIOD_LENGTH_MS};
use crate::error::VaultError;
use crate::events::{ScheduleEvent, SCHEDULE};
use crate::interfaces::{DeferredCall, SchedulerHostClient, Slot};
use crate::storage;

const DAY_MS: u64 = 86_400_000;

#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum Frequency {
    Daily = 0,
    Weekly = 1,
    Biweekly = 2,
    Monthly = 3,
}

impl Frequency {
    /// Unrecognised codes fall back to daily.
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => Frequency::Weekly,
            2 => Frequency::Biweekly,
            3 => Frequency::Monthly,
            _ => Frequency::Daily,
        }
    }

    pub fn interval_ms(self) -> u64 {
        match self {
            Frequency::Daily => DAY_MS,
            Frequency::Weekly => 7 * DAY_MS,
            Frequency::Biweekly => 14 * DAY_MS,
            // flat 30 days
            Frequency::Monthly => 30 * DAY_MS,
        }
    }
}

pub fn next_occurrence(frequency: Frequency, from_ms: u64) -> u64 {
    from_ms.saturating_add(frequency.interval_ms())
}

/// Map an absolute time onto a host slot. Rounds down, so a call may become
/// executable up to one period before `target_ms`.
pub fn compute_slot(env: &Env, target_ms: u64) -> Slot {
    let ahead = target_ms.saturating_sub(clock::now_ms(env));
    Slot {
        period: clock::current_period(env) + ahead / PERIOD_LENGTH_MS,
        thread: clock::current_thread(env),
    }
}

fn host(env: &Env) -> Result<SchedulerHostClient<'_>, VaultError> {
    let config = storage::load_config(env)?;
    Ok(SchedulerHostClient::new(env, &config.scheduler_host))
}

/// Register a deferred call of `entry_point` on this vault at `target_ms`.
pub fn arm(
    env: &Env,
    entry_point: &Symbol,
    payload: Bytes,
    target_ms: u64,
    gas_limit: u64,
    coins: i128,
) -> Result<String, VaultError> {
    let now = clock::now_ms(env);
    if target_ms <= now {
        env.events().publish(
            (SCHEDULE, ScheduleEvent::Rejected),
            (entry_point.clone(), target_ms, now),
        );
        return Err(VaultError::InvalidConfig);
    }

    let slot = compute_slot(env, target_ms);
    let host = host(env)?;
    let handle = match host.try_register(
        &env.current_contract_address(),
        entry_point,
        &slot,
        &gas_limit,
        &payload,
        &coins,
    ) {
        Ok(Ok(handle)) => handle,
        _ => {
            env.events().publish(
                (SCHEDULE, ScheduleEvent::Rejected),
                (entry_point.clone(), target_ms, now),
            );
            return Err(VaultError::InvalidConfig);
        }
    };

    env.events().publish(
        (SCHEDULE, ScheduleEvent::Armed),
        (handle.clone(), entry_point.clone(), target_ms, slot.period),
    );
    Ok(handle)
}

/// Cancel a pending call. Fails with `ScheduleNotFound` when it already
/// fired or was cancelled.
pub fn disarm(env: &Env, handle: &String) -> Result<(), VaultError> {
    let host = host(env)?;
    match host.try_cancel(&env.current_contract_address(), handle) {
        Ok(Ok(())) => {
            env.events()
                .publish((SCHEDULE, ScheduleEvent::Cancelled), handle.clone());
            Ok(())
        }
        _ => {
            env.events()
                .publish((SCHEDULE, ScheduleEvent::NotFound), handle.clone());
            Err(VaultError::ScheduleNotFound)
        }
    }
}

pub fn is_armed(env: &Env, handle: &String) -> Result<bool, VaultError> {
    Ok(host(env)?.exists(handle))
}

/// Claim a due call from the host. Anything the host refuses to hand over
/// to this vault is an unauthorized invocation.
pub fn claim(env: &Env, call_id: &String) -> Result<DeferredCall, VaultError> {
    let host = host(env)?;
    match host.try_consume(&env.current_contract_address(), call_id) {
        Ok(Ok(call)) => Ok(call),
        _ => Err(VaultError::UnauthorizedInvocation),
    }
}

pub fn assert_self_invoked(env: &Env, call: &DeferredCall) -> bool {
    call.origin == env.current_contract_address()
}
