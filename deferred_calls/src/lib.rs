#![no_std]
use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, symbol_short, Address, Bytes, Env,
    String, Symbol, Vec,
};

// Storage TTL constants for active data
const INSTANCE_LIFETIME_THRESHOLD: u32 = 17280; // ~1 day
const INSTANCE_BUMP_AMOUNT: u32 = 518400; // ~30 days

// Pending calls can sit for a full monthly interval before they fire
const CALL_LIFETIME_THRESHOLD: u32 = 17280;
const CALL_BUMP_AMOUNT: u32 = 2592000;

/// Number of execution threads per period on the host.
pub const THREAD_COUNT: u32 = 32;

/// Wall-clock length of one period. Periods follow the ledger timestamp, not
/// the ledger sequence.
pub const PERIOD_LENGTH_MS: u64 = 16_000;

/// Host coordinate at which a deferred call becomes executable.
#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Slot {
    pub period: u64,
    pub thread: u32,
}

/// A one-shot call registered by a contract against itself.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeferredCall {
    pub id: String,
    pub origin: Address,
    pub function: Symbol,
    pub slot: Slot,
    pub max_gas: u64,
    pub payload: Bytes,
    pub coins: i128,
    pub registered_at: u64,
}

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum DeferredCallError {
    CallNotFound = 1,
    NotOriginator = 2,
    NotDue = 3,
    SlotInPast = 4,
    InvalidThread = 5,
    InvalidGas = 6,
}

/// Events emitted by the host for every call transition
#[contracttype]
#[derive(Clone)]
pub enum CallEvent {
    Registered,
    Cancelled,
    Consumed,
}

#[contracttype]
#[derive(Clone)]
enum DataKey {
    Call(String),
}

#[contract]
pub struct DeferredCalls;

#[contractimpl]
impl DeferredCalls {
    const STORAGE_NEXT_SEQ: Symbol = symbol_short!("NEXT_SEQ");
    const STORAGE_PENDING: Symbol = symbol_short!("PENDING");

    /// Register a one-shot call that `origin` will execute against itself
    /// once the ledger clock reaches `slot`.
    ///
    /// # Arguments
    /// * `origin` - Contract scheduling the call (must authorize)
    /// * `function` - Entry point the origin dispatches to when the call fires
    /// * `slot` - Earliest (period, thread) at which the call may execute
    /// * `max_gas` - Execution budget reserved for the call (must be positive)
    /// * `payload` - Opaque bytes handed back to the origin
    /// * `coins` - Coins attached to the call
    ///
    /// # Returns
    /// The opaque call identifier
    ///
    /// # Errors
    /// * `SlotInPast` - If the slot period is behind the current period
    /// * `InvalidThread` - If the thread is outside `0..THREAD_COUNT`
    /// * `InvalidGas` - If `max_gas` is zero
    pub fn register(
        env: Env,
        origin: Address,
        function: Symbol,
        slot: Slot,
        max_gas: u64,
        payload: Bytes,
        coins: i128,
    ) -> Result<String, DeferredCallError> {
        origin.require_auth();

        if slot.thread >= THREAD_COUNT {
            return Err(DeferredCallError::InvalidThread);
        }
        if slot.period < Self::period_now(&env) {
            return Err(DeferredCallError::SlotInPast);
        }
        if max_gas == 0 {
            return Err(DeferredCallError::InvalidGas);
        }

        Self::extend_instance_ttl(&env);

        let seq = env
            .storage()
            .instance()
            .get(&Self::STORAGE_NEXT_SEQ)
            .unwrap_or(0u64)
            + 1;
        let id = Self::format_call_id(&env, seq);

        let call = DeferredCall {
            id: id.clone(),
            origin: origin.clone(),
            function: function.clone(),
            slot,
            max_gas,
            payload,
            coins,
            registered_at: env.ledger().timestamp(),
        };

        let key = DataKey::Call(id.clone());
        env.storage().persistent().set(&key, &call);
        env.storage()
            .persistent()
            .extend_ttl(&key, CALL_LIFETIME_THRESHOLD, CALL_BUMP_AMOUNT);

        let mut pending = Self::load_pending(&env);
        pending.push_back(id.clone());
        env.storage()
            .instance()
            .set(&Self::STORAGE_PENDING, &pending);
        env.storage()
            .instance()
            .set(&Self::STORAGE_NEXT_SEQ, &seq);

        env.events().publish(
            (symbol_short!("deferred"), CallEvent::Registered),
            (id.clone(), origin, function, slot.period),
        );

        Ok(id)
    }

    /// Cancel a pending call.
    ///
    /// # Errors
    /// * `CallNotFound` - If the call already fired or was already cancelled
    /// * `NotOriginator` - If `origin` did not register the call
    pub fn cancel(env: Env, origin: Address, id: String) -> Result<(), DeferredCallError> {
        origin.require_auth();
        Self::extend_instance_ttl(&env);

        let call = Self::load_call(&env, &id)?;
        if call.origin != origin {
            return Err(DeferredCallError::NotOriginator);
        }

        Self::remove_call(&env, &id);

        env.events().publish(
            (symbol_short!("deferred"), CallEvent::Cancelled),
            (id, origin),
        );

        Ok(())
    }

    /// Claim a due call for execution. The call is removed, so a call can be
    /// claimed at most once.
    ///
    /// # Errors
    /// * `CallNotFound` - If no such call is pending
    /// * `NotOriginator` - If `executor` is not the contract that registered it
    /// * `NotDue` - If the ledger clock has not reached the call's slot
    pub fn consume(
        env: Env,
        executor: Address,
        id: String,
    ) -> Result<DeferredCall, DeferredCallError> {
        executor.require_auth();
        Self::extend_instance_ttl(&env);

        let call = Self::load_call(&env, &id)?;
        if call.origin != executor {
            return Err(DeferredCallError::NotOriginator);
        }
        if !Self::is_due(&env, &call.slot) {
            return Err(DeferredCallError::NotDue);
        }

        Self::remove_call(&env, &id);

        env.events().publish(
            (symbol_short!("deferred"), CallEvent::Consumed),
            (id, executor),
        );

        Ok(call)
    }

    pub fn exists(env: Env, id: String) -> bool {
        env.storage().persistent().has(&DataKey::Call(id))
    }

    pub fn get_call(env: Env, id: String) -> Option<DeferredCall> {
        env.storage().persistent().get(&DataKey::Call(id))
    }

    /// Calls whose slot has been reached, in registration order. Relayers
    /// poll this to trigger `execute_deferred` on the originating contracts.
    pub fn due_calls(env: Env) -> Vec<DeferredCall> {
        let mut due = Vec::new(&env);
        for id in Self::load_pending(&env).iter() {
            if let Some(call) = env
                .storage()
                .persistent()
                .get::<_, DeferredCall>(&DataKey::Call(id))
            {
                if Self::is_due(&env, &call.slot) {
                    due.push_back(call);
                }
            }
        }
        due
    }

    pub fn pending_count(env: Env) -> u32 {
        Self::load_pending(&env).len()
    }

    /// Period the ledger clock is in now.
    pub fn current_period(env: Env) -> u64 {
        Self::period_now(&env)
    }

    fn period_now(env: &Env) -> u64 {
        env.ledger().timestamp().saturating_mul(1000) / PERIOD_LENGTH_MS
    }

    fn is_due(env: &Env, slot: &Slot) -> bool {
        Self::period_now(env) >= slot.period
    }

    fn load_call(env: &Env, id: &String) -> Result<DeferredCall, DeferredCallError> {
        env.storage()
            .persistent()
            .get(&DataKey::Call(id.clone()))
            .ok_or(DeferredCallError::CallNotFound)
    }

    fn load_pending(env: &Env) -> Vec<String> {
        env.storage()
            .instance()
            .get(&Self::STORAGE_PENDING)
            .unwrap_or_else(|| Vec::new(env))
    }

    fn remove_call(env: &Env, id: &String) {
        env.storage().persistent().remove(&DataKey::Call(id.clone()));

        let mut pending = Self::load_pending(env);
        if let Some(index) = pending.first_index_of(id.clone()) {
            pending.remove(index);
            env.storage()
                .instance()
                .set(&Self::STORAGE_PENDING, &pending);
        }
    }

    /// Render `D<seq>` without an allocator.
    fn format_call_id(env: &Env, seq: u64) -> String {
        let mut digits = [0u8; 20];
        let mut len = 0;
        let mut n = seq;
        loop {
            digits[len] = b'0' + (n % 10) as u8;
            n /= 10;
            len += 1;
            if n == 0 {
                break;
            }
        }

        let mut buf = [0u8; 21];
        buf[0] = b'D';
        for i in 0..len {
            buf[1 + i] = digits[len - 1 - i];
        }

        let text = core::str::from_utf8(&buf[..len + 1]).unwrap_or("D");
        String::from_str(env, text)
    }

    fn extend_instance_ttl(env: &Env) {
        env.storage()
            .instance()
            .extend_ttl(INSTANCE_LIFETIME_THRESHOLD, INSTANCE_BUMP_AMOUNT);
    }
}

#[cfg(test)]
mod test;
