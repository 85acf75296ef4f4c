// Client traits for cross-contract calls

use soroban_sdk::{contractclient, contracttype, Address, Bytes, Env, String, Symbol, Vec};

#[contractclient(name = "SchedulerHostClient")]
pub trait SchedulerHost {
    fn register(
        env: Env,
        origin: Address,
        function: Symbol,
        slot: Slot,
        max_gas: u64,
        payload: Bytes,
        coins: i128,
    ) -> String;
    fn cancel(env: Env, origin: Address, id: String);
    fn exists(env: Env, id: String) -> bool;
    fn consume(env: Env, executor: Address, id: String) -> DeferredCall;
}

#[contractclient(name = "SwapRouterClient")]
pub trait SwapRouter {
    /// Swap `amount_in` of `path[0]` into the last token of `path`, pulling
    /// the input from `caller` through its allowance and paying the output
    /// back to `caller`.
    fn swap(env: Env, caller: Address, path: Vec<Address>, amount_in: i128, deadline: u64) -> i128;
}

// Data structures from the scheduler host (needed for client traits)

#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Slot {
    pub period: u64,
    pub thread: u32,
}

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
