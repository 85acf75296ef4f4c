//! Periodic purchase (dollar-cost averaging) job.
//!
//! Every tick spends `purchase_amount` of the funding token, split across the
//! allocation table, one router swap per leg.

use soroban_sdk::{
    contracttype, symbol_short, token::TokenClient, vec, Address, Env, String, Symbol, Vec,
};

use crate::allocation::{self, Allocation};
use crate::clock;
use crate::error::VaultError;
use crate::events::{PurchaseEvent, PURCHASE};
use crate::gas::{self, OperationKind};
use crate::interfaces::SwapRouterClient;
use crate::job::{self, JobKind, JobLifecycle, PauseReason, RecurringJob, TickOutcome};
use crate::scheduler::Frequency;
use crate::storage::{self, STORAGE_PURCHASE};

pub const ENTRY_POINT: Symbol = symbol_short!("dca_tick");

/// Seconds a router swap stays valid after submission.
const SWAP_DEADLINE_SECS: u64 = 300;
/// Ledgers the router allowance for one leg stays live.
const APPROVAL_LEDGERS: u32 = 100;
/// A tick where nothing succeeded and more legs than this failed pauses
/// the job.
const SYSTEMIC_FAILURE_THRESHOLD: u32 = 2;

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PurchaseJobConfig {
    pub purchase_amount: i128,
    /// 0 daily, 1 weekly, 2 biweekly, 3 monthly
    pub frequency: u32,
    pub start_time: u64,
    pub end_time: u64,
    pub gas_per_execution: u64,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PurchaseJob {
    pub lifecycle: JobLifecycle,
    pub purchase_amount: i128,
    /// Ticks on which every leg swapped
    pub purchases_completed: u32,
}

impl RecurringJob for PurchaseJob {
    const KIND: JobKind = JobKind::Purchase;
    const ENTRY_POINT: Symbol = ENTRY_POINT;
    const OPERATION: OperationKind = OperationKind::Purchase;

    fn lifecycle(&self) -> &JobLifecycle {
        &self.lifecycle
    }

    fn lifecycle_mut(&mut self) -> &mut JobLifecycle {
        &mut self.lifecycle
    }

    fn load(env: &Env) -> Option<Self> {
        env.storage().instance().get(&STORAGE_PURCHASE)
    }

    fn save(&self, env: &Env) {
        env.storage().instance().set(&STORAGE_PURCHASE, self);
    }
}

pub fn start(env: &Env, config: PurchaseJobConfig) -> Result<PurchaseJob, VaultError> {
    if config.purchase_amount <= 0 {
        return Err(VaultError::InvalidAmount);
    }
    job::validate_window(env, config.start_time, config.end_time)?;
    job::ensure_not_active::<PurchaseJob>(env)?;

    let vault = storage::load_config(env)?;
    if allocation::purchase_legs(env, &vault.funding_token).is_empty() {
        return Err(VaultError::InvalidAllocation);
    }

    let job = PurchaseJob {
        lifecycle: JobLifecycle::new(
            Frequency::from_code(config.frequency),
            config.start_time,
            config.end_time,
            config.gas_per_execution,
        ),
        purchase_amount: config.purchase_amount,
        purchases_completed: 0,
    };
    job::start(env, job)
}

/// Change the parameters used from the next tick on.
pub fn update(
    env: &Env,
    purchase_amount: i128,
    frequency: u32,
    end_time: u64,
    gas_per_execution: u64,
) -> Result<PurchaseJob, VaultError> {
    let mut job: PurchaseJob = job::load_required(env)?;
    if purchase_amount <= 0 {
        return Err(VaultError::InvalidAmount);
    }
    if end_time != 0 && end_time <= clock::now_ms(env) {
        return Err(VaultError::InvalidConfig);
    }

    job.purchase_amount = purchase_amount;
    job.lifecycle.frequency = Frequency::from_code(frequency);
    job.lifecycle.end_time = end_time;
    job.lifecycle.gas_per_execution = gas_per_execution;
    job.save(env);
    Ok(job)
}

pub fn tick(env: &Env, call_id: &String) -> Result<TickOutcome, VaultError> {
    let mut job: PurchaseJob = job::begin_tick(env, call_id)?;

    if let Some(outcome) = job::check_timing(env, &mut job) {
        return Ok(outcome);
    }
    if !gas::reserve_for(env, OperationKind::Purchase) {
        return Ok(job::halt(env, &mut job, PauseReason::GasExhausted));
    }

    let config = storage::load_config(env)?;
    let funding = TokenClient::new(env, &config.funding_token);
    let balance = funding.balance(&env.current_contract_address());
    if balance < job.purchase_amount {
        env.events().publish(
            (PURCHASE, PurchaseEvent::InsufficientFunds),
            (balance, job.purchase_amount),
        );
        return Ok(job::rearm_or_complete(env, &mut job, TickOutcome::Deferred));
    }

    let legs = allocation::purchase_legs(env, &config.funding_token);
    if legs.is_empty() {
        env.events()
            .publish((PURCHASE, PurchaseEvent::NoLegs), job.purchase_amount);
        return Ok(job::rearm_or_complete(env, &mut job, TickOutcome::Deferred));
    }

    let router = SwapRouterClient::new(env, &config.router);
    let mut succeeded: u32 = 0;
    let mut failed: u32 = 0;
    for leg in legs.iter() {
        let amount_in = allocation::leg_amount(job.purchase_amount, leg.weight);
        match swap_leg(env, &funding, &router, &leg, amount_in) {
            Some(amount_out) => {
                succeeded += 1;
                env.events().publish(
                    (PURCHASE, PurchaseEvent::LegSwapped),
                    (leg.token, amount_in, amount_out),
                );
            }
            None => {
                failed += 1;
                env.events().publish(
                    (PURCHASE, PurchaseEvent::LegFailed),
                    (leg.token, amount_in, VaultError::SwapLegFailed as u32),
                );
            }
        }
    }

    if failed == 0 {
        job.purchases_completed = job.purchases_completed.saturating_add(1);
        env.events().publish(
            (PURCHASE, PurchaseEvent::Executed),
            (job.purchases_completed, job.purchase_amount, succeeded),
        );
        return Ok(job::rearm_or_complete(env, &mut job, TickOutcome::Executed));
    }

    if succeeded > 0 {
        env.events().publish(
            (PURCHASE, PurchaseEvent::PartialFailure),
            (succeeded, failed, VaultError::SwapLegFailed as u32),
        );
        return Ok(job::rearm_or_complete(env, &mut job, TickOutcome::PartialFailure));
    }

    if failed > SYSTEMIC_FAILURE_THRESHOLD {
        env.events().publish(
            (PURCHASE, PurchaseEvent::CriticalFailure),
            (failed, VaultError::SystemicSwapFailure as u32),
        );
        return Ok(job::halt(env, &mut job, PauseReason::SystemicFailure));
    }

    env.events().publish(
        (PURCHASE, PurchaseEvent::Failed),
        (failed, VaultError::SwapLegFailed as u32),
    );
    Ok(job::rearm_or_complete(env, &mut job, TickOutcome::Failed))
}

/// Swap one leg through the router. A trapped call or a zero output both
/// count as failure; the router allowance is withdrawn in that case.
fn swap_leg(
    env: &Env,
    funding: &TokenClient,
    router: &SwapRouterClient,
    leg: &Allocation,
    amount_in: i128,
) -> Option<i128> {
    if amount_in <= 0 {
        return None;
    }

    let vault = env.current_contract_address();
    let expiration = env.ledger().sequence() + APPROVAL_LEDGERS;
    funding.approve(&vault, &router.address, &amount_in, &expiration);

    let path = vec![env, funding.address.clone(), leg.token.clone()];
    let deadline = env.ledger().timestamp() + SWAP_DEADLINE_SECS;
    match router.try_swap(&vault, &path, &amount_in, &deadline) {
        Ok(Ok(amount_out)) if amount_out > 0 => Some(amount_out),
        _ => {
            funding.approve(&vault, &router.address, &0, &expiration);
            None
        }
    }
}

/// Amount each leg would receive for a purchase of `amount`.
pub fn leg_amounts(env: &Env, amount: i128) -> Result<Vec<(Address, i128)>, VaultError> {
    let config = storage::load_config(env)?;
    let mut out = Vec::new(env);
    for leg in allocation::purchase_legs(env, &config.funding_token).iter() {
        out.push_back((leg.token.clone(), allocation::leg_amount(amount, leg.weight)));
    }
    Ok(out)
}
