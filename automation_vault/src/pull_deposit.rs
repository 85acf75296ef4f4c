//! Periodic pull deposit from an external wallet that has granted the vault
//! an allowance.

use soroban_sdk::{contracttype, symbol_short, token::TokenClient, Address, Env, String, Symbol};

use crate::clock;
use crate::error::VaultError;
use crate::events::{DepositEvent, DEPOSIT};
use crate::gas::{self, OperationKind};
use crate::job::{self, JobKind, JobLifecycle, PauseReason, RecurringJob, TickOutcome};
use crate::scheduler::Frequency;
use crate::storage::{self, STORAGE_DEPOSIT};

pub const ENTRY_POINT: Symbol = symbol_short!("dep_tick");

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const BACKOFF_BASE_MS: u64 = 3_600_000;
pub const BACKOFF_EXPONENT_CAP: u32 = 10;

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PullDepositJobConfig {
    pub deposit_amount: i128,
    pub source_wallet: Address,
    /// 0 daily, 1 weekly, 2 biweekly, 3 monthly
    pub frequency: u32,
    pub start_time: u64,
    pub end_time: u64,
    pub gas_per_execution: u64,
    /// 0 selects the default of 3
    pub max_retries: u32,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PullDepositJob {
    pub lifecycle: JobLifecycle,
    pub deposit_amount: i128,
    pub source_wallet: Address,
    pub max_retries: u32,
    pub consecutive_failures: u32,
}

impl RecurringJob for PullDepositJob {
    const KIND: JobKind = JobKind::PullDeposit;
    const ENTRY_POINT: Symbol = ENTRY_POINT;
    const OPERATION: OperationKind = OperationKind::Deposit;

    fn lifecycle(&self) -> &JobLifecycle {
        &self.lifecycle
    }

    fn lifecycle_mut(&mut self) -> &mut JobLifecycle {
        &mut self.lifecycle
    }

    fn load(env: &Env) -> Option<Self> {
        env.storage().instance().get(&STORAGE_DEPOSIT)
    }

    fn save(&self, env: &Env) {
        env.storage().instance().set(&STORAGE_DEPOSIT, self);
    }

    fn on_resume(&mut self) {
        self.consecutive_failures = 0;
    }
}

/// Delay before the next attempt after `failures` consecutive failures:
/// `3_600_000 * 2^min(failures, 10)`.
pub fn backoff_delay(failures: u32) -> u64 {
    BACKOFF_BASE_MS << failures.min(BACKOFF_EXPONENT_CAP)
}

fn effective_max_retries(configured: u32) -> u32 {
    if configured == 0 {
        DEFAULT_MAX_RETRIES
    } else {
        configured
    }
}

pub fn start(env: &Env, config: PullDepositJobConfig) -> Result<PullDepositJob, VaultError> {
    if config.deposit_amount <= 0 {
        return Err(VaultError::InvalidAmount);
    }
    job::validate_window(env, config.start_time, config.end_time)?;
    job::ensure_not_active::<PullDepositJob>(env)?;
    if config.source_wallet == env.current_contract_address() {
        return Err(VaultError::InvalidConfig);
    }

    let job = PullDepositJob {
        lifecycle: JobLifecycle::new(
            Frequency::from_code(config.frequency),
            config.start_time,
            config.end_time,
            config.gas_per_execution,
        ),
        deposit_amount: config.deposit_amount,
        source_wallet: config.source_wallet,
        max_retries: effective_max_retries(config.max_retries),
        consecutive_failures: 0,
    };
    job::start(env, job)
}

pub fn update(
    env: &Env,
    deposit_amount: i128,
    frequency: u32,
    end_time: u64,
    gas_per_execution: u64,
) -> Result<PullDepositJob, VaultError> {
    let mut job: PullDepositJob = job::load_required(env)?;
    if deposit_amount <= 0 {
        return Err(VaultError::InvalidAmount);
    }
    if end_time != 0 && end_time <= clock::now_ms(env) {
        return Err(VaultError::InvalidConfig);
    }

    job.deposit_amount = deposit_amount;
    job.lifecycle.frequency = Frequency::from_code(frequency);
    job.lifecycle.end_time = end_time;
    job.lifecycle.gas_per_execution = gas_per_execution;
    job.save(env);
    Ok(job)
}

/// The source must hold `amount` and have approved the vault for it.
pub fn check_preconditions(
    token: &TokenClient,
    source: &Address,
    vault: &Address,
    amount: i128,
) -> Result<(), VaultError> {
    if token.balance(source) < amount {
        return Err(VaultError::InsufficientBalance);
    }
    if token.allowance(source, vault) < amount {
        return Err(VaultError::InsufficientAllowance);
    }
    Ok(())
}

pub fn tick(env: &Env, call_id: &String) -> Result<TickOutcome, VaultError> {
    let mut job: PullDepositJob = job::begin_tick(env, call_id)?;

    if let Some(outcome) = job::check_timing(env, &mut job) {
        return Ok(outcome);
    }
    if !gas::reserve_for(env, OperationKind::Deposit) {
        return Ok(job::halt(env, &mut job, PauseReason::GasExhausted));
    }

    let config = storage::load_config(env)?;
    let token = TokenClient::new(env, &config.funding_token);
    let vault = env.current_contract_address();

    if let Err(err) = check_preconditions(&token, &job.source_wallet, &vault, job.deposit_amount) {
        env.events().publish(
            (DEPOSIT, DepositEvent::ValidationFailed),
            (job.source_wallet.clone(), job.deposit_amount, err as u32),
        );
        return Ok(record_failure(env, &mut job));
    }

    match token.try_transfer_from(&vault, &job.source_wallet, &vault, &job.deposit_amount) {
        Ok(Ok(())) => {}
        _ => {
            env.events().publish(
                (DEPOSIT, DepositEvent::TransferFailed),
                (job.source_wallet.clone(), job.deposit_amount),
            );
            return Ok(record_failure(env, &mut job));
        }
    }

    job.consecutive_failures = 0;
    env.events().publish(
        (DEPOSIT, DepositEvent::Executed),
        (job.source_wallet.clone(), job.deposit_amount),
    );
    Ok(job::rearm_or_complete(env, &mut job, TickOutcome::Executed))
}

/// Count a failed attempt and either back off or give up.
fn record_failure(env: &Env, job: &mut PullDepositJob) -> TickOutcome {
    job.consecutive_failures = job.consecutive_failures.saturating_add(1);

    if job.consecutive_failures >= job.max_retries {
        env.events().publish(
            (DEPOSIT, DepositEvent::MaxRetriesReached),
            (
                job.consecutive_failures,
                VaultError::MaxRetriesExceeded as u32,
            ),
        );
        return job::halt(env, job, PauseReason::MaxRetries);
    }

    let retry_at = clock::now_ms(env).saturating_add(backoff_delay(job.consecutive_failures));
    env.events().publish(
        (DEPOSIT, DepositEvent::RetryScheduled),
        (job.consecutive_failures, retry_at),
    );
    job::rearm_at(env, job, retry_at, TickOutcome::RetryScheduled)
}
