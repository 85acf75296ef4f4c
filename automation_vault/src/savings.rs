//! Phased savings strategy: accumulate for a while, then distribute.

use soroban_sdk::{contracttype, symbol_short, token::TokenClient, Address, Env, String, Symbol};

use crate::clock;
use crate::error::VaultError;
use crate::events::{SavingsEvent, SAVINGS};
use crate::gas::{self, OperationKind};
use crate::job::{self, JobKind, JobLifecycle, PauseReason, RecurringJob, TickOutcome};
use crate::scheduler::Frequency;
use crate::storage::{self, STORAGE_SAVINGS};

pub const ENTRY_POINT: Symbol = symbol_short!("sav_tick");

#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum SavingsStrategy {
    Accumulation = 0,
    Distribution = 1,
    /// Accumulation until `phase_transition_time`, distribution after
    Hybrid = 2,
}

#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum SavingsPhase {
    Accumulation = 0,
    Distribution = 1,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SavingsJobConfig {
    pub strategy: SavingsStrategy,
    pub base_amount: i128,
    pub growth_rate_percent: u32,
    pub distribution_address: Option<Address>,
    pub phase_transition_time: u64,
    /// 0 daily, 1 weekly, 2 biweekly, 3 monthly
    pub frequency: u32,
    pub start_time: u64,
    pub end_time: u64,
    pub gas_per_execution: u64,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SavingsJob {
    pub lifecycle: JobLifecycle,
    pub strategy: SavingsStrategy,
    pub base_amount: i128,
    pub growth_rate_percent: u32,
    pub distribution_address: Option<Address>,
    pub phase_transition_time: u64,
    pub executions_completed: u64,
    pub current_phase: SavingsPhase,
}

impl RecurringJob for SavingsJob {
    const KIND: JobKind = JobKind::Savings;
    const ENTRY_POINT: Symbol = ENTRY_POINT;
    const OPERATION: OperationKind = OperationKind::Strategy;

    fn lifecycle(&self) -> &JobLifecycle {
        &self.lifecycle
    }

    fn lifecycle_mut(&mut self) -> &mut JobLifecycle {
        &mut self.lifecycle
    }

    fn load(env: &Env) -> Option<Self> {
        env.storage().instance().get(&STORAGE_SAVINGS)
    }

    fn save(&self, env: &Env) {
        env.storage().instance().set(&STORAGE_SAVINGS, self);
    }
}

/// `base * (100 + rate * periods) / 100`, linear in `periods`.
pub fn calculate_current_amount(
    base_amount: i128,
    growth_rate_percent: u32,
    periods: u64,
) -> Result<i128, VaultError> {
    let growth = (growth_rate_percent as i128)
        .checked_mul(periods as i128)
        .ok_or(VaultError::Overflow)?;
    let factor = growth.checked_add(100).ok_or(VaultError::Overflow)?;
    let scaled = base_amount
        .checked_mul(factor)
        .ok_or(VaultError::Overflow)?;
    Ok(scaled / 100)
}

pub fn start(env: &Env, config: SavingsJobConfig) -> Result<SavingsJob, VaultError> {
    if config.base_amount < 0 {
        return Err(VaultError::InvalidAmount);
    }
    job::validate_window(env, config.start_time, config.end_time)?;
    job::ensure_not_active::<SavingsJob>(env)?;
    if config.strategy == SavingsStrategy::Hybrid
        && config.phase_transition_time < config.start_time
    {
        return Err(VaultError::InvalidConfig);
    }

    let current_phase = match config.strategy {
        SavingsStrategy::Distribution => SavingsPhase::Distribution,
        _ => SavingsPhase::Accumulation,
    };

    let job = SavingsJob {
        lifecycle: JobLifecycle::new(
            Frequency::from_code(config.frequency),
            config.start_time,
            config.end_time,
            config.gas_per_execution,
        ),
        strategy: config.strategy,
        base_amount: config.base_amount,
        growth_rate_percent: config.growth_rate_percent,
        distribution_address: config.distribution_address,
        phase_transition_time: config.phase_transition_time,
        executions_completed: 0,
        current_phase,
    };
    job::start(env, job)
}

pub fn update(
    env: &Env,
    base_amount: i128,
    frequency: u32,
    end_time: u64,
    gas_per_execution: u64,
) -> Result<SavingsJob, VaultError> {
    let mut job: SavingsJob = job::load_required(env)?;
    if base_amount < 0 {
        return Err(VaultError::InvalidAmount);
    }
    if end_time != 0 && end_time <= clock::now_ms(env) {
        return Err(VaultError::InvalidConfig);
    }

    job.base_amount = base_amount;
    job.lifecycle.frequency = Frequency::from_code(frequency);
    job.lifecycle.end_time = end_time;
    job.lifecycle.gas_per_execution = gas_per_execution;
    job.save(env);
    Ok(job)
}

pub fn tick(env: &Env, call_id: &String) -> Result<TickOutcome, VaultError> {
    let mut job: SavingsJob = job::begin_tick(env, call_id)?;
    if let Some(outcome) = job::check_timing(env, &mut job) {
        return Ok(outcome);
    }
    if !gas::reserve_for(env, OperationKind::Strategy) {
        return Ok(job::halt(env, &mut job, PauseReason::GasExhausted));
    }

    let amount = match calculate_current_amount(
        job.base_amount,
        job.growth_rate_percent,
        job.executions_completed,
    ) {
        Ok(amount) => amount,
        Err(_) => return Ok(job::halt(env, &mut job, PauseReason::AmountOverflow)),
    };

    match job.current_phase {
        SavingsPhase::Accumulation => {
            env.events().publish(
                (SAVINGS, SavingsEvent::Accumulated),
                (job.executions_completed, amount),
            );
        }
        SavingsPhase::Distribution => {
            if !distribute(env, &job, amount)? {
                return Ok(job::rearm_or_complete(env, &mut job, TickOutcome::Deferred));
            }
        }
    }

    job.executions_completed = job.executions_completed.saturating_add(1);

    // a hybrid job switches to distributing once, after a completed tick
    let now = clock::now_ms(env);
    if job.strategy == SavingsStrategy::Hybrid
        && job.current_phase == SavingsPhase::Accumulation
        && now >= job.phase_transition_time
    {
        job.current_phase = SavingsPhase::Distribution;
        env.events().publish(
            (SAVINGS, SavingsEvent::PhaseChanged),
            (job.executions_completed, now),
        );
    }

    Ok(job::rearm_or_complete(env, &mut job, TickOutcome::Executed))
}

/// Send the vault's whole funding-token balance to the distribution address.
/// Returns false, with an event, when the tick cannot distribute.
fn distribute(env: &Env, job: &SavingsJob, amount: i128) -> Result<bool, VaultError> {
    let config = storage::load_config(env)?;
    let token = TokenClient::new(env, &config.funding_token);
    let vault = env.current_contract_address();
    let balance = token.balance(&vault);

    let recipient = match &job.distribution_address {
        Some(recipient) if amount > 0 && balance >= amount => recipient,
        _ => {
            env.events().publish(
                (SAVINGS, SavingsEvent::DistributionSkipped),
                (amount, balance),
            );
            return Ok(false);
        }
    };

    match token.try_transfer(&vault, recipient, &balance) {
        Ok(Ok(())) => {
            env.events().publish(
                (SAVINGS, SavingsEvent::Distributed),
                (recipient.clone(), balance),
            );
            Ok(true)
        }
        _ => {
            env.events().publish(
                (SAVINGS, SavingsEvent::DistributionSkipped),
                (amount, balance),
            );
            Ok(false)
        }
    }
}
