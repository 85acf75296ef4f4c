#![no_std]
use soroban_sdk::{
    contract, contractimpl, contracttype, symbol_short, token::TokenClient, Address, Env,
    String, Symbol, Vec,
};

mod allocation;
mod audit;
mod clock;
mod error;
mod events;
mod gas;
mod guard;
mod interfaces;
mod job;
mod pull_deposit;
mod purchase;
mod savings;
mod scheduler;
mod storage;

pub use allocation::{leg_amount, Allocation};
pub use audit::AuditEntry;
pub use error::VaultError;
pub use events::{
    DepositEvent, GasEvent, JobEvent, PurchaseEvent, SavingsEvent, ScheduleEvent, VaultEvent,
};
pub use gas::{estimate_cost, minimum_reserve, OperationKind};
pub use interfaces::{DeferredCall, Slot, SwapRouterClient};
pub use job::{JobKind, JobLifecycle, JobStatus, PauseReason, TickOutcome};
pub use pull_deposit::{backoff_delay, PullDepositJob, PullDepositJobConfig};
pub use purchase::{PurchaseJob, PurchaseJobConfig};
pub use savings::{
    calculate_current_amount, SavingsJob, SavingsJobConfig, SavingsPhase, SavingsStrategy,
};
pub use scheduler::{next_occurrence, Frequency};
pub use storage::VaultConfig;

use events::VAULT;
use job::RecurringJob;

/// Flat view of every job's progress for dashboards.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AutomationStatus {
    pub purchase_enabled: bool,
    pub purchase_next: u64,
    pub purchases_completed: u32,
    pub deposit_enabled: bool,
    pub deposit_next: u64,
    pub deposit_failures: u32,
    pub savings_enabled: bool,
    pub savings_next: u64,
    pub savings_executions: u64,
    pub gas_reserve: u64,
    pub paused: bool,
}

#[contract]
pub struct AutomationVault;

#[contractimpl]
impl AutomationVault {
    /// Initialize the vault.
    ///
    /// # Arguments
    /// * `owner` - Address allowed to configure the vault (must authorize)
    /// * `funding_token` - Token the vault holds, spends and distributes
    /// * `scheduler_host` - Contract providing one-shot deferred calls
    /// * `router` - Swap router used by the purchase job
    ///
    /// # Errors
    /// * `AlreadyInitialized` - If the vault was initialized before
    pub fn initialize(
        env: Env,
        owner: Address,
        funding_token: Address,
        scheduler_host: Address,
        router: Address,
    ) -> Result<(), VaultError> {
        owner.require_auth();

        if storage::is_initialized(&env) {
            return Err(VaultError::AlreadyInitialized);
        }

        storage::save_config(
            &env,
            &VaultConfig {
                owner: owner.clone(),
                funding_token,
                scheduler_host,
                router,
            },
        );
        storage::extend_instance_ttl(&env);

        audit::append(&env, symbol_short!("init"), &owner, true);
        env.events()
            .publish((VAULT, VaultEvent::Initialized), owner);

        Ok(())
    }

    pub fn get_config(env: Env) -> Result<VaultConfig, VaultError> {
        storage::load_config(&env)
    }

    /// Pause or unpause the whole vault. While paused, owner configuration
    /// calls fail with `VaultPaused` and due ticks are skipped and re-armed.
    pub fn set_paused(env: Env, caller: Address, paused: bool) -> Result<(), VaultError> {
        let config = require_owner(&env, &caller)?;
        storage::extend_instance_ttl(&env);
        storage::set_paused(&env, paused);

        let operation = if paused {
            symbol_short!("pause")
        } else {
            symbol_short!("unpause")
        };
        audit::append(&env, operation, &caller, true);

        let event = if paused {
            VaultEvent::Paused
        } else {
            VaultEvent::Unpaused
        };
        env.events().publish((VAULT, event), config.owner);
        Ok(())
    }

    pub fn is_paused(env: Env) -> bool {
        storage::is_paused(&env)
    }

    /// Move funding tokens from `from` into the vault.
    ///
    /// # Returns
    /// The vault's funding-token balance after the deposit
    ///
    /// # Errors
    /// * `InvalidAmount` - If amount is not positive
    /// * `VaultPaused` - If the vault is paused
    pub fn deposit(env: Env, from: Address, amount: i128) -> Result<i128, VaultError> {
        from.require_auth();
        let config = storage::load_config(&env)?;
        if amount <= 0 {
            return Err(VaultError::InvalidAmount);
        }
        if storage::is_paused(&env) {
            return Err(VaultError::VaultPaused);
        }
        storage::extend_instance_ttl(&env);

        guard::guarded(&env, || {
            let token = TokenClient::new(&env, &config.funding_token);
            let vault = env.current_contract_address();
            token.transfer(&from, &vault, &amount);

            audit::append(&env, symbol_short!("deposit"), &from, true);
            env.events()
                .publish((VAULT, VaultEvent::Deposited), (from.clone(), amount));
            Ok(token.balance(&vault))
        })
    }

    /// Send any token held by the vault to `to`. Owner only.
    ///
    /// # Errors
    /// * `InvalidAmount` - If amount is not positive
    /// * `InsufficientBalance` - If the vault holds less than `amount`
    pub fn withdraw(
        env: Env,
        caller: Address,
        token: Address,
        to: Address,
        amount: i128,
    ) -> Result<(), VaultError> {
        owner_op(&env, &caller, symbol_short!("withdraw"), || {
            if amount <= 0 {
                return Err(VaultError::InvalidAmount);
            }
            let client = TokenClient::new(&env, &token);
            let vault = env.current_contract_address();
            if client.balance(&vault) < amount {
                return Err(VaultError::InsufficientBalance);
            }
            client.transfer(&vault, &to, &amount);

            env.events()
                .publish((VAULT, VaultEvent::Withdrawn), (token.clone(), to.clone(), amount));
            Ok(())
        })
    }

    /// Replace the token weight table used by the purchase job.
    ///
    /// # Errors
    /// * `InvalidAllocation` - If a weight exceeds 100, the weights do not
    ///   sum to 100, or a token appears twice
    pub fn set_allocations(
        env: Env,
        caller: Address,
        allocations: Vec<Allocation>,
    ) -> Result<(), VaultError> {
        owner_op(&env, &caller, symbol_short!("alloc"), || {
            allocation::set(&env, &allocations)?;
            env.events()
                .publish((VAULT, VaultEvent::AllocationsSet), allocations.len());
            Ok(())
        })
    }

    pub fn get_allocations(env: Env) -> Vec<Allocation> {
        allocation::get(&env)
    }

    /// Top up the execution budget shared by all jobs.
    ///
    /// # Returns
    /// The new reserve
    pub fn deposit_gas(env: Env, depositor: Address, amount: u64) -> Result<u64, VaultError> {
        depositor.require_auth();
        storage::load_config(&env)?;
        storage::extend_instance_ttl(&env);

        guard::guarded(&env, || {
            let total = gas::deposit(&env, amount)?;
            audit::append(&env, symbol_short!("gas_dep"), &depositor, true);
            Ok(total)
        })
    }

    pub fn get_gas_reserve(env: Env) -> u64 {
        gas::reserve(&env)
    }

    pub fn estimate_gas_for_operation(_env: Env, kind: OperationKind) -> u64 {
        gas::estimate_cost(kind)
    }

    /// Reserve needed to run `executions` ticks of `kind`.
    ///
    /// # Errors
    /// * `Overflow` - If the product does not fit in a u64
    pub fn get_minimum_reserve(
        _env: Env,
        kind: OperationKind,
        executions: u64,
    ) -> Result<u64, VaultError> {
        gas::minimum_reserve(kind, executions)
    }

    // -----------------------------------------------------------------------
    // Purchase job
    // -----------------------------------------------------------------------

    /// Configure and enable the periodic purchase job. The first tick is
    /// armed at `config.start_time`.
    ///
    /// # Errors
    /// * `InvalidAmount` - If the purchase amount is not positive
    /// * `InvalidConfig` - If the start time is not in the future or the end
    ///   time is not after it
    /// * `InvalidAllocation` - If no allocation entry can receive a purchase
    /// * `JobAlreadyActive` - If the job is already enabled
    pub fn start_purchase_job(
        env: Env,
        caller: Address,
        config: PurchaseJobConfig,
    ) -> Result<PurchaseJob, VaultError> {
        owner_op(&env, &caller, symbol_short!("dca_start"), || {
            purchase::start(&env, config)
        })
    }

    pub fn pause_purchase_job(env: Env, caller: Address) -> Result<PurchaseJob, VaultError> {
        owner_op(&env, &caller, symbol_short!("dca_pause"), || {
            job::pause::<PurchaseJob>(&env)
        })
    }

    pub fn resume_purchase_job(env: Env, caller: Address) -> Result<PurchaseJob, VaultError> {
        owner_op(&env, &caller, symbol_short!("dca_resum"), || {
            job::resume::<PurchaseJob>(&env)
        })
    }

    /// Change amount, frequency, end time and gas limit. The pending tick
    /// keeps its time; the new values apply from the next one.
    pub fn update_purchase_job(
        env: Env,
        caller: Address,
        purchase_amount: i128,
        frequency: u32,
        end_time: u64,
        gas_per_execution: u64,
    ) -> Result<PurchaseJob, VaultError> {
        owner_op(&env, &caller, symbol_short!("dca_upd"), || {
            let updated =
                purchase::update(&env, purchase_amount, frequency, end_time, gas_per_execution)?;
            env.events()
                .publish((events::JOB, JobEvent::Updated), JobKind::Purchase);
            Ok(updated)
        })
    }

    pub fn get_purchase_job(env: Env) -> Option<PurchaseJob> {
        PurchaseJob::load(&env)
    }

    /// How a purchase of `amount` would be split across the allocation table.
    pub fn preview_purchase_legs(
        env: Env,
        amount: i128,
    ) -> Result<Vec<(Address, i128)>, VaultError> {
        purchase::leg_amounts(&env, amount)
    }

    // -----------------------------------------------------------------------
    // Pull-deposit job
    // -----------------------------------------------------------------------

    /// Configure and enable the periodic pull deposit from
    /// `config.source_wallet`, which must approve the vault as spender.
    ///
    /// # Errors
    /// * `InvalidAmount` - If the deposit amount is not positive
    /// * `InvalidConfig` - If the window is invalid or the source is the vault
    /// * `JobAlreadyActive` - If the job is already enabled
    pub fn start_deposit_job(
        env: Env,
        caller: Address,
        config: PullDepositJobConfig,
    ) -> Result<PullDepositJob, VaultError> {
        owner_op(&env, &caller, symbol_short!("dep_start"), || {
            pull_deposit::start(&env, config)
        })
    }

    pub fn pause_deposit_job(env: Env, caller: Address) -> Result<PullDepositJob, VaultError> {
        owner_op(&env, &caller, symbol_short!("dep_pause"), || {
            job::pause::<PullDepositJob>(&env)
        })
    }

    /// Resume a paused deposit job. The failure counter starts over.
    pub fn resume_deposit_job(env: Env, caller: Address) -> Result<PullDepositJob, VaultError> {
        owner_op(&env, &caller, symbol_short!("dep_resum"), || {
            job::resume::<PullDepositJob>(&env)
        })
    }

    pub fn update_deposit_job(
        env: Env,
        caller: Address,
        deposit_amount: i128,
        frequency: u32,
        end_time: u64,
        gas_per_execution: u64,
    ) -> Result<PullDepositJob, VaultError> {
        owner_op(&env, &caller, symbol_short!("dep_upd"), || {
            let updated =
                pull_deposit::update(&env, deposit_amount, frequency, end_time, gas_per_execution)?;
            env.events()
                .publish((events::JOB, JobEvent::Updated), JobKind::PullDeposit);
            Ok(updated)
        })
    }

    pub fn get_deposit_job(env: Env) -> Option<PullDepositJob> {
        PullDepositJob::load(&env)
    }

    // -----------------------------------------------------------------------
    // Savings job
    // -----------------------------------------------------------------------

    /// Configure and enable the phased savings job.
    ///
    /// # Errors
    /// * `InvalidAmount` - If the base amount is negative
    /// * `InvalidConfig` - If the window is invalid, or a hybrid strategy
    ///   transitions before it starts
    /// * `JobAlreadyActive` - If the job is already enabled
    pub fn start_savings_job(
        env: Env,
        caller: Address,
        config: SavingsJobConfig,
    ) -> Result<SavingsJob, VaultError> {
        owner_op(&env, &caller, symbol_short!("sav_start"), || {
            savings::start(&env, config)
        })
    }

    pub fn pause_savings_job(env: Env, caller: Address) -> Result<SavingsJob, VaultError> {
        owner_op(&env, &caller, symbol_short!("sav_pause"), || {
            job::pause::<SavingsJob>(&env)
        })
    }

    pub fn resume_savings_job(env: Env, caller: Address) -> Result<SavingsJob, VaultError> {
        owner_op(&env, &caller, symbol_short!("sav_resum"), || {
            job::resume::<SavingsJob>(&env)
        })
    }

    pub fn update_savings_job(
        env: Env,
        caller: Address,
        base_amount: i128,
        frequency: u32,
        end_time: u64,
        gas_per_execution: u64,
    ) -> Result<SavingsJob, VaultError> {
        owner_op(&env, &caller, symbol_short!("sav_upd"), || {
            let updated =
                savings::update(&env, base_amount, frequency, end_time, gas_per_execution)?;
            env.events()
                .publish((events::JOB, JobEvent::Updated), JobKind::Savings);
            Ok(updated)
        })
    }

    pub fn get_savings_job(env: Env) -> Option<SavingsJob> {
        SavingsJob::load(&env)
    }

    /// Amount the savings job works with on its next tick.
    pub fn get_current_savings_amount(env: Env) -> Result<i128, VaultError> {
        let job: SavingsJob = job::load_required(&env)?;
        savings::calculate_current_amount(
            job.base_amount,
            job.growth_rate_percent,
            job.executions_completed,
        )
    }

    // -----------------------------------------------------------------------
    // Deferred execution
    // -----------------------------------------------------------------------

    /// Run a deferred tick the vault scheduled against itself.
    ///
    /// The call is claimed from the scheduler host, which only hands it
    /// over once its slot is reached and only to the contract that
    /// registered it. Callers are typically relayers polling the host's
    /// `due_calls`.
    ///
    /// # Errors
    /// * `UnauthorizedInvocation` - If the call is unknown, not yet due, not
    ///   registered by this vault, or not the tick its job is waiting on
    /// * `Reentrancy` - If another vault operation is in progress
    pub fn execute_deferred(env: Env, call_id: String) -> Result<TickOutcome, VaultError> {
        storage::load_config(&env)?;
        storage::extend_instance_ttl(&env);

        guard::guarded(&env, || {
            let call = scheduler::claim(&env, &call_id)?;
            if !scheduler::assert_self_invoked(&env, &call) {
                return Err(VaultError::UnauthorizedInvocation);
            }
            let kind = job::kind_for_entry_point(&call.function)
                .ok_or(VaultError::UnauthorizedInvocation)?;

            let outcome = run_tick(&env, kind, &call_id)?;

            let success = !matches!(outcome, TickOutcome::Paused | TickOutcome::Failed);
            audit::append(&env, call.function, &env.current_contract_address(), success);
            Ok(outcome)
        })
    }

    pub fn get_automation_status(env: Env) -> AutomationStatus {
        let purchase = PurchaseJob::load(&env);
        let deposit = PullDepositJob::load(&env);
        let savings = SavingsJob::load(&env);

        AutomationStatus {
            purchase_enabled: purchase
                .as_ref()
                .map(|j| j.lifecycle.is_enabled())
                .unwrap_or(false),
            purchase_next: purchase
                .as_ref()
                .map(|j| j.lifecycle.next_execution_time)
                .unwrap_or(0),
            purchases_completed: purchase.map(|j| j.purchases_completed).unwrap_or(0),
            deposit_enabled: deposit
                .as_ref()
                .map(|j| j.lifecycle.is_enabled())
                .unwrap_or(false),
            deposit_next: deposit
                .as_ref()
                .map(|j| j.lifecycle.next_execution_time)
                .unwrap_or(0),
            deposit_failures: deposit.map(|j| j.consecutive_failures).unwrap_or(0),
            savings_enabled: savings
                .as_ref()
                .map(|j| j.lifecycle.is_enabled())
                .unwrap_or(false),
            savings_next: savings
                .as_ref()
                .map(|j| j.lifecycle.next_execution_time)
                .unwrap_or(0),
            savings_executions: savings.map(|j| j.executions_completed).unwrap_or(0),
            gas_reserve: gas::reserve(&env),
            paused: storage::is_paused(&env),
        }
    }

    /// Most recent owner operations and tick outcomes, oldest first.
    pub fn get_audit_log(env: Env) -> Vec<AuditEntry> {
        audit::entries(&env)
    }
}

/// Authenticate `caller` and check it is the configured owner.
fn require_owner(env: &Env, caller: &Address) -> Result<VaultConfig, VaultError> {
    caller.require_auth();
    let config = storage::load_config(env)?;
    if config.owner != *caller {
        return Err(VaultError::Unauthorized);
    }
    Ok(config)
}

/// Run an owner-only mutation under the reentrancy guard. Fails with
/// `VaultPaused` while the vault is paused.
fn owner_op<T>(
    env: &Env,
    caller: &Address,
    operation: Symbol,
    f: impl FnOnce() -> Result<T, VaultError>,
) -> Result<T, VaultError> {
    require_owner(env, caller)?;
    if storage::is_paused(env) {
        return Err(VaultError::VaultPaused);
    }
    storage::extend_instance_ttl(env);

    let result = guard::guarded(env, f)?;
    audit::append(env, operation, caller, true);
    Ok(result)
}

fn run_tick(env: &Env, kind: JobKind, call_id: &String) -> Result<TickOutcome, VaultError> {
    if storage::is_paused(env) {
        return match kind {
            JobKind::Purchase => job::absorb::<PurchaseJob>(env, call_id),
            JobKind::PullDeposit => job::absorb::<PullDepositJob>(env, call_id),
            JobKind::Savings => job::absorb::<SavingsJob>(env, call_id),
        };
    }

    match kind {
        JobKind::Purchase => purchase::tick(env, call_id),
        JobKind::PullDeposit => pull_deposit::tick(env, call_id),
        JobKind::Savings => savings::tick(env, call_id),
    }
}
