#![cfg(test)]

//! End-to-end scenarios: the vault, the deferred-call host and a token,
//! with the test acting as the relayer that triggers due calls.

use automation_vault::{
    estimate_cost, Allocation, AutomationVault, AutomationVaultClient, JobStatus,
    OperationKind, PauseReason, PullDepositJobConfig, PurchaseJobConfig, SavingsJobConfig,
    SavingsPhase, SavingsStrategy, TickOutcome, VaultError,
};
use deferred_calls::{DeferredCalls, DeferredCallsClient};
use soroban_sdk::{
    testutils::{Address as _, Ledger, LedgerInfo},
    token::{StellarAssetClient, TokenClient},
    Address, Env, Vec,
};

const START_SEQ: u32 = 5_000;
const START_MS: u64 = 1_720_000_000_000;
const DAY_MS: u64 = 86_400_000;
const FIRST_TICK_MS: u64 = START_MS + 120_000;
const LEDGER_CLOSE_MS: u64 = 5_000;

/// Move the ledger clock to `ms`, closing one ledger every 5 seconds.
fn set_time(env: &Env, ms: u64) {
    let proto = env.ledger().protocol_version();

    env.ledger().set(LedgerInfo {
        protocol_version: proto,
        sequence_number: START_SEQ + ((ms - START_MS) / LEDGER_CLOSE_MS) as u32,
        timestamp: ms / 1000,
        network_id: [0; 32],
        base_reserve: 10,
        min_temp_entry_ttl: 1_000_000,
        min_persistent_entry_ttl: 1_000_000,
        max_entry_ttl: 10_000_000,
    });
}

struct World {
    env: Env,
    vault_id: Address,
    vault: AutomationVaultClient<'static>,
    host: DeferredCallsClient<'static>,
    owner: Address,
    funding: Address,
}

impl World {
    fn new() -> Self {
        let env = Env::default();
        set_time(&env, START_MS);
        env.mock_all_auths();

        let host_id = env.register_contract(None, DeferredCalls);
        let vault_id = env.register_contract(None, AutomationVault);
        let funding = env
            .register_stellar_asset_contract_v2(Address::generate(&env))
            .address();
        // no swap is expected to reach the router in these scenarios
        let router = Address::generate(&env);

        let owner = Address::generate(&env);
        let vault = AutomationVaultClient::new(&env, &vault_id);
        vault.initialize(&owner, &funding, &host_id, &router);

        World {
            host: DeferredCallsClient::new(&env, &host_id),
            vault,
            vault_id,
            owner,
            funding,
            env,
        }
    }

    fn mint(&self, to: &Address, amount: i128) {
        StellarAssetClient::new(&self.env, &self.funding).mint(to, &amount);
    }

    fn balance(&self, of: &Address) -> i128 {
        TokenClient::new(&self.env, &self.funding).balance(of)
    }

    fn advance_to(&self, ms: u64) -> Vec<TickOutcome> {
        set_time(&self.env, ms);
        let mut outcomes = Vec::new(&self.env);
        for call in self.host.due_calls().iter() {
            if call.origin == self.vault_id {
                outcomes.push_back(self.vault.execute_deferred(&call.id));
            }
        }
        outcomes
    }
}

/// A reserve of 1,500,000 units looks large but is far below the
/// 500,000,000,000 a purchase tick reserves.
#[test]
fn test_small_gas_reserve_pauses_purchase_job() {
    let w = World::new();
    let target = Address::generate(&w.env);
    let mut allocations = Vec::new(&w.env);
    allocations.push_back(Allocation {
        token: target,
        weight: 100,
    });
    w.vault.set_allocations(&w.owner, &allocations);
    w.mint(&w.vault_id, 10_000);
    w.vault.deposit_gas(&w.owner, &1_500_000);

    w.vault.start_purchase_job(
        &w.owner,
        &PurchaseJobConfig {
            purchase_amount: 1_000,
            frequency: 0,
            start_time: FIRST_TICK_MS,
            end_time: 0,
            gas_per_execution: 0,
        },
    );

    let outcomes = w.advance_to(FIRST_TICK_MS);
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes.get(0).unwrap(), TickOutcome::Paused);

    let job = w.vault.get_purchase_job().unwrap();
    assert_eq!(job.lifecycle.status, JobStatus::Paused);
    assert_eq!(job.lifecycle.pause_reason, PauseReason::GasExhausted);
    assert_eq!(w.vault.get_gas_reserve(), 1_500_000);
    assert_eq!(w.balance(&w.vault_id), 10_000);
    assert_eq!(w.host.pending_count(), 0);

    // nothing fires later either
    assert!(w.advance_to(FIRST_TICK_MS + 10 * DAY_MS).is_empty());

    let status = w.vault.get_automation_status();
    assert!(!status.purchase_enabled);
    assert_eq!(status.purchases_completed, 0);
}

/// Three failed pulls pause the deposit job; once the source approves the
/// vault, resuming brings it back to its regular cadence.
#[test]
fn test_deposit_job_gives_up_then_recovers() {
    let w = World::new();
    let source = Address::generate(&w.env);
    w.mint(&source, 10_000);
    w.vault
        .deposit_gas(&w.owner, &(4 * estimate_cost(OperationKind::Deposit)));

    w.vault.start_deposit_job(
        &w.owner,
        &PullDepositJobConfig {
            deposit_amount: 2_500,
            source_wallet: source.clone(),
            frequency: 1,
            start_time: FIRST_TICK_MS,
            end_time: 0,
            gas_per_execution: 0,
            max_retries: 3,
        },
    );

    let mut now = FIRST_TICK_MS;
    for expected_delay in [7_200_000u64, 14_400_000] {
        let outcomes = w.advance_to(now);
        assert_eq!(outcomes.get(0).unwrap(), TickOutcome::RetryScheduled);
        now += expected_delay;
        assert_eq!(
            w.vault.get_deposit_job().unwrap().lifecycle.next_execution_time,
            now
        );
    }

    let outcomes = w.advance_to(now);
    assert_eq!(outcomes.get(0).unwrap(), TickOutcome::Paused);
    let job = w.vault.get_deposit_job().unwrap();
    assert_eq!(job.consecutive_failures, 3);
    assert_eq!(job.lifecycle.pause_reason, PauseReason::MaxRetries);
    assert_eq!(w.host.pending_count(), 0);
    assert_eq!(w.balance(&source), 10_000);

    TokenClient::new(&w.env, &w.funding).approve(
        &source,
        &w.vault_id,
        &10_000,
        &(START_SEQ + 1_000_000),
    );
    let resumed = w.vault.resume_deposit_job(&w.owner);
    assert_eq!(resumed.consecutive_failures, 0);
    let next = now + 7 * DAY_MS;
    assert_eq!(resumed.lifecycle.next_execution_time, next);

    let outcomes = w.advance_to(next);
    assert_eq!(outcomes.get(0).unwrap(), TickOutcome::Executed);
    assert_eq!(w.balance(&w.vault_id), 2_500);
    assert_eq!(w.balance(&source), 7_500);
}

/// A failing deposit job does not disturb a savings job sharing the vault.
#[test]
fn test_jobs_progress_independently() {
    let w = World::new();
    let source = Address::generate(&w.env);
    let recipient = Address::generate(&w.env);
    w.mint(&w.vault_id, 4_000);
    w.vault.deposit_gas(
        &w.owner,
        &(2 * estimate_cost(OperationKind::Deposit) + 4 * estimate_cost(OperationKind::Strategy)),
    );

    w.vault.start_savings_job(
        &w.owner,
        &SavingsJobConfig {
            strategy: SavingsStrategy::Hybrid,
            base_amount: 1_000,
            growth_rate_percent: 5,
            distribution_address: Some(recipient.clone()),
            phase_transition_time: FIRST_TICK_MS + 2 * DAY_MS,
            frequency: 0,
            start_time: FIRST_TICK_MS,
            end_time: 0,
            gas_per_execution: 0,
        },
    );
    w.vault.start_deposit_job(
        &w.owner,
        &PullDepositJobConfig {
            deposit_amount: 500,
            source_wallet: source,
            frequency: 0,
            start_time: FIRST_TICK_MS,
            end_time: 0,
            gas_per_execution: 0,
            max_retries: 2,
        },
    );

    let first = w.advance_to(FIRST_TICK_MS);
    assert_eq!(first.len(), 2);
    assert_eq!(first.get(0).unwrap(), TickOutcome::Executed);
    assert_eq!(first.get(1).unwrap(), TickOutcome::RetryScheduled);

    // the deposit retry lands before the next savings tick and gives up
    let retry = w.advance_to(FIRST_TICK_MS + 7_200_000);
    assert_eq!(retry.len(), 1);
    assert_eq!(retry.get(0).unwrap(), TickOutcome::Paused);

    assert_eq!(
        w.advance_to(FIRST_TICK_MS + DAY_MS).get(0).unwrap(),
        TickOutcome::Executed
    );
    // reaching the transition time accumulates once more, then flips
    assert_eq!(
        w.advance_to(FIRST_TICK_MS + 2 * DAY_MS).get(0).unwrap(),
        TickOutcome::Executed
    );
    let savings = w.vault.get_savings_job().unwrap();
    assert_eq!(savings.current_phase, SavingsPhase::Distribution);
    assert_eq!(w.balance(&recipient), 0);

    assert_eq!(
        w.advance_to(FIRST_TICK_MS + 3 * DAY_MS).get(0).unwrap(),
        TickOutcome::Executed
    );
    let savings = w.vault.get_savings_job().unwrap();
    assert_eq!(savings.executions_completed, 4);
    assert_eq!(w.balance(&recipient), 4_000);

    let status = w.vault.get_automation_status();
    assert!(status.savings_enabled);
    assert!(!status.deposit_enabled);
    assert_eq!(status.deposit_failures, 2);
    assert_eq!(status.savings_executions, 4);
}

/// Calls another contract parks in the host are invisible to the vault.
#[test]
fn test_foreign_calls_cannot_drive_the_vault() {
    let w = World::new();
    let stranger = Address::generate(&w.env);
    let forged = w.host.register(
        &stranger,
        &soroban_sdk::symbol_short!("sav_tick"),
        &deferred_calls::Slot {
            period: w.host.current_period(),
            thread: 0,
        },
        &1_000,
        &soroban_sdk::Bytes::new(&w.env),
        &0,
    );

    assert_eq!(
        w.vault.try_execute_deferred(&forged),
        Err(Ok(VaultError::UnauthorizedInvocation))
    );
    assert!(w.host.exists(&forged));
    assert!(w.vault.get_audit_log().len() == 1);
}
