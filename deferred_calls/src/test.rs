use super::*;
use soroban_sdk::{
    testutils::{Address as AddressTrait, Events, Ledger, LedgerInfo},
    Address, Bytes, Env, String,
};

const START_SEQ: u32 = 100;
const START_TS: u64 = 1_700_000_000;
const START_PERIOD: u64 = START_TS * 1000 / PERIOD_LENGTH_MS;

/// Move the ledger clock to `timestamp`, closing one ledger every 5 seconds.
fn set_time(env: &Env, timestamp: u64) {
    let proto = env.ledger().protocol_version();

    env.ledger().set(LedgerInfo {
        protocol_version: proto,
        sequence_number: START_SEQ + ((timestamp - START_TS) / 5) as u32,
        timestamp,
        network_id: [0; 32],
        base_reserve: 10,
        min_temp_entry_ttl: 1_000_000,
        min_persistent_entry_ttl: 1_000_000,
        max_entry_ttl: 10_000_000,
    });
}

/// Timestamp at which `period` begins.
fn period_start(period: u64) -> u64 {
    period * PERIOD_LENGTH_MS / 1000
}

fn setup() -> (Env, DeferredCallsClient<'static>, Address) {
    let env = Env::default();
    set_time(&env, START_TS);
    env.mock_all_auths();
    let contract_id = env.register_contract(None, DeferredCalls);
    let client = DeferredCallsClient::new(&env, &contract_id);
    let origin = Address::generate(&env);
    (env, client, origin)
}

fn register_at(env: &Env, client: &DeferredCallsClient, origin: &Address, period: u64) -> String {
    client.register(
        origin,
        &symbol_short!("dca_tick"),
        &Slot { period, thread: 0 },
        &500_000,
        &Bytes::new(env),
        &0,
    )
}

#[test]
fn test_register_assigns_sequential_ids() {
    let (env, client, origin) = setup();

    let first = register_at(&env, &client, &origin, START_PERIOD + 10);
    let second = register_at(&env, &client, &origin, START_PERIOD + 20);

    assert_eq!(first, String::from_str(&env, "D1"));
    assert_eq!(second, String::from_str(&env, "D2"));
    assert!(client.exists(&first));
    assert!(client.exists(&second));
    assert_eq!(client.pending_count(), 2);
}

#[test]
fn test_register_ids_past_single_digit() {
    let (env, client, origin) = setup();

    let mut last = String::from_str(&env, "");
    for _ in 0..12 {
        last = register_at(&env, &client, &origin, START_PERIOD + 10);
    }
    assert_eq!(last, String::from_str(&env, "D12"));
}

#[test]
fn test_register_stores_call_record() {
    let (env, client, origin) = setup();

    let id = register_at(&env, &client, &origin, START_PERIOD + 50);
    let call = client.get_call(&id).unwrap();

    assert_eq!(call.origin, origin);
    assert_eq!(call.function, symbol_short!("dca_tick"));
    assert_eq!(call.slot, Slot { period: START_PERIOD + 50, thread: 0 });
    assert_eq!(call.max_gas, 500_000);
    assert_eq!(call.registered_at, START_TS);
}

#[test]
fn test_register_rejects_past_slot() {
    let (env, client, origin) = setup();

    let result = client.try_register(
        &origin,
        &symbol_short!("dca_tick"),
        &Slot { period: START_PERIOD - 1, thread: 0 },
        &500_000,
        &Bytes::new(&env),
        &0,
    );
    assert_eq!(result, Err(Ok(DeferredCallError::SlotInPast)));
}

#[test]
fn test_register_accepts_current_period() {
    let (env, client, origin) = setup();

    let id = register_at(&env, &client, &origin, START_PERIOD);
    assert_eq!(client.due_calls().len(), 1);
    assert!(client.exists(&id));
}

#[test]
fn test_register_rejects_invalid_thread_and_gas() {
    let (env, client, origin) = setup();

    let result = client.try_register(
        &origin,
        &symbol_short!("dca_tick"),
        &Slot { period: START_PERIOD + 10, thread: THREAD_COUNT },
        &500_000,
        &Bytes::new(&env),
        &0,
    );
    assert_eq!(result, Err(Ok(DeferredCallError::InvalidThread)));

    let result = client.try_register(
        &origin,
        &symbol_short!("dca_tick"),
        &Slot { period: START_PERIOD + 10, thread: 0 },
        &0,
        &Bytes::new(&env),
        &0,
    );
    assert_eq!(result, Err(Ok(DeferredCallError::InvalidGas)));
}

#[test]
fn test_cancel_removes_call() {
    let (env, client, origin) = setup();

    let id = register_at(&env, &client, &origin, START_PERIOD + 10);
    client.cancel(&origin, &id);

    assert!(!client.exists(&id));
    assert_eq!(client.pending_count(), 0);
}

#[test]
fn test_cancel_twice_is_not_found() {
    let (env, client, origin) = setup();

    let id = register_at(&env, &client, &origin, START_PERIOD + 10);
    client.cancel(&origin, &id);

    let result = client.try_cancel(&origin, &id);
    assert_eq!(result, Err(Ok(DeferredCallError::CallNotFound)));
}

#[test]
fn test_cancel_by_other_address_rejected() {
    let (env, client, origin) = setup();
    let stranger = Address::generate(&env);

    let id = register_at(&env, &client, &origin, START_PERIOD + 10);
    let result = client.try_cancel(&stranger, &id);

    assert_eq!(result, Err(Ok(DeferredCallError::NotOriginator)));
    assert!(client.exists(&id));
}

#[test]
fn test_consume_before_slot_is_not_due() {
    let (env, client, origin) = setup();

    let id = register_at(&env, &client, &origin, START_PERIOD + 10);
    let result = client.try_consume(&origin, &id);

    assert_eq!(result, Err(Ok(DeferredCallError::NotDue)));
    assert!(client.exists(&id));
}

#[test]
fn test_consume_once_due() {
    let (env, client, origin) = setup();

    let id = register_at(&env, &client, &origin, START_PERIOD + 10);
    set_time(&env, period_start(START_PERIOD + 10));

    let call = client.consume(&origin, &id);
    assert_eq!(call.id, id);
    assert!(!client.exists(&id));

    let again = client.try_consume(&origin, &id);
    assert_eq!(again, Err(Ok(DeferredCallError::CallNotFound)));
}

#[test]
fn test_period_follows_ledger_clock() {
    let (env, client, origin) = setup();
    assert_eq!(client.current_period(), START_PERIOD);

    let id = register_at(&env, &client, &origin, START_PERIOD + 10);

    // 159 seconds in: 31 ledgers closed, still one period short
    set_time(&env, period_start(START_PERIOD + 10) - 1);
    assert_eq!(client.current_period(), START_PERIOD + 9);
    assert_eq!(
        client.try_consume(&origin, &id),
        Err(Ok(DeferredCallError::NotDue))
    );
    assert!(client.due_calls().is_empty());

    set_time(&env, period_start(START_PERIOD + 10));
    assert_eq!(client.due_calls().len(), 1);
}

#[test]
fn test_consume_by_other_executor_rejected() {
    let (env, client, origin) = setup();
    let stranger = Address::generate(&env);

    let id = register_at(&env, &client, &origin, START_PERIOD);
    let result = client.try_consume(&stranger, &id);

    assert_eq!(result, Err(Ok(DeferredCallError::NotOriginator)));
    assert!(client.exists(&id));
}

#[test]
fn test_due_calls_filters_by_slot() {
    let (env, client, origin) = setup();

    let early = register_at(&env, &client, &origin, START_PERIOD + 5);
    let late = register_at(&env, &client, &origin, START_PERIOD + 100);

    set_time(&env, period_start(START_PERIOD + 50));
    let due = client.due_calls();

    assert_eq!(due.len(), 1);
    assert_eq!(due.get(0).unwrap().id, early);
    assert!(client.exists(&late));
}

#[test]
fn test_transitions_emit_events() {
    let (env, client, origin) = setup();

    let id = register_at(&env, &client, &origin, START_PERIOD);
    let after_register = env.events().all().len();
    assert!(after_register >= 1);

    client.consume(&origin, &id);
    assert!(env.events().all().len() >= 1);
}
