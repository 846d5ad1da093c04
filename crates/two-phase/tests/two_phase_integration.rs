//! Integration tests for the two-phase commit coordinator.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use common::{Money, Resource, TransactionRequest};
use participants::{
    CallLog, InMemoryTwoPhaseParticipant, Operation, ParticipantError, TransactionState,
};
use two_phase::TwoPhaseCoordinator;

type TestCoordinator = TwoPhaseCoordinator<
    InMemoryTwoPhaseParticipant,
    InMemoryTwoPhaseParticipant,
    InMemoryTwoPhaseParticipant,
>;

struct TestHarness {
    coordinator: TestCoordinator,
    log: CallLog,
    order: InMemoryTwoPhaseParticipant,
    inventory: InMemoryTwoPhaseParticipant,
    payment: InMemoryTwoPhaseParticipant,
}

impl TestHarness {
    fn new() -> Self {
        let log = CallLog::new();
        let order = InMemoryTwoPhaseParticipant::with_log(Resource::Order, log.clone());
        let inventory = InMemoryTwoPhaseParticipant::with_log(Resource::Inventory, log.clone());
        let payment = InMemoryTwoPhaseParticipant::with_log(Resource::Payment, log.clone());

        let coordinator =
            TwoPhaseCoordinator::new(order.clone(), inventory.clone(), payment.clone());

        Self {
            coordinator,
            log,
            order,
            inventory,
            payment,
        }
    }

    fn participant(&self, resource: Resource) -> &InMemoryTwoPhaseParticipant {
        match resource {
            Resource::Order => &self.order,
            Resource::Inventory => &self.inventory,
            Resource::Payment => &self.payment,
        }
    }
}

fn request() -> TransactionRequest {
    TransactionRequest::new(7, 42, 2, Money::from_cents(4999))
}

#[tokio::test]
async fn test_all_prepared_commits_every_resource() {
    let h = TestHarness::new();

    let outcome = h.coordinator.place_order(&request()).await;

    assert!(outcome.is_success());
    assert_eq!(
        h.log.summary(),
        vec![
            "order.prepare",
            "inventory.prepare",
            "payment.prepare",
            "order.commit",
            "inventory.commit",
            "payment.commit",
        ]
    );
    let committed: Vec<_> = h
        .log
        .of(Operation::Commit)
        .into_iter()
        .filter_map(|call| call.id)
        .collect();
    assert_eq!(committed, vec!["ORD-TX-0001", "RES-TX-0001", "PAY-TX-0001"]);
}

#[tokio::test]
async fn test_inventory_failure_aborts_order_and_skips_payment() {
    let h = TestHarness::new();
    h.inventory
        .fail_prepare(ParticipantError::rejected(400, "Insufficient stock."));

    let outcome = h.coordinator.place_order(&request()).await;

    assert_eq!(outcome.failed_at.as_deref(), Some("InventoryPrepare"));
    assert_eq!(
        h.log.summary(),
        vec!["order.prepare", "inventory.prepare", "order.abort"]
    );
    assert_eq!(h.order.count(TransactionState::Aborted), 1);
}

#[tokio::test]
async fn test_payment_failure_aborts_in_reverse_order_of_preparation() {
    let h = TestHarness::new();
    h.payment
        .fail_prepare(ParticipantError::rejected(402, "Payment declined"));

    let outcome = h.coordinator.place_order(&request()).await;

    assert_eq!(outcome.failed_at.as_deref(), Some("PaymentPrepare"));
    assert_eq!(
        h.log.summary(),
        vec![
            "order.prepare",
            "inventory.prepare",
            "payment.prepare",
            "inventory.abort",
            "order.abort",
        ]
    );
    assert_eq!(h.order.count(TransactionState::Aborted), 1);
    assert_eq!(h.inventory.count(TransactionState::Aborted), 1);
}

#[tokio::test]
async fn test_no_commit_or_abort_for_resources_that_did_not_prepare() {
    let failures = [
        ParticipantError::rejected(400, "rejected"),
        ParticipantError::Transport("connection refused".into()),
        ParticipantError::Decode("missing field `transactionId`".into()),
    ];

    for failing in Resource::ALL {
        for failure in &failures {
            let h = TestHarness::new();
            h.participant(failing).fail_prepare(failure.clone());

            let outcome = h.coordinator.place_order(&request()).await;
            assert!(!outcome.is_success());

            for call in h.log.calls() {
                if call.resource == failing {
                    assert_eq!(call.operation, Operation::Prepare, "{failing}: {call}");
                }
            }
            assert!(h.log.of(Operation::Commit).is_empty());

            // Every abort addresses an ID that some resource actually handed out.
            for call in h.log.of(Operation::Abort) {
                let id = call.id.expect("abort carries an id");
                let state = h.participant(call.resource).transaction_state(&id.as_str().into());
                assert_eq!(state, Some(TransactionState::Aborted), "{failing}: {id}");
            }
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_elapsed_time_grows_with_call_latency() {
    let fast = TestHarness::new();
    let fast_outcome = fast.coordinator.place_order(&request()).await;

    let slow = TestHarness::new();
    for resource in Resource::ALL {
        slow.participant(resource)
            .set_latency(Duration::from_millis(50));
    }
    let slow_outcome = slow.coordinator.place_order(&request()).await;

    assert!(slow_outcome.is_success());
    // Three prepares and three commits, each delayed by 50ms.
    assert!(slow_outcome.elapsed_milliseconds >= 300);
    assert!(slow_outcome.elapsed_milliseconds > fast_outcome.elapsed_milliseconds);
}

#[tokio::test]
async fn test_concurrent_attempts_are_independent() {
    let h = TestHarness::new();
    let coordinator = Arc::new(h.coordinator);

    let handles: Vec<_> = (0..8)
        .map(|user_id| {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move {
                let request = TransactionRequest::new(user_id, 42, 1, Money::from_cents(1000));
                coordinator.place_order(&request).await
            })
        })
        .collect();

    let mut attempt_ids = HashSet::new();
    for handle in handles {
        let outcome = handle.await.unwrap();
        assert!(outcome.is_success());
        attempt_ids.insert(outcome.attempt_id);
    }

    assert_eq!(attempt_ids.len(), 8);
    assert_eq!(h.order.count(TransactionState::Committed), 8);
    assert_eq!(h.inventory.count(TransactionState::Committed), 8);
    assert_eq!(h.payment.count(TransactionState::Committed), 8);
}
