//! Two-phase commit coordinator for the place-order transaction.

use common::{
    AttemptId, Resource, ResourcePayload, ResourceStatus, Stopwatch, TerminalState,
    TransactionOutcome, TransactionRequest, report,
};
use participants::{CoordinatorConfig, PreparedTransaction, TwoPhaseParticipant, bounded};

use crate::ledger::PreparedLedger;
use crate::place_order;
use crate::state::TwoPhaseState;

/// Progress of a single attempt. Lives on the stack of `place_order`.
struct Attempt {
    id: AttemptId,
    state: TwoPhaseState,
    ledger: PreparedLedger,
    stopwatch: Stopwatch,
}

impl Attempt {
    fn start() -> Self {
        Self {
            id: AttemptId::new(),
            state: TwoPhaseState::Init,
            ledger: PreparedLedger::new(),
            stopwatch: Stopwatch::start(),
        }
    }

    fn enter(&mut self, next: TwoPhaseState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal 2pc transition {} -> {}",
            self.state,
            next
        );
        tracing::debug!(from = %self.state, to = %next, "phase transition");
        self.state = next;
    }

    fn finish(self, terminal: TerminalState) -> TransactionOutcome {
        let elapsed = self.stopwatch.elapsed();
        metrics::histogram!("two_phase_duration_seconds").record(elapsed.as_secs_f64());
        report(self.id, terminal, elapsed).with_resource_status(self.ledger.into_statuses())
    }
}

/// Drives prepare / commit / abort across the order, inventory and payment
/// resource managers.
///
/// Prepares run strictly in order (order, inventory, payment) because the
/// payment payload needs the order ID produced by the order prepare. The
/// coordinator keeps no state between attempts and can be shared.
pub struct TwoPhaseCoordinator<O, I, P>
where
    O: TwoPhaseParticipant,
    I: TwoPhaseParticipant,
    P: TwoPhaseParticipant,
{
    order: O,
    inventory: I,
    payment: P,
    config: CoordinatorConfig,
}

impl<O, I, P> TwoPhaseCoordinator<O, I, P>
where
    O: TwoPhaseParticipant,
    I: TwoPhaseParticipant,
    P: TwoPhaseParticipant,
{
    /// Creates a coordinator with the default call timeout.
    pub fn new(order: O, inventory: I, payment: P) -> Self {
        Self::with_config(order, inventory, payment, CoordinatorConfig::default())
    }

    pub fn with_config(order: O, inventory: I, payment: P, config: CoordinatorConfig) -> Self {
        Self {
            order,
            inventory,
            payment,
            config,
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Runs one attempt to its terminal state.
    ///
    /// Never fails: every rejection, transport fault or timeout is folded
    /// into the returned outcome.
    #[tracing::instrument(
        skip_all,
        fields(protocol = place_order::PROTOCOL, attempt_id = tracing::field::Empty)
    )]
    pub async fn place_order(&self, request: &TransactionRequest) -> TransactionOutcome {
        let mut attempt = Attempt::start();
        tracing::Span::current().record("attempt_id", tracing::field::display(attempt.id));
        metrics::counter!("two_phase_attempts_total").increment(1);

        attempt.enter(TwoPhaseState::PrepareOrder);
        let order = match self.prepare(&mut attempt, request.order_payload()).await {
            Ok(prepared) => prepared,
            Err(reason) => return self.abort_prior(attempt, reason).await,
        };
        let Some(order_id) = order.entity_id else {
            tracing::warn!(
                transaction_id = %order.transaction_id,
                "order prepared without an order id, payment cannot be bound"
            );
            let reason = "order resource manager returned no order id".to_string();
            return self.abort_prior(attempt, reason).await;
        };

        attempt.enter(TwoPhaseState::PrepareInventory);
        if let Err(reason) = self
            .prepare(&mut attempt, request.inventory_reservation())
            .await
        {
            return self.abort_prior(attempt, reason).await;
        }

        attempt.enter(TwoPhaseState::PreparePayment);
        if let Err(reason) = self
            .prepare(&mut attempt, request.payment_for(order_id.to_string()))
            .await
        {
            return self.abort_prior(attempt, reason).await;
        }

        attempt.enter(TwoPhaseState::CommitAll);
        self.commit_all(attempt).await
    }

    fn participant(&self, resource: Resource) -> &dyn TwoPhaseParticipant {
        match resource {
            Resource::Order => &self.order,
            Resource::Inventory => &self.inventory,
            Resource::Payment => &self.payment,
        }
    }

    /// Prepares one resource, recording its transaction ID only on success.
    async fn prepare(
        &self,
        attempt: &mut Attempt,
        payload: ResourcePayload,
    ) -> Result<PreparedTransaction, String> {
        let resource = payload.resource();
        debug_assert_eq!(attempt.state.resource(), Some(resource));

        let participant = self.participant(resource);
        match bounded(self.config.call_timeout, participant.prepare(&payload)).await {
            Ok(prepared) => {
                tracing::info!(%resource, transaction_id = %prepared.transaction_id, "prepared");
                attempt
                    .ledger
                    .record_prepared(resource, prepared.transaction_id.clone());
                Ok(prepared)
            }
            Err(err) => {
                let reason = err.to_string();
                let status = if err.is_rejection() {
                    tracing::warn!(%resource, error = %err, "prepare rejected");
                    ResourceStatus::PrepareFailed(reason.clone())
                } else {
                    tracing::error!(%resource, error = %err, "prepare failed");
                    ResourceStatus::PrepareException(reason.clone())
                };
                attempt.ledger.set_status(resource, status);
                Err(reason)
            }
        }
    }

    /// Aborts every prepared resource, newest first, and reports the failure
    /// against the phase that was running.
    async fn abort_prior(&self, mut attempt: Attempt, reason: String) -> TransactionOutcome {
        let failed_at = attempt
            .state
            .failure_tag()
            .unwrap_or(attempt.state.as_str());
        attempt.enter(TwoPhaseState::Aborted);

        let prepared = attempt.ledger.prepared().to_vec();
        for (resource, transaction_id) in prepared.iter().rev() {
            let participant = self.participant(*resource);
            let status = match bounded(self.config.call_timeout, participant.abort(transaction_id))
                .await
            {
                Ok(()) => {
                    tracing::info!(%resource, %transaction_id, "aborted");
                    ResourceStatus::Aborted
                }
                Err(err) => {
                    metrics::counter!("two_phase_abort_failures_total").increment(1);
                    tracing::error!(
                        %resource,
                        %transaction_id,
                        error = %err,
                        "abort failed, prepared transaction left in doubt; manual intervention required"
                    );
                    ResourceStatus::AbortFailed(err.to_string())
                }
            };
            attempt.ledger.set_status(*resource, status);
        }

        metrics::counter!("two_phase_aborted_total").increment(1);
        tracing::warn!(failed_at, %reason, "attempt aborted");
        attempt.finish(TerminalState::failed(failed_at, reason))
    }

    /// Commits every prepared resource, in order, without short-circuiting.
    ///
    /// There is no durable decision log, so failed commits are reported and
    /// left for manual reconciliation instead of being retried.
    async fn commit_all(&self, mut attempt: Attempt) -> TransactionOutcome {
        let mut exception: Option<String> = None;

        let prepared = attempt.ledger.prepared().to_vec();
        for (resource, transaction_id) in &prepared {
            let participant = self.participant(*resource);
            let status = match bounded(self.config.call_timeout, participant.commit(transaction_id))
                .await
            {
                Ok(()) => {
                    tracing::info!(%resource, %transaction_id, "committed");
                    ResourceStatus::Committed
                }
                Err(err) if err.is_rejection() => {
                    metrics::counter!("two_phase_commit_failures_total").increment(1);
                    tracing::error!(
                        %resource,
                        %transaction_id,
                        error = %err,
                        "commit rejected after prepare; manual reconciliation required"
                    );
                    ResourceStatus::CommitFailed(err.to_string())
                }
                Err(err) => {
                    metrics::counter!("two_phase_commit_failures_total").increment(1);
                    tracing::error!(
                        %resource,
                        %transaction_id,
                        error = %err,
                        "commit outcome unknown; manual intervention required"
                    );
                    exception.get_or_insert_with(|| format!("{resource}: {err}"));
                    ResourceStatus::CommitException(err.to_string())
                }
            };
            attempt.ledger.set_status(*resource, status);
        }

        attempt.enter(TwoPhaseState::Done);
        match exception {
            Some(reason) => {
                tracing::error!(%reason, "commit phase failed");
                attempt.finish(TerminalState::failed(place_order::COMMIT_PHASE, reason))
            }
            None => {
                metrics::counter!("two_phase_committed_total").increment(1);
                tracing::info!("commit phase finished");
                attempt.finish(TerminalState::Succeeded)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Money, STATUS_FAILED, STATUS_OK, TransactionId};
    use participants::{InMemoryTwoPhaseParticipant, ParticipantError, TransactionState};

    type TestCoordinator = TwoPhaseCoordinator<
        InMemoryTwoPhaseParticipant,
        InMemoryTwoPhaseParticipant,
        InMemoryTwoPhaseParticipant,
    >;

    fn setup() -> (
        TestCoordinator,
        InMemoryTwoPhaseParticipant,
        InMemoryTwoPhaseParticipant,
        InMemoryTwoPhaseParticipant,
    ) {
        let order = InMemoryTwoPhaseParticipant::new(Resource::Order);
        let inventory = InMemoryTwoPhaseParticipant::new(Resource::Inventory);
        let payment = InMemoryTwoPhaseParticipant::new(Resource::Payment);
        let coordinator =
            TwoPhaseCoordinator::new(order.clone(), inventory.clone(), payment.clone());
        (coordinator, order, inventory, payment)
    }

    fn request() -> TransactionRequest {
        TransactionRequest::new(7, 42, 2, Money::from_cents(4999))
    }

    fn status(outcome: &TransactionOutcome, resource: Resource) -> ResourceStatus {
        outcome.per_resource_status.as_ref().unwrap()[&resource].clone()
    }

    #[tokio::test]
    async fn test_happy_path() {
        let (coordinator, order, inventory, payment) = setup();

        let outcome = coordinator.place_order(&request()).await;

        assert_eq!(outcome.status_code, STATUS_OK);
        assert_eq!(outcome.failed_at, None);
        for resource in Resource::ALL {
            assert_eq!(status(&outcome, resource), ResourceStatus::Committed);
        }
        assert_eq!(order.count(TransactionState::Committed), 1);
        assert_eq!(inventory.count(TransactionState::Committed), 1);
        assert_eq!(payment.count(TransactionState::Committed), 1);
    }

    #[tokio::test]
    async fn test_payment_is_bound_to_prepared_order_id() {
        let (coordinator, _, _, payment) = setup();

        coordinator.place_order(&request()).await;

        assert_eq!(
            payment.committed_payloads(),
            vec![request().payment_for("1")]
        );
    }

    #[tokio::test]
    async fn test_order_failure_aborts_nothing() {
        let (coordinator, order, inventory, payment) = setup();
        order.fail_prepare(ParticipantError::rejected(400, "invalid order"));

        let outcome = coordinator.place_order(&request()).await;

        assert_eq!(outcome.status_code, STATUS_FAILED);
        assert_eq!(outcome.failed_at.as_deref(), Some("OrderPrepare"));
        assert_eq!(outcome.error.as_deref(), Some("HTTP 400: invalid order"));
        assert!(order.log().of(participants::Operation::Abort).is_empty());
        assert!(inventory.log().is_empty());
        assert!(payment.log().is_empty());
        assert_eq!(status(&outcome, Resource::Inventory), ResourceStatus::NotAttempted);
    }

    #[tokio::test]
    async fn test_inventory_failure_aborts_order() {
        let (coordinator, order, inventory, payment) = setup();
        inventory.fail_prepare(ParticipantError::rejected(400, "Insufficient stock."));

        let outcome = coordinator.place_order(&request()).await;

        assert_eq!(outcome.failed_at.as_deref(), Some("InventoryPrepare"));
        assert_eq!(order.count(TransactionState::Aborted), 1);
        assert!(payment.log().is_empty());
        assert_eq!(status(&outcome, Resource::Order), ResourceStatus::Aborted);
        assert_eq!(
            status(&outcome, Resource::Inventory),
            ResourceStatus::PrepareFailed("HTTP 400: Insufficient stock.".into())
        );
    }

    #[tokio::test]
    async fn test_payment_failure_aborts_order_and_inventory() {
        let (coordinator, order, inventory, payment) = setup();
        payment.fail_prepare(ParticipantError::Transport("connection reset".into()));

        let outcome = coordinator.place_order(&request()).await;

        assert_eq!(outcome.failed_at.as_deref(), Some("PaymentPrepare"));
        assert_eq!(order.count(TransactionState::Aborted), 1);
        assert_eq!(inventory.count(TransactionState::Aborted), 1);
        assert_eq!(
            status(&outcome, Resource::Payment),
            ResourceStatus::PrepareException("transport error: connection reset".into())
        );
    }

    #[tokio::test]
    async fn test_missing_order_id_aborts_order() {
        let (coordinator, order, inventory, _) = setup();
        order.set_omit_entity_id(true);

        let outcome = coordinator.place_order(&request()).await;

        assert_eq!(outcome.failed_at.as_deref(), Some("OrderPrepare"));
        assert_eq!(order.count(TransactionState::Aborted), 1);
        assert!(inventory.log().is_empty());
    }

    #[tokio::test]
    async fn test_commit_rejection_is_recorded_but_not_fatal() {
        let (coordinator, order, inventory, payment) = setup();
        inventory.fail_commit(ParticipantError::rejected(500, "commit prepared failed"));

        let outcome = coordinator.place_order(&request()).await;

        assert_eq!(outcome.status_code, STATUS_OK);
        assert_eq!(order.count(TransactionState::Committed), 1);
        assert_eq!(payment.count(TransactionState::Committed), 1);
        assert_eq!(
            status(&outcome, Resource::Inventory),
            ResourceStatus::CommitFailed("HTTP 500: commit prepared failed".into())
        );
    }

    #[tokio::test]
    async fn test_commit_exception_fails_commit_phase_without_abort() {
        let (coordinator, order, _, payment) = setup();
        order.fail_commit(ParticipantError::Transport("connection refused".into()));

        let outcome = coordinator.place_order(&request()).await;

        assert_eq!(outcome.status_code, STATUS_FAILED);
        assert_eq!(outcome.failed_at.as_deref(), Some("CommitPhase"));
        assert_eq!(
            outcome.error.as_deref(),
            Some("order: transport error: connection refused")
        );
        // Remaining commits are still delivered and nothing is aborted.
        assert_eq!(payment.count(TransactionState::Committed), 1);
        assert!(order.log().of(participants::Operation::Abort).is_empty());
        assert!(payment.log().of(participants::Operation::Abort).is_empty());
    }

    #[tokio::test]
    async fn test_abort_failure_is_reported_per_resource() {
        let (coordinator, order, _, payment) = setup();
        order.fail_abort(ParticipantError::Transport("connection refused".into()));
        payment.fail_prepare(ParticipantError::rejected(402, "declined"));

        let outcome = coordinator.place_order(&request()).await;

        assert_eq!(outcome.failed_at.as_deref(), Some("PaymentPrepare"));
        assert_eq!(
            status(&outcome, Resource::Order),
            ResourceStatus::AbortFailed("transport error: connection refused".into())
        );
        assert_eq!(status(&outcome, Resource::Inventory), ResourceStatus::Aborted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_prepare_times_out() {
        let order = InMemoryTwoPhaseParticipant::new(Resource::Order);
        let inventory = InMemoryTwoPhaseParticipant::new(Resource::Inventory);
        let payment = InMemoryTwoPhaseParticipant::new(Resource::Payment);
        inventory.set_latency(std::time::Duration::from_secs(10));
        let coordinator = TwoPhaseCoordinator::with_config(
            order.clone(),
            inventory,
            payment,
            CoordinatorConfig {
                call_timeout: std::time::Duration::from_secs(1),
            },
        );

        let outcome = coordinator.place_order(&request()).await;

        assert_eq!(outcome.failed_at.as_deref(), Some("InventoryPrepare"));
        assert_eq!(outcome.error.as_deref(), Some("call timed out after 1s"));
        assert_eq!(order.count(TransactionState::Aborted), 1);
    }

    #[tokio::test]
    async fn test_abort_uses_the_returned_transaction_id() {
        let (coordinator, order, inventory, _) = setup();
        inventory.fail_prepare(ParticipantError::rejected(400, "Insufficient stock."));

        coordinator.place_order(&request()).await;

        let aborts = order.log().of(participants::Operation::Abort);
        assert_eq!(aborts.len(), 1);
        assert_eq!(aborts[0].id.as_deref(), Some("ORD-TX-0001"));
        assert_eq!(
            order.transaction_state(&TransactionId::new("ORD-TX-0001")),
            Some(TransactionState::Aborted)
        );
    }
}
