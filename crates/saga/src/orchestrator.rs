//! Saga orchestrator for the place-order transaction.

use std::sync::Arc;
use std::time::Duration;

use common::{
    AttemptId, ResourcePayload, Stopwatch, TerminalState, TransactionOutcome, TransactionRequest,
    report,
};
use participants::{CoordinatorConfig, ExecutionReceipt, SagaParticipant, bounded};
use serde::Serialize;

use crate::compensation::CompensationStack;
use crate::place_order;
use crate::state::SagaState;
use crate::step::{CompensationResult, SagaStepResult, StepLog};

/// Everything one saga attempt produced.
///
/// Serializes as the flat outcome followed by the step and compensation logs.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SagaRun {
    #[serde(flatten)]
    pub outcome: TransactionOutcome,
    pub state: SagaState,
    pub steps: Vec<SagaStepResult>,
    pub compensations: Vec<CompensationResult>,
}

struct Attempt {
    id: AttemptId,
    state: SagaState,
    steps: StepLog,
    compensations: CompensationStack,
    stopwatch: Stopwatch,
}

impl Attempt {
    fn start() -> Self {
        Self {
            id: AttemptId::new(),
            state: SagaState::NotStarted,
            steps: StepLog::new(),
            compensations: CompensationStack::new(),
            stopwatch: Stopwatch::start(),
        }
    }

    fn enter(&mut self, next: SagaState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal saga transition {} -> {}",
            self.state,
            next
        );
        tracing::debug!(from = %self.state, to = %next, "saga transition");
        self.state = next;
    }

    fn finish(self, terminal: TerminalState, compensations: Vec<CompensationResult>) -> SagaRun {
        let elapsed = self.stopwatch.elapsed();
        metrics::histogram!("saga_duration_seconds").record(elapsed.as_secs_f64());
        SagaRun {
            outcome: report(self.id, terminal, elapsed),
            state: self.state,
            steps: self.steps.into_steps(),
            compensations,
        }
    }
}

/// Runs the place-order saga: create order, reserve inventory, process
/// payment.
///
/// Each step commits locally at its resource manager. When a step completes,
/// its compensating action is pushed onto the attempt's stack; when a later
/// step fails, the stack is unwound newest first. Participants are held in
/// `Arc`s so compensating actions can own them.
pub struct SagaOrchestrator<O, I, P>
where
    O: SagaParticipant,
    I: SagaParticipant,
    P: SagaParticipant,
{
    order: Arc<O>,
    inventory: Arc<I>,
    payment: Arc<P>,
    config: CoordinatorConfig,
}

impl<O, I, P> SagaOrchestrator<O, I, P>
where
    O: SagaParticipant + 'static,
    I: SagaParticipant + 'static,
    P: SagaParticipant + 'static,
{
    pub fn new(order: O, inventory: I, payment: P) -> Self {
        Self::with_config(order, inventory, payment, CoordinatorConfig::default())
    }

    pub fn with_config(order: O, inventory: I, payment: P, config: CoordinatorConfig) -> Self {
        Self {
            order: Arc::new(order),
            inventory: Arc::new(inventory),
            payment: Arc::new(payment),
            config,
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Runs one attempt to its terminal state.
    ///
    /// Failures never escape as errors; they end in a compensated
    /// [`SagaRun`] whose outcome names the step that failed.
    #[tracing::instrument(
        skip_all,
        fields(saga_type = place_order::PROTOCOL, attempt_id = tracing::field::Empty)
    )]
    pub async fn place_order(&self, request: &TransactionRequest) -> SagaRun {
        let mut attempt = Attempt::start();
        tracing::Span::current().record("attempt_id", tracing::field::display(attempt.id));
        metrics::counter!("saga_executions_total").increment(1);
        attempt.enter(SagaState::Running);

        // Step 1: create the order
        let order = match self
            .run_step(
                &mut attempt,
                place_order::STEP_CREATE_ORDER,
                self.order.as_ref(),
                request.order_payload(),
            )
            .await
        {
            Ok(receipt) => receipt,
            Err(reason) => return self.fail(attempt, place_order::STEP_CREATE_ORDER, reason).await,
        };
        push_compensation(
            &mut attempt.compensations,
            place_order::STEP_CREATE_ORDER,
            &self.order,
            order.id.clone(),
            self.config.call_timeout,
        );

        // Step 2: reserve inventory
        let reservation = match self
            .run_step(
                &mut attempt,
                place_order::STEP_RESERVE_INVENTORY,
                self.inventory.as_ref(),
                request.inventory_reservation(),
            )
            .await
        {
            Ok(receipt) => receipt,
            Err(reason) => {
                return self
                    .fail(attempt, place_order::STEP_RESERVE_INVENTORY, reason)
                    .await;
            }
        };
        push_compensation(
            &mut attempt.compensations,
            place_order::STEP_RESERVE_INVENTORY,
            &self.inventory,
            reservation.id,
            self.config.call_timeout,
        );

        // Step 3: charge the payment against the created order
        let payment = match self
            .run_step(
                &mut attempt,
                place_order::STEP_PROCESS_PAYMENT,
                self.payment.as_ref(),
                request.payment_for(order.id),
            )
            .await
        {
            Ok(receipt) => receipt,
            Err(reason) => {
                return self
                    .fail(attempt, place_order::STEP_PROCESS_PAYMENT, reason)
                    .await;
            }
        };
        push_compensation(
            &mut attempt.compensations,
            place_order::STEP_PROCESS_PAYMENT,
            &self.payment,
            payment.id,
            self.config.call_timeout,
        );

        // Registered actions are dropped unrun once every step has completed.
        attempt.enter(SagaState::Completed);
        metrics::counter!("saga_completed_total").increment(1);
        tracing::info!("saga completed");
        attempt.finish(TerminalState::Succeeded, Vec::new())
    }

    async fn run_step(
        &self,
        attempt: &mut Attempt,
        step: &'static str,
        participant: &dyn SagaParticipant,
        payload: ResourcePayload,
    ) -> Result<ExecutionReceipt, String> {
        tracing::info!(step, "saga step started");
        match bounded(self.config.call_timeout, participant.execute(&payload)).await {
            Ok(receipt) => {
                tracing::info!(step, id = %receipt.id, "saga step completed");
                attempt.steps.completed(step, receipt.id.clone());
                Ok(receipt)
            }
            Err(err) => {
                if err.is_rejection() {
                    tracing::warn!(step, error = %err, "saga step rejected");
                } else {
                    tracing::error!(step, error = %err, "saga step failed");
                }
                let reason = err.to_string();
                attempt.steps.failed(step, reason.clone());
                Err(reason)
            }
        }
    }

    /// Unwinds the compensation stack and reports the attempt as failed at
    /// `step`.
    async fn fail(&self, mut attempt: Attempt, step: &'static str, reason: String) -> SagaRun {
        attempt.enter(SagaState::Compensating);
        let stack = std::mem::take(&mut attempt.compensations);
        tracing::warn!(step, %reason, pending = ?stack.pending(), "compensating saga");
        let compensations = stack.unwind().await;

        attempt.enter(SagaState::Failed);
        metrics::counter!("saga_failed_total").increment(1);
        tracing::warn!(failed_at = step, %reason, "saga failed");
        attempt.finish(TerminalState::failed(step, reason), compensations)
    }
}

/// Registers `participant.compensate(id)` as the undo for `step`.
fn push_compensation<T>(
    stack: &mut CompensationStack,
    step: &'static str,
    participant: &Arc<T>,
    id: String,
    timeout: Duration,
) where
    T: SagaParticipant + 'static,
{
    let participant = Arc::clone(participant);
    stack.push(step, move || async move {
        bounded(timeout, participant.compensate(&id)).await
    });
}
