//! In-memory two-phase commit resource manager.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{Resource, ResourcePayload, TransactionId};
use parking_lot::RwLock;

use super::{CallLog, Operation, delay, id_prefix};
use crate::error::ParticipantError;
use crate::two_phase::{PrepareResult, PreparedTransaction, TwoPhaseParticipant};

/// Lifecycle of a transaction held by the in-memory resource manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Prepared,
    Committed,
    Aborted,
}

#[derive(Debug, Default)]
struct InMemoryTwoPhaseState {
    transactions: HashMap<TransactionId, (TransactionState, ResourcePayload)>,
    next_id: u32,
    prepare_failure: Option<ParticipantError>,
    commit_failure: Option<ParticipantError>,
    abort_failure: Option<ParticipantError>,
    omit_entity_id: bool,
    latency: Duration,
}

/// In-memory two-phase commit participant for testing.
#[derive(Debug, Clone)]
pub struct InMemoryTwoPhaseParticipant {
    resource: Resource,
    state: Arc<RwLock<InMemoryTwoPhaseState>>,
    log: CallLog,
}

impl InMemoryTwoPhaseParticipant {
    /// Creates a participant with its own call log.
    pub fn new(resource: Resource) -> Self {
        Self::with_log(resource, CallLog::new())
    }

    /// Creates a participant that records its calls into a shared log.
    pub fn with_log(resource: Resource, log: CallLog) -> Self {
        Self {
            resource,
            state: Arc::default(),
            log,
        }
    }

    /// Makes every subsequent prepare fail with the given error.
    pub fn fail_prepare(&self, error: ParticipantError) {
        self.state.write().prepare_failure = Some(error);
    }

    /// Makes every subsequent commit fail with the given error.
    pub fn fail_commit(&self, error: ParticipantError) {
        self.state.write().commit_failure = Some(error);
    }

    /// Makes every subsequent abort fail with the given error.
    pub fn fail_abort(&self, error: ParticipantError) {
        self.state.write().abort_failure = Some(error);
    }

    /// Clears all injected failures.
    pub fn heal(&self) {
        let mut state = self.state.write();
        state.prepare_failure = None;
        state.commit_failure = None;
        state.abort_failure = None;
    }

    /// Answers prepares without an entity ID.
    pub fn set_omit_entity_id(&self, omit: bool) {
        self.state.write().omit_entity_id = omit;
    }

    /// Delays every call by the given duration.
    pub fn set_latency(&self, latency: Duration) {
        self.state.write().latency = latency;
    }

    pub fn log(&self) -> &CallLog {
        &self.log
    }

    /// Returns the state of a transaction, if it was ever prepared here.
    pub fn transaction_state(&self, transaction_id: &TransactionId) -> Option<TransactionState> {
        self.state
            .read()
            .transactions
            .get(transaction_id)
            .map(|(state, _)| *state)
    }

    /// Returns the number of transactions currently in the given state.
    pub fn count(&self, wanted: TransactionState) -> usize {
        self.state
            .read()
            .transactions
            .values()
            .filter(|(state, _)| *state == wanted)
            .count()
    }

    /// Returns the payloads of all committed transactions.
    pub fn committed_payloads(&self) -> Vec<ResourcePayload> {
        self.state
            .read()
            .transactions
            .values()
            .filter(|(state, _)| *state == TransactionState::Committed)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    fn latency(&self) -> Duration {
        self.state.read().latency
    }
}

#[async_trait]
impl TwoPhaseParticipant for InMemoryTwoPhaseParticipant {
    fn resource(&self) -> Resource {
        self.resource
    }

    async fn prepare(&self, payload: &ResourcePayload) -> PrepareResult {
        self.log.record(self.resource, Operation::Prepare, None);
        delay(self.latency()).await;

        let mut state = self.state.write();
        if let Some(error) = state.prepare_failure.clone() {
            return Err(error);
        }

        state.next_id += 1;
        let entity_id = i64::from(state.next_id);
        let transaction_id =
            TransactionId::new(format!("{}-TX-{:04}", id_prefix(self.resource), state.next_id));
        state.transactions.insert(
            transaction_id.clone(),
            (TransactionState::Prepared, payload.clone()),
        );

        Ok(PreparedTransaction {
            transaction_id,
            entity_id: (!state.omit_entity_id).then_some(entity_id),
        })
    }

    async fn commit(&self, transaction_id: &TransactionId) -> Result<(), ParticipantError> {
        self.log
            .record(self.resource, Operation::Commit, Some(transaction_id.as_str()));
        delay(self.latency()).await;

        let mut state = self.state.write();
        if let Some(error) = state.commit_failure.clone() {
            return Err(error);
        }

        match state.transactions.get_mut(transaction_id) {
            Some((current @ TransactionState::Prepared, _)) => {
                *current = TransactionState::Committed;
                Ok(())
            }
            Some((TransactionState::Committed, _)) => Ok(()),
            Some((TransactionState::Aborted, _)) => Err(ParticipantError::rejected(
                409,
                format!("transaction {transaction_id} was aborted"),
            )),
            None => Err(ParticipantError::rejected(
                404,
                format!("prepared transaction {transaction_id} does not exist"),
            )),
        }
    }

    async fn abort(&self, transaction_id: &TransactionId) -> Result<(), ParticipantError> {
        self.log
            .record(self.resource, Operation::Abort, Some(transaction_id.as_str()));
        delay(self.latency()).await;

        let mut state = self.state.write();
        if let Some(error) = state.abort_failure.clone() {
            return Err(error);
        }

        if let Some((current @ TransactionState::Prepared, _)) =
            state.transactions.get_mut(transaction_id)
        {
            *current = TransactionState::Aborted;
        }
        Ok(())
    }
}
