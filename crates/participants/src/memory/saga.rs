//! In-memory saga resource manager.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{Resource, ResourcePayload};
use parking_lot::RwLock;

use super::{CallLog, Operation, delay, id_prefix};
use crate::error::ParticipantError;
use crate::saga::{ExecutionReceipt, SagaParticipant};

/// Lifecycle of an entry created by a saga step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Active,
    Compensated,
}

#[derive(Debug, Default)]
struct InMemorySagaState {
    entries: HashMap<String, (EntryState, ResourcePayload)>,
    next_id: u32,
    execute_failure: Option<ParticipantError>,
    compensate_failure: Option<ParticipantError>,
    latency: Duration,
}

/// In-memory saga participant for testing.
#[derive(Debug, Clone)]
pub struct InMemorySagaParticipant {
    resource: Resource,
    state: Arc<RwLock<InMemorySagaState>>,
    log: CallLog,
}

impl InMemorySagaParticipant {
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

    /// Makes every subsequent execute fail with the given error.
    pub fn fail_execute(&self, error: ParticipantError) {
        self.state.write().execute_failure = Some(error);
    }

    /// Makes every subsequent compensate fail with the given error.
    pub fn fail_compensate(&self, error: ParticipantError) {
        self.state.write().compensate_failure = Some(error);
    }

    /// Clears all injected failures.
    pub fn heal(&self) {
        let mut state = self.state.write();
        state.execute_failure = None;
        state.compensate_failure = None;
    }

    /// Delays every call by the given duration.
    pub fn set_latency(&self, latency: Duration) {
        self.state.write().latency = latency;
    }

    pub fn log(&self) -> &CallLog {
        &self.log
    }

    pub fn entry_state(&self, id: &str) -> Option<EntryState> {
        self.state.read().entries.get(id).map(|(state, _)| *state)
    }

    /// Returns the number of entries that are in effect (not compensated).
    pub fn active_count(&self) -> usize {
        self.count(EntryState::Active)
    }

    pub fn compensated_count(&self) -> usize {
        self.count(EntryState::Compensated)
    }

    /// Returns the payload an entry was created from.
    pub fn payload_of(&self, id: &str) -> Option<ResourcePayload> {
        self.state
            .read()
            .entries
            .get(id)
            .map(|(_, payload)| payload.clone())
    }

    fn count(&self, wanted: EntryState) -> usize {
        self.state
            .read()
            .entries
            .values()
            .filter(|(state, _)| *state == wanted)
            .count()
    }

    fn latency(&self) -> Duration {
        self.state.read().latency
    }
}

#[async_trait]
impl SagaParticipant for InMemorySagaParticipant {
    fn resource(&self) -> Resource {
        self.resource
    }

    async fn execute(&self, payload: &ResourcePayload) -> Result<ExecutionReceipt, ParticipantError> {
        self.log.record(self.resource, Operation::Execute, None);
        delay(self.latency()).await;

        let mut state = self.state.write();
        if let Some(error) = state.execute_failure.clone() {
            return Err(error);
        }

        state.next_id += 1;
        let id = format!("{}-{:04}", id_prefix(self.resource), state.next_id);
        state
            .entries
            .insert(id.clone(), (EntryState::Active, payload.clone()));

        Ok(ExecutionReceipt {
            id,
            status: Some("CONFIRMED".to_string()),
        })
    }

    async fn compensate(&self, id: &str) -> Result<(), ParticipantError> {
        self.log.record(self.resource, Operation::Compensate, Some(id));
        delay(self.latency()).await;

        let mut state = self.state.write();
        if let Some(error) = state.compensate_failure.clone() {
            return Err(error);
        }

        if let Some((current, _)) = state.entries.get_mut(id) {
            *current = EntryState::Compensated;
        }
        Ok(())
    }
}
