//! Saga participant contract.

use async_trait::async_trait;
use common::{Resource, ResourcePayload};

use crate::error::ParticipantError;

/// Acknowledgement of a locally committed saga step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReceipt {
    /// Identifier of what the step produced; the handle for compensating it.
    pub id: String,
    pub status: Option<String>,
}

/// A resource manager that applies changes immediately and can undo them
/// with a compensating operation.
#[async_trait]
pub trait SagaParticipant: Send + Sync {
    fn resource(&self) -> Resource;

    /// Applies the change and returns the produced identifier.
    async fn execute(&self, payload: &ResourcePayload) -> Result<ExecutionReceipt, ParticipantError>;

    /// Semantically reverses a previously executed change.
    ///
    /// Compensating an unknown or already compensated ID succeeds.
    async fn compensate(&self, id: &str) -> Result<(), ParticipantError>;
}
