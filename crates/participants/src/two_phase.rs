//! Two-phase commit participant contract.

use async_trait::async_trait;
use common::{Resource, ResourcePayload, TransactionId};
use serde::{Deserialize, Serialize};

use crate::error::ParticipantError;

/// A tentative change that a resource manager has durably prepared.
///
/// Only the success branch of a prepare carries a transaction ID, so a
/// coordinator cannot hold an ID for a resource that did not prepare.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedTransaction {
    pub transaction_id: TransactionId,
    /// Identifier of the entity the prepared change creates (e.g. the order ID).
    #[serde(default)]
    pub entity_id: Option<i64>,
}

/// Result of a prepare call.
pub type PrepareResult = Result<PreparedTransaction, ParticipantError>;

/// A resource manager able to prepare, commit and abort a tentative change.
#[async_trait]
pub trait TwoPhaseParticipant: Send + Sync {
    /// Which resource manager this participant talks to.
    fn resource(&self) -> Resource;

    /// Tentatively applies the change and holds it under a transaction ID.
    async fn prepare(&self, payload: &ResourcePayload) -> PrepareResult;

    /// Makes a prepared change permanent.
    async fn commit(&self, transaction_id: &TransactionId) -> Result<(), ParticipantError>;

    /// Discards a prepared change.
    ///
    /// Aborting an unknown or already finalized transaction succeeds.
    async fn abort(&self, transaction_id: &TransactionId) -> Result<(), ParticipantError>;
}
