//! Attempt-local record of prepared transactions.

use std::collections::BTreeMap;

use common::{Resource, ResourceStatus, TransactionId};

/// What one attempt knows about its participants.
///
/// A transaction ID enters the ledger only through [`record_prepared`], so
/// commit and abort can only ever address IDs a resource manager handed out.
///
/// [`record_prepared`]: PreparedLedger::record_prepared
#[derive(Debug, Clone)]
pub struct PreparedLedger {
    prepared: Vec<(Resource, TransactionId)>,
    statuses: BTreeMap<Resource, ResourceStatus>,
}

impl Default for PreparedLedger {
    fn default() -> Self {
        Self {
            prepared: Vec::new(),
            statuses: Resource::ALL
                .into_iter()
                .map(|resource| (resource, ResourceStatus::NotAttempted))
                .collect(),
        }
    }
}

impl PreparedLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a resource that answered Prepared.
    pub fn record_prepared(&mut self, resource: Resource, transaction_id: TransactionId) {
        self.prepared.push((resource, transaction_id));
        self.statuses.insert(resource, ResourceStatus::Prepared);
    }

    /// Updates the reported status of a resource.
    pub fn set_status(&mut self, resource: Resource, status: ResourceStatus) {
        self.statuses.insert(resource, status);
    }

    /// Prepared transactions in order of preparation.
    pub fn prepared(&self) -> &[(Resource, TransactionId)] {
        &self.prepared
    }

    pub fn into_statuses(self) -> BTreeMap<Resource, ResourceStatus> {
        self.statuses
    }
}
