//! In-memory resource managers for tests and local runs.
//!
//! Each participant keeps its records behind a shared lock, can be told to
//! fail a given operation or to answer slowly, and writes every call it
//! receives into a [`CallLog`] that may be shared across participants so
//! the global call order of an attempt can be asserted.

pub mod saga;
pub mod two_phase;

use std::sync::Arc;
use std::time::Duration;

use common::Resource;
use parking_lot::Mutex;

pub use saga::{EntryState, InMemorySagaParticipant};
pub use two_phase::{InMemoryTwoPhaseParticipant, TransactionState};

/// Operation received by an in-memory participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Prepare,
    Commit,
    Abort,
    Execute,
    Compensate,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Prepare => "prepare",
            Operation::Commit => "commit",
            Operation::Abort => "abort",
            Operation::Execute => "execute",
            Operation::Compensate => "compensate",
        }
    }
}

/// One received call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub resource: Resource,
    pub operation: Operation,
    /// Transaction or entity ID the call referred to, if any.
    pub id: Option<String>,
}

impl std::fmt::Display for Call {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.resource, self.operation.as_str())
    }
}

/// Ordered record of calls, cheap to clone and share.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, resource: Resource, operation: Operation, id: Option<&str>) {
        self.calls.lock().push(Call {
            resource,
            operation,
            id: id.map(str::to_string),
        });
    }

    /// All calls in the order they were received.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Calls rendered as `resource.operation`, in order.
    pub fn summary(&self) -> Vec<String> {
        self.calls.lock().iter().map(Call::to_string).collect()
    }

    /// Calls of one operation, in order.
    pub fn of(&self, operation: Operation) -> Vec<Call> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.operation == operation)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.lock().is_empty()
    }
}

async fn delay(latency: Duration) {
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }
}

fn id_prefix(resource: Resource) -> &'static str {
    match resource {
        Resource::Order => "ORD",
        Resource::Inventory => "RES",
        Resource::Payment => "PAY",
    }
}
