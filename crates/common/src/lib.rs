//! Shared types for the transaction coordinators.
//!
//! Holds the caller's [`TransactionRequest`], the payloads derived from it for
//! each resource manager, and the result reporter that shapes every attempt
//! into a [`TransactionOutcome`].

pub mod report;
pub mod request;
pub mod types;

pub use report::{
    ResourceStatus, STATUS_FAILED, STATUS_OK, Stopwatch, TerminalState, TransactionOutcome, report,
};
pub use request::{
    InventoryOperation, InventoryPayload, Money, OrderPayload, PaymentPayload, Resource,
    ResourcePayload, TransactionRequest,
};
pub use types::{AttemptId, TransactionId};
