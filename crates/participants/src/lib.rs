//! Resource manager clients.
//!
//! A coordinator talks to each resource manager (order, inventory, payment)
//! through one of two narrow contracts:
//!
//! - [`TwoPhaseParticipant`]: `prepare` / `commit` / `abort`
//! - [`SagaParticipant`]: `execute` / `compensate`
//!
//! Every call resolves to a value or a classified [`ParticipantError`];
//! rejections and transport faults are data, never panics. Clients hold no
//! per-attempt state and can be shared across concurrent attempts.

pub mod error;
pub mod http;
pub mod memory;
pub mod saga;
pub mod timeout;
pub mod two_phase;

pub use error::ParticipantError;
pub use http::{HttpSagaParticipant, HttpTwoPhaseParticipant};
pub use memory::{
    Call, CallLog, EntryState, InMemorySagaParticipant, InMemoryTwoPhaseParticipant, Operation,
    TransactionState,
};
pub use saga::{ExecutionReceipt, SagaParticipant};
pub use timeout::{CoordinatorConfig, DEFAULT_CALL_TIMEOUT, bounded};
pub use two_phase::{PrepareResult, PreparedTransaction, TwoPhaseParticipant};
