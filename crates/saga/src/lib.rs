//! Saga orchestration for the place-order transaction.
//!
//! The saga runs three locally-committing steps in order:
//! 1. Create the order
//! 2. Reserve inventory
//! 3. Process payment (against the order ID from step 1)
//!
//! Every completed step registers a compensating action. If a later step
//! fails, the registered actions run in reverse order and the attempt is
//! reported as failed at the step that broke.
//!
//! Compensation state lives only in memory for the duration of one attempt;
//! a process crash mid-saga leaves completed steps uncompensated.

pub mod compensation;
pub mod orchestrator;
pub mod place_order;
pub mod state;
pub mod step;

pub use compensation::{CompensatingAction, CompensationStack};
pub use orchestrator::{SagaOrchestrator, SagaRun};
pub use state::SagaState;
pub use step::{CompensationResult, CompensationStatus, SagaStepResult, StepLog, StepStatus};
