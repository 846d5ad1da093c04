//! Two-phase commit for the place-order transaction.
//!
//! The coordinator prepares the three resource managers in a fixed order:
//! 1. Order
//! 2. Inventory
//! 3. Payment (bound to the order ID from step 1)
//!
//! If every prepare succeeds, all three are committed. Otherwise the
//! resources that did prepare are aborted, newest first, and the attempt is
//! reported as failed at the phase that refused.

pub mod coordinator;
pub mod ledger;
pub mod place_order;
pub mod state;

pub use coordinator::TwoPhaseCoordinator;
pub use ledger::PreparedLedger;
pub use state::TwoPhaseState;
