//! Place-order transaction constants for the two-phase commit protocol.

/// Protocol label used in logs and metrics.
pub const PROTOCOL: &str = "2pc";

/// Failure tag: the order resource manager did not prepare.
pub const ORDER_PREPARE: &str = "OrderPrepare";

/// Failure tag: the inventory resource manager did not prepare.
pub const INVENTORY_PREPARE: &str = "InventoryPrepare";

/// Failure tag: the payment resource manager did not prepare.
pub const PAYMENT_PREPARE: &str = "PaymentPrepare";

/// Failure tag: a commit could not be delivered.
pub const COMMIT_PHASE: &str = "CommitPhase";
