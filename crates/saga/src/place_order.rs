//! Place-order saga constants.

/// Protocol label used in logs and metrics.
pub const PROTOCOL: &str = "saga";

/// Step name: create the order.
pub const STEP_CREATE_ORDER: &str = "OrderCreate";

/// Step name: reserve inventory for the ordered product.
pub const STEP_RESERVE_INVENTORY: &str = "InventoryReservation";

/// Step name: charge the payment for the created order.
pub const STEP_PROCESS_PAYMENT: &str = "PaymentProcessing";
