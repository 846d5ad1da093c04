//! Transaction request and the per-resource payloads derived from it.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Money amount represented in cents to avoid floating point issues.
///
/// On the wire it travels as a decimal number (`49.99`), which is what the
/// resource managers and callers exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money {
    cents: i64,
}

impl Money {
    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns true if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.cents > 0
    }

    /// Rounds a decimal amount to whole cents, half away from zero.
    fn from_decimal(amount: Decimal) -> Option<Self> {
        amount
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
            .checked_mul(Decimal::ONE_HUNDRED)?
            .to_i64()
            .map(Self::from_cents)
    }

}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", Decimal::new(self.cents, 2))
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.cents as f64 / 100.0)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let amount = <Decimal as Deserialize>::deserialize(deserializer)?;
        Self::from_decimal(amount).ok_or_else(|| D::Error::custom("amount is out of range"))
    }
}

/// One of the three resource managers taking part in an attempt.
///
/// Declaration order is the fixed call order of both protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Order,
    Inventory,
    Payment,
}

impl Resource {
    /// All resources in call order.
    pub const ALL: [Resource; 3] = [Resource::Order, Resource::Inventory, Resource::Payment];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Order => "order",
            Resource::Inventory => "inventory",
            Resource::Payment => "payment",
        }
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller input for one "place an order" attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub user_id: i64,
    pub product_id: i64,
    pub quantity: i32,
    pub amount: Money,
}

impl TransactionRequest {
    pub fn new(user_id: i64, product_id: i64, quantity: i32, amount: Money) -> Self {
        Self {
            user_id,
            product_id,
            quantity,
            amount,
        }
    }

    /// Payload for the order resource manager.
    pub fn order_payload(&self) -> ResourcePayload {
        ResourcePayload::Order(OrderPayload {
            user_id: self.user_id,
            product_id: self.product_id,
            quantity: self.quantity,
            amount: self.amount,
        })
    }

    /// Payload reserving the requested quantity at the inventory resource manager.
    pub fn inventory_reservation(&self) -> ResourcePayload {
        ResourcePayload::Inventory(InventoryPayload {
            product_id: self.product_id,
            quantity: self.quantity,
            operation_type: InventoryOperation::Reserve,
        })
    }

    /// Payload charging the request amount against an already created order.
    ///
    /// The order identifier is a hard input: payment cannot be built before
    /// the order step has produced it.
    pub fn payment_for(&self, order_id: impl Into<String>) -> ResourcePayload {
        ResourcePayload::Payment(PaymentPayload {
            order_id: order_id.into(),
            amount: self.amount,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPayload {
    pub user_id: i64,
    pub product_id: i64,
    pub quantity: i32,
    pub amount: Money,
}

/// Inventory operation requested from the inventory resource manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InventoryOperation {
    Reserve,
    Release,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryPayload {
    pub product_id: i64,
    pub quantity: i32,
    pub operation_type: InventoryOperation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    pub order_id: String,
    pub amount: Money,
}

/// Body sent to a resource manager's prepare or execute endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ResourcePayload {
    Order(OrderPayload),
    Inventory(InventoryPayload),
    Payment(PaymentPayload),
}

impl ResourcePayload {
    /// The resource manager this payload is addressed to.
    pub fn resource(&self) -> Resource {
        match self {
            ResourcePayload::Order(_) => Resource::Order,
            ResourcePayload::Inventory(_) => Resource::Inventory,
            ResourcePayload::Payment(_) => Resource::Payment,
        }
    }
}
