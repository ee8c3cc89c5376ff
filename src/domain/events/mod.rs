//! Domain events
use crate::domain::aggregates::order::OrderStatus;
use crate::domain::value_objects::Size;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "aggregate", content = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    Product(ProductEvent),
    Order(OrderEvent),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProductEvent {
    StockDecremented { product_id: Uuid, size: Size, quantity: u32, remaining: u32 },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_id: Uuid, order_number: String, total: Decimal },
    Paid { order_id: Uuid, total: Decimal },
    PaymentFailed { order_id: Uuid, reason: String },
    StatusChanged { order_id: Uuid, from: OrderStatus, to: OrderStatus },
}

impl DomainEvent {
    /// NATS subject suffix, e.g. `order.paid`.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Product(ProductEvent::StockDecremented { .. }) => "product.stock_decremented",
            Self::Order(OrderEvent::Placed { .. }) => "order.placed",
            Self::Order(OrderEvent::Paid { .. }) => "order.paid",
            Self::Order(OrderEvent::PaymentFailed { .. }) => "order.payment_failed",
            Self::Order(OrderEvent::StatusChanged { .. }) => "order.status_changed",
        }
    }
}
