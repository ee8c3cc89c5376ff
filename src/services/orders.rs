//! Order history, issue reports, shipment tracking and admin status changes.

use std::sync::Arc;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;
use crate::domain::aggregates::{Order, OrderError, OrderStatus};
use crate::integrations::{CourierClient, EventPublisher, FunctionError, TrackingInfo};
use crate::storage::{OrderRepository, StorageError};

#[derive(Debug, Error)]
pub enum OrderServiceError {
    #[error("Order not found")]
    NotFound,

    #[error("Shipment not found")]
    ShipmentNotFound,

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error("Tracking unavailable: {0}")]
    Tracking(#[from] FunctionError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Payment,
    Order,
}

pub struct OrderService {
    orders: Arc<dyn OrderRepository>,
    courier: CourierClient,
    events: EventPublisher,
}

impl OrderService {
    pub fn new(orders: Arc<dyn OrderRepository>, courier: CourierClient, events: EventPublisher) -> Self {
        Self { orders, courier, events }
    }

    /// Newest first.
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Order>, OrderServiceError> {
        Ok(self.orders.list_for_user(user_id).await?)
    }

    /// Other users' orders are reported as missing.
    pub async fn get(&self, user_id: Uuid, order_id: Uuid) -> Result<Order, OrderServiceError> {
        self.orders.find(order_id).await?
            .filter(|o| o.user_id() == user_id)
            .ok_or(OrderServiceError::NotFound)
    }

    pub async fn report_issue(&self, user_id: Uuid, order_id: Uuid, kind: IssueKind, message: &str) -> Result<Order, OrderServiceError> {
        let mut order = self.get(user_id, order_id).await?;
        match kind {
            IssueKind::Payment => order.report_payment_issue(message)?,
            IssueKind::Order => order.report_order_issue(message)?,
        }
        self.orders.update(&order).await?;
        info!(order_number = %order.order_number(), ?kind, "issue reported");
        Ok(order)
    }

    /// Only shipments of the caller's own orders can be tracked.
    pub async fn track(&self, user_id: Uuid, awb: &str) -> Result<TrackingInfo, OrderServiceError> {
        let owned = self.orders.list_for_user(user_id).await?.iter().any(|o| o.awb_number() == Some(awb));
        if !owned { return Err(OrderServiceError::ShipmentNotFound); }
        Ok(self.courier.track(awb).await?)
    }

    pub async fn list_recent(&self, limit: u32, offset: u32) -> Result<Vec<Order>, OrderServiceError> {
        Ok(self.orders.list_recent(limit.clamp(1, 200), offset).await?)
    }

    pub async fn update_status(&self, order_id: Uuid, status: OrderStatus, note: Option<String>) -> Result<Order, OrderServiceError> {
        let mut order = self.orders.find(order_id).await?.ok_or(OrderServiceError::NotFound)?;
        order.update_status(status, note)?;
        self.orders.update(&order).await?;
        self.events.publish_all(order.take_events()).await;
        info!(order_number = %order.order_number(), status = status.as_str(), "order status updated");
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use serde_json::json;
    use crate::domain::aggregates::{Cart, CartLine, NewOrder, Product};
    use crate::domain::value_objects::{Money, ShippingAddress, Sku};
    use crate::integrations::functions::ScriptedFunctions;
    use crate::storage::memory::MemoryOrders;

    async fn service_with_order() -> (OrderService, Order) {
        let product = Product::create(Uuid::new_v4(), Sku::new("TEE").unwrap(), "Tee", Money::inr(Decimal::new(500, 0))).with_size("M", 5);
        let mut cart = Cart::new(Uuid::new_v4(), "INR");
        cart.add_to_cart(CartLine::for_product(&product, "M", 1)).unwrap();
        let mut order = Order::place(NewOrder {
            user_id: cart.user_id(), email: "a@example.com".into(), total: Money::inr(Decimal::new(599, 0)),
            delivery_fee: Money::inr(Decimal::new(99, 0)), coupon_code: None, coupon_discount: Money::default(),
            reward_points_used: 0, shipping_address: ShippingAddress::default(), payment_method: "razorpay".into(),
        }, &cart).unwrap();
        order.attach_awb("AWB9");
        let orders = Arc::new(MemoryOrders::default());
        orders.insert(&order).await.unwrap();
        let functions = Arc::new(ScriptedFunctions::default()
            .respond("track-shipment", json!({ "awb": "AWB9", "status": "in_transit", "events": [] })));
        (OrderService::new(orders, CourierClient::new(functions), EventPublisher::disabled()), order)
    }

    #[tokio::test]
    async fn test_other_users_order_is_not_found() {
        let (service, order) = service_with_order().await;
        assert!(service.get(order.user_id(), order.id()).await.is_ok());
        assert!(matches!(service.get(Uuid::new_v4(), order.id()).await, Err(OrderServiceError::NotFound)));
    }

    #[tokio::test]
    async fn test_issue_recorded() {
        let (service, order) = service_with_order().await;
        let updated = service.report_issue(order.user_id(), order.id(), IssueKind::Order, "wrong size delivered").await.unwrap();
        assert_eq!(updated.order_issues()[0].message, "wrong size delivered");
        assert!(matches!(
            service.report_issue(order.user_id(), order.id(), IssueKind::Payment, "  ").await,
            Err(OrderServiceError::Order(OrderError::EmptyIssue))
        ));
    }

    #[tokio::test]
    async fn test_tracking_limited_to_own_shipments() {
        let (service, order) = service_with_order().await;
        assert_eq!(service.track(order.user_id(), "AWB9").await.unwrap().status, "in_transit");
        assert!(matches!(service.track(Uuid::new_v4(), "AWB9").await, Err(OrderServiceError::ShipmentNotFound)));
    }

    #[tokio::test]
    async fn test_return_only_after_delivery() {
        let (service, order) = service_with_order().await;
        assert!(matches!(
            service.update_status(order.id(), OrderStatus::ReturnRequested, None).await,
            Err(OrderServiceError::Order(OrderError::InvalidTransition { .. }))
        ));
        service.update_status(order.id(), OrderStatus::Delivered, None).await.unwrap();
        let returned = service.update_status(order.id(), OrderStatus::ReturnRequested, Some("too small".into())).await.unwrap();
        assert_eq!(returned.status(), OrderStatus::ReturnRequested);
        assert_eq!(returned.status_note(), Some("too small"));
    }
}
