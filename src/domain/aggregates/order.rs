//! Order Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use crate::domain::aggregates::cart::{Cart, SizeQuantity};
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::{Money, ShippingAddress};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    id: Uuid,
    order_number: String,
    user_id: Uuid,
    email: String,
    items: Vec<OrderItem>,
    total: Money,
    delivery_fee: Money,
    coupon_code: Option<String>,
    coupon_discount: Money,
    reward_points_used: u32,
    shipping_address: ShippingAddress,
    payment_status: PaymentStatus,
    status: OrderStatus,
    payment_method: Option<String>,
    payment: Option<PaymentDetails>,
    awb_number: Option<String>,
    status_note: Option<String>,
    payment_issue: Vec<Issue>,
    order_issue: Vec<Issue>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

/// Snapshot of one cart line at submission time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub name: String,
    pub price: Money,
    pub image: Option<String>,
    pub sizes: Vec<SizeQuantity>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub resolved: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus { #[default] Pending, Paid, Failed, Refunded, Cancelled }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
    ReturnRequested,
    ReturnApproved,
    ReturnRejected,
    Returned,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        [Self::Pending, Self::Paid, Self::Failed, Self::Refunded, Self::Cancelled].into_iter().find(|s| s.as_str() == value)
    }
}

impl OrderStatus {
    const ALL: [OrderStatus; 10] = [
        Self::Pending, Self::Processing, Self::Confirmed, Self::Shipped, Self::Delivered,
        Self::Cancelled, Self::ReturnRequested, Self::ReturnApproved, Self::ReturnRejected, Self::Returned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Confirmed => "confirmed",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::ReturnRequested => "return_requested",
            Self::ReturnApproved => "return_approved",
            Self::ReturnRejected => "return_rejected",
            Self::Returned => "returned",
        }
    }

    pub fn parse(value: &str) -> Option<Self> { Self::ALL.into_iter().find(|s| s.as_str() == value) }

    fn is_return(&self) -> bool {
        matches!(self, Self::ReturnRequested | Self::ReturnApproved | Self::ReturnRejected | Self::Returned)
    }

    /// Admin-driven transitions. Cancelled, returned and rejected returns are terminal.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        if *self == next { return true; }
        match self {
            Cancelled | Returned | ReturnRejected => false,
            Delivered => next == ReturnRequested,
            ReturnRequested => matches!(next, ReturnApproved | ReturnRejected),
            ReturnApproved => next == Returned,
            Pending | Processing | Confirmed | Shipped => !next.is_return(),
        }
    }
}

/// Everything captured from checkout when an order is placed.
#[derive(Clone, Debug)]
pub struct NewOrder {
    pub user_id: Uuid,
    pub email: String,
    pub total: Money,
    pub delivery_fee: Money,
    pub coupon_code: Option<String>,
    pub coupon_discount: Money,
    pub reward_points_used: u32,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
}

/// `ORD-` followed by eight random digits.
pub fn generate_order_number() -> String { format!("ORD-{:08}", rand::random::<u32>() % 100_000_000) }

impl Order {
    /// Places a pending order whose items are copied out of the cart.
    pub fn place(details: NewOrder, cart: &Cart) -> Result<Self, OrderError> {
        if cart.is_empty() { return Err(OrderError::NoItems); }
        let items = cart.lines().iter().map(|l| OrderItem {
            product_id: l.product_id, name: l.name.clone(), price: l.price.clone(), image: l.image.clone(), sizes: l.sizes.clone(),
        }).collect();
        let now = Utc::now();
        let mut order = Self {
            id: Uuid::now_v7(), order_number: generate_order_number(), user_id: details.user_id, email: details.email,
            items, total: details.total, delivery_fee: details.delivery_fee, coupon_code: details.coupon_code,
            coupon_discount: details.coupon_discount, reward_points_used: details.reward_points_used,
            shipping_address: details.shipping_address, payment_status: PaymentStatus::Pending, status: OrderStatus::Pending,
            payment_method: Some(details.payment_method), payment: None, awb_number: None, status_note: None,
            payment_issue: vec![], order_issue: vec![], created_at: now, updated_at: now, events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Placed {
            order_id: order.id, order_number: order.order_number.clone(), total: order.total.amount(),
        }));
        Ok(order)
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn order_number(&self) -> &str { &self.order_number }
    pub fn user_id(&self) -> Uuid { self.user_id }
    pub fn email(&self) -> &str { &self.email }
    pub fn items(&self) -> &[OrderItem] { &self.items }
    pub fn total(&self) -> &Money { &self.total }
    pub fn delivery_fee(&self) -> &Money { &self.delivery_fee }
    pub fn coupon_code(&self) -> Option<&str> { self.coupon_code.as_deref() }
    pub fn coupon_discount(&self) -> &Money { &self.coupon_discount }
    pub fn reward_points_used(&self) -> u32 { self.reward_points_used }
    pub fn shipping_address(&self) -> &ShippingAddress { &self.shipping_address }
    pub fn payment_status(&self) -> PaymentStatus { self.payment_status }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn payment_method(&self) -> Option<&str> { self.payment_method.as_deref() }
    pub fn payment(&self) -> Option<&PaymentDetails> { self.payment.as_ref() }
    pub fn awb_number(&self) -> Option<&str> { self.awb_number.as_deref() }
    pub fn status_note(&self) -> Option<&str> { self.status_note.as_deref() }
    pub fn payment_issues(&self) -> &[Issue] { &self.payment_issue }
    pub fn order_issues(&self) -> &[Issue] { &self.order_issue }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn total_units(&self) -> u32 { self.items.iter().flat_map(|i| &i.sizes).map(|s| s.quantity.value()).sum() }

    /// A callback or a new hosted session is only accepted while this holds.
    pub fn awaiting_payment(&self) -> bool {
        self.status != OrderStatus::Cancelled && matches!(self.payment_status, PaymentStatus::Pending | PaymentStatus::Failed)
    }

    pub fn attach_gateway_order(&mut self, gateway_order_id: impl Into<String>) {
        let details = self.payment.get_or_insert(PaymentDetails { gateway_order_id: None, gateway_payment_id: None, paid_at: None });
        details.gateway_order_id = Some(gateway_order_id.into());
        self.touch();
    }

    pub fn mark_paid(&mut self, gateway_payment_id: impl Into<String>) -> Result<(), OrderError> {
        if self.status == OrderStatus::Cancelled { return Err(OrderError::Cancelled); }
        let details = self.payment.get_or_insert(PaymentDetails { gateway_order_id: None, gateway_payment_id: None, paid_at: None });
        details.gateway_payment_id = Some(gateway_payment_id.into());
        details.paid_at = Some(Utc::now());
        self.payment_status = PaymentStatus::Paid;
        self.status = OrderStatus::Confirmed;
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::Paid { order_id: self.id, total: self.total.amount() }));
        Ok(())
    }

    pub fn mark_payment_failed(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        self.payment_status = PaymentStatus::Failed;
        self.status = OrderStatus::Pending;
        self.payment_issue.push(Issue { message: reason.clone(), created_at: Utc::now(), resolved: false });
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::PaymentFailed { order_id: self.id, reason }));
    }

    pub fn attach_awb(&mut self, awb: impl Into<String>) { self.awb_number = Some(awb.into()); self.touch(); }

    pub fn update_status(&mut self, next: OrderStatus, note: Option<String>) -> Result<(), OrderError> {
        if !self.status.can_transition_to(next) {
            return Err(OrderError::InvalidTransition { from: self.status, to: next });
        }
        let from = self.status;
        self.status = next;
        if next == OrderStatus::Cancelled && matches!(self.payment_status, PaymentStatus::Pending | PaymentStatus::Failed) {
            self.payment_status = PaymentStatus::Cancelled;
        }
        if note.is_some() { self.status_note = note; }
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::StatusChanged { order_id: self.id, from, to: next }));
        Ok(())
    }

    pub fn cancel(&mut self, note: Option<String>) -> Result<(), OrderError> { self.update_status(OrderStatus::Cancelled, note) }

    pub fn report_payment_issue(&mut self, message: impl Into<String>) -> Result<(), OrderError> {
        self.payment_issue.push(Self::issue(message)?);
        self.touch();
        Ok(())
    }

    pub fn report_order_issue(&mut self, message: impl Into<String>) -> Result<(), OrderError> {
        self.order_issue.push(Self::issue(message)?);
        self.touch();
        Ok(())
    }

    fn issue(message: impl Into<String>) -> Result<Issue, OrderError> {
        let message = message.into().trim().to_string();
        if message.is_empty() { return Err(OrderError::EmptyIssue); }
        Ok(Issue { message, created_at: Utc::now(), resolved: false })
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrderError {
    #[error("Order has no items")]
    NoItems,
    #[error("Order is cancelled")]
    Cancelled,
    #[error("Cannot move order from {} to {}", from.as_str(), to.as_str())]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("Issue description is empty")]
    EmptyIssue,
}
