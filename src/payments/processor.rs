//! Drives one payment from session creation to the final outcome.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;
use crate::domain::aggregates::Order;
use crate::integrations::EventPublisher;
use crate::services::finalizer::{FinalizationReport, OrderFinalizer};
use crate::storage::OrderRepository;
use super::{Customer, GatewayCallback, PaymentError, PaymentGateway, PaymentMethod, PaymentOutcome, PaymentRequest, PaymentSession};

/// What the customer is shown once the gateway has reported back.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum PaymentResult {
    Paid { order_id: Uuid, order_number: String, report: FinalizationReport },
    Failed { order_id: Uuid, order_number: String, reason: String },
}

/// How a submitted order continues: through a hosted checkout, or settled on
/// the spot when discounts cover the whole total.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStart {
    Hosted(PaymentSession),
    Settled(PaymentResult),
}

/// Orders whose payment is being confirmed right now.
#[derive(Debug, Default)]
struct InFlight(Mutex<HashSet<Uuid>>);

impl InFlight {
    fn claim(&self, order_id: Uuid) -> Option<Claim<'_>> {
        let mut ids = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        ids.insert(order_id).then(|| Claim { owner: self, order_id })
    }
}

struct Claim<'a> { owner: &'a InFlight, order_id: Uuid }

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.owner.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).remove(&self.order_id);
    }
}

pub struct PaymentProcessor {
    gateways: HashMap<PaymentMethod, Arc<dyn PaymentGateway>>,
    orders: Arc<dyn OrderRepository>,
    finalizer: Arc<OrderFinalizer>,
    events: EventPublisher,
    in_flight: InFlight,
}

impl PaymentProcessor {
    pub fn new(
        gateways: impl IntoIterator<Item = Arc<dyn PaymentGateway>>,
        orders: Arc<dyn OrderRepository>,
        finalizer: Arc<OrderFinalizer>,
        events: EventPublisher,
    ) -> Self {
        let gateways = gateways.into_iter().map(|g| (g.method(), g)).collect();
        Self { gateways, orders, finalizer, events, in_flight: InFlight::default() }
    }

    pub fn finalizer(&self) -> &Arc<OrderFinalizer> { &self.finalizer }

    fn gateway(&self, method: &str) -> Result<&Arc<dyn PaymentGateway>, PaymentError> {
        PaymentMethod::parse(method)
            .and_then(|m| self.gateways.get(&m))
            .ok_or_else(|| PaymentError::UnsupportedMethod(method.to_string()))
    }

    /// Opens the hosted checkout for a placed order and records the gateway
    /// order id on it. An order with nothing left to pay is confirmed here.
    pub async fn start(&self, order: &Order, customer: Customer) -> Result<PaymentStart, PaymentError> {
        if !order.awaiting_payment() { return Err(PaymentError::NotAwaitingPayment); }
        if order.total().amount() <= Decimal::ZERO {
            return self.settle_unpaid_total(order.id()).await.map(PaymentStart::Settled);
        }
        let gateway = self.gateway(order.payment_method().unwrap_or_default())?;
        let request = PaymentRequest {
            order_id: order.id(),
            order_number: order.order_number().to_string(),
            amount: order.total().amount(),
            currency: order.total().currency().to_string(),
            customer,
        };
        let session = gateway.create_session(&request).await.map_err(|e| {
            error!(order_number = %request.order_number, error = %e, "payment session creation failed");
            e
        })?;
        let mut stored = self.orders.find(order.id()).await?.ok_or(PaymentError::OrderNotFound)?;
        if !stored.awaiting_payment() { return Err(PaymentError::NotAwaitingPayment); }
        stored.attach_gateway_order(session.gateway_order_id.clone());
        self.orders.update(&stored).await?;
        Ok(PaymentStart::Hosted(session))
    }

    async fn settle_unpaid_total(&self, order_id: Uuid) -> Result<PaymentResult, PaymentError> {
        let _claim = self.in_flight.claim(order_id).ok_or(PaymentError::InProgress)?;
        let order = self.orders.find(order_id).await?.ok_or(PaymentError::OrderNotFound)?;
        if !order.awaiting_payment() { return Err(PaymentError::NotAwaitingPayment); }
        let order_number = order.order_number().to_string();
        let payment_id = format!("covered-{order_number}");
        info!(%order_number, "nothing to collect, confirming without a gateway");
        let report = self.finalizer.finalize(order, &payment_id).await;
        Ok(PaymentResult::Paid { order_id, order_number, report })
    }

    /// Applies the gateway's verdict. Payment failures are a normal result,
    /// not an error; the courier is never booked for them.
    /// Only one callback per order is handled at a time; the claim is held
    /// until the outcome is stored.
    pub async fn complete(&self, user_id: Uuid, order_id: Uuid, callback: GatewayCallback) -> Result<PaymentResult, PaymentError> {
        let _claim = self.in_flight.claim(order_id).ok_or(PaymentError::InProgress)?;
        let mut order = self.orders.find(order_id).await?
            .filter(|o| o.user_id() == user_id)
            .ok_or(PaymentError::OrderNotFound)?;
        if !order.awaiting_payment() {
            return Err(PaymentError::NotAwaitingPayment);
        }
        let gateway = self.gateway(order.payment_method().unwrap_or_default())?;
        let gateway_order_id = order.payment()
            .and_then(|p| p.gateway_order_id.clone())
            .ok_or(PaymentError::MissingSession)?;

        match gateway.resolve(&gateway_order_id, callback).await? {
            PaymentOutcome::Paid(receipt) => {
                info!(order_number = %order.order_number(), payment_id = %receipt.payment_id, "payment confirmed");
                let order_number = order.order_number().to_string();
                let report = self.finalizer.finalize(order, &receipt.payment_id).await;
                Ok(PaymentResult::Paid { order_id, order_number, report })
            }
            PaymentOutcome::Failed { reason } => {
                warn!(order_number = %order.order_number(), %reason, "payment failed");
                order.mark_payment_failed(reason.clone());
                self.orders.update(&order).await?;
                self.events.publish_all(order.take_events()).await;
                Ok(PaymentResult::Failed { order_id, order_number: order.order_number().to_string(), reason })
            }
        }
    }
}
