//! Order Finalizer: the post-payment task list.
//!
//! Each step of a paid order runs in order and reports its own status. A
//! failing step does not stop the ones after it; it is queued for retry with
//! its attempt count and re-run by [`OrderFinalizer::retry_pending`].

use std::collections::VecDeque;
use std::sync::Arc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;
use crate::domain::aggregates::{Order, OrderError, PaymentStatus};
use crate::domain::value_objects::Size;
use crate::integrations::{CourierClient, EventPublisher, FunctionError, Notifier};
use crate::storage::{CouponRepository, OrderRepository, ProfileRepository, StorageError};
use super::cart_store::{CartStore, CartStoreError};
use super::catalog::{Catalog, CatalogError};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum FinalizeStep {
    PersistPayment { payment_id: String },
    DecrementStock { product_id: Uuid, size: Size, quantity: u32 },
    RecordCouponUsage { code: String },
    RedeemPoints { points: u32 },
    BookCourier,
    NotifyCustomer,
    NotifyAdmin,
    ClearCart,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepStatus {
    Done,
    Failed { error: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    pub step: FinalizeStep,
    pub status: StepStatus,
    pub attempts: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizationReport {
    pub order_id: Uuid,
    pub order_number: String,
    pub awb_number: Option<String>,
    pub steps: Vec<StepReport>,
}

impl FinalizationReport {
    pub fn is_complete(&self) -> bool { self.steps.iter().all(|s| s.status == StepStatus::Done) }
    pub fn failed(&self) -> impl Iterator<Item = &StepReport> { self.steps.iter().filter(|s| s.status != StepStatus::Done) }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryJob {
    pub order_id: Uuid,
    pub step: FinalizeStep,
    pub attempts: u32,
}

/// Failed steps waiting for another attempt.
#[derive(Debug, Default)]
pub struct RetryQueue { jobs: Mutex<VecDeque<RetryJob>> }

impl RetryQueue {
    pub async fn push(&self, job: RetryJob) { self.jobs.lock().await.push_back(job); }
    pub async fn drain(&self) -> Vec<RetryJob> { self.jobs.lock().await.drain(..).collect() }
    pub async fn snapshot(&self) -> Vec<RetryJob> { self.jobs.lock().await.iter().cloned().collect() }
    pub async fn len(&self) -> usize { self.jobs.lock().await.len() }
    pub async fn is_empty(&self) -> bool { self.jobs.lock().await.is_empty() }
}

#[derive(Debug, Error)]
enum StepError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Cart(#[from] CartStoreError),
    #[error(transparent)]
    Remote(#[from] FunctionError),
    #[error(transparent)]
    Order(#[from] OrderError),
    #[error("coupon {0} has no uses left")]
    CouponExhausted(String),
    #[error("reward balance does not cover {0} points")]
    PointsUnavailable(u32),
    #[error("order {0} not found")]
    OrderMissing(Uuid),
}

pub struct OrderFinalizer {
    orders: Arc<dyn OrderRepository>,
    coupons: Arc<dyn CouponRepository>,
    profiles: Arc<dyn ProfileRepository>,
    catalog: Arc<Catalog>,
    carts: Arc<CartStore>,
    courier: CourierClient,
    notifier: Notifier,
    events: EventPublisher,
    retries: RetryQueue,
    max_attempts: u32,
}

/// Collaborators the finalizer drives.
pub struct FinalizerDeps {
    pub orders: Arc<dyn OrderRepository>,
    pub coupons: Arc<dyn CouponRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub catalog: Arc<Catalog>,
    pub carts: Arc<CartStore>,
    pub courier: CourierClient,
    pub notifier: Notifier,
    pub events: EventPublisher,
}

impl OrderFinalizer {
    pub fn new(deps: FinalizerDeps, max_attempts: u32) -> Self {
        Self {
            orders: deps.orders, coupons: deps.coupons, profiles: deps.profiles, catalog: deps.catalog,
            carts: deps.carts, courier: deps.courier, notifier: deps.notifier, events: deps.events,
            retries: RetryQueue::default(), max_attempts: max_attempts.max(1),
        }
    }

    pub fn retries(&self) -> &RetryQueue { &self.retries }

    /// Steps for a paid order: payment, one stock decrement per (line, size),
    /// coupon, points, courier, notifications, cart.
    pub fn plan(order: &Order, payment_id: &str) -> Vec<FinalizeStep> {
        let mut steps = vec![FinalizeStep::PersistPayment { payment_id: payment_id.to_string() }];
        for item in order.items() {
            for size in &item.sizes {
                steps.push(FinalizeStep::DecrementStock { product_id: item.product_id, size: size.size.clone(), quantity: size.quantity.value() });
            }
        }
        if let Some(code) = order.coupon_code() {
            steps.push(FinalizeStep::RecordCouponUsage { code: code.to_string() });
        }
        if order.reward_points_used() > 0 {
            steps.push(FinalizeStep::RedeemPoints { points: order.reward_points_used() });
        }
        steps.extend([FinalizeStep::BookCourier, FinalizeStep::NotifyCustomer, FinalizeStep::NotifyAdmin, FinalizeStep::ClearCart]);
        steps
    }

    pub async fn finalize(&self, mut order: Order, payment_id: &str) -> FinalizationReport {
        let mut steps = Vec::new();
        for step in Self::plan(&order, payment_id) {
            let status = match self.run(&mut order, &step).await {
                Ok(()) => StepStatus::Done,
                Err(e) => {
                    warn!(order_number = %order.order_number(), ?step, error = %e, "finalize step failed, queued for retry");
                    self.retries.push(RetryJob { order_id: order.id(), step: step.clone(), attempts: 1 }).await;
                    StepStatus::Failed { error: e.to_string() }
                }
            };
            steps.push(StepReport { step, status, attempts: 1 });
        }
        let report = FinalizationReport {
            order_id: order.id(),
            order_number: order.order_number().to_string(),
            awb_number: order.awb_number().map(str::to_string),
            steps,
        };
        info!(order_number = %report.order_number, complete = report.is_complete(), "order finalized");
        report
    }

    /// Re-runs queued steps against the stored order. Steps that keep failing
    /// are dropped after `max_attempts`.
    pub async fn retry_pending(&self) -> Vec<StepReport> {
        let mut reports = Vec::new();
        for job in self.retries.drain().await {
            let attempts = job.attempts + 1;
            let result = match self.orders.find(job.order_id).await {
                Ok(Some(mut order)) => self.run(&mut order, &job.step).await,
                Ok(None) => Err(StepError::OrderMissing(job.order_id)),
                Err(e) => Err(e.into()),
            };
            let status = match result {
                Ok(()) => {
                    info!(order_id = %job.order_id, step = ?job.step, attempts, "retried step succeeded");
                    StepStatus::Done
                }
                Err(e) if attempts < self.max_attempts => {
                    warn!(order_id = %job.order_id, step = ?job.step, attempts, error = %e, "retried step failed");
                    self.retries.push(RetryJob { attempts, ..job.clone() }).await;
                    StepStatus::Failed { error: e.to_string() }
                }
                Err(e) => {
                    error!(order_id = %job.order_id, step = ?job.step, attempts, error = %e, "giving up on step");
                    StepStatus::Failed { error: e.to_string() }
                }
            };
            reports.push(StepReport { step: job.step, status, attempts });
        }
        reports
    }

    async fn run(&self, order: &mut Order, step: &FinalizeStep) -> Result<(), StepError> {
        match step {
            FinalizeStep::PersistPayment { payment_id } => {
                if order.payment_status() != PaymentStatus::Paid {
                    order.mark_paid(payment_id.as_str())?;
                }
                self.orders.update(order).await?;
                self.events.publish_all(order.take_events()).await;
            }
            FinalizeStep::DecrementStock { product_id, size, quantity } => {
                self.catalog.decrement_stock(*product_id, size, *quantity).await?;
            }
            FinalizeStep::RecordCouponUsage { code } => {
                if !self.coupons.record_use(code).await? {
                    return Err(StepError::CouponExhausted(code.clone()));
                }
            }
            FinalizeStep::RedeemPoints { points } => {
                if !self.profiles.deduct_points(order.user_id(), *points).await? {
                    return Err(StepError::PointsUnavailable(*points));
                }
            }
            FinalizeStep::BookCourier => {
                if order.awb_number().is_none() {
                    let shipment = self.courier.book_shipment(order).await?;
                    info!(order_number = %order.order_number(), awb = %shipment.awb, "courier booked");
                    order.attach_awb(shipment.awb);
                    self.orders.update(order).await?;
                }
            }
            FinalizeStep::NotifyCustomer => self.notifier.order_confirmation(order).await?,
            FinalizeStep::NotifyAdmin => self.notifier.admin_alert(order).await?,
            FinalizeStep::ClearCart => { self.carts.clear(order.user_id()).await?; }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use serde_json::json;
    use crate::domain::aggregates::{Cart, CartLine, Coupon, NewOrder, OrderStatus, Product, Profile};
    use crate::domain::value_objects::{Money, ShippingAddress, Sku};
    use crate::integrations::functions::ScriptedFunctions;
    use crate::storage::memory::{MemoryCarts, MemoryCoupons, MemoryOrders, MemoryProducts, MemoryProfiles};

    struct Fixture {
        finalizer: OrderFinalizer,
        orders: Arc<MemoryOrders>,
        catalog: Arc<Catalog>,
        carts: Arc<CartStore>,
        profiles: Arc<MemoryProfiles>,
        product: Product,
        user: Uuid,
    }

    fn fixture(functions: ScriptedFunctions) -> Fixture {
        let user = Uuid::new_v4();
        let product = Product::create(Uuid::new_v4(), Sku::new("TEE").unwrap(), "Tee", Money::inr(Decimal::new(500, 0))).with_size("M", 5);
        let functions: Arc<ScriptedFunctions> = Arc::new(functions);
        let orders = Arc::new(MemoryOrders::default());
        let profiles = Arc::new(MemoryProfiles::new([Profile::customer(user, "asha@example.com").with_points(300)]));
        let catalog = Arc::new(Catalog::new(Arc::new(MemoryProducts::new([product.clone()])), EventPublisher::disabled()));
        let carts = Arc::new(CartStore::new(Arc::new(MemoryCarts::default()), catalog.clone(), "INR"));
        let finalizer = OrderFinalizer::new(FinalizerDeps {
            orders: orders.clone(),
            coupons: Arc::new(MemoryCoupons::new([Coupon::flat("WELCOME", Decimal::new(50, 0))])),
            profiles: profiles.clone(),
            catalog: catalog.clone(),
            carts: carts.clone(),
            courier: CourierClient::new(functions.clone()),
            notifier: Notifier::new(functions, Some("admin@example.com".into())),
            events: EventPublisher::disabled(),
        }, 3);
        Fixture { finalizer, orders, catalog, carts, profiles, product, user }
    }

    async fn placed_order(f: &Fixture) -> Order {
        f.carts.add_to_cart(f.user, f.product.id(), "M".into(), 2).await.unwrap();
        let cart: Cart = f.carts.cart(f.user).await.unwrap();
        let order = Order::place(NewOrder {
            user_id: f.user, email: "asha@example.com".into(), total: Money::inr(Decimal::new(850, 0)),
            delivery_fee: Money::inr(Decimal::ZERO), coupon_code: Some("WELCOME".into()),
            coupon_discount: Money::inr(Decimal::new(50, 0)), reward_points_used: 100,
            shipping_address: ShippingAddress::default(), payment_method: "razorpay".into(),
        }, &cart).unwrap();
        f.orders.insert(&order).await.unwrap();
        order
    }

    #[test]
    fn test_plan_order() {
        let product = Product::create(Uuid::new_v4(), Sku::new("TEE").unwrap(), "Tee", Money::inr(Decimal::new(500, 0)))
            .with_size("M", 5).with_size("L", 5);
        let mut cart = Cart::new(Uuid::new_v4(), "INR");
        cart.add_to_cart(CartLine::for_product(&product, "M", 1)).unwrap();
        cart.add_to_cart(CartLine::for_product(&product, "L", 2)).unwrap();
        let order = Order::place(NewOrder {
            user_id: cart.user_id(), email: "a@example.com".into(), total: Money::inr(Decimal::ONE), delivery_fee: Money::default(),
            coupon_code: None, coupon_discount: Money::default(), reward_points_used: 0,
            shipping_address: ShippingAddress::default(), payment_method: "cashfree".into(),
        }, &cart).unwrap();
        let plan = OrderFinalizer::plan(&order, "pay_1");
        assert_eq!(plan.len(), 7);
        assert_eq!(plan[0], FinalizeStep::PersistPayment { payment_id: "pay_1".into() });
        assert!(matches!(&plan[2], FinalizeStep::DecrementStock { quantity: 2, .. }));
        assert_eq!(plan[6], FinalizeStep::ClearCart);
    }

    #[tokio::test]
    async fn test_successful_finalization() {
        let f = fixture(ScriptedFunctions::default().respond("create-shipment", json!({ "awb": "AWB123" })));
        let order = placed_order(&f).await;
        let report = f.finalizer.finalize(order.clone(), "pay_1").await;

        assert!(report.is_complete(), "{:?}", report.failed().collect::<Vec<_>>());
        assert_eq!(report.awb_number.as_deref(), Some("AWB123"));
        let stored = f.orders.find(order.id()).await.unwrap().unwrap();
        assert_eq!(stored.payment_status(), PaymentStatus::Paid);
        assert_eq!(stored.status(), OrderStatus::Confirmed);
        assert_eq!(stored.awb_number(), Some("AWB123"));
        assert_eq!(f.catalog.product(f.product.id()).await.unwrap().stock_for(&"M".into()).value(), 3);
        assert_eq!(f.profiles.find(f.user).await.unwrap().unwrap().reward_points, 200);
        assert!(f.carts.cart(f.user).await.unwrap().is_empty());
        assert!(f.finalizer.retries().is_empty().await);
    }

    #[tokio::test]
    async fn test_failed_step_does_not_halt_others() {
        let f = fixture(ScriptedFunctions::default().fail("create-shipment", "courier down"));
        let order = placed_order(&f).await;
        let report = f.finalizer.finalize(order, "pay_1").await;

        let failed: Vec<_> = report.failed().map(|s| s.step.clone()).collect();
        assert_eq!(failed, vec![FinalizeStep::BookCourier]);
        assert!(f.carts.cart(f.user).await.unwrap().is_empty());
        assert_eq!(f.finalizer.retries().len().await, 1);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let f = fixture(ScriptedFunctions::default().fail("create-shipment", "courier down"));
        let order = placed_order(&f).await;
        f.finalizer.finalize(order, "pay_1").await;

        let second = f.finalizer.retry_pending().await;
        assert_eq!(second[0].attempts, 2);
        assert_eq!(f.finalizer.retries().len().await, 1);
        let third = f.finalizer.retry_pending().await;
        assert_eq!(third[0].attempts, 3);
        assert!(f.finalizer.retries().is_empty().await);
    }
}
