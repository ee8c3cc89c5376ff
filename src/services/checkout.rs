//! Checkout Orchestrator.
//!
//! One session per user walks `SelectingAddress -> AddressConfirmed ->
//! DiscountsApplied -> SubmittedToPayment`. Submission snapshots the cart into
//! a pending order and hands it to the payment processor; the session never
//! touches the order after that.

use std::collections::HashMap;
use std::sync::Arc;
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;
use crate::domain::aggregates::{CartAvailability, NewOrder, Order, OrderError};
use crate::domain::aggregates::coupon::normalize_code;
use crate::domain::pricing::{
    combo_adjusted, evaluate_coupon, redeem_points, CouponRejection, Discounts, PointsRejection, PriceBreakdown, PricingRules,
};
use crate::domain::value_objects::{Money, ShippingAddress};
use crate::integrations::EventPublisher;
use crate::payments::{Customer, PaymentMethod};
use crate::storage::{AddressRepository, CouponRepository, OrderRepository, ProfileRepository, StorageError};
use super::cart_store::{CartStore, CartStoreError};
use super::catalog::{Catalog, CatalogError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStage {
    SelectingAddress,
    AddressConfirmed,
    DiscountsApplied,
    SubmittedToPayment,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CheckoutSession {
    pub user_id: Uuid,
    pub stage: CheckoutStage,
    pub address: Option<ShippingAddress>,
    pub discounts: Discounts,
    pub order_id: Option<Uuid>,
    /// Why a discount was dropped since the customer last looked.
    pub notice: Option<String>,
}

impl CheckoutSession {
    fn new(user_id: Uuid) -> Self {
        Self { user_id, stage: CheckoutStage::SelectingAddress, address: None, discounts: Discounts::default(), order_id: None, notice: None }
    }

    fn settle_stage(&mut self) {
        self.stage = if self.discounts.coupon.is_some() || self.discounts.points.is_some() {
            CheckoutStage::DiscountsApplied
        } else {
            CheckoutStage::AddressConfirmed
        };
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AddressChoice {
    Saved { id: Uuid },
    New {
        address: ShippingAddress,
        #[serde(default)]
        save: bool,
    },
}

/// Everything the payment processor needs to open a hosted checkout.
#[derive(Clone, Debug, PartialEq)]
pub struct PaymentHandoff {
    pub order: Order,
    pub amount: Money,
    pub customer: Customer,
}

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("No checkout in progress")]
    NoSession,

    #[error("This step is not available at {0:?}")]
    InvalidStage(CheckoutStage),

    #[error("Your cart is empty")]
    EmptyCart,

    #[error("Some items in your cart are out of stock")]
    OutOfStock,

    #[error("Please fill in: {}", .0.join(", "))]
    IncompleteAddress(Vec<String>),

    #[error("Saved address not found")]
    AddressNotFound,

    #[error("Profile not found")]
    ProfileNotFound,

    #[error(transparent)]
    Coupon(#[from] CouponRejection),

    #[error(transparent)]
    Points(#[from] PointsRejection),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Cart(#[from] CartStoreError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub struct CheckoutDeps {
    pub catalog: Arc<Catalog>,
    pub carts: Arc<CartStore>,
    pub coupons: Arc<dyn CouponRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub addresses: Arc<dyn AddressRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub events: EventPublisher,
}

pub struct CheckoutService {
    deps: CheckoutDeps,
    pricing: PricingRules,
    sessions: RwLock<HashMap<Uuid, CheckoutSession>>,
}

impl CheckoutService {
    pub fn new(deps: CheckoutDeps, pricing: PricingRules) -> Self {
        Self { deps, pricing, sessions: RwLock::new(HashMap::new()) }
    }

    pub fn pricing(&self) -> &PricingRules { &self.pricing }

    /// Opens a fresh session; only a cart that can proceed may check out.
    pub async fn begin(&self, user_id: Uuid) -> Result<CheckoutSession, CheckoutError> {
        let (_, availability) = self.deps.carts.availability(user_id).await?;
        match availability {
            CartAvailability::Empty => return Err(CheckoutError::EmptyCart),
            CartAvailability::ContinueShopping => return Err(CheckoutError::OutOfStock),
            CartAvailability::ProceedToCheckout => {}
        }
        let session = CheckoutSession::new(user_id);
        self.sessions.write().await.insert(user_id, session.clone());
        Ok(session)
    }

    pub async fn session(&self, user_id: Uuid) -> Result<CheckoutSession, CheckoutError> {
        self.sessions.read().await.get(&user_id).cloned().ok_or(CheckoutError::NoSession)
    }

    pub async fn confirm_address(&self, user_id: Uuid, choice: AddressChoice) -> Result<CheckoutSession, CheckoutError> {
        self.ensure_stage(user_id, &[CheckoutStage::SelectingAddress, CheckoutStage::AddressConfirmed, CheckoutStage::DiscountsApplied]).await?;
        let address = match choice {
            AddressChoice::Saved { id } => {
                self.deps.addresses.find(user_id, id).await?.ok_or(CheckoutError::AddressNotFound)?.address.normalized()
            }
            AddressChoice::New { address, save } => {
                let address = address.normalized();
                let missing = address.missing_fields();
                if !missing.is_empty() { return Err(CheckoutError::IncompleteAddress(missing)); }
                if save { self.deps.addresses.insert(user_id, address.clone()).await?; }
                address
            }
        };
        let missing = address.missing_fields();
        if !missing.is_empty() { return Err(CheckoutError::IncompleteAddress(missing)); }
        self.update(user_id, |session| {
            session.address = Some(address);
            session.settle_stage();
        }).await
    }

    pub async fn apply_coupon(&self, user_id: Uuid, code: &str) -> Result<CheckoutSession, CheckoutError> {
        self.ensure_stage(user_id, &[CheckoutStage::AddressConfirmed, CheckoutStage::DiscountsApplied]).await?;
        let coupon = self.deps.coupons.find_by_code(&normalize_code(code)).await?;
        let subtotal = self.subtotal(user_id).await?;
        let applied = evaluate_coupon(coupon.as_ref(), subtotal, Utc::now())?;
        info!(%user_id, code = applied.code(), discount = %applied.discount, "coupon applied");
        self.update(user_id, |session| {
            session.discounts.coupon = Some(applied);
            session.notice = None;
            session.settle_stage();
        }).await
    }

    pub async fn remove_coupon(&self, user_id: Uuid) -> Result<CheckoutSession, CheckoutError> {
        self.ensure_stage(user_id, &[CheckoutStage::AddressConfirmed, CheckoutStage::DiscountsApplied]).await?;
        self.update(user_id, |session| { session.discounts.coupon = None; session.settle_stage(); }).await
    }

    /// Requests above the balance are clamped to it.
    pub async fn apply_points(&self, user_id: Uuid, requested: u32) -> Result<CheckoutSession, CheckoutError> {
        self.ensure_stage(user_id, &[CheckoutStage::AddressConfirmed, CheckoutStage::DiscountsApplied]).await?;
        let profile = self.deps.profiles.find(user_id).await?.ok_or(CheckoutError::ProfileNotFound)?;
        let applied = redeem_points(requested, profile.reward_points)?;
        self.update(user_id, |session| {
            session.discounts.points = Some(applied);
            session.settle_stage();
        }).await
    }

    pub async fn remove_points(&self, user_id: Uuid) -> Result<CheckoutSession, CheckoutError> {
        self.ensure_stage(user_id, &[CheckoutStage::AddressConfirmed, CheckoutStage::DiscountsApplied]).await?;
        self.update(user_id, |session| { session.discounts.points = None; session.settle_stage(); }).await
    }

    /// Re-checks the applied coupon after a cart change, dropping it with a
    /// notice when it no longer holds. No-op without an open session.
    pub async fn refresh(&self, user_id: Uuid) -> Result<Option<CheckoutSession>, CheckoutError> {
        let Some(session) = self.sessions.read().await.get(&user_id).cloned() else { return Ok(None) };
        if session.stage == CheckoutStage::SubmittedToPayment { return Ok(Some(session)); }
        let Some(coupon) = session.discounts.coupon.clone() else { return Ok(Some(session)) };
        let subtotal = self.subtotal(user_id).await?;
        let revalidated = coupon.revalidate(subtotal, Utc::now());
        let session = self.update(user_id, |session| {
            match revalidated {
                Ok(applied) => session.discounts.coupon = Some(applied),
                Err(reason) => {
                    info!(%user_id, code = coupon.code(), %reason, "coupon dropped after cart change");
                    session.discounts.coupon = None;
                    session.notice = Some(reason.to_string());
                }
            }
            session.settle_stage();
        }).await?;
        Ok(Some(session))
    }

    /// Price of the current cart with whatever the session has applied.
    pub async fn quote(&self, user_id: Uuid) -> Result<PriceBreakdown, CheckoutError> {
        let discounts = self.sessions.read().await.get(&user_id).map(|s| s.discounts.clone()).unwrap_or_default();
        let cart = self.deps.carts.cart(user_id).await?;
        let products = self.deps.catalog.snapshot().await?;
        Ok(self.pricing.price(&cart, |id| products.get(&id), &discounts))
    }

    pub async fn submit(&self, user_id: Uuid, method: PaymentMethod) -> Result<PaymentHandoff, CheckoutError> {
        let session = self.ensure_stage(user_id, &[CheckoutStage::AddressConfirmed, CheckoutStage::DiscountsApplied]).await?;
        let address = session.address.clone().ok_or(CheckoutError::InvalidStage(session.stage))?;

        let cart = self.deps.carts.cart(user_id).await?;
        let products = self.deps.catalog.snapshot().await?;
        match cart.availability(|id| products.get(&id)) {
            CartAvailability::Empty => return Err(CheckoutError::EmptyCart),
            CartAvailability::ContinueShopping => return Err(CheckoutError::OutOfStock),
            CartAvailability::ProceedToCheckout => {}
        }
        let profile = self.deps.profiles.find(user_id).await?.ok_or(CheckoutError::ProfileNotFound)?;
        let subtotal = combo_adjusted(cart.lines(), |id| products.get(&id), &self.pricing.combos).subtotal;

        let mut discounts = Discounts::default();
        if let Some(applied) = &session.discounts.coupon {
            let live = self.deps.coupons.find_by_code(applied.code()).await?;
            match evaluate_coupon(live.as_ref(), subtotal, Utc::now()) {
                Ok(coupon) => discounts.coupon = Some(coupon),
                Err(reason) => {
                    self.update(user_id, |s| { s.discounts.coupon = None; s.notice = Some(reason.to_string()); s.settle_stage(); }).await?;
                    return Err(reason.into());
                }
            }
        }
        if let Some(points) = &session.discounts.points {
            discounts.points = Some(redeem_points(points.requested, profile.reward_points)?);
        }

        let breakdown = self.pricing.price(&cart, |id| products.get(&id), &discounts);
        let currency = breakdown.currency.clone();
        let mut order = Order::place(NewOrder {
            user_id,
            email: profile.email.clone(),
            total: breakdown.total_money(),
            delivery_fee: breakdown.delivery_money(),
            coupon_code: discounts.coupon.as_ref().map(|c| c.code().to_string()),
            coupon_discount: breakdown.coupon_money(),
            reward_points_used: breakdown.points_discount.to_u32().unwrap_or(0),
            shipping_address: address.clone(),
            payment_method: method.as_str().to_string(),
        }, &cart)?;
        self.deps.orders.insert(&order).await?;
        self.deps.events.publish_all(order.take_events()).await;
        info!(%user_id, order_number = %order.order_number(), total = %breakdown.total, %method, "order submitted to payment");

        let order_id = order.id();
        self.update(user_id, |s| {
            s.discounts = discounts;
            s.stage = CheckoutStage::SubmittedToPayment;
            s.order_id = Some(order_id);
        }).await?;

        Ok(PaymentHandoff {
            amount: Money::new(breakdown.total, &currency),
            customer: Customer {
                user_id,
                name: profile.full_name.clone().unwrap_or_else(|| address.name.clone()),
                email: profile.email,
                contact: address.contact,
            },
            order,
        })
    }

    /// Abandons checkout before payment: the cart is cleared and the session dropped.
    pub async fn cancel(&self, user_id: Uuid) -> Result<(), CheckoutError> {
        if let Some(session) = self.sessions.read().await.get(&user_id) {
            if session.stage == CheckoutStage::SubmittedToPayment {
                return Err(CheckoutError::InvalidStage(session.stage));
            }
        }
        self.deps.carts.clear(user_id).await?;
        self.sessions.write().await.remove(&user_id);
        info!(%user_id, "checkout cancelled");
        Ok(())
    }

    async fn subtotal(&self, user_id: Uuid) -> Result<rust_decimal::Decimal, CheckoutError> {
        let cart = self.deps.carts.cart(user_id).await?;
        let products = self.deps.catalog.snapshot().await?;
        Ok(combo_adjusted(cart.lines(), |id| products.get(&id), &self.pricing.combos).subtotal)
    }

    async fn ensure_stage(&self, user_id: Uuid, allowed: &[CheckoutStage]) -> Result<CheckoutSession, CheckoutError> {
        let session = self.session(user_id).await?;
        if !allowed.contains(&session.stage) { return Err(CheckoutError::InvalidStage(session.stage)); }
        Ok(session)
    }

    async fn update(&self, user_id: Uuid, change: impl FnOnce(&mut CheckoutSession) + Send) -> Result<CheckoutSession, CheckoutError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(&user_id).ok_or(CheckoutError::NoSession)?;
        change(session);
        Ok(session.clone())
    }
}
