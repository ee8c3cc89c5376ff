//! Wiring: repositories, remote collaborators and services in one place.

use std::sync::Arc;
use crate::config::Config;
use crate::domain::aggregates::{Coupon, Product, Profile};
use crate::domain::pricing::PricingRules;
use crate::integrations::{CourierClient, EventPublisher, FunctionInvoker, Notifier};
use crate::payments::{PaymentGateway, PaymentProcessor};
use crate::services::{
    AccessControl, CartStore, Catalog, CheckoutDeps, CheckoutService, FinalizerDeps, OrderFinalizer, OrderService,
};
use crate::storage::memory::{MemoryAddresses, MemoryCarts, MemoryCoupons, MemoryOrders, MemoryProducts, MemoryProfiles};
use crate::storage::postgres::PgStore;
use crate::storage::{AddressRepository, CartRepository, CouponRepository, OrderRepository, ProductRepository, ProfileRepository};

#[derive(Clone)]
pub struct Repositories {
    pub products: Arc<dyn ProductRepository>,
    pub carts: Arc<dyn CartRepository>,
    pub coupons: Arc<dyn CouponRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub addresses: Arc<dyn AddressRepository>,
}

impl Repositories {
    pub fn postgres(store: PgStore) -> Self {
        let store = Arc::new(store);
        Self {
            products: store.clone(), carts: store.clone(), coupons: store.clone(),
            orders: store.clone(), profiles: store.clone(), addresses: store,
        }
    }

    pub fn in_memory(
        products: impl IntoIterator<Item = Product>,
        coupons: impl IntoIterator<Item = Coupon>,
        profiles: impl IntoIterator<Item = Profile>,
    ) -> Self {
        Self {
            products: Arc::new(MemoryProducts::new(products)),
            carts: Arc::new(MemoryCarts::default()),
            coupons: Arc::new(MemoryCoupons::new(coupons)),
            orders: Arc::new(MemoryOrders::default()),
            profiles: Arc::new(MemoryProfiles::new(profiles)),
            addresses: Arc::new(MemoryAddresses::default()),
        }
    }
}

/// Settings the services need from [`Config`].
#[derive(Clone, Debug)]
pub struct Settings {
    pub currency: String,
    pub pricing: PricingRules,
    pub admin_email: Option<String>,
    pub max_step_attempts: u32,
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Self {
            currency: config.currency.clone(),
            pricing: config.pricing.clone(),
            admin_email: config.admin_email.clone(),
            max_step_attempts: config.max_step_attempts,
        }
    }
}

/// Every service the HTTP layer reaches, shared behind `Arc`s.
#[derive(Clone)]
pub struct Storefront {
    pub catalog: Arc<Catalog>,
    pub carts: Arc<CartStore>,
    pub checkout: Arc<CheckoutService>,
    pub payments: Arc<PaymentProcessor>,
    pub orders: Arc<OrderService>,
    pub access: AccessControl,
    pub addresses: Arc<dyn AddressRepository>,
}

impl Storefront {
    pub fn assemble(
        repos: Repositories,
        functions: Arc<dyn FunctionInvoker>,
        gateways: Vec<Arc<dyn PaymentGateway>>,
        events: EventPublisher,
        settings: Settings,
    ) -> Self {
        let catalog = Arc::new(Catalog::new(repos.products.clone(), events.clone()));
        let carts = Arc::new(CartStore::new(repos.carts.clone(), catalog.clone(), settings.currency.clone()));
        let courier = CourierClient::new(functions.clone());
        let notifier = Notifier::new(functions, settings.admin_email.clone());

        let finalizer = Arc::new(OrderFinalizer::new(FinalizerDeps {
            orders: repos.orders.clone(),
            coupons: repos.coupons.clone(),
            profiles: repos.profiles.clone(),
            catalog: catalog.clone(),
            carts: carts.clone(),
            courier: courier.clone(),
            notifier,
            events: events.clone(),
        }, settings.max_step_attempts));
        let checkout = Arc::new(CheckoutService::new(CheckoutDeps {
            catalog: catalog.clone(),
            carts: carts.clone(),
            coupons: repos.coupons.clone(),
            profiles: repos.profiles.clone(),
            addresses: repos.addresses.clone(),
            orders: repos.orders.clone(),
            events: events.clone(),
        }, settings.pricing));
        let payments = Arc::new(PaymentProcessor::new(gateways, repos.orders.clone(), finalizer, events.clone()));
        let orders = Arc::new(OrderService::new(repos.orders.clone(), courier, events));

        Self {
            catalog, carts, checkout, payments, orders,
            access: AccessControl::new(repos.profiles.clone()),
            addresses: repos.addresses,
        }
    }
}
