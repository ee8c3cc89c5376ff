#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use uuid::Uuid;
use storefront_checkout::domain::aggregates::{Coupon, Product, Profile, Role};
use storefront_checkout::domain::pricing::{DeliveryPolicy, PricingRules};
use storefront_checkout::domain::value_objects::{Money, ShippingAddress, Sku};
use storefront_checkout::integrations::{EventPublisher, FunctionError, FunctionInvoker};
use storefront_checkout::payments::{CashfreeGateway, PaymentGateway, RazorpayGateway};
use storefront_checkout::{Repositories, Settings, Storefront};

/// Remote functions answering from a table, recording every call.
pub struct FakeFunctions {
    responses: Mutex<HashMap<String, Value>>,
    failing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<(String, Value)>>,
    held: Mutex<Option<(String, Arc<Semaphore>)>>,
}

impl FakeFunctions {
    pub fn new() -> Self {
        let responses = [
            ("create-razorpay-order", json!({ "id": "order_rzp_1" })),
            ("verify-razorpay-payment", json!({ "verified": true })),
            ("create-cashfree-order", json!({ "order_id": "cf_order_1", "payment_session_id": "session_1" })),
            ("cashfree-order-status", json!({ "order_status": "PAID", "cf_payment_id": "cf_pay_1" })),
            ("create-shipment", json!({ "awb": "AWB001", "courier_name": "Delhivery" })),
            ("track-shipment", json!({ "awb": "AWB001", "status": "in_transit", "events": [] })),
            ("send-email", json!({ "sent": true })),
        ];
        Self {
            responses: Mutex::new(responses.into_iter().map(|(k, v)| (k.to_string(), v)).collect()),
            failing: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
            held: Mutex::new(None),
        }
    }

    pub fn fail(&self, name: &str) { self.failing.lock().unwrap().insert(name.to_string()); }

    pub fn recover(&self, name: &str) { self.failing.lock().unwrap().remove(name); }

    /// Calls to `name` wait until the returned semaphore gets a permit.
    pub fn hold(&self, name: &str) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.held.lock().unwrap() = Some((name.to_string(), gate.clone()));
        gate
    }

    pub fn calls_to(&self, name: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|(n, _)| n == name).count()
    }
}

#[async_trait]
impl FunctionInvoker for FakeFunctions {
    async fn invoke(&self, name: &str, payload: Value) -> Result<Value, FunctionError> {
        self.calls.lock().unwrap().push((name.to_string(), payload));
        let gate = self.held.lock().unwrap().as_ref().filter(|(n, _)| n == name).map(|(_, g)| g.clone());
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }
        if self.failing.lock().unwrap().contains(name) {
            return Err(FunctionError::Failed { name: name.to_string(), message: "503: unavailable".into() });
        }
        Ok(self.responses.lock().unwrap().get(name).cloned().unwrap_or(Value::Null))
    }
}

pub struct Fixture {
    pub storefront: Storefront,
    pub repos: Repositories,
    pub functions: Arc<FakeFunctions>,
    pub user: Uuid,
    pub admin: Uuid,
    pub tee: Product,
    pub hoodie: Product,
}

pub fn inr(amount: i64) -> Decimal { Decimal::new(amount, 0) }

pub fn fixture() -> Fixture {
    let user = Uuid::new_v4();
    let admin = Uuid::new_v4();
    let tee = Product::create(Uuid::new_v4(), Sku::new("TEE-001").unwrap(), "Oversized Tee", Money::inr(inr(500)))
        .with_size("M", 5)
        .with_size("L", 1)
        .with_image("https://cdn.example.com/tee.jpg");
    let hoodie = Product::create(Uuid::new_v4(), Sku::new("HOOD-001").unwrap(), "Hoodie", Money::inr(inr(1200)))
        .with_size("M", 3);
    let coupons = [
        Coupon::flat("WELCOME", inr(100)),
        Coupon::flat("ONTHEHOUSE", inr(1000)),
        Coupon::flat("MIN800", inr(50)).with_min_order(inr(800)),
        Coupon::flat("BIGSPENDER", inr(500)).with_min_order(inr(5000)),
        Coupon::percentage("OLD", inr(10)).with_window(None, Some(Utc::now() - Duration::days(1))),
    ];
    let profiles = [
        Profile::customer(user, "asha@example.com").with_points(250),
        Profile::customer(admin, "ops@example.com").with_role(Role::Admin),
    ];
    let repos = Repositories::in_memory([tee.clone(), hoodie.clone()], coupons, profiles);
    let functions = Arc::new(FakeFunctions::new());
    let invoker: Arc<dyn FunctionInvoker> = functions.clone();
    let gateways: Vec<Arc<dyn PaymentGateway>> = vec![
        Arc::new(RazorpayGateway::new(invoker.clone(), Some("rzp_test_key".into()))),
        Arc::new(CashfreeGateway::new(invoker.clone(), "sandbox")),
    ];
    let settings = Settings {
        currency: "INR".into(),
        pricing: PricingRules { combos: vec![], delivery: DeliveryPolicy { flat_fee: inr(99), free_above: Some(inr(999)) } },
        admin_email: Some("admin@example.com".into()),
        max_step_attempts: 3,
    };
    let storefront = Storefront::assemble(repos.clone(), invoker, gateways, EventPublisher::disabled(), settings);
    Fixture { storefront, repos, functions, user, admin, tee, hoodie }
}

pub fn address() -> ShippingAddress {
    ShippingAddress {
        name: "Asha Rao".into(),
        contact: "9876543210".into(),
        street: "12 MG Road".into(),
        city: "Bengaluru".into(),
        state: "Karnataka".into(),
        zip: "560001".into(),
        country: "India".into(),
    }
}
