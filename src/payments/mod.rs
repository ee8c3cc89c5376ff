//! Payment Adapter: one gateway implementation per hosted checkout.
//!
//! A gateway creates the remote payment session the browser is sent to and,
//! once the hosted checkout reports back, turns that callback into a verified
//! [`PaymentOutcome`].

pub mod cashfree;
pub mod processor;
pub mod razorpay;

use std::fmt;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;
use crate::domain::aggregates::OrderError;
use crate::integrations::FunctionError;
use crate::storage::StorageError;

pub use cashfree::CashfreeGateway;
pub use processor::{PaymentProcessor, PaymentResult, PaymentStart};
pub use razorpay::RazorpayGateway;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Razorpay,
    Cashfree,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Razorpay => "razorpay", Self::Cashfree => "cashfree" }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "razorpay" => Some(Self::Razorpay),
            "cashfree" => Some(Self::Cashfree),
            _ => None,
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Who is paying, as shown on the hosted checkout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub contact: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub order_id: Uuid,
    pub order_number: String,
    pub amount: Decimal,
    pub currency: String,
    pub customer: Customer,
}

/// Remote session handed to the browser.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaymentSession {
    pub method: PaymentMethod,
    pub gateway_order_id: String,
    /// Gateway-specific fields the hosted checkout needs.
    pub checkout: Value,
}

/// What the hosted checkout reported.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GatewayCallback {
    Success {
        #[serde(default)]
        gateway_order_id: Option<String>,
        #[serde(default)]
        payment_id: Option<String>,
        #[serde(default)]
        signature: Option<String>,
    },
    Failure { reason: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub gateway_order_id: String,
    pub payment_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaymentOutcome {
    Paid(PaymentReceipt),
    Failed { reason: String },
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Payment amount must be positive")]
    InvalidAmount,

    #[error("Payment method {0} is not configured")]
    UnsupportedMethod(String),

    #[error("Order not found")]
    OrderNotFound,

    #[error("Order is not awaiting payment")]
    NotAwaitingPayment,

    #[error("Payment for this order is already being confirmed")]
    InProgress,

    #[error("Payment session not found for this order")]
    MissingSession,

    #[error("Callback does not belong to this payment session")]
    SessionMismatch,

    #[error("Payment gateway error: {0}")]
    Gateway(#[from] FunctionError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn method(&self) -> PaymentMethod;

    async fn create_session(&self, request: &PaymentRequest) -> Result<PaymentSession, PaymentError>;

    /// Verifies a callback for the session identified by `gateway_order_id`.
    async fn resolve(&self, gateway_order_id: &str, callback: GatewayCallback) -> Result<PaymentOutcome, PaymentError>;
}

/// Amount in the currency's minor unit (paise for INR).
pub(crate) fn minor_units(amount: Decimal) -> Result<u64, PaymentError> {
    use rust_decimal::prelude::ToPrimitive;
    if amount <= Decimal::ZERO { return Err(PaymentError::InvalidAmount); }
    (amount * Decimal::ONE_HUNDRED).round().to_u64().ok_or(PaymentError::InvalidAmount)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minor_units() {
        assert_eq!(minor_units(Decimal::new(49950, 2)).unwrap(), 49950);
        assert_eq!(minor_units(Decimal::new(999, 0)).unwrap(), 99900);
        assert!(matches!(minor_units(Decimal::ZERO), Err(PaymentError::InvalidAmount)));
    }

    #[test]
    fn test_callback_wire_format() {
        let callback: GatewayCallback = serde_json::from_str(r#"{"outcome":"failure","reason":"card declined"}"#).unwrap();
        assert_eq!(callback, GatewayCallback::Failure { reason: "card declined".into() });
        let callback: GatewayCallback = serde_json::from_str(r#"{"outcome":"success","payment_id":"pay_1"}"#).unwrap();
        assert!(matches!(callback, GatewayCallback::Success { payment_id: Some(_), signature: None, .. }));
    }

    #[test]
    fn test_method_parse() {
        assert_eq!(PaymentMethod::parse("Cashfree"), Some(PaymentMethod::Cashfree));
        assert_eq!(PaymentMethod::parse("paypal"), None);
    }
}
