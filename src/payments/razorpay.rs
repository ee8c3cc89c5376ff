//! Razorpay-style hosted checkout: the browser returns payment id, order id
//! and an HMAC signature, which the `verify-razorpay-payment` function checks.

use std::sync::Arc;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use crate::integrations::{invoke_typed, FunctionInvoker};
use super::{minor_units, GatewayCallback, PaymentError, PaymentGateway, PaymentMethod, PaymentOutcome, PaymentReceipt, PaymentRequest, PaymentSession};

#[derive(Debug, Deserialize)]
struct RemoteOrder {
    id: String,
    #[serde(default)]
    amount: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Verification {
    verified: bool,
}

pub struct RazorpayGateway {
    functions: Arc<dyn FunctionInvoker>,
    key_id: Option<String>,
}

impl RazorpayGateway {
    /// `key_id` is the public key the hosted checkout is opened with.
    pub fn new(functions: Arc<dyn FunctionInvoker>, key_id: Option<String>) -> Self { Self { functions, key_id } }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    fn method(&self) -> PaymentMethod { PaymentMethod::Razorpay }

    async fn create_session(&self, request: &PaymentRequest) -> Result<PaymentSession, PaymentError> {
        let amount = minor_units(request.amount)?;
        let payload = json!({
            "amount": amount,
            "currency": request.currency,
            "receipt": request.order_number,
            "notes": { "order_id": request.order_id },
        });
        let order: RemoteOrder = invoke_typed(self.functions.as_ref(), "create-razorpay-order", &payload).await?;
        info!(order_number = %request.order_number, gateway_order_id = %order.id, "razorpay order created");
        Ok(PaymentSession {
            method: PaymentMethod::Razorpay,
            gateway_order_id: order.id.clone(),
            checkout: json!({
                "key": self.key_id,
                "order_id": order.id,
                "amount": order.amount.unwrap_or(amount),
                "currency": request.currency,
                "prefill": {
                    "name": request.customer.name,
                    "email": request.customer.email,
                    "contact": request.customer.contact,
                },
            }),
        })
    }

    async fn resolve(&self, gateway_order_id: &str, callback: GatewayCallback) -> Result<PaymentOutcome, PaymentError> {
        let (reported_order, payment_id, signature) = match callback {
            GatewayCallback::Failure { reason } => return Ok(PaymentOutcome::Failed { reason }),
            GatewayCallback::Success { gateway_order_id: reported, payment_id, signature } => (reported, payment_id, signature),
        };
        if reported_order.as_deref().is_some_and(|id| id != gateway_order_id) {
            return Err(PaymentError::SessionMismatch);
        }
        let (Some(payment_id), Some(signature)) = (payment_id, signature) else {
            return Ok(PaymentOutcome::Failed { reason: "Payment response was incomplete".into() });
        };
        let payload = json!({
            "razorpay_order_id": gateway_order_id,
            "razorpay_payment_id": payment_id,
            "razorpay_signature": signature,
        });
        let verification: Verification = invoke_typed(self.functions.as_ref(), "verify-razorpay-payment", &payload).await?;
        if !verification.verified {
            warn!(%gateway_order_id, "razorpay signature rejected");
            return Ok(PaymentOutcome::Failed { reason: "Payment verification failed".into() });
        }
        Ok(PaymentOutcome::Paid(PaymentReceipt { gateway_order_id: gateway_order_id.to_string(), payment_id }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use uuid::Uuid;
    use crate::integrations::functions::ScriptedFunctions;
    use crate::payments::Customer;

    fn request() -> PaymentRequest {
        PaymentRequest {
            order_id: Uuid::new_v4(), order_number: "ORD-00000001".into(), amount: Decimal::new(49900, 2), currency: "INR".into(),
            customer: Customer { user_id: Uuid::new_v4(), name: "Asha".into(), email: "asha@example.com".into(), contact: "9999999999".into() },
        }
    }

    fn success(order: &str) -> GatewayCallback {
        GatewayCallback::Success { gateway_order_id: Some(order.into()), payment_id: Some("pay_1".into()), signature: Some("sig".into()) }
    }

    #[tokio::test]
    async fn test_session_amount_in_paise() {
        let functions = Arc::new(ScriptedFunctions::default().respond("create-razorpay-order", json!({ "id": "order_1" })));
        let gateway = RazorpayGateway::new(functions.clone(), Some("rzp_key".into()));
        let session = gateway.create_session(&request()).await.unwrap();
        assert_eq!(session.gateway_order_id, "order_1");
        assert_eq!(functions.calls_to("create-razorpay-order")[0]["amount"], json!(49900));
        assert_eq!(session.checkout["key"], json!("rzp_key"));
    }

    #[tokio::test]
    async fn test_verified_signature_pays() {
        let functions = Arc::new(ScriptedFunctions::default().respond("verify-razorpay-payment", json!({ "verified": true })));
        let gateway = RazorpayGateway::new(functions, None);
        let outcome = gateway.resolve("order_1", success("order_1")).await.unwrap();
        assert_eq!(outcome, PaymentOutcome::Paid(PaymentReceipt { gateway_order_id: "order_1".into(), payment_id: "pay_1".into() }));
    }

    #[tokio::test]
    async fn test_rejected_signature_fails() {
        let functions = Arc::new(ScriptedFunctions::default().respond("verify-razorpay-payment", json!({ "verified": false })));
        let gateway = RazorpayGateway::new(functions, None);
        assert!(matches!(gateway.resolve("order_1", success("order_1")).await.unwrap(), PaymentOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn test_foreign_order_rejected() {
        let gateway = RazorpayGateway::new(Arc::new(ScriptedFunctions::default()), None);
        assert!(matches!(gateway.resolve("order_1", success("order_2")).await, Err(PaymentError::SessionMismatch)));
    }
}
