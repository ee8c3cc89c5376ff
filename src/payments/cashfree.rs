//! Cashfree-style hosted checkout: the browser only reports success or
//! failure, so success is confirmed by reading the order status back.

use std::sync::Arc;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use crate::integrations::{invoke_typed, FunctionInvoker};
use super::{GatewayCallback, PaymentError, PaymentGateway, PaymentMethod, PaymentOutcome, PaymentReceipt, PaymentRequest, PaymentSession};

#[derive(Debug, Deserialize)]
struct RemoteOrder {
    #[serde(default)]
    order_id: Option<String>,
    payment_session_id: String,
}

#[derive(Debug, Deserialize)]
struct OrderStatus {
    order_status: String,
    #[serde(default)]
    cf_payment_id: Option<String>,
}

pub struct CashfreeGateway {
    functions: Arc<dyn FunctionInvoker>,
    mode: String,
}

impl CashfreeGateway {
    /// `mode` is "sandbox" or "production".
    pub fn new(functions: Arc<dyn FunctionInvoker>, mode: impl Into<String>) -> Self { Self { functions, mode: mode.into() } }
}

#[async_trait]
impl PaymentGateway for CashfreeGateway {
    fn method(&self) -> PaymentMethod { PaymentMethod::Cashfree }

    async fn create_session(&self, request: &PaymentRequest) -> Result<PaymentSession, PaymentError> {
        if request.amount <= rust_decimal::Decimal::ZERO { return Err(PaymentError::InvalidAmount); }
        let payload = json!({
            "order_id": request.order_number,
            "order_amount": request.amount.round_dp(2),
            "order_currency": request.currency,
            "customer_details": {
                "customer_id": request.customer.user_id,
                "customer_name": request.customer.name,
                "customer_email": request.customer.email,
                "customer_phone": request.customer.contact,
            },
        });
        let order: RemoteOrder = invoke_typed(self.functions.as_ref(), "create-cashfree-order", &payload).await?;
        let gateway_order_id = order.order_id.unwrap_or_else(|| request.order_number.clone());
        info!(order_number = %request.order_number, %gateway_order_id, "cashfree order created");
        Ok(PaymentSession {
            method: PaymentMethod::Cashfree,
            gateway_order_id,
            checkout: json!({ "payment_session_id": order.payment_session_id, "mode": self.mode }),
        })
    }

    async fn resolve(&self, gateway_order_id: &str, callback: GatewayCallback) -> Result<PaymentOutcome, PaymentError> {
        let reported_payment = match callback {
            GatewayCallback::Failure { reason } => return Ok(PaymentOutcome::Failed { reason }),
            GatewayCallback::Success { gateway_order_id: Some(reported), .. } if reported != gateway_order_id => {
                return Err(PaymentError::SessionMismatch);
            }
            GatewayCallback::Success { payment_id, .. } => payment_id,
        };
        let status: OrderStatus = invoke_typed(self.functions.as_ref(), "cashfree-order-status", &json!({ "order_id": gateway_order_id })).await?;
        if !status.order_status.eq_ignore_ascii_case("PAID") {
            warn!(%gateway_order_id, status = %status.order_status, "cashfree order not paid");
            return Ok(PaymentOutcome::Failed { reason: format!("Payment not completed ({})", status.order_status.to_lowercase()) });
        }
        let payment_id = status.cf_payment_id.or(reported_payment).unwrap_or_else(|| gateway_order_id.to_string());
        Ok(PaymentOutcome::Paid(PaymentReceipt { gateway_order_id: gateway_order_id.to_string(), payment_id }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::functions::ScriptedFunctions;

    fn success() -> GatewayCallback {
        GatewayCallback::Success { gateway_order_id: None, payment_id: None, signature: None }
    }

    #[tokio::test]
    async fn test_success_confirmed_by_status() {
        let functions = Arc::new(ScriptedFunctions::default()
            .respond("cashfree-order-status", json!({ "order_status": "PAID", "cf_payment_id": "cf_77" })));
        let gateway = CashfreeGateway::new(functions.clone(), "sandbox");
        let outcome = gateway.resolve("ORD-00000001", success()).await.unwrap();
        assert_eq!(outcome, PaymentOutcome::Paid(PaymentReceipt { gateway_order_id: "ORD-00000001".into(), payment_id: "cf_77".into() }));
        assert_eq!(functions.calls_to("cashfree-order-status")[0]["order_id"], json!("ORD-00000001"));
    }

    #[tokio::test]
    async fn test_unpaid_status_is_failure() {
        let functions = Arc::new(ScriptedFunctions::default().respond("cashfree-order-status", json!({ "order_status": "ACTIVE" })));
        let gateway = CashfreeGateway::new(functions, "sandbox");
        assert_eq!(
            gateway.resolve("ORD-1", success()).await.unwrap(),
            PaymentOutcome::Failed { reason: "Payment not completed (active)".into() }
        );
    }

    #[tokio::test]
    async fn test_failure_callback_skips_status_lookup() {
        let functions = Arc::new(ScriptedFunctions::default());
        let gateway = CashfreeGateway::new(functions.clone(), "sandbox");
        let outcome = gateway.resolve("ORD-1", GatewayCallback::Failure { reason: "user cancelled".into() }).await.unwrap();
        assert_eq!(outcome, PaymentOutcome::Failed { reason: "user cancelled".into() });
        assert!(functions.calls_to("cashfree-order-status").is_empty());
    }
}
