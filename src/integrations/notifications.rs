//! Transactional email.

use std::sync::Arc;
use serde_json::{json, Value};
use crate::domain::aggregates::Order;
use super::functions::{FunctionError, FunctionInvoker};

#[derive(Clone)]
pub struct Notifier {
    functions: Arc<dyn FunctionInvoker>,
    admin_email: Option<String>,
}

impl Notifier {
    pub fn new(functions: Arc<dyn FunctionInvoker>, admin_email: Option<String>) -> Self { Self { functions, admin_email } }

    pub async fn order_confirmation(&self, order: &Order) -> Result<(), FunctionError> {
        let subject = format!("Order {} confirmed", order.order_number());
        let body = format!(
            "Thank you for your order {}. We received your payment of {} and will let you know when it ships.",
            order.order_number(), order.total()
        );
        self.send(order.email(), &subject, &body).await
    }

    /// Skipped when no admin address is configured.
    pub async fn admin_alert(&self, order: &Order) -> Result<(), FunctionError> {
        let Some(admin) = &self.admin_email else { return Ok(()) };
        let subject = format!("New order {}", order.order_number());
        let body = format!(
            "Order {} for {} ({} items) was paid by {}.",
            order.order_number(), order.total(), order.total_units(), order.email()
        );
        self.send(admin, &subject, &body).await
    }

    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), FunctionError> {
        let _: Value = self.functions.invoke("send-email", json!({ "to": to, "subject": subject, "text": body })).await?;
        Ok(())
    }
}
