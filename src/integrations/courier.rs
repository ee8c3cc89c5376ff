//! Courier booking and shipment tracking.

use std::sync::Arc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use crate::domain::aggregates::Order;
use super::functions::{invoke_typed, FunctionError, FunctionInvoker};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shipment {
    pub awb: String,
    #[serde(default)]
    pub courier_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingEvent {
    pub status: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingInfo {
    pub awb: String,
    pub status: String,
    #[serde(default)]
    pub events: Vec<TrackingEvent>,
}

#[derive(Clone)]
pub struct CourierClient { functions: Arc<dyn FunctionInvoker> }

impl CourierClient {
    pub fn new(functions: Arc<dyn FunctionInvoker>) -> Self { Self { functions } }

    pub async fn book_shipment(&self, order: &Order) -> Result<Shipment, FunctionError> {
        let address = order.shipping_address();
        let payload = json!({
            "order_number": order.order_number(),
            "consignee": {
                "name": address.name,
                "phone": address.contact,
                "address": address.street,
                "city": address.city,
                "state": address.state,
                "pincode": address.zip,
                "country": address.country,
            },
            "payment_mode": "prepaid",
            "total_amount": order.total().amount(),
            "quantity": order.total_units(),
            "products": order.items().iter().map(|i| json!({ "name": i.name, "quantity": i.sizes.iter().map(|s| s.quantity.value()).sum::<u32>() })).collect::<Vec<_>>(),
        });
        let shipment: Shipment = invoke_typed(self.functions.as_ref(), "create-shipment", &payload).await?;
        if shipment.awb.trim().is_empty() {
            return Err(FunctionError::InvalidResponse { name: "create-shipment".into(), message: "empty AWB".into() });
        }
        Ok(shipment)
    }

    pub async fn track(&self, awb: &str) -> Result<TrackingInfo, FunctionError> {
        invoke_typed(self.functions.as_ref(), "track-shipment", &json!({ "awb": awb })).await
    }
}
