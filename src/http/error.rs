//! Maps service errors onto HTTP responses.

use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use tracing::error;
use crate::domain::aggregates::{CartError, OrderError};
use crate::payments::PaymentError;
use crate::services::{AccessError, CartStoreError, CatalogError, CheckoutError, OrderServiceError};
use crate::storage::StorageError;

/// `{ "error": code, "message": text }` with the matching status.
#[derive(Debug)]
pub struct ApiError { status: StatusCode, code: &'static str, message: String }

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self { status, code, message: message.into() }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self { Self::new(StatusCode::UNAUTHORIZED, "unauthorized", message) }
    pub fn forbidden() -> Self { Self::new(StatusCode::FORBIDDEN, "forbidden", "Admin access required") }
    pub fn not_found(message: impl Into<String>) -> Self { Self::new(StatusCode::NOT_FOUND, "not_found", message) }
    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self { Self::new(StatusCode::CONFLICT, code, message) }
    pub fn invalid(code: &'static str, message: impl Into<String>) -> Self { Self::new(StatusCode::UNPROCESSABLE_ENTITY, code, message) }

    fn internal(source: &dyn std::error::Error) -> Self {
        error!(error = %source, "request failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", "Something went wrong, please try again")
    }

    fn upstream(source: &dyn std::error::Error, message: &str) -> Self {
        error!(error = %source, "remote call failed");
        Self::new(StatusCode::BAD_GATEWAY, "upstream", message)
    }

    pub fn status(&self) -> StatusCode { self.status }
    pub fn code(&self) -> &'static str { self.code }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.code, "message": self.message }))).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self { Self::internal(&e) }
}

impl From<CatalogError> for ApiError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::NotFound(_) => Self::not_found(e.to_string()),
            CatalogError::InsufficientStock { .. } => Self::conflict("out_of_stock", e.to_string()),
            CatalogError::Storage(e) => e.into(),
        }
    }
}

impl From<CartStoreError> for ApiError {
    fn from(e: CartStoreError) -> Self {
        match e {
            CartStoreError::Cart(CartError::InvalidQuantity | CartError::QuantityLimit(_)) => Self::invalid("invalid_quantity", e.to_string()),
            CartStoreError::Cart(_) => Self::not_found(e.to_string()),
            CartStoreError::ProductUnavailable | CartStoreError::UnknownSize(_) => Self::invalid("unavailable", e.to_string()),
            CartStoreError::Catalog(e) => e.into(),
            CartStoreError::Storage(e) => e.into(),
        }
    }
}

impl From<OrderError> for ApiError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::EmptyIssue | OrderError::NoItems => Self::invalid("invalid_order", e.to_string()),
            OrderError::Cancelled | OrderError::InvalidTransition { .. } => Self::conflict("invalid_transition", e.to_string()),
        }
    }
}

impl From<CheckoutError> for ApiError {
    fn from(e: CheckoutError) -> Self {
        match e {
            CheckoutError::NoSession | CheckoutError::AddressNotFound | CheckoutError::ProfileNotFound => Self::not_found(e.to_string()),
            CheckoutError::InvalidStage(_) => Self::conflict("invalid_stage", e.to_string()),
            CheckoutError::EmptyCart => Self::conflict("empty_cart", e.to_string()),
            CheckoutError::OutOfStock => Self::conflict("out_of_stock", e.to_string()),
            CheckoutError::IncompleteAddress(_) => Self::invalid("incomplete_address", e.to_string()),
            CheckoutError::Coupon(_) => Self::invalid("coupon_rejected", e.to_string()),
            CheckoutError::Points(_) => Self::invalid("points_rejected", e.to_string()),
            CheckoutError::Order(e) => e.into(),
            CheckoutError::Cart(e) => e.into(),
            CheckoutError::Catalog(e) => e.into(),
            CheckoutError::Storage(e) => e.into(),
        }
    }
}

impl From<PaymentError> for ApiError {
    fn from(e: PaymentError) -> Self {
        match e {
            PaymentError::InvalidAmount | PaymentError::UnsupportedMethod(_) | PaymentError::SessionMismatch => {
                Self::invalid("invalid_payment", e.to_string())
            }
            PaymentError::OrderNotFound => Self::not_found(e.to_string()),
            PaymentError::NotAwaitingPayment | PaymentError::InProgress | PaymentError::MissingSession => Self::conflict("payment_state", e.to_string()),
            PaymentError::Gateway(ref source) => Self::upstream(source, "Payment provider is unavailable, please try again"),
            PaymentError::Order(e) => e.into(),
            PaymentError::Storage(e) => e.into(),
        }
    }
}

impl From<OrderServiceError> for ApiError {
    fn from(e: OrderServiceError) -> Self {
        match e {
            OrderServiceError::NotFound | OrderServiceError::ShipmentNotFound => Self::not_found(e.to_string()),
            OrderServiceError::Order(e) => e.into(),
            OrderServiceError::Tracking(ref source) => Self::upstream(source, "Tracking is unavailable right now"),
            OrderServiceError::Storage(e) => e.into(),
        }
    }
}

impl From<AccessError> for ApiError {
    fn from(e: AccessError) -> Self {
        match e {
            AccessError::Forbidden => Self::forbidden(),
            AccessError::Storage(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pricing::CouponRejection;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::from(CheckoutError::Coupon(CouponRejection::Expired)).status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(ApiError::from(CheckoutError::EmptyCart).status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::from(AccessError::Forbidden).status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::from(StorageError::Unavailable("down".into())).status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ApiError::from(OrderServiceError::NotFound).code(), "not_found");
    }
}
