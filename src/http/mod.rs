//! HTTP routing surface.

pub mod error;
pub mod extract;
mod handlers;

use axum::{routing::{delete, get, patch, post, put}, Json, Router};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use crate::app::Storefront;
use handlers::*;

pub use error::ApiError;
pub use extract::{AdminUser, Principal, USER_HEADER};

pub fn router(state: Storefront) -> Router {
    let api = Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "storefront-checkout"})) }))
        .route("/products", get(list_products))
        .route("/products/:id", get(get_product))
        .route("/addresses", get(list_addresses))
        .route("/cart", get(get_cart).delete(clear_cart))
        .route("/cart/availability", get(cart_availability))
        .route("/cart/items", post(add_to_cart))
        .route("/cart/items/:product_id", delete(remove_line))
        .route("/cart/items/:product_id/sizes/:size", patch(update_size).delete(remove_size))
        .route("/checkout", post(begin_checkout).get(get_checkout))
        .route("/checkout/address", post(confirm_address))
        .route("/checkout/coupon", post(apply_coupon).delete(remove_coupon))
        .route("/checkout/points", post(apply_points).delete(remove_points))
        .route("/checkout/submit", post(submit_checkout))
        .route("/checkout/cancel", post(cancel_checkout))
        .route("/payments/:order_id/session", post(restart_payment))
        .route("/payments/:order_id/callback", post(payment_callback))
        .route("/orders", get(list_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/issues", post(report_issue))
        .route("/shipments/:awb", get(track_shipment))
        .route("/admin/orders", get(admin_list_orders))
        .route("/admin/orders/:id/status", put(admin_update_status))
        .route("/admin/catalog/refresh", post(admin_refresh_catalog))
        .route("/admin/finalizer/retries", get(admin_pending_retries));

    Router::new()
        .nest("/api/v1", api)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()))
        .with_state(state)
}
