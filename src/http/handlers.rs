//! Request handlers for the `/api/v1` routes.

use axum::{extract::{Path, Query, State}, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::app::Storefront;
use crate::domain::aggregates::{Cart, CartAvailability, Order, OrderStatus, Product, SavedAddress};
use crate::domain::pricing::PriceBreakdown;
use crate::domain::value_objects::{Money, Size};
use crate::payments::{Customer, GatewayCallback, PaymentMethod, PaymentResult, PaymentSession, PaymentStart};
use crate::services::{AddressChoice, CheckoutSession, IssueKind, RetryJob};
use crate::integrations::TrackingInfo;
use super::error::ApiError;
use super::extract::{AdminUser, Principal};

type ApiResult<T> = Result<Json<T>, ApiError>;

pub async fn list_products(State(s): State<Storefront>) -> ApiResult<Vec<Product>> {
    Ok(Json(s.catalog.products().await?))
}

pub async fn get_product(State(s): State<Storefront>, Path(id): Path<Uuid>) -> ApiResult<Product> {
    let product = s.catalog.product(id).await?;
    if !product.is_active() { return Err(ApiError::not_found("Product not found")); }
    Ok(Json(product))
}

pub async fn list_addresses(State(s): State<Storefront>, p: Principal) -> ApiResult<Vec<SavedAddress>> {
    Ok(Json(s.addresses.list_for_user(p.user_id).await?))
}

#[derive(Debug, Serialize)]
pub struct CartView { pub cart: Cart, pub total_price: Money, pub total_items: u32, pub availability: CartAvailability, pub notice: Option<String> }

async fn cart_view(s: &Storefront, user_id: Uuid) -> Result<CartView, ApiError> {
    let (cart, availability) = s.carts.availability(user_id).await?;
    let notice = s.checkout.refresh(user_id).await?.and_then(|session| session.notice);
    Ok(CartView { total_price: cart.total_price(), total_items: cart.total_items(), cart, availability, notice })
}

pub async fn get_cart(State(s): State<Storefront>, p: Principal) -> ApiResult<CartView> {
    Ok(Json(cart_view(&s, p.user_id).await?))
}

pub async fn cart_availability(State(s): State<Storefront>, p: Principal) -> ApiResult<CartAvailability> {
    Ok(Json(s.carts.availability(p.user_id).await?.1))
}

#[derive(Debug, Deserialize)] pub struct AddItemRequest { pub product_id: Uuid, pub size: String, pub quantity: Option<u32> }

pub async fn add_to_cart(State(s): State<Storefront>, p: Principal, Json(r): Json<AddItemRequest>) -> Result<(StatusCode, Json<CartView>), ApiError> {
    s.carts.add_to_cart(p.user_id, r.product_id, Size::new(&r.size), r.quantity.unwrap_or(1)).await?;
    Ok((StatusCode::CREATED, Json(cart_view(&s, p.user_id).await?)))
}

#[derive(Debug, Deserialize)] pub struct UpdateSizeRequest { pub delta: i32 }

pub async fn update_size(State(s): State<Storefront>, p: Principal, Path((product_id, size)): Path<(Uuid, String)>, Json(r): Json<UpdateSizeRequest>) -> ApiResult<CartView> {
    s.carts.update_size_quantity(p.user_id, product_id, &Size::new(&size), r.delta).await?;
    Ok(Json(cart_view(&s, p.user_id).await?))
}

pub async fn remove_size(State(s): State<Storefront>, p: Principal, Path((product_id, size)): Path<(Uuid, String)>) -> ApiResult<CartView> {
    s.carts.remove_size_from_cart(p.user_id, product_id, &Size::new(&size)).await?;
    Ok(Json(cart_view(&s, p.user_id).await?))
}

pub async fn remove_line(State(s): State<Storefront>, p: Principal, Path(product_id): Path<Uuid>) -> ApiResult<CartView> {
    s.carts.remove_from_cart(p.user_id, product_id).await?;
    Ok(Json(cart_view(&s, p.user_id).await?))
}

pub async fn clear_cart(State(s): State<Storefront>, p: Principal) -> ApiResult<CartView> {
    s.carts.clear(p.user_id).await?;
    Ok(Json(cart_view(&s, p.user_id).await?))
}

#[derive(Debug, Serialize)]
pub struct CheckoutView { pub session: CheckoutSession, pub price: PriceBreakdown }

async fn checkout_view(s: &Storefront, session: CheckoutSession) -> Result<CheckoutView, ApiError> {
    let price = s.checkout.quote(session.user_id).await?;
    Ok(CheckoutView { session, price })
}

pub async fn begin_checkout(State(s): State<Storefront>, p: Principal) -> Result<(StatusCode, Json<CheckoutView>), ApiError> {
    let session = s.checkout.begin(p.user_id).await?;
    Ok((StatusCode::CREATED, Json(checkout_view(&s, session).await?)))
}

pub async fn get_checkout(State(s): State<Storefront>, p: Principal) -> ApiResult<CheckoutView> {
    let session = s.checkout.session(p.user_id).await?;
    Ok(Json(checkout_view(&s, session).await?))
}

pub async fn confirm_address(State(s): State<Storefront>, p: Principal, Json(choice): Json<AddressChoice>) -> ApiResult<CheckoutView> {
    let session = s.checkout.confirm_address(p.user_id, choice).await?;
    Ok(Json(checkout_view(&s, session).await?))
}

#[derive(Debug, Deserialize)] pub struct CouponRequest { pub code: String }

pub async fn apply_coupon(State(s): State<Storefront>, p: Principal, Json(r): Json<CouponRequest>) -> ApiResult<CheckoutView> {
    let session = s.checkout.apply_coupon(p.user_id, &r.code).await?;
    Ok(Json(checkout_view(&s, session).await?))
}

pub async fn remove_coupon(State(s): State<Storefront>, p: Principal) -> ApiResult<CheckoutView> {
    let session = s.checkout.remove_coupon(p.user_id).await?;
    Ok(Json(checkout_view(&s, session).await?))
}

#[derive(Debug, Deserialize)] pub struct PointsRequest { pub points: u32 }

pub async fn apply_points(State(s): State<Storefront>, p: Principal, Json(r): Json<PointsRequest>) -> ApiResult<CheckoutView> {
    let session = s.checkout.apply_points(p.user_id, r.points).await?;
    Ok(Json(checkout_view(&s, session).await?))
}

pub async fn remove_points(State(s): State<Storefront>, p: Principal) -> ApiResult<CheckoutView> {
    let session = s.checkout.remove_points(p.user_id).await?;
    Ok(Json(checkout_view(&s, session).await?))
}

#[derive(Debug, Deserialize)] pub struct SubmitRequest { pub payment_method: PaymentMethod }
/// `session` is present when the customer still has to pay through the
/// gateway; `settled` when discounts covered the whole total.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub order_id: Uuid,
    pub order_number: String,
    pub amount: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<PaymentSession>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settled: Option<PaymentResult>,
}

pub async fn submit_checkout(State(s): State<Storefront>, p: Principal, Json(r): Json<SubmitRequest>) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let handoff = s.checkout.submit(p.user_id, r.payment_method).await?;
    let (session, settled) = match s.payments.start(&handoff.order, handoff.customer).await? {
        PaymentStart::Hosted(session) => (Some(session), None),
        PaymentStart::Settled(result) => (None, Some(result)),
    };
    Ok((StatusCode::CREATED, Json(SubmitResponse {
        order_id: handoff.order.id(), order_number: handoff.order.order_number().to_string(), amount: handoff.amount, session, settled,
    })))
}

pub async fn cancel_checkout(State(s): State<Storefront>, p: Principal) -> Result<StatusCode, ApiError> {
    s.checkout.cancel(p.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Opens a new hosted checkout for an order whose first session could not be used.
pub async fn restart_payment(State(s): State<Storefront>, p: Principal, Path(order_id): Path<Uuid>) -> ApiResult<PaymentStart> {
    let order = s.orders.get(p.user_id, order_id).await?;
    let address = order.shipping_address();
    let customer = Customer { user_id: p.user_id, name: address.name.clone(), email: order.email().to_string(), contact: address.contact.clone() };
    Ok(Json(s.payments.start(&order, customer).await?))
}

pub async fn payment_callback(State(s): State<Storefront>, p: Principal, Path(order_id): Path<Uuid>, Json(callback): Json<GatewayCallback>) -> ApiResult<PaymentResult> {
    Ok(Json(s.payments.complete(p.user_id, order_id, callback).await?))
}

pub async fn list_orders(State(s): State<Storefront>, p: Principal) -> ApiResult<Vec<Order>> {
    Ok(Json(s.orders.list_for_user(p.user_id).await?))
}

pub async fn get_order(State(s): State<Storefront>, p: Principal, Path(id): Path<Uuid>) -> ApiResult<Order> {
    Ok(Json(s.orders.get(p.user_id, id).await?))
}

#[derive(Debug, Deserialize)] pub struct IssueRequest { pub kind: IssueKind, pub message: String }

pub async fn report_issue(State(s): State<Storefront>, p: Principal, Path(id): Path<Uuid>, Json(r): Json<IssueRequest>) -> Result<(StatusCode, Json<Order>), ApiError> {
    Ok((StatusCode::CREATED, Json(s.orders.report_issue(p.user_id, id, r.kind, &r.message).await?)))
}

pub async fn track_shipment(State(s): State<Storefront>, p: Principal, Path(awb): Path<String>) -> ApiResult<TrackingInfo> {
    Ok(Json(s.orders.track(p.user_id, &awb).await?))
}

#[derive(Debug, Deserialize)] pub struct ListParams { pub limit: Option<u32>, pub offset: Option<u32> }

pub async fn admin_list_orders(State(s): State<Storefront>, _admin: AdminUser, Query(q): Query<ListParams>) -> ApiResult<Vec<Order>> {
    Ok(Json(s.orders.list_recent(q.limit.unwrap_or(50), q.offset.unwrap_or(0)).await?))
}

#[derive(Debug, Deserialize)] pub struct StatusUpdate { pub status: OrderStatus, pub note: Option<String> }

pub async fn admin_update_status(State(s): State<Storefront>, _admin: AdminUser, Path(id): Path<Uuid>, Json(r): Json<StatusUpdate>) -> ApiResult<Order> {
    Ok(Json(s.orders.update_status(id, r.status, r.note).await?))
}

#[derive(Debug, Serialize)] pub struct RefreshResponse { pub products: usize }

pub async fn admin_refresh_catalog(State(s): State<Storefront>, _admin: AdminUser) -> ApiResult<RefreshResponse> {
    Ok(Json(RefreshResponse { products: s.catalog.refresh().await?.len() }))
}

pub async fn admin_pending_retries(State(s): State<Storefront>, _admin: AdminUser) -> ApiResult<Vec<RetryJob>> {
    Ok(Json(s.payments.finalizer().retries().snapshot().await))
}

