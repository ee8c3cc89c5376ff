mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use common::fixture;
use storefront_checkout::http::{router, USER_HEADER};

async fn call(app: axum::Router, method: Method, uri: &str, user: Option<Uuid>, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        request = request.header(USER_HEADER, user.to_string());
    }
    let request = match body {
        Some(body) => request.header("content-type", "application/json").body(Body::from(body.to_string())).unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, body)
}

#[tokio::test]
async fn health_is_public() {
    let f = fixture();
    let (status, body) = call(router(f.storefront), Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn cart_requires_a_user() {
    let f = fixture();
    let (status, body) = call(router(f.storefront), Method::GET, "/api/v1/cart", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn empty_cart_renders_empty_and_blocks_checkout() {
    let f = fixture();
    let app = router(f.storefront);
    let (status, body) = call(app.clone(), Method::GET, "/api/v1/cart", Some(f.user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["availability"], "empty");
    assert_eq!(body["total_items"], 0);

    let (status, body) = call(app, Method::POST, "/api/v1/checkout", Some(f.user), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "empty_cart");
}

#[tokio::test]
async fn add_item_then_check_out() {
    let f = fixture();
    let app = router(f.storefront);
    let item = json!({ "product_id": f.tee.id(), "size": "m", "quantity": 2 });
    let (status, body) = call(app.clone(), Method::POST, "/api/v1/cart/items", Some(f.user), Some(item)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["availability"], "proceed_to_checkout");
    assert_eq!(body["total_items"], 2);

    let (status, _) = call(app.clone(), Method::POST, "/api/v1/checkout", Some(f.user), None).await;
    assert_eq!(status, StatusCode::CREATED);

    let choice = json!({ "kind": "new", "address": common::address() });
    let (status, body) = call(app.clone(), Method::POST, "/api/v1/checkout/address", Some(f.user), Some(choice)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session"]["stage"], "address_confirmed");

    let (status, body) = call(app.clone(), Method::POST, "/api/v1/checkout/coupon", Some(f.user), Some(json!({ "code": "OLD" }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["message"], "This coupon has expired");

    let submit = json!({ "payment_method": "razorpay" });
    let (status, body) = call(app.clone(), Method::POST, "/api/v1/checkout/submit", Some(f.user), Some(submit)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["session"]["gateway_order_id"], "order_rzp_1");
    assert_eq!(body["session"]["checkout"]["amount"], 100000);

    let order_id = body["order_id"].as_str().unwrap().to_string();
    let callback = json!({ "outcome": "failure", "reason": "Card declined" });
    let uri = format!("/api/v1/payments/{order_id}/callback");
    let (status, body) = call(app.clone(), Method::POST, &uri, Some(f.user), Some(callback)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "failed");

    let (status, body) = call(app, Method::GET, &format!("/api/v1/orders/{order_id}"), Some(f.user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payment_status"], "failed");
    assert_eq!(body["status"], "pending");
}

#[tokio::test]
async fn admin_routes_need_the_admin_role() {
    let f = fixture();
    let app = router(f.storefront);
    let (status, body) = call(app.clone(), Method::GET, "/api/v1/admin/orders", Some(f.user), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, body) = call(app, Method::GET, "/api/v1/admin/orders", Some(f.admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn other_users_orders_are_hidden() {
    let f = fixture();
    let (status, _) = call(router(f.storefront), Method::GET, &format!("/api/v1/orders/{}", Uuid::new_v4()), Some(f.user), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
