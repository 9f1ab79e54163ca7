mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use common::*;
use evstore::db::{CrmStatus, TransactionStatus};
use evstore::integrations::payment;
use serde_json::{Value, json};

fn booking(phone: &str, variant: &str, colour: &str) -> Value {
    json!({
        "name": "Meera Iyer",
        "email": "meera@example.com",
        "phone": phone,
        "city": "Bengaluru",
        "pincode": "560001",
        "variant": variant,
        "colour": colour,
    })
}

fn form_callback(order_id: &str, payment_id: &str, signature: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/payments/callback")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!(
            "razorpay_order_id={order_id}&razorpay_payment_id={payment_id}&razorpay_signature={signature}"
        )))
        .expect("failed to build request")
}

#[tokio::test]
async fn booking_returns_checkout_payload() {
    let t = spawn_app(|c| c.otp.enabled = false).await;
    let (status, body) = call_json(
        &t.app,
        json_request("POST", "/api/bookings", &booking("9876543210", "DX+", "Ocean-Blue")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    let order_ref = body["order_ref"].as_str().unwrap();
    assert!(order_ref.starts_with("EV") && order_ref.len() == 14);
    assert_eq!(body["gateway_order_id"], "order_test_1");
    assert_eq!(body["amount"], 99_900);
    assert_eq!(body["currency"], "INR");
    assert_eq!(body["key_id"], "rzp_test_key");

    let orders = t.gateway.orders.lock().unwrap().clone();
    assert_eq!(orders, vec![(99_900, "INR".to_string(), order_ref.to_string())]);

    let tx = t.storage.get_transaction_by_ref(order_ref).await.unwrap();
    assert_eq!(tx.colour, "ocean-blue");
    assert_eq!(tx.status, TransactionStatus::Created);
}

#[tokio::test]
async fn repeated_booking_reuses_the_pending_order() {
    let t = spawn_app(|c| c.otp.enabled = false).await;
    let req = booking("9876543210", "DX", "midnight-black");

    let (status, first) = call_json(&t.app, json_request("POST", "/api/bookings", &req)).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, second) = call_json(&t.app, json_request("POST", "/api/bookings", &req)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["order_ref"], second["order_ref"]);
    assert_eq!(t.gateway.orders.lock().unwrap().len(), 1);

    // a different colour is a different booking
    let other = booking("9876543210", "DX", "racing-red");
    let (status, third) = call_json(&t.app, json_request("POST", "/api/bookings", &other)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_ne!(first["order_ref"], third["order_ref"]);
}

#[tokio::test]
async fn colour_must_be_offered_for_the_variant() {
    let t = spawn_app(|c| c.otp.enabled = false).await;
    let (status, body) = call_json(
        &t.app,
        json_request("POST", "/api/bookings", &booking("9876543210", "DX", "ocean-blue")),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["details"]["field"], "colour");
    assert!(t.gateway.orders.lock().unwrap().is_empty());
}

#[tokio::test]
async fn booking_needs_verified_phone_when_otp_is_on() {
    let t = spawn_app(|_| {}).await;
    let (status, body) = call_json(
        &t.app,
        json_request("POST", "/api/bookings", &booking("9876543210", "DX", "glacier-white")),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "OTP_REQUIRED");
}

#[tokio::test]
async fn gateway_failure_marks_transaction_failed() {
    let t = spawn_app(|c| c.otp.enabled = false).await;
    *t.gateway.fail.lock().unwrap() = true;

    let (status, body) = call_json(
        &t.app,
        json_request("POST", "/api/bookings", &booking("9876543210", "DX", "glacier-white")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "BAD_GATEWAY");

    let (items, total) = t
        .storage
        .list_transactions(&Default::default())
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(items[0].status, TransactionStatus::Failed);
    assert!(items[0].failure_reason.is_some());
}

#[tokio::test]
async fn signed_callback_marks_paid_and_replays_are_idempotent() {
    let t = spawn_app(|c| c.otp.enabled = false).await;
    let (_, checkout) = call_json(
        &t.app,
        json_request("POST", "/api/bookings", &booking("9876543210", "DX+", "sunburst-yellow")),
    )
    .await;
    let order_id = checkout["gateway_order_id"].as_str().unwrap();
    let order_ref = checkout["order_ref"].as_str().unwrap();
    let signature = payment::sign(GATEWAY_SECRET, order_id, "pay_001");

    let (status, body) = call_json(&t.app, form_callback(order_id, "pay_001", &signature)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "paid");
    assert_eq!(body["order_ref"], order_ref);

    let tx = t.storage.get_transaction_by_ref(order_ref).await.unwrap();
    assert_eq!(tx.payment_id.as_deref(), Some("pay_001"));

    let storage = t.storage.clone();
    let id = tx.id;
    eventually(|| {
        let storage = storage.clone();
        async move { storage.get_transaction(id).await.unwrap().crm_status == CrmStatus::Synced }
    })
    .await;

    // replay with a bogus signature: already settled, nothing changes
    let (status, body) = call_json(&t.app, form_callback(order_id, "pay_002", "deadbeef")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "paid");
    let tx = t.storage.get_transaction_by_ref(order_ref).await.unwrap();
    assert_eq!(tx.payment_id.as_deref(), Some("pay_001"));
    assert_eq!(t.crm.submitted.lock().unwrap().len(), 1);

    let (status, body) = call_json(&t.app, get(&format!("/api/bookings/{order_ref}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "paid");
    assert_eq!(body["variant"], "DX+");
}

#[tokio::test]
async fn bad_signature_fails_the_booking() {
    let t = spawn_app(|c| c.otp.enabled = false).await;
    let (_, checkout) = call_json(
        &t.app,
        json_request("POST", "/api/bookings", &booking("9876543210", "DX", "racing-red")),
    )
    .await;
    let order_id = checkout["gateway_order_id"].as_str().unwrap();

    let (status, body) = call_json(
        &t.app,
        json_request(
            "POST",
            "/api/payments/callback",
            &json!({
                "gateway_order_id": order_id,
                "payment_id": "pay_001",
                "signature": payment::sign("wrong-secret", order_id, "pay_001"),
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "SIGNATURE_MISMATCH");

    let tx = t
        .storage
        .get_transaction_by_gateway_order(order_id)
        .await
        .unwrap();
    assert_eq!(tx.status, TransactionStatus::Failed);
    assert_eq!(tx.failure_reason.as_deref(), Some("signature mismatch"));
    assert!(t.crm.submitted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_order_lookups_are_not_found() {
    let t = spawn_app(|_| {}).await;
    let (status, body) = call_json(&t.app, get("/api/bookings/EV000000000000")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, _) = call_json(
        &t.app,
        json_request(
            "POST",
            "/api/payments/callback",
            &json!({ "gateway_order_id": "order_nope", "payment_id": "p", "signature": "s" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
