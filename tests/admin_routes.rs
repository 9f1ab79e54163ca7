mod common;

use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use chrono::{Days, Utc};
use common::*;
use evstore::db::{CrmStatus, LeadKind};
use serde_json::json;

async fn seed_contacts(t: &TestApp, phones: &[&str]) {
    for (i, phone) in phones.iter().enumerate() {
        let (status, body) = call_json(
            &t.app,
            json_request(
                "POST",
                "/api/contact",
                &json!({
                    "name": format!("Customer {i}"),
                    "email": format!("customer{i}@example.com"),
                    "phone": phone,
                    "message": "hello",
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
    }
}

async fn seed_booking(t: &TestApp, phone: &str) -> i64 {
    let (status, body) = call_json(
        &t.app,
        json_request(
            "POST",
            "/api/bookings",
            &json!({
                "name": "Meera Iyer",
                "email": "meera@example.com",
                "phone": phone,
                "city": "Bengaluru",
                "pincode": "560001",
                "variant": "DX+",
                "colour": "ocean-blue",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let order_ref = body["order_ref"].as_str().unwrap();
    t.storage.get_transaction_by_ref(order_ref).await.unwrap().id
}

async fn backdate(t: &TestApp, table: &str, phone: &str, days: u64) {
    let at = Utc::now().checked_sub_days(Days::new(days)).unwrap();
    sqlx::query(&format!("UPDATE {table} SET created_at = ? WHERE phone = ?"))
        .bind(at)
        .bind(phone)
        .execute(t.storage.pool())
        .await
        .unwrap();
}

async fn body_text(resp: axum::response::Response) -> String {
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

#[tokio::test]
async fn admin_api_requires_credentials() {
    let t = spawn_app(|_| {}).await;

    let (status, body) = call_json(&t.app, get("/admin/api/dashboard")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let wrong = Request::builder()
        .uri("/admin/api/dashboard")
        .header(header::AUTHORIZATION, "Bearer nope")
        .body(Body::empty())
        .unwrap();
    let (status, _) = call_json(&t.app, wrong).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call_json(&t.app, admin_get("/admin/api/dashboard")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["contacts"]["total"], 0);
}

#[tokio::test]
async fn login_cookie_opens_a_session() {
    let t = spawn_app(|_| {}).await;

    let (status, _) = call_json(
        &t.app,
        json_request("POST", "/admin/login", &json!({ "key": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let resp = call(
        &t.app,
        json_request("POST", "/admin/login", &json!({ "key": ADMIN_KEY })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let set_cookie = resp
        .headers()
        .get(header::SET_COOKIE)
        .expect("session cookie")
        .to_str()
        .unwrap()
        .to_string();
    assert!(set_cookie.starts_with("admin_session="));
    assert!(set_cookie.contains("HttpOnly"));
    let pair = set_cookie.split(';').next().unwrap().to_string();

    let with_cookie = Request::builder()
        .uri("/admin/api/dealerships")
        .header(header::COOKIE, &pair)
        .body(Body::empty())
        .unwrap();
    let (status, body) = call_json(&t.app, with_cookie).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    // a cookie that was not encrypted with the server key is ignored
    let forged = Request::builder()
        .uri("/admin/api/dealerships")
        .header(header::COOKIE, "admin_session=99999999999")
        .body(Body::empty())
        .unwrap();
    let (status, _) = call_json(&t.app, forged).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_clears_the_session_cookie() {
    let t = spawn_app(|_| {}).await;
    let resp = call(
        &t.app,
        json_request("POST", "/admin/login", &json!({ "key": ADMIN_KEY })),
    )
    .await;
    let pair = resp.headers()[header::SET_COOKIE]
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();

    let logout = Request::builder()
        .method("POST")
        .uri("/admin/logout")
        .header(header::COOKIE, &pair)
        .body(Body::empty())
        .unwrap();
    let resp = call(&t.app, logout).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let cleared = resp.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
    assert!(cleared.starts_with("admin_session=;"), "{cleared}");
    assert!(cleared.contains("Max-Age=0"), "{cleared}");
    assert!(cleared.contains("Path=/admin"), "{cleared}");

    // the browser now sends the cleared value
    let after = Request::builder()
        .uri("/admin/api/dashboard")
        .header(header::COOKIE, "admin_session=")
        .body(Body::empty())
        .unwrap();
    let (status, body) = call_json(&t.app, after).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn contact_listing_paginates_and_searches() {
    let t = spawn_app(|c| c.otp.enabled = false).await;
    seed_contacts(&t, &["9000000001", "9000000002", "9000000003"]).await;

    let (status, body) = call_json(
        &t.app,
        admin_get("/admin/api/contacts?page=1&per_page=2"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["per_page"], 2);
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    // newest first
    assert_eq!(items[0]["phone"], "9000000003");

    let (_, body) = call_json(&t.app, admin_get("/admin/api/contacts?q=9000000002")).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["email"], "customer1@example.com");
}

#[tokio::test]
async fn contact_export_is_a_csv_attachment() {
    let t = spawn_app(|c| c.otp.enabled = false).await;
    seed_contacts(&t, &["9000000001", "9000000002"]).await;

    let resp = call(&t.app, admin_get("/admin/api/contacts/export")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let headers = resp.headers().clone();
    assert!(
        headers[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/csv")
    );
    assert!(
        headers[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .starts_with("attachment; filename=\"contacts-")
    );

    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some("id,name,email,phone,city,message,source,crm_status,crm_attempts,created_at")
    );
    assert_eq!(lines.count(), 2);
}

#[tokio::test]
async fn dealership_crud_with_soft_delete() {
    let t = spawn_app(|_| {}).await;
    let (status, created) = call_json(
        &t.app,
        admin_json(
            "POST",
            "/admin/api/dealerships",
            &json!({
                "name": "EV Indore",
                "city": "Indore",
                "state": "Madhya Pradesh",
                "address": "12 AB Road",
                "latitude": 22.72,
                "longitude": 75.86,
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    assert_eq!(created["active"], true);
    let id = created["id"].as_i64().unwrap();

    let (status, updated) = call_json(
        &t.app,
        admin_json(
            "PUT",
            &format!("/admin/api/dealerships/{id}"),
            &json!({
                "name": "EV Indore Central",
                "city": "Indore",
                "state": "Madhya Pradesh",
                "address": "14 AB Road",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "EV Indore Central");

    let (status, body) = call_json(
        &t.app,
        admin_json("POST", "/admin/api/dealerships", &json!({
            "name": " ", "city": "Indore", "state": "MP", "address": "x"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["details"]["field"], "name");

    let delete = Request::builder()
        .method("DELETE")
        .uri(format!("/admin/api/dealerships/{id}"))
        .header(header::AUTHORIZATION, format!("Bearer {ADMIN_KEY}"))
        .body(Body::empty())
        .unwrap();
    assert_eq!(call(&t.app, delete).await.status(), StatusCode::NO_CONTENT);

    let (_, public) = call_json(&t.app, get("/api/dealerships")).await;
    assert_eq!(public, json!([]));
    let (_, all) = call_json(&t.app, admin_get("/admin/api/dealerships")).await;
    assert_eq!(all[0]["active"], false);

    let missing = Request::builder()
        .method("DELETE")
        .uri("/admin/api/dealerships/9999")
        .header(header::AUTHORIZATION, format!("Bearer {ADMIN_KEY}"))
        .body(Body::empty())
        .unwrap();
    assert_eq!(call(&t.app, missing).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn resync_requeues_failed_leads() {
    let t = spawn_app(|c| c.otp.enabled = false).await;
    *t.crm.fail.lock().unwrap() = true;
    seed_contacts(&t, &["9000000001"]).await;

    let storage = t.storage.clone();
    eventually(|| {
        let storage = storage.clone();
        async move { storage.list_failed_crm().await.unwrap().len() == 1 }
    })
    .await;
    let (_, stats) = call_json(&t.app, admin_get("/admin/api/dashboard")).await;
    assert_eq!(stats["crm_failed"], 1);
    let (kind, id) = t.storage.list_failed_crm().await.unwrap()[0];
    assert_eq!(kind, LeadKind::Contact);

    *t.crm.fail.lock().unwrap() = false;
    let (status, body) = call_json(
        &t.app,
        admin_json("POST", "/admin/api/leads/resync", &json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["requeued"], 1);

    let storage = t.storage.clone();
    eventually(|| {
        let storage = storage.clone();
        async move {
            let c = storage.get_contact(id).await.unwrap();
            c.crm_status == CrmStatus::Synced && c.crm_attempts == 2
        }
    })
    .await;
}

#[tokio::test]
async fn date_filters_cover_whole_days_inclusive() {
    let t = spawn_app(|c| c.otp.enabled = false).await;
    seed_contacts(&t, &["9000000001", "9000000002"]).await;
    backdate(&t, "contacts", "9000000001", 3).await;

    let today = Utc::now().date_naive();
    let yesterday = today.checked_sub_days(Days::new(1)).unwrap();

    let (status, body) =
        call_json(&t.app, admin_get(&format!("/admin/api/contacts?to={yesterday}"))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["phone"], "9000000001");

    let (_, body) = call_json(
        &t.app,
        admin_get(&format!("/admin/api/contacts?from={today}&to={today}")),
    )
    .await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["phone"], "9000000002");

    let (_, body) = call_json(
        &t.app,
        admin_get(&format!("/admin/api/contacts?from={yesterday}")),
    )
    .await;
    assert_eq!(body["total"], 1);

    // transaction status does not apply to contacts
    let (status, body) = call_json(&t.app, admin_get("/admin/api/contacts?status=paid")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);

    let resp = call(
        &t.app,
        admin_get(&format!("/admin/api/contacts/export?to={yesterday}")),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let text = body_text(resp).await;
    assert_eq!(text.lines().count(), 2);
    assert!(text.contains("9000000001"));
}

#[tokio::test]
async fn untouched_filter_fields_are_ignored() {
    let t = spawn_app(|c| c.otp.enabled = false).await;
    seed_contacts(&t, &["9000000001", "9000000002"]).await;

    let (status, body) = call_json(
        &t.app,
        admin_get("/admin/api/transactions?from=&to=&q=&status=&page=&per_page="),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["page"], 1);
    assert_eq!(body["per_page"], 25);

    let (status, body) =
        call_json(&t.app, admin_get("/admin/api/contacts?from=&to=&q=")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
}

#[tokio::test]
async fn malformed_query_and_path_use_the_error_envelope() {
    let t = spawn_app(|_| {}).await;

    let (status, body) =
        call_json(&t.app, admin_get("/admin/api/contacts?from=31-01-2026")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let (status, body) =
        call_json(&t.app, admin_get("/admin/api/transactions?status=refunded")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let (status, body) = call_json(
        &t.app,
        admin_json(
            "PUT",
            "/admin/api/dealerships/not-a-number",
            &json!({ "name": "x", "city": "y", "state": "z", "address": "w" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn transactions_filter_by_status() {
    let t = spawn_app(|c| c.otp.enabled = false).await;
    let paid = seed_booking(&t, "9000000011").await;
    seed_booking(&t, "9000000012").await;
    assert!(t.storage.mark_paid(paid, "pay_test_1").await.unwrap());

    let (status, body) =
        call_json(&t.app, admin_get("/admin/api/transactions?status=paid")).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["status"], "paid");
    assert_eq!(body["items"][0]["payment_id"], "pay_test_1");

    let (_, body) = call_json(&t.app, admin_get("/admin/api/transactions?status=created")).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["phone"], "9000000012");

    let (_, body) = call_json(&t.app, admin_get("/admin/api/transactions")).await;
    assert_eq!(body["total"], 2);
    let order_ref = body["items"][1]["order_ref"].as_str().unwrap().to_string();
    let (status, detail) = call_json(
        &t.app,
        admin_get(&format!("/admin/api/transactions/{order_ref}")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["status"], "paid");

    let resp = call(&t.app, admin_get("/admin/api/transactions/export?status=paid")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(
        resp.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .starts_with("attachment; filename=\"transactions-")
    );
    let text = body_text(resp).await;
    let mut lines = text.lines();
    assert!(lines.next().unwrap().starts_with("id,order_ref,gateway_order_id,payment_id"));
    let row = lines.next().unwrap();
    assert!(row.contains("pay_test_1") && row.contains(",paid,"), "{row}");
    assert_eq!(lines.next(), None);
}

#[tokio::test]
async fn test_rides_list_and_export() {
    let t = spawn_app(|c| c.otp.enabled = false).await;
    let date = Utc::now().date_naive().checked_add_days(Days::new(3)).unwrap();
    for phone in ["9000000021", "9000000022"] {
        let (status, body) = call_json(
            &t.app,
            json_request(
                "POST",
                "/api/test-rides",
                &json!({
                    "name": "Ravi Kumar",
                    "email": "ravi@example.com",
                    "phone": phone,
                    "city": "Pune",
                    "preferred_date": date,
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
    }
    backdate(&t, "test_drives", "9000000021", 2).await;

    let today = Utc::now().date_naive();
    let (status, body) = call_json(
        &t.app,
        admin_get(&format!("/admin/api/test-rides?from={today}&status=failed")),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["phone"], "9000000022");

    let resp = call(&t.app, admin_get("/admin/api/test-rides/export")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(
        resp.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .starts_with("attachment; filename=\"test-rides-")
    );
    let text = body_text(resp).await;
    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some("id,name,email,phone,city,dealership_id,variant,preferred_date,preferred_slot,crm_status,crm_attempts,created_at")
    );
    assert_eq!(lines.count(), 2);
}
