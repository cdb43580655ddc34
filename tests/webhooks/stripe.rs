use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::Utc;
use serde_json::json;
use tower::ServiceExt;

use crate::common::*;

fn webhook_request(payload: &str, signature: Option<String>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhook/stripe")
        .header("Content-Type", "application/json");
    if let Some(sig) = signature {
        builder = builder.header("stripe-signature", sig);
    }
    builder.body(Body::from(payload.to_string())).unwrap()
}

fn signed_request(payload: &str) -> Request<Body> {
    let sig = stripe_signature(STRIPE_WEBHOOK_SECRET, payload, Utc::now().timestamp());
    webhook_request(payload, Some(sig))
}

fn checkout_completed(session_id: &str, event_id: &str, buyer_id: &str, status: &str) -> String {
    json!({
        "id": "evt_1",
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": session_id,
                "payment_status": status,
                "amount_total": 1250,
                "currency": "usd",
                "metadata": { "event_id": event_id, "buyer_id": buyer_id }
            }
        }
    })
    .to_string()
}

/// Returns (event id, buyer id).
fn seed(state: &AppState) -> (String, String) {
    let conn = state.db.get().unwrap();
    let org = create_test_user(&conn, "org", "Grace", "Hopper");
    let buyer = create_test_user(&conn, "buyer", "Alan", "Turing");
    let event = create_test_event(&conn, &org.id, "Compilers Night", None);
    (event.id, buyer.id)
}

fn order_count(state: &AppState) -> i64 {
    let conn = state.db.get().unwrap();
    conn.query_row("SELECT COUNT(*) FROM orders", [], |r| r.get(0))
        .unwrap()
}

#[tokio::test]
async fn test_checkout_completed_creates_order_once() {
    let (state, _) = test_state();
    let (event_id, buyer_id) = seed(&state);
    let payload = checkout_completed("cs_test_1", &event_id, &buyer_id, "paid");

    let response = app(state.clone()).oneshot(signed_request(&payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "OK");

    {
        let conn = state.db.get().unwrap();
        let order = queries::get_order_by_stripe_id(&conn, "cs_test_1")
            .unwrap()
            .unwrap();
        assert_eq!(order.event_id, event_id);
        assert_eq!(order.buyer_id.as_deref(), Some(buyer_id.as_str()));
        assert_eq!(order.total_amount_cents, 1250);
        assert_eq!(order.currency, "usd");
    }

    // Provider retries deliver the same session again
    let response = app(state.clone()).oneshot(signed_request(&payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "Already processed");
    assert_eq!(order_count(&state), 1);
}

#[tokio::test]
async fn test_missing_signature_header() {
    let (state, _) = test_state();
    let response = app(state).oneshot(webhook_request("{}", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_bad_signature_rejected() {
    let (state, _) = test_state();
    let (event_id, buyer_id) = seed(&state);
    let payload = checkout_completed("cs_test_1", &event_id, &buyer_id, "paid");
    let sig = stripe_signature("whsec_wrong", &payload, Utc::now().timestamp());

    let response = app(state.clone())
        .oneshot(webhook_request(&payload, Some(sig)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(order_count(&state), 0);
}

#[tokio::test]
async fn test_stale_signature_rejected() {
    let (state, _) = test_state();
    let (event_id, buyer_id) = seed(&state);
    let payload = checkout_completed("cs_test_1", &event_id, &buyer_id, "paid");
    let sig = stripe_signature(STRIPE_WEBHOOK_SECRET, &payload, Utc::now().timestamp() - 600);

    let response = app(state)
        .oneshot(webhook_request(&payload, Some(sig)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_malformed_signature_header() {
    let (state, _) = test_state();
    let response = app(state)
        .oneshot(webhook_request("{}", Some("garbage".into())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_json_after_valid_signature() {
    let (state, _) = test_state();
    let response = app(state).oneshot(signed_request("not json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_other_event_types_ignored() {
    let (state, _) = test_state();
    let payload = json!({
        "id": "evt_2",
        "type": "invoice.paid",
        "data": { "object": {} }
    })
    .to_string();

    let response = app(state).oneshot(signed_request(&payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "Event ignored");
}

#[tokio::test]
async fn test_unpaid_session_not_recorded() {
    let (state, _) = test_state();
    let (event_id, buyer_id) = seed(&state);
    let payload = checkout_completed("cs_test_1", &event_id, &buyer_id, "unpaid");

    let response = app(state.clone()).oneshot(signed_request(&payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(order_count(&state), 0);
}

#[tokio::test]
async fn test_unknown_event_acknowledged() {
    let (state, _) = test_state();
    let (_, buyer_id) = seed(&state);
    let payload = checkout_completed("cs_test_1", "missing", &buyer_id, "paid");

    let response = app(state.clone()).oneshot(signed_request(&payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "Event not found");
    assert_eq!(order_count(&state), 0);
}

#[tokio::test]
async fn test_missing_buyer_metadata_still_recorded() {
    let (state, _) = test_state();
    let (event_id, _) = seed(&state);
    let payload = checkout_completed("cs_test_1", &event_id, "", "paid");

    let response = app(state.clone()).oneshot(signed_request(&payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let conn = state.db.get().unwrap();
    let order = queries::get_order_by_stripe_id(&conn, "cs_test_1")
        .unwrap()
        .unwrap();
    assert!(order.buyer_id.is_none());
}

#[tokio::test]
async fn test_extreme_signature_timestamp_rejected() {
    let (state, _) = test_state();
    let (event_id, buyer_id) = seed(&state);
    let payload = checkout_completed("cs_test_1", &event_id, &buyer_id, "paid");
    let sig = format!("t={},v1=00", i64::MIN);

    let response = app(state.clone())
        .oneshot(webhook_request(&payload, Some(sig)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(order_count(&state), 0);
}
