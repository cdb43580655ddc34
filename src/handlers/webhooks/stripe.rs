use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};

use crate::db::{AppState, queries};
use crate::error::AppError;
use crate::models::CreateOrder;
use crate::payments::{StripeCheckoutSession, StripeEventType, StripeWebhookEvent};

pub async fn handle_stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let signature = match headers.get("stripe-signature") {
        Some(sig) => match sig.to_str() {
            Ok(s) => s.to_string(),
            Err(_) => return (StatusCode::BAD_REQUEST, "Invalid signature header"),
        },
        None => return (StatusCode::BAD_REQUEST, "Missing stripe-signature header"),
    };

    let client = match &state.stripe {
        Some(c) => c,
        None => {
            tracing::warn!("Stripe webhook received but Stripe is not configured");
            return (StatusCode::OK, "Stripe not configured");
        }
    };

    // Verify before trusting anything in the body
    match client.verify_webhook_signature(&body, &signature) {
        Ok(true) => {}
        Ok(false) => return (StatusCode::UNAUTHORIZED, "Invalid signature"),
        Err(e) => {
            tracing::warn!("Malformed Stripe signature header: {}", e);
            return (StatusCode::BAD_REQUEST, "Invalid signature header");
        }
    }

    let event: StripeWebhookEvent = match serde_json::from_slice(&body) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!("Failed to parse Stripe webhook: {}", e);
            return (StatusCode::BAD_REQUEST, "Invalid JSON");
        }
    };

    match event.event_type.parse::<StripeEventType>() {
        Ok(StripeEventType::CheckoutSessionCompleted) => {
            handle_checkout_completed(state, &event).await
        }
        Err(_) => (StatusCode::OK, "Event ignored"),
    }
}

/// Record the order for a completed checkout. Replays are acknowledged without a second order.
async fn handle_checkout_completed(
    state: AppState,
    event: &StripeWebhookEvent,
) -> (StatusCode, &'static str) {
    let session: StripeCheckoutSession = match serde_json::from_value(event.data.object.clone()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to parse checkout session: {}", e);
            return (StatusCode::BAD_REQUEST, "Invalid checkout session");
        }
    };

    if session.payment_status != "paid" {
        return (StatusCode::OK, "Payment not completed");
    }

    let event_id = match session.metadata.event_id.as_deref().filter(|id| !id.is_empty()) {
        Some(id) => id.to_string(),
        None => {
            tracing::warn!("Checkout session {} has no event_id metadata", session.id);
            return (StatusCode::OK, "No event ID");
        }
    };

    let conn = match state.db.get() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("DB connection error: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database error");
        }
    };

    let input = CreateOrder {
        stripe_id: session.id.clone(),
        event_id,
        buyer_id: session.metadata.buyer_id.clone().filter(|id| !id.is_empty()),
        total_amount_cents: session.amount_total.unwrap_or(0),
        currency: session
            .currency
            .clone()
            .unwrap_or_else(|| state.currency.clone()),
    };

    match queries::create_order(&conn, &input) {
        Ok((order, true)) => {
            tracing::info!(
                "Stripe checkout completed: session={}, order={}, event={}, buyer={:?}",
                session.id,
                order.id,
                order.event_id,
                order.buyer_id
            );
            (StatusCode::OK, "OK")
        }
        Ok((_, false)) => (StatusCode::OK, "Already processed"),
        Err(AppError::NotFound(_)) => {
            tracing::warn!(
                "Checkout session {} references unknown event {}",
                session.id,
                input.event_id
            );
            (StatusCode::OK, "Event not found")
        }
        Err(e) => {
            tracing::error!("Failed to create order: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create order")
        }
    }
}
