use axum::extract::{Extension, State};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::middleware::UserContext;
use crate::models::{CreateOrder, Order};
use crate::payments::CheckoutRequest;
use crate::util::public_url;

#[derive(Debug, Deserialize)]
pub struct CheckoutInput {
    pub event_id: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum CheckoutResponse {
    /// Paid ticket: send the browser to the hosted checkout page
    Redirect {
        checkout_url: String,
        session_id: String,
    },
    /// Free ticket: recorded immediately
    Registered { order: Order },
}

pub async fn checkout(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    Json(input): Json<CheckoutInput>,
) -> Result<Json<CheckoutResponse>> {
    let event = {
        let conn = state.db.get()?;
        queries::get_event(&conn, &input.event_id)?
    }
    .ok_or_else(|| AppError::NotFound("Event not found".into()))?;

    if event.has_ended(Utc::now().timestamp()) {
        return Err(AppError::BadRequest("Event has already ended".into()));
    }

    if event.is_free {
        let conn = state.db.get()?;
        if queries::has_order_for_event(&conn, &ctx.user.id, &event.id)? {
            return Err(AppError::Conflict("Already registered for this event".into()));
        }

        let (order, _) = queries::create_order(
            &conn,
            &CreateOrder {
                stripe_id: format!("free_{}", Uuid::new_v4()),
                event_id: event.id.clone(),
                buyer_id: Some(ctx.user.id.clone()),
                total_amount_cents: 0,
                currency: state.currency.clone(),
            },
        )?;

        tracing::info!(
            "Free registration: event={}, buyer={}, order={}",
            event.id,
            ctx.user.id,
            order.id
        );

        return Ok(Json(CheckoutResponse::Registered { order }));
    }

    let stripe = state
        .stripe
        .as_ref()
        .ok_or_else(|| AppError::BadRequest("Payments are not configured".into()))?;

    let request = CheckoutRequest {
        event_id: &event.id,
        event_title: &event.title,
        buyer_id: &ctx.user.id,
        unit_amount_cents: event.price_cents()?,
        currency: &state.currency,
        success_url: public_url(&state.base_url, "/profile"),
        cancel_url: public_url(&state.base_url, "/"),
    };
    let session = stripe.create_checkout_session(&request).await?;

    tracing::info!(
        "Checkout session created: event={}, buyer={}, session={}",
        event.id,
        ctx.user.id,
        session.id
    );

    Ok(Json(CheckoutResponse::Redirect {
        checkout_url: session.url,
        session_id: session.id,
    }))
}
