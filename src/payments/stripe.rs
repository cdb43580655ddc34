use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha256;
use strum::EnumString;
use subtle::ConstantTimeEq;

use super::CheckoutSession;
use crate::error::{AppError, Result};

type HmacSha256 = Hmac<Sha256>;

const CHECKOUT_SESSIONS_URL: &str = "https://api.stripe.com/v1/checkout/sessions";

/// Maximum age of a signed webhook before it is treated as a replay.
const SIGNATURE_TOLERANCE_SECS: u64 = 300;

/// Everything needed to open a hosted checkout for one ticket.
#[derive(Debug, Clone)]
pub struct CheckoutRequest<'a> {
    pub event_id: &'a str,
    pub event_title: &'a str,
    pub buyer_id: &'a str,
    pub unit_amount_cents: u64,
    pub currency: &'a str,
    pub success_url: String,
    pub cancel_url: String,
}

impl CheckoutRequest<'_> {
    /// Form fields for `POST /v1/checkout/sessions`.
    pub fn form_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("mode", "payment".to_string()),
            ("success_url", self.success_url.clone()),
            ("cancel_url", self.cancel_url.clone()),
            ("line_items[0][quantity]", "1".to_string()),
            ("line_items[0][price_data][currency]", self.currency.to_string()),
            (
                "line_items[0][price_data][unit_amount]",
                self.unit_amount_cents.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]",
                self.event_title.to_string(),
            ),
            ("metadata[event_id]", self.event_id.to_string()),
            ("metadata[buyer_id]", self.buyer_id.to_string()),
        ]
    }
}

#[derive(Debug, Deserialize)]
struct CreateSessionResponse {
    id: String,
    url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: String,
    webhook_secret: String,
}

impl StripeClient {
    pub fn new(secret_key: &str, webhook_secret: &str) -> Self {
        Self {
            client: Client::new(),
            secret_key: secret_key.to_string(),
            webhook_secret: webhook_secret.to_string(),
        }
    }

    pub async fn create_checkout_session(
        &self,
        request: &CheckoutRequest<'_>,
    ) -> Result<CheckoutSession> {
        let response = self
            .client
            .post(CHECKOUT_SESSIONS_URL)
            .bearer_auth(&self.secret_key)
            .form(&request.form_params())
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Stripe API error: {}", e)))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Internal(format!("Stripe API error: {}", error_text)));
        }

        let session: CreateSessionResponse = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse Stripe response: {}", e)))?;

        let url = session
            .url
            .ok_or_else(|| AppError::Internal("Stripe session has no checkout URL".into()))?;

        Ok(CheckoutSession {
            id: session.id,
            url,
        })
    }

    pub fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> Result<bool> {
        verify_signature(
            &self.webhook_secret,
            payload,
            signature,
            Utc::now().timestamp(),
        )
    }
}

/// Check a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=<hex>...]`).
///
/// Malformed headers are errors; stale or mismatched signatures are `Ok(false)`.
pub fn verify_signature(secret: &str, payload: &[u8], header: &str, now: i64) -> Result<bool> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| AppError::BadRequest("Signature missing timestamp".into()))?;
    if signatures.is_empty() {
        return Err(AppError::BadRequest("Signature missing v1 entry".into()));
    }

    let signed_at: i64 = timestamp
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid signature timestamp".into()))?;
    if !within_tolerance(now, signed_at) {
        return Ok(false);
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::Internal("Invalid webhook secret".into()))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());

    Ok(signatures
        .iter()
        .any(|sig| bool::from(expected.as_bytes().ct_eq(sig.as_bytes()))))
}

/// The header timestamp is attacker-controlled, so the age is computed without overflow.
pub fn within_tolerance(now: i64, signed_at: i64) -> bool {
    now.checked_sub(signed_at)
        .map(i64::unsigned_abs)
        .is_some_and(|age| age <= SIGNATURE_TOLERANCE_SECS)
}

/// Webhook event types this service reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
pub enum StripeEventType {
    #[strum(serialize = "checkout.session.completed")]
    CheckoutSessionCompleted,
}

#[derive(Debug, Deserialize)]
pub struct StripeWebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: String,
    pub payment_status: String,
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    #[serde(default)]
    pub metadata: StripeMetadata,
}

#[derive(Debug, Default, Deserialize)]
pub struct StripeMetadata {
    pub event_id: Option<String>,
    pub buyer_id: Option<String>,
}
