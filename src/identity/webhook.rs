use axum::http::HeaderMap;
use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use strum::EnumString;
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result};
use crate::models::{CreateUser, UpdateUser};
use crate::payments::within_tolerance;

type HmacSha256 = Hmac<Sha256>;

/// Verifies svix-signed webhook deliveries from the identity provider.
#[derive(Clone)]
pub struct IdentityWebhookVerifier {
    key: Vec<u8>,
}

impl IdentityWebhookVerifier {
    /// `secret` is the `whsec_<base64>` signing secret.
    pub fn new(secret: &str) -> Result<Self> {
        let encoded = secret.strip_prefix("whsec_").unwrap_or(secret);
        let key = STANDARD
            .decode(encoded)
            .map_err(|_| AppError::Internal("Invalid identity webhook secret".into()))?;
        Ok(Self { key })
    }

    pub fn verify(&self, headers: &HeaderMap, payload: &[u8]) -> Result<bool> {
        self.verify_at(headers, payload, Utc::now().timestamp())
    }

    /// Missing headers are errors; stale or mismatched signatures are `Ok(false)`.
    pub fn verify_at(&self, headers: &HeaderMap, payload: &[u8], now: i64) -> Result<bool> {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| AppError::BadRequest(format!("Missing {} header", name)))
        };
        let msg_id = header("svix-id")?;
        let timestamp = header("svix-timestamp")?;
        let signatures = header("svix-signature")?;

        let sent_at: i64 = timestamp
            .parse()
            .map_err(|_| AppError::BadRequest("Invalid svix-timestamp header".into()))?;
        if !within_tolerance(now, sent_at) {
            return Ok(false);
        }

        let expected = STANDARD.encode(self.sign(msg_id, timestamp, payload)?);

        Ok(signatures
            .split_whitespace()
            .filter_map(|entry| entry.strip_prefix("v1,"))
            .any(|sig| bool::from(expected.as_bytes().ct_eq(sig.as_bytes()))))
    }

    fn sign(&self, msg_id: &str, timestamp: &str, payload: &[u8]) -> Result<Vec<u8>> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|_| AppError::Internal("Invalid identity webhook secret".into()))?;
        mac.update(msg_id.as_bytes());
        mac.update(b".");
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
pub enum IdentityEventType {
    #[strum(serialize = "user.created")]
    UserCreated,
    #[strum(serialize = "user.updated")]
    UserUpdated,
    #[strum(serialize = "user.deleted")]
    UserDeleted,
}

#[derive(Debug, Deserialize)]
pub struct IdentityEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct IdentityEmailAddress {
    pub email_address: String,
}

/// The provider's user object, as sent with `user.created` and `user.updated`.
#[derive(Debug, Deserialize)]
pub struct IdentityUserData {
    pub id: String,
    #[serde(default)]
    pub email_addresses: Vec<IdentityEmailAddress>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub image_url: Option<String>,
}

impl IdentityUserData {
    pub fn primary_email(&self) -> Option<&str> {
        self.email_addresses
            .first()
            .map(|e| e.email_address.as_str())
    }

    /// Users without a username get their provider id as one.
    pub fn to_create_user(&self) -> Result<CreateUser> {
        let email = self
            .primary_email()
            .ok_or_else(|| AppError::BadRequest("User has no email address".into()))?;
        Ok(CreateUser {
            identity_id: self.id.clone(),
            email: email.to_string(),
            username: self.username.clone().unwrap_or_else(|| self.id.clone()),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            photo: self.image_url.clone(),
        })
    }

    /// The provider sends the whole profile, so a null name or image clears the local copy.
    pub fn to_update_user(&self) -> UpdateUser {
        UpdateUser {
            email: self.primary_email().map(String::from),
            username: self.username.clone(),
            first_name: Some(self.first_name.clone()),
            last_name: Some(self.last_name.clone()),
            photo: Some(self.image_url.clone()),
        }
    }
}

/// `user.deleted` carries only the id (and may omit it).
#[derive(Debug, Deserialize)]
pub struct IdentityDeletedData {
    pub id: Option<String>,
}
