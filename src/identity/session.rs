use std::collections::HashSet;

use jwt_simple::prelude::{NoCustomClaims, RS256PublicKey, RSAPublicKeyLike, VerificationOptions};

use crate::error::{AppError, Result};

/// Claims this service relies on from a verified session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    /// Identity provider user id (`users.identity_id`)
    pub subject: String,
}

/// Verifies session tokens against the provider's public key.
pub struct SessionVerifier {
    key: RS256PublicKey,
    issuer: Option<String>,
}

impl SessionVerifier {
    pub fn from_pem(pem: &str, issuer: Option<String>) -> Result<Self> {
        let key = RS256PublicKey::from_pem(pem)
            .map_err(|e| AppError::Internal(format!("Invalid identity public key: {}", e)))?;
        Ok(Self { key, issuer })
    }

    pub fn verify(&self, token: &str) -> Result<SessionClaims> {
        let options = VerificationOptions {
            allowed_issuers: self
                .issuer
                .as_ref()
                .map(|issuer| HashSet::from([issuer.clone()])),
            ..Default::default()
        };

        let claims = self
            .key
            .verify_token::<NoCustomClaims>(token, Some(options))
            .map_err(|e| {
                tracing::debug!("Session token rejected: {}", e);
                AppError::Unauthorized
            })?;

        let subject = claims.subject.ok_or(AppError::Unauthorized)?;
        Ok(SessionClaims { subject })
    }
}
