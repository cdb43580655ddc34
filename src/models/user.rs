use serde::{Deserialize, Serialize};

use super::double_option;
use crate::error::{AppError, Result};

/// A local mirror of an identity provider account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    /// The identity provider's user id (session token `sub`)
    pub identity_id: String,
    pub email: String,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub photo: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl User {
    /// "First Last", falling back to the username when both names are empty.
    pub fn display_name(&self) -> String {
        let full = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if full.is_empty() {
            self.username.clone()
        } else {
            full
        }
    }
}

/// The organizer fields embedded in event responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUser {
    pub identity_id: String,
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub photo: Option<String>,
}

impl CreateUser {
    pub fn validate(&self) -> Result<()> {
        if self.identity_id.trim().is_empty() {
            return Err(AppError::BadRequest("identity_id is required".into()));
        }
        validate_email(&self.email)?;
        validate_username(&self.username)
    }
}

/// Partial update. `Some(None)` on the profile fields clears them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUser {
    pub email: Option<String>,
    pub username: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub first_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub last_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub photo: Option<Option<String>>,
}

impl UpdateUser {
    pub fn validate(&self) -> Result<()> {
        if let Some(ref email) = self.email {
            validate_email(email)?;
        }
        if let Some(ref username) = self.username {
            validate_username(username)?;
        }
        Ok(())
    }
}

fn validate_email(email: &str) -> Result<()> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(AppError::BadRequest("Invalid email address".into())),
    }
}

fn validate_username(username: &str) -> Result<()> {
    if username.trim().is_empty() {
        return Err(AppError::BadRequest("username is required".into()));
    }
    Ok(())
}
