use reqwest::Url;
use serde::{Deserialize, Serialize};

use super::{CategorySummary, UserSummary, double_option};
use crate::error::{AppError, Result};
use crate::payments::price_to_cents;

const MIN_TEXT_CHARS: usize = 3;
const MAX_TEXT_CHARS: usize = 400;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub image_url: String,
    pub start_date_time: i64,
    pub end_date_time: i64,
    /// Decimal string, e.g. "12.50". Ignored when `is_free`.
    pub price: String,
    pub is_free: bool,
    pub url: String,
    pub category_id: Option<String>,
    /// None once the organizer's account has been deleted
    pub organizer_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Event {
    pub fn has_ended(&self, now: i64) -> bool {
        self.end_date_time < now
    }

    /// Ticket price in minor units (0 for free events).
    pub fn price_cents(&self) -> Result<u64> {
        if self.is_free {
            Ok(0)
        } else {
            price_to_cents(&self.price)
        }
    }
}

/// An event with its organizer and category populated.
#[derive(Debug, Clone, Serialize)]
pub struct EventDetails {
    #[serde(flatten)]
    pub event: Event,
    pub organizer: Option<UserSummary>,
    pub category: Option<CategorySummary>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateEvent {
    pub title: String,
    pub description: String,
    pub location: String,
    #[serde(default)]
    pub image_url: String,
    pub start_date_time: i64,
    pub end_date_time: i64,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub is_free: bool,
    pub url: String,
}

impl CreateEvent {
    pub fn validate(&self) -> Result<()> {
        check_length("title", &self.title, MIN_TEXT_CHARS, None)?;
        check_length(
            "description",
            &self.description,
            MIN_TEXT_CHARS,
            Some(MAX_TEXT_CHARS),
        )?;
        check_length("location", &self.location, MIN_TEXT_CHARS, Some(MAX_TEXT_CHARS))?;

        if Url::parse(&self.url).is_err() {
            return Err(AppError::BadRequest("url must be an absolute URL".into()));
        }
        if !self.image_url.is_empty() && Url::parse(&self.image_url).is_err() {
            return Err(AppError::BadRequest(
                "image_url must be an absolute URL".into(),
            ));
        }
        if self.end_date_time < self.start_date_time {
            return Err(AppError::BadRequest(
                "end_date_time must not be before start_date_time".into(),
            ));
        }
        if !self.is_free {
            price_to_cents(&self.price)?;
        }
        Ok(())
    }
}

/// Partial update. `category_id: Some(None)` clears the category.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateEvent {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub image_url: Option<String>,
    pub start_date_time: Option<i64>,
    pub end_date_time: Option<i64>,
    #[serde(default, deserialize_with = "double_option")]
    pub category_id: Option<Option<String>>,
    pub price: Option<String>,
    pub is_free: Option<bool>,
    pub url: Option<String>,
}

impl UpdateEvent {
    /// Overlay this update on an existing event so the result can be validated as a whole.
    pub fn merge(&self, existing: &Event) -> CreateEvent {
        CreateEvent {
            title: self.title.clone().unwrap_or_else(|| existing.title.clone()),
            description: self
                .description
                .clone()
                .unwrap_or_else(|| existing.description.clone()),
            location: self
                .location
                .clone()
                .unwrap_or_else(|| existing.location.clone()),
            image_url: self
                .image_url
                .clone()
                .unwrap_or_else(|| existing.image_url.clone()),
            start_date_time: self.start_date_time.unwrap_or(existing.start_date_time),
            end_date_time: self.end_date_time.unwrap_or(existing.end_date_time),
            category_id: self
                .category_id
                .clone()
                .unwrap_or_else(|| existing.category_id.clone()),
            price: self.price.clone().unwrap_or_else(|| existing.price.clone()),
            is_free: self.is_free.unwrap_or(existing.is_free),
            url: self.url.clone().unwrap_or_else(|| existing.url.clone()),
        }
    }
}

fn check_length(field: &str, value: &str, min: usize, max: Option<usize>) -> Result<()> {
    let len = value.trim().chars().count();
    if len < min {
        return Err(AppError::BadRequest(format!(
            "{} must be at least {} characters",
            field, min
        )));
    }
    if let Some(max) = max {
        if len > max {
            return Err(AppError::BadRequest(format!(
                "{} must be at most {} characters",
                field, max
            )));
        }
    }
    Ok(())
}
