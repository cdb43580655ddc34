use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::error::{AppError, Result};

const MAX_NAME_CHARS: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub created_at: i64,
}

/// The category fields embedded in event responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySummary {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateCategory {
    pub name: String,
}

/// Trim and NFKC-normalize a category name, rejecting empty or overlong names.
pub fn normalize_category_name(name: &str) -> Result<String> {
    let normalized: String = name.trim().nfkc().collect();
    if normalized.is_empty() {
        return Err(AppError::BadRequest("Category name is required".into()));
    }
    if normalized.chars().count() > MAX_NAME_CHARS {
        return Err(AppError::BadRequest(format!(
            "Category name must be at most {} characters",
            MAX_NAME_CHARS
        )));
    }
    Ok(normalized)
}
