use axum::{extract::State, http::StatusCode};

use crate::db::{AppState, queries};
use crate::error::Result;
use crate::extractors::Json;
use crate::models::{Category, CreateCategory};

pub async fn create_category(
    State(state): State<AppState>,
    Json(input): Json<CreateCategory>,
) -> Result<(StatusCode, Json<Category>)> {
    let conn = state.db.get()?;
    let category = queries::create_category(&conn, &input.name)?;
    Ok((StatusCode::CREATED, Json(category)))
}
