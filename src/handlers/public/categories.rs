use axum::extract::State;

use crate::db::{AppState, queries};
use crate::error::Result;
use crate::extractors::Json;
use crate::models::Category;

pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>> {
    let conn = state.db.get()?;
    let categories = queries::list_categories(&conn)?;
    Ok(Json(categories))
}
