use axum::{Router, extract::State, http::StatusCode, routing::post};

use crate::db::{AppState, queries};
use crate::error::Result;
use crate::extractors::Json;
use crate::models::{CreateUser, User};

/// Create a local user without going through the identity provider.
pub async fn create_dev_user(
    State(state): State<AppState>,
    Json(input): Json<CreateUser>,
) -> Result<(StatusCode, Json<User>)> {
    let conn = state.db.get()?;
    let user = queries::create_user(&conn, &input)?;

    tracing::info!(
        "DEV: Created user {} (identity_id={})",
        user.id,
        user.identity_id
    );

    Ok((StatusCode::CREATED, Json(user)))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/dev/users", post(create_dev_user))
}
