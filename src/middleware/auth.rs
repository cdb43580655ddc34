use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::db::{AppState, queries};
use crate::error::AppError;
use crate::models::User;
use crate::util::extract_bearer_token;

/// The signed-in user, inserted by `require_user`.
#[derive(Clone)]
pub struct UserContext {
    pub user: User,
}

/// Resolve the bearer session token to a local user.
pub async fn require_user(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let verifier = state.sessions.as_ref().ok_or(AppError::Unauthorized)?;

    let token = extract_bearer_token(request.headers()).ok_or(AppError::Unauthorized)?;
    let claims = verifier.verify(token)?;

    let user = {
        let conn = state.db.get()?;
        queries::get_user_by_identity_id(&conn, &claims.subject)?
    };
    let user = user.ok_or_else(|| {
        tracing::warn!("Valid session for unknown user {}", claims.subject);
        AppError::Unauthorized
    })?;

    request.extensions_mut().insert(UserContext { user });

    Ok(next.run(request).await)
}
