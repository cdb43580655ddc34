use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use rusqlite::Connection;

use crate::db::{AppState, queries};
use crate::error::AppError;
use crate::identity::{IdentityDeletedData, IdentityEvent, IdentityEventType, IdentityUserData};

pub async fn handle_identity_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let verifier = match &state.identity_webhook {
        Some(v) => v,
        None => {
            tracing::warn!("Identity webhook received but no signing secret is configured");
            return (StatusCode::OK, "Identity webhook not configured");
        }
    };

    match verifier.verify(&headers, &body) {
        Ok(true) => {}
        Ok(false) => return (StatusCode::UNAUTHORIZED, "Invalid signature"),
        Err(e) => {
            tracing::warn!("Rejected identity webhook: {}", e);
            return (StatusCode::BAD_REQUEST, "Missing signature headers");
        }
    }

    let event: IdentityEvent = match serde_json::from_slice(&body) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!("Failed to parse identity webhook: {}", e);
            return (StatusCode::BAD_REQUEST, "Invalid JSON");
        }
    };

    let kind = match event.event_type.parse::<IdentityEventType>() {
        Ok(kind) => kind,
        Err(_) => return (StatusCode::OK, "Event ignored"),
    };

    let conn = match state.db.get() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("DB connection error: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database error");
        }
    };

    match kind {
        IdentityEventType::UserCreated => handle_user_created(&conn, event.data),
        IdentityEventType::UserUpdated => handle_user_updated(&conn, event.data),
        IdentityEventType::UserDeleted => handle_user_deleted(&conn, event.data),
    }
}

fn parse_user(data: serde_json::Value) -> Result<IdentityUserData, (StatusCode, &'static str)> {
    serde_json::from_value(data).map_err(|e| {
        tracing::error!("Failed to parse identity user: {}", e);
        (StatusCode::BAD_REQUEST, "Invalid user data")
    })
}

fn handle_user_created(conn: &Connection, data: serde_json::Value) -> (StatusCode, &'static str) {
    let user = match parse_user(data) {
        Ok(u) => u,
        Err(resp) => return resp,
    };

    let input = match user.to_create_user() {
        Ok(i) => i,
        Err(e) => {
            tracing::warn!("Cannot mirror identity user {}: {}", user.id, e);
            return (StatusCode::BAD_REQUEST, "Invalid user data");
        }
    };

    match queries::create_user(conn, &input) {
        Ok(created) => {
            tracing::info!(
                "User created: {} (id={}, identity_id={})",
                created.display_name(),
                created.id,
                created.identity_id
            );
            (StatusCode::OK, "OK")
        }
        Err(AppError::Conflict(_)) => (StatusCode::OK, "User already exists"),
        Err(AppError::BadRequest(msg)) => {
            tracing::warn!("Rejected identity user {}: {}", user.id, msg);
            (StatusCode::BAD_REQUEST, "Invalid user data")
        }
        Err(e) => {
            tracing::error!("Failed to create user: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create user")
        }
    }
}

fn handle_user_updated(conn: &Connection, data: serde_json::Value) -> (StatusCode, &'static str) {
    let user = match parse_user(data) {
        Ok(u) => u,
        Err(resp) => return resp,
    };

    match queries::update_user(conn, &user.id, &user.to_update_user()) {
        Ok(updated) => {
            tracing::info!(
                "User updated: {} (id={}, identity_id={})",
                updated.display_name(),
                updated.id,
                updated.identity_id
            );
            (StatusCode::OK, "OK")
        }
        Err(AppError::NotFound(_)) => {
            tracing::warn!("Update for unknown identity user {}", user.id);
            (StatusCode::OK, "User not found")
        }
        Err(AppError::Conflict(_)) => (StatusCode::CONFLICT, "Email or username already taken"),
        Err(AppError::BadRequest(msg)) => {
            tracing::warn!("Rejected update for identity user {}: {}", user.id, msg);
            (StatusCode::BAD_REQUEST, "Invalid user data")
        }
        Err(e) => {
            tracing::error!("Failed to update user: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to update user")
        }
    }
}

fn handle_user_deleted(conn: &Connection, data: serde_json::Value) -> (StatusCode, &'static str) {
    let identity_id = match serde_json::from_value::<IdentityDeletedData>(data) {
        Ok(IdentityDeletedData { id: Some(id) }) => id,
        Ok(_) => return (StatusCode::OK, "No user ID"),
        Err(e) => {
            tracing::error!("Failed to parse deleted user: {}", e);
            return (StatusCode::BAD_REQUEST, "Invalid user data");
        }
    };

    match queries::delete_user(conn, &identity_id) {
        Ok(_) => (StatusCode::OK, "OK"),
        Err(AppError::NotFound(_)) => {
            tracing::warn!("Delete for unknown identity user {}", identity_id);
            (StatusCode::OK, "User not found")
        }
        Err(e) => {
            tracing::error!("Failed to delete user: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to delete user")
        }
    }
}
