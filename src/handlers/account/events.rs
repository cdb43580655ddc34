use axum::{
    extract::{Extension, State},
    http::StatusCode,
};
use serde::Deserialize;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path, Query};
use crate::middleware::UserContext;
use crate::models::{CreateEvent, Event, EventDetails, OrderItem, UpdateEvent};

pub async fn create_event(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    Json(input): Json<CreateEvent>,
) -> Result<(StatusCode, Json<Event>)> {
    let conn = state.db.get()?;
    let event = queries::create_event(&conn, &ctx.user.id, &input)?;

    tracing::info!("User {} created event {}", ctx.user.id, event.id);

    Ok((StatusCode::CREATED, Json(event)))
}

pub async fn update_event(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    Path(id): Path<String>,
    Json(input): Json<UpdateEvent>,
) -> Result<Json<EventDetails>> {
    let conn = state.db.get()?;
    let event = queries::update_event(&conn, &ctx.user.id, &id, &input)?;
    Ok(Json(event))
}

pub async fn delete_event(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let conn = state.db.get()?;
    let event = queries::delete_event(&conn, &ctx.user.id, &id)?;

    tracing::info!("User {} deleted event {}", ctx.user.id, event.id);

    Ok(Json(serde_json::json!({ "deleted": true, "id": event.id })))
}

#[derive(Debug, Deserialize)]
pub struct OrderSearchQuery {
    /// Buyer name substring
    pub search: Option<String>,
}

/// Orders for an event, visible to its organizer only.
pub async fn list_event_orders(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    Path(id): Path<String>,
    Query(query): Query<OrderSearchQuery>,
) -> Result<Json<Vec<OrderItem>>> {
    let conn = state.db.get()?;

    let event = queries::get_event(&conn, &id)?
        .ok_or_else(|| AppError::NotFound("Event not found".into()))?;
    if event.organizer_id.as_deref() != Some(ctx.user.id.as_str()) {
        return Err(AppError::Forbidden("Only the organizer can view orders".into()));
    }

    let orders = queries::list_orders_by_event(&conn, &id, query.search.as_deref())?;
    Ok(Json(orders))
}
