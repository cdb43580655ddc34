use axum::extract::State;
use serde::Deserialize;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path, Query};
use crate::models::EventDetails;
use crate::pagination::{PageQuery, Paginated};

const EVENTS_PAGE_SIZE: i64 = 6;
const RELATED_PAGE_SIZE: i64 = 3;

#[derive(Debug, Deserialize)]
pub struct ListEventsQuery {
    /// Title substring
    pub query: Option<String>,
    /// Category name
    pub category: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<ListEventsQuery>,
) -> Result<Json<Paginated<EventDetails>>> {
    let paging = PageQuery::new(query.page, query.limit);
    let limit = paging.limit(EVENTS_PAGE_SIZE);
    let filter = queries::EventFilter {
        query: query.query,
        category: query.category,
    };

    let conn = state.db.get()?;
    let (events, total) =
        queries::list_events(&conn, &filter, limit, paging.offset(EVENTS_PAGE_SIZE))?;

    Ok(Json(Paginated::new(events, total, paging.page(), limit)))
}

pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EventDetails>> {
    let conn = state.db.get()?;
    let event = queries::get_event_by_id(&conn, &id)?
        .ok_or_else(|| AppError::NotFound("Event not found".into()))?;
    Ok(Json(event))
}

/// Other events sharing this event's category. Uncategorized events have none.
pub async fn list_related_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(paging): Query<PageQuery>,
) -> Result<Json<Paginated<EventDetails>>> {
    let limit = paging.limit(RELATED_PAGE_SIZE);
    let conn = state.db.get()?;

    let event = queries::get_event(&conn, &id)?
        .ok_or_else(|| AppError::NotFound("Event not found".into()))?;

    let (events, total) = match event.category_id {
        Some(category_id) => queries::list_related_events(
            &conn,
            &category_id,
            &event.id,
            limit,
            paging.offset(RELATED_PAGE_SIZE),
        )?,
        None => (Vec::new(), 0),
    };

    Ok(Json(Paginated::new(events, total, paging.page(), limit)))
}

/// Events organized by a user.
pub async fn list_user_events(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(paging): Query<PageQuery>,
) -> Result<Json<Paginated<EventDetails>>> {
    let limit = paging.limit(EVENTS_PAGE_SIZE);
    let conn = state.db.get()?;

    if queries::get_user_by_id(&conn, &user_id)?.is_none() {
        return Err(AppError::NotFound("User not found".into()));
    }

    let (events, total) = queries::list_events_by_organizer(
        &conn,
        &user_id,
        limit,
        paging.offset(EVENTS_PAGE_SIZE),
    )?;

    Ok(Json(Paginated::new(events, total, paging.page(), limit)))
}
