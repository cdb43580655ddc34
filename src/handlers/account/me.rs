use axum::extract::{Extension, State};

use crate::db::{AppState, queries};
use crate::error::Result;
use crate::extractors::{Json, Query};
use crate::middleware::UserContext;
use crate::models::{OrderWithEvent, User};
use crate::pagination::{PageQuery, Paginated};

const ORDERS_PAGE_SIZE: i64 = 3;

pub async fn get_me(Extension(ctx): Extension<UserContext>) -> Json<User> {
    Json(ctx.user)
}

/// The signed-in user's tickets, newest first.
pub async fn list_my_orders(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    Query(paging): Query<PageQuery>,
) -> Result<Json<Paginated<OrderWithEvent>>> {
    let limit = paging.limit(ORDERS_PAGE_SIZE);
    let conn = state.db.get()?;
    let (orders, total) = queries::list_orders_by_user(
        &conn,
        &ctx.user.id,
        limit,
        paging.offset(ORDERS_PAGE_SIZE),
    )?;
    Ok(Json(Paginated::new(orders, total, paging.page(), limit)))
}
