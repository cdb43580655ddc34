mod categories;
mod checkout;
mod events;
mod me;

pub use categories::*;
pub use checkout::*;
pub use events::*;
pub use me::*;

use axum::{
    Router, middleware,
    routing::{get, post, put},
};

use crate::db::AppState;
use crate::middleware::require_user;

/// Routes that act on behalf of the signed-in user.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/events", post(create_event))
        .route("/events/{id}", put(update_event).delete(delete_event))
        .route("/events/{id}/orders", get(list_event_orders))
        .route("/categories", post(create_category))
        .route("/checkout", post(checkout))
        .route("/me", get(get_me))
        .route("/me/orders", get(list_my_orders))
        .layer(middleware::from_fn_with_state(state, require_user))
}
