pub mod account;
pub mod dev;
pub mod public;
pub mod webhooks;

use axum::Router;

use crate::db::AppState;

/// Routes that accept anonymous callers: public reads, provider webhooks and,
/// in dev mode, the dev helpers.
pub fn open_routes(state: &AppState) -> Router<AppState> {
    let mut router = public::router().merge(webhooks::router());
    if state.dev_mode {
        router = router.merge(dev::router());
    }
    router
}

/// Routes behind `require_user`.
pub fn account_routes(state: AppState) -> Router<AppState> {
    account::router(state)
}

/// The full application without transport layers (tracing, CORS, rate limiting).
pub fn app(state: AppState) -> Router {
    open_routes(&state)
        .merge(account_routes(state.clone()))
        .with_state(state)
}
