mod identity;
mod stripe;

pub use identity::*;
pub use stripe::*;

use axum::{Router, routing::post};

use crate::db::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/webhook/stripe", post(handle_stripe_webhook))
        .route("/webhook/identity", post(handle_identity_webhook))
}
