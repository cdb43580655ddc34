use serde::{Deserialize, Serialize};

use super::EventDetails;

/// A ticket purchase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    /// Checkout session id (`free_<uuid>` for free tickets); unique per order
    pub stripe_id: String,
    pub event_id: String,
    /// None once the buyer's account has been deleted
    pub buyer_id: Option<String>,
    pub total_amount_cents: i64,
    pub currency: String,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub stripe_id: String,
    pub event_id: String,
    pub buyer_id: Option<String>,
    pub total_amount_cents: i64,
    pub currency: String,
}

/// Row in an organizer's per-event order list.
#[derive(Debug, Clone, Serialize)]
pub struct OrderItem {
    pub id: String,
    pub total_amount_cents: i64,
    pub currency: String,
    pub created_at: i64,
    pub event_id: String,
    pub event_title: String,
    /// Buyer's "first last" name
    pub buyer: String,
}

/// A buyer's order with the event it is for.
#[derive(Debug, Clone, Serialize)]
pub struct OrderWithEvent {
    #[serde(flatten)]
    pub order: Order,
    pub event: EventDetails,
}
