//! Row mapping for the entity tables.
//!
//! Each `*_COLS` constant lists columns in the order the matching `FromRow`
//! impl reads them. Joined shapes read their nested parts at an offset.

use rusqlite::{Connection, OptionalExtension, Params, Row};

use crate::error::Result;
use crate::models::*;

pub const USER_COLS: &str =
    "id, identity_id, email, username, first_name, last_name, photo, created_at, updated_at";

pub const CATEGORY_COLS: &str = "id, name, created_at";

pub const EVENT_COLS: &str = "id, title, description, location, image_url, start_date_time, end_date_time, price, is_free, url, category_id, organizer_id, created_at, updated_at";

const EVENT_COL_COUNT: usize = 14;

/// Event columns plus the populated organizer and category, read from `EVENT_DETAILS_FROM`.
pub const EVENT_DETAILS_COLS: &str = "e.id, e.title, e.description, e.location, e.image_url, e.start_date_time, e.end_date_time, e.price, e.is_free, e.url, e.category_id, e.organizer_id, e.created_at, e.updated_at, u.id, u.first_name, u.last_name, c.id, c.name";

pub const EVENT_DETAILS_FROM: &str = "events e
     LEFT JOIN users u ON u.id = e.organizer_id
     LEFT JOIN categories c ON c.id = e.category_id";

pub const ORDER_COLS: &str =
    "o.id, o.stripe_id, o.event_id, o.buyer_id, o.total_amount_cents, o.currency, o.created_at";

const ORDER_COL_COUNT: usize = 7;

pub const ORDER_ITEM_COLS: &str = "o.id, o.total_amount_cents, o.currency, o.created_at, e.id, e.title, TRIM(COALESCE(b.first_name, '') || ' ' || COALESCE(b.last_name, ''))";

pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

pub fn query_one<T: FromRow, P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Option<T>> {
    let mut stmt = conn.prepare(sql)?;
    let item = stmt.query_row(params, T::from_row).optional()?;
    Ok(item)
}

pub fn query_all<T: FromRow, P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let items = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(items)
}

impl FromRow for User {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get(0)?,
            identity_id: row.get(1)?,
            email: row.get(2)?,
            username: row.get(3)?,
            first_name: row.get(4)?,
            last_name: row.get(5)?,
            photo: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

impl FromRow for Category {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Category {
            id: row.get(0)?,
            name: row.get(1)?,
            created_at: row.get(2)?,
        })
    }
}

fn event_at(row: &Row, at: usize) -> rusqlite::Result<Event> {
    Ok(Event {
        id: row.get(at)?,
        title: row.get(at + 1)?,
        description: row.get(at + 2)?,
        location: row.get(at + 3)?,
        image_url: row.get(at + 4)?,
        start_date_time: row.get(at + 5)?,
        end_date_time: row.get(at + 6)?,
        price: row.get(at + 7)?,
        is_free: row.get::<_, i32>(at + 8)? != 0,
        url: row.get(at + 9)?,
        category_id: row.get(at + 10)?,
        organizer_id: row.get(at + 11)?,
        created_at: row.get(at + 12)?,
        updated_at: row.get(at + 13)?,
    })
}

fn event_details_at(row: &Row, at: usize) -> rusqlite::Result<EventDetails> {
    let event = event_at(row, at)?;
    let base = at + EVENT_COL_COUNT;

    let organizer = row
        .get::<_, Option<String>>(base)?
        .map(|id| -> rusqlite::Result<UserSummary> {
            Ok(UserSummary {
                id,
                first_name: row.get(base + 1)?,
                last_name: row.get(base + 2)?,
            })
        })
        .transpose()?;

    let category = row
        .get::<_, Option<String>>(base + 3)?
        .map(|id| -> rusqlite::Result<CategorySummary> {
            Ok(CategorySummary {
                id,
                name: row.get(base + 4)?,
            })
        })
        .transpose()?;

    Ok(EventDetails {
        event,
        organizer,
        category,
    })
}

impl FromRow for Event {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        event_at(row, 0)
    }
}

impl FromRow for EventDetails {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        event_details_at(row, 0)
    }
}

impl FromRow for Order {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Order {
            id: row.get(0)?,
            stripe_id: row.get(1)?,
            event_id: row.get(2)?,
            buyer_id: row.get(3)?,
            total_amount_cents: row.get(4)?,
            currency: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

/// Reads `ORDER_COLS` followed by `EVENT_DETAILS_COLS`.
impl FromRow for OrderWithEvent {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(OrderWithEvent {
            order: Order::from_row(row)?,
            event: event_details_at(row, ORDER_COL_COUNT)?,
        })
    }
}

impl FromRow for OrderItem {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(OrderItem {
            id: row.get(0)?,
            total_amount_cents: row.get(1)?,
            currency: row.get(2)?,
            created_at: row.get(3)?,
            event_id: row.get(4)?,
            event_title: row.get(5)?,
            buyer: row.get(6)?,
        })
    }
}
