use chrono::Utc;
use rusqlite::{Connection, params, types::Value};
use uuid::Uuid;

use crate::error::{AppError, Result, map_unique_violation};
use crate::models::*;
use crate::util::search_key;

use super::cascade::{USER_DEPENDENTS, count_children, delete_entity, delete_with_detach};
use super::from_row::{
    CATEGORY_COLS, EVENT_COLS, EVENT_DETAILS_COLS, EVENT_DETAILS_FROM, ORDER_COLS,
    ORDER_ITEM_COLS, USER_COLS, query_all, query_one,
};

fn now() -> i64 {
    Utc::now().timestamp()
}

fn gen_id() -> String {
    Uuid::new_v4().to_string()
}

/// Escape LIKE wildcards and wrap the term for a substring match (`ESCAPE '\'`).
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Builder for dynamic UPDATE statements with optional fields.
/// Combines multiple field updates into a single query for efficiency.
struct UpdateBuilder {
    table: &'static str,
    id: String,
    fields: Vec<(&'static str, Value)>,
    track_updated_at: bool,
}

impl UpdateBuilder {
    fn new(table: &'static str, id: &str) -> Self {
        Self {
            table,
            id: id.to_string(),
            fields: Vec::new(),
            track_updated_at: false,
        }
    }

    fn with_updated_at(mut self) -> Self {
        self.track_updated_at = true;
        self
    }

    fn set(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.fields.push((column, value.into()));
        self
    }

    fn set_opt<V: Into<Value>>(self, column: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.set(column, v),
            None => self,
        }
    }

    /// Set a column to an explicit value (including NULL).
    /// Use this for Option<T> where Some(v) = set to v, None = set to NULL.
    fn set_nullable<V: Into<Value>>(mut self, column: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.fields.push((column, v.into())),
            None => self.fields.push((column, Value::Null)),
        }
        self
    }

    /// Skip when absent; otherwise set the value or NULL.
    fn set_patch<V: Into<Value>>(self, column: &'static str, value: Option<Option<V>>) -> Self {
        match value {
            Some(v) => self.set_nullable(column, v),
            None => self,
        }
    }

    /// Run the UPDATE, leaving constraint errors for the caller to classify.
    fn try_execute(mut self, conn: &Connection) -> rusqlite::Result<bool> {
        if self.fields.is_empty() {
            return Ok(false);
        }
        if self.track_updated_at {
            self.fields.push(("updated_at", now().into()));
        }
        let sets: Vec<String> = self
            .fields
            .iter()
            .map(|(col, _)| format!("{} = ?", col))
            .collect();
        let mut values: Vec<Value> = self.fields.into_iter().map(|(_, v)| v).collect();
        values.push(self.id.into());
        let sql = format!("UPDATE {} SET {} WHERE id = ?", self.table, sets.join(", "));
        let affected = conn.execute(&sql, rusqlite::params_from_iter(values))?;
        Ok(affected > 0)
    }

    fn execute(self, conn: &Connection) -> Result<bool> {
        Ok(self.try_execute(conn)?)
    }
}

// ============ Users ============

/// Create a user mirrored from the identity provider.
pub fn create_user(conn: &Connection, input: &CreateUser) -> Result<User> {
    input.validate()?;

    let id = gen_id();
    let now = now();
    let email = input.email.trim().to_string();

    conn.execute(
        "INSERT INTO users (id, identity_id, email, username, first_name, last_name, photo, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            &id,
            &input.identity_id,
            &email,
            &input.username,
            &input.first_name,
            &input.last_name,
            &input.photo,
            now,
            now
        ],
    )
    .map_err(|e| map_unique_violation(e, "User already exists"))?;

    Ok(User {
        id,
        identity_id: input.identity_id.clone(),
        email,
        username: input.username.clone(),
        first_name: input.first_name.clone(),
        last_name: input.last_name.clone(),
        photo: input.photo.clone(),
        created_at: now,
        updated_at: now,
    })
}

pub fn get_user_by_id(conn: &Connection, id: &str) -> Result<Option<User>> {
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLS),
        &[&id],
    )
}

pub fn get_user_by_identity_id(conn: &Connection, identity_id: &str) -> Result<Option<User>> {
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE identity_id = ?1", USER_COLS),
        &[&identity_id],
    )
}

/// Partially update the user with the given identity provider id.
pub fn update_user(conn: &Connection, identity_id: &str, input: &UpdateUser) -> Result<User> {
    input.validate()?;

    let existing = get_user_by_identity_id(conn, identity_id)?
        .ok_or_else(|| AppError::NotFound("User update failed".into()))?;

    UpdateBuilder::new("users", &existing.id)
        .with_updated_at()
        .set_opt("email", input.email.as_ref().map(|e| e.trim().to_string()))
        .set_opt("username", input.username.clone())
        .set_patch("first_name", input.first_name.clone())
        .set_patch("last_name", input.last_name.clone())
        .set_patch("photo", input.photo.clone())
        .try_execute(conn)
        .map_err(|e| map_unique_violation(e, "Email or username already taken"))?;

    get_user_by_id(conn, &existing.id)?
        .ok_or_else(|| AppError::NotFound("User update failed".into()))
}

/// Delete a user, detaching their events and orders first.
///
/// Events keep existing without an organizer and orders without a buyer.
/// Returns the deleted record.
pub fn delete_user(conn: &Connection, identity_id: &str) -> Result<User> {
    let user = get_user_by_identity_id(conn, identity_id)?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    let (_, detached) = delete_with_detach(conn, "users", &user.id, USER_DEPENDENTS)?;

    tracing::info!(
        "Deleted user {} ({} related rows detached)",
        user.id,
        detached
    );

    Ok(user)
}

// ============ Categories ============

pub fn create_category(conn: &Connection, name: &str) -> Result<Category> {
    let name = normalize_category_name(name)?;
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO categories (id, name, name_key, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![&id, &name, search_key(&name), now],
    )
    .map_err(|e| map_unique_violation(e, "Category already exists"))?;

    Ok(Category {
        id,
        name,
        created_at: now,
    })
}

pub fn list_categories(conn: &Connection) -> Result<Vec<Category>> {
    query_all(
        conn,
        &format!("SELECT {} FROM categories ORDER BY name_key, name", CATEGORY_COLS),
        [],
    )
}

pub fn get_category_by_id(conn: &Connection, id: &str) -> Result<Option<Category>> {
    query_one(
        conn,
        &format!("SELECT {} FROM categories WHERE id = ?1", CATEGORY_COLS),
        &[&id],
    )
}

/// Case-insensitive exact match on the category name, normalized like `create_category`.
pub fn get_category_by_name(conn: &Connection, name: &str) -> Result<Option<Category>> {
    let Ok(name) = normalize_category_name(name) else {
        return Ok(None);
    };
    query_one(
        conn,
        &format!("SELECT {} FROM categories WHERE name_key = ?1", CATEGORY_COLS),
        &[&search_key(&name)],
    )
}

// ============ Events ============

/// Filters for the public event listing.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Case-insensitive substring of the title
    pub query: Option<String>,
    /// Category name (case-insensitive exact match)
    pub category: Option<String>,
}

fn ensure_category_exists(conn: &Connection, category_id: Option<&str>) -> Result<()> {
    if let Some(category_id) = category_id {
        if get_category_by_id(conn, category_id)?.is_none() {
            return Err(AppError::BadRequest("Category not found".into()));
        }
    }
    Ok(())
}

pub fn create_event(conn: &Connection, organizer_id: &str, input: &CreateEvent) -> Result<Event> {
    input.validate()?;

    if get_user_by_id(conn, organizer_id)?.is_none() {
        return Err(AppError::NotFound("Organizer not found".into()));
    }
    ensure_category_exists(conn, input.category_id.as_deref())?;

    let id = gen_id();
    let now = now();
    let price = if input.is_free {
        String::new()
    } else {
        input.price.trim().to_string()
    };

    conn.execute(
        "INSERT INTO events (id, title, search_title, description, location, image_url, start_date_time, end_date_time, price, is_free, url, category_id, organizer_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            &id,
            &input.title,
            search_key(&input.title),
            &input.description,
            &input.location,
            &input.image_url,
            input.start_date_time,
            input.end_date_time,
            &price,
            input.is_free as i32,
            &input.url,
            &input.category_id,
            organizer_id,
            now,
            now
        ],
    )?;

    Ok(Event {
        id,
        title: input.title.clone(),
        description: input.description.clone(),
        location: input.location.clone(),
        image_url: input.image_url.clone(),
        start_date_time: input.start_date_time,
        end_date_time: input.end_date_time,
        price,
        is_free: input.is_free,
        url: input.url.clone(),
        category_id: input.category_id.clone(),
        organizer_id: Some(organizer_id.to_string()),
        created_at: now,
        updated_at: now,
    })
}

/// The bare event row, without populated relations.
pub fn get_event(conn: &Connection, id: &str) -> Result<Option<Event>> {
    query_one(
        conn,
        &format!("SELECT {} FROM events WHERE id = ?1", EVENT_COLS),
        &[&id],
    )
}

pub fn get_event_by_id(conn: &Connection, id: &str) -> Result<Option<EventDetails>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM {} WHERE e.id = ?1",
            EVENT_DETAILS_COLS, EVENT_DETAILS_FROM
        ),
        &[&id],
    )
}

/// Load an event the user organizes, or fail without revealing which check failed.
fn get_owned_event(conn: &Connection, user_id: &str, id: &str) -> Result<Event> {
    let event = get_event(conn, id)?
        .ok_or_else(|| AppError::NotFound("Unauthorized or event not found".into()))?;
    if event.organizer_id.as_deref() != Some(user_id) {
        return Err(AppError::Forbidden("Unauthorized or event not found".into()));
    }
    Ok(event)
}

/// Update an event. Only its organizer may do so.
pub fn update_event(
    conn: &Connection,
    user_id: &str,
    id: &str,
    input: &UpdateEvent,
) -> Result<EventDetails> {
    let existing = get_owned_event(conn, user_id, id)?;

    let merged = input.merge(&existing);
    merged.validate()?;
    if merged.category_id != existing.category_id {
        ensure_category_exists(conn, merged.category_id.as_deref())?;
    }
    let price = if merged.is_free {
        String::new()
    } else {
        merged.price.trim().to_string()
    };

    UpdateBuilder::new("events", id)
        .with_updated_at()
        .set("search_title", search_key(&merged.title))
        .set("title", merged.title)
        .set("description", merged.description)
        .set("location", merged.location)
        .set("image_url", merged.image_url)
        .set("start_date_time", merged.start_date_time)
        .set("end_date_time", merged.end_date_time)
        .set("price", price)
        .set("is_free", merged.is_free as i32)
        .set("url", merged.url)
        .set_nullable("category_id", merged.category_id)
        .execute(conn)?;

    get_event_by_id(conn, id)?
        .ok_or_else(|| AppError::NotFound("Unauthorized or event not found".into()))
}

/// Delete an event. Only its organizer may do so, and only while it has no orders.
pub fn delete_event(conn: &Connection, user_id: &str, id: &str) -> Result<Event> {
    let event = get_owned_event(conn, user_id, id)?;

    if count_children(conn, "orders", "event_id", id)? > 0 {
        return Err(AppError::Conflict(
            "Event has orders and cannot be deleted".into(),
        ));
    }

    delete_entity(conn, "events", id)?;
    Ok(event)
}

/// Newest-first listing with optional title search and category filter.
///
/// An unknown category name yields an empty page rather than all events.
pub fn list_events(
    conn: &Connection,
    filter: &EventFilter,
    limit: i64,
    offset: i64,
) -> Result<(Vec<EventDetails>, i64)> {
    // Build WHERE clause (shared between COUNT and SELECT)
    let mut where_clause = String::from("WHERE 1=1");
    let mut filter_params: Vec<Value> = Vec::new();

    if let Some(query) = filter.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        where_clause.push_str(" AND e.search_title LIKE ? ESCAPE '\\'");
        filter_params.push(like_pattern(&search_key(query)).into());
    }
    if let Some(name) = filter.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        match get_category_by_name(conn, name)? {
            Some(category) => {
                where_clause.push_str(" AND e.category_id = ?");
                filter_params.push(category.id.into());
            }
            None => return Ok((Vec::new(), 0)),
        }
    }

    let count_sql = format!("SELECT COUNT(*) FROM events e {}", where_clause);
    let total: i64 = conn.query_row(
        &count_sql,
        rusqlite::params_from_iter(filter_params.iter()),
        |row| row.get(0),
    )?;

    let select_sql = format!(
        "SELECT {} FROM {} {} ORDER BY e.created_at DESC, e.rowid DESC LIMIT ? OFFSET ?",
        EVENT_DETAILS_COLS, EVENT_DETAILS_FROM, where_clause
    );
    let mut select_params = filter_params;
    select_params.push(limit.into());
    select_params.push(offset.into());

    let events = query_all(conn, &select_sql, rusqlite::params_from_iter(select_params))?;
    Ok((events, total))
}

pub fn list_events_by_organizer(
    conn: &Connection,
    organizer_id: &str,
    limit: i64,
    offset: i64,
) -> Result<(Vec<EventDetails>, i64)> {
    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM events WHERE organizer_id = ?1",
        params![organizer_id],
        |row| row.get(0),
    )?;

    let events = query_all(
        conn,
        &format!(
            "SELECT {} FROM {} WHERE e.organizer_id = ?1
             ORDER BY e.created_at DESC, e.rowid DESC LIMIT ?2 OFFSET ?3",
            EVENT_DETAILS_COLS, EVENT_DETAILS_FROM
        ),
        params![organizer_id, limit, offset],
    )?;

    Ok((events, total))
}

/// Other events in the same category, newest first.
pub fn list_related_events(
    conn: &Connection,
    category_id: &str,
    exclude_event_id: &str,
    limit: i64,
    offset: i64,
) -> Result<(Vec<EventDetails>, i64)> {
    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM events WHERE category_id = ?1 AND id != ?2",
        params![category_id, exclude_event_id],
        |row| row.get(0),
    )?;

    let events = query_all(
        conn,
        &format!(
            "SELECT {} FROM {} WHERE e.category_id = ?1 AND e.id != ?2
             ORDER BY e.created_at DESC, e.rowid DESC LIMIT ?3 OFFSET ?4",
            EVENT_DETAILS_COLS, EVENT_DETAILS_FROM
        ),
        params![category_id, exclude_event_id, limit, offset],
    )?;

    Ok((events, total))
}

// ============ Orders ============

pub fn get_order_by_stripe_id(conn: &Connection, stripe_id: &str) -> Result<Option<Order>> {
    query_one(
        conn,
        &format!("SELECT {} FROM orders o WHERE o.stripe_id = ?1", ORDER_COLS),
        &[&stripe_id],
    )
}

/// Record an order. Idempotent on `stripe_id`: a replayed checkout returns the
/// existing order with `created = false`.
///
/// A buyer id that no longer resolves to a user is stored as NULL. A second free
/// registration for the same buyer and event is a `Conflict`.
pub fn create_order(conn: &Connection, input: &CreateOrder) -> Result<(Order, bool)> {
    if let Some(existing) = get_order_by_stripe_id(conn, &input.stripe_id)? {
        return Ok((existing, false));
    }

    if get_event(conn, &input.event_id)?.is_none() {
        return Err(AppError::NotFound("Event not found".into()));
    }

    let buyer_id = match input.buyer_id.as_deref() {
        Some(buyer_id) if get_user_by_id(conn, buyer_id)?.is_some() => Some(buyer_id.to_string()),
        Some(buyer_id) => {
            tracing::warn!(
                "Order {} references unknown buyer {}; storing without buyer",
                input.stripe_id,
                buyer_id
            );
            None
        }
        None => None,
    };

    let id = gen_id();
    let now = now();

    // OR IGNORE settles concurrent deliveries of the same checkout and
    // concurrent free registrations (idx_orders_free_registration)
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO orders (id, stripe_id, event_id, buyer_id, total_amount_cents, currency, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            &id,
            &input.stripe_id,
            &input.event_id,
            &buyer_id,
            input.total_amount_cents,
            &input.currency,
            now
        ],
    )?;

    if inserted == 0 {
        return match get_order_by_stripe_id(conn, &input.stripe_id)? {
            Some(existing) => Ok((existing, false)),
            None => Err(AppError::Conflict(
                "Already registered for this event".into(),
            )),
        };
    }

    Ok((
        Order {
            id,
            stripe_id: input.stripe_id.clone(),
            event_id: input.event_id.clone(),
            buyer_id,
            total_amount_cents: input.total_amount_cents,
            currency: input.currency.clone(),
            created_at: now,
        },
        true,
    ))
}

/// Orders for one event, with the buyer's name. Orders whose buyer was deleted are
/// left out. `search` is a case-insensitive substring of the buyer's full name.
pub fn list_orders_by_event(
    conn: &Connection,
    event_id: &str,
    search: Option<&str>,
) -> Result<Vec<OrderItem>> {
    let orders: Vec<OrderItem> = query_all(
        conn,
        &format!(
            "SELECT {} FROM orders o
             JOIN events e ON e.id = o.event_id
             JOIN users b ON b.id = o.buyer_id
             WHERE o.event_id = ?1
             ORDER BY o.created_at DESC, o.rowid DESC",
            ORDER_ITEM_COLS
        ),
        params![event_id],
    )?;

    // Names are matched after Unicode case folding, which SQLite cannot do
    let Some(needle) = search.map(str::trim).filter(|s| !s.is_empty()).map(search_key) else {
        return Ok(orders);
    };
    Ok(orders
        .into_iter()
        .filter(|order| search_key(&order.buyer).contains(&needle))
        .collect())
}

/// A buyer's orders with their events populated, newest first.
pub fn list_orders_by_user(
    conn: &Connection,
    buyer_id: &str,
    limit: i64,
    offset: i64,
) -> Result<(Vec<OrderWithEvent>, i64)> {
    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM orders WHERE buyer_id = ?1",
        params![buyer_id],
        |row| row.get(0),
    )?;

    let orders = query_all(
        conn,
        &format!(
            "SELECT {}, {} FROM orders o
             JOIN events e ON e.id = o.event_id
             LEFT JOIN users u ON u.id = e.organizer_id
             LEFT JOIN categories c ON c.id = e.category_id
             WHERE o.buyer_id = ?1
             ORDER BY o.created_at DESC, o.rowid DESC LIMIT ?2 OFFSET ?3",
            ORDER_COLS, EVENT_DETAILS_COLS
        ),
        params![buyer_id, limit, offset],
    )?;

    Ok((orders, total))
}

pub fn has_order_for_event(conn: &Connection, buyer_id: &str, event_id: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM orders WHERE buyer_id = ?1 AND event_id = ?2",
        params![buyer_id, event_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
