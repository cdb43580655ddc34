use rusqlite::Connection;

use crate::error::Result;

/// Create tables and indexes if they do not exist yet.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            identity_id TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL UNIQUE COLLATE NOCASE,
            username TEXT NOT NULL UNIQUE,
            first_name TEXT,
            last_name TEXT,
            photo TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS categories (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            name_key TEXT NOT NULL UNIQUE,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS events (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            search_title TEXT NOT NULL DEFAULT '',
            description TEXT NOT NULL,
            location TEXT NOT NULL,
            image_url TEXT NOT NULL DEFAULT '',
            start_date_time INTEGER NOT NULL,
            end_date_time INTEGER NOT NULL,
            price TEXT NOT NULL DEFAULT '',
            is_free INTEGER NOT NULL DEFAULT 0,
            url TEXT NOT NULL,
            category_id TEXT REFERENCES categories(id) ON DELETE SET NULL,
            organizer_id TEXT REFERENCES users(id),
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_events_created_at ON events(created_at);
        CREATE INDEX IF NOT EXISTS idx_events_category ON events(category_id);
        CREATE INDEX IF NOT EXISTS idx_events_organizer ON events(organizer_id);

        CREATE TABLE IF NOT EXISTS orders (
            id TEXT PRIMARY KEY,
            stripe_id TEXT NOT NULL UNIQUE,
            event_id TEXT NOT NULL REFERENCES events(id),
            buyer_id TEXT REFERENCES users(id),
            total_amount_cents INTEGER NOT NULL,
            currency TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_orders_event ON orders(event_id);
        CREATE INDEX IF NOT EXISTS idx_orders_buyer ON orders(buyer_id);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_orders_free_registration
            ON orders(buyer_id, event_id) WHERE substr(stripe_id, 1, 5) = 'free_';
        ",
    )?;
    Ok(())
}
