pub mod cascade;
pub mod from_row;
pub mod queries;
mod schema;

pub use schema::init_db;

use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::identity::{IdentityWebhookVerifier, SessionVerifier};
use crate::payments::StripeClient;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// Public URL of the web app, used for checkout redirects
    pub base_url: String,
    pub currency: String,
    /// None when Stripe is not configured (paid checkouts and the webhook are refused)
    pub stripe: Option<StripeClient>,
    /// None when no identity provider key is configured (authenticated routes reject)
    pub sessions: Option<Arc<SessionVerifier>>,
    pub identity_webhook: Option<IdentityWebhookVerifier>,
    pub dev_mode: bool,
}

fn enable_foreign_keys(conn: &mut rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
}

/// Open a file-backed pool. Call `init_db` on a connection before serving.
pub fn create_pool(path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(path).with_init(|conn| {
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        enable_foreign_keys(conn)
    });
    let pool = Pool::builder().max_size(8).build(manager)?;
    Ok(pool)
}

/// Single-connection in-memory pool (each SQLite memory connection is its own database).
pub fn create_memory_pool() -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::memory().with_init(enable_foreign_keys);
    Pool::builder().max_size(1).build(manager)
}
