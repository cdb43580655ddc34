pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod identity;
pub mod middleware;
pub mod models;
pub mod pagination;
pub mod payments;
pub mod util;
