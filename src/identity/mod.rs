//! Bridge to the hosted identity provider.
//!
//! Sessions are RS256 JWTs issued by the provider; user lifecycle changes
//! arrive as svix-signed webhooks and are mirrored into the `users` table.

mod session;
mod webhook;

pub use session::*;
pub use webhook::*;
