//! Repository layer for database access.
//!
//! Each table gets a repository trait and an SQLx implementation so the
//! services above can be exercised against fakes.

pub mod credential_store;
pub mod log_entry;
pub mod session;

pub use credential_store::*;
pub use log_entry::*;
pub use session::*;
