//! Database models for livecast.
//!
//! These models map directly to the database schema and convert to and
//! from the domain entities, handling the JSON and timestamp columns.

pub mod channel;
pub mod log_entry;
pub mod session;

pub use channel::*;
pub use log_entry::*;
pub use session::*;
