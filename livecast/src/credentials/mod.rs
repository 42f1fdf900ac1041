//! Channel credential management.
//!
//! - [`CredentialStore`]: persistence of per-channel authorization material,
//!   looked up by channel name. The SQLx implementation is
//!   [`SqlxCredentialStore`](crate::database::repositories::SqlxCredentialStore).

mod store;

pub use store::CredentialStore;
#[cfg(test)]
pub use store::MockCredentialStore;
