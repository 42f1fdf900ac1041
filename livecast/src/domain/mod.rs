//! Domain layer for livecast.
//!
//! Entities shared by the stores, the platform client and the orchestrator.

pub mod channel;
pub mod log_entry;
pub mod session;

pub use channel::{AuthMaterial, ChannelCredential};
pub use log_entry::{LogEntry, LogKind, LogQuery, NewLogEntry};
pub use session::{BroadcastMetadata, PrivacyStatus, SessionStatus, StreamingSession};
