//! livecast library crate.
//!
//! Provisions a live broadcast on a video platform, supervises an ffmpeg
//! push of a looping video file to it, and records a queryable log of each
//! session.

pub mod config;
pub mod credentials;
pub mod database;
pub mod domain;
pub mod encoder;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod platform;
pub mod session_log;

pub use error::{Error, ErrorKind, Result};
pub use orchestrator::{
    ActiveStream, OrchestratorState, SessionOrchestrator, StreamRequest, StreamTarget,
};
pub use session_log::SessionLog;
