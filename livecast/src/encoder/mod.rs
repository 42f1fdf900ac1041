//! Encoder supervision: ffmpeg command construction, output capture and
//! cooperative stop.

pub mod command;
pub mod progress;
pub mod reader;
mod supervisor;

pub use command::{IngestTarget, Redactor, build_args};
pub use progress::EncoderProgress;
pub use supervisor::{EncodeRequest, EncoderHandle, EncoderSupervisor, LineSink, SESSION_ENDED};

#[cfg(all(test, unix))]
pub(crate) mod test_support {
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;

    /// Write an executable `sh` script standing in for ffmpeg.
    pub fn fake_encoder(body: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ffmpeg");
        std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        (dir, path)
    }
}
