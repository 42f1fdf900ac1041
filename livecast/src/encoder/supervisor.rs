//! Encoder process supervision.
//!
//! One ffmpeg process per session. A single background task reads the
//! process output, forwards each (scrubbed) line to the caller's sink and the
//! session log, and writes the closing log entries when the process ends:
//!
//! 1. `INFO` start summary with the redacted target
//! 2. one `FFMPEG` entry per output line, in emission order
//! 3. `INFO` on clean exit or requested stop, `ERROR` otherwise
//! 4. `INFO` "Session ended"

use chrono::Utc;
use process_utils::{ProcessExit, spawn_exit_waiter, tokio_command};
use std::io::{PipeReader, Read};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWriteExt, DuplexStream};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::command::{IngestTarget, Redactor, build_args};
use super::progress::{EncoderProgress, parse_progress};
use super::reader::LineReader;
use crate::config::EncoderConfig;
use crate::domain::NewLogEntry;
use crate::session_log::SessionLog;
use crate::{Error, Result};

/// Final log message of every session.
pub const SESSION_ENDED: &str = "Session ended";

/// How long to keep reading buffered output after the process has exited.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// In-memory buffer between the output pipe and the pump.
const OUTPUT_BUFFER: usize = 64 * 1024;

/// Receives every encoder output line after scrubbing.
pub type LineSink = mpsc::UnboundedSender<String>;

/// What to encode and where to push it.
#[derive(Clone)]
pub struct EncodeRequest {
    pub session_id: String,
    pub video_file: PathBuf,
    /// Stream key, or a full `rtmp://`/`rtmps://` URL.
    pub key_or_url: String,
    pub vertical: bool,
    pub channel_name: Option<String>,
}

impl std::fmt::Debug for EncodeRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodeRequest")
            .field("session_id", &self.session_id)
            .field("video_file", &self.video_file)
            .field("key_or_url", &"<redacted>")
            .field("vertical", &self.vertical)
            .field("channel_name", &self.channel_name)
            .finish()
    }
}

/// Session context stamped on every log entry.
#[derive(Debug, Clone)]
struct LogContext {
    session_id: String,
    video_file: Option<String>,
    channel_name: Option<String>,
}

impl LogContext {
    fn from_request(request: &EncodeRequest) -> Self {
        Self {
            session_id: request.session_id.clone(),
            video_file: Some(request.video_file.to_string_lossy().to_string()),
            channel_name: request.channel_name.clone(),
        }
    }

    fn stamp(&self, entry: NewLogEntry) -> NewLogEntry {
        entry
            .with_video_file(self.video_file.clone())
            .with_channel(self.channel_name.clone())
    }

    fn info(&self, message: impl Into<String>) -> NewLogEntry {
        self.stamp(NewLogEntry::info(&self.session_id, message))
    }

    fn error(&self, message: impl Into<String>) -> NewLogEntry {
        self.stamp(NewLogEntry::error(&self.session_id, message))
    }

    fn ffmpeg(&self, line: impl Into<String>) -> NewLogEntry {
        self.stamp(NewLogEntry::ffmpeg(&self.session_id, line))
    }
}

/// Handle to a running encoder. Cloning shares the same process.
#[derive(Debug, Clone)]
pub struct EncoderHandle {
    session_id: String,
    redacted_target: String,
    cancel: CancellationToken,
    outcome: watch::Receiver<Option<ProcessExit>>,
    progress: watch::Receiver<Option<EncoderProgress>>,
}

impl EncoderHandle {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Push target with the key masked.
    pub fn redacted_target(&self) -> &str {
        &self.redacted_target
    }

    /// Request termination. Returns once the signal is issued; repeated
    /// calls and calls after exit do nothing.
    pub fn stop(&self) {
        if self.is_finished() || self.cancel.is_cancelled() {
            return;
        }
        info!(session_id = %self.session_id, "Stopping encoder");
        self.cancel.cancel();
    }

    /// `true` once the closing log entries have been written.
    pub fn is_finished(&self) -> bool {
        self.outcome.borrow().is_some() || self.outcome.has_changed().is_err()
    }

    pub fn exit(&self) -> Option<ProcessExit> {
        *self.outcome.borrow()
    }

    /// Wait for the process to end and its closing entries to be written.
    pub async fn wait(&self) -> ProcessExit {
        let mut outcome = self.outcome.clone();
        match outcome.wait_for(Option::is_some).await {
            Ok(exit) => exit.unwrap_or(ProcessExit::Unknown),
            Err(_) => ProcessExit::Unknown,
        }
    }

    /// Most recent status line, if any was seen.
    pub fn progress(&self) -> Option<EncoderProgress> {
        self.progress.borrow().clone()
    }
}

/// Starts and stops encoder processes.
#[derive(Clone)]
pub struct EncoderSupervisor {
    config: EncoderConfig,
    log: SessionLog,
}

impl EncoderSupervisor {
    pub fn new(config: EncoderConfig, log: SessionLog) -> Self {
        Self { config, log }
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Launch the encoder for `request`.
    ///
    /// On failure the session's closing entries are written before the
    /// error is returned, so the log always holds a complete sequence.
    pub async fn start(
        &self,
        request: EncodeRequest,
        sink: Option<LineSink>,
    ) -> Result<EncoderHandle> {
        let ctx = LogContext::from_request(&request);

        let target = match IngestTarget::resolve(&request.key_or_url, &self.config.ingest_base_url)
        {
            Ok(target) => target,
            Err(e) => {
                self.abort_session(&ctx, &e).await;
                return Err(e);
            }
        };

        let mode = if request.vertical { " (vertical)" } else { "" };
        self.log
            .record(ctx.info(format!(
                "Starting stream of {} to {}{mode}",
                request.video_file.display(),
                target.redacted()
            )))
            .await;

        let spawned = merged_output().and_then(|(output, stdout, stderr)| {
            let args =
                build_args(&self.config, &request.video_file, target.url(), request.vertical);
            let mut command = tokio_command(&self.config.binary);
            command
                .args(&args)
                .env("LC_ALL", "C")
                .stdin(Stdio::null())
                .stdout(stdout)
                .stderr(stderr)
                .kill_on_drop(true);
            // `command` drops here with its copies of the write end, so the
            // reader sees EOF once the child closes its own.
            command.spawn().map(|child| (child, output))
        });

        let (child, output) = match spawned {
            Ok(spawned) => spawned,
            Err(e) => {
                let err = Error::EncoderLaunchFailed(format!(
                    "{}: {e}",
                    self.config.binary.display()
                ));
                self.abort_session(&ctx, &err).await;
                return Err(err);
            }
        };

        info!(
            session_id = %request.session_id,
            pid = ?child.id(),
            target = %target.redacted(),
            vertical = request.vertical,
            "Encoder started"
        );

        let output = bridge_pipe(output);
        let cancel = CancellationToken::new();
        let exit_rx = spawn_exit_waiter(child, cancel.clone());

        let (outcome_tx, outcome_rx) = watch::channel(None);
        let (progress_tx, progress_rx) = watch::channel(None);

        let pump = OutputPump {
            ctx,
            redactor: target.redactor(),
            sink,
            progress_tx,
            log: self.log.clone(),
        };
        tokio::spawn(pump.run(output, exit_rx, outcome_tx));

        Ok(EncoderHandle {
            session_id: request.session_id,
            redacted_target: target.redacted().to_string(),
            cancel,
            outcome: outcome_rx,
            progress: progress_rx,
        })
    }

    /// Stop the process behind `handle`. A no-op if it already exited.
    pub fn stop(&self, handle: &EncoderHandle) {
        handle.stop();
    }

    async fn abort_session(&self, ctx: &LogContext, err: &Error) {
        error!(session_id = %ctx.session_id, error = %err, "Encoder could not be started");
        self.log.record(ctx.error(err.user_message())).await;
        self.log.record(ctx.info(SESSION_ENDED)).await;
        end_session(&self.log, &ctx.session_id).await;
    }
}

async fn end_session(log: &SessionLog, session_id: &str) {
    if let Err(e) = log.end_session(session_id, Utc::now()).await {
        warn!(session_id = %session_id, error = %e, "Failed to mark session ended");
    }
}

/// Background reader: the only writer of `FFMPEG` entries for its session.
struct OutputPump {
    ctx: LogContext,
    redactor: Redactor,
    sink: Option<LineSink>,
    progress_tx: watch::Sender<Option<EncoderProgress>>,
    log: SessionLog,
}

impl OutputPump {
    async fn run<R: AsyncRead + Unpin>(
        mut self,
        output: R,
        mut exit_rx: tokio::sync::oneshot::Receiver<ProcessExit>,
        outcome_tx: watch::Sender<Option<ProcessExit>>,
    ) {
        let mut output = Some(LineReader::new(output));

        let exit = loop {
            tokio::select! {
                line = next_line(&mut output), if output.is_some() => match line {
                    Some(line) => self.forward(line).await,
                    None => output = None,
                },
                exit = &mut exit_rx => break exit.unwrap_or(ProcessExit::Unknown),
            }
        };

        // Output written just before exit may still be buffered in the pipe.
        let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
            while let Some(line) = next_line(&mut output).await {
                self.forward(line).await;
            }
        })
        .await;
        if drained.is_err() {
            debug!(session_id = %self.ctx.session_id, "Encoder output still open after exit");
        }

        self.finish(exit).await;
        let _ = outcome_tx.send(Some(exit));
    }

    async fn forward(&mut self, raw: String) {
        let line = self.redactor.scrub(&raw);

        if let Some(progress) = parse_progress(&line) {
            self.progress_tx.send_replace(Some(progress));
        }

        if let Some(sink) = &self.sink
            && sink.send(line.clone()).is_err()
        {
            // Viewer went away; keep logging.
            self.sink = None;
        }

        self.log.record(self.ctx.ffmpeg(line)).await;
    }

    async fn finish(&self, exit: ProcessExit) {
        let session_id = &self.ctx.session_id;
        if exit.is_clean() {
            info!(session_id = %session_id, "Encoder {exit}");
            self.log.record(self.ctx.info(format!("Encoder {exit}"))).await;
        } else {
            error!(session_id = %session_id, "Encoder {exit}");
            let err = Error::EncoderRuntimeError(exit.to_string());
            self.log.record(self.ctx.error(err.user_message())).await;
        }
        self.log.record(self.ctx.info(SESSION_ENDED)).await;
        end_session(&self.log, session_id).await;
    }
}

/// One pipe for both stdout and stderr, so lines keep the order the
/// process wrote them in.
fn merged_output() -> std::io::Result<(PipeReader, Stdio, Stdio)> {
    let (reader, writer) = std::io::pipe()?;
    let stderr = writer.try_clone()?;
    Ok((reader, Stdio::from(writer), Stdio::from(stderr)))
}

/// Copy the blocking pipe into an async stream from a dedicated thread.
///
/// The thread ends at EOF or once the async side is dropped.
fn bridge_pipe(mut pipe: PipeReader) -> DuplexStream {
    let (mut tx, rx) = tokio::io::duplex(OUTPUT_BUFFER);
    let runtime = tokio::runtime::Handle::current();

    let copy = move || {
        let mut buf = [0u8; 8192];
        loop {
            let n = match pipe.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!(error = %e, "Encoder output pipe read failed");
                    break;
                }
            };
            if runtime.block_on(tx.write_all(&buf[..n])).is_err() {
                break;
            }
        }
    };

    if let Err(e) = std::thread::Builder::new()
        .name("encoder-output".to_string())
        .spawn(copy)
    {
        // The stream reads as empty; exit handling is unaffected.
        warn!(error = %e, "Failed to start encoder output reader");
    }
    rx
}

/// Next line from an open reader; `None` at EOF, on read error, or if closed.
async fn next_line<R: AsyncRead + Unpin>(reader: &mut Option<LineReader<R>>) -> Option<String> {
    let reader = reader.as_mut()?;
    match reader.next_line().await {
        Ok(line) => line,
        Err(e) => {
            debug!(error = %e, "Encoder output read failed");
            None
        }
    }
}
