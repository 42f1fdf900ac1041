//! Line reader for encoder output.
//!
//! ffmpeg rewrites its status line with `\r`; when piped, those updates are
//! not newline-terminated. Records here end at either `\n` or `\r`.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, BufReader};

const READ_CHUNK: usize = 4096;

/// Yields text records delimited by `\n` or `\r`, skipping empty ones.
pub struct LineReader<R> {
    reader: BufReader<R>,
    pending: Vec<u8>,
    chunk: [u8; READ_CHUNK],
}

impl<R> LineReader<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            pending: Vec::new(),
            chunk: [0u8; READ_CHUNK],
        }
    }

    /// Next non-empty line, or `None` once the stream is closed.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        loop {
            if let Some(end) = self.pending.iter().position(|&b| is_delimiter(b)) {
                let line = take_line(&mut self.pending, end);
                if line.is_empty() {
                    continue;
                }
                return Ok(Some(line));
            }

            let n = self.reader.read(&mut self.chunk).await?;
            if n == 0 {
                let line = String::from_utf8_lossy(&self.pending).trim().to_string();
                self.pending.clear();
                return Ok((!line.is_empty()).then_some(line));
            }
            self.pending.extend_from_slice(&self.chunk[..n]);
        }
    }
}

fn is_delimiter(b: u8) -> bool {
    matches!(b, b'\n' | b'\r')
}

/// Remove `buf[..end]` plus the delimiter run after it.
fn take_line(buf: &mut Vec<u8>, end: usize) -> String {
    let run = buf[end..].iter().take_while(|&&b| is_delimiter(b)).count();
    let line = String::from_utf8_lossy(&buf[..end]).trim().to_string();
    buf.drain(..end + run);
    line
}
