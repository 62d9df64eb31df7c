//! Output stream listeners for the server process.
//!
//! PostgreSQL (like other C tooling) can emit non-UTF-8 bytes, and
//! `BufReader::lines()` would end the reader on the first invalid sequence.
//! Readers here split on `\n` at the byte level and decode lossily. A line
//! longer than [`MAX_LINE_BYTES`] is cut at the limit and the rest of it is
//! discarded, so a runaway writer cannot grow the buffer without bound.
//!
//! The two reader tasks are the process's listeners. `detach` cancels them
//! exactly once per process, before the process handle is discarded, so no
//! late read touches a pipe of a process that is already gone.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::Child;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::debug;

use super::logs::OutputStream;

/// Longest line forwarded to the sink, in bytes.
pub const MAX_LINE_BYTES: u64 = 8 * 1024;

/// Receiver of complete output lines.
pub trait LineSink: Send + Sync + 'static {
    fn on_line(&self, stream: OutputStream, line: String);
}

/// Reader tasks attached to one child's stdout and stderr.
#[derive(Debug, Clone)]
pub struct OutputListeners {
    cancel: CancellationToken,
    tracker: TaskTracker,
    detached: Arc<AtomicBool>,
}

impl OutputListeners {
    /// Take the child's piped stdout/stderr and start one reader per stream.
    pub fn attach(child: &mut Child, sink: Arc<dyn LineSink>) -> Self {
        let cancel = CancellationToken::new();
        let tracker = TaskTracker::new();

        if let Some(stdout) = child.stdout.take() {
            tracker.spawn(read_lines(
                stdout,
                OutputStream::Stdout,
                Arc::clone(&sink),
                cancel.clone(),
            ));
        }

        if let Some(stderr) = child.stderr.take() {
            tracker.spawn(read_lines(
                stderr,
                OutputStream::Stderr,
                sink,
                cancel.clone(),
            ));
        }

        tracker.close();

        Self {
            cancel,
            tracker,
            detached: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stop both readers. Returns `true` only for the call that detached them.
    pub fn detach(&self) -> bool {
        if self.detached.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.cancel.cancel();
        true
    }

    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }

    /// Wait up to `limit` for both readers to reach end-of-stream.
    ///
    /// Returns `true` if they finished on their own.
    pub async fn drain(&self, limit: Duration) -> bool {
        tokio::time::timeout(limit, self.tracker.wait()).await.is_ok()
    }
}

async fn read_lines(
    stream: impl AsyncRead + Unpin,
    kind: OutputStream,
    sink: Arc<dyn LineSink>,
    cancel: CancellationToken,
) {
    let mut reader = BufReader::new(stream);
    let mut buf: Vec<u8> = Vec::with_capacity(1024);
    // Inside an overlong line whose prefix was already forwarded
    let mut skipping = false;

    loop {
        buf.clear();
        let mut limited = (&mut reader).take(MAX_LINE_BYTES);
        let read = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(stream = %kind, "Output listener detached");
                return;
            }
            read = limited.read_until(b'\n', &mut buf) => read,
        };

        match read {
            Ok(0) => break, // EOF
            Ok(_) => {
                let complete = buf.last() == Some(&b'\n');
                if skipping {
                    skipping = !complete;
                    continue;
                }

                if complete {
                    buf.pop();
                    if buf.last() == Some(&b'\r') {
                        buf.pop();
                    }
                } else if buf.len() as u64 == MAX_LINE_BYTES {
                    debug!(stream = %kind, limit = MAX_LINE_BYTES, "Output line too long, truncating");
                    skipping = true;
                }
                sink.on_line(kind, String::from_utf8_lossy(&buf).into_owned());
            }
            Err(e) => {
                debug!(stream = %kind, error = %e, "Output listener exiting due to read error");
                break;
            }
        }
    }

    debug!(stream = %kind, "Output listener reached end of stream");
}
