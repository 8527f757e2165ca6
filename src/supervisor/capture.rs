//! Stream Capture
//!
//! One reader task per output stream. Each reader splits raw bytes into
//! complete lines, buffering partial lines across reads, and hands every
//! finished line to the shared [`CapturePipeline`], which classifies it and
//! publishes it to the log sink with the next global sequence number.

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::classifier::LogClassifier;
use super::sink::LogSink;
use super::state::SessionState;
use crate::error::Error;
use crate::models::{LogSource, Severity};

/// A line longer than this is emitted in pieces
pub const MAX_PENDING_LINE: usize = 64 * 1024;

/// Notice emitted after the flag is raised
pub const AWAITING_INPUT_NOTICE: &str = "Waiting for input: press Enter to continue";

const MAX_CONSECUTIVE_ERRORS: u32 = 5;

static ANSI_ESCAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]|\x1b\][^\x07]*\x07")
        .expect("escape pattern is a valid regex")
});

/// Remove CSI and OSC escape sequences
pub fn strip_ansi(text: &str) -> Cow<'_, str> {
    if !text.contains('\x1b') {
        return Cow::Borrowed(text);
    }
    ANSI_ESCAPE.replace_all(text, "")
}

/// Decode a line, substituting malformed bytes. Returns whether any were replaced.
pub fn decode_line(bytes: &[u8]) -> (String, bool) {
    match String::from_utf8_lossy(bytes) {
        Cow::Borrowed(text) => (text.to_string(), false),
        Cow::Owned(text) => (text, true),
    }
}

/// Splits a byte stream into lines on `\n`, dropping a trailing `\r`
#[derive(Debug)]
pub struct LineSplitter {
    pending: Vec<u8>,
    max_pending: usize,
}

impl Default for LineSplitter {
    fn default() -> Self {
        Self::new()
    }
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::with_max_pending(MAX_PENDING_LINE)
    }

    pub fn with_max_pending(max_pending: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_pending: max_pending.max(1),
        }
    }

    /// Feed a chunk, returning every line it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        let mut lines = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            self.pending.extend_from_slice(&rest[..pos]);
            let mut line = std::mem::take(&mut self.pending);
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(line);
            rest = &rest[pos + 1..];
        }

        self.pending.extend_from_slice(rest);
        while self.pending.len() >= self.max_pending {
            let tail = self.pending.split_off(self.max_pending);
            lines.push(std::mem::replace(&mut self.pending, tail));
        }

        lines
    }

    /// Flush unterminated trailing data at end of stream
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        if self.pending.is_empty() {
            None
        } else {
            let mut line = std::mem::take(&mut self.pending);
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            Some(line)
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Shared by both readers of one session
#[derive(Clone)]
pub struct CapturePipeline {
    session: u64,
    sink: LogSink,
    classifier: LogClassifier,
    state: Arc<SessionState>,
    strip_ansi: bool,
}

impl CapturePipeline {
    pub fn new(
        session: u64,
        sink: LogSink,
        classifier: LogClassifier,
        state: Arc<SessionState>,
        strip_ansi: bool,
    ) -> Self {
        Self {
            session,
            sink,
            classifier,
            state,
            strip_ansi,
        }
    }

    /// Decode, classify and publish one completed line
    pub fn emit_line(&self, source: LogSource, bytes: &[u8]) {
        let (text, degraded) = decode_line(bytes);
        if degraded {
            let err = Error::CaptureDecodeDegraded {
                source,
                line_bytes: bytes.len(),
            };
            warn!("{}", err);
        }

        let message = if self.strip_ansi {
            strip_ansi(&text).into_owned()
        } else {
            text
        };

        let severity = self.classifier.severity(source, &message);
        let mut raised = false;
        self.sink.publish_with(source, severity, message, |event| {
            raised = self.classifier.inspect(&self.state, self.session, event);
        });

        if raised {
            self.sink.publish(
                LogSource::System,
                Severity::Warning,
                AWAITING_INPUT_NOTICE.to_string(),
            );
        }
    }
}

/// Totals reported by a reader when it exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub bytes: u64,
    pub lines: u64,
    pub cancelled: bool,
}

/// Spawn a reader task for one stream. It runs until end of stream, too many
/// read errors, or `stop` becomes true, and always flushes a partial line.
pub fn spawn_reader<R>(
    source: LogSource,
    mut reader: R,
    pipeline: CapturePipeline,
    buffer_size: usize,
    mut stop: watch::Receiver<bool>,
) -> JoinHandle<CaptureStats>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        let mut buf = vec![0u8; buffer_size.max(1)];
        let mut splitter = LineSplitter::new();
        let mut stats = CaptureStats::default();
        let mut consecutive_errors = 0;

        loop {
            if *stop.borrow() {
                stats.cancelled = true;
                break;
            }

            let read = tokio::select! {
                biased;
                changed = stop.changed() => {
                    // A dropped sender also ends capture
                    if changed.is_err() || *stop.borrow() {
                        stats.cancelled = true;
                        break;
                    }
                    continue;
                }
                read = reader.read(&mut buf) => read,
            };

            match read {
                Ok(0) => {
                    debug!(%source, "Capture reached end of stream");
                    break;
                }
                Ok(n) => {
                    consecutive_errors = 0;
                    stats.bytes += n as u64;
                    for line in splitter.push(&buf[..n]) {
                        pipeline.emit_line(source, &line);
                        stats.lines += 1;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {
                    debug!(%source, "Capture read interrupted, retrying");
                    continue;
                }
                Err(e) => {
                    consecutive_errors += 1;
                    warn!(
                        "{} read error ({}): {} (attempt {}/{})",
                        source,
                        e.kind(),
                        e,
                        consecutive_errors,
                        MAX_CONSECUTIVE_ERRORS
                    );
                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        error!(%source, "Too many consecutive read errors, stopping capture");
                        break;
                    }
                    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                }
            }
        }

        if let Some(line) = splitter.finish() {
            pipeline.emit_line(source, &line);
            stats.lines += 1;
        }

        debug!(
            %source,
            bytes = stats.bytes,
            lines = stats.lines,
            cancelled = stats.cancelled,
            "Capture reader exiting"
        );
        stats
    })
}
