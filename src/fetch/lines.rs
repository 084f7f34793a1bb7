//! Partial-line buffering over child process output.
//!
//! The fetch tool interleaves progress updates, diagnostics, and page noise
//! on its output pipes, and chunks arriving from the pipe do not respect
//! line boundaries. `LineBuffer` turns raw byte chunks into complete lines;
//! `LineReader` drives it from an async stream with a bounded wait per poll,
//! so the caller stays responsive to process exit between reads.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};

const READ_CHUNK: usize = 4096;

/// Cap on zero-wait reads per poll, so one cycle stays bounded.
const MAX_CHUNKS_PER_POLL: usize = 64;

/// Accumulates raw bytes and yields complete lines.
///
/// The trailing incomplete fragment is retained between pushes and only
/// flushed by [`LineBuffer::finish`] when the stream ends.
#[derive(Debug, Default)]
pub struct LineBuffer {
    partial: Vec<u8>,
}

impl LineBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return the complete lines it produced.
    ///
    /// Lines are split on `\n`; a trailing `\r` is dropped. Invalid UTF-8 is
    /// replaced rather than rejected, since the fetch tool's output encoding
    /// is not guaranteed.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.partial.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.partial.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.partial.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Flush the retained fragment as a final line, if non-empty.
    pub fn finish(&mut self) -> Option<String> {
        if self.partial.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.partial).into_owned();
        self.partial.clear();
        Some(line)
    }

    /// Number of buffered bytes awaiting a line terminator.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.partial.len()
    }
}

/// Result of one [`LineReader::poll`] cycle.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PollOutcome {
    /// Complete lines that arrived during this poll, possibly none.
    pub lines: Vec<String>,
    /// True once the underlying stream has ended.
    pub eof: bool,
}

/// Non-blocking line reader over an async byte stream.
///
/// Each poll reads whatever is currently available within a bounded wait.
/// A wait that elapses with no data is a normal empty outcome, never an
/// error; so is an `ErrorKind::WouldBlock` from the underlying stream.
#[derive(Debug)]
pub struct LineReader<R> {
    inner: R,
    buffer: LineBuffer,
    eof: bool,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    /// Wrap a stream.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buffer: LineBuffer::new(),
            eof: false,
        }
    }

    /// True once end-of-stream has been observed.
    #[must_use]
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Read whatever arrives within `wait` and return the complete lines.
    ///
    /// On end-of-stream the retained fragment is flushed as a final line.
    /// Polling after end-of-stream keeps returning an empty `eof` outcome.
    ///
    /// # Errors
    ///
    /// Returns underlying I/O errors other than would-block.
    pub async fn poll(&mut self, wait: Duration) -> std::io::Result<PollOutcome> {
        if self.eof {
            return Ok(PollOutcome {
                lines: Vec::new(),
                eof: true,
            });
        }

        let mut chunk = [0u8; READ_CHUNK];
        let mut lines = match tokio::time::timeout(wait, self.inner.read(&mut chunk)).await {
            // No data within the wait: a normal quiet cycle.
            Err(_) => return Ok(PollOutcome::default()),
            Ok(Ok(0)) => {
                self.eof = true;
                let lines = self.buffer.finish().into_iter().collect();
                return Ok(PollOutcome { lines, eof: true });
            }
            Ok(Ok(n)) => self.buffer.push(&chunk[..n]),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::WouldBlock => {
                return Ok(PollOutcome::default())
            }
            Ok(Err(e)) => return Err(e),
        };

        // Keep draining whatever is already buffered in the pipe, bounded so
        // a firehose cannot stall the caller's loop.
        for _ in 0..MAX_CHUNKS_PER_POLL {
            match tokio::time::timeout(Duration::ZERO, self.inner.read(&mut chunk)).await {
                Ok(Ok(0)) => {
                    self.eof = true;
                    lines.extend(self.buffer.finish());
                    return Ok(PollOutcome { lines, eof: true });
                }
                Ok(Ok(n)) => lines.extend(self.buffer.push(&chunk[..n])),
                _ => break,
            }
        }
        Ok(PollOutcome { lines, eof: false })
    }

    /// Drain remaining output after the process has exited.
    ///
    /// Keeps polling until end-of-stream or `deadline` elapses; if the
    /// deadline is hit first (a grandchild still holding the pipe open), the
    /// retained fragment is flushed so no captured text is lost.
    ///
    /// # Errors
    ///
    /// Returns underlying I/O errors other than would-block.
    pub async fn drain(&mut self, deadline: Duration) -> std::io::Result<Vec<String>> {
        let start = std::time::Instant::now();
        let mut lines = Vec::new();

        while !self.eof && start.elapsed() < deadline {
            let outcome = self.poll(Duration::from_millis(50)).await?;
            lines.extend(outcome.lines);
        }
        if !self.eof {
            lines.extend(self.buffer.finish());
        }
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_splits_complete_lines() {
        let mut buffer = LineBuffer::new();
        let lines = buffer.push(b"one\ntwo\nthr");
        assert_eq!(lines, vec!["one".to_string(), "two".to_string()]);
        assert_eq!(buffer.pending(), 3);
    }

    #[test]
    fn test_buffer_joins_partial_chunks() {
        let mut buffer = LineBuffer::new();
        assert!(buffer.push(b"hel").is_empty());
        assert!(buffer.push(b"lo wor").is_empty());
        let lines = buffer.push(b"ld\n");
        assert_eq!(lines, vec!["hello world".to_string()]);
        assert_eq!(buffer.pending(), 0);
    }

    #[test]
    fn test_buffer_strips_carriage_return() {
        let mut buffer = LineBuffer::new();
        let lines = buffer.push(b"progress\r\nnext\n");
        assert_eq!(lines, vec!["progress".to_string(), "next".to_string()]);
    }

    #[test]
    fn test_buffer_finish_flushes_fragment() {
        let mut buffer = LineBuffer::new();
        buffer.push(b"no newline");
        assert_eq!(buffer.finish(), Some("no newline".to_string()));
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn test_buffer_finish_empty() {
        let mut buffer = LineBuffer::new();
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn test_buffer_lossy_utf8() {
        let mut buffer = LineBuffer::new();
        let lines = buffer.push(b"bad \xff byte\n");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("bad "));
    }

    #[tokio::test]
    async fn test_reader_yields_lines_then_eof() {
        // A slice source is exhausted in one poll: all complete lines come
        // back, the fragment is flushed as a final line, and eof is set.
        let data: &[u8] = b"first\nsecond\ntail";
        let mut reader = LineReader::new(data);

        let outcome = reader.poll(Duration::from_millis(100)).await.unwrap();
        assert_eq!(
            outcome.lines,
            vec![
                "first".to_string(),
                "second".to_string(),
                "tail".to_string()
            ]
        );
        assert!(outcome.eof);
        assert!(reader.is_eof());
    }

    #[tokio::test]
    async fn test_reader_poll_after_eof_is_empty() {
        let data: &[u8] = b"only\n";
        let mut reader = LineReader::new(data);
        while !reader.is_eof() {
            reader.poll(Duration::from_millis(100)).await.unwrap();
        }
        let outcome = reader.poll(Duration::from_millis(100)).await.unwrap();
        assert!(outcome.lines.is_empty());
        assert!(outcome.eof);
    }

    #[tokio::test]
    async fn test_reader_no_data_is_not_an_error() {
        // A duplex stream with a live writer that never writes: the poll
        // wait elapses and yields an empty outcome.
        let (_writer, read_half) = tokio::io::duplex(64);
        let mut reader = LineReader::new(read_half);

        let outcome = reader.poll(Duration::from_millis(20)).await.unwrap();
        assert!(outcome.lines.is_empty());
        assert!(!outcome.eof);
    }

    #[tokio::test]
    async fn test_reader_picks_up_late_data() {
        use tokio::io::AsyncWriteExt;

        let (mut writer, read_half) = tokio::io::duplex(64);
        let mut reader = LineReader::new(read_half);

        let outcome = reader.poll(Duration::from_millis(10)).await.unwrap();
        assert!(outcome.lines.is_empty());

        writer.write_all(b"late line\n").await.unwrap();
        let outcome = reader.poll(Duration::from_millis(100)).await.unwrap();
        assert_eq!(outcome.lines, vec!["late line".to_string()]);
    }

    #[tokio::test]
    async fn test_drain_collects_remaining_output() {
        let data: &[u8] = b"a\nb\nc";
        let mut reader = LineReader::new(data);
        let lines = reader.drain(Duration::from_secs(1)).await.unwrap();
        assert_eq!(
            lines,
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
        assert!(reader.is_eof());
    }

    #[tokio::test]
    async fn test_drain_deadline_flushes_fragment() {
        use tokio::io::AsyncWriteExt;

        let (mut writer, read_half) = tokio::io::duplex(64);
        let mut reader = LineReader::new(read_half);
        writer.write_all(b"stuck fragment").await.unwrap();

        // Writer stays open, so no EOF arrives; the deadline flushes.
        let lines = reader.drain(Duration::from_millis(120)).await.unwrap();
        assert_eq!(lines, vec!["stuck fragment".to_string()]);
    }
}
