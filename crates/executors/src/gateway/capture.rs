//! Incremental draining of a child's output pipes.
//!
//! Each pipe is read line by line on its own task as the child writes it into
//! a buffer shared with the gateway, so whatever a worker printed before
//! crashing or being killed is still available afterwards, even when a
//! leftover grandchild keeps the pipe open.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    task::JoinHandle,
};

/// How long to wait for a pipe to reach EOF after the child is gone.
const DRAIN_GRACE: Duration = Duration::from_secs(5);

/// Bytes of stderr retained; older output is discarded as new lines arrive.
pub(crate) const STDERR_RETAINED_BYTES: usize = 16 * 1024;

#[derive(Debug, Clone, Copy)]
pub(crate) enum Pipe {
    Stdout,
    Stderr,
}

impl Pipe {
    fn retained_bytes(self) -> Option<usize> {
        match self {
            Pipe::Stdout => None,
            Pipe::Stderr => Some(STDERR_RETAINED_BYTES),
        }
    }
}

#[derive(Debug, Default)]
struct Buffer {
    bytes: Vec<u8>,
    limit: Option<usize>,
}

impl Buffer {
    fn push(&mut self, line: &[u8]) {
        self.bytes.extend_from_slice(line);
        if let Some(limit) = self.limit {
            if self.bytes.len() > limit {
                let excess = self.bytes.len() - limit;
                self.bytes.drain(..excess);
            }
        }
    }
}

type Shared = Arc<Mutex<Buffer>>;

fn snapshot(shared: &Shared) -> String {
    let buffer = shared.lock().unwrap_or_else(PoisonError::into_inner);
    String::from_utf8_lossy(&buffer.bytes).into_owned()
}

pub(crate) struct Capture {
    shared: Shared,
    handle: JoinHandle<()>,
}

impl Capture {
    pub(crate) fn spawn<R>(reader: R, pipe: Pipe, program: String) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let shared: Shared = Arc::new(Mutex::new(Buffer {
            bytes: Vec::new(),
            limit: pipe.retained_bytes(),
        }));
        let sink = shared.clone();
        let handle = tokio::spawn(async move {
            let mut reader = BufReader::new(reader);
            let mut line = Vec::new();
            loop {
                line.clear();
                match reader.read_until(b'\n', &mut line).await {
                    Ok(0) => break,
                    Ok(_) => {
                        if let Pipe::Stderr = pipe {
                            tracing::debug!(
                                "[{}] {}",
                                program,
                                String::from_utf8_lossy(&line).trim_end()
                            );
                        }
                        sink.lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .push(&line);
                    }
                    Err(e) => {
                        tracing::warn!("Failed reading {:?} of worker {}: {}", pipe, program, e);
                        break;
                    }
                }
            }
        });
        Self { shared, handle }
    }

    /// Everything read so far, once the pipe closes or the grace period ends.
    pub(crate) async fn finish(self) -> String {
        self.finish_within(DRAIN_GRACE).await
    }

    async fn finish_within(mut self, grace: Duration) -> String {
        match tokio::time::timeout(grace, &mut self.handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("Worker output reader task failed: {}", e),
            Err(_) => {
                tracing::warn!("Worker output pipe still open after exit; keeping partial output");
                self.handle.abort();
            }
        }
        snapshot(&self.shared)
    }
}

pub(crate) async fn finish(capture: Option<Capture>) -> String {
    match capture {
        Some(capture) => capture.finish().await,
        None => String::new(),
    }
}

/// First `max` characters of `s`, marking the cut.
pub(crate) fn head(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...[truncated]", &s[..idx]),
        None => s.to_string(),
    }
}

/// Last `max` characters of `s`, marking the cut.
pub(crate) fn tail(s: &str, max: usize) -> String {
    let count = s.chars().count();
    if count <= max {
        return s.to_string();
    }
    match s.char_indices().nth(count - max) {
        Some((idx, _)) => format!("[truncated]...{}", &s[idx..]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_head_and_tail_respect_char_boundaries() {
        assert_eq!(head("층호수", 2), "층호...[truncated]");
        assert_eq!(head("abc", 5), "abc");
        assert_eq!(tail("층호수", 1), "[truncated]...수");
        assert_eq!(tail("abc", 3), "abc");
    }

    #[tokio::test]
    async fn test_capture_collects_all_lines() {
        let input: &[u8] = b"first\nsecond\nno newline";
        let capture = Capture::spawn(input, Pipe::Stdout, "test".into());
        assert_eq!(capture.finish().await, "first\nsecond\nno newline");
    }

    #[tokio::test]
    async fn test_missing_pipe_yields_empty_output() {
        assert_eq!(finish(None).await, "");
    }

    #[tokio::test]
    async fn test_open_pipe_keeps_partial_output() {
        let (mut writer, reader) = tokio::io::duplex(64);
        tokio::io::AsyncWriteExt::write_all(&mut writer, b"model load error\n")
            .await
            .unwrap();
        let capture = Capture::spawn(reader, Pipe::Stderr, "test".into());
        tokio::time::sleep(Duration::from_millis(50)).await;

        // writer is still alive, so the pipe never reaches EOF
        let output = capture.finish_within(Duration::from_millis(100)).await;
        assert_eq!(output, "model load error\n");
        drop(writer);
    }

    #[tokio::test]
    async fn test_stderr_keeps_only_recent_output() {
        let mut input = Vec::new();
        for i in 0..5_000 {
            input.extend_from_slice(format!("line {i:05}\n").as_bytes());
        }
        let capture = Capture::spawn(std::io::Cursor::new(input), Pipe::Stderr, "test".into());
        let output = capture.finish().await;
        assert!(output.len() <= STDERR_RETAINED_BYTES);
        assert!(output.ends_with("line 04999\n"));
        assert!(!output.contains("line 00000"));
    }
}
