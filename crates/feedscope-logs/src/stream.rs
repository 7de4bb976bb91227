use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::buffer::LogBuffer;
use crate::error::Result;
use crate::parser::LogParser;

/// How often a followed file is polled for new lines after EOF
const FOLLOW_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Where log lines come from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogSource {
    Stdin,
    /// A file, optionally followed for new lines like `tail -f`
    File { path: PathBuf, follow: bool },
}

impl LogSource {
    fn name(&self) -> String {
        match self {
            Self::Stdin => "stdin".to_string(),
            Self::File { path, .. } => path.display().to_string(),
        }
    }
}

/// Manages ingestion tasks feeding a log buffer
pub struct LogStreamManager {
    /// Cancellation token for stopping streams
    cancel: CancellationToken,

    /// Active stream task handles
    tasks: Vec<JoinHandle<Result<u64>>>,

    /// Lines parsed across all streams
    lines_read: Arc<AtomicU64>,
}

impl LogStreamManager {
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
            lines_read: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Start streaming a source into the buffer
    pub fn start(&mut self, source: LogSource, buffer: LogBuffer) {
        let cancel = self.cancel.clone();
        let lines_read = Arc::clone(&self.lines_read);

        let task = tokio::spawn(stream_source(source, buffer, cancel, lines_read));
        self.tasks.push(task);
    }

    /// Stream lines from any buffered reader into the buffer
    pub fn start_reader<R>(&mut self, reader: R, buffer: LogBuffer)
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let cancel = self.cancel.clone();
        let lines_read = Arc::clone(&self.lines_read);
        self.tasks.push(tokio::spawn(read_lines(
            reader, false, buffer, cancel, lines_read,
        )));
    }

    /// Wait for every stream to end, returning the total lines ingested
    ///
    /// Followed files never end on their own; call [`stop`](Self::stop) or
    /// cancel first.
    pub async fn wait(&mut self) -> Result<u64> {
        let mut total = 0;
        for task in self.tasks.drain(..) {
            match task.await {
                Ok(Ok(count)) => total += count,
                Ok(Err(e)) => return Err(e),
                Err(e) => tracing::warn!("Log stream task failed: {}", e),
            }
        }
        Ok(total)
    }

    /// Stop all streams
    pub fn stop(&mut self) {
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            task.abort();
        }
        // Create a fresh cancellation token for future streams
        self.cancel = CancellationToken::new();
    }

    /// Check if any streams are still running
    pub fn is_running(&self) -> bool {
        self.tasks.iter().any(|t| !t.is_finished())
    }

    /// Get the number of active streams
    pub fn active_count(&self) -> usize {
        self.tasks.iter().filter(|t| !t.is_finished()).count()
    }

    /// Lines ingested so far across all streams
    pub fn lines_read(&self) -> u64 {
        self.lines_read.load(Ordering::Relaxed)
    }
}

impl Default for LogStreamManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LogStreamManager {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn stream_source(
    source: LogSource,
    buffer: LogBuffer,
    cancel: CancellationToken,
    lines_read: Arc<AtomicU64>,
) -> Result<u64> {
    let name = source.name();
    tracing::debug!(source = %name, "Starting log stream");

    let count = match source {
        LogSource::Stdin => {
            let reader = BufReader::new(tokio::io::stdin());
            read_lines(reader, false, buffer, cancel, lines_read).await?
        }
        LogSource::File { path, follow } => {
            let file = tokio::fs::File::open(&path).await?;
            read_lines(BufReader::new(file), follow, buffer, cancel, lines_read).await?
        }
    };

    tracing::debug!(source = %name, lines = count, "Log stream finished");
    Ok(count)
}

async fn read_lines<R>(
    mut reader: R,
    follow: bool,
    buffer: LogBuffer,
    cancel: CancellationToken,
    lines_read: Arc<AtomicU64>,
) -> Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let mut parser = LogParser::new();
    let mut line = String::new();
    let mut count = 0;

    loop {
        let read = tokio::select! {
            _ = cancel.cancelled() => break,
            read = reader.read_line(&mut line) => read?,
        };

        if read == 0 {
            if !follow {
                break;
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(FOLLOW_POLL_INTERVAL) => continue,
            }
        }

        // A followed file may end mid-line; wait for the rest
        if follow && !line.ends_with('\n') {
            continue;
        }

        if let Some(record) = parser.parse(&line) {
            buffer.push(record);
            count += 1;
            lines_read.fetch_add(1, Ordering::Relaxed);
        }
        line.clear();
    }

    Ok(count)
}
