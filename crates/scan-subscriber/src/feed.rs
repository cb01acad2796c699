//! # Event Feed
//!
//! Publishes newline-delimited scan events onto the in-process queue. Each
//! non-blank line is one message; lines are published as-is so that decode
//! failures surface in the delivery adapter like any other bad message.
//!
//! Reading pauses while the subscription backlog is full, so only about
//! `max_backlog` lines are held in memory at once.

use std::path::PathBuf;

use scan_bus::{InMemoryScanQueue, QueueError};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info};

/// Where scan events are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSource {
    Stdin,
    File(PathBuf),
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Failed to read feed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to publish: {0}")]
    Queue(#[from] QueueError),
}

/// Counts for one feed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub published: u64,
    pub skipped: u64,
}

impl FeedSource {
    /// Open the source as a buffered async reader.
    pub async fn open(&self) -> Result<Box<dyn AsyncBufRead + Send + Unpin>, FeedError> {
        let reader: Box<dyn AsyncBufRead + Send + Unpin> = match self {
            Self::Stdin => Box::new(BufReader::new(tokio::io::stdin())),
            Self::File(path) => Box::new(BufReader::new(tokio::fs::File::open(path).await?)),
        };
        Ok(reader)
    }
}

impl std::fmt::Display for FeedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdin => write!(f, "stdin"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Publish every non-blank line of `reader` to `queue`.
pub async fn publish_lines<R>(
    reader: R,
    queue: &InMemoryScanQueue,
) -> Result<FeedStats, FeedError>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = FeedStats::default();
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            stats.skipped += 1;
            continue;
        }
        let id = queue.publish_when_ready(line.as_bytes().to_vec()).await?;
        debug!(message_id = %id, "Published scan event");
        stats.published += 1;
    }

    info!(published = stats.published, skipped = stats.skipped, "Feed exhausted");
    Ok(stats)
}
