//! Paged, rate-limited iteration over remote index ranges.
//!
//! [`BatchRanges`] splits `[0, count-1]` into inclusive pages of at most
//! `batch_size` indices, walking either up from zero or down from the top.
//! [`BatchFetcher::pages`] wraps that in a paced cursor that sleeps for the
//! configured delay between consecutive pages, waking early if the sync
//! cycle is cancelled.
//!
//! ```
//! use allowlist_sync::fetcher::{BatchRange, BatchRanges, Direction};
//!
//! let down: Vec<_> = BatchRanges::new(25, 10, Direction::Descending).collect();
//! assert_eq!(down, vec![
//!     BatchRange { start: 15, end: 24 },
//!     BatchRange { start: 5, end: 14 },
//!     BatchRange { start: 0, end: 4 },
//! ]);
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("sync cycle cancelled")]
pub struct Cancelled;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Lowest indices first
    Ascending,
    /// Highest indices first
    Descending,
}

/// Inclusive index range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchRange {
    pub start: u64,
    pub end: u64,
}

impl BatchRange {
    /// Number of indices covered.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.end - self.start + 1
    }
}

impl fmt::Display for BatchRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// Iterator over the pages covering `[0, count-1]`.
#[derive(Debug, Clone)]
pub struct BatchRanges {
    batch_size: u64,
    direction: Direction,
    /// Ascending: next start. Descending: exclusive upper bound of the next page.
    cursor: u64,
    count: u64,
}

impl BatchRanges {
    #[must_use]
    pub fn new(count: u64, batch_size: u64, direction: Direction) -> Self {
        let cursor = match direction {
            Direction::Ascending => 0,
            Direction::Descending => count,
        };
        Self { batch_size, direction, cursor, count }
    }
}

impl Iterator for BatchRanges {
    type Item = BatchRange;

    fn next(&mut self) -> Option<BatchRange> {
        if self.batch_size == 0 {
            return None;
        }
        match self.direction {
            Direction::Ascending => {
                if self.cursor >= self.count {
                    return None;
                }
                let start = self.cursor;
                let end = start.saturating_add(self.batch_size - 1).min(self.count - 1);
                self.cursor = end + 1;
                Some(BatchRange { start, end })
            }
            Direction::Descending => {
                if self.cursor == 0 {
                    return None;
                }
                let end = self.cursor - 1;
                let start = self.cursor.saturating_sub(self.batch_size);
                self.cursor = start;
                Some(BatchRange { start, end })
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.batch_size == 0 {
            return (0, Some(0));
        }
        let left = match self.direction {
            Direction::Ascending => self.count.saturating_sub(self.cursor),
            Direction::Descending => self.cursor,
        };
        let pages = left.div_ceil(self.batch_size) as usize;
        (pages, Some(pages))
    }
}

/// Page size plus inter-page delay for one sync cycle.
///
/// Pacing is shared by every cursor handed out by [`pages`](Self::pages):
/// once any range has been issued, each later one waits the delay first,
/// even when it belongs to a different walk. Build a fresh fetcher per cycle.
#[derive(Debug)]
pub struct BatchFetcher {
    batch_size: u64,
    delay: Duration,
    issued: AtomicBool,
}

impl BatchFetcher {
    #[must_use]
    pub fn new(batch_size: u64, delay: Duration) -> Self {
        Self { batch_size, delay, issued: AtomicBool::new(false) }
    }

    #[must_use]
    pub fn batch_size(&self) -> u64 {
        self.batch_size
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Paced cursor over the pages of `[0, count-1]`.
    pub fn pages<'a>(&'a self, count: u64, direction: Direction, cancel: &'a CancellationToken) -> PagedRanges<'a> {
        PagedRanges {
            ranges: BatchRanges::new(count, self.batch_size, direction),
            fetcher: self,
            cancel,
        }
    }
}

/// Async cursor returned by [`BatchFetcher::pages`].
pub struct PagedRanges<'a> {
    ranges: BatchRanges,
    fetcher: &'a BatchFetcher,
    cancel: &'a CancellationToken,
}

impl PagedRanges<'_> {
    /// Next page, after sleeping the inter-batch delay if the fetcher already handed one out.
    pub async fn next_range(&mut self) -> Result<Option<BatchRange>, Cancelled> {
        if self.cancel.is_cancelled() {
            return Err(Cancelled);
        }
        let Some(range) = self.ranges.next() else {
            return Ok(None);
        };
        let delay = self.fetcher.delay;
        if self.fetcher.issued.load(Ordering::Acquire) && !delay.is_zero() {
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
        self.fetcher.issued.store(true, Ordering::Release);
        Ok(Some(range))
    }
}
