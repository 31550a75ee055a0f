//! Cursor pagination with loop and size protection.
//!
//! [`walk`] turns a page-fetching function into a lazy stream of filtered
//! batches. After every page the stop conditions are checked in a fixed
//! order: no next cursor, a cursor already seen, the page cap, the item cap,
//! then the elapsed-time cap. A safety stop is not an error; whatever was
//! fetched up to that point has already been yielded. A fetch error is
//! yielded once and ends the stream. Nothing here retries.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, Stream, TryStreamExt};
use threadnote_core::{Clock, Page, SyncError};

/// Safety caps for one walk. `None` disables a cap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageLimits {
    pub max_pages: Option<u32>,
    pub max_items: Option<usize>,
    pub max_elapsed: Option<Duration>,
}

impl PageLimits {
    /// Caps used when walking an account's full history.
    #[must_use]
    pub fn backfill() -> Self {
        Self {
            max_pages: Some(500),
            max_items: None,
            max_elapsed: Some(Duration::from_secs(30 * 60)),
        }
    }

    #[must_use]
    pub fn items(max_items: usize) -> Self {
        Self {
            max_items: Some(max_items),
            ..Self::default()
        }
    }
}

/// Why a walk ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Exhausted,
    CursorCycle,
    MaxPages,
    MaxItems,
    MaxElapsed,
}

struct WalkState<F, K> {
    fetch: F,
    keep: K,
    cursor: Option<String>,
    seen: HashSet<String>,
    pages: u32,
    items: usize,
    started: DateTime<Utc>,
    clock: Arc<dyn Clock>,
    limits: PageLimits,
    done: bool,
}

impl<F, K> WalkState<F, K> {
    /// Decides whether to continue after a page. On continue, records and
    /// returns nothing; on stop, returns the reason.
    fn stop_reason(&mut self, next_cursor: Option<String>) -> Option<StopReason> {
        let Some(next) = next_cursor else {
            return Some(StopReason::Exhausted);
        };
        if !self.seen.insert(next.clone()) {
            tracing::warn!(cursor = %next, pages = self.pages, "pagination cursor repeated, stopping");
            return Some(StopReason::CursorCycle);
        }
        if self.limits.max_pages.is_some_and(|max| self.pages >= max) {
            return Some(StopReason::MaxPages);
        }
        if self.limits.max_items.is_some_and(|max| self.items >= max) {
            return Some(StopReason::MaxItems);
        }
        if let Some(max) = self.limits.max_elapsed {
            let elapsed = (self.clock.now() - self.started)
                .to_std()
                .unwrap_or(Duration::ZERO);
            if elapsed >= max {
                return Some(StopReason::MaxElapsed);
            }
        }
        self.cursor = Some(next);
        None
    }
}

/// Walks a cursor-paginated listing starting at `start`.
///
/// Each yielded batch holds the items of one page that pass `keep`,
/// truncated so the total never exceeds `limits.max_items`.
pub fn walk<T, F, Fut, K>(
    fetch: F,
    start: Option<String>,
    limits: PageLimits,
    clock: Arc<dyn Clock>,
    keep: K,
) -> impl Stream<Item = Result<Vec<T>, SyncError>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>, SyncError>>,
    K: Fn(&T) -> bool,
{
    let started = clock.now();
    let state = WalkState {
        fetch,
        keep,
        seen: start.iter().cloned().collect(),
        cursor: start,
        pages: 0,
        items: 0,
        started,
        clock,
        limits,
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        if state.done {
            return None;
        }
        let page = match (state.fetch)(state.cursor.clone()).await {
            Ok(page) => page,
            Err(err) => {
                state.done = true;
                return Some((Err(err), state));
            }
        };
        state.pages += 1;

        let mut batch: Vec<T> = page.items.into_iter().filter(|i| (state.keep)(i)).collect();
        if let Some(max) = state.limits.max_items {
            batch.truncate(max.saturating_sub(state.items));
        }
        state.items += batch.len();

        if let Some(reason) = state.stop_reason(page.next_cursor) {
            tracing::debug!(?reason, pages = state.pages, items = state.items, "pagination finished");
            state.done = true;
        }
        Some((Ok(batch), state))
    })
}

/// Drains a walk into one vector, failing on the first fetch error.
///
/// # Errors
///
/// Returns the fetch error that ended the walk, if any.
pub async fn collect_all<T, S>(batches: S) -> Result<Vec<T>, SyncError>
where
    S: Stream<Item = Result<Vec<T>, SyncError>>,
{
    let batches: Vec<Vec<T>> = batches.try_collect().await?;
    Ok(batches.into_iter().flatten().collect())
}

#[cfg(test)]
#[path = "paginate_test.rs"]
mod tests;
