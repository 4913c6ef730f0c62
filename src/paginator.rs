//! Incremental pagination: walk a newest-first timeline down to a watermark,
//! normalize what is newer, and replay it oldest-first.

use crate::config::FetchOptions;
use crate::progress::make_fetch_spinner;
use crate::record::{normalize, Record};
use crate::timeline::{TimelineCursor, TimelineSource};
use anyhow::{anyhow, Context, Result};

/// Watermark test on canonical string ids.
///
/// Plain lexicographic order: it agrees with numeric order only when both ids
/// have the same number of digits. Stores rely on this exact behavior.
#[inline]
pub fn is_at_or_below(id: &str, watermark: &str) -> bool {
    id <= watermark
}

/// Records fetched by one run, replayed oldest-first.
pub struct Backlog {
    inner: std::iter::Rev<std::vec::IntoIter<Record>>,
}

impl Backlog {
    fn from_newest_first(records: Vec<Record>) -> Self {
        Self { inner: records.into_iter().rev() }
    }
}

impl Iterator for Backlog {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Backlog {}

/// Drives a `TimelineSource` for incremental fetches.
pub struct Paginator<S> {
    source: S,
    opts: FetchOptions,
}

impl<S: TimelineSource> Paginator<S> {
    pub fn new(source: S, opts: FetchOptions) -> Self {
        Self { source, opts }
    }

    /// Fetch every post strictly newer than `watermark` (or the whole reachable
    /// timeline when there is none), normalized and ordered oldest-first.
    ///
    /// Pages are consumed newest-first; the walk stops at the first post at or
    /// below the watermark, which is discarded along with everything older.
    /// Any request or normalization failure aborts the whole fetch.
    pub fn fetch_since(&mut self, account: &str, watermark: Option<&str>) -> Result<Backlog> {
        let spinner = self.opts.progress.then(|| make_fetch_spinner(account));
        let excerpt_chars = self.opts.excerpt_chars;
        let mut kept: Vec<Record> = Vec::new();

        let cursor = TimelineCursor::new(&mut self.source, account, self.opts.page_size);
        for (i, post) in cursor.enumerate() {
            let post = post.with_context(|| format!("fetching timeline of {}", account))?;

            if let Some(mark) = watermark {
                let id = post
                    .id_str()
                    .ok_or_else(|| anyhow!("post #{} from {} has no id_str", i, account))?;
                if is_at_or_below(id, mark) {
                    tracing::debug!("reached watermark {} at post {}", mark, id);
                    break;
                }
            }

            tracing::info!(
                "[{}] Fetched ({}): {}",
                i,
                post.id().map(|n| n.to_string()).unwrap_or_else(|| post.label()),
                post.excerpt(excerpt_chars)
            );
            kept.push(normalize(post)?);
            if let Some(pb) = &spinner {
                pb.inc(1);
            }
        }

        if let Some(pb) = spinner {
            pb.finish_with_message(format!("{} new posts", kept.len()));
        }
        Ok(Backlog::from_newest_first(kept))
    }
}
