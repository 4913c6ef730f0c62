use crate::config::FetchOptions;
use crate::integrity::{verify_monotonic, OrderReport};
use crate::ndjson::append_all;
use crate::paginator::Paginator;
use crate::reprocess::reprocess;
use crate::resume::resolve_watermark;
use crate::timeline::{HttpTimeline, TimelineSource};
use crate::util::init_tracing_once;
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default store file name.
pub const DEFAULT_STORE: &str = "out.jsons";

/// Outcome of one incremental fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchSummary {
    /// Watermark the run resumed after (`None` for a full backfill).
    pub watermark: Option<String>,
    /// Records appended to the store.
    pub appended: u64,
}

/// One account store plus the options used to fill and maintain it.
///
/// ```no_run
/// use timeline_archive::TimelineArchive;
///
/// let summary = TimelineArchive::new().store("shazow.jsons").fetch("shazow")?;
/// println!("{} new posts", summary.appended);
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Clone, Debug)]
pub struct TimelineArchive {
    pub(crate) opts: FetchOptions,
    pub(crate) store: PathBuf,
    pub(crate) watermark: Option<String>,
}

impl Default for TimelineArchive {
    fn default() -> Self {
        Self::new()
    }
}

impl TimelineArchive {
    /// Options from the environment, store `out.jsons`, watermark from the store.
    pub fn new() -> Self {
        Self { opts: FetchOptions::from_env(), store: PathBuf::from(DEFAULT_STORE), watermark: None }
    }

    // -------- Builder methods --------
    pub fn options(mut self, opts: FetchOptions) -> Self { self.opts = opts; self }
    pub fn store(mut self, path: impl AsRef<Path>) -> Self { self.store = path.as_ref().to_path_buf(); self }
    /// Resume after this id instead of the store's last record.
    pub fn watermark(mut self, id: impl Into<String>) -> Self { self.watermark = Some(id.into()); self }
    pub fn api_base(mut self, base: impl AsRef<str>) -> Self { self.opts = self.opts.with_api_base(base); self }
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self { self.opts = self.opts.with_bearer_token(token); self }
    pub fn page_size(mut self, n: usize) -> Self { self.opts = self.opts.with_page_size(n); self }
    pub fn retries(mut self, n: u32) -> Self { self.opts = self.opts.with_retry_count(n); self }
    pub fn retry_delay(mut self, delay: Duration) -> Self { self.opts = self.opts.with_retry_delay(delay); self }
    pub fn request_timeout(mut self, timeout: Duration) -> Self { self.opts = self.opts.with_request_timeout(timeout); self }
    pub fn progress(mut self, yes: bool) -> Self { self.opts = self.opts.with_progress(yes); self }
    pub fn io_buffers(mut self, read_bytes: usize, write_bytes: usize) -> Self { self.opts = self.opts.with_io_buffers(read_bytes, write_bytes); self }

    pub fn store_path(&self) -> &Path {
        &self.store
    }

    // -------- Operations --------

    /// Fetch new posts for `account` over HTTP and append them to the store.
    pub fn fetch(self, account: &str) -> Result<FetchSummary> {
        let source = HttpTimeline::new(&self.opts)?;
        self.fetch_with(account, source)
    }

    /// Same as `fetch`, against any timeline source.
    ///
    /// Resolves the watermark, pulls everything newer, and appends it
    /// oldest-first. Running it again with nothing new leaves the store as is.
    pub fn fetch_with<S: TimelineSource>(self, account: &str, source: S) -> Result<FetchSummary> {
        init_tracing_once();
        let read_buf = self.opts.read_buffer_bytes;
        let write_buf = self.opts.write_buffer_bytes;

        let watermark = resolve_watermark(self.watermark.as_deref(), &self.store, read_buf)?;
        let backlog = Paginator::new(source, self.opts).fetch_since(account, watermark.as_deref())?;
        let appended = append_all(backlog, &self.store, write_buf)?;

        tracing::info!("{} new posts appended to {}", appended, self.store.display());
        Ok(FetchSummary { watermark, appended })
    }

    /// Report out-of-order or malformed records in the store.
    pub fn verify(self) -> Result<Vec<OrderReport>> {
        init_tracing_once();
        verify_monotonic(&self.store, self.opts.read_buffer_bytes)
    }

    /// Re-prune every record of the store into `output`. Returns records written.
    pub fn reprocess_to(self, output: &Path) -> Result<u64> {
        init_tracing_once();
        reprocess(&self.store, output, self.opts.read_buffer_bytes, self.opts.progress)
    }
}
