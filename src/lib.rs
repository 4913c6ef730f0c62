//! Incremental, resumable archiving of an account's post timeline into an
//! append-only JSON-lines store.
//!
//! A run resolves a watermark (explicit, or the last record already stored),
//! walks the remote timeline newest-first until it reaches that watermark,
//! normalizes every newer post, and appends them to the store oldest-first.
//! Offline helpers re-prune an existing store and check id ordering.

mod archive;
mod config;
mod integrity;
mod ndjson;
mod paginator;
mod post;
mod progress;
mod record;
mod reprocess;
mod resume;
mod timeline;
mod util;

pub use crate::archive::{FetchSummary, TimelineArchive, DEFAULT_STORE};
pub use crate::config::{FetchOptions, DEFAULT_API_BASE, DEFAULT_PAGE_SIZE};
pub use crate::post::Post;

// Normalizer.
pub use crate::record::{is_falsy, normalize, parse_created_at, prune_keys, Record, CREATED_AT, DENYLIST, ID_STR, LINK_SUFFIX};

// Remote timeline seam and the incremental paginator.
pub use crate::paginator::{is_at_or_below, Backlog, Paginator};
pub use crate::timeline::{max_id_before, page_from_json, HttpTimeline, Page, PageCursor, TimelineCursor, TimelineSource};

// Store I/O, resume and offline utilities.
pub use crate::integrity::{verify_monotonic, OrderReport, Problem};
pub use crate::ndjson::{append_all, for_each_line, parse_record, NdjsonReader, NdjsonWriter};
pub use crate::reprocess::reprocess;
pub use crate::resume::{last_record, resolve_watermark};

// Logging setup for binaries.
pub use crate::util::{init_tracing, level_for_verbosity};
