//! The remote timeline seam: a page-level `TimelineSource` trait, the item-level
//! `TimelineCursor` that walks pages on demand, and the blocking HTTP source.

use crate::config::FetchOptions;
use crate::post::Post;
use anyhow::{anyhow, bail, Context, Result};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde_json::Value;
use std::thread::sleep;

/// Opaque position for the next (older) page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageCursor(pub String);

/// One page of posts, newest first, plus where the next older page starts.
/// `next == None` means the timeline has no older page.
#[derive(Clone, Debug, Default)]
pub struct Page {
    pub posts: Vec<Post>,
    pub next: Option<PageCursor>,
}

/// A paged, newest-first view of an account's posts.
///
/// Implementations own their retry policy; an `Err` means retries are exhausted.
pub trait TimelineSource {
    fn fetch_page(&mut self, account: &str, cursor: Option<&PageCursor>, count: usize) -> Result<Page>;
}

impl<S: TimelineSource + ?Sized> TimelineSource for &mut S {
    fn fetch_page(&mut self, account: &str, cursor: Option<&PageCursor>, count: usize) -> Result<Page> {
        (**self).fetch_page(account, cursor, count)
    }
}

/// Item-level iterator over a timeline. Pages are requested lazily, so a
/// consumer that stops early never triggers further requests.
pub struct TimelineCursor<'s, S: ?Sized> {
    source: &'s mut S,
    account: String,
    page_size: usize,
    buf: std::vec::IntoIter<Post>,
    next: Option<PageCursor>,
    started: bool,
    done: bool,
}

impl<'s, S: TimelineSource + ?Sized> TimelineCursor<'s, S> {
    pub fn new(source: &'s mut S, account: impl Into<String>, page_size: usize) -> Self {
        Self {
            source,
            account: account.into(),
            page_size: page_size.max(1),
            buf: Vec::new().into_iter(),
            next: None,
            started: false,
            done: false,
        }
    }
}

impl<'s, S: TimelineSource + ?Sized> Iterator for TimelineCursor<'s, S> {
    type Item = Result<Post>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(p) = self.buf.next() {
                return Some(Ok(p));
            }
            if self.done || (self.started && self.next.is_none()) {
                self.done = true;
                return None;
            }
            self.started = true;
            tracing::debug!(account = %self.account, cursor = ?self.next, "requesting timeline page");
            match self.source.fetch_page(&self.account, self.next.as_ref(), self.page_size) {
                Ok(page) => {
                    if page.posts.is_empty() {
                        self.done = true;
                        return None;
                    }
                    self.next = page.next;
                    self.buf = page.posts.into_iter();
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

// ----------------------------- HTTP source ------------------------------------

enum Attempt {
    Retry(anyhow::Error),
    Fatal(anyhow::Error),
}

/// Blocking HTTP client for the `statuses/user_timeline` endpoint.
/// Pages by id: each request asks for posts at or below `max_id`.
pub struct HttpTimeline {
    client: Client,
    opts: FetchOptions,
}

impl HttpTimeline {
    pub fn new(opts: &FetchOptions) -> Result<Self> {
        let client = Client::builder()
            .timeout(opts.request_timeout)
            .user_agent(concat!("timeline-archive/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("building HTTP client")?;
        Ok(Self { client, opts: opts.clone() })
    }

    fn endpoint(&self) -> String {
        format!("{}/statuses/user_timeline.json", self.opts.api_base)
    }

    fn try_once(&self, params: &[(&str, String)]) -> std::result::Result<Value, Attempt> {
        let mut req = self.client.get(self.endpoint()).query(params);
        if let Some(token) = &self.opts.bearer_token {
            req = req.bearer_auth(token);
        }

        let resp = req
            .send()
            .map_err(|e| Attempt::Retry(anyhow::Error::new(e).context("sending timeline request")))?;
        let status = resp.status();
        if status.is_success() {
            return resp
                .json::<Value>()
                .map_err(|e| Attempt::Retry(anyhow::Error::new(e).context("decoding timeline page")));
        }

        let body: String = resp.text().unwrap_or_default().chars().take(300).collect();
        let err = anyhow!("timeline request failed ({}): {}", status, body);
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            Err(Attempt::Retry(err))
        } else {
            Err(Attempt::Fatal(err))
        }
    }

    /// GET one page, retrying transient failures `retry_count` times with a fixed delay.
    fn get_with_retries(&self, params: &[(&str, String)]) -> Result<Value> {
        let attempts = self.opts.retry_count.saturating_add(1);
        let mut last_err: Option<anyhow::Error> = None;
        for attempt in 1..=attempts {
            match self.try_once(params) {
                Ok(v) => return Ok(v),
                Err(Attempt::Fatal(e)) => return Err(e),
                Err(Attempt::Retry(e)) => {
                    if attempt < attempts {
                        tracing::warn!(
                            "timeline request attempt {}/{} failed: {:#}; retrying in {:?}",
                            attempt,
                            attempts,
                            e,
                            self.opts.retry_delay
                        );
                        sleep(self.opts.retry_delay);
                    }
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow!("timeline request failed")))
            .with_context(|| format!("giving up after {} attempts", attempts))
    }
}

impl TimelineSource for HttpTimeline {
    fn fetch_page(&mut self, account: &str, cursor: Option<&PageCursor>, count: usize) -> Result<Page> {
        let mut params = vec![
            ("screen_name", account.to_string()),
            ("count", count.to_string()),
            ("tweet_mode", "extended".to_string()),
            ("include_rts", "true".to_string()),
        ];
        if let Some(PageCursor(max_id)) = cursor {
            params.push(("max_id", max_id.clone()));
        }
        let body = self.get_with_retries(&params)?;
        page_from_json(body).with_context(|| format!("timeline page for {}", account))
    }
}

/// Decode a timeline response body (a JSON array of posts) into a `Page`.
pub fn page_from_json(body: Value) -> Result<Page> {
    let items = match body {
        Value::Array(items) => items,
        other => bail!("expected a JSON array of posts, got {}", kind_of(&other)),
    };
    let posts = items.into_iter().map(Post::from_value).collect::<Result<Vec<_>>>()?;
    let next = match posts.last() {
        Some(oldest) => {
            let id = oldest
                .id_str()
                .ok_or_else(|| anyhow!("timeline post without id_str"))?;
            max_id_before(id)?
        }
        None => None,
    };
    Ok(Page { posts, next })
}

/// Cursor for everything strictly older than `id`; `None` when nothing can be older.
pub fn max_id_before(id: &str) -> Result<Option<PageCursor>> {
    let n: u64 = id.parse().with_context(|| format!("non-numeric post id {:?}", id))?;
    Ok(n.checked_sub(1).map(|m| PageCursor(m.to_string())))
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
