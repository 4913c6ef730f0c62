use std::time::Duration;

/// Default timeline endpoint root; override with `TIMELINE_API_BASE`.
pub const DEFAULT_API_BASE: &str = "https://api.twitter.com/1.1";

/// Posts requested per timeline page.
pub const DEFAULT_PAGE_SIZE: usize = 200;

/// User-facing options with sensible defaults and builder chaining.
///
/// Everything the HTTP client and the paginator need is carried here and
/// passed in explicitly; nothing is configured through shared client state.
#[derive(Clone, Debug)]
pub struct FetchOptions {
    pub api_base: String,
    pub bearer_token: Option<String>,
    pub page_size: usize,          // posts per page request
    pub retry_count: u32,          // retries after the first failed attempt
    pub retry_delay: Duration,     // fixed delay between attempts
    pub request_timeout: Duration, // per request
    pub progress: bool,            // show a spinner while fetching
    pub excerpt_chars: usize,      // text excerpt length in progress logs

    // IO tuning
    pub read_buffer_bytes: usize,
    pub write_buffer_bytes: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            bearer_token: None,
            page_size: DEFAULT_PAGE_SIZE,
            retry_count: 3,
            retry_delay: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            progress: false,
            excerpt_chars: 80,

            read_buffer_bytes: 64 * 1024,
            write_buffer_bytes: 64 * 1024,
        }
    }
}

impl FetchOptions {
    /// Defaults, plus `TIMELINE_API_BASE` and `TIMELINE_BEARER_TOKEN` from the environment.
    pub fn from_env() -> Self {
        let mut opts = Self::default();
        if let Ok(base) = std::env::var("TIMELINE_API_BASE") {
            if !base.trim().is_empty() {
                opts = opts.with_api_base(base);
            }
        }
        if let Ok(token) = std::env::var("TIMELINE_BEARER_TOKEN") {
            if !token.trim().is_empty() {
                opts.bearer_token = Some(token.trim().to_string());
            }
        }
        opts
    }

    pub fn with_api_base(mut self, base: impl AsRef<str>) -> Self {
        self.api_base = base.as_ref().trim().trim_end_matches('/').to_string();
        self
    }
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }
    pub fn with_page_size(mut self, n: usize) -> Self {
        self.page_size = n.max(1);
        self
    }
    pub fn with_retry_count(mut self, n: u32) -> Self {
        self.retry_count = n;
        self
    }
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
    pub fn with_progress(mut self, yes: bool) -> Self {
        self.progress = yes;
        self
    }
    pub fn with_excerpt_chars(mut self, n: usize) -> Self {
        self.excerpt_chars = n;
        self
    }

    // IO buffers tuning
    pub fn with_io_buffers(mut self, read_bytes: usize, write_bytes: usize) -> Self {
        self.read_buffer_bytes = read_bytes.max(8 * 1024);
        self.write_buffer_bytes = write_bytes.max(8 * 1024);
        self
    }
}
