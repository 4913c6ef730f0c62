#![allow(dead_code)]

use anyhow::{bail, Result};
use serde_json::{json, Value};
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use timeline_archive::{page_from_json, FetchOptions, Page, PageCursor, TimelineArchive, TimelineSource};

/// Raw post shaped like the timeline API returns it, with the usual noise:
/// a user back-reference, linkage ids, empty containers and zero counters.
pub fn raw_post(id: u64) -> Value {
    json!({
        "id": id,
        "id_str": id.to_string(),
        "full_text": format!("post number {id}"),
        "created_at": 1_300_000_000i64 + id as i64 * 60,
        "user": {"id": 1, "screen_name": "someone"},
        "in_reply_to_status_id": null,
        "in_reply_to_user_id": 77,
        "retweet_count": 0,
        "favorite_count": id,
        "entities": {"hashtags": [], "urls": []},
        "coordinates": null,
        "lang": "en"
    })
}

/// In-memory timeline that pages by `max_id` the way the HTTP source does.
/// Posts are held newest-first.
pub struct FakeTimeline {
    posts: Vec<Value>,
    pub requests: usize,
    /// Fail every request once this many have succeeded.
    pub fail_after: Option<usize>,
}

impl FakeTimeline {
    /// Timeline holding posts with the given ids, served newest-first.
    pub fn with_ids(ids: &[u64]) -> Self {
        let mut ids = ids.to_vec();
        ids.sort_unstable_by(|a, b| b.cmp(a));
        Self { posts: ids.into_iter().map(raw_post).collect(), requests: 0, fail_after: None }
    }

    /// Timeline with arbitrary raw posts, already newest-first.
    pub fn with_posts(posts: Vec<Value>) -> Self {
        Self { posts, requests: 0, fail_after: None }
    }

    /// New posts arrive at the head of the timeline.
    pub fn publish(&mut self, id: u64) {
        self.posts.insert(0, raw_post(id));
    }
}

impl TimelineSource for FakeTimeline {
    fn fetch_page(&mut self, _account: &str, cursor: Option<&PageCursor>, count: usize) -> Result<Page> {
        if let Some(limit) = self.fail_after {
            if self.requests >= limit {
                bail!("connection reset by peer");
            }
        }
        self.requests += 1;
        let max_id: Option<u64> = cursor.map(|c| c.0.parse().unwrap());
        let page: Vec<Value> = self
            .posts
            .iter()
            .filter(|p| match max_id {
                Some(m) => p["id_str"].as_str().unwrap().parse::<u64>().unwrap() <= m,
                None => true,
            })
            .take(count)
            .cloned()
            .collect();
        page_from_json(Value::Array(page))
    }
}

/// Archive over `store` with small pages and no environment influence.
pub fn archive(store: &Path) -> TimelineArchive {
    TimelineArchive::new().options(FetchOptions::default().with_page_size(2)).store(store)
}

pub fn scratch_store() -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.jsons");
    (dir, path)
}

/// Read a JSONL file into a vector of `serde_json::Value` (skips empty lines).
pub fn read_jsonl_values(path: &Path) -> Vec<Value> {
    let f = File::open(path).unwrap();
    let r = BufReader::new(f);
    r.lines()
        .map(|l| l.unwrap())
        .filter(|s| !s.is_empty())
        .map(|s| serde_json::from_str(&s).unwrap())
        .collect()
}

pub fn stored_ids(path: &Path) -> Vec<String> {
    read_jsonl_values(path)
        .into_iter()
        .map(|v| v["id_str"].as_str().unwrap().to_string())
        .collect()
}

/// Write raw lines as a store file.
pub fn write_lines(path: &Path, lines: &[&str]) {
    let mut s = lines.join("\n");
    s.push('\n');
    fs::write(path, s).unwrap();
}
