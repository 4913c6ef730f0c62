//! Resume support: find the watermark for a run from the tail of an existing store.

use crate::ndjson::{parse_record, NdjsonReader};
use crate::record::{Record, ID_STR};
use anyhow::{Context, Result};
use serde_json::Value;
use std::io;
use std::path::Path;

/// Last non-blank record of the store, or `None` if the store is missing or empty.
///
/// The file is streamed front to back; only the current candidate line is kept.
/// A malformed final line is an error; earlier lines are never consulted.
pub fn last_record(path: &Path, buf_bytes: usize) -> Result<Option<Record>> {
    let mut rdr = match NdjsonReader::open(path, buf_bytes) {
        Ok(r) => r,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("open {}", path.display())),
    };

    let mut buf = String::with_capacity(4 * 1024);
    let mut last = String::new();
    let mut last_no = 0usize;
    let mut line_no = 0usize;
    loop {
        let n = rdr.read_line(&mut buf).with_context(|| format!("read {}", path.display()))?;
        if n == 0 { break; }
        line_no += 1;
        if !buf.trim().is_empty() {
            std::mem::swap(&mut last, &mut buf);
            last_no = line_no;
        }
    }

    if last_no == 0 {
        return Ok(None);
    }
    let record = parse_record(&last)
        .with_context(|| format!("malformed last record in {} (line {})", path.display(), last_no))?;
    Ok(Some(record))
}

/// Decide the watermark for a run.
///
/// An explicit id always wins. Otherwise the store's last record supplies its
/// `id_str`; a missing store (or a last record without `id_str`) means backfill.
pub fn resolve_watermark(explicit: Option<&str>, store: &Path, buf_bytes: usize) -> Result<Option<String>> {
    if let Some(id) = explicit {
        return Ok(Some(id.to_string()));
    }
    let Some(record) = last_record(store, buf_bytes)? else {
        tracing::info!("No existing records in {}, fetching full history", store.display());
        return Ok(None);
    };
    let id = match record.get(ID_STR) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };
    match &id {
        Some(id) => tracing::info!("Last id_str found in {}: {}", store.display(), id),
        None => tracing::warn!("Last record in {} has no {}, fetching full history", store.display(), ID_STR),
    }
    Ok(id)
}
