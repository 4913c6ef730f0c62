//! Line-delimited JSON store I/O: a streaming reader, a writer that either
//! appends to or creates a store, and the append-only `append_all` sink.

use crate::record::Record;
use crate::util::{append_with_backoff, create_with_backoff, open_with_backoff, replace_file_atomic_backoff};
use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Minimal NDJSON reader with buffering and line-terminator trimming.
pub struct NdjsonReader {
    rdr: BufReader<File>,
}

impl NdjsonReader {
    pub fn open(path: &Path, buf_bytes: usize) -> io::Result<Self> {
        let f = open_with_backoff(path, 16, 50)?;
        Ok(Self { rdr: BufReader::with_capacity(buf_bytes.max(8 * 1024), f) })
    }

    /// Read the next line into `buf`. Returns the number of bytes read (0 on EOF).
    /// Strips trailing `\r?\n`.
    pub fn read_line(&mut self, buf: &mut String) -> io::Result<usize> {
        buf.clear();
        let n = self.rdr.read_line(buf)?;
        if n == 0 { return Ok(0); }
        if buf.ends_with('\n') {
            buf.pop();
            if buf.ends_with('\r') { buf.pop(); }
        }
        Ok(n)
    }
}

/// Parse one store line; the line must hold a JSON object.
pub fn parse_record(line: &str) -> Result<Record> {
    match serde_json::from_str::<Value>(line)? {
        Value::Object(map) => Ok(map),
        _ => Err(anyhow!("expected a JSON object")),
    }
}

/// Stream a store, calling `on_line(line_no, line)` for every non-blank line.
/// Line numbers are 1-based and count blank lines too.
pub fn for_each_line(path: &Path, buf_bytes: usize, mut on_line: impl FnMut(usize, &str) -> Result<()>) -> Result<()> {
    let mut rdr = NdjsonReader::open(path, buf_bytes).with_context(|| format!("open {}", path.display()))?;
    let mut buf = String::with_capacity(4 * 1024);
    let mut line_no = 0usize;
    loop {
        let n = rdr.read_line(&mut buf).with_context(|| format!("read {}", path.display()))?;
        if n == 0 { break; }
        line_no += 1;
        if buf.trim().is_empty() { continue; }
        on_line(line_no, &buf)?;
    }
    Ok(())
}

/// Buffered NDJSON writer. Each record is serialized on one line; keys come
/// out sorted because `Record` is an ordered map.
pub struct NdjsonWriter {
    path: PathBuf,
    w: Option<BufWriter<File>>,
}

impl NdjsonWriter {
    /// Create or truncate `path`.
    pub fn create(path: &Path, buf_bytes: usize) -> io::Result<Self> {
        let f = create_with_backoff(path, 16, 50)?;
        Ok(Self::wrap(path, f, buf_bytes))
    }

    /// Open `path` for appending, creating it if absent. Existing lines are never touched.
    pub fn append(path: &Path, buf_bytes: usize) -> io::Result<Self> {
        let f = append_with_backoff(path, 16, 50)?;
        Ok(Self::wrap(path, f, buf_bytes))
    }

    fn wrap(path: &Path, f: File, buf_bytes: usize) -> Self {
        Self { path: path.to_path_buf(), w: Some(BufWriter::with_capacity(buf_bytes.max(8 * 1024), f)) }
    }

    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        if let Some(w) = &mut self.w {
            serde_json::to_writer(&mut *w, record)?;
            w.write_all(b"\n")?;
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        if let Some(mut w) = self.w.take() {
            w.flush().with_context(|| format!("flush {}", self.path.display()))?;
        }
        Ok(())
    }

    /// Flushes and atomically promotes the temp file to `final_path`.
    /// Use when the writer was created on a temp location.
    pub fn finish_atomic(mut self, final_path: &Path) -> Result<()> {
        if let Some(mut w) = self.w.take() {
            w.flush().with_context(|| format!("flush {}", self.path.display()))?;
        }
        replace_file_atomic_backoff(&self.path, final_path)
    }
}

/// Append `records` to the store at `path` in iteration order, one line each.
/// Returns the number of records written.
pub fn append_all<I>(records: I, path: &Path, buf_bytes: usize) -> Result<u64>
where
    I: IntoIterator<Item = Record>,
{
    let mut w = NdjsonWriter::append(path, buf_bytes).with_context(|| format!("open {} for append", path.display()))?;
    let mut written = 0u64;
    for record in records {
        w.write_record(&record).with_context(|| format!("append to {}", path.display()))?;
        written += 1;
    }
    w.finish()?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;

    fn rec(v: Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn append_keeps_order_and_sorts_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsons");
        fs::write(&path, "{\"id_str\":\"1\"}\n").unwrap();

        let n = append_all(
            vec![rec(json!({"z": 1, "a": {"y": 2, "b": 3}, "id_str": "2"})), rec(json!({"id_str": "3"}))],
            &path,
            0,
        )
        .unwrap();
        assert_eq!(n, 2);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "{\"id_str\":\"1\"}\n{\"a\":{\"b\":3,\"y\":2},\"id_str\":\"2\",\"z\":1}\n{\"id_str\":\"3\"}\n"
        );
    }

    #[test]
    fn append_creates_missing_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("new.jsons");
        assert_eq!(append_all(Vec::new(), &path, 0).unwrap(), 0);
        assert!(path.exists());
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn line_walk_skips_blanks_but_counts_them() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.jsons");
        fs::write(&path, "{\"a\":1}\r\n\n  \n{\"a\":2}").unwrap();
        let mut seen = Vec::new();
        for_each_line(&path, 0, |n, l| {
            seen.push((n, parse_record(l)?["a"].clone()));
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, vec![(1, json!(1)), (4, json!(2))]);
    }

    #[test]
    fn parse_record_rejects_non_objects() {
        assert!(parse_record("[1]").is_err());
        assert!(parse_record("{bad").is_err());
    }
}
