use crate::ndjson::{for_each_line, parse_record};
use crate::record::ID_STR;
use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::path::Path;

/// What went wrong on one store line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Problem {
    /// The id is smaller than the id on the previous record.
    OutOfOrder { id: u64, previous: u64 },
    /// The line is not a JSON object or carries no numeric `id_str`.
    Malformed { reason: String },
}

/// One diagnostic from `verify_monotonic`. `line` is 1-based.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OrderReport {
    pub line: usize,
    #[serde(flatten)]
    pub problem: Problem,
}

impl fmt::Display for OrderReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.problem {
            Problem::OutOfOrder { id, previous } => {
                write!(f, "line {}: id {} is lower than previous id {}", self.line, id, previous)
            }
            Problem::Malformed { reason } => write!(f, "line {}: malformed record: {}", self.line, reason),
        }
    }
}

fn record_id(line: &str) -> std::result::Result<u64, String> {
    let rec = parse_record(line).map_err(|e| e.to_string())?;
    match rec.get(ID_STR) {
        Some(Value::String(s)) => s.parse().map_err(|_| format!("{} {:?} is not an integer", ID_STR, s)),
        Some(Value::Number(n)) => n.as_u64().ok_or_else(|| format!("{} {} is not an integer", ID_STR, n)),
        _ => Err(format!("missing {}", ID_STR)),
    }
}

/// Scan a store and report every record whose id is lower than the id on the
/// record before it. Problems are collected, never raised; only failing to
/// open or read the file is an error.
pub fn verify_monotonic(path: &Path, buf_bytes: usize) -> Result<Vec<OrderReport>> {
    let mut reports = Vec::new();
    let mut previous = 0u64;

    for_each_line(path, buf_bytes, |line_no, line| {
        match record_id(line) {
            Ok(id) => {
                if id < previous {
                    let r = OrderReport { line: line_no, problem: Problem::OutOfOrder { id, previous } };
                    tracing::warn!("{}", r);
                    reports.push(r);
                }
                previous = id;
            }
            Err(reason) => {
                let r = OrderReport { line: line_no, problem: Problem::Malformed { reason } };
                tracing::warn!("{}", r);
                reports.push(r);
            }
        }
        Ok(())
    })?;

    Ok(reports)
}
