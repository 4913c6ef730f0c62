use anyhow::{anyhow, Result};
use serde_json::{Map, Value};

use crate::record::ID_STR;

/// One raw object from the timeline API, kept as an untyped JSON mapping.
/// Extra fields are carried through untouched until normalization.
#[derive(Clone, Debug, PartialEq)]
pub struct Post(Map<String, Value>);

impl Post {
    /// For `TimelineSource` implementations that build posts themselves.
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Wrap a JSON value; anything but an object is rejected.
    pub fn from_value(v: Value) -> Result<Self> {
        match v {
            Value::Object(map) => Ok(Self(map)),
            other => Err(anyhow!("timeline item is not a JSON object: {}", other)),
        }
    }

    /// Canonical string identifier, when present.
    pub fn id_str(&self) -> Option<&str> {
        self.0.get(ID_STR).and_then(|v| v.as_str())
    }

    /// Numeric identifier as sent by the API (may be absent or imprecise).
    pub fn id(&self) -> Option<u64> {
        self.0.get("id").and_then(|v| v.as_u64())
    }

    /// Body text; extended-mode responses carry it as `full_text`.
    pub fn text(&self) -> &str {
        self.0
            .get("text")
            .or_else(|| self.0.get("full_text"))
            .and_then(|v| v.as_str())
            .unwrap_or("")
    }

    /// First `max_chars` characters of the text on a single line.
    pub fn excerpt(&self, max_chars: usize) -> String {
        let flat: String = self.text().chars().map(|c| if c.is_control() { ' ' } else { c }).collect();
        let mut out: String = flat.chars().take(max_chars).collect();
        if flat.chars().count() > max_chars {
            out.push('…');
        }
        out
    }

    /// Identifier for log and error messages.
    pub(crate) fn label(&self) -> String {
        match (self.id_str(), self.id()) {
            (Some(s), _) => s.to_string(),
            (None, Some(n)) => n.to_string(),
            (None, None) => "<no id>".to_string(),
        }
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}
