//! Record normalization: turn one raw timeline object into the compact,
//! serializable form that is persisted in the store.

use anyhow::{anyhow, bail, Context, Result};
use serde_json::{Map, Value};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::OffsetDateTime;

use crate::post::Post;

/// One normalized record. `serde_json::Map` is ordered by key, so records
/// serialize with sorted keys at every nesting level.
pub type Record = Map<String, Value>;

/// Creation-time field, rewritten to Unix seconds on every fresh record.
pub const CREATED_AT: &str = "created_at";

/// Canonical identifier field (the numeric `id` can lose precision in JSON consumers).
pub const ID_STR: &str = "id_str";

/// Fields always stripped from a record.
pub const DENYLIST: &[&str] = &[
    "author",           // back-reference to the account, duplicates `user`
    "user",             // every post in a store belongs to the same account
    "_api",             // client handle, not data
    "retweeted_status", // excluded historically; kept for store compatibility
    "id",               // superseded by `id_str`
];

/// Names ending with this suffix are linkage fields and are always dropped.
pub const LINK_SUFFIX: &str = "_id";

/// True for values that carry no information: null, false, zero, "", [] and {}.
pub fn is_falsy(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().map(|f| f == 0.0).unwrap_or(false),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

#[inline]
fn keep_field(key: &str, value: &Value) -> bool {
    !DENYLIST.contains(&key) && !key.ends_with(LINK_SUFFIX) && !is_falsy(value)
}

/// Remove extraneous fields (denylisted, `_id`-suffixed, empty).
pub fn prune_keys(record: Record) -> Record {
    record.into_iter().filter(|(k, v)| keep_field(k, v)).collect()
}

/// Parse a creation timestamp into Unix seconds (UTC).
///
/// Accepts the timeline API form (`Wed Oct 10 20:19:24 +0000 2018`),
/// RFC 3339, or a number that is already epoch seconds.
/// Numbers must name a second `OffsetDateTime` can represent.
pub fn parse_created_at(v: &Value) -> Result<i64> {
    match v {
        Value::Number(n) => {
            let secs = match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => i,
                (None, Some(f)) if f.is_finite() && f >= i64::MIN as f64 && f < i64::MAX as f64 => f.trunc() as i64,
                _ => bail!("timestamp {} is out of range", n),
            };
            OffsetDateTime::from_unix_timestamp(secs).map_err(|e| anyhow!("timestamp {} is out of range: {}", n, e))?;
            Ok(secs)
        }
        Value::String(s) => parse_timestamp_str(s.trim()),
        other => bail!("timestamp must be a string or number, got {}", other),
    }
}

fn parse_timestamp_str(s: &str) -> Result<i64> {
    let api_format = format_description!(
        "[weekday repr:short] [month repr:short] [day] [hour]:[minute]:[second] [offset_hour sign:mandatory][offset_minute] [year]"
    );
    let dt = OffsetDateTime::parse(s, &api_format)
        .or_else(|_| OffsetDateTime::parse(s, &Rfc3339))
        .map_err(|e| anyhow!("unrecognized timestamp {:?}: {}", s, e))?;
    Ok(dt.unix_timestamp())
}

/// Normalize one raw post into a store record.
///
/// Fails if the post has no usable creation timestamp; there is no default.
pub fn normalize(post: Post) -> Result<Record> {
    let label = post.label();
    let raw = post.into_inner();
    let created = raw
        .get(CREATED_AT)
        .ok_or_else(|| anyhow!("post {} has no {}", label, CREATED_AT))?;
    let ts = parse_created_at(created).with_context(|| format!("post {}: invalid {}", label, CREATED_AT))?;

    let mut out = prune_keys(raw);
    out.insert(CREATED_AT.to_string(), Value::from(ts));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn post(v: Value) -> Post {
        Post::from_value(v).unwrap()
    }

    #[test]
    fn strips_denylist_link_fields_and_empties() {
        let rec = normalize(post(json!({
            "id": 1050118621198921728u64,
            "id_str": "1050118621198921728",
            "text": "hello",
            "created_at": "Wed Oct 10 20:19:24 +0000 2018",
            "user": {"screen_name": "someone"},
            "author": {"screen_name": "someone"},
            "_api": "<client>",
            "retweeted_status": {"id_str": "1"},
            "in_reply_to_status_id": 42,
            "in_reply_to_user_id": 7,
            "favorited": false,
            "retweet_count": 0,
            "place": null,
            "entities": {"hashtags": [], "urls": []},
            "contributors": [],
            "geo": {},
            "source": "",
            "lang": "en"
        })))
        .unwrap();

        let keys: Vec<&str> = rec.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["created_at", "entities", "id_str", "lang", "text"]);
        // nested values are kept verbatim, only top-level keys are pruned
        assert_eq!(rec["entities"], json!({"hashtags": [], "urls": []}));
    }

    #[test]
    fn created_at_becomes_epoch_seconds() {
        let api = normalize(post(json!({"id_str": "1", "created_at": "Wed Oct 10 20:19:24 +0000 2018"}))).unwrap();
        assert_eq!(api[CREATED_AT], json!(1539202764));

        let rfc = normalize(post(json!({"id_str": "1", "created_at": "2018-10-10T22:19:24+02:00"}))).unwrap();
        assert_eq!(rfc[CREATED_AT], json!(1539202764));

        let num = normalize(post(json!({"id_str": "1", "created_at": 1539202764.9}))).unwrap();
        assert_eq!(num[CREATED_AT], json!(1539202764));
    }

    #[test]
    fn missing_or_bad_timestamp_is_an_error() {
        let err = normalize(post(json!({"id_str": "9", "text": "x"}))).unwrap_err();
        assert!(err.to_string().contains("created_at"), "{err}");

        assert!(normalize(post(json!({"id_str": "9", "created_at": "yesterday"}))).is_err());
        assert!(normalize(post(json!({"id_str": "9", "created_at": null}))).is_err());
        assert!(normalize(post(json!({"id_str": "9", "created_at": ""}))).is_err());
    }

    #[test]
    fn out_of_range_epoch_is_rejected() {
        assert!(parse_created_at(&json!(1e300)).is_err());
        assert!(parse_created_at(&json!(-1e300)).is_err());
        assert!(parse_created_at(&json!(u64::MAX)).is_err());
        assert!(parse_created_at(&json!(i64::MAX)).is_err());
        assert!(normalize(post(json!({"id_str": "9", "created_at": 1e300}))).is_err());
        assert_eq!(parse_created_at(&json!(-86400)).unwrap(), -86400);
    }

    #[test]
    fn falsy_matches_truthiness_rules() {
        for v in [json!(null), json!(false), json!(0), json!(0.0), json!(""), json!([]), json!({})] {
            assert!(is_falsy(&v), "{v} should be falsy");
        }
        for v in [json!(true), json!(-1), json!(0.5), json!(" "), json!([0]), json!({"a": null})] {
            assert!(!is_falsy(&v), "{v} should be kept");
        }
    }

    #[test]
    fn prune_is_idempotent() {
        let once = prune_keys(
            json!({"id_str": "5", "text": "t", "reply_id": 3, "id": 5, "n": 0, "created_at": 10})
                .as_object()
                .cloned()
                .unwrap(),
        );
        let twice = prune_keys(once.clone());
        assert_eq!(once, twice);
        assert_eq!(once.len(), 3);
    }
}
