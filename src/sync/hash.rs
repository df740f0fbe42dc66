//! Content hashing and ETag validation.
//!
//! Hashes are weak ETags (`W/"<digest>"`): a fingerprint of the value's
//! canonical JSON form, used to tell "unchanged" apart from "changed". They
//! are not meant to resist deliberate collisions.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Directive name carried by a payload-free revalidation reply.
pub const EXTEND_DIRECTIVE: &str = "extend-ttl";

/// Digest bytes kept in the tag.
const DIGEST_BYTES: usize = 8;

// == Content Hash ==
/// Computes the weak ETag of a value.
///
/// Object keys are sorted before hashing, so structurally equal values hash
/// equally whatever order their fields were built in.
pub fn content_hash<V: Serialize + ?Sized>(value: &V) -> Result<String> {
    let value = serde_json::to_value(value)?;
    let mut canonical = String::new();
    write_canonical(&value, &mut canonical)?;

    let digest = Sha256::digest(canonical.as_bytes());
    Ok(format!("W/\"{}\"", hex::encode(&digest[..DIGEST_BYTES])))
}

fn write_canonical(value: &Value, out: &mut String) -> Result<()> {
    match value {
        Value::Object(map) => {
            let mut fields: Vec<(&String, &Value)> = map.iter().collect();
            fields.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, field)) in fields.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key)?);
                out.push(':');
                write_canonical(field, out)?;
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out)?;
            }
            out.push(']');
        }
        scalar => out.push_str(&serde_json::to_string(scalar)?),
    }
    Ok(())
}

// == Matching ==
/// True when the value's hash is among `known`. A value that cannot be
/// hashed matches nothing.
pub fn matches<V, S>(value: &V, known: &[S]) -> bool
where
    V: Serialize + ?Sized,
    S: AsRef<str>,
{
    match content_hash(value) {
        Ok(hash) => known.iter().any(|k| k.as_ref() == hash),
        Err(_) => false,
    }
}

/// Splits an `If-None-Match` style list (`W/"a", W/"b"` or `*`) into tags.
pub fn parse_etag_list(header: &str) -> Vec<String> {
    header
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

// == Not Modified ==
/// A payload-free reply telling the other side to keep its copy and extend
/// its lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotModified {
    pub etag: String,
    /// `extend-ttl=<seconds>`
    pub directive: String,
    pub extend_seconds: i64,
}

pub fn build_not_modified(hash: impl Into<String>, extend_seconds: i64) -> NotModified {
    let extend_seconds = extend_seconds.max(0);
    NotModified {
        etag: hash.into(),
        directive: format!("{}={}", EXTEND_DIRECTIVE, extend_seconds),
        extend_seconds,
    }
}

/// Reads the seconds out of an `extend-ttl=<n>` directive, which may sit
/// among other comma-separated directives.
pub fn parse_extend_directive(header: &str) -> Option<i64> {
    header.split(',').find_map(|part| {
        let (name, value) = part.trim().split_once('=')?;
        if name.trim().eq_ignore_ascii_case(EXTEND_DIRECTIVE) {
            value.trim().parse().ok().filter(|secs: &i64| *secs >= 0)
        } else {
            None
        }
    })
}
