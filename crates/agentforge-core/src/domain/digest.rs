//! Canonical JSON and content hashing for build manifests.
//!
//! Canonical form (RFC 8785-class):
//! - object keys ordered by UTF-16 code units (§3.2.3)
//! - integer-valued floats written as integers; NaN/Infinity rejected
//! - compact separators, no insignificant whitespace
//!
//! Two values that differ only in key order or float spelling always
//! canonicalise to the same bytes and therefore hash identically.

use serde_json::{Map, Number, Value};
use sha2::{Digest, Sha256};

use super::error::{CoreError, Result};

/// Prefix used for integrity strings (`sha256-<hex>`).
pub const INTEGRITY_PREFIX: &str = "sha256-";

fn utf16_key_order(a: &str, b: &str) -> std::cmp::Ordering {
    a.encode_utf16().cmp(b.encode_utf16())
}

fn canonical_value(value: &Value) -> Result<Value> {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_by(|a, b| utf16_key_order(a, b));

            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonical_value(&map[key])?);
            }
            Ok(Value::Object(sorted))
        }
        Value::Array(items) => items
            .iter()
            .map(canonical_value)
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Value::Number(n) => canonical_number(n).map(Value::Number),
        other => Ok(other.clone()),
    }
}

fn canonical_number(n: &Number) -> Result<Number> {
    if n.is_i64() || n.is_u64() {
        return Ok(n.clone());
    }
    let Some(f) = n.as_f64() else {
        return Ok(n.clone());
    };
    if !f.is_finite() {
        return Err(CoreError::Canonical(
            "NaN/Infinity not permitted in canonical JSON".to_string(),
        ));
    }
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        return Ok(Number::from(f as i64));
    }
    Ok(n.clone())
}

/// Convert a JSON value to canonical form: normalize numbers, sort keys, compact.
pub fn canonical_json(value: &Value) -> Result<String> {
    let canonical = canonical_value(value)?;
    Ok(serde_json::to_string(&canonical)?)
}

/// SHA-256 hex digest of raw bytes.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// SHA-256 hex digest of the canonical form of `value`.
pub fn compute_digest(value: &Value) -> Result<String> {
    Ok(sha256_hex(canonical_json(value)?.as_bytes()))
}

/// Integrity string (`sha256-<hex>`) over the canonical form of `value`.
pub fn integrity_of(value: &Value) -> Result<String> {
    Ok(format!("{INTEGRITY_PREFIX}{}", compute_digest(value)?))
}

/// Whether `s` is a 64-character lowercase hex SHA-256 digest.
pub fn is_sha256_hex(s: &str) -> bool {
    s.len() == 64 && s.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}
