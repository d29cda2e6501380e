//! Value coercions shared by the handlers

use crate::error::{ProviderError, Result};
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

/// Extract a string at a dotted path, e.g. `"User.Arn"`
pub fn str_at(value: &Value, path: &str) -> Option<String> {
    let mut current = value;
    for part in path.split('.') {
        current = current.get(part)?;
    }
    current.as_str().map(|s| s.to_string())
}

/// Timestamp rendered as RFC 3339. Accepts epoch seconds (integer or
/// fractional) or an already-formatted string.
pub fn timestamp(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => {
            let secs = n.as_f64()?;
            let whole = secs.trunc() as i64;
            let nanos = ((secs - secs.trunc()) * 1e9).round() as u32;
            Utc.timestamp_opt(whole, nanos.min(999_999_999))
                .single()
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        }
        Value::String(s) => Some(
            DateTime::parse_from_rfc3339(s)
                .map(|t| t.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Secs, true))
                .unwrap_or_else(|_| s.clone()),
        ),
        _ => None,
    }
}

/// Compact JSON string with object keys sorted
pub fn canonical_json(value: &Value) -> String {
    // serde_json::Map is ordered by key unless preserve_order is enabled
    fn sort(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let sorted: BTreeMap<&String, Value> = map.iter().map(|(k, v)| (k, sort(v))).collect();
                Value::Object(sorted.into_iter().map(|(k, v)| (k.clone(), v)).collect())
            }
            Value::Array(items) => Value::Array(items.iter().map(sort).collect()),
            other => other.clone(),
        }
    }
    sort(value).to_string()
}

/// Parse a configured policy document
pub fn parse_policy(attribute: &str, document: &str) -> Result<Value> {
    serde_json::from_str(document)
        .map_err(|e| ProviderError::validation(attribute, format!("contains an invalid JSON document: {}", e)))
}

/// Choose the string to store for a policy read back from the remote
/// side: the configured text when both documents are semantically equal,
/// otherwise the canonical form of the remote document.
pub fn policy_to_state(configured: Option<&str>, remote: &Value) -> String {
    if let Some(configured) = configured {
        if let Ok(parsed) = serde_json::from_str::<Value>(configured) {
            if policies_equivalent(&parsed, remote) {
                return configured.to_string();
            }
        }
    }
    canonical_json(remote)
}

/// Semantic comparison of policy documents. Arrays are compared without
/// regard to order and a single string equals a one-element array.
pub fn policies_equivalent(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter().all(|(k, v)| y.get(k).is_some_and(|w| policies_equivalent(v, w)))
        }
        (Value::Array(x), Value::Array(y)) => x.len() == y.len() && same_elements(x, y),
        (Value::Array(x), single) | (single, Value::Array(x)) if x.len() == 1 => {
            policies_equivalent(&x[0], single)
        }
        (x, y) => x == y,
    }
}

/// Every element of `x` pairs with a distinct equivalent element of `y`,
/// so duplicates count.
fn same_elements(x: &[Value], y: &[Value]) -> bool {
    let mut used = vec![false; y.len()];
    x.iter().all(|v| {
        let matched = y
            .iter()
            .enumerate()
            .position(|(i, w)| !used[i] && policies_equivalent(v, w));
        match matched {
            Some(i) => {
                used[i] = true;
                true
            }
            None => false,
        }
    })
}

/// Tags as a `Key -> Value` map
pub fn tags_from_object(value: Option<&Value>) -> BTreeMap<String, String> {
    value
        .and_then(|v| v.as_object())
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

/// Tags from a `[{"Key": .., "Value": ..}]` list
pub fn tags_from_list(value: Option<&Value>) -> BTreeMap<String, String> {
    value
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|t| Some((str_at(t, "Key")?, str_at(t, "Value").unwrap_or_default())))
                .collect()
        })
        .unwrap_or_default()
}

/// Keys to add/overwrite and keys to remove when moving from `old` to `new`
pub fn tag_changes(
    old: &BTreeMap<String, String>,
    new: &BTreeMap<String, String>,
) -> (BTreeMap<String, String>, Vec<String>) {
    let upsert = new
        .iter()
        .filter(|(k, v)| old.get(*k) != Some(*v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let remove = old.keys().filter(|k| !new.contains_key(*k)).cloned().collect();
    (upsert, remove)
}
