//! Lenient JSON field deserializers.
//!
//! Upstream documents are not schema-checked: a field holding an unexpected
//! type is read as absent instead of failing the whole document.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Deserializes a non-empty string; anything else becomes `None`.
pub fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) if !s.is_empty() => Some(s),
        _ => None,
    })
}

/// Deserializes an identifier-like field: a non-empty string or a number
/// (kept in its decimal text form).
pub fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Deserializes epoch seconds given as an integer or a numeric string.
pub fn lenient_epoch<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    })
}

/// Deserializes a list of strings, dropping non-string items.
///
/// A value that is not an array becomes `None`.
pub fn lenient_string_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
        ),
        _ => None,
    })
}

/// Deserializes a map of key → item list, reading each item on its own.
///
/// An item that does not decode as `T` (e.g. `null` or a number) becomes
/// `T::default()`, and a value that is not an array becomes an empty list.
/// A bad item never fails its siblings or the other keys.
pub fn lenient_entries<'de, D, T>(deserializer: D) -> Result<BTreeMap<String, Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let raw = BTreeMap::<String, Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(key, value)| {
            let items = match value {
                Value::Array(items) => items
                    .into_iter()
                    .map(|item| T::deserialize(item).unwrap_or_default())
                    .collect(),
                _ => Vec::new(),
            };
            (key, items)
        })
        .collect())
}
