//! Deep merge of settings tiers.
//!
//! Higher tiers override lower tiers field by field. Sequences are replaced
//! as a whole, and a `null` in a higher tier leaves the lower value in place.

use serde_json::Value;

/// Deep merge two JSON values, with `overlay` taking precedence over `base`.
///
/// # Example
/// ```
/// use serde_json::json;
/// use layered_prefs::config::deep_merge;
///
/// let base = json!({
///     "remote": { "timeout_secs": 10, "max_attempts": 3 },
///     "prefix": "Preferences"
/// });
/// let overlay = json!({
///     "remote": { "max_attempts": 5 }
/// });
/// let merged = deep_merge(base, overlay);
/// assert_eq!(merged["remote"]["timeout_secs"], 10);
/// assert_eq!(merged["remote"]["max_attempts"], 5);
/// ```
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged_value = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged_value);
            }
            Value::Object(base_map)
        }
        // null means "not specified"
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

/// Fold [`deep_merge`] over tiers ordered lowest priority first.
pub fn deep_merge_all(values: impl IntoIterator<Item = Value>) -> Value {
    values.into_iter().fold(Value::Null, deep_merge)
}
