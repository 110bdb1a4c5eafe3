//! Deserialization helpers for the store's loosely typed payloads

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// `null` decodes to the type's default (the store sends `"custom": null`)
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// `""` and `null` both decode to `None`
pub fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.and_then(non_empty))
}

/// `""` becomes `None`, matching how such fields decode
pub(crate) fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// `0` and `null` both decode to `None`
pub fn zero_as_none<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<i64>::deserialize(deserializer)?;
    Ok(value.filter(|v| *v != 0))
}

/// Numbers decode as-is; `"NaN"`, `null` and non-finite values decode to `None`
///
/// Numeric strings such as `"1.5"` are accepted too.
pub fn nan_as_none<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let number = match value {
        Value::Null => None,
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        other => {
            return Err(serde::de::Error::custom(format!(
                "expected a number or \"NaN\", got {}",
                other
            )))
        }
    };
    Ok(number.filter(|v| v.is_finite()))
}
