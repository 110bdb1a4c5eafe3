//! Last data point queries
//!
//! Cheaper than a range query when only the latest value of each series is
//! needed. Series are chosen by metric and tags, by TSUID, or both.

use crate::error::ValidationError;
use crate::model::{invalid, Validate, WireMap};
use crate::validation::{is_hex_id, is_valid_name};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// A metric with exact tag values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastMetric {
    /// Metric name
    pub metric: String,
    /// Tag key/value pairs; may be empty
    pub tags: BTreeMap<String, String>,
}

impl LastMetric {
    /// A metric selector
    pub fn new<I, K, V>(metric: impl Into<String>, tags: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            metric: metric.into(),
            tags: tags.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    fn to_value(&self) -> Value {
        json!({"metric": self.metric, "tags": self.tags})
    }
}

/// Latest value of each selected series
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LastValueQuery {
    /// Metric selectors
    pub metrics: Vec<LastMetric>,
    /// Series ids
    pub tsuids: Vec<String>,
    /// Return names along with UIDs
    pub resolve_names: bool,
    /// Hours to scan back from now; 0 uses the metadata counter
    pub back_scan: i64,
}

impl LastValueQuery {
    /// An empty query; add at least one metric or TSUID
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a metric selector
    pub fn with_metric(mut self, metric: LastMetric) -> Self {
        self.metrics.push(metric);
        self
    }

    /// Add a TSUID
    pub fn with_tsuid(mut self, tsuid: impl Into<String>) -> Self {
        self.tsuids.push(tsuid.into());
        self
    }

    /// Set the resolve-names flag
    pub fn with_resolve_names(mut self, resolve_names: bool) -> Self {
        self.resolve_names = resolve_names;
        self
    }

    /// Set the back-scan window in hours
    pub fn with_back_scan(mut self, hours: i64) -> Self {
        self.back_scan = hours;
        self
    }

    /// Request body
    ///
    /// Metric selectors come first; all TSUIDs share one trailing entry.
    pub fn to_wire_map(&self) -> WireMap {
        let mut queries: Vec<Value> = self.metrics.iter().map(LastMetric::to_value).collect();
        if !self.tsuids.is_empty() {
            queries.push(json!({"tsuids": self.tsuids}));
        }
        let mut map = WireMap::new();
        map.insert("queries".into(), Value::Array(queries));
        map.insert("resolveNames".into(), json!(self.resolve_names));
        map.insert("backScan".into(), json!(self.back_scan));
        map
    }
}

impl Validate for LastValueQuery {
    fn check(&self) -> Result<(), ValidationError> {
        if self.metrics.is_empty() && self.tsuids.is_empty() {
            return Err(invalid("LastValueQuery", "at least one metric or tsuid is required"));
        }
        if self.back_scan < 0 {
            return Err(invalid(
                "LastValueQuery",
                format!("back scan must not be negative, got {}", self.back_scan),
            ));
        }
        for m in &self.metrics {
            if !is_valid_name(&m.metric) {
                return Err(invalid("LastValueQuery", format!("invalid metric name '{}'", m.metric)));
            }
            if let Some((k, v)) = m.tags.iter().find(|(k, v)| !is_valid_name(k) || !is_valid_name(v)) {
                return Err(invalid("LastValueQuery", format!("invalid tag '{}={}'", k, v)));
            }
        }
        if let Some(bad) = self.tsuids.iter().find(|t| !is_hex_id(t)) {
            return Err(invalid("LastValueQuery", format!("tsuid '{}' is not hexadecimal", bad)));
        }
        Ok(())
    }
}
