//! Metric and TSUID queries
//!
//! A [`Query`] holds one or more sub-queries. A [`MetricSubQuery`] names a
//! metric and narrows it with [`Filter`]s; an [`IdSubQuery`] lists TSUIDs
//! that share a metric.
//!
//! Several filters may target the same tag key; the store ANDs them. If any
//! of them groups by the key, all of them effectively do.

use super::TimeSpec;
use crate::error::ValidationError;
use crate::model::{invalid, Validate, WireMap};
use crate::validation::{is_hex_id, is_valid_name};
use serde_json::{json, Value};

// =============================================================================
// Filter
// =============================================================================

/// A tag filter, e.g. `wildcard(host=web*)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    /// Filter plugin name: `literal_or`, `wildcard`, `regexp`, ...
    pub filter_type: String,
    /// Tag key the filter applies to
    pub tagk: String,
    /// Filter expression
    pub filter: String,
    /// Group results by this tag key
    pub group_by: bool,
}

impl Filter {
    /// A non-grouping filter
    pub fn new(
        filter_type: impl Into<String>,
        tagk: impl Into<String>,
        filter: impl Into<String>,
    ) -> Self {
        Self {
            filter_type: filter_type.into(),
            tagk: tagk.into(),
            filter: filter.into(),
            group_by: false,
        }
    }

    /// Set the group-by flag
    pub fn with_group_by(mut self, group_by: bool) -> Self {
        self.group_by = group_by;
        self
    }

    /// Request body fragment
    pub fn to_value(&self) -> Value {
        json!({
            "type": self.filter_type,
            "tagk": self.tagk,
            "filter": self.filter,
            "groupBy": self.group_by,
        })
    }
}

impl Validate for Filter {
    fn check(&self) -> Result<(), ValidationError> {
        if !is_valid_name(&self.filter_type) {
            return Err(invalid("Filter", format!("invalid filter type '{}'", self.filter_type)));
        }
        if !is_valid_name(&self.tagk) {
            return Err(invalid("Filter", format!("invalid tag key '{}'", self.tagk)));
        }
        if self.filter.is_empty() {
            return Err(invalid("Filter", "filter expression cannot be empty"));
        }
        Ok(())
    }
}

// =============================================================================
// Sub-queries
// =============================================================================

/// Aggregate one metric across the series its filters select
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSubQuery {
    /// Aggregation function
    pub aggregator: String,
    /// Metric name
    pub metric: String,
    /// Convert to a rate of change
    pub rate: bool,
    /// Counter roll-over value, with `rate`
    pub counter_max: Option<i64>,
    /// Rates above this are reset to zero, with `rate`
    pub reset_value: Option<i64>,
    /// Downsampling specifier, e.g. `1m-avg`
    pub downsample: Option<String>,
    /// Tag filters
    pub filters: Vec<Filter>,
    /// Only return series with exactly the filtered tag keys
    pub explicit_tags: bool,
}

impl MetricSubQuery {
    /// Aggregate `metric` with `aggregator`
    pub fn new(aggregator: impl Into<String>, metric: impl Into<String>) -> Self {
        Self {
            aggregator: aggregator.into(),
            metric: metric.into(),
            rate: false,
            counter_max: None,
            reset_value: None,
            downsample: None,
            filters: Vec::new(),
            explicit_tags: false,
        }
    }

    /// Compute a counter rate
    pub fn with_rate(mut self, counter_max: Option<i64>, reset_value: Option<i64>) -> Self {
        self.rate = true;
        self.counter_max = counter_max;
        self.reset_value = reset_value;
        self
    }

    /// Downsample with a specifier such as `1h-avg`
    pub fn with_downsample(mut self, downsample: impl Into<String>) -> Self {
        self.downsample = Some(downsample.into());
        self
    }

    /// Add a filter
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Set the explicit-tags flag
    pub fn with_explicit_tags(mut self, explicit_tags: bool) -> Self {
        self.explicit_tags = explicit_tags;
        self
    }

    /// Request body fragment
    pub fn to_value(&self) -> Value {
        let mut map = WireMap::new();
        map.insert("aggregator".into(), json!(self.aggregator));
        map.insert("metric".into(), json!(self.metric));
        if self.rate {
            map.insert("rate".into(), json!(true));
            let mut options = WireMap::new();
            options.insert("counter".into(), json!(true));
            if let Some(counter_max) = self.counter_max {
                options.insert("counterMax".into(), json!(counter_max));
            }
            if let Some(reset_value) = self.reset_value {
                options.insert("resetValue".into(), json!(reset_value));
            }
            map.insert("rateOptions".into(), Value::Object(options));
        }
        if let Some(downsample) = &self.downsample {
            map.insert("downsample".into(), json!(downsample));
        }
        if !self.filters.is_empty() {
            let filters: Vec<Value> = self.filters.iter().map(Filter::to_value).collect();
            map.insert("filters".into(), Value::Array(filters));
        }
        if self.explicit_tags {
            map.insert("explicitTags".into(), json!(true));
        }
        Value::Object(map)
    }
}

impl Validate for MetricSubQuery {
    fn check(&self) -> Result<(), ValidationError> {
        if !is_valid_name(&self.aggregator) {
            return Err(invalid("MetricSubQuery", format!("invalid aggregator '{}'", self.aggregator)));
        }
        if !is_valid_name(&self.metric) {
            return Err(invalid("MetricSubQuery", format!("invalid metric name '{}'", self.metric)));
        }
        if let Some(downsample) = &self.downsample {
            if downsample.trim().is_empty() {
                return Err(invalid("MetricSubQuery", "downsample cannot be empty"));
            }
        }
        for filter in &self.filters {
            filter.check()?;
        }
        Ok(())
    }
}

/// Fetch series by TSUID, all sharing one metric
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdSubQuery {
    /// Aggregation function
    pub aggregator: String,
    /// Hex series ids
    pub tsuids: Vec<String>,
}

impl IdSubQuery {
    /// Fetch `tsuids`, aggregated with `aggregator`
    pub fn new<I, S>(aggregator: impl Into<String>, tsuids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            aggregator: aggregator.into(),
            tsuids: tsuids.into_iter().map(Into::into).collect(),
        }
    }

    /// Request body fragment
    pub fn to_value(&self) -> Value {
        json!({"aggregator": self.aggregator, "tsuids": self.tsuids})
    }
}

impl Validate for IdSubQuery {
    fn check(&self) -> Result<(), ValidationError> {
        if !is_valid_name(&self.aggregator) {
            return Err(invalid("IdSubQuery", format!("invalid aggregator '{}'", self.aggregator)));
        }
        if self.tsuids.is_empty() {
            return Err(invalid("IdSubQuery", "tsuid list cannot be empty"));
        }
        if let Some(bad) = self.tsuids.iter().find(|t| !is_hex_id(t)) {
            return Err(invalid("IdSubQuery", format!("tsuid '{}' is not hexadecimal", bad)));
        }
        Ok(())
    }
}

/// Either kind of sub-query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubQuery {
    /// By metric name
    Metric(MetricSubQuery),
    /// By TSUID
    Id(IdSubQuery),
}

impl SubQuery {
    /// Request body fragment
    pub fn to_value(&self) -> Value {
        match self {
            SubQuery::Metric(q) => q.to_value(),
            SubQuery::Id(q) => q.to_value(),
        }
    }
}

impl Validate for SubQuery {
    fn check(&self) -> Result<(), ValidationError> {
        match self {
            SubQuery::Metric(q) => q.check(),
            SubQuery::Id(q) => q.check(),
        }
    }
}

impl From<MetricSubQuery> for SubQuery {
    fn from(q: MetricSubQuery) -> Self {
        SubQuery::Metric(q)
    }
}

impl From<IdSubQuery> for SubQuery {
    fn from(q: IdSubQuery) -> Self {
        SubQuery::Id(q)
    }
}

// =============================================================================
// Query
// =============================================================================

/// A metric/TSUID query over a time range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// Sub-queries, in order
    pub queries: Vec<SubQuery>,
    /// Start of the range
    pub start: TimeSpec,
    /// End of the range; now when absent
    pub end: Option<TimeSpec>,
    /// Skip annotations
    pub no_annotations: bool,
    /// Include global annotations
    pub global_annotations: bool,
    /// Millisecond resolution output
    pub ms_resolution: bool,
    /// Include TSUIDs in the output
    pub show_tsuids: bool,
    /// Include a timing summary
    pub show_summary: bool,
    /// Echo the query in the output
    pub show_query: bool,
    /// Delete the matched data points
    pub delete: bool,
}

impl Query {
    /// Query `queries` from `start` until now
    pub fn new(queries: Vec<SubQuery>, start: impl Into<TimeSpec>) -> Self {
        Self {
            queries,
            start: start.into(),
            end: None,
            no_annotations: false,
            global_annotations: false,
            ms_resolution: false,
            show_tsuids: false,
            show_summary: false,
            show_query: false,
            delete: false,
        }
    }

    /// Add a sub-query
    pub fn with_query(mut self, query: impl Into<SubQuery>) -> Self {
        self.queries.push(query.into());
        self
    }

    /// Set the end of the range
    pub fn with_end(mut self, end: impl Into<TimeSpec>) -> Self {
        self.end = Some(end.into());
        self
    }

    /// Set the millisecond-resolution flag
    pub fn with_ms_resolution(mut self, ms_resolution: bool) -> Self {
        self.ms_resolution = ms_resolution;
        self
    }

    /// Set the show-TSUIDs flag
    pub fn with_show_tsuids(mut self, show_tsuids: bool) -> Self {
        self.show_tsuids = show_tsuids;
        self
    }

    /// Request body
    pub fn to_wire_map(&self) -> WireMap {
        let mut map = WireMap::new();
        map.insert("start".into(), self.start.to_value());
        if let Some(end) = &self.end {
            map.insert("end".into(), end.to_value());
        }
        let queries: Vec<Value> = self.queries.iter().map(SubQuery::to_value).collect();
        map.insert("queries".into(), Value::Array(queries));
        for (key, flag) in [
            ("noAnnotations", self.no_annotations),
            ("globalAnnotations", self.global_annotations),
            ("msResolution", self.ms_resolution),
            ("showTSUIDs", self.show_tsuids),
            ("showSummary", self.show_summary),
            ("showQuery", self.show_query),
            ("delete", self.delete),
        ] {
            map.insert(key.into(), Value::Bool(flag));
        }
        map
    }
}

impl Validate for Query {
    fn check(&self) -> Result<(), ValidationError> {
        if self.queries.is_empty() {
            return Err(invalid("Query", "at least one sub-query is required"));
        }
        self.start.check("Query", "start")?;
        if let Some(end) = &self.end {
            end.check("Query", "end")?;
        }
        for query in &self.queries {
            query.check()?;
        }
        Ok(())
    }
}
