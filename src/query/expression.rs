//! Expression queries
//!
//! An [`ExpressionQuery`] is a small graph:
//!
//! ```text
//!  TimeSection ──► applies to every metric
//!  FilterSet(id) ◄── MetricBinding(id, filter) ◄── Expression("a + b")
//!                                                   │
//!                                                   └──► Output(id, alias)
//! ```
//!
//! Metric and expression ids become variables in the expression text, so
//! they are limited to ASCII letters and digits.
//!
//! With [`JoinOperator::Intersection`], series missing from one side of an
//! expression are dropped. With [`JoinOperator::Union`] the missing side is
//! substituted using the metric's [`FillPolicy`].
//!
//! # Example
//!
//! ```rust
//! use opentsdb_client::query::{ExpressionQuery, Filter};
//! use serde_json::json;
//!
//! # fn main() -> opentsdb_client::Result<()> {
//! let fill = ExpressionQuery::fill_policy("scalar", Some(3.5))?;
//! assert_eq!(fill.to_value(), json!({"policy": "scalar", "value": 3.5}));
//!
//! let query = ExpressionQuery::new(
//!     ExpressionQuery::time_section("sum", "1h-ago", None, None, false)?,
//!     vec![ExpressionQuery::filter_set("f1", vec![Filter::new("wildcard", "host", "*")])?],
//!     vec![
//!         ExpressionQuery::metric("a", "f1", "sys.cpu.user", None, Some(fill))?,
//!         ExpressionQuery::metric("b", "f1", "sys.cpu.sys", None, None)?,
//!     ],
//!     vec![ExpressionQuery::expression("e", "a + b", None, None)?],
//! );
//! assert_eq!(query.to_wire_map()["metrics"][1]["id"], json!("b"));
//! # Ok(())
//! # }
//! ```

use super::{Filter, TimeSpec};
use crate::error::{Result, ValidationError};
use crate::model::{invalid, Validate, WireMap};
use crate::validation::{is_plain_token, is_valid_name};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Fill policy
// =============================================================================

/// Value substituted for missing data points
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FillPolicy {
    /// NaN
    Nan,
    /// JSON null
    Null,
    /// Zero
    Zero,
    /// A fixed value
    Scalar(f64),
}

impl FillPolicy {
    /// Build from a policy name; `scalar` requires a finite value
    ///
    /// A value passed with any other policy is ignored.
    pub fn new(policy: &str, value: Option<f64>) -> Result<Self> {
        let policy = match policy {
            "nan" => FillPolicy::Nan,
            "null" => FillPolicy::Null,
            "zero" => FillPolicy::Zero,
            "scalar" => match value {
                Some(v) if v.is_finite() => FillPolicy::Scalar(v),
                Some(v) => {
                    return Err(invalid("FillPolicy", format!("scalar value {} is not finite", v)).into())
                }
                None => return Err(invalid("FillPolicy", "scalar policy requires a value").into()),
            },
            other => {
                return Err(invalid(
                    "FillPolicy",
                    format!("unknown policy '{}', expected nan, null, zero or scalar", other),
                )
                .into())
            }
        };
        Ok(policy)
    }

    /// Policy name on the wire
    pub fn name(&self) -> &'static str {
        match self {
            FillPolicy::Nan => "nan",
            FillPolicy::Null => "null",
            FillPolicy::Zero => "zero",
            FillPolicy::Scalar(_) => "scalar",
        }
    }

    /// Request body fragment
    pub fn to_value(&self) -> Value {
        match self {
            FillPolicy::Scalar(v) => json!({"policy": "scalar", "value": v}),
            other => json!({"policy": other.name()}),
        }
    }
}

impl fmt::Display for FillPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FillPolicy::Scalar(v) => write!(f, "scalar({})", v),
            other => f.write_str(other.name()),
        }
    }
}

// =============================================================================
// Time section
// =============================================================================

/// Downsampling applied to every metric of the query
#[derive(Debug, Clone, PartialEq)]
pub struct Downsampler {
    /// Interval, e.g. `1m`
    pub interval: String,
    /// Aggregation function within each interval
    pub aggregator: String,
    /// Fill for empty intervals
    pub fill_policy: Option<FillPolicy>,
}

impl Downsampler {
    /// Request body fragment
    pub fn to_value(&self) -> Value {
        let mut map = WireMap::new();
        map.insert("interval".into(), json!(self.interval));
        map.insert("aggregator".into(), json!(self.aggregator));
        if let Some(fill) = &self.fill_policy {
            map.insert("fillPolicy".into(), fill.to_value());
        }
        Value::Object(map)
    }
}

impl Validate for Downsampler {
    fn check(&self) -> std::result::Result<(), ValidationError> {
        if self.interval.trim().is_empty() {
            return Err(invalid("Downsampler", "interval cannot be empty"));
        }
        if !is_valid_name(&self.aggregator) {
            return Err(invalid("Downsampler", format!("invalid aggregator '{}'", self.aggregator)));
        }
        Ok(())
    }
}

/// Time range and reductions shared by all metrics
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSection {
    /// Aggregation function across series
    pub aggregator: String,
    /// Start of the range
    pub start: TimeSpec,
    /// End of the range
    pub end: Option<TimeSpec>,
    /// Optional downsampling
    pub downsampler: Option<Downsampler>,
    /// Convert to a rate of change
    pub rate: bool,
}

impl TimeSection {
    /// Request body fragment
    pub fn to_value(&self) -> Value {
        let mut map = WireMap::new();
        map.insert("start".into(), self.start.to_value());
        map.insert("aggregator".into(), json!(self.aggregator));
        map.insert("rate".into(), json!(self.rate));
        if let Some(end) = &self.end {
            map.insert("end".into(), end.to_value());
        }
        if let Some(downsampler) = &self.downsampler {
            map.insert("downsampler".into(), downsampler.to_value());
        }
        Value::Object(map)
    }
}

impl Validate for TimeSection {
    fn check(&self) -> std::result::Result<(), ValidationError> {
        if !is_valid_name(&self.aggregator) {
            return Err(invalid("TimeSection", format!("invalid aggregator '{}'", self.aggregator)));
        }
        self.start.check("TimeSection", "start")?;
        if let Some(end) = &self.end {
            end.check("TimeSection", "end")?;
        }
        if let Some(downsampler) = &self.downsampler {
            downsampler.check()?;
        }
        Ok(())
    }
}

// =============================================================================
// Graph nodes
// =============================================================================

/// Filters shared by metrics under one id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSet {
    /// Id referenced by [`MetricBinding::filter_id`]
    pub id: String,
    /// Filters, at least one
    pub filters: Vec<Filter>,
}

impl FilterSet {
    /// Request body fragment; the filters go under `tags`
    pub fn to_value(&self) -> Value {
        let tags: Vec<Value> = self.filters.iter().map(Filter::to_value).collect();
        json!({"id": self.id, "tags": tags})
    }
}

impl Validate for FilterSet {
    fn check(&self) -> std::result::Result<(), ValidationError> {
        if self.id.is_empty() {
            return Err(invalid("FilterSet", "id cannot be empty"));
        }
        if self.filters.is_empty() {
            return Err(invalid("FilterSet", format!("filter set '{}' has no filters", self.id)));
        }
        for filter in &self.filters {
            filter.check()?;
        }
        Ok(())
    }
}

/// A metric bound to a variable name
#[derive(Debug, Clone, PartialEq)]
pub struct MetricBinding {
    /// Variable name used in expressions
    pub id: String,
    /// Filter set to apply
    pub filter_id: String,
    /// Metric name
    pub metric: String,
    /// Overrides the time section's aggregator
    pub aggregator: Option<String>,
    /// Fill used when joining
    pub fill_policy: Option<FillPolicy>,
}

impl MetricBinding {
    /// Request body fragment
    pub fn to_value(&self) -> Value {
        let mut map = WireMap::new();
        map.insert("id".into(), json!(self.id));
        map.insert("filter".into(), json!(self.filter_id));
        map.insert("metric".into(), json!(self.metric));
        if let Some(aggregator) = &self.aggregator {
            map.insert("aggregator".into(), json!(aggregator));
        }
        if let Some(fill) = &self.fill_policy {
            map.insert("fillPolicy".into(), fill.to_value());
        }
        Value::Object(map)
    }
}

impl Validate for MetricBinding {
    fn check(&self) -> std::result::Result<(), ValidationError> {
        if !is_plain_token(&self.id) {
            return Err(invalid(
                "MetricBinding",
                format!("id '{}' must contain only ASCII letters and digits", self.id),
            ));
        }
        if self.filter_id.is_empty() {
            return Err(invalid("MetricBinding", "filter id cannot be empty"));
        }
        if !is_valid_name(&self.metric) {
            return Err(invalid("MetricBinding", format!("invalid metric name '{}'", self.metric)));
        }
        if let Some(aggregator) = &self.aggregator {
            if !is_valid_name(aggregator) {
                return Err(invalid("MetricBinding", format!("invalid aggregator '{}'", aggregator)));
            }
        }
        Ok(())
    }
}

/// How series are matched across the operands of an expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOperator {
    /// Keep series present on either side
    Union,
    /// Keep series present on both sides
    Intersection,
}

impl JoinOperator {
    /// Name on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinOperator::Union => "union",
            JoinOperator::Intersection => "intersection",
        }
    }
}

impl FromStr for JoinOperator {
    type Err = ValidationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "union" => Ok(JoinOperator::Union),
            "intersection" => Ok(JoinOperator::Intersection),
            other => Err(invalid("Join", format!("unknown join operator '{}'", other))),
        }
    }
}

/// Join settings for an expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Join {
    /// Set operation
    pub operator: JoinOperator,
    /// Match only on the tags named in the filters
    pub use_query_tags: bool,
    /// Also match on aggregated tags
    pub include_agg_tags: bool,
}

impl Join {
    /// Request body fragment
    pub fn to_value(&self) -> Value {
        json!({
            "operator": self.operator.as_str(),
            "useQueryTags": self.use_query_tags,
            "includeAggTags": self.include_agg_tags,
        })
    }
}

/// An arithmetic expression over metric and expression ids
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    /// Variable name for this result
    pub id: String,
    /// Expression text, e.g. `a + b`
    pub expr: String,
    /// Join settings
    pub join: Option<Join>,
    /// Fill used when joining
    pub fill_policy: Option<FillPolicy>,
}

impl Expression {
    /// Request body fragment
    pub fn to_value(&self) -> Value {
        let mut map = WireMap::new();
        map.insert("id".into(), json!(self.id));
        map.insert("expr".into(), json!(self.expr));
        if let Some(join) = &self.join {
            map.insert("join".into(), join.to_value());
        }
        if let Some(fill) = &self.fill_policy {
            map.insert("fillPolicy".into(), fill.to_value());
        }
        Value::Object(map)
    }
}

impl Validate for Expression {
    fn check(&self) -> std::result::Result<(), ValidationError> {
        if !is_plain_token(&self.id) {
            return Err(invalid(
                "Expression",
                format!("id '{}' must contain only ASCII letters and digits", self.id),
            ));
        }
        if self.expr.trim().is_empty() {
            return Err(invalid("Expression", format!("expression '{}' has no text", self.id)));
        }
        Ok(())
    }
}

/// Which results to serialize
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    /// Metric or expression id
    pub id: String,
    /// Name to report it under
    pub alias: Option<String>,
}

impl Output {
    /// Request body fragment
    pub fn to_value(&self) -> Value {
        match &self.alias {
            Some(alias) => json!({"id": self.id, "alias": alias}),
            None => json!({"id": self.id}),
        }
    }
}

// =============================================================================
// ExpressionQuery
// =============================================================================

/// A query computing expressions over several metrics
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionQuery {
    /// Time range and shared reductions
    pub time: TimeSection,
    /// Filter sets, at least one
    pub filters: Vec<FilterSet>,
    /// Metric bindings, at least one
    pub metrics: Vec<MetricBinding>,
    /// Expressions, at least one
    pub expressions: Vec<Expression>,
    /// Results to serialize; every expression when empty
    pub outputs: Vec<Output>,
}

impl ExpressionQuery {
    /// Assemble a query without outputs
    pub fn new(
        time: TimeSection,
        filters: Vec<FilterSet>,
        metrics: Vec<MetricBinding>,
        expressions: Vec<Expression>,
    ) -> Self {
        Self {
            time,
            filters,
            metrics,
            expressions,
            outputs: Vec::new(),
        }
    }

    /// Add an output
    pub fn with_output(mut self, output: Output) -> Self {
        self.outputs.push(output);
        self
    }

    // -------------------------------------------------------------------------
    // Validated piece constructors
    // -------------------------------------------------------------------------

    /// Time section
    pub fn time_section(
        aggregator: impl Into<String>,
        start: impl Into<TimeSpec>,
        end: Option<TimeSpec>,
        downsampler: Option<Downsampler>,
        rate: bool,
    ) -> Result<TimeSection> {
        let section = TimeSection {
            aggregator: aggregator.into(),
            start: start.into(),
            end,
            downsampler,
            rate,
        };
        section.check()?;
        Ok(section)
    }

    /// Downsampler for the time section
    pub fn downsampler(
        interval: impl Into<String>,
        aggregator: impl Into<String>,
        fill_policy: Option<FillPolicy>,
    ) -> Result<Downsampler> {
        let downsampler = Downsampler {
            interval: interval.into(),
            aggregator: aggregator.into(),
            fill_policy,
        };
        downsampler.check()?;
        Ok(downsampler)
    }

    /// Fill policy; see [`FillPolicy::new`]
    pub fn fill_policy(policy: &str, value: Option<f64>) -> Result<FillPolicy> {
        FillPolicy::new(policy, value)
    }

    /// Filter set
    pub fn filter_set(id: impl Into<String>, filters: Vec<Filter>) -> Result<FilterSet> {
        let set = FilterSet {
            id: id.into(),
            filters,
        };
        set.check()?;
        Ok(set)
    }

    /// Metric binding
    pub fn metric(
        id: impl Into<String>,
        filter_id: impl Into<String>,
        metric: impl Into<String>,
        aggregator: Option<&str>,
        fill_policy: Option<FillPolicy>,
    ) -> Result<MetricBinding> {
        let binding = MetricBinding {
            id: id.into(),
            filter_id: filter_id.into(),
            metric: metric.into(),
            aggregator: aggregator.map(str::to_string),
            fill_policy,
        };
        binding.check()?;
        Ok(binding)
    }

    /// Expression
    pub fn expression(
        id: impl Into<String>,
        expr: impl Into<String>,
        join: Option<Join>,
        fill_policy: Option<FillPolicy>,
    ) -> Result<Expression> {
        let expression = Expression {
            id: id.into(),
            expr: expr.into(),
            join,
            fill_policy,
        };
        expression.check()?;
        Ok(expression)
    }

    /// Join settings; the store defaults are `false` and `true`
    pub fn join(operator: JoinOperator, use_query_tags: bool, include_agg_tags: bool) -> Join {
        Join {
            operator,
            use_query_tags,
            include_agg_tags,
        }
    }

    /// Output selection
    pub fn output(id: impl Into<String>, alias: Option<&str>) -> Result<Output> {
        let id = id.into();
        if id.is_empty() {
            return Err(invalid("Output", "id cannot be empty").into());
        }
        Ok(Output {
            id,
            alias: alias.map(str::to_string),
        })
    }

    /// Request body
    pub fn to_wire_map(&self) -> WireMap {
        let mut map = WireMap::new();
        map.insert("time".into(), self.time.to_value());
        map.insert(
            "filters".into(),
            Value::Array(self.filters.iter().map(FilterSet::to_value).collect()),
        );
        map.insert(
            "metrics".into(),
            Value::Array(self.metrics.iter().map(MetricBinding::to_value).collect()),
        );
        map.insert(
            "expressions".into(),
            Value::Array(self.expressions.iter().map(Expression::to_value).collect()),
        );
        if !self.outputs.is_empty() {
            map.insert(
                "outputs".into(),
                Value::Array(self.outputs.iter().map(Output::to_value).collect()),
            );
        }
        map
    }
}

impl Validate for ExpressionQuery {
    fn check(&self) -> std::result::Result<(), ValidationError> {
        self.time.check()?;
        if self.filters.is_empty() {
            return Err(invalid("ExpressionQuery", "at least one filter set is required"));
        }
        if self.metrics.is_empty() {
            return Err(invalid("ExpressionQuery", "at least one metric is required"));
        }
        if self.expressions.is_empty() {
            return Err(invalid("ExpressionQuery", "at least one expression is required"));
        }
        for set in &self.filters {
            set.check()?;
        }
        for binding in &self.metrics {
            binding.check()?;
            if !self.filters.iter().any(|set| set.id == binding.filter_id) {
                return Err(invalid(
                    "ExpressionQuery",
                    format!(
                        "metric '{}' references unknown filter set '{}'",
                        binding.id, binding.filter_id
                    ),
                ));
            }
        }
        for expression in &self.expressions {
            expression.check()?;
        }
        Ok(())
    }
}
