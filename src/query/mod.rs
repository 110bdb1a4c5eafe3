//! Query construction
//!
//! Three kinds of query, each posted to its own endpoint:
//!
//! | Kind                | Type                 | Endpoint          |
//! |---------------------|----------------------|-------------------|
//! | metric / TSUID      | [`Query`]            | `/api/query`      |
//! | expression          | [`ExpressionQuery`]  | `/api/query/exp`  |
//! | last data point     | [`LastValueQuery`]   | `/api/query/last` |
//!
//! Builders only validate and project; sending is left to
//! [`Client::query`](crate::client::Client::query), which picks the endpoint
//! from the [`QueryRequest`] variant.
//!
//! # Example
//!
//! ```rust
//! use opentsdb_client::query::{Filter, MetricSubQuery, Query, QueryRequest};
//! use opentsdb_client::model::Validate;
//!
//! let sub = MetricSubQuery::new("sum", "sys.cpu.user")
//!     .with_rate(None, None)
//!     .with_filter(Filter::new("wildcard", "host", "web*").with_group_by(true));
//! let query = Query::new(vec![sub.into()], "1h-ago");
//! assert!(query.validate());
//!
//! let request = QueryRequest::from(query);
//! assert_eq!(request.endpoint(), "/api/query");
//! ```

mod expression;
mod last;
mod metric;

pub use expression::{
    Downsampler, Expression, ExpressionQuery, FillPolicy, FilterSet, Join, JoinOperator,
    MetricBinding, Output, TimeSection,
};
pub use last::{LastMetric, LastValueQuery};
pub use metric::{Filter, IdSubQuery, MetricSubQuery, Query, SubQuery};

use crate::error::ValidationError;
use crate::model::{Validate, WireMap};
use crate::transport::paths;
use crate::validation::is_time_string;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

// =============================================================================
// TimeSpec
// =============================================================================

/// A query start or end time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeSpec {
    /// Seconds or milliseconds since the epoch
    Absolute(i64),
    /// `1h-ago` style relative time, or `yyyy/MM/dd-HH:mm:ss` date
    Relative(String),
}

impl TimeSpec {
    /// Whether the store will accept this time
    pub fn is_valid(&self) -> bool {
        match self {
            TimeSpec::Absolute(t) => *t >= 0,
            TimeSpec::Relative(s) => is_time_string(s),
        }
    }

    /// JSON form
    pub fn to_value(&self) -> Value {
        match self {
            TimeSpec::Absolute(t) => Value::from(*t),
            TimeSpec::Relative(s) => Value::from(s.as_str()),
        }
    }

    pub(crate) fn check(&self, entity: &'static str, field: &str) -> Result<(), ValidationError> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(ValidationError::new(entity, format!("invalid {} time '{}'", field, self)))
        }
    }
}

impl fmt::Display for TimeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeSpec::Absolute(t) => write!(f, "{}", t),
            TimeSpec::Relative(s) => f.write_str(s),
        }
    }
}

impl From<i64> for TimeSpec {
    fn from(t: i64) -> Self {
        TimeSpec::Absolute(t)
    }
}

impl From<&str> for TimeSpec {
    fn from(s: &str) -> Self {
        TimeSpec::Relative(s.to_string())
    }
}

impl From<String> for TimeSpec {
    fn from(s: String) -> Self {
        TimeSpec::Relative(s)
    }
}

// =============================================================================
// QueryRequest
// =============================================================================

/// Any query the store accepts
#[derive(Debug, Clone, PartialEq)]
pub enum QueryRequest {
    /// Metric and TSUID sub-queries
    Standard(Query),
    /// Expression graph
    Expression(ExpressionQuery),
    /// Last data point
    Last(LastValueQuery),
}

impl QueryRequest {
    /// Endpoint path for this kind of query
    pub fn endpoint(&self) -> &'static str {
        match self {
            QueryRequest::Standard(_) => paths::QUERY,
            QueryRequest::Expression(_) => paths::QUERY_EXP,
            QueryRequest::Last(_) => paths::QUERY_LAST,
        }
    }

    /// Request body
    pub fn to_wire_map(&self) -> WireMap {
        match self {
            QueryRequest::Standard(q) => q.to_wire_map(),
            QueryRequest::Expression(q) => q.to_wire_map(),
            QueryRequest::Last(q) => q.to_wire_map(),
        }
    }
}

impl Validate for QueryRequest {
    fn check(&self) -> Result<(), ValidationError> {
        match self {
            QueryRequest::Standard(q) => q.check(),
            QueryRequest::Expression(q) => q.check(),
            QueryRequest::Last(q) => q.check(),
        }
    }
}

impl From<Query> for QueryRequest {
    fn from(q: Query) -> Self {
        QueryRequest::Standard(q)
    }
}

impl From<ExpressionQuery> for QueryRequest {
    fn from(q: ExpressionQuery) -> Self {
        QueryRequest::Expression(q)
    }
}

impl From<LastValueQuery> for QueryRequest {
    fn from(q: LastValueQuery) -> Self {
        QueryRequest::Last(q)
    }
}
