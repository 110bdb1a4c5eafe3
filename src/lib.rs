//! OpenTSDB client - typed entities, UID reconciliation and query builders
//!
//! This library models what an OpenTSDB store persists and how to talk to it:
//! - Entities (series, data points, annotations, metadata, trees) that
//!   validate themselves against the store's character and shape rules
//! - Bulk UID assignment with reconciliation of partial failures
//! - Builders for metric, TSUID, expression and last-value queries
//! - Recursive loading of classification tree branches
//! - A pluggable, synchronous transport with an HTTP implementation
//!
//! # Example
//!
//! ```rust
//! use opentsdb_client::{Client, Measurement, TimeSeries};
//! use opentsdb_client::transport::StubTransport;
//! use serde_json::json;
//!
//! # fn main() -> opentsdb_client::Result<()> {
//! let stub = StubTransport::new();
//! stub.push_json(200, json!({
//!     "metric": {"sys.cpu.0": "000042"},
//!     "tagk": {"host": "000012"},
//!     "tagv_errors": {"web01": "Name already exists with UID: 00001A"}
//! }));
//! stub.push_empty(204);
//!
//! let client = Client::new(stub);
//! let mut series = TimeSeries::new("sys.cpu.0", [("host", "web01")])?;
//! series.assign_uid(&client)?;
//! assert_eq!(series.tagv_uid("web01"), Some("00001A"));
//!
//! Measurement::new(series, 1356998400, 42)?.save_to(&client)?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod status;
pub mod validation;

/// Configuration management with TOML support
pub mod config;

/// Entity model: series, data points, annotations, metadata and trees
pub mod model;

/// UID assignment requests, responses and reconciliation
pub mod uid;

/// Query builders for the three query endpoints
pub mod query;

/// Transport contract, HTTP implementation and scripted stub
pub mod transport;

/// Typed endpoint access over a transport
pub mod client;

// Re-export main types
pub use client::{Client, PutOptions, PutSummary, SearchMode, SearchRequest, SuggestKind};
pub use config::Config;
pub use error::{Error, Result};
pub use model::{
    Annotation, Branch, BranchRef, Entity, Leaf, Measurement, MeasurementValue, Rule, RuleType,
    TimeSeries, TreeDefinition, TsMeta, UidKind, UidMeta, Validate,
};
pub use query::{ExpressionQuery, LastValueQuery, Query, QueryRequest};
pub use transport::{HttpTransport, StubTransport, Transport};
