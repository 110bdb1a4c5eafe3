//! Transport boundary
//!
//! Entities and queries never talk to the network themselves. Every request
//! goes through a [`Transport`], which takes a method, a path, optional query
//! parameters and an optional JSON body and hands back the status code and
//! the decoded body.
//!
//! Two implementations ship with the crate:
//!
//! - [`HttpTransport`]: blocking HTTP via `reqwest`
//! - [`StubTransport`]: scripted in-memory responses for tests

pub mod http;
pub mod stub;

pub use http::HttpTransport;
pub use stub::StubTransport;

use crate::error::TransportError;
use serde_json::Value;
use std::fmt;

/// Endpoint paths, keyed by operation
pub mod paths {
    /// Data point ingestion
    pub const PUT: &str = "/api/put";
    /// Server statistics
    pub const STATS: &str = "/api/stats";
    /// Running configuration
    pub const CONFIG: &str = "/api/config";
    /// Loaded filter plugins
    pub const FILTERS: &str = "/api/config/filters";
    /// Aggregation functions
    pub const AGGREGATORS: &str = "/api/aggregators";
    /// Server version
    pub const VERSION: &str = "/api/version";
    /// Single annotation
    pub const ANNOTATION: &str = "/api/annotation";
    /// UID cache purge
    pub const DROP_CACHES: &str = "/api/dropcaches";
    /// Serializer plugins
    pub const SERIALIZERS: &str = "/api/serializers";
    /// Auto-complete
    pub const SUGGEST: &str = "/api/suggest";
    /// Metric / TSUID query
    pub const QUERY: &str = "/api/query";
    /// Expression query
    pub const QUERY_EXP: &str = "/api/query/exp";
    /// Last data point query
    pub const QUERY_LAST: &str = "/api/query/last";
    /// Bulk UID assignment
    pub const UID_ASSIGN: &str = "/api/uid/assign";
    /// Time series meta data
    pub const TSMETA: &str = "/api/uid/tsmeta";
    /// UID meta data
    pub const UIDMETA: &str = "/api/uid/uidmeta";
    /// Tree definitions
    pub const TREE: &str = "/api/tree";
    /// Tree rule testing
    pub const TREE_TEST: &str = "/api/tree/test";
    /// Tree collisions
    pub const TREE_COLLISIONS: &str = "/api/tree/collisions";
    /// Tree not-matched entries
    pub const TREE_NOT_MATCHED: &str = "/api/tree/notmatched";
    /// Tree branches
    pub const TREE_BRANCH: &str = "/api/tree/branch";
    /// Single tree rule
    pub const TREE_RULE: &str = "/api/tree/rule";
    /// All rules of a tree
    pub const TREE_RULES: &str = "/api/tree/rules";
}

/// HTTP verbs used by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
}

impl Method {
    /// Upper-case verb name
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request handed to a [`Transport`]
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// HTTP verb
    pub method: Method,
    /// Endpoint path, e.g. `/api/put` or `/api/search/lookup`
    pub path: String,
    /// Query string parameters, in order
    pub query: Vec<(String, String)>,
    /// JSON body
    pub body: Option<Value>,
}

impl Request {
    /// Create a request without parameters or body
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    /// GET request
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    /// POST request
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    /// DELETE request
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// Append a query string parameter
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Set the JSON body
    pub fn with_body(mut self, body: impl Into<Value>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Value of a query parameter, if present
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Body of a response
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// No content (e.g. 204)
    Empty,
    /// Decoded JSON
    Json(Value),
    /// Content that is not JSON
    Raw(Vec<u8>),
}

/// A response returned by a [`Transport`]
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: ResponseBody,
}

impl Response {
    /// Response carrying a JSON body
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            body: ResponseBody::Json(body),
        }
    }

    /// Response with no body
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            body: ResponseBody::Empty,
        }
    }

    /// Decoded JSON body, if any
    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            ResponseBody::Json(v) => Some(v),
            _ => None,
        }
    }
}

/// Performs one synchronous request
///
/// Implementations return `Ok` for every response that arrived, whatever its
/// status; interpreting the status is up to the caller. `Err` is reserved for
/// requests that produced no response at all.
pub trait Transport: Send + Sync {
    /// Send a request and wait for its response
    fn send(&self, request: &Request) -> Result<Response, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, request: &Request) -> Result<Response, TransportError> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&self, request: &Request) -> Result<Response, TransportError> {
        (**self).send(request)
    }
}
