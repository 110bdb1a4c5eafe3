//! Client facade over a [`Transport`]
//!
//! [`Client`] knows every endpoint of the store: which path, which verb,
//! which status codes count as success and how to decode the body. It holds
//! no state besides the transport, so entities borrow it for the duration of
//! a call and never keep it.
//!
//! # Response handling
//!
//! 1. A status outside the operation's allow-list becomes a
//!    [`TransportError`], built from the `{"error": {...}}` body when there is
//!    one and from the status table otherwise.
//! 2. An allowed status with an error body is still an error. This happens
//!    where `400` is allowed for partial results.
//! 3. The body is decoded into the expected type. A body that does not fit,
//!    or an entity that fails validation, is a protocol mismatch.
//!
//! # Example
//!
//! ```rust
//! use opentsdb_client::transport::StubTransport;
//! use opentsdb_client::Client;
//! use serde_json::json;
//!
//! let stub = StubTransport::new();
//! stub.push_json(200, json!(["sum", "avg", "max"]));
//!
//! let client = Client::new(stub);
//! let aggregators = client.aggregators().unwrap();
//! assert_eq!(aggregators, vec!["sum", "avg", "max"]);
//! assert_eq!(client.transport().last_request().unwrap().path, "/api/aggregators");
//! ```

use crate::config::Config;
use crate::error::{Error, Result, TransportError};
use crate::model::{
    Annotation, Branch, BranchRef, Entity, Measurement, Rule, TreeDefinition, TsMeta, TsMetaPatch,
    UidKind, UidMeta, UidMetaPatch, Validate, WireMap,
};
use crate::query::QueryRequest;
use crate::status;
use crate::transport::{paths, HttpTransport, Request, ResponseBody, Transport};
use crate::uid::AssignResponse;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, warn};

/// Statuses accepted by most operations
const DEFAULT_ALLOW: &[u16] = &[200, 204, 301];

// =============================================================================
// Options and auxiliary types
// =============================================================================

/// Options for writing data points
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PutOptions {
    /// Return a count of stored and failed points
    pub summary: bool,
    /// Return the count and every failed point; implies `summary`
    pub details: bool,
    /// Wait until the points are written
    pub sync: bool,
    /// How long to wait in milliseconds, with `sync`; 0 waits forever
    pub sync_timeout: Option<u64>,
}

impl PutOptions {
    /// Ask for a summary
    pub fn with_summary(mut self) -> Self {
        self.summary = true;
        self
    }

    /// Ask for details of failed points
    pub fn with_details(mut self) -> Self {
        self.details = true;
        self
    }

    /// Wait for the write, at most `timeout_ms` when given
    pub fn with_sync(mut self, timeout_ms: Option<u64>) -> Self {
        self.sync = true;
        self.sync_timeout = timeout_ms;
        self
    }

    fn apply(&self, mut request: Request) -> Request {
        if self.details {
            request = request.with_param("details", "");
        } else if self.summary {
            request = request.with_param("summary", "");
        }
        if self.sync {
            request = request
                .with_param("sync", "")
                .with_param("sync_timeout", self.sync_timeout.unwrap_or(0).to_string());
        }
        request
    }
}

/// Outcome of a write with `summary` or `details`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PutSummary {
    /// Points stored
    #[serde(default)]
    pub success: u64,
    /// Points rejected
    #[serde(default)]
    pub failed: u64,
    /// Rejected points with reasons; only with `details`
    #[serde(default)]
    pub errors: Vec<Value>,
}

/// Search endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchMode {
    /// Full TS metadata records
    TsMeta,
    /// TS metadata summaries
    TsMetaSummary,
    /// Matching TSUIDs only
    TsUids,
    /// UID metadata records
    UidMeta,
    /// Annotations
    Annotation,
    /// Metric and tag lookup against the metadata table
    Lookup,
}

impl SearchMode {
    /// Last path segment
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::TsMeta => "tsmeta",
            SearchMode::TsMetaSummary => "tsmeta_summary",
            SearchMode::TsUids => "tsuids",
            SearchMode::UidMeta => "uidmeta",
            SearchMode::Annotation => "annotation",
            SearchMode::Lookup => "lookup",
        }
    }

    /// Full endpoint path
    pub fn path(&self) -> String {
        format!("/api/search/{}", self.as_str())
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of a search
///
/// `query`, `limit` and `start_index` drive plugin searches; `metric`, `tags`
/// and `use_meta` drive [`SearchMode::Lookup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Free-text query
    pub query: String,
    /// Maximum number of results
    pub limit: usize,
    /// Offset of the first result
    pub start_index: usize,
    /// Metric to look up; `*` matches any
    pub metric: String,
    /// Tags to look up; values may be `*`
    pub tags: BTreeMap<String, String>,
    /// Look up in the metadata table instead of the data table
    pub use_meta: bool,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            query: String::new(),
            limit: 25,
            start_index: 0,
            metric: "*".to_string(),
            tags: BTreeMap::new(),
            use_meta: false,
        }
    }
}

impl SearchRequest {
    /// Free-text search
    pub fn query(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    /// Metric and tag lookup
    pub fn lookup<I, K, V>(metric: impl Into<String>, tags: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            metric: metric.into(),
            tags: tags.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            ..Self::default()
        }
    }

    /// Set the page
    pub fn with_page(mut self, start_index: usize, limit: usize) -> Self {
        self.start_index = start_index;
        self.limit = limit;
        self
    }

    /// Set the use-meta flag
    pub fn with_use_meta(mut self, use_meta: bool) -> Self {
        self.use_meta = use_meta;
        self
    }

    /// `metric{k=v,...}` form used by lookups
    pub fn ts_string(&self) -> String {
        if self.tags.is_empty() {
            return self.metric.clone();
        }
        let tags: Vec<String> = self.tags.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        format!("{}{{{}}}", self.metric, tags.join(","))
    }
}

/// What to auto-complete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestKind {
    /// Metric names
    Metrics,
    /// Tag keys
    Tagk,
    /// Tag values
    Tagv,
}

// =============================================================================
// Client
// =============================================================================

/// Typed access to the store's REST endpoints
#[derive(Debug)]
pub struct Client<T: Transport> {
    transport: T,
}

impl Client<HttpTransport> {
    /// HTTP client for the configured connection
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::new(&config.connection)?;
        info!(base_url = %transport.base_url(), "Client created");
        Ok(Self::new(transport))
    }
}

impl<T: Transport> Client<T> {
    /// Wrap a transport
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// The underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    // -------------------------------------------------------------------------
    // Request execution
    // -------------------------------------------------------------------------

    fn execute(&self, request: Request, allow: &[u16]) -> Result<Option<Value>> {
        debug!(method = %request.method, path = %request.path, params = request.query.len(), "Sending request");
        let response = self.transport.send(&request)?;
        let status = response.status;

        if !allow.contains(&status) {
            let error = error_from_body(status, response.json_body());
            warn!(method = %request.method, path = %request.path, status, message = %error.message, "Request rejected");
            return Err(error.into());
        }

        match response.body {
            ResponseBody::Empty => Ok(None),
            ResponseBody::Json(value) => {
                if status >= 400 {
                    if let Some(error) = value.get("error") {
                        let error = error_from_object(status, error);
                        warn!(path = %request.path, status, message = %error.message, "Request failed");
                        return Err(error.into());
                    }
                }
                Ok(Some(value))
            }
            ResponseBody::Raw(bytes) => Err(Error::protocol(
                format!("{} {} returned a non-JSON body", request.method, request.path),
                Value::String(String::from_utf8_lossy(&bytes).into_owned()),
            )),
        }
    }

    fn fetch<D: DeserializeOwned>(&self, request: Request, allow: &[u16]) -> Result<D> {
        let path = request.path.clone();
        let value = self.execute(request, allow)?.ok_or_else(|| empty_body(&path))?;
        decode(value, &path)
    }

    fn fetch_entity<E: Entity>(&self, request: Request, allow: &[u16]) -> Result<E> {
        let path = request.path.clone();
        let value = self.execute(request, allow)?.ok_or_else(|| empty_body(&path))?;
        decode_entity(value)
    }

    fn fetch_entities<E: Entity>(&self, request: Request) -> Result<Vec<E>> {
        let path = request.path.clone();
        match self.execute(request, DEFAULT_ALLOW)? {
            Some(Value::Array(items)) => items.into_iter().map(decode_entity).collect(),
            Some(other) => Err(Error::protocol(format!("{} did not return a list", path), other)),
            None => Ok(Vec::new()),
        }
    }

    // -------------------------------------------------------------------------
    // Data points
    // -------------------------------------------------------------------------

    /// Write data points
    ///
    /// Returns the summary when `options` asks for one. A `400` reply that
    /// carries a summary is a partial failure and is returned, not raised.
    pub fn put_measurements(
        &self,
        measurements: &[Measurement],
        options: PutOptions,
    ) -> Result<Option<PutSummary>> {
        for measurement in measurements {
            measurement.check()?;
        }
        let body = serde_json::to_value(measurements)?;
        let request = options.apply(Request::post(paths::PUT).with_body(body));
        let count = measurements.len();

        match self.execute(request, &[200, 204, 301, 400])? {
            Some(value) => {
                let summary: PutSummary = decode(value, paths::PUT)?;
                if summary.failed > 0 {
                    warn!(count, failed = summary.failed, "Some data points were rejected");
                } else {
                    debug!(count, "Data points stored");
                }
                Ok(Some(summary))
            }
            None => {
                debug!(count, "Data points stored");
                Ok(None)
            }
        }
    }

    /// Internal statistics, as data points
    pub fn statistics(&self) -> Result<Vec<Measurement>> {
        self.fetch_entities(Request::get(paths::STATS))
    }

    // -------------------------------------------------------------------------
    // Server information
    // -------------------------------------------------------------------------

    /// Server version details
    pub fn version(&self) -> Result<BTreeMap<String, String>> {
        self.fetch(Request::get(paths::VERSION), DEFAULT_ALLOW)
    }

    /// Names of the available aggregation functions
    pub fn aggregators(&self) -> Result<Vec<String>> {
        self.fetch(Request::get(paths::AGGREGATORS), DEFAULT_ALLOW)
    }

    /// Running configuration
    pub fn configuration(&self) -> Result<BTreeMap<String, String>> {
        self.fetch(Request::get(paths::CONFIG), DEFAULT_ALLOW)
    }

    /// Available tag filters and their descriptions
    pub fn filters(&self) -> Result<WireMap> {
        self.fetch(Request::get(paths::FILTERS), DEFAULT_ALLOW)
    }

    /// Available serializers
    pub fn serializers(&self) -> Result<Vec<Value>> {
        self.fetch(Request::get(paths::SERIALIZERS), DEFAULT_ALLOW)
    }

    /// Flush the server's name and UID caches
    pub fn drop_caches(&self) -> Result<WireMap> {
        info!("Dropping server caches");
        self.fetch(Request::get(paths::DROP_CACHES), DEFAULT_ALLOW)
    }

    // -------------------------------------------------------------------------
    // Annotations
    // -------------------------------------------------------------------------

    /// Fetch an annotation by start time and, for a local one, TSUID
    pub fn get_annotation(
        &self,
        start_time: i64,
        end_time: Option<i64>,
        tsuid: Option<&str>,
    ) -> Result<Annotation> {
        let mut request = Request::get(paths::ANNOTATION).with_param("startTime", start_time.to_string());
        if let Some(end_time) = end_time {
            request = request.with_param("endTime", end_time.to_string());
        }
        if let Some(tsuid) = tsuid {
            request = request.with_param("tsuid", tsuid);
        }
        self.fetch_entity(request, DEFAULT_ALLOW)
    }

    /// Create or update an annotation; returns the stored record
    pub fn set_annotation(&self, annotation: &Annotation) -> Result<Annotation> {
        annotation.check()?;
        let body = Value::Object(annotation.to_wire_map()?);
        self.fetch_entity(Request::post(paths::ANNOTATION).with_body(body), DEFAULT_ALLOW)
    }

    /// Delete an annotation
    pub fn delete_annotation(&self, annotation: &Annotation) -> Result<()> {
        let mut body = WireMap::new();
        body.insert("startTime".into(), json!(annotation.start_time));
        if let Some(end_time) = annotation.end_time {
            body.insert("endTime".into(), json!(end_time));
        }
        if let Some(tsuid) = &annotation.tsuid {
            body.insert("tsuid".into(), json!(tsuid));
        }
        self.execute(Request::delete(paths::ANNOTATION).with_body(Value::Object(body)), DEFAULT_ALLOW)?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // UIDs and metadata
    // -------------------------------------------------------------------------

    /// Request UIDs for names in bulk
    ///
    /// Per-name failures come back in the response's error tables, so a
    /// `400` is accepted here. Nothing is sent when every list is empty.
    pub fn assign_uid(&self, metric: &[String], tagk: &[String], tagv: &[String]) -> Result<AssignResponse> {
        let mut body = WireMap::new();
        for (key, names) in [("metric", metric), ("tagk", tagk), ("tagv", tagv)] {
            if !names.is_empty() {
                body.insert(key.into(), json!(names));
            }
        }
        if body.is_empty() {
            return Ok(AssignResponse::default());
        }
        debug!(metrics = metric.len(), tagks = tagk.len(), tagvs = tagv.len(), "Assigning UIDs");

        let request = Request::post(paths::UID_ASSIGN).with_body(Value::Object(body));
        let value = self
            .execute(request, &[200, 400])?
            .ok_or_else(|| empty_body(paths::UID_ASSIGN))?;
        AssignResponse::from_value(value)
    }

    /// Fetch the metadata of a series
    pub fn get_tsmeta(&self, tsuid: &str) -> Result<TsMeta> {
        self.fetch_entity(Request::get(paths::TSMETA).with_param("tsuid", tsuid), DEFAULT_ALLOW)
    }

    /// Find series metadata by `metric{k=v,...}` query
    pub fn find_tsmeta(&self, query: &str) -> Result<Vec<TsMeta>> {
        self.fetch_entities(Request::get(paths::TSMETA).with_param("m", query))
    }

    /// Update the metadata of a series; returns the stored record
    pub fn set_tsmeta(&self, tsuid: &str, patch: &TsMetaPatch) -> Result<TsMeta> {
        patch.check()?;
        let mut body = to_object(patch)?;
        body.insert("tsuid".into(), json!(tsuid));
        self.fetch_entity(Request::post(paths::TSMETA).with_body(Value::Object(body)), DEFAULT_ALLOW)
    }

    /// Create metadata for the series a `metric{k=v,...}` query names
    pub fn create_tsmeta(&self, query: &str, patch: &TsMetaPatch) -> Result<TsMeta> {
        patch.check()?;
        let request = Request::post(paths::TSMETA)
            .with_param("m", query)
            .with_param("create", "true")
            .with_body(Value::Object(to_object(patch)?));
        info!(query, "Creating TS metadata");
        self.fetch_entity(request, DEFAULT_ALLOW)
    }

    /// Delete the metadata of a series; its data points stay
    pub fn delete_tsmeta(&self, tsuid: &str) -> Result<()> {
        let request = Request::delete(paths::TSMETA).with_body(json!({ "tsuid": tsuid }));
        self.execute(request, DEFAULT_ALLOW)?;
        Ok(())
    }

    /// Fetch the metadata of a UID
    pub fn get_uidmeta(&self, uid: &str, kind: UidKind) -> Result<UidMeta> {
        let request = Request::get(paths::UIDMETA)
            .with_param("uid", uid)
            .with_param("type", kind.as_param());
        self.fetch_entity(request, DEFAULT_ALLOW)
    }

    /// Update the metadata of a UID; returns the stored record
    pub fn set_uidmeta(&self, uid: &str, kind: UidKind, patch: &UidMetaPatch) -> Result<UidMeta> {
        let mut body = to_object(patch)?;
        body.insert("uid".into(), json!(uid));
        body.insert("type".into(), json!(kind.as_param()));
        self.fetch_entity(Request::post(paths::UIDMETA).with_body(Value::Object(body)), DEFAULT_ALLOW)
    }

    /// Delete the metadata of a UID; the UID itself stays assigned
    pub fn delete_uidmeta(&self, uid: &str, kind: UidKind) -> Result<()> {
        let request =
            Request::delete(paths::UIDMETA).with_body(json!({ "uid": uid, "type": kind.as_param() }));
        self.execute(request, DEFAULT_ALLOW)?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Trees
    // -------------------------------------------------------------------------

    /// Create a tree; the store assigns its id
    pub fn create_tree(&self, tree: &TreeDefinition) -> Result<TreeDefinition> {
        let body = tree_body(tree, None);
        self.fetch_entity(Request::post(paths::TREE).with_body(body), DEFAULT_ALLOW)
    }

    /// Update the editable fields of a tree
    pub fn edit_tree(&self, tree: &TreeDefinition) -> Result<TreeDefinition> {
        let tree_id = tree
            .tree_id
            .ok_or_else(|| Error::validation(TreeDefinition::KIND, "tree has not been created"))?;
        let body = tree_body(tree, Some(tree_id));
        self.fetch_entity(Request::post(paths::TREE).with_body(body), DEFAULT_ALLOW)
    }

    /// Fetch a tree with its rules
    pub fn get_tree(&self, tree_id: u32) -> Result<TreeDefinition> {
        self.fetch_entity(Request::get(paths::TREE).with_param("treeId", tree_id.to_string()), DEFAULT_ALLOW)
    }

    /// Every tree in the store
    pub fn list_trees(&self) -> Result<Vec<TreeDefinition>> {
        self.fetch_entities(Request::get(paths::TREE))
    }

    /// Delete a tree's branches, and with `definition` the tree and its rules
    pub fn delete_tree(&self, tree_id: u32, definition: bool) -> Result<()> {
        let request = Request::delete(paths::TREE)
            .with_body(json!({ "treeId": tree_id, "definition": definition }));
        self.execute(request, DEFAULT_ALLOW)?;
        Ok(())
    }

    /// Fetch one branch, with stubs for its children
    pub fn get_tree_branch(&self, at: &BranchRef) -> Result<Branch> {
        let request = match at {
            BranchRef::Tree(tree_id) => Request::get(paths::TREE_BRANCH).with_param("treeId", tree_id.to_string()),
            BranchRef::Branch(branch_id) => Request::get(paths::TREE_BRANCH).with_param("branch", branch_id.as_str()),
        };
        self.fetch_entity(request, DEFAULT_ALLOW)
    }

    /// TSUIDs left out of a tree because they collided, mapped to the TSUID
    /// they collided with; every collision when `tsuids` is empty
    pub fn tree_collisions(&self, tree_id: u32, tsuids: &[String]) -> Result<BTreeMap<String, String>> {
        self.fetch(tsuid_request(paths::TREE_COLLISIONS, tree_id, tsuids), DEFAULT_ALLOW)
    }

    /// TSUIDs that failed to match a strict tree, with the reason
    pub fn tree_not_matched(&self, tree_id: u32, tsuids: &[String]) -> Result<BTreeMap<String, String>> {
        self.fetch(tsuid_request(paths::TREE_NOT_MATCHED, tree_id, tsuids), DEFAULT_ALLOW)
    }

    /// Dry-run series through a tree's rules
    pub fn test_tree(&self, tree_id: u32, tsuids: &[String]) -> Result<WireMap> {
        self.fetch(tsuid_request(paths::TREE_TEST, tree_id, tsuids), DEFAULT_ALLOW)
    }

    /// Fetch one rule by its key
    pub fn get_tree_rule(&self, tree_id: u32, level: u32, order: u32) -> Result<Rule> {
        let request = Request::get(paths::TREE_RULE)
            .with_param("treeId", tree_id.to_string())
            .with_param("level", level.to_string())
            .with_param("order", order.to_string());
        self.fetch_entity(request, DEFAULT_ALLOW)
    }

    /// Create or merge a rule
    ///
    /// Returns `None` when the store replied `304`: nothing changed.
    pub fn set_tree_rule(&self, rule: &Rule) -> Result<Option<Rule>> {
        rule.check()?;
        let body = Value::Object(rule.to_wire_map()?);
        let request = Request::post(paths::TREE_RULE).with_body(body);
        match self.execute(request, &[200, 204, 301, 304])? {
            Some(value) => decode_entity(value).map(Some),
            None => {
                debug!(tree_id = rule.tree_id, level = rule.level, order = rule.order, "Rule unchanged");
                Ok(None)
            }
        }
    }

    /// Delete one rule
    pub fn delete_tree_rule(&self, tree_id: u32, level: u32, order: u32) -> Result<()> {
        let request = Request::delete(paths::TREE_RULE)
            .with_body(json!({ "treeId": tree_id, "level": level, "order": order }));
        self.execute(request, &[204])?;
        Ok(())
    }

    /// Delete every rule of a tree
    pub fn delete_tree_rules(&self, tree_id: u32) -> Result<()> {
        let request = Request::delete(paths::TREE_RULES).with_body(json!({ "treeId": tree_id }));
        self.execute(request, &[204])?;
        info!(tree_id, "Tree rules deleted");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Queries, search and suggest
    // -------------------------------------------------------------------------

    /// Run a query; the endpoint follows from the query kind
    ///
    /// The query is validated first and nothing is sent if it is invalid.
    /// The result is returned as the store serialized it.
    pub fn query(&self, query: impl Into<QueryRequest>) -> Result<Value> {
        let query = query.into();
        query.check()?;
        let endpoint = query.endpoint();
        let request = Request::post(endpoint).with_body(Value::Object(query.to_wire_map()));
        Ok(self.execute(request, DEFAULT_ALLOW)?.unwrap_or(Value::Null))
    }

    /// Search metadata
    pub fn search(&self, mode: SearchMode, search: &SearchRequest) -> Result<WireMap> {
        if search.limit == 0 {
            return Err(Error::validation("SearchRequest", "limit must be positive"));
        }
        let request = match mode {
            SearchMode::Lookup => Request::get(mode.path())
                .with_param("m", search.ts_string())
                .with_param("use_meta", search.use_meta.to_string()),
            _ => Request::post(mode.path()).with_body(json!({
                "query": search.query,
                "limit": search.limit,
                "startIndex": search.start_index,
            })),
        };
        self.fetch(request, DEFAULT_ALLOW)
    }

    /// Names starting with `prefix`, for auto-completion
    pub fn suggest(&self, kind: SuggestKind, prefix: Option<&str>, max: Option<usize>) -> Result<Vec<String>> {
        let mut body = WireMap::new();
        body.insert("type".into(), serde_json::to_value(kind)?);
        if let Some(prefix) = prefix {
            body.insert("q".into(), json!(prefix));
        }
        match max {
            Some(0) => return Err(Error::validation("Suggest", "max must be positive")),
            Some(max) => {
                body.insert("max".into(), json!(max));
            }
            None => {}
        }
        self.fetch(Request::post(paths::SUGGEST).with_body(Value::Object(body)), DEFAULT_ALLOW)
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Error from a rejected response, falling back to the status table
fn error_from_body(status: u16, body: Option<&Value>) -> TransportError {
    match body.and_then(|b| b.get("error")) {
        Some(error) => error_from_object(status, error),
        None => {
            let message = status::describe(status)
                .map(str::to_string)
                .unwrap_or_else(|| format!("unexpected status {}", status));
            TransportError::new(status, message).with_details("Error message not received.")
        }
    }
}

/// Error from the store's `{"code", "message", "details", "trace"}` object
fn error_from_object(status: u16, error: &Value) -> TransportError {
    let code = error
        .get("code")
        .and_then(Value::as_u64)
        .and_then(|c| u16::try_from(c).ok())
        .unwrap_or(status);
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| status::describe(code).map(str::to_string))
        .unwrap_or_else(|| format!("unexpected status {}", code));

    let mut transport_error = TransportError::new(code, message);
    if let Some(details) = error.get("details").and_then(Value::as_str) {
        transport_error = transport_error.with_details(details);
    }
    if let Some(trace) = error.get("trace").and_then(Value::as_str) {
        transport_error = transport_error.with_trace(trace);
    }
    transport_error
}

fn empty_body(path: &str) -> Error {
    Error::protocol(format!("{} returned no body", path), Value::Null)
}

fn decode<D: DeserializeOwned>(value: Value, path: &str) -> Result<D> {
    serde_json::from_value(value.clone())
        .map_err(|e| Error::protocol(format!("unexpected response from {}: {}", path, e), value))
}

/// Decode an entity; one that fails validation is a protocol mismatch
fn decode_entity<E: Entity>(value: Value) -> Result<E> {
    match E::from_value(value.clone()) {
        Err(Error::Validation(e)) => Err(Error::protocol(format!("store returned an {}", e), value)),
        other => other,
    }
}

fn to_object<S: Serialize>(value: &S) -> Result<WireMap> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(Error::protocol("expected a JSON object", other)),
    }
}

fn tree_body(tree: &TreeDefinition, tree_id: Option<u32>) -> Value {
    let mut body = WireMap::new();
    if let Some(tree_id) = tree_id {
        body.insert("treeId".into(), json!(tree_id));
    }
    if let Some(name) = &tree.name {
        body.insert("name".into(), json!(name));
    }
    if let Some(description) = &tree.description {
        body.insert("description".into(), json!(description));
    }
    if let Some(notes) = &tree.notes {
        body.insert("notes".into(), json!(notes));
    }
    body.insert("strictMatch".into(), json!(tree.strict_match));
    body.insert("storeFailures".into(), json!(tree.store_failures));
    body.insert("enabled".into(), json!(tree.enabled));
    Value::Object(body)
}

fn tsuid_request(path: &str, tree_id: u32, tsuids: &[String]) -> Request {
    let request = Request::get(path).with_param("treeId", tree_id.to_string());
    if tsuids.is_empty() {
        request
    } else {
        request.with_param("tsuids", tsuids.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::StubTransport;

    fn client() -> Client<StubTransport> {
        Client::new(StubTransport::new())
    }

    #[test]
    fn test_error_body_is_used() {
        let client = client();
        client.transport().push_json(
            400,
            json!({"error": {"code": 400, "message": "Unknown aggregator", "details": "sumx", "trace": "at ..."}}),
        );
        let err = client.aggregators().unwrap_err();
        match err {
            Error::Transport(e) => {
                assert_eq!(e.code, 400);
                assert_eq!(e.message, "Unknown aggregator");
                assert_eq!(e.details.as_deref(), Some("sumx"));
                assert_eq!(e.trace.as_deref(), Some("at ..."));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_status_table_fallback() {
        let client = client();
        client.transport().push_empty(503);
        let err = client.version().unwrap_err();
        assert_eq!(err.status_code(), Some(503));
        if let Error::Transport(e) = err {
            assert!(e.message.contains("temporary overload"));
            assert_eq!(e.details.as_deref(), Some("Error message not received."));
        }
    }

    #[test]
    fn test_unknown_status() {
        let client = client();
        client.transport().push_empty(418);
        let err = client.version().unwrap_err();
        assert!(err.to_string().contains("unexpected status 418"));
    }

    #[test]
    fn test_bad_shape_is_protocol_mismatch() {
        let client = client();
        client.transport().push_json(200, json!({"not": "a list"}));
        assert!(matches!(client.aggregators(), Err(Error::ProtocolMismatch(_))));
    }

    #[test]
    fn test_raw_body_is_protocol_mismatch() {
        let client = client();
        client.transport().push_response(crate::transport::Response {
            status: 200,
            body: ResponseBody::Raw(b"<html>".to_vec()),
        });
        assert!(matches!(client.filters(), Err(Error::ProtocolMismatch(_))));
    }

    #[test]
    fn test_put_options_params() {
        let request = PutOptions::default().with_details().with_sync(Some(500)).apply(Request::post(paths::PUT));
        assert_eq!(request.param("details"), Some(""));
        assert_eq!(request.param("summary"), None);
        assert_eq!(request.param("sync_timeout"), Some("500"));
    }

    #[test]
    fn test_search_request_ts_string() {
        let search = SearchRequest::lookup("sys.cpu.0", [("host", "*"), ("dc", "lga")]);
        assert_eq!(search.ts_string(), "sys.cpu.0{dc=lga,host=*}");
        assert_eq!(SearchRequest::default().ts_string(), "*");
    }

    #[test]
    fn test_tsuid_request() {
        let request = tsuid_request(paths::TREE_TEST, 1, &["0001".to_string(), "0002".to_string()]);
        assert_eq!(request.param("tsuids"), Some("0001,0002"));
        assert_eq!(request.param("treeId"), Some("1"));
        assert_eq!(tsuid_request(paths::TREE_TEST, 1, &[]).param("tsuids"), None);
    }
}
