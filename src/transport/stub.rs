//! In-memory transport for tests
//!
//! [`StubTransport`] replays scripted responses in order and records every
//! request it receives. It never touches the network.
//!
//! # Example
//!
//! ```rust
//! use opentsdb_client::transport::{paths, Request, StubTransport, Transport};
//! use serde_json::json;
//!
//! let stub = StubTransport::new();
//! stub.push_json(200, json!({"version": "2.4.0"}));
//!
//! let resp = stub.send(&Request::get(paths::VERSION)).unwrap();
//! assert_eq!(resp.status, 200);
//! assert_eq!(stub.request_count(), 1);
//! ```
//!
//! # Warning
//!
//! Once the script runs out, every further request fails with a connection
//! error (code 0). Tests that expect no I/O can assert on
//! [`StubTransport::request_count`].

use super::{Request, Response, Transport};
use crate::error::TransportError;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;

/// Scripted transport
#[derive(Debug, Default)]
pub struct StubTransport {
    responses: Mutex<VecDeque<Result<Response, TransportError>>>,
    requests: Mutex<Vec<Request>>,
}

impl StubTransport {
    /// Create a stub with an empty script
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response
    pub fn push_response(&self, response: Response) {
        self.responses.lock().push_back(Ok(response));
    }

    /// Queue a JSON response
    pub fn push_json(&self, status: u16, body: Value) {
        self.push_response(Response::json(status, body));
    }

    /// Queue a response without a body
    pub fn push_empty(&self, status: u16) {
        self.push_response(Response::empty(status));
    }

    /// Queue a transport-level failure
    pub fn push_failure(&self, error: TransportError) {
        self.responses.lock().push_back(Err(error));
    }

    /// All requests received so far, oldest first
    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().clone()
    }

    /// Most recent request
    pub fn last_request(&self) -> Option<Request> {
        self.requests.lock().last().cloned()
    }

    /// Number of requests received
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Number of scripted responses not yet consumed
    pub fn remaining(&self) -> usize {
        self.responses.lock().len()
    }
}

impl Transport for StubTransport {
    fn send(&self, request: &Request) -> Result<Response, TransportError> {
        self.requests.lock().push(request.clone());
        self.responses.lock().pop_front().unwrap_or_else(|| {
            Err(TransportError::connection(format!(
                "no scripted response for {} {}",
                request.method, request.path
            )))
        })
    }
}
