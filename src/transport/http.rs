//! Blocking HTTP transport backed by `reqwest`

use super::{Method, Request, Response, ResponseBody, Transport};
use crate::config::ConnectionConfig;
use crate::error::{Error, Result, TransportError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Sends requests to a store over HTTP
///
/// One request per call, no retries. Timeouts come from [`ConnectionConfig`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    http_client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Build a transport for the configured host
    pub fn new(config: &ConnectionConfig) -> Result<Self> {
        config.validate()?;
        let http_client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.base_url(),
            http_client,
        })
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request_builder(&self, request: &Request) -> reqwest::blocking::RequestBuilder {
        let url = format!("{}{}", self.base_url, request.path);
        let builder = match request.method {
            Method::Get => self.http_client.get(&url),
            Method::Post => self.http_client.post(&url),
            Method::Put => self.http_client.put(&url),
            Method::Delete => self.http_client.delete(&url),
        };
        let builder = if request.query.is_empty() {
            builder
        } else {
            builder.query(&request.query)
        };
        match &request.body {
            Some(body) => builder.json(body),
            None => builder,
        }
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &Request) -> std::result::Result<Response, TransportError> {
        let start = Instant::now();
        debug!(method = %request.method, path = %request.path, "Sending request");

        let response = self.request_builder(request).send().map_err(|e| {
            warn!(method = %request.method, path = %request.path, error = %e, "Request failed");
            TransportError::connection(e.to_string())
        })?;

        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .map_err(|e| TransportError::new(status, format!("Failed to read body: {}", e)))?;

        debug!(
            status,
            duration_ms = start.elapsed().as_millis() as u64,
            "Response received"
        );

        let body = if bytes.is_empty() {
            ResponseBody::Empty
        } else {
            match serde_json::from_slice(&bytes) {
                Ok(value) => ResponseBody::Json(value),
                Err(_) => ResponseBody::Raw(bytes.to_vec()),
            }
        };

        Ok(Response { status, body })
    }
}
