//! Retrying HTTP client and response decode helpers.
//!
//! # Design
//! `HttpClient` holds only resolved configuration and a shared transport, and
//! carries no mutable state between calls, so one instance can serve any
//! number of threads. Each call builds its `HttpRequest` once and hands it to
//! the retry loop, which re-sends it on transport failure only.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::cancel::CancelToken;
use crate::config::{ClientConfig, ResolvedConfig};
use crate::error::ClientError;
use crate::http::{Headers, HttpMethod, HttpRequest, InboundResponse};
use crate::retry::{self, RetryOutcome};
use crate::transport::{self, Transport, UreqTransport};

const CONTENT_TYPE: &str = "Content-Type";
const APPLICATION_JSON: &str = "application/json";

/// HTTP client with default headers, per-attempt timeout and fixed-delay retry.
#[derive(Clone)]
pub struct HttpClient {
    config: ResolvedConfig,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient").field("config", &self.config).finish_non_exhaustive()
    }
}

impl HttpClient {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_transport(config, UreqTransport::new())
    }

    pub fn with_transport(config: ClientConfig, transport: impl Transport + 'static) -> Self {
        Self {
            config: config.resolve(),
            transport: Arc::new(transport),
        }
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }

    /// Build the request that `execute` would send, without sending it.
    pub fn build_request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<Vec<u8>>,
        headers: Option<&Headers>,
    ) -> HttpRequest {
        let mut merged = self.config.headers.clone();
        if let Some(headers) = headers {
            merged.merge(headers);
        }
        HttpRequest {
            method,
            url: format!("{}{}", self.config.base_url, path),
            headers: merged,
            body,
        }
    }

    /// Send a request, retrying transport failures.
    ///
    /// Any response, whatever its status, is returned as-is.
    pub fn execute(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<Vec<u8>>,
        headers: Option<&Headers>,
    ) -> Result<InboundResponse, ClientError> {
        let request = self.build_request(method, path, body, headers);
        self.send(&request, None)
    }

    /// Like `execute`, but abortable through `cancel`.
    pub fn execute_with_cancel(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<Vec<u8>>,
        headers: Option<&Headers>,
        cancel: &CancelToken,
    ) -> Result<InboundResponse, ClientError> {
        let request = self.build_request(method, path, body, headers);
        self.send(&request, Some(cancel))
    }

    pub fn get(&self, path: &str, headers: Option<&Headers>) -> Result<InboundResponse, ClientError> {
        self.execute(HttpMethod::Get, path, None, headers)
    }

    pub fn get_with_cancel(
        &self,
        path: &str,
        headers: Option<&Headers>,
        cancel: &CancelToken,
    ) -> Result<InboundResponse, ClientError> {
        self.execute_with_cancel(HttpMethod::Get, path, None, headers, cancel)
    }

    pub fn delete(&self, path: &str, headers: Option<&Headers>) -> Result<InboundResponse, ClientError> {
        self.execute(HttpMethod::Delete, path, None, headers)
    }

    pub fn delete_with_cancel(
        &self,
        path: &str,
        headers: Option<&Headers>,
        cancel: &CancelToken,
    ) -> Result<InboundResponse, ClientError> {
        self.execute_with_cancel(HttpMethod::Delete, path, None, headers, cancel)
    }

    /// POST `data` as JSON.
    pub fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        data: &T,
        headers: Option<&Headers>,
    ) -> Result<InboundResponse, ClientError> {
        let (body, headers) = json_body(data, headers)?;
        self.execute(HttpMethod::Post, path, Some(body), Some(&headers))
    }

    pub fn post_with_cancel<T: Serialize + ?Sized>(
        &self,
        path: &str,
        data: &T,
        headers: Option<&Headers>,
        cancel: &CancelToken,
    ) -> Result<InboundResponse, ClientError> {
        let (body, headers) = json_body(data, headers)?;
        self.execute_with_cancel(HttpMethod::Post, path, Some(body), Some(&headers), cancel)
    }

    /// PUT `data` as JSON.
    pub fn put<T: Serialize + ?Sized>(
        &self,
        path: &str,
        data: &T,
        headers: Option<&Headers>,
    ) -> Result<InboundResponse, ClientError> {
        let (body, headers) = json_body(data, headers)?;
        self.execute(HttpMethod::Put, path, Some(body), Some(&headers))
    }

    pub fn put_with_cancel<T: Serialize + ?Sized>(
        &self,
        path: &str,
        data: &T,
        headers: Option<&Headers>,
        cancel: &CancelToken,
    ) -> Result<InboundResponse, ClientError> {
        let (body, headers) = json_body(data, headers)?;
        self.execute_with_cancel(HttpMethod::Put, path, Some(body), Some(&headers), cancel)
    }

    fn send(&self, request: &HttpRequest, cancel: Option<&CancelToken>) -> Result<InboundResponse, ClientError> {
        transport::validate_url(&request.url).map_err(ClientError::InvalidRequest)?;

        let outcome = retry::run(&self.config.retry, cancel, |attempt| {
            let timeout = match cancel.and_then(CancelToken::remaining) {
                Some(remaining) => remaining.min(self.config.timeout),
                None => self.config.timeout,
            };
            debug!(method = %request.method, url = %request.url, attempt, ?timeout, "sending request");
            self.transport.send(request, timeout)
        });

        match outcome {
            RetryOutcome::Succeeded { value, attempts } => {
                debug!(status = value.status, attempts, "received response");
                Ok(value)
            }
            RetryOutcome::Exhausted { error, attempts } => Err(ClientError::Transport {
                attempts,
                source: error,
            }),
            RetryOutcome::Cancelled {
                attempts,
                last_error,
            } => Err(ClientError::Cancelled {
                attempts,
                last_error,
            }),
        }
    }
}

/// Serialize `data` and put `Content-Type: application/json` under the
/// caller's headers, so an explicit caller value still wins.
fn json_body<T: Serialize + ?Sized>(
    data: &T,
    headers: Option<&Headers>,
) -> Result<(Vec<u8>, Headers), ClientError> {
    let body = serde_json::to_vec(data).map_err(|e| ClientError::SerializationError(e.to_string()))?;
    let mut merged = Headers::new();
    merged.set(CONTENT_TYPE, APPLICATION_JSON);
    if let Some(headers) = headers {
        merged.merge(headers);
    }
    Ok((body, merged))
}

/// Read the whole body and parse it as JSON into `T`.
///
/// The body is consumed whether or not decoding succeeds.
pub fn decode_json<T: DeserializeOwned>(response: InboundResponse) -> Result<T, ClientError> {
    let bytes = response
        .body
        .read_to_end()
        .map_err(|e| ClientError::DecodeError(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| ClientError::DecodeError(e.to_string()))
}

/// Read the whole body as bytes. An empty body yields an empty vector.
pub fn read_raw(response: InboundResponse) -> Result<Vec<u8>, ClientError> {
    response
        .body
        .read_to_end()
        .map_err(|e| ClientError::IoError(e.to_string()))
}
