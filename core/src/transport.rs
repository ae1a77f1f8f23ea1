//! The seam between `HttpClient` and the network.
//!
//! # Design
//! `HttpClient` owns request building and the retry loop; a `Transport` only
//! performs one delivery of an already-built `HttpRequest`. Tests substitute
//! scripted transports here to count attempts without a network.

use std::time::Duration;

use ureq::http;

use crate::error::TransportError;
use crate::http::{Headers, HttpRequest, InboundResponse, ResponseBody};

/// Delivers one request and returns the response with its body unread.
///
/// Implementations must return `Ok` for every response that has a status
/// line, including 4xx/5xx, and `Err` only for transport-level failures.
pub trait Transport: Send + Sync {
    fn send(&self, request: &HttpRequest, timeout: Duration) -> Result<InboundResponse, TransportError>;
}

/// `Transport` backed by a shared `ureq::Agent`.
///
/// The agent pools connections, so one `UreqTransport` should be reused
/// across requests.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl UreqTransport {
    pub fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }

    pub fn with_agent(agent: ureq::Agent) -> Self {
        Self { agent }
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: &HttpRequest, timeout: Duration) -> Result<InboundResponse, TransportError> {
        let mut builder = http::Request::builder()
            .method(request.method.as_str())
            .uri(request.url.as_str());
        for (name, value) in request.headers.iter() {
            builder = builder.header(name, value);
        }

        let response = match &request.body {
            Some(body) => {
                let req = builder
                    .body(body.clone())
                    .map_err(|e| TransportError::Other(e.to_string()))?;
                let req = self
                    .agent
                    .configure_request(req)
                    .timeout_global(Some(timeout))
                    .build();
                self.agent.run(req)
            }
            None => {
                let req = builder
                    .body(())
                    .map_err(|e| TransportError::Other(e.to_string()))?;
                let req = self
                    .agent
                    .configure_request(req)
                    .timeout_global(Some(timeout))
                    .build();
                self.agent.run(req)
            }
        }
        .map_err(classify)?;

        let status = response.status().as_u16();
        let headers: Headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = ResponseBody::new(response.into_body().into_reader());

        Ok(InboundResponse::new(status, headers, body))
    }
}

fn classify(err: ureq::Error) -> TransportError {
    let message = err.to_string();
    match err {
        ureq::Error::Timeout(_) => TransportError::Timeout(message),
        ureq::Error::HostNotFound | ureq::Error::ConnectionFailed => TransportError::Connect(message),
        ureq::Error::Io(io) if io.kind() == std::io::ErrorKind::ConnectionRefused => {
            TransportError::Connect(message)
        }
        ureq::Error::Io(io)
            if matches!(io.kind(), std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock) =>
        {
            TransportError::Timeout(message)
        }
        ureq::Error::Io(_) => TransportError::Io(message),
        _ => TransportError::Other(message),
    }
}

/// Build the `http::Uri` once so a malformed URL fails before any attempt.
pub(crate) fn validate_url(url: &str) -> Result<(), String> {
    let uri: http::Uri = url.parse().map_err(|e: http::uri::InvalidUri| e.to_string())?;
    if uri.scheme().is_none() || uri.host().is_none() {
        return Err(format!("{url}: expected an absolute http(s) URL"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_accepts_absolute_urls() {
        assert!(validate_url("http://localhost:3000/test").is_ok());
        assert!(validate_url("https://example.com").is_ok());
    }

    #[test]
    fn validate_rejects_relative_or_garbage() {
        assert!(validate_url("/just/a/path").is_err());
        assert!(validate_url("http://exa mple.com").is_err());
        assert!(validate_url("http://localhost:3000/echo/a b").is_err());
    }

    #[test]
    fn classify_timeout_and_connect() {
        assert!(matches!(
            classify(ureq::Error::ConnectionFailed),
            TransportError::Connect(_)
        ));
        assert!(matches!(
            classify(ureq::Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "refused"
            ))),
            TransportError::Connect(_)
        ));
        assert!(matches!(
            classify(ureq::Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "eof"
            ))),
            TransportError::Io(_)
        ));
        assert!(matches!(
            classify(ureq::Error::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "read timed out"
            ))),
            TransportError::Timeout(_)
        ));
    }
}
