//! Blocking HTTP client with default headers, timeouts and fixed-delay retry.
//!
//! # Overview
//! `HttpClient` turns a base URL, a path, a method, an optional body and
//! optional headers into one request, then delivers it with bounded retries.
//! Only transport-level failures (refused connection, DNS, timeout) are
//! retried. A response with any status, 4xx and 5xx included, ends the loop
//! and is handed back with its body unread.
//!
//! # Design
//! - `ClientConfig` is plain data; zero-valued timeout, retry count and retry
//!   delay are replaced by defaults when the client is built.
//! - `HttpClient` is immutable after construction and cheap to clone, so it
//!   can be shared across threads without locking.
//! - The network sits behind the `Transport` trait. `UreqTransport` is the
//!   default; tests plug in scripted transports.
//! - `decode_json` and `read_raw` take the response by value: a body can only
//!   be read once, and it is released when the helper returns.

pub mod cancel;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod retry;
pub mod transport;

pub use cancel::CancelToken;
pub use client::{decode_json, read_raw, HttpClient};
pub use config::{ClientConfig, ResolvedConfig};
pub use error::{ClientError, ConfigError, TransportError};
pub use http::{Headers, HttpMethod, HttpRequest, InboundResponse, ResponseBody};
pub use retry::{RetryOutcome, RetryPolicy};
pub use transport::{Transport, UreqTransport};
