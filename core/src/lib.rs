//! Single-request HTTP sessions over libcurl.
//!
//! # Overview
//! A `Session` holds one request's configuration (method, target, headers,
//! body, TLS policy, timeouts, credentials) and one transport handle. Calling
//! `perform` runs the request and returns the status code and raw body, or a
//! `RequestError` when the transport itself fails. `perform_async` runs the
//! same thing on a caller-chosen `WorkQueue` and reports through a callback.
//!
//! # Design
//! - The handle is created once per session and reused by every `perform`.
//! - Headers and body are staged and marked dirty; `perform` pushes only what
//!   changed, immediately before the transfer.
//! - Timeouts and credentials go onto the handle as soon as they are set.
//! - The response body is buffered in full, in a buffer owned by one call.
//! - `Transport` is the seam to the HTTP engine; `CurlTransport` is the
//!   default and only production implementation.

pub mod auth;
pub mod buffer;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod options;
pub mod session;
pub mod transport;

pub use auth::AuthMethods;
pub use buffer::ResponseBuffer;
pub use dispatch::{Job, ThreadQueue, WorkQueue};
pub use error::RequestError;
pub use http::{HttpMethod, Response};
pub use options::SessionOptions;
pub use session::Session;
pub use transport::{CurlTransport, Transport};
