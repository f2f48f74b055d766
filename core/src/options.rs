//! Construction-time session settings.
//!
//! # Design
//! Everything here is applied to the transport handle once, when the session
//! is built. Timeouts can be changed later through `Session::set_timeouts`;
//! the method, target and TLS policy cannot. The struct derives serde so
//! callers can keep session presets in whatever config format they already
//! load; missing fields fall back to `Default`.

use serde::{Deserialize, Serialize};

use crate::http::HttpMethod;

/// Settings for `Session::with_options`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    pub method: HttpMethod,
    /// Accept any server certificate chain.
    pub skip_peer_verification: bool,
    /// Accept a certificate whose name does not match the target host.
    pub skip_hostname_verification: bool,
    /// Ask the transport to log the exchange to stderr.
    pub verbose: bool,
    /// Connection phase limit in seconds. Zero keeps the transport default.
    pub connect_timeout_secs: u64,
    /// Whole-transfer limit in seconds. Zero means unbounded.
    pub resource_timeout_secs: u64,
}

impl SessionOptions {
    pub fn method(method: HttpMethod) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }
}
