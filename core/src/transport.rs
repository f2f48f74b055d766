//! The transport seam and its libcurl implementation.
//!
//! # Design
//! `Transport` is the narrow set of operations the session needs from an
//! HTTP engine: option setters, a header list, a body payload, one blocking
//! perform that streams the response into a caller-supplied sink, and a way
//! to read the HTTP status afterwards. Options stick on the handle until they
//! are set again, so the session only pushes what changed.
//!
//! `CurlTransport` owns one `curl::easy::Easy` handle for its whole life.
//! The write callback is installed through `Easy::transfer`, which scopes the
//! closure (and the buffer it borrows) to a single perform.

use std::time::Duration;

use curl::easy::{Auth, Easy, List};

use crate::auth::AuthMethods;
use crate::error::RequestError;

/// Operations a session drives on its transport handle.
///
/// Implementations own their handle exclusively. Nothing here is required to
/// be re-entrant: the session never calls into a transport from two threads.
pub trait Transport: Send {
    fn set_url(&mut self, url: &str) -> Result<(), RequestError>;

    /// Override the verb sent in the request line.
    fn set_custom_method(&mut self, method: &str) -> Result<(), RequestError>;

    fn set_verbose(&mut self, verbose: bool) -> Result<(), RequestError>;

    fn set_verify_peer(&mut self, verify: bool) -> Result<(), RequestError>;

    fn set_verify_host(&mut self, verify: bool) -> Result<(), RequestError>;

    /// Disable signal-based timeouts so the handle is usable off the main thread.
    fn set_no_signal(&mut self, no_signal: bool) -> Result<(), RequestError>;

    fn set_connect_timeout(&mut self, timeout: Duration) -> Result<(), RequestError>;

    /// Total time allowed for the transfer. Zero means unbounded.
    fn set_timeout(&mut self, timeout: Duration) -> Result<(), RequestError>;

    fn set_auth(&mut self, methods: AuthMethods) -> Result<(), RequestError>;

    fn set_username(&mut self, username: &str) -> Result<(), RequestError>;

    fn set_password(&mut self, password: &str) -> Result<(), RequestError>;

    /// Replace the active header set with `lines`, each formatted `Name: value`.
    fn set_headers(&mut self, lines: &[String]) -> Result<(), RequestError>;

    /// Attach `body` as the outgoing payload, or detach any payload on `None`.
    fn set_body(&mut self, body: Option<&[u8]>) -> Result<(), RequestError>;

    /// Run the transfer to completion.
    ///
    /// `sink` is called once per received chunk and returns how many bytes it
    /// consumed; a short count aborts the transfer with a write error.
    fn perform(&mut self, sink: &mut dyn FnMut(&[u8]) -> usize) -> Result<(), RequestError>;

    /// HTTP status of the last completed transfer.
    fn response_code(&mut self) -> Result<u32, RequestError>;
}

/// libcurl easy handle behind the `Transport` seam.
pub struct CurlTransport {
    easy: Easy,
}

impl CurlTransport {
    pub fn new() -> Self {
        Self { easy: Easy::new() }
    }
}

impl Default for CurlTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CurlTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurlTransport").finish_non_exhaustive()
    }
}

/// Translate the bitmask into curl's builder, one flag at a time.
fn curl_auth(methods: AuthMethods) -> Auth {
    let mut auth = Auth::new();
    auth.basic(methods.contains(AuthMethods::BASIC))
        .digest(methods.contains(AuthMethods::DIGEST))
        .gssnegotiate(methods.contains(AuthMethods::NEGOTIATE))
        .ntlm(methods.contains(AuthMethods::NTLM))
        .digest_ie(methods.contains(AuthMethods::DIGEST_IE))
        .ntlm_wb(methods.contains(AuthMethods::NTLM_WB));
    auth
}

impl Transport for CurlTransport {
    fn set_url(&mut self, url: &str) -> Result<(), RequestError> {
        Ok(self.easy.url(url)?)
    }

    fn set_custom_method(&mut self, method: &str) -> Result<(), RequestError> {
        Ok(self.easy.custom_request(method)?)
    }

    fn set_verbose(&mut self, verbose: bool) -> Result<(), RequestError> {
        Ok(self.easy.verbose(verbose)?)
    }

    fn set_verify_peer(&mut self, verify: bool) -> Result<(), RequestError> {
        Ok(self.easy.ssl_verify_peer(verify)?)
    }

    fn set_verify_host(&mut self, verify: bool) -> Result<(), RequestError> {
        Ok(self.easy.ssl_verify_host(verify)?)
    }

    fn set_no_signal(&mut self, no_signal: bool) -> Result<(), RequestError> {
        Ok(self.easy.signal(!no_signal)?)
    }

    fn set_connect_timeout(&mut self, timeout: Duration) -> Result<(), RequestError> {
        Ok(self.easy.connect_timeout(timeout)?)
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), RequestError> {
        Ok(self.easy.timeout(timeout)?)
    }

    fn set_auth(&mut self, methods: AuthMethods) -> Result<(), RequestError> {
        Ok(self.easy.http_auth(&curl_auth(methods))?)
    }

    fn set_username(&mut self, username: &str) -> Result<(), RequestError> {
        Ok(self.easy.username(username)?)
    }

    fn set_password(&mut self, password: &str) -> Result<(), RequestError> {
        Ok(self.easy.password(password)?)
    }

    fn set_headers(&mut self, lines: &[String]) -> Result<(), RequestError> {
        let mut list = List::new();
        for line in lines {
            list.append(line)?;
        }
        Ok(self.easy.http_headers(list)?)
    }

    fn set_body(&mut self, body: Option<&[u8]>) -> Result<(), RequestError> {
        match body {
            Some(bytes) => self.easy.post_fields_copy(bytes)?,
            // Back to a plain request with no upload; the method override
            // set at construction still decides the verb.
            None => self.easy.get(true)?,
        }
        Ok(())
    }

    fn perform(&mut self, sink: &mut dyn FnMut(&[u8]) -> usize) -> Result<(), RequestError> {
        let mut transfer = self.easy.transfer();
        transfer.write_function(|chunk| Ok(sink(chunk)))?;
        transfer.perform()?;
        Ok(())
    }

    fn response_code(&mut self) -> Result<u32, RequestError> {
        Ok(self.easy.response_code()?)
    }
}
