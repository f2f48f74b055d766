//! One reusable request bound to one transport handle.
//!
//! # Design
//! The transport handle is created with the session and dropped with it.
//! Method, target and TLS policy go onto the handle once, at construction.
//! Timeouts and credentials are pushed the moment they are set. Headers and
//! the body are only staged: each has a dirty flag, and `perform` pushes
//! whatever is dirty right before it runs the transfer. Anything already on
//! the handle stays there across calls until it is changed again.
//!
//! Staging never fails. If pushing an immediate option is rejected by the
//! transport, the error is held and returned by the next `perform` in place
//! of a transfer.

use std::time::Duration;

use tracing::{debug, debug_span, warn};

use crate::auth::AuthMethods;
use crate::buffer::ResponseBuffer;
use crate::dispatch::WorkQueue;
use crate::error::RequestError;
use crate::http::{HttpMethod, Response};
use crate::options::SessionOptions;
use crate::transport::{CurlTransport, Transport};

/// A configured HTTP request that can be executed any number of times.
///
/// `perform` takes `&mut self`, so one session cannot run two transfers at
/// once. Use one session per concurrent request.
#[derive(Debug)]
pub struct Session<T: Transport = CurlTransport> {
    method: HttpMethod,
    target: String,
    skip_peer_verification: bool,
    skip_hostname_verification: bool,
    connect_timeout_secs: u64,
    resource_timeout_secs: u64,
    pending_body: Option<Vec<u8>>,
    pending_headers: Vec<(String, String)>,
    headers_dirty: bool,
    body_dirty: bool,
    deferred_error: Option<RequestError>,
    transport: T,
}

impl Session<CurlTransport> {
    /// A GET session for `url` with full TLS verification.
    pub fn new(url: &str) -> Result<Self, RequestError> {
        Self::with_options(url, SessionOptions::default())
    }

    pub fn with_options(url: &str, options: SessionOptions) -> Result<Self, RequestError> {
        Self::with_transport(CurlTransport::new(), url, options)
    }
}

impl<T: Transport> Session<T> {
    /// Build a session on an existing transport handle.
    ///
    /// Fails only if the transport rejects one of the construction-time
    /// options, for example a URL it cannot store.
    pub fn with_transport(
        mut transport: T,
        url: &str,
        options: SessionOptions,
    ) -> Result<Self, RequestError> {
        transport.set_url(url)?;
        transport.set_custom_method(options.method.as_str())?;
        transport.set_verbose(options.verbose)?;
        transport.set_verify_peer(!options.skip_peer_verification)?;
        transport.set_verify_host(!options.skip_hostname_verification)?;
        transport.set_no_signal(true)?;
        transport.set_connect_timeout(Duration::from_secs(options.connect_timeout_secs))?;
        transport.set_timeout(Duration::from_secs(options.resource_timeout_secs))?;

        debug!(method = %options.method, target = url, "session created");

        Ok(Self {
            method: options.method,
            target: url.to_string(),
            skip_peer_verification: options.skip_peer_verification,
            skip_hostname_verification: options.skip_hostname_verification,
            connect_timeout_secs: options.connect_timeout_secs,
            resource_timeout_secs: options.resource_timeout_secs,
            pending_body: None,
            pending_headers: Vec::new(),
            headers_dirty: false,
            body_dirty: false,
            deferred_error: None,
            transport,
        })
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn skips_peer_verification(&self) -> bool {
        self.skip_peer_verification
    }

    pub fn skips_hostname_verification(&self) -> bool {
        self.skip_hostname_verification
    }

    pub fn connect_timeout_secs(&self) -> u64 {
        self.connect_timeout_secs
    }

    pub fn resource_timeout_secs(&self) -> u64 {
        self.resource_timeout_secs
    }

    /// Headers staged for the next transfer, in insertion order.
    pub fn headers(&self) -> &[(String, String)] {
        &self.pending_headers
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.pending_body.as_deref()
    }

    /// Append a header. Repeated names are kept and sent in order.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.pending_headers.push((name.into(), value.into()));
        self.headers_dirty = true;
    }

    pub fn clear_headers(&mut self) {
        self.pending_headers.clear();
        self.headers_dirty = true;
    }

    /// Replace the payload. `None` sends no body.
    pub fn set_body(&mut self, body: Option<Vec<u8>>) {
        self.pending_body = body;
        self.body_dirty = true;
    }

    /// Set both timeouts, in seconds, on the handle right away.
    pub fn set_timeouts(&mut self, connect_secs: u64, resource_secs: u64) {
        self.connect_timeout_secs = connect_secs;
        self.resource_timeout_secs = resource_secs;
        let applied = self
            .transport
            .set_connect_timeout(Duration::from_secs(connect_secs))
            .and_then(|()| self.transport.set_timeout(Duration::from_secs(resource_secs)));
        self.defer(applied);
    }

    /// Set credentials and the schemes allowed to carry them, right away.
    pub fn authenticate(&mut self, methods: AuthMethods, username: &str, password: &str) {
        let applied = self
            .transport
            .set_auth(methods)
            .and_then(|()| self.transport.set_username(username))
            .and_then(|()| self.transport.set_password(password));
        self.defer(applied);
    }

    /// Run the transfer and wait for it to finish.
    ///
    /// Any HTTP status, including 4xx and 5xx, is a `Response`. Only a
    /// transport-level failure is an error, and it leaves the session usable.
    pub fn perform(&mut self) -> Result<Response, RequestError> {
        let span = debug_span!("perform", method = %self.method, target = %self.target);
        let _enter = span.enter();

        if let Some(err) = self.deferred_error.take() {
            warn!(code = err.code(), "option was rejected before transfer");
            return Err(err);
        }

        self.reconcile()?;

        let mut buffer = ResponseBuffer::new();
        if let Err(err) = self.transport.perform(&mut |chunk: &[u8]| buffer.append(chunk)) {
            warn!(code = err.code(), description = err.description(), "transfer failed");
            return Err(err);
        }

        let status = self.transport.response_code()?;
        let body = buffer.into_bytes();
        debug!(status, bytes = body.len(), "transfer complete");
        Ok(Response { status, body })
    }

    /// Push dirty headers and body onto the handle.
    ///
    /// A flag is cleared only after its push succeeds, so a rejected push is
    /// retried by the next call.
    fn reconcile(&mut self) -> Result<(), RequestError> {
        if self.headers_dirty {
            let lines: Vec<String> = self
                .pending_headers
                .iter()
                .map(|(name, value)| format!("{name}: {value}"))
                .collect();
            self.transport.set_headers(&lines)?;
            self.headers_dirty = false;
            debug!(count = lines.len(), "applied header set");
        }
        if self.body_dirty {
            self.transport.set_body(self.pending_body.as_deref())?;
            self.body_dirty = false;
            debug!(bytes = self.pending_body.as_ref().map(Vec::len), "applied body");
        }
        Ok(())
    }

    fn defer(&mut self, applied: Result<(), RequestError>) {
        if let Err(err) = applied {
            warn!(code = err.code(), description = err.description(), "transport rejected option");
            self.deferred_error.get_or_insert(err);
        }
    }
}

impl<T: Transport + 'static> Session<T> {
    /// Run `perform` on `queue` and hand the session back with the result.
    ///
    /// `completion` is called exactly once, on the queue's thread.
    pub fn perform_async<Q, F>(self, queue: &Q, completion: F)
    where
        Q: WorkQueue + ?Sized,
        F: FnOnce(Self, Result<Response, RequestError>) + Send + 'static,
    {
        let mut session = self;
        queue.submit(Box::new(move || {
            let result = session.perform();
            completion(session, result);
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::ThreadQueue;
    use std::sync::mpsc;

    /// Records every option push and replays a scripted outcome.
    #[derive(Debug, Default)]
    struct RecordingTransport {
        url: Option<String>,
        custom_method: Option<String>,
        verify_peer: Option<bool>,
        verify_host: Option<bool>,
        no_signal: Option<bool>,
        connect_timeout: Option<Duration>,
        timeout: Option<Duration>,
        auth: Option<AuthMethods>,
        username: Option<String>,
        password: Option<String>,
        header_pushes: Vec<Vec<String>>,
        body_pushes: Vec<Option<Vec<u8>>>,
        performs: usize,
        status: u32,
        chunks: Vec<Vec<u8>>,
        failure: Option<RequestError>,
        reject_auth: bool,
        reject_headers: bool,
        /// Headers and body on the handle at the moment of each perform.
        seen: Vec<(Vec<String>, Option<Vec<u8>>)>,
    }

    impl RecordingTransport {
        fn replying(status: u32, body: &[u8]) -> Self {
            Self {
                status,
                chunks: vec![body.to_vec()],
                ..Self::default()
            }
        }

        fn failing(err: RequestError) -> Self {
            Self {
                failure: Some(err),
                ..Self::default()
            }
        }

        fn active_headers(&self) -> Vec<String> {
            self.header_pushes.last().cloned().unwrap_or_default()
        }

        fn active_body(&self) -> Option<Vec<u8>> {
            self.body_pushes.last().cloned().flatten()
        }
    }

    impl Transport for RecordingTransport {
        fn set_url(&mut self, url: &str) -> Result<(), RequestError> {
            self.url = Some(url.to_string());
            Ok(())
        }

        fn set_custom_method(&mut self, method: &str) -> Result<(), RequestError> {
            self.custom_method = Some(method.to_string());
            Ok(())
        }

        fn set_verbose(&mut self, _verbose: bool) -> Result<(), RequestError> {
            Ok(())
        }

        fn set_verify_peer(&mut self, verify: bool) -> Result<(), RequestError> {
            self.verify_peer = Some(verify);
            Ok(())
        }

        fn set_verify_host(&mut self, verify: bool) -> Result<(), RequestError> {
            self.verify_host = Some(verify);
            Ok(())
        }

        fn set_no_signal(&mut self, no_signal: bool) -> Result<(), RequestError> {
            self.no_signal = Some(no_signal);
            Ok(())
        }

        fn set_connect_timeout(&mut self, timeout: Duration) -> Result<(), RequestError> {
            self.connect_timeout = Some(timeout);
            Ok(())
        }

        fn set_timeout(&mut self, timeout: Duration) -> Result<(), RequestError> {
            self.timeout = Some(timeout);
            Ok(())
        }

        fn set_auth(&mut self, methods: AuthMethods) -> Result<(), RequestError> {
            if self.reject_auth {
                return Err(RequestError::curl(4, "Unsupported feature"));
            }
            self.auth = Some(methods);
            Ok(())
        }

        fn set_username(&mut self, username: &str) -> Result<(), RequestError> {
            self.username = Some(username.to_string());
            Ok(())
        }

        fn set_password(&mut self, password: &str) -> Result<(), RequestError> {
            self.password = Some(password.to_string());
            Ok(())
        }

        fn set_headers(&mut self, lines: &[String]) -> Result<(), RequestError> {
            if self.reject_headers {
                return Err(RequestError::curl(43, "A libcurl function was given a bad argument"));
            }
            self.header_pushes.push(lines.to_vec());
            Ok(())
        }

        fn set_body(&mut self, body: Option<&[u8]>) -> Result<(), RequestError> {
            self.body_pushes.push(body.map(<[u8]>::to_vec));
            Ok(())
        }

        fn perform(&mut self, sink: &mut dyn FnMut(&[u8]) -> usize) -> Result<(), RequestError> {
            self.performs += 1;
            self.seen.push((self.active_headers(), self.active_body()));
            if let Some(err) = &self.failure {
                return Err(err.clone());
            }
            for chunk in &self.chunks {
                if sink(chunk.as_slice()) != chunk.len() {
                    return Err(RequestError::curl(23, "Failed writing received data to disk/application"));
                }
            }
            Ok(())
        }

        fn response_code(&mut self) -> Result<u32, RequestError> {
            Ok(self.status)
        }
    }

    fn session(transport: RecordingTransport) -> Session<RecordingTransport> {
        Session::with_transport(transport, "http://example.test/resource", SessionOptions::default())
            .unwrap()
    }

    #[test]
    fn construction_applies_target_method_and_tls_policy() {
        let options = SessionOptions {
            method: HttpMethod::Post,
            skip_peer_verification: true,
            skip_hostname_verification: false,
            connect_timeout_secs: 5,
            ..SessionOptions::default()
        };
        let s = Session::with_transport(RecordingTransport::default(), "https://example.test/", options)
            .unwrap();

        assert_eq!(s.transport.url.as_deref(), Some("https://example.test/"));
        assert_eq!(s.transport.custom_method.as_deref(), Some("POST"));
        assert_eq!(s.transport.verify_peer, Some(false));
        assert_eq!(s.transport.verify_host, Some(true));
        assert_eq!(s.transport.no_signal, Some(true));
        assert_eq!(s.transport.connect_timeout, Some(Duration::from_secs(5)));
        assert_eq!(s.transport.timeout, Some(Duration::ZERO));
        assert_eq!(s.method(), HttpMethod::Post);
        assert!(s.skips_peer_verification());
        assert!(!s.skips_hostname_verification());
        assert!(!s.headers_dirty);
        assert!(!s.body_dirty);
    }

    #[test]
    fn headers_are_staged_until_perform() {
        let mut s = session(RecordingTransport::replying(200, b"ok"));
        s.set_header("Accept", "application/json");
        assert!(s.headers_dirty);
        assert!(s.transport.header_pushes.is_empty());

        s.perform().unwrap();
        assert!(!s.headers_dirty);
        assert_eq!(s.transport.header_pushes, vec![vec!["Accept: application/json".to_string()]]);
    }

    #[test]
    fn second_perform_without_changes_pushes_nothing() {
        let mut s = session(RecordingTransport::replying(200, b"ok"));
        s.set_header("X-Trace", "1");
        s.set_body(Some(b"payload".to_vec()));

        s.perform().unwrap();
        s.perform().unwrap();

        assert_eq!(s.transport.header_pushes.len(), 1);
        assert_eq!(s.transport.body_pushes.len(), 1);
        assert_eq!(s.transport.seen[0], s.transport.seen[1]);
        assert_eq!(s.transport.performs, 2);
    }

    #[test]
    fn active_headers_equal_pending_list_at_perform() {
        let mut s = session(RecordingTransport::replying(200, b""));
        s.set_header("A", "1");
        s.set_header("B", "2");
        s.clear_headers();
        s.set_header("C", "3");
        s.set_header("C", "4");
        s.perform().unwrap();

        assert_eq!(s.transport.seen[0].0, vec!["C: 3".to_string(), "C: 4".to_string()]);
        assert_eq!(s.headers(), &[("C".to_string(), "3".to_string()), ("C".to_string(), "4".to_string())]);
    }

    #[test]
    fn clear_then_perform_sends_no_cleared_header() {
        let mut s = session(RecordingTransport::replying(200, b""));
        s.set_header("X", "1");
        s.clear_headers();
        s.perform().unwrap();

        let active = &s.transport.seen[0].0;
        assert!(active.iter().all(|line| !line.starts_with("X:")));
        assert!(active.is_empty());
    }

    #[test]
    fn clearing_after_a_perform_replaces_the_active_set() {
        let mut s = session(RecordingTransport::replying(200, b""));
        s.set_header("X", "1");
        s.perform().unwrap();
        s.clear_headers();
        s.perform().unwrap();

        assert_eq!(s.transport.seen[0].0, vec!["X: 1".to_string()]);
        assert!(s.transport.seen[1].0.is_empty());
    }

    #[test]
    fn last_body_wins() {
        let mut s = session(RecordingTransport::replying(200, b""));
        s.set_body(Some(b"A".to_vec()));
        s.set_body(Some(b"B".to_vec()));
        s.perform().unwrap();

        assert_eq!(s.transport.body_pushes, vec![Some(b"B".to_vec())]);
        assert_eq!(s.body(), Some(&b"B"[..]));
    }

    #[test]
    fn assigning_same_body_still_dirties() {
        let mut s = session(RecordingTransport::replying(200, b""));
        s.set_body(Some(b"same".to_vec()));
        s.perform().unwrap();
        s.set_body(Some(b"same".to_vec()));
        assert!(s.body_dirty);
        s.perform().unwrap();

        assert_eq!(s.transport.body_pushes.len(), 2);
    }

    #[test]
    fn none_body_detaches_payload() {
        let mut s = session(RecordingTransport::replying(200, b""));
        s.set_body(Some(b"x".to_vec()));
        s.perform().unwrap();
        s.set_body(None);
        s.perform().unwrap();

        assert_eq!(s.transport.body_pushes, vec![Some(b"x".to_vec()), None]);
        assert_eq!(s.transport.seen[1].1, None);
    }

    #[test]
    fn http_error_status_is_a_response() {
        let mut s = session(RecordingTransport::replying(404, b"not found"));
        let response = s.perform().unwrap();
        assert_eq!(
            response,
            Response {
                status: 404,
                body: b"not found".to_vec()
            }
        );
    }

    #[test]
    fn chunks_are_concatenated() {
        let mut transport = RecordingTransport::replying(200, b"hello ");
        transport.chunks.push(b"world".to_vec());
        let mut s = session(transport);
        assert_eq!(s.perform().unwrap().body, b"hello world");
    }

    #[test]
    fn each_perform_gets_a_fresh_buffer() {
        let mut s = session(RecordingTransport::replying(200, b"once"));
        assert_eq!(s.perform().unwrap().body, b"once");
        assert_eq!(s.perform().unwrap().body, b"once");
    }

    #[test]
    fn transport_failure_maps_to_error() {
        let mut s = session(RecordingTransport::failing(RequestError::curl(7, "Couldn't connect to server")));
        let err = s.perform().unwrap_err();
        assert_eq!(
            err,
            RequestError::Transport {
                code: 7,
                description: "Couldn't connect to server".to_string()
            }
        );
    }

    #[test]
    fn failure_leaves_session_reusable() {
        let mut s = session(RecordingTransport::failing(RequestError::curl(28, "Timeout was reached")));
        s.set_header("X", "1");
        assert!(s.perform().is_err());
        assert!(!s.headers_dirty);

        s.transport.failure = None;
        s.transport.status = 200;
        s.transport.chunks = vec![b"recovered".to_vec()];
        let response = s.perform().unwrap();
        assert_eq!(response.body, b"recovered");
        assert_eq!(s.transport.header_pushes.len(), 1);
    }

    #[test]
    fn rejected_header_push_stays_dirty() {
        let mut transport = RecordingTransport::replying(200, b"");
        transport.reject_headers = true;
        let mut s = session(transport);
        s.set_header("X", "1");

        let err = s.perform().unwrap_err();
        assert_eq!(err.code(), 43);
        assert!(s.headers_dirty);
        assert_eq!(s.transport.performs, 0);

        s.transport.reject_headers = false;
        s.perform().unwrap();
        assert!(!s.headers_dirty);
        assert_eq!(s.transport.seen[0].0, vec!["X: 1".to_string()]);
    }

    #[test]
    fn timeouts_apply_immediately() {
        let mut s = session(RecordingTransport::default());
        s.set_timeouts(3, 10);
        assert_eq!(s.transport.connect_timeout, Some(Duration::from_secs(3)));
        assert_eq!(s.transport.timeout, Some(Duration::from_secs(10)));
        assert_eq!(s.connect_timeout_secs(), 3);
        assert_eq!(s.resource_timeout_secs(), 10);
    }

    #[test]
    fn authenticate_applies_immediately() {
        let mut s = session(RecordingTransport::default());
        s.authenticate(AuthMethods::BASIC | AuthMethods::DIGEST, "user", "pass");
        assert_eq!(s.transport.auth, Some(AuthMethods::BASIC | AuthMethods::DIGEST));
        assert_eq!(s.transport.username.as_deref(), Some("user"));
        assert_eq!(s.transport.password.as_deref(), Some("pass"));
    }

    #[test]
    fn rejected_option_is_reported_by_next_perform_only() {
        let mut transport = RecordingTransport::replying(200, b"ok");
        transport.reject_auth = true;
        let mut s = session(transport);
        s.authenticate(AuthMethods::NTLM, "user", "pass");

        let err = s.perform().unwrap_err();
        assert_eq!(err.code(), 4);
        assert_eq!(s.transport.performs, 0);

        assert_eq!(s.perform().unwrap().body, b"ok");
    }

    #[test]
    fn perform_async_delivers_response_once() {
        let s = session(RecordingTransport::replying(200, b"ok"));
        let (tx, rx) = mpsc::channel();
        s.perform_async(&ThreadQueue, move |session, result| {
            tx.send((session.transport.performs, result)).unwrap();
        });

        let (performs, result) = rx.recv().unwrap();
        assert_eq!(performs, 1);
        assert_eq!(
            result,
            Ok(Response {
                status: 200,
                body: b"ok".to_vec()
            })
        );
        assert!(rx.recv().is_err(), "completion must run exactly once");
    }

    #[test]
    fn perform_async_delivers_error() {
        let s = session(RecordingTransport::failing(RequestError::curl(6, "Couldn't resolve host name")));
        let (tx, rx) = mpsc::channel();
        s.perform_async(&ThreadQueue, move |_session, result| {
            tx.send(result).unwrap();
        });

        assert_eq!(rx.recv().unwrap().unwrap_err().code(), 6);
        assert!(rx.recv().is_err());
    }

    #[test]
    fn perform_async_on_shut_down_runtime_still_completes() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let handle = rt.handle().clone();
        drop(rt);

        let s = session(RecordingTransport::replying(200, b"ok"));
        let (tx, rx) = mpsc::channel();
        s.perform_async(&handle, move |_session, result| {
            tx.send(result).unwrap();
        });

        let result = rx
            .recv_timeout(std::time::Duration::from_secs(3))
            .expect("completion never ran");
        assert_eq!(
            result,
            Ok(Response {
                status: 200,
                body: b"ok".to_vec()
            })
        );
        assert!(rx.recv().is_err(), "completion must run exactly once");
    }

    #[test]
    fn perform_async_returns_reusable_session() {
        let mut s = session(RecordingTransport::replying(200, b"ok"));
        s.set_header("X", "1");
        let (tx, rx) = mpsc::channel();
        s.perform_async(&ThreadQueue, move |session, _result| {
            tx.send(session).unwrap();
        });

        let mut s = rx.recv().unwrap();
        s.perform().unwrap();
        assert_eq!(s.transport.performs, 2);
        assert_eq!(s.transport.header_pushes.len(), 1);
    }
}
