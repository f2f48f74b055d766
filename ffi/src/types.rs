//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Each type mirrors a core type with a C-compatible layout: `*mut c_char`
//! for strings, pointer + length for byte buffers, and enums with explicit
//! discriminants. Conversion functions live here to keep `lib.rs` focused on
//! the `extern "C"` surface.

use std::ffi::{c_void, CString};
use std::os::raw::c_char;

use http_session::{HttpMethod, RequestError, Response, SessionOptions};

/// Opaque handle to a `Session`. C callers receive a pointer to this and pass
/// it back into every FFI function.
pub struct FfiSession {
    pub(crate) inner: http_session::Session,
}

impl FfiSession {
    pub(crate) fn into_raw(inner: http_session::Session) -> *mut Self {
        Box::into_raw(Box::new(FfiSession { inner }))
    }
}

/// HTTP method as a C enum.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiHttpMethod {
    Get = 0,
    Post = 1,
    Put = 2,
    Delete = 3,
    Patch = 4,
}

impl From<FfiHttpMethod> for HttpMethod {
    fn from(m: FfiHttpMethod) -> Self {
        match m {
            FfiHttpMethod::Get => HttpMethod::Get,
            FfiHttpMethod::Post => HttpMethod::Post,
            FfiHttpMethod::Put => HttpMethod::Put,
            FfiHttpMethod::Delete => HttpMethod::Delete,
            FfiHttpMethod::Patch => HttpMethod::Patch,
        }
    }
}

/// Construction-time settings, filled in by the C caller.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FfiSessionOptions {
    pub method: FfiHttpMethod,
    pub skip_peer_verification: bool,
    pub skip_hostname_verification: bool,
    pub verbose: bool,
    pub connect_timeout_secs: u64,
    /// Zero means unbounded.
    pub resource_timeout_secs: u64,
}

impl From<&FfiSessionOptions> for SessionOptions {
    fn from(o: &FfiSessionOptions) -> Self {
        SessionOptions {
            method: o.method.into(),
            skip_peer_verification: o.skip_peer_verification,
            skip_hostname_verification: o.skip_hostname_verification,
            verbose: o.verbose,
            connect_timeout_secs: o.connect_timeout_secs,
            resource_timeout_secs: o.resource_timeout_secs,
        }
    }
}

/// Error codes returned in `FfiPerformResult`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorCode {
    Ok = 0,
    /// The transport failed; see `transport_code` and `error_message`.
    Transport = 1,
    NullArg = 2,
    Panic = 3,
}

/// Outcome of one perform.
///
/// On success `error_code` is `Ok`, `status` holds the HTTP status and
/// `body`/`body_len` the raw response bytes (`body` is null when empty).
/// On failure `error_code` describes the category, `error_message` is a
/// human-readable C string, and `transport_code` carries the libcurl code
/// for `Transport` failures.
#[repr(C)]
pub struct FfiPerformResult {
    pub error_code: FfiErrorCode,
    pub transport_code: u32,
    pub error_message: *mut c_char,
    pub status: u32,
    pub body: *mut u8,
    pub body_len: usize,
}

/// Completion for `http_session_perform_async`.
///
/// Receives the result, the session (ownership returns to the caller), and
/// the `user_data` pointer given at submission. Both pointers must be freed
/// by the caller.
pub type FfiCompletion =
    extern "C" fn(result: *mut FfiPerformResult, session: *mut FfiSession, user_data: *mut c_void);

/// Caller context carried to the completion thread untouched.
pub(crate) struct UserData(*mut c_void);

// The pointer is never dereferenced on our side; the C caller vouches for it.
unsafe impl Send for UserData {}

impl UserData {
    pub(crate) fn new(ptr: *mut c_void) -> Self {
        UserData(ptr)
    }

    pub(crate) fn into_inner(self) -> *mut c_void {
        self.0
    }
}

/// Lossy `CString`: interior NULs are replaced so the message always survives.
fn c_message(msg: &str) -> *mut c_char {
    CString::new(msg.replace('\0', "\u{fffd}"))
        .unwrap_or_default()
        .into_raw()
}

impl FfiPerformResult {
    pub(crate) fn from_outcome(outcome: Result<Response, RequestError>) -> *mut Self {
        match outcome {
            Ok(response) => Self::ok(response),
            Err(err) => Self::from_error(err),
        }
    }

    pub(crate) fn ok(response: Response) -> *mut Self {
        let body_len = response.body.len();
        let body = if body_len == 0 {
            std::ptr::null_mut()
        } else {
            Box::into_raw(response.body.into_boxed_slice()) as *mut u8
        };
        Box::into_raw(Box::new(FfiPerformResult {
            error_code: FfiErrorCode::Ok,
            transport_code: 0,
            error_message: std::ptr::null_mut(),
            status: response.status,
            body,
            body_len,
        }))
    }

    pub(crate) fn from_error(err: RequestError) -> *mut Self {
        Box::into_raw(Box::new(FfiPerformResult {
            error_code: FfiErrorCode::Transport,
            transport_code: err.code(),
            error_message: c_message(&err.to_string()),
            status: 0,
            body: std::ptr::null_mut(),
            body_len: 0,
        }))
    }

    pub(crate) fn null_arg(name: &str) -> *mut Self {
        Self::failure(FfiErrorCode::NullArg, &format!("null argument: {name}"))
    }

    pub(crate) fn panic(msg: &str) -> *mut Self {
        Self::failure(FfiErrorCode::Panic, msg)
    }

    fn failure(error_code: FfiErrorCode, msg: &str) -> *mut Self {
        Box::into_raw(Box::new(FfiPerformResult {
            error_code,
            transport_code: 0,
            error_message: c_message(msg),
            status: 0,
            body: std::ptr::null_mut(),
            body_len: 0,
        }))
    }
}
