//! C-ABI wrapper around `http-session`.
//!
//! # Overview
//! Exposes the session lifecycle through `extern "C"` functions so any
//! language with a C FFI can configure a request, run it synchronously or on
//! a background thread, and read back the status code and body bytes.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary. The closures are `AssertUnwindSafe`: the
//!   curl handle behind a session is not unwind-safe, so a session whose call
//!   panicked is poisoned and must only be passed to `http_session_free`.
//! - Setters mirror the core API 1:1 and return `false` only for null or
//!   non-UTF-8 arguments; the core setters themselves cannot fail.
//! - A single `FfiPerformResult` envelope conveys both outcomes.
//! - `http_session_perform_async` takes the session away from the caller
//!   and returns it through the completion, so a session is never touched by
//!   two threads at once.
//! - The C caller owns all returned pointers and must call the matching
//!   `http_*_free` function to release them.

pub mod types;

use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};

use http_session::{AuthMethods, Session, SessionOptions, ThreadQueue};

use types::*;

/// Borrow a C string as UTF-8, or `None` if null or not UTF-8.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string that outlives `'a`.
unsafe fn utf8<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok()
}

// ---------------------------------------------------------------------------
// Session lifecycle
// ---------------------------------------------------------------------------

/// Create a session for `url` using `method` and full TLS verification.
///
/// Returns null if `url` is null or not UTF-8, if the transport rejects the
/// URL, or if an internal panic occurs. The caller must free the returned
/// pointer with `http_session_free`.
#[unsafe(no_mangle)]
pub extern "C" fn http_session_new(url: *const c_char, method: FfiHttpMethod) -> *mut FfiSession {
    catch_unwind(AssertUnwindSafe(|| {
        let Some(url) = (unsafe { utf8(url) }) else {
            return std::ptr::null_mut();
        };
        match Session::with_options(url, SessionOptions::method(method.into())) {
            Ok(session) => FfiSession::into_raw(session),
            Err(_) => std::ptr::null_mut(),
        }
    }))
    .unwrap_or(std::ptr::null_mut())
}

/// Create a session for `url` from a full options struct.
///
/// Returns null under the same conditions as `http_session_new`, or if
/// `options` is null.
#[unsafe(no_mangle)]
pub extern "C" fn http_session_new_with_options(
    url: *const c_char,
    options: *const FfiSessionOptions,
) -> *mut FfiSession {
    catch_unwind(AssertUnwindSafe(|| {
        if options.is_null() {
            return std::ptr::null_mut();
        }
        let Some(url) = (unsafe { utf8(url) }) else {
            return std::ptr::null_mut();
        };
        let options = SessionOptions::from(unsafe { &*options });
        match Session::with_options(url, options) {
            Ok(session) => FfiSession::into_raw(session),
            Err(_) => std::ptr::null_mut(),
        }
    }))
    .unwrap_or(std::ptr::null_mut())
}

/// Free a session and its transport handle. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn http_session_free(session: *mut FfiSession) {
    if !session.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { Box::from_raw(session) });
        }));
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Append a header to be sent by the next perform.
///
/// Returns false if any argument is null or not UTF-8.
#[unsafe(no_mangle)]
pub extern "C" fn http_session_set_header(
    session: *mut FfiSession,
    name: *const c_char,
    value: *const c_char,
) -> bool {
    catch_unwind(AssertUnwindSafe(|| {
        if session.is_null() {
            return false;
        }
        let (Some(name), Some(value)) = (unsafe { utf8(name) }, unsafe { utf8(value) }) else {
            return false;
        };
        let session = unsafe { &mut *session };
        session.inner.set_header(name, value);
        true
    }))
    .unwrap_or(false)
}

/// Drop every staged header. Returns false if `session` is null.
#[unsafe(no_mangle)]
pub extern "C" fn http_session_clear_headers(session: *mut FfiSession) -> bool {
    catch_unwind(AssertUnwindSafe(|| {
        if session.is_null() {
            return false;
        }
        let session = unsafe { &mut *session };
        session.inner.clear_headers();
        true
    }))
    .unwrap_or(false)
}

/// Replace the request body with a copy of `len` bytes at `body`.
///
/// A null `body` removes the payload. Returns false if `session` is null.
#[unsafe(no_mangle)]
pub extern "C" fn http_session_set_body(
    session: *mut FfiSession,
    body: *const u8,
    len: usize,
) -> bool {
    catch_unwind(AssertUnwindSafe(|| {
        if session.is_null() {
            return false;
        }
        let session = unsafe { &mut *session };
        let payload = if body.is_null() {
            None
        } else {
            Some(unsafe { std::slice::from_raw_parts(body, len) }.to_vec())
        };
        session.inner.set_body(payload);
        true
    }))
    .unwrap_or(false)
}

/// Set connect and whole-transfer timeouts in seconds (0 = unbounded transfer).
#[unsafe(no_mangle)]
pub extern "C" fn http_session_set_timeouts(
    session: *mut FfiSession,
    connect_secs: u64,
    resource_secs: u64,
) -> bool {
    catch_unwind(AssertUnwindSafe(|| {
        if session.is_null() {
            return false;
        }
        let session = unsafe { &mut *session };
        session.inner.set_timeouts(connect_secs, resource_secs);
        true
    }))
    .unwrap_or(false)
}

/// Set credentials. `methods` is a bitmask using libcurl's `CURLAUTH_*` bits.
#[unsafe(no_mangle)]
pub extern "C" fn http_session_authenticate(
    session: *mut FfiSession,
    methods: u32,
    username: *const c_char,
    password: *const c_char,
) -> bool {
    catch_unwind(AssertUnwindSafe(|| {
        if session.is_null() {
            return false;
        }
        let (Some(username), Some(password)) = (unsafe { utf8(username) }, unsafe { utf8(password) })
        else {
            return false;
        };
        let session = unsafe { &mut *session };
        session
            .inner
            .authenticate(AuthMethods::from_bits(methods), username, password);
        true
    }))
    .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Run the request and block until it finishes.
///
/// Always returns a result; free it with `http_free_result`.
#[unsafe(no_mangle)]
pub extern "C" fn http_session_perform(session: *mut FfiSession) -> *mut FfiPerformResult {
    catch_unwind(AssertUnwindSafe(|| {
        if session.is_null() {
            return FfiPerformResult::null_arg("session");
        }
        let session = unsafe { &mut *session };
        FfiPerformResult::from_outcome(session.inner.perform())
    }))
    .unwrap_or_else(|_| {
        tracing::error!("panic in http_session_perform");
        FfiPerformResult::panic("panic in http_session_perform")
    })
}

/// Run the request on a background thread and report through `completion`.
///
/// Ownership of `session` moves to the background thread and comes back as
/// the completion's `session` argument; the caller must not use the original
/// pointer in between. Returns false, without taking ownership, if `session`
/// or `completion` is null.
#[unsafe(no_mangle)]
pub extern "C" fn http_session_perform_async(
    session: *mut FfiSession,
    completion: Option<FfiCompletion>,
    user_data: *mut c_void,
) -> bool {
    catch_unwind(AssertUnwindSafe(|| {
        let Some(completion) = completion else {
            return false;
        };
        if session.is_null() {
            return false;
        }
        let session = unsafe { Box::from_raw(session) };
        let user_data = UserData::new(user_data);
        session.inner.perform_async(&ThreadQueue, move |inner, outcome| {
            let result = FfiPerformResult::from_outcome(outcome);
            completion(result, FfiSession::into_raw(inner), user_data.into_inner());
        });
        true
    }))
    .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free an `FfiPerformResult` and the buffers it owns. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn http_free_result(result: *mut FfiPerformResult) {
    if result.is_null() {
        return;
    }
    let _ = catch_unwind(AssertUnwindSafe(|| {
        let result = unsafe { Box::from_raw(result) };
        if !result.error_message.is_null() {
            drop(unsafe { CString::from_raw(result.error_message) });
        }
        if !result.body.is_null() {
            let body = std::ptr::slice_from_raw_parts_mut(result.body, result.body_len);
            drop(unsafe { Box::from_raw(body) });
        }
    }));
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
