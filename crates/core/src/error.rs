//! Runtime Fault Handling
//!
//! Two kinds of failure exist in the runtime and they are kept apart:
//!
//! - **Faults** are invariant violations (out of memory, capacity overflow,
//!   popping an empty array, unboxing the wrong kind, ...). They are logged,
//!   recorded in the thread-local error slot and then terminate the current
//!   activation via [`fatal`]. Across an `extern "C"` boundary that panic
//!   aborts the process.
//! - **Empty results** (a null array, an index that is not found) are plain
//!   values and never go through this module.
//!
//! # Usage
//!
//! ```ignore
//! if arr.is_empty() {
//!     fatal(Fault::EmptyArray { op: "pop" });
//! }
//! ```
//!
//! Generated code can inspect the last fault message after recovering from
//! a panic in a test harness:
//! ```ignore
//! if rt_has_error() {
//!     let error = rt_take_error();
//! }
//! ```

use std::cell::RefCell;
use std::ffi::{CString, c_char};
use std::fmt;
use std::ptr;

/// An invariant violation inside the runtime
///
/// Every variant names the operation that detected it so the message that
/// reaches the diagnostic stream is self-describing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// The host allocator refused a block
    OutOfMemory { requested: usize },
    /// Size arithmetic (capacity doubling, `count * size`) overflowed
    CapacityOverflow { op: &'static str },
    /// `alloc_aligned` was given an alignment that is not a power of two
    InvalidAlignment { alignment: usize },
    /// Unboxing a tagged value as the wrong kind
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },
    /// A mutating operation on a null array handle
    NullArray { op: &'static str },
    /// A mutating operation on an array with no elements
    EmptyArray { op: &'static str },
    /// Index outside `0..len`
    IndexOutOfBounds {
        op: &'static str,
        index: i64,
        len: usize,
    },
    /// Slicing with a step that is zero or negative
    InvalidStep { op: &'static str, step: i64 },
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::OutOfMemory { requested } => {
                write!(f, "out of memory: failed to allocate {} bytes", requested)
            }
            Fault::CapacityOverflow { op } => write!(f, "{}: capacity overflow", op),
            Fault::InvalidAlignment { alignment } => {
                write!(
                    f,
                    "alloc_aligned: alignment {} is not a power of two",
                    alignment
                )
            }
            Fault::TypeMismatch { expected, actual } => {
                write!(f, "Type error: expected {}, got {}", expected, actual)
            }
            Fault::NullArray { op } => write!(f, "{}: null array", op),
            Fault::EmptyArray { op } => write!(f, "{}: empty array", op),
            Fault::IndexOutOfBounds { op, index, len } => {
                write!(
                    f,
                    "{}: index {} out of bounds for length {}",
                    op, index, len
                )
            }
            Fault::InvalidStep { op, step } => {
                write!(f, "{}: step must be positive, got {}", op, step)
            }
        }
    }
}

impl std::error::Error for Fault {}

/// Report a fault and terminate the current activation
///
/// Logs at error level, records the message in the thread-local error slot
/// and panics with the same message. Never returns.
#[cold]
#[track_caller]
pub fn fatal(fault: Fault) -> ! {
    let message = fault.to_string();
    tracing::error!(fault = ?fault, "{}", message);
    set_runtime_error(message.clone());
    panic!("{}", message);
}

thread_local! {
    /// Thread-local storage for the last runtime error message
    static LAST_ERROR: RefCell<Option<String>> = const { RefCell::new(None) };

    /// Cached C string for FFI access (avoids allocation on every get)
    static ERROR_CSTRING: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last runtime error message
///
/// Note: This clears any cached CString to prevent stale pointer access.
pub fn set_runtime_error(msg: impl Into<String>) {
    ERROR_CSTRING.with(|cs| *cs.borrow_mut() = None);
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = Some(msg.into());
    });
}

/// Take (and clear) the last runtime error message
pub fn take_runtime_error() -> Option<String> {
    LAST_ERROR.with(|e| e.borrow_mut().take())
}

/// Check if there's a pending runtime error
pub fn has_runtime_error() -> bool {
    LAST_ERROR.with(|e| e.borrow().is_some())
}

/// Clear any pending runtime error
pub fn clear_runtime_error() {
    LAST_ERROR.with(|e| *e.borrow_mut() = None);
    ERROR_CSTRING.with(|e| *e.borrow_mut() = None);
}

/// Cache `msg` as a C string and return a pointer into the cache
fn cache_cstring(msg: &str) -> *const c_char {
    // Interior NULs would truncate the message on the C side
    let safe_msg = msg.replace('\0', "?");
    match CString::new(safe_msg) {
        Ok(cstring) => ERROR_CSTRING.with(|cs| {
            let ptr = cstring.as_ptr();
            *cs.borrow_mut() = Some(cstring);
            ptr
        }),
        Err(_) => ptr::null(),
    }
}

// FFI-safe error access functions

/// Check if there's a pending runtime error (FFI-safe)
#[unsafe(no_mangle)]
pub extern "C" fn rt_has_error() -> bool {
    has_runtime_error()
}

/// Get the last error message as a C string pointer (FFI-safe)
///
/// Returns null if no error is pending.
///
/// # WARNING: Pointer Lifetime
/// The returned pointer is only valid until the next call to `set_runtime_error`,
/// `rt_get_error`, `rt_take_error`, or `rt_clear_error`. Callers must copy the
/// string immediately if they need to retain it.
#[unsafe(no_mangle)]
pub extern "C" fn rt_get_error() -> *const c_char {
    let msg = LAST_ERROR.with(|e| e.borrow().clone());
    match msg {
        Some(msg) => cache_cstring(&msg),
        None => ptr::null(),
    }
}

/// Take (and clear) the last error, returning it as a C string (FFI-safe)
///
/// Returns null if no error is pending. Same pointer lifetime rules as
/// [`rt_get_error`].
#[unsafe(no_mangle)]
pub extern "C" fn rt_take_error() -> *const c_char {
    match take_runtime_error() {
        Some(msg) => cache_cstring(&msg),
        None => ptr::null(),
    }
}

/// Clear any pending error (FFI-safe)
#[unsafe(no_mangle)]
pub extern "C" fn rt_clear_error() {
    clear_runtime_error();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    #[test]
    fn test_set_and_take_error() {
        clear_runtime_error();
        assert!(!has_runtime_error());

        set_runtime_error("test error");
        assert!(has_runtime_error());

        let error = take_runtime_error();
        assert_eq!(error, Some("test error".to_string()));
        assert!(!has_runtime_error());
    }

    #[test]
    fn test_clear_error() {
        set_runtime_error("another error");
        assert!(has_runtime_error());

        clear_runtime_error();
        assert!(!has_runtime_error());
        assert!(take_runtime_error().is_none());
    }

    #[test]
    fn test_fault_messages() {
        assert_eq!(
            Fault::TypeMismatch {
                expected: "long",
                actual: "int"
            }
            .to_string(),
            "Type error: expected long, got int"
        );
        assert_eq!(
            Fault::EmptyArray { op: "pop" }.to_string(),
            "pop: empty array"
        );
        assert_eq!(
            Fault::IndexOutOfBounds {
                op: "remove",
                index: 7,
                len: 3
            }
            .to_string(),
            "remove: index 7 out of bounds for length 3"
        );
        assert_eq!(
            Fault::CapacityOverflow { op: "push" }.to_string(),
            "push: capacity overflow"
        );
    }

    #[test]
    fn test_fatal_records_error_before_panicking() {
        clear_runtime_error();
        let result = std::panic::catch_unwind(|| fatal(Fault::NullArray { op: "pop" }));
        assert!(result.is_err());
        assert_eq!(take_runtime_error(), Some("pop: null array".to_string()));
    }

    #[test]
    #[should_panic(expected = "step must be positive")]
    fn test_fatal_panics_with_message() {
        fatal(Fault::InvalidStep {
            op: "slice",
            step: 0,
        });
    }

    #[test]
    fn test_ffi_error_access() {
        rt_clear_error();
        assert!(!rt_has_error());
        assert!(rt_get_error().is_null());

        set_runtime_error("bad\0value");
        assert!(rt_has_error());
        let msg = unsafe { CStr::from_ptr(rt_get_error()) };
        assert_eq!(msg.to_str().unwrap(), "bad?value");

        let taken = unsafe { CStr::from_ptr(rt_take_error()) };
        assert_eq!(taken.to_str().unwrap(), "bad?value");
        assert!(!rt_has_error());
        assert!(rt_take_error().is_null());
    }
}
