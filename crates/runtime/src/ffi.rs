//! C ABI for generated code
//!
//! Generated code holds arenas as opaque `RtArena *` pointers and calls the
//! `rt_arena_*` functions below. The conventions are C conventions:
//!
//! - a null arena or null source pointer yields a null result
//! - a zero-size request yields a null result
//! - destroying a null arena is a no-op
//!
//! Faults (out of memory, bad alignment) panic, and a panic cannot unwind
//! out of an `extern "C"` function, so the process aborts after the fault
//! has been logged.
//!
//! Lifetimes cannot be checked across this boundary. A child arena keeps a
//! plain pointer to its parent; generated code destroys children first.

use crate::diagnostics::init_logging;
use crate::report::{emit_report, mark_start};
use sn_core::Arena;
use std::ffi::{CStr, c_char, c_void};
use std::ptr;

/// An arena as seen from C: parent borrows are unchecked
pub type RtArena = Arena<'static>;

/// Create an arena, optionally as a child of `parent`
///
/// # Safety
/// `parent` must be null or a live arena from `rt_arena_create*` that
/// outlives the returned arena.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_arena_create(parent: *const RtArena) -> *mut RtArena {
    unsafe { rt_arena_create_sized(parent, 0) }
}

/// Create an arena whose blocks are at least `block_size` bytes (0 = default)
///
/// # Safety
/// Same as [`rt_arena_create`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_arena_create_sized(
    parent: *const RtArena,
    block_size: usize,
) -> *mut RtArena {
    let parent = unsafe { parent.as_ref() };
    Box::into_raw(Box::new(Arena::create_sized(parent, block_size)))
}

/// Destroy an arena, closing its tracked files and freeing every block
///
/// # Safety
/// `arena` must be null or a live arena with no live children. It must not
/// be used afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_arena_destroy(arena: *mut RtArena) {
    if arena.is_null() {
        return;
    }
    drop(unsafe { Box::from_raw(arena) });
}

/// Forget every allocation, keeping the first block
///
/// # Safety
/// `arena` must be null or live; pointers it handed out become dangling.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_arena_reset(arena: *mut RtArena) {
    if let Some(arena) = unsafe { arena.as_mut() } {
        arena.reset();
    }
}

/// # Safety
/// `arena` must be null or live.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_arena_alloc(arena: *const RtArena, size: usize) -> *mut c_void {
    match unsafe { arena.as_ref() } {
        Some(arena) if size > 0 => arena.alloc(size).as_mut_ptr().cast(),
        _ => ptr::null_mut(),
    }
}

/// # Safety
/// `arena` must be null or live.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_arena_calloc(
    arena: *const RtArena,
    count: usize,
    size: usize,
) -> *mut c_void {
    let Some(arena) = (unsafe { arena.as_ref() }) else {
        return ptr::null_mut();
    };
    let bytes = arena.calloc(count, size);
    if bytes.is_empty() {
        return ptr::null_mut();
    }
    bytes.as_mut_ptr().cast()
}

/// # Safety
/// `arena` must be null or live.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_arena_alloc_aligned(
    arena: *const RtArena,
    size: usize,
    alignment: usize,
) -> *mut c_void {
    let Some(arena) = (unsafe { arena.as_ref() }) else {
        return ptr::null_mut();
    };
    let bytes = arena.alloc_aligned(size, alignment);
    if bytes.is_empty() {
        return ptr::null_mut();
    }
    bytes.as_mut_ptr().cast()
}

unsafe fn copy_c_bytes(arena: &RtArena, src: *const u8, len: usize) -> *mut c_char {
    let dst = arena.alloc(len + 1);
    // SAFETY: caller guarantees `len` readable bytes at `src`
    unsafe {
        ptr::copy_nonoverlapping(src, dst.as_mut_ptr(), len);
    }
    dst[len] = 0;
    dst.as_mut_ptr().cast()
}

/// Copy a NUL-terminated string into the arena
///
/// # Safety
/// `arena` must be null or live; `s` must be null or NUL-terminated.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_arena_strdup(arena: *const RtArena, s: *const c_char) -> *mut c_char {
    let Some(arena) = (unsafe { arena.as_ref() }) else {
        return ptr::null_mut();
    };
    if s.is_null() {
        return ptr::null_mut();
    }
    let bytes = unsafe { CStr::from_ptr(s) }.to_bytes();
    unsafe { copy_c_bytes(arena, bytes.as_ptr(), bytes.len()) }
}

/// Copy at most `n` bytes of a string into the arena, always terminated
///
/// The cut is byte-exact; `s` is not read past `n` bytes.
///
/// # Safety
/// `arena` must be null or live; `s` must be null or readable up to its
/// terminator or `n` bytes, whichever comes first.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_arena_strndup(
    arena: *const RtArena,
    s: *const c_char,
    n: usize,
) -> *mut c_char {
    let Some(arena) = (unsafe { arena.as_ref() }) else {
        return ptr::null_mut();
    };
    if s.is_null() {
        return ptr::null_mut();
    }
    let len = unsafe { libc::strnlen(s, n) };
    unsafe { copy_c_bytes(arena, s.cast(), len) }
}

/// Copy `size` bytes from `src` (usually another arena) into `dest`
///
/// # Safety
/// `dest` must be null or live; `src` must be null or readable for `size`
/// bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_arena_promote(
    dest: *const RtArena,
    src: *const c_void,
    size: usize,
) -> *mut c_void {
    let Some(dest) = (unsafe { dest.as_ref() }) else {
        return ptr::null_mut();
    };
    if src.is_null() || size == 0 {
        return ptr::null_mut();
    }
    let bytes = unsafe { std::slice::from_raw_parts(src.cast::<u8>(), size) };
    dest.alloc_slice_copy(bytes).as_mut_ptr().cast()
}

/// # Safety
/// Same as [`rt_arena_strdup`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_arena_promote_string(
    dest: *const RtArena,
    s: *const c_char,
) -> *mut c_char {
    unsafe { rt_arena_strdup(dest, s) }
}

/// Bytes requested from `arena` since creation or the last reset
///
/// # Safety
/// `arena` must be null or live.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_arena_total_allocated(arena: *const RtArena) -> usize {
    unsafe { arena.as_ref() }.map_or(0, Arena::total_allocated)
}

/// Process start hook: logging and the report clock
#[unsafe(no_mangle)]
pub extern "C" fn rt_runtime_init() {
    init_logging();
    mark_start();
}

/// Process exit hook: writes the `SN_REPORT` report if one was requested
#[unsafe(no_mangle)]
pub extern "C" fn rt_runtime_shutdown() {
    emit_report();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c_str<'a>(p: *const c_char) -> &'a str {
        unsafe { CStr::from_ptr(p) }.to_str().unwrap()
    }

    #[test]
    fn test_null_arena_conventions() {
        unsafe {
            let null: *mut RtArena = ptr::null_mut();
            assert!(rt_arena_alloc(null, 16).is_null());
            assert!(rt_arena_calloc(null, 2, 8).is_null());
            assert!(rt_arena_alloc_aligned(null, 8, 8).is_null());
            assert!(rt_arena_strdup(null, c"hi".as_ptr()).is_null());
            assert!(rt_arena_strndup(null, c"hi".as_ptr(), 1).is_null());
            assert!(rt_arena_promote(null, c"hi".as_ptr().cast(), 2).is_null());
            assert_eq!(rt_arena_total_allocated(null), 0);
            rt_arena_reset(null);
            rt_arena_destroy(null);
        }
    }

    #[test]
    fn test_alloc_and_total() {
        unsafe {
            let arena = rt_arena_create(ptr::null());
            assert!(rt_arena_alloc(arena, 0).is_null());
            let p = rt_arena_alloc(arena, 100).cast::<u8>();
            assert!(!p.is_null());
            p.write_bytes(0xAB, 100);

            let z = rt_arena_calloc(arena, 4, 8).cast::<u8>();
            assert!(std::slice::from_raw_parts(z, 32).iter().all(|&b| b == 0));
            assert!(rt_arena_calloc(arena, 0, 8).is_null());

            let a = rt_arena_alloc_aligned(arena, 8, 64);
            assert_eq!(a as usize % 64, 0);

            assert_eq!(rt_arena_total_allocated(arena), 140);
            rt_arena_reset(arena);
            assert_eq!(rt_arena_total_allocated(arena), 0);
            rt_arena_destroy(arena);
        }
    }

    #[test]
    fn test_strdup_and_strndup() {
        unsafe {
            let arena = rt_arena_create_sized(ptr::null(), 64);
            let s = rt_arena_strdup(arena, c"hello".as_ptr());
            assert_eq!(c_str(s), "hello");
            assert!(rt_arena_strdup(arena, ptr::null()).is_null());

            let cut = rt_arena_strndup(arena, c"hello".as_ptr(), 3);
            assert_eq!(c_str(cut), "hel");
            let whole = rt_arena_strndup(arena, c"hi".as_ptr(), 10);
            assert_eq!(c_str(whole), "hi");
            let empty = rt_arena_strdup(arena, c"".as_ptr());
            assert_eq!(c_str(empty), "");

            rt_arena_destroy(arena);
        }
    }

    #[test]
    fn test_strndup_does_not_read_past_n() {
        // No terminator anywhere in the buffer
        let buf = [b'a', b'b', b'c', b'd'];
        unsafe {
            let arena = rt_arena_create(ptr::null());
            let cut = rt_arena_strndup(arena, buf.as_ptr().cast(), 4);
            assert_eq!(c_str(cut), "abcd");
            rt_arena_destroy(arena);
        }
    }

    #[test]
    fn test_promote_outlives_child() {
        unsafe {
            let parent = rt_arena_create(ptr::null());
            let child = rt_arena_create(parent);

            let s = rt_arena_strdup(child, c"hi".as_ptr());
            let kept = rt_arena_promote_string(parent, s);
            let data = [1u8, 2, 3];
            let raw = rt_arena_alloc(child, 3).cast::<u8>();
            ptr::copy_nonoverlapping(data.as_ptr(), raw, 3);
            let bytes = rt_arena_promote(parent, raw.cast(), 3).cast::<u8>();
            assert!(rt_arena_promote(parent, raw.cast(), 0).is_null());

            rt_arena_destroy(child);
            assert_eq!(c_str(kept), "hi");
            assert_eq!(std::slice::from_raw_parts(bytes, 3), &data);
            rt_arena_destroy(parent);
        }
    }

    #[test]
    fn test_runtime_hooks() {
        rt_runtime_init();
        rt_runtime_init();
        rt_runtime_shutdown();
    }
}
