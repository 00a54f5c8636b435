//! Sindarin Runtime: the value layer compiled programs link against
//!
//! Key design principles:
//! - Arena: every runtime value lives in a region (from `sn-core`)
//! - RtArray: growable arrays whose storage belongs to an arena
//! - Any: a tagged union for dynamically-typed boundaries
//! - Promote: the only way a value outlives its arena is by being copied
//!
//! Generated code reaches the arena through the `rt_*` C ABI in [`ffi`];
//! Rust callers use the typed API directly.

pub mod any;
pub mod array;
pub mod diagnostics;
pub mod ffi;
pub mod file;
pub mod report;
pub mod serialize;

// Re-export key types and functions
pub use any::{Any, AnyTag, ArrayRef, Handle, format_general};
pub use array::{Element, MIN_CAPACITY, RtArray, Text, UNSPECIFIED};
pub use file::{BinaryFile, TextFile};
pub use sn_core::{
    Arena, ArenaConfig, ArenaStats, DEFAULT_BLOCK_SIZE, Fault, FileId, FileStream,
    MemorySnapshot, TrackedFile, memory_snapshot,
};

// Serialization types (for persistence/exchange with external systems)
pub use serialize::{AnySerialize, SerializeError, TypedValue};

// Diagnostics
pub use diagnostics::{dump_diagnostics, init_logging};
pub use report::emit_report;

// Arena operations (exported for linking with generated code)
pub use ffi::{
    RtArena, rt_arena_alloc as arena_alloc, rt_arena_alloc_aligned as arena_alloc_aligned,
    rt_arena_calloc as arena_calloc, rt_arena_create as arena_create,
    rt_arena_create_sized as arena_create_sized, rt_arena_destroy as arena_destroy,
    rt_arena_promote as arena_promote, rt_arena_promote_string as arena_promote_string,
    rt_arena_reset as arena_reset, rt_arena_strdup as arena_strdup,
    rt_arena_strndup as arena_strndup, rt_arena_total_allocated as arena_total_allocated,
    rt_runtime_init as runtime_init, rt_runtime_shutdown as runtime_shutdown,
};

// Error handling (exported for linking with generated code)
pub use sn_core::error::{
    rt_clear_error as clear_error, rt_get_error as get_error, rt_has_error as has_error,
    rt_take_error as take_error,
};
