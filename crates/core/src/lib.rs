//! Sindarin Core: region-based memory for a compiled language runtime
//!
//! This crate provides the language-agnostic memory primitives that the
//! value layer (`sn-runtime`) and generated code allocate through.
//!
//! Key design principles:
//! - Arena: a chain of bump-allocated blocks, freed all at once
//! - Hierarchy: a child arena borrows its parent, so it cannot outlive it
//! - Escape: values leave an arena only by being copied (`promote`)
//! - Faults: invariant violations terminate, empty results are values
//!
//! # Modules
//!
//! - `arena`: block-chained region allocator with tracked file handles
//! - `config`: environment-driven arena configuration
//! - `error`: fault taxonomy and thread-local last-error slot
//! - `memory_stats`: process-wide arena counters

pub mod arena;
pub mod config;
pub mod error;
pub mod memory_stats;

// Re-export key types and functions
pub use arena::{Arena, ArenaStats, FileId, FileStream, TrackedFile};
pub use config::{ArenaConfig, DEFAULT_BLOCK_SIZE};
pub use error::{
    Fault, clear_runtime_error, fatal, has_runtime_error, set_runtime_error, take_runtime_error,
};
pub use memory_stats::{MemorySnapshot, snapshot as memory_snapshot};
