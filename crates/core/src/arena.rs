//! Arena Allocator - block-chained regions with parent/child nesting
//!
//! Every heap-shaped runtime value (text, arrays, boxed payloads) lives in
//! an arena. Generated code creates one arena per dynamic scope, allocates
//! from it, and destroys it when the scope exits, freeing everything at once.
//!
//! Design:
//! - Blocks of `default_block_size` bytes are chained lazily; the current
//!   block is always the last one. Holes in earlier blocks are never reused.
//! - A request that does not fit the current block gets a fresh block of
//!   `max(size, default_block_size)` bytes, so oversized requests own a block.
//! - Returned slices borrow the arena, which makes "a pointer must not
//!   outlive its arena" a compile-time property.
//! - A child arena borrows its parent. Destroying the parent first does not
//!   compile, and destroying a parent never cascades into children.
//! - Values escape only by copying into a longer-lived arena (`promote`).
//! - Open file handles registered with `track_file` are closed when the
//!   arena is dropped, before any block is released.
//!
//! Arenas are single-owner: they are neither `Send` nor `Sync`.

use crate::config::ArenaConfig;
use crate::error::{Fault, fatal};
use crate::memory_stats;
use std::alloc::{self, Layout};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::io::{self, Read, Write};
use std::ptr::{self, NonNull};
use std::slice;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace, warn};

/// Alignment of every block's data region
const BLOCK_ALIGN: usize = 16;

/// One contiguous region in the chain
struct Block {
    data: NonNull<u8>,
    size: usize,
    used: usize,
}

impl Block {
    fn new(size: usize) -> Block {
        let layout = block_layout(size);
        // SAFETY: block_layout never produces a zero-sized layout
        let data = unsafe { alloc::alloc_zeroed(layout) };
        let Some(data) = NonNull::new(data) else {
            fatal(Fault::OutOfMemory { requested: size });
        };
        memory_stats::record_block_reserved(size);
        Block {
            data,
            size,
            used: 0,
        }
    }

    /// Offset at which `size` bytes aligned to `align` would start, if they fit
    fn fit(&self, size: usize, align: usize) -> Option<usize> {
        let cursor = (self.data.as_ptr() as usize).checked_add(self.used)?;
        let padding = cursor.wrapping_neg() & (align - 1);
        let start = self.used.checked_add(padding)?;
        let end = start.checked_add(size)?;
        (end <= self.size).then_some(start)
    }

    fn remaining(&self) -> usize {
        self.size - self.used
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        // SAFETY: `data` came from `alloc_zeroed` with exactly this layout
        unsafe { alloc::dealloc(self.data.as_ptr(), block_layout(self.size)) };
        memory_stats::record_block_released(self.size);
    }
}

fn block_layout(size: usize) -> Layout {
    match Layout::from_size_align(size.max(1), BLOCK_ALIGN) {
        Ok(layout) => layout,
        Err(_) => fatal(Fault::OutOfMemory { requested: size }),
    }
}

// =============================================================================
// Tracked files
// =============================================================================

/// A byte stream an arena can close when it is destroyed
///
/// The default `close` only flushes; the owning `TrackedFile` drops the
/// stream right afterwards, which releases the underlying resource.
pub trait FileStream: Read + Write {
    fn close(&mut self) -> io::Result<()> {
        self.flush()
    }
}

impl FileStream for std::fs::File {}

/// A file stream registered with an arena
pub struct TrackedFile {
    /// `None` once closed
    stream: Option<Box<dyn FileStream>>,
    path: String,
    is_text: bool,
}

impl TrackedFile {
    pub fn new(stream: impl FileStream + 'static, path: impl Into<String>, is_text: bool) -> Self {
        TrackedFile {
            stream: Some(Box::new(stream)),
            path: path.into(),
            is_text,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Text handles read and write UTF-8, binary handles raw bytes
    pub fn is_text(&self) -> bool {
        self.is_text
    }

    /// Borrow the stream for I/O; fails once the handle is closed
    pub fn stream(&mut self) -> io::Result<&mut (dyn FileStream + 'static)> {
        match self.stream.as_mut() {
            Some(stream) => Ok(stream.as_mut()),
            None => Err(io::Error::other(format!("{}: file is closed", self.path))),
        }
    }

    /// Close and drop the stream. Closing twice is a no-op.
    pub fn close(&mut self) -> io::Result<()> {
        match self.stream.take() {
            Some(mut stream) => stream.close(),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for TrackedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedFile")
            .field("path", &self.path)
            .field("is_open", &self.is_open())
            .field("is_text", &self.is_text)
            .finish_non_exhaustive()
    }
}

/// Handle to a file tracked by one particular arena
///
/// An id carries the serial of the arena that issued it, so another
/// arena's file API rejects it. Slots are not reused: an untracked or
/// closed file's id never names a later file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId {
    arena: u64,
    slot: usize,
}

static NEXT_ARENA_SERIAL: AtomicU64 = AtomicU64::new(1);

// =============================================================================
// Arena
// =============================================================================

/// Arena statistics for debugging/monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaStats {
    /// Sum of all requested sizes since creation or the last reset
    pub total_allocated: usize,
    pub block_count: usize,
    /// Capacity of all blocks in the chain
    pub reserved_bytes: usize,
    /// Free bytes left in the current block
    pub current_block_remaining: usize,
    pub tracked_files: usize,
}

/// A region allocator, optionally nested under a parent
///
/// `'p` is the lifetime of the parent borrow; root arenas are `Arena<'static>`.
pub struct Arena<'p> {
    parent: Option<&'p Arena<'p>>,
    serial: u64,
    default_block_size: usize,
    blocks: RefCell<Vec<Block>>,
    total_allocated: Cell<usize>,
    files: RefCell<Vec<Option<TrackedFile>>>,
}

impl Arena<'static> {
    /// Create a root arena using the configured default block size
    pub fn new() -> Self {
        Arena::create(None)
    }

    /// Create a root arena with a specific block size (0 means the default)
    pub fn with_block_size(block_size: usize) -> Self {
        Arena::create_sized(None, block_size)
    }
}

impl Default for Arena<'static> {
    fn default() -> Self {
        Arena::new()
    }
}

impl<'p> Arena<'p> {
    pub fn create(parent: Option<&'p Arena<'p>>) -> Self {
        Arena::create_sized(parent, 0)
    }

    pub fn create_sized(parent: Option<&'p Arena<'p>>, block_size: usize) -> Self {
        let default_block_size = ArenaConfig::global().block_size_or_default(block_size);
        memory_stats::record_arena_created();
        debug!(
            default_block_size,
            nested = parent.is_some(),
            "arena: created"
        );
        Arena {
            parent,
            serial: NEXT_ARENA_SERIAL.fetch_add(1, Ordering::Relaxed),
            default_block_size,
            blocks: RefCell::new(Vec::new()),
            total_allocated: Cell::new(0),
            files: RefCell::new(Vec::new()),
        }
    }

    /// Create an arena nested under this one
    pub fn child(&self) -> Arena<'_> {
        Arena::create(Some(self))
    }

    pub fn child_sized(&self, block_size: usize) -> Arena<'_> {
        Arena::create_sized(Some(self), block_size)
    }

    pub fn parent(&self) -> Option<&'p Arena<'p>> {
        self.parent
    }

    pub fn default_block_size(&self) -> usize {
        self.default_block_size
    }

    /// Reserve `size` bytes aligned to `align` (a power of two)
    fn bump(&self, size: usize, align: usize) -> NonNull<u8> {
        let mut blocks = self.blocks.borrow_mut();
        let start = match blocks.last().and_then(|b| b.fit(size, align)) {
            Some(start) => start,
            None => {
                let needed = size
                    .checked_add(align - 1)
                    .unwrap_or_else(|| fatal(Fault::CapacityOverflow { op: "alloc" }));
                let block_size = needed.max(self.default_block_size);
                trace!(
                    block_size,
                    requested = size,
                    blocks = blocks.len() + 1,
                    "arena: chaining block"
                );
                let block = Block::new(block_size);
                let Some(start) = block.fit(size, align) else {
                    fatal(Fault::OutOfMemory { requested: size });
                };
                blocks.push(block);
                start
            }
        };

        let current = blocks.len() - 1;
        let block = &mut blocks[current];
        block.used = start + size;
        self.total_allocated.set(self.total_allocated.get() + size);
        memory_stats::record_allocation(size);
        // SAFETY: start + size <= block.size, so the result stays in the block
        unsafe { NonNull::new_unchecked(block.data.as_ptr().add(start)) }
    }

    /// Allocate `size` bytes that live as long as the arena
    ///
    /// The bytes are initialized but their contents are unspecified; use
    /// [`calloc`](Self::calloc) when zeroes are required. A zero-size request
    /// returns an empty slice without touching the block chain.
    #[allow(clippy::mut_from_ref)]
    pub fn alloc(&self, size: usize) -> &mut [u8] {
        if size == 0 {
            return &mut [];
        }
        let ptr = self.bump(size, 1);
        // SAFETY: `bump` handed out `size` initialized bytes no other slice
        // overlaps. Blocks are released only by `reset` (needs `&mut self`)
        // or drop, so the borrow of `self` keeps them alive.
        unsafe { slice::from_raw_parts_mut(ptr.as_ptr(), size) }
    }

    /// Allocate `count * size` zeroed bytes
    #[allow(clippy::mut_from_ref)]
    pub fn calloc(&self, count: usize, size: usize) -> &mut [u8] {
        let total = count
            .checked_mul(size)
            .unwrap_or_else(|| fatal(Fault::CapacityOverflow { op: "calloc" }));
        let bytes = self.alloc(total);
        bytes.fill(0);
        bytes
    }

    /// Allocate `size` bytes whose address is a multiple of `alignment`
    ///
    /// The padding skipped to reach the alignment is wasted. Alignments that
    /// are not a power of two are fatal.
    #[allow(clippy::mut_from_ref)]
    pub fn alloc_aligned(&self, size: usize, alignment: usize) -> &mut [u8] {
        if !alignment.is_power_of_two() {
            fatal(Fault::InvalidAlignment { alignment });
        }
        if size == 0 {
            return &mut [];
        }
        let ptr = self.bump(size, alignment);
        // SAFETY: see `alloc`
        unsafe { slice::from_raw_parts_mut(ptr.as_ptr(), size) }
    }

    /// Allocate a slice of `len` elements produced by `f(index)`
    ///
    /// Elements are `Copy`: the arena never runs destructors.
    #[allow(clippy::mut_from_ref)]
    pub fn alloc_slice_fill_with<T: Copy>(
        &self,
        len: usize,
        mut f: impl FnMut(usize) -> T,
    ) -> &mut [T] {
        let layout = Layout::array::<T>(len)
            .unwrap_or_else(|_| fatal(Fault::CapacityOverflow { op: "alloc_slice" }));
        let ptr = if layout.size() == 0 {
            NonNull::<T>::dangling()
        } else {
            self.bump(layout.size(), layout.align()).cast::<T>()
        };
        // SAFETY: the region holds `len` properly aligned `T` slots (or `T`
        // is zero-sized), and every slot is written before the slice exists.
        unsafe {
            for i in 0..len {
                ptr.as_ptr().add(i).write(f(i));
            }
            slice::from_raw_parts_mut(ptr.as_ptr(), len)
        }
    }

    #[allow(clippy::mut_from_ref)]
    pub fn alloc_slice_fill_copy<T: Copy>(&self, len: usize, value: T) -> &mut [T] {
        self.alloc_slice_fill_with(len, |_| value)
    }

    #[allow(clippy::mut_from_ref)]
    pub fn alloc_slice_copy<T: Copy>(&self, src: &[T]) -> &mut [T] {
        self.alloc_slice_fill_with(src.len(), |i| src[i])
    }

    /// Move `value` into the arena
    ///
    /// The arena never runs destructors, so anything `value` owns outside
    /// the arena is leaked when the arena goes away.
    #[allow(clippy::mut_from_ref)]
    pub fn alloc_value<T>(&self, value: T) -> &mut T {
        let layout = Layout::new::<T>();
        let ptr = if layout.size() == 0 {
            NonNull::<T>::dangling()
        } else {
            self.bump(layout.size(), layout.align()).cast::<T>()
        };
        // SAFETY: the slot is sized and aligned for `T` and exclusively ours
        unsafe {
            ptr.as_ptr().write(value);
            &mut *ptr.as_ptr()
        }
    }

    /// Copy `s` into the arena
    pub fn strdup(&self, s: &str) -> &str {
        let bytes = self.alloc_slice_copy(s.as_bytes());
        // SAFETY: copied verbatim from a `str`
        unsafe { std::str::from_utf8_unchecked(bytes) }
    }

    /// Copy at most the first `n` bytes of `s` into the arena
    ///
    /// The cut is moved back to the nearest character boundary so the copy
    /// is always valid UTF-8.
    pub fn strndup(&self, s: &str, n: usize) -> &str {
        let mut end = n.min(s.len());
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        self.strdup(&s[..end])
    }

    /// Copy bytes from anywhere (typically a shorter-lived arena) into this one
    pub fn promote(&self, src: &[u8]) -> &[u8] {
        self.alloc_slice_copy(src)
    }

    /// Copy text from anywhere into this arena
    pub fn promote_string(&self, src: &str) -> &str {
        self.strdup(src)
    }

    /// Sum of the sizes requested since creation or the last reset
    ///
    /// Alignment padding and unused block tails are not counted.
    pub fn total_allocated(&self) -> usize {
        self.total_allocated.get()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.borrow().len()
    }

    pub fn stats(&self) -> ArenaStats {
        let blocks = self.blocks.borrow();
        ArenaStats {
            total_allocated: self.total_allocated.get(),
            block_count: blocks.len(),
            reserved_bytes: blocks.iter().map(|b| b.size).sum(),
            current_block_remaining: blocks.last().map_or(0, Block::remaining),
            tracked_files: self.tracked_file_count(),
        }
    }

    /// Release every block but the first and rewind the first to empty
    ///
    /// Tracked files are left alone: a reset reuses transient memory, it is
    /// not the end of the arena's lifetime.
    pub fn reset(&mut self) {
        let blocks = self.blocks.get_mut();
        let released = blocks.len().saturating_sub(1);
        blocks.truncate(1);
        if let Some(first) = blocks.first_mut() {
            first.used = 0;
        }
        self.total_allocated.set(0);
        debug!(released_blocks = released, "arena: reset");
    }

    /// Close tracked files, then free every block
    pub fn destroy(self) {
        drop(self);
    }

    /// Register an open stream so it is closed when this arena dies
    pub fn track_file(&self, file: TrackedFile) -> FileId {
        debug!(
            path = file.path(),
            text = file.is_text(),
            "arena: tracking file"
        );
        memory_stats::record_file_tracked();
        let mut files = self.files.borrow_mut();
        files.push(Some(file));
        FileId {
            arena: self.serial,
            slot: files.len() - 1,
        }
    }

    fn slot_of(&self, id: FileId) -> Option<usize> {
        (id.arena == self.serial).then_some(id.slot)
    }

    /// Remove a file from this arena, handing ownership to the caller
    ///
    /// Used when a handle is promoted into another arena, so that only the
    /// new owner closes it.
    pub fn untrack_file(&self, id: FileId) -> Option<TrackedFile> {
        let slot = self.slot_of(id)?;
        let file = self.files.borrow_mut().get_mut(slot)?.take()?;
        debug!(path = file.path(), "arena: untracked file");
        Some(file)
    }

    /// Run `f` against a tracked file
    ///
    /// `None` if `id` was issued by another arena or the file was untracked.
    /// `f` must not call back into this arena's file API.
    pub fn with_file<R>(&self, id: FileId, f: impl FnOnce(&mut TrackedFile) -> R) -> Option<R> {
        let slot = self.slot_of(id)?;
        let mut files = self.files.borrow_mut();
        let file = files.get_mut(slot)?.as_mut()?;
        Some(f(file))
    }

    pub fn close_file(&self, id: FileId) -> io::Result<()> {
        self.with_file(id, TrackedFile::close).unwrap_or_else(|| {
            Err(io::Error::new(
                io::ErrorKind::NotFound,
                "file is not tracked by this arena",
            ))
        })
    }

    pub fn is_file_open(&self, id: FileId) -> bool {
        self.with_file(id, |f| f.is_open()).unwrap_or(false)
    }

    pub fn tracked_file_count(&self) -> usize {
        self.files.borrow().iter().flatten().count()
    }

    fn close_tracked_files(&mut self) -> usize {
        let mut closed = 0;
        for file in self.files.get_mut().iter_mut().flatten() {
            if !file.is_open() {
                continue;
            }
            if let Err(e) = file.close() {
                warn!(path = file.path(), error = %e, "arena: failed to close tracked file");
            }
            memory_stats::record_file_auto_closed();
            closed += 1;
        }
        self.files.get_mut().clear();
        closed
    }
}

impl Drop for Arena<'_> {
    fn drop(&mut self) {
        // Files first: their streams may still need to flush
        let closed_files = self.close_tracked_files();
        let blocks = self.blocks.get_mut();
        debug!(
            total_allocated = self.total_allocated.get(),
            blocks = blocks.len(),
            closed_files,
            "arena: destroyed"
        );
        blocks.clear();
        memory_stats::record_arena_destroyed();
    }
}

impl fmt::Debug for Arena<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("nested", &self.parent.is_some())
            .field("default_block_size", &self.default_block_size)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Whether two arena references name the same arena
pub fn same_arena(a: &Arena<'_>, b: &Arena<'_>) -> bool {
    ptr::addr_eq(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::io::Cursor;
    use std::rc::Rc;

    /// In-memory stream that counts how often it was closed
    struct MockStream {
        inner: Cursor<Vec<u8>>,
        closes: Rc<Cell<usize>>,
    }

    impl MockStream {
        fn new(closes: &Rc<Cell<usize>>) -> Self {
            MockStream {
                inner: Cursor::new(Vec::new()),
                closes: Rc::clone(closes),
            }
        }
    }

    impl Read for MockStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.inner.read(buf)
        }
    }

    impl Write for MockStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.inner.write(buf)
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl FileStream for MockStream {
        fn close(&mut self) -> io::Result<()> {
            self.closes.set(self.closes.get() + 1);
            Ok(())
        }
    }

    #[test]
    fn test_alloc_returns_requested_size() {
        let arena = Arena::new();
        let bytes = arena.alloc(100);
        assert_eq!(bytes.len(), 100);
        bytes[99] = 7;
        assert_eq!(bytes[99], 7);
        assert_eq!(arena.total_allocated(), 100);
        assert_eq!(arena.block_count(), 1);
    }

    #[test]
    fn test_alloc_zero_is_empty() {
        let arena = Arena::new();
        assert!(arena.alloc(0).is_empty());
        assert_eq!(arena.block_count(), 0);
        assert_eq!(arena.total_allocated(), 0);
    }

    #[test]
    fn test_total_allocated_is_sum_of_requests() {
        let arena = Arena::with_block_size(256);
        let sizes = [1usize, 7, 64, 100, 3, 250, 16];
        for &size in &sizes {
            arena.alloc(size);
        }
        assert_eq!(arena.total_allocated(), sizes.iter().sum::<usize>());
    }

    #[test]
    fn test_new_block_when_current_is_full() {
        let arena = Arena::with_block_size(32);
        arena.alloc(16);
        assert_eq!(arena.block_count(), 1);

        // 16 bytes left, 24 requested: a second block is chained
        arena.alloc(24);
        assert_eq!(arena.block_count(), 2);

        // The leftover tail of the first block is not revisited
        arena.alloc(8);
        assert_eq!(arena.block_count(), 2);
        assert_eq!(arena.stats().current_block_remaining, 0);
    }

    #[test]
    fn test_oversized_request_gets_own_block() {
        let arena = Arena::with_block_size(64);
        let big = arena.alloc(1000);
        assert_eq!(big.len(), 1000);
        let stats = arena.stats();
        assert_eq!(stats.block_count, 1);
        assert!(stats.reserved_bytes >= 1000);
    }

    #[test]
    fn test_allocations_do_not_overlap() {
        let arena = Arena::with_block_size(64);
        let a = arena.alloc(10);
        let b = arena.alloc(10);
        a.fill(0xAA);
        b.fill(0xBB);
        assert!(a.iter().all(|&x| x == 0xAA));
        assert!(b.iter().all(|&x| x == 0xBB));
    }

    #[test]
    fn test_create_sized_zero_uses_default() {
        let arena = Arena::with_block_size(0);
        assert_eq!(
            arena.default_block_size(),
            ArenaConfig::global().default_block_size
        );
    }

    #[test]
    fn test_calloc_zeroes_reused_memory() {
        let mut arena = Arena::with_block_size(64);
        arena.alloc(32).fill(0xFF);
        arena.reset();
        let zeroed = arena.calloc(4, 8);
        assert_eq!(zeroed.len(), 32);
        assert!(zeroed.iter().all(|&b| b == 0));
    }

    #[test]
    #[should_panic(expected = "calloc: capacity overflow")]
    fn test_calloc_overflow_is_fatal() {
        let arena = Arena::new();
        arena.calloc(usize::MAX, 2);
    }

    #[test]
    fn test_alloc_aligned() {
        let arena = Arena::with_block_size(256);
        arena.alloc(3);
        let aligned = arena.alloc_aligned(16, 64);
        assert_eq!(aligned.as_ptr() as usize % 64, 0);
        assert_eq!(aligned.len(), 16);
        // Padding is not part of the total
        assert_eq!(arena.total_allocated(), 19);
    }

    #[test]
    #[should_panic(expected = "not a power of two")]
    fn test_alloc_aligned_rejects_bad_alignment() {
        let arena = Arena::new();
        arena.alloc_aligned(8, 12);
    }

    #[test]
    fn test_alloc_slices() {
        let arena = Arena::new();
        let filled = arena.alloc_slice_fill_copy(5, 42i64);
        assert_eq!(filled, &[42, 42, 42, 42, 42]);

        let copied = arena.alloc_slice_copy(&[1.5f64, 2.5]);
        assert_eq!(copied, &[1.5, 2.5]);
        assert_eq!(copied.as_ptr() as usize % std::mem::align_of::<f64>(), 0);

        let squares = arena.alloc_slice_fill_with(4, |i| (i * i) as u32);
        assert_eq!(squares, &[0, 1, 4, 9]);

        let empty: &mut [u64] = arena.alloc_slice_copy(&[]);
        assert!(empty.is_empty());

        let pair = arena.alloc_value((7u16, 'x'));
        pair.0 += 1;
        assert_eq!(*pair, (8, 'x'));
    }

    #[test]
    fn test_strdup_and_strndup() {
        let arena = Arena::new();
        let s = arena.strdup("hello");
        assert_eq!(s, "hello");
        assert_eq!(arena.strndup("hello", 3), "hel");
        assert_eq!(arena.strndup("hi", 10), "hi");
        // 'é' spans bytes 1..3; cutting at 2 backs off to the boundary
        assert_eq!(arena.strndup("héllo", 2), "h");
        assert_eq!(arena.strdup(""), "");
    }

    #[test]
    fn test_promote_outlives_child() {
        let parent = Arena::new();
        let promoted;
        let bytes;
        {
            let child = parent.child();
            assert!(child.parent().is_some_and(|p| same_arena(p, &parent)));
            let text = child.strdup("hi");
            let raw = child.alloc_slice_copy(&[1u8, 2, 3]);
            promoted = parent.promote_string(text);
            bytes = parent.promote(raw);
            child.destroy();
        }
        assert_eq!(promoted, "hi");
        assert_eq!(bytes, &[1, 2, 3]);
    }

    #[test]
    fn test_reset_keeps_first_block() {
        let mut arena = Arena::with_block_size(64);
        for _ in 0..10 {
            arena.alloc(100);
        }
        assert!(arena.block_count() > 1);

        arena.reset();
        assert_eq!(arena.block_count(), 1);
        assert_eq!(arena.total_allocated(), 0);
        // The surviving first block is fully reusable
        assert_eq!(arena.stats().current_block_remaining, 100);

        assert_eq!(arena.alloc(32).len(), 32);
        assert_eq!(arena.block_count(), 1);
    }

    #[test]
    fn test_destroy_closes_open_files() {
        let closes = Rc::new(Cell::new(0));
        let arena = Arena::new();
        arena.track_file(TrackedFile::new(MockStream::new(&closes), "a.txt", true));
        arena.track_file(TrackedFile::new(MockStream::new(&closes), "b.bin", false));
        let closed = arena.track_file(TrackedFile::new(MockStream::new(&closes), "c.txt", true));

        arena.close_file(closed).unwrap();
        assert_eq!(closes.get(), 1);
        assert!(!arena.is_file_open(closed));

        arena.destroy();
        // The already-closed handle is not closed again
        assert_eq!(closes.get(), 3);
    }

    #[test]
    fn test_reset_leaves_files_open() {
        let closes = Rc::new(Cell::new(0));
        let mut arena = Arena::new();
        let id = arena.track_file(TrackedFile::new(MockStream::new(&closes), "log", true));
        arena.alloc(10);
        arena.reset();
        assert!(arena.is_file_open(id));
        assert_eq!(closes.get(), 0);
        drop(arena);
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn test_untrack_transfers_ownership() {
        let closes = Rc::new(Cell::new(0));
        let dest = Arena::new();
        let dest_id;
        {
            let src = dest.child();
            let id = src.track_file(TrackedFile::new(MockStream::new(&closes), "out", false));
            assert_eq!(src.tracked_file_count(), 1);

            let file = src.untrack_file(id).unwrap();
            assert!(src.untrack_file(id).is_none());
            assert_eq!(src.tracked_file_count(), 0);
            dest_id = dest.track_file(file);
        }
        // Source arena is gone; the file is still open in its new owner
        assert_eq!(closes.get(), 0);
        assert!(dest.is_file_open(dest_id));
        drop(dest);
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn test_closed_stream_rejects_io() {
        let closes = Rc::new(Cell::new(0));
        let arena = Arena::new();
        let id = arena.track_file(TrackedFile::new(MockStream::new(&closes), "x", true));
        let wrote = arena.with_file(id, |f| f.stream().and_then(|s| s.write(b"abc")));
        assert_eq!(wrote.unwrap().unwrap(), 3);

        arena.close_file(id).unwrap();
        let after = arena.with_file(id, |f| f.stream().map(|_| ()));
        assert!(after.unwrap().is_err());
    }

    #[test]
    fn test_close_drops_stream() {
        let closes = Rc::new(Cell::new(0));
        let arena = Arena::new();
        let id = arena.track_file(TrackedFile::new(MockStream::new(&closes), "x", true));
        assert_eq!(Rc::strong_count(&closes), 2);

        arena.close_file(id).unwrap();
        assert_eq!(closes.get(), 1);
        // Still tracked, but the stream itself is gone
        assert_eq!(arena.tracked_file_count(), 1);
        assert_eq!(Rc::strong_count(&closes), 1);

        arena.close_file(id).unwrap();
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn test_file_id_is_bound_to_its_arena() {
        let closes = Rc::new(Cell::new(0));
        let a = Arena::new();
        let b = Arena::new();
        let in_a = a.track_file(TrackedFile::new(MockStream::new(&closes), "a", true));
        let in_b = b.track_file(TrackedFile::new(MockStream::new(&closes), "b", true));

        assert!(!b.is_file_open(in_a));
        assert!(b.with_file(in_a, |f| f.path().to_string()).is_none());
        assert!(b.untrack_file(in_a).is_none());
        assert!(b.close_file(in_a).is_err());
        assert_eq!(closes.get(), 0);
        assert!(a.is_file_open(in_a));
        assert_eq!(b.with_file(in_b, |f| f.path().to_string()).as_deref(), Some("b"));
    }

    #[test]
    fn test_stats() {
        let arena = Arena::with_block_size(128);
        arena.alloc(100);
        arena.alloc(100);
        let stats = arena.stats();
        assert_eq!(stats.total_allocated, 200);
        assert_eq!(stats.block_count, 2);
        assert_eq!(stats.reserved_bytes, 256);
        assert_eq!(stats.current_block_remaining, 28);
        assert_eq!(stats.tracked_files, 0);
    }

    #[test]
    fn test_lifecycle_updates_global_counters() {
        let before = memory_stats::snapshot();
        {
            let arena = Arena::new();
            arena.alloc(64);
        }
        let after = memory_stats::snapshot();
        assert!(after.arenas_created >= before.arenas_created + 1);
        assert!(after.arenas_destroyed >= before.arenas_destroyed + 1);
        assert!(after.bytes_allocated >= before.bytes_allocated + 64);
    }
}
