//! Growable arrays backed by an arena
//!
//! `RtArray` is the runtime's sequence type. Storage is a slot buffer carved
//! out of an arena; growing allocates a bigger buffer in the same arena and
//! abandons the old one (arenas never free individual allocations).
//!
//! Conventions shared by every operation:
//! - **Empty is null.** A handle with no storage behaves as the empty array.
//!   Operations whose result would be empty (slice, remove, concat, clone,
//!   create, range) return a null handle rather than allocating nothing.
//! - **Mutators vs. builders.** `push`, `pop` and `clear` change the handle
//!   in place; everything else builds a fresh array in the arena it is given.
//! - **Text elements are owned.** Each text element is its own arena copy,
//!   so every element-producing operation duplicates the source text.
//! - **Faults.** Popping a null/empty array, removing out of range, a
//!   non-positive slice step and capacity overflow are fatal.
//!
//! # Example
//!
//! ```ignore
//! let arena = Arena::new();
//! let mut nums = RtArray::null();
//! for n in [1i64, 2, 3] {
//!     nums.push(&arena, n);
//! }
//! let tail = nums.slice(&arena, -2, UNSPECIFIED, UNSPECIFIED);
//! assert_eq!(tail.join(&arena, Some(",")), "2,3");
//! ```

use crate::any::{AnyTag, ArrayRef};
use sn_core::{Arena, Fault, fatal};
use std::fmt::{self, Write as _};
use std::ops::Index;
use std::slice;
use tracing::trace;

/// Nullable arena text, the element type of `str[]`
pub type Text<'a> = Option<&'a str>;

/// Slice bound meaning "not given" (start of array, end of array, step 1)
pub const UNSPECIFIED: i64 = i64::MIN;

/// Capacity of the first buffer allocated for an array
pub const MIN_CAPACITY: usize = 4;

/// A value that can be stored in an [`RtArray`]
///
/// Implemented for the runtime's scalar kinds, for nullable text and for
/// tagged values (`any[]`).
pub trait Element<'a>: Copy + Default + fmt::Debug {
    /// The same element type, re-homed into an arena that lives for `'b`
    type Promoted<'b>: Element<'b>;

    /// Tag recorded as the element kind when the array is boxed
    const TAG: AnyTag;

    /// The value to store in a new slot. Text is re-duplicated into `arena`.
    fn duplicate(self, _arena: &'a Arena<'a>) -> Self {
        self
    }

    /// Copy any arena-owned payload into `dest`
    fn promote<'b>(self, dest: &'b Arena<'b>) -> Self::Promoted<'b>;

    fn element_eq(&self, other: &Self) -> bool;

    /// Append the `join` rendering of this element
    fn join_into(&self, out: &mut String);

    /// Render this element inside a printed array (`[1, 2]`, `["a", null]`)
    fn fmt_element(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;

    fn array_ref(array: &'a RtArray<'a, Self>) -> ArrayRef<'a>;
}

macro_rules! scalar_element {
    ($ty:ty, $variant:ident, $join:literal, $print:literal) => {
        impl<'a> Element<'a> for $ty {
            type Promoted<'b> = $ty;

            const TAG: AnyTag = AnyTag::$variant;

            fn promote<'b>(self, _dest: &'b Arena<'b>) -> $ty {
                self
            }

            fn element_eq(&self, other: &Self) -> bool {
                self == other
            }

            fn join_into(&self, out: &mut String) {
                let _ = write!(out, $join, self);
            }

            fn fmt_element(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, $print, self)
            }

            fn array_ref(array: &'a RtArray<'a, $ty>) -> ArrayRef<'a> {
                ArrayRef::$variant(array)
            }
        }
    };
}

scalar_element!(i64, Long, "{}", "{}");
scalar_element!(i32, Int32, "{}", "{}");
scalar_element!(u64, Uint, "{}", "{}");
scalar_element!(u32, Uint32, "{}", "{}");
scalar_element!(f64, Double, "{:.5}", "{:.5}");
scalar_element!(f32, Float, "{:.5}", "{:.5}");
scalar_element!(char, Char, "{}", "'{}'");
scalar_element!(bool, Bool, "{}", "{}");
scalar_element!(u8, Byte, "0x{:02X}", "0x{:02X}");

impl<'a> Element<'a> for Option<&'a str> {
    type Promoted<'b> = Option<&'b str>;

    const TAG: AnyTag = AnyTag::String;

    fn duplicate(self, arena: &'a Arena<'a>) -> Self {
        self.map(|s| arena.strdup(s))
    }

    fn promote<'b>(self, dest: &'b Arena<'b>) -> Option<&'b str> {
        self.map(|s| dest.promote_string(s))
    }

    // Two nulls are equal, a null never equals a string
    fn element_eq(&self, other: &Self) -> bool {
        self == other
    }

    fn join_into(&self, out: &mut String) {
        if let Some(s) = self {
            out.push_str(s);
        }
    }

    fn fmt_element(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Some(s) => write!(f, "\"{}\"", s),
            None => f.write_str("null"),
        }
    }

    fn array_ref(array: &'a RtArray<'a, Self>) -> ArrayRef<'a> {
        ArrayRef::String(array)
    }
}

/// Allocated storage of a non-null array
struct Buffer<'a, T> {
    arena: &'a Arena<'a>,
    len: usize,
    slots: &'a mut [T],
}

impl<'a, T: Copy + Default> Buffer<'a, T> {
    /// Allocate `capacity` slots in `arena`, the first `len` produced by `f`
    fn build(
        arena: &'a Arena<'a>,
        len: usize,
        capacity: usize,
        mut f: impl FnMut(usize) -> T,
    ) -> Self {
        let slots = arena.alloc_slice_fill_with(capacity, |i| {
            if i < len { f(i) } else { T::default() }
        });
        Buffer { arena, len, slots }
    }

    /// Double the capacity (4 when there is none) in the owning arena
    fn grow(&mut self, op: &'static str) {
        let capacity = self.slots.len();
        let new_capacity = if capacity == 0 {
            MIN_CAPACITY
        } else {
            capacity
                .checked_mul(2)
                .unwrap_or_else(|| fatal(Fault::CapacityOverflow { op }))
        };
        trace!(op, capacity, new_capacity, "array: growing");

        let len = self.len;
        let old: &[T] = &self.slots[..len];
        let slots = self.arena.alloc_slice_fill_with(new_capacity, |i| {
            if i < len { old[i] } else { T::default() }
        });
        self.slots = slots;
    }
}

/// A growable, arena-backed array; a handle with no storage is "null"
pub struct RtArray<'a, T> {
    buf: Option<Buffer<'a, T>>,
}

impl<'a, T> RtArray<'a, T> {
    /// The null handle: no storage, length 0
    pub const fn null() -> Self {
        RtArray { buf: None }
    }

    pub fn is_null(&self) -> bool {
        self.buf.is_none()
    }

    /// 0 for a null handle
    pub fn len(&self) -> usize {
        self.buf.as_ref().map_or(0, |b| b.len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.buf.as_ref().map_or(0, |b| b.slots.len())
    }

    pub fn as_slice(&self) -> &[T] {
        match &self.buf {
            Some(b) => &b.slots[..b.len],
            None => &[],
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        match &mut self.buf {
            Some(b) => &mut b.slots[..b.len],
            None => &mut [],
        }
    }

    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    /// Address of the first slot; null for a null handle
    ///
    /// Two handles with the same non-null address share storage.
    pub fn as_ptr(&self) -> *const T {
        self.buf
            .as_ref()
            .map_or(std::ptr::null(), |b| b.slots.as_ptr())
    }

    /// The arena that owns this array's storage
    pub fn arena(&self) -> Option<&'a Arena<'a>> {
        self.buf.as_ref().map(|b| b.arena)
    }

    /// Drop every element but keep the buffer
    pub fn clear(&mut self) {
        if let Some(buf) = self.buf.as_mut() {
            buf.len = 0;
        }
    }

    /// Release the handle
    ///
    /// Storage belongs to the arena and is reclaimed when the arena is
    /// reset or destroyed.
    pub fn free(self) {}
}

impl<'a, T: Element<'a>> RtArray<'a, T> {
    fn from_buffer(buf: Buffer<'a, T>) -> Self {
        RtArray { buf: Some(buf) }
    }

    /// Build a `len`-element array in `arena`, or null when `len == 0`
    fn build(
        arena: &'a Arena<'a>,
        len: usize,
        capacity: usize,
        f: impl FnMut(usize) -> T,
    ) -> Self {
        if len == 0 {
            return Self::null();
        }
        Self::from_buffer(Buffer::build(arena, len, capacity.max(len), f))
    }

    /// Bulk-construct from literal data
    ///
    /// `None` or empty data yields a null handle.
    pub fn create(arena: &'a Arena<'a>, data: Option<&[T]>) -> Self {
        let data = data.unwrap_or(&[]);
        Self::build(arena, data.len(), data.len(), |i| data[i].duplicate(arena))
    }

    /// `count` copies of `value`; capacity is exactly `count`
    pub fn alloc_filled(arena: &'a Arena<'a>, count: usize, value: T) -> Self {
        Self::build(arena, count, count, |_| value.duplicate(arena))
    }

    /// Collect an exact-size iterator into a new array
    pub fn collect_in<I>(arena: &'a Arena<'a>, items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: ExactSizeIterator,
    {
        let mut items = items.into_iter();
        let len = items.len();
        Self::build(arena, len, len, |_| {
            items.next().unwrap_or_default().duplicate(arena)
        })
    }

    pub fn get(&self, index: usize) -> Option<T> {
        self.as_slice().get(index).copied()
    }

    /// Append `value`, growing the buffer when it is full
    ///
    /// A null handle gets a fresh buffer of [`MIN_CAPACITY`] slots in
    /// `arena`. Once allocated, an array always grows in the arena that owns
    /// it.
    pub fn push(&mut self, arena: &'a Arena<'a>, value: T) {
        let owner = self.arena().unwrap_or(arena);
        self.push_slot(arena, value.duplicate(owner));
    }

    /// Store an already-owned value at the end
    fn push_slot(&mut self, arena: &'a Arena<'a>, value: T) {
        if let Some(buf) = self.buf.as_mut() {
            if buf.len == buf.slots.len() {
                buf.grow("push");
            }
            buf.slots[buf.len] = value;
            buf.len += 1;
            return;
        }
        self.buf = Some(Buffer::build(arena, 1, MIN_CAPACITY, |_| value));
    }

    /// Remove and return the last element; fatal on a null or empty array
    pub fn pop(&mut self) -> T {
        let Some(buf) = self.buf.as_mut() else {
            fatal(Fault::NullArray { op: "pop" });
        };
        if buf.len == 0 {
            fatal(Fault::EmptyArray { op: "pop" });
        }
        buf.len -= 1;
        buf.slots[buf.len]
    }

    /// Python-style `[start:end:step]`
    ///
    /// [`UNSPECIFIED`] selects the default for each bound. Negative bounds
    /// count from the end and are clamped to 0, then both are clamped to the
    /// length. An empty or inverted range yields a null handle.
    pub fn slice(&self, arena: &'a Arena<'a>, start: i64, end: i64, step: i64) -> Self {
        let step = if step == UNSPECIFIED { 1 } else { step };
        if step <= 0 {
            fatal(Fault::InvalidStep { op: "slice", step });
        }

        let len = self.len() as i64;
        let resolve = |bound: i64, unspecified: i64| {
            if bound == UNSPECIFIED {
                unspecified
            } else if bound < 0 {
                (len + bound).max(0)
            } else {
                bound.min(len)
            }
        };
        let start = resolve(start, 0);
        let end = resolve(end, len);
        if start >= end {
            return Self::null();
        }

        let (start, step) = (start as usize, step as usize);
        let count = (end as usize - start).div_ceil(step);
        let src = self.as_slice();
        Self::build(arena, count, count.max(MIN_CAPACITY), |i| {
            src[start + i * step].duplicate(arena)
        })
    }

    /// A new array holding this array's elements followed by `value`
    pub fn push_copy(&self, arena: &'a Arena<'a>, value: T) -> Self {
        let src = self.as_slice();
        let len = src.len() + 1;
        Self::build(arena, len, len.max(MIN_CAPACITY), |i| match src.get(i) {
            Some(elem) => elem.duplicate(arena),
            None => value.duplicate(arena),
        })
    }

    /// Deep copy into `arena`; null when there is nothing to copy
    pub fn clone_in(&self, arena: &'a Arena<'a>) -> Self {
        let src = self.as_slice();
        Self::build(arena, src.len(), src.len().max(MIN_CAPACITY), |i| {
            src[i].duplicate(arena)
        })
    }

    /// This array followed by `other`
    pub fn concat(&self, arena: &'a Arena<'a>, other: &RtArray<'a, T>) -> Self {
        let (a, b) = (self.as_slice(), other.as_slice());
        let len = a.len() + b.len();
        Self::build(arena, len, len.max(MIN_CAPACITY), |i| {
            let elem = if i < a.len() { a[i] } else { b[i - a.len()] };
            elem.duplicate(arena)
        })
    }

    /// The elements in reverse order
    pub fn reverse(&self, arena: &'a Arena<'a>) -> Self {
        let src = self.as_slice();
        let len = src.len();
        Self::build(arena, len, len.max(MIN_CAPACITY), |i| {
            src[len - 1 - i].duplicate(arena)
        })
    }

    /// A new array without the element at `index`
    ///
    /// A null handle stays null. An index outside `0..len` is fatal, and
    /// removing the only element yields null.
    pub fn remove(&self, arena: &'a Arena<'a>, index: i64) -> Self {
        if self.is_null() {
            return Self::null();
        }
        let src = self.as_slice();
        let Some(index) = usize::try_from(index).ok().filter(|&i| i < src.len()) else {
            fatal(Fault::IndexOutOfBounds {
                op: "remove",
                index,
                len: src.len(),
            });
        };
        let len = src.len() - 1;
        Self::build(arena, len, len.max(MIN_CAPACITY), |i| {
            let from = if i < index { i } else { i + 1 };
            src[from].duplicate(arena)
        })
    }

    /// A new array with `value` inserted before `index`
    ///
    /// Out-of-range indices are clamped to `0..=len`.
    pub fn insert(&self, arena: &'a Arena<'a>, value: T, index: i64) -> Self {
        let src = self.as_slice();
        let at = usize::try_from(index.max(0)).map_or(src.len(), |i| i.min(src.len()));
        let len = src.len() + 1;
        Self::build(arena, len, len.max(MIN_CAPACITY), |i| {
            let elem = match i.cmp(&at) {
                std::cmp::Ordering::Less => src[i],
                std::cmp::Ordering::Equal => value,
                std::cmp::Ordering::Greater => src[i - 1],
            };
            elem.duplicate(arena)
        })
    }

    /// Position of the first element equal to `value`
    pub fn index_of(&self, value: &T) -> Option<usize> {
        self.iter().position(|elem| elem.element_eq(value))
    }

    pub fn contains(&self, value: &T) -> bool {
        self.index_of(value).is_some()
    }

    /// Render every element and join with `separator`
    ///
    /// A null or empty array joins to the empty string.
    pub fn join(&self, arena: &'a Arena<'a>, separator: Option<&str>) -> &'a str {
        if self.is_empty() {
            return "";
        }
        let separator = separator.unwrap_or("");
        let mut out = String::new();
        for (i, elem) in self.iter().enumerate() {
            if i > 0 {
                out.push_str(separator);
            }
            elem.join_into(&mut out);
        }
        arena.strdup(&out)
    }

    /// Element-wise equality
    ///
    /// Two null handles are equal. A null handle never equals an allocated
    /// array, even one that has been cleared.
    pub fn equals(&self, other: &RtArray<'a, T>) -> bool {
        if self.is_null() || other.is_null() {
            return self.is_null() && other.is_null();
        }
        let (a, b) = (self.as_slice(), other.as_slice());
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.element_eq(y))
    }

    /// Deep copy into another arena, re-homing text payloads
    pub fn promote<'b>(&self, dest: &'b Arena<'b>) -> RtArray<'b, T::Promoted<'b>> {
        let src = self.as_slice();
        RtArray::build(dest, src.len(), src.len(), |i| src[i].promote(dest))
    }

    /// Borrow as a type-erased array reference (for boxing)
    pub fn as_array_ref(&'a self) -> ArrayRef<'a> {
        T::array_ref(self)
    }
}

impl<'a> RtArray<'a, i64> {
    /// `start, start + 1, ..., end - 1`; null when `end <= start`
    pub fn range(arena: &'a Arena<'a>, start: i64, end: i64) -> Self {
        if end <= start {
            return Self::null();
        }
        let len = usize::try_from(end.abs_diff(start))
            .unwrap_or_else(|_| fatal(Fault::CapacityOverflow { op: "range" }));
        Self::build(arena, len, len, |i| start.wrapping_add(i as i64))
    }
}

impl<'a> RtArray<'a, u8> {
    /// `count` zero bytes, ready to be filled by a reader
    pub fn zeroed(arena: &'a Arena<'a>, count: usize) -> Self {
        Self::build(arena, count, count, |_| 0)
    }
}

/// Text arrays accept borrowed text of any lifetime; it is copied in first
impl<'a> RtArray<'a, Text<'a>> {
    pub fn push_str(&mut self, arena: &'a Arena<'a>, value: Option<&str>) {
        let owner = self.arena().unwrap_or(arena);
        self.push_slot(arena, value.map(|s| owner.strdup(s)));
    }

    pub fn push_copy_str(&self, arena: &'a Arena<'a>, value: Option<&str>) -> Self {
        self.push_copy(arena, value.map(|s| arena.strdup(s)))
    }

    pub fn insert_str(&self, arena: &'a Arena<'a>, value: Option<&str>, index: i64) -> Self {
        self.insert(arena, value.map(|s| arena.strdup(s)), index)
    }

    pub fn index_of_str(&self, value: Option<&str>) -> Option<usize> {
        self.iter().position(|elem| *elem == value)
    }

    pub fn contains_str(&self, value: Option<&str>) -> bool {
        self.index_of_str(value).is_some()
    }
}

impl<T> Default for RtArray<'_, T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> Index<usize> for RtArray<'_, T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.as_slice()[index]
    }
}

impl<'s, T> IntoIterator for &'s RtArray<'_, T> {
    type Item = &'s T;
    type IntoIter = slice::Iter<'s, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T: Element<'a>> PartialEq for RtArray<'a, T> {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl<T: fmt::Debug> fmt::Debug for RtArray<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return f.write_str("RtArray(null)");
        }
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Printed form: `[1, 2, 3]`, `['a', 'b']`, `["x", null]`, `[0x0A]`
impl<'a, T: Element<'a>> fmt::Display for RtArray<'a, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, elem) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            elem.fmt_element(f)?;
        }
        f.write_str("]")
    }
}
