//! Append-only arena for long-lived runtime metadata.
//!
//! [`AppendArena`] stores values that live as long as the arena itself, such
//! as class records and interned selector names. Values are addressed by the
//! index returned from [`AppendArena::push`], never by raw address, so
//! records can refer to each other (superclass, metaclass) without forming
//! ownership cycles.
//!
//! # Architecture
//!
//! Storage is split into segments that double in size, mirroring the chunk
//! growth strategy of a bump arena:
//!
//! ```text
//! segment 0: indices [0, 64)
//! segment 1: indices [64, 192)
//! segment 2: indices [192, 448)
//! ...
//! ```
//!
//! Segments are allocated lazily and never move or shrink, so a reference
//! obtained from [`AppendArena::get`] stays valid for the lifetime of the
//! arena even while other threads keep appending.
//!
//! # Thread Safety
//!
//! - Appends are serialised by a mutex (slow path, rare)
//! - Reads are lock-free: every slot is a write-once `OnceLock`, and the
//!   published length is stored with `Release` and loaded with `Acquire`
//!
//! # Example
//!
//! ```
//! use oxidyn_mem::AppendArena;
//!
//! let arena = AppendArena::new();
//! let first = arena.push("first").unwrap();
//! let second = arena.push("second").unwrap();
//!
//! assert_eq!(arena.get(first), Some(&"first"));
//! assert_eq!(arena.get(second), Some(&"second"));
//! assert_eq!(arena.len(), 2);
//! ```

use parking_lot::Mutex;
use std::fmt;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Capacity of the first segment (power of two).
const FIRST_SEGMENT_CAPACITY: usize = 64;

/// `log2(FIRST_SEGMENT_CAPACITY)`.
const SEGMENT_SHIFT: u32 = FIRST_SEGMENT_CAPACITY.trailing_zeros();

/// Enough doubling segments to address every `u32` index.
const MAX_SEGMENTS: usize = 27;

/// Largest number of entries an arena will hold (indices fit in `u32`).
pub const MAX_ENTRIES: usize = u32::MAX as usize;

/// Error returned when an arena cannot accept more entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaFull {
    /// Number of entries already stored.
    pub len: usize,
}

impl fmt::Display for ArenaFull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Arena full: {} entries already allocated", self.len)
    }
}

impl std::error::Error for ArenaFull {}

type Segment<T> = Box<[OnceLock<T>]>;

/// Thread-safe, append-only, index-addressed storage.
///
/// Entries are never removed or moved; all of them are dropped together when
/// the arena is dropped.
pub struct AppendArena<T> {
    segments: [OnceLock<Segment<T>>; MAX_SEGMENTS],
    /// Number of fully initialised entries visible to readers.
    len: AtomicUsize,
    /// Serialises appends so indices are handed out densely.
    push_lock: Mutex<()>,
}

impl<T> AppendArena<T> {
    /// Creates an empty arena. No memory is allocated until the first push.
    #[must_use]
    pub fn new() -> Self {
        Self {
            segments: std::array::from_fn(|_| OnceLock::new()),
            len: AtomicUsize::new(0),
            push_lock: Mutex::new(()),
        }
    }

    /// Creates an empty arena with segments pre-allocated for at least
    /// `capacity` entries.
    ///
    /// # Examples
    ///
    /// ```
    /// use oxidyn_mem::AppendArena;
    ///
    /// let arena: AppendArena<u64> = AppendArena::with_capacity(1000);
    /// assert!(arena.capacity() >= 1000);
    /// assert!(arena.is_empty());
    /// ```
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let arena = Self::new();
        if capacity > 0 {
            let (last, _) = locate(capacity.min(MAX_ENTRIES) - 1);
            for segment in 0..=last {
                arena.segment(segment);
            }
        }
        arena
    }

    /// Appends a value and returns its index.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaFull`] once [`MAX_ENTRIES`] values have been stored.
    pub fn push(&self, value: T) -> Result<usize, ArenaFull> {
        self.push_with(|_| value)
    }

    /// Appends the value built by `f`, which receives the index the value
    /// will occupy. Useful for self-referential records.
    ///
    /// # Examples
    ///
    /// ```
    /// use oxidyn_mem::AppendArena;
    ///
    /// let arena = AppendArena::new();
    /// let index = arena.push_with(|me| me * 10).unwrap();
    /// assert_eq!(arena.get(index), Some(&0));
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`ArenaFull`] once [`MAX_ENTRIES`] values have been stored.
    pub fn push_with<F>(&self, f: F) -> Result<usize, ArenaFull>
    where
        F: FnOnce(usize) -> T,
    {
        let _guard = self.push_lock.lock();

        let index = self.len.load(Ordering::Relaxed);
        if index >= MAX_ENTRIES {
            return Err(ArenaFull { len: index });
        }

        let (segment, offset) = locate(index);
        let slot = &self.segment(segment)[offset];

        // The index is fresh and appends are serialised, so the slot is empty.
        let stored = slot.set(f(index));
        debug_assert!(stored.is_ok(), "arena slot {index} written twice");

        self.len.store(index + 1, Ordering::Release);
        Ok(index)
    }

    /// Returns the entry at `index`, or `None` if it has not been pushed.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.len.load(Ordering::Acquire) {
            return None;
        }

        let (segment, offset) = locate(index);
        self.segments[segment].get()?.get(offset)?.get()
    }

    /// Number of entries stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    /// Returns `true` if nothing has been pushed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of slots in the segments allocated so far.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.segments
            .iter()
            .enumerate()
            .filter(|(_, segment)| segment.get().is_some())
            .map(|(index, _)| segment_capacity(index))
            .sum()
    }

    /// Iterates over all entries in insertion order.
    ///
    /// Entries appended while iterating may or may not be observed.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> + '_ {
        (0..self.len()).filter_map(move |index| self.get(index).map(|value| (index, value)))
    }

    fn segment(&self, segment: usize) -> &Segment<T> {
        self.segments[segment].get_or_init(|| {
            (0..segment_capacity(segment))
                .map(|_| OnceLock::new())
                .collect()
        })
    }
}

impl<T> Default for AppendArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for AppendArena<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter().map(|(_, value)| value)).finish()
    }
}

#[inline]
const fn segment_capacity(segment: usize) -> usize {
    FIRST_SEGMENT_CAPACITY << segment
}

/// Maps a flat index to `(segment, offset within segment)`.
#[inline]
const fn locate(index: usize) -> (usize, usize) {
    let bucket = (index >> SEGMENT_SHIFT) + 1;
    let segment = (usize::BITS - 1 - bucket.leading_zeros()) as usize;
    let start = FIRST_SEGMENT_CAPACITY * ((1 << segment) - 1);
    (segment, index - start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_locate_segment_boundaries() {
        assert_eq!(locate(0), (0, 0));
        assert_eq!(locate(63), (0, 63));
        assert_eq!(locate(64), (1, 0));
        assert_eq!(locate(191), (1, 127));
        assert_eq!(locate(192), (2, 0));
        assert_eq!(locate(447), (2, 255));
        assert_eq!(locate(448), (3, 0));
    }

    #[test]
    fn test_locate_max_index_fits() {
        let (segment, offset) = locate(MAX_ENTRIES - 1);
        assert!(segment < MAX_SEGMENTS);
        assert!(offset < segment_capacity(segment));
    }

    #[test]
    fn test_push_and_get() {
        let arena = AppendArena::new();
        let a = arena.push(String::from("a")).unwrap();
        let b = arena.push(String::from("b")).unwrap();

        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert_eq!(arena.get(a).map(String::as_str), Some("a"));
        assert_eq!(arena.get(b).map(String::as_str), Some("b"));
        assert!(arena.get(2).is_none());
    }

    #[test]
    fn test_empty_arena() {
        let arena: AppendArena<u8> = AppendArena::new();
        assert!(arena.is_empty());
        assert_eq!(arena.len(), 0);
        assert_eq!(arena.capacity(), 0);
        assert!(arena.get(0).is_none());
    }

    #[test]
    fn test_references_stable_across_growth() {
        let arena = AppendArena::new();
        arena.push(7u64).unwrap();
        let first: *const u64 = arena.get(0).unwrap();

        for i in 0..5000u64 {
            arena.push(i).unwrap();
        }

        assert!(std::ptr::eq(first, arena.get(0).unwrap()));
        assert_eq!(arena.len(), 5001);
        assert_eq!(arena.get(5000), Some(&4999));
    }

    #[test]
    fn test_push_with_sees_own_index() {
        let arena = AppendArena::new();
        arena.push(100usize).unwrap();
        let index = arena.push_with(|me| me + 1000).unwrap();
        assert_eq!(arena.get(index), Some(&1001));
    }

    #[test]
    fn test_with_capacity_preallocates() {
        let arena: AppendArena<u32> = AppendArena::with_capacity(200);
        assert!(arena.capacity() >= 200);
        assert!(arena.is_empty());
    }

    #[test]
    fn test_iter_in_insertion_order() {
        let arena = AppendArena::new();
        for i in 0..100 {
            arena.push(i * 2).unwrap();
        }

        let collected: Vec<_> = arena.iter().map(|(_, v)| *v).collect();
        assert_eq!(collected, (0..100).map(|i| i * 2).collect::<Vec<_>>());
    }

    #[test]
    fn test_concurrent_push_unique_indices() {
        let arena = Arc::new(AppendArena::new());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let arena = Arc::clone(&arena);
                thread::spawn(move || {
                    (0..500)
                        .map(|i| arena.push(t * 1000 + i).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut indices: Vec<usize> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        indices.sort_unstable();
        indices.dedup();

        assert_eq!(indices.len(), 4000);
        assert_eq!(arena.len(), 4000);
    }

    #[test]
    fn test_drop_releases_entries() {
        let marker = Arc::new(());
        {
            let arena = AppendArena::new();
            for _ in 0..10 {
                arena.push(Arc::clone(&marker)).unwrap();
            }
            assert_eq!(Arc::strong_count(&marker), 11);
        }
        assert_eq!(Arc::strong_count(&marker), 1);
    }
}
