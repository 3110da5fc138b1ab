//! Ivar descriptors and instance layout computation.
//!
//! Ivars are declared on a draft class and receive their byte offsets when
//! the class is registered. Offsets are assigned in declaration order,
//! starting where the superclass's instances end:
//!
//! ```text
//! Animal (root)          Dog : Animal
//! +0  age     (4/4)      +0  age      (inherited)
//!                        +4  breedId  (4/4)
//! size 4, align 4        size 8, align 4
//! ```
//!
//! The final instance size is rounded up to the largest alignment among the
//! class's own ivars, then the class's extra bytes are appended.
//!
//! A zero-sized ivar still occupies one byte of offset space, so own offsets
//! are strictly increasing and no two ivars share an address.

use super::ClassHandle;
use crate::error::{Error, Result};
use std::alloc::Layout;
use std::ffi::c_void;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Size and alignment of a registered class's instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceLayout {
    /// Bytes required by an instance, extra bytes included.
    pub size: usize,
    /// Alignment of instance storage; the largest of the class's and all
    /// ancestors' ivar alignments.
    pub alignment: usize,
}

impl InstanceLayout {
    /// Layout of a root class with no ivars.
    pub const EMPTY: Self = Self {
        size: 0,
        alignment: 1,
    };
}

impl Default for InstanceLayout {
    fn default() -> Self {
        Self::EMPTY
    }
}

struct IvarRecord {
    name: Box<str>,
    type_encoding: Box<str>,
    size: usize,
    alignment: usize,
    owner: ClassHandle,
    offset: OnceLock<usize>,
}

/// A named, typed instance variable.
///
/// `Ivar` is a shared handle: clones refer to the same descriptor, so an
/// `Ivar` obtained from [`Runtime::add_ivar`](super::Runtime::add_ivar)
/// before registration reports its offset once the class is registered.
///
/// # Example
///
/// ```rust
/// use oxidyn::Runtime;
///
/// let rt = Runtime::new();
/// let point = rt.allocate_class_pair(None, "Point", 0).unwrap();
/// let x = rt.add_ivar(point, "x", 8, 8, "d").unwrap();
/// assert_eq!(x.offset(), None);
///
/// rt.register_class_pair(point).unwrap();
/// assert_eq!(x.offset(), Some(0));
/// ```
#[derive(Clone)]
pub struct Ivar(Arc<IvarRecord>);

impl Ivar {
    pub(crate) fn new(
        name: &str,
        type_encoding: &str,
        size: usize,
        alignment: usize,
        owner: ClassHandle,
    ) -> Self {
        Self(Arc::new(IvarRecord {
            name: name.into(),
            type_encoding: type_encoding.into(),
            size,
            alignment,
            owner,
            offset: OnceLock::new(),
        }))
    }

    /// Ivar name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Type encoding string, stored as given.
    #[must_use]
    pub fn type_encoding(&self) -> &str {
        &self.0.type_encoding
    }

    /// Declared size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.0.size
    }

    /// Declared alignment in bytes.
    #[must_use]
    pub fn alignment(&self) -> usize {
        self.0.alignment
    }

    /// The class that declared this ivar.
    #[must_use]
    pub fn owner(&self) -> ClassHandle {
        self.0.owner
    }

    /// Byte offset from the start of an instance, once the owner is
    /// registered.
    #[must_use]
    pub fn offset(&self) -> Option<usize> {
        self.0.offset.get().copied()
    }

    /// Opaque pointer to the shared descriptor. It stays valid for as long
    /// as the runtime, which never drops a declared ivar.
    pub(crate) fn as_raw(&self) -> *const c_void {
        Arc::as_ptr(&self.0).cast()
    }

    /// Rebuilds an `Ivar` from [`as_raw`](Self::as_raw).
    ///
    /// # Safety
    ///
    /// `raw` must come from `as_raw` on an ivar that is still alive.
    pub(crate) unsafe fn from_raw(raw: *const c_void) -> Self {
        let raw = raw.cast::<IvarRecord>();
        // SAFETY: the caller guarantees `raw` points at a live descriptor;
        // the extra count is released when the returned handle drops.
        unsafe {
            Arc::increment_strong_count(raw);
            Self(Arc::from_raw(raw))
        }
    }

    pub(crate) fn freeze_offset(&self, offset: usize) {
        // Registration assigns each offset once under the owner's draft lock.
        let assigned = self.0.offset.set(offset);
        debug_assert!(assigned.is_ok(), "ivar '{}' offset assigned twice", self.name());
    }
}

impl PartialEq for Ivar {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Ivar {}

impl fmt::Debug for Ivar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ivar")
            .field("name", &self.name())
            .field("type_encoding", &self.type_encoding())
            .field("size", &self.size())
            .field("alignment", &self.alignment())
            .field("offset", &self.offset())
            .finish()
    }
}

/// Offsets and layout computed for a class about to be registered.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct ComputedLayout {
    pub(crate) layout: InstanceLayout,
    /// One offset per own ivar, in declaration order.
    pub(crate) offsets: Vec<usize>,
}

/// Lays out `ivars` after `base`, the superclass's instance layout.
///
/// Nothing is written to the ivars; the caller freezes the offsets once the
/// rest of registration has succeeded.
pub(crate) fn compute(
    class: &str,
    base: InstanceLayout,
    ivars: &[Ivar],
    extra_bytes: usize,
) -> Result<ComputedLayout> {
    let overflow = || Error::LayoutOverflow {
        class: class.to_owned(),
    };

    let mut end = base.size;
    let mut own_alignment = 1;
    let mut offsets = Vec::with_capacity(ivars.len());

    for ivar in ivars {
        let alignment = ivar.alignment();
        if !alignment.is_power_of_two() {
            return Err(Error::InvalidAlignment {
                class: class.to_owned(),
                ivar: ivar.name().to_owned(),
                alignment,
            });
        }

        let offset = align_up(end, alignment).ok_or_else(overflow)?;
        offsets.push(offset);
        end = offset.checked_add(ivar.size().max(1)).ok_or_else(overflow)?;
        own_alignment = own_alignment.max(alignment);
    }

    let size = align_up(end, own_alignment)
        .and_then(|size| size.checked_add(extra_bytes))
        .ok_or_else(overflow)?;
    let alignment = base.alignment.max(own_alignment);

    // Instances must be allocatable with the global allocator.
    Layout::from_size_align(size, alignment).map_err(|_| overflow())?;

    Ok(ComputedLayout {
        layout: InstanceLayout { size, alignment },
        offsets,
    })
}

/// Rounds `value` up to a multiple of `alignment` (a power of two).
#[inline]
pub(crate) fn align_up(value: usize, alignment: usize) -> Option<usize> {
    debug_assert!(alignment.is_power_of_two());
    let mask = alignment - 1;
    value.checked_add(mask).map(|v| v & !mask)
}
