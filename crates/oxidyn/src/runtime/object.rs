//! Instance allocation and ivar access.
//!
//! An [`Instance`] is a class handle plus an owned, zero-initialised block of
//! storage at least as large as the class's registered instance size.
//! Dropping the instance releases the storage.
//!
//! # Ivar Slots
//!
//! Every ivar is read and written as an opaque pointer-sized value:
//!
//! - A slot of pointer size or larger holds a full `*mut c_void`
//! - A narrower slot holds the value's low-order bytes in native byte order
//!   and reads back zero-extended
//!
//! Accessors never check that an ivar belongs to the instance's class; they
//! do check that the slot lies inside the instance's storage and panic if
//! it doesn't.

use super::layout::Ivar;
use super::{ClassHandle, Runtime};
use crate::error::{Error, Result};
use oxidyn_log::trace;
use std::alloc::{self, Layout};
use std::ffi::c_void;
use std::fmt;
use std::ptr::NonNull;

const WORD: usize = size_of::<*mut c_void>();

/// An allocated object of a registered class.
///
/// # Example
///
/// ```rust
/// use oxidyn::Runtime;
/// use std::ffi::c_void;
///
/// let rt = Runtime::new();
/// let counter = rt.allocate_class_pair(None, "Counter", 0).unwrap();
/// let hits = rt.add_ivar(counter, "hits", 8, 8, "Q").unwrap();
/// rt.register_class_pair(counter).unwrap();
///
/// let mut obj = rt.create_instance(counter, 0).unwrap();
/// assert!(obj.get_ivar(&hits).is_null());
///
/// obj.set_ivar(&hits, 3 as *mut c_void);
/// assert_eq!(obj.get_ivar(&hits) as usize, 3);
/// ```
pub struct Instance {
    class: ClassHandle,
    storage: NonNull<u8>,
    /// Requested size; the allocation itself is at least one byte.
    len: usize,
    layout: Layout,
}

// SAFETY: Instance uniquely owns its storage and has no interior
// mutability; every write goes through `&mut self`.
unsafe impl Send for Instance {}
// SAFETY: `&Instance` only permits reads of the owned storage.
unsafe impl Sync for Instance {}

impl Instance {
    fn allocate(class: ClassHandle, name: &str, len: usize, alignment: usize) -> Result<Self> {
        let failure = |reason| Error::AllocationFailure {
            class: name.to_owned(),
            reason,
        };

        let layout = Layout::from_size_align(len.max(1), alignment.max(align_of::<*mut c_void>()))
            .map_err(|_| failure("instance size exceeds the allocator limit"))?;

        // SAFETY: `layout` has a non-zero size.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let storage = NonNull::new(raw).ok_or_else(|| failure("out of memory"))?;

        Ok(Self {
            class,
            storage,
            len,
            layout,
        })
    }

    /// The class this instance was created from.
    #[must_use]
    pub fn class(&self) -> ClassHandle {
        self.class
    }

    /// Usable storage size in bytes (instance size plus extra bytes).
    #[must_use]
    pub fn size(&self) -> usize {
        self.len
    }

    /// Base address of the storage.
    #[must_use]
    pub fn as_ptr(&self) -> *const u8 {
        self.storage.as_ptr()
    }

    /// Mutable base address of the storage.
    #[must_use]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.storage.as_ptr()
    }

    /// The storage as a byte slice.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        // SAFETY: storage holds at least `len` initialised (zeroed) bytes
        // owned by `self`.
        unsafe { std::slice::from_raw_parts(self.storage.as_ptr(), self.len) }
    }

    /// The storage as a mutable byte slice.
    #[must_use]
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: as for `bytes`, and `&mut self` guarantees exclusivity.
        unsafe { std::slice::from_raw_parts_mut(self.storage.as_ptr(), self.len) }
    }

    /// Reads the slot of `ivar`.
    ///
    /// # Panics
    ///
    /// Panics if `ivar`'s class is not registered, or if its slot lies
    /// outside this instance's storage.
    #[must_use]
    pub fn get_ivar(&self, ivar: &Ivar) -> *mut c_void {
        let (offset, width) = self.slot(ivar);

        if width == WORD {
            // SAFETY: `slot` checked that `offset..offset + WORD` is inside
            // the storage; the read is unaligned-safe.
            return unsafe {
                self.storage
                    .as_ptr()
                    .add(offset)
                    .cast::<*mut c_void>()
                    .read_unaligned()
            };
        }

        let mut word = [0u8; WORD];
        let src = &self.bytes()[offset..offset + width];
        if cfg!(target_endian = "little") {
            word[..width].copy_from_slice(src);
        } else {
            word[WORD - width..].copy_from_slice(src);
        }
        usize::from_ne_bytes(word) as *mut c_void
    }

    /// Writes `value` into the slot of `ivar`.
    ///
    /// # Panics
    ///
    /// Panics if `ivar`'s class is not registered, or if its slot lies
    /// outside this instance's storage.
    pub fn set_ivar(&mut self, ivar: &Ivar, value: *mut c_void) {
        let (offset, width) = self.slot(ivar);

        if width == WORD {
            // SAFETY: `slot` checked the bounds; we hold `&mut self`.
            unsafe {
                self.storage
                    .as_ptr()
                    .add(offset)
                    .cast::<*mut c_void>()
                    .write_unaligned(value);
            }
            return;
        }

        let word = (value as usize).to_ne_bytes();
        let src = if cfg!(target_endian = "little") {
            &word[..width]
        } else {
            &word[WORD - width..]
        };
        self.bytes_mut()[offset..offset + width].copy_from_slice(src);
    }

    /// Offset and accessed width of `ivar`'s slot, bounds-checked.
    fn slot(&self, ivar: &Ivar) -> (usize, usize) {
        let Some(offset) = ivar.offset() else {
            panic!("ivar '{}' has no offset; its class is not registered", ivar.name());
        };
        let width = ivar.size().min(WORD);
        let end = offset.checked_add(width);
        assert!(
            end.is_some_and(|end| end <= self.len),
            "ivar '{}' at offset {offset} (+{width}) lies outside {}-byte instance",
            ivar.name(),
            self.len,
        );
        (offset, width)
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        // SAFETY: storage was allocated in `allocate` with exactly this layout.
        unsafe { alloc::dealloc(self.storage.as_ptr(), self.layout) };
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("class", &self.class)
            .field("size", &self.len)
            .field("storage", &self.storage)
            .finish()
    }
}

impl Runtime {
    /// Allocates a zero-filled instance of a registered class.
    ///
    /// The storage holds `instance_size(class) + extra_bytes` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AllocationFailure`] if `class` is not registered,
    /// the size overflows, or the allocator fails.
    ///
    /// # Panics
    ///
    /// Panics if `class` was not issued by this runtime.
    pub fn create_instance(&self, class: ClassHandle, extra_bytes: usize) -> Result<Instance> {
        let record = self.record(class);
        let failure = |reason| Error::AllocationFailure {
            class: record.name().to_owned(),
            reason,
        };

        let layout = record
            .layout()
            .ok_or_else(|| failure("class is not registered"))?;
        let size = layout
            .size
            .checked_add(extra_bytes)
            .ok_or_else(|| failure("instance size overflows"))?;

        let instance = Instance::allocate(class, record.name(), size, layout.alignment)?;
        trace!(class = record.name(), size = size; "created instance");
        Ok(instance)
    }

    /// Reads an ivar of `instance` by name, searching the class chain.
    ///
    /// Returns the ivar with its current value, or `None` if no ivar of that
    /// name exists.
    ///
    /// # Panics
    ///
    /// Panics if `instance` was not created by this runtime.
    #[must_use]
    pub fn get_instance_variable_value(
        &self,
        instance: &Instance,
        name: &str,
    ) -> Option<(Ivar, *mut c_void)> {
        let ivar = self.get_instance_variable(instance.class(), name)?;
        let value = instance.get_ivar(&ivar);
        Some((ivar, value))
    }

    /// Writes an ivar of `instance` by name, searching the class chain.
    ///
    /// Returns the ivar written, or `None` if no ivar of that name exists.
    ///
    /// # Panics
    ///
    /// Panics if `instance` was not created by this runtime.
    pub fn set_instance_variable(
        &self,
        instance: &mut Instance,
        name: &str,
        value: *mut c_void,
    ) -> Option<Ivar> {
        let ivar = self.get_instance_variable(instance.class(), name)?;
        instance.set_ivar(&ivar, value);
        Some(ivar)
    }
}
