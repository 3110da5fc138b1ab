//! C ABI over the process-wide runtime.
//!
//! These `extern "C"` functions mirror the familiar `objc_*`, `class_*`,
//! `object_*`, `sel_*`, `ivar_*` and `property_*` entry points so native
//! code can drive the runtime. They all act on [`Runtime::global`],
//! installing one configured from the environment on first use.
//!
//! # Conventions
//!
//! - `Class` is a [`ClassHandle`] and `SEL` a [`Selector`], both passed by
//!   value. [`NIL_CLASS`] and [`NIL_SEL`] are never issued.
//! - `Ivar` and `objc_property_t` are opaque descriptor pointers that stay
//!   valid for the life of the process.
//! - `id` is an opaque pointer from `class_createInstance`, released with
//!   `object_dispose`.
//! - Returned names are NUL-terminated and never freed.
//! - `class_copy*List` and `objc_copyClassList` write the element count to
//!   `out_count` (when non-null) and return null for an empty list. Release
//!   non-empty lists with `objc_freeList` / `objc_freeClassList`.
//!
//! Invalid arguments (null pointers, unknown handles, non UTF-8 strings)
//! produce nil, `false` or `0`. Nothing here panics on bad input.

#![allow(non_snake_case)]

use crate::config::RuntimeConfig;
use crate::runtime::{ClassHandle, Imp, Instance, Ivar, Property, Runtime, Selector};
use fxhash::FxHashMap;
use oxidyn_log::{trace, warn};
use parking_lot::RwLock;
use std::ffi::{CStr, CString, c_char, c_uint, c_void};
use std::ptr;
use std::sync::OnceLock;

/// The nil class.
pub const NIL_CLASS: ClassHandle = ClassHandle::new(u32::MAX);

/// The nil selector.
pub const NIL_SEL: Selector = Selector::from_u32(u32::MAX);

/// NUL-terminated copies of every name handed out, keyed by content.
static C_NAMES: OnceLock<RwLock<FxHashMap<Box<str>, Box<CStr>>>> = OnceLock::new();

fn runtime() -> &'static Runtime {
    Runtime::global_or_init(|| Runtime::with_config(RuntimeConfig::from_env()))
}

/// `cls` if it names a class of the global runtime.
fn live(cls: ClassHandle) -> Option<ClassHandle> {
    runtime().issued(cls).then_some(cls)
}

/// `sel` if it was registered with the global runtime.
fn live_sel(sel: Selector) -> Option<Selector> {
    runtime().selector_name(sel).is_ok().then_some(sel)
}

/// Borrows a caller's C string as UTF-8.
///
/// # Safety
///
/// `ptr` must be null or point at a NUL-terminated string that outlives `'a`.
unsafe fn borrow_str<'a>(ptr: *const c_char, arg: &str) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: non-null and NUL-terminated per the caller.
    match unsafe { CStr::from_ptr(ptr) }.to_str() {
        Ok(s) => Some(s),
        Err(err) => {
            warn!(arg = arg; "ignoring non UTF-8 argument: {}", err);
            None
        }
    }
}

/// Returns a stable NUL-terminated copy of `name`, or null if `name` holds
/// a NUL byte.
fn c_name(name: &str) -> *const c_char {
    let cache = C_NAMES.get_or_init(Default::default);
    if let Some(cached) = cache.read().get(name) {
        return cached.as_ptr();
    }

    let Ok(owned) = CString::new(name) else {
        warn!(name = name; "name contains a NUL byte");
        return ptr::null();
    };
    cache
        .write()
        .entry(name.into())
        .or_insert_with(|| owned.into_boxed_c_str())
        .as_ptr()
}

/// Hands `items` to the caller as a counted C array.
///
/// # Safety
///
/// `out_count` must be null or valid for a write.
unsafe fn into_list<T>(items: Box<[T]>, out_count: *mut c_uint) -> *mut T {
    let Ok(count) = c_uint::try_from(items.len()) else {
        warn!(len = items.len(); "list too long for the C ABI");
        return unsafe { into_list(Box::default(), out_count) };
    };
    if !out_count.is_null() {
        // SAFETY: non-null and writable per the caller.
        unsafe { out_count.write(count) };
    }
    if items.is_empty() {
        return ptr::null_mut();
    }
    Box::into_raw(items).cast()
}

/// Releases a list from [`into_list`].
///
/// # Safety
///
/// `list` must be null or come from `into_list` with exactly `count` items.
unsafe fn free_list<T>(list: *mut T, count: c_uint) {
    if list.is_null() {
        return;
    }
    let slice = ptr::slice_from_raw_parts_mut(list, count as usize);
    // SAFETY: the caller hands back the boxed slice `into_list` leaked.
    drop(unsafe { Box::from_raw(slice) });
}

/// # Safety
///
/// `ivar` must be null or come from this module.
unsafe fn ivar_from(ivar: *const c_void) -> Option<Ivar> {
    // SAFETY: non-null descriptors handed out here are never freed.
    (!ivar.is_null()).then(|| unsafe { Ivar::from_raw(ivar) })
}

/// # Safety
///
/// `property` must be null or come from this module.
unsafe fn property_from(property: *const c_void) -> Option<Property> {
    // SAFETY: as for `ivar_from`.
    (!property.is_null()).then(|| unsafe { Property::from_raw(property) })
}

/// # Safety
///
/// `obj` must be null or a live pointer from `class_createInstance` with no
/// other reference in use.
unsafe fn instance<'a>(obj: *mut c_void) -> Option<&'a mut Instance> {
    // SAFETY: per the caller.
    unsafe { obj.cast::<Instance>().as_mut() }
}

/// Whether `ivar` has a slot inside every instance of `object`'s class.
fn holds(object: &Instance, ivar: &Ivar) -> bool {
    let rt = runtime();
    ivar.offset().is_some()
        && rt.issued(object.class())
        && rt.issued(ivar.owner())
        && rt.is_subclass_of(object.class(), ivar.owner())
}

// ============================================================================
// Classes
// ============================================================================

/// Creates a draft class. Pass [`NIL_CLASS`] for a root class.
///
/// Returns [`NIL_CLASS`] if the name is taken or the superclass is not a
/// registered class.
///
/// # Safety
///
/// `name` must be null or a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn objc_allocateClassPair(
    superclass: ClassHandle,
    name: *const c_char,
    extra_bytes: usize,
) -> ClassHandle {
    // SAFETY: per the caller.
    let Some(name) = (unsafe { borrow_str(name, "name") }) else {
        return NIL_CLASS;
    };
    let superclass = match superclass {
        NIL_CLASS => None,
        cls => match live(cls) {
            Some(cls) => Some(cls),
            None => return NIL_CLASS,
        },
    };

    match runtime().allocate_class_pair(superclass, name, extra_bytes) {
        Ok(cls) => cls,
        Err(err) => {
            warn!(class = name; "objc_allocateClassPair: {}", err);
            NIL_CLASS
        }
    }
}

/// Registers a draft class. Returns `false` if registration failed.
#[unsafe(no_mangle)]
pub extern "C" fn objc_registerClassPair(cls: ClassHandle) -> bool {
    let Some(cls) = live(cls) else {
        return false;
    };
    match runtime().register_class_pair(cls) {
        Ok(()) => true,
        Err(err) => {
            warn!("objc_registerClassPair: {}", err);
            false
        }
    }
}

/// Looks up a registered class by name.
///
/// # Safety
///
/// `name` must be null or a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn objc_getClass(name: *const c_char) -> ClassHandle {
    // SAFETY: per the caller.
    unsafe { borrow_str(name, "name") }
        .and_then(|name| runtime().get_class(name))
        .unwrap_or(NIL_CLASS)
}

/// Looks up a registered class's metaclass by the class's name.
///
/// # Safety
///
/// `name` must be null or a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn objc_getMetaClass(name: *const c_char) -> ClassHandle {
    // SAFETY: per the caller.
    unsafe { borrow_str(name, "name") }
        .and_then(|name| runtime().get_meta_class(name))
        .unwrap_or(NIL_CLASS)
}

/// Copies the registered classes.
///
/// # Safety
///
/// `out_count` must be null or valid for a write.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn objc_copyClassList(out_count: *mut c_uint) -> *mut ClassHandle {
    // SAFETY: per the caller.
    unsafe { into_list(runtime().class_list(), out_count) }
}

/// Releases a list from `objc_copyClassList`.
///
/// # Safety
///
/// `list` and `count` must be exactly what `objc_copyClassList` produced.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn objc_freeClassList(list: *mut ClassHandle, count: c_uint) {
    // SAFETY: per the caller.
    unsafe { free_list(list, count) }
}

/// Releases a list from `class_copyIvarList` or `class_copyPropertyList`.
///
/// # Safety
///
/// `list` and `count` must be exactly what the copy function produced.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn objc_freeList(list: *mut *const c_void, count: c_uint) {
    // SAFETY: per the caller.
    unsafe { free_list(list, count) }
}

/// Class name; the empty string for nil.
#[unsafe(no_mangle)]
pub extern "C" fn class_getName(cls: ClassHandle) -> *const c_char {
    match live(cls) {
        Some(cls) => c_name(runtime().class_name(cls)),
        None => c"".as_ptr(),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn class_getSuperclass(cls: ClassHandle) -> ClassHandle {
    live(cls)
        .and_then(|cls| runtime().superclass(cls))
        .unwrap_or(NIL_CLASS)
}

#[unsafe(no_mangle)]
pub extern "C" fn class_isMetaClass(cls: ClassHandle) -> bool {
    live(cls).is_some_and(|cls| runtime().is_metaclass(cls))
}

/// Instance size; `0` for nil or a draft.
#[unsafe(no_mangle)]
pub extern "C" fn class_getInstanceSize(cls: ClassHandle) -> usize {
    live(cls)
        .and_then(|cls| runtime().instance_size(cls))
        .unwrap_or(0)
}

/// Declares an ivar on a draft class. `alignment` is log2 of the byte
/// alignment.
///
/// # Safety
///
/// `name` and `types` must be null or NUL-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn class_addIvar(
    cls: ClassHandle,
    name: *const c_char,
    size: usize,
    alignment: u8,
    types: *const c_char,
) -> bool {
    let Some(cls) = live(cls) else {
        return false;
    };
    // SAFETY: per the caller.
    let (Some(name), types) = (unsafe { borrow_str(name, "name") }, unsafe {
        borrow_str(types, "types")
    }) else {
        return false;
    };
    let Some(alignment) = 1usize.checked_shl(u32::from(alignment)) else {
        warn!(ivar = name, alignment = alignment; "class_addIvar: alignment out of range");
        return false;
    };

    match runtime().add_ivar(cls, name, size, alignment, types.unwrap_or_default()) {
        Ok(_) => true,
        Err(err) => {
            warn!("class_addIvar: {}", err);
            false
        }
    }
}

/// Finds an ivar on `cls` or its ancestors.
///
/// # Safety
///
/// `name` must be null or a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn class_getInstanceVariable(
    cls: ClassHandle,
    name: *const c_char,
) -> *const c_void {
    // SAFETY: per the caller.
    let Some(name) = (unsafe { borrow_str(name, "name") }) else {
        return ptr::null();
    };
    live(cls)
        .and_then(|cls| runtime().get_instance_variable(cls, name))
        .map_or(ptr::null(), |ivar| ivar.as_raw())
}

/// Finds an ivar through the metaclass chain of `cls`.
///
/// # Safety
///
/// `name` must be null or a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn class_getClassVariable(
    cls: ClassHandle,
    name: *const c_char,
) -> *const c_void {
    // SAFETY: per the caller.
    let Some(name) = (unsafe { borrow_str(name, "name") }) else {
        return ptr::null();
    };
    live(cls)
        .and_then(|cls| runtime().get_class_variable(cls, name))
        .map_or(ptr::null(), |ivar| ivar.as_raw())
}

/// Copies the class's own ivars in declaration order.
///
/// # Safety
///
/// `out_count` must be null or valid for a write.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn class_copyIvarList(
    cls: ClassHandle,
    out_count: *mut c_uint,
) -> *mut *const c_void {
    let ivars = live(cls).map_or_else(Box::default, |cls| {
        runtime()
            .copy_ivar_list(cls)
            .iter()
            .map(Ivar::as_raw)
            .collect()
    });
    // SAFETY: per the caller.
    unsafe { into_list(ivars, out_count) }
}

/// Declares a property on a draft class.
///
/// # Safety
///
/// `name` and `attributes` must be null or NUL-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn class_addProperty(
    cls: ClassHandle,
    name: *const c_char,
    attributes: *const c_char,
) -> bool {
    let Some(cls) = live(cls) else {
        return false;
    };
    // SAFETY: per the caller.
    let (Some(name), attributes) = (unsafe { borrow_str(name, "name") }, unsafe {
        borrow_str(attributes, "attributes")
    }) else {
        return false;
    };

    match runtime().add_property(cls, name, attributes.unwrap_or_default()) {
        Ok(_) => true,
        Err(err) => {
            warn!("class_addProperty: {}", err);
            false
        }
    }
}

/// Finds a property declared by `cls` itself.
///
/// # Safety
///
/// `name` must be null or a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn class_getProperty(
    cls: ClassHandle,
    name: *const c_char,
) -> *const c_void {
    // SAFETY: per the caller.
    let Some(name) = (unsafe { borrow_str(name, "name") }) else {
        return ptr::null();
    };
    live(cls)
        .and_then(|cls| runtime().get_property(cls, name))
        .map_or(ptr::null(), |property| property.as_raw())
}

/// Copies the class's own properties in declaration order.
///
/// # Safety
///
/// `out_count` must be null or valid for a write.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn class_copyPropertyList(
    cls: ClassHandle,
    out_count: *mut c_uint,
) -> *mut *const c_void {
    let properties = live(cls).map_or_else(Box::default, |cls| {
        runtime()
            .copy_property_list(cls)
            .iter()
            .map(Property::as_raw)
            .collect()
    });
    // SAFETY: per the caller.
    unsafe { into_list(properties, out_count) }
}

/// Adds or replaces a method. Returns `false` if nothing was added or an
/// existing implementation was replaced.
///
/// # Safety
///
/// `types` must be null or a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn class_addMethod(
    cls: ClassHandle,
    sel: Selector,
    imp: Option<Imp>,
    types: *const c_char,
) -> bool {
    let (Some(cls), Some(sel), Some(imp)) = (live(cls), live_sel(sel), imp) else {
        return false;
    };
    // SAFETY: per the caller.
    let types = unsafe { borrow_str(types, "types") }.unwrap_or_default();
    runtime().add_method(cls, sel, imp, types).is_none()
}

/// Resolves `sel` for instances of `cls`.
#[unsafe(no_mangle)]
pub extern "C" fn class_getMethodImplementation(cls: ClassHandle, sel: Selector) -> Option<Imp> {
    let (cls, sel) = (live(cls)?, live_sel(sel)?);
    runtime().lookup_imp(cls, sel)
}

#[unsafe(no_mangle)]
pub extern "C" fn class_respondsToSelector(cls: ClassHandle, sel: Selector) -> bool {
    class_getMethodImplementation(cls, sel).is_some()
}

/// Allocates a zero-filled instance of a registered class, or null.
#[unsafe(no_mangle)]
pub extern "C" fn class_createInstance(cls: ClassHandle, extra_bytes: usize) -> *mut c_void {
    let Some(cls) = live(cls) else {
        return ptr::null_mut();
    };
    match runtime().create_instance(cls, extra_bytes) {
        Ok(instance) => {
            trace!(class = cls.as_u32(); "handing instance across the C ABI");
            Box::into_raw(Box::new(instance)).cast()
        }
        Err(err) => {
            warn!("class_createInstance: {}", err);
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Objects
// ============================================================================

/// Releases an instance from `class_createInstance`.
///
/// # Safety
///
/// `obj` must be null or a pointer from `class_createInstance` that has not
/// been disposed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn object_dispose(obj: *mut c_void) {
    if !obj.is_null() {
        // SAFETY: per the caller, `obj` is the leaked box.
        drop(unsafe { Box::from_raw(obj.cast::<Instance>()) });
    }
}

/// # Safety
///
/// `obj` must be null or a live instance pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn object_getClass(obj: *mut c_void) -> ClassHandle {
    // SAFETY: per the caller.
    unsafe { instance(obj) }.map_or(NIL_CLASS, |object| object.class())
}

/// Reads an ivar slot. Returns null if `ivar` is not part of `obj`'s class.
///
/// # Safety
///
/// `obj` must be null or a live instance pointer; `ivar` null or an ivar
/// pointer from this module.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn object_getIvar(obj: *mut c_void, ivar: *const c_void) -> *mut c_void {
    // SAFETY: per the caller.
    let (Some(object), Some(ivar)) = (unsafe { instance(obj) }, unsafe { ivar_from(ivar) }) else {
        return ptr::null_mut();
    };
    if !holds(object, &ivar) {
        return ptr::null_mut();
    }
    object.get_ivar(&ivar)
}

/// Writes an ivar slot. Does nothing if `ivar` is not part of `obj`'s class.
///
/// # Safety
///
/// As for `object_getIvar`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn object_setIvar(obj: *mut c_void, ivar: *const c_void, value: *mut c_void) {
    // SAFETY: per the caller.
    let (Some(object), Some(ivar)) = (unsafe { instance(obj) }, unsafe { ivar_from(ivar) }) else {
        return;
    };
    if holds(object, &ivar) {
        object.set_ivar(&ivar, value);
    }
}

/// Reads an ivar by name into `out_value` and returns the ivar, or null.
///
/// # Safety
///
/// `obj` must be null or a live instance pointer; `name` null or a
/// NUL-terminated string; `out_value` null or valid for a write.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn object_getInstanceVariable(
    obj: *mut c_void,
    name: *const c_char,
    out_value: *mut *mut c_void,
) -> *const c_void {
    // SAFETY: per the caller.
    let (Some(object), Some(name)) = (unsafe { instance(obj) }, unsafe { borrow_str(name, "name") })
    else {
        return ptr::null();
    };
    let Some((ivar, value)) = runtime().get_instance_variable_value(object, name) else {
        return ptr::null();
    };
    if !out_value.is_null() {
        // SAFETY: non-null and writable per the caller.
        unsafe { out_value.write(value) };
    }
    ivar.as_raw()
}

/// Writes an ivar by name and returns the ivar, or null.
///
/// # Safety
///
/// `obj` must be null or a live instance pointer; `name` null or a
/// NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn object_setInstanceVariable(
    obj: *mut c_void,
    name: *const c_char,
    value: *mut c_void,
) -> *const c_void {
    // SAFETY: per the caller.
    let (Some(object), Some(name)) = (unsafe { instance(obj) }, unsafe { borrow_str(name, "name") })
    else {
        return ptr::null();
    };
    runtime()
        .set_instance_variable(object, name, value)
        .map_or(ptr::null(), |ivar| ivar.as_raw())
}

/// Resolves `sel` for `obj`'s class.
///
/// # Safety
///
/// `obj` must be null or a live instance pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn objc_msg_lookup(obj: *mut c_void, sel: Selector) -> Option<Imp> {
    // SAFETY: per the caller.
    let object = unsafe { instance(obj) }?;
    class_getMethodImplementation(object.class(), sel)
}

// ============================================================================
// Ivars and properties
// ============================================================================

/// # Safety
///
/// `ivar` must be null or an ivar pointer from this module.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ivar_getName(ivar: *const c_void) -> *const c_char {
    // SAFETY: per the caller.
    unsafe { ivar_from(ivar) }.map_or(ptr::null(), |ivar| c_name(ivar.name()))
}

/// # Safety
///
/// `ivar` must be null or an ivar pointer from this module.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ivar_getTypeEncoding(ivar: *const c_void) -> *const c_char {
    // SAFETY: per the caller.
    unsafe { ivar_from(ivar) }.map_or(ptr::null(), |ivar| c_name(ivar.type_encoding()))
}

/// Byte offset of the ivar, or `-1` before its class is registered.
///
/// # Safety
///
/// `ivar` must be null or an ivar pointer from this module.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ivar_getOffset(ivar: *const c_void) -> isize {
    // SAFETY: per the caller.
    unsafe { ivar_from(ivar) }
        .and_then(|ivar| ivar.offset())
        .and_then(|offset| isize::try_from(offset).ok())
        .unwrap_or(-1)
}

/// # Safety
///
/// `property` must be null or a property pointer from this module.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn property_getName(property: *const c_void) -> *const c_char {
    // SAFETY: per the caller.
    unsafe { property_from(property) }.map_or(ptr::null(), |property| c_name(property.name()))
}

/// # Safety
///
/// `property` must be null or a property pointer from this module.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn property_getAttributes(property: *const c_void) -> *const c_char {
    // SAFETY: per the caller.
    unsafe { property_from(property) }
        .map_or(ptr::null(), |property| c_name(property.attributes()))
}

// ============================================================================
// Selectors
// ============================================================================

/// Interns a selector name.
///
/// # Safety
///
/// `name` must be null or a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sel_registerName(name: *const c_char) -> Selector {
    // SAFETY: per the caller.
    unsafe { borrow_str(name, "name") }.map_or(NIL_SEL, |name| runtime().register_selector(name))
}

/// Same as `sel_registerName`.
///
/// # Safety
///
/// `name` must be null or a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sel_getUid(name: *const c_char) -> Selector {
    // SAFETY: per the caller.
    unsafe { sel_registerName(name) }
}

/// Selector name, or null for an unknown selector.
#[unsafe(no_mangle)]
pub extern "C" fn sel_getName(sel: Selector) -> *const c_char {
    runtime()
        .selector_name(sel)
        .map_or(ptr::null(), c_name)
}

#[unsafe(no_mangle)]
pub extern "C" fn sel_isEqual(lhs: Selector, rhs: Selector) -> bool {
    lhs == rhs
}

#[cfg(test)]
mod tests {
    use super::*;

    // Every test shares the global runtime, so class names are unique.

    unsafe extern "C" fn noop(_: *mut c_void, _: Selector, _: *const *mut c_void, _: *mut c_void) {}

    unsafe extern "C" fn other(_: *mut c_void, _: Selector, _: *const *mut c_void, _: *mut c_void) {
    }

    fn name_of(ptr: *const c_char) -> &'static str {
        assert!(!ptr.is_null());
        unsafe { CStr::from_ptr(ptr) }.to_str().unwrap()
    }

    /// Allocates `name` under `superclass` with `(ivar, log2 alignment)` and
    /// registers it.
    fn define(superclass: ClassHandle, name: &CStr, ivars: &[(&CStr, u8)]) -> ClassHandle {
        unsafe {
            let cls = objc_allocateClassPair(superclass, name.as_ptr(), 0);
            assert_ne!(cls, NIL_CLASS);
            for (ivar, alignment) in ivars {
                let size = 1 << alignment;
                assert!(class_addIvar(cls, ivar.as_ptr(), size, *alignment, c"?".as_ptr()));
            }
            assert!(objc_registerClassPair(cls));
            cls
        }
    }

    #[test]
    fn test_class_pair_lifecycle() {
        unsafe {
            let cls = objc_allocateClassPair(NIL_CLASS, c"FfiShape".as_ptr(), 0);
            assert!(class_addIvar(cls, c"sides".as_ptr(), 4, 2, c"i".as_ptr()));
            assert!(class_addIvar(cls, c"area".as_ptr(), 8, 3, c"d".as_ptr()));
            assert_eq!(objc_getClass(c"FfiShape".as_ptr()), NIL_CLASS);
            assert_eq!(class_getInstanceSize(cls), 0);

            assert!(objc_registerClassPair(cls));
            assert!(!objc_registerClassPair(cls));
            assert!(!class_addIvar(cls, c"late".as_ptr(), 4, 2, c"i".as_ptr()));

            assert_eq!(objc_getClass(c"FfiShape".as_ptr()), cls);
            assert_eq!(name_of(class_getName(cls)), "FfiShape");
            assert_eq!(class_getSuperclass(cls), NIL_CLASS);
            assert_eq!(class_getInstanceSize(cls), 16);
            assert!(!class_isMetaClass(cls));

            let meta = objc_getMetaClass(c"FfiShape".as_ptr());
            assert!(class_isMetaClass(meta));
            assert_eq!(class_getSuperclass(meta), cls);
            assert_eq!(name_of(class_getName(meta)), "FfiShape");

            assert_eq!(objc_allocateClassPair(NIL_CLASS, c"FfiShape".as_ptr(), 0), NIL_CLASS);
            assert_eq!(objc_allocateClassPair(meta, c"FfiBadChild".as_ptr(), 0), NIL_CLASS);
        }
    }

    #[test]
    fn test_nil_arguments() {
        unsafe {
            assert_eq!(objc_allocateClassPair(NIL_CLASS, ptr::null(), 0), NIL_CLASS);
            assert_eq!(objc_getClass(ptr::null()), NIL_CLASS);
            assert!(!objc_registerClassPair(NIL_CLASS));
            assert_eq!(name_of(class_getName(NIL_CLASS)), "");
            assert_eq!(class_getSuperclass(NIL_CLASS), NIL_CLASS);
            assert_eq!(class_getInstanceSize(NIL_CLASS), 0);
            assert!(class_createInstance(NIL_CLASS, 0).is_null());
            assert!(class_getInstanceVariable(NIL_CLASS, c"x".as_ptr()).is_null());
            assert!(!class_respondsToSelector(NIL_CLASS, NIL_SEL));

            assert_eq!(object_getClass(ptr::null_mut()), NIL_CLASS);
            assert!(object_getIvar(ptr::null_mut(), ptr::null()).is_null());
            object_setIvar(ptr::null_mut(), ptr::null(), ptr::null_mut());
            object_dispose(ptr::null_mut());
            assert!(objc_msg_lookup(ptr::null_mut(), NIL_SEL).is_none());

            assert!(ivar_getName(ptr::null()).is_null());
            assert_eq!(ivar_getOffset(ptr::null()), -1);
            assert!(property_getName(ptr::null()).is_null());
            assert_eq!(sel_registerName(ptr::null()), NIL_SEL);
            assert!(sel_getName(NIL_SEL).is_null());

            let invalid_utf8 = c"\xff\xfe";
            assert_eq!(objc_allocateClassPair(NIL_CLASS, invalid_utf8.as_ptr(), 0), NIL_CLASS);
        }
    }

    #[test]
    fn test_instance_ivar_access() {
        let animal = define(NIL_CLASS, c"FfiAnimal", &[(c"age", 2)]);
        let dog = define(animal, c"FfiDog", &[(c"bones", 3)]);
        let rock = define(NIL_CLASS, c"FfiRock", &[(c"mass", 3)]);

        unsafe {
            let rex = class_createInstance(dog, 0);
            assert!(!rex.is_null());
            assert_eq!(object_getClass(rex), dog);

            let age = class_getInstanceVariable(dog, c"age".as_ptr());
            let bones = class_getInstanceVariable(dog, c"bones".as_ptr());
            assert_eq!(ivar_getOffset(age), 0);
            assert_eq!(ivar_getOffset(bones), 8);
            assert_eq!(name_of(ivar_getName(bones)), "bones");

            object_setIvar(rex, bones, 12 as *mut c_void);
            assert_eq!(object_getIvar(rex, bones) as usize, 12);

            let mut value = ptr::null_mut();
            let ivar = object_getInstanceVariable(rex, c"bones".as_ptr(), &mut value);
            assert_eq!(ivar, bones);
            assert_eq!(value as usize, 12);

            assert_eq!(object_setInstanceVariable(rex, c"age".as_ptr(), 4 as *mut c_void), age);
            assert_eq!(object_getIvar(rex, age) as usize, 4);
            assert!(object_setInstanceVariable(rex, c"tail".as_ptr(), ptr::null_mut()).is_null());

            // An ivar of an unrelated class is neither read nor written.
            let mass = class_getInstanceVariable(rock, c"mass".as_ptr());
            object_setIvar(rex, mass, usize::MAX as *mut c_void);
            assert!(object_getIvar(rex, mass).is_null());
            assert_eq!(object_getIvar(rex, age) as usize, 4);
            assert_eq!(object_getIvar(rex, bones) as usize, 12);

            object_dispose(rex);
        }
    }

    #[test]
    fn test_copy_lists_report_counts() {
        let cls = define(NIL_CLASS, c"FfiListed", &[(c"a", 0), (c"b", 2), (c"c", 3)]);
        let bare = define(NIL_CLASS, c"FfiBare", &[]);

        unsafe {
            let mut count = c_uint::MAX;
            let ivars = class_copyIvarList(cls, &mut count);
            assert_eq!(count, 3);
            let names: Vec<_> = std::slice::from_raw_parts(ivars, count as usize)
                .iter()
                .map(|ivar| name_of(ivar_getName(*ivar)))
                .collect();
            assert_eq!(names, ["a", "b", "c"]);
            objc_freeList(ivars, count);

            let mut count = c_uint::MAX;
            assert!(class_copyIvarList(bare, &mut count).is_null());
            assert_eq!(count, 0);
            assert!(class_copyPropertyList(NIL_CLASS, &mut count).is_null());
            assert_eq!(count, 0);
            let uncounted = class_copyIvarList(cls, ptr::null_mut());
            assert!(!uncounted.is_null());
            objc_freeList(uncounted, 3);

            let classes = objc_copyClassList(&mut count);
            let listed = std::slice::from_raw_parts(classes, count as usize);
            assert!(listed.contains(&cls) && listed.contains(&bare));
            objc_freeClassList(classes, count);
        }
    }

    #[test]
    fn test_properties() {
        unsafe {
            let cls = objc_allocateClassPair(NIL_CLASS, c"FfiPerson".as_ptr(), 0);
            assert!(class_addProperty(cls, c"name".as_ptr(), c"T@\"NSString\",C".as_ptr()));
            assert!(!class_addProperty(cls, c"name".as_ptr(), c"Ti".as_ptr()));
            assert!(objc_registerClassPair(cls));
            assert!(!class_addProperty(cls, c"age".as_ptr(), c"Ti".as_ptr()));

            let name = class_getProperty(cls, c"name".as_ptr());
            assert_eq!(name_of(property_getName(name)), "name");
            assert_eq!(name_of(property_getAttributes(name)), "T@\"NSString\",C");
            assert!(class_getProperty(cls, c"age".as_ptr()).is_null());

            let mut count: c_uint = 0;
            let list = class_copyPropertyList(cls, &mut count);
            assert_eq!(count, 1);
            assert_eq!(*list, name);
            objc_freeList(list, count);
        }
    }

    #[test]
    fn test_selectors_and_methods() {
        let base = define(NIL_CLASS, c"FfiBase", &[]);
        let derived = define(base, c"FfiDerived", &[]);

        unsafe {
            let greet = sel_registerName(c"ffiGreet".as_ptr());
            assert_eq!(sel_getUid(c"ffiGreet".as_ptr()), greet);
            assert!(sel_isEqual(greet, sel_registerName(c"ffiGreet".as_ptr())));
            assert_eq!(name_of(sel_getName(greet)), "ffiGreet");

            assert!(!class_respondsToSelector(derived, greet));
            assert!(class_addMethod(base, greet, Some(noop), c"v@:".as_ptr()));
            assert!(!class_addMethod(base, NIL_SEL, Some(noop), c"v@:".as_ptr()));
            assert!(!class_addMethod(base, greet, None, c"v@:".as_ptr()));
            assert!(class_respondsToSelector(derived, greet));

            let imp = class_getMethodImplementation(derived, greet).unwrap();
            assert!(std::ptr::fn_addr_eq(imp, noop as Imp));

            assert!(class_addMethod(derived, greet, Some(other), ptr::null()));
            assert!(!class_addMethod(derived, greet, Some(other), ptr::null()));

            let obj = class_createInstance(derived, 0);
            let imp = objc_msg_lookup(obj, greet).unwrap();
            assert!(std::ptr::fn_addr_eq(imp, other as Imp));
            object_dispose(obj);
        }
    }
}
