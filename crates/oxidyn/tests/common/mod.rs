// Common test utilities for integration tests
//
// This module provides shared helper functions and test fixtures
// for use across all integration tests.

#![allow(dead_code)]

use oxidyn::{ClassHandle, Ivar, Runtime, Selector};
use std::ffi::c_void;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counter bumped by `counting_method_impl`
pub static TEST_METHOD_CALL_COUNT: AtomicUsize = AtomicUsize::new(0);

/// The Base / Animal / Dog hierarchy used throughout the tests.
pub struct Zoo {
    pub base: ClassHandle,
    pub animal: ClassHandle,
    pub dog: ClassHandle,
    pub age: Ivar,
    pub breed_id: Ivar,
}

/// Builds and registers:
/// - `Base`: root, no ivars
/// - `Animal : Base` with `age` (4 bytes, align 4)
/// - `Dog : Animal` with `breedId` (4 bytes, align 4)
pub fn build_zoo(rt: &Runtime) -> Zoo {
    let base = register_class(rt, None, "Base");

    let animal = rt
        .allocate_class_pair(Some(base), "Animal", 0)
        .expect("allocate Animal");
    let age = rt.add_ivar(animal, "age", 4, 4, "i").expect("add age");
    rt.register_class_pair(animal).expect("register Animal");

    let dog = rt
        .allocate_class_pair(Some(animal), "Dog", 0)
        .expect("allocate Dog");
    let breed_id = rt.add_ivar(dog, "breedId", 4, 4, "i").expect("add breedId");
    rt.register_class_pair(dog).expect("register Dog");

    Zoo {
        base,
        animal,
        dog,
        age,
        breed_id,
    }
}

/// Allocates and registers a class with no ivars.
pub fn register_class(rt: &Runtime, superclass: Option<ClassHandle>, name: &str) -> ClassHandle {
    let class = rt
        .allocate_class_pair(superclass, name, 0)
        .expect("Failed to allocate test class");
    rt.register_class_pair(class)
        .expect("Failed to register test class");
    class
}

/// Wraps an integer as an opaque ivar value.
pub fn word(bits: usize) -> *mut c_void {
    bits as *mut c_void
}

/// Simple test method implementation that does nothing
///
/// # Safety
///
/// Does not dereference any of its arguments.
pub unsafe extern "C" fn void_method_impl(
    _receiver: *mut c_void,
    _cmd: Selector,
    _args: *const *mut c_void,
    _ret: *mut c_void,
) {
}

/// Second no-op implementation, distinguishable by address.
///
/// # Safety
///
/// Does not dereference any of its arguments.
pub unsafe extern "C" fn other_method_impl(
    _receiver: *mut c_void,
    _cmd: Selector,
    _args: *const *mut c_void,
    _ret: *mut c_void,
) {
}

/// Increments `TEST_METHOD_CALL_COUNT`.
///
/// # Safety
///
/// Does not dereference any of its arguments.
pub unsafe extern "C" fn counting_method_impl(
    _receiver: *mut c_void,
    _cmd: Selector,
    _args: *const *mut c_void,
    _ret: *mut c_void,
) {
    TEST_METHOD_CALL_COUNT.fetch_add(1, Ordering::SeqCst);
}

/// Compares two implementation pointers by address.
pub fn same_imp(a: oxidyn::Imp, b: oxidyn::Imp) -> bool {
    std::ptr::fn_addr_eq(a, b)
}
