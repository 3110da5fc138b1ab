//! Stress tests for the OxideDyn runtime.
//!
//! These tests validate runtime behavior under heavy load:
//! - Concurrent selector interning
//! - Method addition racing with cached lookups
//! - Registration and instance churn from many threads
//! - Draft mutation racing with registration of the same draft
//!
//! Run with: `cargo test --test stress_test -- --nocapture`

mod common;

use common::{build_zoo, other_method_impl, register_class, same_imp, void_method_impl, word};
use oxidyn::{Error, Runtime};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Instant;

// ============================================================================
// Selector interning
// ============================================================================

#[test]
fn test_concurrent_selector_interning() {
    const THREADS: usize = 8;
    const NAMES: usize = 2_000;

    let rt = Arc::new(Runtime::new());
    let barrier = Arc::new(Barrier::new(THREADS));
    let start = Instant::now();

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let rt = Arc::clone(&rt);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                // Each thread walks the names in a different order.
                (0..NAMES)
                    .map(|i| {
                        let n = (i * (t + 1) * 7919) % NAMES;
                        (n, rt.register_selector(&format!("selector{n}:")))
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    println!("interned {} names on {THREADS} threads in {:?}", NAMES, start.elapsed());

    assert!(rt.selector_count() <= NAMES);
    for pairs in &results {
        for (n, sel) in pairs {
            assert_eq!(rt.selector_name(*sel).unwrap(), format!("selector{n}:"));
            assert_eq!(rt.find_selector(&format!("selector{n}:")), Some(*sel));
        }
    }
}

// ============================================================================
// Method cache under concurrent mutation
// ============================================================================

#[test]
fn test_lookups_race_with_method_addition() {
    let rt = Arc::new(Runtime::new());
    let zoo = build_zoo(&rt);
    let speak = rt.register_selector("speak");
    rt.add_method(zoo.base, speak, void_method_impl, "v@:");

    let done = Arc::new(AtomicBool::new(false));
    let dog = zoo.dog;

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let rt = Arc::clone(&rt);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut lookups = 0usize;
                while !done.load(Ordering::Acquire) {
                    let imp = rt.lookup_imp(dog, speak).unwrap();
                    assert!(same_imp(imp, void_method_impl) || same_imp(imp, other_method_impl));
                    lookups += 1;
                }
                lookups
            })
        })
        .collect();

    // Unrelated additions keep invalidating every cache.
    for i in 0..500 {
        let sel = rt.register_selector(&format!("filler{i}"));
        rt.add_method(zoo.animal, sel, void_method_impl, "v@:");
    }
    rt.add_method(zoo.dog, speak, other_method_impl, "v@:");
    done.store(true, Ordering::Release);

    let total: usize = readers.into_iter().map(|h| h.join().unwrap()).sum();
    assert!(total > 0);

    // Once the override is in, every lookup sees it.
    for _ in 0..100 {
        assert!(same_imp(rt.lookup_imp(dog, speak).unwrap(), other_method_impl));
    }
}

// ============================================================================
// Registration and instance churn
// ============================================================================

#[test]
fn test_class_and_instance_churn() {
    let rt = Arc::new(Runtime::new());
    let root = register_class(&rt, None, "ChurnRoot");

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let rt = Arc::clone(&rt);
            thread::spawn(move || {
                let mut parent = root;
                for depth in 0..20 {
                    let class = rt
                        .allocate_class_pair(Some(parent), &format!("Churn_{t}_{depth}"), 0)
                        .unwrap();
                    let ivar = rt
                        .add_ivar(class, &format!("field{depth}"), 8, 8, "q")
                        .unwrap();
                    rt.register_class_pair(class).unwrap();

                    for i in 0..50 {
                        let mut instance = rt.create_instance(class, 0).unwrap();
                        instance.set_ivar(&ivar, word(i));
                        assert_eq!(instance.get_ivar(&ivar) as usize, i);
                    }
                    parent = class;
                }
                parent
            })
        })
        .collect();

    for handle in handles {
        let leaf = handle.join().unwrap();
        assert_eq!(rt.instance_size(leaf), Some(20 * 8));
        assert!(rt.is_subclass_of(leaf, root));
        assert_eq!(rt.copy_ivar_list(leaf).len(), 1);
    }
    assert_eq!(rt.class_count(), 1 + 8 * 20);
}

#[test]
fn test_concurrent_draft_mutation() {
    let rt = Arc::new(Runtime::new());
    let class = rt.allocate_class_pair(None, "Shared", 0).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let rt = Arc::clone(&rt);
            thread::spawn(move || {
                for i in 0..25 {
                    rt.add_ivar(class, &format!("f{t}_{i}"), 4, 4, "i").unwrap();
                    rt.add_property(class, &format!("p{t}_{i}"), "Ti").unwrap();
                    // Every thread races on the same names too; exactly one wins.
                    let _ = rt.add_ivar(class, &format!("shared{i}"), 4, 4, "i");
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(rt.copy_ivar_list(class).len(), 8 * 25 + 25);
    assert_eq!(rt.copy_property_list(class).len(), 8 * 25);

    rt.register_class_pair(class).unwrap();
    assert_eq!(rt.instance_size(class), Some((8 * 25 + 25) * 4));
}

#[test]
fn test_draft_mutation_races_with_registration() {
    const WRITERS: usize = 6;

    for round in 0..50 {
        let rt = Arc::new(Runtime::new());
        let name = format!("Racing{round}");
        let class = rt.allocate_class_pair(None, &name, 0).unwrap();
        let barrier = Arc::new(Barrier::new(WRITERS + 1));

        let writers: Vec<_> = (0..WRITERS)
            .map(|t| {
                let rt = Arc::clone(&rt);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let mut ivars = Vec::new();
                    let mut properties = Vec::new();
                    for i in 0..20 {
                        match rt.add_ivar(class, &format!("f{t}_{i}"), 8, 8, "q") {
                            Ok(ivar) => ivars.push(ivar),
                            Err(err) => assert!(matches!(err, Error::SealedClass { .. }), "{err}"),
                        }
                        match rt.add_property(class, &format!("p{t}_{i}"), "Tq") {
                            Ok(property) => properties.push(property),
                            Err(err) => assert!(matches!(err, Error::SealedClass { .. }), "{err}"),
                        }
                    }
                    (ivars, properties)
                })
            })
            .collect();

        barrier.wait();
        rt.register_class_pair(class).unwrap();

        let mut accepted_ivars = 0;
        let mut accepted_properties = 0;
        for writer in writers {
            let (ivars, properties) = writer.join().unwrap();
            for ivar in &ivars {
                // An accepted ivar is always part of the frozen layout.
                assert!(ivar.offset().is_some(), "{name}: {ivar:?} accepted without an offset");
            }
            for property in &properties {
                assert!(rt.get_property(class, property.name()).is_some());
            }
            accepted_ivars += ivars.len();
            accepted_properties += properties.len();
        }

        assert_eq!(rt.copy_ivar_list(class).len(), accepted_ivars);
        assert_eq!(rt.copy_property_list(class).len(), accepted_properties);
        assert_eq!(rt.instance_size(class), Some(accepted_ivars * 8));
        assert!(matches!(
            rt.add_ivar(class, "late", 8, 8, "q"),
            Err(Error::SealedClass { .. })
        ));
    }
}
