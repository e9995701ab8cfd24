#![no_main]

use std::cell::RefCell;
use std::rc::Rc;

use arbitrary::Arbitrary;
use indexmap::IndexMap;
use libfuzzer_sys::fuzz_target;
use watchable::{Subject, Unsubscribe, WatchableMap, partial_combine};

const LEAVES: usize = 4;

#[derive(Arbitrary, Debug)]
enum FuzzOp {
    Update { leaf: u8, value: u8 },
    Watch { leaf: u8, reentrant: bool },
    Unwatch { slot: u8 },
    WatchCombined,
    Snapshot { leaf: u8 },
    MapSet { key: u8, value: u8 },
    MapBump { key: u8 },
}

fuzz_target!(|ops: Vec<FuzzOp>| {
    let leaves: Vec<Subject<u8>> = (0..LEAVES).map(|_| Subject::empty()).collect();
    let keyed: IndexMap<usize, _> = leaves
        .iter()
        .enumerate()
        .map(|(i, s)| (i, s.as_watchable()))
        .collect();
    let combined = partial_combine(&keyed);
    let map: WatchableMap<u8, u8> = WatchableMap::new();
    let mut handles: Vec<Unsubscribe> = Vec::new();
    let mut snapshots = Vec::new();
    let last_combined: Rc<RefCell<Option<IndexMap<usize, u8>>>> = Rc::new(RefCell::new(None));

    for op in ops.into_iter().take(256) {
        match op {
            FuzzOp::Update { leaf, value } => {
                leaves[leaf as usize % LEAVES].update(value);
            }
            FuzzOp::Watch { leaf, reentrant } => {
                let target = leaves[leaf as usize % LEAVES].clone();
                let watched = target.clone();
                let handle = watched.watch(move |v: &u8| {
                    if reentrant && *v < 8 {
                        target.update(v + 1);
                    }
                });
                handles.push(handle.expect("fresh watcher"));
            }
            FuzzOp::Unwatch { slot } => {
                if !handles.is_empty() {
                    let handle = handles.swap_remove(slot as usize % handles.len());
                    handle.unsubscribe().expect("registered watcher");
                }
            }
            FuzzOp::WatchCombined => {
                let last = Rc::clone(&last_combined);
                let handle = combined.watch(move |m| {
                    if let Some(previous) = last.borrow().as_ref() {
                        // Keys never disappear.
                        assert!(previous.keys().all(|k| m.contains_key(k)));
                    }
                    *last.borrow_mut() = Some(m.clone());
                });
                handles.push(handle.expect("fresh watcher"));
            }
            FuzzOp::Snapshot { leaf } => {
                let source = leaves[leaf as usize % LEAVES].as_watchable();
                let had_value = source.has_value();
                let snap = source.snapshot().expect("fresh watcher");
                assert_eq!(snap.has_value(), had_value);
                snapshots.push((source, snap));
            }
            FuzzOp::MapSet { key, value } => {
                map.update_or_create_with_value(key % 8, value);
                assert_eq!(map.get_or_create(key % 8).get_value(), Ok(value));
            }
            FuzzOp::MapBump { key } => {
                map.update_or_create(key % 8, |v| v.map_or(0, |v| v.wrapping_add(1)));
            }
        }
    }

    for (source, snap) in &snapshots {
        // A populated source always populates its snapshot.
        assert!(!source.has_value() || snap.has_value());
    }
    for handle in handles {
        handle.unsubscribe().expect("registered watcher");
    }
});
