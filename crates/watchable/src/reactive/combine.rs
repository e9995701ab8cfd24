#![forbid(unsafe_code)]

//! Partial combination of keyed watchables.
//!
//! # Design
//!
//! [`partial_combine`] copies the input associations, keeps a private result
//! [`Subject`], and recomputes the whole mapping in O(N) whenever an input
//! changes. Only inputs that currently have a value contribute a key.
//!
//! Attaching a watcher subscribes to all N inputs while the combiner is
//! still "starting": the N synchronous replays are ignored, and a single
//! recomputation runs once every input is attached. Startup is therefore
//! O(N) rather than O(N^2).
//!
//! # Invariants
//!
//! 1. A key present in the combined mapping is never removed later, since an
//!    input cannot become empty again.
//! 2. A recomputation is pushed only if some key's value differs from the
//!    previous combined mapping.
//! 3. While nobody watches, reads recompute first, so `get_value` is never
//!    stale.

use std::cell::Cell;
use std::hash::Hash;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::Result;
use crate::subscriptions::Unsubscribe;
use crate::trace;

use super::derived::Derived;
use super::subject::Subject;
use super::watchable::{Watchable, WatcherFn};

struct Combiner<K, V> {
    inputs: IndexMap<K, Watchable<V>>,
    result: Subject<IndexMap<K, V>>,
    live_watchers: Cell<usize>,
    #[cfg(test)]
    recomputes: Cell<usize>,
}

impl<K, V> Combiner<K, V>
where
    K: Clone + Eq + Hash + 'static,
    V: Clone + PartialEq + 'static,
{
    fn new(inputs: &IndexMap<K, Watchable<V>>) -> Rc<Self> {
        let combiner = Rc::new(Self {
            inputs: inputs.clone(),
            result: Subject::empty(),
            live_watchers: Cell::new(0),
            #[cfg(test)]
            recomputes: Cell::new(0),
        });
        combiner.update_latest();
        combiner
    }

    fn calculate_latest(&self) -> IndexMap<K, V> {
        let mut latest = IndexMap::with_capacity(self.inputs.len());
        for (key, input) in &self.inputs {
            if let Ok(value) = input.get_value() {
                latest.insert(key.clone(), value);
            }
        }
        latest
    }

    fn update_latest(&self) {
        #[cfg(test)]
        self.recomputes.set(self.recomputes.get() + 1);
        let latest = self.calculate_latest();
        let changed = match self.result.get_value() {
            Ok(previous) => latest
                .iter()
                .any(|(key, value)| previous.get(key) != Some(value)),
            Err(_) => !latest.is_empty(),
        };
        trace::combine_recompute(self.inputs.len(), latest.len(), changed);
        if changed {
            self.result.update(latest);
        }
    }

    fn refresh_if_idle(&self) {
        if self.live_watchers.get() == 0 {
            self.update_latest();
        }
    }

    fn start_watching(self: &Rc<Self>, watcher: WatcherFn<IndexMap<K, V>>) -> Result<Unsubscribe> {
        let started = Rc::new(Cell::new(false));
        let mut handles = Vec::with_capacity(self.inputs.len() + 1);

        for input in self.inputs.values() {
            let combiner = Rc::clone(self);
            let started = Rc::clone(&started);
            let attached = input.watch(move |_| {
                if started.get() {
                    combiner.update_latest();
                }
            });
            match attached {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    rollback(handles);
                    return Err(err);
                }
            }
        }

        started.set(true);
        self.update_latest();

        self.live_watchers.set(self.live_watchers.get() + 1);
        let result_handle = match self.result.watch_with(watcher) {
            Ok(handle) => handle,
            Err(err) => {
                self.live_watchers.set(self.live_watchers.get() - 1);
                rollback(handles);
                return Err(err);
            }
        };
        // The result watcher goes first so it stops before inputs detach.
        handles.insert(0, result_handle);

        let combiner = Rc::clone(self);
        let all = Unsubscribe::all(handles);
        Ok(Unsubscribe::new(move || {
            combiner
                .live_watchers
                .set(combiner.live_watchers.get().saturating_sub(1));
            all.unsubscribe()
        }))
    }
}

fn rollback(handles: Vec<Unsubscribe>) {
    if let Err(err) = Unsubscribe::all(handles).unsubscribe() {
        trace::subscription_error(&err);
    }
}

/// Combine keyed watchables into one watchable mapping, omitting inputs that
/// have no value yet.
///
/// An empty input map yields an already-populated empty mapping. The inputs
/// are copied, so later changes to the caller's map have no effect.
pub fn partial_combine<K, V>(inputs: &IndexMap<K, Watchable<V>>) -> Watchable<IndexMap<K, V>>
where
    K: Clone + Eq + Hash + 'static,
    V: Clone + PartialEq + 'static,
{
    if inputs.is_empty() {
        return Subject::of(IndexMap::new()).into();
    }

    let combiner = Combiner::new(inputs);

    let presence = Rc::clone(&combiner);
    let reader = Rc::clone(&combiner);
    Watchable::new(Derived::new(
        move || {
            presence.refresh_if_idle();
            presence.result.has_value()
        },
        move || {
            reader.refresh_if_idle();
            reader.result.get_value()
        },
        move |watcher| combiner.start_watching(watcher),
    ))
}
