#![forbid(unsafe_code)]

//! Lifecycle hooks around a watchable's first and last watcher.
//!
//! The watcher count lives on the hooked wrapper, not on the source, so the
//! same source can be hooked several times independently.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::subscriptions::Unsubscribe;
use crate::trace;

use super::derived::Derived;
use super::watchable::{Watchable, WatcherFn};

/// Callbacks for the 0 -> 1 and 1 -> 0 watcher transitions.
pub struct Hooks {
    setup: Box<dyn Fn()>,
    teardown: Box<dyn Fn()>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks").finish_non_exhaustive()
    }
}

impl Hooks {
    pub fn new(setup: impl Fn() + 'static, teardown: impl Fn() + 'static) -> Self {
        Self {
            setup: Box::new(setup),
            teardown: Box::new(teardown),
        }
    }
}

struct HookState {
    hooks: Hooks,
    watchers: Cell<usize>,
}

impl HookState {
    fn acquire(&self) {
        let count = self.watchers.get();
        self.watchers.set(count + 1);
        if count == 0 {
            trace::hooks_setup();
            (self.hooks.setup)();
        }
    }

    fn release(&self) {
        let count = self.watchers.get().saturating_sub(1);
        self.watchers.set(count);
        if count == 0 {
            trace::hooks_teardown();
            (self.hooks.teardown)();
        }
    }
}

pub(crate) fn with_hooks<T: Clone + 'static>(source: Watchable<T>, hooks: Hooks) -> Watchable<T> {
    let state = Rc::new(HookState {
        hooks,
        watchers: Cell::new(0),
    });

    let presence = source.clone();
    let reader = source.clone();

    Watchable::new(Derived::new(
        move || presence.has_value(),
        move || reader.get_value(),
        move |watcher: WatcherFn<T>| {
            // Setup runs before the source subscription so that a replayed
            // value reaches the watcher after setup.
            state.acquire();
            let unsubscribe = match source.watch_with(watcher) {
                Ok(unsubscribe) => unsubscribe,
                Err(err) => {
                    state.release();
                    return Err(err);
                }
            };
            let state = Rc::clone(&state);
            Ok(Unsubscribe::new(move || {
                let result = unsubscribe.unsubscribe();
                state.release();
                result
            }))
        },
    ))
}
