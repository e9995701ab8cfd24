#![forbid(unsafe_code)]

//! Structural adapter over an arbitrary `{has_value, get_value, watch}`
//! triple.
//!
//! A `Derived` owns no state of its own beyond the closures it wraps. Those
//! closures hold shared handles to whatever they were built over, which keeps
//! the source alive exactly as long as the wrapper.

use std::fmt;

use crate::error::Result;
use crate::subscriptions::Unsubscribe;

use super::watchable::{WatchableLike, WatcherFn};

type HasValueFn = Box<dyn Fn() -> bool>;
type GetValueFn<T> = Box<dyn Fn() -> Result<T>>;
type WatchFn<T> = Box<dyn Fn(WatcherFn<T>) -> Result<Unsubscribe>>;

pub struct Derived<T> {
    has_value: HasValueFn,
    get_value: GetValueFn<T>,
    watch: WatchFn<T>,
}

impl<T> fmt::Debug for Derived<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Derived")
            .field("has_value", &(self.has_value)())
            .finish_non_exhaustive()
    }
}

impl<T> Derived<T> {
    pub fn new(
        has_value: impl Fn() -> bool + 'static,
        get_value: impl Fn() -> Result<T> + 'static,
        watch: impl Fn(WatcherFn<T>) -> Result<Unsubscribe> + 'static,
    ) -> Self {
        Self {
            has_value: Box::new(has_value),
            get_value: Box::new(get_value),
            watch: Box::new(watch),
        }
    }
}

impl<T> WatchableLike<T> for Derived<T> {
    fn has_value(&self) -> bool {
        (self.has_value)()
    }

    fn get_value(&self) -> Result<T> {
        (self.get_value)()
    }

    fn watch(&self, watcher: WatcherFn<T>) -> Result<Unsubscribe> {
        (self.watch)(watcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WatchableError;
    use crate::reactive::{Subject, Watchable};
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn delegates_to_closures() {
        let watched = Rc::new(Cell::new(0));
        let counter = Rc::clone(&watched);
        let derived = Derived::new(
            || true,
            || Ok(42),
            move |watcher: WatcherFn<i32>| {
                counter.set(counter.get() + 1);
                watcher(&42);
                Ok(Unsubscribe::noop())
            },
        );
        assert!(derived.has_value());
        assert_eq!(derived.get_value(), Ok(42));

        let seen = Rc::new(Cell::new(0));
        let sink = Rc::clone(&seen);
        let unsub = derived.watch(Rc::new(move |v: &i32| sink.set(*v))).unwrap();
        assert_eq!(seen.get(), 42);
        assert_eq!(watched.get(), 1);
        unsub.unsubscribe().unwrap();
    }

    #[test]
    fn keeps_source_alive() {
        let w: Watchable<i32> = {
            let subject = Subject::of(9);
            let source = subject.as_watchable();
            let reader = source.clone();
            Watchable::new(Derived::new(
                move || source.has_value(),
                move || reader.get_value(),
                |_| Err(WatchableError::MissingSubscription),
            ))
        };
        assert!(w.has_value());
        assert_eq!(w.get_value(), Ok(9));
    }
}
