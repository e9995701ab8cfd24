#![forbid(unsafe_code)]

//! The read-only watchable contract and its shared handle.

use std::fmt;
use std::rc::Rc;

use crate::equality::{self, Equality};
use crate::error::Result;
use crate::subscriptions::Unsubscribe;

use super::derived::Derived;
use super::first_value::FirstValue;
use super::hooks::{self, Hooks};
use super::memo::MemoizeLatest;
use super::subject::Subject;

/// Watcher callback. Its `Rc` pointer is the callback's identity.
pub type WatcherFn<T> = Rc<dyn Fn(&T)>;

/// Minimal capability set every watchable provides.
///
/// Implementors must keep presence monotonic: once `has_value` returns true
/// it returns true for the rest of the instance's lifetime.
pub trait WatchableLike<T> {
    /// If this watchable has a current value.
    fn has_value(&self) -> bool;

    /// The current value. Fails with [`crate::WatchableError::Empty`] unless
    /// `has_value` is true.
    fn get_value(&self) -> Result<T>;

    /// Watch for updates. The current value, if any, is replayed to
    /// `watcher` before this returns.
    fn watch(&self, watcher: WatcherFn<T>) -> Result<Unsubscribe>;
}

/// Shared, read-only handle to a watchable.
///
/// Cloning creates another handle to the **same** source.
pub struct Watchable<T> {
    source: Rc<dyn WatchableLike<T>>,
}

impl<T> Clone for Watchable<T> {
    fn clone(&self) -> Self {
        Self {
            source: Rc::clone(&self.source),
        }
    }
}

impl<T: Clone + fmt::Debug> fmt::Debug for Watchable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watchable")
            .field("value", &self.source.get_value().ok())
            .finish()
    }
}

impl<T: Clone + 'static> WatchableLike<T> for Watchable<T> {
    fn has_value(&self) -> bool {
        self.source.has_value()
    }

    fn get_value(&self) -> Result<T> {
        self.source.get_value()
    }

    fn watch(&self, watcher: WatcherFn<T>) -> Result<Unsubscribe> {
        self.source.watch(watcher)
    }
}

impl<T: Clone + 'static> Watchable<T> {
    pub fn new(source: impl WatchableLike<T> + 'static) -> Self {
        Self {
            source: Rc::new(source),
        }
    }

    pub fn from_rc(source: Rc<dyn WatchableLike<T>>) -> Self {
        Self { source }
    }

    #[must_use]
    pub fn has_value(&self) -> bool {
        self.source.has_value()
    }

    pub fn get_value(&self) -> Result<T> {
        self.source.get_value()
    }

    /// The current value, or `fallback` when empty.
    #[must_use]
    pub fn get_or_default(&self, fallback: T) -> T {
        self.source.get_value().unwrap_or(fallback)
    }

    /// Watch with a fresh closure.
    pub fn watch(&self, watcher: impl Fn(&T) + 'static) -> Result<Unsubscribe> {
        self.source.watch(Rc::new(watcher))
    }

    /// Watch with a caller-owned callback. Registering the same `Rc` twice
    /// on a leaf fails with [`crate::WatchableError::DuplicateSubscription`].
    pub fn watch_with(&self, watcher: WatcherFn<T>) -> Result<Unsubscribe> {
        self.source.watch(watcher)
    }

    /// Transform this watchable into another value.
    ///
    /// The transform is memoized against the latest input, so repeated reads
    /// of an unchanged source return the same output without recomputing.
    pub fn map<U>(&self, transform: impl Fn(&T) -> U + 'static) -> Watchable<U>
    where
        T: PartialEq,
        U: Clone + 'static,
    {
        self.map_with_eq(equality::by_partial_eq(), transform)
    }

    /// Like [`Watchable::map`], with an explicit input equality for the memo.
    pub fn map_with_eq<U>(
        &self,
        input_eq: Equality<T>,
        transform: impl Fn(&T) -> U + 'static,
    ) -> Watchable<U>
    where
        U: Clone + 'static,
    {
        let memo = Rc::new(MemoizeLatest::new(input_eq, transform));

        let presence = self.clone();
        let reader = self.clone();
        let read_memo = Rc::clone(&memo);
        let watched = self.clone();

        Watchable::new(Derived::new(
            move || presence.has_value(),
            move || reader.get_value().map(|value| read_memo.call(&value)),
            move |watcher: WatcherFn<U>| {
                let memo = Rc::clone(&memo);
                watched.watch(move |value| watcher(&memo.call(value)))
            },
        ))
    }

    /// Returns a watchable that runs `hooks.setup` when its first watcher
    /// attaches and `hooks.teardown` when its last watcher detaches.
    pub fn with_hooks(&self, hooks: Hooks) -> Watchable<T> {
        hooks::with_hooks(self.clone(), hooks)
    }

    /// One-shot capture of the first value this watchable produces.
    pub fn first_value(&self) -> Result<FirstValue<T>> {
        FirstValue::capture(self)
    }

    /// Freeze the current value.
    ///
    /// A populated source yields an independent leaf holding its current
    /// value. An empty source yields an empty leaf that is populated exactly
    /// once, with the first value the source ever produces.
    pub fn snapshot(&self) -> Result<Watchable<T>> {
        if self.has_value() {
            let value = self.get_value()?;
            return Ok(Subject::of_with_eq(value, equality::never()).into());
        }
        let delayed = Subject::empty_with_eq(equality::never());
        let target = delayed.clone();
        self.first_value()?
            .then(move |value| target.update(value.clone()));
        Ok(delayed.into())
    }
}
