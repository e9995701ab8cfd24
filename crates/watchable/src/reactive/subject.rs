#![forbid(unsafe_code)]

//! The mutable leaf of a reactive graph.
//!
//! # Design
//!
//! [`Subject<T>`] keeps its optional value and its watcher registry behind
//! `Rc` so that handles are cheap to clone and share. No `RefCell` borrow is
//! held while a watcher runs: [`Subject::update`] stores the value, takes a
//! snapshot of the registry, releases every borrow, and only then notifies.
//! This is what makes reentrant updates and mid-pass (un)subscription safe.
//!
//! # Invariants
//!
//! 1. Once populated, a subject never becomes empty again.
//! 2. `update(v)` with `v` equal to the stored value (per the subject's
//!    equality) notifies nobody.
//! 3. Watchers run in subscription order. A watcher attached during a pass
//!    does not receive the value being delivered by that pass.
//! 4. An `update` issued from inside a watcher runs its full pass before the
//!    outer pass resumes; the outer pass keeps delivering its own value.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::equality::{self, Equality};
use crate::error::{Result, WatchableError};
use crate::subscriptions::{Subscriptions, Unsubscribe};
use crate::trace;

use super::watchable::{Watchable, WatchableLike, WatcherFn};

type Registry<T> = Rc<RefCell<Subscriptions<dyn Fn(&T)>>>;

struct SubjectInner<T> {
    value: RefCell<Option<T>>,
    subscriptions: Registry<T>,
    eq: Equality<T>,
}

/// Writable watchable. Cloning creates another handle to the same leaf.
pub struct Subject<T> {
    inner: Rc<SubjectInner<T>>,
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Subject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subject")
            .field("value", &self.inner.value.borrow())
            .field("watchers", &self.inner.subscriptions.borrow().len())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> Subject<T> {
    /// An empty leaf deduping with `PartialEq`.
    #[must_use]
    pub fn empty() -> Self {
        Self::empty_with_eq(equality::by_partial_eq())
    }

    /// A populated leaf deduping with `PartialEq`.
    #[must_use]
    pub fn of(value: T) -> Self {
        Self::of_with_eq(value, equality::by_partial_eq())
    }
}

impl<T: Clone + 'static> Subject<T> {
    #[must_use]
    pub fn empty_with_eq(eq: Equality<T>) -> Self {
        Self::from_parts(None, eq)
    }

    #[must_use]
    pub fn of_with_eq(value: T, eq: Equality<T>) -> Self {
        Self::from_parts(Some(value), eq)
    }

    fn from_parts(value: Option<T>, eq: Equality<T>) -> Self {
        Self {
            inner: Rc::new(SubjectInner {
                value: RefCell::new(value),
                subscriptions: Rc::new(RefCell::new(Subscriptions::new())),
                eq,
            }),
        }
    }

    #[must_use]
    pub fn has_value(&self) -> bool {
        self.inner.value.borrow().is_some()
    }

    pub fn get_value(&self) -> Result<T> {
        self.inner
            .value
            .borrow()
            .as_ref()
            .cloned()
            .ok_or(WatchableError::Empty)
    }

    #[must_use]
    pub fn get_or_default(&self, fallback: T) -> T {
        self.get_value().unwrap_or(fallback)
    }

    /// Replace the current value and notify every watcher, unless the stored
    /// value is equal to `value`.
    pub fn update(&self, value: T) {
        {
            let current = self.inner.value.borrow();
            if let Some(current) = current.as_ref()
                && (self.inner.eq)(current, &value)
            {
                trace::update_deduped();
                return;
            }
        }
        *self.inner.value.borrow_mut() = Some(value.clone());
        trace::update();

        let watchers = self.inner.subscriptions.borrow().snapshot();
        trace::notify(watchers.len());
        for watcher in watchers {
            watcher(&value);
        }
    }

    /// Register `watcher` and replay the current value to it.
    pub fn watch(&self, watcher: impl Fn(&T) + 'static) -> Result<Unsubscribe> {
        self.watch_with(Rc::new(watcher))
    }

    pub fn watch_with(&self, watcher: WatcherFn<T>) -> Result<Unsubscribe> {
        let unsubscribe = Subscriptions::attach(&self.inner.subscriptions, Rc::clone(&watcher))?;
        let current = self.inner.value.borrow().clone();
        trace::subscribe(self.watcher_count(), current.is_some());
        if let Some(value) = current {
            watcher(&value);
        }
        Ok(unsubscribe)
    }

    /// Number of currently registered watchers.
    #[must_use]
    pub fn watcher_count(&self) -> usize {
        self.inner.subscriptions.borrow().len()
    }

    /// Read-only view of this leaf.
    #[must_use]
    pub fn as_watchable(&self) -> Watchable<T> {
        Watchable::new(self.clone())
    }
}

impl<T: Clone + 'static> WatchableLike<T> for Subject<T> {
    fn has_value(&self) -> bool {
        Subject::has_value(self)
    }

    fn get_value(&self) -> Result<T> {
        Subject::get_value(self)
    }

    fn watch(&self, watcher: WatcherFn<T>) -> Result<Unsubscribe> {
        self.watch_with(watcher)
    }
}

impl<T: Clone + 'static> From<Subject<T>> for Watchable<T> {
    fn from(subject: Subject<T>) -> Self {
        Watchable::new(subject)
    }
}
