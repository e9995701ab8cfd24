#![forbid(unsafe_code)]

//! One-shot capture of a watchable's first value.
//!
//! `watch()` may fire synchronously (replay of a present value) before it
//! has returned the unsubscribe handle. The capture therefore tracks a
//! `resolved` flag: a synchronous first delivery only marks the capture
//! resolved and the handle is released right after `watch()` returns; a
//! later delivery releases the stored handle from inside the callback.
//!
//! [`FirstValue`] implements [`Future`] so it can be awaited, but nothing in
//! this crate polls it. Resolution always happens on the stack of the
//! source's notification.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::error::Result;
use crate::subscriptions::Unsubscribe;
use crate::trace;

use super::watchable::Watchable;

type Continuation<T> = Box<dyn FnOnce(&T)>;

struct FirstValueState<T> {
    resolved: Cell<bool>,
    value: RefCell<Option<T>>,
    unsubscribe: RefCell<Option<Unsubscribe>>,
    continuations: RefCell<Vec<Continuation<T>>>,
    waker: RefCell<Option<Waker>>,
}

impl<T: Clone> FirstValueState<T> {
    fn resolve(&self, value: &T) {
        if self.resolved.replace(true) {
            return;
        }
        *self.value.borrow_mut() = Some(value.clone());

        // Only present when the delivery came after watch() returned.
        let pending = self.unsubscribe.borrow_mut().take();
        if let Some(unsubscribe) = pending
            && let Err(err) = unsubscribe.unsubscribe()
        {
            trace::subscription_error(&err);
        }

        let continuations = std::mem::take(&mut *self.continuations.borrow_mut());
        for continuation in continuations {
            continuation(value);
        }
        let waker = self.waker.borrow_mut().take();
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

/// The first value a watchable produces, captured exactly once.
pub struct FirstValue<T> {
    state: Rc<FirstValueState<T>>,
}

impl<T> Clone for FirstValue<T> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for FirstValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FirstValue")
            .field("resolved", &self.state.resolved.get())
            .field("value", &self.state.value.borrow())
            .finish()
    }
}

impl<T: Clone + 'static> FirstValue<T> {
    pub(crate) fn capture(source: &Watchable<T>) -> Result<Self> {
        let state = Rc::new(FirstValueState {
            resolved: Cell::new(false),
            value: RefCell::new(None),
            unsubscribe: RefCell::new(None),
            continuations: RefCell::new(Vec::new()),
            waker: RefCell::new(None),
        });

        let callback_state = Rc::clone(&state);
        let unsubscribe = source.watch(move |value| callback_state.resolve(value))?;
        if state.resolved.get() {
            unsubscribe.unsubscribe()?;
        } else {
            *state.unsubscribe.borrow_mut() = Some(unsubscribe);
        }
        Ok(Self { state })
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.state.resolved.get()
    }

    /// The captured value, if the source has produced one.
    #[must_use]
    pub fn value(&self) -> Option<T> {
        self.state.value.borrow().clone()
    }

    /// Run `f` with the first value: immediately if already resolved,
    /// otherwise on resolution.
    pub fn then(&self, f: impl FnOnce(&T) + 'static) {
        match self.value() {
            Some(value) => f(&value),
            None => self.state.continuations.borrow_mut().push(Box::new(f)),
        }
    }
}

impl<T: Clone> Future for FirstValue<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        if let Some(value) = self.state.value.borrow().clone() {
            return Poll::Ready(value);
        }
        *self.state.waker.borrow_mut() = Some(cx.waker().clone());
        Poll::Pending
    }
}
