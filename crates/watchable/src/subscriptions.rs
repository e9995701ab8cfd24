#![forbid(unsafe_code)]

//! Ordered callback registry with one-shot unsubscribe handles.
//!
//! # Invariants
//!
//! 1. Callbacks are kept in registration order.
//! 2. A callback identity (`Rc` pointer) is present at most once.
//! 3. [`Subscriptions::snapshot`] materializes the member set before any
//!    callback runs, so a pass over the snapshot is unaffected by
//!    registrations or removals made from inside a callback.
//!
//! # Failure Modes
//!
//! - **Double registration**: `add` returns
//!   [`WatchableError::DuplicateSubscription`].
//! - **Stale removal**: `remove` returns
//!   [`WatchableError::MissingSubscription`].
//! - **Registry dropped**: an [`Unsubscribe`] created by
//!   [`Subscriptions::attach`] becomes inert and reports `Ok(())`.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::AHashMap;

use crate::error::{Result, WatchableError};
use crate::trace;

/// Identifier handed out for each registered callback.
pub type SubscriptionId = u64;

/// Allocation address of an `Rc`, ignoring any trait-object metadata.
fn identity<C: ?Sized>(callback: &Rc<C>) -> usize {
    Rc::as_ptr(callback).cast::<()>() as usize
}

/// An ordered set of callbacks keyed by pointer identity.
///
/// Ids are handed out in increasing order, so iterating `entries` by id is
/// registration order. `add`, `remove` and `contains` are O(log n) or
/// better.
pub struct Subscriptions<C: ?Sized> {
    entries: BTreeMap<SubscriptionId, Rc<C>>,
    identities: AHashMap<usize, SubscriptionId>,
    next_id: SubscriptionId,
}

impl<C: ?Sized> Default for Subscriptions<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ?Sized> fmt::Debug for Subscriptions<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriptions")
            .field("len", &self.entries.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl<C: ?Sized> Subscriptions<C> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            identities: AHashMap::new(),
            next_id: 1,
        }
    }

    /// Registers `callback`, rejecting a second registration of the same
    /// `Rc` allocation.
    pub fn add(&mut self, callback: Rc<C>) -> Result<SubscriptionId> {
        let key = identity(&callback);
        if self.identities.contains_key(&key) {
            let err = WatchableError::DuplicateSubscription;
            trace::subscription_error(&err);
            return Err(err);
        }
        let id = self.next_id;
        self.next_id += 1;
        self.identities.insert(key, id);
        self.entries.insert(id, callback);
        Ok(id)
    }

    /// Removes the callback registered under `id`.
    pub fn remove(&mut self, id: SubscriptionId) -> Result<()> {
        match self.entries.remove(&id) {
            Some(callback) => {
                self.identities.remove(&identity(&callback));
                Ok(())
            }
            None => {
                let err = WatchableError::MissingSubscription;
                trace::subscription_error(&err);
                Err(err)
            }
        }
    }

    /// Whether `callback` is currently registered.
    #[must_use]
    pub fn contains(&self, callback: &Rc<C>) -> bool {
        self.identities.contains_key(&identity(callback))
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Point-in-time copy of the members, in registration order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Rc<C>> {
        self.entries.values().map(Rc::clone).collect()
    }
}

impl<C: ?Sized + 'static> Subscriptions<C> {
    /// Registers `callback` in a shared registry and returns the handle that
    /// removes it again.
    ///
    /// The handle only holds a weak reference, so it never extends the
    /// registry's lifetime.
    pub fn attach(registry: &Rc<RefCell<Self>>, callback: Rc<C>) -> Result<Unsubscribe> {
        let id = registry.borrow_mut().add(callback)?;
        let weak: Weak<RefCell<Self>> = Rc::downgrade(registry);
        Ok(Unsubscribe::new(move || match weak.upgrade() {
            Some(registry) => {
                trace::unsubscribe(id);
                registry.borrow_mut().remove(id)
            }
            None => Ok(()),
        }))
    }
}

/// One-shot capability that removes a watcher.
///
/// Consuming `self` makes a second call impossible. Dropping an
/// `Unsubscribe` without calling it leaves the watcher registered; use
/// [`Unsubscribe::into_guard`] for scope-bound subscriptions.
///
/// ```compile_fail
/// let unsub = watchable::Unsubscribe::noop();
/// unsub.unsubscribe().unwrap();
/// unsub.unsubscribe().unwrap();
/// ```
///
/// A stale id is only observable through the registry itself:
///
/// ```
/// use std::rc::Rc;
/// use watchable::{Subscriptions, WatchableError};
///
/// let mut subs: Subscriptions<dyn Fn(u32)> = Subscriptions::new();
/// let id = subs.add(Rc::new(|_: u32| {}))?;
/// subs.remove(id)?;
/// assert_eq!(subs.remove(id), Err(WatchableError::MissingSubscription));
/// # Ok::<(), WatchableError>(())
/// ```
#[must_use = "dropping an Unsubscribe leaves the watcher registered"]
pub struct Unsubscribe {
    action: Box<dyn FnOnce() -> Result<()>>,
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscribe").finish_non_exhaustive()
    }
}

impl Unsubscribe {
    pub fn new(action: impl FnOnce() -> Result<()> + 'static) -> Self {
        Self {
            action: Box::new(action),
        }
    }

    /// A handle with nothing to remove.
    pub fn noop() -> Self {
        Self::new(|| Ok(()))
    }

    /// Chains several handles; all of them run, the first error is returned.
    pub fn all(handles: Vec<Unsubscribe>) -> Self {
        Self::new(move || {
            let mut first_err = None;
            for handle in handles {
                if let Err(err) = handle.unsubscribe() {
                    first_err.get_or_insert(err);
                }
            }
            first_err.map_or(Ok(()), Err)
        })
    }

    pub fn unsubscribe(self) -> Result<()> {
        (self.action)()
    }

    /// Converts into an RAII guard that unsubscribes on drop.
    pub fn into_guard(self) -> SubscriptionGuard {
        SubscriptionGuard { handle: Some(self) }
    }
}

/// RAII guard that unsubscribes when dropped.
///
/// Teardown runs at most once, whether through [`SubscriptionGuard::cancel`]
/// or through `Drop`.
#[must_use = "dropping a SubscriptionGuard unsubscribes immediately"]
pub struct SubscriptionGuard {
    handle: Option<Unsubscribe>,
}

impl fmt::Debug for SubscriptionGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionGuard")
            .field("active", &self.is_active())
            .finish()
    }
}

impl SubscriptionGuard {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    /// Unsubscribes now. Later calls, and the eventual drop, do nothing.
    pub fn cancel(&mut self) -> Result<()> {
        match self.handle.take() {
            Some(handle) => handle.unsubscribe(),
            None => Ok(()),
        }
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Err(err) = self.cancel() {
            trace::subscription_error(&err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    type Callback = dyn Fn(u32);

    fn callback(f: impl Fn(u32) + 'static) -> Rc<Callback> {
        Rc::new(f)
    }

    #[test]
    fn add_assigns_increasing_ids() {
        let mut subs: Subscriptions<Callback> = Subscriptions::new();
        let id1 = subs.add(callback(|_| {})).unwrap();
        let id2 = subs.add(callback(|_| {})).unwrap();
        assert_eq!(id1, 1);
        assert_eq!(id2, 2);
        assert_eq!(subs.len(), 2);
    }

    #[test]
    fn add_same_identity_twice_fails() {
        let mut subs: Subscriptions<Callback> = Subscriptions::new();
        let cb = callback(|_| {});
        subs.add(Rc::clone(&cb)).unwrap();
        assert_eq!(
            subs.add(Rc::clone(&cb)),
            Err(WatchableError::DuplicateSubscription)
        );
        assert_eq!(subs.len(), 1);
    }

    #[test]
    fn distinct_closures_with_same_body_are_distinct() {
        let mut subs: Subscriptions<Callback> = Subscriptions::new();
        subs.add(callback(|_| {})).unwrap();
        subs.add(callback(|_| {})).unwrap();
        assert_eq!(subs.len(), 2);
    }

    #[test]
    fn remove_missing_fails() {
        let mut subs: Subscriptions<Callback> = Subscriptions::new();
        let id = subs.add(callback(|_| {})).unwrap();
        assert!(subs.remove(id).is_ok());
        assert_eq!(subs.remove(id), Err(WatchableError::MissingSubscription));
        assert!(subs.is_empty());
    }

    #[test]
    fn readd_after_remove_is_allowed() {
        let mut subs: Subscriptions<Callback> = Subscriptions::new();
        let cb = callback(|_| {});
        let id = subs.add(Rc::clone(&cb)).unwrap();
        subs.remove(id).unwrap();
        assert!(!subs.contains(&cb));
        assert!(subs.add(Rc::clone(&cb)).is_ok());
        assert!(subs.contains(&cb));
    }

    #[test]
    fn order_survives_removal_from_the_middle() {
        let order = Rc::new(RefCell::new(Vec::<u32>::new()));
        let mut subs: Subscriptions<Callback> = Subscriptions::new();
        let mut ids = Vec::new();
        for tag in 0..1_000 {
            let order = Rc::clone(&order);
            ids.push(
                subs.add(callback(move |_| order.borrow_mut().push(tag)))
                    .unwrap(),
            );
        }
        for id in ids.iter().step_by(2) {
            subs.remove(*id).unwrap();
        }
        assert_eq!(subs.len(), 500);
        for cb in subs.snapshot() {
            cb(0);
        }
        let want: Vec<u32> = (0..1_000).filter(|tag| tag % 2 == 1).collect();
        assert_eq!(*order.borrow(), want);
    }

    #[test]
    fn identity_ignores_trait_object_metadata() {
        let mut subs: Subscriptions<Callback> = Subscriptions::new();
        let concrete = Rc::new(|_: u32| {});
        let erased: Rc<Callback> = concrete.clone();
        let id = subs.add(Rc::clone(&erased)).unwrap();
        assert!(subs.contains(&erased));
        assert_eq!(subs.add(erased), Err(WatchableError::DuplicateSubscription));
        subs.remove(id).unwrap();
        assert!(subs.is_empty());
    }

    #[test]
    fn snapshot_preserves_registration_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut subs: Subscriptions<Callback> = Subscriptions::new();
        for tag in 0..4 {
            let order = Rc::clone(&order);
            subs.add(callback(move |_| order.borrow_mut().push(tag)))
                .unwrap();
        }
        for cb in subs.snapshot() {
            cb(0);
        }
        assert_eq!(*order.borrow(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn snapshot_is_immune_to_removal_mid_pass() {
        let registry: Rc<RefCell<Subscriptions<Callback>>> =
            Rc::new(RefCell::new(Subscriptions::new()));
        let calls = Rc::new(Cell::new(0));

        let second_unsub: Rc<RefCell<Option<Unsubscribe>>> = Rc::new(RefCell::new(None));
        let slot = Rc::clone(&second_unsub);
        let c = Rc::clone(&calls);
        let _first = Subscriptions::attach(
            &registry,
            callback(move |_| {
                c.set(c.get() + 1);
                if let Some(unsub) = slot.borrow_mut().take() {
                    unsub.unsubscribe().unwrap();
                }
            }),
        )
        .unwrap();
        let c = Rc::clone(&calls);
        let unsub = Subscriptions::attach(&registry, callback(move |_| c.set(c.get() + 1))).unwrap();
        *second_unsub.borrow_mut() = Some(unsub);

        let pass = registry.borrow().snapshot();
        for cb in pass {
            cb(1);
        }
        // The removed callback still saw the in-flight pass.
        assert_eq!(calls.get(), 2);
        assert_eq!(registry.borrow().len(), 1);
    }

    #[test]
    fn attach_handle_removes_entry() {
        let registry: Rc<RefCell<Subscriptions<Callback>>> =
            Rc::new(RefCell::new(Subscriptions::new()));
        let unsub = Subscriptions::attach(&registry, callback(|_| {})).unwrap();
        assert_eq!(registry.borrow().len(), 1);
        unsub.unsubscribe().unwrap();
        assert!(registry.borrow().is_empty());
    }

    #[test]
    fn attach_handle_is_inert_after_registry_drop() {
        let registry: Rc<RefCell<Subscriptions<Callback>>> =
            Rc::new(RefCell::new(Subscriptions::new()));
        let unsub = Subscriptions::attach(&registry, callback(|_| {})).unwrap();
        drop(registry);
        assert!(unsub.unsubscribe().is_ok());
    }

    #[test]
    fn all_runs_every_handle_and_reports_first_error() {
        let ran = Rc::new(Cell::new(0));
        let r1 = Rc::clone(&ran);
        let r2 = Rc::clone(&ran);
        let combined = Unsubscribe::all(vec![
            Unsubscribe::new(move || {
                r1.set(r1.get() + 1);
                Err(WatchableError::MissingSubscription)
            }),
            Unsubscribe::new(move || {
                r2.set(r2.get() + 1);
                Ok(())
            }),
        ]);
        assert_eq!(
            combined.unsubscribe(),
            Err(WatchableError::MissingSubscription)
        );
        assert_eq!(ran.get(), 2);
    }

    #[test]
    fn guard_unsubscribes_once() {
        let ran = Rc::new(Cell::new(0));
        let r = Rc::clone(&ran);
        let mut guard = Unsubscribe::new(move || {
            r.set(r.get() + 1);
            Ok(())
        })
        .into_guard();
        assert!(guard.is_active());
        guard.cancel().unwrap();
        assert!(!guard.is_active());
        guard.cancel().unwrap();
        drop(guard);
        assert_eq!(ran.get(), 1);
    }

    #[test]
    fn guard_unsubscribes_on_drop() {
        let registry: Rc<RefCell<Subscriptions<Callback>>> =
            Rc::new(RefCell::new(Subscriptions::new()));
        {
            let _guard = Subscriptions::attach(&registry, callback(|_| {}))
                .unwrap()
                .into_guard();
            assert_eq!(registry.borrow().len(), 1);
        }
        assert!(registry.borrow().is_empty());
    }
}
