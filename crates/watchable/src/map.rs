#![forbid(unsafe_code)]

//! A keyed registry of lazily created leaves.
//!
//! [`WatchableMap`] materializes a [`Subject`] per key on first touch and
//! routes every mutation through that leaf's `update`, so watchers get the
//! usual dedupe-and-notify semantics under the map's equality.
//!
//! The backing map is pluggable through [`MapLike`]; the default is
//! [`AHashMap`]. The map is held in a `RefCell` and is never borrowed while a
//! leaf notifies, so watchers may call back into the same map.
//!
//! To fold several leaves into one watchable, see
//! [`partial_combine`](crate::partial_combine).

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::rc::Rc;

use ahash::AHashMap;
use indexmap::IndexMap;

use crate::equality::{self, Equality};
use crate::reactive::{Subject, Watchable};

/// Minimal map interface used as the backing store of a [`WatchableMap`].
pub trait MapLike<K, V> {
    fn get(&self, key: &K) -> Option<&V>;
    fn insert(&mut self, key: K, value: V);
    fn len(&self) -> usize;
    fn for_each(&self, f: &mut dyn FnMut(&K, &V));

    fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Eq + Hash, V> MapLike<K, V> for AHashMap<K, V> {
    fn get(&self, key: &K) -> Option<&V> {
        (**self).get(key)
    }

    fn insert(&mut self, key: K, value: V) {
        (**self).insert(key, value);
    }

    fn len(&self) -> usize {
        (**self).len()
    }

    fn for_each(&self, f: &mut dyn FnMut(&K, &V)) {
        self.iter().for_each(|(k, v)| f(k, v));
    }
}

impl<K: Eq + Hash, V, S: BuildHasher> MapLike<K, V> for HashMap<K, V, S> {
    fn get(&self, key: &K) -> Option<&V> {
        HashMap::get(self, key)
    }

    fn insert(&mut self, key: K, value: V) {
        HashMap::insert(self, key, value);
    }

    fn len(&self) -> usize {
        HashMap::len(self)
    }

    fn for_each(&self, f: &mut dyn FnMut(&K, &V)) {
        self.iter().for_each(|(k, v)| f(k, v));
    }
}

impl<K: Ord, V> MapLike<K, V> for BTreeMap<K, V> {
    fn get(&self, key: &K) -> Option<&V> {
        BTreeMap::get(self, key)
    }

    fn insert(&mut self, key: K, value: V) {
        BTreeMap::insert(self, key, value);
    }

    fn len(&self) -> usize {
        BTreeMap::len(self)
    }

    fn for_each(&self, f: &mut dyn FnMut(&K, &V)) {
        self.iter().for_each(|(k, v)| f(k, v));
    }
}

impl<K: Eq + Hash, V, S: BuildHasher> MapLike<K, V> for IndexMap<K, V, S> {
    fn get(&self, key: &K) -> Option<&V> {
        IndexMap::get(self, key)
    }

    fn insert(&mut self, key: K, value: V) {
        IndexMap::insert(self, key, value);
    }

    fn len(&self) -> usize {
        IndexMap::len(self)
    }

    fn for_each(&self, f: &mut dyn FnMut(&K, &V)) {
        self.iter().for_each(|(k, v)| f(k, v));
    }
}

/// A map of watchable values, one leaf per key.
///
/// # Example
///
/// ```
/// use watchable::WatchableMap;
///
/// let contacts: WatchableMap<String, u32> = WatchableMap::new();
/// let alice = contacts.get_or_create("alice".to_string());
/// assert!(!alice.has_value());
///
/// contacts.update_or_create_with_value("alice".to_string(), 30);
/// assert_eq!(alice.get_value(), Ok(30));
///
/// contacts.update_or_create("alice".to_string(), |age| age.map_or(0, |a| a + 1));
/// assert_eq!(alice.get_value(), Ok(31));
/// ```
pub struct WatchableMap<K, V, M = AHashMap<K, Subject<V>>> {
    underlying: RefCell<M>,
    eq: Equality<V>,
    _key: std::marker::PhantomData<K>,
}

impl<K, V, M: MapLike<K, Subject<V>>> fmt::Debug for WatchableMap<K, V, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchableMap")
            .field("len", &self.underlying.borrow().len())
            .finish_non_exhaustive()
    }
}

impl<K, V> Default for WatchableMap<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone + PartialEq + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> WatchableMap<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone + PartialEq + 'static,
{
    /// An [`AHashMap`]-backed registry deduping with `PartialEq`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_equality(equality::by_partial_eq())
    }
}

impl<K, V> WatchableMap<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone + 'static,
{
    /// An [`AHashMap`]-backed registry deduping with `eq`.
    #[must_use]
    pub fn with_equality(eq: Equality<V>) -> Self {
        Self::with_equality_and_map(eq, AHashMap::new())
    }
}

impl<K, V, M> WatchableMap<K, V, M>
where
    K: Clone,
    V: Clone + 'static,
    M: MapLike<K, Subject<V>>,
{
    /// A registry over a caller-supplied backing map.
    ///
    /// Leaves already present in `map` keep their own equality; leaves
    /// created by this registry use `eq`.
    #[must_use]
    pub fn with_equality_and_map(eq: Equality<V>, map: M) -> Self {
        Self {
            underlying: RefCell::new(map),
            eq,
            _key: std::marker::PhantomData,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.underlying.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.underlying.borrow().is_empty()
    }

    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.underlying.borrow().contains_key(key)
    }

    /// Keys with a materialized leaf, in the backing map's iteration order.
    #[must_use]
    pub fn keys(&self) -> Vec<K> {
        let mut keys = Vec::with_capacity(self.len());
        self.underlying
            .borrow()
            .for_each(&mut |key: &K, _: &Subject<V>| keys.push(key.clone()));
        keys
    }

    /// Every materialized leaf as a read-only view.
    #[must_use]
    pub fn entries(&self) -> Vec<(K, Watchable<V>)> {
        let mut entries = Vec::with_capacity(self.len());
        self.underlying
            .borrow()
            .for_each(&mut |key: &K, subject: &Subject<V>| {
                entries.push((key.clone(), subject.as_watchable()));
            });
        entries
    }

    /// The view for `key`, creating an empty leaf if needed.
    pub fn get_or_create(&self, key: K) -> Watchable<V> {
        self.get_or_create_subject(key).as_watchable()
    }

    /// The view for `key` only if a leaf already exists.
    #[must_use]
    pub fn get_if_exists(&self, key: &K) -> Option<Watchable<V>> {
        self.underlying.borrow().get(key).map(Subject::as_watchable)
    }

    /// The view for `key`, populating the leaf with `default_value` if it is
    /// still empty.
    pub fn get_or_create_with_value(&self, key: K, default_value: V) -> Watchable<V> {
        let subject = self.get_or_create_subject(key);
        if !subject.has_value() {
            subject.update(default_value);
        }
        subject.as_watchable()
    }

    /// Update from the current value (`Some`) or from scratch (`None`),
    /// notifying only if the map's equality reports a difference.
    pub fn update_or_create(&self, key: K, f: impl FnOnce(Option<&V>) -> V) {
        let subject = self.get_or_create_subject(key);
        self.apply(&subject, f);
    }

    /// Set `value` only if the leaf has no value yet.
    pub fn update_if_missing(&self, key: K, value: V) {
        let subject = self.get_or_create_subject(key);
        if !subject.has_value() {
            subject.update(value);
        }
    }

    /// Ensure the leaf equals `value`.
    pub fn update_or_create_with_value(&self, key: K, value: V) {
        let subject = self.get_or_create_subject(key);
        match subject.get_value() {
            Ok(current) if (self.eq)(&current, &value) => {}
            _ => subject.update(value),
        }
    }

    /// Like [`WatchableMap::update_or_create`], but a no-op when no leaf
    /// exists for `key`.
    pub fn update_if_exists(&self, key: &K, f: impl FnOnce(Option<&V>) -> V) {
        let existing = self.underlying.borrow().get(key).cloned();
        if let Some(subject) = existing {
            self.apply(&subject, f);
        }
    }

    fn apply(&self, subject: &Subject<V>, f: impl FnOnce(Option<&V>) -> V) {
        match subject.get_value() {
            Ok(current) => {
                let next = f(Some(&current));
                if !(self.eq)(&current, &next) {
                    subject.update(next);
                }
            }
            Err(_) => subject.update(f(None)),
        }
    }

    fn get_or_create_subject(&self, key: K) -> Subject<V> {
        if let Some(existing) = self.underlying.borrow().get(&key) {
            return existing.clone();
        }
        let subject = Subject::empty_with_eq(Rc::clone(&self.eq));
        self.underlying.borrow_mut().insert(key, subject.clone());
        subject
    }
}
