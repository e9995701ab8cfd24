#![forbid(unsafe_code)]

//! Pluggable equality used for dedupe-on-update.

use std::rc::Rc;

/// Shared equality predicate. Returning `true` suppresses an update.
pub type Equality<T> = Rc<dyn Fn(&T, &T) -> bool>;

/// Structural equality through [`PartialEq`].
#[must_use]
pub fn by_partial_eq<T: PartialEq + 'static>() -> Equality<T> {
    Rc::new(|a: &T, b: &T| a == b)
}

/// Identity of the shared allocation, ignoring contents.
#[must_use]
pub fn by_ptr<U: ?Sized + 'static>() -> Equality<Rc<U>> {
    Rc::new(|a: &Rc<U>, b: &Rc<U>| Rc::ptr_eq(a, b))
}

/// Never equal: every update notifies.
#[must_use]
pub fn never<T: 'static>() -> Equality<T> {
    Rc::new(|_: &T, _: &T| false)
}
