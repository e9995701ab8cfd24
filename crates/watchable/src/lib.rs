#![forbid(unsafe_code)]

//! Watchable: minimal synchronous reactive value containers.
//!
//! A [`Subject`] holds an optional value and pushes every change to its
//! watchers, replaying the current value to each new watcher. Derived
//! watchables (`map`, `with_hooks`, `snapshot`, [`partial_combine`]) are
//! built on the read-only [`WatchableLike`] contract, and [`WatchableMap`]
//! manages a dynamic set of keyed leaves.
//!
//! Everything is single-threaded and runs on the caller's stack; there is
//! no scheduler.

pub mod equality;
pub mod error;
pub mod map;
pub mod reactive;
pub mod subscriptions;
pub mod trace;

pub use equality::Equality;
pub use error::{Result, WatchableError};
pub use map::{MapLike, WatchableMap};
pub use reactive::{
    Derived, FirstValue, Hooks, Subject, Watchable, WatchableLike, WatcherFn, partial_combine,
};
pub use subscriptions::{SubscriptionGuard, SubscriptionId, Subscriptions, Unsubscribe};
