#![forbid(unsafe_code)]

//! Synchronous watchable values.
//!
//! - [`Subject`]: the writable leaf. Owns an optional value and its watchers.
//! - [`Watchable`]: shared read-only handle over anything implementing
//!   [`WatchableLike`], carrying the derived operations (`map`,
//!   `with_hooks`, `snapshot`, `first_value`).
//! - [`Derived`]: adapter built from three closures, used for every derived
//!   watchable.
//! - [`partial_combine`]: keyed fan-in of many watchables into one mapping.
//!
//! # Invariants
//!
//! 1. Presence is monotonic: once `has_value()` is true it stays true.
//! 2. Watchers are notified in subscription order.
//! 3. `watch()` replays the current value synchronously before returning.
//! 4. Updating with a value equal to the current one is a no-op.
//! 5. An `update()` issued from inside a watcher runs its whole notification
//!    pass before the outer pass resumes.

pub mod combine;
pub mod derived;
pub mod first_value;
pub mod hooks;
pub mod memo;
pub mod subject;
pub mod watchable;

pub use combine::partial_combine;
pub use derived::Derived;
pub use first_value::FirstValue;
pub use hooks::Hooks;
pub use memo::MemoizeLatest;
pub use subject::Subject;
pub use watchable::{Watchable, WatchableLike, WatcherFn};
