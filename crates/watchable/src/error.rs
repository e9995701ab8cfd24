#![forbid(unsafe_code)]

//! Error types for watchable misuse.
//!
//! Every variant signals a programming error in the caller. None of them is
//! transient and nothing in this crate retries.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, WatchableError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WatchableError {
    /// `get_value()` was called while `has_value()` is false.
    #[error("you must check has_value() before accessing a watchable value")]
    Empty,

    /// The same callback identity was registered twice on one registry.
    #[error("can't add subscription twice")]
    DuplicateSubscription,

    /// An unsubscribe targeted a callback that is no longer registered.
    #[error("did not find callback for unsubscribe")]
    MissingSubscription,
}

impl WatchableError {
    /// Whether this error came from the subscription registry.
    #[must_use]
    pub fn is_subscription_error(&self) -> bool {
        matches!(
            self,
            Self::DuplicateSubscription | Self::MissingSubscription
        )
    }
}
