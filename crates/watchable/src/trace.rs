#![forbid(unsafe_code)]

//! Structured logging hooks.
//!
//! Every function here compiles to nothing unless the `tracing` feature is
//! enabled. Event names are dotted (`watchable.update`, ...) so a capture
//! layer can filter on the `message` field alone.

#[inline]
pub(crate) fn update() {
    #[cfg(feature = "tracing")]
    tracing::trace!(message = "watchable.update");
}

/// One notification pass over a snapshot of `watchers` callbacks.
#[inline]
pub(crate) fn notify(watchers: usize) {
    #[cfg(feature = "tracing")]
    tracing::trace!(message = "watchable.notify", watchers);
    #[cfg(not(feature = "tracing"))]
    let _ = watchers;
}

#[inline]
pub(crate) fn update_deduped() {
    #[cfg(feature = "tracing")]
    tracing::trace!(message = "watchable.update.deduped");
}

#[inline]
pub(crate) fn subscribe(watchers: usize, replay: bool) {
    #[cfg(feature = "tracing")]
    tracing::trace!(message = "watchable.subscribe", watchers, replay);
    #[cfg(not(feature = "tracing"))]
    let _ = (watchers, replay);
}

#[inline]
pub(crate) fn unsubscribe(id: u64) {
    #[cfg(feature = "tracing")]
    tracing::trace!(message = "watchable.unsubscribe", id);
    #[cfg(not(feature = "tracing"))]
    let _ = id;
}

#[inline]
pub(crate) fn subscription_error(error: &crate::WatchableError) {
    #[cfg(feature = "tracing")]
    tracing::debug!(message = "watchable.subscription_error", %error);
    #[cfg(not(feature = "tracing"))]
    let _ = error;
}

#[inline]
pub(crate) fn hooks_setup() {
    #[cfg(feature = "tracing")]
    tracing::debug!(message = "watchable.hooks.setup");
}

#[inline]
pub(crate) fn hooks_teardown() {
    #[cfg(feature = "tracing")]
    tracing::debug!(message = "watchable.hooks.teardown");
}

#[inline]
pub(crate) fn combine_recompute(inputs: usize, present: usize, changed: bool) {
    #[cfg(feature = "tracing")]
    tracing::trace!(
        message = "watchable.combine.recompute",
        inputs,
        present,
        changed
    );
    #[cfg(not(feature = "tracing"))]
    let _ = (inputs, present, changed);
}

/// Install a JSON formatting subscriber filtered by `RUST_LOG`.
///
/// Intended for binaries embedding this crate. Returns an error if a global
/// subscriber is already set.
#[cfg(feature = "tracing-json")]
pub fn init_json_logging() -> Result<(), tracing_subscriber::util::TryInitError> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{EnvFilter, fmt};

    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(EnvFilter::from_default_env())
        .try_init()
}
