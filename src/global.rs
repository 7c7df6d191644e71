//! Process-wide default [`TracerProvider`].
//!
//! Applications configure a provider once, near startup, and hand it to
//! [`set_tracer_provider`]; libraries then obtain tracers through
//! [`tracer`] without threading the provider through every call site.
//!
//! Until a provider is installed, the slot holds a default provider with no
//! processors: spans are created and recorded but their notifications go
//! nowhere.
use crate::trace::{Tracer, TracerProvider};
use once_cell::sync::Lazy;
use std::borrow::Cow;
use std::mem;
use std::sync::RwLock;

/// The global `TracerProvider` singleton.
static GLOBAL_TRACER_PROVIDER: Lazy<RwLock<TracerProvider>> =
    Lazy::new(|| RwLock::new(TracerProvider::default()));

/// Returns a clone of the currently configured global [`TracerProvider`].
pub fn tracer_provider() -> TracerProvider {
    GLOBAL_TRACER_PROVIDER
        .read()
        .map(|provider| provider.clone())
        .unwrap_or_default()
}

/// Sets the given [`TracerProvider`] as the global provider and returns the
/// provider it replaced.
///
/// Tracers obtained before the swap keep their original provider; only
/// subsequent [`tracer`] calls see the new one. Callers that need the old
/// pipeline drained can invoke `shutdown` on the returned provider.
pub fn set_tracer_provider(new_provider: TracerProvider) -> TracerProvider {
    match GLOBAL_TRACER_PROVIDER.write() {
        Ok(mut global_provider) => mem::replace(&mut *global_provider, new_provider),
        // the lock can only be poisoned by a panic mid-replace, in which
        // case the slot still holds a usable provider
        Err(poisoned) => mem::replace(&mut *poisoned.into_inner(), new_provider),
    }
}

/// Creates a named [`Tracer`] via the configured global [`TracerProvider`].
///
/// Shorthand for `global::tracer_provider().tracer(name)`.
pub fn tracer(name: impl Into<Cow<'static, str>>) -> Tracer {
    tracer_provider().tracer(name)
}
