//! Execution-scoped propagation context.
//!
//! A [`Context`] is an immutable bag of values that travels with a unit of
//! work. The tracing layer uses it to carry the active span; applications can
//! attach their own typed values alongside.
//!
//! Each thread has a current context. [`Context::attach`] swaps it in and
//! returns a [`ContextGuard`] that restores the previous one on drop, so
//! scopes nest naturally:
//!
//! ```
//! use tracelet::Context;
//!
//! #[derive(Debug, PartialEq)]
//! struct ValueA(&'static str);
//! #[derive(Debug, PartialEq)]
//! struct ValueB(u64);
//!
//! let _outer_guard = Context::new().with_value(ValueA("a")).attach();
//!
//! // Only value a has been set
//! let current = Context::current();
//! assert_eq!(current.get::<ValueA>(), Some(&ValueA("a")));
//! assert_eq!(current.get::<ValueB>(), None);
//!
//! {
//!     let _inner_guard = Context::current_with_value(ValueB(42)).attach();
//!     // Both values are set in inner context
//!     let current = Context::current();
//!     assert_eq!(current.get::<ValueA>(), Some(&ValueA("a")));
//!     assert_eq!(current.get::<ValueB>(), Some(&ValueB(42)));
//! }
//!
//! // Resets to only the outer value
//! let current = Context::current();
//! assert_eq!(current.get::<ValueA>(), Some(&ValueA("a")));
//! assert_eq!(current.get::<ValueB>(), None);
//! ```

use crate::trace::{Span, SpanContext};
use once_cell::sync::Lazy;
use pin_project_lite::pin_project;
use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::{BuildHasherDefault, Hasher};
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};

thread_local! {
    static CURRENT_CONTEXT: RefCell<Context> = RefCell::new(Context::default());
}

/// An immutable execution-scoped collection of values.
#[derive(Clone, Default)]
pub struct Context {
    span: Option<Span>,
    entries: HashMap<TypeId, Arc<dyn Any + Send + Sync>, BuildHasherDefault<IdHasher>>,
}

impl Context {
    /// Creates an empty `Context`.
    pub fn new() -> Self {
        Context::default()
    }

    /// Returns an immutable snapshot of the current thread's context.
    pub fn current() -> Self {
        Context::map_current(|cx| cx.clone())
    }

    /// Applies a function to the current context without cloning it.
    pub fn map_current<T>(f: impl FnOnce(&Context) -> T) -> T {
        CURRENT_CONTEXT.with(|cx| f(&cx.borrow()))
    }

    /// Returns a clone of the current thread's context with the given value.
    ///
    /// Shorthand for `Context::current().with_value(value)`.
    pub fn current_with_value<T: 'static + Send + Sync>(value: T) -> Self {
        Context::map_current(|cx| cx.with_value(value))
    }

    /// Returns a reference to the entry of the given type, if it exists.
    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(|rc| rc.downcast_ref())
    }

    /// Returns a copy of this context with the given value.
    ///
    /// The context holds at most one entry per type: inserting a value of a
    /// type that already has an entry replaces it in the copy. The original
    /// context is untouched.
    pub fn with_value<T: 'static + Send + Sync>(&self, value: T) -> Self {
        let mut new_context = self.clone();
        new_context
            .entries
            .insert(TypeId::of::<T>(), Arc::new(value));
        new_context
    }

    /// Makes this context the current one on this thread until the returned
    /// guard is dropped.
    ///
    /// Guards restore the context they replaced, so attaches may nest but
    /// should be dropped in reverse order of creation.
    pub fn attach(self) -> ContextGuard {
        let previous_cx = CURRENT_CONTEXT
            .try_with(|current| current.replace(self))
            .ok();

        ContextGuard {
            previous_cx,
            _marker: PhantomData,
        }
    }

    pub(crate) fn with_span_inner(&self, span: Span) -> Self {
        let mut new_context = self.clone();
        new_context.span = Some(span);
        new_context
    }

    pub(crate) fn span_inner(&self) -> Option<&Span> {
        self.span.as_ref()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("has_active_span", &self.span.is_some())
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// A guard that resets the current context to the prior value on drop.
#[allow(missing_debug_implementations)]
pub struct ContextGuard {
    previous_cx: Option<Context>,
    // ensure this type is !Send as it relies on thread locals
    _marker: PhantomData<*const ()>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        if let Some(previous_cx) = self.previous_cx.take() {
            let _ = CURRENT_CONTEXT.try_with(|current| current.replace(previous_cx));
        }
    }
}

/// With TypeIds as keys, there's no need to hash them. They are already hashes
/// themselves, coming from the compiler. The IdHasher just holds the u64 of
/// the TypeId, and then returns it.
#[derive(Clone, Default, Debug)]
struct IdHasher(u64);

impl Hasher for IdHasher {
    fn write(&mut self, _: &[u8]) {
        unreachable!("TypeId calls write_u64");
    }

    #[inline]
    fn write_u64(&mut self, id: u64) {
        self.0 = id;
    }

    #[inline]
    fn finish(&self) -> u64 {
        self.0
    }
}

static NOOP_SPAN: Lazy<Span> = Lazy::new(|| Span::from_remote_context(SpanContext::NONE));

/// Methods for storing and retrieving trace data in a [`Context`].
pub trait TraceContextExt {
    /// Returns a clone of the current context with the included [`Span`].
    fn current_with_span(span: Span) -> Self;

    /// Returns a clone of this context with the included [`Span`].
    fn with_span(&self, span: Span) -> Self;

    /// Returns a reference to this context's span, or an invalid frozen span
    /// if none is set.
    fn span(&self) -> &Span;

    /// Returns whether or not an active span has been set.
    fn has_active_span(&self) -> bool;

    /// Returns a copy of this context with a frozen span carrying the given
    /// remote span context, for parenting local work under a span received
    /// from another process.
    fn with_remote_span_context(&self, span_context: SpanContext) -> Self;
}

impl TraceContextExt for Context {
    fn current_with_span(span: Span) -> Self {
        Context::map_current(|cx| cx.with_span(span))
    }

    fn with_span(&self, span: Span) -> Self {
        self.with_span_inner(span)
    }

    fn span(&self) -> &Span {
        self.span_inner().unwrap_or(&NOOP_SPAN)
    }

    fn has_active_span(&self) -> bool {
        self.span_inner().is_some()
    }

    fn with_remote_span_context(&self, span_context: SpanContext) -> Self {
        self.with_span(Span::from_remote_context(span_context))
    }
}

/// Mark a given `Span` as active for as long as the returned guard lives.
///
/// ```
/// use tracelet::{mark_span_as_active, trace::TracerProvider, Context, TraceContextExt};
///
/// let provider = TracerProvider::default();
/// let tracer = provider.tracer("my-component");
///
/// let span = tracer.start("op");
/// {
///     let _guard = mark_span_as_active(span.clone());
///     // spans created here become children of `span`
///     assert!(Context::current().has_active_span());
/// }
/// span.end();
/// ```
pub fn mark_span_as_active(span: Span) -> ContextGuard {
    let cx = Context::current_with_span(span);
    cx.attach()
}

/// Executes a closure with a reference to this thread's current span.
pub fn get_active_span<F, T>(f: F) -> T
where
    F: FnOnce(&Span) -> T,
{
    Context::map_current(|cx| f(cx.span()))
}

impl<T: Future> Future for WithContext<T> {
    type Output = T::Output;

    fn poll(self: Pin<&mut Self>, task_cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let _guard = this.cx.clone().attach();
        this.inner.poll(task_cx)
    }
}

pin_project! {
    /// A future with an attached [`Context`].
    #[derive(Clone, Debug)]
    pub struct WithContext<T> {
        #[pin]
        inner: T,
        cx: Context,
    }
}

/// Extension trait for attaching a [`Context`] to a future.
///
/// The wrapped future re-attaches its context for the duration of every
/// `poll`, so spans created inside it parent correctly even when the future
/// migrates between executor threads.
pub trait FutureExt: Sized {
    /// Attach the provided context to this future.
    fn with_context(self, cx: Context) -> WithContext<Self> {
        WithContext { inner: self, cx }
    }

    /// Attach the current context to this future.
    fn with_current_context(self) -> WithContext<Self> {
        let cx = Context::current();
        self.with_context(cx)
    }
}

impl<T: Sized> FutureExt for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct ValueA(u64);
    #[derive(Debug, PartialEq)]
    struct ValueB(u64);

    #[test]
    fn nested_contexts() {
        let cx = Context::default().with_value(ValueA(1));
        let _outer_guard = cx.attach();

        // Only value `ValueA` is set
        let current = Context::current();
        assert_eq!(current.get(), Some(&ValueA(1)));
        assert_eq!(current.get::<ValueB>(), None);

        {
            let _inner_guard = Context::current_with_value(ValueB(42)).attach();
            // Both values are set in inner context
            let current = Context::current();
            assert_eq!(current.get(), Some(&ValueA(1)));
            assert_eq!(current.get(), Some(&ValueB(42)));
        }

        // Resets to only value `ValueA`
        let current = Context::current();
        assert_eq!(current.get(), Some(&ValueA(1)));
        assert_eq!(current.get::<ValueB>(), None);
    }

    #[test]
    fn overwriting_a_value_leaves_the_original_untouched() {
        let cx = Context::new().with_value(ValueA(1));
        let overwritten = cx.with_value(ValueA(2));

        assert_eq!(cx.get(), Some(&ValueA(1)));
        assert_eq!(overwritten.get(), Some(&ValueA(2)));
    }

    #[test]
    fn empty_context_has_no_active_span() {
        let cx = Context::new();
        assert!(!cx.has_active_span());
        assert!(!cx.span().span_context().is_valid());
    }

    #[test]
    fn remote_span_context_round_trips() {
        use crate::trace::{SpanId, TraceFlags, TraceId, TraceState};

        let remote = SpanContext::new(
            TraceId::from(1u128),
            SpanId::from(1u64),
            TraceFlags::SAMPLED,
            true,
            TraceState::default(),
        );
        let cx = Context::new().with_remote_span_context(remote.clone());
        assert!(cx.has_active_span());
        assert_eq!(cx.span().span_context(), &remote);
    }
}
