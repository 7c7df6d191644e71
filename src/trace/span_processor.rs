//! # Span Processor Interface
//!
//! Span processors hook span start and end. They are registered on a
//! [`TracerProvider`] and invoked synchronously, in registration order, for
//! every span created by that provider's tracers.
//!
//! A processor may well be asynchronous internally (enqueue-and-return); the
//! core only waits for the handler invocation itself, never for downstream
//! work.
//!
//! [`TracerProvider`]: crate::trace::TracerProvider

use crate::trace::{Span, SpanContext, SpanData, TraceResult};
use crate::Context;
use std::borrow::Cow;
use std::sync::{Arc, Mutex};

/// An interface for hooking span start and end.
///
/// `on_start`/`on_end` must not block and should not panic: the core invokes
/// them inline on the thread creating or ending the span and does not isolate
/// one processor's panic from the next.
pub trait SpanProcessor: Send + Sync + std::fmt::Debug {
    /// Called when a span is started, after its record is constructed and
    /// before the creating call returns. `parent_cx` is the propagation
    /// context the span was created against.
    fn on_start(&self, span: &Span, parent_cx: &Context);

    /// Called exactly once per span, at the moment the span's end timestamp
    /// is set. Redundant end calls never re-trigger this. The snapshot is a
    /// read-only view; no further mutation will be visible through it.
    fn on_end(&self, span: SpanData);

    /// Force any buffered spans to be handed off downstream.
    fn force_flush(&self) -> TraceResult<()>;

    /// Shut down the processor. Called when the owning provider shuts down;
    /// implementations should tolerate repeated calls.
    fn shutdown(&self) -> TraceResult<()>;
}

/// One span lifecycle notification observed by [`InMemorySpanProcessor`].
#[derive(Clone, Debug)]
pub enum SpanNotification {
    /// A span was started.
    Started {
        /// Name the span was started with.
        name: Cow<'static, str>,
        /// Identity of the started span.
        span_context: SpanContext,
    },
    /// A span was ended.
    Ended(SpanData),
}

/// A [`SpanProcessor`] that records every notification in memory.
///
/// Useful for tests and debugging: clones share storage, so a clone can be
/// registered with a provider while the original is queried afterwards.
#[derive(Clone, Debug, Default)]
pub struct InMemorySpanProcessor {
    notifications: Arc<Mutex<Vec<SpanNotification>>>,
}

impl InMemorySpanProcessor {
    /// Create a new, empty processor.
    pub fn new() -> Self {
        Self::default()
    }

    /// All notifications observed so far, in dispatch order.
    pub fn notifications(&self) -> Vec<SpanNotification> {
        self.notifications
            .lock()
            .map(|n| n.clone())
            .unwrap_or_default()
    }

    /// The finished-span snapshots observed so far, in `on_end` order.
    pub fn finished_spans(&self) -> Vec<SpanData> {
        self.notifications
            .lock()
            .map(|n| {
                n.iter()
                    .filter_map(|event| match event {
                        SpanNotification::Ended(data) => Some(data.clone()),
                        SpanNotification::Started { .. } => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Clear the recorded notifications.
    pub fn reset(&self) {
        let _ = self.notifications.lock().map(|mut n| n.clear());
    }
}

impl SpanProcessor for InMemorySpanProcessor {
    fn on_start(&self, span: &Span, _parent_cx: &Context) {
        let name = span
            .snapshot()
            .map(|data| data.name)
            .unwrap_or_else(|| Cow::Borrowed(""));
        let _ = self.notifications.lock().map(|mut n| {
            n.push(SpanNotification::Started {
                name,
                span_context: span.span_context().clone(),
            })
        });
    }

    fn on_end(&self, span: SpanData) {
        let _ = self
            .notifications
            .lock()
            .map(|mut n| n.push(SpanNotification::Ended(span)));
    }

    fn force_flush(&self) -> TraceResult<()> {
        // Nothing buffered beyond the in-memory store itself.
        Ok(())
    }

    fn shutdown(&self) -> TraceResult<()> {
        Ok(())
    }
}
