//! # Tracer
//!
//! The `Tracer` creates spans and wires them to their parents. It is bound
//! at construction to its provider's processor list and id generator, both
//! immutable from then on, so a tracer is freely shareable across threads.
use crate::trace::{
    span::SpanRecord, Event, Link, Span, SpanContext, SpanId, SpanKind, Status, TraceFlags,
    TraceState, TracerProvider,
};
use crate::{Context, InstrumentationScope, KeyValue, TraceContextExt};
use std::borrow::Cow;
use std::fmt;
use std::time::SystemTime;

/// Factory for [`Span`]s, created via [`TracerProvider::tracer`].
///
/// [`TracerProvider::tracer`]: crate::trace::TracerProvider::tracer
#[derive(Clone)]
pub struct Tracer {
    scope: InstrumentationScope,
    provider: TracerProvider,
}

impl fmt::Debug for Tracer {
    /// Formats the `Tracer` using the given formatter, omitting `provider`
    /// to keep the output readable.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracer")
            .field("name", &self.scope.name())
            .field("version", &self.scope.version())
            .finish()
    }
}

impl Tracer {
    /// Create a new tracer (used internally by [`TracerProvider`]).
    pub(crate) fn new(scope: InstrumentationScope, provider: TracerProvider) -> Self {
        Tracer { scope, provider }
    }

    /// TracerProvider associated with this tracer.
    pub(crate) fn provider(&self) -> &TracerProvider {
        &self.provider
    }

    /// Instrumentation scope of this tracer.
    pub(crate) fn instrumentation_scope(&self) -> &InstrumentationScope {
        &self.scope
    }

    /// Start building a new span with the given name.
    pub fn span_builder(&self, name: impl Into<Cow<'static, str>>) -> SpanBuilder {
        SpanBuilder::from_name(name)
    }

    /// Start a new span, parented to the current context's active span.
    pub fn start(&self, name: impl Into<Cow<'static, str>>) -> Span {
        Context::map_current(|cx| self.build_with_context(SpanBuilder::from_name(name), cx))
    }

    /// Start a new span, parented to the given context's active span.
    pub fn start_with_context(
        &self,
        name: impl Into<Cow<'static, str>>,
        parent_cx: &Context,
    ) -> Span {
        self.build_with_context(SpanBuilder::from_name(name), parent_cx)
    }

    /// Start a span from a [`SpanBuilder`], parented to the current context.
    pub fn build(&self, builder: SpanBuilder) -> Span {
        Context::map_current(|cx| self.build_with_context(builder, cx))
    }

    /// Start a span from a [`SpanBuilder`] against an explicit parent context.
    ///
    /// A span has zero or one parent: if `parent_cx` carries an active span
    /// (recording or frozen), the new span joins that span's trace; otherwise
    /// it becomes the root of a fresh trace. A fresh span id is generated
    /// unconditionally. Every registered processor is notified via
    /// `on_start`, in registration order, before this call returns.
    pub fn build_with_context(&self, mut builder: SpanBuilder, parent_cx: &Context) -> Span {
        let provider = self.provider();
        let id_generator = provider.id_generator();

        let span_id = id_generator.new_span_id();
        let start_time = builder.start_time.take().unwrap_or_else(crate::time::now);

        let (trace_id, parent_span_id) = if parent_cx.has_active_span() {
            let parent = parent_cx.span().span_context();
            (parent.trace_id(), parent.span_id())
        } else {
            (id_generator.new_trace_id(), SpanId::INVALID)
        };

        // Trace flags and state are extension points for sampling and
        // propagation policies; the core leaves them unpopulated.
        let span_context = SpanContext::new(
            trace_id,
            span_id,
            TraceFlags::default(),
            false,
            TraceState::default(),
        );

        let record = SpanRecord {
            name: builder.name,
            parent_span_id,
            span_kind: builder.span_kind.take().unwrap_or(SpanKind::Internal),
            start_time,
            end_time: None,
            // the record keeps attributes most-recent-first
            attributes: builder.attributes.unwrap_or_default().into_iter().rev().collect(),
            events: builder.events.unwrap_or_default(),
            links: builder.links.unwrap_or_default(),
            status: Status::default(),
        };

        let span = Span::recording(span_context, record, self.clone());

        for processor in provider.span_processors() {
            processor.on_start(&span, parent_cx);
        }

        span
    }

    /// Start a new span, mark it active for the duration of `f`, and end it
    /// when `f` returns.
    ///
    /// Spans created inside `f` without an explicit parent context become
    /// children of this span.
    pub fn in_span<T, F>(&self, name: impl Into<Cow<'static, str>>, f: F) -> T
    where
        F: FnOnce(Context) -> T,
    {
        let span = self.start(name);
        let cx = Context::current_with_span(span);
        let guard = cx.clone().attach();
        let result = f(cx.clone());
        drop(guard);
        cx.span().end();
        result
    }
}

/// Fluent configuration for a new [`Span`], created via
/// [`Tracer::span_builder`].
#[derive(Clone, Debug, Default)]
pub struct SpanBuilder {
    /// Span name, required.
    pub name: Cow<'static, str>,

    /// Span kind, defaults to [`SpanKind::Internal`].
    pub span_kind: Option<SpanKind>,

    /// Explicit start timestamp, defaults to the time of creation.
    pub start_time: Option<SystemTime>,

    /// Attributes the span starts out with.
    pub attributes: Option<Vec<KeyValue>>,

    /// Events the span starts out with.
    pub events: Option<Vec<Event>>,

    /// Links the span starts out with.
    pub links: Option<Vec<Link>>,
}

impl SpanBuilder {
    /// Create a new span builder with the given span name.
    pub fn from_name(name: impl Into<Cow<'static, str>>) -> Self {
        SpanBuilder {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Specify the span kind.
    pub fn with_kind(self, span_kind: SpanKind) -> Self {
        SpanBuilder {
            span_kind: Some(span_kind),
            ..self
        }
    }

    /// Specify an explicit start timestamp.
    pub fn with_start_time(self, start_time: SystemTime) -> Self {
        SpanBuilder {
            start_time: Some(start_time),
            ..self
        }
    }

    /// Specify attributes the span starts out with.
    pub fn with_attributes(self, attributes: Vec<KeyValue>) -> Self {
        SpanBuilder {
            attributes: Some(attributes),
            ..self
        }
    }

    /// Specify events the span starts out with.
    pub fn with_events(self, events: Vec<Event>) -> Self {
        SpanBuilder {
            events: Some(events),
            ..self
        }
    }

    /// Specify links the span starts out with.
    pub fn with_links(self, links: Vec<Link>) -> Self {
        SpanBuilder {
            links: Some(links),
            ..self
        }
    }

    /// Start the span via the given tracer, parented to the current context.
    pub fn start(self, tracer: &Tracer) -> Span {
        tracer.build(self)
    }

    /// Start the span via the given tracer against an explicit parent context.
    pub fn start_with_context(self, tracer: &Tracer, parent_cx: &Context) -> Span {
        tracer.build_with_context(self, parent_cx)
    }
}
