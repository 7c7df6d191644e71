//! Core distributed-tracing building blocks: spans, tracers, and the
//! processor pipeline that observes them.
//!
//! ## Spans
//!
//! A [`Span`] is a named, timed operation with attributes, events, links,
//! and a status. Span handles are cheap clones sharing one underlying
//! record, safe to mutate from any thread; ending the span is idempotent
//! and delivers a single immutable [`SpanData`] snapshot to each registered
//! [`SpanProcessor`].
//!
//! ```
//! use tracelet::{global, KeyValue};
//!
//! let tracer = global::tracer("my-component");
//!
//! let span = tracer.start("doing_work");
//! span.set_attribute(KeyValue::new("job.id", 42));
//! // ... traced work ...
//! span.end();
//! ```
//!
//! ## Propagation
//!
//! Parent/child relationships flow through an execution-scoped [`Context`]
//! rather than explicit span arguments; see the [`trace`] and [`context`]
//! module docs for the full picture.
//!
//! [`Span`]: crate::trace::Span
//! [`SpanData`]: crate::trace::SpanData
//! [`SpanProcessor`]: crate::trace::SpanProcessor
#![warn(
    future_incompatible,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    unreachable_pub,
    unused
)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod common;
mod context;

pub mod global;
pub mod trace;

pub(crate) mod time;

pub use common::{InstrumentationScope, Key, KeyValue, Value};
pub use context::{
    get_active_span, mark_span_as_active, Context, ContextGuard, FutureExt, TraceContextExt,
    WithContext,
};
