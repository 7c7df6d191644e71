//! Span lifecycle, trace identity, and processor notification.
//!
//! A trace is a tree of [`Span`]s sharing one trace id. Spans are created by
//! a [`Tracer`], which is in turn produced by a [`TracerProvider`]. Every
//! span start and end is delivered synchronously, in registration order, to
//! the provider's [`SpanProcessor`]s.
//!
//! # Getting started
//!
//! ```
//! use tracelet::global;
//!
//! // Use the process-wide default provider to get a tracer
//! let tracer = global::tracer("my-component");
//!
//! // Create and end spans
//! let span = tracer.start("doing_work");
//! // ... traced work ...
//! span.end();
//! ```
//!
//! # Parenting
//!
//! Spans are parented through a propagation [`Context`]: creating a span with
//! a context whose active span is `P` yields a child of `P`, sharing `P`'s
//! trace id. Without an active span, a fresh trace id is generated and the
//! span becomes a root.
//!
//! [`Context`]: crate::Context

use std::borrow::Cow;
use std::time::{Duration, SystemTime};
use thiserror::Error;

mod id_generator;
mod provider;
mod span;
mod span_context;
mod span_processor;
mod tracer;

pub use self::{
    id_generator::{IdGenerator, IncrementIdGenerator, RandomIdGenerator},
    provider::{TracerProvider, TracerProviderBuilder},
    span::{Span, SpanData, SpanKind, Status},
    span_context::{SpanContext, SpanId, TraceFlags, TraceId, TraceState},
    span_processor::{InMemorySpanProcessor, SpanNotification, SpanProcessor},
    tracer::{SpanBuilder, Tracer},
};

/// Describe the result of operations in the tracing core.
pub type TraceResult<T> = Result<T, TraceError>;

/// Errors returned by the tracing core.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TraceError {
    /// Shutdown was already invoked on this provider or processor.
    #[error("tracer provider is already shut down")]
    AlreadyShutdown,

    /// A flush did not complete within the allotted time.
    #[error("flush timed out after {0:?}")]
    FlushTimedOut(Duration),

    /// Other errors propagated from span processors.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl From<String> for TraceError {
    fn from(err_msg: String) -> Self {
        TraceError::Other(Box::new(Custom(err_msg)))
    }
}

impl From<&'static str> for TraceError {
    fn from(err_msg: &'static str) -> Self {
        TraceError::Other(Box::new(Custom(err_msg.into())))
    }
}

/// Wrap type for string
#[derive(Error, Debug)]
#[error("{0}")]
struct Custom(String);

/// Events record things that happened during a [`Span`]'s lifetime.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    /// The name of this event.
    pub name: Cow<'static, str>,

    /// The time at which this event occurred.
    pub timestamp: SystemTime,

    /// Attributes that describe this event.
    pub attributes: Vec<crate::KeyValue>,
}

impl Event {
    /// Create a new `Event`.
    pub fn new<T: Into<Cow<'static, str>>>(
        name: T,
        timestamp: SystemTime,
        attributes: Vec<crate::KeyValue>,
    ) -> Self {
        Event {
            name: name.into(),
            timestamp,
            attributes,
        }
    }

    /// Create a new `Event` with just a name, timestamped now.
    pub fn with_name<T: Into<Cow<'static, str>>>(name: T) -> Self {
        Event {
            name: name.into(),
            timestamp: crate::time::now(),
            attributes: Vec::new(),
        }
    }
}

/// Link is the relationship between two spans, within or across traces.
#[derive(Clone, Debug, PartialEq)]
pub struct Link {
    /// The span context of the linked span.
    pub span_context: SpanContext,

    /// Attributes that describe this link.
    pub attributes: Vec<crate::KeyValue>,
}

impl Link {
    /// Create a new link to the span identified by `span_context`.
    pub fn new(span_context: SpanContext, attributes: Vec<crate::KeyValue>) -> Self {
        Link {
            span_context,
            attributes,
        }
    }
}
