//! # Span
//!
//! A `Span` represents a single operation within a trace. Spans nest to form
//! a trace tree rooted at one span.
//!
//! A recording span's record lives behind a shared mutation cell: the handle
//! is `Clone`, and every clone addresses the same record, so spans may be
//! mutated from any number of threads. Each mutator serializes on the cell,
//! and the Recording → Ended transition happens exactly once no matter how
//! many handles call [`Span::end`] concurrently.
use crate::trace::{Event, Link, SpanContext, SpanId, Tracer};
use crate::KeyValue;
use std::borrow::Cow;
use std::collections::VecDeque;
use std::error::Error;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

/// `SpanKind` describes the relationship between the span, its parents, and
/// its children in a trace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpanKind {
    /// The span describes a request to some remote service.
    Client,

    /// The span covers server-side handling of a remote request.
    Server,

    /// The span describes the initiator of an asynchronous request.
    Producer,

    /// The span describes a child of an asynchronous producer request.
    Consumer,

    /// Default value. An internal operation within an application.
    Internal,
}

/// The status of a [`Span`].
///
/// `Unset` may be upgraded to either `Ok` or `Error`, but once one of those
/// is set the other never replaces it: the two terminal values are not
/// ordered with respect to each other. See [`Span::set_status`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Status {
    /// The default status.
    #[default]
    Unset,

    /// The operation contains an error.
    Error {
        /// The description of the error
        description: Cow<'static, str>,
    },

    /// The operation has been validated to have completed successfully.
    Ok,
}

impl Status {
    /// Create a new error status with a given description.
    pub fn error(description: impl Into<Cow<'static, str>>) -> Self {
        Status::Error {
            description: description.into(),
        }
    }
}

/// The mutable record backing a recording span.
#[derive(Clone, Debug)]
pub(crate) struct SpanRecord {
    pub(crate) name: Cow<'static, str>,
    pub(crate) parent_span_id: SpanId,
    pub(crate) span_kind: SpanKind,
    pub(crate) start_time: SystemTime,
    /// `None` while recording; first end wins.
    pub(crate) end_time: Option<SystemTime>,
    /// Most-recent-first.
    pub(crate) attributes: VecDeque<KeyValue>,
    pub(crate) events: Vec<Event>,
    pub(crate) links: Vec<Link>,
    pub(crate) status: Status,
}

/// Single operation within a trace.
///
/// Spans come in two variants. A *recording* span, created by a [`Tracer`],
/// owns a mutable record and notifies the provider's span processors when it
/// starts and ends. A *frozen* span, created via
/// [`Span::from_remote_context`], carries identity only: its lifecycle is
/// owned by another process, so all mutators are no-ops and it never
/// participates in processor dispatch.
#[derive(Clone, Debug)]
pub struct Span {
    inner: SpanInner,
}

#[derive(Clone, Debug)]
enum SpanInner {
    Recording {
        span_context: SpanContext,
        record: Arc<Mutex<SpanRecord>>,
        tracer: Tracer,
    },
    Frozen {
        span_context: SpanContext,
    },
}

impl Span {
    pub(crate) fn recording(
        span_context: SpanContext,
        record: SpanRecord,
        tracer: Tracer,
    ) -> Self {
        Span {
            inner: SpanInner::Recording {
                span_context,
                record: Arc::new(Mutex::new(record)),
                tracer,
            },
        }
    }

    /// Wrap a caller-supplied [`SpanContext`] into a frozen span.
    ///
    /// Used to represent spans whose authority lives in a different process,
    /// e.g. reconstructed from an inbound request header. No ids are
    /// generated and no processors are notified.
    pub fn from_remote_context(span_context: SpanContext) -> Self {
        Span {
            inner: SpanInner::Frozen { span_context },
        }
    }

    /// Operate on the mutable record of a recording span.
    ///
    /// No-op (returning `None`) for frozen spans and for a poisoned cell.
    fn with_record<T, F>(&self, f: F) -> Option<T>
    where
        F: FnOnce(&mut SpanRecord) -> T,
    {
        match &self.inner {
            SpanInner::Recording { record, .. } => record.lock().ok().map(|mut r| f(&mut r)),
            SpanInner::Frozen { .. } => None,
        }
    }

    /// The [`SpanContext`] for this span.
    ///
    /// Stable for the span's entire lifetime and usable after it has ended.
    pub fn span_context(&self) -> &SpanContext {
        match &self.inner {
            SpanInner::Recording { span_context, .. } => span_context,
            SpanInner::Frozen { span_context } => span_context,
        }
    }

    /// Returns `true` if this span is recording information.
    ///
    /// Recording spans stop recording once ended. Frozen spans always answer
    /// `true` by convention: their true recording status is unknowable here.
    pub fn is_recording(&self) -> bool {
        match &self.inner {
            SpanInner::Recording { record, .. } => record
                .lock()
                .map(|r| r.end_time.is_none())
                .unwrap_or(false),
            SpanInner::Frozen { .. } => true,
        }
    }

    /// Set a single attribute on this span.
    ///
    /// Attributes accumulate most-recent-first; no deduplication is applied.
    pub fn set_attribute(&self, attribute: KeyValue) {
        self.with_record(|r| r.attributes.push_front(attribute));
    }

    /// Set a batch of attributes on this span.
    pub fn set_attributes(&self, attributes: impl IntoIterator<Item = KeyValue>) {
        self.with_record(|r| {
            for attribute in attributes {
                r.attributes.push_front(attribute);
            }
        });
    }

    /// Record an event in the context of this span, timestamped now.
    pub fn add_event<T>(&self, name: T, attributes: Vec<KeyValue>)
    where
        T: Into<Cow<'static, str>>,
    {
        self.add_event_with_timestamp(name, crate::time::now(), attributes)
    }

    /// Record an event at a specific time in the context of this span.
    pub fn add_event_with_timestamp<T>(
        &self,
        name: T,
        timestamp: SystemTime,
        attributes: Vec<KeyValue>,
    ) where
        T: Into<Cow<'static, str>>,
    {
        let name = name.into();
        self.with_record(|r| r.events.push(Event::new(name, timestamp, attributes)));
    }

    /// Record an error as an `exception` event on this span.
    ///
    /// An additional [`Span::set_status`] call is required if the span status
    /// should also reflect the error.
    pub fn record_error(&self, err: &dyn Error) {
        let attributes = vec![KeyValue::new("exception.message", err.to_string())];
        self.add_event("exception", attributes);
    }

    /// Add a link to another span.
    pub fn add_link(&self, span_context: SpanContext, attributes: Vec<KeyValue>) {
        self.with_record(|r| r.links.push(Link::new(span_context, attributes)));
    }

    /// Set the status of this span.
    ///
    /// The status only ever upgrades: `Unset` may become `Ok` or `Error`, but
    /// once either terminal value is set, later calls never change it.
    /// Setting `Unset` is never applied.
    pub fn set_status(&self, status: Status) {
        self.with_record(|r| {
            if r.status == Status::Unset && status != Status::Unset {
                r.status = status;
            }
        });
    }

    /// Update the span's name.
    pub fn update_name<T>(&self, new_name: T)
    where
        T: Into<Cow<'static, str>>,
    {
        let new_name = new_name.into();
        self.with_record(|r| r.name = new_name);
    }

    /// Signal that the operation described by this span has now ended.
    pub fn end(&self) {
        self.end_with_timestamp(crate::time::now());
    }

    /// Signal that the operation described by this span ended at `timestamp`.
    ///
    /// Ending is idempotent with first-writer-wins semantics: the first call
    /// to reach the record sets the end timestamp and triggers exactly one
    /// `on_end` dispatch to every registered processor, in registration
    /// order, with a snapshot taken at the transition. Later calls, from this
    /// handle or any clone, change nothing and notify no one.
    pub fn end_with_timestamp(&self, timestamp: SystemTime) {
        let (span_context, record, tracer) = match &self.inner {
            SpanInner::Recording {
                span_context,
                record,
                tracer,
            } => (span_context, record, tracer),
            SpanInner::Frozen { .. } => return,
        };

        // The snapshot is taken under the lock, so it reflects exactly the
        // record as of the winning transition; dispatch runs unlocked so a
        // slow processor never blocks other mutators.
        let snapshot = match record.lock() {
            Ok(mut record) => {
                if record.end_time.is_some() {
                    return; // already ended
                }
                record.end_time = Some(timestamp);
                record.clone()
            }
            Err(_) => return,
        };

        match tracer.provider().span_processors() {
            [] => {}
            [processor] => {
                processor.on_end(build_span_data(snapshot, span_context.clone(), tracer));
            }
            processors => {
                for processor in processors {
                    processor.on_end(build_span_data(
                        snapshot.clone(),
                        span_context.clone(),
                        tracer,
                    ));
                }
            }
        }
    }

    /// A snapshot of this span's current data, if it is a recording span.
    ///
    /// This copies the whole record and is intended for processors and tests.
    pub fn snapshot(&self) -> Option<SpanData> {
        match &self.inner {
            SpanInner::Recording {
                span_context,
                record,
                tracer,
            } => record
                .lock()
                .ok()
                .map(|r| build_span_data(r.clone(), span_context.clone(), tracer)),
            SpanInner::Frozen { .. } => None,
        }
    }
}

/// Immutable view of a finished (or in-flight, via [`Span::snapshot`]) span.
///
/// This is what span processors receive at `on_end` time; they must not
/// assume any further mutation will be visible to them.
#[derive(Clone, Debug, PartialEq)]
pub struct SpanData {
    /// The identity of the snapshotted span.
    pub span_context: SpanContext,
    /// Span id of the parent, `SpanId::INVALID` for root spans.
    pub parent_span_id: SpanId,
    /// The kind of span.
    pub span_kind: SpanKind,
    /// Span name.
    pub name: Cow<'static, str>,
    /// Start time.
    pub start_time: SystemTime,
    /// End time; equals `start_time` if snapshotted before the span ended.
    pub end_time: SystemTime,
    /// Accumulated attributes, most-recent-first.
    pub attributes: Vec<KeyValue>,
    /// Accumulated events, in insertion order.
    pub events: Vec<Event>,
    /// Accumulated links, in insertion order.
    pub links: Vec<Link>,
    /// Span status at snapshot time.
    pub status: Status,
    /// Metadata of the tracer that created the span.
    pub instrumentation_scope: crate::InstrumentationScope,
}

fn build_span_data(record: SpanRecord, span_context: SpanContext, tracer: &Tracer) -> SpanData {
    SpanData {
        span_context,
        parent_span_id: record.parent_span_id,
        span_kind: record.span_kind,
        name: record.name,
        start_time: record.start_time,
        end_time: record.end_time.unwrap_or(record.start_time),
        attributes: record.attributes.into_iter().collect(),
        events: record.events,
        links: record.links,
        status: record.status,
        instrumentation_scope: tracer.instrumentation_scope().clone(),
    }
}
