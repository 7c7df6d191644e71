//! End-to-end tests covering the span lifecycle through provider, tracer,
//! context propagation, and processor dispatch.

use std::thread;

use tracelet::trace::{
    InMemorySpanProcessor, IncrementIdGenerator, SpanId, SpanNotification, TracerProvider,
};
use tracelet::{Context, KeyValue, TraceContextExt};

fn notification_name(notification: &SpanNotification) -> String {
    match notification {
        SpanNotification::Started { name, .. } => format!("started:{}", name),
        SpanNotification::Ended(data) => format!("ended:{}", data.name),
    }
}

#[test]
fn parent_child_lifecycle_is_observed_in_order() {
    let processor = InMemorySpanProcessor::new();
    let provider = TracerProvider::builder()
        .with_span_processor(processor.clone())
        .build();
    let tracer = provider.tracer("integration");

    let root = tracer.start_with_context("A", &Context::new());
    let root_cx = Context::new().with_span(root.clone());
    let child = tracer.start_with_context("B", &root_cx);

    child.end();
    root.end();

    let order: Vec<_> = processor
        .notifications()
        .iter()
        .map(notification_name)
        .collect();
    assert_eq!(order, ["started:A", "started:B", "ended:B", "ended:A"]);

    // one trace, three distinct identities
    let finished = processor.finished_spans();
    let (b, a) = (&finished[0], &finished[1]);
    assert_eq!(b.span_context.trace_id(), a.span_context.trace_id());
    assert_ne!(b.span_context.span_id(), a.span_context.span_id());
    assert_ne!(a.span_context.span_id(), SpanId::INVALID);
    assert_ne!(b.span_context.span_id(), SpanId::INVALID);
    assert_eq!(b.parent_span_id, a.span_context.span_id());
    assert_eq!(a.parent_span_id, SpanId::INVALID);
}

#[test]
fn every_processor_sees_every_notification() {
    let first = InMemorySpanProcessor::new();
    let second = InMemorySpanProcessor::new();
    let provider = TracerProvider::builder()
        .with_span_processor(first.clone())
        .with_span_processor(second.clone())
        .build();

    let span = provider
        .tracer("integration")
        .start_with_context("shared", &Context::new());
    span.end();

    let first_order: Vec<_> = first.notifications().iter().map(notification_name).collect();
    let second_order: Vec<_> = second.notifications().iter().map(notification_name).collect();
    assert_eq!(first_order, ["started:shared", "ended:shared"]);
    assert_eq!(first_order, second_order);
}

#[test]
fn remote_parent_joins_local_work_to_the_trace() {
    use tracelet::trace::{SpanContext, TraceFlags, TraceId, TraceState};

    let processor = InMemorySpanProcessor::new();
    let provider = TracerProvider::builder()
        .with_span_processor(processor.clone())
        .build();
    let tracer = provider.tracer("integration");

    let remote = SpanContext::new(
        TraceId::from(0x4bf92f3577b34da6a3ce929d0e0e4736u128),
        SpanId::from(0x00f067aa0ba902b7u64),
        TraceFlags::SAMPLED,
        true,
        TraceState::default(),
    );
    let cx = Context::new().with_remote_span_context(remote.clone());

    let span = tracer.start_with_context("local-handler", &cx);
    span.end();

    let finished = processor.finished_spans();
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].span_context.trace_id(), remote.trace_id());
    assert_eq!(finished[0].parent_span_id, remote.span_id());
    // the frozen parent itself never reaches the processors
    assert_eq!(processor.notifications().len(), 2);
}

#[test]
fn shared_handles_race_on_mutation_and_end() {
    let processor = InMemorySpanProcessor::new();
    let provider = TracerProvider::builder()
        .with_span_processor(processor.clone())
        .build();
    let tracer = provider.tracer("integration");

    let span = tracer.start_with_context("contended", &Context::new());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let span = span.clone();
            thread::spawn(move || {
                span.set_attribute(KeyValue::new(format!("thread-{}", i), i as i64));
                span.end();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // exactly one Ended notification regardless of how the race resolved
    let finished = processor.finished_spans();
    assert_eq!(finished.len(), 1);
    assert!(!span.is_recording());
}

#[test]
fn predictable_ids_with_custom_generator() {
    let processor = InMemorySpanProcessor::new();
    let provider = TracerProvider::builder()
        .with_span_processor(processor.clone())
        .with_id_generator(IncrementIdGenerator::new())
        .build();
    let tracer = provider.tracer("integration");

    let root = tracer.start_with_context("root", &Context::new());
    let cx = Context::new().with_span(root.clone());
    let child = tracer.start_with_context("child", &cx);

    // span id drawn before the root's trace id, children reuse the trace id
    assert_eq!(root.span_context().span_id(), SpanId::from(1u64));
    assert_eq!(child.span_context().span_id(), SpanId::from(3u64));
    assert_eq!(
        child.span_context().trace_id(),
        root.span_context().trace_id()
    );

    child.end();
    root.end();
    assert_eq!(processor.finished_spans().len(), 2);
}

#[test]
fn active_span_scoping_across_helpers() {
    let processor = InMemorySpanProcessor::new();
    let provider = TracerProvider::builder()
        .with_span_processor(processor.clone())
        .build();
    let tracer = provider.tracer("integration");

    let span = tracer.start_with_context("outer", &Context::new());
    {
        let _guard = tracelet::mark_span_as_active(span.clone());
        tracelet::get_active_span(|active| {
            assert_eq!(active.span_context(), span.span_context());
        });

        // spans started here become children of the active span
        let child = tracer.start("inner");
        assert_eq!(
            child.span_context().trace_id(),
            span.span_context().trace_id()
        );
        child.end();
    }
    span.end();

    assert!(!Context::current().has_active_span());
    assert_eq!(processor.finished_spans().len(), 2);
}

#[test]
fn provider_shutdown_is_first_call_wins() {
    let provider = TracerProvider::builder()
        .with_span_processor(InMemorySpanProcessor::new())
        .build();

    assert!(provider.force_flush().is_ok());
    assert!(provider.shutdown().is_ok());
    assert!(provider.shutdown().is_err());
}
