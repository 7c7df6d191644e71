//! # Tracer Provider
//!
//! ## Creation
//!
//! A `TracerProvider` owns the processor pipeline and id generator shared by
//! all of its tracers. Both are fixed at build time via
//! [`TracerProvider::builder`]; registering a processor after `build` is not
//! possible.
//!
//! ## Cloning and Shutdown
//!
//! `TracerProvider` is lightweight and cheap to clone: clones share the same
//! inner state, so shutting down any clone shuts down the pipeline for all of
//! them. Shutdown itself is one-way; repeat calls fail with
//! [`TraceError::AlreadyShutdown`], and spans created afterwards are still
//! recorded locally but their processors may refuse the hand-off.
use crate::trace::{
    IdGenerator, RandomIdGenerator, SpanProcessor, TraceError, TraceResult, Tracer,
};
use crate::InstrumentationScope;
use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct TracerProviderInner {
    processors: Vec<Box<dyn SpanProcessor>>,
    id_generator: Box<dyn IdGenerator>,
    is_shutdown: AtomicBool,
}

impl TracerProviderInner {
    /// Shut down the span processors, one by one in registration order.
    fn shutdown(&self) -> Vec<TraceError> {
        let mut errs = vec![];
        for processor in &self.processors {
            if let Err(err) = processor.shutdown() {
                // Log at debug level because:
                //  - The error is returned to the caller as well.
                //  - A processor that failed to flush on shutdown will likely
                //    have logged the details itself already.
                tracing::debug!(?err, "span processor shutdown failed");
                errs.push(err);
            }
        }
        errs
    }
}

impl Drop for TracerProviderInner {
    fn drop(&mut self) {
        if !self.is_shutdown.load(Ordering::Relaxed) {
            let _ = self.shutdown();
        } else {
            tracing::debug!("tracer provider already shut down at drop");
        }
    }
}

/// Creator and registry of named [`Tracer`] instances.
#[derive(Clone, Debug)]
pub struct TracerProvider {
    inner: Arc<TracerProviderInner>,
}

impl Default for TracerProvider {
    fn default() -> Self {
        TracerProvider::builder().build()
    }
}

impl TracerProvider {
    /// Create a new `TracerProvider` builder.
    pub fn builder() -> TracerProviderBuilder {
        TracerProviderBuilder::default()
    }

    /// Span processors associated with this provider.
    pub(crate) fn span_processors(&self) -> &[Box<dyn SpanProcessor>] {
        &self.inner.processors
    }

    /// Id generator associated with this provider.
    pub(crate) fn id_generator(&self) -> &dyn IdGenerator {
        self.inner.id_generator.as_ref()
    }

    /// Create a tracer identified by an instrumentation scope with the given
    /// name.
    pub fn tracer(&self, name: impl Into<Cow<'static, str>>) -> Tracer {
        let scope = InstrumentationScope::new(name);
        self.tracer_with_scope(scope)
    }

    /// Create a tracer with the given instrumentation scope.
    pub fn tracer_with_scope(&self, scope: InstrumentationScope) -> Tracer {
        if scope.name().is_empty() {
            tracing::warn!("tracer created with empty name");
        }
        Tracer::new(scope, self.clone())
    }

    /// Force flush all remaining spans in span processors.
    ///
    /// Processors are flushed in registration order; a failure does not stop
    /// the cascade, and the first error is returned once every processor has
    /// been asked.
    pub fn force_flush(&self) -> TraceResult<()> {
        let mut errs = vec![];
        for processor in self.span_processors() {
            if let Err(err) = processor.force_flush() {
                errs.push(err);
            }
        }
        match errs.into_iter().next() {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }

    /// Shut down this provider and its span processors.
    ///
    /// The first call wins: it cascades `shutdown` to every processor in
    /// registration order and reports the first processor error, if any.
    /// Subsequent calls (from this handle or any clone) fail with
    /// [`TraceError::AlreadyShutdown`] without touching the processors again.
    pub fn shutdown(&self) -> TraceResult<()> {
        if self
            .inner
            .is_shutdown
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            let errs = self.inner.shutdown();
            match errs.into_iter().next() {
                None => Ok(()),
                Some(err) => Err(err),
            }
        } else {
            Err(TraceError::AlreadyShutdown)
        }
    }
}

/// Builder for [`TracerProvider`].
#[derive(Debug, Default)]
pub struct TracerProviderBuilder {
    processors: Vec<Box<dyn SpanProcessor>>,
    id_generator: Option<Box<dyn IdGenerator>>,
}

impl TracerProviderBuilder {
    /// Add a [`SpanProcessor`] to the pipeline. Processors are notified in
    /// the order they were added.
    pub fn with_span_processor<T: SpanProcessor + 'static>(mut self, processor: T) -> Self {
        self.processors.push(Box::new(processor));
        self
    }

    /// Replace the default [`RandomIdGenerator`].
    pub fn with_id_generator<T: IdGenerator + 'static>(mut self, id_generator: T) -> Self {
        self.id_generator = Some(Box::new(id_generator));
        self
    }

    /// Create a new provider from this configuration.
    pub fn build(self) -> TracerProvider {
        let id_generator = self
            .id_generator
            .unwrap_or_else(|| Box::<RandomIdGenerator>::default());

        TracerProvider {
            inner: Arc::new(TracerProviderInner {
                processors: self.processors,
                id_generator,
                is_shutdown: AtomicBool::new(false),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{IncrementIdGenerator, SpanData, SpanId, TraceId};
    use crate::Context;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug, Default)]
    struct CountingProcessor {
        flushes: AtomicUsize,
        shutdowns: AtomicUsize,
        fail_flush: bool,
    }

    impl SpanProcessor for Arc<CountingProcessor> {
        fn on_start(&self, _span: &crate::trace::Span, _parent_cx: &Context) {}

        fn on_end(&self, _span: SpanData) {}

        fn force_flush(&self) -> TraceResult<()> {
            self.flushes.fetch_add(1, Ordering::SeqCst);
            if self.fail_flush {
                Err(TraceError::from("flush failed"))
            } else {
                Ok(())
            }
        }

        fn shutdown(&self) -> TraceResult<()> {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn custom_id_generator_is_used() {
        let provider = TracerProvider::builder()
            .with_id_generator(IncrementIdGenerator::new())
            .build();
        let tracer = provider.tracer("provider-tests");

        let span = tracer.start_with_context("first", &Context::new());
        assert_eq!(span.span_context().trace_id(), TraceId::from(2u128));
        assert_eq!(span.span_context().span_id(), SpanId::from(1u64));
    }

    #[test]
    fn force_flush_reaches_every_processor_despite_errors() {
        let failing = Arc::new(CountingProcessor {
            fail_flush: true,
            ..Default::default()
        });
        let ok = Arc::new(CountingProcessor::default());
        let provider = TracerProvider::builder()
            .with_span_processor(failing.clone())
            .with_span_processor(ok.clone())
            .build();

        assert!(provider.force_flush().is_err());
        assert_eq!(failing.flushes.load(Ordering::SeqCst), 1);
        assert_eq!(ok.flushes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn shutdown_cascades_exactly_once() {
        let processor = Arc::new(CountingProcessor::default());
        let provider = TracerProvider::builder()
            .with_span_processor(processor.clone())
            .build();
        let clone = provider.clone();

        assert!(provider.shutdown().is_ok());
        assert!(matches!(
            clone.shutdown(),
            Err(TraceError::AlreadyShutdown)
        ));
        assert!(matches!(
            provider.shutdown(),
            Err(TraceError::AlreadyShutdown)
        ));

        drop(provider);
        drop(clone);
        assert_eq!(processor.shutdowns.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_of_last_handle_shuts_processors_down() {
        let processor = Arc::new(CountingProcessor::default());
        let provider = TracerProvider::builder()
            .with_span_processor(processor.clone())
            .build();

        let tracer = provider.tracer("provider-tests");
        drop(provider);
        // the tracer still holds the pipeline alive
        assert_eq!(processor.shutdowns.load(Ordering::SeqCst), 0);

        drop(tracer);
        assert_eq!(processor.shutdowns.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn spans_can_still_be_created_after_shutdown() {
        let provider = TracerProvider::builder().build();
        let tracer = provider.tracer("provider-tests");
        let _ = provider.shutdown();

        let span = tracer.start_with_context("late", &Context::new());
        assert!(span.span_context().is_valid());
        span.end();
    }
}
