//! # Tracer
//!
//! Boundary to a distributed tracing client plus a [Tracer] backed by the `tracing` crate.
//!
//! The metrics collector never calls into a tracer, the two share no state. Handlers are
//! wrapped explicitly with [capture_handler], other functions with [capture_method] or
//! [capture_method_async]. Whether the current invocation is a cold start is owned by the
//! caller through [InvocationContext].

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Mutex;
use tracing::{debug, error, info, info_span};

/// Capabilities instrumented code may use
pub trait Tracer {
    type Span;

    /// Open a span with the given name
    fn begin_span(&self, name: &str) -> Self::Span;

    fn end_span(&self, span: Self::Span);

    /// Add an indexed key/value to the current span
    fn annotate(&self, key: &str, value: Value);

    /// Add a non-indexed key/value under a namespace, the service name when `None`
    fn add_metadata(&self, key: &str, value: Value, namespace: Option<&str>);

    /// Instrument the given libraries for automatic span creation
    fn patch(&self, modules: &[&str]);
}

/// [Tracer] emitting spans and events through `tracing`
///
/// A disabled tracer turns every call into a no-op, which is what local runs and tests want.
pub struct TracingTracer {
    service: String,
    disabled: bool,
    patched: Mutex<Vec<String>>,
}

impl TracingTracer {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            disabled: false,
            patched: Mutex::new(Vec::new()),
        }
    }

    pub fn disabled(self, disabled: bool) -> Self {
        Self { disabled, ..self }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Modules handed to [Tracer::patch] so far
    pub fn patched_modules(&self) -> Vec<String> {
        self.patched.lock().unwrap().clone()
    }
}

impl Tracer for TracingTracer {
    type Span = Option<tracing::span::EnteredSpan>;

    fn begin_span(&self, name: &str) -> Self::Span {
        if self.disabled {
            return None;
        }
        Some(info_span!("segment", segment = %name, service = %self.service).entered())
    }

    fn end_span(&self, span: Self::Span) {
        drop(span);
    }

    fn annotate(&self, key: &str, value: Value) {
        if self.disabled {
            debug!("Tracing has been disabled, aborting annotate");
            return;
        }
        info!(annotation.key = key, annotation.value = %value, "annotation");
    }

    fn add_metadata(&self, key: &str, value: Value, namespace: Option<&str>) {
        if self.disabled {
            debug!("Tracing has been disabled, aborting add_metadata");
            return;
        }
        let namespace = namespace.unwrap_or(&self.service);
        info!(metadata.namespace = namespace, metadata.key = key, metadata.value = %value, "metadata");
    }

    fn patch(&self, modules: &[&str]) {
        if self.disabled {
            debug!("Tracing has been disabled, aborting patch");
            return;
        }
        debug!("Patching modules {modules:?}");
        let mut patched = self.patched.lock().unwrap();
        for module in modules {
            if !patched.iter().any(|m| m == module) {
                patched.push(module.to_string());
            }
        }
    }
}

/// Per invocation state threaded through handler middleware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvocationContext {
    /// Set by the entry point for the first invocation of the process
    pub cold_start: bool,
}

impl InvocationContext {
    pub fn new(cold_start: bool) -> Self {
        Self { cold_start }
    }
}

/// Run a handler inside a `## name` span
///
/// The first cold start invocation is annotated with `ColdStart`, the flag is then cleared.
/// The response, or the error, is attached as metadata.
pub fn capture_handler<T, F, R, E>(tracer: &T, context: &mut InvocationContext, name: &str, handler: F) -> Result<R, E>
where
    T: Tracer,
    F: FnOnce() -> Result<R, E>,
    R: Serialize,
    E: fmt::Display,
{
    let span = tracer.begin_span(&format!("## {name}"));

    if context.cold_start {
        debug!("Annotating cold start");
        tracer.annotate("ColdStart", Value::Bool(true));
        context.cold_start = false;
    }

    let result = handler();
    record_result(tracer, name, &result);
    tracer.end_span(span);
    result
}

/// Run a function inside a `## name` span, recording its response or error as metadata
pub fn capture_method<T, F, R, E>(tracer: &T, name: &str, method: F) -> Result<R, E>
where
    T: Tracer,
    F: FnOnce() -> Result<R, E>,
    R: Serialize,
    E: fmt::Display,
{
    let span = tracer.begin_span(&format!("## {name}"));
    let result = method();
    record_result(tracer, name, &result);
    tracer.end_span(span);
    result
}

/// Await a future inside a `## name` span, recording its output like [capture_method]
///
/// The span stays open until the future resolves. A [TracingTracer] span is entered on the
/// thread that started it, so the returned future is not `Send` with that tracer.
pub async fn capture_method_async<T, Fut, R, E>(tracer: &T, name: &str, method: Fut) -> Result<R, E>
where
    T: Tracer,
    Fut: Future<Output = Result<R, E>>,
    R: Serialize,
    E: fmt::Display,
{
    let span = tracer.begin_span(&format!("## {name}"));
    let result = method.await;
    record_result(tracer, name, &result);
    tracer.end_span(span);
    result
}

fn record_result<T, R, E>(tracer: &T, name: &str, result: &Result<R, E>)
where
    T: Tracer,
    R: Serialize,
    E: fmt::Display,
{
    match result {
        Ok(response) => match serde_json::to_value(response) {
            Ok(Value::Null) => {}
            Ok(response) => tracer.add_metadata(&format!("{name} response"), response, None),
            Err(e) => debug!("Unable to record {name} response: {e}"),
        },
        Err(e) => {
            error!("Exception received from {name}: {e}");
            tracer.add_metadata(&format!("{name} error"), Value::String(e.to_string()), None);
        }
    }
}
