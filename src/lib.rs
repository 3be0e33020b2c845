pub use {
    builder::{Builder, NAMESPACE_ENV},
    collector::{Collector, Config, MAX_METRICS},
    error::Error,
    schema::{Schema, SchemaViolation},
    tracer::{capture_handler, capture_method, capture_method_async, InvocationContext, Tracer, TracingTracer},
    unit::{normalize, MetricUnit, UnitInput},
};

mod builder;
mod collector;
pub mod emf;
mod error;
#[cfg(feature = "lambda")]
pub mod lambda;
pub mod schema;
pub mod tracer;
mod unit;
