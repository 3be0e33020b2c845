//! Additional functionality for integration with [lambda_runtime] and [lambda_http]
//!
//! *this module requires the `lambda` feature flag*
//!
//! # Simple Example
//! ```ignore
//!
//! use lambda_embedded_metrics::MetricUnit;
//! use lambda_runtime::{Error, LambdaEvent};
//! // This replaces lambda_runtime::run and lambda_runtime::service_fn
//! use lambda_embedded_metrics::lambda::handler::run;
//! use serde::{Deserialize, Serialize};
//! use std::sync::Arc;
//!
//! #[derive(Deserialize)]
//! struct Request {}
//!
//! #[derive(Serialize)]
//! struct Response {}
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     tracing_subscriber::fmt()
//!         .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
//!         .with_target(false)
//!         .without_time()
//!         .compact()
//!         .init();
//!
//!     let metrics = Arc::new(
//!         lambda_embedded_metrics::Builder::from_env()
//!             .namespace("MetricsExample")
//!             .with_dimension("Function", std::env::var("AWS_LAMBDA_FUNCTION_NAME").unwrap())
//!             .lambda_cold_start_metric("ColdStart")
//!             .with_lambda_request_id("RequestId")
//!             .build()?,
//!     );
//!
//!     let handler_metrics = metrics.clone();
//!     run(metrics, move |_event: LambdaEvent<Request>| {
//!         let metrics = handler_metrics.clone();
//!         async move {
//!             metrics.add_metric("requests", MetricUnit::Count, 1)?;
//!             Ok(Response {})
//!         }
//!     })
//!     .await
//! }
//! ```
//!
//! # Output
//!
//! ```plaintext
//! START RequestId: 4bd2d365-3792-46c8-9b6c-6132f9630fbb Version: $LATEST
//! {"_aws":{"Timestamp":1687947426188,"CloudWatchMetrics":[{"Namespace":"MetricsExample","Dimensions":[["Function"]],"Metrics":[{"Name":"ColdStart","Unit":"Count"}]}]},"ColdStart":1.0,"Function":"MetricsTest","RequestId":"4bd2d365-3792-46c8-9b6c-6132f9630fbb"}
//! {"_aws":{"Timestamp":1687947426190,"CloudWatchMetrics":[{"Namespace":"MetricsExample","Dimensions":[["Function"]],"Metrics":[{"Name":"requests","Unit":"Count"}]}]},"requests":1.0,"Function":"MetricsTest","RequestId":"4bd2d365-3792-46c8-9b6c-6132f9630fbb"}
//! END RequestId: 4bd2d365-3792-46c8-9b6c-6132f9630fbb`
//! ```
//! # Advanced Usage
//!
//! If you're building a more sophisticated [tower] stack, use [MetricsService] instead
//!

use super::{collector::Collector, MetricUnit};
use lambda_runtime::LambdaEvent;
use pin_project::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::error;

/// [tower::Service] for automatically [flushing](super::Collector::flush()) after each request and enabling
/// `lambda` features in [Builder](super::Builder)
///
/// For composing your own [tower] stacks to input into the Rust Lambda Runtime
pub struct MetricsService<S> {
    metrics: Arc<Collector>,
    /// Cleared after the first request handled by this service
    cold_start: bool,
    inner: S,
}

impl<S> MetricsService<S> {
    /// Constructs a new [MetricsService] with the given [Collector] and inner [`tower::Service<LambdaEvent<Request>>`]
    /// to wrap
    pub fn new<Request>(metrics: Arc<Collector>, inner: S) -> MetricsService<S>
    where
        S: tower::Service<LambdaEvent<Request>>,
    {
        Self {
            metrics,
            cold_start: true,
            inner,
        }
    }
}

impl<S, Request> tower::Service<LambdaEvent<Request>> for MetricsService<S>
where
    S: tower::Service<LambdaEvent<Request>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = MetricsServiceFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: LambdaEvent<Request>) -> Self::Future {
        if let Some(prop_name) = self.metrics.config.lambda_request_id {
            if let Err(e) = self.metrics.set_property(prop_name, req.context.request_id.clone()) {
                error!("Failed to set request id property: {e}");
            }
        }
        if let Some(prop_name) = self.metrics.config.lambda_xray_trace_id {
            if let Err(e) = self.metrics.set_property(prop_name, req.context.xray_trace_id.clone()) {
                error!("Failed to set X-Ray trace id property: {e}");
            }
        }

        if std::mem::take(&mut self.cold_start) {
            if let Some(metric_name) = self.metrics.config.lambda_cold_start {
                if let Err(e) = self.metrics.write_single(metric_name, MetricUnit::Count, 1) {
                    error!("Failed to emit cold start metric: {e}");
                }
            }
        }

        // Wrap the inner Future so we can flush after it's done
        MetricsServiceFuture {
            metrics: self.metrics.clone(),
            inner: self.inner.call(req),
        }
    }
}

#[pin_project]
#[doc(hidden)]
pub struct MetricsServiceFuture<F> {
    metrics: Arc<Collector>,
    #[pin]
    inner: F,
}

impl<F, Response, Error> Future for MetricsServiceFuture<F>
where
    F: Future<Output = Result<Response, Error>>,
{
    type Output = Result<Response, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        if let Poll::Ready(result) = this.inner.poll(cx) {
            // Flush our metrics after the inner service is finished
            if let Err(e) = this.metrics.flush() {
                error!("Failed to flush metrics: {e}");
            }

            return Poll::Ready(result);
        }

        Poll::Pending
    }
}

/// Helpers for starting the Lambda Rust runtime with a [tower::Service] wrapped by a [MetricsService]
///
/// Reduces the amount of ceremony needed in `main()` for simple use cases
///
pub mod service {

    use super::*;

    /// Start the Lambda Rust runtime with a given [`tower::Service<LambdaEvent<Request>>`]
    /// which is then wrapped by new [MetricsService] with a given [Collector]
    pub async fn run<S, Request, Response>(metrics: Arc<Collector>, inner: S) -> Result<(), lambda_runtime::Error>
    where
        S: tower::Service<LambdaEvent<Request>, Response = Response>,
        S::Future: std::future::Future<Output = Result<Response, S::Error>>,
        S::Error: Into<lambda_runtime::Diagnostic> + std::fmt::Debug + std::fmt::Display,
        Request: for<'de> serde::Deserialize<'de>,
        Response: serde::Serialize,
    {
        lambda_runtime::run(MetricsService::new::<Request>(metrics, inner)).await
    }

    /// Start the Lambda Rust runtime with a given [tower::Service<lambda_http::Request>]
    /// which is then wrapped by new [MetricsService] with a given [Collector]
    pub async fn run_http<'a, R, S, E>(metrics: Arc<Collector>, inner: S) -> Result<(), lambda_runtime::Error>
    where
        S: tower::Service<lambda_http::Request, Response = R, Error = E>,
        S::Future: Send + 'a,
        S::Error: std::fmt::Debug + std::fmt::Display,
        R: lambda_http::IntoResponse,
        E: Into<lambda_runtime::Diagnostic> + std::fmt::Debug + std::fmt::Display,
    {
        run(metrics, lambda_http::Adapter::from(inner)).await
    }
}

/// Helpers for starting the Lambda Rust runtime with a handler function wrapped by the [MetricsService]
///
/// Reduces the amount of ceremony needed in `main()` for simple use cases
///
pub mod handler {

    use super::*;

    /// Start the Lambda Rust runtime with a given [LambdaEvent] handler function
    /// which is then wrapped by a new [MetricsService] with a given [Collector]
    pub async fn run<T, F, Request, Response>(metrics: Arc<Collector>, handler: T) -> Result<(), lambda_runtime::Error>
    where
        T: FnMut(LambdaEvent<Request>) -> F,
        F: Future<Output = Result<Response, lambda_runtime::Error>>,
        Request: for<'de> serde::Deserialize<'de>,
        Response: serde::Serialize,
    {
        lambda_runtime::run(MetricsService::new::<Request>(
            metrics,
            lambda_runtime::service_fn(handler),
        ))
        .await
    }

    /// Start the Lambda Rust runtime with a given [lambda_http::Request] handler function
    /// which is then wrapped by a new [MetricsService] with a given [Collector]
    pub async fn run_http<'a, T, F, Response>(metrics: Arc<Collector>, handler: T) -> Result<(), lambda_runtime::Error>
    where
        T: FnMut(lambda_http::Request) -> F,
        F: Future<Output = Result<Response, lambda_runtime::Error>> + Send + 'a,
        Response: lambda_http::IntoResponse,
    {
        super::service::run(metrics, lambda_http::Adapter::from(lambda_http::service_fn(handler))).await
    }
}
