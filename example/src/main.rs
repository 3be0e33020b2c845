use lambda_embedded_metrics::{capture_handler, InvocationContext, MetricUnit, TracingTracer};
use lambda_runtime::{Error, LambdaEvent};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

#[derive(Deserialize)]
struct Request {
    booking_id: String,
}

#[derive(Serialize)]
struct Response {
    req_id: String,
    booking_id: String,
}

fn confirm_booking(
    metrics: &lambda_embedded_metrics::Collector,
    event: LambdaEvent<Request>,
) -> Result<Response, Error> {
    metrics.add_metric("BookingConfirmation", MetricUnit::Count, 1)?;

    Ok(Response {
        req_id: event.context.request_id,
        booking_id: event.payload.booking_id,
    })
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
        .with_target(false)
        .without_time()
        .compact()
        .init();

    let metrics = Arc::new(
        lambda_embedded_metrics::Builder::from_env()
            .namespace("MetricsTest")
            .with_dimension("Function", std::env::var("AWS_LAMBDA_FUNCTION_NAME")?)
            .lambda_cold_start_metric("ColdStart")
            .with_lambda_request_id("RequestId")
            .build()?,
    );

    let tracer = Arc::new(TracingTracer::new("booking"));
    // The first invocation of this process is the cold start
    let context = Arc::new(Mutex::new(InvocationContext::new(true)));

    let handler_metrics = metrics.clone();
    lambda_embedded_metrics::lambda::handler::run(metrics, move |event: LambdaEvent<Request>| {
        let (metrics, tracer, context) = (handler_metrics.clone(), tracer.clone(), context.clone());
        async move {
            let mut context = context.lock().unwrap();
            capture_handler(tracer.as_ref(), &mut context, "confirm_booking", || {
                confirm_booking(&metrics, event)
            })
        }
    })
    .await
}
