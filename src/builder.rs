use super::{collector, Error};
use std::io::Write;

/// Environment variable holding the default namespace, read by [Builder::from_env]
pub const NAMESPACE_ENV: &str = "POWERTOOLS_METRICS_NAMESPACE";

/// Builder for the Embedded Cloudwatch Metrics Collector
///
/// # Example
/// ```
///  let metrics = lambda_embedded_metrics::Builder::new()
///      .namespace("MyApplication")
///      .build()
///      .unwrap();
/// ```
pub struct Builder {
    namespace: Option<String>,
    env_namespace: Option<String>,
    default_dimensions: Vec<(String, String)>,
    timestamp: Option<u64>,
    writer: Option<Box<dyn Write + Send>>,
    #[cfg(feature = "lambda")]
    lambda_cold_start: Option<&'static str>,
    #[cfg(feature = "lambda")]
    lambda_request_id: Option<&'static str>,
    #[cfg(feature = "lambda")]
    lambda_xray_trace_id: Option<&'static str>,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    pub fn new() -> Self {
        Builder {
            namespace: None,
            env_namespace: None,
            default_dimensions: Default::default(),
            timestamp: None,
            writer: None,
            #[cfg(feature = "lambda")]
            lambda_cold_start: None,
            #[cfg(feature = "lambda")]
            lambda_request_id: None,
            #[cfg(feature = "lambda")]
            lambda_xray_trace_id: None,
        }
    }

    /// Starts a builder with the default namespace taken from `POWERTOOLS_METRICS_NAMESPACE`
    /// * An explicit [Builder::namespace] takes precedence
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            // An empty variable counts as unset
            env_namespace: lookup(NAMESPACE_ENV).filter(|namespace| !namespace.is_empty()),
            ..Self::new()
        }
    }

    /// Sets the CloudWatch namespace for all metrics
    /// * When neither this nor the environment provides one, [Collector::add_namespace](super::Collector::add_namespace)
    ///   must be called before the first flush
    pub fn namespace(self, namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            ..self
        }
    }

    /// Adds a dimension (name, value), that will be sent with each document.
    /// * This method can be called multiple times with distinct names
    /// * Documents can have no more than 30 dimensions
    pub fn with_dimension(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_dimensions.push((name.into(), value.into()));
        self
    }

    /// Uses a fixed timestamp for every document instead of the system clock
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Writes documents to the given writer instead of stdout
    pub fn with_writer(mut self, writer: impl Write + Send + 'static) -> Self {
        self.writer = Some(Box::new(writer));
        self
    }

    /// Emits a cold start metric with the given name once to mark a cold start
    #[cfg(feature = "lambda")]
    pub fn lambda_cold_start_metric(mut self, name: &'static str) -> Self {
        self.lambda_cold_start = Some(name);
        self
    }

    /// Decorates every metric with request_id from the lambda request context as a property
    /// with the given name
    ///
    #[cfg(feature = "lambda")]
    pub fn with_lambda_request_id(mut self, name: &'static str) -> Self {
        self.lambda_request_id = Some(name);
        self
    }

    /// Decorates every metric with lambda_xray_trace_id from the lambda request context as a property
    /// with the given name
    ///
    #[cfg(feature = "lambda")]
    pub fn with_lambda_xray_trace_id(mut self, name: &'static str) -> Self {
        self.lambda_xray_trace_id = Some(name);
        self
    }

    /// Private helper for consuming the builder into collector configuration
    fn config(&mut self) -> Result<collector::Config, Error> {
        let namespace = match self.namespace.take() {
            Some(namespace) if namespace.is_empty() => {
                return Err(Error::Config("namespace must not be empty".into()));
            }
            Some(namespace) => Some(namespace),
            None => self.env_namespace.take(),
        };

        Ok(collector::Config {
            namespace,
            default_dimensions: std::mem::take(&mut self.default_dimensions),
            timestamp: self.timestamp,
            #[cfg(feature = "lambda")]
            lambda_cold_start: self.lambda_cold_start,
            #[cfg(feature = "lambda")]
            lambda_request_id: self.lambda_request_id,
            #[cfg(feature = "lambda")]
            lambda_xray_trace_id: self.lambda_xray_trace_id,
        })
    }

    /// Build the metrics collector
    ///
    /// Share the result with an `Arc` to reuse one collector across handlers.
    pub fn build(mut self) -> Result<collector::Collector, Error> {
        let config = self.config()?;
        let writer = self
            .writer
            .take()
            .unwrap_or_else(|| Box::new(std::io::stdout()));
        collector::Collector::new(config, writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusty_fork::rusty_fork_test;

    fn lookup(namespace: &'static str) -> impl Fn(&str) -> Option<String> {
        move |key: &str| (key == NAMESPACE_ENV).then(|| namespace.to_string())
    }

    #[test]
    fn namespace_from_environment() {
        let metrics = Builder::from_lookup(lookup("FromEnv")).build().unwrap();
        assert_eq!(metrics.namespace().as_deref(), Some("FromEnv"));
    }

    #[test]
    fn explicit_namespace_wins() {
        let metrics = Builder::from_lookup(lookup("FromEnv"))
            .namespace("Explicit")
            .build()
            .unwrap();
        assert_eq!(metrics.namespace().as_deref(), Some("Explicit"));
    }

    #[test]
    fn empty_environment_namespace_is_unset() {
        let metrics = Builder::from_lookup(lookup("")).build().unwrap();
        assert_eq!(metrics.namespace(), None);
        metrics.add_namespace("Later").unwrap();
    }

    #[test]
    fn empty_explicit_namespace_is_rejected() {
        assert!(matches!(Builder::new().namespace("").build(), Err(Error::Config(_))));
    }

    #[test]
    fn default_dimensions_are_buffered() {
        let metrics = Builder::new()
            .with_dimension("Address", "10.172.207.225")
            .with_dimension("Port", "7779")
            .build()
            .unwrap();
        assert_eq!(
            metrics.dimensions(),
            vec![
                ("Address".to_string(), "10.172.207.225".to_string()),
                ("Port".to_string(), "7779".to_string())
            ]
        );
    }

    #[test]
    fn unusable_configuration_is_rejected() {
        let too_long = "n".repeat(256);
        assert!(matches!(
            Builder::new().namespace(too_long).build(),
            Err(Error::SchemaValidation { rule, .. }) if rule == "maxLength"
        ));
        assert!(matches!(
            Builder::new().with_dimension("_aws", "x").build(),
            Err(Error::SchemaValidation { rule, .. }) if rule == "disjointKeys"
        ));

        let mut builder = Builder::new();
        for i in 0..31 {
            builder = builder.with_dimension(format!("dimension_{i}"), "x");
        }
        assert!(matches!(
            builder.build(),
            Err(Error::SchemaValidation { rule, .. }) if rule == "maxItems"
        ));
    }

    #[test]
    fn repeated_default_dimension_overwrites() {
        let metrics = Builder::new()
            .with_dimension("Port", "7779")
            .with_dimension("Port", "7780")
            .build()
            .unwrap();
        assert_eq!(metrics.dimensions(), vec![("Port".to_string(), "7780".to_string())]);
    }

    rusty_fork_test! {
        #[test]
        fn reads_process_environment() {
            std::env::set_var(NAMESPACE_ENV, "Process");
            let metrics = Builder::from_env().build().unwrap();
            assert_eq!(metrics.namespace().as_deref(), Some("Process"));
            assert!(matches!(
                metrics.add_namespace("Other"),
                Err(Error::DuplicateNamespace { existing }) if existing == "Process"
            ));
        }
    }
}
