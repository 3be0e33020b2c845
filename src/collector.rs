//! # Collector
//!
//! Metrics buffer + emitter returned from lambda_embedded_metrics::Builder

use super::emf::{self, Metric};
use super::unit::{self, MetricUnit, UnitInput};
use super::Error;
use indexmap::IndexMap;
use serde_json::value::Value;
use std::io::Write;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, error};

/// The Embedded Metric Format supports a maximum of 100 metrics per document
pub const MAX_METRICS: usize = 100;

/// Configuration via Builder
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub namespace: Option<String>,
    pub default_dimensions: Vec<(String, String)>,
    pub timestamp: Option<u64>,
    #[cfg(feature = "lambda")]
    pub lambda_cold_start: Option<&'static str>,
    #[cfg(feature = "lambda")]
    pub lambda_request_id: Option<&'static str>,
    #[cfg(feature = "lambda")]
    pub lambda_xray_trace_id: Option<&'static str>,
}

/// Collector state used to buffer metrics and flush
/// This lives within a mutex
struct CollectorState {
    namespace: Option<String>,
    /// Dimensions shared by every metric in the buffer
    dimensions: IndexMap<String, String>,
    metrics: IndexMap<String, Metric>,
    /// Properties to be written with metrics
    properties: IndexMap<String, Value>,
    writer: Box<dyn Write + Send>,
}

impl CollectorState {
    fn snapshot<'a>(&'a self, timestamp: u64, metrics: &'a IndexMap<String, Metric>) -> emf::Snapshot<'a> {
        emf::Snapshot {
            timestamp,
            namespace: self.namespace.as_deref(),
            dimensions: &self.dimensions,
            metrics,
            properties: &self.properties,
        }
    }

    /// A metric name must fit the schema and may not be used by a dimension or property
    fn check_metric_name(&self, name: &str) -> Result<(), Error> {
        let index = self.metrics.get_index_of(name).unwrap_or(self.metrics.len());
        emf::check_name(name, emf::MAX_NAME_LENGTH, || {
            format!("$._aws.CloudWatchMetrics[0].Metrics[{index}].Name")
        })?;
        if self.dimensions.contains_key(name) || self.properties.contains_key(name) {
            return Err(emf::duplicate_member(name));
        }
        Ok(())
    }

    fn check_dimension_name(&self, name: &str) -> Result<(), Error> {
        let existing = self.dimensions.get_index_of(name);
        let index = existing.unwrap_or(self.dimensions.len());
        emf::check_name(name, emf::MAX_DIMENSION_NAME_LENGTH, || {
            format!("$._aws.CloudWatchMetrics[0].Dimensions[0][{index}]")
        })?;
        if existing.is_none() && self.dimensions.len() >= emf::MAX_DIMENSIONS {
            return Err(Error::SchemaValidation {
                rule: "maxItems".to_owned(),
                path: "$._aws.CloudWatchMetrics[0].Dimensions[0]".to_owned(),
                message: format!("a document holds at most {} dimensions", emf::MAX_DIMENSIONS),
            });
        }
        if self.metrics.contains_key(name) || self.properties.contains_key(name) {
            return Err(emf::duplicate_member(name));
        }
        Ok(())
    }

    fn check_property_name(&self, name: &str) -> Result<(), Error> {
        if name == emf::METADATA_KEY || self.metrics.contains_key(name) || self.dimensions.contains_key(name) {
            return Err(emf::duplicate_member(name));
        }
        Ok(())
    }

    /// Write a document as a single line, failures are logged and otherwise ignored
    fn emit(&mut self, document: &Value) {
        if let Err(e) = write_line(&mut self.writer, document) {
            error!("Failed to emit metrics document: {e}");
        }
    }
}

fn write_line(writer: &mut impl Write, document: &Value) -> std::io::Result<()> {
    serde_json::to_writer(&mut *writer, document)?;
    writeln!(writer)?;
    writer.flush()
}

/// Metric values must be finite numbers, serde_json already maps NaN and infinities to null
fn numeric(value: Value) -> Result<f64, Error> {
    match value.as_f64() {
        Some(number) => Ok(number),
        None => Err(Error::InvalidMetricValue(value)),
    }
}

/// Embedded CloudWatch Metrics Collector + Emitter
///
/// Use [Builder](super::Builder) to construct. All state sits behind a single mutex so a
/// collector can be shared with an `Arc` between tasks.
///
/// # Example
/// ```
/// use lambda_embedded_metrics::MetricUnit;
///
/// let metrics = lambda_embedded_metrics::Builder::new()
///     .namespace("MyApplication")
///     .with_writer(std::io::sink())
///     .build()
///     .unwrap();
///
/// metrics.add_dimension("Method", "Default").unwrap();
/// metrics.add_metric("requests", MetricUnit::Count, 1).unwrap();
///
/// metrics
///     .set_property("RequestId", "ABC123")
///     .and_then(|metrics| metrics.flush())
///     .unwrap();
/// ```
pub struct Collector {
    state: Mutex<CollectorState>,
    pub config: Config,
}

fn check_namespace(namespace: &str) -> Result<(), Error> {
    emf::check_name(namespace, emf::MAX_NAME_LENGTH, || {
        "$._aws.CloudWatchMetrics[0].Namespace".to_owned()
    })
}

impl Collector {
    /// Fails when the configured namespace or default dimensions could never be serialized
    pub fn new(config: Config, writer: Box<dyn Write + Send>) -> Result<Self, Error> {
        if let Some(namespace) = &config.namespace {
            check_namespace(namespace)?;
        }

        let mut state = CollectorState {
            namespace: config.namespace.clone(),
            dimensions: IndexMap::new(),
            metrics: IndexMap::with_capacity(MAX_METRICS),
            properties: IndexMap::new(),
            writer,
        };
        for (name, value) in &config.default_dimensions {
            state.check_dimension_name(name)?;
            state.dimensions.insert(name.clone(), value.clone());
        }

        Ok(Self {
            state: Mutex::new(state),
            config,
        })
    }

    /// Set the namespace of every document, fails if one was already set
    pub fn add_namespace(&self, name: impl Into<String>) -> Result<(), Error> {
        let name = name.into();
        check_namespace(&name)?;
        let mut state = self.state.lock().unwrap();

        if let Some(existing) = &state.namespace {
            return Err(Error::DuplicateNamespace {
                existing: existing.clone(),
            });
        }

        debug!("Adding metrics namespace: {name}");
        state.namespace = Some(name);
        Ok(())
    }

    /// Add a dimension to all metrics
    /// * Dimensions persist accross flush calls
    /// * Setting a dimension with same name multiple times will overwrite the previous value
    /// * Names must be 1 to 250 characters, at most 30 distinct dimensions are kept and a
    ///   name cannot be shared with a metric or property
    pub fn add_dimension(&self, name: impl Into<String>, value: impl Into<String>) -> Result<&Self, Error> {
        let (name, value) = (name.into(), value.into());
        debug!("Adding dimension: {name}:{value}");
        {
            let mut state = self.state.lock().unwrap();
            state.check_dimension_name(&name)?;
            state.dimensions.insert(name, value);
        }
        Ok(self)
    }

    /// Removes a dimension from all following documents
    pub fn remove_dimension(&self, name: &str) -> &Self {
        {
            let mut state = self.state.lock().unwrap();
            state.dimensions.shift_remove(name);
        }
        self
    }

    /// Add a metric to the buffer
    ///
    /// Adding a name twice replaces the earlier value. Once the buffer holds [MAX_METRICS]
    /// metrics it is serialized, written and cleared, in which case `Ok(true)` is returned.
    /// Dimensions, properties and the namespace survive that flush.
    ///
    /// Names must be 1 to 255 characters and cannot be shared with a dimension or property,
    /// a rejected metric is not buffered.
    pub fn add_metric<'u>(
        &self,
        name: impl Into<String>,
        unit: impl Into<UnitInput<'u>>,
        value: impl Into<Value>,
    ) -> Result<bool, Error> {
        let value = numeric(value.into())?;
        let unit = unit::normalize(unit)?;
        let name = name.into();

        debug!("Adding metric: {name} with {value} {unit}");
        let mut state = self.state.lock().unwrap();
        state.check_metric_name(&name)?;
        let mut flushed = false;

        // Only reachable after a failed flush at the ceiling, retry before growing past it
        if state.metrics.len() >= MAX_METRICS && !state.metrics.contains_key(&name) {
            self.flush_locked(&mut state)?;
            flushed = true;
        }

        state.metrics.insert(name, Metric { unit, value });

        if state.metrics.len() >= MAX_METRICS {
            debug!("Reached maximum of {MAX_METRICS} metrics - Publishing existing metric set");
            self.flush_locked(&mut state)?;
            flushed = true;
        }

        Ok(flushed)
    }

    /// Set a property to emit with the metrics
    /// * Properites persist accross flush calls
    /// * Setting a property with same name multiple times will overwrite the previous value
    /// * A name cannot be shared with a metric or dimension
    pub fn set_property(&self, name: impl Into<String>, value: impl Into<Value>) -> Result<&Self, Error> {
        let name = name.into();
        {
            let mut state = self.state.lock().unwrap();
            state.check_property_name(&name)?;
            state.properties.insert(name, value.into());
        }
        Ok(self)
    }

    /// Removes a property to emit with the metrics
    pub fn remove_property(&self, name: &str) -> &Self {
        {
            let mut state = self.state.lock().unwrap();
            state.properties.shift_remove(name);
        }
        self
    }

    /// Drops every buffered metric without writing it
    pub fn clear_metrics(&self) -> &Self {
        {
            let mut state = self.state.lock().unwrap();
            debug!("Discarding {} buffered metrics", state.metrics.len());
            state.metrics.clear();
        }
        self
    }

    /// Compute the timestamp unless it was set via [Builder::with_timestamp](super::Builder::with_timestamp)
    fn timestamp(&self) -> u64 {
        match self.config.timestamp {
            Some(t) => t,
            None => SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or_default(),
        }
    }

    /// Serialize the buffered metrics without emitting or clearing them
    pub fn serialize(&self) -> Result<Value, Error> {
        let state = self.state.lock().unwrap();
        emf::serialize(&state.snapshot(self.timestamp(), &state.metrics))
    }

    /// Serialize and write the buffered metrics, then clear them
    ///
    /// Nothing is written when the buffer is empty. The buffer is only cleared once the
    /// document passed validation.
    pub fn flush(&self) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();

        if state.metrics.is_empty() {
            debug!("No buffered metrics to flush");
            return Ok(());
        }

        self.flush_locked(&mut state)
    }

    fn flush_locked(&self, state: &mut CollectorState) -> Result<(), Error> {
        let document = emf::serialize(&state.snapshot(self.timestamp(), &state.metrics))?;
        state.emit(&document);

        // Clear metrics only, dimensions and properties apply to the next batch too
        state.metrics.clear();
        Ok(())
    }

    /// Write a document holding a single metric, avoids touching the metric buffer
    ///
    /// The current namespace, dimensions and properties are included.
    pub fn write_single<'u>(
        &self,
        name: impl Into<String>,
        unit: impl Into<UnitInput<'u>>,
        value: impl Into<Value>,
    ) -> Result<(), Error> {
        let value = numeric(value.into())?;
        let unit = unit::normalize(unit)?;

        let mut single = IndexMap::with_capacity(1);
        single.insert(name.into(), Metric { unit, value });

        let mut state = self.state.lock().unwrap();
        let document = emf::serialize(&state.snapshot(self.timestamp(), &single))?;
        state.emit(&document);
        Ok(())
    }

    /// Current namespace, if any
    pub fn namespace(&self) -> Option<String> {
        self.state.lock().unwrap().namespace.clone()
    }

    /// Number of metrics waiting for the next flush
    pub fn metric_count(&self) -> usize {
        self.state.lock().unwrap().metrics.len()
    }

    /// Buffered value and unit of a metric
    pub fn metric(&self, name: &str) -> Option<(MetricUnit, f64)> {
        let state = self.state.lock().unwrap();
        state.metrics.get(name).map(|m| (m.unit, m.value))
    }

    /// Current dimensions in the order they were first added
    pub fn dimensions(&self) -> Vec<(String, String)> {
        let state = self.state.lock().unwrap();
        state
            .dimensions
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}
