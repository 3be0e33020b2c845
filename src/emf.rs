//! # EMF
//!
//! Helpers for serializing CloudWatch Embedded Metrics via serde_json
//!
//! <https://docs.aws.amazon.com/AmazonCloudWatch/latest/monitoring/CloudWatch_Embedded_Metric_Format_Specification.html>

use super::{schema, Error, MetricUnit};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

/// Reserved member holding the metadata of a document
pub const METADATA_KEY: &str = "_aws";

/// A buffered metric value and its unit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metric {
    pub unit: MetricUnit,
    pub value: f64,
}

#[derive(Serialize)]
pub struct EmbeddedMetricsAws<'a> {
    #[serde(rename = "Timestamp")]
    pub timestamp: u64,
    // This crate never uses more than one namespace in a metrics document
    #[serde(rename = "CloudWatchMetrics")]
    pub cloudwatch_metrics: [EmbeddedNamespace<'a>; 1],
}

#[derive(Serialize)]
pub struct EmbeddedNamespace<'a> {
    // Serialized as null when unset so schema validation reports it
    #[serde(rename = "Namespace")]
    pub namespace: Option<&'a str>,
    // This crate builds a single dimension set with all dimensions
    #[serde(rename = "Dimensions")]
    pub dimensions: [Vec<&'a str>; 1],
    #[serde(rename = "Metrics")]
    pub metrics: Vec<EmbeddedMetric<'a>>,
}

#[derive(Serialize)]
pub struct EmbeddedMetric<'a> {
    #[serde(rename = "Name")]
    pub name: &'a str,
    #[serde(rename = "Unit")]
    pub unit: &'static str,
}

/// Everything that goes into one document
pub struct Snapshot<'a> {
    pub timestamp: u64,
    pub namespace: Option<&'a str>,
    pub dimensions: &'a IndexMap<String, String>,
    pub metrics: &'a IndexMap<String, Metric>,
    pub properties: &'a IndexMap<String, Value>,
}

/// Longest namespace or metric name CloudWatch accepts
pub const MAX_NAME_LENGTH: usize = 255;

/// Longest dimension name CloudWatch accepts
pub const MAX_DIMENSION_NAME_LENGTH: usize = 250;

/// Dimensions allowed in a dimension set
pub const MAX_DIMENSIONS: usize = 30;

/// A name already taken by another flat member of the document
pub fn duplicate_member(name: &str) -> Error {
    Error::SchemaValidation {
        rule: "disjointKeys".to_owned(),
        path: format!("$.{name}"),
        message: format!("'{name}' is used by more than one metric, dimension or property"),
    }
}

/// Reject a metric, dimension or namespace name no document could carry
///
/// `path` locates the name inside the document and is only built on failure.
pub fn check_name(name: &str, max_length: usize, path: impl FnOnce() -> String) -> Result<(), Error> {
    let length = name.chars().count();
    if length == 0 {
        return Err(Error::SchemaValidation {
            rule: "minLength".to_owned(),
            path: path(),
            message: "name must not be empty".to_owned(),
        });
    }
    if length > max_length {
        return Err(Error::SchemaValidation {
            rule: "maxLength".to_owned(),
            path: path(),
            message: format!("'{name}' is longer than {max_length} characters"),
        });
    }
    if name == METADATA_KEY {
        return Err(duplicate_member(name));
    }
    Ok(())
}

/// Insert a flat member, names must be unique across metadata, metrics, dimensions and properties
fn insert_member(document: &mut Map<String, Value>, name: &str, value: Value) -> Result<(), Error> {
    if document.contains_key(name) {
        return Err(duplicate_member(name));
    }
    document.insert(name.to_owned(), value);
    Ok(())
}

/// Build and validate an embedded metric document
///
/// Members are ordered `_aws`, metric values, dimension values, then properties. Metrics and
/// dimensions keep the order they were first added in.
pub fn serialize(snapshot: &Snapshot<'_>) -> Result<Value, Error> {
    debug!(
        metrics = snapshot.metrics.len(),
        dimensions = snapshot.dimensions.len(),
        "Serializing metric set"
    );

    let aws = EmbeddedMetricsAws {
        timestamp: snapshot.timestamp,
        cloudwatch_metrics: [EmbeddedNamespace {
            namespace: snapshot.namespace,
            dimensions: [snapshot.dimensions.keys().map(String::as_str).collect()],
            metrics: snapshot
                .metrics
                .iter()
                .map(|(name, metric)| EmbeddedMetric {
                    name,
                    unit: metric.unit.as_str(),
                })
                .collect(),
        }],
    };

    let mut document = Map::new();
    document.insert(METADATA_KEY.to_owned(), serde_json::to_value(&aws)?);

    for (name, metric) in snapshot.metrics {
        insert_member(&mut document, name, metric.value.into())?;
    }
    for (name, value) in snapshot.dimensions {
        insert_member(&mut document, name, Value::String(value.clone()))?;
    }
    for (name, value) in snapshot.properties {
        insert_member(&mut document, name, value.clone())?;
    }

    let document = Value::Object(document);
    debug!("Validating serialized metrics against CloudWatch EMF schema");
    schema::validate(&document)?;

    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Buffers {
        dimensions: IndexMap<String, String>,
        metrics: IndexMap<String, Metric>,
        properties: IndexMap<String, Value>,
    }

    impl Buffers {
        fn new() -> Self {
            Self {
                dimensions: IndexMap::new(),
                metrics: IndexMap::new(),
                properties: IndexMap::new(),
            }
        }

        fn snapshot<'a>(&'a self, namespace: Option<&'a str>) -> Snapshot<'a> {
            Snapshot {
                timestamp: 1687394207903,
                namespace,
                dimensions: &self.dimensions,
                metrics: &self.metrics,
                properties: &self.properties,
            }
        }
    }

    #[test]
    fn embedded_metrics() {
        let mut buffers = Buffers::new();

        buffers.dimensions.insert("Address".into(), "10.172.207.225".into());
        buffers.dimensions.insert("Port".into(), "7779".into());

        buffers.metrics.insert(
            "FrameTime".into(),
            Metric {
                unit: MetricUnit::Milliseconds,
                value: 10.0,
            },
        );
        buffers.metrics.insert(
            "CpuUsage".into(),
            Metric {
                unit: MetricUnit::Percent,
                value: 5.5,
            },
        );
        buffers.metrics.insert(
            "MemoryUsage".into(),
            Metric {
                unit: MetricUnit::Kilobytes,
                value: 10240.0,
            },
        );
        buffers.properties.insert("RequestId".into(), json!("ABC123"));

        let document = serialize(&buffers.snapshot(Some("GameServerMetrics"))).unwrap();

        assert_eq!(
            serde_json::to_string(&document).unwrap(),
            r#"{"_aws":{"Timestamp":1687394207903,"CloudWatchMetrics":[{"Namespace":"GameServerMetrics","Dimensions":[["Address","Port"]],"Metrics":[{"Name":"FrameTime","Unit":"Milliseconds"},{"Name":"CpuUsage","Unit":"Percent"},{"Name":"MemoryUsage","Unit":"Kilobytes"}]}]},"FrameTime":10.0,"CpuUsage":5.5,"MemoryUsage":10240.0,"Address":"10.172.207.225","Port":"7779","RequestId":"ABC123"}"#
        );
    }

    #[test]
    fn orders_document() {
        let mut buffers = Buffers::new();
        buffers.dimensions.insert("service".into(), "orders".into());
        buffers.metrics.insert(
            "Latency".into(),
            Metric {
                unit: MetricUnit::Milliseconds,
                value: 42.0,
            },
        );

        let document = serialize(&buffers.snapshot(Some("Orders"))).unwrap();

        assert_eq!(document["_aws"]["CloudWatchMetrics"][0]["Dimensions"], json!([["service"]]));
        assert_eq!(
            document["_aws"]["CloudWatchMetrics"][0]["Metrics"],
            json!([{"Name": "Latency", "Unit": "Milliseconds"}])
        );
        assert_eq!(document["Latency"], json!(42.0));
        assert_eq!(document["service"], json!("orders"));
        assert!(document["_aws"]["Timestamp"].is_u64());
    }

    #[test]
    fn missing_namespace() {
        let mut buffers = Buffers::new();
        buffers.metrics.insert(
            "Latency".into(),
            Metric {
                unit: MetricUnit::Milliseconds,
                value: 42.0,
            },
        );

        match serialize(&buffers.snapshot(None)) {
            Err(Error::SchemaValidation { rule, path, .. }) => {
                assert_eq!(rule, "type");
                assert_eq!(path, "$._aws.CloudWatchMetrics[0].Namespace");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn dimension_named_like_a_metric() {
        let mut buffers = Buffers::new();
        buffers.metrics.insert(
            "service".into(),
            Metric {
                unit: MetricUnit::Count,
                value: 1.0,
            },
        );
        buffers.dimensions.insert("service".into(), "orders".into());

        match serialize(&buffers.snapshot(Some("Orders"))) {
            Err(Error::SchemaValidation { rule, path, .. }) => {
                assert_eq!(rule, "disjointKeys");
                assert_eq!(path, "$.service");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn names_no_document_can_carry() {
        let path = || "$.name".to_string();
        check_name("Latency", MAX_NAME_LENGTH, path).unwrap();
        check_name(&"n".repeat(MAX_NAME_LENGTH), MAX_NAME_LENGTH, path).unwrap();
        // characters, not bytes
        check_name(&"é".repeat(MAX_DIMENSION_NAME_LENGTH), MAX_DIMENSION_NAME_LENGTH, path).unwrap();

        for (name, expected) in [
            (String::new(), "minLength"),
            ("n".repeat(MAX_NAME_LENGTH + 1), "maxLength"),
            (METADATA_KEY.to_string(), "disjointKeys"),
        ] {
            match check_name(&name, MAX_NAME_LENGTH, path) {
                Err(Error::SchemaValidation { rule, .. }) => assert_eq!(rule, expected),
                other => panic!("unexpected {other:?}"),
            }
        }
    }
}
