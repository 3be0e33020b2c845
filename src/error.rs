//! # Error
//!
//! Every failure the collector can report to a caller

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The unit is not one of the CloudWatch units, `expected` lists the accepted aliases
    #[error("invalid metric unit '{unit}', expected either option: {expected:?}")]
    InvalidUnit { unit: String, expected: Vec<&'static str> },

    /// Metric values must be finite numbers
    #[error("{0} is not a valid number")]
    InvalidMetricValue(Value),

    /// A document belongs to exactly one namespace
    #[error("namespace '{existing}' already set - only one namespace is allowed across metrics")]
    DuplicateNamespace { existing: String },

    /// The assembled document does not match the embedded metric format schema
    #[error("invalid format. rule: {rule}, invalid item: {path}, {message}")]
    SchemaValidation {
        rule: String,
        path: String,
        message: String,
    },

    /// A schema definition that could not be compiled
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Rejected builder configuration
    #[error("invalid configuration: {0}")]
    Config(String),
}
