//! # Schema
//!
//! Validation of embedded metric documents against `schema.json`, a draft 7 JSON Schema
//! checked with the `jsonschema` crate. The accepted document shape can change without
//! touching the validator.
//!
//! The schema carries one keyword of its own, `referencedMembers`: every string found at
//! `path` (`*` matches any array element) must name a member of the document which in turn
//! matches `schema`. It is checked once the standard keywords passed.

use super::Error;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::sync::LazyLock;

static EMF_SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    let definition = serde_json::from_str(include_str!("schema.json")).expect("embedded EMF schema is malformed");
    Schema::new(&definition).expect("embedded EMF schema does not compile")
});

#[derive(Deserialize)]
struct ReferencedMembersDefinition {
    path: Vec<String>,
    schema: Value,
}

struct ReferencedMembers {
    path: Vec<String>,
    validator: jsonschema::Validator,
}

/// A compiled document schema
pub struct Schema {
    validator: jsonschema::Validator,
    referenced_members: Option<ReferencedMembers>,
}

/// The first rule a document broke
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    /// Keyword of the failed rule, e.g. `minLength`
    pub rule: String,
    /// Location of the offending value, e.g. `$._aws.CloudWatchMetrics[0].Namespace`
    pub path: String,
    pub message: String,
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}: {}", self.rule, self.path, self.message)
    }
}

impl From<SchemaViolation> for Error {
    fn from(violation: SchemaViolation) -> Self {
        Error::SchemaValidation {
            rule: violation.rule,
            path: violation.path,
            message: violation.message,
        }
    }
}

fn compile(definition: &Value) -> Result<jsonschema::Validator, Error> {
    jsonschema::validator_for(definition).map_err(|e| Error::InvalidSchema(e.to_string()))
}

/// The keyword is the last segment of the failed schema location
fn keyword(error: &jsonschema::ValidationError<'_>) -> String {
    error.schema_path.as_str().rsplit('/').next().unwrap_or_default().to_owned()
}

/// Render a JSON pointer as `$.member[index]`, the document tells indices from member names
fn json_path(document: &Value, pointer: &str) -> String {
    let mut path = String::from("$");
    let mut current = Some(document);

    for segment in pointer.split('/').skip(1) {
        let segment = segment.replace("~1", "/").replace("~0", "~");
        match current {
            Some(Value::Array(items)) => {
                path.push_str(&format!("[{segment}]"));
                current = segment.parse::<usize>().ok().and_then(|index| items.get(index));
            }
            other => {
                path.push('.');
                path.push_str(&segment);
                current = other.and_then(|value| value.get(segment.as_str()));
            }
        }
    }
    path
}

impl Schema {
    /// Compile a schema definition, including its `referencedMembers` keyword
    pub fn new(definition: &Value) -> Result<Self, Error> {
        let referenced_members = match definition.get("referencedMembers") {
            Some(referenced) => {
                let referenced: ReferencedMembersDefinition = serde_json::from_value(referenced.clone())
                    .map_err(|e| Error::InvalidSchema(format!("referencedMembers: {e}")))?;
                Some(ReferencedMembers {
                    validator: compile(&referenced.schema)?,
                    path: referenced.path,
                })
            }
            None => None,
        };

        Ok(Self {
            validator: compile(definition)?,
            referenced_members,
        })
    }

    /// The schema of a CloudWatch embedded metric format document
    pub fn emf() -> &'static Schema {
        &EMF_SCHEMA
    }

    /// Validate a value against this schema, stopping at the first violation
    pub fn validate(&self, document: &Value) -> Result<(), SchemaViolation> {
        if let Some(error) = self.validator.iter_errors(document).next() {
            return Err(SchemaViolation {
                rule: keyword(&error),
                path: json_path(document, error.instance_path.as_str()),
                message: error.to_string(),
            });
        }

        match &self.referenced_members {
            Some(referenced) => referenced.validate(document),
            None => Ok(()),
        }
    }
}

impl ReferencedMembers {
    fn validate(&self, document: &Value) -> Result<(), SchemaViolation> {
        let mut names = Vec::new();
        collect_strings(document, &self.path, &mut names);

        for name in names {
            let path = format!("$.{name}");
            let Some(member) = document.get(name) else {
                return Err(SchemaViolation {
                    rule: "referencedMembers".to_owned(),
                    path,
                    message: format!("member '{name}' is referenced but missing"),
                });
            };
            if let Some(error) = self.validator.iter_errors(member).next() {
                return Err(SchemaViolation {
                    rule: keyword(&error),
                    path,
                    message: error.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Gather the strings found by walking `path` from `value`
fn collect_strings<'a>(value: &'a Value, path: &[String], out: &mut Vec<&'a str>) {
    let Some((head, rest)) = path.split_first() else {
        if let Some(text) = value.as_str() {
            out.push(text);
        }
        return;
    };

    match value {
        Value::Array(items) if head == "*" => {
            for item in items {
                collect_strings(item, rest, out);
            }
        }
        Value::Object(members) => {
            if let Some(member) = members.get(head) {
                collect_strings(member, rest, out);
            }
        }
        _ => {}
    }
}

/// Validate a document against the embedded metric format schema
pub fn validate(document: &Value) -> Result<(), SchemaViolation> {
    Schema::emf().validate(document)
}
