//! Update payload grammar.
//!
//! - server scope: `<name> <value>`
//! - request scope: `<label_1>;...;<label_n>;<duration_seconds>;<size_bytes>`
//!
//! Parsing is purely syntactic; which names and how many labels are
//! acceptable is decided by the registry.

use thiserror::Error;

/// Field separator inside request payloads
pub const REQUEST_FIELD_SEPARATOR: char = ';';

/// Errors for payloads that cannot be interpreted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PayloadError {
    #[error("Expected `<name> <value>`, got {0:?}")]
    MalformedServerSample(String),

    #[error("Invalid metric name: {0:?}")]
    InvalidMetricName(String),

    #[error("Invalid {field} value: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("Request payload has {got} fields, expected {expected}")]
    FieldCount { expected: usize, got: usize },
}

/// A single server-scope sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServerSample<'a> {
    pub name: &'a str,
    pub value: f64,
}

impl<'a> ServerSample<'a> {
    pub fn parse(payload: &'a str) -> Result<Self, PayloadError> {
        let mut parts = payload.split_whitespace();
        let (Some(name), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(PayloadError::MalformedServerSample(payload.to_string()));
        };

        if !is_valid_metric_name(name) {
            return Err(PayloadError::InvalidMetricName(name.to_string()));
        }

        Ok(Self {
            name,
            value: parse_number("server sample", value)?,
        })
    }

    /// Names ending in `_total` are cumulative counters.
    pub fn is_counter(&self) -> bool {
        self.name.ends_with("_total")
    }
}

/// A completed request: label values plus duration and size.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSample<'a> {
    pub label_values: Vec<&'a str>,
    pub duration_secs: f64,
    pub size_bytes: f64,
}

impl<'a> RequestSample<'a> {
    /// Parses a request payload carrying `label_count` label values.
    pub fn parse(payload: &'a str, label_count: usize) -> Result<Self, PayloadError> {
        let mut fields: Vec<&str> = payload.trim().split(REQUEST_FIELD_SEPARATOR).collect();
        let expected = label_count + 2;
        if fields.len() != expected {
            return Err(PayloadError::FieldCount {
                expected,
                got: fields.len(),
            });
        }

        let size = fields.pop().unwrap_or_default();
        let duration = fields.pop().unwrap_or_default();

        Ok(Self {
            duration_secs: parse_non_negative("duration", duration)?,
            size_bytes: parse_non_negative("size", size)?,
            label_values: fields,
        })
    }
}

fn parse_number(field: &'static str, value: &str) -> Result<f64, PayloadError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| PayloadError::InvalidNumber {
            field,
            value: value.to_string(),
        })
}

fn parse_non_negative(field: &'static str, value: &str) -> Result<f64, PayloadError> {
    let parsed = parse_number(field, value)?;
    if parsed < 0.0 {
        return Err(PayloadError::InvalidNumber {
            field,
            value: value.to_string(),
        });
    }
    Ok(parsed)
}

/// Prometheus metric name rule: `[a-zA-Z_:][a-zA-Z0-9_:]*`.
fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == ':')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}
