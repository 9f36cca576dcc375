//! Histogram bucket and label-name schemas.
//!
//! Both arrive as opaque configuration text (`"0.01;0.1;1"`,
//! `"method;status"`) and are parsed here before the registry sees them.

use std::collections::HashSet;

use crate::error::{SchemaError, SchemaResult};

/// Default response time buckets (seconds)
pub const DEFAULT_TIME_BUCKETS: &[f64] = &[0.01, 0.1, 1.0, 10.0, 30.0];

/// Default response size buckets (bytes)
pub const DEFAULT_SIZE_BUCKETS: &[f64] = &[
    1_000.0,
    10_000.0,
    100_000.0,
    1_000_000.0,
    10_000_000.0,
    100_000_000.0,
];

/// Separators accepted between list items.
fn split_items(spec: &str) -> impl Iterator<Item = &str> {
    spec.split(|c: char| c == ';' || c == ',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
}

/// Upper bounds of histogram buckets, strictly increasing.
#[derive(Debug, Clone, PartialEq)]
pub struct Buckets(Vec<f64>);

impl Buckets {
    /// Parses a bucket spec, falling back to `defaults` when it is empty.
    ///
    /// `field` names the setting in error messages.
    pub fn parse(spec: &str, defaults: &[f64], field: &str) -> SchemaResult<Self> {
        let mut bounds = Vec::new();
        for item in split_items(spec) {
            let value: f64 = item.parse().map_err(|_| SchemaError::InvalidBucket {
                field: field.to_string(),
                value: item.to_string(),
            })?;
            if !value.is_finite() {
                return Err(SchemaError::InvalidBucket {
                    field: field.to_string(),
                    value: item.to_string(),
                });
            }
            if let Some(&previous) = bounds.last() {
                if value <= previous {
                    return Err(SchemaError::UnorderedBuckets {
                        field: field.to_string(),
                        previous,
                        next: value,
                    });
                }
            }
            bounds.push(value);
        }

        if bounds.is_empty() {
            bounds = defaults.to_vec();
        }
        Ok(Self(bounds))
    }

    /// Response time buckets from a spec.
    pub fn time(spec: &str) -> SchemaResult<Self> {
        Self::parse(spec, DEFAULT_TIME_BUCKETS, "time_buckets")
    }

    /// Response size buckets from a spec.
    pub fn size(spec: &str) -> SchemaResult<Self> {
        Self::parse(spec, DEFAULT_SIZE_BUCKETS, "size_buckets")
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.0
    }
}

/// Ordered, unique label names for request-scope metrics.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LabelNames(Vec<String>);

impl LabelNames {
    /// Parses a `;`-separated list of label names.
    ///
    /// An empty spec yields no labels.
    pub fn parse(spec: &str) -> SchemaResult<Self> {
        let mut seen = HashSet::new();
        let mut names = Vec::new();
        for name in split_items(spec) {
            if !is_valid_label_name(name) {
                return Err(SchemaError::InvalidLabelName {
                    name: name.to_string(),
                });
            }
            if !seen.insert(name) {
                return Err(SchemaError::DuplicateLabelName {
                    name: name.to_string(),
                });
            }
            names.push(name.to_string());
        }
        Ok(Self(names))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrowed names, in the shape the registry wants them.
    pub fn as_strs(&self) -> Vec<&str> {
        self.0.iter().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Prometheus label name rule. Names starting with `__` are reserved.
fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    let first_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    first_ok && !name.starts_with("__") && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
