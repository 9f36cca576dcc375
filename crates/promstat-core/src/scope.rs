//! Metric scopes.

use std::fmt;

/// Which label schema and update path a metric update belongs to.
///
/// Fixed at registration time: server-scope metrics describe the whole
/// host process, request-scope metrics carry the configured per-request
/// labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricScope {
    /// Host-process-wide metrics
    Server,

    /// Per-request metrics
    Request,
}

impl MetricScope {
    /// Command keyword used on the wire for this scope.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Request => "request",
        }
    }

    /// Parses a wire keyword.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "server" => Some(Self::Server),
            "request" => Some(Self::Request),
            _ => None,
        }
    }
}

impl fmt::Display for MetricScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}
