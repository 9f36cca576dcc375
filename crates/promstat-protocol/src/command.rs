//! Command parsing for the line protocol.

use std::fmt;

use promstat_core::MetricScope;

/// Keyword that requests a snapshot
pub const METRICS_KEYWORD: &str = "metrics";

/// One parsed protocol line.
///
/// Payloads borrow from the line they were parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    /// Blank line: close without responding
    Close,

    /// Write the full snapshot and close
    Metrics,

    /// Server-scope update
    ServerUpdate(&'a str),

    /// Request-scope update
    RequestUpdate(&'a str),

    /// Anything else; tolerated and ignored
    Unknown(&'a str),
}

impl<'a> Command<'a> {
    /// Parses a single line. Surrounding whitespace (including the
    /// newline) is trimmed first.
    ///
    /// The keyword is everything before the first `:`. `server` and
    /// `request` need the separator to carry a payload; without it they
    /// are unknown. `metrics` ignores anything after the separator.
    pub fn parse(line: &'a str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Close;
        }

        let (keyword, payload) = match line.split_once(':') {
            Some((keyword, payload)) => (keyword, Some(payload)),
            None => (line, None),
        };

        if keyword == METRICS_KEYWORD {
            return Self::Metrics;
        }

        match (MetricScope::from_keyword(keyword), payload) {
            (Some(MetricScope::Server), Some(payload)) => Self::ServerUpdate(payload),
            (Some(MetricScope::Request), Some(payload)) => Self::RequestUpdate(payload),
            _ => Self::Unknown(line),
        }
    }

    /// Builds an update command for a scope.
    pub fn update(scope: MetricScope, payload: &'a str) -> Self {
        match scope {
            MetricScope::Server => Self::ServerUpdate(payload),
            MetricScope::Request => Self::RequestUpdate(payload),
        }
    }

    /// Scope and payload of an update command.
    pub fn as_update(&self) -> Option<(MetricScope, &'a str)> {
        match *self {
            Self::ServerUpdate(payload) => Some((MetricScope::Server, payload)),
            Self::RequestUpdate(payload) => Some((MetricScope::Request, payload)),
            Self::Close | Self::Metrics | Self::Unknown(_) => None,
        }
    }

    /// Wire form including the trailing newline.
    pub fn to_line(&self) -> String {
        format!("{self}\n")
    }
}

impl fmt::Display for Command<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Close => Ok(()),
            Self::Metrics => f.write_str(METRICS_KEYWORD),
            Self::ServerUpdate(payload) => write!(f, "{}:{payload}", MetricScope::Server),
            Self::RequestUpdate(payload) => write!(f, "{}:{payload}", MetricScope::Request),
            Self::Unknown(line) => f.write_str(line),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_metrics() {
        assert_eq!(Command::parse("metrics\n"), Command::Metrics);
        assert_eq!(Command::parse("  metrics  "), Command::Metrics);
        assert_eq!(Command::parse("metrics:ignored"), Command::Metrics);
    }

    #[test]
    fn test_parse_updates() {
        assert_eq!(
            Command::parse("server:requests_total 5\n"),
            Command::ServerUpdate("requests_total 5")
        );
        assert_eq!(
            Command::parse("request:GET;200;0.25;512\r\n"),
            Command::RequestUpdate("GET;200;0.25;512")
        );
        // Only the first separator splits
        assert_eq!(
            Command::parse("request:a:b"),
            Command::RequestUpdate("a:b")
        );
        assert_eq!(Command::parse("server:"), Command::ServerUpdate(""));
    }

    #[test]
    fn test_parse_close() {
        assert_eq!(Command::parse("\n"), Command::Close);
        assert_eq!(Command::parse("   \t"), Command::Close);
        assert_eq!(Command::parse(""), Command::Close);
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(Command::parse("foo:bar"), Command::Unknown("foo:bar"));
        assert_eq!(Command::parse("server"), Command::Unknown("server"));
        assert_eq!(Command::parse("request"), Command::Unknown("request"));
        assert_eq!(Command::parse("METRICS"), Command::Unknown("METRICS"));
    }

    #[test]
    fn test_as_update() {
        assert_eq!(
            Command::parse("server:x 1").as_update(),
            Some((MetricScope::Server, "x 1"))
        );
        assert_eq!(Command::Metrics.as_update(), None);
        assert_eq!(Command::Unknown("foo").as_update(), None);
    }

    #[test]
    fn test_to_line_parses_back() {
        let commands = [
            Command::Metrics,
            Command::update(MetricScope::Server, "busy_workers 3"),
            Command::update(MetricScope::Request, "GET;200;0.1;10"),
        ];
        for command in commands {
            let line = command.to_line();
            assert!(line.ends_with('\n'));
            assert_eq!(Command::parse(&line), command);
        }
        assert_eq!(Command::Close.to_line(), "\n");
    }
}
