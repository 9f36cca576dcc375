//! Logging setup.
//!
//! Initialization can run many times in one process (every host reload),
//! so the subscriber is installed once with a reloadable filter and each
//! later call only swaps the filter.

use std::sync::OnceLock;

use tracing::debug;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

/// Crates whose verbosity follows the `debug` flag
const LOG_TARGETS: [&str; 3] = ["promstatd", "promstat_core", "promstat_protocol"];

type FilterHandle = reload::Handle<EnvFilter, Registry>;

static FILTER: OnceLock<Option<FilterHandle>> = OnceLock::new();

/// Builds the filter for a verbosity. `RUST_LOG` directives are applied on
/// top so an operator can always override.
pub fn build_filter(debug: bool) -> EnvFilter {
    let level = if debug { "debug" } else { "info" };
    let base = LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",");

    match std::env::var("RUST_LOG") {
        Ok(extra) if !extra.trim().is_empty() => EnvFilter::new(format!("{base},{extra}")),
        _ => EnvFilter::new(base),
    }
}

/// Installs the global subscriber, or updates its verbosity.
///
/// Returns false if another subscriber already owns the process; logging
/// is then left as the embedding application configured it.
pub fn init_logging(debug: bool) -> bool {
    let handle = FILTER.get_or_init(|| {
        let (filter, handle) = reload::Layer::new(build_filter(debug));
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .try_init()
            .ok()
            .map(|()| handle)
    });

    match handle {
        Some(handle) => {
            if let Err(e) = handle.reload(build_filter(debug)) {
                debug!(error = %e, "Failed to update log filter");
                return false;
            }
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_levels() {
        let filter = build_filter(true).to_string();
        assert!(filter.contains("promstatd=debug"));

        let filter = build_filter(false).to_string();
        assert!(filter.contains("promstat_protocol=info"));
    }

    #[test]
    fn test_init_logging_is_repeatable() {
        let first = init_logging(false);
        let second = init_logging(true);
        assert_eq!(first, second);
    }
}
