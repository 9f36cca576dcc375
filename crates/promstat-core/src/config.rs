//! Initialization parameters.
//!
//! `StatusConfig` mirrors what the host web server hands over when it
//! initializes the metrics collector. The host shim builds it directly; the
//! standalone daemon loads it from a TOML file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{SchemaError, SchemaResult};

/// Connection deadline used when none is configured
pub const DEFAULT_SOCKET_TIMEOUT_SECS: u64 = 1;

/// Prefix for every exported metric name
pub const DEFAULT_NAMESPACE: &str = "httpd";

/// Everything needed to (re-)initialize the collector.
///
/// # Example
///
/// ```rust
/// use promstat_core::StatusConfig;
///
/// let config = StatusConfig {
///     label_names: "method;status".to_string(),
///     socket_timeout_secs: 5,
///     ..Default::default()
/// };
/// assert_eq!(config.socket_timeout().as_secs(), 5);
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StatusConfig {
    /// Free-form server description (exported on the info metric)
    pub server_description: String,

    /// Host name of the web server
    pub host_name: String,

    /// Version of the host-side module
    pub version: String,

    /// Enables debug-level logging
    pub debug: bool,

    /// Owner applied to the socket; `None` keeps the current effective uid
    pub uid: Option<u32>,

    /// Group applied to the socket; `None` keeps the current effective gid
    pub gid: Option<u32>,

    /// `;`-separated request label names
    pub label_names: String,

    /// Multi-processing module name of the host
    pub mpm_name: String,

    /// Per-connection deadline in seconds (0 = default)
    pub socket_timeout_secs: u64,

    /// Directory the socket file is created in (`None` = OS temp dir)
    pub tmp_folder: Option<PathBuf>,

    /// `;`-separated response time bucket bounds (seconds)
    pub time_buckets: String,

    /// `;`-separated response size bucket bounds (bytes)
    pub size_buckets: String,

    /// Metric name prefix
    pub namespace: String,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            server_description: String::new(),
            host_name: String::new(),
            version: String::new(),
            debug: false,
            uid: None,
            gid: None,
            label_names: String::new(),
            mpm_name: String::new(),
            socket_timeout_secs: DEFAULT_SOCKET_TIMEOUT_SECS,
            tmp_folder: None,
            time_buckets: String::new(),
            size_buckets: String::new(),
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

impl StatusConfig {
    /// Parses a TOML document.
    pub fn from_toml_str(text: &str) -> SchemaResult<Self> {
        toml::from_str(text).map_err(|e| SchemaError::Config {
            reason: e.to_string(),
        })
    }

    /// Reads and parses a TOML configuration file.
    pub fn load(path: &Path) -> SchemaResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| SchemaError::Config {
            reason: format!("{}: {e}", path.display()),
        })?;
        Self::from_toml_str(&text)
    }

    /// Absolute deadline applied to each accepted connection.
    pub fn socket_timeout(&self) -> Duration {
        let secs = if self.socket_timeout_secs == 0 {
            DEFAULT_SOCKET_TIMEOUT_SECS
        } else {
            self.socket_timeout_secs
        };
        Duration::from_secs(secs)
    }

    /// Directory in which the socket path is created.
    pub fn socket_dir(&self) -> PathBuf {
        self.tmp_folder
            .clone()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(std::env::temp_dir)
    }

    /// Metric prefix, falling back to the default when blank.
    pub fn namespace(&self) -> &str {
        let ns = self.namespace.trim();
        if ns.is_empty() {
            DEFAULT_NAMESPACE
        } else {
            ns
        }
    }
}
