//! promstat daemon - standalone metrics collector
//!
//! Binds a local socket, aggregates updates pushed by web server workers,
//! and serves the combined Prometheus snapshot.
//!
//! # Usage
//!
//! ```bash
//! # Start with defaults (socket created under $TMPDIR)
//! promstatd
//!
//! # Start with a config file
//! PROMSTAT_CONFIG=/etc/promstat.toml promstatd
//!
//! # Reload configuration (socket handover)
//! kill -HUP $(pidof promstatd)
//!
//! # Enable debug logging
//! RUST_LOG=promstatd=debug promstatd
//! ```

use anyhow::Result;

use promstatd::daemon::{config_path_from_env, run};

#[tokio::main]
async fn main() -> Result<()> {
    run(config_path_from_env()).await
}
