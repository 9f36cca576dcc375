//! Promstat Daemon - out-of-process metrics collector
//!
//! Web server workers run in separate processes without shared memory, so
//! their metrics are pushed over a local socket into one registry that a
//! scrape can read.
//!
//! This crate provides:
//! - `metrics` - Facade over the Prometheus registry (register/update/snapshot)
//! - `server` - Unix socket server and per-connection protocol handler
//! - `status` - Initialization entry point and socket handover on reload
//! - `client` - Worker/scraper side of the socket
//! - `daemon` - Standalone daemon driven by a TOML config and signals
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      promstatd                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐  start/close  ┌─────────────────────┐  │
//! │  │  StatusServer   │──────────────▶│    SocketServer     │  │
//! │  │ (initialize)    │               │   (Unix listener)   │  │
//! │  └────────┬────────┘               └──────────┬──────────┘  │
//! │           │ register                          │ accept      │
//! │           ▼                                   ▼             │
//! │  ┌─────────────────┐   update/snapshot ┌─────────────────┐  │
//! │  │  MetricsFacade  │◀──────────────────│ConnectionHandler│  │
//! │  │ (registry)      │                   │ (per connection)│  │
//! │  └─────────────────┘                   └─────────────────┘  │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Failures surface as an empty socket path, never as a crash of the host

pub mod client;
pub mod daemon;
pub mod logging;
pub mod metrics;
pub mod server;
pub mod status;

pub use metrics::{MetricsError, MetricsFacade};
pub use status::{InitError, StatusServer};
