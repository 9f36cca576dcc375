//! Promstat Protocol - Line protocol for worker/daemon communication
//!
//! Workers and scrapers talk to the daemon over a local socket, one
//! newline-terminated UTF-8 command per line:
//!
//! | Line | Effect |
//! |---|---|
//! | `metrics` | respond with the full snapshot, then close |
//! | `server:<payload>` | server-scope update, connection stays open |
//! | `request:<payload>` | request-scope update, connection stays open |
//! | *(empty)* | close, no response |
//! | *(anything else)* | ignored |

pub mod command;
pub mod payload;

pub use command::Command;
pub use payload::{PayloadError, RequestSample, ServerSample};
