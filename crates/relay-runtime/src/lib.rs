//! # Certificate Event Relay Runtime
//!
//! Wiring for the `cert-relay` binary.
//!
//! ## Startup Sequence
//!
//! 1. Initialise telemetry (logs, metrics)
//! 2. Load and validate configuration; a bad broker URL stops the process
//! 3. Connect the broker link
//! 4. Serve HTTP until SIGINT/SIGTERM
//! 5. Cancel in-flight sends, drain HTTP, shut the link down
//!
//! ## Modules
//!
//! - `config` - environment configuration
//! - `http` - axum router and handlers

pub mod config;
pub mod http;

pub use config::{ConfigError, RelayConfig};
pub use http::{router, EventRequest};
