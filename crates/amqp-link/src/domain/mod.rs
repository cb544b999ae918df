//! Domain Layer - link state, backoff and configuration
//!
//! RULES:
//! - No I/O operations
//! - No async code

pub mod backoff;
pub mod config;
pub mod state;

pub use backoff::{BackoffPolicy, DEFAULT_INITIAL_BACKOFF, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_BACKOFF};
pub use config::LinkConfig;
pub use state::{ConnectionState, ConnectionStatus};
