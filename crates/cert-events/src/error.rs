//! Error types for the event model

use thiserror::Error;

/// Errors raised when an event or routing target is structurally invalid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("Identity field `{field}` must not be empty")]
    EmptyIdentity { field: &'static str },

    #[error("Routing field `{field}` must not be empty")]
    EmptyRoutingField { field: &'static str },
}
