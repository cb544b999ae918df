//! # Routing Target
//!
//! Where an event goes: an exchange plus a routing key. Each field is
//! resolved independently: per-resource annotation first, fixed default second.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::annotations::{prefixed, EXCHANGE_KEY, ROUTING_KEY_KEY};
use crate::error::EventError;
use crate::{DEFAULT_EXCHANGE, DEFAULT_ROUTING_KEY};

/// Exchange and routing key pair. Neither field is ever empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoutingTarget {
    pub exchange: String,
    pub routing_key: String,
}

impl RoutingTarget {
    /// Build an explicit target, rejecting blank fields.
    pub fn new(
        exchange: impl Into<String>,
        routing_key: impl Into<String>,
    ) -> Result<Self, EventError> {
        let exchange = exchange.into();
        let routing_key = routing_key.into();

        if exchange.trim().is_empty() {
            return Err(EventError::EmptyRoutingField { field: "exchange" });
        }
        if routing_key.trim().is_empty() {
            return Err(EventError::EmptyRoutingField {
                field: "routing_key",
            });
        }

        Ok(Self {
            exchange,
            routing_key,
        })
    }

    /// Resolve the target from resource annotations.
    ///
    /// A missing, empty or blank annotation falls back to the default for
    /// that field only.
    #[must_use]
    pub fn resolve(annotations: Option<&BTreeMap<String, String>>) -> Self {
        let empty = BTreeMap::new();
        let source = annotations.unwrap_or(&empty);

        Self {
            exchange: non_blank_or(prefixed(source, EXCHANGE_KEY), DEFAULT_EXCHANGE),
            routing_key: non_blank_or(prefixed(source, ROUTING_KEY_KEY), DEFAULT_ROUTING_KEY),
        }
    }
}

impl Default for RoutingTarget {
    fn default() -> Self {
        Self {
            exchange: DEFAULT_EXCHANGE.to_string(),
            routing_key: DEFAULT_ROUTING_KEY.to_string(),
        }
    }
}

impl fmt::Display for RoutingTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.exchange, self.routing_key)
    }
}

fn non_blank_or(value: &str, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}
