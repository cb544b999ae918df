//! # Cert Events - Certificate Renewal Event Model
//!
//! Turns certificate identity plus Kubernetes labels/annotations into the
//! self-describing message published to the broker, and resolves where that
//! message is routed.
//!
//! ## Annotation Namespace
//!
//! ```text
//! cert-webhook.golder.tech/
//! ├── enabled               (label)   gates whether an event is produced
//! ├── target                          → target_type
//! ├── docker-engine                   → docker_engine
//! ├── docker-compose-path             → docker_compose_path
//! ├── container-names                 → container_names (comma separated)
//! ├── rabbitmq-exchange               → RoutingTarget::exchange
//! └── rabbitmq-routing-key            → RoutingTarget::routing_key
//! ```
//!
//! ## Rules
//!
//! - No I/O, no shared state
//! - Missing maps behave as empty maps
//! - Optional string fields are always present (empty), never absent

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod annotations;
pub mod error;
pub mod event;
pub mod routing;

pub use annotations::{filter_annotations, is_relay_enabled, parse_container_names};
pub use error::EventError;
pub use event::{CertificateEvent, EventMetadata};
pub use routing::RoutingTarget;

/// Prefix shared by every annotation and label this relay understands.
pub const ANNOTATION_PREFIX: &str = "cert-webhook.golder.tech/";

/// Label that must be `"true"` for a certificate to produce events.
pub const ENABLED_LABEL: &str = "cert-webhook.golder.tech/enabled";

/// Value of the `event` field on every message.
pub const EVENT_KIND: &str = "certificate.renewed";

/// Value of the `trigger` field on every message.
pub const EVENT_TRIGGER: &str = "cert-manager-webhook";

/// Exchange used when no `rabbitmq-exchange` annotation is set.
pub const DEFAULT_EXCHANGE: &str = "certificate-events";

/// Routing key used when no `rabbitmq-routing-key` annotation is set.
pub const DEFAULT_ROUTING_KEY: &str = "certificate.renewed";
