//! # Certificate Event
//!
//! The message published for every certificate renewal. Field names are the
//! wire format consumed by downstream automation and must not change.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::annotations::{
    filter_annotations, parse_container_names, prefixed, CONTAINER_NAMES_KEY,
    DOCKER_COMPOSE_PATH_KEY, DOCKER_ENGINE_KEY, TARGET_KEY,
};
use crate::error::EventError;
use crate::{ANNOTATION_PREFIX, EVENT_KIND, EVENT_TRIGGER};

/// Labels and relay annotations of the source resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// All labels of the Certificate resource.
    pub labels: BTreeMap<String, String>,
    /// Annotations under [`ANNOTATION_PREFIX`] only.
    pub annotations: BTreeMap<String, String>,
}

/// A certificate renewal event.
///
/// Immutable once built. Optional fields default to empty strings and an
/// empty list so JSON consumers never see a missing key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateEvent {
    /// Always [`EVENT_KIND`].
    pub event: String,
    /// Certificate resource name.
    pub certificate: String,
    /// Certificate resource namespace.
    pub namespace: String,
    /// Name of the TLS secret backing the certificate.
    pub secret_name: String,
    pub target_type: String,
    pub docker_engine: String,
    pub docker_compose_path: String,
    pub container_names: Vec<String>,
    /// Unix seconds at construction.
    pub timestamp: i64,
    /// Always [`EVENT_TRIGGER`].
    pub trigger: String,
    pub metadata: EventMetadata,
}

impl CertificateEvent {
    /// Build an event stamped with the current time.
    ///
    /// `None` label or annotation maps are treated as empty.
    #[must_use]
    pub fn build(
        name: &str,
        namespace: &str,
        secret_name: &str,
        labels: Option<&BTreeMap<String, String>>,
        annotations: Option<&BTreeMap<String, String>>,
    ) -> Self {
        Self::build_at(
            name,
            namespace,
            secret_name,
            labels,
            annotations,
            chrono::Utc::now().timestamp(),
        )
    }

    /// Build an event with an explicit timestamp.
    #[must_use]
    pub fn build_at(
        name: &str,
        namespace: &str,
        secret_name: &str,
        labels: Option<&BTreeMap<String, String>>,
        annotations: Option<&BTreeMap<String, String>>,
        timestamp: i64,
    ) -> Self {
        let empty = BTreeMap::new();
        let source = annotations.unwrap_or(&empty);

        Self {
            event: EVENT_KIND.to_string(),
            certificate: name.to_string(),
            namespace: namespace.to_string(),
            secret_name: secret_name.to_string(),
            target_type: prefixed(source, TARGET_KEY).to_string(),
            docker_engine: prefixed(source, DOCKER_ENGINE_KEY).to_string(),
            docker_compose_path: prefixed(source, DOCKER_COMPOSE_PATH_KEY).to_string(),
            container_names: parse_container_names(prefixed(source, CONTAINER_NAMES_KEY)),
            timestamp,
            trigger: EVENT_TRIGGER.to_string(),
            metadata: EventMetadata {
                labels: labels.cloned().unwrap_or_default(),
                annotations: filter_annotations(annotations, ANNOTATION_PREFIX),
            },
        }
    }

    /// Check that the identity fields are populated.
    pub fn validate(&self) -> Result<(), EventError> {
        for (field, value) in [
            ("certificate", &self.certificate),
            ("namespace", &self.namespace),
            ("secret_name", &self.secret_name),
        ] {
            if value.trim().is_empty() {
                return Err(EventError::EmptyIdentity { field });
            }
        }
        Ok(())
    }

    /// Canonical JSON encoding used on the wire.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
