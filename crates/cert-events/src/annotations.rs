//! # Annotation Helpers
//!
//! Parsing and filtering of the `cert-webhook.golder.tech/` annotation namespace.

use std::collections::BTreeMap;

use crate::{ANNOTATION_PREFIX, ENABLED_LABEL};

/// Annotation suffix for the deployment target type.
pub const TARGET_KEY: &str = "target";
/// Annotation suffix for the Docker engine host.
pub const DOCKER_ENGINE_KEY: &str = "docker-engine";
/// Annotation suffix for the docker-compose project path.
pub const DOCKER_COMPOSE_PATH_KEY: &str = "docker-compose-path";
/// Annotation suffix for the comma separated container list.
pub const CONTAINER_NAMES_KEY: &str = "container-names";
/// Annotation suffix overriding the exchange.
pub const EXCHANGE_KEY: &str = "rabbitmq-exchange";
/// Annotation suffix overriding the routing key.
pub const ROUTING_KEY_KEY: &str = "rabbitmq-routing-key";

/// Look up `ANNOTATION_PREFIX + suffix`, returning `""` when absent.
pub(crate) fn prefixed<'a>(annotations: &'a BTreeMap<String, String>, suffix: &str) -> &'a str {
    annotations
        .get(&format!("{ANNOTATION_PREFIX}{suffix}"))
        .map(String::as_str)
        .unwrap_or_default()
}

/// Parse a comma separated container list.
///
/// Tokens are trimmed and empty tokens dropped, so `"a, ,b,"` yields
/// `["a", "b"]`. Order is preserved.
#[must_use]
pub fn parse_container_names(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Keep only the annotations whose key starts with `prefix`, copied verbatim.
#[must_use]
pub fn filter_annotations(
    annotations: Option<&BTreeMap<String, String>>,
    prefix: &str,
) -> BTreeMap<String, String> {
    annotations
        .into_iter()
        .flatten()
        .filter(|(key, _)| key.starts_with(prefix))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Whether a resource opted in to renewal events via [`ENABLED_LABEL`].
#[must_use]
pub fn is_relay_enabled(labels: Option<&BTreeMap<String, String>>) -> bool {
    labels
        .and_then(|labels| labels.get(ENABLED_LABEL))
        .is_some_and(|value| value == "true")
}
