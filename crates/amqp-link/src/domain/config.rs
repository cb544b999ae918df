//! Link configuration with validation.
//!
//! The broker URL is the only connection parameter accepted. It is validated
//! once, at construction, so a bad value fails fast instead of surfacing as a
//! retryable connectivity error later.

use url::Url;

use super::backoff::BackoffPolicy;
use crate::error::LinkError;

/// URL schemes the link accepts.
pub const SUPPORTED_SCHEMES: [&str; 2] = ["amqp", "amqps"];

/// Validated configuration for a [`crate::ConnectionManager`].
#[derive(Debug, Clone)]
pub struct LinkConfig {
    url: String,
    redacted: String,
    backoff: BackoffPolicy,
}

impl LinkConfig {
    /// Validate `url` and build a config with the default backoff policy.
    pub fn new(url: impl Into<String>) -> Result<Self, LinkError> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(LinkError::Config("broker URL is empty".to_string()));
        }

        let mut parsed = Url::parse(&url)
            .map_err(|e| LinkError::Config(format!("invalid broker URL: {e}")))?;

        if !SUPPORTED_SCHEMES.contains(&parsed.scheme()) {
            return Err(LinkError::Config(format!(
                "unsupported broker URL scheme `{}` (expected one of {})",
                parsed.scheme(),
                SUPPORTED_SCHEMES.join(", ")
            )));
        }
        if parsed.host_str().map_or(true, str::is_empty) {
            return Err(LinkError::Config("broker URL has no host".to_string()));
        }

        if parsed.password().is_some() {
            // Only fails for cannot-be-a-base URLs, which have no host.
            let _ = parsed.set_password(Some("***"));
        }

        Ok(Self {
            url,
            redacted: parsed.to_string(),
            backoff: BackoffPolicy::default(),
        })
    }

    /// Replace the reconnection backoff policy.
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// The URL exactly as supplied.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The URL with any password masked, safe for logs.
    pub fn redacted_url(&self) -> &str {
        &self.redacted
    }

    pub fn backoff(&self) -> BackoffPolicy {
        self.backoff
    }
}
