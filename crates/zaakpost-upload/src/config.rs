//! Upload subsystem configuration.
//!
//! A small set of named constants rather than a parsed external format:
//! the embedding application constructs an [`UploadConfig`] (usually the
//! default) and hands it to the components that need it.

use std::time::Duration;

use crate::retry::RetryConfig;

/// Configuration shared by the token cache and the orchestrator.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// OAuth scopes requested on every token acquisition.
    pub scopes: Vec<String>,

    /// Audience the acquired token must be addressed to.
    pub expected_audience: String,

    /// A cached token is only reused if it stays valid at least this long.
    pub token_margin: Duration,

    /// Assumed lifetime for a token whose expiry claim cannot be decoded.
    pub default_token_lifetime: Duration,

    /// Retry/backoff knobs for per-item submissions.
    pub retry: RetryConfig,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            scopes: vec![
                "https://graph.microsoft.com/Mail.Read".to_string(),
                "https://graph.microsoft.com/User.Read".to_string(),
            ],
            expected_audience: "https://graph.microsoft.com".to_string(),
            token_margin: Duration::from_secs(5 * 60),
            default_token_lifetime: Duration::from_secs(50 * 60),
            retry: RetryConfig::default(),
        }
    }
}
