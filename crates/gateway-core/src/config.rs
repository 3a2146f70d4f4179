//! Endpoint and timing configuration the engine needs to drive a
//! request. Kept distinct from the demonstration binary's configuration
//! loader so the engine can be constructed directly in tests.

use std::time::Duration;

use identity::constants::{CUSTOM_TOKEN_EXCHANGE_URL, GRAPHQL_URL};
use upstream::ClientIdentity;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub upstream_url: String,
    pub identity_refresh_url: String,
    pub identity_api_key: String,
    /// Overridable so tests can point provisioning at a mock server; in
    /// production these default to the real vendor endpoints.
    pub graphql_url: String,
    pub custom_token_exchange_url: String,
    pub client_identity: ClientIdentity,
    pub upstream_timeout: Duration,
    pub identity_timeout: Duration,
    /// A pre-exchanged access token to drive the upstream with directly
    /// when the pool has no selectable identity at all. Not pool-tracked:
    /// its use is neither preceded by a credential refresh nor followed by
    /// `mark_success`/`mark_failure` bookkeeping.
    pub fallback_jwt: Option<String>,
}

impl EngineConfig {
    pub fn new(upstream_url: impl Into<String>, identity_refresh_url: impl Into<String>, identity_api_key: impl Into<String>) -> Self {
        Self {
            upstream_url: upstream_url.into(),
            identity_refresh_url: identity_refresh_url.into(),
            identity_api_key: identity_api_key.into(),
            graphql_url: GRAPHQL_URL.to_string(),
            custom_token_exchange_url: CUSTOM_TOKEN_EXCHANGE_URL.to_string(),
            client_identity: ClientIdentity::default(),
            upstream_timeout: Duration::from_secs(60),
            identity_timeout: Duration::from_secs(30),
            fallback_jwt: None,
        }
    }
}
