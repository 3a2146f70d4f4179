//! The Retry Controller: selects an identity, drives the upstream call,
//! classifies the outcome, and rotates identities within a two-attempt
//! budget per request.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Client;
use tracing::{info, instrument};

use identity::DEFAULT_QUOTA_MESSAGES;
use pool::{HealthReport, IdentityStore, PoolStats, SelectedIdentity};
use upstream::{ClientIdentity, DriveOutput, DriveResult};

use crate::config::EngineConfig;
use crate::error::{CoreError, Result};

/// Owns the shared identity pool and outbound client; cheap to clone via
/// `Arc` at the call site, mirroring the store it wraps.
pub struct Engine {
    store: Arc<IdentityStore>,
    client: Client,
    config: EngineConfig,
}

impl Engine {
    pub fn new(store: Arc<IdentityStore>, client: Client, config: EngineConfig) -> Self {
        Self { store, client, config }
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.store.stats()
    }

    pub fn health_report(&self) -> HealthReport {
        self.store.health_report()
    }

    pub fn recover_failed(&self) -> usize {
        self.store.recover()
    }

    pub fn client_identity(&self) -> &ClientIdentity {
        &self.config.client_identity
    }

    /// Runs the select → send → classify → rotate state machine for one
    /// request, returning the decoded stream or a typed, categorized
    /// failure.
    #[instrument(skip(self, payload))]
    pub async fn drive_request(&self, payload: Vec<u8>) -> Result<DriveOutput> {
        let Some(mut identity) = self.store.next() else {
            return self.drive_with_fallback_jwt(payload).await;
        };
        let mut attempt = 1u8;

        loop {
            let (access_token, validity) = self.ensure_credential(&identity).await?;

            let send = tokio::time::timeout(
                self.config.upstream_timeout,
                upstream::drive(
                    &self.client,
                    &self.config.upstream_url,
                    &access_token,
                    &self.config.client_identity,
                    payload.clone(),
                ),
            )
            .await
            .map_err(|_| CoreError::Network("upstream request timed out".to_string()))?
            .map_err(|err| CoreError::Network(err.to_string()))?;

            match send {
                DriveResult::Success(out) => {
                    self.store.mark_success(&identity.refresh_token, access_token, Instant::now() + validity);
                    if out.events.is_empty() {
                        return Err(CoreError::UpstreamProtocolError { partial: out });
                    }
                    return Ok(out);
                }
                DriveResult::QuotaExhausted { body } => {
                    let quota_hit = DEFAULT_QUOTA_MESSAGES.iter().any(|m| body.contains(m));
                    if quota_hit && attempt == 1 {
                        if let Some(next) = self.store.next_excluding(&identity.refresh_token) {
                            identity = next;
                            attempt = 2;
                            continue;
                        }
                        match self.provision_anonymous().await {
                            Ok(next) => {
                                identity = next;
                                attempt = 2;
                                continue;
                            }
                            Err(err) => {
                                // Terminal: the attempt that ran out of alternates was `identity`.
                                self.store.mark_failure(&identity.refresh_token);
                                return Err(err);
                            }
                        }
                    }
                    // Terminal: this attempt is the one that fails the request.
                    self.store.mark_failure(&identity.refresh_token);
                    return Err(CoreError::QuotaExhausted {
                        identity: identity.display_name.clone(),
                        body,
                    });
                }
                DriveResult::ServerError { status, body } => {
                    if attempt == 1 {
                        if let Some(next) = self.store.next_excluding(&identity.refresh_token) {
                            identity = next;
                            attempt = 2;
                            continue;
                        }
                    }
                    self.store.mark_failure(&identity.refresh_token);
                    return Err(CoreError::UpstreamServerError {
                        identity: identity.display_name.clone(),
                        status,
                        body,
                    });
                }
                DriveResult::ClientError { status, body } => {
                    self.store.mark_failure(&identity.refresh_token);
                    if status == 401 {
                        return Err(CoreError::UpstreamUnauthorized {
                            identity: identity.display_name.clone(),
                            body,
                        });
                    }
                    return Err(CoreError::UpstreamServerError {
                        identity: identity.display_name.clone(),
                        status,
                        body,
                    });
                }
            }
        }
    }

    /// Last resort when the pool has no selectable identity at all: drive
    /// the upstream once with a configuration-provided access token. There
    /// is no identity record backing this token, so there is nothing to
    /// rotate to on failure and nothing to update in the pool on success.
    async fn drive_with_fallback_jwt(&self, payload: Vec<u8>) -> Result<DriveOutput> {
        let Some(jwt) = self.config.fallback_jwt.clone() else {
            return Err(CoreError::PoolExhausted);
        };

        let send = tokio::time::timeout(
            self.config.upstream_timeout,
            upstream::drive(&self.client, &self.config.upstream_url, &jwt, &self.config.client_identity, payload),
        )
        .await
        .map_err(|_| CoreError::Network("upstream request timed out".to_string()))?
        .map_err(|err| CoreError::Network(err.to_string()))?;

        const FALLBACK_IDENTITY: &str = "fallback-jwt";
        match send {
            DriveResult::Success(out) => {
                if out.events.is_empty() {
                    return Err(CoreError::UpstreamProtocolError { partial: out });
                }
                Ok(out)
            }
            DriveResult::QuotaExhausted { body } => Err(CoreError::QuotaExhausted {
                identity: FALLBACK_IDENTITY.to_string(),
                body,
            }),
            DriveResult::ServerError { status, body } => Err(CoreError::UpstreamServerError {
                identity: FALLBACK_IDENTITY.to_string(),
                status,
                body,
            }),
            DriveResult::ClientError { status, body } if status == 401 => Err(CoreError::UpstreamUnauthorized {
                identity: FALLBACK_IDENTITY.to_string(),
                body,
            }),
            DriveResult::ClientError { status, body } => Err(CoreError::UpstreamServerError {
                identity: FALLBACK_IDENTITY.to_string(),
                status,
                body,
            }),
        }
    }

    /// Returns a usable access token for `identity` plus how long it is
    /// good for: its cache if still valid for more than 120 seconds,
    /// otherwise a fresh refresh.
    async fn ensure_credential(&self, identity: &SelectedIdentity) -> Result<(String, Duration)> {
        let now = Instant::now();
        if identity.has_usable_credential(now) {
            if let (Some(cached), Some(expiry)) = (&identity.cached_access_credential, identity.cached_access_expiry) {
                return Ok((cached.clone(), expiry.saturating_duration_since(now)));
            }
        }

        let exchanged = tokio::time::timeout(
            self.config.identity_timeout,
            identity::refresh(&self.client, &self.config.identity_refresh_url, &identity.refresh_token),
        )
        .await
        .map_err(|_| CoreError::Network("identity refresh timed out".to_string()))?
        .map_err(|err| CoreError::CredentialFailure {
            identity: identity.display_name.clone(),
            message: err.to_string(),
        })?;

        Ok((exchanged.access_token, Duration::from_secs(exchanged.expires_in_secs)))
    }

    async fn provision_anonymous(&self) -> Result<SelectedIdentity> {
        let provisioned = identity::provision_anonymous_at(
            &self.client,
            &self.config.graphql_url,
            &self.config.custom_token_exchange_url,
            &self.config.identity_api_key,
        )
        .await
        .map_err(|err| match err {
            identity::Error::ProvisioningRateLimited => CoreError::ProvisioningRateLimited,
            other => CoreError::CredentialFailure {
                identity: "anonymous-provisioning".to_string(),
                message: other.to_string(),
            },
        })?;

        let display_name = format!(
            "anonymous-{}",
            &provisioned.refresh_token[..provisioned.refresh_token.len().min(8)]
        );
        self.store
            .add(provisioned.refresh_token.clone(), pool::Priority::Anonymous, display_name);
        info!("provisioned a new anonymous identity after quota exhaustion");

        let validity = Duration::from_secs(identity::ANONYMOUS_CREDENTIAL_ASSUMED_VALIDITY_SECS);
        self.store.mark_success(
            &provisioned.refresh_token,
            provisioned.access_token.clone(),
            Instant::now() + validity,
        );

        self.store
            .get(&provisioned.refresh_token)
            .ok_or(CoreError::PoolExhausted)
    }
}
