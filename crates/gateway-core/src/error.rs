//! The error taxonomy returned across the core's public boundary. Every
//! failure is classified into exactly one category; identity-specific
//! material (refresh tokens) never appears in a `Display` impl, only a
//! record's `display_name`.

use upstream::DriveOutput;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("identity credential failure for {identity}: {message}")]
    CredentialFailure { identity: String, message: String },

    #[error("upstream quota exhausted for {identity}")]
    QuotaExhausted { identity: String, body: String },

    #[error("upstream server error (status {status}) for {identity}")]
    UpstreamServerError {
        identity: String,
        status: u16,
        body: String,
    },

    #[error("upstream rejected request as unauthorized for {identity}")]
    UpstreamUnauthorized { identity: String, body: String },

    #[error("upstream returned an unparseable event stream")]
    UpstreamProtocolError { partial: DriveOutput },

    #[error("network error: {0}")]
    Network(String),

    #[error("provisioning rate-limited")]
    ProvisioningRateLimited,

    #[error("identity pool exhausted")]
    PoolExhausted,
}

impl CoreError {
    /// One of the eight taxonomy categories, suitable for inclusion in an
    /// OpenAI-style error envelope by the outer layer.
    pub fn category(&self) -> &'static str {
        match self {
            Self::CredentialFailure { .. } => "identity_credential_failure",
            Self::QuotaExhausted { .. } => "upstream_quota_exhausted",
            Self::UpstreamServerError { .. } => "upstream_server_error",
            Self::UpstreamUnauthorized { .. } => "upstream_unauthorized",
            Self::UpstreamProtocolError { .. } => "upstream_protocol_error",
            Self::Network(_) => "network_error",
            Self::ProvisioningRateLimited => "provisioning_rate_limited",
            Self::PoolExhausted => "pool_exhausted",
        }
    }

    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::UpstreamServerError { status, .. } => Some(*status),
            Self::UpstreamUnauthorized { .. } => Some(401),
            Self::QuotaExhausted { .. } => Some(429),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
