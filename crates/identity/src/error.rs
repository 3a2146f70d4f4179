//! Error types for Credential Exchanger operations.

/// Errors from identity-service and vendor interactions.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("network error: {0}")]
    Network(String),

    #[error("identity credential failure: {0}")]
    CredentialFailure(String),

    #[error("vendor rejected provisioning: {0}")]
    VendorRejected(String),

    #[error("provisioning rate-limited")]
    ProvisioningRateLimited,

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Result alias for identity operations.
pub type Result<T> = std::result::Result<T, Error>;
