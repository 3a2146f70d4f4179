//! The Credential Exchanger: redeems refresh tokens for access credentials
//! and mints brand-new anonymous identities on demand.
//!
//! Two independent operations, both over TLS, both with their own timeout
//! and error taxonomy:
//! 1. [`refresh::refresh`] — the everyday refresh-token exchange.
//! 2. [`provision::provision_anonymous`] — the two-step anonymous-identity
//!    handshake (vendor GraphQL mutation, then identity-service
//!    custom-token exchange), used when the pool runs out of alternatives.

pub mod constants;
mod error;
mod provision;
mod refresh;

pub use constants::{ANONYMOUS_CREDENTIAL_ASSUMED_VALIDITY_SECS, DEFAULT_QUOTA_MESSAGES};
pub use error::{Error, Result};
pub use provision::{provision_anonymous, provision_anonymous_at, ProvisionedIdentity};
pub use refresh::{refresh, ExchangedCredential};
