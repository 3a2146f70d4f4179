//! Warp identity-service and vendor endpoint constants.
//!
//! These values are not secrets — they identify the public client surface
//! and the fixed wire shape of the anonymous-provisioning handshake. The
//! actual secrets (refresh tokens, the identity-service API key) come from
//! configuration.

/// GraphQL endpoint for the `CreateAnonymousUser` mutation.
pub const GRAPHQL_URL: &str = "https://app.warp.dev/graphql/v2?op=CreateAnonymousUser";

/// Identity-service custom-token exchange endpoint (step 2 of provisioning).
pub const CUSTOM_TOKEN_EXCHANGE_URL: &str =
    "https://identitytoolkit.googleapis.com/v1/accounts:signInWithCustomToken";

/// Identity-service refresh-token exchange endpoint.
pub const REFRESH_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1/token";

/// Fixed client/OS descriptor headers sent with every provisioning call.
/// Compatibility-critical: must match what the vendor's own client sends.
pub const CLIENT_VERSION: &str = "v0.2025.10.29.08.12.stable_01";
pub const OS_CATEGORY: &str = "WINDOWS";
pub const OS_NAME: &str = "Windows";
pub const OS_VERSION: &str = "10.0.22631";

/// The fixed GraphQL mutation text, preserved verbatim. The vendor is
/// strict about the exact shape of this document.
pub const CREATE_ANONYMOUS_USER_MUTATION: &str = r#"
mutation CreateAnonymousUser($input: CreateAnonymousUserInput!, $requestContext: RequestContext!) {
  createAnonymousUser(input: $input, requestContext: $requestContext) {
    __typename
    ... on CreateAnonymousUserOutput {
      expiresAt
      anonymousUserType
      firebaseUid
      idToken
      isInviteValid
      responseContext { serverVersion }
    }
    ... on UserFacingError {
      error { __typename message }
      responseContext { serverVersion }
    }
  }
}
"#;

/// Known substrings of a 429 body that indicate quota exhaustion rather
/// than some other client error. Treated as configuration per the design
/// notes: the vendor's exact wording is not guaranteed stable.
pub const DEFAULT_QUOTA_MESSAGES: &[&str] = &["No remaining quota", "No AI requests remaining"];

/// A cached anonymous credential is given this conservative fixed validity:
/// the custom-token exchange does not return an `expires_in`, so the next
/// use of this identity forces a real refresh instead of assuming a
/// lifetime that was never communicated.
pub const ANONYMOUS_CREDENTIAL_ASSUMED_VALIDITY_SECS: u64 = 60;
