//! Credential Exchanger, operation (b): mint a brand-new anonymous
//! identity via a two-step handshake — a GraphQL mutation against the
//! vendor, then a custom-token exchange against the identity service.

use serde::Deserialize;

use crate::constants::{
    CLIENT_VERSION, CREATE_ANONYMOUS_USER_MUTATION, CUSTOM_TOKEN_EXCHANGE_URL, GRAPHQL_URL,
    OS_CATEGORY, OS_NAME, OS_VERSION,
};
use crate::error::{Error, Result};

/// A newly minted anonymous identity: a durable refresh token plus an
/// immediately-usable access credential.
#[derive(Debug, Clone)]
pub struct ProvisionedIdentity {
    pub refresh_token: String,
    pub access_token: String,
}

#[derive(Debug, Deserialize)]
struct GraphQlEnvelope {
    #[serde(default)]
    data: Option<CreateAnonymousUserData>,
    #[serde(default)]
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct CreateAnonymousUserData {
    #[serde(rename = "createAnonymousUser")]
    create_anonymous_user: CreateAnonymousUserResult,
}

#[derive(Debug, Deserialize)]
struct CreateAnonymousUserResult {
    #[serde(rename = "__typename")]
    typename: String,
    #[serde(default, rename = "idToken")]
    id_token: Option<String>,
    #[serde(default)]
    error: Option<UserFacingErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct UserFacingErrorDetail {
    message: String,
}

#[derive(Debug, Deserialize)]
struct CustomTokenExchangeResponse {
    #[serde(default, rename = "refreshToken")]
    refresh_token: Option<String>,
    #[serde(default, rename = "idToken")]
    id_token: Option<String>,
}

/// Step 1: create an anonymous Warp user and obtain an `idToken` suitable
/// for the custom-token exchange. A vendor rate limit on this endpoint
/// surfaces as `Error::ProvisioningRateLimited`; any other rejection
/// (`UserFacingError`, top-level GraphQL `errors`) is `Error::VendorRejected`
/// carrying the vendor's message verbatim.
async fn create_anonymous_user(client: &reqwest::Client, graphql_url: &str) -> Result<String> {
    let variables = serde_json::json!({
        "input": {
            "anonymousUserType": "NATIVE_CLIENT_ANONYMOUS_USER_FEATURE_GATED",
            "expirationType": "NO_EXPIRATION",
            "referralCode": null,
        },
        "requestContext": {
            "clientContext": { "version": CLIENT_VERSION },
            "osContext": {
                "category": OS_CATEGORY,
                "linuxKernelVersion": null,
                "name": OS_NAME,
                "version": OS_VERSION,
            },
        },
    });

    let body = serde_json::json!({
        "query": CREATE_ANONYMOUS_USER_MUTATION,
        "variables": variables,
        "operationName": "CreateAnonymousUser",
    });

    let response = client
        .post(graphql_url)
        .header("content-type", "application/json")
        .header("user-agent", format!("Warp/{CLIENT_VERSION}"))
        .json(&body)
        .send()
        .await
        .map_err(|e| Error::Network(format!("anonymous-user creation failed: {e}")))?;

    let status = response.status();
    if status.as_u16() == 429 {
        return Err(Error::ProvisioningRateLimited);
    }
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(Error::VendorRejected(format!("{status}: {text}")));
    }

    let envelope: GraphQlEnvelope = response
        .json()
        .await
        .map_err(|e| Error::MalformedResponse(format!("invalid GraphQL response: {e}")))?;

    if let Some(errors) = envelope.errors {
        let message = errors
            .into_iter()
            .map(|e| e.message)
            .collect::<Vec<_>>()
            .join("; ");
        return Err(Error::VendorRejected(message));
    }

    let result = envelope
        .data
        .ok_or_else(|| Error::MalformedResponse("missing GraphQL data".into()))?
        .create_anonymous_user;

    if result.typename == "UserFacingError" {
        let message = result
            .error
            .map(|e| e.message)
            .unwrap_or_else(|| "unknown vendor error".into());
        return Err(Error::VendorRejected(message));
    }

    result
        .id_token
        .ok_or_else(|| Error::MalformedResponse("response missing idToken".into()))
}

/// Step 2: exchange the id token for a durable refresh token and an
/// immediately-usable access credential.
async fn exchange_id_token(
    client: &reqwest::Client,
    exchange_url: &str,
    api_key: &str,
    id_token: &str,
) -> Result<ProvisionedIdentity> {
    let url = format!("{exchange_url}?key={api_key}");
    let response = client
        .post(&url)
        .json(&serde_json::json!({
            "token": id_token,
            "returnSecureToken": true,
        }))
        .send()
        .await
        .map_err(|e| Error::Network(format!("id-token exchange failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(Error::CredentialFailure(format!("{status}: {text}")));
    }

    let parsed: CustomTokenExchangeResponse = response
        .json()
        .await
        .map_err(|e| Error::MalformedResponse(format!("invalid exchange response: {e}")))?;

    let refresh_token = parsed
        .refresh_token
        .ok_or_else(|| Error::MalformedResponse("response missing refreshToken".into()))?;
    let access_token = parsed
        .id_token
        .ok_or_else(|| Error::MalformedResponse("response missing idToken".into()))?;

    Ok(ProvisionedIdentity {
        refresh_token,
        access_token,
    })
}

/// Full two-step anonymous provisioning handshake using the default vendor
/// and identity-service endpoints.
pub async fn provision_anonymous(client: &reqwest::Client, api_key: &str) -> Result<ProvisionedIdentity> {
    provision_anonymous_at(client, GRAPHQL_URL, CUSTOM_TOKEN_EXCHANGE_URL, api_key).await
}

/// Same as [`provision_anonymous`] but with explicit endpoints, for testing
/// against a mock server.
pub async fn provision_anonymous_at(
    client: &reqwest::Client,
    graphql_url: &str,
    exchange_url: &str,
    api_key: &str,
) -> Result<ProvisionedIdentity> {
    let id_token = create_anonymous_user(client, graphql_url).await?;
    exchange_id_token(client, exchange_url, api_key, &id_token).await
}
