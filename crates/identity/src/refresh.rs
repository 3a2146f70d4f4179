//! Credential Exchanger, operation (a): redeem a refresh token for a
//! short-lived access credential.

use serde::Deserialize;

use crate::error::{Error, Result};

/// A freshly exchanged access credential with its absolute-from-now
/// validity window.
#[derive(Debug, Clone)]
pub struct ExchangedCredential {
    pub access_token: String,
    pub expires_in_secs: u64,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    #[serde(alias = "id_token")]
    access_token: String,
    #[serde(default, deserialize_with = "deserialize_expires_in")]
    expires_in: u64,
}

/// `expires_in` on this endpoint is a string, not a number.
fn deserialize_expires_in<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(u64),
    }
    match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => s.parse().map_err(serde::de::Error::custom),
        StringOrNumber::Number(n) => Ok(n),
    }
}

/// POST `{grant_type: "refresh_token", refresh_token}` to the identity
/// service and extract an access credential plus its delta-seconds
/// validity. A non-200 or a response missing the expected fields is an
/// `Error::CredentialFailure`, attributable to the identity by the caller.
pub async fn refresh(
    client: &reqwest::Client,
    endpoint: &str,
    refresh_token: &str,
) -> Result<ExchangedCredential> {
    let response = client
        .post(endpoint)
        .json(&serde_json::json!({
            "grant_type": "refresh_token",
            "refresh_token": refresh_token,
        }))
        .send()
        .await
        .map_err(|e| Error::Network(format!("refresh request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::CredentialFailure(format!(
            "identity service returned {status}: {body}"
        )));
    }

    let parsed: RefreshResponse = response
        .json()
        .await
        .map_err(|e| Error::CredentialFailure(format!("malformed refresh response: {e}")))?;

    Ok(ExchangedCredential {
        access_token: parsed.access_token,
        expires_in_secs: parsed.expires_in,
    })
}
