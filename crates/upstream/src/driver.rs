//! Issues the HTTP/2 upstream request and drains its SSE response body.

use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::{Client, StatusCode};

use crate::error::{Error, Result};
use crate::sse::{DriveOutput, SseAccumulator};

/// Vendor-facing identity the upstream expects on every request. These
/// values are sent verbatim and are not secrets.
#[derive(Debug, Clone)]
pub struct ClientIdentity {
    pub client_version: String,
    pub os_category: String,
    pub os_name: String,
    pub os_version: String,
}

impl Default for ClientIdentity {
    fn default() -> Self {
        Self {
            client_version: "v0.2025.10.29.08.12.stable_01".to_string(),
            os_category: "Linux".to_string(),
            os_name: "Linux".to_string(),
            os_version: "6.6.0".to_string(),
        }
    }
}

/// Outcome of one upstream attempt, classified by HTTP status so the
/// caller can decide whether to rotate identities and retry.
#[derive(Debug)]
pub enum DriveResult {
    Success(DriveOutput),
    QuotaExhausted { body: String },
    ServerError { status: u16, body: String },
    ClientError { status: u16, body: String },
}

/// Sends `payload` (an already-encoded protobuf request body) to `url`
/// with `access_token` as the bearer credential, then drains the
/// line-oriented SSE response.
pub async fn drive(
    client: &Client,
    url: &str,
    access_token: &str,
    identity: &ClientIdentity,
    payload: Vec<u8>,
) -> Result<DriveResult> {
    let response = client
        .post(url)
        .header("accept", "text/event-stream")
        .header("content-type", "application/x-protobuf")
        .header("authorization", format!("Bearer {access_token}"))
        .header("x-warp-client-version", identity.client_version.clone())
        .header("x-warp-os-category", identity.os_category.clone())
        .header("x-warp-os-name", identity.os_name.clone())
        .header("x-warp-os-version", identity.os_version.clone())
        .body(payload)
        .send()
        .await
        .map_err(classify_reqwest_error)?;

    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        let body = response.text().await.unwrap_or_default();
        return Ok(DriveResult::QuotaExhausted { body });
    }
    if status.is_server_error() {
        let body = response.text().await.unwrap_or_default();
        return Ok(DriveResult::ServerError {
            status: status.as_u16(),
            body,
        });
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Ok(DriveResult::ClientError {
            status: status.as_u16(),
            body,
        });
    }

    let mut stream = response.bytes_stream();
    let mut accumulator = SseAccumulator::new();
    let mut buffer: Vec<u8> = Vec::new();

    'outer: while let Some(chunk) = stream.next().await {
        let chunk: Bytes = chunk.map_err(classify_reqwest_error)?;
        buffer.extend_from_slice(&chunk);

        while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
            let line_bytes: Vec<u8> = buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line_bytes);
            let line = line.trim_end_matches(['\r', '\n']);
            if accumulator.feed_line(line) {
                break 'outer;
            }
        }
    }
    if !buffer.is_empty() {
        let line = String::from_utf8_lossy(&buffer).into_owned();
        accumulator.feed_line(line.trim_end_matches(['\r', '\n']));
    }

    Ok(DriveResult::Success(accumulator.finish()))
}

/// `reqwest`'s own timeout errors (connect or whole-request deadline) are
/// reported distinctly so callers can tell a slow upstream apart from a
/// broken one.
fn classify_reqwest_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Timeout
    } else {
        Error::Network(err.to_string())
    }
}
