//! Configuration: TOML file for structural defaults, environment
//! variables layered on top for secrets and feature flags.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use base64::Engine;
use common::Secret;
use pool::Priority;
use serde::Deserialize;

use crate::error::{Error, Result};

/// A refresh token queued for the pool at startup, still wrapped so it
/// never prints in a `Debug` derive along the way.
pub struct SeedIdentity {
    pub refresh_token: Secret<String>,
    pub priority: Priority,
    pub display_name: String,
}

/// Structural defaults read from the TOML file. None of these fields are
/// secret; they are safe to commit and to template.
#[derive(Debug, Deserialize)]
struct FileConfig {
    listen_addr: SocketAddr,
    #[serde(default = "default_recovery_interval_secs")]
    recovery_interval_secs: u64,
    #[serde(default = "default_upstream_url")]
    upstream_url: String,
    #[serde(default = "default_identity_refresh_url")]
    identity_refresh_url: String,
}

fn default_recovery_interval_secs() -> u64 {
    300
}

fn default_upstream_url() -> String {
    "https://app.warp.dev/ai/multi-agent".to_string()
}

fn default_identity_refresh_url() -> String {
    identity::constants::REFRESH_TOKEN_URL.to_string()
}

/// A base64-encoded placeholder refresh token, decoded and used as the
/// anonymous identity when `WARP_ANONYMOUS_TOKEN` is not set. Standing
/// in for the real built-in vendor token this service would ship with.
const DEFAULT_ANONYMOUS_TOKEN_B64: &str = "ZGVtby1hbm9ueW1vdXMtcmVmcmVzaC10b2tlbg==";

pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub recovery_interval_secs: u64,
    pub upstream_url: String,
    pub identity_refresh_url: String,
    pub identity_api_key: Secret<String>,
    pub insecure_tls: bool,
    pub proxy_url: Option<String>,
    pub seed_identities: Vec<SeedIdentity>,
    /// Last-resort access token used when the pool has no selectable
    /// identity at all. Unset by default; operators opt in via
    /// `WARP_FALLBACK_JWT`.
    pub fallback_jwt: Option<Secret<String>>,
}

impl AppConfig {
    /// `--config <path>` if present, else `GATEWAY_CORE_CONFIG`, else
    /// `./config.toml` in the current directory.
    pub fn resolve_path(cli_arg: Option<&str>) -> PathBuf {
        if let Some(path) = cli_arg {
            return PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("GATEWAY_CORE_CONFIG") {
            return PathBuf::from(path);
        }
        PathBuf::from("config.toml")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("reading {}: {e}", path.display())))?;
        let file: FileConfig = toml::from_str(&raw).map_err(|e| Error::Config(format!("parsing {}: {e}", path.display())))?;

        let upstream_url = std::env::var("WARP_UPSTREAM_URL").unwrap_or(file.upstream_url);
        let identity_refresh_url = std::env::var("WARP_IDENTITY_REFRESH_URL").unwrap_or(file.identity_refresh_url);
        let identity_api_key = std::env::var("WARP_IDENTITY_API_KEY")
            .map_err(|_| Error::Config("WARP_IDENTITY_API_KEY is required".to_string()))?;
        let insecure_tls = std::env::var("WARP_INSECURE_TLS")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        let proxy_url = std::env::var("WARP_PROXY_URL").ok();
        let fallback_jwt = std::env::var("WARP_FALLBACK_JWT").ok().map(Secret::new);

        Ok(Self {
            listen_addr: file.listen_addr,
            recovery_interval_secs: file.recovery_interval_secs,
            upstream_url,
            identity_refresh_url,
            identity_api_key: Secret::new(identity_api_key),
            insecure_tls,
            proxy_url,
            seed_identities: Self::load_seed_identities(),
            fallback_jwt,
        })
    }

    fn load_seed_identities() -> Vec<SeedIdentity> {
        let mut seeds = Vec::new();

        if let Ok(token) = std::env::var("WARP_REFRESH_TOKEN") {
            seeds.push(SeedIdentity {
                refresh_token: Secret::new(token),
                priority: Priority::Personal,
                display_name: "personal-primary".to_string(),
            });
        }

        for (i, token) in split_tokens("WARP_PERSONAL_TOKENS").into_iter().enumerate() {
            seeds.push(SeedIdentity {
                refresh_token: Secret::new(token),
                priority: Priority::Personal,
                display_name: format!("personal-{i}"),
            });
        }

        for (i, token) in split_tokens("WARP_SHARED_TOKENS").into_iter().enumerate() {
            seeds.push(SeedIdentity {
                refresh_token: Secret::new(token),
                priority: Priority::Shared,
                display_name: format!("shared-{i}"),
            });
        }

        let anonymous_token = std::env::var("WARP_ANONYMOUS_TOKEN").ok().unwrap_or_else(|| {
            let decoded = base64::engine::general_purpose::STANDARD
                .decode(DEFAULT_ANONYMOUS_TOKEN_B64)
                .expect("built-in anonymous token constant must be valid base64");
            String::from_utf8(decoded).expect("built-in anonymous token constant must be valid utf-8")
        });
        seeds.push(SeedIdentity {
            refresh_token: Secret::new(anonymous_token),
            priority: Priority::Anonymous,
            display_name: "anonymous-default".to_string(),
        });

        seeds
    }
}

fn split_tokens(var: &str) -> Vec<String> {
    std::env::var(var)
        .ok()
        .map(|raw| raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect())
        .unwrap_or_default()
}
