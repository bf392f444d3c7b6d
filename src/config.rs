//! Service configuration

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_VERIFICATION_URL: &str = "https://ots.tools/verify";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub log_level: String,
    /// Renderer names in preference order, e.g. `pdf,html`.
    pub renderers: Vec<String>,
    pub anchoring: AnchoringConfig,
    /// `None` disables IPFS archival.
    pub pinata: Option<PinataConfig>,
    pub webhook: WebhookConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            database_path: "./certone.db".to_string(),
            log_level: "info".to_string(),
            renderers: vec!["pdf".to_string(), "html".to_string()],
            anchoring: AnchoringConfig::default(),
            pinata: None,
            webhook: WebhookConfig::default(),
        }
    }
}

/// OpenTimestamps client settings.
#[derive(Debug, Clone)]
pub struct AnchoringConfig {
    /// Path or name of the `ots` executable.
    pub ots_binary: String,
    /// Where per-request scratch files live.
    pub scratch_dir: PathBuf,
    /// Where the latest proof per fingerprint is retained.
    pub proof_dir: PathBuf,
    /// Upper bound for any single `ots` invocation.
    pub tool_timeout_secs: u64,
    /// Human-facing verification page printed on certificates.
    pub verification_url: String,
}

impl AnchoringConfig {
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

impl Default for AnchoringConfig {
    fn default() -> Self {
        let base = std::env::temp_dir().join("certone");
        Self {
            ots_binary: "ots".to_string(),
            scratch_dir: base.join("scratch"),
            proof_dir: base.join("proofs"),
            tool_timeout_secs: 30,
            verification_url: DEFAULT_VERIFICATION_URL.to_string(),
        }
    }
}

/// Pinata IPFS pinning credentials.
#[derive(Debug, Clone)]
pub struct PinataConfig {
    pub api_key: String,
    pub secret_key: String,
    pub api_url: String,
    pub gateway_url: String,
    pub public_gateway_url: String,
    pub timeout_secs: u64,
}

impl PinataConfig {
    pub fn new(api_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            secret_key: secret_key.into(),
            api_url: "https://api.pinata.cloud".to_string(),
            gateway_url: "https://gateway.pinata.cloud/ipfs".to_string(),
            public_gateway_url: "https://ipfs.io/ipfs".to_string(),
            timeout_secs: 30,
        }
    }

    /// Both credentials present. Missing either means archival is off.
    pub fn from_credentials(api_key: Option<String>, secret_key: Option<String>) -> Option<Self> {
        match (api_key, secret_key) {
            (Some(key), Some(secret)) if !key.trim().is_empty() && !secret.trim().is_empty() => {
                Some(Self::new(key.trim(), secret.trim()))
            }
            _ => None,
        }
    }
}

/// Outbound notification webhook.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Raw configured URL; normalized before use.
    pub url: Option<String>,
    pub enabled: bool,
    pub timeout_secs: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: None,
            enabled: true,
            timeout_secs: 15,
        }
    }
}
