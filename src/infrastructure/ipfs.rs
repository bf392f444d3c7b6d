use crate::config::PinataConfig;
use crate::domain::CertificateRecord;
use base64::Engine;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument};

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Pinata API credentials not configured")]
    NotConfigured,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Pinata upload failed ({status}): {message}")]
    Api { status: u16, message: String },
}

#[derive(Debug, Deserialize)]
struct PinResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: String,
    #[serde(rename = "PinSize", default)]
    pin_size: u64,
    #[serde(rename = "Timestamp", default)]
    timestamp: Option<String>,
}

/// A successful pin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinResult {
    pub cid: String,
    pub pin_size: u64,
    pub timestamp: Option<String>,
    pub gateway_url: String,
    pub public_url: String,
}

/// Client for Pinata's pinning API.
pub struct PinataClient {
    http: reqwest::Client,
    config: PinataConfig,
}

impl PinataClient {
    pub fn new(config: PinataConfig) -> Result<Self, ArchiveError> {
        if config.api_key.trim().is_empty() || config.secret_key.trim().is_empty() {
            return Err(ArchiveError::NotConfigured);
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { http, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.api_url.trim_end_matches('/'), path)
    }

    /// Pin raw bytes under `file_name`.
    #[instrument(skip(self, content, keyvalues), fields(bytes = content.len()))]
    pub async fn pin_file(
        &self,
        content: Vec<u8>,
        file_name: &str,
        keyvalues: Map<String, Value>,
    ) -> Result<PinResult, ArchiveError> {
        let mut values = keyvalues;
        values.insert(
            "uploadedAt".to_string(),
            Value::String(chrono::Utc::now().to_rfc3339()),
        );
        let metadata = json!({ "name": file_name, "keyvalues": values });

        let part = Part::bytes(content)
            .file_name(file_name.to_string())
            .mime_str("application/octet-stream")?;
        let form = Form::new()
            .part("file", part)
            .text("pinataMetadata", metadata.to_string());

        let response = self
            .http
            .post(self.endpoint("/pinning/pinFileToIPFS"))
            .header("pinata_api_key", &self.config.api_key)
            .header("pinata_secret_api_key", &self.config.secret_key)
            .multipart(form)
            .send()
            .await?;

        self.finish(response).await
    }

    /// Pin a JSON document.
    #[instrument(skip(self, content))]
    pub async fn pin_json(&self, content: &Value, name: &str) -> Result<PinResult, ArchiveError> {
        let body = json!({
            "pinataContent": content,
            "pinataMetadata": {
                "name": name,
                "keyvalues": {
                    "uploadedAt": chrono::Utc::now().to_rfc3339(),
                    "type": "certificate-metadata"
                }
            }
        });

        let response = self
            .http
            .post(self.endpoint("/pinning/pinJSONToIPFS"))
            .header("pinata_api_key", &self.config.api_key)
            .header("pinata_secret_api_key", &self.config.secret_key)
            .json(&body)
            .send()
            .await?;

        self.finish(response).await
    }

    async fn finish(&self, response: reqwest::Response) -> Result<PinResult, ArchiveError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), body = %message, "Pinata rejected upload");
            return Err(ArchiveError::Api {
                status: status.as_u16(),
                message: pinata_error_message(&message),
            });
        }

        let pinned: PinResponse = response.json().await?;
        info!(cid = %pinned.ipfs_hash, size = pinned.pin_size, "Pinned to IPFS");

        Ok(PinResult {
            gateway_url: format!(
                "{}/{}",
                self.config.gateway_url.trim_end_matches('/'),
                pinned.ipfs_hash
            ),
            public_url: format!(
                "{}/{}",
                self.config.public_gateway_url.trim_end_matches('/'),
                pinned.ipfs_hash
            ),
            cid: pinned.ipfs_hash,
            pin_size: pinned.pin_size,
            timestamp: pinned.timestamp,
        })
    }
}

fn pinata_error_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    match parsed.as_ref().and_then(|v| v.get("error")) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Object(o)) => o
            .get("details")
            .or_else(|| o.get("reason"))
            .and_then(Value::as_str)
            .unwrap_or("Unknown error")
            .to_string(),
        _ if body.trim().is_empty() => "Unknown error".to_string(),
        _ => body.trim().to_string(),
    }
}

/// Metadata document archived next to each certificate.
pub fn certificate_metadata(record: &CertificateRecord) -> Value {
    let proof = record
        .proof
        .as_ref()
        .map(|p| base64::engine::general_purpose::STANDARD.encode(p));

    json!({
        "version": "1.0",
        "type": "blockchain-certificate",
        "createdAt": chrono::Utc::now().to_rfc3339(),
        "certificate": {
            "id": record.certificate_id.as_str(),
            "userName": record.user_name,
            "email": record.email,
            "title": record.title,
            "fileName": record.file_name,
        },
        "verification": {
            "fileHash": record.fingerprint.as_str(),
            "hashAlgorithm": "SHA256",
            "blockchain": record.blockchain,
            "anchoringStatus": record.anchoring_status.as_str(),
            "timestamp": record.issued_at.to_rfc3339(),
            "verificationUrl": record.verification_url,
            "otsData": proof,
        },
        "ipfs": {
            "uploadedAt": chrono::Utc::now().to_rfc3339(),
            "network": "IPFS via Pinata",
        }
    })
}
