use crate::config::WebhookConfig;
use crate::domain::CertificateLogEntry;
use crate::rendering::CertificateArtifact;
use base64::Engine;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Result of a notification attempt. Delivery problems are reported here,
/// never raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookOutcome {
    pub delivered: bool,
    pub details: String,
    pub status: Option<u16>,
}

impl WebhookOutcome {
    fn skipped(details: impl Into<String>) -> Self {
        Self {
            delivered: false,
            details: details.into(),
            status: None,
        }
    }
}

/// Accept the forms people paste from automation dashboards:
/// `id@hook.us2.make.com`, bare hosts, and full URLs.
pub fn normalize_webhook_url(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("webhook URL is empty".to_string());
    }

    let candidate = if !trimmed.starts_with("http") && trimmed.contains("@hook.") {
        match trimmed.split_once('@') {
            Some((id, domain)) if !id.is_empty() && !domain.is_empty() => {
                format!("https://{}/{}", domain, id)
            }
            _ => trimmed.to_string(),
        }
    } else if !trimmed.starts_with("http") {
        format!("https://{}", trimmed)
    } else {
        trimmed.to_string()
    };

    match reqwest::Url::parse(&candidate) {
        Ok(url) if url.host_str().is_some() => Ok(url.to_string()),
        _ => Err(format!(
            "invalid webhook URL format: {} (expected https://hook.example.com/WEBHOOK_ID)",
            raw
        )),
    }
}

pub struct WebhookNotifier {
    http: reqwest::Client,
    config: WebhookConfig,
}

impl WebhookNotifier {
    pub fn new(config: WebhookConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("certone/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, config })
    }

    pub fn payload(entry: &CertificateLogEntry, artifact: &CertificateArtifact) -> Value {
        let record = &entry.record;
        json!({
            "certificate_id": record.certificate_id.as_str(),
            "user_name": record.user_name,
            "email": record.email,
            "title": record.title,
            "file_name": record.file_name,
            "file_hash": record.fingerprint.as_str(),
            "timestamp": record.issued_at.to_rfc3339(),
            "blockchain": record.blockchain,
            "anchoring_status": record.anchoring_status.as_str(),
            "verification_url": record.verification_url,
            "ots_url": record.calendar_url,
            "ipfs_cid": entry.archive.ipfs_cid,
            "ipfs_url": entry.archive.ipfs_url,
            "ipfs_metadata_url": entry.archive.ipfs_metadata_url,
            "certificate_attachment": {
                "filename": artifact.file_name(record),
                "content": base64::engine::general_purpose::STANDARD.encode(&artifact.bytes),
                "contentType": artifact.kind.content_type(),
            },
            "system_info": {
                "generated_by": "certone",
                "api_version": env!("CARGO_PKG_VERSION"),
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }
        })
    }

    #[instrument(skip_all, fields(certificate_id = %entry.record.certificate_id))]
    pub async fn notify(
        &self,
        entry: &CertificateLogEntry,
        artifact: &CertificateArtifact,
    ) -> WebhookOutcome {
        let Some(raw_url) = self.config.url.as_deref() else {
            return WebhookOutcome::skipped("Webhook URL not configured");
        };

        let url = match normalize_webhook_url(raw_url) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Webhook URL rejected");
                return WebhookOutcome::skipped(e);
            }
        };

        if !self.config.enabled {
            return WebhookOutcome::skipped("Webhook disabled via configuration");
        }

        if entry
            .record
            .email
            .as_deref()
            .map_or(true, |e| e.trim().is_empty())
        {
            return WebhookOutcome::skipped("No email address provided");
        }

        let payload = Self::payload(entry, artifact);
        match self.http.post(&url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                let status = response.status().as_u16();
                info!(status, "Webhook delivered");
                WebhookOutcome {
                    delivered: true,
                    details: format!("Notification sent to webhook ({})", status),
                    status: Some(status),
                }
            }
            Ok(response) => {
                let status = response.status();
                warn!(status = status.as_u16(), "Webhook rejected notification");
                WebhookOutcome {
                    delivered: false,
                    details: format!("Webhook request failed: {}", status),
                    status: Some(status.as_u16()),
                }
            }
            Err(e) => {
                warn!(error = %e, "Webhook request failed");
                WebhookOutcome::skipped(format!("Webhook failed: {}", e))
            }
        }
    }
}
