use crate::domain::{ContentFingerprint, InputError, ProofState, Submitter, VerificationResult};
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Content to certify or hash, as it arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
}

impl Payload {
    /// Exactly one of `text` or base64 `content` must be given.
    pub fn from_parts(text: Option<String>, content: Option<String>) -> Result<Self, InputError> {
        match (text, content) {
            (Some(_), Some(_)) => Err(InputError::InvalidRequest(
                "provide either text or content, not both".to_string(),
            )),
            (Some(text), None) => Ok(Payload::Text(text)),
            (None, Some(encoded)) => base64::engine::general_purpose::STANDARD
                .decode(encoded.trim())
                .map(Payload::Binary)
                .map_err(|e| InputError::InvalidRequest(format!("invalid base64 content: {}", e))),
            (None, None) => Err(InputError::EmptyText),
        }
    }

    pub fn fingerprint(&self) -> Result<ContentFingerprint, InputError> {
        match self {
            Payload::Text(text) => ContentFingerprint::from_text(text),
            Payload::Binary(bytes) => ContentFingerprint::from_bytes(bytes),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Payload::Text(text) => text.as_bytes(),
            Payload::Binary(bytes) => bytes,
        }
    }
}

/// Body of `POST /api/certify`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CertifyRequest {
    pub text: Option<String>,
    /// Base64-encoded file content
    pub content: Option<String>,
    pub file_name: Option<String>,
    pub user_name: Option<String>,
    pub email: Option<String>,
    pub title: Option<String>,
}

impl CertifyRequest {
    pub fn into_parts(self) -> Result<(Payload, Submitter), InputError> {
        let payload = Payload::from_parts(self.text, self.content)?;
        let submitter = Submitter {
            user_name: self.user_name,
            email: self.email,
            title: self.title,
            file_name: self.file_name,
        };
        Ok((payload, submitter))
    }
}

/// Body of `POST /api/hash`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HashRequest {
    pub text: Option<String>,
    pub content: Option<String>,
}

/// Body of `POST /api/verify`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VerifyRequest {
    /// SHA-256 hash (64 hex characters)
    pub fingerprint: String,
    /// Base64-encoded `.ots` proof; the retained one is used when absent
    #[serde(default)]
    pub proof: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct VerifyResponse {
    pub fingerprint: String,
    pub verified: bool,
    pub state: ProofState,
    pub message: String,
    pub verification_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attested_block: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl VerifyResponse {
    pub fn no_proof(fingerprint: &ContentFingerprint, verification_url: &str) -> Self {
        Self {
            fingerprint: fingerprint.to_string(),
            verified: false,
            state: ProofState::Failed,
            message: "no proof found".to_string(),
            verification_url: verification_url.to_string(),
            attested_block: None,
            output: None,
        }
    }

    pub fn from_result(
        fingerprint: &ContentFingerprint,
        result: VerificationResult,
        verification_url: &str,
    ) -> Self {
        let message = match (result.verified, result.state, result.attested_block) {
            (true, _, Some(block)) => format!("Bitcoin block {} attests existence", block),
            (true, _, None) => "Proof verified".to_string(),
            (false, ProofState::Pending, _) => {
                "Proof pending confirmation, try again later".to_string()
            }
            (false, _, _) => result
                .error
                .clone()
                .unwrap_or_else(|| "Proof could not be verified".to_string()),
        };

        Self {
            fingerprint: fingerprint.to_string(),
            verified: result.verified,
            state: result.state,
            message,
            verification_url: verification_url.to_string(),
            attested_block: result.attested_block,
            output: Some(result.output).filter(|o| !o.is_empty()),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub certificates: usize,
}
