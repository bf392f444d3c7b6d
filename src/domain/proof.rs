use crate::domain::fingerprint::ContentFingerprint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a timestamp proof.
///
/// `Pending` proofs are expected and temporary: the calendar has accepted the
/// digest but it is not yet embedded in a Bitcoin block. The transition to
/// `Confirmed` happens outside this system and is only observed on
/// verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProofState {
    Pending,
    Confirmed,
    Failed,
}

impl std::fmt::Display for ProofState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProofState::Pending => write!(f, "pending"),
            ProofState::Confirmed => write!(f, "confirmed"),
            ProofState::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome of one hand-off to the anchoring system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampSubmissionResult {
    pub success: bool,
    pub fingerprint: ContentFingerprint,
    #[serde(with = "base64_bytes")]
    pub proof_artifact: Option<Vec<u8>>,
    pub verification_url: String,
    pub calendar_url: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub state: ProofState,
    pub message: String,
    pub error: Option<String>,
}

impl TimestampSubmissionResult {
    pub fn pending(
        fingerprint: ContentFingerprint,
        proof_artifact: Vec<u8>,
        verification_url: String,
        calendar_url: Option<String>,
    ) -> Self {
        Self {
            success: true,
            fingerprint,
            proof_artifact: Some(proof_artifact),
            verification_url,
            calendar_url,
            submitted_at: Utc::now(),
            state: ProofState::Pending,
            message: "Hash submitted to Bitcoin via OpenTimestamps - confirmation expected in 1-6 hours"
                .to_string(),
            error: None,
        }
    }

    pub fn failed(
        fingerprint: ContentFingerprint,
        verification_url: String,
        error: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            fingerprint,
            proof_artifact: None,
            verification_url,
            calendar_url: None,
            submitted_at: Utc::now(),
            state: ProofState::Failed,
            message: "Timestamp submission failed - resubmit to retry".to_string(),
            error: Some(error.into()),
        }
    }

    /// RFC 3339 rendering of the submission instant.
    pub fn submitted_at_iso(&self) -> String {
        self.submitted_at.to_rfc3339()
    }
}

/// Outcome of checking a proof against a fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub verified: bool,
    pub state: ProofState,
    /// Raw diagnostics from the verification routine.
    pub output: String,
    pub error: Option<String>,
    /// Bitcoin block height reported as attesting the digest.
    pub attested_block: Option<u64>,
}

impl VerificationResult {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            verified: false,
            state: ProofState::Failed,
            output: String::new(),
            error: Some(error.into()),
            attested_block: None,
        }
    }
}

/// Serde adapter carrying optional binary artifacts as standard base64.
pub mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(bytes) => {
                serializer.serialize_some(&base64::engine::general_purpose::STANDARD.encode(bytes))
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        encoded
            .map(|s| {
                base64::engine::general_purpose::STANDARD
                    .decode(s)
                    .map_err(serde::de::Error::custom)
            })
            .transpose()
    }
}
