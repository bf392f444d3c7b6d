use crate::domain::fingerprint::{CertificateId, ContentFingerprint};
use crate::domain::proof::{base64_bytes, TimestampSubmissionResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_USER_NAME: &str = "Anonymous";
pub const DEFAULT_TITLE: &str = "Untitled";
pub const DEFAULT_FILE_NAME: &str = "text-input.txt";
pub const BLOCKCHAIN_LABEL: &str = "Bitcoin (OpenTimestamps)";

/// Anchoring status reported on a certificate and in the `x-anchoring-status`
/// header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchoringStatus {
    /// The anchoring system accepted the digest and returned a receipt.
    /// Confirmation in a block is tracked by the proof, not the certificate.
    Success,
    Failed,
}

impl AnchoringStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnchoringStatus::Success => "success",
            AnchoringStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "success" => Some(AnchoringStatus::Success),
            "failed" => Some(AnchoringStatus::Failed),
            _ => None,
        }
    }

    fn from_submission(submission: &TimestampSubmissionResult) -> Self {
        if submission.success && submission.proof_artifact.is_some() {
            AnchoringStatus::Success
        } else {
            AnchoringStatus::Failed
        }
    }
}

/// Who asked for the certificate. Every field is optional on input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submitter {
    pub user_name: Option<String>,
    pub email: Option<String>,
    pub title: Option<String>,
    pub file_name: Option<String>,
}

impl Submitter {
    fn normalized(value: Option<String>) -> Option<String> {
        value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

/// A certificate as issued. Built once per issuance and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRecord {
    pub certificate_id: CertificateId,
    pub fingerprint: ContentFingerprint,
    #[serde(with = "base64_bytes")]
    pub proof: Option<Vec<u8>>,
    pub anchoring_status: AnchoringStatus,
    pub user_name: String,
    pub email: Option<String>,
    pub title: String,
    pub file_name: String,
    pub blockchain: String,
    pub verification_url: String,
    pub calendar_url: Option<String>,
    pub issued_at: DateTime<Utc>,
}

impl CertificateRecord {
    pub fn issue(
        submission: &TimestampSubmissionResult,
        submitter: Submitter,
        issued_at: DateTime<Utc>,
    ) -> Self {
        let certificate_id = CertificateId::derive_with_nonce(
            &submission.fingerprint,
            issued_at.timestamp_millis(),
            &Uuid::new_v4(),
        );

        Self {
            certificate_id,
            fingerprint: submission.fingerprint.clone(),
            proof: submission.proof_artifact.clone(),
            anchoring_status: AnchoringStatus::from_submission(submission),
            user_name: Submitter::normalized(submitter.user_name)
                .unwrap_or_else(|| DEFAULT_USER_NAME.to_string()),
            email: Submitter::normalized(submitter.email),
            title: Submitter::normalized(submitter.title)
                .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            file_name: Submitter::normalized(submitter.file_name)
                .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string()),
            blockchain: BLOCKCHAIN_LABEL.to_string(),
            verification_url: submission.verification_url.clone(),
            calendar_url: submission.calendar_url.clone(),
            issued_at,
        }
    }
}

/// Where a certificate ended up after archival.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveRefs {
    pub ipfs_cid: Option<String>,
    pub ipfs_url: Option<String>,
    pub ipfs_metadata_url: Option<String>,
}

/// Row of the certificate log: the record plus its archival side effects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateLogEntry {
    #[serde(flatten)]
    pub record: CertificateRecord,
    #[serde(flatten)]
    pub archive: ArchiveRefs,
}
