use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

/// Prefix carried by every certificate identifier.
pub const CERTIFICATE_ID_PREFIX: &str = "CERT_";

/// Number of digest hex characters kept in a certificate identifier.
const CERTIFICATE_ID_DIGEST_LEN: usize = 16;

/// Rejections raised at the API boundary before any external work starts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("Text input is required")]
    EmptyText,

    #[error("Content cannot be empty")]
    EmptyContent,

    #[error("Invalid fingerprint: must be 64 hexadecimal characters")]
    InvalidFingerprint,

    #[error("Invalid proof: {0}")]
    InvalidProof(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Failed to read content: {0}")]
    Unreadable(String),
}

/// SHA-256 digest of a piece of content, as 64 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentFingerprint(String);

impl ContentFingerprint {
    /// Fingerprint UTF-8 text.
    pub fn from_text(text: &str) -> Result<Self, InputError> {
        if text.is_empty() {
            return Err(InputError::EmptyText);
        }
        Ok(Self::digest(text.as_bytes()))
    }

    /// Fingerprint raw bytes (uploaded files).
    pub fn from_bytes(content: &[u8]) -> Result<Self, InputError> {
        if content.is_empty() {
            return Err(InputError::EmptyContent);
        }
        Ok(Self::digest(content))
    }

    /// Fingerprint a file already on the server's filesystem.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, InputError> {
        let content = tokio::fs::read(path.as_ref())
            .await
            .map_err(|e| InputError::Unreadable(format!("{}: {}", path.as_ref().display(), e)))?;
        Self::from_bytes(&content)
    }

    /// Parse a client-supplied fingerprint. Mixed case is accepted and
    /// normalized to lowercase.
    pub fn parse(value: &str) -> Result<Self, InputError> {
        if !is_valid_fingerprint(value) {
            return Err(InputError::InvalidFingerprint);
        }
        Ok(Self(value.to_ascii_lowercase()))
    }

    /// Recompute the digest of `content` and compare.
    pub fn matches(&self, content: &[u8]) -> bool {
        Self::digest(content) == *self
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn digest(content: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content);
        Self(hex::encode(hasher.finalize()))
    }
}

impl fmt::Display for ContentFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ContentFingerprint {
    type Error = InputError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ContentFingerprint> for String {
    fn from(fingerprint: ContentFingerprint) -> Self {
        fingerprint.0
    }
}

pub fn fingerprint_text(text: &str) -> Result<ContentFingerprint, InputError> {
    ContentFingerprint::from_text(text)
}

pub fn fingerprint_bytes(content: &[u8]) -> Result<ContentFingerprint, InputError> {
    ContentFingerprint::from_bytes(content)
}

pub async fn fingerprint_file(path: impl AsRef<Path>) -> Result<ContentFingerprint, InputError> {
    ContentFingerprint::from_file(path).await
}

pub fn derive_certificate_id(fingerprint: &ContentFingerprint, issued_at_millis: i64) -> CertificateId {
    CertificateId::derive(fingerprint, issued_at_millis)
}

/// Fingerprint format contract: exactly 64 hex characters, any case.
pub fn is_valid_fingerprint(value: &str) -> bool {
    value.len() == 64 && value.chars().all(|c| c.is_ascii_hexdigit())
}

/// Identifier printed on a certificate, e.g. `CERT_3F2A9C01B7D4E688`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CertificateId(String);

impl CertificateId {
    /// Salt the fingerprint with the issuance time so that re-certifying the
    /// same content yields a new identifier.
    pub fn derive(fingerprint: &ContentFingerprint, issued_at_millis: i64) -> Self {
        Self::from_salts(fingerprint, issued_at_millis, None)
    }

    /// Like [`CertificateId::derive`], with a per-issuance nonce hashed after
    /// the millis. Two issuances of the same content within one millisecond
    /// still get different identifiers.
    pub fn derive_with_nonce(
        fingerprint: &ContentFingerprint,
        issued_at_millis: i64,
        nonce: &Uuid,
    ) -> Self {
        Self::from_salts(fingerprint, issued_at_millis, Some(nonce))
    }

    fn from_salts(
        fingerprint: &ContentFingerprint,
        issued_at_millis: i64,
        nonce: Option<&Uuid>,
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(fingerprint.as_str().as_bytes());
        hasher.update(issued_at_millis.to_string().as_bytes());
        if let Some(nonce) = nonce {
            hasher.update(nonce.as_bytes());
        }
        let digest = hex::encode(hasher.finalize());

        Self(format!(
            "{}{}",
            CERTIFICATE_ID_PREFIX,
            digest[..CERTIFICATE_ID_DIGEST_LEN].to_ascii_uppercase()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CertificateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CertificateId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Several digests of the same input, returned by the hash endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashBundle {
    pub sha256: ContentFingerprint,
    pub sha512: String,
    pub size: usize,
    pub computed_at: chrono::DateTime<chrono::Utc>,
}

impl HashBundle {
    pub fn compute(content: &[u8]) -> Result<Self, InputError> {
        let sha256 = ContentFingerprint::from_bytes(content)?;

        let mut hasher = Sha512::new();
        hasher.update(content);

        Ok(Self {
            sha256,
            sha512: hex::encode(hasher.finalize()),
            size: content.len(),
            computed_at: chrono::Utc::now(),
        })
    }
}
