//! Port to the public timestamping system.
//!
//! The core talks to OpenTimestamps only through [`AnchoringBackend`]. The
//! shipped adapter drives the `ots` command-line client; a native calendar
//! client can replace it without touching the application layer.

#[cfg(any(test, feature = "test-utils"))]
mod mock;
mod ots_cli;
mod runner;
mod scratch;

use crate::domain::{ContentFingerprint, VerificationResult};
use async_trait::async_trait;
use thiserror::Error;

#[cfg(any(test, feature = "test-utils"))]
pub use mock::{ScriptedToolRunner, StampOutcome};
pub use ots_cli::{interpret_verify_output, OtsCliBackend, PENDING_MARKER, SUCCESS_MARKER};
pub use runner::{ProcessRunner, ToolOutput, ToolRunner};
pub use scratch::{ScratchArea, ScratchFiles};

/// Failures while handing a digest to, or checking it against, the
/// anchoring system. None of these abort issuance.
#[derive(Error, Debug)]
pub enum AnchorError {
    #[error("anchoring tool unavailable: {0}")]
    ToolUnavailable(String),

    #[error("anchoring tool failed (exit code {code:?}): {stderr}")]
    ToolFailed { code: Option<i32>, stderr: String },

    #[error("timeout after {0} seconds")]
    Timeout(u64),

    #[error("no proof produced: {0}")]
    MissingProof(String),

    #[error("scratch file error: {0}")]
    Scratch(#[from] std::io::Error),
}

/// Receipt handed back synchronously by the anchoring system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StampReceipt {
    /// Serialized `.ots` proof; usually still pending at this point.
    pub proof: Vec<u8>,
    /// Calendar server that accepted the digest, when known.
    pub calendar_url: Option<String>,
}

#[async_trait]
pub trait AnchoringBackend: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &str;

    /// Submit a digest for anchoring. Returns as soon as a receipt exists;
    /// never waits for block confirmation.
    async fn stamp(&self, fingerprint: &ContentFingerprint) -> Result<StampReceipt, AnchorError>;

    /// Check whether `proof` attests to `fingerprint`.
    async fn verify(
        &self,
        fingerprint: &ContentFingerprint,
        proof: &[u8],
    ) -> Result<VerificationResult, AnchorError>;
}
