use super::{AnchorError, AnchoringBackend, ScratchArea, StampReceipt, ToolOutput, ToolRunner};
use crate::domain::{ContentFingerprint, ProofState, VerificationResult};
use async_trait::async_trait;
use std::io;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Marker the `ots` client prints when a proof checks out against a block.
pub const SUCCESS_MARKER: &str = "Success";

/// Marker the `ots` client prints while the proof awaits a block.
pub const PENDING_MARKER: &str = "Pending confirmation";

/// Informational line `ots stamp` writes to stderr on a normal run.
const SUBMITTING_NOTICE: &str = "Submitting to remote calendar";

/// Adapter that drives the OpenTimestamps command-line client.
pub struct OtsCliBackend {
    runner: Arc<dyn ToolRunner>,
    binary: String,
    scratch: ScratchArea,
}

impl OtsCliBackend {
    pub fn new(runner: Arc<dyn ToolRunner>, binary: impl Into<String>, scratch: ScratchArea) -> Self {
        Self {
            runner,
            binary: binary.into(),
            scratch,
        }
    }

    /// Ask `ots info` which calendar accepted the digest. Best effort.
    async fn calendar_url(&self, proof_path: &std::path::Path) -> Option<String> {
        let args = vec!["info".to_string(), proof_path.display().to_string()];
        match self.runner.run(&self.binary, &args).await {
            Ok(output) => extract_calendar_url(&output.combined()),
            Err(e) => {
                debug!(error = %e, "Could not read proof info");
                None
            }
        }
    }
}

#[async_trait]
impl AnchoringBackend for OtsCliBackend {
    fn name(&self) -> &str {
        "ots-cli"
    }

    #[instrument(skip(self), fields(fingerprint = %fingerprint))]
    async fn stamp(&self, fingerprint: &ContentFingerprint) -> Result<StampReceipt, AnchorError> {
        let files = self.scratch.prepare(fingerprint, "stamp").await?;
        tokio::fs::write(files.target(), fingerprint.as_str()).await?;

        let args = vec!["stamp".to_string(), files.target().display().to_string()];
        let output = self.runner.run(&self.binary, &args).await?;

        if !output.success() || stamp_reported_error(&output.stderr) {
            return Err(AnchorError::ToolFailed {
                code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            });
        }

        let proof = match tokio::fs::read(files.proof()).await {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => return Err(AnchorError::MissingProof("proof file is empty".to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(AnchorError::MissingProof(
                    "tool exited without writing a proof file".to_string(),
                ))
            }
            Err(e) => return Err(e.into()),
        };

        let calendar_url = self.calendar_url(files.proof()).await;
        info!(proof_bytes = proof.len(), calendar = ?calendar_url, "Digest stamped");

        Ok(StampReceipt {
            proof,
            calendar_url,
        })
    }

    #[instrument(skip(self, proof), fields(fingerprint = %fingerprint, proof_bytes = proof.len()))]
    async fn verify(
        &self,
        fingerprint: &ContentFingerprint,
        proof: &[u8],
    ) -> Result<VerificationResult, AnchorError> {
        let files = self.scratch.prepare(fingerprint, "verify").await?;
        tokio::fs::write(files.target(), fingerprint.as_str()).await?;
        tokio::fs::write(files.proof(), proof).await?;

        let args = vec!["verify".to_string(), files.proof().display().to_string()];
        let output = self.runner.run(&self.binary, &args).await?;

        let result = interpret_verify_output(&output);
        if !result.verified {
            warn!(state = %result.state, exit_code = ?output.exit_code, "Proof not verified");
        }
        Ok(result)
    }
}

/// Turn the textual report of `ots verify` into a verdict.
///
/// Only a clean exit together with the explicit success marker counts as
/// verified. A pending marker means the calendar has the digest but no block
/// commits to it yet. Everything else is unverified and keeps the raw output.
pub fn interpret_verify_output(output: &ToolOutput) -> VerificationResult {
    let combined = output.combined();
    let attested_block = parse_attested_block(&combined);

    if output.success() && combined.contains(SUCCESS_MARKER) {
        return VerificationResult {
            verified: true,
            state: ProofState::Confirmed,
            output: combined,
            error: None,
            attested_block,
        };
    }

    if combined.contains(PENDING_MARKER) {
        return VerificationResult {
            verified: false,
            state: ProofState::Pending,
            output: combined,
            error: None,
            attested_block: None,
        };
    }

    let error = if output.success() {
        "verification inconclusive: no success marker in tool output".to_string()
    } else {
        match output.stderr.trim() {
            "" => format!("verification failed with exit code {:?}", output.exit_code),
            stderr => stderr.to_string(),
        }
    };

    VerificationResult {
        verified: false,
        state: ProofState::Failed,
        output: combined,
        error: Some(error),
        attested_block: None,
    }
}

fn stamp_reported_error(stderr: &str) -> bool {
    stderr
        .lines()
        .filter(|line| !line.contains(SUBMITTING_NOTICE))
        .any(|line| line.to_ascii_lowercase().contains("error"))
}

fn extract_calendar_url(text: &str) -> Option<String> {
    let start = text.find("https://")?;
    let url: String = text[start..]
        .chars()
        .take_while(|c| !c.is_whitespace() && !matches!(c, '\'' | '"' | ')' | ','))
        .collect();
    Some(url)
}

/// "Success! Bitcoin block 358391 attests existence as of ..." -> 358391
fn parse_attested_block(text: &str) -> Option<u64> {
    let rest = &text[text.find("Bitcoin block ")? + "Bitcoin block ".len()..];
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}
