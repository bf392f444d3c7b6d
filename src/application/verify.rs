use crate::domain::{ContentFingerprint, InputError, VerificationResult};
use crate::infrastructure::anchoring::AnchoringBackend;
use base64::Engine;
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub struct TimestampVerifier {
    backend: Arc<dyn AnchoringBackend>,
}

impl TimestampVerifier {
    pub fn new(backend: Arc<dyn AnchoringBackend>) -> Self {
        Self { backend }
    }

    /// Check `proof` against `fingerprint`. Only caller mistakes are errors;
    /// a backend that cannot answer yields an unverified result.
    #[instrument(skip(self, proof), fields(proof_bytes = proof.len()))]
    pub async fn verify(
        &self,
        fingerprint: &ContentFingerprint,
        proof: &[u8],
    ) -> Result<VerificationResult, InputError> {
        if proof.is_empty() {
            return Err(InputError::InvalidProof("proof is empty".to_string()));
        }

        match self.backend.verify(fingerprint, proof).await {
            Ok(result) => {
                info!(verified = result.verified, state = %result.state, "Proof checked");
                Ok(result)
            }
            Err(e) => {
                warn!(error = %e, "Verification backend failed");
                Ok(VerificationResult::failed(e.to_string()))
            }
        }
    }

    /// Same as [`verify`](Self::verify) for a base64-encoded proof.
    pub async fn verify_encoded(
        &self,
        fingerprint: &ContentFingerprint,
        proof_base64: &str,
    ) -> Result<VerificationResult, InputError> {
        let proof = decode_proof(proof_base64)?;
        self.verify(fingerprint, &proof).await
    }
}

pub fn decode_proof(encoded: &str) -> Result<Vec<u8>, InputError> {
    base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| InputError::InvalidProof(format!("invalid base64: {}", e)))
}
