use super::types::{VerifyRequest, VerifyResponse};
use super::verify::{decode_proof, TimestampVerifier};
use crate::domain::{ContentFingerprint, InputError};
use crate::infrastructure::proof_store::ProofStore;
use tracing::{info, warn};

/// Verification as exposed over HTTP: falls back to the retained proof when
/// the caller sends none.
pub struct CheckProofUseCase {
    verifier: TimestampVerifier,
    proofs: Option<ProofStore>,
    verification_url: String,
}

impl CheckProofUseCase {
    pub fn new(verifier: TimestampVerifier, verification_url: impl Into<String>) -> Self {
        Self {
            verifier,
            proofs: None,
            verification_url: verification_url.into(),
        }
    }

    pub fn with_proof_store(mut self, proofs: ProofStore) -> Self {
        self.proofs = Some(proofs);
        self
    }

    pub async fn execute(&self, request: VerifyRequest) -> Result<VerifyResponse, InputError> {
        let fingerprint = ContentFingerprint::parse(request.fingerprint.trim())?;

        let proof = match request.proof.as_deref().map(str::trim) {
            Some(encoded) if !encoded.is_empty() => Some(decode_proof(encoded)?),
            _ => self.retained(&fingerprint).await,
        };

        let Some(proof) = proof else {
            info!(fingerprint = %fingerprint, "No proof available");
            return Ok(VerifyResponse::no_proof(&fingerprint, &self.verification_url));
        };

        let result = self.verifier.verify(&fingerprint, &proof).await?;
        Ok(VerifyResponse::from_result(
            &fingerprint,
            result,
            &self.verification_url,
        ))
    }

    async fn retained(&self, fingerprint: &ContentFingerprint) -> Option<Vec<u8>> {
        let store = self.proofs.as_ref()?;
        match store.load(fingerprint).await {
            Ok(proof) => proof,
            Err(e) => {
                warn!(error = %e, "Could not read retained proof");
                None
            }
        }
    }
}
