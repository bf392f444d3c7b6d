use crate::domain::{ContentFingerprint, TimestampSubmissionResult};
use crate::infrastructure::anchoring::AnchoringBackend;
use crate::infrastructure::proof_store::ProofStore;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Hands fingerprints to the anchoring backend and reports the outcome as a
/// value. Expected failures never surface as errors.
pub struct TimestampAnchorClient {
    backend: Arc<dyn AnchoringBackend>,
    proofs: Option<ProofStore>,
    verification_url: String,
}

impl TimestampAnchorClient {
    pub fn new(backend: Arc<dyn AnchoringBackend>, verification_url: impl Into<String>) -> Self {
        Self {
            backend,
            proofs: None,
            verification_url: verification_url.into(),
        }
    }

    /// Keep each successful proof so verification can run without one.
    pub fn with_proof_store(mut self, proofs: ProofStore) -> Self {
        self.proofs = Some(proofs);
        self
    }

    pub fn proof_store(&self) -> Option<&ProofStore> {
        self.proofs.as_ref()
    }

    #[instrument(skip(self), fields(backend = self.backend.name()))]
    pub async fn submit(&self, fingerprint: &ContentFingerprint) -> TimestampSubmissionResult {
        let receipt = match self.backend.stamp(fingerprint).await {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!(error = %e, "Timestamp submission failed");
                return TimestampSubmissionResult::failed(
                    fingerprint.clone(),
                    self.verification_url.clone(),
                    e.to_string(),
                );
            }
        };

        if let Some(store) = &self.proofs {
            if let Err(e) = store.retain(fingerprint, &receipt.proof).await {
                warn!(error = %e, "Could not retain proof");
            }
        }

        info!(
            proof_bytes = receipt.proof.len(),
            calendar = receipt.calendar_url.as_deref().unwrap_or("-"),
            "Timestamp submitted, awaiting confirmation"
        );

        TimestampSubmissionResult::pending(
            fingerprint.clone(),
            receipt.proof,
            self.verification_url.clone(),
            receipt.calendar_url,
        )
    }
}
