use crate::domain::{CertificateLogEntry, ContentFingerprint, InputError};
use crate::infrastructure::database::{CertificateRepository, DatabaseError};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LookupError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Read side of the certificate log. Blocking; call from `spawn_blocking`.
#[derive(Clone)]
pub struct CertificateLookup {
    repository: Arc<dyn CertificateRepository>,
}

impl CertificateLookup {
    pub fn new(repository: Arc<dyn CertificateRepository>) -> Self {
        Self { repository }
    }

    pub fn by_id(&self, certificate_id: &str) -> Result<CertificateLogEntry, LookupError> {
        if certificate_id.trim().is_empty() {
            return Err(InputError::InvalidRequest("certificate id is empty".to_string()).into());
        }
        Ok(self.repository.find_by_id(certificate_id.trim())?)
    }

    pub fn by_fingerprint(&self, fingerprint: &str) -> Result<Vec<CertificateLogEntry>, LookupError> {
        let fingerprint = ContentFingerprint::parse(fingerprint)?;
        Ok(self.repository.find_by_fingerprint(&fingerprint)?)
    }

    pub fn count(&self) -> Result<usize, LookupError> {
        Ok(self.repository.count_certificates()?)
    }
}
