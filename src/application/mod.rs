mod anchor;
mod check;
mod issue;
mod lookup;
mod types;
mod verify;

pub use anchor::TimestampAnchorClient;
pub use check::CheckProofUseCase;
pub use issue::{IssueCertificateUseCase, IssuedCertificate};
pub use lookup::{CertificateLookup, LookupError};
pub use types::{
    CertifyRequest, HashRequest, HealthResponse, Payload, VerifyRequest, VerifyResponse,
};
pub use verify::{decode_proof, TimestampVerifier};
