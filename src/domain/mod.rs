pub mod certificate;
pub mod fingerprint;
pub mod proof;

pub use certificate::{
    AnchoringStatus, ArchiveRefs, CertificateLogEntry, CertificateRecord, Submitter,
};
pub use fingerprint::{
    derive_certificate_id, fingerprint_bytes, fingerprint_file, fingerprint_text,
    is_valid_fingerprint, CertificateId, ContentFingerprint, HashBundle, InputError,
};
pub use proof::{ProofState, TimestampSubmissionResult, VerificationResult};
