pub mod application;
pub mod config;
pub mod domain;
pub mod handlers;
pub mod infrastructure;
pub mod rendering;
pub mod server;

// Re-export commonly used types
pub use application::{CheckProofUseCase, IssueCertificateUseCase, TimestampAnchorClient, TimestampVerifier};
pub use config::Config;
pub use domain::{CertificateRecord, ContentFingerprint, TimestampSubmissionResult, VerificationResult};
pub use infrastructure::database::{CertificateRepository, SqliteRepository};
