use certone::application::{
    CheckProofUseCase, IssueCertificateUseCase, Payload, TimestampAnchorClient, TimestampVerifier,
    VerifyRequest,
};
use certone::domain::{fingerprint_text, AnchoringStatus, InputError, ProofState, Submitter};
use certone::infrastructure::anchoring::{OtsCliBackend, ScratchArea, ScriptedToolRunner};
use certone::infrastructure::database::{CertificateRepository, SqliteRepository};
use certone::infrastructure::proof_store::ProofStore;
use certone::rendering::{ArtifactKind, CertificateAssembler, HtmlRenderer, RendererChain};
use std::path::Path;
use std::sync::Arc;

const CONFIRMED_OUTPUT: &str =
    "Assuming target filename is 'hello.txt'\nSuccess! Bitcoin block 358391 attests existence as of 2015-05-28 CEST\n";

fn dir_is_empty(path: &Path) -> bool {
    std::fs::read_dir(path)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(true)
}

fn backend(runner: ScriptedToolRunner, scratch: &Path) -> Arc<OtsCliBackend> {
    Arc::new(OtsCliBackend::new(Arc::new(runner), "ots", ScratchArea::new(scratch)))
}

#[cfg(test)]
mod verify_tests {
    use super::*;

    #[tokio::test]
    async fn test_success_marker_verifies() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedToolRunner::stamping(b"p".to_vec()).with_verify_output(0, "", CONFIRMED_OUTPUT);
        let verifier = TimestampVerifier::new(backend(runner, dir.path()));

        let result = verifier
            .verify(&fingerprint_text("hello").unwrap(), b"0123456789")
            .await
            .unwrap();

        assert!(result.verified);
        assert_eq!(result.state, ProofState::Confirmed);
        assert_eq!(result.attested_block, Some(358391));
    }

    #[tokio::test]
    async fn test_clean_exit_without_marker_is_unverified() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedToolRunner::stamping(b"p".to_vec()).with_verify_output(0, "Got 1 attestation(s)", "");
        let verifier = TimestampVerifier::new(backend(runner, dir.path()));

        let result = verifier
            .verify(&fingerprint_text("hello").unwrap(), b"0123456789")
            .await
            .unwrap();

        assert!(!result.verified);
        assert_eq!(result.state, ProofState::Failed);
        assert!(result.output.contains("Got 1 attestation(s)"));
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn test_pending_marker_maps_to_pending() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedToolRunner::stamping(b"p".to_vec())
            .with_verify_output(1, "", "Pending confirmation in Bitcoin blockchain");
        let verifier = TimestampVerifier::new(backend(runner, dir.path()));

        let result = verifier
            .verify(&fingerprint_text("hello").unwrap(), b"0123456789")
            .await
            .unwrap();

        assert!(!result.verified);
        assert_eq!(result.state, ProofState::Pending);
    }

    #[tokio::test]
    async fn test_proof_bytes_reach_the_tool_and_scratch_is_cleaned() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedToolRunner::stamping(b"p".to_vec()).with_verify_output(0, CONFIRMED_OUTPUT, ""));
        let verifier = TimestampVerifier::new(Arc::new(OtsCliBackend::new(
            runner.clone(),
            "ots",
            ScratchArea::new(dir.path()),
        )));

        verifier
            .verify(&fingerprint_text("hello").unwrap(), b"0123456789")
            .await
            .unwrap();

        assert_eq!(runner.verified_proofs(), vec![b"0123456789".to_vec()]);
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_empty_and_undecodable_proofs_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let verifier = TimestampVerifier::new(backend(ScriptedToolRunner::stamping(b"p".to_vec()), dir.path()));
        let fp = fingerprint_text("hello").unwrap();

        assert!(matches!(verifier.verify(&fp, b"").await, Err(InputError::InvalidProof(_))));
        assert!(matches!(
            verifier.verify_encoded(&fp, "not base64!").await,
            Err(InputError::InvalidProof(_))
        ));
    }

    #[tokio::test]
    async fn test_backend_failure_is_unverified_result() {
        let dir = tempfile::tempdir().unwrap();
        let verifier = TimestampVerifier::new(backend(ScriptedToolRunner::unavailable(), dir.path()));

        let result = verifier
            .verify(&fingerprint_text("hello").unwrap(), b"0123456789")
            .await
            .unwrap();

        assert!(!result.verified);
        assert!(result.error.is_some());
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_rejected_proof_leaves_no_scratch_files() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(
            ScriptedToolRunner::stamping(b"p".to_vec()).with_verify_output(1, "", "Error: bad proof"),
        );
        let verifier = TimestampVerifier::new(Arc::new(OtsCliBackend::new(
            runner.clone(),
            "ots",
            ScratchArea::new(dir.path()),
        )));

        let result = verifier
            .verify(&fingerprint_text("hello").unwrap(), b"0123456789")
            .await
            .unwrap();

        assert!(!result.verified);
        assert_eq!(result.state, ProofState::Failed);
        assert!(result.error.as_deref().unwrap().contains("bad proof"));
        assert_eq!(runner.verified_proofs(), vec![b"0123456789".to_vec()]);
        assert!(!runner.touched_paths().is_empty());
        for path in runner.touched_paths() {
            assert!(!path.exists(), "scratch file left behind: {}", path.display());
        }
        assert!(dir_is_empty(dir.path()));
    }
}

#[cfg(test)]
mod check_tests {
    use super::*;

    fn check(runner: ScriptedToolRunner, root: &Path) -> (CheckProofUseCase, ProofStore) {
        let store = ProofStore::new(root.join("proofs"));
        let verifier = TimestampVerifier::new(backend(runner, &root.join("scratch")));
        let usecase =
            CheckProofUseCase::new(verifier, "https://ots.tools/verify").with_proof_store(store.clone());
        (usecase, store)
    }

    #[tokio::test]
    async fn test_no_proof_found() {
        let dir = tempfile::tempdir().unwrap();
        let (usecase, _) = check(ScriptedToolRunner::stamping(b"p".to_vec()), dir.path());

        let response = usecase
            .execute(VerifyRequest {
                fingerprint: fingerprint_text("hello").unwrap().to_string(),
                proof: None,
            })
            .await
            .unwrap();

        assert!(!response.verified);
        assert_eq!(response.message, "no proof found");
    }

    #[tokio::test]
    async fn test_retained_proof_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedToolRunner::stamping(b"p".to_vec()).with_verify_output(0, CONFIRMED_OUTPUT, "");
        let (usecase, store) = check(runner, dir.path());
        let fp = fingerprint_text("hello").unwrap();
        store.retain(&fp, b"0123456789").await.unwrap();

        let response = usecase
            .execute(VerifyRequest {
                fingerprint: fp.as_str().to_ascii_uppercase(),
                proof: None,
            })
            .await
            .unwrap();

        assert!(response.verified);
        assert_eq!(response.fingerprint, fp.as_str());
        assert_eq!(response.state, ProofState::Confirmed);
    }

    #[tokio::test]
    async fn test_invalid_fingerprint_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (usecase, _) = check(ScriptedToolRunner::stamping(b"p".to_vec()), dir.path());

        let result = usecase
            .execute(VerifyRequest {
                fingerprint: "a".repeat(63),
                proof: Some("AE9U".to_string()),
            })
            .await;

        assert!(matches!(result, Err(InputError::InvalidFingerprint)));
    }
}

#[cfg(test)]
mod issue_tests {
    use super::*;

    fn assembler() -> Arc<CertificateAssembler> {
        Arc::new(CertificateAssembler::new(RendererChain::default()))
    }

    #[tokio::test]
    async fn test_issue_logs_certificate() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Arc::new(SqliteRepository::new_in_memory().unwrap());
        let anchor = TimestampAnchorClient::new(
            backend(ScriptedToolRunner::stamping(b"0123456789".to_vec()), dir.path()),
            "https://ots.tools/verify",
        );
        let usecase =
            IssueCertificateUseCase::new(Arc::new(anchor), assembler()).with_repository(repo.clone());

        let issued = usecase
            .execute(
                Payload::Text("hello".to_string()),
                Submitter {
                    user_name: Some("Ada".to_string()),
                    ..Submitter::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(issued.entry.record.anchoring_status, AnchoringStatus::Success);
        assert_eq!(issued.artifact.kind, ArtifactKind::Pdf);
        assert!(issued.submission.success);

        let logged = repo
            .find_by_id(issued.entry.record.certificate_id.as_str())
            .unwrap();
        assert_eq!(logged.record.fingerprint, issued.entry.record.fingerprint);
        assert_eq!(logged.record.proof.as_deref(), Some(&b"0123456789"[..]));
        assert_eq!(logged.record.user_name, "Ada");
    }

    #[tokio::test]
    async fn test_anchoring_failure_still_issues() {
        let dir = tempfile::tempdir().unwrap();
        let anchor = TimestampAnchorClient::new(
            backend(ScriptedToolRunner::failing(1, "Error: no calendars"), dir.path()),
            "https://ots.tools/verify",
        );
        let assembler = Arc::new(CertificateAssembler::new(RendererChain::select(vec![Box::new(
            HtmlRenderer,
        )])));
        let usecase = IssueCertificateUseCase::new(Arc::new(anchor), assembler);

        let issued = usecase
            .execute(Payload::Text("hello".to_string()), Submitter::default())
            .await
            .unwrap();

        assert_eq!(issued.entry.record.anchoring_status, AnchoringStatus::Failed);
        assert!(issued.entry.record.proof.is_none());
        assert_eq!(issued.artifact.kind, ArtifactKind::Html);
        assert_eq!(issued.entry.record.user_name, "Anonymous");
    }

    #[tokio::test]
    async fn test_reissuing_same_content_yields_new_certificate() {
        let dir = tempfile::tempdir().unwrap();
        let anchor = TimestampAnchorClient::new(
            backend(ScriptedToolRunner::unique_proofs(), dir.path()),
            "https://ots.tools/verify",
        );
        let usecase = IssueCertificateUseCase::new(Arc::new(anchor), assembler());

        let first = usecase
            .execute(Payload::Text("hello".to_string()), Submitter::default())
            .await
            .unwrap();
        let second = usecase
            .execute(Payload::Text("hello".to_string()), Submitter::default())
            .await
            .unwrap();

        assert_eq!(first.entry.record.fingerprint, second.entry.record.fingerprint);
        assert_ne!(first.entry.record.certificate_id, second.entry.record.certificate_id);
        assert_ne!(first.entry.record.proof, second.entry.record.proof);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_issuance_of_same_content_logs_every_certificate() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Arc::new(SqliteRepository::new_in_memory().unwrap());
        let anchor = TimestampAnchorClient::new(
            backend(ScriptedToolRunner::unique_proofs(), dir.path()),
            "https://ots.tools/verify",
        );
        let usecase = Arc::new(
            IssueCertificateUseCase::new(Arc::new(anchor), assembler()).with_repository(repo.clone()),
        );

        let handles: Vec<_> = (0..64)
            .map(|_| {
                let usecase = usecase.clone();
                tokio::spawn(async move {
                    usecase
                        .execute(Payload::Text("hello".to_string()), Submitter::default())
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut ids = std::collections::HashSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap().entry.record.certificate_id);
        }

        assert_eq!(ids.len(), 64);
        assert_eq!(repo.count_certificates().unwrap(), 64);
        for id in &ids {
            assert_eq!(&repo.find_by_id(id.as_str()).unwrap().record.certificate_id, id);
        }
    }

    #[tokio::test]
    async fn test_empty_text_rejected_before_anchoring() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedToolRunner::stamping(b"p".to_vec()));
        let anchor = TimestampAnchorClient::new(
            Arc::new(OtsCliBackend::new(runner.clone(), "ots", ScratchArea::new(dir.path()))),
            "https://ots.tools/verify",
        );
        let usecase = IssueCertificateUseCase::new(Arc::new(anchor), assembler());

        let result = usecase
            .execute(Payload::Text(String::new()), Submitter::default())
            .await;

        assert!(matches!(result, Err(InputError::EmptyText)));
        assert!(runner.calls().is_empty());
    }
}
