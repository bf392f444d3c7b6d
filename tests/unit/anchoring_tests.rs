use certone::application::{TimestampAnchorClient, TimestampVerifier};
use certone::domain::{fingerprint_text, ProofState};
use certone::infrastructure::anchoring::{
    AnchorError, AnchoringBackend, OtsCliBackend, ProcessRunner, ScratchArea, ScriptedToolRunner,
    StampOutcome,
};
use certone::infrastructure::proof_store::ProofStore;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";
const FALLBACK_URL: &str = "https://ots.tools/verify";

fn backend(runner: Arc<ScriptedToolRunner>, scratch: &Path) -> Arc<OtsCliBackend> {
    Arc::new(OtsCliBackend::new(runner, "ots", ScratchArea::new(scratch)))
}

fn dir_is_empty(path: &Path) -> bool {
    std::fs::read_dir(path)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(true)
}

#[tokio::test]
async fn test_submit_hello_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(
        ScriptedToolRunner::stamping(b"0123456789".to_vec())
            .with_verify_output(0, "", "Success! Bitcoin block 358391 attests existence"),
    );
    let backend = backend(runner.clone(), dir.path());
    let client = TimestampAnchorClient::new(backend.clone(), FALLBACK_URL);
    let verifier = TimestampVerifier::new(backend);

    let fp = fingerprint_text("hello").unwrap();
    assert_eq!(fp.as_str(), HELLO_SHA256);

    let result = client.submit(&fp).await;

    assert!(result.success);
    assert_eq!(result.state, ProofState::Pending);
    assert_eq!(result.proof_artifact.as_ref().map(Vec::len), Some(10));
    assert!(result.error.is_none());
    assert_eq!(result.verification_url, FALLBACK_URL);
    assert!(chrono::DateTime::parse_from_rfc3339(&result.submitted_at_iso()).is_ok());

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["proof_artifact"], "MDEyMzQ1Njc4OQ==");

    let proof = result.proof_artifact.unwrap();
    let verification = verifier.verify(&fp, &proof).await.unwrap();
    assert!(verification.verified);
    assert_eq!(verification.state, ProofState::Confirmed);
    assert_eq!(runner.verified_proofs(), vec![proof]);

    for path in runner.touched_paths() {
        assert!(!path.exists(), "scratch file left behind: {}", path.display());
    }
}

#[tokio::test]
async fn test_calendar_url_is_kept_apart_from_verification_url() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(
        ScriptedToolRunner::stamping(b"proof".to_vec())
            .with_info_output("PendingAttestation('https://alice.btc.calendar.opentimestamps.org')\n"),
    );
    let client = TimestampAnchorClient::new(backend(runner, dir.path()), FALLBACK_URL);

    let result = client.submit(&fingerprint_text("hello").unwrap()).await;

    assert_eq!(
        result.calendar_url.as_deref(),
        Some("https://alice.btc.calendar.opentimestamps.org")
    );
    assert_eq!(result.verification_url, FALLBACK_URL);
}

#[tokio::test]
async fn test_failing_tool_yields_failure_result() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(ScriptedToolRunner::failing(1, "Error: calendar unreachable"));
    let client = TimestampAnchorClient::new(backend(runner.clone(), dir.path()), FALLBACK_URL);

    let result = client.submit(&fingerprint_text("hello").unwrap()).await;

    assert!(!result.success);
    assert_eq!(result.state, ProofState::Failed);
    assert!(result.proof_artifact.is_none());
    assert!(result.error.as_deref().unwrap().contains("calendar unreachable"));
    assert!(dir_is_empty(dir.path()));
}

#[tokio::test]
async fn test_missing_proof_is_failure() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(ScriptedToolRunner::new(StampOutcome::Silent));
    let backend = backend(runner, dir.path());

    let err = backend.stamp(&fingerprint_text("hello").unwrap()).await.unwrap_err();

    assert!(matches!(err, AnchorError::MissingProof(_)));
    assert!(dir_is_empty(dir.path()));
}

#[tokio::test]
async fn test_unavailable_tool_yields_failure_result() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(ScriptedToolRunner::unavailable());
    let client = TimestampAnchorClient::new(backend(runner, dir.path()), FALLBACK_URL);

    let result = client.submit(&fingerprint_text("hello").unwrap()).await;

    assert!(!result.success);
    assert!(result.error.as_deref().unwrap().contains("unavailable"));
}

#[tokio::test]
async fn test_repeated_submissions_produce_distinct_proofs() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(ScriptedToolRunner::unique_proofs());
    let client = TimestampAnchorClient::new(backend(runner.clone(), dir.path()), FALLBACK_URL);
    let fp = fingerprint_text("hello").unwrap();

    let first = client.submit(&fp).await;
    let second = client.submit(&fp).await;

    assert!(first.success && second.success);
    assert_ne!(first.proof_artifact, second.proof_artifact);

    let stamp_targets: Vec<_> = runner
        .calls()
        .into_iter()
        .filter(|call| call[0] == "stamp")
        .map(|call| call[1].clone())
        .collect();
    assert_eq!(stamp_targets.len(), 2);
    assert_ne!(stamp_targets[0], stamp_targets[1]);
}

#[tokio::test]
async fn test_concurrent_submissions_do_not_collide() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(ScriptedToolRunner::unique_proofs());
    let client = Arc::new(TimestampAnchorClient::new(
        backend(runner, dir.path()),
        FALLBACK_URL,
    ));
    let fp = fingerprint_text("hello").unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let client = client.clone();
            let fp = fp.clone();
            tokio::spawn(async move { client.submit(&fp).await })
        })
        .collect();

    let mut proofs = Vec::new();
    for handle in handles {
        let result = handle.await.unwrap();
        assert!(result.success);
        proofs.push(result.proof_artifact.unwrap());
    }

    proofs.sort();
    proofs.dedup();
    assert_eq!(proofs.len(), 8);
    assert!(dir_is_empty(dir.path()));
}

#[tokio::test]
async fn test_successful_proof_is_retained() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(ScriptedToolRunner::stamping(b"retained-proof".to_vec()));
    let store = ProofStore::new(dir.path().join("proofs"));
    let client = TimestampAnchorClient::new(backend(runner, &dir.path().join("scratch")), FALLBACK_URL)
        .with_proof_store(store.clone());
    let fp = fingerprint_text("hello").unwrap();

    client.submit(&fp).await;

    assert_eq!(store.load(&fp).await.unwrap(), Some(b"retained-proof".to_vec()));
}

#[tokio::test]
async fn test_process_runner_timeout_becomes_failure() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("slow-ots");
    std::fs::write(&script, "#!/bin/sh\nsleep 5\n").unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    let backend = Arc::new(OtsCliBackend::new(
        Arc::new(ProcessRunner::new(Duration::from_millis(200))),
        script.display().to_string(),
        ScratchArea::new(dir.path().join("scratch")),
    ));
    let client = TimestampAnchorClient::new(backend, FALLBACK_URL);

    let result = client.submit(&fingerprint_text("hello").unwrap()).await;

    assert!(!result.success);
    assert!(result.error.as_deref().unwrap().contains("timeout"));
    assert!(dir_is_empty(&dir.path().join("scratch")));
}

#[tokio::test]
async fn test_verify_timeout_leaves_no_scratch_files() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("slow-ots");
    std::fs::write(&script, "#!/bin/sh\nsleep 5\n").unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    let backend = Arc::new(OtsCliBackend::new(
        Arc::new(ProcessRunner::new(Duration::from_millis(200))),
        script.display().to_string(),
        ScratchArea::new(dir.path().join("scratch")),
    ));
    let verifier = TimestampVerifier::new(backend);

    let result = verifier
        .verify(&fingerprint_text("hello").unwrap(), b"0123456789")
        .await
        .unwrap();

    assert!(!result.verified);
    assert_eq!(result.state, ProofState::Failed);
    assert!(result.error.as_deref().unwrap().contains("timeout"));
    assert!(dir_is_empty(&dir.path().join("scratch")));
}
