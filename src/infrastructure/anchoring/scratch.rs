use crate::domain::ContentFingerprint;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Directory holding the short-lived files the `ots` client works on.
#[derive(Debug, Clone)]
pub struct ScratchArea {
    dir: PathBuf,
}

impl ScratchArea {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reserve a fresh pair of paths for one invocation. Names are keyed by
    /// fingerprint plus a random suffix so concurrent requests on the same
    /// content never share files.
    pub async fn prepare(
        &self,
        fingerprint: &ContentFingerprint,
        purpose: &str,
    ) -> io::Result<ScratchFiles> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let stem = format!(
            "{}-{}-{}",
            fingerprint,
            purpose,
            uuid::Uuid::new_v4().simple()
        );
        let target = self.dir.join(format!("{}.txt", stem));
        let proof = self.dir.join(format!("{}.txt.ots", stem));

        Ok(ScratchFiles { target, proof })
    }
}

/// Target file and its sibling `.ots` proof. Both are removed when the guard
/// goes out of scope, whichever way the invocation ended.
#[derive(Debug)]
pub struct ScratchFiles {
    target: PathBuf,
    proof: PathBuf,
}

impl ScratchFiles {
    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn proof(&self) -> &Path {
        &self.proof
    }
}

impl Drop for ScratchFiles {
    fn drop(&mut self) {
        for path in [&self.target, &self.proof] {
            match std::fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "Removed scratch file"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove scratch file"),
            }
        }
    }
}
