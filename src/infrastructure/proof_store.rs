use crate::domain::ContentFingerprint;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// On-disk copies of the most recent proof per fingerprint, so a later
/// verification request may omit the artifact.
#[derive(Debug, Clone)]
pub struct ProofStore {
    dir: PathBuf,
}

impl ProofStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, fingerprint: &ContentFingerprint) -> PathBuf {
        self.dir.join(format!("{}.ots", fingerprint))
    }

    /// Keep `proof` for `fingerprint`, replacing any earlier one. The write
    /// goes through a temporary file so readers never see a partial proof.
    pub async fn retain(&self, fingerprint: &ContentFingerprint, proof: &[u8]) -> io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.path_for(fingerprint);
        let staging = self
            .dir
            .join(format!("{}.{}.tmp", fingerprint, uuid::Uuid::new_v4().simple()));

        tokio::fs::write(&staging, proof).await?;
        if let Err(e) = tokio::fs::rename(&staging, &path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e);
        }

        debug!(path = %path.display(), bytes = proof.len(), "Proof retained");
        Ok(path)
    }

    /// The retained proof, or `None` if nothing was kept for this content.
    pub async fn load(&self, fingerprint: &ContentFingerprint) -> io::Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path_for(fingerprint)).await {
            Ok(bytes) if bytes.is_empty() => Ok(None),
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}
