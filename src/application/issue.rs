use super::anchor::TimestampAnchorClient;
use super::types::Payload;
use crate::domain::{
    ArchiveRefs, CertificateLogEntry, CertificateRecord, InputError, Submitter,
    TimestampSubmissionResult,
};
use crate::infrastructure::database::CertificateRepository;
use crate::infrastructure::ipfs::{certificate_metadata, PinataClient};
use crate::infrastructure::webhook::WebhookNotifier;
use crate::rendering::{CertificateArtifact, CertificateAssembler};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Everything produced by one issuance.
#[derive(Debug, Clone)]
pub struct IssuedCertificate {
    pub entry: CertificateLogEntry,
    pub artifact: CertificateArtifact,
    pub submission: TimestampSubmissionResult,
}

/// Hash, anchor, render, then archive. Only invalid input stops issuance;
/// anchoring and sink failures are recorded on the certificate or logged.
pub struct IssueCertificateUseCase {
    anchor: Arc<TimestampAnchorClient>,
    assembler: Arc<CertificateAssembler>,
    repository: Option<Arc<dyn CertificateRepository>>,
    ipfs: Option<Arc<PinataClient>>,
    webhook: Option<Arc<WebhookNotifier>>,
}

impl IssueCertificateUseCase {
    pub fn new(anchor: Arc<TimestampAnchorClient>, assembler: Arc<CertificateAssembler>) -> Self {
        Self {
            anchor,
            assembler,
            repository: None,
            ipfs: None,
            webhook: None,
        }
    }

    pub fn with_repository(mut self, repository: Arc<dyn CertificateRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn with_ipfs(mut self, client: Arc<PinataClient>) -> Self {
        self.ipfs = Some(client);
        self
    }

    pub fn with_webhook(mut self, notifier: Arc<WebhookNotifier>) -> Self {
        self.webhook = Some(notifier);
        self
    }

    #[instrument(skip_all)]
    pub async fn execute(
        &self,
        payload: Payload,
        submitter: Submitter,
    ) -> Result<IssuedCertificate, InputError> {
        let fingerprint = payload.fingerprint()?;
        debug!(fingerprint = %fingerprint, bytes = payload.as_bytes().len(), "Content fingerprinted");

        let submission = self.anchor.submit(&fingerprint).await;
        let record = CertificateRecord::issue(&submission, submitter, chrono::Utc::now());
        let artifact = self.assembler.assemble(&record);

        info!(
            certificate_id = %record.certificate_id,
            anchoring = record.anchoring_status.as_str(),
            renderer = %artifact.renderer,
            "Certificate issued"
        );

        let archive = self.archive(&record, &artifact).await;
        let entry = CertificateLogEntry { record, archive };

        self.log(&entry).await;
        self.notify(&entry, &artifact);

        Ok(IssuedCertificate {
            entry,
            artifact,
            submission,
        })
    }

    async fn archive(&self, record: &CertificateRecord, artifact: &CertificateArtifact) -> ArchiveRefs {
        let Some(ipfs) = &self.ipfs else {
            return ArchiveRefs::default();
        };

        let mut refs = ArchiveRefs::default();

        let mut keyvalues = Map::new();
        keyvalues.insert("certificateId".into(), Value::from(record.certificate_id.as_str()));
        keyvalues.insert("fileHash".into(), Value::from(record.fingerprint.as_str()));
        keyvalues.insert("userName".into(), Value::from(record.user_name.as_str()));
        keyvalues.insert("type".into(), Value::from("certificate"));

        match ipfs
            .pin_file(artifact.bytes.clone(), &artifact.file_name(record), keyvalues)
            .await
        {
            Ok(pin) => {
                refs.ipfs_cid = Some(pin.cid);
                refs.ipfs_url = Some(pin.gateway_url);
            }
            Err(e) => warn!(error = %e, "Certificate upload to IPFS failed"),
        }

        let metadata_name = format!("{}-metadata.json", record.certificate_id);
        match ipfs.pin_json(&certificate_metadata(record), &metadata_name).await {
            Ok(pin) => refs.ipfs_metadata_url = Some(pin.gateway_url),
            Err(e) => warn!(error = %e, "Metadata upload to IPFS failed"),
        }

        refs
    }

    async fn log(&self, entry: &CertificateLogEntry) {
        let Some(repository) = &self.repository else {
            return;
        };

        let repository = repository.clone();
        let row = entry.clone();
        match tokio::task::spawn_blocking(move || repository.save_certificate(&row)).await {
            Ok(Ok(())) => debug!(certificate_id = %entry.record.certificate_id, "Certificate logged"),
            Ok(Err(e)) => error!(error = %e, "Failed to log certificate"),
            Err(e) => error!(error = %e, "Certificate log task aborted"),
        }
    }

    fn notify(&self, entry: &CertificateLogEntry, artifact: &CertificateArtifact) {
        let Some(notifier) = &self.webhook else {
            return;
        };

        let notifier = notifier.clone();
        let entry = entry.clone();
        let artifact = artifact.clone();
        tokio::spawn(async move {
            let outcome = notifier.notify(&entry, &artifact).await;
            debug!(delivered = outcome.delivered, details = %outcome.details, "Webhook finished");
        });
    }
}
