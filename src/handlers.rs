// HTTP routes. Each request is served on its own hyper task; blocking
// repository calls go through `spawn_blocking`.

use crate::application::{
    CertificateLookup, CertifyRequest, CheckProofUseCase, HashRequest, HealthResponse,
    IssueCertificateUseCase, LookupError, Payload, TimestampAnchorClient, TimestampVerifier,
    VerifyRequest,
};
use crate::config::Config;
use crate::domain::{HashBundle, InputError};
use crate::infrastructure::anchoring::AnchoringBackend;
use crate::infrastructure::database::{CertificateRepository, DatabaseError};
use crate::infrastructure::ipfs::PinataClient;
use crate::infrastructure::proof_store::ProofStore;
use crate::infrastructure::webhook::WebhookNotifier;
use crate::rendering::CertificateAssembler;
use hyper::header::{HeaderName, HeaderValue, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{Body, Method, Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

const MAX_BODY_BYTES: u64 = 20 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error("Invalid JSON body: {0}")]
    BadJson(#[from] serde_json::Error),

    #[error("Could not read request body: {0}")]
    Body(#[from] hyper::Error),

    #[error("Request body exceeds {0} bytes")]
    TooLarge(u64),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(DatabaseError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Input(_) | ApiError::BadJson(_) | ApiError::Body(_) => StatusCode::BAD_REQUEST,
            ApiError::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Storage(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<LookupError> for ApiError {
    fn from(err: LookupError) -> Self {
        match err {
            LookupError::Input(e) => ApiError::Input(e),
            LookupError::Database(DatabaseError::NotFound) => {
                ApiError::NotFound("certificate not found".to_string())
            }
            LookupError::Database(e) => ApiError::Storage(e),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

/// Shared state behind every route.
pub struct AppState {
    pub issue: IssueCertificateUseCase,
    pub check: CheckProofUseCase,
    pub lookup: CertificateLookup,
}

impl AppState {
    /// Wire use cases from configuration. Sinks that cannot be built are
    /// disabled with a warning.
    pub fn build(
        config: &Config,
        backend: Arc<dyn AnchoringBackend>,
        repository: Arc<dyn CertificateRepository>,
        assembler: Arc<CertificateAssembler>,
    ) -> Self {
        let proofs = ProofStore::new(&config.anchoring.proof_dir);
        let verification_url = config.anchoring.verification_url.clone();

        let anchor = TimestampAnchorClient::new(backend.clone(), verification_url.clone())
            .with_proof_store(proofs.clone());

        let mut issue = IssueCertificateUseCase::new(Arc::new(anchor), assembler)
            .with_repository(repository.clone());

        match config.pinata.clone().map(PinataClient::new) {
            Some(Ok(client)) => issue = issue.with_ipfs(Arc::new(client)),
            Some(Err(e)) => warn!(error = %e, "IPFS archival disabled"),
            None => info!("Pinata credentials not set, IPFS archival disabled"),
        }

        if config.webhook.url.is_some() {
            match WebhookNotifier::new(config.webhook.clone()) {
                Ok(notifier) => issue = issue.with_webhook(Arc::new(notifier)),
                Err(e) => warn!(error = %e, "Webhook disabled"),
            }
        }

        let check = CheckProofUseCase::new(TimestampVerifier::new(backend), verification_url)
            .with_proof_store(proofs);

        Self {
            issue,
            check,
            lookup: CertificateLookup::new(repository),
        }
    }
}

pub async fn route(req: Request<Body>, state: Arc<AppState>) -> Result<Response<Body>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let result = dispatch(req, &method, &path, state).await;
    let response = match result {
        Ok(response) => response,
        Err(e) => {
            let status = e.status();
            if status.is_server_error() {
                error!(%method, %path, error = %e, "Request failed");
            } else {
                warn!(%method, %path, error = %e, "Request rejected");
            }
            json_response(status, &serde_json::json!({ "error": e.to_string() }))
        }
    };

    info!(%method, %path, status = response.status().as_u16(), "Handled request");
    Ok(response)
}

async fn dispatch(
    req: Request<Body>,
    method: &Method,
    path: &str,
    state: Arc<AppState>,
) -> Result<Response<Body>, ApiError> {
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

    match (method, segments.as_slice()) {
        (&Method::GET, ["health"]) => health(state).await,
        (&Method::POST, ["api", "certify"]) => certify(req, state).await,
        (&Method::POST, ["api", "verify"]) => verify(req, state).await,
        (&Method::POST, ["api", "hash"]) => hash(req).await,
        (&Method::GET, ["api", "certificates", id]) => certificate(state, id.to_string()).await,
        (&Method::GET, ["api", "fingerprints", fingerprint, "certificates"]) => {
            certificates_for(state, fingerprint.to_string()).await
        }
        _ => Err(ApiError::NotFound(format!("{} {}", method, path))),
    }
}

async fn certify(req: Request<Body>, state: Arc<AppState>) -> Result<Response<Body>, ApiError> {
    let request: CertifyRequest = read_json(req).await?;
    let (payload, submitter) = request.into_parts()?;

    let issued = state.issue.execute(payload, submitter).await?;
    let record = &issued.entry.record;

    let mut response = Response::new(Body::from(issued.artifact.bytes.clone()));
    set_header(&mut response, CONTENT_TYPE, issued.artifact.kind.content_type());
    set_header(
        &mut response,
        CONTENT_DISPOSITION,
        &format!("attachment; filename=\"{}\"", issued.artifact.file_name(record)),
    );
    set_header(&mut response, HeaderName::from_static("x-certificate-id"), record.certificate_id.as_str());
    set_header(&mut response, HeaderName::from_static("x-fingerprint"), record.fingerprint.as_str());
    set_header(
        &mut response,
        HeaderName::from_static("x-anchoring-status"),
        record.anchoring_status.as_str(),
    );
    set_header(
        &mut response,
        HeaderName::from_static("x-verification-url"),
        &record.verification_url,
    );
    if let Some(cid) = &issued.entry.archive.ipfs_cid {
        set_header(&mut response, HeaderName::from_static("x-ipfs-cid"), cid);
    }

    Ok(response)
}

async fn verify(req: Request<Body>, state: Arc<AppState>) -> Result<Response<Body>, ApiError> {
    let request: VerifyRequest = read_json(req).await?;
    let response = state.check.execute(request).await?;
    Ok(json_response(StatusCode::OK, &response))
}

async fn hash(req: Request<Body>) -> Result<Response<Body>, ApiError> {
    let request: HashRequest = read_json(req).await?;
    let payload = Payload::from_parts(request.text, request.content)?;
    let bundle = match payload {
        Payload::Text(ref text) if text.is_empty() => return Err(InputError::EmptyText.into()),
        ref payload => HashBundle::compute(payload.as_bytes())?,
    };
    Ok(json_response(StatusCode::OK, &bundle))
}

async fn certificate(state: Arc<AppState>, id: String) -> Result<Response<Body>, ApiError> {
    let lookup = state.lookup.clone();
    let entry = tokio::task::spawn_blocking(move || lookup.by_id(&id)).await??;
    Ok(json_response(StatusCode::OK, &entry))
}

async fn certificates_for(
    state: Arc<AppState>,
    fingerprint: String,
) -> Result<Response<Body>, ApiError> {
    let lookup = state.lookup.clone();
    let entries = tokio::task::spawn_blocking(move || lookup.by_fingerprint(&fingerprint)).await??;
    Ok(json_response(StatusCode::OK, &entries))
}

async fn health(state: Arc<AppState>) -> Result<Response<Body>, ApiError> {
    let lookup = state.lookup.clone();
    let certificates = tokio::task::spawn_blocking(move || lookup.count()).await??;
    Ok(json_response(
        StatusCode::OK,
        &HealthResponse {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            certificates,
        },
    ))
}

async fn read_json<T: DeserializeOwned>(req: Request<Body>) -> Result<T, ApiError> {
    let declared = req
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if declared.map_or(false, |len| len > MAX_BODY_BYTES) {
        return Err(ApiError::TooLarge(MAX_BODY_BYTES));
    }

    let bytes = hyper::body::to_bytes(req.into_body()).await?;
    if bytes.len() as u64 > MAX_BODY_BYTES {
        return Err(ApiError::TooLarge(MAX_BODY_BYTES));
    }
    Ok(serde_json::from_slice(&bytes)?)
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Body> {
    let (status, body) = match serde_json::to_vec(body) {
        Ok(bytes) => (status, bytes),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("{{\"error\":\"serialization failed: {}\"}}", e).into_bytes(),
        ),
    };

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    set_header(&mut response, CONTENT_TYPE, "application/json");
    response
}

fn set_header(response: &mut Response<Body>, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            response.headers_mut().insert(name, value);
        }
        Err(_) => warn!(header = name.as_str(), "Dropping header with invalid value"),
    }
}
