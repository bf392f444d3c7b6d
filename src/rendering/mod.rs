//! Certificate assembly: turns a [`CertificateRecord`] into document bytes.
//!
//! Renderers are tried in a fixed order chosen at startup. The HTML fallback
//! cannot fail, so assembly always produces an artifact.

mod html;
mod pdf;

use crate::domain::CertificateRecord;
use lazy_static::lazy_static;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{info, warn};

pub use html::HtmlRenderer;
pub use pdf::PdfRenderer;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("renderer unavailable: {0}")]
    Unavailable(String),

    #[error("rendering failed: {0}")]
    Failed(String),

    #[error("unknown renderer: {0}")]
    UnknownRenderer(String),
}

/// What kind of document a payload is, judged from its leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Pdf,
    Html,
    Unknown,
}

impl ArtifactKind {
    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.starts_with(b"%PDF-") {
            return ArtifactKind::Pdf;
        }

        let start = bytes
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .unwrap_or(bytes.len());
        let head = &bytes[start..];
        let doctype = b"<!doctype html";
        if head.len() >= doctype.len() && head[..doctype.len()].eq_ignore_ascii_case(doctype) {
            return ArtifactKind::Html;
        }

        ArtifactKind::Unknown
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ArtifactKind::Pdf => "application/pdf",
            ArtifactKind::Html => "text/html; charset=utf-8",
            ArtifactKind::Unknown => "application/octet-stream",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::Pdf => "pdf",
            ArtifactKind::Html => "html",
            ArtifactKind::Unknown => "bin",
        }
    }
}

/// Rendered certificate bytes, PDF or HTML.
#[derive(Debug, Clone)]
pub struct CertificateArtifact {
    pub bytes: Vec<u8>,
    pub kind: ArtifactKind,
    pub renderer: String,
}

impl CertificateArtifact {
    pub fn file_name(&self, record: &CertificateRecord) -> String {
        format!("{}.{}", record.certificate_id, self.kind.extension())
    }
}

pub trait CertificateRenderer: Send + Sync {
    fn name(&self) -> &str;

    /// Probed once when the chain is built.
    fn is_available(&self) -> bool {
        true
    }

    fn render(&self, record: &CertificateRecord) -> Result<Vec<u8>, RenderError>;
}

/// Renderers in preference order, already filtered to the available ones.
pub struct RendererChain {
    renderers: Vec<Box<dyn CertificateRenderer>>,
}

impl RendererChain {
    pub fn select(candidates: Vec<Box<dyn CertificateRenderer>>) -> Self {
        let renderers: Vec<_> = candidates
            .into_iter()
            .filter(|r| {
                let available = r.is_available();
                if !available {
                    warn!(renderer = r.name(), "Renderer unavailable, skipping");
                }
                available
            })
            .collect();

        info!(
            renderers = ?renderers.iter().map(|r| r.name()).collect::<Vec<_>>(),
            "Renderer chain selected"
        );

        Self { renderers }
    }

    /// Build from configured names such as `["pdf", "html"]`.
    pub fn from_names(names: &[String]) -> Result<Self, RenderError> {
        let candidates = names
            .iter()
            .map(|name| match name.trim().to_ascii_lowercase().as_str() {
                "pdf" => Ok(Box::new(PdfRenderer::new()) as Box<dyn CertificateRenderer>),
                "html" => Ok(Box::new(HtmlRenderer) as Box<dyn CertificateRenderer>),
                other => Err(RenderError::UnknownRenderer(other.to_string())),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::select(candidates))
    }

    pub fn names(&self) -> Vec<&str> {
        self.renderers.iter().map(|r| r.name()).collect()
    }
}

impl Default for RendererChain {
    fn default() -> Self {
        Self::select(vec![Box::new(PdfRenderer::new()), Box::new(HtmlRenderer)])
    }
}

lazy_static! {
    static ref SHARED: Mutex<Option<Arc<CertificateAssembler>>> = Mutex::new(None);
}

pub struct CertificateAssembler {
    chain: RendererChain,
}

impl CertificateAssembler {
    pub fn new(chain: RendererChain) -> Self {
        Self { chain }
    }

    /// Process-wide assembler, created with the default chain on first use.
    pub fn shared() -> Arc<Self> {
        let mut slot = SHARED.lock().unwrap_or_else(|p| p.into_inner());
        slot.get_or_insert_with(|| Arc::new(Self::new(RendererChain::default())))
            .clone()
    }

    /// Replace the process-wide assembler, e.g. with a configured chain.
    pub fn install(assembler: Self) {
        let mut slot = SHARED.lock().unwrap_or_else(|p| p.into_inner());
        *slot = Some(Arc::new(assembler));
    }

    /// Drop the process-wide assembler; the next `shared()` rebuilds it.
    pub fn reset() {
        let mut slot = SHARED.lock().unwrap_or_else(|p| p.into_inner());
        *slot = None;
    }

    pub fn chain(&self) -> &RendererChain {
        &self.chain
    }

    pub fn assemble(&self, record: &CertificateRecord) -> CertificateArtifact {
        for renderer in &self.chain.renderers {
            match renderer.render(record) {
                Ok(bytes) => {
                    return CertificateArtifact {
                        kind: ArtifactKind::sniff(&bytes),
                        bytes,
                        renderer: renderer.name().to_string(),
                    }
                }
                Err(e) => warn!(
                    renderer = renderer.name(),
                    certificate_id = %record.certificate_id,
                    error = %e,
                    "Renderer failed, trying next"
                ),
            }
        }

        warn!(certificate_id = %record.certificate_id, "All renderers failed, using HTML fallback");
        CertificateArtifact {
            bytes: HtmlRenderer::render_document(record).into_bytes(),
            kind: ArtifactKind::Html,
            renderer: HtmlRenderer.name().to_string(),
        }
    }
}

/// Split `text` into fixed-width chunks for monospaced layouts.
pub(crate) fn wrap_fixed(text: &str, width: usize) -> Vec<String> {
    if text.is_empty() {
        return vec!["-".to_string()];
    }
    text.chars()
        .collect::<Vec<_>>()
        .chunks(width)
        .map(|chunk| chunk.iter().collect())
        .collect()
}
