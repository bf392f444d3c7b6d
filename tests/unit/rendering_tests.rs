use certone::domain::{CertificateRecord, ContentFingerprint, Submitter, TimestampSubmissionResult};
use certone::rendering::{
    ArtifactKind, CertificateAssembler, CertificateRenderer, HtmlRenderer, PdfRenderer,
    RenderError, RendererChain,
};
use std::sync::Arc;

fn record() -> CertificateRecord {
    let fp = ContentFingerprint::from_text("hello").unwrap();
    let submission = TimestampSubmissionResult::pending(
        fp,
        b"0123456789".to_vec(),
        "https://ots.tools/verify".to_string(),
        None,
    );
    CertificateRecord::issue(
        &submission,
        Submitter {
            user_name: Some("<Ada & Co>".to_string()),
            ..Submitter::default()
        },
        chrono::Utc::now(),
    )
}

struct BrokenRenderer;

impl CertificateRenderer for BrokenRenderer {
    fn name(&self) -> &str {
        "broken"
    }

    fn render(&self, _record: &CertificateRecord) -> Result<Vec<u8>, RenderError> {
        Err(RenderError::Failed("font missing".to_string()))
    }
}

struct MissingRenderer;

impl CertificateRenderer for MissingRenderer {
    fn name(&self) -> &str {
        "missing"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn render(&self, _record: &CertificateRecord) -> Result<Vec<u8>, RenderError> {
        Err(RenderError::Unavailable("not installed".to_string()))
    }
}

#[test]
fn test_pdf_renderer_produces_pdf() {
    let bytes = PdfRenderer::new().render(&record()).unwrap();
    assert_eq!(ArtifactKind::sniff(&bytes), ArtifactKind::Pdf);
}

#[test]
fn test_pdf_renderer_handles_oversized_metadata() {
    let mut long = record();
    long.user_name = "A".repeat(5_000);
    long.title = "T".repeat(5_000);

    let short = PdfRenderer::new().render(&record()).unwrap();
    let bytes = PdfRenderer::new().render(&long).unwrap();

    assert_eq!(ArtifactKind::sniff(&bytes), ArtifactKind::Pdf);
    assert!(bytes.len() > short.len());
}

#[test]
fn test_html_renderer_escapes_fields() {
    let record = record();
    let html = HtmlRenderer::render_document(&record);

    assert_eq!(ArtifactKind::sniff(html.as_bytes()), ArtifactKind::Html);
    assert!(html.contains("&lt;Ada &amp; Co&gt;"));
    assert!(html.contains(record.fingerprint.as_str()));
    assert!(html.contains(record.certificate_id.as_str()));
}

#[test]
fn test_unavailable_renderers_are_skipped() {
    let chain = RendererChain::select(vec![Box::new(MissingRenderer), Box::new(HtmlRenderer)]);
    assert_eq!(chain.names(), vec!["html"]);
}

#[test]
fn test_failing_renderer_falls_back_to_html() {
    let assembler = CertificateAssembler::new(RendererChain::select(vec![Box::new(BrokenRenderer)]));

    let artifact = assembler.assemble(&record());

    assert_eq!(artifact.kind, ArtifactKind::Html);
    assert_eq!(artifact.renderer, "html");
    assert!(!artifact.bytes.is_empty());
}

#[test]
fn test_default_chain_prefers_pdf() {
    let assembler = CertificateAssembler::new(RendererChain::default());
    let record = record();

    let artifact = assembler.assemble(&record);

    assert_eq!(artifact.kind, ArtifactKind::Pdf);
    assert_eq!(artifact.kind.content_type(), "application/pdf");
    assert_eq!(artifact.file_name(&record), format!("{}.pdf", record.certificate_id));
}

#[test]
fn test_shared_assembler_install_and_reset() {
    CertificateAssembler::install(CertificateAssembler::new(RendererChain::select(vec![
        Box::new(HtmlRenderer),
    ])));
    let installed = CertificateAssembler::shared();
    assert!(Arc::ptr_eq(&installed, &CertificateAssembler::shared()));
    assert_eq!(installed.chain().names(), vec!["html"]);

    CertificateAssembler::reset();
    let rebuilt = CertificateAssembler::shared();
    assert!(!Arc::ptr_eq(&installed, &rebuilt));
    assert_eq!(rebuilt.chain().names(), vec!["pdf", "html"]);
}
