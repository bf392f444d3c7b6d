// Certificate PDF built with printpdf 0.8's op-list API: A4 pages, a
// heading, then label/value rows in Courier with long values wrapped. Rows
// that run past the bottom margin continue on a new page.

use super::{wrap_fixed, CertificateRenderer, RenderError};
use crate::domain::CertificateRecord;
use printpdf::{
    BuiltinFont, Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Point, Pt, TextItem,
};
use tracing::{debug, instrument};

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 20.0;
const VALUE_COLUMN_MM: f32 = 62.0;
const LINE_STEP_PT: f32 = 16.0;
const BODY_SIZE_PT: f32 = 9.0;
const WRAP_WIDTH: usize = 64;

const FOOTER: &str = "Verify the OpenTimestamps proof against the SHA-256 digest above.";

pub struct PdfRenderer {
    heading: String,
}

impl PdfRenderer {
    pub fn new() -> Self {
        Self {
            heading: "CERTIFICATE OF EXISTENCE".to_string(),
        }
    }

    /// Identifying rows come first so the first page always carries them,
    /// however long the submitter's metadata is.
    fn rows(record: &CertificateRecord) -> Vec<(&'static str, String)> {
        vec![
            ("Certificate ID", record.certificate_id.to_string()),
            ("SHA-256", record.fingerprint.to_string()),
            ("Timestamp", record.issued_at.to_rfc3339()),
            ("Blockchain", record.blockchain.clone()),
            ("Anchoring", record.anchoring_status.as_str().to_string()),
            ("Verify at", record.verification_url.clone()),
            ("Name", record.user_name.clone()),
            ("Email", record.email.clone().unwrap_or_default()),
            ("Title", record.title.clone()),
            ("File", record.file_name.clone()),
        ]
    }

    /// Lay the certificate out as one op list per page.
    fn layout(&self, record: &CertificateRecord) -> Vec<Vec<Op>> {
        let mut pages = PageCursor::new();

        pages.heading(&self.heading);
        for (label, value) in Self::rows(record) {
            let mut label = Some(label);
            for line in wrap_fixed(&value, WRAP_WIDTH) {
                pages.ensure_room();
                if let Some(label) = label.take() {
                    pages.write(label, pages.label_x, BuiltinFont::HelveticaBold, BODY_SIZE_PT);
                }
                pages.write(&line, pages.value_x, BuiltinFont::Courier, BODY_SIZE_PT);
                pages.advance(1.0);
            }
        }

        pages.advance(1.0);
        pages.ensure_room();
        pages.write(FOOTER, pages.label_x, BuiltinFont::Helvetica, 8.0);

        pages.finish()
    }
}

impl Default for PdfRenderer {
    fn default() -> Self {
        Self::new()
    }
}

struct PageCursor {
    done: Vec<Vec<Op>>,
    ops: Vec<Op>,
    top: f32,
    bottom: f32,
    y: f32,
    label_x: Pt,
    value_x: Pt,
}

impl PageCursor {
    fn new() -> Self {
        let page_h_pt = Mm(PAGE_HEIGHT_MM).into_pt().0;
        let top = page_h_pt - Mm(MARGIN_MM + 10.0).into_pt().0;
        Self {
            done: Vec::new(),
            ops: Vec::new(),
            top,
            bottom: Mm(MARGIN_MM).into_pt().0,
            y: top,
            label_x: Mm(MARGIN_MM).into_pt(),
            value_x: Mm(VALUE_COLUMN_MM).into_pt(),
        }
    }

    fn heading(&mut self, text: &str) {
        self.write(text, self.label_x, BuiltinFont::HelveticaBold, 18.0);
        self.advance(2.5);
    }

    fn write(&mut self, text: &str, x: Pt, font: BuiltinFont, size: f32) {
        self.ops.extend(text_ops(text, x, Pt(self.y), font, size));
    }

    fn advance(&mut self, lines: f32) {
        self.y -= LINE_STEP_PT * lines;
    }

    fn ensure_room(&mut self) {
        if self.y < self.bottom {
            self.done.push(std::mem::take(&mut self.ops));
            self.y = self.top;
        }
    }

    fn finish(mut self) -> Vec<Vec<Op>> {
        if !self.ops.is_empty() {
            self.done.push(self.ops);
        }
        self.done
    }
}

fn text_ops(text: &str, x: Pt, y: Pt, font: BuiltinFont, size: f32) -> Vec<Op> {
    vec![
        Op::StartTextSection,
        Op::SetTextCursor {
            pos: Point { x, y },
        },
        Op::SetFontSizeBuiltinFont {
            size: Pt(size),
            font: font.clone(),
        },
        Op::WriteTextBuiltinFont {
            items: vec![TextItem::Text(text.to_string())],
            font,
        },
        Op::EndTextSection,
    ]
}

impl CertificateRenderer for PdfRenderer {
    fn name(&self) -> &str {
        "pdf"
    }

    #[instrument(skip_all, fields(certificate_id = %record.certificate_id))]
    fn render(&self, record: &CertificateRecord) -> Result<Vec<u8>, RenderError> {
        let pages: Vec<PdfPage> = self
            .layout(record)
            .into_iter()
            .map(|ops| PdfPage::new(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), ops))
            .collect();
        let page_count = pages.len();

        let mut doc = PdfDocument::new(&format!("Certificate {}", record.certificate_id));
        doc.with_pages(pages);

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let output = doc.save(&PdfSaveOptions::default(), &mut warnings);

        debug!(
            bytes = output.len(),
            pages = page_count,
            warnings = warnings.len(),
            "PDF rendered"
        );

        if !output.starts_with(b"%PDF-") {
            return Err(RenderError::Failed(
                "printpdf produced output without a PDF header".to_string(),
            ));
        }
        Ok(output)
    }
}
