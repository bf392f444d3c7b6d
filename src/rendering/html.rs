use super::{CertificateRenderer, RenderError};
use crate::domain::CertificateRecord;

/// Textual fallback renderer. Always available, never fails.
pub struct HtmlRenderer;

impl HtmlRenderer {
    pub fn render_document(record: &CertificateRecord) -> String {
        let rows = [
            ("Name", record.user_name.as_str()),
            ("Email", record.email.as_deref().unwrap_or("-")),
            ("Title", record.title.as_str()),
            ("File", record.file_name.as_str()),
            ("Certificate ID", record.certificate_id.as_str()),
            ("SHA-256", record.fingerprint.as_str()),
            ("Blockchain", record.blockchain.as_str()),
            ("Anchoring", record.anchoring_status.as_str()),
        ];

        let mut body = String::new();
        for (label, value) in rows {
            body.push_str(&format!(
                "      <tr><th>{}</th><td><code>{}</code></td></tr>\n",
                label,
                escape(value)
            ));
        }
        body.push_str(&format!(
            "      <tr><th>Timestamp</th><td>{}</td></tr>\n",
            record.issued_at.to_rfc3339()
        ));
        body.push_str(&format!(
            "      <tr><th>Verify at</th><td><a href=\"{0}\">{0}</a></td></tr>\n",
            escape(&record.verification_url)
        ));

        format!(
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n  <meta charset=\"utf-8\">\n  <title>Certificate {id}</title>\n  <style>body{{font-family:sans-serif;margin:2em}}th{{text-align:left;padding-right:1em}}code{{word-break:break-all}}</style>\n</head>\n<body>\n  <h1>Certificate of Existence</h1>\n  <table>\n{body}  </table>\n</body>\n</html>\n",
            id = escape(record.certificate_id.as_str()),
            body = body
        )
    }
}

impl CertificateRenderer for HtmlRenderer {
    fn name(&self) -> &str {
        "html"
    }

    fn render(&self, record: &CertificateRecord) -> Result<Vec<u8>, RenderError> {
        Ok(Self::render_document(record).into_bytes())
    }
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
