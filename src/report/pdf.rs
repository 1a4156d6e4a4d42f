//! PDF composition.
//!
//! Layout is delegated to an [`HtmlRenderer`]; the default one runs an
//! HTML-to-PDF command line tool inside a temporary directory. When an sRGB
//! ICC profile is available the rendered document is then marked as PDF/A-1b:
//! the profile is embedded as the output intent and XMP metadata declares the
//! conformance level. PDF/A-1 is based on PDF 1.4, so the document is written
//! back with a classic cross-reference table and an Info dictionary that
//! repeats exactly what the XMP packet states. Without a profile the renderer
//! output is returned as is.

use lopdf::xref::XrefType;
use lopdf::{decode_text_string, dictionary, text_string, Document, Object, Stream, StringFormat};
use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tempfile::tempdir;
use thiserror::Error;

use super::error::ReportError;
use super::text::collapse_whitespace;
use crate::config::ReportConfig;

const PREVIEW_LIMIT: usize = 300;
const OUTPUT_CONDITION: &str = "sRGB IEC61966-2.1";
const HTML_FILENAME: &str = "relatorio.html";
const PDF_FILENAME: &str = "relatorio.pdf";
const DEFAULT_PRODUCER: &str = "activity-report-server";
// Trailer entries that only belong to a cross-reference stream.
const XREF_STREAM_KEYS: [&[u8]; 8] = [
    b"Type",
    b"W",
    b"Index",
    b"Length",
    b"Filter",
    b"DecodeParms",
    b"XRefStm",
    b"Prev",
];

/// Errors raised while turning HTML into PDF bytes.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to create temporary directory: {0}")]
    TempDir(#[source] std::io::Error),
    #[error("failed to write HTML source: {0}")]
    WriteHtml(#[source] std::io::Error),
    #[error("HTML renderer execution failed: {0}")]
    RendererIo(#[source] std::io::Error),
    #[error("HTML renderer exited with status {code}: {stderr}")]
    RendererExit { code: i32, stderr: String },
    #[error("failed to read generated PDF: {0}")]
    ReadPdf(#[source] std::io::Error),
    #[error("renderer output is not a PDF document")]
    InvalidOutput,
    #[error("failed to apply PDF/A metadata: {0}")]
    PdfA(String),
}

/// Lays out an HTML document as PDF.
pub trait HtmlRenderer: Send + Sync {
    /// `base_uri` is the location relative asset references resolve against.
    fn render(&self, html: &str, base_uri: &str) -> Result<Vec<u8>, RenderError>;
}

/// Runs an external HTML-to-PDF tool (WeasyPrint by default):
/// `<program> --base-url <base> input.html output.pdf`.
#[derive(Debug, Clone)]
pub struct CommandHtmlRenderer {
    program: String,
}

impl CommandHtmlRenderer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl HtmlRenderer for CommandHtmlRenderer {
    fn render(&self, html: &str, base_uri: &str) -> Result<Vec<u8>, RenderError> {
        let temp_dir = tempdir().map_err(RenderError::TempDir)?;
        let html_path = temp_dir.path().join(HTML_FILENAME);
        let output_path = temp_dir.path().join(PDF_FILENAME);

        fs::write(&html_path, html).map_err(RenderError::WriteHtml)?;

        let output = Command::new(&self.program)
            .arg("--base-url")
            .arg(base_uri)
            .arg(&html_path)
            .arg(&output_path)
            .current_dir(temp_dir.path())
            .output()
            .map_err(RenderError::RendererIo)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RenderError::RendererExit {
                code: output.status.code().unwrap_or(-1),
                stderr: collapse_whitespace(&stderr).chars().take(PREVIEW_LIMIT).collect(),
            });
        }

        let pdf = fs::read(&output_path).map_err(RenderError::ReadPdf)?;
        if !pdf.starts_with(b"%PDF") {
            return Err(RenderError::InvalidOutput);
        }
        Ok(pdf)
    }
}

/// Output of [`PdfComposer::compose`].
#[derive(Debug)]
pub struct ComposedPdf {
    pub bytes: Vec<u8>,
    pub archival: bool,
}

pub struct PdfComposer {
    renderer: Arc<dyn HtmlRenderer>,
    icc_profile: Option<Arc<Vec<u8>>>,
    base_uri: String,
}

impl PdfComposer {
    pub fn new(
        renderer: Arc<dyn HtmlRenderer>,
        icc_profile: Option<Vec<u8>>,
        base_uri: impl Into<String>,
    ) -> Self {
        Self {
            renderer,
            icc_profile: icc_profile.map(Arc::new),
            base_uri: base_uri.into(),
        }
    }

    pub fn from_config(config: &ReportConfig) -> Self {
        Self::new(
            Arc::new(CommandHtmlRenderer::new(config.renderer_bin.clone())),
            load_icc_profile(&config.icc_profile_path),
            base_uri_for(&config.assets_dir),
        )
    }

    /// Whether composed documents will carry PDF/A-1b markers.
    pub fn is_archival(&self) -> bool {
        self.icc_profile.is_some()
    }

    /// Render `html` into a complete PDF. Never returns partial output.
    pub fn compose(&self, html: &str, title: &str) -> Result<ComposedPdf, ReportError> {
        let rendered = self
            .renderer
            .render(html, &self.base_uri)
            .map_err(|e| rendering_failure(e, html))?;

        match &self.icc_profile {
            Some(profile) => {
                let bytes =
                    apply_pdfa(&rendered, profile, title).map_err(|e| rendering_failure(e, html))?;
                Ok(ComposedPdf {
                    bytes,
                    archival: true,
                })
            }
            None => Ok(ComposedPdf {
                bytes: rendered,
                archival: false,
            }),
        }
    }
}

fn rendering_failure(error: RenderError, html: &str) -> ReportError {
    let preview = html_preview(html);
    log::error!("PDF composition failed: {} (html: {})", error, preview);
    ReportError::Rendering {
        message: error.to_string(),
        preview,
    }
}

/// First characters of `html` with whitespace collapsed, for diagnostics.
pub fn html_preview(html: &str) -> String {
    collapse_whitespace(html).chars().take(PREVIEW_LIMIT).collect()
}

/// Read the ICC profile; a missing or empty file disables PDF/A output.
pub fn load_icc_profile(path: &Path) -> Option<Vec<u8>> {
    match fs::read(path) {
        Ok(bytes) if !bytes.is_empty() => {
            log::info!("Loaded ICC profile from {}", path.display());
            Some(bytes)
        }
        Ok(_) => {
            log::warn!("ICC profile {} is empty, generating plain PDF", path.display());
            None
        }
        Err(e) => {
            log::warn!(
                "ICC profile {} not available ({}), generating plain PDF",
                path.display(),
                e
            );
            None
        }
    }
}

/// `file://` URI of the template asset directory, with a trailing slash.
pub fn base_uri_for(assets_dir: &Path) -> String {
    let dir: PathBuf = assets_dir
        .canonicalize()
        .unwrap_or_else(|_| assets_dir.to_path_buf());
    let mut uri = format!("file://{}", dir.display());
    if !uri.ends_with('/') {
        uri.push('/');
    }
    uri
}

fn pdfa_error(error: impl std::fmt::Display) -> RenderError {
    RenderError::PdfA(error.to_string())
}

/// Embed `icc_profile` as a `GTS_PDFA1` output intent and declare PDF/A-1b
/// conformance in the document's XMP metadata.
///
/// Object and cross-reference streams are not allowed in PDF/A-1: the
/// document is saved with a cross-reference table and the stream-only trailer
/// keys are dropped. The Info dictionary is replaced by one holding only
/// `Title` and `Producer`, both mirrored in the XMP packet.
pub fn apply_pdfa(pdf: &[u8], icc_profile: &[u8], title: &str) -> Result<Vec<u8>, RenderError> {
    let mut doc = Document::load_mem(pdf).map_err(pdfa_error)?;
    doc.version = "1.4".to_string();
    doc.reference_table.cross_reference_type = XrefType::CrossReferenceTable;
    for key in XREF_STREAM_KEYS {
        doc.trailer.remove(key);
    }

    let producer = renderer_producer(&doc).unwrap_or_else(|| DEFAULT_PRODUCER.to_string());
    let info = Object::Dictionary(dictionary! {
        "Title" => text_string(title),
        "Producer" => text_string(&producer),
    });
    match doc.trailer.get(b"Info").and_then(Object::as_reference) {
        Ok(info_id) => {
            doc.objects.insert(info_id, info);
        }
        Err(_) => {
            let info_id = doc.add_object(info);
            doc.trailer.set("Info", Object::Reference(info_id));
        }
    }

    let icc_id = doc.add_object(Stream::new(
        dictionary! { "N" => Object::Integer(3) },
        icc_profile.to_vec(),
    ));
    let intent_id = doc.add_object(dictionary! {
        "Type" => "OutputIntent",
        "S" => "GTS_PDFA1",
        "OutputConditionIdentifier" => Object::string_literal(OUTPUT_CONDITION),
        "Info" => Object::string_literal(OUTPUT_CONDITION),
        "RegistryName" => Object::string_literal("http://www.color.org"),
        "DestOutputProfile" => Object::Reference(icc_id),
    });

    let mut metadata = Stream::new(
        dictionary! { "Type" => "Metadata", "Subtype" => "XML" },
        xmp_metadata(title, &producer).into_bytes(),
    );
    metadata.allows_compression = false;
    let metadata_id = doc.add_object(metadata);

    let root_id = doc
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(pdfa_error)?;
    let catalog = doc
        .get_object_mut(root_id)
        .and_then(Object::as_dict_mut)
        .map_err(pdfa_error)?;
    catalog.set("OutputIntents", Object::Array(vec![Object::Reference(intent_id)]));
    catalog.set("Metadata", Object::Reference(metadata_id));

    let id = document_id(pdf);
    doc.trailer.set(
        "ID",
        Object::Array(vec![
            Object::String(id.clone(), StringFormat::Hexadecimal),
            Object::String(id, StringFormat::Hexadecimal),
        ]),
    );

    let mut out = Vec::new();
    doc.save_to(&mut out).map_err(pdfa_error)?;
    Ok(out)
}

/// `Producer` of the renderer's Info dictionary, if it has one.
fn renderer_producer(doc: &Document) -> Option<String> {
    let info = doc.trailer.get(b"Info").ok()?;
    let (_, info) = doc.dereference(info).ok()?;
    let producer = info.as_dict().ok()?.get(b"Producer").ok()?;
    decode_text_string(producer).ok()
}

fn document_id(pdf: &[u8]) -> Vec<u8> {
    let mut id = Vec::with_capacity(16);
    for salt in [0u8, 1u8] {
        let mut hasher = DefaultHasher::new();
        salt.hash(&mut hasher);
        pdf.hash(&mut hasher);
        id.extend_from_slice(&hasher.finish().to_be_bytes());
    }
    id
}

fn xmp_metadata(title: &str, producer: &str) -> String {
    let mut out = String::new();
    out.push_str("<?xpacket begin=\"\u{feff}\" id=\"W5M0MpCehiHzreSzNTczkc9d\"?>\n");
    out.push_str("<x:xmpmeta xmlns:x=\"adobe:ns:meta/\">\n");
    out.push_str("<rdf:RDF xmlns:rdf=\"http://www.w3.org/1999/02/22-rdf-syntax-ns#\">\n");
    out.push_str("<rdf:Description rdf:about=\"\" xmlns:pdfaid=\"http://www.aiim.org/pdfa/ns/id/\" ");
    out.push_str("pdfaid:part=\"1\" pdfaid:conformance=\"B\"/>\n");
    out.push_str("<rdf:Description rdf:about=\"\" xmlns:dc=\"http://purl.org/dc/elements/1.1/\">");
    out.push_str("<dc:title><rdf:Alt><rdf:li xml:lang=\"x-default\">");
    out.push_str(&escape_xml_text(title));
    out.push_str("</rdf:li></rdf:Alt></dc:title></rdf:Description>\n");
    out.push_str("<rdf:Description rdf:about=\"\" xmlns:pdf=\"http://ns.adobe.com/pdf/1.3/\">");
    out.push_str("<pdf:Producer>");
    out.push_str(&escape_xml_text(producer));
    out.push_str("</pdf:Producer></rdf:Description>\n");
    out.push_str("</rdf:RDF>\n</x:xmpmeta>\n");
    out.push_str("<?xpacket end=\"w\"?>");
    out
}

fn escape_xml_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}
