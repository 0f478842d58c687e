//! Turning uploaded bytes into page-level [`Document`]s.
//!
//! PDFs are parsed with `lopdf` one page at a time; plain text files become a
//! single page. A file that cannot be read is reported on its own and never
//! aborts the rest of the batch.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::document::Document;
use crate::error::{RagError, Result};

/// An uploaded file as received from the caller.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Client-supplied file name.
    pub name: String,
    /// Declared MIME type, if any.
    pub content_type: Option<String>,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

impl Upload {
    /// Create an upload without a declared content type.
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self { name: name.into(), content_type: None, bytes: bytes.into() }
    }

    /// Set the declared MIME type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Supported upload formats.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Portable Document Format.
    Pdf,
    /// UTF-8 text.
    PlainText,
}

impl DocumentKind {
    /// Resolve the format from the declared MIME type, falling back to the
    /// file extension.
    pub fn detect(name: &str, content_type: Option<&str>) -> Option<Self> {
        let mime = content_type.map(|m| m.split(';').next().unwrap_or(m).trim());
        match mime {
            Some("application/pdf") => return Some(Self::Pdf),
            Some("text/plain") | Some("text/markdown") => return Some(Self::PlainText),
            _ => {}
        }

        let extension = name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
        match extension.as_deref() {
            Some("pdf") => Some(Self::Pdf),
            Some("txt") | Some("text") | Some("md") => Some(Self::PlainText),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::PlainText => "text",
        }
    }
}

/// One upload that produced no documents.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IngestFailure {
    /// Sanitized source name of the upload.
    pub source: String,
    /// Why the upload was rejected.
    pub message: String,
}

/// Result of ingesting a batch of uploads.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    /// Extracted pages from every readable upload, in upload order.
    pub documents: Vec<Document>,
    /// Number of uploads that yielded at least one page.
    pub files_loaded: usize,
    /// Uploads that could not be read.
    pub failures: Vec<IngestFailure>,
}

/// Make an upload name safe to use as a source identifier.
///
/// Surrounding whitespace is trimmed, inner spaces become `_`, and anything
/// other than word characters, `-` and `.` is dropped.
pub fn sanitize_source_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .replace(' ', "_")
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
        .collect();
    if cleaned.is_empty() { "document".to_string() } else { cleaned }
}

/// Extract the pages of a single upload.
///
/// # Errors
///
/// Returns [`RagError::IngestionError`] for unsupported formats, unreadable
/// or encrypted PDFs, invalid UTF-8 text, and files with no extractable text.
pub fn load_upload(upload: &Upload) -> Result<Vec<Document>> {
    let source = sanitize_source_name(&upload.name);
    let kind = DocumentKind::detect(&upload.name, upload.content_type.as_deref()).ok_or_else(
        || RagError::IngestionError {
            source_name: source.clone(),
            message: "unsupported document format".to_string(),
        },
    )?;

    let mut documents = match kind {
        DocumentKind::Pdf => load_pdf(&source, &upload.bytes)?,
        DocumentKind::PlainText => load_text(&source, &upload.bytes)?,
    };
    if documents.is_empty() {
        return Err(RagError::IngestionError {
            source_name: source,
            message: "no extractable text".to_string(),
        });
    }

    for document in &mut documents {
        document.metadata.insert("file_type".to_string(), kind.label().to_string());
    }
    debug!(source = %source, pages = documents.len(), kind = kind.label(), "loaded upload");
    Ok(documents)
}

/// Extract every upload, collecting failures instead of stopping at them.
pub fn ingest_uploads(uploads: &[Upload]) -> IngestReport {
    let mut report = IngestReport::default();
    for upload in uploads {
        match load_upload(upload) {
            Ok(documents) => {
                report.files_loaded += 1;
                report.documents.extend(documents);
            }
            Err(e) => {
                warn!(upload = %upload.name, error = %e, "skipping unreadable upload");
                let (source, message) = match e {
                    RagError::IngestionError { source_name, message } => (source_name, message),
                    other => (sanitize_source_name(&upload.name), other.to_string()),
                };
                report.failures.push(IngestFailure { source, message });
            }
        }
    }
    info!(
        files = uploads.len(),
        files_loaded = report.files_loaded,
        pages = report.documents.len(),
        failures = report.failures.len(),
        "ingested uploads"
    );
    report
}

fn load_pdf(source: &str, bytes: &[u8]) -> Result<Vec<Document>> {
    let pdf = lopdf::Document::load_mem(bytes).map_err(|e| RagError::IngestionError {
        source_name: source.to_string(),
        message: format!("failed to parse PDF: {e}"),
    })?;
    if pdf.is_encrypted() {
        return Err(RagError::IngestionError {
            source_name: source.to_string(),
            message: "encrypted PDFs are not supported".to_string(),
        });
    }

    let pages = pdf.get_pages();
    let total_pages = pages.len();
    let mut documents = Vec::new();
    for page_number in pages.keys() {
        match pdf.extract_text(&[*page_number]) {
            Ok(text) if !text.trim().is_empty() => {
                let mut document = Document::new(source, *page_number, text);
                document.metadata = HashMap::from([(
                    "total_pages".to_string(),
                    total_pages.to_string(),
                )]);
                documents.push(document);
            }
            Ok(_) => debug!(source, page = page_number, "page has no text"),
            Err(e) => warn!(source, page = page_number, error = %e, "failed to extract page text"),
        }
    }
    Ok(documents)
}

fn load_text(source: &str, bytes: &[u8]) -> Result<Vec<Document>> {
    let text = std::str::from_utf8(bytes).map_err(|e| RagError::IngestionError {
        source_name: source.to_string(),
        message: format!("text is not valid UTF-8: {e}"),
    })?;
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(vec![Document::new(source, 1, text)])
}

#[cfg(test)]
mod tests {
    use lopdf::content::{Content, Operation};
    use lopdf::{Object, Stream, dictionary};

    use super::*;

    /// Build a PDF with one page per entry; an empty entry is a page without
    /// any text.
    fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
        let mut pdf = lopdf::Document::with_version("1.5");
        let pages_id = pdf.new_object_id();
        let font_id = pdf.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = pdf.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in pages {
            let mut operations = vec![Operation::new("BT", vec![])];
            if !text.is_empty() {
                operations.push(Operation::new("Tf", vec!["F1".into(), 12.into()]));
                operations.push(Operation::new("Td", vec![72.into(), 720.into()]));
                operations.push(Operation::new("Tj", vec![Object::string_literal(*text)]));
            }
            operations.push(Operation::new("ET", vec![]));
            let content = Content { operations }.encode().unwrap();
            let content_id = pdf.add_object(Stream::new(dictionary! {}, content));
            let page_id = pdf.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        pdf.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = pdf.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        pdf.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        pdf.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn sanitizes_names() {
        assert_eq!(sanitize_source_name("  My Report (final).pdf "), "My_Report_final.pdf");
        assert_eq!(sanitize_source_name("résumé.txt"), "résumé.txt");
        assert_eq!(sanitize_source_name("///"), "document");
    }

    #[test]
    fn detects_kind_from_mime_then_extension() {
        assert_eq!(DocumentKind::detect("x.bin", Some("application/pdf")), Some(DocumentKind::Pdf));
        assert_eq!(
            DocumentKind::detect("x", Some("text/plain; charset=utf-8")),
            Some(DocumentKind::PlainText)
        );
        assert_eq!(
            DocumentKind::detect("Notes.TXT", Some("application/octet-stream")),
            Some(DocumentKind::PlainText)
        );
        assert_eq!(DocumentKind::detect("paper.pdf", None), Some(DocumentKind::Pdf));
        assert_eq!(DocumentKind::detect("image.png", None), None);
    }

    #[test]
    fn text_upload_becomes_one_page() {
        let docs = load_upload(&Upload::new("notes.txt", "hello there")).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].page, 1);
        assert_eq!(docs[0].source, "notes.txt");
        assert_eq!(docs[0].metadata.get("file_type").map(String::as_str), Some("text"));
    }

    #[test]
    fn pdf_pages_keep_their_numbers_and_skip_blank_pages() {
        let bytes = pdf_with_pages(&["Volcanoes erupt molten rock.", "", "Lava cools into basalt."]);
        let docs = load_upload(&Upload::new("field report.pdf", bytes)).unwrap();

        let pages: Vec<u32> = docs.iter().map(|d| d.page).collect();
        assert_eq!(pages, vec![1, 3]);
        assert!(docs[0].text.contains("Volcanoes erupt molten rock."));
        assert!(docs[1].text.contains("Lava cools into basalt."));
        for doc in &docs {
            assert_eq!(doc.source, "field_report.pdf");
            assert_eq!(doc.metadata.get("file_type").map(String::as_str), Some("pdf"));
            assert_eq!(doc.metadata.get("total_pages").map(String::as_str), Some("3"));
        }
    }

    #[test]
    fn pdf_without_any_text_is_a_failure() {
        let report = ingest_uploads(&[Upload::new("scan.pdf", pdf_with_pages(&["", ""]))]);
        assert_eq!(report.files_loaded, 0);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].message, "no extractable text");
    }

    #[test]
    fn failures_do_not_abort_the_batch() {
        let uploads = vec![
            Upload::new("broken.pdf", b"%PDF-1.4 definitely not a pdf".to_vec()),
            Upload::new("good.txt", "some useful text"),
            Upload::new("blank.txt", "   \n"),
            Upload::new("bad.txt", vec![0xff, 0xfe, 0x00]),
            Upload::new("photo.jpg", vec![1, 2, 3]),
        ];
        let report = ingest_uploads(&uploads);
        assert_eq!(report.files_loaded, 1);
        assert_eq!(report.documents.len(), 1);
        let failed: Vec<&str> = report.failures.iter().map(|f| f.source.as_str()).collect();
        assert_eq!(failed, vec!["broken.pdf", "blank.txt", "bad.txt", "photo.jpg"]);
    }
}
