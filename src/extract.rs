//! Text extraction for uploaded documents (PDF, DOCX, plain text).
//!
//! Returns plain UTF-8 text plus a page-count estimate. PDFs report their real
//! page count; formats without pages use a 500-words-per-page heuristic.
//! The caller-supplied page limit is enforced here, before any chunking or
//! embedding work is spent on the document.

use std::io::Read;
use std::path::Path;

use crate::error::{RagError, Result};

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_TXT: &str = "text/plain";

/// Words assumed per page for formats without a native page concept.
const WORDS_PER_PAGE: usize = 500;
/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Declared type of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Docx,
    Txt,
}

impl FileKind {
    /// Extensions accepted at upload, lowercase with leading dot.
    pub const ALLOWED_EXTENSIONS: [&'static str; 3] = [".pdf", ".docx", ".txt"];

    /// Resolve the declared type from a filename's extension (case-insensitive).
    pub fn from_filename(filename: &str) -> Result<Self> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => Ok(FileKind::Pdf),
            "docx" => Ok(FileKind::Docx),
            "txt" => Ok(FileKind::Txt),
            _ => Err(RagError::UnsupportedFormat(format!(
                "'{}' (use PDF, DOCX, or TXT)",
                filename
            ))),
        }
    }

    pub fn from_mime(content_type: &str) -> Result<Self> {
        match content_type {
            MIME_PDF => Ok(FileKind::Pdf),
            MIME_DOCX => Ok(FileKind::Docx),
            MIME_TXT => Ok(FileKind::Txt),
            other => Err(RagError::UnsupportedFormat(other.to_string())),
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            FileKind::Pdf => MIME_PDF,
            FileKind::Docx => MIME_DOCX,
            FileKind::Txt => MIME_TXT,
        }
    }
}

/// Text and page count extracted from one file.
#[derive(Debug, Clone)]
pub struct Extracted {
    pub text: String,
    pub page_count: usize,
}

/// Read `path` and extract its text according to `kind`.
pub fn extract(path: &Path, kind: FileKind) -> Result<Extracted> {
    let bytes = std::fs::read(path)
        .map_err(|e| RagError::Extraction(format!("cannot read {}: {}", path.display(), e)))?;
    extract_bytes(&bytes, kind)
}

/// Extract from `path`, then fail with `PageLimitExceeded` if the page count
/// is above `max_pages`.
pub fn extract_with_limit(path: &Path, kind: FileKind, max_pages: usize) -> Result<Extracted> {
    let extracted = extract(path, kind)?;
    enforce_page_limit(&extracted, max_pages)?;
    Ok(extracted)
}

pub fn enforce_page_limit(extracted: &Extracted, max_pages: usize) -> Result<()> {
    if extracted.page_count > max_pages {
        return Err(RagError::PageLimitExceeded {
            pages: extracted.page_count,
            max: max_pages,
        });
    }
    Ok(())
}

/// Extract text from in-memory file content.
pub fn extract_bytes(bytes: &[u8], kind: FileKind) -> Result<Extracted> {
    match kind {
        FileKind::Pdf => extract_pdf(bytes),
        FileKind::Docx => extract_docx(bytes),
        FileKind::Txt => extract_txt(bytes),
    }
}

/// `max(1, words / 500)`.
pub fn estimate_pages(text: &str) -> usize {
    (text.split_whitespace().count() / WORDS_PER_PAGE).max(1)
}

fn extract_pdf(bytes: &[u8]) -> Result<Extracted> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| RagError::Extraction(format!("PDF: {}", e)))?;
    // Pages with no extractable text still count.
    let page_count = pages.len();
    Ok(Extracted {
        text: pages.join("\n"),
        page_count,
    })
}

fn extract_txt(bytes: &[u8]) -> Result<Extracted> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| RagError::Extraction(format!("text file is not valid UTF-8: {}", e)))?
        .to_string();
    let page_count = estimate_pages(&text);
    Ok(Extracted { text, page_count })
}

fn extract_docx(bytes: &[u8]) -> Result<Extracted> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| RagError::Extraction(format!("DOCX: {}", e)))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| RagError::Extraction("DOCX: word/document.xml not found".to_string()))?;
    let mut doc_xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut doc_xml)
        .map_err(|e| RagError::Extraction(format!("DOCX: {}", e)))?;
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(RagError::Extraction(
            "DOCX: word/document.xml exceeds size limit".to_string(),
        ));
    }

    let text = extract_paragraphs(&doc_xml)?.join("\n");
    let page_count = estimate_pages(&text);
    Ok(Extracted { text, page_count })
}

/// Collect the text of each `<w:p>` paragraph from `word/document.xml`.
fn extract_paragraphs(xml: &[u8]) -> Result<Vec<String>> {
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf)
                    {
                        current.push_str(te.unescape().unwrap_or_default().as_ref());
                    }
                }
            }
            Ok(quick_xml::events::Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => current.push('\t'),
                b"br" => current.push('\n'),
                b"p" => paragraphs.push(String::new()),
                _ => {}
            },
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"p" {
                    paragraphs.push(std::mem::take(&mut current));
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(RagError::Extraction(format!("DOCX: {}", e))),
            _ => {}
        }
        buf.clear();
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }
    Ok(paragraphs)
}
