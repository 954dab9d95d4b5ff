//! services/api/src/adapters/pdf.rs
//!
//! This module contains the PDF text extraction adapter, implementing the
//! `TextExtractor` port with the `pdf-extract` crate.

use docchat_core::domain::ExtractedText;
use docchat_core::ports::{PortError, PortResult, TextExtractor};
use std::panic::{catch_unwind, AssertUnwindSafe};

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Header search window; some producers emit junk before the magic bytes.
const HEADER_SEARCH_BYTES: usize = 1024;

/// Extracts the text layer of a PDF page by page.
#[derive(Clone, Default)]
pub struct PdfExtractAdapter;

impl PdfExtractAdapter {
    pub fn new() -> Self {
        Self
    }
}

/// Whether `bytes` carry a PDF header near the start of the buffer.
pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(HEADER_SEARCH_BYTES)];
    window.windows(PDF_MAGIC.len()).any(|w| w == PDF_MAGIC)
}

/// Collapses runs of horizontal whitespace, trims every line and keeps at most one
/// blank line between paragraphs.
pub fn normalize_whitespace(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut blank_run = 0;
    for line in raw.lines() {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            blank_run += 1;
            continue;
        }
        if !out.is_empty() {
            out.push_str(if blank_run > 0 { "\n\n" } else { "\n" });
        }
        out.push_str(&line);
        blank_run = 0;
    }
    out
}

impl TextExtractor for PdfExtractAdapter {
    fn extract(&self, pdf_bytes: &[u8]) -> PortResult<ExtractedText> {
        if !looks_like_pdf(pdf_bytes) {
            return Err(PortError::UnreadablePdf(
                "the file does not start with a PDF header".to_string(),
            ));
        }

        // pdf-extract panics on some malformed documents instead of returning an error.
        let pages = catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem_by_pages(pdf_bytes)
        }))
        .map_err(|_| PortError::UnreadablePdf("the PDF structure is malformed".to_string()))?
        .map_err(|e| PortError::UnreadablePdf(e.to_string()))?;

        let page_count = pages.len();
        let page_texts: Vec<String> = pages
            .iter()
            .map(|page| normalize_whitespace(page))
            .filter(|page| !page.is_empty())
            .collect();
        let empty_pages = page_count - page_texts.len();

        if page_texts.is_empty() {
            return Err(PortError::UnreadablePdf(
                "no extractable text layer (the document may be scanned images)".to_string(),
            ));
        }

        Ok(ExtractedText {
            text: page_texts.join("\n\n"),
            page_count,
            empty_pages,
        })
    }
}
