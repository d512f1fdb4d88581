use crate::error::IngestError;
use lopdf::Document;
use std::fs;
use std::path::Path;

/// Raw text for one logical page of a source document. Plain-text sources
/// have no page structure and carry `number: None`.
#[derive(Debug, Clone)]
pub struct PageText {
    pub number: Option<u32>,
    pub text: String,
}

pub trait TextExtractor {
    fn extract(&self, path: &Path) -> Result<Vec<PageText>, IngestError>;
}

#[derive(Default)]
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn extract(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
        let document =
            Document::load(path).map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| IngestError::PdfParse(error.to_string()))?;

            if !text.trim().is_empty() {
                pages.push(PageText {
                    number: Some(page_no),
                    text,
                });
            }
        }

        if pages.is_empty() {
            return Err(IngestError::PdfParse(format!(
                "pdf had no readable page text: {}",
                path.display()
            )));
        }

        Ok(pages)
    }
}

#[derive(Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
        let text = fs::read_to_string(path)?;
        Ok(vec![PageText { number: None, text }])
    }
}

/// Extracts per-page text from a source file, dispatching on the file
/// suffix. Only PDF and plain text are recognized; anything else is an
/// unsupported-type error.
pub fn extract_text(path: &Path) -> Result<Vec<PageText>, IngestError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "pdf" => PdfExtractor.extract(path),
        "txt" => PlainTextExtractor.extract(path),
        other if other.is_empty() => Err(IngestError::UnsupportedType(format!(
            "{} has no file extension",
            path.display()
        ))),
        other => Err(IngestError::UnsupportedType(format!(".{other}"))),
    }
}

pub fn is_supported_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf") || ext.eq_ignore_ascii_case("txt"))
}
