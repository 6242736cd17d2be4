//! Document Ingestion
//!
//! Turns the uploaded requirements document into plain text. Word documents
//! are read straight from their zip container; text and markdown files are
//! read as UTF-8.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::{debug, info, warn};

use super::state::PipelineState;
use crate::constants::ingest as ingest_constants;
use crate::types::{ForgeError, Result};

const WORDML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// Input formats the ingestor understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Docx,
    PlainText,
    Markdown,
}

impl DocumentFormat {
    /// Detect the format from the file extension (case-insensitive)
    pub fn detect(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "docx" => Ok(Self::Docx),
            "txt" => Ok(Self::PlainText),
            "md" => Ok(Self::Markdown),
            _ => Err(ForgeError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension: if extension.is_empty() {
                    "<none>".to_string()
                } else {
                    extension
                },
            }),
        }
    }
}

/// Extract plain text from a document on disk
pub fn extract_text(path: &Path) -> Result<String> {
    let format = DocumentFormat::detect(path)?;
    debug!("Ingesting {} as {:?}", path.display(), format);

    match format {
        DocumentFormat::Docx => read_docx(path),
        DocumentFormat::PlainText | DocumentFormat::Markdown => {
            std::fs::read_to_string(path).map_err(|e| parse_error(path, e))
        }
    }
}

/// Parse stage: populate `source_text` or fail the run
pub fn run(mut state: PipelineState) -> PipelineState {
    let path = state.source_path().to_path_buf();

    match extract_text(&path) {
        Ok(text) => {
            let chars = text.chars().count();
            if let Err(e) = state.set_source_text(text) {
                warn!("{}", e);
                state.fail(format!("Error parsing document: {}", e));
                return state;
            }
            info!("Parsed {} ({} characters)", path.display(), chars);
            state.system_message(format!("Parsed requirements document: {} characters", chars));
        }
        Err(e) => {
            warn!("Document ingestion failed: {}", e);
            state.fail(format!("Error parsing document: {}", e));
        }
    }
    state
}

fn parse_error(path: &Path, err: impl std::fmt::Display) -> ForgeError {
    ForgeError::DocumentParse {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

fn read_docx(path: &Path) -> Result<String> {
    let file = File::open(path).map_err(|e| parse_error(path, e))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| parse_error(path, e))?;
    let entry = archive
        .by_name(ingest_constants::DOCX_MAIN_PART)
        .map_err(|e| parse_error(path, e))?;

    let mut xml = String::new();
    entry
        .take(ingest_constants::MAX_DOCUMENT_XML_BYTES)
        .read_to_string(&mut xml)
        .map_err(|e| parse_error(path, e))?;

    docx_xml_to_text(&xml).map_err(|e| parse_error(path, e))
}

/// Flatten WordprocessingML body XML into text
pub fn docx_xml_to_text(xml: &str) -> std::result::Result<String, roxmltree::Error> {
    let doc = roxmltree::Document::parse(xml)?;
    let mut out = String::new();
    collect_text(doc.root(), &mut out);
    Ok(out)
}

fn collect_text(node: roxmltree::Node<'_, '_>, out: &mut String) {
    for child in node.children().filter(|c| c.is_element()) {
        let tag = child.tag_name();
        if tag.namespace() != Some(WORDML_NS) {
            collect_text(child, out);
            continue;
        }
        match tag.name() {
            "t" => out.push_str(child.text().unwrap_or_default()),
            "tab" => out.push('\t'),
            "br" | "cr" => out.push('\n'),
            "p" => {
                collect_text(child, out);
                out.push('\n');
            }
            _ => collect_text(child, out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    const BODY: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>Inventory</w:t></w:r><w:r><w:t xml:space="preserve"> Service</w:t></w:r></w:p>
    <w:p><w:r><w:t>Name</w:t><w:tab/><w:t>Type</w:t><w:br/><w:t>next</w:t></w:r></w:p>
  </w:body>
</w:document>"#;

    fn write_docx(dir: &Path, name: &str, xml: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        let file = File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file("[Content_Types].xml", options).unwrap();
        zip.write_all(b"<Types/>").unwrap();
        zip.start_file(ingest_constants::DOCX_MAIN_PART, options)
            .unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
        path
    }

    #[test]
    fn test_detect_format_case_insensitive() {
        assert_eq!(
            DocumentFormat::detect(Path::new("SRS.DOCX")).unwrap(),
            DocumentFormat::Docx
        );
        assert_eq!(
            DocumentFormat::detect(Path::new("notes.Md")).unwrap(),
            DocumentFormat::Markdown
        );
        let err = DocumentFormat::detect(Path::new("srs.pdf")).unwrap_err();
        assert!(matches!(err, ForgeError::UnsupportedFormat { ref extension, .. } if extension == "pdf"));
        assert!(DocumentFormat::detect(Path::new("README")).is_err());
    }

    #[test]
    fn test_docx_xml_to_text() {
        let text = docx_xml_to_text(BODY).unwrap();
        assert_eq!(text, "Inventory Service\nName\tType\nnext\n");
    }

    #[test]
    fn test_extract_docx_from_container() {
        let dir = TempDir::new().unwrap();
        let path = write_docx(dir.path(), "srs.docx", BODY);
        let text = extract_text(&path).unwrap();
        assert!(text.starts_with("Inventory Service\n"));
    }

    #[test]
    fn test_corrupt_docx_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.docx");
        std::fs::write(&path, b"not a zip").unwrap();
        let err = extract_text(&path).unwrap_err();
        assert!(matches!(err, ForgeError::DocumentParse { .. }));
    }

    #[test]
    fn test_run_records_character_count() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("srs.md");
        std::fs::write(&path, "# Shop\nUsers buy things.").unwrap();

        let state = run(PipelineState::new(&path, 3));
        assert!(!state.is_failed());
        assert_eq!(state.source_text(), Some("# Shop\nUsers buy things."));
        assert_eq!(
            state.messages()[0].content,
            "Parsed requirements document: 24 characters"
        );
    }

    #[test]
    fn test_run_unsupported_format_fails() {
        let state = run(PipelineState::new("srs.pdf", 3));
        assert!(state.is_failed());
        assert_eq!(state.messages().len(), 1);
        assert!(state.source_text().is_none());
    }
}
