//! File text extraction

use std::path::Path;

use anyhow::{Context, Result};

/// Extensions read as plain text
pub const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "cs", "css", "cpp", "js", "jsx", "ts", "tsx", "kt", "swift", "java", "php", "py",
    "go", "rs", "rb", "sh", "yml", "yaml", "proto", "hh", "h",
];

/// Turns a file on disk into text. Blocking; runs on a worker slot.
pub trait FileExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Html,
    Json,
    Text,
}

impl FileKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_lowercase();
        match extension.as_str() {
            "pdf" => Some(FileKind::Pdf),
            "html" | "htm" => Some(FileKind::Html),
            "json" => Some(FileKind::Json),
            ext if TEXT_EXTENSIONS.contains(&ext) => Some(FileKind::Text),
            _ => None,
        }
    }
}

pub fn is_supported(path: &Path) -> bool {
    FileKind::from_path(path).is_some()
}

/// Extractor for PDF, HTML, JSON and plain-text sources
#[derive(Debug, Clone, Copy, Default)]
pub struct TextExtractor;

impl FileExtractor for TextExtractor {
    fn extract(&self, path: &Path) -> Result<String> {
        if !path.is_file() {
            anyhow::bail!("File does not exist: {}", path.display());
        }

        let kind = FileKind::from_path(path)
            .with_context(|| format!("Unsupported file type: {}", path.display()))?;

        match kind {
            FileKind::Pdf => pdf_extract::extract_text(path)
                .map_err(|e| anyhow::anyhow!("Failed to read PDF {}: {}", path.display(), e)),
            FileKind::Html => {
                let html = read_text(path)?;
                Ok(html_to_text(&html))
            }
            FileKind::Json => {
                let raw = read_text(path)?;
                let value: serde_json::Value = serde_json::from_str(&raw)
                    .with_context(|| format!("Invalid JSON in {}", path.display()))?;
                Ok(serde_json::to_string_pretty(&value)?)
            }
            FileKind::Text => read_text(path),
        }
    }
}

fn read_text(path: &Path) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}

/// Visible text of an HTML document, whitespace collapsed
pub fn html_to_text(html: &str) -> String {
    let document = scraper::Html::parse_document(html);
    document
        .root_element()
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
