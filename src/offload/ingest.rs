//! Directory ingestion through the worker pool

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};
use walkdir::WalkDir;

use super::adapter::{BlockingCallAdapter, Operation};
use super::extract::is_supported;
use super::tokens::Chunker;

/// One JSONL row: a file, or one chunk of a file that exceeded the token limit
#[derive(Debug, Clone, Serialize)]
pub struct IngestedFile {
    pub fname: String,
    pub text: String,
    pub n_tokens: usize,
}

/// Supported files below `dir`, in walk order
pub fn discover(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_supported(entry.path()))
        .map(|entry| entry.into_path())
        .collect()
}

/// Extract every supported file below `dir`, all submitted to the pool at once, then split
/// texts longer than `max_tokens` into sentence chunks
pub async fn ingest_directory(
    adapter: &BlockingCallAdapter,
    dir: &Path,
    max_tokens: usize,
) -> Result<Vec<IngestedFile>> {
    info!("Processing directory: {}", dir.display());

    let root = dir.to_path_buf();
    let files = adapter
        .pool()
        .submit(move || Ok(discover(&root)))
        .context("Failed to queue directory walk")?
        .await
        .context("Directory walk failed")?;

    let results = join_all(files.into_iter().map(|path| async move {
        let result = adapter.run(Operation::FileExtract(path.clone())).await;
        (path, result)
    }))
    .await;

    let mut extracted = Vec::with_capacity(results.len());
    for (path, result) in results {
        let fname = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match result {
            Ok(text) => {
                let text = format!("{}. {}", fname, collapse_whitespace(&text));
                extracted.push((fname, text));
            }
            Err(e) => warn!("Error processing file {}: {}", path.display(), e),
        }
    }
    let file_count = extracted.len();

    let ingested = adapter
        .pool()
        .submit(move || {
            let chunker = Chunker::new(max_tokens)?;
            Ok(chunk_files(&chunker, extracted))
        })
        .context("Failed to queue tokenization")?
        .await
        .context("Tokenization failed")?;

    info!("Processed {} files into {} rows", file_count, ingested.len());
    Ok(ingested)
}

/// Token-count each text, splitting the ones over the chunker's limit
pub fn chunk_files(chunker: &Chunker, files: Vec<(String, String)>) -> Vec<IngestedFile> {
    let mut rows = Vec::with_capacity(files.len());
    for (fname, text) in files {
        for chunk in chunker.chunk(&text) {
            rows.push(IngestedFile {
                n_tokens: chunker.count(&chunk),
                fname: fname.clone(),
                text: chunk,
            });
        }
    }
    rows
}

/// Write one JSON object per line
pub async fn write_jsonl(files: &[IngestedFile], out: &Path) -> Result<()> {
    if let Some(parent) = out.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut content = String::new();
    for file in files {
        content.push_str(&serde_json::to_string(file)?);
        content.push('\n');
    }

    tokio::fs::write(out, content)
        .await
        .with_context(|| format!("Failed to write {}", out.display()))?;
    info!("Files processed and saved to {}", out.display());
    Ok(())
}

/// Newlines (real or escaped) and whitespace runs become single spaces
pub fn collapse_whitespace(text: &str) -> String {
    text.replace("\\n", " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
