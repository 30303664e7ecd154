//! Document ingestion: walk paths, process files, rebuild the index.
//!
//! Files named directly are always taken; directories are walked and
//! filtered by `[documents]` include/exclude globs. A single unreadable
//! document fails the whole run, so the index is never rebuilt from a
//! partial document set.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use qa_harness_core::models::{Chunk, Document};
use qa_harness_core::retriever::Retriever;

use crate::config::{Config, DocumentsConfig};
use crate::extract::{content_type_for, process_document};
use crate::sqlite_store::SqliteRetriever;

/// A file picked up for ingestion and the source name it is indexed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFile {
    pub path: PathBuf,
    pub source: String,
}

/// Expand `paths` into the sorted list of files to ingest.
pub fn collect_files(paths: &[PathBuf], documents: &DocumentsConfig) -> Result<Vec<DocumentFile>> {
    let include_set = build_globset(&documents.include_globs)?;

    let mut default_excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    default_excludes.extend(documents.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut files = Vec::new();

    for root in paths {
        if root.is_file() {
            files.push(DocumentFile {
                path: root.clone(),
                source: file_name(root),
            });
            continue;
        }
        if !root.is_dir() {
            bail!("Path does not exist: {}", root.display());
        }

        for entry in WalkDir::new(root) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(path);
            let rel_str = relative.to_string_lossy().replace('\\', "/");

            if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
                continue;
            }

            files.push(DocumentFile {
                path: path.to_path_buf(),
                source: rel_str,
            });
        }
    }

    files.sort_by(|a, b| a.source.cmp(&b.source).then_with(|| a.path.cmp(&b.path)));

    // The same file can be reached through several spellings of a path.
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(files.len());
    for file in files {
        let canonical = std::fs::canonicalize(&file.path)
            .with_context(|| format!("Failed to resolve {}", file.path.display()))?;
        if seen.insert(canonical) {
            unique.push(file);
        }
    }
    Ok(unique)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

/// Read and process one file from disk.
pub fn load_document(file: &DocumentFile, config: &Config) -> Result<Document> {
    let bytes = std::fs::read(&file.path)
        .with_context(|| format!("Failed to read {}", file.path.display()))?;
    let document = process_document(
        &bytes,
        &file.source,
        Some(content_type_for(&file.path)),
        &config.chunking.options(),
    )?;
    debug!(
        source = %file.source,
        chunks = document.metadata.chunk_count,
        "document processed"
    );
    Ok(document)
}

/// `qa process <FILE>`: print the processed document as JSON.
pub fn run_process(config: &Config, path: &Path) -> Result<()> {
    let file = DocumentFile {
        path: path.to_path_buf(),
        source: file_name(path),
    };
    let document = load_document(&file, config)?;
    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}

/// `qa index <PATH>...`: process every document and rebuild the index.
pub async fn run_index(config: &Config, paths: &[PathBuf], dry_run: bool) -> Result<()> {
    let files = collect_files(paths, &config.documents)?;
    if files.is_empty() {
        bail!("No documents found under the given paths");
    }

    let documents = files
        .iter()
        .map(|file| load_document(file, config))
        .collect::<Result<Vec<_>>>()?;
    let total_chunks: usize = documents.iter().map(|d| d.metadata.chunk_count).sum();

    if dry_run {
        println!("index (dry-run)");
        for document in &documents {
            println!(
                "  {:<40} {:>5} chunks",
                document.filename, document.metadata.chunk_count
            );
        }
        println!("  documents: {}", documents.len());
        println!("  chunks: {}", total_chunks);
        return Ok(());
    }

    let chunks: Vec<Chunk> = documents.into_iter().flat_map(|d| d.chunks).collect();

    let retriever = SqliteRetriever::open(config).await?;
    retriever
        .index(&chunks)
        .await
        .context("Error building knowledge base")?;
    retriever.close().await;

    info!(
        documents = files.len(),
        chunks = total_chunks,
        embeddings = config.embedding.is_enabled(),
        "knowledge base built"
    );

    println!("index");
    println!("  documents: {}", files.len());
    println!("  chunks written: {}", total_chunks);
    if config.embedding.is_enabled() {
        println!("  embedded with: {}", config.embedding.provider);
    }
    println!("ok");
    Ok(())
}
