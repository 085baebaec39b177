//! Knowledge-base discovery and document loading.
//!
//! [`list_files`] enumerates the regular files of the knowledge-base folder
//! (top level only unless `recursive` is set, hidden files skipped, then
//! include/exclude globs applied). A [`DocumentLoader`] turns those files
//! into [`Document`]s; [`DirectoryLoader`] is the built-in implementation
//! backed by [`crate::extract`].

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::chunk::sha256_hex;
use crate::config::IndexConfig;
use crate::extract::{extract_text, Format};
use crate::models::Document;

/// Which files of the knowledge-base folder are considered.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub recursive: bool,
    pub include_globs: Vec<String>,
    pub exclude_globs: Vec<String>,
}

impl From<&IndexConfig> for Discovery {
    fn from(cfg: &IndexConfig) -> Self {
        Self {
            recursive: cfg.recursive,
            include_globs: cfg.include_globs.clone(),
            exclude_globs: cfg.exclude_globs.clone(),
        }
    }
}

/// Enumerate candidate files under `root`, sorted by path.
pub fn list_files(root: &Path, discovery: &Discovery) -> Result<Vec<PathBuf>> {
    let include = build_globset(&discovery.include_globs)?;
    let exclude = build_globset(&discovery.exclude_globs)?;

    let mut walker = WalkDir::new(root).min_depth(1);
    if !discovery.recursive {
        walker = walker.max_depth(1);
    }

    let mut files = Vec::new();
    let entries = walker.into_iter().filter_entry(|e| !is_hidden(e.file_name()));
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to read {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = relative_name(root, entry.path());
        if let Some(set) = &include {
            if !set.is_match(&rel) {
                continue;
            }
        }
        if let Some(set) = &exclude {
            if set.is_match(&rel) {
                continue;
            }
        }
        files.push(entry.into_path());
    }

    files.sort();
    Ok(files)
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().map(|s| s.starts_with('.')).unwrap_or(false)
}

fn relative_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn build_globset(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("bad glob '{}'", pattern))?);
    }
    Ok(Some(builder.build()?))
}

/// A file that could not be turned into a document, and why.
#[derive(Debug, Clone)]
pub struct Skipped {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of loading a set of files.
#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub documents: Vec<Document>,
    pub skipped: Vec<Skipped>,
}

/// Turns files into normalized documents.
///
/// Per-file problems are reported in [`LoadOutcome::skipped`]; an `Err` means
/// the loader as a whole failed.
pub trait DocumentLoader: Send + Sync {
    fn load(&self, root: &Path, files: &[PathBuf]) -> Result<LoadOutcome>;
}

/// Reads plain text, Markdown, PDF, DOCX, PPTX and XLSX files from disk.
#[derive(Debug, Default, Clone)]
pub struct DirectoryLoader;

impl DocumentLoader for DirectoryLoader {
    fn load(&self, root: &Path, files: &[PathBuf]) -> Result<LoadOutcome> {
        let mut outcome = LoadOutcome::default();
        for path in files {
            match load_file(root, path) {
                Ok(doc) => outcome.documents.push(doc),
                Err(reason) => outcome.skipped.push(Skipped {
                    path: path.clone(),
                    reason,
                }),
            }
        }
        Ok(outcome)
    }
}

fn load_file(root: &Path, path: &Path) -> std::result::Result<Document, String> {
    let format = Format::from_path(path).ok_or_else(|| "unsupported file type".to_string())?;
    let bytes = std::fs::read(path).map_err(|e| e.to_string())?;
    let text = extract_text(&bytes, format).map_err(|e| e.to_string())?;
    if text.trim().is_empty() {
        return Err("no text content".to_string());
    }

    let modified_at = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());

    Ok(Document {
        id: Uuid::new_v4().to_string(),
        file_name: relative_name(root, path),
        path: path.to_path_buf(),
        content_type: format.content_type().to_string(),
        content_hash: sha256_hex(&text),
        text,
        modified_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn kb() -> TempDir {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("refunds.txt"), "Refunds within 30 days.").unwrap();
        fs::write(tmp.path().join("faq.md"), "# FAQ\n\nShipping is free.").unwrap();
        fs::write(tmp.path().join(".hidden.txt"), "secret").unwrap();
        fs::create_dir(tmp.path().join("archive")).unwrap();
        fs::write(tmp.path().join("archive").join("old.txt"), "Old policy.").unwrap();
        tmp
    }

    #[test]
    fn top_level_only_by_default() {
        let tmp = kb();
        let files = list_files(tmp.path(), &Discovery::default()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| relative_name(tmp.path(), p))
            .collect();
        assert_eq!(names, vec!["faq.md", "refunds.txt"]);
    }

    #[test]
    fn recursive_includes_subdirectories() {
        let tmp = kb();
        let discovery = Discovery {
            recursive: true,
            ..Default::default()
        };
        let files = list_files(tmp.path(), &discovery).unwrap();
        assert_eq!(files.len(), 3);
    }

    #[test]
    fn globs_filter_files() {
        let tmp = kb();
        let discovery = Discovery {
            recursive: true,
            include_globs: vec!["**/*.txt".to_string()],
            exclude_globs: vec!["archive/**".to_string()],
        };
        let files = list_files(tmp.path(), &discovery).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("refunds.txt"));
    }

    #[test]
    fn unreadable_files_are_skipped() {
        let tmp = kb();
        fs::write(tmp.path().join("logo.png"), [0x89, 0x50, 0x4e, 0x47]).unwrap();
        fs::write(tmp.path().join("empty.txt"), "   ").unwrap();

        let files = list_files(tmp.path(), &Discovery::default()).unwrap();
        let outcome = DirectoryLoader.load(tmp.path(), &files).unwrap();

        assert_eq!(outcome.documents.len(), 2);
        assert_eq!(outcome.skipped.len(), 2);
        let doc = outcome
            .documents
            .iter()
            .find(|d| d.file_name == "refunds.txt")
            .unwrap();
        assert_eq!(doc.content_type, "text/plain");
        assert_eq!(doc.text, "Refunds within 30 days.");
    }

    #[test]
    fn malformed_pdf_is_skipped_next_to_good_text() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("broken.pdf"), crate::extract::pdf_with_undefined_font())
            .unwrap();
        fs::write(tmp.path().join("refunds.txt"), "Refunds within 30 days.").unwrap();

        let files = list_files(tmp.path(), &Discovery::default()).unwrap();
        let outcome = DirectoryLoader.load(tmp.path(), &files).unwrap();

        assert_eq!(outcome.documents.len(), 1);
        assert_eq!(outcome.documents[0].file_name, "refunds.txt");
        assert_eq!(outcome.skipped.len(), 1);
        assert!(outcome.skipped[0].path.ends_with("broken.pdf"));
        assert!(outcome.skipped[0].reason.contains("PDF extraction failed"));
    }
}
