//! Document ingestion: directory scan → page extraction → chunks.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::Serialize;
use tracing::{error, info};

use crate::chunking::{Chunker, normalize_text};
use crate::document::{Chunk, PageMetadata};
use crate::error::{RagError, Result};
use crate::extract::{PageExtractor, TextExtractor};

fn title_separator_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[_\-.]").expect("Invalid title separator regex"))
}

/// Human-readable title for a source filename.
///
/// Drops the extension, turns `_`, `-` and `.` into spaces, and capitalizes
/// each word: `fire_safety-GUIDE.pdf` becomes `Fire Safety Guide`.
pub fn format_title(filename: &str) -> String {
    let stem = Path::new(filename).file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    title_separator_regex()
        .replace_all(&stem, " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// `file:///` link to `filename` inside `dir`.
pub fn document_link(dir: &Path, filename: &str) -> String {
    let absolute = std::path::absolute(dir).unwrap_or_else(|_| dir.to_path_buf());
    let absolute = absolute.to_string_lossy();
    format!("file:///{}/{filename}", absolute.trim_start_matches('/').trim_end_matches('/'))
}

/// Per-file outcome of one ingestion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    /// Source filename.
    pub file: String,
    /// Pages that produced at least one chunk.
    pub pages: usize,
    /// Chunks produced from the file.
    pub chunks: usize,
}

/// Summary of one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Files that were extracted, in processing order.
    pub files: Vec<FileReport>,
    /// Files that failed extraction and were skipped.
    pub skipped: Vec<String>,
    /// Total chunks across all files.
    pub total_chunks: usize,
}

/// Scans a directory for supported documents and chunks them.
///
/// Only the top level of the directory is scanned. Files are handled in
/// sorted filename order; extensions are matched case-insensitively.
pub struct DocumentLoader {
    dir: PathBuf,
    chunker: Arc<dyn Chunker>,
    extractors: BTreeMap<String, Arc<dyn PageExtractor>>,
}

impl DocumentLoader {
    /// Create a loader for `dir` with the built-in extractors (`txt`, and
    /// `pdf` when that feature is enabled).
    pub fn new(dir: impl Into<PathBuf>, chunker: Arc<dyn Chunker>) -> Self {
        let loader = Self { dir: dir.into(), chunker, extractors: BTreeMap::new() }
            .with_extractor("txt", Arc::new(TextExtractor));
        #[cfg(feature = "pdf")]
        let loader = loader.with_extractor("pdf", Arc::new(crate::extract::PdfExtractor));
        loader
    }

    /// Register `extractor` for files with `extension`.
    pub fn with_extractor(mut self, extension: &str, extractor: Arc<dyn PageExtractor>) -> Self {
        self.extractors.insert(extension.to_ascii_lowercase(), extractor);
        self
    }

    /// The scanned directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn extractor_for(&self, path: &Path) -> Option<&Arc<dyn PageExtractor>> {
        let extension = path.extension()?.to_string_lossy().to_ascii_lowercase();
        self.extractors.get(&extension)
    }

    /// Supported files in the directory, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IngestError`] if the directory does not exist or
    /// holds no supported files.
    pub fn discover(&self) -> Result<Vec<PathBuf>> {
        if !self.dir.is_dir() {
            return Err(RagError::IngestError(format!(
                "document directory not found: {}",
                self.dir.display()
            )));
        }

        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_file() && self.extractor_for(&path).is_some() {
                files.push(path);
            }
        }
        files.sort();

        if files.is_empty() {
            let supported: Vec<&str> = self.extractors.keys().map(String::as_str).collect();
            return Err(RagError::IngestError(format!(
                "no supported documents ({}) in {}",
                supported.join(", "),
                self.dir.display()
            )));
        }
        Ok(files)
    }

    /// Extract and chunk every supported file.
    ///
    /// Files that fail extraction are logged and listed in
    /// [`IngestReport::skipped`]; pages that normalize to nothing produce no
    /// chunks.
    ///
    /// # Errors
    ///
    /// See [`discover`](Self::discover).
    pub fn load(&self) -> Result<(Vec<Chunk>, IngestReport)> {
        let files = self.discover()?;
        info!(dir = %self.dir.display(), file_count = files.len(), "processing documents");

        let mut chunks = Vec::new();
        let mut report = IngestReport::default();

        for path in &files {
            let filename =
                path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            let Some(extractor) = self.extractor_for(path) else { continue };

            let pages = match extractor.extract(path) {
                Ok(pages) => pages,
                Err(e) => {
                    error!(file = %filename, error = %e, "failed to extract document, skipping");
                    report.skipped.push(filename);
                    continue;
                }
            };

            let title = format_title(&filename);
            let link = document_link(&self.dir, &filename);
            let mut file_report = FileReport { file: filename.clone(), pages: 0, chunks: 0 };

            for page in pages {
                let metadata = PageMetadata {
                    source_file: page.source_file,
                    document_title: title.clone(),
                    page_number: page.page_number,
                    document_link: link.clone(),
                };
                let page_chunks = self.chunker.chunk(&normalize_text(&page.text), &metadata);
                if !page_chunks.is_empty() {
                    file_report.pages += 1;
                    file_report.chunks += page_chunks.len();
                }
                chunks.extend(page_chunks);
            }

            info!(
                file = %filename,
                pages = file_report.pages,
                chunks = file_report.chunks,
                "processed document"
            );
            report.files.push(file_report);
        }

        report.total_chunks = chunks.len();
        info!(
            chunk_count = report.total_chunks,
            document_count = report.files.len(),
            skipped = report.skipped.len(),
            "document processing complete"
        );
        Ok((chunks, report))
    }
}

/// Write `chunks` to `path` as pretty-printed JSON.
pub fn write_chunks_json(chunks: &[Chunk], path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(chunks)
        .map_err(|e| RagError::PipelineError(format!("failed to serialize chunks: {e}")))?;
    std::fs::write(path, json)?;
    info!(chunk_count = chunks.len(), path = %path.display(), "saved chunks");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::WordWindowChunker;

    fn loader(dir: &Path) -> DocumentLoader {
        DocumentLoader::new(dir, Arc::new(WordWindowChunker::new(4, 1)))
    }

    #[test]
    fn titles_are_cleaned_and_capitalized() {
        assert_eq!(format_title("fire_safety-GUIDE.pdf"), "Fire Safety Guide");
        assert_eq!(format_title("ra.handbook_2024.pdf"), "Ra Handbook 2024");
        assert_eq!(format_title("__x__.txt"), "X");
    }

    #[test]
    fn links_are_absolute_file_urls() {
        let link = document_link(Path::new("/srv/docs/"), "a b.pdf");
        assert_eq!(link, "file:///srv/docs/a b.pdf");
    }

    #[test]
    fn missing_directory_is_a_hard_failure() {
        let err = loader(Path::new("/definitely/not/here")).load().unwrap_err();
        assert!(matches!(err, RagError::IngestError(_)));
    }

    #[test]
    fn directory_without_supported_files_is_a_hard_failure() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.md"), "ignored").unwrap();
        let err = loader(dir.path()).load().unwrap_err();
        assert!(matches!(err, RagError::IngestError(_)));
    }

    #[test]
    fn files_are_processed_in_sorted_order_with_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let write = |name: &str, text: &str| std::fs::write(dir.path().join(name), text).unwrap();
        write("b_policy.txt", "one two three four five six seven");
        write("a_intro.TXT", "hello ☎ world\x0c\x0cpage three");
        std::fs::create_dir(dir.path().join("nested.txt")).unwrap();

        let (chunks, report) = loader(dir.path()).load().unwrap();
        let files: Vec<_> = report.files.iter().map(|f| f.file.as_str()).collect();
        assert_eq!(files, ["a_intro.TXT", "b_policy.txt"]);
        assert_eq!(report.files[0].pages, 2);
        assert_eq!(report.total_chunks, chunks.len());

        assert_eq!(chunks[0].text, "hello world");
        assert_eq!(chunks[0].document_title, "A Intro");
        assert_eq!(chunks[1].page_number, 3);
        assert!(chunks[0].document_link.ends_with("/a_intro.TXT"));

        // 7 words, size 4, overlap 1: windows start at 0, 3, 6.
        let policy: Vec<_> = chunks.iter().filter(|c| c.source_file == "b_policy.txt").collect();
        assert_eq!(policy.len(), 3);
        assert_eq!(policy[1].text, "four five six seven");
        assert_eq!(policy[2].chunk_index, 2);
    }

    #[test]
    fn chunks_json_is_written() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("doc.txt"), "alpha beta").unwrap();
        let (chunks, _) = loader(dir.path()).load().unwrap();

        let out = dir.path().join("chunks.json");
        write_chunks_json(&chunks, &out).unwrap();
        let json = std::fs::read_to_string(out).unwrap();
        let parsed: Vec<Chunk> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, chunks);
    }
}
