//! Page text normalization and word-window chunking.
//!
//! Pages are normalized once with [`normalize_text`], then split by
//! [`WordWindowChunker`] into overlapping windows of whole words.

use std::sync::OnceLock;

use regex::Regex;

use crate::document::{Chunk, PageMetadata};

fn whitespace_run_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("Invalid whitespace regex"))
}

/// Anything outside word characters, whitespace and basic punctuation.
fn disallowed_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"[^\w\s.,!?:;\-()\[\]'"/]"#).expect("Invalid character filter regex")
    })
}

/// Normalize extracted page text.
///
/// Collapses whitespace runs to one space, drops every character outside
/// word characters, whitespace and `. , ! ? : ; - ( ) [ ] ' " /`, then trims.
/// Text made only of disallowed characters normalizes to `""`.
pub fn normalize_text(text: &str) -> String {
    let collapsed = whitespace_run_regex().replace_all(text, " ");
    disallowed_regex().replace_all(&collapsed, "").trim().to_string()
}

/// A strategy for splitting page text into chunks.
pub trait Chunker: Send + Sync {
    /// Split `text` into chunks carrying `metadata`.
    ///
    /// Returns an empty `Vec` for blank text.
    fn chunk(&self, text: &str, metadata: &PageMetadata) -> Vec<Chunk>;
}

/// Splits text into fixed-size word windows with a fixed word overlap.
///
/// Windows start at word `0, step, 2*step, ...` while the start is inside the
/// word list, where `step = max(1, chunk_size - chunk_overlap)`. Each window
/// holds up to `chunk_size` words.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::WordWindowChunker;
///
/// let chunker = WordWindowChunker::new(500, 50);
/// let chunks = chunker.chunk(&page_text, &page_metadata);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct WordWindowChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl WordWindowChunker {
    /// Create a new `WordWindowChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` - maximum number of words per chunk (at least 1)
    /// * `chunk_overlap` - number of words repeated between consecutive chunks
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size: chunk_size.max(1), chunk_overlap }
    }

    /// Distance in words between consecutive window starts.
    pub fn step(&self) -> usize {
        self.chunk_size.saturating_sub(self.chunk_overlap).max(1)
    }
}

impl Chunker for WordWindowChunker {
    fn chunk(&self, text: &str, metadata: &PageMetadata) -> Vec<Chunk> {
        let words: Vec<&str> = text.split_whitespace().collect();
        let step = self.step();
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < words.len() {
            let end = (start + self.chunk_size).min(words.len());
            let window = &words[start..end];
            let chunk_text = window.join(" ");

            if !chunk_text.trim().is_empty() {
                chunks.push(Chunk {
                    text: chunk_text,
                    source_file: metadata.source_file.clone(),
                    document_title: metadata.document_title.clone(),
                    page_number: metadata.page_number,
                    document_link: metadata.document_link.clone(),
                    chunk_index: chunks.len(),
                    word_count: window.len(),
                });
            }

            start += step;
        }

        chunks
    }
}
