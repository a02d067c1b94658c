//! Renders retrieved matches into the context block sent to the LLM.

use crate::document::RetrievedMatch;

/// Context returned for an empty match list. Downstream code compares
/// against this exact text.
pub const NO_DOCUMENTS_FOUND: &str = "No relevant documents found.";

/// Render `matches` as numbered source blocks separated by a blank line.
///
/// Each block reads:
///
/// ```text
/// [Source 1]
/// Document: Fire Safety
/// Page: 3
/// Content: pull the alarm and leave by the stairs
/// ```
///
/// Blocks keep the input order, so the best match comes first.
pub fn assemble(matches: &[RetrievedMatch]) -> String {
    if matches.is_empty() {
        return NO_DOCUMENTS_FOUND.to_string();
    }

    matches
        .iter()
        .enumerate()
        .map(|(i, m)| {
            format!(
                "[Source {}]\nDocument: {}\nPage: {}\nContent: {}",
                i + 1,
                m.chunk.document_title,
                m.chunk.page_number,
                m.chunk.text.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Chunk;

    fn matched(title: &str, page: u32, text: &str) -> RetrievedMatch {
        RetrievedMatch {
            chunk: Chunk {
                text: text.to_string(),
                source_file: format!("{title}.pdf"),
                document_title: title.to_string(),
                page_number: page,
                document_link: String::new(),
                chunk_index: 0,
                word_count: text.split_whitespace().count(),
            },
            similarity_score: 0.5,
        }
    }

    #[test]
    fn empty_input_is_the_sentinel() {
        assert_eq!(assemble(&[]), "No relevant documents found.");
    }

    #[test]
    fn blocks_are_numbered_in_order() {
        let context = assemble(&[
            matched("Fire Safety", 3, "  evacuate now "),
            matched("Housing", 1, "quiet hours"),
        ]);
        assert_eq!(
            context,
            "[Source 1]\nDocument: Fire Safety\nPage: 3\nContent: evacuate now\n\n\
             [Source 2]\nDocument: Housing\nPage: 1\nContent: quiet hours"
        );
    }
}
