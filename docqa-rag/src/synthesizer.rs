//! Answer synthesis: LLM completion with a deterministic fallback.
//!
//! [`AnswerSynthesizer::synthesize`] prefers the configured
//! [`CompletionProvider`]. When there is none, or the call fails, it renders
//! a structured summary straight from the retrieved matches instead. The
//! caller cannot tell the two failure modes apart; both are logged.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::completion::CompletionProvider;
use crate::config::PersonaConfig;
use crate::context::NO_DOCUMENTS_FOUND;
use crate::document::RetrievedMatch;

/// System and user messages for one completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    /// Persona and domain framing.
    pub system: String,
    /// Instructions, context and question.
    pub user: String,
}

/// Produces the answer text for a question and its retrieved context.
pub struct AnswerSynthesizer {
    completion: Option<Arc<dyn CompletionProvider>>,
    persona: PersonaConfig,
    excerpt_chars: usize,
}

impl AnswerSynthesizer {
    /// Create a synthesizer that only uses the fallback renderer.
    pub fn new(persona: PersonaConfig, excerpt_chars: usize) -> Self {
        Self { completion: None, persona, excerpt_chars }
    }

    /// Use `provider` for LLM answers.
    pub fn with_completion(mut self, provider: Arc<dyn CompletionProvider>) -> Self {
        self.completion = Some(provider);
        self
    }

    /// Whether an LLM provider is configured.
    pub fn has_completion(&self) -> bool {
        self.completion.is_some()
    }

    /// Build the completion prompt for `query` over `context`.
    pub fn prompt(&self, query: &str, context: &str) -> Prompt {
        let PersonaConfig { assistant_name, audience, corpus_name } = &self.persona;

        let system = format!(
            "You are {assistant_name}, a helpful AI assistant for {audience}. \
             You help them find information in their {corpus_name}."
        );

        let user = format!(
            "You are {assistant_name}, a helpful AI assistant for {audience}. Your job is to \
             provide clear, concise, and practical answers grounded in the {corpus_name}.\n\
             \n\
             INSTRUCTIONS:\n\
             - Give a direct, actionable answer in 3 paragraphs maximum\n\
             - Focus on the most important and practical information\n\
             - Use bullet points for procedures or lists\n\
             - Always cite your sources using the format: (Source: Document Name, Page X)\n\
             - Be conversational but professional\n\
             - If the context does not fully answer the question, say what you know and \
             suggest contacting a supervisor for additional details\n\
             \n\
             CONTEXT FROM {corpus}:\n\
             {context}\n\
             \n\
             QUESTION: {query}\n\
             \n\
             ANSWER (Be concise and practical):",
            corpus = corpus_name.to_uppercase(),
        );

        Prompt { system, user }
    }

    /// Answer `query` from `context` (the rendered form of `matches`).
    ///
    /// Never fails: a missing or failing completion provider selects
    /// [`fallback_answer`](Self::fallback_answer).
    pub async fn synthesize(
        &self,
        query: &str,
        context: &str,
        matches: &[RetrievedMatch],
    ) -> String {
        let Some(provider) = &self.completion else {
            debug!("no completion provider configured, using fallback answer");
            return self.fallback_answer(query, context, matches);
        };

        let prompt = self.prompt(query, context);
        match provider.complete(&prompt.system, &prompt.user).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(
                    provider = provider.name(),
                    error = %e,
                    "completion failed, using fallback answer"
                );
                self.fallback_answer(query, context, matches)
            }
        }
    }

    /// Fixed reply used when nothing relevant was retrieved.
    pub fn apology(&self) -> String {
        format!(
            "I apologize, but I couldn't find relevant information in the {} to answer your \
             question.\n\n\
             Please try rephrasing your question or contact your supervisor for assistance.\n\n\
             **{}**",
            self.persona.corpus_name, self.persona.assistant_name
        )
    }

    /// Deterministic answer built from the matches without an LLM.
    ///
    /// Returns [`apology`](Self::apology) when `context` is the
    /// no-documents sentinel or there are no matches. Otherwise lists an
    /// excerpt of each match followed by numbered citations.
    pub fn fallback_answer(
        &self,
        query: &str,
        context: &str,
        matches: &[RetrievedMatch],
    ) -> String {
        if context == NO_DOCUMENTS_FOUND || matches.is_empty() {
            return self.apology();
        }

        let mut answer = format!(
            "**Regarding: {query}**\n\nBased on the {}, here's what I found:\n\n",
            self.persona.corpus_name
        );
        for m in matches {
            let text = excerpt(m.chunk.text.trim(), self.excerpt_chars);
            answer.push_str(&format!("• {text}\n\n"));
        }

        answer.push_str("**Sources:**\n");
        for (i, m) in matches.iter().enumerate() {
            answer.push_str(&format!("{}. {}\n", i + 1, m.chunk.citation()));
        }

        answer.push_str(
            "\n*Note: For enhanced AI responses, configure a completion API key \
             (OPENROUTER_API_KEY).*",
        );
        answer
    }
}

/// First `max_chars` characters of `text`, with `...` appended if cut.
fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => format!("{}...", &text[..byte_index]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::context::assemble;
    use crate::document::Chunk;
    use crate::error::{RagError, Result};

    struct Failing;

    #[async_trait]
    impl CompletionProvider for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
            Err(RagError::CompletionError { provider: "failing".into(), message: "502".into() })
        }
    }

    struct Echo;

    #[async_trait]
    impl CompletionProvider for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, _system: &str, user: &str) -> Result<String> {
            Ok(format!("LLM saw {} bytes", user.len()))
        }
    }

    fn matched(title: &str, page: u32, text: &str) -> RetrievedMatch {
        RetrievedMatch {
            chunk: Chunk {
                text: text.to_string(),
                source_file: "f.pdf".to_string(),
                document_title: title.to_string(),
                page_number: page,
                document_link: "file:///f.pdf".to_string(),
                chunk_index: 0,
                word_count: text.split_whitespace().count(),
            },
            similarity_score: 0.9,
        }
    }

    fn synthesizer() -> AnswerSynthesizer {
        AnswerSynthesizer::new(PersonaConfig::default(), 200)
    }

    #[test]
    fn sentinel_yields_apology_regardless_of_query() {
        let s = synthesizer();
        let a = s.fallback_answer("fire?", NO_DOCUMENTS_FOUND, &[]);
        let b = s.fallback_answer("parking?", NO_DOCUMENTS_FOUND, &[matched("X", 1, "y")]);
        assert_eq!(a, s.apology());
        assert_eq!(a, b);
    }

    #[test]
    fn fallback_lists_excerpts_then_sources() {
        let s = synthesizer();
        let matches =
            [matched("Fire Safety", 3, "Pull the alarm."), matched("Housing", 1, "Quiet hours.")];
        let answer = s.fallback_answer("fire", &assemble(&matches), &matches);

        assert!(answer.starts_with("**Regarding: fire**\n\nBased on the training documents"));
        assert!(answer.contains("• Pull the alarm.\n\n• Quiet hours.\n\n**Sources:**\n"));
        assert!(answer.contains("1. Fire Safety (Page 3)\n2. Housing (Page 1)\n"));
        assert!(answer.ends_with("(OPENROUTER_API_KEY).*"));
    }

    #[test]
    fn long_content_is_truncated_by_characters() {
        let text = "é".repeat(250);
        let s = synthesizer();
        let matches = [matched("T", 1, &text)];
        let answer = s.fallback_answer("q", &assemble(&matches), &matches);
        assert!(answer.contains(&format!("• {}...\n", "é".repeat(200))));
        assert_eq!(excerpt("short", 200), "short");
    }

    #[tokio::test]
    async fn failing_completion_falls_back_silently() {
        let s = synthesizer().with_completion(Arc::new(Failing));
        let matches = [matched("Fire Safety", 3, "Pull the alarm.")];
        let context = assemble(&matches);
        let answer = s.synthesize("fire", &context, &matches).await;
        assert_eq!(answer, s.fallback_answer("fire", &context, &matches));
    }

    #[tokio::test]
    async fn completion_answer_is_returned_verbatim() {
        let s = synthesizer().with_completion(Arc::new(Echo));
        let matches = [matched("Fire Safety", 3, "Pull the alarm.")];
        let answer = s.synthesize("fire", &assemble(&matches), &matches).await;
        assert!(answer.starts_with("LLM saw "));
    }

    #[test]
    fn prompt_embeds_context_question_and_citation_rule() {
        let prompt = synthesizer().prompt("Where do I go?", "[Source 1]\nDocument: A");
        assert!(prompt.system.contains("DocQA"));
        assert!(prompt.user.contains("CONTEXT FROM TRAINING DOCUMENTS:\n[Source 1]\nDocument: A"));
        assert!(prompt.user.contains("QUESTION: Where do I go?"));
        assert!(prompt.user.contains("(Source: Document Name, Page X)"));
    }
}
