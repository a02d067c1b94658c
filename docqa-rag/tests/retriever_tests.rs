//! Property tests for retrieval ordering and similarity scores.

use std::sync::Arc;

use docqa_rag::config::RagConfig;
use docqa_rag::document::Chunk;
use docqa_rag::embedding::EmbeddingProvider;
use docqa_rag::index::{EmbeddingMode, VectorIndex};
use docqa_rag::inmemory::InMemoryVectorStore;
use docqa_rag::local::HashingEmbeddingProvider;
use docqa_rag::retriever::Retriever;
use docqa_rag::vectorstore::cosine_distance;
use proptest::prelude::*;

const DIM: usize = 32;

fn arb_chunk() -> impl Strategy<Value = Chunk> {
    ("[a-z]{3,6}( [a-z]{3,6}){0,8}", 1u32..20).prop_map(|(text, page)| Chunk {
        word_count: text.split_whitespace().count(),
        text,
        source_file: "doc.pdf".to_string(),
        document_title: "Doc".to_string(),
        page_number: page,
        document_link: "file:///docs/doc.pdf".to_string(),
        chunk_index: 0,
    })
}

/// *For any* indexed chunks and query, the retriever returns at most `k`
/// matches, ordered best first, each scored `1 - distance` between the
/// query vector and the chunk's stored vector.
mod prop_retrieval_ordering {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn scores_are_one_minus_distance_and_descending(
            chunks in proptest::collection::vec(arb_chunk(), 1..15),
            query in "[a-z]{3,6}( [a-z]{3,6}){0,4}",
            k in 1usize..20,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let (matches, expected) = rt.block_on(async {
                let config = RagConfig::builder().embedding_dimensions(DIM).build().unwrap();
                let local = Arc::new(HashingEmbeddingProvider::new(DIM));
                let index = Arc::new(VectorIndex::new(
                    Arc::new(InMemoryVectorStore::new()),
                    &config,
                    local.clone(),
                ));
                index.add(&chunks, EmbeddingMode::Local).await.unwrap();

                let query_vec = local.embed(&query).await.unwrap();
                let mut expected = Vec::new();
                for chunk in &chunks {
                    let stored = local.embed(&chunk.text).await.unwrap();
                    expected.push((chunk.text.clone(), 1.0 - cosine_distance(&stored, &query_vec)));
                }

                let matches = Retriever::new(index, 5).retrieve(&query, k).await;
                (matches, expected)
            });

            prop_assert!(matches.len() <= k);
            prop_assert_eq!(matches.len(), k.min(chunks.len()));

            for pair in matches.windows(2) {
                prop_assert!(pair[0].similarity_score >= pair[1].similarity_score);
            }
            for m in &matches {
                let score = m.similarity_score;
                let found = expected
                    .iter()
                    .any(|(text, s)| text == &m.chunk.text && (s - score).abs() < 1e-5);
                prop_assert!(found, "no chunk with text {:?} scores {}", m.chunk.text, score);
            }
        }
    }
}

#[test]
fn default_k_is_capped_at_three() {
    let config = RagConfig::default();
    let index = Arc::new(VectorIndex::new(
        Arc::new(InMemoryVectorStore::new()),
        &config,
        Arc::new(HashingEmbeddingProvider::new(8)),
    ));
    assert_eq!(Retriever::new(index.clone(), 5).default_k(), 3);
    assert_eq!(Retriever::new(index, 2).default_k(), 2);
}

#[tokio::test]
async fn empty_index_retrieves_nothing() {
    let config = RagConfig::builder().embedding_dimensions(DIM).build().unwrap();
    let index = Arc::new(VectorIndex::new(
        Arc::new(InMemoryVectorStore::new()),
        &config,
        Arc::new(HashingEmbeddingProvider::new(DIM)),
    ));
    index.ensure_collection().await.unwrap();
    assert!(Retriever::new(index, 5).retrieve_default("anything").await.is_empty());
}
