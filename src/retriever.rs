use tracing::debug;

use crate::{
    embedding::{Embedder, provider_error},
    error::Result,
    index::{SearchResult, VectorIndex},
};

/// First-pass retrieval: one embedding call, then an exact index search.
pub struct Retriever<'a, E: ?Sized> {
    index: &'a VectorIndex,
    embedder: &'a E,
}

/// Retrieved chunks together with the raw query embedding that found them.
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub query_vector: Vec<f32>,
    pub results: Vec<SearchResult>,
}

impl<'a, E: Embedder + ?Sized> Retriever<'a, E> {
    pub fn new(index: &'a VectorIndex, embedder: &'a E) -> Self {
        Self { index, embedder }
    }

    /// Embed `query` once and return its `top_k` nearest chunks.
    pub fn retrieve(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        Ok(self.retrieve_with_vector(query, top_k)?.results)
    }

    /// Like [`Retriever::retrieve`], also handing back the query embedding so
    /// later stages can score against it without embedding the query again.
    pub fn retrieve_with_vector(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Retrieval> {
        let query_vector =
            self.embedder.embed(query).map_err(provider_error)?;
        let results = self.index.search(&query_vector, top_k)?;
        debug!(top_k, hits = results.len(), "retrieved candidates");
        Ok(Retrieval {
            query_vector,
            results,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, collections::HashMap};

    use super::*;
    use crate::{chunk::Chunk, error::Error};

    struct MapEmbedder {
        vectors: HashMap<&'static str, Vec<f32>>,
        calls: Cell<usize>,
    }

    impl MapEmbedder {
        fn new(entries: &[(&'static str, Vec<f32>)]) -> Self {
            Self {
                vectors: entries.iter().cloned().collect(),
                calls: Cell::new(0),
            }
        }
    }

    impl Embedder for MapEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.set(self.calls.get() + 1);
            self.vectors.get(text).cloned().ok_or_else(|| {
                Error::EmbeddingUnavailable(format!("no vector for {text:?}"))
            })
        }

        fn model_name(&self) -> &str {
            "map"
        }
    }

    fn index() -> VectorIndex {
        let mut index = VectorIndex::create(2).unwrap();
        index
            .add(
                vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7, 0.7]],
                vec![
                    Chunk::new("A", "a"),
                    Chunk::new("B", "b"),
                    Chunk::new("C", "c"),
                ],
            )
            .unwrap();
        index
    }

    #[test]
    fn retrieve_embeds_once_and_searches() {
        let index = index();
        let embedder = MapEmbedder::new(&[("east", vec![1.0, 0.0])]);
        let retriever = Retriever::new(&index, &embedder);

        let results = retriever.retrieve("east", 2).unwrap();
        let ids: Vec<_> =
            results.iter().map(|r| r.chunk.source_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "C"]);
        assert_eq!(embedder.calls.get(), 1);
    }

    #[test]
    fn retrieve_with_vector_returns_raw_query_embedding() {
        let index = index();
        let embedder = MapEmbedder::new(&[("north", vec![0.0, 5.0])]);
        let retriever = Retriever::new(&index, &embedder);

        let retrieval = retriever.retrieve_with_vector("north", 1).unwrap();
        assert_eq!(retrieval.query_vector, vec![0.0, 5.0]);
        assert_eq!(retrieval.results[0].chunk.source_id, "B");
    }

    #[test]
    fn provider_failure_is_embedding_unavailable() {
        let index = index();
        let embedder = MapEmbedder::new(&[]);
        let retriever = Retriever::new(&index, &embedder);

        assert!(matches!(
            retriever.retrieve("anything", 2),
            Err(Error::EmbeddingUnavailable(_))
        ));
    }

    struct BrokenEmbedder;

    impl Embedder for BrokenEmbedder {
        fn embed(&self, _: &str) -> Result<Vec<f32>> {
            Err(std::io::Error::other("socket reset").into())
        }

        fn model_name(&self) -> &str {
            "broken"
        }
    }

    #[test]
    fn any_provider_error_becomes_embedding_unavailable() {
        let index = index();
        let retriever = Retriever::new(&index, &BrokenEmbedder);

        match retriever.retrieve("anything", 2) {
            Err(Error::EmbeddingUnavailable(msg)) => {
                assert!(msg.contains("socket reset"), "{msg}");
            }
            other => panic!("expected EmbeddingUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn dimension_mismatch_propagates() {
        let index = index();
        let embedder = MapEmbedder::new(&[("wide", vec![1.0, 0.0, 0.0])]);
        let retriever = Retriever::new(&index, &embedder);

        assert!(matches!(
            retriever.retrieve("wide", 2),
            Err(Error::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn empty_index_propagates() {
        let index = VectorIndex::create(2).unwrap();
        let embedder = MapEmbedder::new(&[("east", vec![1.0, 0.0])]);
        let retriever = Retriever::new(&index, &embedder);

        assert!(matches!(
            retriever.retrieve("east", 2),
            Err(Error::EmptyIndex)
        ));
    }
}
