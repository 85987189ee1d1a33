use serde::Serialize;
use tracing::debug;

use crate::{
    chunk::{Candidate, Chunk},
    embedding::{Embedder, provider_error},
    error::{Error, Result},
    index::{SearchResult, VectorIndex},
    prompt,
    reranker,
    retriever::Retriever,
};

pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_TOP_N: usize = 3;

/// Where the reranker gets each candidate's embedding from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RerankVectors {
    /// Embed the candidate texts again with the provider.
    #[default]
    Recompute,
    /// Use the normalized vector already stored in the index.
    Reuse,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Candidates fetched by the first-pass search.
    pub top_k: usize,
    /// Passages kept after reranking.
    pub top_n: usize,
    pub rerank_vectors: RerankVectors,
    /// Expand the query with [`prompt::rewrite_query`] before embedding it.
    pub rewrite_query: bool,
    /// Return first-pass order truncated to `top_n`.
    pub skip_rerank: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            top_n: DEFAULT_TOP_N,
            rerank_vectors: RerankVectors::default(),
            rewrite_query: false,
            skip_rerank: false,
        }
    }
}

impl PipelineConfig {
    /// Check `1 <= top_n <= top_k`.
    pub fn validate(&self) -> Result<()> {
        if self.top_n == 0 {
            return Err(Error::InvalidConfiguration(
                "top_n must be at least 1".into(),
            ));
        }
        if self.top_n > self.top_k {
            return Err(Error::InvalidConfiguration(format!(
                "top_n ({}) must not exceed top_k ({})",
                self.top_n, self.top_k
            )));
        }
        Ok(())
    }
}

/// A passage handed to the generation stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedChunk {
    #[serde(flatten)]
    pub chunk: Chunk,
    /// Final score: cosine similarity from the reranker, or the first-pass
    /// score when reranking is skipped.
    pub score: f32,
    /// Inner product from the first-pass search.
    pub retrieval_score: f32,
}

/// Produces an answer from a query and its ordered `(source_id, text)`
/// context.
pub trait Generator {
    fn generate(
        &self,
        query: &str,
        context: &[(String, String)],
    ) -> Result<String>;
}

/// A generated answer with the passages it was grounded on.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub passages: Vec<RankedChunk>,
}

/// Retrieve, then rerank.
pub struct Pipeline<'a, E: ?Sized> {
    index: &'a VectorIndex,
    embedder: &'a E,
    config: PipelineConfig,
}

impl<'a, E: Embedder + ?Sized> Pipeline<'a, E> {
    /// Fails with [`Error::InvalidConfiguration`] before any provider call
    /// when the config is invalid.
    pub fn new(
        index: &'a VectorIndex,
        embedder: &'a E,
        config: PipelineConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            index,
            embedder,
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run both stages for `query` and return at most `top_n` passages, best
    /// first.
    pub fn run(&self, query: &str) -> Result<Vec<RankedChunk>> {
        let search_text = if self.config.rewrite_query {
            prompt::rewrite_query(query)
        } else {
            query.to_string()
        };

        let retrieval = Retriever::new(self.index, self.embedder)
            .retrieve_with_vector(&search_text, self.config.top_k)?;

        if self.config.skip_rerank {
            return Ok(retrieval
                .results
                .into_iter()
                .take(self.config.top_n)
                .map(|r| RankedChunk {
                    chunk: r.chunk,
                    score: r.score,
                    retrieval_score: r.score,
                })
                .collect());
        }

        let candidates = self.candidates(&retrieval.results)?;
        let reranked = reranker::rerank(
            &retrieval.query_vector,
            candidates,
            self.config.top_n,
        )?;
        debug!(
            retrieved = retrieval.results.len(),
            kept = reranked.len(),
            "pipeline finished"
        );

        Ok(attach_retrieval_scores(reranked, &retrieval.results))
    }

    /// Run the pipeline and hand the passages to `generator`.
    ///
    /// The generator sees the query as given, even when the search used the
    /// rewritten form.
    pub fn answer<G: Generator + ?Sized>(
        &self,
        query: &str,
        generator: &G,
    ) -> Result<Answer> {
        let passages = self.run(query)?;
        let context: Vec<(String, String)> = passages
            .iter()
            .map(|p| (p.chunk.source_id.clone(), p.chunk.text.clone()))
            .collect();

        let text = generator.generate(query, &context).map_err(|e| match e {
            Error::Generation(_) => e,
            other => Error::Generation(other.to_string()),
        })?;
        Ok(Answer { text, passages })
    }

    fn candidates(&self, results: &[SearchResult]) -> Result<Vec<Candidate>> {
        let vectors = match self.config.rerank_vectors {
            RerankVectors::Recompute => {
                let texts: Vec<String> =
                    results.iter().map(|r| r.chunk.text.clone()).collect();
                let vectors = self
                    .embedder
                    .embed_many(&texts)
                    .map_err(provider_error)?;
                if vectors.len() != texts.len() {
                    return Err(Error::EmbeddingUnavailable(format!(
                        "provider returned {} embedding(s) for {} text(s)",
                        vectors.len(),
                        texts.len()
                    )));
                }
                vectors
            }
            RerankVectors::Reuse => results
                .iter()
                .map(|r| {
                    self.index
                        .vector(r.position)
                        .map(<[f32]>::to_vec)
                        .ok_or_else(|| Error::NotFound {
                            kind: "vector",
                            name: r.position.to_string(),
                        })
                })
                .collect::<Result<_>>()?,
        };

        Ok(results
            .iter()
            .zip(vectors)
            .map(|(r, vector)| Candidate::new(r.chunk.clone(), vector))
            .collect())
    }
}

/// Pair each reranked candidate with the first-pass score of the result it
/// came from. Equal chunks are matched in first-pass order.
fn attach_retrieval_scores(
    reranked: Vec<Candidate>,
    results: &[SearchResult],
) -> Vec<RankedChunk> {
    let mut used = vec![false; results.len()];
    reranked
        .into_iter()
        .map(|candidate| {
            let retrieval_score = results
                .iter()
                .enumerate()
                .find(|(i, r)| !used[*i] && r.chunk == candidate.chunk)
                .map(|(i, r)| {
                    used[i] = true;
                    r.score
                })
                .unwrap_or(f32::NAN);
            RankedChunk {
                chunk: candidate.chunk,
                score: candidate.score,
                retrieval_score,
            }
        })
        .collect()
}
