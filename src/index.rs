use std::{
    collections::HashSet,
    path::Path,
    sync::{Arc, PoisonError, RwLock},
};

use rayon::prelude::*;
use tracing::debug;

use crate::{
    chunk::Chunk,
    error::{Error, Result},
    store::Store,
    vector::{check_dimension, dot, normalize, rank_descending},
};

/// A search hit: the stored chunk, its inner-product score against the
/// normalized query, and its position in the index.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub chunk: Chunk,
    pub score: f32,
    pub position: usize,
}

/// Exact nearest-neighbor index over unit-normalized embeddings.
///
/// Vectors live in one flat row-major buffer; row `i` belongs to `chunks[i]`.
/// Every mutation keeps the two in lockstep.
///
/// # Examples
///
/// ```
/// use ragrank::{Chunk, VectorIndex};
///
/// let mut index = VectorIndex::create(2).unwrap();
/// index
///     .add(
///         vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7, 0.7]],
///         vec![
///             Chunk::new("A", "a"),
///             Chunk::new("B", "b"),
///             Chunk::new("C", "c"),
///         ],
///     )
///     .unwrap();
///
/// let hits = index.search(&[1.0, 0.0], 2).unwrap();
/// let ids: Vec<_> =
///     hits.iter().map(|h| h.chunk.source_id.as_str()).collect();
/// assert_eq!(ids, ["A", "C"]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    dimension: usize,
    data: Vec<f32>,
    chunks: Vec<Chunk>,
}

impl VectorIndex {
    /// Create an empty index bound to `dimension`.
    pub fn create(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(Error::InvalidConfiguration(
                "index dimension must be at least 1".into(),
            ));
        }
        Ok(Self {
            dimension,
            data: Vec::new(),
            chunks: Vec::new(),
        })
    }

    /// Rebuild an index from already-normalized rows, as read back from disk.
    pub(crate) fn from_parts(
        dimension: usize,
        data: Vec<f32>,
        chunks: Vec<Chunk>,
    ) -> Result<Self> {
        if dimension == 0 {
            return Err(Error::CorruptStore("stored dimension is 0".into()));
        }
        if data.len() != chunks.len() * dimension {
            return Err(Error::CorruptStore(format!(
                "{} float(s) cannot hold {} vector(s) of dimension {dimension}",
                data.len(),
                chunks.len()
            )));
        }
        Ok(Self {
            dimension,
            data,
            chunks,
        })
    }

    /// Append a batch of vectors with their chunks.
    ///
    /// Validates the whole batch before touching the index, so a failure
    /// leaves it exactly as it was.
    pub fn add(
        &mut self,
        vectors: Vec<Vec<f32>>,
        chunks: Vec<Chunk>,
    ) -> Result<()> {
        if vectors.len() != chunks.len() {
            return Err(Error::LengthMismatch {
                vectors: vectors.len(),
                chunks: chunks.len(),
            });
        }
        for v in &vectors {
            check_dimension(self.dimension, v)?;
        }

        self.data.reserve(vectors.len() * self.dimension);
        for mut v in vectors {
            normalize(&mut v);
            self.data.extend_from_slice(&v);
        }
        self.chunks.extend(chunks);

        debug!(total = self.chunks.len(), "index batch appended");
        Ok(())
    }

    /// Top-`top_k` chunks by inner product with the normalized `query`.
    ///
    /// Results are sorted by descending score; equal scores keep insertion
    /// order. Asking for more results than stored returns all of them.
    pub fn search(
        &self,
        query: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        if top_k == 0 {
            return Err(Error::InvalidConfiguration(
                "top_k must be at least 1".into(),
            ));
        }
        if self.is_empty() {
            return Err(Error::EmptyIndex);
        }
        check_dimension(self.dimension, query)?;

        let mut query = query.to_vec();
        normalize(&mut query);

        let scores: Vec<f32> = self
            .data
            .par_chunks_exact(self.dimension)
            .map(|row| dot(row, &query))
            .collect();

        let results: Vec<SearchResult> = rank_descending(&scores)
            .into_iter()
            .take(top_k)
            .map(|position| SearchResult {
                chunk: self.chunks[position].clone(),
                score: scores[position],
                position,
            })
            .collect();

        debug!(
            candidates = results.len(),
            corpus = self.len(),
            "index search"
        );
        Ok(results)
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn chunk(&self, position: usize) -> Option<&Chunk> {
        self.chunks.get(position)
    }

    /// The stored (normalized) vector at `position`.
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        if position >= self.len() {
            return None;
        }
        let start = position * self.dimension;
        Some(&self.data[start..start + self.dimension])
    }

    /// Flat row-major view of every stored vector.
    pub(crate) fn raw_vectors(&self) -> &[f32] {
        &self.data
    }

    /// Number of distinct source documents.
    pub fn source_count(&self) -> usize {
        self.chunks
            .iter()
            .map(|c| c.source_id.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Write the index to `dir` as a vector file plus a metadata database.
    pub fn persist(&self, dir: &Path) -> Result<()> {
        Store::save(dir, self, None)
    }

    /// Load an index previously written with [`VectorIndex::persist`].
    pub fn restore(dir: &Path) -> Result<Self> {
        Ok(Store::open(dir)?.into_index())
    }
}

/// Serving handle for an index that may be rebuilt while queries run.
///
/// Queries take a snapshot with [`SharedIndex::current`]; a rebuilt index is
/// published with [`SharedIndex::replace`]. The live index is never mutated.
#[derive(Debug)]
pub struct SharedIndex {
    current: RwLock<Arc<VectorIndex>>,
}

impl SharedIndex {
    pub fn new(index: VectorIndex) -> Self {
        Self {
            current: RwLock::new(Arc::new(index)),
        }
    }

    pub fn current(&self) -> Arc<VectorIndex> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Publish `index` and return the one it replaced.
    pub fn replace(&self, index: VectorIndex) -> Arc<VectorIndex> {
        let mut guard =
            self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, Arc::new(index))
    }
}
