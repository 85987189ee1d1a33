use kdam::{BarExt, tqdm};
use rayon::prelude::*;
use tracing::{info, warn};

use crate::{
    chunk::Chunk,
    chunking::{ChunkingConfig, chunk_words},
    embedding::{Embedder, provider_error},
    error::{Error, Result},
    index::VectorIndex,
    walker::DiscoveredFile,
};

/// Number of chunk texts sent to the embedding provider per call.
pub const EMBED_BATCH_SIZE: usize = 32;

/// Read and chunk every file, in file order.
///
/// Files that cannot be read as UTF-8 text are skipped with a warning.
pub fn collect_chunks(
    files: &[DiscoveredFile],
    config: &ChunkingConfig,
) -> Result<Vec<Chunk>> {
    config.validate()?;

    // Read in parallel; collect keeps file order.
    let per_file: Vec<Vec<Chunk>> = files
        .par_iter()
        .map(|file| -> Result<Vec<Chunk>> {
            let content = match std::fs::read_to_string(&file.absolute_path) {
                Ok(content) => content,
                Err(e) => {
                    warn!(
                        path = %file.absolute_path.display(),
                        error = %e,
                        "skipping unreadable file"
                    );
                    return Ok(Vec::new());
                }
            };
            let source_id = file.source_id();
            Ok(chunk_words(&content, config)?
                .into_iter()
                .map(|text| Chunk::new(source_id.clone(), text))
                .collect())
        })
        .collect::<Result<_>>()?;

    Ok(per_file.into_iter().flatten().collect())
}

/// Embed `chunks` and build an index over them.
///
/// The dimension comes from `dimension` when given, otherwise from the first
/// embedding returned. Each batch is appended atomically, so a failure leaves
/// nothing half-added; the partially built index is discarded with the error.
pub fn build_index<E: Embedder + ?Sized>(
    chunks: Vec<Chunk>,
    embedder: &E,
    dimension: Option<usize>,
    progress: bool,
) -> Result<VectorIndex> {
    if chunks.is_empty() {
        return Err(Error::InvalidConfiguration(
            "nothing to ingest: no chunks were produced".into(),
        ));
    }

    let mut bar = tqdm!(
        total = chunks.len(),
        desc = "Embedding",
        unit = " chunks",
        disable = !progress
    );

    let mut index: Option<VectorIndex> = match dimension {
        Some(d) => Some(VectorIndex::create(d)?),
        None => None,
    };

    let mut remaining = chunks.into_iter().peekable();
    while remaining.peek().is_some() {
        let batch: Vec<Chunk> =
            remaining.by_ref().take(EMBED_BATCH_SIZE).collect();
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed_many(&texts).map_err(provider_error)?;

        if index.is_none() {
            let first = vectors.first().ok_or_else(|| {
                Error::EmbeddingUnavailable(
                    "provider returned no embeddings".into(),
                )
            })?;
            index = Some(VectorIndex::create(first.len())?);
        }
        if let Some(index) = index.as_mut() {
            index.add(vectors, batch)?;
        }
        bar.update(texts.len())?;
    }

    if progress {
        eprintln!();
    }

    let index = index.ok_or_else(|| {
        Error::InvalidConfiguration("nothing to ingest".into())
    })?;
    info!(
        chunks = index.len(),
        dimension = index.dimension(),
        model = embedder.model_name(),
        "built index"
    );
    Ok(index)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::walker::discover_files;

    /// Embeds a text as `[word count, 1.0]` and records batch sizes.
    struct CountingEmbedder {
        batches: RefCell<Vec<usize>>,
    }

    impl CountingEmbedder {
        fn new() -> Self {
            Self {
                batches: RefCell::new(Vec::new()),
            }
        }
    }

    impl Embedder for CountingEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(vec![text.split_whitespace().count() as f32, 1.0])
        }

        fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.batches.borrow_mut().push(texts.len());
            texts.iter().map(|t| self.embed(t)).collect()
        }

        fn model_name(&self) -> &str {
            "counting"
        }
    }

    struct DownEmbedder;

    impl Embedder for DownEmbedder {
        fn embed(&self, _: &str) -> Result<Vec<f32>> {
            Err(Error::EmbeddingUnavailable("connection refused".into()))
        }

        fn model_name(&self) -> &str {
            "down"
        }
    }

    fn small_chunks() -> ChunkingConfig {
        ChunkingConfig {
            chunk_size: 3,
            overlap: 1,
            min_words: 1,
        }
    }

    #[test]
    fn collects_chunks_in_file_order_with_relative_sources() {
        let tmp = tempfile::tempdir().unwrap();
        let sub = tmp.path().join("notes");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(tmp.path().join("a.txt"), "one two three four five")
            .unwrap();
        std::fs::write(sub.join("b.md"), "six seven").unwrap();

        let files = discover_files(tmp.path(), None).unwrap();
        let chunks = collect_chunks(&files, &small_chunks()).unwrap();

        assert_eq!(
            chunks,
            vec![
                Chunk::new("a.txt", "one two three"),
                Chunk::new("a.txt", "three four five"),
                Chunk::new("a.txt", "five"),
                Chunk::new("notes/b.md", "six seven"),
            ]
        );
    }

    #[test]
    fn non_utf8_files_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("bad.txt"), [0xff, 0xfe, 0x00])
            .unwrap();
        std::fs::write(tmp.path().join("good.txt"), "fine words").unwrap();

        let files = discover_files(tmp.path(), None).unwrap();
        let chunks = collect_chunks(&files, &small_chunks()).unwrap();
        assert_eq!(chunks, vec![Chunk::new("good.txt", "fine words")]);
    }

    #[test]
    fn invalid_chunking_is_rejected() {
        let config = ChunkingConfig {
            chunk_size: 2,
            overlap: 2,
            min_words: 1,
        };
        assert!(matches!(
            collect_chunks(&[], &config),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn build_index_batches_and_infers_dimension() {
        let chunks: Vec<Chunk> = (0..70)
            .map(|i| Chunk::new(format!("doc{i}"), "w ".repeat(i + 1)))
            .collect();
        let embedder = CountingEmbedder::new();

        let index = build_index(chunks, &embedder, None, false).unwrap();

        assert_eq!(index.len(), 70);
        assert_eq!(index.dimension(), 2);
        assert_eq!(index.chunk(69).unwrap().source_id, "doc69");
        assert_eq!(embedder.batches.borrow().as_slice(), [32, 32, 6]);
    }

    #[test]
    fn build_index_checks_given_dimension() {
        let chunks = vec![Chunk::new("a", "x y")];
        assert!(matches!(
            build_index(chunks, &CountingEmbedder::new(), Some(3), false),
            Err(Error::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn build_index_rejects_empty_input() {
        assert!(matches!(
            build_index(Vec::new(), &CountingEmbedder::new(), None, false),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn provider_failure_aborts_ingestion() {
        let chunks = vec![Chunk::new("a", "x"), Chunk::new("b", "y")];
        assert!(matches!(
            build_index(chunks, &DownEmbedder, None, false),
            Err(Error::EmbeddingUnavailable(_))
        ));
    }
}
