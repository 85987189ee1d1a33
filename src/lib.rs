//! ragrank - retrieve-then-rerank passage search over a local embedding index.
//!
//! Documents are split into word-window chunks, embedded through an
//! Ollama-compatible server and stored in an exact inner-product index.
//! Queries fetch the `top_k` nearest chunks, rescore them by cosine
//! similarity and keep the best `top_n` for a downstream generator.
//!
//! # Quick start
//!
//! ```no_run
//! use ragrank::{
//!     DataDir, EmbedderConfig, OllamaEmbedder, Pipeline, PipelineConfig,
//!     Store,
//! };
//!
//! let data_dir = DataDir::resolve(None).unwrap();
//! let store = Store::open(&data_dir.store_dir()).unwrap();
//! let embedder = OllamaEmbedder::new(EmbedderConfig::default()).unwrap();
//!
//! let pipeline =
//!     Pipeline::new(store.index(), &embedder, PipelineConfig::default())
//!         .unwrap();
//! for passage in pipeline.run("what is retrieval augmentation?").unwrap() {
//!     println!("{} ({:.3})", passage.chunk.source_id, passage.score);
//! }
//! ```

pub mod chunk;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod data_dir;
pub mod embedding;
pub mod error;
pub mod index;
pub mod ingestion;
pub mod output;
pub mod pipeline;
pub mod prompt;
pub mod reranker;
pub mod retriever;
pub mod store;
pub mod vector;
pub mod walker;

pub use chunk::{Candidate, Chunk};
pub use data_dir::DataDir;
pub use embedding::{Embedder, EmbedderConfig, OllamaEmbedder};
pub use error::{Error, Result};
pub use index::{SearchResult, SharedIndex, VectorIndex};
pub use pipeline::{Generator, Pipeline, PipelineConfig, RankedChunk};
pub use retriever::Retriever;
pub use store::Store;
