use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use crate::{
    chunking::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DEFAULT_MIN_WORDS},
    pipeline::{DEFAULT_TOP_K, DEFAULT_TOP_N},
};

#[derive(Debug, Parser)]
#[command(
    name = "ragrank",
    about = "Retrieve and rerank passages from a local embedding index"
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Base URL of the Ollama embedding server
    #[arg(long, global = true)]
    pub ollama_url: Option<String>,

    /// Embedding model name
    #[arg(long, global = true)]
    pub embed_model: Option<String>,

    /// Embedding request timeout in seconds
    #[arg(long, global = true)]
    pub embed_timeout: Option<u64>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Chunk, embed and index a directory of text files
    Ingest(IngestArgs),
    /// Retrieve and rerank passages for a question
    Query(QueryArgs),
    /// Show the store location and statistics
    Status(StatusArgs),
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Ingest --

#[derive(Debug, Parser)]
pub struct IngestArgs {
    /// Directory containing .txt and .md files
    pub path: PathBuf,

    /// Only ingest files whose relative path matches this glob
    #[arg(long)]
    pub glob: Option<String>,

    /// Words per chunk
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Words shared by adjacent chunks
    #[arg(long, default_value_t = DEFAULT_CHUNK_OVERLAP)]
    pub overlap: usize,

    /// Drop chunks with fewer words than this
    #[arg(long, default_value_t = DEFAULT_MIN_WORDS)]
    pub min_words: usize,

    /// Expected embedding dimension (inferred when omitted)
    #[arg(long)]
    pub dimension: Option<usize>,
}

// -- Query --

#[derive(Debug, Parser)]
pub struct QueryArgs {
    /// The question to retrieve passages for
    pub query: String,

    /// Candidates fetched by the first-pass search
    #[arg(short = 'k', long, default_value_t = DEFAULT_TOP_K)]
    pub top_k: usize,

    /// Passages kept after reranking
    #[arg(short = 'n', long, default_value_t = DEFAULT_TOP_N)]
    pub top_n: usize,

    /// Rerank with the stored vectors instead of re-embedding candidates
    #[arg(long)]
    pub reuse_vectors: bool,

    /// Expand the query before embedding it
    #[arg(long)]
    pub expand_query: bool,

    /// Skip reranking and return first-pass results
    #[arg(long)]
    pub no_rerank: bool,

    /// Output results as JSON
    #[arg(long, conflicts_with = "prompt")]
    pub json: bool,

    /// Print a grounded generation prompt instead of the results
    #[arg(long)]
    pub prompt: bool,
}

// -- Status --

#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "ragrank",
            &mut std::io::stdout(),
        );
    }
}
