use std::{io::IsTerminal, process::ExitCode};

use clap::Parser;
use ragrank::{
    DataDir,
    Error,
    OllamaEmbedder,
    Pipeline,
    PipelineConfig,
    Result,
    Store,
    chunking::ChunkingConfig,
    cli::{Cli, Command, IngestArgs, QueryArgs, StatusArgs},
    config::EmbedderSettings,
    ingestion,
    output,
    pipeline::RerankVectors,
    prompt,
    walker,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("RAGRANK_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            // A store that fails to load is reported apart from other errors.
            if e.is_fatal() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    if let Command::Completions(args) = &cli.command {
        args.generate();
        return Ok(());
    }

    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
    let settings = EmbedderSettings {
        ollama_url: cli.ollama_url.clone(),
        embed_model: cli.embed_model.clone(),
        embed_timeout: cli.embed_timeout,
    }
    .or(EmbedderSettings::from_env()?);

    match &cli.command {
        Command::Ingest(args) => {
            cmd_ingest(&data_dir, settings, args, cli.quiet)
        }
        Command::Query(args) => cmd_query(&data_dir, settings, args),
        Command::Status(args) => cmd_status(&data_dir, args),
        Command::Completions(_) => Ok(()),
    }
}

fn cmd_ingest(
    data_dir: &DataDir,
    settings: EmbedderSettings,
    args: &IngestArgs,
    quiet: bool,
) -> Result<()> {
    if !args.path.is_dir() {
        return Err(Error::InvalidConfiguration(format!(
            "not a directory: {}",
            args.path.display()
        )));
    }
    let chunking = ChunkingConfig {
        chunk_size: args.chunk_size,
        overlap: args.overlap,
        min_words: args.min_words,
    };
    chunking.validate()?;

    let filter = args
        .glob
        .as_deref()
        .map(walker::compile_filter)
        .transpose()?;
    let files = walker::discover_files(&args.path, filter.as_ref())?;
    info!(
        files = files.len(),
        root = %args.path.display(),
        "discovered files"
    );

    let chunks = ingestion::collect_chunks(&files, &chunking)?;
    info!(chunks = chunks.len(), "chunked documents");

    let embedder = OllamaEmbedder::new(settings.resolve(None)?)?;
    let progress = !quiet && std::io::stderr().is_terminal();
    let index =
        ingestion::build_index(chunks, &embedder, args.dimension, progress)?;

    let store_dir = data_dir.store_dir();
    Store::save(&store_dir, &index, Some(embedder.config().model.as_str()))?;

    println!(
        "Ingested {} chunk(s) from {} file(s) into {}",
        index.len(),
        index.source_count(),
        store_dir.display()
    );
    Ok(())
}

fn cmd_query(
    data_dir: &DataDir,
    settings: EmbedderSettings,
    args: &QueryArgs,
) -> Result<()> {
    let config = PipelineConfig {
        top_k: args.top_k,
        top_n: args.top_n,
        rerank_vectors: if args.reuse_vectors {
            RerankVectors::Reuse
        } else {
            RerankVectors::Recompute
        },
        rewrite_query: args.expand_query,
        skip_rerank: args.no_rerank,
    };
    config.validate()?;

    let store = Store::open(&data_dir.store_dir())?;

    let embedder =
        OllamaEmbedder::new(settings.resolve(store.embedding_model())?)?;
    let pipeline = Pipeline::new(store.index(), &embedder, config)?;
    let results = pipeline.run(&args.query)?;

    if args.prompt {
        let passages: Vec<&str> =
            results.iter().map(|r| r.chunk.text.as_str()).collect();
        println!("{}", prompt::build_prompt(&args.query, &passages));
    } else if args.json {
        println!("{}", output::format_json(&results, &args.query)?);
    } else {
        print!("{}", output::format_human(&results));
    }
    Ok(())
}

fn cmd_status(data_dir: &DataDir, args: &StatusArgs) -> Result<()> {
    let store_dir = data_dir.store_dir();
    let store = Store::open(&store_dir)?;
    let report = output::StatusReport::new(
        data_dir.root(),
        &store_dir,
        store.index(),
        store.embedding_model(),
    );

    if args.json {
        println!("{}", output::format_status_json(&report)?);
    } else {
        print!("{}", output::format_status_human(&report));
    }
    Ok(())
}
