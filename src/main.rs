use std::{path::Path, sync::Arc};

use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Command, IndexArgs, QueryArgs};
use regrag::{
    DataDir,
    Document,
    Error,
    IndexStats,
    RetrievalService,
    Scorer,
    ServiceOptions,
    Settings,
    embedding::HashEmbedder,
    index_store::IndexPaths,
    keyword::KeywordScorer,
    text_util::{self, DEFAULT_PREVIEW_CHARS},
    tokenizer::{CharTokenizer, HfTokenizer, Tokenizer},
    vector_index::SearchResult,
};

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("REGRAG_LOG") {
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

#[tokio::main]
async fn main() -> regrag::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Command::Completions(args) = &cli.command {
        args.generate();
        return Ok(());
    }

    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
    let mut settings = Settings::load(&data_dir)?;
    if let Some(path) = cli.tokenizer {
        settings.tokenizer_path = Some(path);
    }
    let prefix = data_dir.index_prefix(&settings.index_name);

    match cli.command {
        Command::Index(args) => {
            cmd_index(&settings, &prefix, &args).await?;
        }
        Command::Query(args) => {
            cmd_query(&settings, &prefix, &args).await?;
        }
        Command::Status(args) => {
            cmd_status(&settings, &data_dir, &prefix, args.json).await?;
        }
        Command::Completions(_) => {}
    }

    Ok(())
}

fn build_service(
    settings: &Settings,
    scorer: Scorer,
) -> regrag::Result<RetrievalService> {
    let tokenizer: Arc<dyn Tokenizer> = match &settings.tokenizer_path {
        Some(path) => Arc::new(HfTokenizer::from_file(path)?),
        None => Arc::new(CharTokenizer),
    };
    let options = ServiceOptions {
        chunking: settings.chunking()?,
        embed_timeout: settings.embed_timeout(),
        scorer,
    };
    RetrievalService::new(
        Arc::new(HashEmbedder::new(settings.dimension)),
        tokenizer,
        options,
    )
}

fn read_documents(path: &Path) -> regrag::Result<Vec<Document>> {
    let bytes = std::fs::read(path).map_err(|e| {
        Error::Config(format!("cannot read {}: {e}", path.display()))
    })?;
    Ok(serde_json::from_slice(&bytes)?)
}

async fn cmd_index(
    settings: &Settings,
    prefix: &Path,
    args: &IndexArgs,
) -> regrag::Result<()> {
    let service = build_service(settings, Scorer::Cosine)?;

    if args.append && IndexPaths::for_prefix(prefix).any_exist() {
        let existing = service.load(prefix).await?;
        eprintln!("Loaded {existing} existing chunks");
    }

    let documents = read_documents(&args.documents)?;
    eprintln!("Indexing {} documents...", documents.len());
    let added = service.index_documents(&documents).await?;
    service.save(prefix).await?;

    eprintln!(
        "Indexed {added} chunks ({} total) into {}",
        service.len().await,
        prefix.display()
    );
    Ok(())
}

async fn cmd_query(
    settings: &Settings,
    prefix: &Path,
    args: &QueryArgs,
) -> regrag::Result<()> {
    let scorer = if args.keyword {
        Scorer::Keyword(KeywordScorer::default())
    } else {
        Scorer::Cosine
    };
    let service = build_service(settings, scorer)?;
    load_existing(&service, prefix).await?;

    let top_k = args.top_k.unwrap_or(settings.top_k);
    let results = service
        .query(
            &args.query,
            top_k,
            args.risk_type.as_deref(),
            args.document_type.as_deref(),
        )
        .await?;

    if args.json {
        let response = regrag::QueryResponse {
            results,
            total_chunks: service.len().await,
            query: args.query.clone(),
        };
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        format_human(&results);
    }
    Ok(())
}

async fn load_existing(
    service: &RetrievalService,
    prefix: &Path,
) -> regrag::Result<()> {
    if IndexPaths::for_prefix(prefix).any_exist() {
        service.load(prefix).await?;
    } else {
        warn!(prefix = %prefix.display(), "no persisted index found");
    }
    Ok(())
}

fn format_human(results: &[SearchResult]) {
    if results.is_empty() {
        println!("No matching passages.");
        return;
    }
    for (rank, result) in results.iter().enumerate() {
        let meta = &result.chunk.metadata;
        println!(
            "{}. [{:.3}] {} ({}, {})",
            rank + 1,
            result.similarity_score,
            meta.title,
            meta.doc_type,
            meta.risk_type
        );
        if !meta.source_link.is_empty() {
            println!("   {}", meta.source_link);
        }
        let text = text_util::single_line(&result.chunk.text);
        println!("   {}", text_util::preview(&text, DEFAULT_PREVIEW_CHARS));
    }
}

async fn cmd_status(
    settings: &Settings,
    data_dir: &DataDir,
    prefix: &Path,
    json: bool,
) -> regrag::Result<()> {
    let service = build_service(settings, Scorer::Cosine)?;
    load_existing(&service, prefix).await?;
    let stats = service.stats().await;

    if json {
        let value = serde_json::json!({
            "data_dir": data_dir.root(),
            "index": prefix,
            "dimension": settings.dimension,
            "stats": stats,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        print_stats(data_dir, prefix, &stats);
    }
    Ok(())
}

fn print_stats(data_dir: &DataDir, prefix: &Path, stats: &IndexStats) {
    println!("Data directory: {}", data_dir.root().display());
    println!("Index: {}", prefix.display());
    println!("Chunks: {}", stats.total_chunks);
    println!("Documents: {}", stats.unique_documents);
    println!("Document types: {}", stats.document_types.join(", "));
    println!("Risk types: {}", stats.risk_types.join(", "));
}
