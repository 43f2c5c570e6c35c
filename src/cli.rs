use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

#[derive(Debug, Parser)]
#[command(
    name = "regrag",
    about = "Passage retrieval over regulatory documents"
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Path to a tokenizer.json used for token windows
    #[arg(long, global = true)]
    pub tokenizer: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Chunk, embed and index a JSON array of documents
    Index(IndexArgs),
    /// Retrieve the passages most relevant to a question
    Query(QueryArgs),
    /// Show index statistics
    Status(StatusArgs),
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Index --

#[derive(Debug, Parser)]
pub struct IndexArgs {
    /// JSON file containing an array of documents
    pub documents: PathBuf,

    /// Add to the existing index instead of replacing it
    #[arg(long)]
    pub append: bool,
}

// -- Query --

#[derive(Debug, Parser)]
pub struct QueryArgs {
    /// The question to retrieve passages for
    pub query: String,

    /// Number of results to return (defaults to the configured top_k)
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Only return chunks with this risk type (case-insensitive)
    #[arg(long)]
    pub risk_type: Option<String>,

    /// Only return chunks with this document type (case-insensitive)
    #[arg(long)]
    pub document_type: Option<String>,

    /// Rank by keyword weights instead of embeddings
    #[arg(long)]
    pub keyword: bool,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
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
            "regrag",
            &mut std::io::stdout(),
        );
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn parse_query_defaults() {
        let cli = Cli::parse_from(["regrag", "query", "What is the LCR?"]);
        match cli.command {
            Command::Query(args) => {
                assert_eq!(args.query, "What is the LCR?");
                assert_eq!(args.top_k, None);
                assert_eq!(args.risk_type, None);
                assert!(!args.keyword);
                assert!(!args.json);
            }
            _ => panic!("expected query command"),
        }
    }

    #[test]
    fn parse_query_filters() {
        let cli = Cli::parse_from([
            "regrag",
            "query",
            "capital buffers",
            "-k",
            "3",
            "--risk-type",
            "Capital Risk",
            "--document-type",
            "Final Rule",
            "--json",
        ]);
        match cli.command {
            Command::Query(args) => {
                assert_eq!(args.top_k, Some(3));
                assert_eq!(args.risk_type.as_deref(), Some("Capital Risk"));
                assert_eq!(args.document_type.as_deref(), Some("Final Rule"));
                assert!(args.json);
            }
            _ => panic!("expected query command"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "regrag",
            "index",
            "docs.json",
            "--append",
            "--data-dir",
            "/tmp/rg",
            "-vv",
        ]);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/rg")));
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Index(args) => {
                assert_eq!(args.documents, PathBuf::from("docs.json"));
                assert!(args.append);
            }
            _ => panic!("expected index command"),
        }
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }
}
