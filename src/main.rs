//! # docqa CLI
//!
//! Ask questions about a single document from the terminal, or serve the
//! same engine over HTTP.
//!
//! ## Usage
//!
//! ```bash
//! docqa [--config docqa.toml] [-v|--quiet] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docqa extract <file>` | Run the extractor chain and print the text |
//! | `docqa chunks <file>` | Print chunk boundaries and texts |
//! | `docqa ask <file> -q "..."` | Upload a file and answer questions about it |
//! | `docqa serve` | Start the HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! # Which backend read this scan?
//! docqa extract receipt.png
//!
//! # Read every page of a long PDF, not just the first 20
//! docqa extract report.pdf --full
//!
//! # One-shot question
//! GEMINI_API_KEY=... docqa ask report.pdf -q "Who signed the contract?"
//!
//! # Chat loop: one question per line on stdin
//! GEMINI_API_KEY=... docqa ask notes.txt
//! ```

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use docqa::config::{load_config, Config};
use docqa::engine::{Engine, UploadOptions};
use docqa::extract::{guess_media_type, ExtractOptions, Extractors};
use docqa_core::chunk::chunk_text;
use docqa_core::models::{AttemptOutcome, Document};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

/// docqa: ask questions about a PDF, image, or text file.
///
/// Without `--config`, built-in defaults are used (Gemini for answers,
/// OCR.space then tesseract for images).
#[derive(Parser)]
#[command(name = "docqa", version, about = "Grounded question answering over a single document")]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors. (`-q` belongs to `ask`.)
    #[arg(long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that reads a file.
#[derive(clap::Args)]
struct InputArgs {
    /// File to read.
    file: PathBuf,

    /// Declared media type; guessed from the extension when omitted.
    #[arg(long = "type")]
    media_type: Option<String>,

    /// Read every PDF page instead of the configured page limit.
    #[arg(long)]
    full: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract text and report which backend produced it.
    Extract {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Show how a file is split into chunks.
    Chunks {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Upload a file and answer questions about it.
    ///
    /// With no `-q`, questions are read from stdin, one per line.
    Ask {
        #[command(flatten)]
        input: InputArgs,

        /// Question to ask; repeatable.
        #[arg(short = 'q', long = "question")]
        questions: Vec<String>,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("DOCQA_LOG") {
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
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => {
            let config = Config::default();
            config.validate()?;
            config
        }
    };

    match cli.command {
        Commands::Extract { input } => run_extract(&config, &input).await?,
        Commands::Chunks { input } => run_chunks(&config, &input).await?,
        Commands::Ask { input, questions } => run_ask(&config, &input, questions).await?,
        Commands::Serve => docqa::server::run_server(&config).await?,
    }

    Ok(())
}

fn read_input(input: &InputArgs) -> anyhow::Result<(Vec<u8>, String)> {
    let media_type = match &input.media_type {
        Some(t) => t.clone(),
        None => guess_media_type(&input.file)
            .with_context(|| {
                format!(
                    "Cannot guess the type of {}; pass --type",
                    input.file.display()
                )
            })?
            .to_string(),
    };
    let bytes = std::fs::read(&input.file)
        .with_context(|| format!("Failed to read {}", input.file.display()))?;
    Ok((bytes, media_type))
}

async fn extract_text(config: &Config, input: &InputArgs) -> anyhow::Result<(String, String)> {
    let (bytes, media_type) = read_input(input)?;
    let extractors = Extractors::from_config(config)?;
    let options = ExtractOptions {
        process_full_document: input.full,
    };
    let result = extractors.extract(&bytes, &media_type, &options).await;

    for attempt in &result.attempts {
        let outcome = match &attempt.outcome {
            AttemptOutcome::Text(chars) => format!("{} chars", chars),
            AttemptOutcome::Empty => "no text".to_string(),
            AttemptOutcome::Error(e) => format!("error: {}", e),
        };
        eprintln!("  {:<12} {}", attempt.backend, outcome);
    }

    match result.backend {
        Some(backend) if result.success() => Ok((backend, result.text)),
        _ => bail!(
            "No text extracted from {} ({:?})",
            input.file.display(),
            result.status
        ),
    }
}

async fn run_extract(config: &Config, input: &InputArgs) -> anyhow::Result<()> {
    let (backend, text) = extract_text(config, input).await?;
    println!("# backend: {}", backend);
    println!("{}", text);
    Ok(())
}

async fn run_chunks(config: &Config, input: &InputArgs) -> anyhow::Result<()> {
    let (_, text) = extract_text(config, input).await?;
    let chunks = chunk_text(&Document::new_id(), &text, &config.chunk_params()?);
    println!("{} chunks", chunks.len());
    for chunk in chunks {
        println!("\n[{}] chars {}..{}", chunk.chunk_index, chunk.start, chunk.end);
        println!("{}", chunk.text);
    }
    Ok(())
}

async fn run_ask(config: &Config, input: &InputArgs, questions: Vec<String>) -> anyhow::Result<()> {
    let engine = Engine::from_config(config)?;
    let (bytes, media_type) = read_input(input)?;
    let options = UploadOptions {
        process_full_document: input.full,
        name: file_name(&input.file),
    };
    let receipt = engine.upload(&bytes, &media_type, options).await?;
    eprintln!(
        "Loaded {} ({} chars, {} chunks, via {})",
        input.file.display(),
        receipt.char_count,
        receipt.chunk_count,
        receipt.backend
    );

    if !questions.is_empty() {
        for question in questions {
            answer_one(&engine, &receipt.document_id, &question).await;
        }
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        answer_one(&engine, &receipt.document_id, &line).await;
    }
    Ok(())
}

/// Print one answer, or the error, without aborting the chat loop.
async fn answer_one(engine: &Engine, document_id: &str, question: &str) {
    match engine.ask(document_id, question).await {
        Ok(answer) => {
            println!("Q: {}", question.trim());
            println!("A: {}", answer.answer);
            for (i, citation) in answer.citations.iter().enumerate() {
                let preview: String = citation.chars().take(120).collect();
                println!("  [{}] {}", i + 1, preview.replace('\n', " "));
            }
            println!();
        }
        Err(e) => eprintln!("{} ({})", e, e.code()),
    }
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}
