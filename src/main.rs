// src/main.rs
mod cache;
mod config;
mod extractors;
mod llm;
mod pdf;
mod server;
mod storage;
mod utils;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use config::Settings;
use extractors::context::{article_lines, keyword_context};
use extractors::section::{parse_requirements, KeywordResult};
use extractors::{SectionLocator, TableOfContents};
use pdf::{ExtractedDocument, UploadedPdf};
use storage::StorageManager;
use utils::AppError;

/// Locate the sections of technical PDF documents that cover given keywords
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve {
        #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:3001")]
        bind: SocketAddr,
    },
    /// Print the table of contents of a PDF
    Toc {
        pdf: PathBuf,
        /// Extend the heuristic headings with LLM suggestions
        #[arg(long)]
        llm: bool,
    },
    /// Find the section for each keyword
    Locate {
        pdf: PathBuf,
        /// Keyword to look up (repeatable)
        #[arg(short, long = "keyword", required = true)]
        keywords: Vec<String>,
        /// Ask the configured LLM when heuristics find nothing
        #[arg(long)]
        llm: bool,
        /// Save sections, metadata and the table of contents here
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Debug mode - save the extracted text with headings and matches marked
        #[arg(short, long)]
        debug: bool,
    },
    /// Show every sentence mentioning a keyword with its surroundings
    Context {
        pdf: PathBuf,
        #[arg(short, long)]
        keyword: String,
        #[arg(long, default_value_t = 2)]
        radius: usize,
    },
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Load .env and set up logging (reads RUST_LOG env var)
    dotenv::dotenv().ok();
    utils::logging::setup_logging();

    // 2. Parse CLI arguments
    let cli = Cli::parse();
    tracing::debug!("Starting with command: {:?}", cli.command);

    match cli.command {
        Command::Serve { bind } => {
            let state = server::state::AppState::from_settings(&cli.settings)?;
            server::serve(bind, state).await
        }
        Command::Toc { pdf, llm } => run_toc(&cli.settings, &pdf, llm).await,
        Command::Locate { pdf, keywords, llm, output_dir, debug } => {
            run_locate(&cli.settings, &pdf, &keywords, llm, output_dir.as_deref(), debug).await
        }
        Command::Context { pdf, keyword, radius } => run_context(&cli.settings, &pdf, &keyword, radius).await,
    }
}

async fn load_document(settings: &Settings, path: &Path) -> Result<ExtractedDocument, AppError> {
    let bytes = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let doc = settings
        .loader()?
        .load(UploadedPdf { file_name, content_type: None, bytes })
        .await?;
    tracing::info!("Loaded {} ({} bytes, {} characters of text)", doc.file_name, doc.file_size, doc.text.len());
    Ok(doc)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), AppError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| AppError::Processing(e.to_string()))?;
    println!("{}", json);
    Ok(())
}

async fn run_toc(settings: &Settings, path: &Path, with_llm: bool) -> Result<(), AppError> {
    let doc = load_document(settings, path).await?;
    let mut toc = TableOfContents::build(&doc.text, &settings.heading_rules());

    if with_llm {
        let assist = settings
            .assist()?
            .ok_or_else(|| AppError::Config("--llm requires a configured LLM provider".to_string()))?;
        let suggestions = assist.suggest_toc(&doc.text, llm::DEFAULT_TOC_CHUNK_CHARS).await?;
        let added = toc.merge(suggestions);
        tracing::info!("Added {} LLM headings", added);
    }

    print_json(&toc)
}

async fn run_locate(
    settings: &Settings,
    path: &Path,
    keywords: &[String],
    with_llm: bool,
    output_dir: Option<&Path>,
    debug: bool,
) -> Result<(), AppError> {
    let keywords = parse_requirements(&keywords.join("\n"))?;
    let doc = load_document(settings, path).await?;
    let toc = TableOfContents::build(&doc.text, &settings.heading_rules());
    let locator = SectionLocator::new(settings.locator_options());
    let assist = if with_llm { settings.assist()? } else { None };

    let storage = output_dir.map(StorageManager::new).transpose()?;
    let doc_stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| doc.file_name.clone());

    if debug {
        let debug_dir = output_dir.unwrap_or_else(|| Path::new(".")).join(&doc_stem).join("debug");
        std::fs::create_dir_all(&debug_dir)?;
        let debug_path = debug_dir.join("text_annotated.txt");
        if let Err(e) = utils::text_debug::save_debug_text(&doc.text, &toc, &keywords, &debug_path) {
            tracing::warn!("Failed to create debug text: {}", e);
        }
    }

    let mut results = Vec::with_capacity(keywords.len());
    let mut found_count = 0;

    for keyword in &keywords {
        let (outcome, fallback_error) = locator.resolve(&doc.text, &toc, keyword, assist.as_ref()).await;

        if outcome.is_found() {
            found_count += 1;
        }
        match outcome.section() {
            Some(section) => {
                tracing::info!("'{}' -> '{}' via {:?}", keyword, section.heading, section.strategy);
                if let Some(storage) = &storage {
                    match storage.save_section(&doc_stem, section) {
                        Ok(path) => tracing::info!("Saved section content to: {}", path.display()),
                        Err(e) => tracing::error!("Failed to save section content: {}", e),
                    }
                    match storage.save_section_metadata(&doc_stem, section) {
                        Ok(path) => tracing::info!("Saved section metadata to: {}", path.display()),
                        Err(e) => tracing::error!("Failed to save section metadata: {}", e),
                    }
                }
            }
            None => tracing::warn!("No section found for '{}'", keyword),
        }
        results.push(KeywordResult::from_outcome(&outcome, fallback_error));
    }

    if let Some(storage) = &storage {
        storage.save_toc(&doc_stem, &toc)?;
    }

    tracing::info!("Processing finished. Found: {}, Not found: {}", found_count, keywords.len() - found_count);
    print_json(&results)
}

async fn run_context(settings: &Settings, path: &Path, keyword: &str, radius: usize) -> Result<(), AppError> {
    let doc = load_document(settings, path).await?;
    let hits = keyword_context(&doc.text, keyword, radius)?;
    let lines = article_lines(&doc.text, keyword)?;

    for hit in &hits {
        println!("== {} ==\n{}\n", hit.title, hit.context);
    }
    if !lines.is_empty() {
        println!("== Positionen ==");
        for line in &lines {
            println!("{}", line);
        }
    }
    if hits.is_empty() && lines.is_empty() {
        println!("Keine Treffer für '{}'", keyword);
    }
    Ok(())
}
