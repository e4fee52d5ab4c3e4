//! `medcopilot`: build and query the clinical document corpora.
//!
//! ```bash
//! medcopilot build hospital
//! medcopilot search pubmed "sepsis fluid resuscitation" -k 3
//! medcopilot ask hospital "ICU sepsis management" --mode hybrid
//! medcopilot fetch-pubmed "type 2 diabetes"
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use medcopilot_core::config::{Config, Settings};
use medcopilot_core::extract::DocumentExtractor;
use medcopilot_core::Error;
use medcopilot_embed::shared_embedder;
use medcopilot_engine::{AskMode, ClinicalAssistant, EngineSettings, RetrievalEngine};
use medcopilot_remote::{fetch_pubmed, fetch_trials, http_client, GroqSynthesizer};

#[derive(Parser)]
#[command(name = "medcopilot", version, about = "Clinical document retrieval and question answering")]
struct Cli {
    /// Directory holding config.toml (relative paths resolve against it)
    #[arg(long, default_value = ".")]
    config_dir: PathBuf,

    /// Config environment (dev, prod, test); defaults to RUST_ENV
    #[arg(long)]
    env: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rebuild a corpus index from its documents directory
    Build {
        corpus: String,
        /// Read documents from here instead of the configured directory
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Show the units closest to a query
    Search {
        corpus: String,
        query: String,
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// Answer a question from the corpus, the external model, or both
    Ask {
        corpus: String,
        question: String,
        #[arg(long, default_value = "hospital")]
        mode: AskMode,
    },
    /// Download PubMed abstracts for a topic
    FetchPubmed {
        topic: String,
        #[arg(long)]
        max_results: Option<usize>,
    },
    /// Download ClinicalTrials.gov studies for a condition
    FetchTrials {
        condition: String,
        #[arg(long)]
        max_results: Option<usize>,
    },
    /// Report whether a corpus index is available
    Status { corpus: String },
}

fn engine_for(settings: &Settings, corpus: &str) -> Result<RetrievalEngine> {
    let embedder = shared_embedder(&settings.embedding)?;
    let engine_settings = EngineSettings::for_corpus(settings, corpus)?;
    Ok(RetrievalEngine::new(embedder, engine_settings)
        .with_extractor(DocumentExtractor::new().with_max_pdf_pages(settings.indexing.max_pdf_pages)))
}

fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load_from(&cli.config_dir, cli.env.as_deref()).context("loading configuration")?;
    let settings = config.settings()?;
    tracing::debug!("Configuration environment: {}", config.env_name());

    match cli.command {
        Command::Build { corpus, dir } => {
            let corpus_settings = settings.corpus(&corpus)?;
            let dir = dir.unwrap_or_else(|| corpus_settings.documents_dir.clone());
            let kinds = corpus_settings.kinds.clone();
            println!("📚 Building '{}' from {}", corpus, dir.display());
            let engine = engine_for(&settings, &corpus)?.with_progress(true);
            let result = engine.build_from_dir(&dir, &kinds)?;
            println!("✅ Indexed {} text unit(s)", result.unit_count);
            if result.short_units > 0 {
                println!("✂️  {} unit(s) below {} characters skipped", result.short_units, corpus_settings.min_unit_chars);
            }
            if result.unit_errors > 0 {
                println!("⚠️  {} unit(s) could not be extracted", result.unit_errors);
            }
            if !result.failed_documents.is_empty() {
                println!("⚠️  Skipped {} document(s):", result.failed_documents.len());
                for name in &result.failed_documents {
                    println!("   - {}", name);
                }
            }
            println!("💾 Snapshot: {}", engine.settings().snapshot_path.display());
        }
        Command::Search { corpus, query, k } => {
            let engine = engine_for(&settings, &corpus)?;
            let k = k.unwrap_or(settings.search.default_k);
            let results = engine.search(&query, k)?;
            println!("🔍 {} result(s) for \"{}\"", results.len(), query);
            for (rank, r) in results.iter().enumerate() {
                println!("\n#{} 📄 {} (distance {:.4})", rank + 1, r.source, r.distance);
                println!("{}", preview(&r.text, settings.search.preview_chars));
            }
        }
        Command::Ask { corpus, question, mode } => {
            let engine = Arc::new(engine_for(&settings, &corpus)?);
            let synthesizer = Arc::new(GroqSynthesizer::from_settings(&settings.answer));
            let assistant = ClinicalAssistant::new(engine, synthesizer);
            let reply = assistant.ask(&question, mode)?;
            println!("🧠 {} answer\n", mode);
            println!("{}", reply.answer);
            if !reply.sources.is_empty() {
                println!("\n📚 Evidence sources:");
                for source in &reply.sources {
                    println!("   - {}", source);
                }
            }
        }
        Command::FetchPubmed { topic, max_results } => {
            let client = http_client(settings.answer.timeout_secs)?;
            let max = max_results.unwrap_or(settings.fetch.max_results);
            match fetch_pubmed(&client, &topic, max, &settings.fetch.pubmed_dir)? {
                Some(path) => println!("✅ Saved: {}", path.display()),
                None => println!("📄 No PubMed articles found for \"{}\"", topic),
            }
        }
        Command::FetchTrials { condition, max_results } => {
            let client = http_client(settings.answer.timeout_secs)?;
            let max = max_results.unwrap_or(settings.fetch.max_results);
            let (path, count) = fetch_trials(&client, &condition, max, &settings.fetch.trials_dir)?;
            println!("✅ Saved {} trial(s): {}", count, path.display());
        }
        Command::Status { corpus } => {
            let engine = engine_for(&settings, &corpus)?;
            let status = match engine.load() {
                Ok(_) | Err(Error::SnapshotNotFound(_)) => engine.status(),
                Err(e) => return Err(e.into()),
            };
            if status.loaded {
                println!(
                    "🟢 '{}' ready: {} unit(s), dim {}",
                    corpus,
                    status.unit_count,
                    status.dimension.unwrap_or_default()
                );
                if let Some(id) = status.embedder_id {
                    println!("   embedder: {}", id);
                }
            } else {
                println!("🔴 '{}' not built yet (no snapshot at {})", corpus, status.snapshot_path.display());
            }
        }
    }
    Ok(())
}

/// User-facing explanation for the failures a caller can act on.
fn explain(err: &anyhow::Error) -> Option<&'static str> {
    match err.downcast_ref::<Error>()? {
        Error::IndexNotReady => Some("❌ Knowledge base not ready. Run `medcopilot build <corpus>` first."),
        Error::EmptyQuery => Some("❌ Please enter a question or search query."),
        Error::InvalidTopK => Some("❌ k must be at least 1."),
        Error::NoDocumentsIndexed { .. } => Some("❌ No usable text found in the documents."),
        Error::ModelUnavailable(_) => Some("❌ Embedding model could not be loaded."),
        _ => None,
    }
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    if let Err(err) = run(Cli::parse()) {
        if let Some(message) = explain(&err) {
            eprintln!("{}", message);
        }
        if let Some(Error::NoDocumentsIndexed { failed_documents }) = err.downcast_ref::<Error>() {
            for name in failed_documents {
                eprintln!("   - {}", name);
            }
        }
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}
