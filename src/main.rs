use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use quittung::chat::pipeline::ChatPipeline;
use quittung::chat::render::format_query_results;
use quittung::config::AppConfig;
use quittung::llm::LlmClient;
use quittung::receipt::ingest::{detect_file_kind, FileKind};
use quittung::receipt::structurer::{LlmStructurer, ReceiptStructurer};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "quittung")]
#[command(about = "Receipt extraction and natural-language expense queries")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract structured receipt data from an image or audio file
    Process {
        /// Path to the input image or audio file
        input_file: PathBuf,

        /// Send the image straight to the model instead of running OCR first
        #[arg(long)]
        e2e: bool,
    },
    /// Ask a natural-language question about the expense ledger
    Ask {
        /// The question, e.g. "What is the total expense of the Fuel?"
        question: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    match cli.command {
        Command::Process { input_file, e2e } => process(&config, &input_file, e2e).await,
        Command::Ask { question } => ask(&config, &question).await,
    }
}

async fn process(config: &AppConfig, input_file: &PathBuf, e2e: bool) -> Result<()> {
    let bytes = tokio::fs::read(input_file)
        .await
        .with_context(|| format!("failed to read {}", input_file.display()))?;
    let llm = LlmClient::new(&config.llm)?;
    let structurer = LlmStructurer::new(llm);

    let receipts = match detect_file_kind(input_file) {
        FileKind::Image if e2e => {
            info!(file = %input_file.display(), "structuring image end to end");
            let mime = mime_guess::from_path(input_file).first_or_octet_stream();
            structurer.structure_image(&bytes, mime.essence_str()).await?
        }
        FileKind::Image => {
            bail!(
                "no OCR engine is configured; rerun with --e2e to let the model read the image directly"
            );
        }
        FileKind::Audio => {
            bail!("no speech transcription engine is configured");
        }
        FileKind::Unknown => {
            bail!("unsupported file type: {}", input_file.display());
        }
    };

    println!("\n== Structured Receipt Data ==");
    for receipt in &receipts {
        println!("{}", serde_json::to_string_pretty(receipt)?);
    }
    Ok(())
}

async fn ask(config: &AppConfig, question: &str) -> Result<()> {
    let pipeline = ChatPipeline::from_config(config)?;

    println!("User Question: {}", question);
    println!("{}", "-".repeat(60));

    let report = pipeline.answer(question).await;

    if !report.generated_sql.is_empty() {
        println!("Generated SQL:\n{}", report.generated_sql);
        println!("{}", "-".repeat(60));
    }

    if let Some(results) = &report.raw_results {
        println!("Raw Results:");
        println!("{}", format_query_results(results));
        println!("\n{}\n", "=".repeat(60));
    }

    println!("Natural Language Response:");
    println!("{}", report.natural_language_response);

    if let Some(kind) = report.error {
        println!("\n❌ {}", kind);
    }
    Ok(())
}
