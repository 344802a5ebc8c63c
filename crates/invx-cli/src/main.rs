//! Command-line invoice extractor.

mod output;
mod process;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use console::style;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use invx_core::{Backend, ConfigError};

/// Extract structured data from invoice documents.
///
/// Takes an invoice file (PDF, PNG, JPG, JPEG) and writes the extracted data
/// as JSON.
///
/// Example:
///
///     invoice-extractor invoice.pdf
///
///     invoice-extractor invoice.pdf --output result.json --pretty
#[derive(Parser)]
#[command(name = "invoice-extractor")]
#[command(author, version, about, long_about)]
pub struct Cli {
    /// Invoice file to process
    #[arg(value_parser = existing_file)]
    input_file: PathBuf,

    /// Output JSON file path (default: input file with a .json extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(short, long)]
    pretty: bool,

    /// Enable verbose output (repeat for more log detail)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn existing_file(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);
    if path.exists() {
        Ok(path)
    } else {
        Err(format!("file '{}' does not exist", value))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Variables already in the environment take precedence
    dotenvy::dotenv().ok();

    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        return ExitCode::FAILURE;
    }

    match process::run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", style("Error:").red().bold(), e);
            if let Some(ConfigError::NoBackendConfigured) = e.downcast_ref::<ConfigError>() {
                print_backend_hint();
            }
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr; `RUST_LOG` overrides the `-v` level.
fn init_logging(verbose: u8) -> anyhow::Result<()> {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn print_backend_hint() {
    eprintln!("Please set API keys in the environment or a .env file:");
    for backend in Backend::ALL {
        let family = match backend {
            Backend::OpenAi => "OpenAI GPT",
            Backend::Gemini => "Google Gemini",
            Backend::Anthropic => "Anthropic Claude",
        };
        eprintln!("  - {} for {} models", backend.credential_var(), family);
    }
}
