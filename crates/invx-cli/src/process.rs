//! Extract one invoice and write it as JSON.

use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use invx_core::{ConfigError, DocumentValidator, ExtractorConfig, InvoiceExtractor};

use crate::Cli;
use crate::output::{OutputDocument, default_output_path};

pub async fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = ExtractorConfig::from_env()?;
    let verbose = cli.verbose > 0;

    if verbose {
        println!("{}", style("Invoice Extractor").bold().blue());
        println!("Processing: {}", cli.input_file.display());
    }

    if !config.has_backend() {
        return Err(ConfigError::NoBackendConfigured.into());
    }

    let document = DocumentValidator::new(&config)
        .validate(&cli.input_file)
        .map_err(|e| anyhow::anyhow!("File validation failed: {}", e))?;
    if verbose {
        println!("{} {}", style("✓").green(), document);
    }

    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&cli.input_file));
    let selection = config.preferred_backend()?;
    info!("Using {} model {}", selection.backend, selection.model);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    spinner.set_message("Extracting invoice data...");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = InvoiceExtractor::new(config)
        .process_async(&cli.input_file)
        .await;
    spinner.finish_and_clear();

    if !result.is_success() {
        anyhow::bail!(
            "{}",
            result.error_message().unwrap_or("Processing failed: unknown error")
        );
    }

    OutputDocument::new(&result, &cli.input_file, &output_path, &selection.model)
        .write(&output_path, cli.pretty)?;
    debug!("Wrote {}", output_path.display());

    println!("{} Processing completed successfully!", style("✓").green());
    if verbose {
        if let Some(time) = result.processing_time() {
            println!("Processing time: {:.2}s", time);
        }
        if let Some(score) = result.confidence_score() {
            println!("Confidence score: {:.2}", score);
        }
    }
    println!("Output saved to: {}", output_path.display());

    Ok(())
}
