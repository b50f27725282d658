use anyhow::Context;
use clap::Parser;
use sheet_oem_extract::{Config, ExtractionRecord, Pipeline, ProcessOutcome};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const MAX_PREVIEW_WIDTH: usize = 48;

#[derive(Parser, Debug)]
#[command(
    name = "sheet-oem-extract",
    version,
    author,
    about = "Extract OEM/Model pairs from messy spreadsheets",
    long_about = "Extract OEM/Model pairs from messy spreadsheets.\n\n\
    Reads the first sheet of an .xlsx, .xls or .csv file, asks a chat-completion \
    model to find every manufacturer and model in it, and writes a clean, styled \
    two-column workbook named processed_<timestamp>.xlsx.\n\n\
    USAGE EXAMPLES:\n  \
      # Process a file into ./output\n  \
      sheet-oem-extract inventory.xlsx\n\n  \
      # Use another model and print the result as JSON\n  \
      sheet-oem-extract parts.csv --model gpt-4o-mini --json\n\n  \
      # Talk to an OpenAI-compatible gateway with a 60s limit\n  \
      sheet-oem-extract parts.xls --base-url http://localhost:8080/v1 --timeout 60"
)]
struct Cli {
    /// Spreadsheet to process (.xlsx, .xls or .csv)
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output directory for generated workbooks [default: output]
    #[arg(short, long, value_name = "PATH")]
    out: Option<PathBuf>,

    /// Completion model [default: gpt-4o]
    #[arg(short, long)]
    model: Option<String>,

    /// API key for the completion service
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Base URL of an OpenAI-compatible API [default: https://api.openai.com/v1]
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Maximum characters of table text sent to the model [default: 15000]
    #[arg(long)]
    max_chars: Option<usize>,

    /// Sampling temperature [default: 0.1]
    #[arg(long)]
    temperature: Option<f32>,

    /// Maximum tokens the model may generate [default: 4000]
    #[arg(long)]
    max_output_tokens: Option<u32>,

    /// Give up on the completion call after this many seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Tera template replacing the built-in user instruction
    ///
    /// The flattened table is available as `{{ data }}`, the placeholder
    /// for unknown values as `{{ sentinel }}` and `{{ truncated }}` tells
    /// whether the table was cut to fit.
    #[arg(long, value_name = "FILE")]
    prompt_template: Option<PathBuf>,

    /// Print the result as JSON instead of a preview table
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_tracing(cli.verbose);

    let mut builder = Config::builder().api_key(cli.api_key);

    if let Some(out) = cli.out {
        builder = builder.output_dir(out);
    }
    if let Some(model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(url) = cli.base_url {
        builder = builder.api_base_url(url);
    }
    if let Some(chars) = cli.max_chars {
        builder = builder.max_input_chars(chars);
    }
    if let Some(temperature) = cli.temperature {
        builder = builder.temperature(temperature);
    }
    if let Some(tokens) = cli.max_output_tokens {
        builder = builder.max_output_tokens(tokens);
    }
    if let Some(secs) = cli.timeout {
        builder = builder.request_timeout(Duration::from_secs(secs));
    }
    if let Some(template) = cli.prompt_template {
        builder = builder.prompt_template(template);
    }

    let config = builder.build().context("Failed to build configuration")?;

    let outcome = Pipeline::new(config)
        .context("Failed to create pipeline")?
        .process(&cli.input)
        .with_context(|| format!("Failed to process '{}'", cli.input.display()))?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&outcome).context("Failed to encode result")?
        );
    } else {
        print_preview(&outcome);
        outcome.stats.print_summary();
    }

    Ok(())
}

fn print_preview(outcome: &ProcessOutcome) {
    let count = outcome.data.len();
    println!(
        "\n✓ Extracted {} {}",
        count,
        if count == 1 { "record" } else { "records" }
    );
    println!("✓ Workbook: {}", outcome.output_path.display());

    if count == 0 {
        return;
    }

    let oem_width = column_width("OEM", outcome.data.iter().map(|r| r.oem.as_str()));
    let model_width = column_width("Model", outcome.data.iter().map(|r| r.model.as_str()));

    println!();
    println!("  {:<oem_width$}  {:<model_width$}", "OEM", "Model");
    println!("  {}  {}", "─".repeat(oem_width), "─".repeat(model_width));
    for ExtractionRecord { oem, model } in &outcome.data {
        let oem = clip(oem, oem_width);
        let model = clip(model, model_width);
        println!("  {oem:<oem_width$}  {model:<model_width$}");
    }
}

/// Shortens `value` to `width` characters, marking the cut with an ellipsis.
fn clip(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    let mut clipped: String = value.chars().take(width.saturating_sub(1)).collect();
    clipped.push('…');
    clipped
}

fn column_width<'a>(title: &str, values: impl Iterator<Item = &'a str>) -> usize {
    values
        .map(|v| v.chars().count())
        .chain(std::iter::once(title.len()))
        .max()
        .unwrap_or(0)
        .min(MAX_PREVIEW_WIDTH)
}

fn setup_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => EnvFilter::new("sheet_oem_extract=info"),
        1 => EnvFilter::new("sheet_oem_extract=debug"),
        _ => EnvFilter::new("sheet_oem_extract=trace"),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_keeps_short_values() {
        assert_eq!(clip("Acme", 10), "Acme");
        assert_eq!(clip("Acme", 4), "Acme");
    }

    #[test]
    fn test_clip_fits_preview_width() {
        let long = "Extremely Long Manufacturer Name Incorporated International Holdings";
        let width = column_width("OEM", std::iter::once(long));
        let clipped = clip(long, width);

        assert_eq!(width, MAX_PREVIEW_WIDTH);
        assert_eq!(clipped.chars().count(), MAX_PREVIEW_WIDTH);
        assert!(clipped.ends_with('…'));
    }

    #[test]
    fn test_cli_leaves_defaults_to_config() {
        let cli = Cli::try_parse_from(["sheet-oem-extract", "parts.csv", "--api-key", "sk-test"])
            .unwrap();
        assert!(cli.model.is_none());
        assert!(cli.max_chars.is_none());
        assert!(cli.base_url.is_none());
    }
}
