//! Basic example of using sheet-oem-extract as a library
//!
//! Processes one spreadsheet and prints the extracted pairs.
//! Run with: OPENAI_API_KEY=sk-... cargo run --example basic -- inventory.xlsx

use sheet_oem_extract::{Config, Pipeline};

fn main() -> anyhow::Result<()> {
    let input = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "inventory.xlsx".to_string());

    let config = Config::builder()
        .output_dir("./output")
        .api_key(std::env::var("OPENAI_API_KEY")?)
        .build()?;

    let outcome = Pipeline::new(config)?.process(&input)?;

    for record in &outcome.data {
        println!("{:<30} {}", record.oem, record.model);
    }

    outcome.stats.print_summary();
    println!("✓ Output written to: {}", outcome.output_path.display());

    Ok(())
}
