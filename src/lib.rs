//! # sheet-oem-extract
//!
//! Turns loosely formatted spreadsheets into a clean two-column OEM/Model
//! workbook by delegating the reading of the layout to a text completion
//! service.
//!
//! ## Features
//!
//! - `.xlsx`, `.xls` and `.csv` input (first sheet only)
//! - Bounded prompt payload with a fixed character budget
//! - Strict parsing of the completion: fenced or bare JSON arrays only
//! - Styled output workbook with frozen header and zebra rows
//! - Collision-free, atomically written output files
//!
//! ## Quick Start
//!
//! ```no_run
//! use sheet_oem_extract::{Config, Pipeline};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::builder()
//!     .output_dir("./output")
//!     .api_key(std::env::var("OPENAI_API_KEY")?)
//!     .build()?;
//!
//! let outcome = Pipeline::new(config)?.process("inventory.xlsx")?;
//! for record in &outcome.data {
//!     println!("{} / {}", record.oem, record.model);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The library follows a four-stage pipeline:
//! 1. **Read**: the reader loads the first sheet as rows of strings and the
//!    flattener joins them into budget-limited text
//! 2. **Extract**: one call to the completion service
//! 3. **Parse**: the parser validates the completion into records
//! 4. **Write**: the renderer writes the styled output workbook

#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::module_name_repetitions)]

mod client;
mod config;
mod error;
mod flatten;
mod pipeline;
mod prompt;
mod reader;
mod record;
mod renderer;
mod template_validator;

pub mod api;
pub mod parser;

pub use client::{CompletionService, ExtractionClient, OpenAiClient};
pub use config::{ApiKey, Config, ConfigBuilder};
pub use error::{Error, ErrorKind, Result};
pub use flatten::{FlattenedText, Flattener};
pub use pipeline::{Pipeline, PipelineStats, ProcessOutcome};
pub use prompt::Prompt;
pub use reader::{read_table, RawTable, TableFormat};
pub use record::{ExtractionRecord, UNKNOWN};
pub use renderer::{
    output_file_name, ColumnSpec, RenderedWorkbook, SheetStyle, WorkbookRenderer, STANDARD_STYLE,
};

/// Processes one input file with the given configuration.
///
/// This is the main entry point for the library. It builds a pipeline
/// backed by the HTTP completion client and runs it once.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration is invalid or has no API key
/// - The input cannot be read as tabular data
/// - The completion service call fails
/// - The completion is not a JSON array
/// - The output workbook cannot be written
///
/// # Examples
///
/// ```no_run
/// use sheet_oem_extract::{process, Config};
///
/// # fn main() -> anyhow::Result<()> {
/// let config = Config::builder().api_key("sk-...").build()?;
/// let outcome = process(config, "parts.csv")?;
/// println!("wrote {}", outcome.output_file_name);
/// # Ok(())
/// # }
/// ```
pub fn process(config: Config, input: impl AsRef<std::path::Path>) -> Result<ProcessOutcome> {
    Pipeline::new(config)?.process(input)
}
