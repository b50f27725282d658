use crate::{
    client::{CompletionService, ExtractionClient, OpenAiClient},
    config::Config,
    error::Result,
    flatten::Flattener,
    parser,
    reader,
    record::ExtractionRecord,
    renderer::WorkbookRenderer,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

/// Statistics collected while processing one input file.
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Rows read from the first sheet
    pub input_rows: usize,

    /// Characters sent to the completion service
    pub flattened_chars: usize,

    /// Whether the table text was cut to the character budget
    pub truncated: bool,

    /// Records extracted
    pub records: usize,

    /// Records with at least one sentinel field
    pub unknown_records: usize,

    /// Time spent reading and flattening the input
    pub read_duration: Duration,

    /// Time spent waiting for the completion service
    pub extract_duration: Duration,

    /// Time spent parsing the completion
    pub parse_duration: Duration,

    /// Time spent writing the workbook
    pub write_duration: Duration,

    /// Total execution time
    pub duration: Duration,
}

impl PipelineStats {
    /// Prints a human-readable summary to stdout.
    pub fn print_summary(&self) {
        println!("\n╔═══════════════════════════════════════════════════════╗");
        println!("║            Extraction Summary                         ║");
        println!("╠═══════════════════════════════════════════════════════╣");
        println!(
            "║ Input Rows:           {:>8}                        ║",
            self.input_rows
        );
        println!(
            "║ Characters Sent:      {:>8}{}║",
            self.flattened_chars,
            if self.truncated {
                " (truncated)            "
            } else {
                "                        "
            }
        );
        println!(
            "║ Records Extracted:    {:>8}                        ║",
            self.records
        );
        println!(
            "║   - with Unknown:     {:>8}                        ║",
            self.unknown_records
        );
        println!("║                                                       ║");
        println!("║ Timing Breakdown:                                     ║");
        println!(
            "║   - Reading:          {:>8.2}s                     ║",
            self.read_duration.as_secs_f64()
        );
        println!(
            "║   - Completion:       {:>8.2}s                     ║",
            self.extract_duration.as_secs_f64()
        );
        println!(
            "║   - Parsing:          {:>8.2}s                     ║",
            self.parse_duration.as_secs_f64()
        );
        println!(
            "║   - Writing:          {:>8.2}s                     ║",
            self.write_duration.as_secs_f64()
        );
        println!(
            "║   - Total:            {:>8.2}s                     ║",
            self.duration.as_secs_f64()
        );
        println!("╚═══════════════════════════════════════════════════════╝\n");
    }
}

/// Result of processing one input file.
///
/// Serializes as `{"outputFileName": ..., "data": [...]}`. The generated
/// file belongs to the caller, including its eventual deletion.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessOutcome {
    /// Name of the generated workbook inside the output directory
    pub output_file_name: String,

    /// Extracted records in service order
    pub data: Vec<ExtractionRecord>,

    /// Full path of the generated workbook
    #[serde(skip)]
    pub output_path: PathBuf,

    /// Execution statistics
    #[serde(skip)]
    pub stats: PipelineStats,
}

/// Read → flatten → extract → parse → render, for one file at a time.
///
/// A pipeline holds no per-request state, so one instance may serve
/// concurrent requests from several threads.
pub struct Pipeline {
    flattener: Flattener,
    client: ExtractionClient,
    renderer: WorkbookRenderer,
    output_dir: PathBuf,
}

impl Pipeline {
    /// Creates a pipeline backed by the OpenAI-compatible HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration validation fails
    /// - No API key is configured
    /// - Prompt templates cannot be loaded
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let service = OpenAiClient::new(&config)?;
        Self::with_service(config, Box::new(service))
    }

    /// Creates a pipeline over a custom completion backend.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration validation fails or prompt
    /// templates cannot be loaded.
    pub fn with_service(config: Config, service: Box<dyn CompletionService>) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            flattener: Flattener::new(&config),
            client: ExtractionClient::new(&config, service)?,
            renderer: WorkbookRenderer::new(&config),
            output_dir: config.output_dir,
        })
    }

    /// Returns the directory workbooks are written to.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Processes one input file.
    ///
    /// # Process
    ///
    /// 1. **Read**: first sheet of the input, flattened into budget-limited text
    /// 2. **Extract**: one completion service call
    /// 3. **Parse**: completion text into records
    /// 4. **Write**: records into a styled workbook
    ///
    /// The first failing stage aborts the rest. No workbook is written
    /// unless every earlier stage succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnreadableFile`](crate::Error::UnreadableFile),
    /// [`Error::CompletionService`](crate::Error::CompletionService),
    /// [`Error::MalformedResponse`](crate::Error::MalformedResponse) or
    /// [`Error::Write`](crate::Error::Write) depending on the failing stage.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use sheet_oem_extract::{Config, Pipeline};
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let config = Config::builder()
    ///     .api_key(std::env::var("OPENAI_API_KEY")?)
    ///     .build()?;
    ///
    /// let outcome = Pipeline::new(config)?.process("parts.xlsx")?;
    /// println!("{} -> {} records", outcome.output_file_name, outcome.data.len());
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip(self, input), fields(input = %input.as_ref().display()))]
    pub fn process(&self, input: impl AsRef<Path>) -> Result<ProcessOutcome> {
        let input = input.as_ref();
        let start_time = Instant::now();
        let mut stats = PipelineStats::default();

        info!("Stage 1/4: Reading input...");
        let read_start = Instant::now();
        let table = reader::read_table(input)?;
        let text = self.flattener.flatten(&table);
        stats.read_duration = read_start.elapsed();
        stats.input_rows = table.len();
        stats.flattened_chars = text.char_count();
        stats.truncated = text.was_truncated();
        drop(table);

        info!(
            "✓ Read {} rows ({} characters) in {:.2}s",
            stats.input_rows,
            stats.flattened_chars,
            stats.read_duration.as_secs_f64()
        );

        info!("Stage 2/4: Requesting extraction...");
        let extract_start = Instant::now();
        let completion = self.client.extract(&text)?;
        stats.extract_duration = extract_start.elapsed();
        info!(
            "✓ Completion received in {:.2}s",
            stats.extract_duration.as_secs_f64()
        );

        info!("Stage 3/4: Parsing completion...");
        let parse_start = Instant::now();
        let records = parser::parse_records(&completion)?;
        stats.parse_duration = parse_start.elapsed();
        stats.records = records.len();
        stats.unknown_records = records.iter().filter(|r| r.has_unknown()).count();

        if stats.unknown_records > 0 {
            warn!(
                "  {} of {} record(s) contain Unknown fields",
                stats.unknown_records, stats.records
            );
        }

        info!("Stage 4/4: Writing workbook...");
        let write_start = Instant::now();
        let rendered = self.renderer.render(&records)?;
        stats.write_duration = write_start.elapsed();

        stats.duration = start_time.elapsed();
        info!(
            "✓ Processed {} into {} in {:.2}s",
            input.display(),
            rendered.file_name,
            stats.duration.as_secs_f64()
        );

        Ok(ProcessOutcome {
            output_file_name: rendered.file_name,
            data: records,
            output_path: rendered.path,
            stats,
        })
    }

    /// Processes one input file on tokio's blocking pool.
    ///
    /// # Errors
    ///
    /// Same as [`Pipeline::process`], plus [`Error::Task`](crate::Error::Task)
    /// if the blocking task panics or is cancelled.
    #[cfg(feature = "async")]
    pub async fn process_async(
        self: std::sync::Arc<Self>,
        input: impl Into<PathBuf>,
    ) -> Result<ProcessOutcome> {
        let input = input.into();
        tokio::task::spawn_blocking(move || self.process(input))
            .await
            .map_err(|e| crate::Error::Task {
                message: e.to_string(),
            })?
    }
}
