//! # One-call API
//!
//! Fluent wrapper around [`Config`] and [`Pipeline`] for hosts that process a
//! single file and do not need to keep a pipeline around.
//!
//! ## Examples
//!
//! ```no_run
//! use sheet_oem_extract::api::Extract;
//!
//! // Defaults: gpt-4o, 15 000 characters, ./output
//! let outcome = Extract::file("parts.xlsx")
//!     .api_key(std::env::var("OPENAI_API_KEY").unwrap_or_default())
//!     .run()?;
//!
//! // Custom configuration
//! Extract::file("inventory.csv")
//!     .output("./processed")
//!     .model("gpt-4o-mini")
//!     .max_chars(8_000)
//!     .api_key("sk-...")
//!     .run()?;
//! # Ok::<(), sheet_oem_extract::Error>(())
//! ```

use crate::{Config, Pipeline, ProcessOutcome, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Entry point for the one-call API.
#[derive(Debug, Clone)]
#[must_use = "call .run() to process the file"]
pub struct Extract {
    input: PathBuf,
    output: Option<PathBuf>,
    model: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    max_chars: Option<usize>,
    timeout: Option<Duration>,
    prompt_template: Option<PathBuf>,
}

impl Extract {
    /// Starts an extraction for the given spreadsheet.
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            input: path.as_ref().to_path_buf(),
            output: None,
            model: None,
            api_key: None,
            base_url: None,
            max_chars: None,
            timeout: None,
            prompt_template: None,
        }
    }

    /// Sets the output directory.
    pub fn output(mut self, path: impl AsRef<Path>) -> Self {
        self.output = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the completion model.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the API key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Points the client at an OpenAI-compatible gateway.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the character budget for the table text.
    pub const fn max_chars(mut self, chars: usize) -> Self {
        self.max_chars = Some(chars);
        self
    }

    /// Bounds the completion call.
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Replaces the built-in user instruction with a Tera template.
    pub fn prompt_template(mut self, path: impl AsRef<Path>) -> Self {
        self.prompt_template = Some(path.as_ref().to_path_buf());
        self
    }

    /// Builds the configuration without running anything.
    ///
    /// # Errors
    ///
    /// Returns an error if the resulting configuration is invalid.
    pub fn config(&self) -> Result<Config> {
        let mut builder = Config::builder();

        if let Some(ref output) = self.output {
            builder = builder.output_dir(output);
        }
        if let Some(ref model) = self.model {
            builder = builder.model(model);
        }
        if let Some(ref key) = self.api_key {
            builder = builder.api_key(key);
        }
        if let Some(ref url) = self.base_url {
            builder = builder.api_base_url(url);
        }
        if let Some(chars) = self.max_chars {
            builder = builder.max_input_chars(chars);
        }
        if let Some(timeout) = self.timeout {
            builder = builder.request_timeout(timeout);
        }
        if let Some(ref template) = self.prompt_template {
            builder = builder.prompt_template(template);
        }

        builder.build()
    }

    /// Runs the pipeline on the file.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is invalid or any pipeline stage
    /// fails.
    pub fn run(self) -> Result<ProcessOutcome> {
        Pipeline::new(self.config()?)?.process(&self.input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Extract::file("parts.xlsx").config().unwrap();
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.max_input_chars, 15_000);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_builder_chain() {
        let config = Extract::file("parts.csv")
            .output("/tmp/processed")
            .model("gpt-4o-mini")
            .api_key("sk-test")
            .base_url("http://localhost:11434/v1")
            .max_chars(500)
            .timeout(Duration::from_secs(30))
            .config()
            .unwrap();

        assert_eq!(config.output_dir, PathBuf::from("/tmp/processed"));
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.max_input_chars, 500);
        assert_eq!(config.request_timeout, Some(Duration::from_secs(30)));
        assert_eq!(
            config.completions_url(),
            "http://localhost:11434/v1/chat/completions"
        );
    }

    #[test]
    fn test_run_without_key_fails_fast() {
        let err = Extract::file("parts.csv").run().unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_invalid_budget() {
        assert!(Extract::file("parts.csv").max_chars(0).config().is_err());
    }
}
