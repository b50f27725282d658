use crate::error::{Error, Result};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_OUTPUT_DIR: &str = "output";
const DEFAULT_MAX_INPUT_CHARS: usize = 15_000;
const DEFAULT_CELL_DELIMITER: char = '\t';
const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_TEMPERATURE: f32 = 0.1;
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 4_000;

/// Secret credential for the completion service.
///
/// `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wraps a raw key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the raw key for use in request headers.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Configuration for the extraction pipeline.
///
/// Use [`Config::builder()`] to construct a new configuration.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Config {
    /// Directory generated workbooks are written to
    pub output_dir: PathBuf,

    /// Character budget for the flattened table text
    pub max_input_chars: usize,

    /// Separator placed between cells of a row
    pub cell_delimiter: char,

    /// Completion model identifier
    pub model: String,

    /// Base URL of the chat-completions API
    pub api_base_url: String,

    /// Credential for the completion service
    pub api_key: Option<ApiKey>,

    /// Sampling temperature
    pub temperature: f32,

    /// Upper bound on generated tokens
    pub max_output_tokens: u32,

    /// Optional HTTP timeout. `None` waits indefinitely.
    pub request_timeout: Option<Duration>,

    /// Optional Tera template replacing the built-in user instruction
    pub prompt_template: Option<PathBuf>,
}

impl Config {
    /// Creates a new configuration builder.
    ///
    /// # Examples
    ///
    /// ```
    /// use sheet_oem_extract::Config;
    ///
    /// let config = Config::builder()
    ///     .output_dir("./processed")
    ///     .max_input_chars(10_000)
    ///     .build()
    ///     .expect("valid configuration");
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The character budget or output token limit is zero
    /// - The delimiter is a line break
    /// - Temperature is outside `0.0..=2.0`
    /// - The base URL is not HTTP(S)
    /// - The custom prompt template is missing or invalid
    pub fn validate(&self) -> Result<()> {
        if self.max_input_chars == 0 {
            return Err(Error::config("max_input_chars must be greater than 0"));
        }

        if matches!(self.cell_delimiter, '\n' | '\r') {
            return Err(Error::config(
                "cell_delimiter cannot be a line break (rows are separated by newlines)",
            ));
        }

        if self.model.trim().is_empty() {
            return Err(Error::config("model must not be empty"));
        }

        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://"))
        {
            return Err(Error::config(format!(
                "api_base_url must be an http(s) URL, got '{}'",
                self.api_base_url
            )));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(Error::config(format!(
                "temperature ({}) must be between 0.0 and 2.0",
                self.temperature
            )));
        }

        if self.max_output_tokens == 0 {
            return Err(Error::config("max_output_tokens must be greater than 0"));
        }

        if self.request_timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::config("request_timeout must be greater than zero"));
        }

        if let Some(ref template_path) = self.prompt_template {
            crate::template_validator::TemplateValidator::validate_template(template_path)?;
        }

        Ok(())
    }

    /// Returns the chat-completions endpoint derived from the base URL.
    #[must_use]
    pub fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.api_base_url.trim_end_matches('/')
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            cell_delimiter: DEFAULT_CELL_DELIMITER,
            model: DEFAULT_MODEL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_key: None,
            temperature: DEFAULT_TEMPERATURE,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            request_timeout: None,
            prompt_template: None,
        }
    }
}

/// Builder for creating a [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    output_dir: Option<PathBuf>,
    max_input_chars: Option<usize>,
    cell_delimiter: Option<char>,
    model: Option<String>,
    api_base_url: Option<String>,
    api_key: Option<ApiKey>,
    temperature: Option<f32>,
    max_output_tokens: Option<u32>,
    request_timeout: Option<Duration>,
    prompt_template: Option<PathBuf>,
}

impl ConfigBuilder {
    /// Sets the directory generated workbooks are written to.
    #[must_use]
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    /// Sets the character budget for the flattened input.
    #[must_use]
    pub fn max_input_chars(mut self, chars: usize) -> Self {
        self.max_input_chars = Some(chars);
        self
    }

    /// Sets the cell separator.
    #[must_use]
    pub fn cell_delimiter(mut self, delimiter: char) -> Self {
        self.cell_delimiter = Some(delimiter);
        self
    }

    /// Sets the completion model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the API base URL (for OpenAI-compatible gateways).
    #[must_use]
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(ApiKey::new(key));
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets the maximum number of generated tokens.
    #[must_use]
    pub fn max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = Some(tokens);
        self
    }

    /// Sets an HTTP timeout for the completion call.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets a Tera template file replacing the built-in user instruction.
    ///
    /// The template receives the flattened table as `data` and must
    /// reference it.
    #[must_use]
    pub fn prompt_template(mut self, path: impl Into<PathBuf>) -> Self {
        self.prompt_template = Some(path.into());
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn build(self) -> Result<Config> {
        let config = Config {
            output_dir: self
                .output_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            max_input_chars: self.max_input_chars.unwrap_or(DEFAULT_MAX_INPUT_CHARS),
            cell_delimiter: self.cell_delimiter.unwrap_or(DEFAULT_CELL_DELIMITER),
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_base_url: self
                .api_base_url
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            api_key: self.api_key,
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_output_tokens: self.max_output_tokens.unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS),
            request_timeout: self.request_timeout,
            prompt_template: self.prompt_template,
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    #[test]
    fn test_default_config() {
        let config = Config::builder().build().unwrap();

        assert_eq!(config.max_input_chars, DEFAULT_MAX_INPUT_CHARS);
        assert_eq!(config.cell_delimiter, '\t');
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.max_output_tokens, 4_000);
        assert!(config.request_timeout.is_none());
        assert_eq!(config.output_dir, PathBuf::from("output"));
    }

    #[test]
    fn test_zero_budget_rejected() {
        let result = Config::builder().max_input_chars(0).build();
        assert!(result.unwrap_err().is_config());
    }

    #[test]
    fn test_newline_delimiter_rejected() {
        assert!(Config::builder().cell_delimiter('\n').build().is_err());
        assert!(Config::builder().cell_delimiter(',').build().is_ok());
    }

    #[test]
    fn test_temperature_range() {
        assert!(Config::builder().temperature(-0.1).build().is_err());
        assert!(Config::builder().temperature(2.5).build().is_err());
        assert!(Config::builder().temperature(0.0).build().is_ok());
    }

    #[test]
    fn test_invalid_base_url() {
        let result = Config::builder().api_base_url("api.openai.com").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = Config::builder()
            .request_timeout(Duration::from_secs(0))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_completions_url() {
        let config = Config::builder()
            .api_base_url("http://localhost:8080/v1/")
            .build()
            .unwrap();
        assert_eq!(
            config.completions_url(),
            "http://localhost:8080/v1/chat/completions"
        );
    }

    #[test]
    fn test_api_key_redacted_in_debug() {
        let config = Config::builder().api_key("sk-secret").build().unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn test_missing_prompt_template() {
        let result = Config::builder()
            .prompt_template("/nonexistent/prompt.tera")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_valid_prompt_template() {
        let temp = assert_fs::TempDir::new().unwrap();
        let template = temp.child("prompt.tera");
        template
            .write_str("List every manufacturer and model.\n{{ data }}")
            .unwrap();

        let config = Config::builder()
            .prompt_template(template.path())
            .build()
            .unwrap();
        assert_eq!(config.prompt_template.as_deref(), Some(template.path()));
    }
}
