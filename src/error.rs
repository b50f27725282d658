use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the extraction pipeline.
///
/// Every variant is terminal for the request that produced it: nothing is
/// retried and no partial output is left behind.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// Input file could not be opened or is not tabular data.
    #[error("Cannot read tabular file '{path}': {message}")]
    UnreadableFile {
        /// Path to the input file
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Transport, authentication, rate-limit failure or an empty completion.
    #[error("Completion service failed: {message}")]
    CompletionService {
        /// Error message
        message: String,
    },

    /// Completion text could not be recovered as a JSON array.
    #[error("Malformed completion response: {message}")]
    MalformedResponse {
        /// Error message
        message: String,
    },

    /// Output workbook could not be persisted.
    #[error("Failed to write workbook '{path}': {message}")]
    Write {
        /// Target path
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Configuration validation error.
    #[error("Invalid configuration: {message}")]
    Config {
        /// Detailed error message
        message: String,
    },

    /// Prompt template rendering error.
    #[error("Failed to render template '{template}': {message}")]
    Template {
        /// Template name
        template: String,
        /// Error message
        message: String,
    },

    /// Custom prompt template rejected during validation.
    #[error("Invalid template '{path}': {message}")]
    TemplateValidation {
        /// Template path
        path: String,
        /// Error message
        message: String,
    },

    /// Background task running the pipeline did not complete.
    #[error("Pipeline task failed: {message}")]
    Task {
        /// Error message
        message: String,
    },
}

/// Fieldless view of [`Error`] for exhaustive matching in hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// See [`Error::UnreadableFile`]
    UnreadableFile,
    /// See [`Error::CompletionService`]
    CompletionService,
    /// See [`Error::MalformedResponse`]
    MalformedResponse,
    /// See [`Error::Write`]
    Write,
    /// Configuration or prompt template problems
    Config,
    /// See [`Error::Task`]
    Task,
}

impl Error {
    /// Creates an unreadable-input error.
    #[must_use]
    pub fn unreadable(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::UnreadableFile {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a completion service error.
    #[must_use]
    pub fn completion(message: impl Into<String>) -> Self {
        Self::CompletionService {
            message: message.into(),
        }
    }

    /// Creates a malformed response error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }

    /// Creates a write error with path context.
    #[must_use]
    pub fn write(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Write {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a template error.
    #[must_use]
    pub fn template(template: impl Into<String>, source: tera::Error) -> Self {
        Self::Template {
            template: template.into(),
            message: source.to_string(),
        }
    }

    /// Creates a template validation error.
    #[must_use]
    pub fn template_validation(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TemplateValidation {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns the kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::UnreadableFile { .. } => ErrorKind::UnreadableFile,
            Self::CompletionService { .. } => ErrorKind::CompletionService,
            Self::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            Self::Write { .. } => ErrorKind::Write,
            Self::Config { .. } | Self::Template { .. } | Self::TemplateValidation { .. } => {
                ErrorKind::Config
            }
            Self::Task { .. } => ErrorKind::Task,
        }
    }

    /// Returns true if the input file could not be read.
    #[must_use]
    pub const fn is_unreadable(&self) -> bool {
        matches!(self, Self::UnreadableFile { .. })
    }

    /// Returns true if the completion service call failed.
    #[must_use]
    pub const fn is_completion(&self) -> bool {
        matches!(self, Self::CompletionService { .. })
    }

    /// Returns true if the completion text was malformed.
    #[must_use]
    pub const fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedResponse { .. })
    }

    /// Returns true if the output workbook could not be written.
    #[must_use]
    pub const fn is_write(&self) -> bool {
        matches!(self, Self::Write { .. })
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::CompletionService {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::config("test message");
        assert!(err.is_config());
        assert!(err.to_string().contains("test message"));
    }

    #[test]
    fn test_unreadable_error_mentions_path() {
        let err = Error::unreadable("/tmp/input.xlsx", "corrupt archive");
        assert!(err.is_unreadable());
        assert!(err.to_string().contains("/tmp/input.xlsx"));
        assert!(err.to_string().contains("corrupt archive"));
    }

    #[test]
    fn test_write_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = Error::write("/readonly/out.xlsx", io_err);
        assert!(err.is_write());
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_kinds() {
        assert_eq!(Error::completion("429").kind(), ErrorKind::CompletionService);
        assert_eq!(Error::malformed("nope").kind(), ErrorKind::MalformedResponse);
        assert_eq!(
            Error::template_validation("t.tera", "empty").kind(),
            ErrorKind::Config
        );
    }

    #[test]
    fn test_error_clone() {
        let err = Error::malformed("test");
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }
}
