use crate::error::{Error, Result};
use std::fs;
use std::path::Path;
use tera::Tera;

/// Maximum template file size (64KB)
const MAX_TEMPLATE_SIZE: u64 = 64 * 1024;

/// Variables a custom prompt template must use
const REQUIRED_VARIABLES: &[&str] = &["data"];

/// Optional variables exposed to templates
const OPTIONAL_VARIABLES: &[&str] = &["sentinel", "truncated"];

/// Validates custom user-prompt templates
pub(crate) struct TemplateValidator;

impl TemplateValidator {
    /// Validates an external template file
    ///
    /// Performs the following checks:
    /// 1. File exists and is a regular file
    /// 2. File size is within limits
    /// 3. Template syntax is valid (can be compiled by Tera)
    /// 4. Template references the table payload
    ///
    /// # Errors
    ///
    /// Returns [`Error::TemplateValidation`] if any check fails.
    pub(crate) fn validate_template(path: &Path) -> Result<()> {
        let display = path.to_string_lossy().to_string();

        if !path.exists() {
            return Err(Error::template_validation(display, "Template file not found"));
        }

        if !path.is_file() {
            return Err(Error::template_validation(display, "Path is not a file"));
        }

        let metadata = fs::metadata(path)
            .map_err(|e| Error::template_validation(&display, e.to_string()))?;
        if metadata.len() > MAX_TEMPLATE_SIZE {
            return Err(Error::template_validation(
                display,
                format!(
                    "Template file too large: {} bytes (max: {} bytes)",
                    metadata.len(),
                    MAX_TEMPLATE_SIZE
                ),
            ));
        }

        let content = fs::read_to_string(path)
            .map_err(|e| Error::template_validation(&display, e.to_string()))?;

        if content.trim().is_empty() {
            return Err(Error::template_validation(display, "Template file is empty"));
        }

        let mut temp_tera = Tera::default();
        temp_tera
            .add_raw_template("validation", &content)
            .map_err(|e| {
                Error::template_validation(&display, format!("Template syntax error: {e}"))
            })?;

        Self::check_required_variables(&content, &display)?;
        Self::check_optional_variables(&content);

        Ok(())
    }

    /// Heuristic check that the template prints the required variables.
    fn check_required_variables(content: &str, display: &str) -> Result<()> {
        let missing: Vec<&str> = REQUIRED_VARIABLES
            .iter()
            .filter(|var| !Self::mentions(content, var))
            .copied()
            .collect();

        if !missing.is_empty() {
            return Err(Error::template_validation(
                display,
                format!(
                    "Template is missing required variables: {}. \
                    The table payload is only sent if the template prints {{{{ data }}}}.",
                    missing.join(", ")
                ),
            ));
        }

        Ok(())
    }

    fn check_optional_variables(content: &str) {
        for var in OPTIONAL_VARIABLES {
            if !Self::mentions(content, var) {
                tracing::debug!("Template does not use optional variable: {}", var);
            }
        }
    }

    fn mentions(content: &str, var: &str) -> bool {
        let patterns = [
            format!("{{{{{var} "),
            format!("{{{{{var}}}}}"),
            format!("{{{{ {var} "),
            format!("{{{{ {var}}}}}"),
            format!("{{{{ {var}|"),
            format!("{{{{ {var} |"),
            format!("if {var}"),
        ];

        patterns.iter().any(|pattern| content.contains(pattern))
    }
}
