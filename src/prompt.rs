use crate::{
    config::Config,
    error::{Error, Result},
    flatten::FlattenedText,
    record::UNKNOWN,
};
use serde::Serialize;
use std::fs;
use tera::{Context, Tera};

const SYSTEM_TEMPLATE: &str = "system";
const USER_TEMPLATE: &str = "user";

/// The two instruction turns sent to the completion service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prompt {
    /// Fixed role instruction
    pub system: String,
    /// Task description followed by the table payload
    pub user: String,
}

#[derive(Serialize)]
struct PromptContext<'a> {
    data: &'a str,
    sentinel: &'a str,
    truncated: bool,
}

/// Renders the system and user turns from Tera templates.
pub(crate) struct PromptBuilder {
    tera: Tera,
}

impl PromptBuilder {
    /// Creates a prompt builder from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a built-in or custom template fails to compile
    /// or the custom template cannot be read.
    pub(crate) fn new(config: &Config) -> Result<Self> {
        let mut tera = Tera::default();

        tera.add_raw_template(SYSTEM_TEMPLATE, include_str!("../templates/system.tera"))
            .map_err(|e| Error::template(SYSTEM_TEMPLATE, e))?;

        let user = match config.prompt_template {
            Some(ref path) => fs::read_to_string(path).map_err(|e| {
                Error::template_validation(path.to_string_lossy(), e.to_string())
            })?,
            None => include_str!("../templates/user.tera").to_string(),
        };

        // Trailing whitespace belongs to the template file, not the payload.
        tera.add_raw_template(USER_TEMPLATE, user.trim_end())
            .map_err(|e| Error::template(USER_TEMPLATE, e))?;

        Ok(Self { tera })
    }

    /// Renders both turns around the flattened table.
    ///
    /// # Errors
    ///
    /// Returns an error if template rendering fails.
    pub(crate) fn build(&self, text: &FlattenedText) -> Result<Prompt> {
        let context = PromptContext {
            data: text.as_str(),
            sentinel: UNKNOWN,
            truncated: text.was_truncated(),
        };
        let context = Context::from_serialize(&context)
            .map_err(|e| Error::template(USER_TEMPLATE, e))?;

        let system = self
            .tera
            .render(SYSTEM_TEMPLATE, &context)
            .map_err(|e| Error::template(SYSTEM_TEMPLATE, e))?;
        let user = self
            .tera
            .render(USER_TEMPLATE, &context)
            .map_err(|e| Error::template(USER_TEMPLATE, e))?;

        Ok(Prompt {
            system: system.trim().to_string(),
            user,
        })
    }
}
