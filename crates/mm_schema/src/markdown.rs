//! Checks for Markdown-producing tasks.

use regex::Regex;

use crate::error::DecodeError;
use crate::extract::fenced_block;
use crate::validator::{FieldError, ValidationResult};

/// Expected shape of a Markdown report.
#[derive(Debug, Clone, Default)]
pub struct MarkdownSchema {
    /// Minimum length after trimming
    pub min_chars: usize,
    /// Headings that must appear, matched case-insensitively
    pub required_sections: Vec<String>,
}

impl MarkdownSchema {
    /// Any non-trivial Markdown body.
    pub fn plain() -> Self {
        Self {
            min_chars: 40,
            required_sections: Vec::new(),
        }
    }

    pub fn with_sections<I, S>(mut self, sections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_sections.extend(sections.into_iter().map(Into::into));
        self
    }

    pub fn check(&self, text: &str) -> ValidationResult {
        let mut result = ValidationResult::new();
        let body = text.trim();

        if body.is_empty() {
            result.add_error(FieldError::missing("", "Report is empty"));
            return result;
        }
        if body.chars().count() < self.min_chars {
            result.add_error(FieldError::invalid(
                "",
                format!("Report is too short (< {} characters)", self.min_chars),
            ));
        }

        for section in &self.required_sections {
            if !has_heading(body, section) {
                result.add_error(FieldError::missing(
                    format!("#{}", section),
                    format!("Missing section heading '{}'", section),
                ));
            }
        }

        result
    }
}

/// Decode a Markdown response, unwrapping a whole-response code fence.
pub fn decode_markdown(raw: &str, schema: &MarkdownSchema) -> Result<String, DecodeError> {
    let trimmed = raw.trim();
    let body = if trimmed.starts_with("```") {
        fenced_block(trimmed).unwrap_or(trimmed)
    } else {
        trimmed
    };

    let result = schema.check(body);
    if result.valid {
        Ok(format!("{}\n", body.trim()))
    } else {
        Err(DecodeError::Invalid(result))
    }
}

fn has_heading(text: &str, section: &str) -> bool {
    let pattern = format!(r"(?mi)^\s{{0,3}}#{{1,6}}[^\n]*{}", regex::escape(section));
    Regex::new(&pattern)
        .map(|re| re.is_match(text))
        .unwrap_or(false)
}
