//! User-submitted run configuration.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{CoreError, CoreResult};

/// The product under study. Immutable once a run starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductConfig {
    pub name: String,
    pub industry: String,
    pub geography: String,
    /// Free-text business scale (e.g. "Startup", "SME", "Enterprise").
    pub scale: String,
}

impl ProductConfig {
    pub fn new(name: impl Into<String>, industry: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            industry: industry.into(),
            geography: "US".to_string(),
            scale: "SME".to_string(),
        }
    }

    pub fn with_geography(mut self, geography: impl Into<String>) -> Self {
        self.geography = geography.into();
        self
    }

    pub fn with_scale(mut self, scale: impl Into<String>) -> Self {
        self.scale = scale.into();
        self
    }

    /// Reject configurations no stage can work with.
    pub fn validate(&self) -> CoreResult<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::InvalidInput("Product name cannot be empty".to_string()));
        }
        if self.industry.trim().is_empty() {
            return Err(CoreError::InvalidInput("Industry cannot be empty".to_string()));
        }
        Ok(())
    }
}

/// Competitors and features the user wants compared, in the order given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonInputs {
    pub competitors: Vec<String>,
    pub features: Vec<String>,
}

impl ComparisonInputs {
    pub fn new(competitors: Vec<String>, features: Vec<String>) -> Self {
        Self {
            competitors,
            features,
        }
    }

    /// Build inputs from free text as typed into a form.
    pub fn from_text(competitors: &str, features: &str) -> Self {
        Self::new(parse_list(competitors), parse_list(features))
    }

    /// Every product that gets scored: the user's product first, then competitors.
    ///
    /// A competitor spelled like the product (ignoring case) is listed once.
    pub fn products<'a>(&'a self, config: &'a ProductConfig) -> Vec<&'a str> {
        let mut seen = HashSet::new();
        std::iter::once(config.name.as_str())
            .chain(self.competitors.iter().map(String::as_str))
            .filter(|name| seen.insert(name.trim().to_lowercase()))
            .collect()
    }

    /// Drop competitors that name the product under study.
    pub fn without_product(mut self, config: &ProductConfig) -> Self {
        let product = config.name.trim().to_lowercase();
        let before = self.competitors.len();
        self.competitors.retain(|c| c.trim().to_lowercase() != product);
        if self.competitors.len() < before {
            warn!("Ignoring competitor '{}': it is the product under study", config.name);
        }
        self
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.competitors.iter().all(|c| c.trim().is_empty()) {
            return Err(CoreError::InvalidInput(
                "Please enter at least 1 competitor".to_string(),
            ));
        }
        if self.features.iter().all(|f| f.trim().is_empty()) {
            return Err(CoreError::InvalidInput(
                "Please enter at least 1 feature".to_string(),
            ));
        }
        if self.features.len() < 3 {
            warn!(
                "Only {} feature(s) given; comparisons work best with 3 or more",
                self.features.len()
            );
        }
        Ok(())
    }
}

/// Split comma- or newline-separated text into a trimmed list.
///
/// Empty items are dropped and case-insensitive duplicates collapse onto the
/// first spelling seen.
pub fn parse_list(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.split(|c| c == ',' || c == '\n')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .filter(|item| seen.insert(item.to_lowercase()))
        .map(str::to_string)
        .collect()
}
