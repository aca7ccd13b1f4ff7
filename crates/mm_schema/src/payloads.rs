//! Typed payloads for JSON artifacts.
//!
//! Each payload declares a JSON Schema for structure and a semantic check
//! against the user's request. Decoding also canonicalises product and feature
//! names to the user's spelling so the dashboard can match them exactly.

use std::collections::{HashMap, HashSet};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use mm_core::{ComparisonInputs, ProductConfig, RunContext};

use crate::error::DecodeError;
use crate::extract::extract_json;
use crate::validator::{FieldError, SchemaValidator, ValidationResult};

/// Allowed deviation of the sentiment total from 100, for rounding.
const SENTIMENT_TOTAL_TOLERANCE: u32 = 1;

/// What the user asked for, used for semantic checks.
#[derive(Debug, Clone, Default)]
pub struct Expectations {
    pub product: String,
    pub competitors: Vec<String>,
    pub features: Vec<String>,
    /// URLs supplied to the model as evidence; sources outside this set are dropped
    pub evidence_urls: Vec<String>,
}

impl Expectations {
    pub fn new(config: &ProductConfig, inputs: &ComparisonInputs) -> Self {
        Self {
            product: config.name.clone(),
            competitors: inputs.products(config).into_iter().skip(1).map(str::to_string).collect(),
            features: inputs.features.clone(),
            evidence_urls: Vec::new(),
        }
    }

    pub fn from_context(ctx: &RunContext) -> Self {
        Self::new(&ctx.config, &ctx.inputs)
    }

    pub fn with_evidence(mut self, urls: Vec<String>) -> Self {
        self.evidence_urls = urls;
        self
    }

    /// Product first, then competitors, each name once.
    pub fn products(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        std::iter::once(self.product.as_str())
            .chain(self.competitors.iter().map(String::as_str))
            .filter(|name| seen.insert(key(name)))
            .collect()
    }
}

/// A JSON artifact with a schema and semantic checks.
pub trait StagePayload: Serialize + DeserializeOwned + Sized {
    /// JSON Schema for the structural check.
    fn json_schema() -> Value;

    /// Checks against the request that JSON Schema cannot express.
    fn check(&self, _expect: &Expectations) -> ValidationResult {
        ValidationResult::new()
    }

    /// Canonicalise a payload that passed `check`.
    fn normalize(self, _expect: &Expectations) -> Self {
        self
    }
}

/// A successfully decoded payload plus non-fatal findings.
#[derive(Debug, Clone)]
pub struct Decoded<T> {
    pub payload: T,
    pub warnings: Vec<String>,
}

/// Decode model text into a typed payload.
pub fn decode<T: StagePayload>(raw: &str, expect: &Expectations) -> Result<Decoded<T>, DecodeError> {
    let value = extract_json(raw).map_err(DecodeError::Parse)?;
    decode_value(value, expect)
}

/// Decode an already-parsed value into a typed payload.
pub fn decode_value<T: StagePayload>(value: Value, expect: &Expectations) -> Result<Decoded<T>, DecodeError> {
    let mut result = SchemaValidator::validate(&value, &T::json_schema());
    if !result.valid {
        debug!("Schema check failed with {} error(s)", result.errors.len());
        return Err(DecodeError::Invalid(result));
    }

    let payload: T = serde_json::from_value(value).map_err(|e| DecodeError::Parse(e.to_string()))?;

    result.merge(payload.check(expect));
    if !result.valid {
        debug!("Semantic check failed with {} error(s)", result.errors.len());
        return Err(DecodeError::Invalid(result));
    }

    Ok(Decoded {
        payload: payload.normalize(expect),
        warnings: result.warnings,
    })
}

/// Map lowercase names to the user's spelling.
fn canonical_names<'a>(names: impl IntoIterator<Item = &'a str>) -> HashMap<String, &'a str> {
    names.into_iter().map(|n| (key(n), n)).collect()
}

fn key(name: &str) -> String {
    name.trim().to_lowercase()
}

// ---------------------------------------------------------------------------
// competitor_prices.json
// ---------------------------------------------------------------------------

/// One priced product. `price` is `None` when it could not be verified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceEntry {
    pub name: String,
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorPrices {
    pub product: PriceEntry,
    pub competitors: Vec<PriceEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

fn price_entry_schema() -> Value {
    json!({
        "type": "object",
        "required": ["name", "price"],
        "properties": {
            "name": {"type": "string", "minLength": 1},
            "price": {"type": ["number", "null"], "minimum": 0},
            "currency": {"type": ["string", "null"]},
            "source": {"type": ["string", "null"]}
        }
    })
}

impl StagePayload for CompetitorPrices {
    fn json_schema() -> Value {
        json!({
            "type": "object",
            "required": ["product", "competitors"],
            "properties": {
                "product": price_entry_schema(),
                "competitors": {"type": "array", "items": price_entry_schema()},
                "notes": {"type": ["string", "null"]}
            }
        })
    }

    fn check(&self, expect: &Expectations) -> ValidationResult {
        let mut result = ValidationResult::new();
        let returned: HashSet<String> = self.competitors.iter().map(|c| key(&c.name)).collect();

        for competitor in &expect.competitors {
            if !returned.contains(&key(competitor)) {
                result.add_error(FieldError::missing(
                    "/competitors",
                    format!("Missing requested competitor '{}'", competitor),
                ));
            }
        }

        let requested = canonical_names(expect.competitors.iter().map(String::as_str));
        for entry in &self.competitors {
            if !requested.contains_key(&key(&entry.name)) {
                result.add_warning(format!("Dropping unrequested competitor '{}'", entry.name));
            }
        }

        result
    }

    fn normalize(mut self, expect: &Expectations) -> Self {
        self.product.name = expect.product.clone();

        let mut by_key: HashMap<String, PriceEntry> = HashMap::new();
        for entry in self.competitors {
            by_key.entry(key(&entry.name)).or_insert(entry);
        }
        self.competitors = expect
            .competitors
            .iter()
            .filter_map(|name| {
                by_key.remove(&key(name)).map(|mut entry| {
                    entry.name = name.clone();
                    entry
                })
            })
            .collect();
        self
    }
}

// ---------------------------------------------------------------------------
// feature_scores.json
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureScore {
    pub product: String,
    pub feature: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureScores {
    pub scores: Vec<FeatureScore>,
}

impl FeatureScores {
    /// Score for a (product, feature) pair, matched case-insensitively.
    pub fn score(&self, product: &str, feature: &str) -> Option<f64> {
        self.scores
            .iter()
            .find(|s| key(&s.product) == key(product) && key(&s.feature) == key(feature))
            .map(|s| s.score)
    }
}

impl StagePayload for FeatureScores {
    fn json_schema() -> Value {
        json!({
            "type": "object",
            "required": ["scores"],
            "properties": {
                "scores": {
                    "type": "array",
                    "minItems": 1,
                    "items": {
                        "type": "object",
                        "required": ["product", "feature", "score"],
                        "properties": {
                            "product": {"type": "string"},
                            "feature": {"type": "string"},
                            "score": {"type": "number", "minimum": 0, "maximum": 10}
                        }
                    }
                }
            }
        })
    }

    fn check(&self, expect: &Expectations) -> ValidationResult {
        let mut result = ValidationResult::new();
        let products = canonical_names(expect.products());
        let features = canonical_names(expect.features.iter().map(String::as_str));
        let mut seen = HashSet::new();

        for (i, entry) in self.scores.iter().enumerate() {
            let (p, f) = (key(&entry.product), key(&entry.feature));
            if !products.contains_key(&p) {
                result.add_error(FieldError::unexpected(
                    format!("/scores/{}/product", i),
                    format!("'{}' is not the product or a requested competitor", entry.product),
                ));
            }
            if !features.contains_key(&f) {
                result.add_error(FieldError::unexpected(
                    format!("/scores/{}/feature", i),
                    format!("'{}' is not a requested feature", entry.feature),
                ));
            }
            if !entry.score.is_finite() {
                result.add_error(FieldError::out_of_range(
                    format!("/scores/{}/score", i),
                    "Score must be a finite number",
                ));
            }
            if !seen.insert((p, f)) {
                result.add_error(FieldError::invalid(
                    format!("/scores/{}", i),
                    format!("Duplicate score for ({}, {})", entry.product, entry.feature),
                ));
            }
        }

        for product in expect.products() {
            for feature in &expect.features {
                if !seen.contains(&(key(product), key(feature))) {
                    result.add_error(FieldError::missing(
                        "/scores",
                        format!("Missing score for ({}, {})", product, feature),
                    ));
                }
            }
        }

        result
    }

    fn normalize(self, expect: &Expectations) -> Self {
        let mut scores = Vec::with_capacity(self.scores.len());
        for product in expect.products() {
            for feature in &expect.features {
                if let Some(score) = self.score(product, feature) {
                    scores.push(FeatureScore {
                        product: product.to_string(),
                        feature: feature.clone(),
                        score,
                    });
                }
            }
        }
        Self { scores }
    }
}

// ---------------------------------------------------------------------------
// sentiment_verified.json / sentiment_metrics.json
// ---------------------------------------------------------------------------

/// Integer percentages of review sentiment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentBreakdown {
    pub positive: u32,
    pub negative: u32,
    pub neutral: u32,
}

impl SentimentBreakdown {
    pub fn total(&self) -> u32 {
        self.positive + self.negative + self.neutral
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub url: String,
}

/// The sentiment source of truth consumed by both chart and report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentReport {
    pub product: String,
    pub sentiment: SentimentBreakdown,
    #[serde(default)]
    pub praises: Vec<String>,
    #[serde(default)]
    pub complaints: Vec<String>,
    pub summary: String,
    #[serde(default)]
    pub sources: Vec<SentimentSource>,
    #[serde(default)]
    pub no_verified_sources: bool,
}

fn percentage_schema() -> Value {
    json!({"type": "integer", "minimum": 0, "maximum": 100})
}

impl StagePayload for SentimentReport {
    fn json_schema() -> Value {
        json!({
            "type": "object",
            "required": ["product", "sentiment", "summary"],
            "properties": {
                "product": {"type": "string"},
                "sentiment": {
                    "type": "object",
                    "required": ["positive", "negative", "neutral"],
                    "properties": {
                        "positive": percentage_schema(),
                        "negative": percentage_schema(),
                        "neutral": percentage_schema()
                    }
                },
                "praises": {"type": "array", "items": {"type": "string"}},
                "complaints": {"type": "array", "items": {"type": "string"}},
                "summary": {"type": "string", "minLength": 1},
                "sources": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["url"],
                        "properties": {
                            "title": {"type": ["string", "null"]},
                            "url": {"type": "string"}
                        }
                    }
                },
                "no_verified_sources": {"type": "boolean"}
            }
        })
    }

    fn check(&self, _expect: &Expectations) -> ValidationResult {
        let mut result = ValidationResult::new();
        let total = self.sentiment.total();
        if total.abs_diff(100) > SENTIMENT_TOTAL_TOLERANCE {
            result.add_error(FieldError::invalid(
                "/sentiment",
                format!("Percentages must sum to 100 (got {})", total),
            ));
        }
        result
    }

    fn normalize(mut self, expect: &Expectations) -> Self {
        self.product = expect.product.clone();
        let allowed: HashSet<&str> = expect.evidence_urls.iter().map(String::as_str).collect();
        self.sources.retain(|s| allowed.contains(s.url.as_str()));
        self.no_verified_sources = self.sources.is_empty();
        self
    }
}

/// Flat projection of [`SentimentReport`] for simple chart readers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentMetrics {
    pub positive: u32,
    pub negative: u32,
    pub neutral: u32,
}

impl From<&SentimentReport> for SentimentMetrics {
    fn from(report: &SentimentReport) -> Self {
        Self {
            positive: report.sentiment.positive,
            negative: report.sentiment.negative,
            neutral: report.sentiment.neutral,
        }
    }
}

impl StagePayload for SentimentMetrics {
    fn json_schema() -> Value {
        json!({
            "type": "object",
            "required": ["positive", "negative", "neutral"],
            "properties": {
                "positive": percentage_schema(),
                "negative": percentage_schema(),
                "neutral": percentage_schema()
            }
        })
    }
}

// ---------------------------------------------------------------------------
// market_growth.json
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketGrowth {
    pub years: Vec<i32>,
    pub growth_percent: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl StagePayload for MarketGrowth {
    fn json_schema() -> Value {
        json!({
            "type": "object",
            "required": ["years", "growth_percent"],
            "properties": {
                "years": {"type": "array", "minItems": 1, "items": {"type": "integer"}},
                "growth_percent": {"type": "array", "minItems": 1, "items": {"type": "number"}},
                "rationale": {"type": ["string", "null"]}
            }
        })
    }

    fn check(&self, _expect: &Expectations) -> ValidationResult {
        let mut result = ValidationResult::new();
        if self.years.len() != self.growth_percent.len() {
            result.add_error(FieldError::invalid(
                "/growth_percent",
                format!(
                    "Expected one value per year ({} years, {} values)",
                    self.years.len(),
                    self.growth_percent.len()
                ),
            ));
        }
        if self.years.windows(2).any(|w| w[0] >= w[1]) {
            result.add_error(FieldError::invalid("/years", "Years must be strictly increasing"));
        }
        if self.rationale.as_deref().map_or(true, |r| r.trim().is_empty()) {
            result.add_warning("Growth projection has no rationale");
        }
        result
    }
}
