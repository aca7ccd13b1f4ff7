//! # mm_schema
//!
//! Strict decoding of LLM responses into typed stage payloads.
//!
//! Every JSON-producing task goes through the same three steps:
//!
//! 1. **Extract** the JSON block from free-form model text
//! 2. **Validate** its structure against the payload's JSON Schema
//! 3. **Check** semantics against the user's request (requested products,
//!    features, score ranges, percentage totals)
//!
//! The result is either a typed payload or a [`DecodeError`] listing the
//! missing and mistyped fields. The validator never repairs data; the caller
//! decides whether to re-prompt or abort.

pub mod error;
pub mod extract;
pub mod markdown;
pub mod payloads;
pub mod validator;

pub use error::{DecodeError, DecodeResult};
pub use extract::extract_json;
pub use markdown::{decode_markdown, MarkdownSchema};
pub use payloads::{
    decode, decode_value, CompetitorPrices, Decoded, Expectations, FeatureScore, FeatureScores, MarketGrowth,
    PriceEntry, SentimentBreakdown, SentimentMetrics, SentimentReport, SentimentSource,
    StagePayload,
};
pub use validator::{FieldError, FieldErrorKind, SchemaValidator, ValidationResult};
