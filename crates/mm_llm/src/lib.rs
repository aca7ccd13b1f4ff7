//! # mm_llm
//!
//! External collaborators of the pipeline: the LLM and the optional web
//! search used as evidence for pricing and sentiment.
//!
//! Both sit behind traits ([`LlmClient`], [`SearchProvider`]) so the pipeline
//! can be driven by mocks in tests. With the `mock` feature the generated
//! `MockLlmClient` and `MockSearchProvider` are exported for other crates.

pub mod adapter;
pub mod client;
pub mod error;
pub mod search;

pub use adapter::{LlmAdapter, LlmProvider};
pub use client::{ChatMessage, CompletionRequest, LlmClient, LlmResponse, MessageRole};
pub use error::{LlmError, LlmResult};
pub use search::{NoSearch, SearchHit, SearchProvider, SerperSearch};

#[cfg(any(test, feature = "mock"))]
pub use client::MockLlmClient;
#[cfg(any(test, feature = "mock"))]
pub use search::MockSearchProvider;
