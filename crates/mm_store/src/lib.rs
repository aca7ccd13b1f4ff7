//! # mm_store
//!
//! Output-directory storage for MarketMind artifacts.
//!
//! The dashboard reads these files by name, so every write is atomic: content
//! goes to a temporary file in the same directory and is renamed into place.
//! A reader never observes a half-written artifact.

pub mod error;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use store::ArtifactStore;
