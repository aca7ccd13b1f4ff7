//! Integration tests for the artifact store.

use std::fs;

use serde_json::json;
use tempfile::tempdir;

use mm_core::ArtifactName;
use mm_schema::{SentimentMetrics, SentimentReport};
use mm_store::ArtifactStore;

/// Clearing removes known artifacts and nothing else.
#[test]
fn test_clear_only_known_artifacts() {
    let temp = tempdir().unwrap();
    let store = ArtifactStore::open(temp.path()).unwrap();

    store.write_markdown(ArtifactName::ResearchPlan, "# Plan\n").unwrap();
    store
        .write_json(ArtifactName::FeatureScores, &json!({"scores": []}))
        .unwrap();
    fs::write(temp.path().join("notes.txt"), "keep me").unwrap();

    let removed = store.clear().unwrap();
    assert_eq!(removed, vec![ArtifactName::ResearchPlan, ArtifactName::FeatureScores]);
    assert!(store.list().is_empty());
    assert!(temp.path().join("notes.txt").exists());
}

/// Overwriting replaces the whole file.
#[test]
fn test_overwrite_artifact() {
    let temp = tempdir().unwrap();
    let store = ArtifactStore::open(temp.path()).unwrap();

    store.write_markdown(ArtifactName::FinalReport, "first version, quite long\n").unwrap();
    store.write_markdown(ArtifactName::FinalReport, "second\n").unwrap();
    assert_eq!(store.read_text(ArtifactName::FinalReport).unwrap(), "second\n");
}

/// Verified sentiment wins over metrics.
#[test]
fn test_load_sentiment_prefers_verified() {
    let temp = tempdir().unwrap();
    let store = ArtifactStore::open(temp.path()).unwrap();

    store
        .write_json(
            ArtifactName::SentimentMetrics,
            &json!({"positive": 10, "negative": 10, "neutral": 80}),
        )
        .unwrap();
    assert_eq!(
        store.load_sentiment(),
        SentimentMetrics { positive: 10, negative: 10, neutral: 80 }
    );

    let report: SentimentReport = serde_json::from_value(json!({
        "product": "Acme Widget",
        "sentiment": {"positive": 70, "negative": 20, "neutral": 10},
        "summary": "Well liked.",
        "no_verified_sources": true
    }))
    .unwrap();
    store.write_json(ArtifactName::SentimentVerified, &report).unwrap();

    assert_eq!(
        store.load_sentiment(),
        SentimentMetrics { positive: 70, negative: 20, neutral: 10 }
    );
}

/// Missing or broken sentiment files fall back to zeros.
#[test]
fn test_load_sentiment_fallback() {
    let temp = tempdir().unwrap();
    let store = ArtifactStore::open(temp.path()).unwrap();
    assert_eq!(store.load_sentiment(), SentimentMetrics::default());

    fs::write(store.path_of(ArtifactName::SentimentVerified), "{not json").unwrap();
    assert_eq!(store.load_sentiment(), SentimentMetrics::default());
}
