//! End-to-end pipeline runs against a mocked LLM and search provider.

use std::collections::HashSet;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::json;
use tempfile::{tempdir, TempDir};

use mm_core::{ArtifactName, ComparisonInputs, ProductConfig, RunState, StageId};
use mm_llm::{
    CompletionRequest, LlmError, LlmResponse, LlmResult, MockLlmClient, MockSearchProvider, SearchHit,
};
use mm_pipeline::{Orchestrator, PipelineError, RetryPolicy, RunLog, RunOptions, StageStatus};
use mm_schema::{CompetitorPrices, FeatureScores, MarketGrowth, SentimentMetrics, SentimentReport};
use mm_store::ArtifactStore;

const REVIEW_URL: &str = "https://reviews.example/acme-widget";

fn config() -> ProductConfig {
    ProductConfig::new("Acme Widget", "Hardware")
}

fn inputs() -> ComparisonInputs {
    ComparisonInputs::from_text("BetaCo, GammaInc", "Durability, Price")
}

fn search() -> Arc<MockSearchProvider> {
    let mut search = MockSearchProvider::new();
    search.expect_search().returning(|_| {
        Ok(vec![SearchHit {
            title: "Acme Widget long-term review".to_string(),
            snippet: "Solid build, a little expensive.".to_string(),
            url: REVIEW_URL.to_string(),
        }])
    });
    Arc::new(search)
}

/// A valid response for every task, keyed by request tag.
fn respond(request: &CompletionRequest) -> LlmResult<LlmResponse> {
    let body = match request.tag.as_str() {
        "plan/research_plan" => "# Research Plan\n\n## Objectives\nUnderstand hardware buyers and benchmark BetaCo and GammaInc.\n".to_string(),
        "pricing/competitor_pricing" => json!({
            "product": {"name": "Acme Widget", "price": 49.0, "currency": "USD"},
            "competitors": [
                {"name": "BetaCo", "price": 39.5, "currency": "USD", "source": REVIEW_URL},
                {"name": "gammainc", "price": null}
            ]
        })
        .to_string(),
        "features/customer_personas" => "# Customer Personas\n\n## The Weekend Builder\nValues durability over price and buys once.\n".to_string(),
        "features/feature_scores" => {
            let mut scores = Vec::new();
            for product in ["Acme Widget", "betaco", "GammaInc"] {
                for (feature, score) in [("Durability", 8), ("price", 6)] {
                    scores.push(json!({"product": product, "feature": feature, "score": score}));
                }
            }
            format!("```json\n{}\n```", json!({ "scores": scores }))
        }
        "sentiment/review_sentiment" => json!({
            "product": "Acme Widget",
            "sentiment": {"positive": 64, "negative": 21, "neutral": 15},
            "praises": ["Sturdy build"],
            "complaints": ["Price"],
            "summary": "Owners like the build quality but find it pricey.",
            "sources": [
                {"title": "Long-term review", "url": REVIEW_URL},
                {"url": "https://invented.example/review"}
            ],
            "no_verified_sources": false
        })
        .to_string(),
        "growth/growth_projection" => json!({
            "years": [2025, 2026, 2027],
            "growth_percent": [4.2, 4.8, 5.1],
            "rationale": "DIY demand keeps rising."
        })
        .to_string(),
        "synthesis/strategy_synthesis" => [
            "# Final Market Strategy Report",
            "## Executive Summary\nAcme Widget leads on durability.",
            "## Market Overview\nThe segment grows about 5% a year.",
            "## Competitor Insights\nBetaCo undercuts on price.",
            "## Customer Insights\nWeekend builders dominate.",
            "## Sentiment Analysis\n64% of reviews are positive.",
            "## Feature Comparison Summary\nAcme leads durability.",
            "## Strategic Recommendations\nHold price, market longevity.",
        ]
        .join("\n\n"),
        other => return Err(LlmError::Request(format!("unexpected task {}", other))),
    };
    Ok(LlmResponse::text(body))
}

fn valid_llm() -> MockLlmClient {
    let mut llm = MockLlmClient::new();
    llm.expect_complete().returning(respond);
    llm
}

fn setup() -> (TempDir, ArtifactStore) {
    let temp = tempdir().unwrap();
    let store = ArtifactStore::open(temp.path().join("outputs")).unwrap();
    (temp, store)
}

/// A successful run writes exactly one file per declared artifact.
#[tokio::test]
async fn test_full_run_writes_every_artifact() {
    let (temp, store) = setup();
    let runs = temp.path().join("runs");
    let orchestrator = Orchestrator::new(Arc::new(valid_llm()), search()).with_run_log_dir(&runs);

    let report = orchestrator
        .run_analysis(config(), inputs(), &store, RunOptions::default())
        .await
        .unwrap();

    assert_eq!(report.state, RunState::Done);
    assert_eq!(report.artifacts.len(), ArtifactName::all().len());
    assert_eq!(store.list(), ArtifactName::all());
    for name in ArtifactName::all() {
        assert_eq!(report.artifacts[name.file_name()], store.path_of(name));
    }

    let prices: CompetitorPrices = store.read_json(ArtifactName::CompetitorPrices).unwrap();
    let names: Vec<_> = prices.competitors.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["BetaCo", "GammaInc"]);
    assert_eq!(prices.competitors[1].price, None);

    let growth: MarketGrowth = store.read_json(ArtifactName::MarketGrowth).unwrap();
    assert_eq!(growth.years, vec![2025, 2026, 2027]);

    let report_md = store.read_text(ArtifactName::FinalReport).unwrap();
    assert!(report_md.starts_with("# Final Market Strategy Report"));

    let log = RunLog::latest(&runs).unwrap().unwrap();
    assert_eq!(log.run_id, report.run_id);
    assert_eq!(log.state, RunState::Done);
    assert!(log.stages.iter().all(|s| s.status == StageStatus::Completed));
}

/// Scores cover exactly the requested products and features.
#[tokio::test]
async fn test_feature_scores_scenario() {
    let (_temp, store) = setup();
    let orchestrator = Orchestrator::new(Arc::new(valid_llm()), search());
    orchestrator
        .run_analysis(config(), inputs(), &store, RunOptions::default())
        .await
        .unwrap();

    let scores: FeatureScores = store.read_json(ArtifactName::FeatureScores).unwrap();
    assert_eq!(scores.scores.len(), 6);

    let pairs: HashSet<(String, String)> = scores
        .scores
        .iter()
        .map(|s| (s.product.clone(), s.feature.clone()))
        .collect();
    let mut expected = HashSet::new();
    for product in ["Acme Widget", "BetaCo", "GammaInc"] {
        for feature in ["Durability", "Price"] {
            expected.insert((product.to_string(), feature.to_string()));
        }
    }
    assert_eq!(pairs, expected);
    assert!(scores.scores.iter().all(|s| (0.0..=10.0).contains(&s.score)));

    let table = store.read_text(ArtifactName::FeatureComparison).unwrap();
    assert!(table.contains("| Feature | Acme Widget | BetaCo | GammaInc |"));
}

/// The report quotes the same sentiment figures as the JSON.
#[tokio::test]
async fn test_sentiment_figures_agree() {
    let (_temp, store) = setup();
    let orchestrator = Orchestrator::new(Arc::new(valid_llm()), search());
    orchestrator
        .run_analysis(config(), inputs(), &store, RunOptions::default())
        .await
        .unwrap();

    let verified: SentimentReport = store.read_json(ArtifactName::SentimentVerified).unwrap();
    let metrics: SentimentMetrics = store.read_json(ArtifactName::SentimentMetrics).unwrap();
    let markdown = store.read_text(ArtifactName::ReviewSentiment).unwrap();

    assert_eq!(metrics, SentimentMetrics::from(&verified));
    assert!(markdown.contains(&format!("Positive: {}%", verified.sentiment.positive)));
    assert!(markdown.contains(&format!("Negative: {}%", verified.sentiment.negative)));
    assert!(markdown.contains(&format!("Neutral: {}%", verified.sentiment.neutral)));

    assert_eq!(verified.sources.len(), 1);
    assert_eq!(verified.sources[0].url, REVIEW_URL);
    assert!(!verified.no_verified_sources);
    assert_eq!(store.load_sentiment(), metrics);
}

/// Synthesis sees every earlier stage through the run context.
#[tokio::test]
async fn test_synthesis_prompt_carries_context() {
    let (_temp, store) = setup();
    let captured = Arc::new(Mutex::new(String::new()));
    let sink = captured.clone();

    let mut llm = MockLlmClient::new();
    llm.expect_complete().returning(move |request| {
        if request.tag == "synthesis/strategy_synthesis" {
            *sink.lock().unwrap() = request.last_prompt().to_string();
        }
        respond(request)
    });

    Orchestrator::new(Arc::new(llm), search())
        .run_analysis(config(), inputs(), &store, RunOptions::default())
        .await
        .unwrap();

    let prompt = captured.lock().unwrap().clone();
    for name in ["research_plan.md", "competitor_prices.json", "feature_scores.json", "review_sentiment.md", "market_growth.json"] {
        assert!(prompt.contains(&format!("### {}", name)), "missing {} in prompt", name);
    }
    assert!(prompt.contains("Executive Summary"));
}

/// Malformed JSON on both attempts halts the run at pricing.
#[tokio::test]
async fn test_malformed_twice_aborts_at_stage() {
    let (temp, store) = setup();
    let runs = temp.path().join("runs");
    let pricing_calls = Arc::new(AtomicUsize::new(0));
    let counter = pricing_calls.clone();

    let mut llm = MockLlmClient::new();
    llm.expect_complete().returning(move |request| {
        if request.tag == "pricing/competitor_pricing" {
            counter.fetch_add(1, Ordering::SeqCst);
            return Ok(LlmResponse::text("Prices: BetaCo about $40, {broken"));
        }
        respond(request)
    });

    let err = Orchestrator::new(Arc::new(llm), search())
        .with_run_log_dir(&runs)
        .run_analysis(config(), inputs(), &store, RunOptions::default())
        .await
        .unwrap_err();

    match &err {
        PipelineError::StageAborted { stage, task, attempts, errors } => {
            assert_eq!(*stage, StageId::Pricing);
            assert_eq!(task, "competitor_pricing");
            assert_eq!(*attempts, 2);
            assert!(!errors.is_empty());
        }
        other => panic!("expected StageAborted, got {:?}", other),
    }
    assert!(err.to_string().contains("pricing"));
    assert_eq!(pricing_calls.load(Ordering::SeqCst), 2);

    assert_eq!(store.list(), vec![ArtifactName::ResearchPlan]);
    assert!(store.read_text(ArtifactName::ResearchPlan).unwrap().contains("Research Plan"));

    let log = RunLog::latest(&runs).unwrap().unwrap();
    assert_eq!(log.state, RunState::Aborted { stage: StageId::Pricing });
    assert_eq!(log.record(StageId::Plan).unwrap().status, StageStatus::Completed);
    assert_eq!(log.record(StageId::Pricing).unwrap().status, StageStatus::Aborted);
    assert_eq!(log.record(StageId::Features).unwrap().status, StageStatus::Pending);
}

/// A failed stage never overwrites a good artifact from an earlier run.
#[tokio::test]
async fn test_failed_stage_keeps_previous_artifact() {
    let (_temp, store) = setup();
    let previous = json!({
        "product": {"name": "Acme Widget", "price": 45.0},
        "competitors": [{"name": "BetaCo", "price": 35.0}, {"name": "GammaInc", "price": 50.0}]
    });
    store.write_json(ArtifactName::CompetitorPrices, &previous).unwrap();
    let before = store.read_text(ArtifactName::CompetitorPrices).unwrap();

    let mut llm = MockLlmClient::new();
    llm.expect_complete().returning(|request| {
        if request.tag == "pricing/competitor_pricing" {
            return Ok(LlmResponse::text(r#"{"product": {"name": "Acme Widget"}, "competitors": []}"#));
        }
        respond(request)
    });

    let result = Orchestrator::new(Arc::new(llm), search())
        .run_analysis(config(), inputs(), &store, RunOptions { clear_output: false })
        .await;

    assert!(matches!(result, Err(PipelineError::StageAborted { stage: StageId::Pricing, .. })));
    assert_eq!(store.read_text(ArtifactName::CompetitorPrices).unwrap(), before);
}

/// One bad response followed by a valid repair completes the run.
#[tokio::test]
async fn test_repair_prompt_recovers() {
    let (temp, store) = setup();
    let runs = temp.path().join("runs");

    let mut llm = MockLlmClient::new();
    llm.expect_complete().returning(|request| {
        let is_repair = request.messages.len() > 1;
        if request.tag == "pricing/competitor_pricing" && !is_repair {
            return Ok(LlmResponse::text(
                json!({"product": {"name": "Acme Widget", "price": 49}, "competitors": [{"name": "BetaCo", "price": 39}]})
                    .to_string(),
            ));
        }
        if request.tag == "pricing/competitor_pricing" {
            assert!(request.last_prompt().contains("GammaInc"));
        }
        respond(request)
    });

    let report = Orchestrator::new(Arc::new(llm), search())
        .with_run_log_dir(&runs)
        .run_analysis(config(), inputs(), &store, RunOptions::default())
        .await
        .unwrap();

    assert_eq!(report.state, RunState::Done);
    let log = RunLog::latest(&runs).unwrap().unwrap();
    assert_eq!(log.record(StageId::Pricing).unwrap().attempts, 2);
    assert_eq!(log.record(StageId::Plan).unwrap().attempts, 1);
}

/// With no repairs allowed the first failure aborts.
#[tokio::test]
async fn test_zero_repairs() {
    let (_temp, store) = setup();

    let mut llm = MockLlmClient::new();
    llm.expect_complete().times(2).returning(|request| {
        if request.tag == "pricing/competitor_pricing" {
            return Ok(LlmResponse::text("not json"));
        }
        respond(request)
    });

    let err = Orchestrator::new(Arc::new(llm), search())
        .with_policy(RetryPolicy::new(0))
        .run_analysis(config(), inputs(), &store, RunOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::StageAborted { attempts: 1, .. }));
}

/// LLM call failures surface immediately with the stage name.
#[tokio::test]
async fn test_external_call_failure() {
    let (_temp, store) = setup();

    let mut llm = MockLlmClient::new();
    llm.expect_complete().times(2).returning(|request| {
        if request.tag == "pricing/competitor_pricing" {
            return Err(LlmError::Api {
                provider: "OpenAI".to_string(),
                status: 401,
                body: "invalid key".to_string(),
            });
        }
        respond(request)
    });

    let err = Orchestrator::new(Arc::new(llm), search())
        .run_analysis(config(), inputs(), &store, RunOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::ExternalCallFailure { stage: StageId::Pricing, .. }));
    assert_eq!(err.stage(), Some(StageId::Pricing));
    assert_eq!(store.list(), vec![ArtifactName::ResearchPlan]);
}

/// Search outages degrade to unverified sentiment instead of failing.
#[tokio::test]
async fn test_search_failure_degrades() {
    let (_temp, store) = setup();

    let mut search = MockSearchProvider::new();
    search
        .expect_search()
        .returning(|_| Err(LlmError::Request("connection reset".to_string())));

    Orchestrator::new(Arc::new(valid_llm()), Arc::new(search))
        .run_analysis(config(), inputs(), &store, RunOptions::default())
        .await
        .unwrap();

    let verified: SentimentReport = store.read_json(ArtifactName::SentimentVerified).unwrap();
    assert!(verified.sources.is_empty());
    assert!(verified.no_verified_sources);
    assert!(store
        .read_text(ArtifactName::ReviewSentiment)
        .unwrap()
        .contains("No verified sources"));
}

/// Invalid inputs are rejected before any LLM call or file change.
#[tokio::test]
async fn test_invalid_input_touches_nothing() {
    let (_temp, store) = setup();
    store.write_markdown(ArtifactName::ResearchPlan, "# Old plan\n").unwrap();

    let mut llm = MockLlmClient::new();
    llm.expect_complete().never();

    let err = Orchestrator::new(Arc::new(llm), search())
        .run_analysis(config(), ComparisonInputs::from_text("", "Durability"), &store, RunOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::InvalidInput(_)));
    assert_eq!(store.read_text(ArtifactName::ResearchPlan).unwrap(), "# Old plan\n");
}

/// Clearing at run start removes stale artifacts from an earlier run.
#[tokio::test]
async fn test_run_start_clears_stale_artifacts() {
    let (_temp, store) = setup();
    store.write_markdown(ArtifactName::FinalReport, "# Stale report\n").unwrap();
    fs::write(store.root().join("notes.txt"), "mine").unwrap();

    let mut llm = MockLlmClient::new();
    llm.expect_complete().returning(|request| {
        if request.tag == "plan/research_plan" {
            return Err(LlmError::Request("offline".to_string()));
        }
        respond(request)
    });

    let result = Orchestrator::new(Arc::new(llm), search())
        .run_analysis(config(), inputs(), &store, RunOptions::default())
        .await;

    assert!(result.is_err());
    assert!(store.list().is_empty());
    assert!(store.root().join("notes.txt").exists());
}

/// A competitor spelled like the product is scored once.
#[tokio::test]
async fn test_product_listed_as_competitor() {
    let (_temp, store) = setup();
    let inputs = ComparisonInputs::from_text("acme widget, BetaCo, GammaInc", "Durability, Price");

    Orchestrator::new(Arc::new(valid_llm()), search())
        .run_analysis(config(), inputs, &store, RunOptions::default())
        .await
        .unwrap();

    let scores: FeatureScores = store.read_json(ArtifactName::FeatureScores).unwrap();
    assert_eq!(scores.scores.len(), 6);
    let products: HashSet<_> = scores.scores.iter().map(|s| s.product.as_str()).collect();
    assert_eq!(products, HashSet::from(["Acme Widget", "BetaCo", "GammaInc"]));

    let table = store.read_text(ArtifactName::FeatureComparison).unwrap();
    assert!(table.contains("| Feature | Acme Widget | BetaCo | GammaInc |"));
}

/// A write failure after validation aborts the stage it belongs to.
#[tokio::test]
async fn test_write_failure_aborts_stage() {
    let (temp, store) = setup();
    let runs = temp.path().join("runs");
    fs::create_dir(store.path_of(ArtifactName::CompetitorPrices)).unwrap();

    let err = Orchestrator::new(Arc::new(valid_llm()), search())
        .with_run_log_dir(&runs)
        .run_analysis(config(), inputs(), &store, RunOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::ArtifactWrite { stage: StageId::Pricing, .. }));
    assert_eq!(err.stage(), Some(StageId::Pricing));
    assert!(err.to_string().contains("pricing"));

    let log = RunLog::latest(&runs).unwrap().unwrap();
    assert_eq!(log.state, RunState::Aborted { stage: StageId::Pricing });
    assert_eq!(log.record(StageId::Pricing).unwrap().status, StageStatus::Aborted);
    assert!(log.error.is_some());
    assert_eq!(store.list(), vec![ArtifactName::ResearchPlan]);
}

/// Attempts of every task in an aborted stage are counted.
#[tokio::test]
async fn test_aborted_stage_counts_all_tasks() {
    let (temp, store) = setup();
    let runs = temp.path().join("runs");

    let mut llm = MockLlmClient::new();
    llm.expect_complete().returning(|request| {
        if request.tag == "features/feature_scores" {
            return Ok(LlmResponse::text(r#"{"scores": []}"#));
        }
        respond(request)
    });

    let err = Orchestrator::new(Arc::new(llm), search())
        .with_run_log_dir(&runs)
        .run_analysis(config(), inputs(), &store, RunOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::StageAborted { stage: StageId::Features, attempts: 2, .. }));
    let log = RunLog::latest(&runs).unwrap().unwrap();
    let features = log.record(StageId::Features).unwrap();
    assert_eq!(features.status, StageStatus::Aborted);
    assert_eq!(features.attempts, 3);
    assert!(!store.exists(ArtifactName::CustomerAnalysis));
}
