//! Stage orchestrator.
//!
//! Runs the fixed stage sequence strictly in order. Each stage's tasks are
//! prompted, decoded and, on a schema failure, re-prompted with the list of
//! problems until the repair budget is spent. A stage's artifacts are written
//! only once every task in it has validated, so a failed stage never replaces
//! a good file from an earlier run.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use uuid::Uuid;

use mm_agents::{DecodedOutput, PromptBuilder, TaskKind};
use mm_core::{ArtifactName, ComparisonInputs, ProductConfig, RunContext, RunState, Settings, StageId, StageOutput};
use mm_llm::{LlmAdapter, LlmClient, NoSearch, SearchHit, SearchProvider, SerperSearch};
use mm_schema::Expectations;
use mm_store::ArtifactStore;

use crate::error::{PipelineError, PipelineResult};
use crate::policy::RetryPolicy;
use crate::render;
use crate::run_log::RunLog;

/// Options for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Remove the declared artifacts before the first stage
    pub clear_output: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self { clear_output: true }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub state: RunState,
    /// Artifact file name to written path
    pub artifacts: BTreeMap<String, PathBuf>,
    pub warnings: Vec<String>,
}

/// Result of one completed stage.
struct StageResult {
    output: StageOutput,
    written: Vec<(ArtifactName, PathBuf)>,
    warnings: Vec<String>,
}

/// Drives a run through every stage.
pub struct Orchestrator {
    llm: Arc<dyn LlmClient>,
    search: Arc<dyn SearchProvider>,
    policy: RetryPolicy,
    runs_dir: Option<PathBuf>,
}

impl Orchestrator {
    pub fn new(llm: Arc<dyn LlmClient>, search: Arc<dyn SearchProvider>) -> Self {
        Self {
            llm,
            search,
            policy: RetryPolicy::default(),
            runs_dir: None,
        }
    }

    /// Build the production orchestrator from settings and the environment.
    ///
    /// Fails with [`PipelineError::ConfigMissing`] when no LLM key is set.
    pub fn from_settings(settings: &Settings) -> PipelineResult<Self> {
        Self::from_lookup(settings, |key| std::env::var(key).ok())
    }

    pub fn from_lookup(settings: &Settings, lookup: impl Fn(&str) -> Option<String>) -> PipelineResult<Self> {
        let llm = LlmAdapter::from_lookup(settings, &lookup)?;
        info!("Using {} model {}", llm.provider().as_str(), llm.model());

        let timeout = Duration::from_secs(settings.llm_timeout_secs);
        let search: Arc<dyn SearchProvider> = match SerperSearch::from_lookup(&lookup, timeout)? {
            Some(serper) => Arc::new(serper),
            None => {
                info!("SERPER_API_KEY not set; pricing and sentiment run without search evidence");
                Arc::new(NoSearch)
            }
        };

        Ok(Self::new(Arc::new(llm), search)
            .with_policy(RetryPolicy::from_settings(settings))
            .with_run_log_dir(settings.runs_dir()))
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Persist a run log under this directory.
    pub fn with_run_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.runs_dir = Some(dir.into());
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Run every stage and write the artifacts to `store`.
    ///
    /// Returns the written artifacts by file name. On failure, artifacts of
    /// stages that completed stay on disk.
    pub async fn run_analysis(
        &self,
        config: ProductConfig,
        inputs: ComparisonInputs,
        store: &ArtifactStore,
        options: RunOptions,
    ) -> PipelineResult<RunReport> {
        config.validate()?;
        let inputs = inputs.without_product(&config);
        inputs.validate()?;

        if options.clear_output {
            store.clear()?;
        }

        let mut ctx = RunContext::new(config, inputs);
        let mut log = RunLog::new(&ctx, store.root());
        let mut report = RunReport {
            run_id: ctx.run_id,
            state: RunState::Idle,
            artifacts: BTreeMap::new(),
            warnings: Vec::new(),
        };

        info!(
            "Starting run {} for {} ({} competitor(s), {} feature(s))",
            ctx.run_id,
            ctx.config.name,
            ctx.inputs.competitors.len(),
            ctx.inputs.features.len()
        );

        let mut state = RunState::Idle.advance()?;
        while let Some(stage) = state.stage() {
            log.stage_started(stage);
            self.save_log(&log);
            info!("Stage [{}/{}]: {}", stage_number(stage), StageId::default_order().len(), stage);

            let result = match self.run_stage(stage, &ctx, store, &mut log).await {
                Ok(result) => result,
                Err(e) => {
                    error!("{}", e);
                    let aborted = state.abort()?;
                    log.aborted(aborted, &e);
                    self.save_log(&log);
                    return Err(e);
                }
            };

            let mut written = Vec::new();
            for (name, path) in result.written {
                info!("Wrote {:?}", path);
                written.push(name.file_name().to_string());
                report.artifacts.insert(name.file_name().to_string(), path);
            }

            report.warnings.extend(result.warnings.iter().cloned());
            log.stage_completed(stage, written, result.warnings);
            ctx.record(result.output);

            state = state.advance()?;
        }

        log.finished();
        self.save_log(&log);
        report.state = state;
        info!("Run {} completed with {} artifact(s)", ctx.run_id, report.artifacts.len());
        Ok(report)
    }

    /// Run a stage's tasks, then write all of its artifacts together.
    async fn run_stage(
        &self,
        stage: StageId,
        ctx: &RunContext,
        store: &ArtifactStore,
        log: &mut RunLog,
    ) -> PipelineResult<StageResult> {
        let mut output = StageOutput::new(stage);
        let mut warnings = Vec::new();

        for task in TaskKind::for_stage(stage) {
            let evidence = self.gather_evidence(task, ctx).await;
            let expect = Expectations::from_context(ctx).with_evidence(evidence.iter().map(|h| h.url.clone()).collect());

            let (decoded, used) = self.run_task(stage, task, ctx, &evidence, &expect).await?;
            log.task_completed(stage, used);
            for warning in &decoded.warnings {
                warn!("{}: {}", task, warning);
            }
            warnings.extend(decoded.warnings);
            output = output.with_artifact(task.artifact(), decoded.output);
        }

        for (name, derived) in render::derive(stage, &output, ctx)? {
            output = output.with_artifact(name, derived);
        }

        let paths = store
            .write_all(output.artifacts.iter().map(|(name, out)| (*name, out)))
            .map_err(|source| PipelineError::ArtifactWrite { stage, source })?;
        let written = output.artifacts.keys().copied().zip(paths).collect();

        Ok(StageResult { output, written, warnings })
    }

    async fn run_task(
        &self,
        stage: StageId,
        task: TaskKind,
        ctx: &RunContext,
        evidence: &[SearchHit],
        expect: &Expectations,
    ) -> PipelineResult<(DecodedOutput, u32)> {
        let prompts = PromptBuilder::new(ctx);
        let max_attempts = self.policy.max_attempts();
        let mut previous: Option<(String, Vec<String>)> = None;

        for attempt in 1..=max_attempts {
            let request = match &previous {
                None => prompts.request(task, evidence),
                Some((raw, errors)) => prompts.repair_request(task, evidence, raw, errors),
            };

            let response = self
                .llm
                .complete(&request)
                .await
                .map_err(|source| PipelineError::ExternalCallFailure { stage, source })?;

            match task.decode(&response.content, expect) {
                Ok(decoded) => {
                    if attempt > 1 {
                        info!("{} validated after repair (attempt {}/{})", task, attempt, max_attempts);
                    }
                    return Ok((decoded, attempt));
                }
                Err(e) => {
                    let errors = e.messages();
                    warn!(
                        "{} failed validation (attempt {}/{}): {}",
                        task,
                        attempt,
                        max_attempts,
                        errors.join("; ")
                    );
                    previous = Some((response.content, errors));
                }
            }
        }

        Err(PipelineError::StageAborted {
            stage,
            task: task.to_string(),
            attempts: max_attempts,
            errors: previous.map(|(_, errors)| errors).unwrap_or_default(),
        })
    }

    /// Search results for tasks that use evidence. Failures degrade to none.
    async fn gather_evidence(&self, task: TaskKind, ctx: &RunContext) -> Vec<SearchHit> {
        let Some(query) = task.evidence_query(ctx) else {
            return Vec::new();
        };
        match self.search.search(&query).await {
            Ok(hits) => {
                info!("{} search result(s) for {}", hits.len(), task);
                hits
            }
            Err(e) => {
                warn!("Search failed for {}, continuing without evidence: {}", task, e);
                Vec::new()
            }
        }
    }

    fn save_log(&self, log: &RunLog) {
        if let Some(dir) = &self.runs_dir {
            if let Err(e) = log.save(dir) {
                warn!("Could not save run log: {}", e);
            }
        }
    }
}

fn stage_number(stage: StageId) -> usize {
    StageId::default_order().iter().position(|s| *s == stage).map_or(0, |i| i + 1)
}
