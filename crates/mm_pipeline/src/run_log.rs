//! Persistent run log.
//!
//! Saved after every state transition to `<runs_dir>/<run_id>.json`, with a
//! copy at `<runs_dir>/latest.json` for `marketmind status`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;
use uuid::Uuid;

use mm_core::{RunContext, RunState, StageId};

use crate::error::{PipelineError, PipelineResult};

const LATEST_FILE: &str = "latest.json";

/// Status of one stage within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Running,
    Completed,
    Aborted,
}

/// Per-stage log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: StageId,
    pub status: StageStatus,
    /// LLM calls made across the stage's tasks
    pub attempts: u32,
    /// File names written by the stage
    pub artifacts: Vec<String>,
    pub warnings: Vec<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl StageRecord {
    fn pending(stage: StageId) -> Self {
        Self {
            stage,
            status: StageStatus::Pending,
            attempts: 0,
            artifacts: Vec::new(),
            warnings: Vec::new(),
            started_at: None,
            completed_at: None,
        }
    }
}

/// Persistent record of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunLog {
    pub run_id: Uuid,
    pub product: String,
    pub output_dir: PathBuf,
    pub state: RunState,
    pub stages: Vec<StageRecord>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Error message if aborted
    pub error: Option<String>,
}

impl RunLog {
    pub fn new(ctx: &RunContext, output_dir: &Path) -> Self {
        Self {
            run_id: ctx.run_id,
            product: ctx.config.name.clone(),
            output_dir: output_dir.to_path_buf(),
            state: RunState::Idle,
            stages: StageId::default_order().into_iter().map(StageRecord::pending).collect(),
            started_at: ctx.started_at,
            completed_at: None,
            error: None,
        }
    }

    pub fn record_mut(&mut self, stage: StageId) -> Option<&mut StageRecord> {
        self.stages.iter_mut().find(|r| r.stage == stage)
    }

    pub fn record(&self, stage: StageId) -> Option<&StageRecord> {
        self.stages.iter().find(|r| r.stage == stage)
    }

    pub fn stage_started(&mut self, stage: StageId) {
        self.state = stage.running_state();
        if let Some(record) = self.record_mut(stage) {
            record.status = StageStatus::Running;
            record.started_at = Some(Utc::now());
        }
    }

    /// Count the LLM calls one task of `stage` used.
    pub fn task_completed(&mut self, stage: StageId, attempts: u32) {
        if let Some(record) = self.record_mut(stage) {
            record.attempts += attempts;
        }
    }

    pub fn stage_completed(&mut self, stage: StageId, artifacts: Vec<String>, warnings: Vec<String>) {
        if let Some(record) = self.record_mut(stage) {
            record.status = StageStatus::Completed;
            record.artifacts = artifacts;
            record.warnings = warnings;
            record.completed_at = Some(Utc::now());
        }
    }

    pub fn aborted(&mut self, state: RunState, error: &PipelineError) {
        if let Some(record) = error.stage().and_then(|s| self.record_mut(s)) {
            record.status = StageStatus::Aborted;
            record.completed_at = Some(Utc::now());
            if let PipelineError::StageAborted { attempts, .. } = error {
                record.attempts += *attempts;
            }
        }
        self.state = state;
        self.error = Some(error.to_string());
        self.completed_at = Some(Utc::now());
    }

    pub fn finished(&mut self) {
        self.state = RunState::Done;
        self.completed_at = Some(Utc::now());
    }

    pub fn file_name(&self) -> String {
        format!("{}.json", self.run_id)
    }

    /// Save under `runs_dir`, updating `latest.json`.
    pub fn save(&self, runs_dir: &Path) -> PipelineResult<()> {
        fs::create_dir_all(runs_dir).map_err(|e| PipelineError::RunLog(e.to_string()))?;
        let json = serde_json::to_string_pretty(self).map_err(|e| PipelineError::RunLog(e.to_string()))?;

        for name in [self.file_name(), LATEST_FILE.to_string()] {
            let path = runs_dir.join(name);
            write_atomic(runs_dir, &path, json.as_bytes())?;
        }
        debug!("Saved run log to {:?}", runs_dir.join(self.file_name()));
        Ok(())
    }

    pub fn load(path: &Path) -> PipelineResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| PipelineError::RunLog(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| PipelineError::RunLog(e.to_string()))
    }

    /// The most recently saved run, if any.
    pub fn latest(runs_dir: &Path) -> PipelineResult<Option<Self>> {
        let path = runs_dir.join(LATEST_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        Self::load(&path).map(Some)
    }
}

fn write_atomic(dir: &Path, path: &Path, content: &[u8]) -> PipelineResult<()> {
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| PipelineError::RunLog(e.to_string()))?;
    tmp.write_all(content).map_err(|e| PipelineError::RunLog(e.to_string()))?;
    tmp.persist(path).map_err(|e| PipelineError::RunLog(e.error.to_string()))?;
    Ok(())
}
