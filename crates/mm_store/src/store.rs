//! Artifact store rooted at the output directory.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use mm_core::{ArtifactName, TaskOutput};
use mm_schema::{SentimentMetrics, SentimentReport};

use crate::error::{StoreError, StoreResult};

/// Reads and writes the fixed set of artifacts in one output directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Open a store, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Handle on a directory without creating it. Used by read-only views.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, name: ArtifactName) -> PathBuf {
        self.root.join(name.file_name())
    }

    pub fn exists(&self, name: ArtifactName) -> bool {
        self.path_of(name).is_file()
    }

    /// Write a validated task output in its artifact's format.
    pub fn write(&self, name: ArtifactName, output: &TaskOutput) -> StoreResult<PathBuf> {
        match output {
            TaskOutput::Json(value) => self.write_json(name, value),
            TaskOutput::Markdown(text) => self.write_markdown(name, text),
        }
    }

    /// Write a JSON artifact, pretty-printed.
    pub fn write_json<T: Serialize + ?Sized>(&self, name: ArtifactName, value: &T) -> StoreResult<PathBuf> {
        self.write_atomic(name, json_bytes(value)?.as_slice())
    }

    /// Write several artifacts as one unit.
    ///
    /// Every file is staged next to its target before any rename, so a
    /// failure while staging leaves all of the targets untouched.
    pub fn write_all<'a>(
        &self,
        artifacts: impl IntoIterator<Item = (ArtifactName, &'a TaskOutput)>,
    ) -> StoreResult<Vec<PathBuf>> {
        let mut staged = Vec::new();
        for (name, output) in artifacts {
            let content = match output {
                TaskOutput::Json(value) => json_bytes(value)?,
                TaskOutput::Markdown(text) => text.as_bytes().to_vec(),
            };
            let path = self.path_of(name);
            staged.push((self.stage_file(&path, &content)?, path));
        }

        let mut written = Vec::with_capacity(staged.len());
        for (tmp, path) in staged {
            commit(tmp, &path)?;
            debug!("Wrote artifact {:?}", path);
            written.push(path);
        }
        Ok(written)
    }

    pub fn write_markdown(&self, name: ArtifactName, text: &str) -> StoreResult<PathBuf> {
        self.write_atomic(name, text.as_bytes())
    }

    pub fn read_text(&self, name: ArtifactName) -> StoreResult<String> {
        let path = self.path_of(name);
        if !path.is_file() {
            return Err(StoreError::NotFound(name.file_name().to_string()));
        }
        Ok(fs::read_to_string(path)?)
    }

    pub fn read_json<T: DeserializeOwned>(&self, name: ArtifactName) -> StoreResult<T> {
        let content = self.read_text(name)?;
        serde_json::from_str(&content).map_err(|e| StoreError::Malformed {
            name: name.file_name().to_string(),
            message: e.to_string(),
        })
    }

    /// Artifacts currently present, in pipeline order.
    pub fn list(&self) -> Vec<ArtifactName> {
        ArtifactName::all().into_iter().filter(|n| self.exists(*n)).collect()
    }

    /// Remove the known artifacts. Other files in the directory are left alone.
    pub fn clear(&self) -> StoreResult<Vec<ArtifactName>> {
        let mut removed = Vec::new();
        for name in self.list() {
            fs::remove_file(self.path_of(name))?;
            removed.push(name);
        }
        if !removed.is_empty() {
            info!("Cleared {} artifact(s) from {:?}", removed.len(), self.root);
        }
        Ok(removed)
    }

    /// Sentiment percentages for the chart.
    ///
    /// Reads `sentiment_verified.json` first, then `sentiment_metrics.json`,
    /// and falls back to zeros when neither is usable.
    pub fn load_sentiment(&self) -> SentimentMetrics {
        match self.read_json::<SentimentReport>(ArtifactName::SentimentVerified) {
            Ok(report) => return SentimentMetrics::from(&report),
            Err(StoreError::NotFound(_)) => {}
            Err(e) => warn!("Ignoring unreadable verified sentiment: {}", e),
        }

        match self.read_json::<SentimentMetrics>(ArtifactName::SentimentMetrics) {
            Ok(metrics) => metrics,
            Err(StoreError::NotFound(_)) => SentimentMetrics::default(),
            Err(e) => {
                warn!("Ignoring unreadable sentiment metrics: {}", e);
                SentimentMetrics::default()
            }
        }
    }

    fn write_atomic(&self, name: ArtifactName, content: &[u8]) -> StoreResult<PathBuf> {
        let path = self.path_of(name);
        debug!("Writing artifact to {:?}", path);

        let tmp = self.stage_file(&path, content)?;
        commit(tmp, &path)?;
        Ok(path)
    }

    /// Temp file in the store holding `content`, synced to disk.
    fn stage_file(&self, target: &Path, content: &[u8]) -> StoreResult<NamedTempFile> {
        if target.exists() && !target.is_file() {
            return Err(StoreError::Write {
                path: target.to_path_buf(),
                message: "target exists and is not a regular file".to_string(),
            });
        }
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(content)?;
        tmp.as_file().sync_all()?;
        Ok(tmp)
    }
}

fn commit(tmp: NamedTempFile, path: &Path) -> StoreResult<()> {
    tmp.persist(path).map_err(|e| StoreError::Write {
        path: path.to_path_buf(),
        message: e.error.to_string(),
    })?;
    Ok(())
}

fn json_bytes<T: Serialize + ?Sized>(value: &T) -> StoreResult<Vec<u8>> {
    let mut content = serde_json::to_string_pretty(value)?;
    content.push('\n');
    Ok(content.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_directory() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("nested").join("outputs");
        let store = ArtifactStore::open(&root).unwrap();
        assert!(root.is_dir());
        assert_eq!(store.path_of(ArtifactName::MarketGrowth), root.join("market_growth.json"));
    }

    #[test]
    fn test_write_leaves_no_temp_files() {
        let temp = TempDir::new().unwrap();
        let store = ArtifactStore::open(temp.path()).unwrap();
        store
            .write(ArtifactName::MarketGrowth, &TaskOutput::Json(json!({"years": [2024]})))
            .unwrap();
        store
            .write(ArtifactName::ResearchPlan, &TaskOutput::Markdown("# Plan\n".into()))
            .unwrap();

        let mut files: Vec<_> = fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        files.sort();
        assert_eq!(files, vec!["market_growth.json", "research_plan.md"]);
    }

    #[test]
    fn test_write_all_stages_before_replacing() {
        let temp = TempDir::new().unwrap();
        let store = ArtifactStore::open(temp.path()).unwrap();
        store.write_markdown(ArtifactName::FeatureComparison, "# Old table\n").unwrap();
        fs::create_dir(store.path_of(ArtifactName::FeatureScores)).unwrap();

        let scores = TaskOutput::Json(json!({"scores": []}));
        let table = TaskOutput::Markdown("# New table\n".into());
        let result = store.write_all([
            (ArtifactName::FeatureComparison, &table),
            (ArtifactName::FeatureScores, &scores),
        ]);

        assert!(matches!(result, Err(StoreError::Write { .. })));
        assert_eq!(store.read_text(ArtifactName::FeatureComparison).unwrap(), "# Old table\n");
    }

    #[test]
    fn test_write_all_writes_every_file() {
        let temp = TempDir::new().unwrap();
        let store = ArtifactStore::open(temp.path()).unwrap();
        let metrics = TaskOutput::Json(json!({"positive": 60, "negative": 25, "neutral": 15}));
        let report = TaskOutput::Markdown("# Sentiment\n".into());

        let written = store
            .write_all([
                (ArtifactName::SentimentMetrics, &metrics),
                (ArtifactName::ReviewSentiment, &report),
            ])
            .unwrap();

        assert_eq!(written.len(), 2);
        assert_eq!(store.list(), vec![ArtifactName::SentimentMetrics, ArtifactName::ReviewSentiment]);
    }

    #[test]
    fn test_at_does_not_create() {
        let temp = TempDir::new().unwrap();
        let store = ArtifactStore::at(temp.path().join("missing"));
        assert!(store.list().is_empty());
        assert!(!store.root().exists());
    }

    #[test]
    fn test_read_missing() {
        let temp = TempDir::new().unwrap();
        let store = ArtifactStore::open(temp.path()).unwrap();
        assert!(matches!(
            store.read_text(ArtifactName::FinalReport),
            Err(StoreError::NotFound(_))
        ));
    }
}
