//! Layered settings.
//!
//! Resolution order, lowest to highest precedence:
//! 1. Built-in defaults
//! 2. `.marketmind/settings.json` under the workspace root
//! 3. Environment variables (`MARKETMIND_*`)
//!
//! CLI flags are applied on top by the binary.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, CoreResult};

pub const ENV_OUTPUT_DIR: &str = "MARKETMIND_OUTPUT_DIR";
pub const ENV_MAX_REPAIRS: &str = "MARKETMIND_MAX_REPAIRS";
pub const ENV_LLM_PROVIDER: &str = "MARKETMIND_LLM_PROVIDER";
pub const ENV_LLM_MODEL: &str = "MARKETMIND_LLM_MODEL";
pub const ENV_LLM_TIMEOUT: &str = "MARKETMIND_LLM_TIMEOUT_SECS";

/// Which hosted model API to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderKind {
    OpenAI,
    Anthropic,
}

impl LlmProviderKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Some(Self::OpenAI),
            "anthropic" => Some(Self::Anthropic),
            _ => None,
        }
    }
}

/// Contents of `.marketmind/settings.json`. All fields optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    output_dir: Option<PathBuf>,
    max_repairs: Option<u32>,
    default_provider: Option<String>,
    default_model: Option<String>,
    timeout_secs: Option<u64>,
}

/// Resolved settings for one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    /// Workspace root all relative paths resolve against
    pub workspace_root: PathBuf,
    /// Directory the dashboard reads artifacts from
    pub output_dir: PathBuf,
    /// Repair re-prompts allowed per task after a schema failure
    pub max_repair_attempts: u32,
    /// Preferred provider; `None` means first configured key wins
    pub llm_provider: Option<LlmProviderKind>,
    pub llm_model: Option<String>,
    pub llm_timeout_secs: u64,
}

impl Settings {
    pub fn defaults(workspace_root: impl Into<PathBuf>) -> Self {
        let workspace_root = workspace_root.into();
        Self {
            output_dir: workspace_root.join("outputs"),
            workspace_root,
            max_repair_attempts: 1,
            llm_provider: None,
            llm_model: None,
            llm_timeout_secs: 120,
        }
    }

    /// Load settings for a workspace from the settings file and process environment.
    pub fn load(workspace_root: &Path) -> CoreResult<Self> {
        let mut settings = Self::defaults(workspace_root);
        settings.apply_file(&Self::settings_path(workspace_root))?;
        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    pub fn settings_path(workspace_root: &Path) -> PathBuf {
        workspace_root.join(".marketmind").join("settings.json")
    }

    /// Directory holding run logs.
    pub fn runs_dir(&self) -> PathBuf {
        self.workspace_root.join(".marketmind").join("runs")
    }

    pub fn with_output_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.output_dir = self.resolve(dir.as_ref());
        self
    }

    pub fn with_max_repairs(mut self, attempts: u32) -> Self {
        self.max_repair_attempts = attempts;
        self
    }

    fn apply_file(&mut self, path: &Path) -> CoreResult<()> {
        if !path.exists() {
            return Ok(());
        }
        debug!("Loading settings from {:?}", path);
        let content = std::fs::read_to_string(path)?;
        let file: SettingsFile =
            serde_json::from_str(&content).map_err(|e| CoreError::InvalidSettings {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        if let Some(dir) = file.output_dir {
            self.output_dir = self.resolve(&dir);
        }
        if let Some(n) = file.max_repairs {
            self.max_repair_attempts = n;
        }
        if let Some(provider) = file.default_provider.as_deref().and_then(LlmProviderKind::parse) {
            self.llm_provider = Some(provider);
        }
        if file.default_model.is_some() {
            self.llm_model = file.default_model;
        }
        if let Some(secs) = file.timeout_secs {
            self.llm_timeout_secs = secs;
        }
        Ok(())
    }

    /// Apply `MARKETMIND_*` overrides from a variable lookup.
    ///
    /// Unparseable numeric values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = lookup(ENV_OUTPUT_DIR) {
            self.output_dir = self.resolve(Path::new(&dir));
        }
        if let Some(n) = lookup(ENV_MAX_REPAIRS).and_then(|v| v.trim().parse().ok()) {
            self.max_repair_attempts = n;
        }
        if let Some(provider) = lookup(ENV_LLM_PROVIDER).and_then(|v| LlmProviderKind::parse(&v)) {
            self.llm_provider = Some(provider);
        }
        if let Some(model) = lookup(ENV_LLM_MODEL) {
            self.llm_model = Some(model);
        }
        if let Some(secs) = lookup(ENV_LLM_TIMEOUT).and_then(|v| v.trim().parse().ok()) {
            self.llm_timeout_secs = secs;
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let settings = Settings::defaults("/work");
        assert_eq!(settings.output_dir, PathBuf::from("/work/outputs"));
        assert_eq!(settings.max_repair_attempts, 1);
        assert_eq!(settings.runs_dir(), PathBuf::from("/work/.marketmind/runs"));
    }

    #[test]
    fn test_file_then_env_precedence() {
        let temp = TempDir::new().unwrap();
        let path = Settings::settings_path(temp.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            r#"{"outputDir": "reports", "maxRepairs": 3, "defaultProvider": "anthropic"}"#,
        )
        .unwrap();

        let mut settings = Settings::defaults(temp.path());
        settings.apply_file(&path).unwrap();
        assert_eq!(settings.output_dir, temp.path().join("reports"));
        assert_eq!(settings.max_repair_attempts, 3);
        assert_eq!(settings.llm_provider, Some(LlmProviderKind::Anthropic));

        let env: HashMap<&str, &str> = [(ENV_MAX_REPAIRS, "0"), (ENV_LLM_MODEL, "gpt-test")].into();
        settings.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(settings.max_repair_attempts, 0);
        assert_eq!(settings.llm_model.as_deref(), Some("gpt-test"));
    }

    #[test]
    fn test_invalid_settings_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();

        let mut settings = Settings::defaults(temp.path());
        assert!(matches!(
            settings.apply_file(&path),
            Err(CoreError::InvalidSettings { .. })
        ));
    }

    #[test]
    fn test_bad_numeric_env_is_ignored() {
        let mut settings = Settings::defaults("/work");
        settings.apply_env(|k| (k == ENV_MAX_REPAIRS).then(|| "many".to_string()));
        assert_eq!(settings.max_repair_attempts, 1);
    }
}
