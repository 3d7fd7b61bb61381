//! Project configuration (spec §6 ambient: `cca-config`): a TOML-backed,
//! validated config for the engine's own tunables. Grounded on the
//! teacher's project/global config split — `EngineConfig::load` mirrors
//! `ProjectConfig::load`'s "absent file is not an error" contract, and
//! `merge` mirrors `config_merge::merge_toml_values`'s deep-table-merge
//! idiom (project overrides layered onto defaults).

mod merge;
mod validate;

use cca_core::AppError;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub use validate::validate_engine_config;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub engine: EngineSection,
    pub size_policy: SizePolicySection,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            engine: EngineSection::default(),
            size_policy: SizePolicySection::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    pub max_iterations: u32,
    pub max_tool_loops: u32,
    pub validate_after_coding: bool,
    pub auto_apply_on_consensus: bool,
    pub auto_apply_threshold: f64,
    pub coder_timeout_secs: u64,
    pub arbiter_timeout_secs: Option<u64>,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            max_tool_loops: 50,
            validate_after_coding: true,
            auto_apply_on_consensus: true,
            auto_apply_threshold: 1.0,
            coder_timeout_secs: 120,
            arbiter_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SizePolicySection {
    pub file_read_chars: usize,
    pub file_glob_entries: usize,
    pub file_grep_matches: usize,
    pub shell_exec_chars: usize,
    pub other_chars: usize,
}

impl Default for SizePolicySection {
    fn default() -> Self {
        Self {
            file_read_chars: 50_000,
            file_glob_entries: 100,
            file_grep_matches: 50,
            shell_exec_chars: 20_000,
            other_chars: 30_000,
        }
    }
}

impl EngineConfig {
    /// Loads `<project_root>/cca.toml`. A missing file is not an error —
    /// the caller gets `Ok(None)` and falls back to defaults, the same
    /// contract as the teacher's `ProjectConfig::load`.
    pub fn load(project_root: &Path) -> Result<Option<Self>, AppError> {
        let path = project_root.join("cca.toml");
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        let config: EngineConfig = toml::from_str(&content).map_err(|e| AppError::ValidationFailed(vec![e.to_string()]))?;
        Ok(Some(config))
    }

    /// Layers `overlay`'s TOML representation onto `self`'s, table by
    /// table, so a project file only needs to set the keys it wants to
    /// change (spec §6 `merge`).
    pub fn merge(self, overlay: EngineConfig) -> Result<Self, AppError> {
        let base = toml::Value::try_from(&self).map_err(|e| AppError::Internal(e.to_string()))?;
        let overlay = toml::Value::try_from(&overlay).map_err(|e| AppError::Internal(e.to_string()))?;
        let merged = merge::merge_toml_values(base, overlay);
        merged.try_into().map_err(|e: toml::de::Error| AppError::Internal(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), AppError> {
        validate::validate_engine_config(self)
    }
}
