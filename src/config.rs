//! Configuration for the ranker tuner.
//!
//! Supports both environment variables and YAML config file.
//! Environment variables take precedence over config file values.

use crate::error::{RankTunerError, Result};
use crate::evaluator::DEFAULT_CUTOFF;
use crate::persistence::SaveFormat;
use crate::relevance::check_evaluator_id;
use crate::search::SortKey;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Where records are kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory of relevance records.
    pub evaluation_dir: PathBuf,
    /// Directory of training results.
    pub training_dir: PathBuf,
    /// Evaluator id of the shared master record.
    pub master_id: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            evaluation_dir: PathBuf::from("evaluation"),
            training_dir: PathBuf::from("training"),
            master_id: "uiuc".to_string(),
        }
    }
}

/// Evaluation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Ranked results considered per query.
    pub cutoff: usize,
    /// First query number evaluated.
    pub query_start: u32,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            cutoff: DEFAULT_CUTOFF,
            query_start: 1,
        }
    }
}

/// Query-time search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub top_k: usize,
    pub sort: SortKey,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            sort: SortKey::Date,
        }
    }
}

/// Record storage settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    pub format: SaveFormat,
}

/// Full application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub paths: PathsConfig,
    pub evaluation: EvaluationConfig,
    pub search: SearchConfig,
    pub storage: StorageConfig,
}

/// Configuration file structure (YAML format).
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    paths: Option<PathsFileSection>,
    evaluation: Option<EvaluationFileSection>,
    search: Option<SearchFileSection>,
    storage: Option<StorageFileSection>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PathsFileSection {
    evaluation_dir: Option<PathBuf>,
    training_dir: Option<PathBuf>,
    master_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EvaluationFileSection {
    cutoff: Option<usize>,
    query_start: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SearchFileSection {
    top_k: Option<usize>,
    sort: Option<SortKey>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StorageFileSection {
    format: Option<SaveFormat>,
}

impl Config {
    /// Load configuration from environment variables and optional config file.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (RANK_TUNER_EVALUATION_DIR, RANK_TUNER_TRAINING_DIR, ...)
    /// 2. Config file (`explicit_path`, or ~/.config/rank-tuner/config.yaml)
    /// 3. Default values
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = match explicit_path {
            Some(path) => Self::load_from_file(path)?,
            None => match Self::config_file_path() {
                Some(path) if path.exists() => Self::load_from_file(&path)?,
                _ => Config::default(),
            },
        };

        config.apply_env(|key| env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| RankTunerError::io(path, e))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text on top of the defaults.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let file_config: ConfigFile = serde_yaml::from_str(content)
            .map_err(|e| RankTunerError::Config(format!("Failed to parse config file: {}", e)))?;

        let mut config = Config::default();

        if let Some(paths) = file_config.paths {
            if let Some(dir) = paths.evaluation_dir {
                config.paths.evaluation_dir = dir;
            }
            if let Some(dir) = paths.training_dir {
                config.paths.training_dir = dir;
            }
            if let Some(master_id) = paths.master_id {
                config.paths.master_id = master_id;
            }
        }

        if let Some(evaluation) = file_config.evaluation {
            if let Some(cutoff) = evaluation.cutoff {
                config.evaluation.cutoff = cutoff;
            }
            if let Some(query_start) = evaluation.query_start {
                config.evaluation.query_start = query_start;
            }
        }

        if let Some(search) = file_config.search {
            if let Some(top_k) = search.top_k {
                config.search.top_k = top_k;
            }
            if let Some(sort) = search.sort {
                config.search.sort = sort;
            }
        }

        if let Some(storage) = file_config.storage {
            if let Some(format) = storage.format {
                config.storage.format = format;
            }
        }

        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// [`load`](Self::load)). Unparsable numeric values are an error.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("RANK_TUNER_EVALUATION_DIR") {
            self.paths.evaluation_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("RANK_TUNER_TRAINING_DIR") {
            self.paths.training_dir = PathBuf::from(dir);
        }
        if let Some(master_id) = lookup("RANK_TUNER_MASTER_ID") {
            self.paths.master_id = master_id;
        }
        if let Some(cutoff) = lookup("RANK_TUNER_CUTOFF") {
            self.evaluation.cutoff = parse_env("RANK_TUNER_CUTOFF", &cutoff)?;
        }
        if let Some(top_k) = lookup("RANK_TUNER_TOP_K") {
            self.search.top_k = parse_env("RANK_TUNER_TOP_K", &top_k)?;
        }
        if let Some(format) = lookup("RANK_TUNER_STORAGE_FORMAT") {
            self.storage.format = SaveFormat::parse(&format).ok_or_else(|| {
                RankTunerError::Config(format!(
                    "RANK_TUNER_STORAGE_FORMAT must be 'json' or 'bincode', got '{}'",
                    format
                ))
            })?;
        }
        Ok(())
    }

    /// Get the default config file path.
    pub fn config_file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "rank-tuner")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Validate the configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.evaluation.cutoff == 0 {
            return Err(RankTunerError::Config(
                "Evaluation cutoff must be at least 1.".to_string(),
            ));
        }

        if self.evaluation.query_start == 0 {
            return Err(RankTunerError::Config(
                "Query numbers start at 1; query_start must be at least 1.".to_string(),
            ));
        }

        if self.search.top_k == 0 {
            return Err(RankTunerError::Config(
                "Search top_k must be at least 1.".to_string(),
            ));
        }

        if self.paths.master_id.trim().is_empty() {
            return Err(RankTunerError::Config(
                "Master evaluator id is required. Set RANK_TUNER_MASTER_ID or add paths.master_id to the config file.".to_string(),
            ));
        }

        check_evaluator_id(&self.paths.master_id)
            .map_err(|e| RankTunerError::Config(format!("paths.master_id: {}", e)))?;

        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| RankTunerError::Config(format!("{} has invalid value '{}'", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.paths.evaluation_dir, PathBuf::from("evaluation"));
        assert_eq!(config.paths.training_dir, PathBuf::from("training"));
        assert_eq!(config.paths.master_id, "uiuc");
        assert_eq!(config.evaluation.cutoff, 10);
        assert_eq!(config.evaluation.query_start, 1);
        assert_eq!(config.search.top_k, 10);
        assert_eq!(config.search.sort, SortKey::Date);
        assert_eq!(config.storage.format, SaveFormat::Json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_yaml_partial() {
        let config = Config::from_yaml(
            "paths:\n  training_dir: /var/lib/rank-tuner/training\nsearch:\n  sort: upvotes\nstorage:\n  format: bincode\n",
        )
        .unwrap();
        assert_eq!(
            config.paths.training_dir,
            PathBuf::from("/var/lib/rank-tuner/training")
        );
        assert_eq!(config.paths.evaluation_dir, PathBuf::from("evaluation"));
        assert_eq!(config.search.sort, SortKey::Upvotes);
        assert_eq!(config.storage.format, SaveFormat::Bincode);
    }

    #[test]
    fn test_from_yaml_rejects_unknown_keys() {
        assert!(Config::from_yaml("search:\n  top_n: 5\n").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("RANK_TUNER_CUTOFF", "5"),
            ("RANK_TUNER_MASTER_ID", "cs410"),
            ("RANK_TUNER_STORAGE_FORMAT", "bincode"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_env(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.evaluation.cutoff, 5);
        assert_eq!(config.paths.master_id, "cs410");
        assert_eq!(config.storage.format, SaveFormat::Bincode);
    }

    #[test]
    fn test_env_invalid_number() {
        let mut config = Config::default();
        let result = config.apply_env(|key| (key == "RANK_TUNER_TOP_K").then(|| "ten".to_string()));
        assert!(matches!(result, Err(RankTunerError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = Config::default();
        config.evaluation.cutoff = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.search.top_k = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.paths.master_id = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_path_like_master_id() {
        for id in ["a/b", "..", "uiuc master"] {
            let mut config = Config::default();
            config.paths.master_id = id.to_string();
            assert!(
                matches!(config.validate(), Err(RankTunerError::Config(_))),
                "{} should be rejected",
                id
            );
        }

        let mut config = Config::default();
        config.paths.master_id = "uiuc-2020.fall".to_string();
        assert!(config.validate().is_ok());
    }
}
