//! Application configuration file (`tom-cadence.toml`).
//!
//! ```toml
//! [repository]
//! type = "local"
//! snapshot_path = "store.json"
//!
//! [runner]
//! facility_timeout_secs = 30
//! max_concurrent_groups = 4
//! enabled_strategies = ["RetryFailedObservationsStrategy"]
//!
//! [[facilities]]
//! name = "LCO"
//! kind = "simulated"
//! window_start_keyword = "start"
//! window_end_keyword = "end"
//!
//! [reconciler]
//! fuzzy_name_matching = true
//! ```
//!
//! Every section is optional.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::brokers::ReconcilerSettings;
use crate::cadence::{CadenceResult, RunnerSettings, StrategyRegistry};
use crate::db::RepositorySettings;
use crate::facility::{FacilityRegistry, SimulatedFacility};

/// Environment variable naming an explicit configuration file.
pub const CONFIG_ENV_VAR: &str = "TOM_CADENCE_CONFIG";

const SEARCH_PATHS: [&str; 3] = [
    "tom-cadence.toml",
    "backend/tom-cadence.toml",
    "../tom-cadence.toml",
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("No tom-cadence.toml found in standard locations")]
    NotFound,

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacilityKind {
    #[default]
    Simulated,
}

/// One `[[facilities]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityConfig {
    pub name: String,
    #[serde(default)]
    pub kind: FacilityKind,
    /// Window fields the facility insists on in every request.
    #[serde(default)]
    pub window_start_keyword: Option<String>,
    #[serde(default)]
    pub window_end_keyword: Option<String>,
    #[serde(default)]
    pub reject_all: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    #[serde(flatten)]
    pub settings: RunnerSettings,
    /// Strategy names to enable; all built-ins when absent.
    pub enabled_strategies: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub repository: RepositorySettings,
    pub runner: RunnerConfig,
    pub facilities: Vec<FacilityConfig>,
    pub reconciler: ReconcilerSettings,
}

impl AppConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: AppConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// First existing file of `tom-cadence.toml`, `backend/tom-cadence.toml`
    /// and `../tom-cadence.toml`.
    pub fn from_default_location() -> Result<Self, ConfigError> {
        SEARCH_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
            .map(Self::from_file)
            .unwrap_or(Err(ConfigError::NotFound))
    }

    /// Explicit path, then `TOM_CADENCE_CONFIG`, then the default
    /// locations, then built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Self::from_file(path.trim());
            }
        }
        match Self::from_default_location() {
            Err(ConfigError::NotFound) => Ok(Self::default()),
            other => other,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.repository
            .repository_type()
            .map_err(ConfigError::Invalid)?;
        if self.runner.settings.max_concurrent_groups == 0 {
            return Err(ConfigError::Invalid(
                "runner.max_concurrent_groups must be at least 1".to_string(),
            ));
        }
        let mut names = BTreeSet::new();
        for facility in &self.facilities {
            if facility.name.trim().is_empty() {
                return Err(ConfigError::Invalid("facility name must not be empty".to_string()));
            }
            if !names.insert(facility.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "facility '{}' is configured twice",
                    facility.name
                )));
            }
        }
        Ok(())
    }

    /// Built-in strategies, narrowed to `enabled_strategies` when set.
    pub fn strategy_registry(&self) -> CadenceResult<StrategyRegistry> {
        let builtin = StrategyRegistry::with_builtin();
        match &self.runner.enabled_strategies {
            Some(enabled) => builtin.restricted_to(enabled),
            None => Ok(builtin),
        }
    }

    /// Gateways for every configured facility, shared with the caller.
    pub fn simulated_facilities(&self) -> Vec<Arc<SimulatedFacility>> {
        self.facilities
            .iter()
            .map(|cfg| match cfg.kind {
                FacilityKind::Simulated => {
                    let required = cfg
                        .window_start_keyword
                        .iter()
                        .chain(cfg.window_end_keyword.iter())
                        .cloned();
                    let facility = SimulatedFacility::new(cfg.name.clone()).with_required_fields(required);
                    if cfg.reject_all {
                        facility.set_reject_all(Some("rejected by configuration"));
                    }
                    Arc::new(facility)
                }
            })
            .collect()
    }

    pub fn facility_registry(&self) -> FacilityRegistry {
        self.simulated_facilities()
            .into_iter()
            .fold(FacilityRegistry::new(), |registry, facility| registry.with(facility))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.runner.settings, RunnerSettings::default());
        assert!(config.facilities.is_empty());
        assert!(config.reconciler.fuzzy_name_matching);
        assert!(config.validate().is_ok());
        assert_eq!(config.strategy_registry().unwrap().len(), 2);
    }

    #[test]
    fn test_from_file_full() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[repository]
type = "local"
snapshot_path = "store.json"

[runner]
facility_timeout_secs = 5
max_concurrent_groups = 4
cancel_pending_on_deactivate = true
enabled_strategies = ["Retry Failed Observations"]

[[facilities]]
name = "LCO"
window_start_keyword = "start"
window_end_keyword = "end"

[[facilities]]
name = "SOAR"
reject_all = true

[reconciler]
fuzzy_name_matching = false
"#
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        config.validate().unwrap();
        assert_eq!(config.runner.settings.facility_timeout_secs, 5);
        assert_eq!(config.runner.settings.max_concurrent_groups, 4);
        assert!(config.runner.settings.cancel_pending_on_deactivate);
        assert!(!config.reconciler.fuzzy_name_matching);
        assert_eq!(config.facilities[1].kind, FacilityKind::Simulated);
        assert!(config.facilities[1].reject_all);
        assert_eq!(
            config.strategy_registry().unwrap().names(),
            vec!["RetryFailedObservationsStrategy"]
        );
        assert_eq!(config.facility_registry().names(), vec!["LCO", "SOAR"]);
    }

    #[test]
    fn test_unknown_strategy_is_error() {
        let config: AppConfig =
            toml::from_str("[runner]\nenabled_strategies = [\"Nope\"]\n").unwrap();
        assert!(config.strategy_registry().is_err());
    }

    #[test]
    fn test_duplicate_facility_rejected() {
        let config: AppConfig =
            toml::from_str("[[facilities]]\nname = \"LCO\"\n[[facilities]]\nname = \"LCO\"\n")
                .unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_parse_error_names_path() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[runner\n").unwrap();
        let err = AppConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
