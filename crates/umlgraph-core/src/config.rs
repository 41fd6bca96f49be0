use crate::error::{GraphError, Result};
use crate::merge::ReconcilePolicy;
use crate::paths;
use crate::plan::IngestOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// StoreConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Relative paths are resolved against the project root.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(paths::DEFAULT_STORE_FILE)
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

// ---------------------------------------------------------------------------
// IngestConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default)]
    pub policy: ReconcilePolicy,
    #[serde(default = "default_validate")]
    pub validate: bool,
    /// Directory/filename prefixes that mark a spec id (`tmf620/...`).
    #[serde(default = "default_spec_prefixes")]
    pub spec_prefixes: Vec<String>,
    #[serde(default = "default_block_version")]
    pub default_version: String,
}

fn default_validate() -> bool {
    true
}

fn default_spec_prefixes() -> Vec<String> {
    vec!["tmf".to_string(), "spec".to_string()]
}

fn default_block_version() -> String {
    "1.0".to_string()
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            policy: ReconcilePolicy::default(),
            validate: default_validate(),
            spec_prefixes: default_spec_prefixes(),
            default_version: default_block_version(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            store: StoreConfig::default(),
            ingest: IngestConfig::default(),
        }
    }
}

impl Config {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(GraphError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    /// Like [`Config::load`], but a missing file yields the defaults.
    pub fn load_or_default(root: &Path) -> Result<Self> {
        match Self::load(root) {
            Err(GraphError::NotInitialized) => Ok(Self::default()),
            other => other,
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = self.to_yaml()?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn store_path(&self, root: &Path) -> PathBuf {
        paths::resolve(root, &self.store.path)
    }

    pub fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            spec_prefixes: self.ingest.spec_prefixes.clone(),
            default_version: self.ingest.default_version.clone(),
            validate: self.ingest.validate,
            ..IngestOptions::default()
        }
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.version != 1 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!("unknown config version {}", self.version),
            });
        }

        if self.store.path.as_os_str().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "store.path is empty".to_string(),
            });
        }

        if self.ingest.spec_prefixes.is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "ingest.spec_prefixes is empty; spec ids will come from parent \
                          directory names only"
                    .to_string(),
            });
        }

        // '#', '.' and '/' are FQN and block id separators
        for prefix in &self.ingest.spec_prefixes {
            if prefix.is_empty() || prefix.contains(['#', '/', '.']) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("spec prefix '{prefix}' is empty or contains '#', '/' or '.'"),
                });
            }
        }

        if !self.ingest.validate {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "ingest.validate is off; malformed cardinalities and directions \
                          will be stored as defaults"
                    .to_string(),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
