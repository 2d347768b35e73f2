use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{materializer::NodePolicy, report::DEFAULT_REPORT_FILE, store::StoreConfig};

pub const DEFAULT_CONFIG_FILE: &str = "import.toml";
pub const DEFAULT_DATABASE: &str = "graph.db";
pub const DEFAULT_PREFETCH: usize = 4;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImportConfig {
    pub database: PathBuf,
    pub fragments: Option<PathBuf>,
    pub node_policy: NodePolicy,
    pub report: PathBuf,
    /// Abort the run on the first fragment that fails instead of skipping it.
    pub fail_fast: bool,
    /// Fragments parsed ahead of the importer.
    pub prefetch: usize,
    pub verbose: bool,
    pub sqlite: StoreConfig,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE),
            fragments: None,
            node_policy: NodePolicy::default(),
            report: PathBuf::from(DEFAULT_REPORT_FILE),
            fail_fast: false,
            prefetch: DEFAULT_PREFETCH,
            verbose: false,
            sqlite: StoreConfig::default(),
        }
    }
}

/// Command-line values that take precedence over the config file.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database: Option<PathBuf>,
    pub fragments: Option<PathBuf>,
    pub node_policy: Option<NodePolicy>,
    pub report: Option<PathBuf>,
    pub fail_fast: bool,
    pub verbose: bool,
}

impl ImportConfig {
    /// Loads `explicit` if given (it must exist), otherwise `import.toml` in
    /// the working directory when present, otherwise the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => read_file(path),
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    read_file(path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: ImportConfig =
            toml::from_str(contents).map_err(|source| ConfigError::Parse {
                path: PathBuf::from("<inline>"),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply(&mut self, overrides: ConfigOverrides) {
        if let Some(database) = overrides.database {
            self.database = database;
        }
        if let Some(fragments) = overrides.fragments {
            self.fragments = Some(fragments);
        }
        if let Some(policy) = overrides.node_policy {
            self.node_policy = policy;
        }
        if let Some(report) = overrides.report {
            self.report = report;
        }
        self.fail_fast |= overrides.fail_fast;
        self.verbose |= overrides.verbose;
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.prefetch == 0 {
            return Err(ConfigError::Invalid {
                field: "prefetch",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.database.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                field: "database",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read import config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse import config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid import config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn read_file(path: &Path) -> Result<ImportConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: ImportConfig = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}
