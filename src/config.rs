//! Application configuration: defaults, optional TOML file, `SHOPPER_*` environment
//! variables and command-line overrides, applied in that order.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::recommend::DEFAULT_TOP_N;

pub const CONFIG_FILE_NAME: &str = "shopper-spectrum.toml";

/// Runtime configuration after every layer has been applied.
#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub artifacts: ArtifactPaths,
    pub recommend: RecommendConfig,
    pub logging: LoggingConfig,
}

/// Locations of the artifacts produced by the offline training pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct ArtifactPaths {
    pub scaler: PathBuf,
    pub model: PathBuf,
    pub similarity: PathBuf,
    pub rfm_history: PathBuf,
    /// Transactional dataset used only to list product names.
    pub catalog: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RecommendConfig {
    pub default_top_n: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub scaler: Option<PathBuf>,
    pub model: Option<PathBuf>,
    pub similarity: Option<PathBuf>,
    pub rfm_history: Option<PathBuf>,
    pub catalog: Option<PathBuf>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigPatch {
    artifacts: Option<ArtifactsPatch>,
    recommend: Option<RecommendPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ArtifactsPatch {
    scaler: Option<PathBuf>,
    model: Option<PathBuf>,
    similarity: Option<PathBuf>,
    rfm_history: Option<PathBuf>,
    catalog: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RecommendPatch {
    default_top_n: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            artifacts: ArtifactPaths {
                scaler: PathBuf::from("models/rfm_scaler.json"),
                model: PathBuf::from("models/rfm_kmeans_model.json"),
                similarity: PathBuf::from("similarity_matrix.csv"),
                rfm_history: PathBuf::from("RFM_Features.csv"),
                catalog: Some(PathBuf::from("cleaned_Shopper_Spectrum_data.csv")),
            },
            recommend: RecommendConfig {
                default_top_n: DEFAULT_TOP_N,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: LogFormat::Compact,
            },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    /// Layer defaults, the config file, `SHOPPER_*` variables and overrides, then validate.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = resolve_config_path(options.config_path.as_deref()) {
            config.apply_patch(read_patch(&path)?);
        } else if options.require_file {
            let expected = options
                .config_path
                .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(artifacts) = patch.artifacts {
            if let Some(scaler) = artifacts.scaler {
                self.artifacts.scaler = scaler;
            }
            if let Some(model) = artifacts.model {
                self.artifacts.model = model;
            }
            if let Some(similarity) = artifacts.similarity {
                self.artifacts.similarity = similarity;
            }
            if let Some(rfm_history) = artifacts.rfm_history {
                self.artifacts.rfm_history = rfm_history;
            }
            if let Some(catalog) = artifacts.catalog {
                self.artifacts.catalog = non_empty_path(catalog);
            }
        }

        if let Some(recommend) = patch.recommend {
            if let Some(default_top_n) = recommend.default_top_n {
                self.recommend.default_top_n = default_top_n;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("SHOPPER_SCALER_PATH") {
            self.artifacts.scaler = PathBuf::from(value);
        }
        if let Some(value) = read_env("SHOPPER_MODEL_PATH") {
            self.artifacts.model = PathBuf::from(value);
        }
        if let Some(value) = read_env("SHOPPER_SIMILARITY_PATH") {
            self.artifacts.similarity = PathBuf::from(value);
        }
        if let Some(value) = read_env("SHOPPER_RFM_HISTORY_PATH") {
            self.artifacts.rfm_history = PathBuf::from(value);
        }
        if let Some(value) = read_env("SHOPPER_CATALOG_PATH") {
            self.artifacts.catalog = non_empty_path(PathBuf::from(value));
        }
        if let Some(value) = read_env("SHOPPER_DEFAULT_TOP_N") {
            self.recommend.default_top_n = parse_usize("SHOPPER_DEFAULT_TOP_N", &value)?;
        }
        if let Some(value) = read_env("SHOPPER_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = read_env("SHOPPER_LOG_FORMAT") {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(scaler) = overrides.scaler {
            self.artifacts.scaler = scaler;
        }
        if let Some(model) = overrides.model {
            self.artifacts.model = model;
        }
        if let Some(similarity) = overrides.similarity {
            self.artifacts.similarity = similarity;
        }
        if let Some(rfm_history) = overrides.rfm_history {
            self.artifacts.rfm_history = rfm_history;
        }
        if let Some(catalog) = overrides.catalog {
            self.artifacts.catalog = non_empty_path(catalog);
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    /// Check that paths are non-empty, `default_top_n` is positive and the log level parses.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("artifacts.scaler", &self.artifacts.scaler),
            ("artifacts.model", &self.artifacts.model),
            ("artifacts.similarity", &self.artifacts.similarity),
            ("artifacts.rfm_history", &self.artifacts.rfm_history),
        ];
        if let Some((key, _)) = required
            .iter()
            .find(|(_, path)| path.as_os_str().is_empty())
        {
            return Err(ConfigError::Validation(format!("{key} must not be empty")));
        }

        if self.recommend.default_top_n == 0 {
            return Err(ConfigError::Validation(
                "recommend.default_top_n must be at least 1".to_string(),
            ));
        }

        if self.logging.level.parse::<tracing::Level>().is_err() {
            return Err(ConfigError::Validation(format!(
                "logging.level `{}` is not one of trace|debug|info|warn|error",
                self.logging.level
            )));
        }

        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [
        PathBuf::from(CONFIG_FILE_NAME),
        Path::new("config").join(CONFIG_FILE_NAME),
    ]
    .into_iter()
    .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str::<ConfigPatch>(&raw).map_err(|source| ConfigError::ParseFile {
        path: path.to_path_buf(),
        source,
    })
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnvOverride {
            key: key.to_string(),
            value: value.to_string(),
        })
}

/// An empty catalog path disables the catalog.
fn non_empty_path(path: PathBuf) -> Option<PathBuf> {
    (!path.as_os_str().is_empty()).then_some(path)
}
