pub mod error;

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, anyhow};
use tracing::debug;

use self::error::ConfigLoadError;
use crate::models::LoaderConfig;
use crate::util::{non_empty_var, parse_bool};
use crate::validation::{ConfigWarnings, apply_guard_rails};

pub const CONFIG_PATH_VAR: &str = "LAZYLOAD_CONFIG_PATH";
pub const CONFIG_JSON_VAR: &str = "LAZYLOAD_CONFIG_JSON";

/// Source that produced the loader configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConfigSource {
    #[default]
    Default,
    EnvPath(PathBuf),
    EnvInline,
    File(PathBuf),
}

/// Validated configuration together with where it came from.
#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: LoaderConfig,
    pub source: ConfigSource,
    pub warnings: ConfigWarnings,
}

impl ConfigLoad {
    /// Resolves, overrides and validates the configuration from the process
    /// environment. Warnings are logged and returned.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        let (mut config, source) = LoaderConfig::resolve_from_env()?;
        config.apply_env_overrides()?;
        let warnings = apply_guard_rails(&config)?;
        warnings.log();
        debug!(?source, "loader configuration resolved");

        Ok(Self {
            config,
            source,
            warnings,
        })
    }
}

impl LoaderConfig {
    /// Load loader configuration using environment variables.
    /// Evaluation order:
    /// 1) `$LAZYLOAD_CONFIG_PATH` (TOML or JSON file),
    /// 2) `$LAZYLOAD_CONFIG_JSON` (inline JSON),
    /// 3) the first default file found in the working directory,
    /// 4) defaults.
    ///
    /// Scalar `LAZYLOAD_*` overrides are applied on top of whichever source
    /// won.
    pub fn load_from_env() -> Result<(Self, ConfigSource), ConfigLoadError> {
        let (mut config, source) = Self::resolve_from_env()?;
        config.apply_env_overrides()?;
        Ok((config, source))
    }

    fn resolve_from_env() -> Result<(Self, ConfigSource), ConfigLoadError> {
        if let Some(path_str) = non_empty_var(CONFIG_PATH_VAR) {
            let path = PathBuf::from(path_str);
            let config = Self::load_from_file(&path).map_err(|source| {
                ConfigLoadError::File {
                    path: path.clone(),
                    source,
                }
            })?;
            return Ok((config, ConfigSource::EnvPath(path)));
        }

        if let Some(raw) = non_empty_var(CONFIG_JSON_VAR) {
            let parsed = Self::parse_json(&raw).map_err(ConfigLoadError::Inline)?;
            return Ok((parsed, ConfigSource::EnvInline));
        }

        if let Some(path) = Self::find_default_file() {
            let config = Self::load_from_file(&path).map_err(|source| {
                ConfigLoadError::File {
                    path: path.clone(),
                    source,
                }
            })?;
            return Ok((config, ConfigSource::File(path)));
        }

        Ok((Self::default(), ConfigSource::Default))
    }

    /// Applies `LAZYLOAD_PARSE`, `LAZYLOAD_CACHING`, `LAZYLOAD_TIMEOUT_MS`,
    /// `LAZYLOAD_PIPES_MAX` and `LAZYLOAD_DEBUG` when set.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigLoadError> {
        if let Some(value) = bool_var("LAZYLOAD_PARSE")? {
            self.parse = value;
        }
        if let Some(value) = bool_var("LAZYLOAD_CACHING")? {
            self.caching = value;
        }
        if let Some(value) = bool_var("LAZYLOAD_DEBUG")? {
            self.debug.enabled = value;
        }
        if let Some(value) = number_var("LAZYLOAD_TIMEOUT_MS")? {
            self.timeout_ms = value;
        }
        if let Some(value) = number_var("LAZYLOAD_PIPES_MAX")? {
            self.pipes_max = value;
        }
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path).with_context(|| {
            format!("failed to read loader config from {}", path.display())
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::parse_json(&contents).with_context(|| {
                format!("invalid loader config {}", path.display())
            }),
            Some("toml") | Some("tml") => {
                toml::from_str(&contents).map_err(|err| {
                    anyhow!("invalid loader config {}: {}", path.display(), err)
                })
            }
            _ => Self::parse_from_str(&contents, &path.display().to_string()),
        }
    }

    pub fn parse_from_str(
        contents: &str,
        origin: &str,
    ) -> anyhow::Result<Self> {
        // Try TOML first, then JSON for convenience.
        toml::from_str(contents).or_else(|toml_err| {
            serde_json::from_str(contents).map_err(|json_err| {
                anyhow!(
                    "failed to parse loader config {}: toml error: {}; json error: {}",
                    origin,
                    toml_err,
                    json_err
                )
            })
        })
    }

    pub fn parse_json(raw: &str) -> anyhow::Result<Self> {
        serde_json::from_str(raw)
            .map_err(|err| anyhow!("invalid loader config json: {err}"))
    }

    fn find_default_file() -> Option<PathBuf> {
        const CANDIDATES: &[&str] =
            &["lazyload.toml", "lazyload.json", "config/lazyload.toml"];

        CANDIDATES
            .iter()
            .map(Path::new)
            .find(|path| path.exists())
            .map(|path| path.to_path_buf())
    }
}

fn bool_var(var: &'static str) -> Result<Option<bool>, ConfigLoadError> {
    let Some(raw) = non_empty_var(var) else {
        return Ok(None);
    };
    parse_bool(&raw)
        .map(Some)
        .ok_or(ConfigLoadError::InvalidEnvValue { var, value: raw })
}

fn number_var<T: std::str::FromStr>(
    var: &'static str,
) -> Result<Option<T>, ConfigLoadError> {
    let Some(raw) = env::var(var).ok().filter(|v| !v.trim().is_empty()) else {
        return Ok(None);
    };
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|_| ConfigLoadError::InvalidEnvValue { var, value: raw })
}
