use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::{parse_bool, parse_csv};

/// Directives the annotation scanner honours unless configured otherwise.
pub const DEFAULT_DIRECTIVES: &[&str] =
    &["resources", "files", "import", "configuration", "properties"];

fn default_directives() -> Vec<String> {
    DEFAULT_DIRECTIVES.iter().map(|d| d.to_string()).collect()
}

/// Full configuration surface of one loader instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Allow-list of `@directive` names the scanner reports.
    #[serde(default = "default_directives")]
    pub directives: Vec<String>,
    /// Appended to the leaf segment of every translated name, e.g. `.js`.
    pub extension: Option<String>,
    /// Separator between package segments of a resource name.
    #[serde(alias = "translate")]
    pub delimiter: String,
    /// Scan fetched payloads for dependency directives.
    pub parse: bool,
    /// Default for each descriptor's `cacheable` flag.
    pub caching: bool,
    /// Per-fetch timeout in milliseconds. `0` disables it.
    #[serde(alias = "timeout")]
    pub timeout_ms: u64,
    /// Ceiling on concurrently open fetches. `0` is unlimited.
    #[serde(alias = "pipesMax")]
    pub pipes_max: usize,
    pub debug: DebugConfig,
    /// On-disk secondary cache. Disabled when absent.
    pub persistent_cache: Option<PersistentCacheConfig>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            directives: default_directives(),
            extension: None,
            delimiter: "/".to_string(),
            parse: true,
            caching: true,
            timeout_ms: 0,
            pipes_max: 0,
            debug: DebugConfig::default(),
            persistent_cache: None,
        }
    }
}

impl LoaderConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    /// Merges `patch` into this config; fields set in the patch win.
    pub fn apply(&mut self, patch: &ConfigPatch) {
        if let Some(directives) = &patch.directives {
            self.directives.clone_from(directives);
        }
        if let Some(extension) = &patch.extension {
            self.extension = if extension.is_empty() {
                None
            } else {
                Some(extension.clone())
            };
        }
        if let Some(delimiter) = &patch.delimiter {
            self.delimiter.clone_from(delimiter);
        }
        if let Some(parse) = patch.parse {
            self.parse = parse;
        }
        if let Some(caching) = patch.caching {
            self.caching = caching;
        }
        if let Some(timeout_ms) = patch.timeout_ms {
            self.timeout_ms = timeout_ms;
        }
        if let Some(pipes_max) = patch.pipes_max {
            self.pipes_max = pipes_max;
        }
        if let Some(debug) = patch.debug {
            self.debug.enabled = debug;
        }
        if let Some(cache) = &patch.persistent_cache {
            self.persistent_cache = Some(cache.clone());
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Emit per-resource lifecycle events (translate, fetch, placement).
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistentCacheConfig {
    pub root: PathBuf,
    /// Lifetime of a stored payload. Entries older than this read as absent.
    pub ttl_secs: u64,
    /// Quota for stored payload bytes; oldest entries are evicted past it.
    /// `None` leaves the store unbounded.
    pub max_bytes: Option<u64>,
}

impl Default for PersistentCacheConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("cache/lazyload"),
            ttl_secs: 7 * 24 * 60 * 60,
            max_bytes: Some(64 * 1024 * 1024),
        }
    }
}

impl PersistentCacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Partial configuration; every field is optional and set fields win when
/// applied with [`LoaderConfig::apply`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigPatch {
    pub directives: Option<Vec<String>>,
    /// An empty string clears the extension.
    pub extension: Option<String>,
    #[serde(alias = "translate")]
    pub delimiter: Option<String>,
    pub parse: Option<bool>,
    pub caching: Option<bool>,
    #[serde(alias = "timeout")]
    pub timeout_ms: Option<u64>,
    #[serde(alias = "pipesMax")]
    pub pipes_max: Option<usize>,
    pub debug: Option<bool>,
    pub persistent_cache: Option<PersistentCacheConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigFieldError {
    #[error("unknown configuration key '{0}'")]
    UnknownKey(String),
    #[error("invalid value '{value}' for configuration key '{key}'")]
    InvalidValue { key: String, value: String },
}

impl ConfigPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Sets one field from a `key:value` style pair, as carried by
    /// `@configuration` directives. Keys accept both snake and camel forms.
    pub fn set(&mut self, key: &str, raw: &str) -> Result<(), ConfigFieldError> {
        let invalid = || ConfigFieldError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
        };
        let value = raw.trim();

        match key.trim() {
            "parse" => self.parse = Some(parse_bool(value).ok_or_else(invalid)?),
            "caching" => {
                self.caching = Some(parse_bool(value).ok_or_else(invalid)?)
            }
            "debug" => self.debug = Some(parse_bool(value).ok_or_else(invalid)?),
            "timeout" | "timeout_ms" | "timeoutMs" => {
                self.timeout_ms = Some(value.parse().map_err(|_| invalid())?)
            }
            "pipes_max" | "pipesMax" => {
                self.pipes_max = Some(value.parse().map_err(|_| invalid())?)
            }
            "extension" => {
                self.extension = match parse_bool(value) {
                    Some(false) => Some(String::new()),
                    Some(true) => return Err(invalid()),
                    None => Some(value.to_string()),
                }
            }
            "delimiter" | "translate" => {
                if value.is_empty() {
                    return Err(invalid());
                }
                self.delimiter = Some(value.to_string());
            }
            "directives" => self.directives = Some(parse_csv(value)),
            other => return Err(ConfigFieldError::UnknownKey(other.to_string())),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_patch_leaves_config_unchanged() {
        let config = LoaderConfig {
            pipes_max: 4,
            extension: Some(".js".into()),
            ..Default::default()
        };
        let mut patched = config.clone();
        patched.apply(&ConfigPatch::default());
        assert_eq!(patched, config);
    }

    #[test]
    fn patch_fields_override() {
        let mut config = LoaderConfig::default();
        config.apply(&ConfigPatch {
            parse: Some(false),
            timeout_ms: Some(2_500),
            extension: Some(".js".into()),
            ..Default::default()
        });

        assert!(!config.parse);
        assert_eq!(config.timeout(), Some(Duration::from_millis(2_500)));
        assert_eq!(config.extension.as_deref(), Some(".js"));
        assert!(config.caching);
    }

    #[test]
    fn empty_extension_clears_it() {
        let mut config = LoaderConfig {
            extension: Some(".js".into()),
            ..Default::default()
        };
        config.apply(&ConfigPatch {
            extension: Some(String::new()),
            ..Default::default()
        });
        assert_eq!(config.extension, None);
    }

    #[test]
    fn set_accepts_directive_keys() {
        let mut patch = ConfigPatch::default();
        patch.set("pipesMax", "3").unwrap();
        patch.set("timeout", "100").unwrap();
        patch.set("caching", "off").unwrap();
        patch.set("translate", ".").unwrap();

        assert_eq!(patch.pipes_max, Some(3));
        assert_eq!(patch.timeout_ms, Some(100));
        assert_eq!(patch.caching, Some(false));
        assert_eq!(patch.delimiter.as_deref(), Some("."));
    }

    #[test]
    fn set_rejects_unknown_and_malformed() {
        let mut patch = ConfigPatch::default();
        assert_eq!(
            patch.set("onload", "alert(1)"),
            Err(ConfigFieldError::UnknownKey("onload".into()))
        );
        assert!(matches!(
            patch.set("timeout", "soon"),
            Err(ConfigFieldError::InvalidValue { .. })
        ));
        assert!(patch.is_empty());
    }

    #[test]
    fn toml_uses_defaults_for_missing_fields() {
        let config: LoaderConfig = toml::from_str(
            r#"
            extension = ".js"
            pipesMax = 6

            [debug]
            enabled = true
            "#,
        )
        .unwrap();

        assert_eq!(config.extension.as_deref(), Some(".js"));
        assert_eq!(config.pipes_max, 6);
        assert!(config.debug.enabled);
        assert_eq!(config.delimiter, "/");
        assert_eq!(config.directives.len(), DEFAULT_DIRECTIVES.len());
    }
}
