use thiserror::Error;
use tracing::warn;

use crate::models::LoaderConfig;

#[derive(Debug, Error)]
pub enum ConfigGuardRailError {
    #[error("delimiter cannot be empty")]
    EmptyDelimiter,
    #[error("persistent cache root cannot be empty")]
    EmptyCacheRoot,
}

#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint<S: Into<String>, H: Into<String>>(
        &mut self,
        message: S,
        hint: H,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn log(&self) {
        for item in &self.items {
            match &item.hint {
                Some(hint) => warn!(hint = %hint, "{}", item.message),
                None => warn!("{}", item.message),
            }
        }
    }
}

pub fn apply_guard_rails(
    config: &LoaderConfig,
) -> Result<ConfigWarnings, ConfigGuardRailError> {
    let mut warnings = ConfigWarnings::default();

    if config.delimiter.is_empty() {
        return Err(ConfigGuardRailError::EmptyDelimiter);
    }

    if let Some(extension) = &config.extension
        && !extension.starts_with('.')
    {
        warnings.push_with_hint(
            format!("extension '{extension}' has no leading dot"),
            "The extension is appended verbatim; use '.js' rather than 'js'",
        );
    }

    if config.parse && config.directives.is_empty() {
        warnings.push_with_hint(
            "dependency parsing is enabled but no directives are allowed",
            "Add 'resources' (or 'files'/'import') to directives, or set parse = false",
        );
    }

    if let Some(cache) = &config.persistent_cache {
        if cache.root.as_os_str().is_empty() {
            return Err(ConfigGuardRailError::EmptyCacheRoot);
        }
        if cache.ttl_secs == 0 {
            warnings.push_with_hint(
                "persistent cache ttl_secs is 0; every stored payload expires immediately",
                "Remove persistent_cache to disable it, or raise ttl_secs",
            );
        }
        if !config.caching {
            warnings.push(
                "persistent cache configured while caching is disabled; only resources marked cacheable will use it",
            );
        }
    }

    Ok(warnings)
}
