//! Maps scanned directives onto what the orchestrator acts on: dependency
//! names, a global configuration patch, and properties for the discovered
//! dependencies.

use lazyload_config::ConfigPatch;
use lazyload_model::{DescriptorOverrides, ResourceKey};
use tracing::warn;

use crate::scanner::Directive;

/// Directives whose values are resource names.
pub const DEPENDENCY_DIRECTIVES: &[&str] = &["resources", "files", "import"];
pub const CONFIGURATION_DIRECTIVE: &str = "configuration";
pub const PROPERTIES_DIRECTIVE: &str = "properties";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Declarations {
    /// Dependency names, source order, de-duplicated.
    pub dependencies: Vec<String>,
    pub config: ConfigPatch,
    pub properties: DescriptorOverrides,
}

impl Declarations {
    pub fn from_directives(directives: &[Directive]) -> Self {
        let mut out = Self::default();
        for directive in directives {
            let name = directive.name.as_str();
            if DEPENDENCY_DIRECTIVES.contains(&name) {
                for value in &directive.values {
                    if !out.dependencies.contains(value) {
                        out.dependencies.push(value.clone());
                    }
                }
            } else if name == CONFIGURATION_DIRECTIVE {
                for (key, value) in pairs(&directive.values) {
                    if let Err(err) = out.config.set(key, value) {
                        warn!(%err, "ignoring configuration directive entry");
                    }
                }
            } else if name == PROPERTIES_DIRECTIVE {
                for (key, value) in pairs(&directive.values) {
                    set_property(&mut out.properties, key, value);
                }
            }
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
            && self.config.is_empty()
            && self.properties.is_empty()
    }
}

fn pairs(values: &[String]) -> impl Iterator<Item = (&str, &str)> {
    values.iter().filter_map(|entry| {
        let pair = entry.split_once(':');
        if pair.is_none() {
            warn!(entry = %entry, "directive entry is not key:value");
        }
        pair
    })
}

fn set_property(overrides: &mut DescriptorOverrides, key: &str, value: &str) {
    let applied = match key {
        "caching" | "cacheable" => lazyload_config::util::parse_bool(value)
            .map(|v| overrides.cacheable = Some(v))
            .is_some(),
        "target" => value.parse().map(|t| overrides.target = Some(t)).is_ok(),
        "kind" | "type" => {
            value.parse().map(|k| overrides.kind = Some(k)).is_ok()
        }
        "key" | "uid" => ResourceKey::new(value)
            .map(|k| overrides.key = Some(k))
            .is_ok(),
        _ => {
            warn!(key, "ignoring unknown property directive key");
            return;
        }
    };
    if !applied {
        warn!(key, value, "ignoring malformed property directive value");
    }
}
