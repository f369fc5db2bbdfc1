//! Resource registry: the single owner of descriptor identity.
//!
//! The first translation of a key fixes an immutable base (location, kind,
//! default flags). Later calls only layer [`DescriptorOverrides`] on top,
//! and the layers accumulate per key for the lifetime of the registry.

use std::{collections::HashMap, sync::Arc};

use lazyload_config::LoaderConfig;
use lazyload_model::{
    DescriptorOverrides, PlacementTarget, ResourceDescriptor, ResourceKey,
    ResourceKind,
};

use crate::error::{LoadError, Result};
use crate::identity::identify;

/// Location and defaults derived from a name at first translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseTranslation {
    pub name: String,
    pub path: String,
    pub file: String,
    pub uri: String,
    pub kind: ResourceKind,
    pub cacheable: bool,
    pub target: PlacementTarget,
}

impl BaseTranslation {
    /// Splits `name` on the configured delimiter. The last segment is the
    /// leaf; the others form a `/`-joined package path.
    pub fn from_name(name: &str, config: &LoaderConfig) -> Self {
        let name = name.trim();
        let mut segments: Vec<&str> = if config.delimiter.is_empty() {
            vec![name]
        } else {
            name.split(config.delimiter.as_str()).collect()
        };
        let leaf = segments.pop().unwrap_or_default();

        let path = if segments.is_empty() {
            String::new()
        } else {
            let mut path = segments.join("/");
            path.push('/');
            path
        };

        let mut file = leaf.to_string();
        if let Some(extension) = &config.extension
            && !file.ends_with(extension.as_str())
        {
            file.push_str(extension);
        }

        let uri = format!("{path}{file}");
        let kind = ResourceKind::from_uri(&uri);

        Self {
            name: name.to_string(),
            path,
            file,
            uri,
            kind,
            cacheable: config.caching,
            target: PlacementTarget::default(),
        }
    }
}

#[derive(Debug)]
struct Entry {
    base: Arc<BaseTranslation>,
    overrides: DescriptorOverrides,
    discovered: bool,
}

impl Entry {
    fn resolve(&self, key: &ResourceKey) -> ResourceDescriptor {
        let base = &self.base;
        let mut descriptor = ResourceDescriptor {
            key: key.clone(),
            name: base.name.clone(),
            kind: base.kind,
            path: base.path.clone(),
            file: base.file.clone(),
            uri: base.uri.clone(),
            payload: None,
            parent: None,
            discovered: self.discovered,
            cacheable: base.cacheable,
            target: base.target,
        };
        self.overrides.apply_to(&mut descriptor);
        descriptor
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    entries: HashMap<ResourceKey, Entry>,
    by_name: HashMap<String, ResourceKey>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves `name` to its descriptor, creating the base translation on
    /// first sight and accumulating `overrides` onto the key.
    ///
    /// Fails with [`LoadError::DuplicateKeyCollision`] when an explicit key
    /// is already held by a different name.
    pub fn translate(
        &mut self,
        name: &str,
        overrides: &DescriptorOverrides,
        config: &LoaderConfig,
    ) -> Result<ResourceDescriptor> {
        let name = name.trim();
        let key = match (&overrides.key, self.by_name.get(name)) {
            (None, Some(known)) => known.clone(),
            _ => identify(name, overrides)?,
        };

        if let Some(existing) = self.entries.get(&key)
            && existing.base.name != name
        {
            return Err(LoadError::DuplicateKeyCollision {
                key,
                existing: existing.base.name.clone(),
                incoming: name.to_string(),
            });
        }

        if !self.entries.contains_key(&key) {
            self.by_name.insert(name.to_string(), key.clone());
        }
        let entry = self.entries.entry(key.clone()).or_insert_with(|| Entry {
            base: Arc::new(BaseTranslation::from_name(name, config)),
            overrides: DescriptorOverrides::default(),
            discovered: false,
        });

        entry.overrides.merge(overrides);
        Ok(entry.resolve(&key))
    }

    pub fn get(&self, key: &ResourceKey) -> Option<ResourceDescriptor> {
        self.entries.get(key).map(|entry| entry.resolve(key))
    }

    /// Registers a descriptor built outside the registry.
    ///
    /// A new key takes the descriptor as its base. For a known key of the
    /// same name the descriptor's flags are layered on as overrides; the
    /// base is never replaced.
    pub fn put(&mut self, descriptor: &ResourceDescriptor) -> Result<()> {
        let flags = DescriptorOverrides {
            key: None,
            kind: Some(descriptor.kind),
            target: Some(descriptor.target),
            cacheable: Some(descriptor.cacheable),
            parent: descriptor.parent.clone(),
        };

        if let Some(entry) = self.entries.get_mut(&descriptor.key) {
            if entry.base.name != descriptor.name {
                return Err(LoadError::DuplicateKeyCollision {
                    key: descriptor.key.clone(),
                    existing: entry.base.name.clone(),
                    incoming: descriptor.name.clone(),
                });
            }
            entry.overrides.merge(&flags);
            entry.discovered |= descriptor.discovered;
            return Ok(());
        }

        let base = BaseTranslation {
            name: descriptor.name.clone(),
            path: descriptor.path.clone(),
            file: descriptor.file.clone(),
            uri: descriptor.uri.clone(),
            kind: descriptor.kind,
            cacheable: descriptor.cacheable,
            target: descriptor.target,
        };
        let overrides = DescriptorOverrides {
            parent: descriptor.parent.clone(),
            ..Default::default()
        };
        self.by_name
            .insert(descriptor.name.clone(), descriptor.key.clone());
        self.entries.insert(
            descriptor.key.clone(),
            Entry {
                base: Arc::new(base),
                overrides,
                discovered: descriptor.discovered,
            },
        );
        Ok(())
    }

    pub fn mark_discovered(&mut self, key: &ResourceKey) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.discovered = true;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dotted() -> LoaderConfig {
        LoaderConfig {
            delimiter: ".".into(),
            extension: Some(".js".into()),
            ..Default::default()
        }
    }

    #[test]
    fn translates_packages_into_paths() {
        let base = BaseTranslation::from_name("app.ui.Feedback", &dotted());
        assert_eq!(base.path, "app/ui/");
        assert_eq!(base.file, "Feedback.js");
        assert_eq!(base.uri, "app/ui/Feedback.js");
        assert_eq!(base.kind, ResourceKind::Executable);
    }

    #[test]
    fn top_level_names_have_no_path() {
        let base = BaseTranslation::from_name("theme.css", &LoaderConfig::default());
        assert_eq!(base.path, "");
        assert_eq!(base.uri, "theme.css");
        assert_eq!(base.kind, ResourceKind::Style);
    }

    #[test]
    fn extension_is_not_doubled() {
        let config = LoaderConfig {
            extension: Some(".js".into()),
            ..Default::default()
        };
        let base = BaseTranslation::from_name("lib/a.js", &config);
        assert_eq!(base.uri, "lib/a.js");
    }

    #[test]
    fn overrides_accumulate_on_the_same_key() {
        let mut registry = Registry::new();
        let config = LoaderConfig::default();

        registry
            .translate(
                "a.js",
                &DescriptorOverrides {
                    target: Some(PlacementTarget::Body),
                    ..Default::default()
                },
                &config,
            )
            .unwrap();
        let second = registry
            .translate(
                "a.js",
                &DescriptorOverrides {
                    cacheable: Some(false),
                    ..Default::default()
                },
                &config,
            )
            .unwrap();

        assert_eq!(second.target, PlacementTarget::Body);
        assert!(!second.cacheable);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn base_is_fixed_at_first_translation() {
        let mut registry = Registry::new();
        registry
            .translate("a", &DescriptorOverrides::default(), &dotted())
            .unwrap();
        let again = registry
            .translate(
                "a",
                &DescriptorOverrides::default(),
                &LoaderConfig::default(),
            )
            .unwrap();
        assert_eq!(again.uri, "a.js");
    }

    #[test]
    fn explicit_key_collision_fails_fast() {
        let mut registry = Registry::new();
        let config = LoaderConfig::default();
        let pinned = DescriptorOverrides {
            key: Some(ResourceKey::new("main").unwrap()),
            ..Default::default()
        };

        registry.translate("a.js", &pinned, &config).unwrap();
        let err = registry.translate("b.js", &pinned, &config).unwrap_err();

        assert_eq!(
            err,
            LoadError::DuplicateKeyCollision {
                key: ResourceKey::new("main").unwrap(),
                existing: "a.js".into(),
                incoming: "b.js".into(),
            }
        );
    }

    #[test]
    fn a_pinned_name_keeps_its_key() {
        let mut registry = Registry::new();
        let config = LoaderConfig::default();
        let pinned = DescriptorOverrides {
            key: Some(ResourceKey::new("main").unwrap()),
            ..Default::default()
        };
        registry.translate("a.js", &pinned, &config).unwrap();

        let plain = registry
            .translate("a.js", &DescriptorOverrides::default(), &config)
            .unwrap();
        assert_eq!(plain.key.as_str(), "main");
    }

    #[test]
    fn put_layers_flags_without_replacing_the_base() {
        let mut registry = Registry::new();
        let config = LoaderConfig::default();
        let mut descriptor = registry
            .translate("a.js", &DescriptorOverrides::default(), &config)
            .unwrap();

        descriptor.uri = "elsewhere.js".into();
        descriptor.target = PlacementTarget::Body;
        registry.put(&descriptor).unwrap();

        let stored = registry.get(&descriptor.key).unwrap();
        assert_eq!(stored.uri, "a.js");
        assert_eq!(stored.target, PlacementTarget::Body);
    }
}
