//! FieldMaskRegistry - merged per-resource-type field filters

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use eyre::{Context, Result};
use tracing::{debug, info};

use super::api::{field_to_api_form, path_to_api_form};
use crate::config::MaskConfig;
use crate::domain::resource_type_of;

/// Normalize a field path to `a/b/c`
///
/// A path containing `/` is split on `/` only, so dotted names such as
/// `kubectl.kubernetes.io/last-applied-configuration` stay whole. A path
/// without `/` is read in dotted form.
pub fn normalize_path(path: &str) -> String {
    let separator = if path.contains('/') { '/' } else { '.' };
    path.split(separator)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Fields excluded from diffing, by full path and by leaf key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMask {
    pub paths: BTreeSet<String>,
    pub keys: BTreeSet<String>,
}

impl FieldMask {
    pub fn new<P, K>(paths: P, keys: K) -> Self
    where
        P: IntoIterator,
        P::Item: AsRef<str>,
        K: IntoIterator,
        K::Item: AsRef<str>,
    {
        let mut mask = Self::default();
        mask.add_paths(paths);
        mask.add_keys(keys);
        mask
    }

    pub fn add_paths<I>(&mut self, paths: I)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.paths.extend(paths.into_iter().map(|p| normalize_path(p.as_ref())));
    }

    pub fn add_keys<I>(&mut self, keys: I)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.keys.extend(keys.into_iter().map(|k| k.as_ref().to_string()));
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty() && self.keys.is_empty()
    }

    /// Whether the field at `path` (with leaf name `key`) is excluded
    pub fn excludes(&self, path: &str, key: &str) -> bool {
        self.keys.contains(key) || self.paths.contains(path)
    }

    /// Same mask in API-form naming
    pub fn to_api_form(&self) -> Self {
        Self {
            paths: self.paths.iter().map(|p| path_to_api_form(p)).collect(),
            keys: self.keys.iter().map(|k| field_to_api_form(k)).collect(),
        }
    }
}

/// Both representations of the mask for one resource type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaskSet {
    pub native: FieldMask,
    pub api: FieldMask,
}

impl MaskSet {
    fn from_native(native: FieldMask) -> Self {
        let api = native.to_api_form();
        Self { native, api }
    }
}

/// Merged masks keyed by resource type
///
/// Every type-specific mask includes the common mask; types with no entry of
/// their own fall back to the common mask alone.
#[derive(Debug, Clone, Default)]
pub struct FieldMaskRegistry {
    common: MaskSet,
    by_type: HashMap<String, MaskSet>,
}

impl FieldMaskRegistry {
    /// Registry holding only a common mask
    pub fn new(common: FieldMask) -> Self {
        Self {
            common: MaskSet::from_native(common),
            by_type: HashMap::new(),
        }
    }

    /// Merge extra paths into one resource type's mask
    pub fn with_resource_paths<I>(mut self, resource_type: &str, paths: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut native = self.native_for(resource_type);
        native.add_paths(paths);
        self.by_type
            .insert(resource_type.to_string(), MaskSet::from_native(native));
        self
    }

    /// Merge extra keys into one resource type's mask
    pub fn with_resource_keys<I>(mut self, resource_type: &str, keys: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut native = self.native_for(resource_type);
        native.add_keys(keys);
        self.by_type
            .insert(resource_type.to_string(), MaskSet::from_native(native));
        self
    }

    fn native_for(&self, resource_type: &str) -> FieldMask {
        self.by_type
            .get(resource_type)
            .map(|set| set.native.clone())
            .unwrap_or_else(|| self.common.native.clone())
    }

    /// Build the registry from configuration, merging in a learned mask file if set
    pub fn from_config(config: &MaskConfig) -> Result<Self> {
        let mut registry = Self::new(FieldMask::new(&config.common_paths, &config.common_keys));

        for (resource_type, paths) in &config.resource_paths {
            registry = registry.with_resource_paths(resource_type, paths);
        }
        for (resource_type, keys) in &config.resource_keys {
            registry = registry.with_resource_keys(resource_type, keys);
        }

        if let Some(path) = &config.learned_mask_file {
            let learned = load_learned_masks(path)?;
            info!(path = %path.display(), types = learned.len(), "Merging learned field masks");
            for (resource_type, paths) in learned {
                registry = registry.with_resource_paths(&resource_type, paths);
            }
        }

        debug!(types = registry.by_type.len(), "FieldMaskRegistry::from_config: built");
        Ok(registry)
    }

    /// Masks for the type of `resource_key`
    pub fn for_resource_key(&self, resource_key: &str) -> MaskSet {
        self.for_resource_type(resource_type_of(resource_key))
    }

    pub fn for_resource_type(&self, resource_type: &str) -> MaskSet {
        self.by_type
            .get(resource_type)
            .cloned()
            .unwrap_or_else(|| self.common.clone())
    }

    /// Resource types with a mask of their own, sorted
    pub fn resource_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.by_type.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

/// Learned masks file: `{ "<resource type>": ["path", ...], ... }`
fn load_learned_masks(path: &Path) -> Result<HashMap<String, Vec<String>>> {
    let content = fs::read_to_string(path).context(format!("Failed to read mask file {}", path.display()))?;
    serde_json::from_str(&content).context(format!("Failed to parse mask file {}", path.display()))
}
