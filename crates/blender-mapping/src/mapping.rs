//! Immutable mapping table shared by every request.
//!
//! Built once from a [`RawMappings`] structure and then only read; it is
//! `Send + Sync` and meant to be shared behind an `Arc`.

use anyhow::Context;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use blender_core::config::Config;
use blender_core::types::BackendId;
use blender_core::{Error, Result};

use crate::raw::{RawBackendMapping, RawIgnore, RawMappings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FacetType {
    #[default]
    Normal,
    Boolean,
    Hierarchical,
}

impl FacetType {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "" | "normal" => Ok(Self::Normal),
            "boolean" => Ok(Self::Boolean),
            "hierarchical" => Ok(Self::Hierarchical),
            other => Err(Error::InvalidConfig(format!("Unknown facet type '{other}'"))),
        }
    }
}

/// A single search/replace applied to the canonical value.
#[derive(Debug, Clone)]
pub struct RegexRewrite {
    pattern: Regex,
    replace: String,
}

impl RegexRewrite {
    pub fn new(search: &str, replace: impl Into<String>) -> Result<Self> {
        let pattern = Regex::new(search)
            .map_err(|e| Error::InvalidConfig(format!("Invalid rewrite pattern '{search}': {e}")))?;
        Ok(Self { pattern, replace: replace.into() })
    }

    /// The rewritten value, or `None` when the pattern does not match.
    pub fn apply(&self, value: &str) -> Option<String> {
        if !self.pattern.is_match(value) {
            return None;
        }
        Some(self.pattern.replace_all(value, self.replace.as_str()).into_owned())
    }
}

/// Values for which a backend must not be filtered at all.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IgnoreRule {
    #[default]
    Never,
    Always,
    Values(Vec<String>),
}

impl IgnoreRule {
    pub fn matches(&self, value: &str) -> bool {
        match self {
            Self::Never => false,
            Self::Always => true,
            Self::Values(values) => values.iter().any(|v| v == value),
        }
    }
}

impl From<RawIgnore> for IgnoreRule {
    fn from(raw: RawIgnore) -> Self {
        match raw {
            RawIgnore::Flag(true) => Self::Always,
            RawIgnore::Flag(false) => Self::Never,
            RawIgnore::Values(values) => Self::Values(values),
            RawIgnore::Value(value) => Self::Values(vec![value]),
        }
    }
}

/// How one canonical facet field looks in one backend.
///
/// `value_rewrites` maps native values to canonical ones; an empty
/// `native_field` means the backend cannot honor the field.
#[derive(Debug, Clone, Default)]
pub struct BackendFacetMapping {
    pub native_field: String,
    pub value_rewrites: Vec<(String, String)>,
    pub regex_rewrites: Vec<RegexRewrite>,
    pub default_value: Option<String>,
    pub ignore: IgnoreRule,
    pub hierarchical: bool,
}

impl BackendFacetMapping {
    pub fn new(native_field: impl Into<String>) -> Self {
        Self { native_field: native_field.into(), ..Self::default() }
    }

    pub fn with_value(mut self, native: impl Into<String>, canonical: impl Into<String>) -> Self {
        self.value_rewrites.push((native.into(), canonical.into()));
        self
    }

    pub fn with_regex(mut self, search: &str, replace: &str) -> Result<Self> {
        self.regex_rewrites.push(RegexRewrite::new(search, replace)?);
        Ok(self)
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn with_ignore(mut self, rule: IgnoreRule) -> Self {
        self.ignore = rule;
        self
    }

    pub fn hierarchical(mut self) -> Self {
        self.hierarchical = true;
        self
    }

    /// Canonical value for a native facet value, if the table rewrites it.
    pub fn canonical_value(&self, native: &str) -> Option<&str> {
        self.value_rewrites
            .iter()
            .find(|(n, _)| n == native)
            .map(|(_, c)| c.as_str())
    }

    fn from_raw(raw: RawBackendMapping) -> Result<Self> {
        let regex_rewrites = raw
            .regex
            .iter()
            .map(|r| RegexRewrite::new(&r.search, r.replace.clone()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            native_field: raw.field,
            value_rewrites: raw.values.into_iter().collect(),
            regex_rewrites,
            default_value: raw.default,
            ignore: raw.ignore.into(),
            hierarchical: raw.hierarchical,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct FacetFieldMapping {
    pub facet_type: FacetType,
    pub per_backend: BTreeMap<BackendId, BackendFacetMapping>,
}

impl FacetFieldMapping {
    pub fn new(facet_type: FacetType) -> Self {
        Self { facet_type, per_backend: BTreeMap::new() }
    }

    pub fn with_backend(mut self, backend: impl Into<BackendId>, mapping: BackendFacetMapping) -> Self {
        self.per_backend.insert(backend.into(), mapping);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct MappingTable {
    pub(crate) facet_fields: BTreeMap<String, FacetFieldMapping>,
    pub(crate) search_type_fields: BTreeMap<String, BTreeMap<BackendId, String>>,
    pub(crate) sort_fields: BTreeMap<String, BTreeMap<BackendId, String>>,
}

impl MappingTable {
    pub fn builder() -> MappingTableBuilder {
        MappingTableBuilder::default()
    }

    pub fn from_raw(raw: RawMappings) -> Result<Self> {
        let mut facet_fields = BTreeMap::new();
        for (name, field) in raw.facets {
            let facet_type = FacetType::parse(field.facet_type.as_deref().unwrap_or_default())?;
            let mut mapping = FacetFieldMapping::new(facet_type);
            for (backend, raw_backend) in field.backends {
                mapping.per_backend.insert(backend, BackendFacetMapping::from_raw(raw_backend)?);
            }
            facet_fields.insert(name, mapping);
        }
        Ok(Self { facet_fields, search_type_fields: raw.search, sort_fields: raw.sorting })
    }

    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        let raw: RawMappings = serde_json::from_value(value)
            .map_err(|e| Error::InvalidConfig(format!("Invalid mappings: {e}")))?;
        Self::from_raw(raw)
    }

    /// Load mappings from `mappings_file` (resolved against the config
    /// directory) or from the inline `[mappings]` section.
    ///
    /// Inline tables pass through the layered config, which sorts keys; value
    /// tables keep their written order only when read from `mappings_file`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let raw: RawMappings = if config.contains("mappings_file") {
            let file: String = config.get("mappings_file")?;
            Self::read_file(&config.resolve_path(file))?
        } else if config.contains("mappings") {
            config.get("mappings")?
        } else {
            RawMappings::default()
        };
        Ok(Self::from_raw(raw)?)
    }

    fn read_file(path: &Path) -> anyhow::Result<RawMappings> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read mappings file {}", path.display()))?;
        let raw: RawMappings = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&text)
                .with_context(|| format!("Invalid mappings file {}", path.display()))?,
            _ => toml::from_str(&text).with_context(|| format!("Invalid mappings file {}", path.display()))?,
        };
        Ok(raw)
    }

    pub fn facet_field(&self, field: &str) -> Option<&FacetFieldMapping> {
        self.facet_fields.get(field)
    }

    pub fn facet_fields(&self) -> impl Iterator<Item = (&String, &FacetFieldMapping)> {
        self.facet_fields.iter()
    }

    pub fn backend_mapping(&self, field: &str, backend: &str) -> Option<&BackendFacetMapping> {
        self.facet_fields.get(field)?.per_backend.get(backend)
    }
}

#[derive(Debug, Default)]
pub struct MappingTableBuilder {
    table: MappingTable,
}

impl MappingTableBuilder {
    pub fn facet(mut self, field: impl Into<String>, mapping: FacetFieldMapping) -> Self {
        self.table.facet_fields.insert(field.into(), mapping);
        self
    }

    pub fn search_type(mut self, canonical: &str, backend: &str, native: &str) -> Self {
        self.table
            .search_type_fields
            .entry(canonical.to_string())
            .or_default()
            .insert(backend.to_string(), native.to_string());
        self
    }

    pub fn sort(mut self, canonical: &str, backend: &str, native: &str) -> Self {
        self.table
            .sort_fields
            .entry(canonical.to_string())
            .or_default()
            .insert(backend.to_string(), native.to_string());
        self
    }

    pub fn build(self) -> MappingTable {
        self.table
    }
}
