//! Layered configuration loader and path helpers.
//!
//! Uses Figment to merge `blender.toml` + `blender.<env>.toml` + `APP_*` env
//! vars. Provides helpers to expand `~` and `${VAR}` and to resolve relative
//! paths (such as a separate mappings file) against the config directory.
use anyhow::{anyhow, bail};
use figment::{
    providers::{Env, Format, Json, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};

/// One secondary backend taking part in blending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    pub id: String,
    pub label: String,
}

/// Interleaving settings of the aggregating backend.
///
/// - `initial_results`: backend ids forced at the first positions
/// - `block_size`: records taken from one backend before switching
/// - `adaptive_block_sizes`: `"from-to:size"` overrides keyed on total hits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendingConfig {
    pub initial_results: Vec<String>,
    pub block_size: usize,
    pub adaptive_block_sizes: Vec<String>,
}

impl Default for BlendingConfig {
    fn default() -> Self {
        Self { initial_results: Vec::new(), block_size: 10, adaptive_block_sizes: Vec::new() }
    }
}

pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("blender.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("blender.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("blender.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("blender.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment, base_dir: PathBuf::from(".") };
        config.validate_for_env(&env_name)?;
        Ok(config)
    }

    /// Load a single TOML or JSON file (chosen by extension).
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            bail!("Config file {} does not exist", path.display());
        }
        let figment = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Figment::new().merge(Json::file(path)),
            _ => Figment::new().merge(Toml::file(path)),
        };
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
        let config = Self { figment, base_dir };
        config.validate_for_env("")?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment, base_dir: PathBuf) -> Self {
        Self { figment, base_dir }
    }

    pub fn figment(&self) -> &Figment {
        &self.figment
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Deserialize the whole merged configuration.
    pub fn extract<T>(&self) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract()
            .map_err(|e| anyhow!("Failed to extract configuration: {}", e))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.figment.find_value(key).is_ok()
    }

    pub fn backends(&self) -> anyhow::Result<Vec<BackendConfig>> {
        if !self.contains("backends") {
            return Ok(Vec::new());
        }
        self.get("backends")
    }

    pub fn blending(&self) -> anyhow::Result<BlendingConfig> {
        if !self.contains("blending") {
            return Ok(BlendingConfig::default());
        }
        self.get("blending")
    }

    pub fn resolve_path<S: AsRef<str>>(&self, p: S) -> PathBuf {
        resolve_with_base(&self.base_dir, p)
    }

    fn validate_for_env(&self, env: &str) -> anyhow::Result<()> {
        let backends = self.backends()?;
        let mut seen = HashSet::new();
        for b in &backends {
            if b.id.is_empty() {
                bail!("Backend with label '{}' has an empty id", b.label);
            }
            if !seen.insert(b.id.as_str()) {
                bail!("Backend '{}' configured twice", b.id);
            }
        }
        match env {
            "prod" | "production" if backends.is_empty() => {
                bail!("No blended backends configured for production")
            }
            _ => {}
        }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
