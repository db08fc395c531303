//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars.
//! Nested keys are addressed with a double underscore, so
//! `APP_SEARCH__TOP_K=10` overrides `[search] top_k`.
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::types::SearchConfig;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_from(Path::new("."), &env_name)
    }

    /// Load `config.toml` and the per-environment overlay from `dir`.
    pub fn load_from(dir: &Path, env_name: &str) -> anyhow::Result<Self> {
        let mut figment = Figment::new().merge(Toml::file(dir.join("config.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Search defaults from `[search]`, or the built-in defaults if absent.
    pub fn search_defaults(&self) -> anyhow::Result<SearchConfig> {
        if !self.figment.contains("search") {
            return Ok(SearchConfig::default());
        }
        let cfg: SearchConfig = self.get("search")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn engine_settings(&self) -> anyhow::Result<EngineSettings> {
        if !self.figment.contains("engine") {
            return Ok(EngineSettings::default());
        }
        self.get("engine")
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.figment.contains("search") {
            self.search_defaults()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    #[default]
    Memory,
    Lance,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultCacheBackend {
    #[default]
    Memory,
    None,
}

fn default_lance_dir() -> String { "~/.cache/retrieval/lancedb".to_string() }
fn default_lance_table() -> String { "chunks".to_string() }
fn default_embedding_dim() -> usize { 384 }
fn default_chunks_dir() -> String { "data/chunks".to_string() }

/// Process-level wiring read from `[engine]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    #[serde(default)]
    pub vector_backend: VectorBackend,
    #[serde(default = "default_lance_dir")]
    pub lance_dir: String,
    #[serde(default = "default_lance_table")]
    pub lance_table: String,
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,
    #[serde(default = "default_chunks_dir")]
    pub chunks_dir: String,
    #[serde(default)]
    pub result_cache: ResultCacheBackend,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            vector_backend: VectorBackend::default(),
            lance_dir: default_lance_dir(),
            lance_table: default_lance_table(),
            embedding_dim: default_embedding_dim(),
            chunks_dir: default_chunks_dir(),
            result_cache: ResultCacheBackend::default(),
        }
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
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
