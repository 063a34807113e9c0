//! Configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (nested keys separated by `__`, e.g.
//! `APP_RETRIEVAL__SCORE_THRESHOLD`).

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?.validate()?;
        Ok(config)
    }

    /// Build from an explicit figment, e.g. a single TOML file in tests.
    pub fn from_figment(figment: Figment) -> Self {
        Self { figment: Figment::from(Serialized::defaults(Settings::default())).merge(figment) }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{}': {}", key, e)))
    }

    pub fn settings(&self) -> Result<Settings> {
        self.figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))
    }
}

/// Typed view over the whole configuration tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub retrieval: RetrievalSettings,
    pub classifier: ClassifierSettings,
    pub llm: LlmSettings,
    pub data: DataSettings,
    pub embed: EmbedSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        let r = &self.retrieval;
        if !(0.0..=1.0).contains(&r.score_threshold) {
            return Err(Error::InvalidConfig(format!(
                "retrieval.score_threshold must be within [0, 1], got {}",
                r.score_threshold
            )));
        }
        if r.min_good_results == 0 {
            return Err(Error::InvalidConfig("retrieval.min_good_results must be at least 1".into()));
        }
        if r.fanout_factor == 0 {
            return Err(Error::InvalidConfig("retrieval.fanout_factor must be at least 1".into()));
        }
        let c = &self.classifier;
        if c.min_keywords > c.max_keywords {
            return Err(Error::InvalidConfig(format!(
                "classifier.min_keywords ({}) exceeds classifier.max_keywords ({})",
                c.min_keywords, c.max_keywords
            )));
        }
        if c.timeout_secs == 0 {
            return Err(Error::InvalidConfig("classifier.timeout_secs must be at least 1".into()));
        }
        Ok(())
    }
}

/// Orchestrator tunables. Fixed per process, never per query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub score_threshold: f32,
    pub min_good_results: usize,
    /// Per-level fan-out is `limit * fanout_factor`.
    pub fanout_factor: usize,
    pub max_parents: usize,
    pub parent_excerpt_chars: usize,
    pub default_limit: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            score_threshold: 0.65,
            min_good_results: 2,
            fanout_factor: 2,
            max_parents: 3,
            parent_excerpt_chars: 800,
            default_limit: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    pub history_turns: usize,
    pub min_keywords: usize,
    pub max_keywords: usize,
    pub timeout_secs: u64,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self { history_turns: 3, min_keywords: 5, max_keywords: 10, timeout_secs: 20 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434/v1".to_string(),
            model: "llama3.1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub lancedb_dir: String,
    pub table: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self { lancedb_dir: "../dev_data/indexes/lancedb".to_string(), table: "hierarchy".to_string() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedSettings {
    pub use_fake: bool,
    pub model_dir: Option<String>,
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
