//! Client configuration stored in `stepchat.toml`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Default config file name, resolved against the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "stepchat.toml";

/// Top-level configuration (TOML).
///
/// Missing fields default to values that work against the public OpenAI API.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderConfig,
}

/// Settings for the OpenAI-compatible completion provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderConfig {
    /// Base endpoint; `/chat/completions` and `/embeddings` are appended.
    pub base_url: String,

    /// Name of the environment variable holding the bearer credential.
    pub api_key_env: String,

    /// Chat model identifier.
    pub model: String,

    /// Embedding model identifier used by `stepchat embed`.
    pub embedding_model: String,

    /// Sampling temperature sent with every chat request.
    pub temperature: f32,

    /// Request completions as server-sent events and join the chunks.
    pub stream: bool,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Extra headers attached to every request (e.g. gateway routing).
    pub headers: BTreeMap<String, String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            temperature: 0.7,
            stream: false,
            request_timeout_secs: 120,
            headers: BTreeMap::new(),
        }
    }
}

impl ProviderConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(anyhow!(
                "provider.base_url must start with http:// or https://"
            ));
        }
        if self.api_key_env.trim().is_empty() {
            return Err(anyhow!("provider.api_key_env must not be empty"));
        }
        if self.model.trim().is_empty() {
            return Err(anyhow!("provider.model must not be empty"));
        }
        if self.embedding_model.trim().is_empty() {
            return Err(anyhow!("provider.embedding_model must not be empty"));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(anyhow!("provider.temperature must be within 0.0..=2.0"));
        }
        if self.request_timeout_secs == 0 {
            return Err(anyhow!("provider.request_timeout_secs must be > 0"));
        }
        if let Some(name) = self.headers.keys().find(|name| name.trim().is_empty()) {
            return Err(anyhow!("provider.headers has a blank header name {name:?}"));
        }
        Ok(())
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        self.provider.validate()
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `Config::default()`.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        let cfg = Config::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: Config =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &Config) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("stepchat.toml");
        let mut cfg = Config::default();
        cfg.provider.stream = true;
        cfg.provider
            .headers
            .insert("X-Gateway-Target".to_string(), "openrouter".to_string());
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("stepchat.toml");
        fs::write(
            &path,
            "[provider]\nmodel = \"local-model\"\n\n[provider.headers]\nX-Trace = \"on\"\n",
        )
        .expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.provider.model, "local-model");
        assert_eq!(cfg.provider.base_url, ProviderConfig::default().base_url);
        assert_eq!(cfg.provider.headers.get("X-Trace").map(String::as_str), Some("on"));
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut cfg = Config::default();
        cfg.provider.base_url = "ftp://example".to_string();
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.provider.temperature = 3.5;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("temperature"));

        let mut cfg = Config::default();
        cfg.provider.request_timeout_secs = 0;
        assert!(cfg.validate().is_err());
    }
}
