use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_TRIGGER_PHRASE: &str = "@gitlin";
pub const DEFAULT_EXTRACT_COMMAND: &str = "claude";

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    pub github: Option<GitHubConfig>,
    pub linear: Option<LinearConfig>,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
    /// Requested label name -> tracker label names it expands to.
    #[serde(default)]
    pub labels: HashMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct GitHubConfig {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct LinearConfig {
    pub api_key: String,
    #[serde(default)]
    pub team_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_trigger_phrase")]
    pub trigger_phrase: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            trigger_phrase: default_trigger_phrase(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ExtractConfig {
    #[serde(default = "default_extract_command")]
    pub command: String,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            command: default_extract_command(),
        }
    }
}

fn default_trigger_phrase() -> String {
    DEFAULT_TRIGGER_PHRASE.to_string()
}

fn default_extract_command() -> String {
    DEFAULT_EXTRACT_COMMAND.to_string()
}

fn config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".gitlin")
        .join("config.toml")
}

/// `~/.gitlin/config.toml` with environment overrides applied.
pub fn load_config() -> Result<AppConfig> {
    let mut config = load_config_from(&config_path())?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    let config: AppConfig =
        toml::from_str(&contents).with_context(|| "Failed to parse config.toml")?;
    Ok(config)
}

/// Environment wins over the file. `lookup` is `std::env::var` outside tests.
pub fn apply_env_overrides(config: &mut AppConfig, lookup: impl Fn(&str) -> Option<String>) {
    let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(token) = lookup("GITHUB_TOKEN") {
        config.github = Some(GitHubConfig { token });
    }
    if let Some(api_key) = lookup("LINEAR_API_KEY") {
        match config.linear.as_mut() {
            Some(linear) => linear.api_key = api_key,
            None => {
                config.linear = Some(LinearConfig {
                    api_key,
                    team_id: String::new(),
                })
            }
        }
    }
    if let Some(team_id) = lookup("LINEAR_TEAM_ID") {
        if let Some(linear) = config.linear.as_mut() {
            linear.team_id = team_id;
        }
    }
    if let Some(trigger) = lookup("GITLIN_TRIGGER") {
        config.sync.trigger_phrase = trigger;
    }
}
