use std::env;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::de::DeserializeOwned;
use thiserror::Error;

pub const API_KEY_VAR: &str = "API_KEY";
pub const MODEL_VAR: &str = "MODEL";
pub const BASE_URL_VAR: &str = "BASE_URL";
pub const ROM_PATH_VAR: &str = "ROM_PATH";
pub const CONFIG_DIR_VAR: &str = "GB_BOT_CONFIG_DIR";

pub const DEFAULT_MODEL: &str = "grok-2-vision-latest";
pub const DEFAULT_BASE_URL: &str = "https://api.x.ai/v1";
pub const DEFAULT_MAX_TOKENS: u32 = 100;
pub const DEFAULT_MAX_STEPS: u64 = 10_000;
pub const DEFAULT_EMULATION_SPEED: f32 = 2.0;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("API_KEY is not set")]
    MissingApiKey,
    #[error("ROM path not provided; use --rom or set ROM_PATH")]
    MissingRomPath,
}

/// Credentials and model selection, resolved once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub max_tokens: u32,
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}

impl AgentConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_key = non_empty(lookup(API_KEY_VAR)).ok_or(ConfigError::MissingApiKey)?;
        Ok(Self {
            api_key,
            model: non_empty(lookup(MODEL_VAR)).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: non_empty(lookup(BASE_URL_VAR))
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            max_tokens: DEFAULT_MAX_TOKENS,
        })
    }
}

/// Run parameters fixed at process start.
#[derive(Debug, Clone, PartialEq)]
pub struct GameConfig {
    pub rom_path: PathBuf,
    /// Maximum number of agent actions; the run ends once this is exceeded.
    pub max_steps: u64,
    pub emulation_speed: f32,
}

impl GameConfig {
    /// The `--rom` flag wins over the environment fallback.
    pub fn resolve(
        rom_flag: Option<PathBuf>,
        rom_env: Option<String>,
        max_steps: u64,
        emulation_speed: f32,
    ) -> Result<Self, ConfigError> {
        let rom_path = rom_flag
            .filter(|p| !p.as_os_str().is_empty())
            .or_else(|| non_empty(rom_env).map(PathBuf::from))
            .ok_or(ConfigError::MissingRomPath)?;
        Ok(Self {
            rom_path,
            max_steps,
            emulation_speed,
        })
    }
}

/// TOML config file loader.
///
/// Search order for a relative path:
/// 1) `GB_BOT_CONFIG_DIR/<relative_path>`
/// 2) `./<relative_path>`
///
/// Absolute paths are used as given.
pub struct ConfigLoader;

impl ConfigLoader {
    pub fn parse_from_file<T: DeserializeOwned>(relative_path: &Path) -> anyhow::Result<T> {
        let path = Self::resolve_path(relative_path)?;
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config at {}", path.display()))?;
        Self::parse_from_str(&text)
            .with_context(|| format!("Failed to parse config at {}", path.display()))
    }

    pub fn parse_from_str<T: DeserializeOwned>(text: &str) -> anyhow::Result<T> {
        toml::from_str(text).context("Failed to parse TOML")
    }

    fn resolve_path(path: &Path) -> anyhow::Result<PathBuf> {
        if path.is_absolute() {
            if path.is_file() {
                return Ok(path.to_path_buf());
            }
            anyhow::bail!("Config file not found at {}", path.display());
        }

        if let Some(root) = env::var_os(CONFIG_DIR_VAR) {
            let candidate = PathBuf::from(root).join(path);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }

        if let Ok(cwd) = env::current_dir() {
            let candidate = cwd.join(path);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }

        anyhow::bail!("Config file not found for {:?}", path);
    }
}
