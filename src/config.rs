//! Configuration for sentinels.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (SENTINELS_HOME, SENTINELS_POLICY, SENTINELS_MODEL,
//!    SENTINELS_SEARCH, OPENAI_API_KEY), including a `.env` file
//! 2. Config file (.sentinels/config.yaml)
//! 3. Defaults (~/.sentinels)
//!
//! Config file discovery:
//! - Searches current directory and parents for .sentinels/config.yaml
//! - Paths in config file are relative to the .sentinels/ directory

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::adapters::openai::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::adapters::search::DEFAULT_ENDPOINT;
use crate::core::SafetyLimits;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub llm: Option<LlmConfig>,
    #[serde(default)]
    pub search: Option<SearchConfig>,
    #[serde(default)]
    pub safety: Option<SafetyLimits>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Engine state directory
    pub home: Option<String>,
    /// Internal policy document compared against regulations
    pub policy: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub enabled: Option<bool>,
    pub endpoint: Option<String>,
    pub timeout_seconds: Option<u64>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Engine state (checkpoints, journal)
    pub home: PathBuf,
    /// Internal policy document, if configured
    pub policy_file: Option<PathBuf>,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub llm: LlmSettings,
    pub search: SearchSettings,
    pub safety: SafetyLimits,
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    /// API key; `None` runs every stage on fallbacks
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout_seconds: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub enabled: bool,
    pub endpoint: String,
    pub timeout_seconds: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_seconds: 10,
        }
    }
}

impl ResolvedConfig {
    /// Directory holding per-session checkpoints
    pub fn checkpoints_dir(&self) -> PathBuf {
        self.home.join("checkpoints")
    }

    /// Directory holding per-session journals
    pub fn journal_dir(&self) -> PathBuf {
        self.home.join("journal")
    }
}

/// Find config file by searching `start` and its parents
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(".sentinels").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to `base`
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    // A missing .env is the normal case
    dotenvy::dotenv().ok();

    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".sentinels");

    load_config_with(&cwd, default_home, |key| std::env::var(key).ok())
}

/// Resolve configuration from an explicit working directory, default home
/// and environment lookup
fn load_config_with<F>(cwd: &Path, default_home: PathBuf, env: F) -> Result<ResolvedConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let config_file = find_config_file(cwd);
    let file = match config_file {
        Some(ref path) => Some(load_config_file(path)?),
        None => None,
    };
    let config_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .unwrap_or(cwd)
        .to_path_buf();

    let home = env("SENTINELS_HOME")
        .map(PathBuf::from)
        .or_else(|| {
            file.as_ref()
                .and_then(|f| f.paths.home.as_deref())
                .map(|h| resolve_path(&config_dir, h))
        })
        .unwrap_or(default_home);

    let policy_file = env("SENTINELS_POLICY").map(PathBuf::from).or_else(|| {
        file.as_ref()
            .and_then(|f| f.paths.policy.as_deref())
            .map(|p| resolve_path(&config_dir, p))
    });

    let mut llm = LlmSettings {
        api_key: env("OPENAI_API_KEY").filter(|k| !k.trim().is_empty()),
        ..Default::default()
    };
    if let Some(cfg) = file.as_ref().and_then(|f| f.llm.as_ref()) {
        if let Some(ref model) = cfg.model {
            llm.model = model.clone();
        }
        if let Some(ref base_url) = cfg.base_url {
            llm.base_url = base_url.clone();
        }
        if let Some(timeout) = cfg.timeout_seconds {
            llm.timeout_seconds = timeout;
        }
    }
    if let Some(model) = env("SENTINELS_MODEL") {
        llm.model = model;
    }

    let mut search = SearchSettings::default();
    if let Some(cfg) = file.as_ref().and_then(|f| f.search.as_ref()) {
        if let Some(enabled) = cfg.enabled {
            search.enabled = enabled;
        }
        if let Some(ref endpoint) = cfg.endpoint {
            search.endpoint = endpoint.clone();
        }
        if let Some(timeout) = cfg.timeout_seconds {
            search.timeout_seconds = timeout;
        }
    }
    if let Some(flag) = env("SENTINELS_SEARCH") {
        search.enabled = !matches!(flag.to_ascii_lowercase().as_str(), "0" | "off" | "false");
    }

    let safety = file
        .as_ref()
        .and_then(|f| f.safety.clone())
        .unwrap_or_default();

    Ok(ResolvedConfig {
        home,
        policy_file,
        config_file,
        llm,
        search,
        safety,
    })
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Get the checkpoints directory ($SENTINELS_HOME/checkpoints)
pub fn checkpoints_dir() -> Result<PathBuf> {
    Ok(config()?.checkpoints_dir())
}

/// Get the journal directory ($SENTINELS_HOME/journal)
pub fn journal_dir() -> Result<PathBuf> {
    Ok(config()?.journal_dir())
}
