use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};

/// Pollution API connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// Page size used when a request does not specify `limit`.
    pub default_limit: u32,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            username: String::new(),
            password: String::new(),
            default_limit: 10,
        }
    }
}

impl UpstreamConfig {
    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

/// Description lookup (MediaWiki API) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    pub api_url: String,
    pub user_agent: String,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            api_url: "https://en.wikipedia.org/w/api.php".to_string(),
            user_agent: concat!("pollution-cli/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub pollution_ttl_secs: u64,
    pub description_ttl_secs: u64,
    /// Seconds subtracted from a token's lifetime to force an early refresh.
    pub token_buffer_secs: u64,
    /// Lower bound for the token TTL when the buffer eats the whole lifetime.
    pub token_min_ttl_secs: u64,
    /// Full cache clear period while serving; 0 disables it.
    pub clear_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            pollution_ttl_secs: 600,
            description_ttl_secs: 3600,
            token_buffer_secs: 60,
            token_min_ttl_secs: 10,
            clear_interval_secs: 86_400,
        }
    }
}

impl CacheConfig {
    pub fn pollution_ttl(&self) -> Duration {
        Duration::from_secs(self.pollution_ttl_secs)
    }

    pub fn description_ttl(&self) -> Duration {
        Duration::from_secs(self.description_ttl_secs)
    }

    pub fn clear_interval(&self) -> Option<Duration> {
        (self.clear_interval_secs > 0).then(|| Duration::from_secs(self.clear_interval_secs))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// [upstream]
/// base_url = "https://pollution.example.com"
/// username = "user"
/// password = "secret"
///
/// [cache]
/// description_ttl_secs = 3600
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub upstream: UpstreamConfig,
    pub lookup: LookupConfig,
    pub cache: CacheConfig,
    pub server: ServerConfig,
}

impl Config {
    /// Load config from disk, or return defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "pollution", "pollution-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(url) = get("POLLUTION_API_URL") {
            self.upstream.base_url = url;
        }
        if let Some(username) = get("POLLUTION_USERNAME") {
            self.upstream.username = username;
        }
        if let Some(password) = get("POLLUTION_PASSWORD") {
            self.upstream.password = password;
        }
        if let Some(addr) = get("BIND_ADDR") {
            self.server.bind_addr = addr;
        }
        if let Some(port) = get("PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("PORT must be a valid port number, got '{port}'"))?;
        }

        Ok(())
    }

    /// Fail early with a hint when the pipeline cannot possibly authenticate.
    pub fn ensure_credentials(&self) -> Result<()> {
        if self.upstream.has_credentials() {
            return Ok(());
        }

        Err(anyhow!(
            "No pollution API credentials configured.\n\
             Hint: run `pollution configure` or set POLLUTION_USERNAME and POLLUTION_PASSWORD."
        ))
    }
}
