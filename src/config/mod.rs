//! Configuration loading for the content pipeline service.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `PIPELINE_`, producing a typed [`AppConfig`]. A handful of unprefixed
//! variables shared with the rest of the platform are honoured as fallbacks.

use std::{collections::BTreeMap, env, fmt, net::SocketAddr, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

const PREFIX: &str = "PIPELINE_";
const REDACTED: &str = "[REDACTED]";
const MAX_STORE_TIMEOUT_MS: u64 = 300_000;

/// Unprefixed variables read as fallbacks, in precedence order per setting.
const STORE_URL_FALLBACKS: &[&str] = &[
    "SUPABASE_URL",
    "SUPABASE_PROJECT_URL",
    "NEXT_PUBLIC_SUPABASE_URL",
];
const STORE_PROJECT_REF: &str = "SUPABASE_PROJECT_REF";
const STORE_API_KEY_FALLBACKS: &[&str] = &["SUPABASE_SECRET_API_KEY"];
const SERVICE_TOKEN_FALLBACKS: &[&str] = &["DB_API_SERVICE_TOKEN", "API_SERVICE_TOKEN"];

/// Which [`Store`](crate::store::Store) implementation backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgrest,
    Memory,
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBackend::Postgrest => f.write_str("postgrest"),
            StoreBackend::Memory => f.write_str("memory"),
        }
    }
}

/// Application configuration derived from `PIPELINE_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_api_bind_addr")]
    pub api_bind_addr: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_store_backend")]
    pub store_backend: StoreBackend,
    /// Base project URL of the hosted store, without the REST path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_api_key: Option<String>,
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_tokens: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            api_bind_addr: default_api_bind_addr(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            store_backend: default_store_backend(),
            store_url: None,
            store_api_key: None,
            store_timeout_ms: default_store_timeout_ms(),
            service_tokens: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Returns the configured bind address as a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.api_bind_addr
            .parse()
            .map_err(|source| ConfigError::InvalidBindAddr {
                value: self.api_bind_addr.clone(),
                source,
            })
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Returns a redacted JSON representation (secrets are redacted).
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        let mut config = self.clone();
        if !config.service_tokens.is_empty() {
            config.service_tokens = vec![REDACTED.to_string()];
        }
        if config.store_api_key.is_some() {
            config.store_api_key = Some(REDACTED.to_string());
        }
        serde_json::to_string_pretty(&config)
    }

    /// Validates the configuration, returning an error if required settings are missing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_tokens.is_empty() {
            return Err(ConfigError::MissingServiceTokens);
        }

        if !matches!(self.log_format.as_str(), "json" | "pretty") {
            return Err(ConfigError::InvalidLogFormat {
                value: self.log_format.clone(),
            });
        }

        if self.store_timeout_ms == 0 || self.store_timeout_ms > MAX_STORE_TIMEOUT_MS {
            return Err(ConfigError::InvalidStoreTimeout {
                value: self.store_timeout_ms,
            });
        }

        if let Some(store_url) = &self.store_url {
            validate_store_url(store_url)?;
        }

        if self.store_backend == StoreBackend::Postgrest {
            if self.store_url.is_none() {
                return Err(ConfigError::MissingStoreUrl);
            }
            if self.store_api_key.is_none() {
                return Err(ConfigError::MissingStoreApiKey);
            }
        }

        self.bind_addr()?;
        Ok(())
    }
}

fn validate_store_url(value: &str) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidStoreUrl {
        value: value.to_string(),
        reason: reason.to_string(),
    };
    let url = Url::parse(value).map_err(|err| invalid(&err.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host"));
    }
    Ok(())
}

fn default_profile() -> String {
    "local".to_string()
}

fn default_api_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_store_backend() -> StoreBackend {
    StoreBackend::Postgrest
}

fn default_store_timeout_ms() -> u64 {
    30_000
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("invalid api bind address '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        source: std::net::AddrParseError,
    },
    #[error("no service tokens configured; set PIPELINE_SERVICE_TOKEN or PIPELINE_SERVICE_TOKENS")]
    MissingServiceTokens,
    #[error("store URL is missing; set PIPELINE_STORE_URL or SUPABASE_URL")]
    MissingStoreUrl,
    #[error("store API key is missing; set PIPELINE_STORE_API_KEY or SUPABASE_SECRET_API_KEY")]
    MissingStoreApiKey,
    #[error("invalid store URL '{value}': {reason}")]
    InvalidStoreUrl { value: String, reason: String },
    #[error("store backend must be 'postgrest' or 'memory', got '{value}'")]
    InvalidStoreBackend { value: String },
    #[error("store timeout must be between 1 and 300000 milliseconds, got {value}")]
    InvalidStoreTimeout { value: u64 },
    #[error("log format must be 'json' or 'pretty', got '{value}'")]
    InvalidLogFormat { value: String },
}

/// Values gathered from every layer before they are typed.
#[derive(Debug, Default)]
struct Layers {
    /// `PIPELINE_*` keys with the prefix stripped.
    prefixed: BTreeMap<String, String>,
    /// Recognised unprefixed fallback keys.
    fallbacks: BTreeMap<String, String>,
}

impl Layers {
    fn absorb(&mut self, key: String, value: String) {
        if let Some(stripped) = key.strip_prefix(PREFIX) {
            self.prefixed.insert(stripped.to_string(), value);
        } else if is_fallback_key(&key) {
            self.fallbacks.insert(key, value);
        }
    }

    fn take(&mut self, key: &str) -> Option<String> {
        self.prefixed
            .remove(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn fallback(&self, keys: &[&str]) -> Option<String> {
        keys.iter()
            .filter_map(|key| self.fallbacks.get(*key))
            .map(|v| v.trim().to_string())
            .find(|v| !v.is_empty())
    }
}

fn is_fallback_key(key: &str) -> bool {
    key == STORE_PROJECT_REF
        || STORE_URL_FALLBACKS.contains(&key)
        || STORE_API_KEY_FALLBACKS.contains(&key)
        || SERVICE_TOKEN_FALLBACKS.contains(&key)
}

/// Loads configuration using layered `.env` files and `PIPELINE_*` env vars.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Loads configuration from the dotenv layers and the process environment.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        self.load_from(env::vars())
    }

    /// Loads configuration from the dotenv layers with `vars` standing in for
    /// the process environment.
    pub fn load_from<I>(&self, vars: I) -> Result<AppConfig, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let process: BTreeMap<String, String> = vars.into_iter().collect();
        let mut layers = self.collect_layered_env(&process)?;

        // Overlay process environment last so it wins.
        for (key, value) in process {
            layers.absorb(key, value);
        }

        let profile = layers.take("PROFILE").unwrap_or_else(default_profile);
        let api_bind_addr = layers
            .take("API_BIND_ADDR")
            .unwrap_or_else(default_api_bind_addr);
        let log_level = layers.take("LOG_LEVEL").unwrap_or_else(default_log_level);
        let log_format = layers
            .take("LOG_FORMAT")
            .map(|v| v.to_ascii_lowercase())
            .unwrap_or_else(default_log_format);

        let store_backend = match layers.take("STORE_BACKEND") {
            None => default_store_backend(),
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "postgrest" => StoreBackend::Postgrest,
                "memory" => StoreBackend::Memory,
                _ => return Err(ConfigError::InvalidStoreBackend { value }),
            },
        };

        let store_url = layers
            .take("STORE_URL")
            .or_else(|| layers.fallback(STORE_URL_FALLBACKS))
            .or_else(|| {
                layers
                    .fallback(&[STORE_PROJECT_REF])
                    .map(|project_ref| format!("https://{}.supabase.co", project_ref))
            })
            .map(|url| url.trim_end_matches('/').to_string());
        let store_api_key = layers
            .take("STORE_API_KEY")
            .or_else(|| layers.fallback(STORE_API_KEY_FALLBACKS));
        let store_timeout_ms = match layers.take("STORE_TIMEOUT_MS") {
            None => default_store_timeout_ms(),
            // An unparsable value is reported by validate() as out of range.
            Some(value) => value.parse().unwrap_or(0),
        };

        // Handle service tokens - support both single token and comma-separated list
        let service_tokens = if let Some(tokens) = layers.take("SERVICE_TOKENS") {
            tokens
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        } else if let Some(token) = layers.take("SERVICE_TOKEN") {
            vec![token]
        } else if let Some(token) = layers.fallback(SERVICE_TOKEN_FALLBACKS) {
            vec![token]
        } else {
            Vec::new()
        };

        Ok(AppConfig {
            profile,
            api_bind_addr,
            log_level,
            log_format,
            store_backend,
            store_url,
            store_api_key,
            store_timeout_ms,
            service_tokens,
        })
    }

    fn collect_layered_env(
        &self,
        process: &BTreeMap<String, String>,
    ) -> Result<Layers, ConfigError> {
        let mut layers = Layers::default();

        self.merge_dotenv(self.base_dir.join(".env"), &mut layers)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut layers)?;

        let profile = process
            .get("PIPELINE_PROFILE")
            .or_else(|| layers.prefixed.get("PROFILE"))
            .filter(|v| !v.is_empty())
            .cloned()
            .unwrap_or_else(default_profile);

        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}", &profile)),
            &mut layers,
        )?;
        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}.local", &profile)),
            &mut layers,
        )?;

        Ok(layers)
    }

    fn merge_dotenv(&self, path: PathBuf, layers: &mut Layers) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    layers.absorb(key, value);
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
