use homedir::my_home;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_STORE_HOST: &str = "localhost";
const DEFAULT_STORE_PORT: u16 = 6333;
const DEFAULT_COLLECTION: &str = "semantic_docs";
const DEFAULT_EMBEDDING_URL: &str = "http://localhost:8001";
const DEFAULT_EMBEDDING_DIM: usize = 384;
const DEFAULT_EXA_URL: &str = "https://api.exa.ai";
const DEFAULT_LISTEN: &str = "0.0.0.0:8000";
const DEFAULT_API_URL: &str = "http://localhost:8000";
const DEFAULT_BATCH_SIZE: usize = 10;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_INGEST_TIMEOUT_SECS: u64 = 60;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("config {path:?} is malformed: {source}")]
    Malformed {
        path: PathBuf,
        source: serde_yml::Error,
    },

    #[error("environment variable {key} has invalid value {value:?}")]
    Env { key: String, value: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Qdrant,
    Memory,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "default_store_host")]
    pub host: String,
    #[serde(default = "default_store_port")]
    pub port: u16,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            host: default_store_host(),
            port: DEFAULT_STORE_PORT,
            collection: default_collection(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_url")]
    pub url: String,
    /// Vector size of the provider's model. Must match the collection.
    #[serde(default = "default_embedding_dim")]
    pub dimension: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: default_embedding_url(),
            dimension: DEFAULT_EMBEDDING_DIM,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AugmentConfig {
    /// Augmentation is disabled without a key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_exa_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_exa_url(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Where the CLI tools find the daemon.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_ingest_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            batch_size: DEFAULT_BATCH_SIZE,
            timeout_secs: DEFAULT_INGEST_TIMEOUT_SECS,
        }
    }
}

fn default_store_host() -> String {
    DEFAULT_STORE_HOST.to_string()
}

fn default_store_port() -> u16 {
    DEFAULT_STORE_PORT
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

fn default_embedding_url() -> String {
    DEFAULT_EMBEDDING_URL.to_string()
}

fn default_embedding_dim() -> usize {
    DEFAULT_EMBEDDING_DIM
}

fn default_exa_url() -> String {
    DEFAULT_EXA_URL.to_string()
}

fn default_listen() -> String {
    DEFAULT_LISTEN.to_string()
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_ingest_timeout_secs() -> u64 {
    DEFAULT_INGEST_TIMEOUT_SECS
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub augment: AugmentConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

impl Config {
    /// Load the config file if there is one, apply environment overrides and
    /// validate the result.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match config_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        log::debug!("loading config from {path:?}");
        serde_yml::from_str(&config_str).map_err(|source| ConfigError::Malformed {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Override fields from environment variables, looked up through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("QDRANT_HOST") {
            self.store.host = host;
        }
        if let Some(port) = lookup("QDRANT_PORT") {
            self.store.port = parse_env("QDRANT_PORT", port)?;
        }
        if let Some(collection) = lookup("COLLECTION_NAME") {
            self.store.collection = collection;
        }
        if let Some(url) = lookup("EMBEDDING_SERVICE_URL") {
            self.embedding.url = url;
        }
        if let Some(dim) = lookup("EMBEDDING_DIM") {
            self.embedding.dimension = parse_env("EMBEDDING_DIM", dim)?;
        }
        if let Some(key) = lookup("EXA_API_KEY") {
            self.augment.api_key = Some(key).filter(|k| !k.trim().is_empty());
        }
        if let Some(listen) = lookup("SEMDEX_LISTEN") {
            self.server.listen = listen;
        }
        if let Some(api_url) = lookup("API_URL") {
            self.ingest.api_url = api_url;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.embedding.dimension == 0 {
            return Err(ConfigError::Invalid(
                "embedding.dimension must be greater than 0".into(),
            ));
        }
        if self.store.collection.trim().is_empty() {
            return Err(ConfigError::Invalid("store.collection must not be empty".into()));
        }
        if self.ingest.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "ingest.batch_size must be greater than 0".into(),
            ));
        }

        let timeouts = [
            ("store.timeout_secs", self.store.timeout_secs),
            ("embedding.timeout_secs", self.embedding.timeout_secs),
            ("augment.timeout_secs", self.augment.timeout_secs),
            ("ingest.timeout_secs", self.ingest.timeout_secs),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, secs)| *secs == 0) {
            return Err(ConfigError::Invalid(format!("{name} must be greater than 0")));
        }

        Ok(())
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store.timeout_secs)
    }

    pub fn embedding_timeout(&self) -> Duration {
        Duration::from_secs(self.embedding.timeout_secs)
    }

    pub fn augment_timeout(&self) -> Duration {
        Duration::from_secs(self.augment.timeout_secs)
    }

    pub fn ingest_timeout(&self) -> Duration {
        Duration::from_secs(self.ingest.timeout_secs)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        key: key.to_string(),
        value,
    })
}

/// `$SEMDEX_CONFIG`, or `~/.semdex/config.yaml`.
fn config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("SEMDEX_CONFIG") {
        return Some(PathBuf::from(path));
    }

    match my_home() {
        Ok(Some(home)) => Some(home.join(".semdex").join("config.yaml")),
        _ => {
            log::debug!("could not determine home directory");
            None
        }
    }
}
