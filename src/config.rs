// src/config.rs
//! Application configuration.
//!
//! Layered with the `config` crate, later sources overriding earlier ones:
//! 1. built-in defaults
//! 2. `config/default.toml` (optional)
//! 3. the file named by `CERT_VERIFIER_CONFIG` (optional)
//! 4. environment variables, e.g. `CERT_VERIFIER_SERVER__PORT=8080` or
//!    `CERT_VERIFIER_LEDGER__RPC_URL=http://127.0.0.1:8545`
//!
//! `PRIVATE_KEY` is honoured as a fallback for `ledger.private_key`.

use crate::error::CertError;
use crate::storage::ledger::LedgerOptions;
use crate::utils::retry::RetryConfig;
use ::config::{Config, Environment, File};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "CERT_VERIFIER";
const CONFIG_FILE_VAR: &str = "CERT_VERIFIER_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "config/default";

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub ledger: LedgerConfig,
    pub upload: UploadConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 5000,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Ledger,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct LedgerConfig {
    pub rpc_url: String,
    pub private_key: Option<String>,
    pub deployment_path: PathBuf,
    pub call_timeout_ms: u64,
    pub max_retries: u32,
    pub gas_limit: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:7545".into(),
            private_key: None,
            deployment_path: PathBuf::from("deployments/CertificateVerifier.json"),
            call_timeout_ms: 30_000,
            max_retries: 3,
            gas_limit: 500_000,
        }
    }
}

impl LedgerConfig {
    pub fn options(&self) -> LedgerOptions {
        LedgerOptions {
            call_timeout: Duration::from_millis(self.call_timeout_ms),
            retry: RetryConfig::default().with_max_retries(self.max_retries),
        }
    }

    pub fn require_private_key(&self) -> Result<&str, CertError> {
        self.private_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                CertError::Config(
                    "ledger.private_key is not set (CERT_VERIFIER_LEDGER__PRIVATE_KEY or PRIVATE_KEY)"
                        .into(),
                )
            })
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct UploadConfig {
    /// Largest accepted request body, in bytes.
    pub max_file_size: usize,
    pub allowed_extensions: Vec<String>,
    /// Where uploaded documents are kept; not kept when unset.
    pub dir: Option<PathBuf>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024,
            allowed_extensions: ["pdf", "png", "jpg", "jpeg"].map(String::from).to_vec(),
            dir: None,
        }
    }
}

impl UploadConfig {
    pub fn is_allowed(&self, file_name: &str) -> bool {
        match Path::new(file_name).extension().and_then(|ext| ext.to_str()) {
            Some(ext) => self
                .allowed_extensions
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(ext)),
            None => false,
        }
    }
}

impl AppConfig {
    /// Loads the full layered configuration from the process environment.
    pub fn load() -> Result<Self, CertError> {
        let explicit = std::env::var(CONFIG_FILE_VAR).ok().map(PathBuf::from);
        let mut config = Self::build(explicit.as_deref(), environment())?;
        if config.ledger.private_key.is_none() {
            config.ledger.private_key = std::env::var("PRIVATE_KEY").ok();
        }
        Ok(config)
    }

    fn build(explicit: Option<&Path>, env: Environment) -> Result<Self, CertError> {
        let mut builder =
            Config::builder().add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false));
        if let Some(path) = explicit {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder
            .add_source(env)
            .build()
            .and_then(Config::try_deserialize)
            .map_err(|e| CertError::Config(e.to_string()))
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, CertError> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| {
                CertError::Config(format!(
                    "invalid server address {}:{}: {}",
                    self.server.host, self.server.port, e
                ))
            })
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("upload.allowed_extensions")
}
