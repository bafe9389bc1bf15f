use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::backend::Backend;
use crate::backend::dropbox::DropboxBackend;
use crate::backend::local::LocalBackend;
use crate::backend::sftp::{self, KeyType, SftpBackend, SftpOptions};

const CONFIG_FILE: &str = "cloudbackup.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: BackendConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BackendConfig {
    #[serde(rename = "local")]
    Local { path: String },
    #[serde(rename = "dropbox")]
    Dropbox { access_token: String },
    #[serde(rename = "sftp")]
    Sftp {
        host: String,
        user: String,
        private_key_file: PathBuf,
        private_key_passphrase: Option<String>,
        known_hosts_file: PathBuf,
        #[serde(default = "default_port")]
        port: u16,
        #[serde(default)]
        key_type: KeyType,
    },
}

fn default_port() -> u16 {
    sftp::DEFAULT_PORT
}

impl StorageConfig {
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cloudbackup")
            .join(CONFIG_FILE)
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("config not found at {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("failed to parse config")
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("failed to write config to {}", path.display()))?;
        Ok(())
    }

    pub async fn open_backend(&self) -> Result<Arc<dyn Backend>> {
        match &self.backend {
            BackendConfig::Local { path } => Ok(Arc::new(LocalBackend::init(path)?)),
            BackendConfig::Dropbox { access_token } => {
                Ok(Arc::new(DropboxBackend::new(access_token)?))
            }
            BackendConfig::Sftp {
                host,
                user,
                private_key_file,
                private_key_passphrase,
                known_hosts_file,
                port,
                key_type,
            } => {
                let mut options =
                    SftpOptions::new(host, user, private_key_file, known_hosts_file)
                        .port(*port)
                        .key_type(*key_type);
                if let Some(passphrase) = private_key_passphrase {
                    options = options.passphrase(passphrase);
                }
                let backend = SftpBackend::connect(options)
                    .await
                    .with_context(|| format!("failed to connect to {host}:{port}"))?;
                Ok(Arc::new(backend))
            }
        }
    }
}
