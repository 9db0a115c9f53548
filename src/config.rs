use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::storage::file_store::normalize_folder;
use crate::storage::StorageConfig;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024; // 256 MiB
pub const DEFAULT_UPLOAD_FOLDER: &str = "trips/";

/// Top-level application configuration loaded from file + environment.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageSection,
    pub database: DatabaseSection,
    pub upload: UploadSection,
    pub logging: LoggingSection,
}

impl AppConfig {
    /// Load configuration from disk and environment.
    ///
    /// The file path comes from `TRIPS_CONFIG` (default `config.toml`); a
    /// missing file is not an error. Environment variables override the file,
    /// e.g. `TRIPS_SERVER__PORT=8080` or `TRIPS_STORAGE__BACKEND=s3`.
    pub fn load() -> Result<Self> {
        let config_path = env::var("TRIPS_CONFIG").unwrap_or_else(|_| "config.toml".to_string());

        let mut builder = config::Config::builder();

        if Path::new(&config_path).exists() {
            builder = builder.add_source(config::File::from(PathBuf::from(&config_path)));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("TRIPS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder.build()?;
        let mut config: Self = settings.try_deserialize()?;
        config.normalize()?;

        Ok(config)
    }

    /// Fill defaults for blank values and reject inconsistent settings.
    pub fn normalize(&mut self) -> Result<()> {
        if self.logging.level.trim().is_empty() {
            self.logging.level = "info".to_string();
        }

        if self.database.table.trim().trim_matches('/').is_empty() {
            bail!("database.table must not be empty");
        }
        self.database.table = self.database.table.trim().trim_matches('/').to_string();

        self.upload.folder = normalize_folder(&self.upload.folder);
        if self.upload.folder.is_empty() {
            bail!("upload.folder must not be empty");
        }
        let table_prefix = format!("{}/", self.database.table);
        if self.upload.folder.starts_with(&table_prefix)
            || table_prefix.starts_with(&self.upload.folder)
        {
            bail!(
                "upload.folder '{}' and database.table '{}' must not overlap",
                self.upload.folder,
                self.database.table
            );
        }

        if self.server.max_upload_bytes == 0 {
            bail!("server.max_upload_bytes must be greater than zero");
        }

        Ok(())
    }

    /// Resolve storage configuration.
    pub fn storage_runtime(&self) -> Result<StorageConfig> {
        self.storage.to_runtime()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub backend: StorageBackendKind,
    pub local: Option<LocalStorageSection>,
    pub s3: Option<S3StorageSection>,
}

impl StorageSection {
    pub fn to_runtime(&self) -> Result<StorageConfig> {
        match self.backend {
            StorageBackendKind::Local => {
                let local = self.local.clone().unwrap_or_default();
                Ok(StorageConfig::Local {
                    root_path: local.root_path,
                })
            }
            StorageBackendKind::S3 => {
                let s3 = self
                    .s3
                    .clone()
                    .context("storage.s3 configuration required when backend is 's3'")?;

                if s3.bucket.trim().is_empty() {
                    bail!("storage.s3.bucket must be specified");
                }
                if s3.region.trim().is_empty() {
                    bail!("storage.s3.region must be specified");
                }

                Ok(StorageConfig::S3 {
                    bucket: s3.bucket,
                    region: s3.region,
                    endpoint: s3.endpoint.filter(|e| !e.trim().is_empty()),
                })
            }
        }
    }
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::Local,
            local: Some(LocalStorageSection::default()),
            s3: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    #[default]
    Local,
    S3,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocalStorageSection {
    pub root_path: String,
}

impl Default for LocalStorageSection {
    fn default() -> Self {
        Self {
            root_path: "./data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct S3StorageSection {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    /// Storage prefix of the trip table
    pub table: String,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            table: "trips_db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadSection {
    /// Folder uploaded files are stored under
    pub folder: String,
}

impl Default for UploadSection {
    fn default() -> Self {
        Self {
            folder: DEFAULT_UPLOAD_FOLDER.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}
