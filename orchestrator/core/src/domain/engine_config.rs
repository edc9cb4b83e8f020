// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Engine Configuration Types
//
// Defines the configuration schema for a Convoy mission engine:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Worker pool sizing and queue polling
// - Mission store backend selection
// - Logging and metrics settings

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::repository::StorageBackend;

pub const API_VERSION: &str = "convoy.dev/v1";
pub const KIND: &str = "EngineConfig";

/// Top-level Kubernetes-style engine configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfigManifest {
    /// API version (must be "convoy.dev/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "EngineConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: EngineConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable engine name
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfigSpec {
    #[serde(default)]
    pub engine: EngineSettings,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Number of concurrent workers spawned by `start()`
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// How long an idle worker waits on the queue before re-checking shutdown
    #[serde(default = "default_dequeue_timeout", with = "humantime_serde")]
    pub dequeue_timeout: Duration,

    /// How long `stop()` waits for in-flight missions
    #[serde(default = "default_grace_period", with = "humantime_serde")]
    pub shutdown_grace_period: Duration,

    /// Buffered events per streaming subscriber before lagging
    #[serde(default = "default_event_capacity")]
    pub event_channel_capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackendKind {
    Memory,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: StoreBackendKind,

    /// Directory for the file backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// "compact" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

fn default_worker_count() -> usize {
    4
}

fn default_dequeue_timeout() -> Duration {
    Duration::from_millis(500)
}

fn default_grace_period() -> Duration {
    Duration::from_secs(30)
}

fn default_event_capacity() -> usize {
    1024
}

fn default_backend() -> StoreBackendKind {
    StoreBackendKind::File
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "compact".to_string()
}

fn default_metrics_port() -> u16 {
    9464
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            dequeue_timeout: default_dequeue_timeout(),
            shutdown_grace_period: default_grace_period(),
            event_channel_capacity: default_event_capacity(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: Some(PathBuf::from("./.convoy/missions")),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

impl Default for EngineConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "convoy-local".to_string(),
                version: None,
            },
            spec: EngineConfigSpec::default(),
        }
    }
}

impl StoreConfig {
    pub fn storage_backend(&self) -> StorageBackend {
        match (&self.backend, &self.path) {
            (StoreBackendKind::File, Some(path)) => StorageBackend::File(path.clone()),
            _ => StorageBackend::InMemory,
        }
    }
}

impl EngineConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. CONVOY_CONFIG_PATH environment variable
    /// 2. ./convoy-config.yaml (working directory)
    /// 3. ~/.convoy/config.yaml (user home)
    /// 4. /etc/convoy/config.yaml (system, Unix) or C:\ProgramData\Convoy\config.yaml (Windows)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("CONVOY_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./convoy-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".convoy").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        let system_config = PathBuf::from("/etc/convoy/config.yaml");
        #[cfg(windows)]
        let system_config = PathBuf::from("C:\\ProgramData\\Convoy\\config.yaml");

        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::debug!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("CONVOY_WORKER_COUNT") {
            match val.trim().parse::<usize>() {
                Ok(count) => {
                    tracing::info!("Environment override: CONVOY_WORKER_COUNT={}", count);
                    self.spec.engine.worker_count = count;
                }
                Err(_) => tracing::warn!(
                    "Invalid value for CONVOY_WORKER_COUNT: '{}'. Expected a positive integer. Ignoring.",
                    val
                ),
            }
        }

        if let Some(val) = lookup("CONVOY_STORE_BACKEND") {
            match val.to_lowercase().as_str() {
                "memory" => self.spec.store.backend = StoreBackendKind::Memory,
                "file" => self.spec.store.backend = StoreBackendKind::File,
                _ => tracing::warn!(
                    "Invalid value for CONVOY_STORE_BACKEND: '{}'. Expected memory/file. Ignoring.",
                    val
                ),
            }
        }

        if let Some(val) = lookup("CONVOY_STORE_PATH") {
            tracing::info!("Environment override: CONVOY_STORE_PATH={}", val);
            self.spec.store.path = Some(PathBuf::from(val));
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let engine = &self.spec.engine;
        if engine.worker_count == 0 {
            anyhow::bail!("spec.engine.worker_count must be at least 1");
        }

        if engine.dequeue_timeout.is_zero() {
            anyhow::bail!("spec.engine.dequeue_timeout must be greater than zero");
        }

        if engine.event_channel_capacity == 0 {
            anyhow::bail!("spec.engine.event_channel_capacity must be at least 1");
        }

        if self.spec.store.backend == StoreBackendKind::File && self.spec.store.path.is_none() {
            anyhow::bail!("spec.store.path is required for the file backend");
        }

        match self.spec.observability.logging.format.as_str() {
            "compact" | "json" => {}
            other => anyhow::bail!(
                "Invalid logging format: '{}'. Must be 'compact' or 'json'",
                other
            ),
        }

        Ok(())
    }
}
