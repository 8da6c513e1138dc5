// =============================================================================
// CONFIGURATION - Load settings from config.toml
// =============================================================================
//
// Which backends an instance gets, its discovery policy, default device
// creation options and mock adapters for the null backend. Provides sensible defaults if the file is missing or broken.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::backend::MockAdapter;
use crate::instance::DiscoveryPolicy;

/// Root configuration structure
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub instance: InstanceConfig,
    pub device: DeviceConfig,
    pub null_backend: NullBackendConfig,
    pub debug: DebugConfig,
}

/// Instance settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct InstanceConfig {
    pub app_name: String,
    /// Backends in discovery order: "vulkan", "null"
    pub backends: Vec<String>,
    /// "explicit" or "eager"
    pub discovery: String,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            app_name: "gpu-shim".to_string(),
            backends: vec!["vulkan".to_string()],
            discovery: "explicit".to_string(),
        }
    }
}

/// Device creation defaults used by the CLI
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct DeviceConfig {
    /// Create a device on this adapter after listing
    pub adapter_index: Option<usize>,
    pub required_extensions: Vec<String>,
    pub force_enabled_toggles: Vec<String>,
    pub force_disabled_toggles: Vec<String>,
}

/// Adapters reported by the null backend
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct NullBackendConfig {
    pub adapters: Vec<MockAdapter>,
}

/// Debug settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub validation_layers: bool,
    /// env_logger filter, overridden by RUST_LOG
    pub log_level: String,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            validation_layers: cfg!(debug_assertions),
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BackendKind {
    Vulkan,
    Null,
}

impl Config {
    /// Load configuration from file, falling back to defaults if not found
    pub fn load() -> Self {
        Self::load_from_path("config.toml").unwrap_or_else(|e| {
            log::warn!("Failed to load config.toml: {:#}. Using defaults.", e);
            Config::default()
        })
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config = Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        log::info!("Loaded configuration from {:?}", path);
        log::debug!("Config: {:?}", config);

        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Backends to instantiate, unknown names skipped
    pub fn backend_kinds(&self) -> Vec<BackendKind> {
        self.instance
            .backends
            .iter()
            .filter_map(|name| match name.to_lowercase().as_str() {
                "vulkan" => Some(BackendKind::Vulkan),
                "null" => Some(BackendKind::Null),
                _ => {
                    log::warn!("Unknown backend '{}' in config, skipping", name);
                    None
                }
            })
            .collect()
    }

    pub fn discovery_policy(&self) -> DiscoveryPolicy {
        match self.instance.discovery.to_lowercase().as_str() {
            "explicit" => DiscoveryPolicy::Explicit,
            "eager" => DiscoveryPolicy::Eager,
            _ => {
                log::warn!(
                    "Unknown discovery policy '{}', defaulting to explicit",
                    self.instance.discovery
                );
                DiscoveryPolicy::Explicit
            }
        }
    }
}
