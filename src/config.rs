use serde::{Deserialize, Serialize};

use crate::clients::gemini::DEFAULT_API_BASE;
use crate::error::{HdlForgeError, Result};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_STATUS_INTERVAL_MS: u64 = 2500;
const DEFAULT_LOG_LEVEL: &str = "hdl_forge=info";

/// Main configuration structure loaded from hdl_forge.toml and environment variables
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub generation: GenerationSettings,
    pub status: StatusConfig,
    /// Runtime configuration loaded from environment variables
    #[serde(skip)]
    pub runtime: RuntimeConfig,
}

/// Remote model provider settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub model: String,
    pub api_base: String,
    /// HTTP timeout; unset means wait for the provider indefinitely
    pub request_timeout_ms: Option<u64>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            request_timeout_ms: None,
        }
    }
}

/// How replies are post-processed
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GenerationSettings {
    /// Strip a wrapping Markdown code fence before parsing the reply
    pub strip_code_fences: bool,
    /// Order results by the deliverable catalogue instead of reply order
    pub canonical_order: bool,
}

/// Rotating status text shown while a request is pending
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StatusConfig {
    pub interval_ms: u64,
    pub messages: Vec<String>,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_STATUS_INTERVAL_MS,
            messages: default_status_messages(),
        }
    }
}

pub fn default_status_messages() -> Vec<String> {
    [
        "Analyzing design requirements...",
        "Drafting RTL architecture...",
        "Writing HDL modules...",
        "Building the UVM environment...",
        "Crafting test sequences...",
        "Adding assertions and coverage...",
        "Writing documentation...",
        "Finalizing deliverables...",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Runtime configuration loaded from environment variables
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    pub api_key: Option<String>,
}

impl RuntimeConfig {
    /// Load runtime configuration from environment variables
    pub fn load_from_env() -> Self {
        Self {
            api_key: std::env::var("GEMINI_API_KEY")
                .or_else(|_| std::env::var("API_KEY"))
                .ok()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
        }
    }

    /// `RUST_LOG`, or the crate default
    pub fn log_level_from_env() -> String {
        std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
    }
}

impl Config {
    /// Load configuration from TOML file and environment variables
    /// Uses HDL_FORGE_CONFIG environment variable or defaults to "hdl_forge.toml"
    pub fn load() -> Result<Self> {
        Self::load_env_file();

        let config_path =
            std::env::var("HDL_FORGE_CONFIG").unwrap_or_else(|_| "hdl_forge.toml".to_string());

        let mut config = Self::from_file(&config_path)?;
        config.apply_env_overrides();
        config.runtime = RuntimeConfig::load_from_env();
        config.validate()?;
        Ok(config)
    }

    /// Load `HDL_FORGE_ENV_FILE` or `.env`; variables already set are not overridden
    pub fn load_env_file() {
        let loaded = match std::env::var("HDL_FORGE_ENV_FILE") {
            Ok(env_path) => dotenvy::from_path(env_path),
            Err(_) => dotenvy::from_path(".env"),
        };
        if let Err(e) = loaded {
            tracing::debug!("No env file loaded: {}", e);
        }
    }

    /// Parse a TOML file; a missing file yields defaults
    pub fn from_file(path: &str) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Config file {} not found, using defaults", path);
                Ok(Self::default())
            }
            Err(e) => Err(HdlForgeError::Config {
                message: format!("Failed to read {}: {}", path, e),
            }),
        }
    }

    /// Apply env overrides on top of file values (env-first)
    pub fn apply_env_overrides(&mut self) {
        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            tracing::debug!("GEMINI_MODEL env override applied");
            self.provider.model = model;
        }
        if let Ok(base) = std::env::var("GEMINI_API_BASE") {
            tracing::debug!("GEMINI_API_BASE env override applied");
            self.provider.api_base = base;
        }
        if let Some(timeout) = std::env::var("HDL_FORGE_HTTP_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            self.provider.request_timeout_ms = Some(timeout);
        }
        if let Some(interval) = std::env::var("HDL_FORGE_STATUS_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            self.status.interval_ms = interval;
        }
        if let Ok(strip) = std::env::var("HDL_FORGE_STRIP_FENCES") {
            self.generation.strip_code_fences = strip == "1" || strip.eq_ignore_ascii_case("true");
        }
        if let Ok(order) = std::env::var("HDL_FORGE_CANONICAL_ORDER") {
            self.generation.canonical_order = order == "1" || order.eq_ignore_ascii_case("true");
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.provider.model.trim().is_empty() {
            return Err(HdlForgeError::Validation {
                message: "provider.model must not be empty".into(),
            });
        }
        if !self.provider.api_base.starts_with("http://")
            && !self.provider.api_base.starts_with("https://")
        {
            tracing::warn!(
                "API base '{}' doesn't start with http:// or https://",
                self.provider.api_base
            );
        }
        if self.status.interval_ms == 0 {
            return Err(HdlForgeError::Validation {
                message: "status.interval_ms must be > 0".into(),
            });
        }
        if self.status.messages.is_empty() {
            return Err(HdlForgeError::Validation {
                message: "status.messages must contain at least one message".into(),
            });
        }
        Ok(())
    }
}
