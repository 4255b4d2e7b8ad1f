//! Configuration
//!
//! TOML-based configuration: provider selection, API keys, candidate
//! models, loop limits and the persona file. Includes startup validation.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::orchestrator::OrchestratorSettings;

/// Providers the CLI knows how to build.
pub const KNOWN_PROVIDERS: [&str; 3] = ["zhipu", "openai", "gemini"];

// ---------------------------------------------------------------------------
// Configuration structures
// ---------------------------------------------------------------------------

/// Top-level configuration (maps to TOML).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TangerinaConfig {
    /// Active provider name ("zhipu", "openai" or "gemini").
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Provider-specific configurations.
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Tool loop settings.
    #[serde(default)]
    pub chat: ChatSettings,

    /// Persona settings.
    #[serde(default)]
    pub persona: PersonaConfig,
}

fn default_provider() -> String {
    "zhipu".to_string()
}

/// Per-provider settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub openai: Option<ProviderConfig>,
    #[serde(default)]
    pub zhipu: Option<ProviderConfig>,
    #[serde(default)]
    pub gemini: Option<ProviderConfig>,
}

/// Configuration for a single model provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API key. If absent, falls back to environment variable.
    pub api_key: Option<String>,
    /// Primary model id.
    pub model: Option<String>,
    /// Models tried, in order, when the primary fails.
    pub fallback_models: Option<Vec<String>>,
    /// Custom base URL (proxies, compatible endpoints, tests).
    pub base_url: Option<String>,
}

/// Tool loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSettings {
    /// Model requests per message (default 10).
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Output token budget per request (default 1000).
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_max_iterations() -> usize {
    10
}

fn default_max_tokens() -> u32 {
    1000
}

impl ChatSettings {
    pub fn to_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            max_iterations: self.max_iterations,
            max_tokens: self.max_tokens,
            ..Default::default()
        }
    }
}

/// Persona settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonaConfig {
    /// Persona text file. The built-in persona is used when unset or missing.
    pub path: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

impl TangerinaConfig {
    /// Load config from the default location:
    /// `~/.config/tangerina/config.toml`
    pub fn load_default() -> Result<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            info!("no config file found at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config: {}", path.display()))?;
        info!(path = %path.display(), provider = %config.provider, "loaded config");
        Ok(config)
    }

    /// Default config file path.
    pub fn default_path() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("could not determine config directory"))?;
        Ok(dir.join("tangerina").join("config.toml"))
    }

    fn provider_config(&self, provider_name: &str) -> Option<&ProviderConfig> {
        match provider_name {
            "openai" => self.providers.openai.as_ref(),
            "zhipu" => self.providers.zhipu.as_ref(),
            "gemini" => self.providers.gemini.as_ref(),
            _ => None,
        }
    }

    /// Resolve the API key for a provider, checking config and then env vars.
    pub fn resolve_api_key(&self, provider_name: &str) -> Option<String> {
        let config_key = self
            .provider_config(provider_name)
            .and_then(|p| p.api_key.clone())
            .filter(|k| !k.is_empty());
        if config_key.is_some() {
            return config_key;
        }

        std::env::var(api_key_env(provider_name)?)
            .ok()
            .filter(|k| !k.is_empty())
    }

    /// Primary model for a provider.
    pub fn model_for_provider(&self, provider_name: &str) -> String {
        self.provider_config(provider_name)
            .and_then(|p| p.model.clone())
            .unwrap_or_else(|| match provider_name {
                "openai" => "gpt-4o-mini".to_string(),
                "zhipu" => "glm-4-plus".to_string(),
                "gemini" => "gemini-2.5-flash-lite".to_string(),
                _ => "unknown".to_string(),
            })
    }

    /// Fallback models for a provider, before de-duplication.
    pub fn fallbacks_for_provider(&self, provider_name: &str) -> Vec<String> {
        if let Some(list) = self
            .provider_config(provider_name)
            .and_then(|p| p.fallback_models.clone())
        {
            return list;
        }
        let defaults: &[&str] = match provider_name {
            "zhipu" => &["glm-4-plus", "glm-4-flash", "glm-3-turbo", "glm-4"],
            "gemini" => &["gemini-2.0-flash-exp"],
            _ => &[],
        };
        defaults.iter().map(|m| m.to_string()).collect()
    }

    /// Primary model followed by the fallbacks, without repeats.
    pub fn candidate_models(&self, provider_name: &str) -> Vec<String> {
        let primary = self.model_for_provider(provider_name);
        let mut models = vec![primary];
        for model in self.fallbacks_for_provider(provider_name) {
            if !models.contains(&model) {
                models.push(model);
            }
        }
        models
    }

    /// Base URL override for a provider.
    pub fn base_url_for_provider(&self, provider_name: &str) -> Option<String> {
        self.provider_config(provider_name)
            .and_then(|p| p.base_url.clone())
    }

    /// Validate the config on startup. Returns a list of warnings.
    pub fn validate(&self) -> Result<Vec<String>> {
        let mut warnings = Vec::new();

        let Some(env_var) = api_key_env(&self.provider) else {
            bail!(
                "unknown provider: '{}'. Expected: {}",
                self.provider,
                KNOWN_PROVIDERS.join(", ")
            );
        };
        if self.resolve_api_key(&self.provider).is_none() {
            bail!(
                "No API key for provider '{}'. Set {} environment variable or add api_key under [providers.{}]",
                self.provider,
                env_var,
                self.provider
            );
        }

        if self.chat.max_iterations == 0 {
            bail!("chat.max_iterations must be at least 1");
        }

        if let Some(path) = &self.persona.path {
            if !path.exists() {
                warnings.push(format!(
                    "persona file {} not found, using the built-in persona",
                    path.display()
                ));
            }
        }

        Ok(warnings)
    }
}

/// Environment variable holding the API key of a provider.
pub fn api_key_env(provider_name: &str) -> Option<&'static str> {
    match provider_name {
        "openai" => Some("OPENAI_API_KEY"),
        "zhipu" => Some("ZHIPU_API_KEY"),
        "gemini" => Some("GEMINI_API_KEY"),
        _ => None,
    }
}

impl Default for TangerinaConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            providers: ProvidersConfig::default(),
            chat: ChatSettings::default(),
            persona: PersonaConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config generation (for `config init`)
// ---------------------------------------------------------------------------

/// Generate a sample config TOML string.
pub fn sample_config() -> String {
    r#"# Tangerina Configuration

# Active model provider: "zhipu", "openai", or "gemini"
provider = "zhipu"

[providers.zhipu]
# api_key = "..."  # Or set ZHIPU_API_KEY env var
model = "glm-4-plus"
fallback_models = ["glm-4-flash", "glm-3-turbo", "glm-4"]

[providers.openai]
# api_key = "sk-..."  # Or set OPENAI_API_KEY env var
model = "gpt-4o-mini"
# base_url = "https://api.openai.com"  # For compatible endpoints

[providers.gemini]
# api_key = "..."  # Or set GEMINI_API_KEY env var
model = "gemini-2.5-flash-lite"
fallback_models = ["gemini-2.0-flash-exp"]

[chat]
max_iterations = 10
max_tokens = 1000

# [persona]
# path = "/path/to/tangerina_persona.txt"
"#
    .to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
