use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::{json, Value};
use tracing::info;

use tangerina_core::config::{api_key_env, TangerinaConfig};
use tangerina_core::error::CapabilityError;
use tangerina_core::{CapabilityTable, ChatProvider, Orchestrator, Persona, ToolRegistry};
use tangerina_provider_gemini::GeminiProvider;
use tangerina_provider_openai::OpenAiProvider;
use tangerina_provider_zhipu::ZhipuProvider;

/// Validate the config, printing warnings, or exit with a hint.
pub fn check_config(config: &TangerinaConfig) {
    match config.validate() {
        Ok(warnings) => {
            for w in warnings {
                eprintln!("⚠ {}", w);
            }
        }
        Err(e) => {
            eprintln!("❌ Configuration error: {}", e);
            eprintln!("   Run `tangerina config init` to set up your configuration.");
            std::process::exit(1);
        }
    }
}

/// Build the active provider from config.
pub fn build_provider(config: &TangerinaConfig) -> Result<Arc<dyn ChatProvider>> {
    let name = config.provider.as_str();
    let api_key = config.resolve_api_key(name).with_context(|| {
        format!(
            "no API key for provider '{}'. Set {} or add api_key under [providers.{}]",
            name,
            api_key_env(name).unwrap_or("the provider's API key variable"),
            name
        )
    })?;
    let base_url = config.base_url_for_provider(name);
    let models = config.candidate_models(name);
    info!(provider = %name, models = ?models, "registering provider");

    let provider: Arc<dyn ChatProvider> = match name {
        "openai" => Arc::new(OpenAiProvider::new(&api_key, models, base_url.as_deref())),
        "zhipu" => {
            let model = config.model_for_provider(name);
            let fallbacks = models.into_iter().skip(1).collect();
            Arc::new(
                ZhipuProvider::new(&api_key, Some(&model), base_url.as_deref())
                    .with_fallback_models(fallbacks),
            )
        }
        "gemini" => Arc::new(GeminiProvider::new(&api_key, models, base_url.as_deref())),
        other => anyhow::bail!("unknown provider: '{}'", other),
    };
    Ok(provider)
}

/// Orchestrator wired with the builtin tools, persona and loop settings.
pub fn build_orchestrator(config: &TangerinaConfig) -> Result<Orchestrator> {
    let provider = build_provider(config)?;
    let persona = match &config.persona.path {
        Some(path) => Persona::load(path)?,
        None => Persona::default(),
    };
    Ok(
        Orchestrator::new(provider, Arc::new(ToolRegistry::builtin()), persona)
            .with_settings(config.chat.to_settings()),
    )
}

/// Capabilities available from a terminal: only message sending, which
/// prints to stdout.
pub fn console_capabilities() -> CapabilityTable {
    CapabilityTable::new().with("send_message", |args: Vec<Value>| async move {
        let channel = args.first().cloned().unwrap_or(Value::Null);
        let text = args
            .get(1)
            .and_then(|t| t.as_str())
            .ok_or_else(|| CapabilityError::MissingKey("text".into()))?
            .to_string();
        println!("📨 [#{}] {}", channel, text);
        Ok(json!({ "success": true, "channel_id": channel }))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tangerina_core::config::{ProviderConfig, ProvidersConfig};

    #[tokio::test]
    async fn console_send_message_succeeds() {
        let table = console_capabilities();
        let send = table.get("send_message").unwrap();
        let result = send(vec![json!(5), json!("oi")]).await.unwrap();
        assert_eq!(result["success"], true);
        assert!(!table.contains("play_music"));
    }

    #[tokio::test]
    async fn console_send_message_requires_text() {
        let table = console_capabilities();
        let send = table.get("send_message").unwrap();
        assert!(send(vec![json!(5)]).await.is_err());
    }

    #[test]
    fn builds_configured_provider() {
        let config = TangerinaConfig {
            provider: "gemini".into(),
            providers: ProvidersConfig {
                gemini: Some(ProviderConfig {
                    api_key: Some("g".into()),
                    ..Default::default()
                }),
                ..Default::default()
            },
            ..Default::default()
        };
        let provider = build_provider(&config).unwrap();
        assert_eq!(provider.name(), "gemini");
        assert_eq!(
            provider.models_to_try(),
            vec!["gemini-2.5-flash-lite", "gemini-2.0-flash-exp"]
        );
    }

    #[test]
    fn zhipu_keeps_configured_order() {
        let config = TangerinaConfig {
            providers: ProvidersConfig {
                zhipu: Some(ProviderConfig {
                    api_key: Some("z".into()),
                    model: Some("glm-4".into()),
                    ..Default::default()
                }),
                ..Default::default()
            },
            ..Default::default()
        };
        let provider = build_provider(&config).unwrap();
        assert_eq!(
            provider.models_to_try(),
            vec!["glm-4", "glm-4-plus", "glm-4-flash", "glm-3-turbo"]
        );
    }
}
